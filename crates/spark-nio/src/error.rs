//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为缓冲与视图的全部失败路径提供集中定义，调用方只需匹配一个错误类型；
//! - 错误均为**编程契约违例**：组件从不重试、从不截断批量操作，调用方应在调用前完成校验。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 每个错误暴露稳定的 `<域>.<语义>` 错误码，便于日志与告警做精确聚合。

use std::borrow::Cow;

use thiserror::Error;

/// 稳定错误码集合。
///
/// 码值一经发布不得修改；新增语义时追加常量，而非复用既有码值。
pub mod codes {
    /// 相对读取请求的元素数超过剩余量。
    pub const BUFFER_UNDERFLOW: &str = "buffer.underflow";
    /// 相对写入请求的空间超过剩余量。
    pub const BUFFER_OVERFLOW: &str = "buffer.overflow";
    /// 绝对索引或区间越过 `[0, limit)`。
    pub const BUFFER_INDEX_OUT_OF_BOUNDS: &str = "buffer.index_out_of_bounds";
    /// 参数格式非法，例如区间超出数组长度或游标取值越界。
    pub const BUFFER_ILLEGAL_ARGUMENT: &str = "buffer.illegal_argument";
    /// 当前状态不允许该操作，例如未设置 mark 时 `reset`，或底层内存已不可访问。
    pub const BUFFER_ILLEGAL_STATE: &str = "buffer.illegal_state";
    /// 在只读缓冲上执行了写操作。
    pub const BUFFER_READ_ONLY: &str = "buffer.read_only";
}

/// 不可访问状态的固定描述，供 [`BufferError::is_inaccessible`] 识别。
pub(crate) const INACCESSIBLE: &str = "buffer is inaccessible";

/// 缓冲错误的粗粒度分类，与 [`codes`] 一一对应。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Underflow,
    Overflow,
    IndexOutOfBounds,
    IllegalArgument,
    IllegalState,
    ReadOnly,
}

/// `spark-nio` 的统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：游标、存储与视图三层的失败在语义上只有六类，集中为一个枚举后，
///   调用方可以用一次 `match` 覆盖全部分支，也可以借助 [`code`](Self::code) 做机读聚合。
/// - **契约 (What)**：
///   - 错误总在任何内存写入之前产生，出现错误时缓冲内容与游标保持调用前状态；
///   - 所有变体均为 `Send + Sync + 'static`，可自由跨线程传递（缓冲本身则不可）。
/// - **设计权衡 (Trade-offs)**：`reason` 使用 `Cow<'static, str>`，常见路径零分配，
///   需要拼接上下文时才落到堆上。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BufferError {
    /// 相对读取时剩余元素不足。
    #[error("buffer underflow: requested {requested} element(s), {remaining} remaining")]
    Underflow { requested: usize, remaining: usize },

    /// 相对写入时剩余空间不足。
    #[error("buffer overflow: requested {requested} element(s), {remaining} remaining")]
    Overflow { requested: usize, remaining: usize },

    /// 绝对访问越界。`length` 为访问的元素个数，单元素访问时为 1。
    #[error("index {index} (length {length}) out of bounds for limit {limit}")]
    IndexOutOfBounds {
        index: usize,
        length: usize,
        limit: usize,
    },

    /// 参数非法。
    #[error("illegal argument: {reason}")]
    IllegalArgument { reason: Cow<'static, str> },

    /// 状态非法，包括底层内存已被释放或撤销访问。
    #[error("illegal state: {reason}")]
    IllegalState { reason: Cow<'static, str> },

    /// 只读缓冲拒绝写操作。
    #[error("read-only buffer rejects `{operation}`")]
    ReadOnly { operation: &'static str },
}

impl BufferError {
    pub(crate) fn illegal_argument(reason: impl Into<Cow<'static, str>>) -> Self {
        BufferError::IllegalArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn illegal_state(reason: impl Into<Cow<'static, str>>) -> Self {
        BufferError::IllegalState {
            reason: reason.into(),
        }
    }

    pub(crate) fn inaccessible() -> Self {
        BufferError::illegal_state(INACCESSIBLE)
    }

    /// 返回错误分类。
    pub fn kind(&self) -> ErrorKind {
        match self {
            BufferError::Underflow { .. } => ErrorKind::Underflow,
            BufferError::Overflow { .. } => ErrorKind::Overflow,
            BufferError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            BufferError::IllegalArgument { .. } => ErrorKind::IllegalArgument,
            BufferError::IllegalState { .. } => ErrorKind::IllegalState,
            BufferError::ReadOnly { .. } => ErrorKind::ReadOnly,
        }
    }

    /// 返回稳定错误码，取值见 [`codes`]。
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Underflow => codes::BUFFER_UNDERFLOW,
            ErrorKind::Overflow => codes::BUFFER_OVERFLOW,
            ErrorKind::IndexOutOfBounds => codes::BUFFER_INDEX_OUT_OF_BOUNDS,
            ErrorKind::IllegalArgument => codes::BUFFER_ILLEGAL_ARGUMENT,
            ErrorKind::IllegalState => codes::BUFFER_ILLEGAL_STATE,
            ErrorKind::ReadOnly => codes::BUFFER_READ_ONLY,
        }
    }

    /// 判断错误是否源于底层内存已不可访问（释放或撤销）。
    pub fn is_inaccessible(&self) -> bool {
        matches!(self, BufferError::IllegalState { reason } if reason == INACCESSIBLE)
    }
}

/// I/O 协作方以 `io::Error` 报告失败；缓冲错误按语义映射到最接近的 `io::ErrorKind`。
impl From<BufferError> for std::io::Error {
    fn from(err: BufferError) -> Self {
        let kind = match err.kind() {
            ErrorKind::IllegalArgument | ErrorKind::IndexOutOfBounds => {
                std::io::ErrorKind::InvalidInput
            }
            ErrorKind::ReadOnly => std::io::ErrorKind::PermissionDenied,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// 统一的结果别名。
pub type Result<T, E = BufferError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_kind() {
        let err = BufferError::Underflow {
            requested: 4,
            remaining: 1,
        };
        assert_eq!(err.kind(), ErrorKind::Underflow);
        assert_eq!(err.code(), codes::BUFFER_UNDERFLOW);
        assert_eq!(
            err.to_string(),
            "buffer underflow: requested 4 element(s), 1 remaining"
        );
        assert_eq!(
            BufferError::ReadOnly { operation: "put" }.code(),
            "buffer.read_only"
        );
    }

    #[test]
    fn inaccessible_is_an_illegal_state() {
        let err = BufferError::inaccessible();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(err.is_inaccessible());
        assert!(!BufferError::illegal_state("no mark set").is_inaccessible());
    }

    #[test]
    fn converts_into_io_error() {
        let io: std::io::Error = BufferError::ReadOnly { operation: "put" }.into();
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
        let io: std::io::Error = BufferError::inaccessible().into();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
    }
}
