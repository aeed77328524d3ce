use crate::error::{BufferError, Result};

/// `Cursor` 是所有缓冲与视图共享的游标状态机。
///
/// # 设计背景（Why）
/// - 字节缓冲、切片、副本与各类元素视图都遵循同一套 position/limit/mark/capacity 语义，
///   将其抽出为独立值类型后，别名之间天然拥有互不干扰的游标。
///
/// # 契约说明（What）
/// - 不变量：`0 ≤ mark ≤ position ≤ limit ≤ capacity`（mark 未设置时去掉左端）；
/// - `capacity` 构造后不可变；所有 setter 在越界时返回 `IllegalArgument` 且不修改状态；
/// - 单位由持有者决定：字节缓冲以字节计，元素视图以元素计。
///
/// # 风险提示（Trade-offs）
/// - 原地修改、无任何同步，面向单线程高频访问；跨线程共享需由调用方加锁。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cursor {
    mark: Option<usize>,
    position: usize,
    limit: usize,
    capacity: usize,
}

impl Cursor {
    /// 创建 position=0、limit=capacity、mark 未设置的游标。
    pub fn new(capacity: usize) -> Self {
        Self {
            mark: None,
            position: 0,
            limit: capacity,
            capacity,
        }
    }

    /// 以给定窗口构造游标，用于 `wrap_range` 等场景。
    pub(crate) fn with_window(capacity: usize, position: usize, limit: usize) -> Result<Self> {
        let mut cursor = Self::new(capacity);
        cursor.set_limit(limit)?;
        cursor.set_position(position)?;
        Ok(cursor)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 当前 mark；未设置时为 `None`。
    pub fn mark_value(&self) -> Option<usize> {
        self.mark
    }

    /// 设置 position；低于 mark 时丢弃 mark。
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(BufferError::illegal_argument(format!(
                "position {position} exceeds limit {}",
                self.limit
            )));
        }
        if self.mark.is_some_and(|mark| mark > position) {
            self.mark = None;
        }
        self.position = position;
        Ok(())
    }

    /// 设置 limit；position 超过新 limit 时被下压，mark 超过新 limit 时被丢弃。
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if limit > self.capacity {
            return Err(BufferError::illegal_argument(format!(
                "limit {limit} exceeds capacity {}",
                self.capacity
            )));
        }
        if self.position > limit {
            self.position = limit;
        }
        if self.mark.is_some_and(|mark| mark > limit) {
            self.mark = None;
        }
        self.limit = limit;
        Ok(())
    }

    pub fn mark(&mut self) {
        self.mark = Some(self.position);
    }

    /// 回到 mark；未设置 mark 时返回 `IllegalState`。
    pub fn reset(&mut self) -> Result<()> {
        match self.mark {
            Some(mark) => {
                self.position = mark;
                Ok(())
            }
            None => Err(BufferError::illegal_state("reset without a mark")),
        }
    }

    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.capacity;
        self.mark = None;
    }

    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
        self.mark = None;
    }

    pub fn rewind(&mut self) {
        self.position = 0;
        self.mark = None;
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// 按 `compact` 语义重置：position=`moved`，limit=capacity，丢弃 mark。
    pub(crate) fn compacted(&mut self, moved: usize) {
        self.position = moved;
        self.limit = self.capacity;
        self.mark = None;
    }

    /// 为相对读取预留 `n` 个单位，返回起始位置并推进游标。
    pub(crate) fn next_get(&mut self, n: usize) -> Result<usize> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(BufferError::Underflow {
                requested: n,
                remaining,
            });
        }
        let start = self.position;
        self.position += n;
        Ok(start)
    }

    /// 为相对写入预留 `n` 个单位，返回起始位置并推进游标。
    pub(crate) fn next_put(&mut self, n: usize) -> Result<usize> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(BufferError::Overflow {
                requested: n,
                remaining,
            });
        }
        let start = self.position;
        self.position += n;
        Ok(start)
    }

    /// 校验 `[index, index + n)` 位于 `[0, limit)` 之内。
    pub(crate) fn check_index(&self, index: usize, n: usize) -> Result<usize> {
        match index.checked_add(n) {
            Some(end) if end <= self.limit => Ok(index),
            _ => Err(BufferError::IndexOutOfBounds {
                index,
                length: n,
                limit: self.limit,
            }),
        }
    }
}

/// 校验 `[offset, offset + length)` 位于长度为 `len` 的数组之内。
pub(crate) fn check_array_range(offset: usize, length: usize, len: usize) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= len => Ok(()),
        _ => Err(BufferError::illegal_argument(format!(
            "range {offset}+{length} exceeds array length {len}"
        ))),
    }
}
