//! 缓冲分配配置。
//!
//! # 模块定位（Why）
//! - 新建缓冲的默认字节序、直接内存对齐与容量上限属于部署期决策，集中为 [`BufferConfig`]，
//!   由 [`BufferAllocator`] 在每次分配时执行；
//! - `ByteBuffer::allocate` 等便捷入口等价于使用默认配置的分配器。
//!
//! # 使用方式（How）
//! ```rust
//! use spark_nio::{Buffer, BufferAllocator, BufferConfig, ByteOrder};
//!
//! let config = BufferConfig {
//!     default_order: ByteOrder::LittleEndian,
//!     max_capacity: Some(1024),
//!     ..BufferConfig::default()
//! };
//! let allocator = BufferAllocator::new(config).expect("配置合法");
//! let buf = allocator.allocate_direct(64).expect("分配直接缓冲");
//! assert!(buf.is_direct());
//! assert_eq!(buf.order(), ByteOrder::LittleEndian);
//! assert!(allocator.allocate(4096).is_err());
//! ```

use serde::Deserialize;

use crate::{
    byte_buffer::ByteBuffer,
    error::{BufferError, Result},
    order::ByteOrder,
    storage::{DirectStorage, HeapStorage, Storage},
};

/// 直接内存的默认对齐（字节），覆盖全部元素宽度。
pub const DEFAULT_DIRECT_ALIGNMENT: usize = 8;

/// 缓冲分配参数。
///
/// # 契约说明（What）
/// - `default_order`：新建字节缓冲的字节序，缺省为大端；
/// - `direct_alignment`：直接内存可用区域的起始对齐，必须是 2 的幂；
/// - `max_capacity`：可选的单次分配上限，超出时返回 `IllegalArgument`。
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    pub default_order: ByteOrder,
    pub direct_alignment: usize,
    pub max_capacity: Option<usize>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            default_order: ByteOrder::BigEndian,
            direct_alignment: DEFAULT_DIRECT_ALIGNMENT,
            max_capacity: None,
        }
    }
}

impl BufferConfig {
    /// 校验配置的内部一致性。
    pub fn validate(&self) -> Result<()> {
        if !self.direct_alignment.is_power_of_two() {
            return Err(BufferError::illegal_argument(format!(
                "direct_alignment {} is not a power of two",
                self.direct_alignment
            )));
        }
        Ok(())
    }

    /// 从 TOML 文本解析并校验配置，缺省字段取默认值。
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: BufferConfig = toml::from_str(text)
            .map_err(|err| BufferError::illegal_argument(format!("invalid buffer config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn check_capacity(&self, capacity: usize) -> Result<()> {
        match self.max_capacity {
            Some(max) if capacity > max => Err(BufferError::illegal_argument(format!(
                "capacity {capacity} exceeds configured maximum {max}"
            ))),
            _ => Ok(()),
        }
    }
}

/// 按 [`BufferConfig`] 创建字节缓冲的分配器。
#[derive(Clone, Debug, Default)]
pub struct BufferAllocator {
    config: BufferConfig,
}

impl BufferAllocator {
    /// 校验配置后创建分配器。
    pub fn new(config: BufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// 分配清零的堆缓冲。
    pub fn allocate(&self, capacity: usize) -> Result<ByteBuffer> {
        self.config.check_capacity(capacity)?;
        Ok(ByteBuffer::from_storage(
            Storage::Heap(HeapStorage::zeroed(capacity)?),
            self.config.default_order,
        ))
    }

    /// 分配清零且按 `direct_alignment` 对齐的直接缓冲。
    pub fn allocate_direct(&self, capacity: usize) -> Result<ByteBuffer> {
        self.config.check_capacity(capacity)?;
        let storage = DirectStorage::allocate(capacity, self.config.direct_alignment)?;
        Ok(ByteBuffer::from_storage(
            Storage::Direct(storage),
            self.config.default_order,
        ))
    }

    /// 接管 `bytes` 作为堆缓冲的后备数组。
    pub fn wrap(&self, bytes: Vec<u8>) -> Result<ByteBuffer> {
        self.config.check_capacity(bytes.len())?;
        Ok(ByteBuffer::from_storage(
            Storage::Heap(HeapStorage::from_vec(bytes)),
            self.config.default_order,
        ))
    }
}
