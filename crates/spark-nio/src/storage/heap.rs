use core::{alloc::Layout, cell::Cell};

use crate::error::{BufferError, Result};

/// 校验 `capacity` 个 `T` 能构成合法的分配布局（总字节数不超过 `isize::MAX`）。
pub(crate) fn check_array_layout<T>(capacity: usize) -> Result<()> {
    Layout::array::<T>(capacity)
        .map(|_| ())
        .map_err(|_| BufferError::illegal_argument(format!("capacity {capacity} is too large")))
}

/// 堆存储：由普通堆数组承载，随最后一个别名回收。
pub(crate) struct HeapStorage {
    bytes: Box<[Cell<u8>]>,
}

impl HeapStorage {
    /// 分配 `capacity` 字节并清零；容量无法构成合法布局时返回 `IllegalArgument`。
    pub(crate) fn zeroed(capacity: usize) -> Result<Self> {
        check_array_layout::<u8>(capacity)?;
        Ok(Self {
            bytes: vec![Cell::new(0u8); capacity].into_boxed_slice(),
        })
    }

    /// 接管调用方数组的所有权。
    ///
    /// `Cell<u8>` 与 `u8` 布局一致，`Vec` 的原地收集会复用原有分配。
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_iter().map(Cell::new).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn cells(&self) -> &[Cell<u8>] {
        &self.bytes
    }
}
