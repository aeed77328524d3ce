//! 存储策略：堆存储与直接存储。
//!
//! # 模块定位（Why）
//! - 字节缓冲对外只有一套读写契约，底层却可能是普通堆数组，也可能是按对齐要求自行分配、
//!   甚至由外部（内存映射、FFI）提供的地址；
//! - 以封闭枚举 [`Storage`] 承载两种策略，并由 [`MemoryBlock`] 统一提供原始访问能力，
//!   避免为两种后端各写一套缓冲实现。
//!
//! # 设计概要（How）
//! - 存储统一以 `&[Cell<u8>]` 形式暴露：多个别名可以在单线程内交替读写同一字节，
//!   无需可变借用，也无需加锁；
//! - [`MemoryBlock`] 由 `Rc` 共享，切片、副本与元素视图各持一份强引用，最后一个别名释放时回收；
//! - 可访问标志与只读标志相互独立，所有原始访问在触碰内存前都先检查可访问性。
//!
//! # 风险提示（Trade-offs）
//! - 别名之间不做任何冲突检测：通过一个视图写入、另一个视图读取重叠区间是预期用法，
//!   何时读取到稳定数据由调用方自行约定；
//! - `Rc` 使缓冲天然不满足 `Send`/`Sync`，跨线程使用需要调用方复制数据或自行封装。

mod direct;
mod heap;

use core::cell::Cell;

use crate::error::{BufferError, Result};

pub use direct::ReleaseAction;
pub(crate) use direct::DirectStorage;
pub(crate) use heap::{HeapStorage, check_array_layout};

/// 两种存储策略的封闭集合。
pub(crate) enum Storage {
    Heap(HeapStorage),
    Direct(DirectStorage),
}

/// 被所有别名共享的内存块。
pub(crate) struct MemoryBlock {
    storage: Storage,
    accessible: Cell<bool>,
}

impl MemoryBlock {
    pub(crate) fn new(storage: Storage) -> Self {
        Self {
            storage,
            accessible: Cell::new(true),
        }
    }

    /// 可用区域长度（字节）。
    pub(crate) fn len(&self) -> usize {
        match &self.storage {
            Storage::Heap(heap) => heap.len(),
            Storage::Direct(direct) => direct.capacity(),
        }
    }

    pub(crate) fn is_direct(&self) -> bool {
        matches!(self.storage, Storage::Direct(_))
    }

    pub(crate) fn is_accessible(&self) -> bool {
        self.accessible.get() && !self.is_released()
    }

    fn is_released(&self) -> bool {
        match &self.storage {
            Storage::Heap(_) => false,
            Storage::Direct(direct) => direct.is_released(),
        }
    }

    /// 切换可访问标志；已释放的直接内存不能恢复访问。
    pub(crate) fn set_accessible(&self, accessible: bool) -> Result<()> {
        if accessible && self.is_released() {
            return Err(BufferError::illegal_state(
                "released direct memory cannot become accessible again",
            ));
        }
        if self.accessible.replace(accessible) != accessible {
            tracing::debug!(accessible, direct = self.is_direct(), "buffer accessibility changed");
        }
        Ok(())
    }

    /// 撤销访问并释放内存，至多执行一次；返回本次调用是否真正执行了释放。
    ///
    /// 堆存储没有独立的释放动作，仅撤销访问，内存随最后一个别名回收。
    pub(crate) fn release(&self) -> bool {
        let was_accessible = self.accessible.replace(false);
        match &self.storage {
            Storage::Heap(heap) => {
                if was_accessible {
                    tracing::debug!(len = heap.len(), "heap buffer marked inaccessible");
                }
                was_accessible
            }
            Storage::Direct(direct) => direct.release(),
        }
    }

    /// 原始访问入口：返回整个可用区域。
    ///
    /// 调用方持有返回切片期间不得触发 [`release`](Self::release)。
    #[inline]
    pub(crate) fn cells(&self) -> Result<&[Cell<u8>]> {
        if !self.accessible.get() {
            return Err(BufferError::inaccessible());
        }
        match &self.storage {
            Storage::Heap(heap) => Ok(heap.cells()),
            Storage::Direct(direct) => direct.cells().ok_or_else(BufferError::inaccessible),
        }
    }

    /// 直接存储可用区域的起始地址；堆存储返回 `None`。
    pub(crate) fn address(&self) -> Option<core::ptr::NonNull<u8>> {
        match &self.storage {
            Storage::Heap(_) => None,
            Storage::Direct(direct) => Some(direct.address()),
        }
    }

    /// 堆存储的完整后备数组；直接存储返回 `None`。
    pub(crate) fn heap_cells(&self) -> Option<&[Cell<u8>]> {
        match &self.storage {
            Storage::Heap(heap) => Some(heap.cells()),
            Storage::Direct(_) => None,
        }
    }
}
