use core::{cell::Cell, ptr::NonNull};
use std::alloc::{self, Layout};

use crate::error::{BufferError, Result};

/// 外部内存的释放动作，参数为区域起始地址与长度。
///
/// 仅在显式 `release()` 或最后一个别名被回收时调用一次。
pub type ReleaseAction = Box<dyn FnOnce(NonNull<u8>, usize)>;

/// 直接内存的来源，决定释放方式。
enum Origin {
    /// 本组件按 `capacity + alignment - 1` 字节自行分配。
    Allocated { raw: NonNull<u8>, layout: Layout },
    /// 外部提供的地址；附带释放动作时由本组件代为调用，否则永不释放。
    External { release: Cell<Option<ReleaseAction>> },
    /// 零长度区域，无需分配。
    Empty,
}

/// `DirectStorage` 表示脱离常规数组管理的内存区域。
///
/// # 设计动机（Why）
/// - 多字节访问假设对齐访问至少不慢于非对齐访问，因此自行分配时预留 `alignment - 1`
///   个填充字节，使可用区域从对齐边界开始；
/// - 外部地址模式（内存映射文件、FFI 调用方）与自行分配模式只在释放方式上不同，
///   读写契约完全一致。
///
/// # 契约说明（What）
/// - `release` 至多真正执行一次：自行分配的内存归还分配器，外部内存调用附带的释放动作；
/// - 释放后 [`cells`](Self::cells) 返回 `None`，上层据此报告 `IllegalState("inaccessible")`；
/// - 未显式释放时，`Drop` 会补做一次释放。
pub(crate) struct DirectStorage {
    base: NonNull<u8>,
    capacity: usize,
    origin: Origin,
    released: Cell<bool>,
}

impl DirectStorage {
    /// 分配 `capacity` 字节、按 `alignment` 对齐的清零区域。
    pub(crate) fn allocate(capacity: usize, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(BufferError::illegal_argument(format!(
                "alignment {alignment} is not a power of two"
            )));
        }
        let reserved = capacity.checked_add(alignment - 1).ok_or_else(|| {
            BufferError::illegal_argument(format!("capacity {capacity} is too large"))
        })?;
        if reserved == 0 {
            return Ok(Self {
                base: NonNull::dangling(),
                capacity: 0,
                origin: Origin::Empty,
                released: Cell::new(false),
            });
        }
        let layout = Layout::from_size_align(reserved, 1)
            .map_err(|err| BufferError::illegal_argument(err.to_string()))?;
        // SAFETY: `layout` 尺寸非零。
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(raw) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        let alignment_offset = raw.as_ptr().align_offset(alignment);
        if alignment_offset >= alignment {
            // SAFETY: `raw` 由同一 `layout` 分配且尚未释放。
            unsafe { alloc::dealloc(raw.as_ptr(), layout) };
            return Err(BufferError::illegal_state(
                "unable to align direct memory region",
            ));
        }
        // SAFETY: `alignment_offset < alignment`，偏移后的指针仍位于 `reserved` 字节的分配之内。
        let base = unsafe { raw.add(alignment_offset) };
        tracing::debug!(capacity, alignment, alignment_offset, "direct buffer allocated");
        Ok(Self {
            base,
            capacity,
            origin: Origin::Allocated { raw, layout },
            released: Cell::new(false),
        })
    }

    /// 包装外部提供的地址。
    ///
    /// # Safety
    /// `base` 起始的 `len` 字节在释放动作运行前（或未附带释放动作时在本存储存活期间）
    /// 必须保持有效、可读写，且不得被本组件之外的代码以排他引用访问。
    pub(crate) unsafe fn external(
        base: NonNull<u8>,
        len: usize,
        release: Option<ReleaseAction>,
    ) -> Self {
        tracing::debug!(len, has_release = release.is_some(), "direct buffer wraps external memory");
        Self {
            base,
            capacity: len,
            origin: Origin::External {
                release: Cell::new(release),
            },
            released: Cell::new(false),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// 可用区域起始地址。
    pub(crate) fn address(&self) -> NonNull<u8> {
        self.base
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.get()
    }

    /// 释放后返回 `None`。
    #[inline]
    pub(crate) fn cells(&self) -> Option<&[Cell<u8>]> {
        if self.released.get() {
            return None;
        }
        // SAFETY: 区域在释放前始终有效；`Cell<u8>` 与 `u8` 布局一致，
        // 所有访问都经由 `Cell` 完成，不会产生与共享引用冲突的排他引用。
        Some(unsafe {
            core::slice::from_raw_parts(self.base.as_ptr().cast::<Cell<u8>>(), self.capacity)
        })
    }

    /// 释放内存，返回本次调用是否真正执行了释放。
    pub(crate) fn release(&self) -> bool {
        if self.released.replace(true) {
            tracing::debug!(capacity = self.capacity, "direct buffer already released");
            return false;
        }
        match &self.origin {
            Origin::Allocated { raw, layout } => {
                // SAFETY: `released` 保证只走到这里一次，`raw` 与 `layout` 来自同一次分配。
                unsafe { alloc::dealloc(raw.as_ptr(), *layout) };
            }
            Origin::External { release } => {
                if let Some(action) = release.take() {
                    action(self.base, self.capacity);
                }
            }
            Origin::Empty => {}
        }
        tracing::debug!(capacity = self.capacity, "direct buffer released");
        true
    }
}

impl Drop for DirectStorage {
    fn drop(&mut self) {
        if !self.released.get() {
            self.release();
        }
    }
}
