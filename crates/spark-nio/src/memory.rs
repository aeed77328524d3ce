//! 批量搬运与压缩原语。
//!
//! # 模块定位（Why）
//! - 字节缓冲与元素视图的批量 `get`/`put`、跨缓冲 `put_buffer` 以及 `compact` 最终都归结为
//!   “把一段单元格搬到另一段单元格”，集中在此处实现一次，避免逐元素循环散落各处。
//!
//! # 契约说明（What）
//! - 所有函数操作 `&[Cell<T>]`：源与目标可能是同一存储的两个别名，因此通用搬运一律按
//!   `memmove` 语义处理重叠；
//! - 与调用方私有切片（`&[T]`/`&mut [T]`）之间的搬运不会重叠：私有切片的排他借用保证了这一点；
//! - 长度不一致属于调用方逻辑错误，按较短一侧搬运并在调试构建下断言。

use core::{cell::Cell, ptr};

/// 以 `memmove` 语义把 `src` 复制到 `dst`，两者可以重叠。
pub(crate) fn copy_cells<T: Copy>(src: &[Cell<T>], dst: &[Cell<T>]) {
    debug_assert_eq!(src.len(), dst.len());
    let len = src.len().min(dst.len());
    // SAFETY: `Cell<T>` 与 `T` 布局一致；两段区域各自有效且至少包含 `len` 个元素；
    // 写入经由 `Cell` 内部的 `UnsafeCell` 进行，不违反共享引用的别名规则；
    // `ptr::copy` 允许区域重叠。
    unsafe {
        ptr::copy(
            src.as_ptr().cast::<T>(),
            dst.as_ptr().cast::<T>().cast_mut(),
            len,
        );
    }
}

/// 把共享单元格读入调用方私有切片。
pub(crate) fn read_cells<T: Copy>(src: &[Cell<T>], dst: &mut [T]) {
    debug_assert_eq!(src.len(), dst.len());
    let len = src.len().min(dst.len());
    // SAFETY: `dst` 为排他借用，不可能与任何 `Cell` 别名重叠；布局论证同 `copy_cells`。
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr().cast::<T>(), dst.as_mut_ptr(), len);
    }
}

/// 把调用方私有切片写入共享单元格。
pub(crate) fn write_cells<T: Copy>(src: &[T], dst: &[Cell<T>]) {
    debug_assert_eq!(src.len(), dst.len());
    let len = src.len().min(dst.len());
    // SAFETY: `src` 为共享借用的私有数据，只要存在对它的 `&[T]`，就不可能同时存在
    // 经由 `Cell` 的写入；布局论证同 `copy_cells`。
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr().cast::<T>().cast_mut(), len);
    }
}

/// 把 `cells[from, from + len)` 搬到 `cells[0, len)`。
///
/// 两段区间在 `from < len` 时重叠，`copy_cells` 的 `memmove` 语义保证结果正确。
pub(crate) fn compact_cells<T: Copy>(cells: &[Cell<T>], from: usize, len: usize) {
    if len == 0 || from == 0 {
        return;
    }
    copy_cells(&cells[from..from + len], &cells[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<T: Copy>(cells: &[Cell<T>]) -> Vec<T> {
        cells.iter().map(Cell::get).collect()
    }

    #[test]
    fn overlapping_forward_and_backward_copies() {
        let mut raw = [1u8, 2, 3, 4, 5, 6];
        let cells = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        copy_cells(&cells[0..4], &cells[2..6]);
        assert_eq!(values(cells), [1, 2, 1, 2, 3, 4]);
        copy_cells(&cells[2..6], &cells[0..4]);
        assert_eq!(values(cells), [1, 2, 3, 4, 3, 4]);
    }

    #[test]
    fn compaction_moves_remainder_to_front() {
        let mut raw = [10i32, 20, 30, 40, 50];
        let cells = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        compact_cells(cells, 1, 3);
        assert_eq!(values(cells), [20, 30, 40, 40, 50]);
    }

    #[test]
    fn private_slices_round_trip() {
        let mut raw = [0u16; 4];
        let cells = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        write_cells(&[7, 8], &cells[1..3]);
        let mut out = [0u16; 2];
        read_cells(&cells[1..3], &mut out);
        assert_eq!(out, [7, 8]);
        assert_eq!(values(cells), [0, 7, 8, 0]);
    }
}
