//! 定长元素的字节编解码。
//!
//! # 模块定位（Why）
//! - 六种元素视图（`i16`/`u16`/`i32`/`i64`/`f32`/`f64`）只在宽度与位模式解释上不同，
//!   通过 [`Element`] trait 把差异收敛为一组常量与函数，视图本身只实现一次。
//!
//! # 设计概要（How）
//! - 解码：按本机序拼出位模式，`swap` 为真时再整体翻转字节；浮点经 `from_bits` 还原；
//! - 比较语义对齐经典缓冲 API：浮点 `NaN` 与 `NaN` 相等，`-0.0` 排在 `0.0` 之前。

use core::{cell::Cell, cmp::Ordering, fmt, mem};

mod sealed {
    pub trait Sealed {}
}

/// 可被视图重新解释的定长元素。
///
/// 该 trait 被封闭，只为不含填充、任意位模式均合法的原生数值类型实现，
/// 批量读写依赖这一前提直接按字节搬运。
pub trait Element: Copy + Default + PartialEq + fmt::Debug + sealed::Sealed + 'static {
    /// 元素宽度（字节）。
    const WIDTH: usize;

    /// 视图类型名，用于 `Display`。
    const VIEW_NAME: &'static str;

    /// 从 `WIDTH` 个字节解码；`swap` 表示存储序与本机序不同。
    fn decode(bytes: &[Cell<u8>], swap: bool) -> Self;

    /// 编码到 `WIDTH` 个字节。
    fn encode(self, bytes: &[Cell<u8>], swap: bool);

    /// 内容相等判定。
    fn element_eq(a: Self, b: Self) -> bool;

    /// 全序比较。
    fn element_cmp(a: Self, b: Self) -> Ordering;

    /// 参与 `hash_code` 计算的整型投影。
    fn hash_term(self) -> i32;

    /// 翻转本机位模式的字节序。
    fn swap_bytes(self) -> Self;
}

fn load<const N: usize>(bytes: &[Cell<u8>]) -> [u8; N] {
    let mut raw = [0u8; N];
    for (dst, src) in raw.iter_mut().zip(bytes) {
        *dst = src.get();
    }
    raw
}

fn store(raw: &[u8], bytes: &[Cell<u8>]) {
    for (dst, src) in bytes.iter().zip(raw) {
        dst.set(*src);
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $name:literal),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Element for $t {
            const WIDTH: usize = mem::size_of::<$t>();
            const VIEW_NAME: &'static str = $name;

            #[inline]
            fn decode(bytes: &[Cell<u8>], swap: bool) -> Self {
                let value = <$t>::from_ne_bytes(load::<{ mem::size_of::<$t>() }>(bytes));
                if swap { value.swap_bytes() } else { value }
            }

            #[inline]
            fn encode(self, bytes: &[Cell<u8>], swap: bool) {
                let value = if swap { self.swap_bytes() } else { self };
                store(&value.to_ne_bytes(), bytes);
            }

            fn element_eq(a: Self, b: Self) -> bool {
                a == b
            }

            fn element_cmp(a: Self, b: Self) -> Ordering {
                a.cmp(&b)
            }

            fn hash_term(self) -> i32 {
                self as i32
            }

            fn swap_bytes(self) -> Self {
                <$t>::swap_bytes(self)
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty => $bits:ty, $signed:ty, $name:literal),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Element for $t {
            const WIDTH: usize = mem::size_of::<$t>();
            const VIEW_NAME: &'static str = $name;

            #[inline]
            fn decode(bytes: &[Cell<u8>], swap: bool) -> Self {
                let bits = <$bits>::from_ne_bytes(load::<{ mem::size_of::<$bits>() }>(bytes));
                <$t>::from_bits(if swap { bits.swap_bytes() } else { bits })
            }

            #[inline]
            fn encode(self, bytes: &[Cell<u8>], swap: bool) {
                let bits = self.to_bits();
                let bits = if swap { bits.swap_bytes() } else { bits };
                store(&bits.to_ne_bytes(), bytes);
            }

            fn element_eq(a: Self, b: Self) -> bool {
                a == b || (a.is_nan() && b.is_nan())
            }

            fn element_cmp(a: Self, b: Self) -> Ordering {
                if a < b {
                    return Ordering::Less;
                }
                if a > b {
                    return Ordering::Greater;
                }
                // 相等或含 NaN：按规范化位模式比较，NaN 最大，-0.0 小于 0.0。
                let canonical = |x: $t| -> $signed {
                    if x.is_nan() { <$t>::NAN.to_bits() as $signed } else { x.to_bits() as $signed }
                };
                canonical(a).cmp(&canonical(b))
            }

            fn hash_term(self) -> i32 {
                self as i32
            }

            fn swap_bytes(self) -> Self {
                <$t>::from_bits(self.to_bits().swap_bytes())
            }
        }
    )*};
}

impl_int_element!(
    i16 => "ShortBuffer",
    u16 => "CharBuffer",
    i32 => "IntBuffer",
    i64 => "LongBuffer",
);

impl_float_element!(
    f32 => u32, i32, "FloatBuffer",
    f64 => u64, i64, "DoubleBuffer",
);

/// 将元素切片视为字节切片。
pub(crate) fn as_bytes<T: Element>(elements: &[T]) -> &[u8] {
    // SAFETY: `Element` 仅为无填充的原生数值类型实现，内存布局即 `WIDTH` 个连续字节；
    // 返回切片与输入共享生命周期，长度为 `size_of_val(elements)`。
    unsafe {
        core::slice::from_raw_parts(elements.as_ptr().cast::<u8>(), mem::size_of_val(elements))
    }
}

/// 将可变元素切片视为可变字节切片。
pub(crate) fn as_bytes_mut<T: Element>(elements: &mut [T]) -> &mut [u8] {
    let len = mem::size_of_val(elements);
    // SAFETY: 同 `as_bytes`；此外这些类型的任意位模式均为合法值，
    // 因此通过字节视图写入不会产生非法元素。
    unsafe { core::slice::from_raw_parts_mut(elements.as_mut_ptr().cast::<u8>(), len) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &mut [u8]) -> &[Cell<u8>] {
        Cell::from_mut(raw).as_slice_of_cells()
    }

    #[test]
    fn big_endian_places_most_significant_byte_first() {
        let mut raw = [0u8; 4];
        let swap = crate::ByteOrder::BigEndian.needs_swap();
        0x0102_0304_i32.encode(cells(&mut raw), swap);
        assert_eq!(raw, [1, 2, 3, 4]);
        assert_eq!(i32::decode(cells(&mut raw), swap), 0x0102_0304);
    }

    #[test]
    fn floats_travel_as_raw_bits() {
        let mut raw = [0u8; 8];
        let swap = crate::ByteOrder::LittleEndian.needs_swap();
        let value = -1.5f64;
        value.encode(cells(&mut raw), swap);
        assert_eq!(raw, value.to_bits().to_le_bytes());
        let nan = f32::from_bits(0x7fc0_0001);
        nan.encode(cells(&mut raw[..4]), swap);
        assert_eq!(f32::decode(cells(&mut raw[..4]), swap).to_bits(), 0x7fc0_0001);
    }

    #[test]
    fn float_ordering_matches_buffer_semantics() {
        assert!(f64::element_eq(f64::NAN, f64::NAN));
        assert!(f64::element_eq(0.0, -0.0));
        assert_eq!(f32::element_cmp(-0.0, 0.0), Ordering::Less);
        assert_eq!(f32::element_cmp(f32::NAN, f32::INFINITY), Ordering::Greater);
        assert_eq!(f32::element_cmp(f32::NAN, -f32::NAN), Ordering::Equal);
    }

    #[test]
    fn hash_terms_follow_integer_projection() {
        assert_eq!(0xffff_u16.hash_term(), 0xffff);
        assert_eq!((-2_i16).hash_term(), -2);
        assert_eq!(0x1_0000_0002_i64.hash_term(), 2);
        assert_eq!(3.9_f32.hash_term(), 3);
    }
}
