//! 定宽元素视图。
//!
//! # 模块定位（Why）
//! - 六种元素视图的行为只在元素宽度与位模式解释上不同，以泛型 [`TypedBuffer<T>`] 实现一次，
//!   再以类型别名暴露 `ShortBuffer`、`CharBuffer` 等熟悉的名字；
//! - 视图既可以重新解释字节缓冲的存储（零拷贝），也可以独立持有元素数组（堆原生视图）。
//!
//! # 设计概要（How）
//! - 字节派生视图的唯一换算点是 `ix(i) = i * WIDTH + byte_offset`，所有访问都经由它落到
//!   根内存块的字节上；
//! - 批量读写先按字节整体搬运，存储序与本机序不同时再逐元素翻转；
//! - 堆原生视图以 `Rc<[Cell<T>]>` 保存元素，使用本机字节序，切片与副本同样共享数组。

use core::{cell::Cell, cmp::Ordering, fmt};
use std::rc::Rc;

use crate::{
    buffer::{Buffer, hash_terms},
    cursor::{Cursor, check_array_range},
    element::{Element, as_bytes, as_bytes_mut},
    error::{BufferError, Result},
    memory::{compact_cells, copy_cells, read_cells, write_cells},
    order::ByteOrder,
    storage::{MemoryBlock, check_array_layout},
};

/// 16 位有符号整数视图。
pub type ShortBuffer = TypedBuffer<i16>;
/// UTF-16 码元视图。
pub type CharBuffer = TypedBuffer<u16>;
/// 32 位有符号整数视图。
pub type IntBuffer = TypedBuffer<i32>;
/// 64 位有符号整数视图。
pub type LongBuffer = TypedBuffer<i64>;
/// 32 位浮点视图。
pub type FloatBuffer = TypedBuffer<f32>;
/// 64 位浮点视图。
pub type DoubleBuffer = TypedBuffer<f64>;

/// 视图的后备存储。
enum Backing<T> {
    /// 重新解释字节缓冲的内存块；字节序在创建时冻结为 `swap`。
    Bytes {
        memory: Rc<MemoryBlock>,
        byte_offset: usize,
        swap: bool,
    },
    /// 独立的元素数组；`offset` 为索引 0 在数组中的位置。
    Array {
        elements: Rc<[Cell<T>]>,
        offset: usize,
    },
}

impl<T> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Bytes {
                memory,
                byte_offset,
                swap,
            } => Backing::Bytes {
                memory: Rc::clone(memory),
                byte_offset: *byte_offset,
                swap: *swap,
            },
            Backing::Array { elements, offset } => Backing::Array {
                elements: Rc::clone(elements),
                offset: *offset,
            },
        }
    }
}

/// `TypedBuffer<T>` 以元素为单位提供与 [`ByteBuffer`](crate::ByteBuffer) 相同的读写契约。
///
/// # 契约说明（What）
/// - 游标以元素计；绝对索引 `index` 必须满足 `index < limit`；
/// - 检查顺序与字节缓冲一致：可访问性 → 只读 → 游标/索引；
/// - 字节派生视图的 `compact` 搬运的是根内存块中的字节，堆原生视图搬运自身数组。
pub struct TypedBuffer<T: Element> {
    backing: Backing<T>,
    cursor: Cursor,
    read_only: bool,
}

impl<T: Element> TypedBuffer<T> {
    pub(crate) fn over_bytes(
        memory: Rc<MemoryBlock>,
        byte_offset: usize,
        capacity: usize,
        swap: bool,
        read_only: bool,
    ) -> Self {
        Self {
            backing: Backing::Bytes {
                memory,
                byte_offset,
                swap,
            },
            cursor: Cursor::new(capacity),
            read_only,
        }
    }

    /// 分配 `capacity` 个零值元素的堆原生视图；容量过大时返回 `IllegalArgument`。
    pub fn allocate(capacity: usize) -> Result<Self> {
        check_array_layout::<T>(capacity)?;
        Ok(Self::wrap(vec![T::default(); capacity]))
    }

    /// 接管 `values` 作为后备数组。
    pub fn wrap(values: Vec<T>) -> Self {
        let elements: Rc<[Cell<T>]> = values.into_iter().map(Cell::new).collect();
        Self {
            cursor: Cursor::new(elements.len()),
            backing: Backing::Array {
                elements,
                offset: 0,
            },
            read_only: false,
        }
    }

    /// 接管 `values`，窗口为 position=`offset`、limit=`offset + length`。
    pub fn wrap_range(values: Vec<T>, offset: usize, length: usize) -> Result<Self> {
        check_array_range(offset, length, values.len())?;
        let mut buffer = Self::wrap(values);
        buffer.cursor = Cursor::with_window(buffer.cursor.capacity(), offset, offset + length)?;
        Ok(buffer)
    }

    /// 多字节访问的字节序；堆原生视图总是本机序。
    pub fn order(&self) -> ByteOrder {
        match &self.backing {
            Backing::Bytes { swap, .. } => ByteOrder::from_swap(*swap),
            Backing::Array { .. } => ByteOrder::native(),
        }
    }

    fn ensure_accessible(&self) -> Result<()> {
        if self.is_accessible() {
            Ok(())
        } else {
            Err(BufferError::inaccessible())
        }
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        self.ensure_accessible()?;
        if self.read_only {
            return Err(BufferError::ReadOnly { operation });
        }
        Ok(())
    }

    /// 元素索引到根内存块字节索引的换算。
    #[inline]
    fn ix(byte_offset: usize, index: usize) -> usize {
        index * T::WIDTH + byte_offset
    }

    fn load(&self, index: usize) -> Result<T> {
        match &self.backing {
            Backing::Bytes {
                memory,
                byte_offset,
                swap,
            } => {
                let at = Self::ix(*byte_offset, index);
                Ok(T::decode(&memory.cells()?[at..at + T::WIDTH], *swap))
            }
            Backing::Array { elements, offset } => Ok(elements[offset + index].get()),
        }
    }

    fn store(&self, index: usize, value: T) -> Result<()> {
        match &self.backing {
            Backing::Bytes {
                memory,
                byte_offset,
                swap,
            } => {
                let at = Self::ix(*byte_offset, index);
                value.encode(&memory.cells()?[at..at + T::WIDTH], *swap);
            }
            Backing::Array { elements, offset } => elements[offset + index].set(value),
        }
        Ok(())
    }

    fn load_range(&self, start: usize, dst: &mut [T]) -> Result<()> {
        match &self.backing {
            Backing::Bytes {
                memory,
                byte_offset,
                swap,
            } => {
                let at = Self::ix(*byte_offset, start);
                let bytes = as_bytes_mut(dst);
                read_cells(&memory.cells()?[at..at + bytes.len()], bytes);
                if *swap {
                    dst.iter_mut().for_each(|value| *value = value.swap_bytes());
                }
            }
            Backing::Array { elements, offset } => {
                let begin = offset + start;
                read_cells(&elements[begin..begin + dst.len()], dst);
            }
        }
        Ok(())
    }

    fn store_range(&self, start: usize, src: &[T]) -> Result<()> {
        match &self.backing {
            Backing::Bytes {
                memory,
                byte_offset,
                swap,
            } => {
                let at = Self::ix(*byte_offset, start);
                let cells = &memory.cells()?[at..at + src.len() * T::WIDTH];
                if *swap {
                    for (value, bytes) in src.iter().zip(cells.chunks_exact(T::WIDTH)) {
                        value.encode(bytes, true);
                    }
                } else {
                    write_cells(as_bytes(src), cells);
                }
            }
            Backing::Array { elements, offset } => {
                let begin = offset + start;
                write_cells(src, &elements[begin..begin + src.len()]);
            }
        }
        Ok(())
    }

    /// 相对读取一个元素。
    pub fn get(&mut self) -> Result<T> {
        self.ensure_accessible()?;
        let at = self.cursor.next_get(1)?;
        self.load(at)
    }

    /// 相对写入一个元素。
    pub fn put(&mut self, value: T) -> Result<&mut Self> {
        self.ensure_writable("put")?;
        let at = self.cursor.next_put(1)?;
        self.store(at, value)?;
        Ok(self)
    }

    pub fn get_at(&self, index: usize) -> Result<T> {
        self.ensure_accessible()?;
        let at = self.cursor.check_index(index, 1)?;
        self.load(at)
    }

    pub fn put_at(&mut self, index: usize, value: T) -> Result<&mut Self> {
        self.ensure_writable("put_at")?;
        let at = self.cursor.check_index(index, 1)?;
        self.store(at, value)?;
        Ok(self)
    }

    /// 读取 `dst.len()` 个元素；剩余不足时返回 `Underflow` 且不读取任何元素。
    pub fn get_slice(&mut self, dst: &mut [T]) -> Result<&mut Self> {
        self.ensure_accessible()?;
        let at = self.cursor.next_get(dst.len())?;
        self.load_range(at, dst)?;
        Ok(self)
    }

    pub fn get_range(&mut self, dst: &mut [T], offset: usize, length: usize) -> Result<&mut Self> {
        check_array_range(offset, length, dst.len())?;
        self.get_slice(&mut dst[offset..offset + length])
    }

    /// 写入 `src` 的全部元素；空间不足时返回 `Overflow` 且不写入任何元素。
    pub fn put_slice(&mut self, src: &[T]) -> Result<&mut Self> {
        self.ensure_writable("put_slice")?;
        let at = self.cursor.next_put(src.len())?;
        self.store_range(at, src)?;
        Ok(self)
    }

    pub fn put_range(&mut self, src: &[T], offset: usize, length: usize) -> Result<&mut Self> {
        check_array_range(offset, length, src.len())?;
        self.put_slice(&src[offset..offset + length])
    }

    /// 把 `src` 的全部剩余元素搬到本视图，两侧游标同时前进。
    ///
    /// 两侧后备形态与字节序一致时直接搬运单元格（可重叠）；否则经由临时数组逐元素转换。
    pub fn put_buffer(&mut self, src: &mut TypedBuffer<T>) -> Result<&mut Self> {
        self.ensure_writable("put_buffer")?;
        src.ensure_accessible()?;
        let len = src.cursor.remaining();
        let to = self.cursor.next_put(len)?;
        let from = src.cursor.next_get(len)?;
        match (&src.backing, &self.backing) {
            (
                Backing::Bytes {
                    memory: src_memory,
                    byte_offset: src_offset,
                    swap: src_swap,
                },
                Backing::Bytes {
                    memory: dst_memory,
                    byte_offset: dst_offset,
                    swap: dst_swap,
                },
            ) if src_swap == dst_swap => {
                let (src_at, dst_at) = (Self::ix(*src_offset, from), Self::ix(*dst_offset, to));
                let bytes = len * T::WIDTH;
                copy_cells(
                    &src_memory.cells()?[src_at..src_at + bytes],
                    &dst_memory.cells()?[dst_at..dst_at + bytes],
                );
            }
            (
                Backing::Array {
                    elements: src_elements,
                    offset: src_offset,
                },
                Backing::Array {
                    elements: dst_elements,
                    offset: dst_offset,
                },
            ) => {
                let (src_at, dst_at) = (src_offset + from, dst_offset + to);
                copy_cells(
                    &src_elements[src_at..src_at + len],
                    &dst_elements[dst_at..dst_at + len],
                );
            }
            _ => {
                let mut scratch = vec![T::default(); len];
                src.load_range(from, &mut scratch)?;
                self.store_range(to, &scratch)?;
            }
        }
        Ok(self)
    }

    /// 共享存储的切片：capacity=limit=当前剩余元素数，position=0。
    pub fn slice(&self) -> Result<TypedBuffer<T>> {
        self.ensure_accessible()?;
        let position = self.cursor.position();
        let backing = match &self.backing {
            Backing::Bytes {
                memory,
                byte_offset,
                swap,
            } => Backing::Bytes {
                memory: Rc::clone(memory),
                byte_offset: Self::ix(*byte_offset, position),
                swap: *swap,
            },
            Backing::Array { elements, offset } => Backing::Array {
                elements: Rc::clone(elements),
                offset: offset + position,
            },
        };
        Ok(Self {
            backing,
            cursor: Cursor::new(self.cursor.remaining()),
            read_only: self.read_only,
        })
    }

    /// 共享存储的副本，完整复制游标状态。
    pub fn duplicate(&self) -> Result<TypedBuffer<T>> {
        self.ensure_accessible()?;
        Ok(Self {
            backing: self.backing.clone(),
            cursor: self.cursor,
            read_only: self.read_only,
        })
    }

    pub fn as_read_only(&self) -> Result<TypedBuffer<T>> {
        let mut copy = self.duplicate()?;
        copy.read_only = true;
        Ok(copy)
    }

    /// 把 `[position, limit)` 搬到起始处，position=搬运元素数，limit=capacity，丢弃 mark。
    pub fn compact(&mut self) -> Result<&mut Self> {
        self.ensure_writable("compact")?;
        let (position, moved) = (self.cursor.position(), self.cursor.remaining());
        match &self.backing {
            Backing::Bytes {
                memory,
                byte_offset,
                ..
            } => {
                let end = Self::ix(*byte_offset, self.cursor.capacity());
                compact_cells(
                    &memory.cells()?[*byte_offset..end],
                    position * T::WIDTH,
                    moved * T::WIDTH,
                );
            }
            Backing::Array { elements, offset } => {
                compact_cells(
                    &elements[*offset..offset + self.cursor.capacity()],
                    position,
                    moved,
                );
            }
        }
        tracing::trace!(moved, view = T::VIEW_NAME, "typed buffer compacted");
        self.cursor.compacted(moved);
        Ok(self)
    }

    /// 仅可写的堆原生视图拥有可访问的后备数组。
    pub fn has_array(&self) -> bool {
        !self.read_only && matches!(self.backing, Backing::Array { .. })
    }

    /// 后备元素数组整体；索引 0 位于 [`array_offset`](Self::array_offset)。
    pub fn array(&self) -> Result<&[Cell<T>]> {
        self.ensure_writable("array")?;
        match &self.backing {
            Backing::Array { elements, .. } => Ok(&elements[..]),
            Backing::Bytes { .. } => Err(BufferError::illegal_state(
                "byte-backed view has no backing array",
            )),
        }
    }

    pub fn array_offset(&self) -> Result<usize> {
        self.ensure_writable("array_offset")?;
        match &self.backing {
            Backing::Array { offset, .. } => Ok(*offset),
            Backing::Bytes { .. } => Err(BufferError::illegal_state(
                "byte-backed view has no backing array",
            )),
        }
    }

    fn remaining_values(&self) -> Result<Vec<T>> {
        self.ensure_accessible()?;
        let mut values = vec![T::default(); self.cursor.remaining()];
        self.load_range(self.cursor.position(), &mut values)?;
        Ok(values)
    }

    /// 比较剩余元素；浮点 `NaN` 与 `NaN` 视为相等。
    pub fn content_eq(&self, other: &TypedBuffer<T>) -> Result<bool> {
        let (lhs, rhs) = (self.remaining_values()?, other.remaining_values()?);
        Ok(lhs.len() == rhs.len() && lhs.iter().zip(&rhs).all(|(a, b)| T::element_eq(*a, *b)))
    }

    /// 剩余元素的字典序比较，公共前缀相同时剩余较短者更小。
    pub fn compare_to(&self, other: &TypedBuffer<T>) -> Result<Ordering> {
        let (lhs, rhs) = (self.remaining_values()?, other.remaining_values()?);
        Ok(lhs
            .iter()
            .zip(&rhs)
            .map(|(a, b)| T::element_cmp(*a, *b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| lhs.len().cmp(&rhs.len())))
    }

    pub fn hash_code(&self) -> Result<i32> {
        Ok(hash_terms(
            self.remaining_values()?.into_iter().map(Element::hash_term),
        ))
    }
}

impl TypedBuffer<u16> {
    /// 以 `text` 的 UTF-16 码元创建堆原生字符视图。
    pub fn wrap_str(text: &str) -> Self {
        Self::wrap(text.encode_utf16().collect())
    }

    /// 写入 `text` 的全部 UTF-16 码元；空间不足时不写入任何码元。
    pub fn put_str(&mut self, text: &str) -> Result<&mut Self> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.put_slice(&units)
    }

    /// 把剩余码元解码为字符串，不移动游标；孤立代理项替换为 `U+FFFD`。
    pub fn remaining_to_string(&self) -> Result<String> {
        Ok(String::from_utf16_lossy(&self.remaining_values()?))
    }
}

impl<T: Element> Buffer for TypedBuffer<T> {
    fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_direct(&self) -> bool {
        match &self.backing {
            Backing::Bytes { memory, .. } => memory.is_direct(),
            Backing::Array { .. } => false,
        }
    }

    fn is_accessible(&self) -> bool {
        match &self.backing {
            Backing::Bytes { memory, .. } => memory.is_accessible(),
            Backing::Array { .. } => true,
        }
    }
}

impl<T: Element> fmt::Display for TypedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[pos={} lim={} cap={}]",
            T::VIEW_NAME,
            self.cursor.position(),
            self.cursor.limit(),
            self.cursor.capacity()
        )
    }
}

impl<T: Element> fmt::Debug for TypedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(T::VIEW_NAME)
            .field("cursor", &self.cursor)
            .field("order", &self.order())
            .field("direct", &self.is_direct())
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ByteBuffer, error::ErrorKind};

    #[test]
    fn view_index_translates_through_byte_offset() {
        let mut bytes = ByteBuffer::allocate(10).expect("分配缓冲");
        bytes.set_position(2).expect("position 在范围内");
        let mut ints = bytes.as_int_buffer().expect("创建视图");
        assert_eq!(ints.capacity(), 2);
        ints.put_at(1, 0x0a0b_0c0d).expect("写入");
        assert_eq!(bytes.get_i32_at(6).expect("读取"), 0x0a0b_0c0d);
        assert_eq!(bytes.get_at(6).expect("大端首字节"), 0x0a);
    }

    #[test]
    fn view_order_is_frozen_at_creation() {
        let mut bytes = ByteBuffer::allocate(4).expect("分配缓冲");
        let shorts = bytes.as_short_buffer().expect("创建视图");
        bytes.set_order(ByteOrder::LittleEndian);
        assert_eq!(shorts.order(), ByteOrder::BigEndian);
        bytes.put_i16_at(0, 0x0102).expect("写入");
        assert_eq!(shorts.get_at(0).expect("读取"), 0x0201);
    }

    #[test]
    fn swapped_bulk_transfer_matches_single_accesses() {
        let mut bytes = ByteBuffer::allocate(24).expect("分配缓冲");
        bytes.set_order(ByteOrder::LittleEndian);
        let mut longs = bytes.as_long_buffer().expect("创建视图");
        longs.put_slice(&[1, -2, i64::MAX]).expect("批量写入");
        assert_eq!(bytes.get_i64_at(8).expect("读取"), -2);
        longs.flip();
        let mut out = [0i64; 3];
        longs.get_slice(&mut out).expect("批量读取");
        assert_eq!(out, [1, -2, i64::MAX]);
    }

    #[test]
    fn heap_native_compact_uses_private_array() {
        let mut floats = FloatBuffer::wrap(vec![1.0, 2.0, 3.0]);
        floats.get().expect("读取");
        floats.compact().expect("压缩");
        assert_eq!((floats.position(), floats.limit()), (2, 3));
        let values: Vec<f32> = floats.array().expect("后备数组").iter().map(Cell::get).collect();
        assert_eq!(values, [2.0, 3.0, 3.0]);
    }

    #[test]
    fn byte_backed_view_has_no_array() {
        let bytes = ByteBuffer::allocate(8).expect("分配缓冲");
        let doubles = bytes.as_double_buffer().expect("创建视图");
        assert!(!doubles.has_array());
        assert_eq!(
            doubles.array().expect_err("字节派生视图").kind(),
            ErrorKind::IllegalState
        );
        assert_eq!(doubles.to_string(), "DoubleBuffer[pos=0 lim=1 cap=1]");
    }

    #[test]
    fn char_text_helpers() {
        let mut chars = CharBuffer::allocate(8).expect("分配视图");
        chars.put_str("héllo").expect("写入");
        chars.flip();
        assert_eq!(chars.remaining_to_string().expect("解码"), "héllo");
        assert_eq!(chars.position(), 0);
        assert_eq!(CharBuffer::wrap_str("ab").remaining(), 2);
    }
}
