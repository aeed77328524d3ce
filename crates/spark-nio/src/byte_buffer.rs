use core::{cell::Cell, cmp::Ordering, fmt, ptr::NonNull};
use std::{io, rc::Rc};

use bytes::{Buf, Bytes};

use crate::{
    buffer::{Buffer, hash_terms},
    config::BufferAllocator,
    cursor::{Cursor, check_array_range},
    element::Element,
    error::{BufferError, Result},
    memory::{compact_cells, copy_cells, read_cells, write_cells},
    order::ByteOrder,
    storage::{DirectStorage, HeapStorage, MemoryBlock, ReleaseAction, Storage},
    typed::{CharBuffer, DoubleBuffer, FloatBuffer, IntBuffer, LongBuffer, ShortBuffer, TypedBuffer},
};

/// `ByteBuffer` 是字节级的根缓冲：持有（或别名）一段连续内存，提供原始字节读写、
/// 批量搬运、字节序选择，并作为六种元素视图的工厂。
///
/// # 设计背景（Why）
/// - 编解码器需要在同一段内存上交替以字节与定宽数值的方式读写，且不能为每次重新解释付出复制成本；
/// - 切片、副本、只读派生与元素视图都只共享底层 [`MemoryBlock`]，各自拥有独立 [`Cursor`]，
///   因此派生操作的成本与缓冲大小无关。
///
/// # 契约说明（What）
/// - 新建缓冲默认大端序；`set_order` 只影响之后的多字节访问，已创建的视图保持创建时的字节序；
/// - 检查顺序固定为：可访问性 → 只读 → 游标/索引；任何失败都发生在写入内存之前，
///   游标与内容保持调用前状态；
/// - 批量操作要么完整成功，要么不产生任何效果。
///
/// # 风险提示（Trade-offs）
/// - 别名之间不做冲突检测，多个别名交替写入重叠区间是合法用法；
/// - 基于 `Rc` 共享存储，缓冲不满足 `Send`，跨线程传递请先 [`to_bytes`](Self::to_bytes)。
pub struct ByteBuffer {
    memory: Rc<MemoryBlock>,
    cursor: Cursor,
    /// 索引 0 在内存块中的字节偏移。
    offset: usize,
    swap: bool,
    read_only: bool,
}

macro_rules! typed_accessors {
    ($($t:ty => $get:ident, $put:ident, $get_at:ident, $put_at:ident, $view:ident -> $alias:ident;)*) => {$(
        #[doc = concat!("相对读取一个 `", stringify!($t), "`，position 前进其宽度。")]
        pub fn $get(&mut self) -> Result<$t> {
            self.get_value::<$t>()
        }

        #[doc = concat!("相对写入一个 `", stringify!($t), "`，position 前进其宽度。")]
        pub fn $put(&mut self, value: $t) -> Result<&mut Self> {
            self.put_value(value)
        }

        #[doc = concat!("在字节索引 `index` 处读取一个 `", stringify!($t), "`。")]
        pub fn $get_at(&self, index: usize) -> Result<$t> {
            self.get_value_at::<$t>(index)
        }

        #[doc = concat!("在字节索引 `index` 处写入一个 `", stringify!($t), "`。")]
        pub fn $put_at(&mut self, index: usize, value: $t) -> Result<&mut Self> {
            self.put_value_at(index, value)
        }

        #[doc = concat!("以 `[position, limit)` 创建 [`", stringify!($alias), "`] 视图。")]
        pub fn $view(&self) -> Result<$alias> {
            self.as_typed::<$t>()
        }
    )*};
}

impl ByteBuffer {
    pub(crate) fn from_storage(storage: Storage, order: ByteOrder) -> Self {
        let memory = Rc::new(MemoryBlock::new(storage));
        let capacity = memory.len();
        Self {
            memory,
            cursor: Cursor::new(capacity),
            offset: 0,
            swap: order.needs_swap(),
            read_only: false,
        }
    }

    /// 分配 `capacity` 字节的清零堆缓冲。
    pub fn allocate(capacity: usize) -> Result<Self> {
        BufferAllocator::default().allocate(capacity)
    }

    /// 分配 `capacity` 字节的清零直接缓冲，起始地址按默认配置对齐。
    pub fn allocate_direct(capacity: usize) -> Result<Self> {
        BufferAllocator::default().allocate_direct(capacity)
    }

    /// 接管 `bytes` 作为后备数组，capacity 与 limit 均为数组长度。
    pub fn wrap(bytes: Vec<u8>) -> Self {
        Self::from_storage(Storage::Heap(HeapStorage::from_vec(bytes)), ByteOrder::default())
    }

    /// 接管 `bytes`，并把窗口设为 position=`offset`、limit=`offset + length`。
    pub fn wrap_range(bytes: Vec<u8>, offset: usize, length: usize) -> Result<Self> {
        check_array_range(offset, length, bytes.len())?;
        let mut buffer = Self::wrap(bytes);
        buffer.cursor = Cursor::with_window(buffer.cursor.capacity(), offset, offset + length)?;
        Ok(buffer)
    }

    /// 在外部提供的内存上构造直接缓冲。
    ///
    /// 未附带 `release` 时本组件永不释放该内存；附带时，释放动作在显式
    /// [`release`](Self::release) 或最后一个别名被回收时执行且仅执行一次。
    ///
    /// # Safety
    /// `address` 起始的 `len` 字节必须在释放动作运行前（无释放动作时在所有别名存活期间）
    /// 保持有效、可读写，且期间不得被其它代码以排他引用访问。
    pub unsafe fn from_raw_parts(
        address: NonNull<u8>,
        len: usize,
        release: Option<ReleaseAction>,
    ) -> Self {
        // SAFETY: 由调用方保证，见上文。
        let storage = unsafe { DirectStorage::external(address, len, release) };
        Self::from_storage(Storage::Direct(storage), ByteOrder::default())
    }

    /// 当前多字节访问使用的字节序。
    pub fn order(&self) -> ByteOrder {
        ByteOrder::from_swap(self.swap)
    }

    /// 修改之后多字节访问的字节序；已创建的视图不受影响。
    pub fn set_order(&mut self, order: ByteOrder) -> &mut Self {
        self.swap = order.needs_swap();
        self
    }

    fn ensure_accessible(&self) -> Result<()> {
        if self.memory.is_accessible() {
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

    /// 以缓冲索引 `start` 起的 `len` 个字节单元格。
    fn bytes(&self, start: usize, len: usize) -> Result<&[Cell<u8>]> {
        let begin = self.offset + start;
        Ok(&self.memory.cells()?[begin..begin + len])
    }

    fn remaining_bytes(&self) -> Result<&[Cell<u8>]> {
        self.bytes(self.cursor.position(), self.cursor.remaining())
    }

    /// 相对读取一个字节。
    pub fn get(&mut self) -> Result<u8> {
        self.ensure_accessible()?;
        let at = self.cursor.next_get(1)?;
        Ok(self.bytes(at, 1)?[0].get())
    }

    /// 相对写入一个字节。
    pub fn put(&mut self, value: u8) -> Result<&mut Self> {
        self.ensure_writable("put")?;
        let at = self.cursor.next_put(1)?;
        self.bytes(at, 1)?[0].set(value);
        Ok(self)
    }

    /// 读取索引 `index` 处的字节，不移动游标。
    pub fn get_at(&self, index: usize) -> Result<u8> {
        self.ensure_accessible()?;
        let at = self.cursor.check_index(index, 1)?;
        Ok(self.bytes(at, 1)?[0].get())
    }

    /// 写入索引 `index` 处的字节，不移动游标。
    pub fn put_at(&mut self, index: usize, value: u8) -> Result<&mut Self> {
        self.ensure_writable("put_at")?;
        let at = self.cursor.check_index(index, 1)?;
        self.bytes(at, 1)?[0].set(value);
        Ok(self)
    }

    /// 把 `dst.len()` 个字节读入 `dst`；剩余不足时返回 `Underflow` 且不读取任何字节。
    pub fn get_slice(&mut self, dst: &mut [u8]) -> Result<&mut Self> {
        self.ensure_accessible()?;
        let at = self.cursor.next_get(dst.len())?;
        read_cells(self.bytes(at, dst.len())?, dst);
        Ok(self)
    }

    /// 读取 `length` 个字节到 `dst[offset..offset + length]`。
    pub fn get_range(&mut self, dst: &mut [u8], offset: usize, length: usize) -> Result<&mut Self> {
        check_array_range(offset, length, dst.len())?;
        self.get_slice(&mut dst[offset..offset + length])
    }

    /// 写入 `src` 的全部字节；空间不足时返回 `Overflow` 且不写入任何字节。
    pub fn put_slice(&mut self, src: &[u8]) -> Result<&mut Self> {
        self.ensure_writable("put_slice")?;
        let at = self.cursor.next_put(src.len())?;
        write_cells(src, self.bytes(at, src.len())?);
        Ok(self)
    }

    /// 写入 `src[offset..offset + length]`。
    pub fn put_range(&mut self, src: &[u8], offset: usize, length: usize) -> Result<&mut Self> {
        check_array_range(offset, length, src.len())?;
        self.put_slice(&src[offset..offset + length])
    }

    /// 把 `src` 的全部剩余字节搬到本缓冲，两侧游标同时前进。
    ///
    /// 同一实例不能同时作为源与目标（借用规则已禁止）；两个别名共享同一存储时按
    /// `memmove` 语义处理重叠。
    pub fn put_buffer(&mut self, src: &mut ByteBuffer) -> Result<&mut Self> {
        self.ensure_writable("put_buffer")?;
        src.ensure_accessible()?;
        let len = src.cursor.remaining();
        let to = self.cursor.next_put(len)?;
        let from = src.cursor.next_get(len)?;
        copy_cells(src.bytes(from, len)?, self.bytes(to, len)?);
        Ok(self)
    }

    /// 把 `src` 的全部剩余字节写入本缓冲；空间不足时不消费 `src`。
    ///
    /// `src` 的全部内容先暂存到临时缓冲，之后才取用目标内存：`Buf` 的回调可能经由别名
    /// 释放本缓冲，目标切片不能跨越这些回调持有。
    pub fn put_buf<B: Buf + ?Sized>(&mut self, src: &mut B) -> Result<&mut Self> {
        self.ensure_writable("put_buf")?;
        let len = src.remaining();
        if len > self.cursor.remaining() {
            return Err(BufferError::Overflow {
                requested: len,
                remaining: self.cursor.remaining(),
            });
        }
        let mut staged = vec![0u8; len];
        src.copy_to_slice(&mut staged);
        self.ensure_writable("put_buf")?;
        let at = self.cursor.next_put(len)?;
        write_cells(&staged, self.bytes(at, len)?);
        Ok(self)
    }

    /// 创建共享存储的切片：capacity=limit=当前剩余量，position=0，继承只读与字节序。
    pub fn slice(&self) -> Result<ByteBuffer> {
        self.ensure_accessible()?;
        Ok(ByteBuffer {
            memory: Rc::clone(&self.memory),
            cursor: Cursor::new(self.cursor.remaining()),
            offset: self.offset + self.cursor.position(),
            swap: self.swap,
            read_only: self.read_only,
        })
    }

    /// 创建共享存储的副本，完整复制游标状态。
    pub fn duplicate(&self) -> Result<ByteBuffer> {
        self.ensure_accessible()?;
        Ok(ByteBuffer {
            memory: Rc::clone(&self.memory),
            cursor: self.cursor,
            offset: self.offset,
            swap: self.swap,
            read_only: self.read_only,
        })
    }

    /// 与 [`duplicate`](Self::duplicate) 相同，但结果总是只读。
    pub fn as_read_only(&self) -> Result<ByteBuffer> {
        let mut copy = self.duplicate()?;
        copy.read_only = true;
        Ok(copy)
    }

    /// 把 `[position, limit)` 搬到起始处，position=搬运字节数，limit=capacity，丢弃 mark。
    pub fn compact(&mut self) -> Result<&mut Self> {
        self.ensure_writable("compact")?;
        let moved = self.cursor.remaining();
        compact_cells(
            self.bytes(0, self.cursor.capacity())?,
            self.cursor.position(),
            moved,
        );
        tracing::trace!(moved, capacity = self.cursor.capacity(), "byte buffer compacted");
        self.cursor.compacted(moved);
        Ok(self)
    }

    /// 相对读取一个定宽元素。
    pub fn get_value<T: Element>(&mut self) -> Result<T> {
        self.ensure_accessible()?;
        let at = self.cursor.next_get(T::WIDTH)?;
        Ok(T::decode(self.bytes(at, T::WIDTH)?, self.swap))
    }

    /// 相对写入一个定宽元素。
    pub fn put_value<T: Element>(&mut self, value: T) -> Result<&mut Self> {
        self.ensure_writable("put_value")?;
        let at = self.cursor.next_put(T::WIDTH)?;
        value.encode(self.bytes(at, T::WIDTH)?, self.swap);
        Ok(self)
    }

    /// 在字节索引 `index` 处读取定宽元素；`[index, index + WIDTH)` 必须位于 limit 之内。
    pub fn get_value_at<T: Element>(&self, index: usize) -> Result<T> {
        self.ensure_accessible()?;
        let at = self.cursor.check_index(index, T::WIDTH)?;
        Ok(T::decode(self.bytes(at, T::WIDTH)?, self.swap))
    }

    /// 在字节索引 `index` 处写入定宽元素。
    pub fn put_value_at<T: Element>(&mut self, index: usize, value: T) -> Result<&mut Self> {
        self.ensure_writable("put_value_at")?;
        let at = self.cursor.check_index(index, T::WIDTH)?;
        value.encode(self.bytes(at, T::WIDTH)?, self.swap);
        Ok(self)
    }

    typed_accessors! {
        i16 => get_i16, put_i16, get_i16_at, put_i16_at, as_short_buffer -> ShortBuffer;
        u16 => get_char, put_char, get_char_at, put_char_at, as_char_buffer -> CharBuffer;
        i32 => get_i32, put_i32, get_i32_at, put_i32_at, as_int_buffer -> IntBuffer;
        i64 => get_i64, put_i64, get_i64_at, put_i64_at, as_long_buffer -> LongBuffer;
        f32 => get_f32, put_f32, get_f32_at, put_f32_at, as_float_buffer -> FloatBuffer;
        f64 => get_f64, put_f64, get_f64_at, put_f64_at, as_double_buffer -> DoubleBuffer;
    }

    /// 以 `[position, limit)` 创建元素视图。
    ///
    /// 视图容量为 `remaining / WIDTH`，字节序固定为调用时刻的字节序，只读标志随之继承。
    pub fn as_typed<T: Element>(&self) -> Result<TypedBuffer<T>> {
        self.ensure_accessible()?;
        Ok(TypedBuffer::over_bytes(
            Rc::clone(&self.memory),
            self.offset + self.cursor.position(),
            self.cursor.remaining() / T::WIDTH,
            self.swap,
            self.read_only,
        ))
    }

    /// 是否可以通过 [`array`](Self::array) 访问后备数组；访问被撤销期间返回 `false`。
    pub fn has_array(&self) -> bool {
        !self.read_only && self.memory.is_accessible() && self.memory.heap_cells().is_some()
    }

    /// 后备数组整体；索引 0 位于 [`array_offset`](Self::array_offset)。
    pub fn array(&self) -> Result<&[Cell<u8>]> {
        self.ensure_writable("array")?;
        self.memory
            .heap_cells()
            .ok_or_else(|| BufferError::illegal_state("direct buffer has no backing array"))
    }

    /// 缓冲索引 0 在后备数组中的位置。
    pub fn array_offset(&self) -> Result<usize> {
        self.array()?;
        Ok(self.offset)
    }

    /// 直接缓冲中索引 0 的地址；堆缓冲或不可访问时返回 `None`。
    pub fn address(&self) -> Option<NonNull<u8>> {
        if !self.memory.is_accessible() {
            return None;
        }
        self.memory.address().map(|base| {
            // SAFETY: `offset <= capacity`，结果最多指向可用区域的末尾之后一个字节。
            unsafe { base.add(self.offset) }
        })
    }

    /// 撤销或恢复访问；已释放的直接内存不能恢复。
    pub fn set_accessible(&self, accessible: bool) -> Result<()> {
        self.memory.set_accessible(accessible)
    }

    /// 撤销所有别名的访问并释放底层内存，至多执行一次。
    ///
    /// 返回本次调用是否真正执行了释放；之后任何访问都返回 `IllegalState("inaccessible")`。
    pub fn release(&self) -> bool {
        self.memory.release()
    }

    /// 比较两者的剩余字节是否相同。
    pub fn content_eq(&self, other: &ByteBuffer) -> Result<bool> {
        let (lhs, rhs) = (self.remaining_bytes()?, other.remaining_bytes()?);
        Ok(lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| a.get() == b.get()))
    }

    /// 按有符号字节（`i8`）对剩余内容做字典序比较，公共前缀相同时剩余较短者更小。
    pub fn compare_to(&self, other: &ByteBuffer) -> Result<Ordering> {
        let (lhs, rhs) = (self.remaining_bytes()?, other.remaining_bytes()?);
        Ok(lhs
            .iter()
            .zip(rhs)
            .map(|(a, b)| signed(a).cmp(&signed(b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| lhs.len().cmp(&rhs.len())))
    }

    /// 剩余内容的散列值，只依赖剩余字节；每个字节按 `i8` 符号扩展后参与折叠。
    pub fn hash_code(&self) -> Result<i32> {
        Ok(hash_terms(
            self.remaining_bytes()?.iter().map(|cell| i32::from(signed(cell))),
        ))
    }

    /// 把剩余字节复制为 `Bytes`，不移动游标。
    pub fn to_bytes(&self) -> Result<Bytes> {
        let remaining = self.remaining_bytes()?;
        let mut out = vec![0u8; remaining.len()];
        read_cells(remaining, &mut out);
        Ok(Bytes::from(out))
    }

    /// 以剩余空间为上限执行一次 `read`，position 前进实际读取的字节数；出错时游标不变。
    ///
    /// 数据经由一段临时缓冲中转：共享存储不能安全地借出为 `&mut [u8]`。
    pub fn read_from<R: io::Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        self.ensure_writable("read_from")?;
        let start = self.cursor.position();
        let mut scratch = vec![0u8; self.cursor.remaining()];
        let read = reader.read(&mut scratch)?.min(scratch.len());
        write_cells(&scratch[..read], self.bytes(start, read)?);
        self.cursor.set_position(start + read)?;
        Ok(read)
    }

    /// 对剩余字节执行一次 `write`，position 前进实际写出的字节数；出错时游标不变。
    pub fn write_to<W: io::Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<usize> {
        let scratch = self.to_bytes()?;
        let written = writer.write(&scratch)?.min(scratch.len());
        let start = self.cursor.position();
        self.cursor.set_position(start + written)?;
        Ok(written)
    }
}

fn signed(cell: &Cell<u8>) -> i8 {
    cell.get() as i8
}

impl Buffer for ByteBuffer {
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
        self.memory.is_direct()
    }

    fn is_accessible(&self) -> bool {
        self.memory.is_accessible()
    }
}

impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ByteBuffer[pos={} lim={} cap={}]",
            self.cursor.position(),
            self.cursor.limit(),
            self.cursor.capacity()
        )
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("cursor", &self.cursor)
            .field("offset", &self.offset)
            .field("order", &self.order())
            .field("direct", &self.memory.is_direct())
            .field("read_only", &self.read_only)
            .field("accessible", &self.memory.is_accessible())
            .finish()
    }
}
