//! `spark-nio` 提供基于游标的类型化内存缓冲。
//!
//! # 模块定位（Why）
//! - 编解码与 I/O 热路径需要在同一段连续内存上交替以字节和定宽数值（16/32/64 位整数、
//!   32/64 位浮点、UTF-16 码元）的方式读写，并在大端与小端之间自由选择，且不复制底层存储；
//! - 同一套读写契约既要覆盖普通堆数组，也要覆盖自行对齐分配或由外部提供地址的直接内存。
//!
//! # 设计概要（How）
//! - [`Cursor`] 是 position/limit/mark/capacity 状态机，[`Buffer`] trait 在其上一次性提供
//!   `flip`/`clear`/`rewind` 等游标操作；
//! - [`ByteBuffer`] 是根缓冲，切片、副本、只读派生与元素视图共享同一内存块，各自持有独立游标；
//! - [`TypedBuffer<T>`] 以泛型实现六种元素视图，[`Element`] 收敛宽度与位模式差异；
//! - 字节序在创建或 `set_order` 时折算为一个 `swap` 标志，热路径不再对枚举分支；
//! - 直接内存通过显式 `release()` 释放且至多释放一次，之后所有访问返回
//!   `IllegalState("inaccessible")`。
//!
//! # 并发模型（Trade-offs）
//! - 所有缓冲都是单线程、无锁的；共享存储基于 `Rc`，因此不满足 `Send`/`Sync`，
//!   需要跨线程时请先复制为 `bytes::Bytes`；
//! - 别名之间的重叠读写不做检测，这是类型双关视图的预期用法。
//!
//! # 使用方式
//! ```rust
//! use spark_nio::{Buffer, ByteBuffer, ByteOrder};
//!
//! let mut buf = ByteBuffer::allocate(8).expect("分配缓冲");
//! buf.set_order(ByteOrder::LittleEndian);
//! buf.put_i32(0x0102_0304).expect("写入");
//! buf.flip();
//! assert_eq!(buf.get().expect("读取首字节"), 0x04);
//!
//! let ints = buf.as_int_buffer().expect("创建视图");
//! assert_eq!(ints.capacity(), 0, "视图只覆盖 [position, limit)");
//! ```

mod buffer;
mod byte_buffer;
mod config;
mod cursor;
mod element;
mod error;
mod memory;
mod order;
mod storage;
mod typed;

pub use buffer::Buffer;
pub use byte_buffer::ByteBuffer;
pub use config::{BufferAllocator, BufferConfig, DEFAULT_DIRECT_ALIGNMENT};
pub use cursor::Cursor;
pub use element::Element;
pub use error::{BufferError, ErrorKind, Result, codes};
pub use order::ByteOrder;
pub use storage::ReleaseAction;
pub use typed::{
    CharBuffer, DoubleBuffer, FloatBuffer, IntBuffer, LongBuffer, ShortBuffer, TypedBuffer,
};
