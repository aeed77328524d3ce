//! `direct_storage_contract` 集成测试：聚焦直接内存的分配、释放与可访问性契约。
//!
//! # 测试目标（Why）
//! - 释放后的直接内存若仍可被读取，将导致读取悬垂指针；因此释放后每个访问入口都必须
//!   返回 `IllegalState("inaccessible")`；
//! - 外部内存只在附带释放动作时由本组件释放，且释放动作恰好执行一次；
//! - 释放与可访问性切换需要留下可观测的 `tracing` 事件。

use std::{cell::Cell, ptr::NonNull, rc::Rc};

use bytes::Buf;

use spark_nio::{
    Buffer, BufferAllocator, BufferConfig, ByteBuffer, ByteOrder, ErrorKind, codes,
};
use tracing_test::traced_test;

#[test]
fn direct_buffers_share_the_byte_buffer_contract() {
    let mut buf = ByteBuffer::allocate_direct(16).expect("分配直接缓冲");
    assert!(buf.is_direct());
    assert!(!buf.has_array());
    assert_eq!(buf.order(), ByteOrder::BigEndian);
    buf.put_i64(-7).expect("写入");
    buf.put_f64(0.25).expect("写入");
    buf.flip();
    assert_eq!(buf.get_i64().expect("读取"), -7);
    assert_eq!(buf.get_f64().expect("读取"), 0.25);
    let err = buf.array().expect_err("直接缓冲没有后备数组");
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[test]
fn direct_region_is_aligned() {
    for alignment in [8usize, 32, 4096] {
        let allocator = BufferAllocator::new(BufferConfig {
            direct_alignment: alignment,
            ..BufferConfig::default()
        })
        .expect("配置合法");
        let buf = allocator.allocate_direct(24).expect("分配直接缓冲");
        let address = buf.address().expect("直接缓冲拥有地址");
        assert_eq!(address.as_ptr() as usize % alignment, 0);
    }
}

#[test]
fn release_makes_every_alias_inaccessible() {
    let mut buf = ByteBuffer::allocate_direct(8).expect("分配直接缓冲");
    let mut slice = buf.slice().expect("切片");
    let mut ints = buf.as_int_buffer().expect("创建视图");
    assert!(buf.release());
    assert!(!buf.release(), "重复释放不再执行");

    let errors = [
        buf.get().map(|_| ()),
        buf.get_at(0).map(|_| ()),
        buf.put(1).map(|_| ()),
        buf.compact().map(|_| ()),
        buf.to_bytes().map(|_| ()),
        buf.duplicate().map(|_| ()),
        slice.put_i32(1).map(|_| ()),
        ints.get().map(|_| ()),
        ints.compact().map(|_| ()),
    ];
    for outcome in errors {
        let err = outcome.expect_err("内存已释放");
        assert!(err.is_inaccessible(), "unexpected error: {err}");
        assert_eq!(err.code(), codes::BUFFER_ILLEGAL_STATE);
    }
    assert!(!buf.is_accessible());
    assert!(!ints.is_accessible());
    assert!(buf.address().is_none());
    assert_eq!(buf.position(), 0, "失败的访问不移动游标");
}

#[test]
fn inaccessible_check_precedes_read_only_check() {
    let buf = ByteBuffer::allocate_direct(4).expect("分配直接缓冲");
    let mut view = buf.as_read_only().expect("只读派生");
    buf.set_accessible(false).expect("撤销访问");
    let err = view.put(1).expect_err("不可访问");
    assert!(err.is_inaccessible());
    buf.set_accessible(true).expect("恢复访问");
    assert_eq!(view.put(1).expect_err("只读").kind(), ErrorKind::ReadOnly);
}

#[test]
fn heap_buffers_can_be_revoked_and_restored() {
    let mut buf = ByteBuffer::wrap(vec![1, 2]);
    buf.set_accessible(false).expect("撤销访问");
    assert!(buf.get().expect_err("不可访问").is_inaccessible());
    buf.set_accessible(true).expect("恢复访问");
    assert_eq!(buf.get().expect("读取"), 1);
}

#[test]
fn released_direct_memory_cannot_be_restored() {
    let buf = ByteBuffer::allocate_direct(4).expect("分配直接缓冲");
    buf.release();
    let err = buf.set_accessible(true).expect_err("已释放");
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[test]
fn external_memory_without_release_action_is_never_freed() {
    let mut backing = vec![0u8; 8];
    let address = NonNull::new(backing.as_mut_ptr()).expect("非空指针");
    {
        // SAFETY: `backing` 比缓冲及其所有别名存活更久，期间不被其它代码访问。
        let mut buf = unsafe { ByteBuffer::from_raw_parts(address, backing.len(), None) };
        assert!(buf.is_direct());
        assert_eq!(buf.address(), Some(address));
        buf.put_i32(0x0a0b_0c0d).expect("写入");
        buf.release();
    }
    assert_eq!(&backing[..4], [0x0a, 0x0b, 0x0c, 0x0d]);
}

#[test]
fn external_release_action_runs_once_for_last_alias() {
    let calls = Rc::new(Cell::new(0));
    let mut backing = vec![0u8; 4];
    let address = NonNull::new(backing.as_mut_ptr()).expect("非空指针");
    let observed = Rc::clone(&calls);
    // SAFETY: `backing` 在释放动作运行前保持有效。
    let buf = unsafe {
        ByteBuffer::from_raw_parts(
            address,
            backing.len(),
            Some(Box::new(move |_: NonNull<u8>, len: usize| {
                assert_eq!(len, 4);
                observed.set(observed.get() + 1);
            })),
        )
    };
    let duplicate = buf.duplicate().expect("副本");
    drop(buf);
    assert_eq!(calls.get(), 0, "仍有别名存活");
    drop(duplicate);
    assert_eq!(calls.get(), 1);
}

/// 在 `chunk` 中经由别名释放目标缓冲的数据来源。
struct ReleasingSource {
    alias: ByteBuffer,
    data: &'static [u8],
}

impl Buf for ReleasingSource {
    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn chunk(&self) -> &[u8] {
        self.alias.release();
        &self.data[..self.data.len().min(1)]
    }

    fn advance(&mut self, cnt: usize) {
        self.data = &self.data[cnt..];
    }
}

#[test]
fn put_buf_never_writes_after_source_releases_destination() {
    let released = Rc::new(Cell::new(0));
    let mut backing = vec![0u8; 4];
    let address = NonNull::new(backing.as_mut_ptr()).expect("非空指针");
    {
        let observed = Rc::clone(&released);
        // SAFETY: `backing` 比缓冲及其所有别名存活更久，释放动作只计数。
        let mut buf = unsafe {
            ByteBuffer::from_raw_parts(
                address,
                backing.len(),
                Some(Box::new(move |_: NonNull<u8>, _: usize| {
                    observed.set(observed.get() + 1);
                })),
            )
        };
        let mut source = ReleasingSource {
            alias: buf.duplicate().expect("副本"),
            data: &[0xaa, 0xbb, 0xcc],
        };
        let err = buf.put_buf(&mut source).expect_err("目标已在回调中释放");
        assert!(err.is_inaccessible(), "unexpected error: {err}");
        assert_eq!(buf.position(), 0);
        assert_eq!(released.get(), 1);
    }
    assert_eq!(backing, [0, 0, 0, 0], "释放之后没有任何字节被写入");
}

#[test]
#[traced_test]
fn release_emits_tracing_events() {
    let buf = ByteBuffer::allocate_direct(32).expect("分配直接缓冲");
    assert!(logs_contain("direct buffer allocated"));
    buf.release();
    assert!(logs_contain("direct buffer released"));
    buf.release();
    assert!(logs_contain("direct buffer already released"));
}

#[test]
#[traced_test]
fn accessibility_changes_are_logged() {
    let buf = ByteBuffer::allocate(4).expect("分配缓冲");
    buf.set_accessible(false).expect("撤销访问");
    assert!(logs_contain("buffer accessibility changed"));
}
