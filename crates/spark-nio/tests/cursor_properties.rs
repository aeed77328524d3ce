//! `cursor_properties` 集成测试：以性质测试覆盖游标状态机与基础读写契约。
//!
//! # 测试目标（Why）
//! - 任意 setter 序列之后 `mark ≤ position ≤ limit ≤ capacity` 必须成立；
//! - 最后写入的元素可以通过回退一个单位重新读出；
//! - `compact` 把 `[p, l)` 搬到起始处并重置游标。

use proptest::prelude::*;
use spark_nio::{Buffer, ByteBuffer, Cursor, ErrorKind, IntBuffer};

#[derive(Clone, Debug)]
enum Op {
    Position(usize),
    Limit(usize),
    Mark,
    Reset,
    Clear,
    Flip,
    Rewind,
}

fn op_strategy(max: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..=max + 2).prop_map(Op::Position),
        (0..=max + 2).prop_map(Op::Limit),
        Just(Op::Mark),
        Just(Op::Reset),
        Just(Op::Clear),
        Just(Op::Flip),
        Just(Op::Rewind),
    ]
}

fn assert_invariant(cursor: &Cursor) {
    assert!(cursor.position() <= cursor.limit());
    assert!(cursor.limit() <= cursor.capacity());
    if let Some(mark) = cursor.mark_value() {
        assert!(mark <= cursor.position(), "mark {mark} 超过 position {}", cursor.position());
    }
}

proptest! {
    #[test]
    fn invariant_holds_after_every_mutator(ops in prop::collection::vec(op_strategy(16), 0..64)) {
        let mut cursor = Cursor::new(16);
        for op in ops {
            let before = cursor;
            let outcome = match op {
                Op::Position(p) => cursor.set_position(p),
                Op::Limit(l) => cursor.set_limit(l),
                Op::Mark => {
                    cursor.mark();
                    Ok(())
                }
                Op::Reset => cursor.reset(),
                Op::Clear => {
                    cursor.clear();
                    Ok(())
                }
                Op::Flip => {
                    cursor.flip();
                    Ok(())
                }
                Op::Rewind => {
                    cursor.rewind();
                    Ok(())
                }
            };
            if outcome.is_err() {
                prop_assert_eq!(cursor, before, "失败的 setter 不得修改状态");
            }
            assert_invariant(&cursor);
        }
    }

    #[test]
    fn last_written_byte_round_trips(prefix in prop::collection::vec(any::<u8>(), 0..15), value in any::<u8>()) {
        let mut buf = ByteBuffer::allocate(16).expect("分配缓冲");
        buf.put_slice(&prefix).expect("写入前缀");
        buf.put(value).expect("写入");
        let back = buf.position() - 1;
        buf.set_position(back).expect("回退一个字节");
        prop_assert_eq!(buf.get().expect("读取"), value);
    }

    #[test]
    fn last_written_int_round_trips(values in prop::collection::vec(any::<i32>(), 1..8)) {
        let mut ints = IntBuffer::allocate(8).expect("分配视图");
        ints.put_slice(&values).expect("写入");
        let back = ints.position() - 1;
        ints.set_position(back).expect("回退一个元素");
        prop_assert_eq!(ints.get().expect("读取"), values[values.len() - 1]);
    }

    #[test]
    fn compact_moves_remainder(data in prop::collection::vec(any::<u8>(), 1..32), p_seed in any::<usize>(), l_seed in any::<usize>()) {
        let capacity = data.len();
        let limit = l_seed % (capacity + 1);
        let position = p_seed % (limit + 1);
        let mut buf = ByteBuffer::wrap(data.clone());
        buf.set_limit(limit).expect("limit 在范围内");
        buf.set_position(position).expect("position 在范围内");
        buf.compact().expect("压缩");
        prop_assert_eq!(buf.position(), limit - position);
        prop_assert_eq!(buf.limit(), capacity);
        for i in 0..limit - position {
            prop_assert_eq!(buf.get_at(i).expect("读取"), data[position + i]);
        }
    }
}

#[test]
fn mark_reset_then_clear_discards_mark() {
    let mut buf = ByteBuffer::allocate(8).expect("分配缓冲");
    buf.set_position(2).expect("position 在范围内");
    buf.mark();
    buf.set_position(5).expect("position 在范围内");
    buf.reset().expect("mark 已设置");
    assert_eq!(buf.position(), 2);
    buf.clear();
    let err = buf.reset().expect_err("clear 丢弃 mark");
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[test]
fn flip_discards_mark() {
    let mut buf = ByteBuffer::allocate(4).expect("分配缓冲");
    buf.put(1).expect("写入");
    buf.mark();
    buf.put(2).expect("写入");
    buf.flip();
    assert_eq!((buf.position(), buf.limit()), (0, 2));
    assert!(buf.reset().is_err());
}
