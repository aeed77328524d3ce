use crate::{cursor::Cursor, error::Result};

/// `Buffer` 定义了字节缓冲与全部元素视图共享的游标契约。
///
/// # 设计背景（Why）
/// - 字节缓冲与六种元素视图在游标层面的行为完全一致，若各自实现 `flip`/`clear` 等方法，
///   维护成本会随视图数量线性增长；
/// - 以 trait 的默认方法集中实现一次，具体类型只需暴露自身的 [`Cursor`]。
///
/// # 契约说明（What）
/// - 实现者必须保证 `cursor()` 与 `cursor_mut()` 指向同一份游标；
/// - 游标操作只改变状态，不触碰底层内存，因此即便内存已不可访问也不会失败；
/// - `set_position`/`set_limit` 在越界时返回 `IllegalArgument`，`reset` 在无 mark 时返回 `IllegalState`。
///
/// # 使用方式（How）
/// ```rust
/// use spark_nio::{Buffer, ByteBuffer};
///
/// let mut buf = ByteBuffer::allocate(8).expect("分配缓冲");
/// buf.put(1).expect("写入");
/// buf.put(2).expect("写入");
/// buf.flip();
/// assert_eq!((buf.position(), buf.limit()), (0, 2));
/// ```
pub trait Buffer {
    /// 只读访问游标。
    fn cursor(&self) -> &Cursor;

    /// 可变访问游标。
    fn cursor_mut(&mut self) -> &mut Cursor;

    /// 是否为只读缓冲。
    fn is_read_only(&self) -> bool;

    /// 是否由直接内存支撑。
    fn is_direct(&self) -> bool;

    /// 底层内存当前是否可访问。
    fn is_accessible(&self) -> bool;

    fn capacity(&self) -> usize {
        self.cursor().capacity()
    }

    fn position(&self) -> usize {
        self.cursor().position()
    }

    fn set_position(&mut self, position: usize) -> Result<&mut Self>
    where
        Self: Sized,
    {
        self.cursor_mut().set_position(position)?;
        Ok(self)
    }

    fn limit(&self) -> usize {
        self.cursor().limit()
    }

    fn set_limit(&mut self, limit: usize) -> Result<&mut Self>
    where
        Self: Sized,
    {
        self.cursor_mut().set_limit(limit)?;
        Ok(self)
    }

    /// 在当前位置设置 mark。
    fn mark(&mut self) -> &mut Self
    where
        Self: Sized,
    {
        self.cursor_mut().mark();
        self
    }

    fn reset(&mut self) -> Result<&mut Self>
    where
        Self: Sized,
    {
        self.cursor_mut().reset()?;
        Ok(self)
    }

    fn clear(&mut self) -> &mut Self
    where
        Self: Sized,
    {
        self.cursor_mut().clear();
        self
    }

    fn flip(&mut self) -> &mut Self
    where
        Self: Sized,
    {
        self.cursor_mut().flip();
        self
    }

    fn rewind(&mut self) -> &mut Self
    where
        Self: Sized,
    {
        self.cursor_mut().rewind();
        self
    }

    fn remaining(&self) -> usize {
        self.cursor().remaining()
    }

    fn has_remaining(&self) -> bool {
        self.cursor().has_remaining()
    }
}

/// 按 `h = 31 * h + e` 自 limit-1 向 position 折叠剩余元素的散列投影。
pub(crate) fn hash_terms(terms: impl DoubleEndedIterator<Item = i32>) -> i32 {
    terms
        .rev()
        .fold(1i32, |hash, term| hash.wrapping_mul(31).wrapping_add(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_folds_from_the_back() {
        assert_eq!(hash_terms(core::iter::empty()), 1);
        // h = 31 * (31 * 1 + 2) + 1
        assert_eq!(hash_terms([1, 2].into_iter()), 31 * (31 + 2) + 1);
    }
}
