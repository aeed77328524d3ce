use core::fmt;

use serde::Deserialize;

/// 多字节元素的字节序。
///
/// # 契约说明（What）
/// - `BigEndian`：起始字节为最高有效字节；`LittleEndian`：起始字节为最低有效字节；
/// - 浮点数以 IEEE-754 原始位模式按同一规则搬运。
///
/// # 实现提示（How）
/// - 缓冲在构造或调用 `set_order` 时把字节序折算为一个 `swap` 布尔量（与本机序是否不同），
///   热路径上只判断该布尔量，不再对枚举做分支。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// 新建字节缓冲的默认字节序。
    #[default]
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// 当前平台的本机字节序。
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// 按该字节序访问时是否需要翻转本机字节。
    pub(crate) fn needs_swap(self) -> bool {
        self != ByteOrder::native()
    }

    /// 由 `swap` 标志还原字节序。
    pub(crate) fn from_swap(swap: bool) -> Self {
        match (ByteOrder::native(), swap) {
            (order, false) => order,
            (ByteOrder::BigEndian, true) => ByteOrder::LittleEndian,
            (ByteOrder::LittleEndian, true) => ByteOrder::BigEndian,
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ByteOrder::BigEndian => "BIG_ENDIAN",
            ByteOrder::LittleEndian => "LITTLE_ENDIAN",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_flag_round_trips() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            assert_eq!(ByteOrder::from_swap(order.needs_swap()), order);
        }
        assert!(!ByteOrder::native().needs_swap());
    }
}
