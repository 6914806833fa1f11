//! Arithmetic, logical, shift and compare operations.
//!
//! Every function takes raw 16-bit register patterns and returns the
//! truncated result together with the flags it produces. Nothing here
//! touches CPU state.

use crate::cpu::registers::Flags;

/// Interpret a 16-bit pattern as a two's-complement integer.
#[inline]
pub fn sign_extend(value: u16) -> i32 {
    value as i16 as i32
}

fn arithmetic_result(exact: i32) -> (u16, Flags) {
    let result = exact as u16;
    let overflow = exact < i16::MIN as i32 || exact > i16::MAX as i32;
    (result, Flags::from_result(result, overflow))
}

/// ADDA: signed addition. OF is set when the sum leaves [-32768, 32767].
pub fn add_arithmetic(a: u16, b: u16) -> (u16, Flags) {
    arithmetic_result(sign_extend(a) + sign_extend(b))
}

/// SUBA: signed subtraction.
pub fn sub_arithmetic(a: u16, b: u16) -> (u16, Flags) {
    arithmetic_result(sign_extend(a) - sign_extend(b))
}

/// ADDL: unsigned addition. OF is the carry out of bit 15.
pub fn add_logical(a: u16, b: u16) -> (u16, Flags) {
    let (result, carry) = a.overflowing_add(b);
    (result, Flags::from_result(result, carry))
}

/// SUBL: unsigned subtraction. OF is the borrow.
pub fn sub_logical(a: u16, b: u16) -> (u16, Flags) {
    let (result, borrow) = a.overflowing_sub(b);
    (result, Flags::from_result(result, borrow))
}

/// AND, OR and XOR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

/// Bitwise combine. OF is always cleared.
pub fn bitwise(op: BitOp, a: u16, b: u16) -> (u16, Flags) {
    let result = match op {
        BitOp::And => a & b,
        BitOp::Or => a | b,
        BitOp::Xor => a ^ b,
    };
    (result, Flags::from_result(result, false))
}

/// CPA: signed compare.
pub fn compare_arithmetic(a: u16, b: u16) -> Flags {
    Flags {
        of: false,
        sf: sign_extend(a) < sign_extend(b),
        zf: a == b,
    }
}

/// CPL: unsigned compare.
pub fn compare_logical(a: u16, b: u16) -> Flags {
    Flags {
        of: false,
        sf: a < b,
        zf: a == b,
    }
}

/// Test bit `n` of `value`; positions outside 0..16 read as clear.
fn bit(value: u16, n: i32) -> bool {
    (0..16).contains(&n) && (value >> n) & 1 != 0
}

fn shl(value: u16, count: u16) -> u16 {
    if count >= 16 { 0 } else { value << count }
}

fn shr(value: u16, count: u16) -> u16 {
    if count >= 16 { 0 } else { value >> count }
}

/// SLA. OF is the last bit shifted out of the top.
pub fn shift_left_arithmetic(value: u16, count: u16) -> (u16, Flags) {
    let overflow = count != 0 && bit(value, 15 - count as i32);
    let result = shl(value, count);
    (result, Flags::from_result(result, overflow))
}

/// SRA. OF is the last bit shifted out of the bottom.
///
/// The register is shifted as an unsigned value: bit 15 is not
/// replicated, so SRA and SRL produce the same result word.
pub fn shift_right_arithmetic(value: u16, count: u16) -> (u16, Flags) {
    let overflow = count != 0 && bit(value, count as i32 - 1);
    let result = shr(value, count);
    (result, Flags::from_result(result, overflow))
}

/// SLL. OF is the sign bit before the shift.
pub fn shift_left_logical(value: u16, count: u16) -> (u16, Flags) {
    let overflow = value & 0x8000 != 0;
    let result = shl(value, count);
    (result, Flags::from_result(result, overflow))
}

/// SRL. OF is bit 0 before the shift.
pub fn shift_right_logical(value: u16, count: u16) -> (u16, Flags) {
    let overflow = value & 1 != 0;
    let result = shr(value, count);
    (result, Flags::from_result(result, overflow))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(of: bool, sf: bool, zf: bool) -> Flags {
        Flags { of, sf, zf }
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x0000), 0);
        assert_eq!(sign_extend(0x7fff), 32767);
        assert_eq!(sign_extend(0x8000), -32768);
        assert_eq!(sign_extend(0xffff), -1);
    }

    #[test]
    fn test_add_arithmetic() {
        assert_eq!(add_arithmetic(1, 2), (3, flags(false, false, false)));
        assert_eq!(add_arithmetic(0xffff, 1), (0, flags(false, false, true)));
        // 32767 + 1 overflows into the sign bit
        assert_eq!(add_arithmetic(0x7fff, 1), (0x8000, flags(true, true, false)));
        // -32768 + -1
        assert_eq!(add_arithmetic(0x8000, 0xffff), (0x7fff, flags(true, false, false)));
    }

    #[test]
    fn test_sub_arithmetic() {
        assert_eq!(sub_arithmetic(5, 7), (0xfffe, flags(false, true, false)));
        assert_eq!(sub_arithmetic(0x8000, 1), (0x7fff, flags(true, false, false)));
        assert_eq!(sub_arithmetic(0x1234, 0x1234), (0, flags(false, false, true)));
    }

    #[test]
    fn test_add_logical() {
        assert_eq!(add_logical(0xffff, 1), (0, flags(true, false, true)));
        assert_eq!(add_logical(0x7fff, 1), (0x8000, flags(false, true, false)));
    }

    #[test]
    fn test_sub_logical() {
        assert_eq!(sub_logical(1, 2), (0xffff, flags(true, true, false)));
        assert_eq!(sub_logical(2, 2), (0, flags(false, false, true)));
        assert_eq!(sub_logical(0x8000, 1), (0x7fff, flags(false, false, false)));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(bitwise(BitOp::And, 0xff00, 0x0ff0), (0x0f00, flags(false, false, false)));
        assert_eq!(bitwise(BitOp::Or, 0x8000, 0x0001), (0x8001, flags(false, true, false)));
        assert_eq!(bitwise(BitOp::Xor, 0xaaaa, 0xaaaa), (0, flags(false, false, true)));
    }

    #[test]
    fn test_compare() {
        // -1 < 1 signed, but 0xffff > 1 unsigned
        assert_eq!(compare_arithmetic(0xffff, 1), flags(false, true, false));
        assert_eq!(compare_logical(0xffff, 1), flags(false, false, false));
        assert_eq!(compare_arithmetic(3, 3), flags(false, false, true));
        assert_eq!(compare_logical(1, 0xffff), flags(false, true, false));
    }

    #[test]
    fn test_shift_left_arithmetic() {
        // bit 14 is the last one out when shifting by 1
        assert_eq!(shift_left_arithmetic(0x4001, 1), (0x8002, flags(true, true, false)));
        assert_eq!(shift_left_arithmetic(0x0001, 4), (0x0010, flags(false, false, false)));
        assert_eq!(shift_left_arithmetic(0x8000, 0), (0x8000, flags(false, true, false)));
        assert_eq!(shift_left_arithmetic(0xffff, 16), (0, flags(false, false, true)));
    }

    #[test]
    fn test_shift_right_arithmetic() {
        assert_eq!(shift_right_arithmetic(0x0003, 1), (0x0001, flags(true, false, false)));
        // no sign replication
        assert_eq!(shift_right_arithmetic(0x8000, 1), (0x4000, flags(false, false, false)));
        assert_eq!(shift_right_arithmetic(0x0004, 0), (0x0004, flags(false, false, false)));
    }

    #[test]
    fn test_shift_logical() {
        assert_eq!(shift_left_logical(0x8001, 1), (0x0002, flags(true, false, false)));
        assert_eq!(shift_left_logical(0x4000, 1), (0x8000, flags(false, true, false)));
        assert_eq!(shift_right_logical(0x0001, 1), (0, flags(true, false, true)));
        // OF comes from bit 0 regardless of the count
        assert_eq!(shift_right_logical(0x0002, 2), (0, flags(false, false, true)));
        assert_eq!(shift_right_logical(0xffff, 20), (0, flags(true, false, true)));
    }
}
