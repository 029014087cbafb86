//! Arithmetic engine
//!
//! Evaluates CalcProtocol assignments and maps operation codes to and from
//! their canonical names. Everything here is pure.

/// Operation code for an unrecognized operation
pub const ARITH_UNKNOWN: u32 = 0;
pub const ARITH_ADD: u32 = 1;
pub const ARITH_SUB: u32 = 2;
pub const ARITH_MUL: u32 = 3;
pub const ARITH_DIV: u32 = 4;

/// Evaluate `operation` on two operands.
///
/// Division truncates toward zero. Division by zero and unknown operation
/// codes both yield 0. Overflow wraps.
pub fn calculate(operation: u32, value1: i32, value2: i32) -> i32 {
    match operation {
        ARITH_ADD => value1.wrapping_add(value2),
        ARITH_SUB => value1.wrapping_sub(value2),
        ARITH_MUL => value1.wrapping_mul(value2),
        ARITH_DIV => {
            if value2 == 0 {
                return 0;
            }
            value1.wrapping_div(value2)
        }
        _ => 0,
    }
}

/// Map an operation name to its code, ignoring ASCII case.
/// Unrecognized names map to [`ARITH_UNKNOWN`].
pub fn operation_from_name(name: &str) -> u32 {
    if name.eq_ignore_ascii_case("add") {
        ARITH_ADD
    } else if name.eq_ignore_ascii_case("sub") {
        ARITH_SUB
    } else if name.eq_ignore_ascii_case("mul") {
        ARITH_MUL
    } else if name.eq_ignore_ascii_case("div") {
        ARITH_DIV
    } else {
        ARITH_UNKNOWN
    }
}

/// Canonical lowercase name of an operation code, or `"unknown"`.
pub fn name_from_operation(operation: u32) -> &'static str {
    match operation {
        ARITH_ADD => "add",
        ARITH_SUB => "sub",
        ARITH_MUL => "mul",
        ARITH_DIV => "div",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        assert_eq!(calculate(ARITH_ADD, 5, 3), 8);
        assert_eq!(calculate(ARITH_ADD, -5, 3), -2);
        assert_eq!(calculate(ARITH_SUB, 10, 3), 7);
        assert_eq!(calculate(ARITH_SUB, 3, 10), -7);
        assert_eq!(calculate(ARITH_MUL, 4, 3), 12);
        assert_eq!(calculate(ARITH_MUL, -4, 3), -12);
    }

    #[test]
    fn test_division_truncates() {
        assert_eq!(calculate(ARITH_DIV, 12, 3), 4);
        assert_eq!(calculate(ARITH_DIV, 13, 3), 4);
        assert_eq!(calculate(ARITH_DIV, -13, 3), -4);
        assert_eq!(calculate(ARITH_DIV, 13, -3), -4);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        for x in [0, 1, -1, 10, i32::MAX, i32::MIN] {
            assert_eq!(calculate(ARITH_DIV, x, 0), 0);
        }
    }

    #[test]
    fn test_overflow_wraps() {
        assert_eq!(calculate(ARITH_ADD, i32::MAX, 1), i32::MIN);
        assert_eq!(calculate(ARITH_SUB, i32::MIN, 1), i32::MAX);
        assert_eq!(calculate(ARITH_MUL, i32::MAX, 2), -2);
        assert_eq!(calculate(ARITH_DIV, i32::MIN, -1), i32::MIN);
    }

    #[test]
    fn test_unknown_operation_is_zero() {
        assert_eq!(calculate(ARITH_UNKNOWN, 5, 3), 0);
        assert_eq!(calculate(99, 5, 3), 0);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(operation_from_name("add"), ARITH_ADD);
        assert_eq!(operation_from_name("ADD"), ARITH_ADD);
        assert_eq!(operation_from_name("Sub"), ARITH_SUB);
        assert_eq!(operation_from_name("mUL"), ARITH_MUL);
        assert_eq!(operation_from_name("DIV"), ARITH_DIV);
        assert_eq!(operation_from_name("unknown"), ARITH_UNKNOWN);
        assert_eq!(operation_from_name(""), ARITH_UNKNOWN);
        assert_eq!(operation_from_name("fadd"), ARITH_UNKNOWN);

        assert_eq!(name_from_operation(99), "unknown");
        for name in ["add", "sub", "mul", "div"] {
            assert_eq!(name_from_operation(operation_from_name(name)), name);
            let upper = name.to_uppercase();
            assert_eq!(name_from_operation(operation_from_name(&upper)), name);
        }
    }
}
