/// Elementwise kernels shared by all column backends
///
/// Kernels work on pairs of [`Value`]s. The caller supplies the pairs
/// (column/column zipped, or column/scalar broadcast); the kernel decides the
/// result dtype for the whole column before computing any element, so a
/// result column always has a single dtype.

use crate::error::{FrameError, Result};
use crate::value::{DType, Value};

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::TrueDiv => "/",
            ArithOp::FloorDiv => "//",
            ArithOp::Mod => "%",
            ArithOp::Pow => "**",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The operator that gives the same answer with the operands swapped,
    /// so `s < col` can be evaluated as `col > s`.
    pub fn flipped(&self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Boolean bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

impl LogicalOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "&",
            LogicalOp::Or => "|",
            LogicalOp::Xor => "^",
        }
    }
}

/// Sign convention of the `%` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModConvention {
    /// Result has the sign of the divisor (`-7 % 3 == 2`)
    Floored,
    /// Result has the sign of the dividend (`-7 % 3 == -1`)
    Truncated,
}

/// Apply `op` to every pair, returning the result dtype and values.
pub fn arith<'a, I>(
    op: ArithOp,
    modulo: ModConvention,
    left: DType,
    right: DType,
    pairs: I,
) -> Result<(DType, Vec<Value>)>
where
    I: Iterator<Item = (&'a Value, &'a Value)>,
{
    if left == DType::Str || right == DType::Str {
        if op == ArithOp::Add && left == DType::Str && right == DType::Str {
            let out = pairs
                .map(|(a, b)| match (a, b) {
                    (Value::Str(a), Value::Str(b)) => Value::Str(format!("{}{}", a, b)),
                    _ => unreachable!("string columns hold only strings"),
                })
                .collect();
            return Ok((DType::Str, out));
        }
        return Err(FrameError::TypeMismatch {
            op: op.symbol(),
            left,
            right,
        });
    }

    let pairs: Vec<(&Value, &Value)> = pairs.collect();
    let float_result = match op {
        ArithOp::TrueDiv => true,
        _ if left == DType::Float || right == DType::Float => true,
        ArithOp::FloorDiv | ArithOp::Mod => pairs.iter().any(|(_, b)| b.as_i64() == Some(0)),
        ArithOp::Pow => pairs.iter().any(|(_, b)| b.as_i64().is_some_and(|e| e < 0)),
        _ => false,
    };

    if float_result {
        let out = pairs
            .into_iter()
            .map(|(a, b)| {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                Value::Float(float_op(op, modulo, a, b))
            })
            .collect();
        Ok((DType::Float, out))
    } else {
        let out = pairs
            .into_iter()
            .map(|(a, b)| {
                let a = a.as_i64().unwrap_or(0);
                let b = b.as_i64().unwrap_or(0);
                Value::Int(int_op(op, modulo, a, b))
            })
            .collect();
        Ok((DType::Int, out))
    }
}

fn int_op(op: ArithOp, modulo: ModConvention, a: i64, b: i64) -> i64 {
    match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::FloorDiv => {
            let q = a.wrapping_div(b);
            if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        ArithOp::Mod => {
            let r = a.wrapping_rem(b);
            match modulo {
                ModConvention::Floored if r != 0 && ((r < 0) != (b < 0)) => r + b,
                _ => r,
            }
        }
        ArithOp::Pow => a.wrapping_pow(b.clamp(0, u32::MAX as i64) as u32),
        ArithOp::TrueDiv => unreachable!("true division always produces floats"),
    }
}

fn float_op(op: ArithOp, modulo: ModConvention, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::TrueDiv => a / b,
        ArithOp::FloorDiv => floored_divmod(a, b).0,
        ArithOp::Mod => match modulo {
            ModConvention::Floored => floored_divmod(a, b).1,
            ModConvention::Truncated => a % b,
        },
        ArithOp::Pow => a.powf(b),
    }
}

/// Floor division and floored modulo of two floats, with the rounding
/// corrections that keep `div * b + mod == a` exact for representable
/// results.
fn floored_divmod(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        return (a / b, f64::NAN);
    }
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 {
        if (b < 0.0) != (rem < 0.0) {
            rem += b;
            div -= 1.0;
        }
    } else {
        rem = 0.0_f64.copysign(b);
    }
    let floordiv = if div != 0.0 {
        let mut floored = div.floor();
        if div - floored > 0.5 {
            floored += 1.0;
        }
        floored
    } else {
        0.0_f64.copysign(a / b)
    };
    (floordiv, rem)
}

/// Compare every pair, producing booleans.
pub fn compare<'a, I>(op: CompareOp, left: DType, right: DType, pairs: I) -> Result<Vec<Value>>
where
    I: Iterator<Item = (&'a Value, &'a Value)>,
{
    let mixed_strings = (left == DType::Str) != (right == DType::Str);
    if mixed_strings {
        return match op {
            CompareOp::Eq => Ok(pairs.map(|_| Value::Bool(false)).collect()),
            CompareOp::Ne => Ok(pairs.map(|_| Value::Bool(true)).collect()),
            _ => Err(FrameError::TypeMismatch {
                op: op.symbol(),
                left,
                right,
            }),
        };
    }
    Ok(pairs.map(|(a, b)| Value::Bool(compare_pair(op, a, b))).collect())
}

fn compare_pair(op: CompareOp, a: &Value, b: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (a, b) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b)
        }
    };
    match ordering {
        // NaN compares unequal to everything
        None => op == CompareOp::Ne,
        Some(ord) => match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        },
    }
}

/// Boolean `& | ^` over every pair. Both sides must be boolean.
pub fn logical<'a, I>(op: LogicalOp, left: DType, right: DType, pairs: I) -> Result<Vec<Value>>
where
    I: Iterator<Item = (&'a Value, &'a Value)>,
{
    if left != DType::Bool || right != DType::Bool {
        return Err(FrameError::TypeMismatch {
            op: op.symbol(),
            left,
            right,
        });
    }
    Ok(pairs
        .map(|(a, b)| {
            let a = a.as_bool().unwrap_or(false);
            let b = b.as_bool().unwrap_or(false);
            Value::Bool(match op {
                LogicalOp::And => a & b,
                LogicalOp::Or => a | b,
                LogicalOp::Xor => a ^ b,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn run(op: ArithOp, modulo: ModConvention, a: &[Value], b: &[Value]) -> (DType, Vec<Value>) {
        arith(op, modulo, a[0].dtype(), b[0].dtype(), a.iter().zip(b.iter())).unwrap()
    }

    #[test]
    fn test_int_floor_div_rounds_down() {
        let a = ints(&[7, -7, 7, -7]);
        let b = ints(&[2, 2, -2, -2]);
        let (dtype, out) = run(ArithOp::FloorDiv, ModConvention::Floored, &a, &b);
        assert_eq!(dtype, DType::Int);
        assert_eq!(out, ints(&[3, -4, -4, 3]));
    }

    #[test]
    fn test_mod_conventions() {
        let a = ints(&[-7, 7]);
        let b = ints(&[3, -3]);
        let (_, floored) = run(ArithOp::Mod, ModConvention::Floored, &a, &b);
        assert_eq!(floored, ints(&[2, -2]));
        let (_, truncated) = run(ArithOp::Mod, ModConvention::Truncated, &a, &b);
        assert_eq!(truncated, ints(&[-1, 1]));
    }

    #[test]
    fn test_float_floor_div_and_mod() {
        let a = vec![Value::Float(-7.5), Value::Float(7.5)];
        let b = vec![Value::Float(2.0), Value::Float(2.0)];
        let (_, div) = run(ArithOp::FloorDiv, ModConvention::Floored, &a, &b);
        assert_eq!(div, vec![Value::Float(-4.0), Value::Float(3.0)]);
        let (_, rem) = run(ArithOp::Mod, ModConvention::Floored, &a, &b);
        assert_eq!(rem, vec![Value::Float(0.5), Value::Float(1.5)]);
    }

    #[test]
    fn test_true_division_is_float() {
        let (dtype, out) = run(ArithOp::TrueDiv, ModConvention::Floored, &ints(&[1, 4]), &ints(&[2, 5]));
        assert_eq!(dtype, DType::Float);
        assert_eq!(out, vec![Value::Float(0.5), Value::Float(0.8)]);
    }

    #[test]
    fn test_int_zero_divisor_promotes_to_float() {
        let (dtype, out) = run(ArithOp::FloorDiv, ModConvention::Floored, &ints(&[1, 4]), &ints(&[0, 2]));
        assert_eq!(dtype, DType::Float);
        assert_eq!(out[0], Value::Float(f64::INFINITY));
        assert_eq!(out[1], Value::Float(2.0));

        let (_, rem) = run(ArithOp::Mod, ModConvention::Floored, &ints(&[1]), &ints(&[0]));
        assert!(rem[0].as_f64().unwrap().is_nan());
    }

    #[test]
    fn test_pow_negative_exponent_promotes() {
        let (dtype, out) = run(ArithOp::Pow, ModConvention::Floored, &ints(&[2, 4]), &ints(&[-1, 2]));
        assert_eq!(dtype, DType::Float);
        assert_eq!(out, vec![Value::Float(0.5), Value::Float(16.0)]);

        let (dtype, out) = run(ArithOp::Pow, ModConvention::Floored, &ints(&[2, 4]), &ints(&[3, 2]));
        assert_eq!(dtype, DType::Int);
        assert_eq!(out, ints(&[8, 16]));
    }

    #[test]
    fn test_string_arithmetic() {
        let a = vec![Value::from("ab")];
        let b = vec![Value::from("cd")];
        let (dtype, out) = run(ArithOp::Add, ModConvention::Floored, &a, &b);
        assert_eq!(dtype, DType::Str);
        assert_eq!(out, vec![Value::from("abcd")]);

        let err = arith(ArithOp::Mul, ModConvention::Floored, DType::Str, DType::Int, a.iter().zip(ints(&[2]).iter()));
        assert!(matches!(err, Err(FrameError::TypeMismatch { op: "*", .. })));
    }

    #[test]
    fn test_compare_mixed_strings() {
        let a = vec![Value::from("1")];
        let b = ints(&[1]);
        let eq = compare(CompareOp::Eq, DType::Str, DType::Int, a.iter().zip(b.iter())).unwrap();
        assert_eq!(eq, vec![Value::Bool(false)]);
        assert!(compare(CompareOp::Lt, DType::Str, DType::Int, a.iter().zip(b.iter())).is_err());
    }

    #[test]
    fn test_compare_nan() {
        let a = vec![Value::Float(f64::NAN)];
        let ne = compare(CompareOp::Ne, DType::Float, DType::Float, a.iter().zip(a.iter())).unwrap();
        let eq = compare(CompareOp::Eq, DType::Float, DType::Float, a.iter().zip(a.iter())).unwrap();
        assert_eq!(ne, vec![Value::Bool(true)]);
        assert_eq!(eq, vec![Value::Bool(false)]);
    }

    #[test]
    fn test_logical_requires_bools() {
        let a = vec![Value::Bool(true), Value::Bool(false)];
        let b = vec![Value::Bool(true), Value::Bool(true)];
        let out = logical(LogicalOp::Xor, DType::Bool, DType::Bool, a.iter().zip(b.iter())).unwrap();
        assert_eq!(out, vec![Value::Bool(false), Value::Bool(true)]);

        let n = ints(&[1, 0]);
        assert!(logical(LogicalOp::And, DType::Int, DType::Bool, n.iter().zip(b.iter())).is_err());
    }
}
