// Lua 5.3 arithmetic, bitwise, comparison, length and concatenation
// semantics for raw values (no metamethods)
use super::{LuaString, LuaValue};
use crate::lua_vm::{LuaError, LuaResult};

/// Operator of an arithmetic or bitwise instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
}

impl ArithOp {
    fn is_bitwise(self) -> bool {
        matches!(
            self,
            ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr | ArithOp::BNot
        )
    }
}

/// Apply `op` to `a` and `b`. Unary operators ignore `b`.
pub fn arith(op: ArithOp, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
    if op.is_bitwise() {
        return bitwise(op, a, b);
    }

    let (x, y) = match (a.to_numeric(), b.to_numeric()) {
        (Some(x), Some(y)) => (x, y),
        (None, _) => return Err(arith_error(a)),
        (_, None) => return Err(arith_error(b)),
    };

    // integer results for + - * % // unm when both operands are integers
    if let (LuaValue::Integer(i), LuaValue::Integer(j)) = (&x, &y) {
        let (i, j) = (*i, *j);
        let int_result = match op {
            ArithOp::Add => Some(i.wrapping_add(j)),
            ArithOp::Sub => Some(i.wrapping_sub(j)),
            ArithOp::Mul => Some(i.wrapping_mul(j)),
            ArithOp::Mod => Some(int_mod(i, j)?),
            ArithOp::IDiv => Some(int_idiv(i, j)?),
            ArithOp::Unm => Some(i.wrapping_neg()),
            _ => None,
        };
        if let Some(r) = int_result {
            return Ok(LuaValue::integer(r));
        }
    }

    let (fx, fy) = (x.as_float().unwrap_or(0.0), y.as_float().unwrap_or(0.0));
    let r = match op {
        ArithOp::Add => fx + fy,
        ArithOp::Sub => fx - fy,
        ArithOp::Mul => fx * fy,
        ArithOp::Mod => float_mod(fx, fy),
        ArithOp::Pow => fx.powf(fy),
        ArithOp::Div => fx / fy,
        ArithOp::IDiv => (fx / fy).floor(),
        ArithOp::Unm => -fx,
        _ => unreachable!("bitwise operators are handled above"),
    };
    Ok(LuaValue::float(r))
}

fn bitwise(op: ArithOp, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
    let i = a.to_integer().ok_or_else(|| bitwise_error(a, b))?;
    let j = if op == ArithOp::BNot {
        0
    } else {
        b.to_integer().ok_or_else(|| bitwise_error(b, a))?
    };
    let r = match op {
        ArithOp::BAnd => i & j,
        ArithOp::BOr => i | j,
        ArithOp::BXor => i ^ j,
        ArithOp::Shl => shift_left(i, j),
        ArithOp::Shr => shift_left(i, j.wrapping_neg()),
        ArithOp::BNot => !i,
        _ => unreachable!("only bitwise operators reach here"),
    };
    Ok(LuaValue::integer(r))
}

/// Floored modulo
fn int_mod(a: i64, b: i64) -> LuaResult<i64> {
    if b == 0 {
        return Err(LuaError::runtime("attempt to perform 'n%0'"));
    }
    let r = a.wrapping_rem(b);
    Ok(if r != 0 && (r ^ b) < 0 { r + b } else { r })
}

/// Floored division
fn int_idiv(a: i64, b: i64) -> LuaResult<i64> {
    if b == 0 {
        return Err(LuaError::runtime("attempt to perform 'n//0'"));
    }
    let q = a.wrapping_div(b);
    Ok(if a.wrapping_rem(b) != 0 && (a ^ b) < 0 { q - 1 } else { q })
}

fn float_mod(a: f64, b: f64) -> f64 {
    let m = a % b;
    if m != 0.0 && (m > 0.0) != (b > 0.0) { m + b } else { m }
}

/// Logical shift; shifts of 64 bits or more produce 0
fn shift_left(x: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((x as u64) << n) as i64
    } else {
        ((x as u64) >> n.unsigned_abs()) as i64
    }
}

fn arith_error(bad: &LuaValue) -> LuaError {
    LuaError::runtime(format!(
        "attempt to perform arithmetic on a {} value",
        bad.type_name()
    ))
}

fn bitwise_error(bad: &LuaValue, other: &LuaValue) -> LuaError {
    if bad.to_numeric().is_some() && other.to_numeric().is_some() {
        LuaError::runtime("number has no integer representation")
    } else {
        let culprit = if bad.to_numeric().is_none() { bad } else { other };
        LuaError::runtime(format!(
            "attempt to perform bitwise operation on a {} value",
            culprit.type_name()
        ))
    }
}

// ============ Comparison ============

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

pub fn less_than(a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Integer(i), LuaValue::Integer(j)) => Ok(i < j),
        (LuaValue::Float(x), LuaValue::Float(y)) => Ok(x < y),
        (LuaValue::Integer(i), LuaValue::Float(f)) => Ok(lt_int_float(*i, *f)),
        (LuaValue::Float(f), LuaValue::Integer(i)) => Ok(lt_float_int(*f, *i)),
        (LuaValue::String(x), LuaValue::String(y)) => Ok(x.as_bytes() < y.as_bytes()),
        _ => Err(compare_error(a, b)),
    }
}

pub fn less_equal(a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Integer(i), LuaValue::Integer(j)) => Ok(i <= j),
        (LuaValue::Float(x), LuaValue::Float(y)) => Ok(x <= y),
        (LuaValue::Integer(i), LuaValue::Float(f)) => Ok(le_int_float(*i, *f)),
        (LuaValue::Float(f), LuaValue::Integer(i)) => Ok(le_float_int(*f, *i)),
        (LuaValue::String(x), LuaValue::String(y)) => Ok(x.as_bytes() <= y.as_bytes()),
        _ => Err(compare_error(a, b)),
    }
}

// i < f  <=>  i < ceil(f)
fn lt_int_float(i: i64, f: f64) -> bool {
    if f.is_nan() || f < -TWO_POW_63 {
        false
    } else if f >= TWO_POW_63 {
        true
    } else {
        i < f.ceil() as i64
    }
}

// i <= f  <=>  i <= floor(f)
fn le_int_float(i: i64, f: f64) -> bool {
    if f.is_nan() || f < -TWO_POW_63 {
        false
    } else if f >= TWO_POW_63 {
        true
    } else {
        i <= f.floor() as i64
    }
}

// f < i  <=>  floor(f) < i
fn lt_float_int(f: f64, i: i64) -> bool {
    if f.is_nan() || f >= TWO_POW_63 {
        false
    } else if f < -TWO_POW_63 {
        true
    } else {
        (f.floor() as i64) < i
    }
}

// f <= i  <=>  ceil(f) <= i
fn le_float_int(f: f64, i: i64) -> bool {
    if f.is_nan() || f >= TWO_POW_63 {
        false
    } else if f < -TWO_POW_63 {
        true
    } else {
        (f.ceil() as i64) <= i
    }
}

fn compare_error(a: &LuaValue, b: &LuaValue) -> LuaError {
    let (ta, tb) = (a.type_name(), b.type_name());
    if ta == tb {
        LuaError::runtime(format!("attempt to compare two {} values", ta))
    } else {
        LuaError::runtime(format!("attempt to compare {} with {}", ta, tb))
    }
}

// ============ Length and concatenation ============

/// Primitive `#` operator
pub fn objlen(v: &LuaValue) -> LuaResult<LuaValue> {
    match v {
        LuaValue::String(s) => Ok(LuaValue::integer(s.len() as i64)),
        LuaValue::Table(t) => Ok(LuaValue::integer(t.borrow().len() as i64)),
        _ => Err(LuaError::runtime(format!(
            "attempt to get length of a {} value",
            v.type_name()
        ))),
    }
}

/// Concatenate strings and numbers left to right
pub fn concat(values: &[LuaValue]) -> LuaResult<LuaValue> {
    let mut buf = Vec::new();
    for v in values {
        match v {
            LuaValue::String(s) => buf.extend_from_slice(s.as_bytes()),
            LuaValue::Integer(_) | LuaValue::Float(_) => {
                buf.extend_from_slice(v.to_string().as_bytes())
            }
            _ => {
                return Err(LuaError::runtime(format!(
                    "attempt to concatenate a {} value",
                    v.type_name()
                )));
            }
        }
    }
    Ok(LuaValue::String(LuaString::from(buf)))
}
