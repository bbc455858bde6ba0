use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::{CFunction, LuaFunction, LuaTable};

/// Immutable Lua string. Lua strings are byte strings and need not be UTF-8;
/// cloning shares the payload.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LuaString(Rc<[u8]>);

impl LuaString {
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The payload as text, if it is valid UTF-8
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&[u8]> for LuaString {
    fn from(bytes: &[u8]) -> Self {
        LuaString(Rc::from(bytes))
    }
}

impl From<Vec<u8>> for LuaString {
    fn from(bytes: Vec<u8>) -> Self {
        LuaString(Rc::from(bytes))
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::from(s.as_bytes())
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString::from(s.into_bytes())
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

pub type TableRef = Rc<RefCell<LuaTable>>;
pub type FunctionRef = Rc<LuaFunction>;

/// A Lua 5.3 value
///
/// Boxed values (strings, tables, closures) are reference counted; identity
/// of tables and functions is pointer identity.
#[derive(Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(LuaString),
    Table(TableRef),
    Function(FunctionRef),
}

impl LuaValue {
    // ============ Constructors ============

    #[inline(always)]
    pub const fn nil() -> Self {
        LuaValue::Nil
    }

    #[inline(always)]
    pub const fn boolean(b: bool) -> Self {
        LuaValue::Boolean(b)
    }

    #[inline(always)]
    pub const fn integer(i: i64) -> Self {
        LuaValue::Integer(i)
    }

    #[inline(always)]
    pub const fn float(f: f64) -> Self {
        LuaValue::Float(f)
    }

    pub fn string(s: impl Into<LuaString>) -> Self {
        LuaValue::String(s.into())
    }

    pub fn table(table: LuaTable) -> Self {
        LuaValue::Table(Rc::new(RefCell::new(table)))
    }

    pub fn function(func: LuaFunction) -> Self {
        LuaValue::Function(Rc::new(func))
    }

    pub fn cfunction(f: CFunction) -> Self {
        LuaValue::function(LuaFunction::native(f))
    }

    // ============ Type queries ============

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Integer(_) | LuaValue::Float(_) => "number",
            LuaValue::String(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) => "function",
        }
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    #[inline(always)]
    pub fn is_number(&self) -> bool {
        matches!(self, LuaValue::Integer(_) | LuaValue::Float(_))
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        matches!(self, LuaValue::Function(_))
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    #[inline(always)]
    pub fn is_falsy(&self) -> bool {
        matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    #[inline(always)]
    pub fn to_boolean(&self) -> bool {
        !self.is_falsy()
    }

    // ============ Accessors (no coercion) ============

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            LuaValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Any number as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            LuaValue::Float(f) => Some(*f),
            LuaValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String payload as text; `None` for non-strings and non-UTF-8 strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::String(s) => s.to_str(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            LuaValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            LuaValue::Function(f) => Some(f),
            _ => None,
        }
    }

    // ============ Conversions (Lua coercion rules) ============

    /// Number conversion with string coercion, preserving integer-ness.
    pub fn to_numeric(&self) -> Option<LuaValue> {
        match self {
            LuaValue::Integer(_) | LuaValue::Float(_) => Some(self.clone()),
            LuaValue::String(s) => str_to_number(s.to_str()?),
            _ => None,
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        self.to_numeric().and_then(|v| v.as_float())
    }

    /// Integer conversion: floats must have an exact integral value.
    pub fn to_integer(&self) -> Option<i64> {
        match self.to_numeric()? {
            LuaValue::Integer(i) => Some(i),
            LuaValue::Float(f) => float_to_integer(f),
            _ => None,
        }
    }

    fn identity(&self) -> usize {
        match self {
            LuaValue::Table(t) => Rc::as_ptr(t) as *const () as usize,
            LuaValue::Function(f) => Rc::as_ptr(f) as *const () as usize,
            _ => 0,
        }
    }
}

/// Exact float → integer conversion (Lua's `luaV_flttointns` with F2Ieq).
pub fn float_to_integer(f: f64) -> Option<i64> {
    // -2^63 is representable; 2^63 is not
    if f.floor() == f && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a numeric string the way Lua's `tonumber` does.
pub fn str_to_number(s: &str) -> Option<LuaValue> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (neg, body) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        // hexadecimal integers wrap around
        let mut n: i64 = 0;
        for b in hex.bytes() {
            let d = (b as char).to_digit(16)? as i64;
            n = n.wrapping_mul(16).wrapping_add(d);
        }
        return Some(LuaValue::Integer(if neg { n.wrapping_neg() } else { n }));
    }
    if !body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    if body.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = s.parse::<i64>() {
            return Some(LuaValue::Integer(i));
        }
    }
    s.parse::<f64>().ok().map(LuaValue::Float)
}

/// `%.14g`, plus a trailing `.0` when the result would read as an integer.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    const PRECISION: i32 = 14;
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    let mut out = if exp < -4 || exp >= PRECISION {
        let mantissa = strip_fraction_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, f)).to_string()
    };

    if out.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        out.push_str(".0");
    }
    out
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Raw equality: numbers compare by mathematical value, strings by content,
/// tables and functions by identity.
impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(i), LuaValue::Float(f)) | (LuaValue::Float(f), LuaValue::Integer(i)) => {
                float_to_integer(*f) == Some(*i)
            }
            (LuaValue::String(a), LuaValue::String(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Function(a), LuaValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// NaN is rejected as a table key before it can reach a hash map.
impl Eq for LuaValue {}

impl Hash for LuaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LuaValue::Nil => state.write_u8(0),
            LuaValue::Boolean(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            LuaValue::Integer(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            LuaValue::Float(f) => match float_to_integer(*f) {
                Some(i) => {
                    state.write_u8(2);
                    i.hash(state);
                }
                None => {
                    state.write_u8(3);
                    f.to_bits().hash(state);
                }
            },
            LuaValue::String(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            LuaValue::Table(_) | LuaValue::Function(_) => {
                state.write_u8(5);
                self.identity().hash(state);
            }
        }
    }
}

impl fmt::Display for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => f.write_str("nil"),
            LuaValue::Boolean(b) => write!(f, "{}", b),
            LuaValue::Integer(i) => f.write_str(itoa::Buffer::new().format(*i)),
            LuaValue::Float(n) => f.write_str(&format_float(*n)),
            LuaValue::String(s) => write!(f, "{}", s),
            LuaValue::Table(_) => write!(f, "table: 0x{:08x}", self.identity()),
            LuaValue::Function(func) => match func.as_ref() {
                LuaFunction::Native(_) => write!(f, "builtin: 0x{:08x}", self.identity()),
                LuaFunction::Lua(_) => write!(f, "function: 0x{:08x}", self.identity()),
            },
        }
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::String(s) => write!(f, "{:?}", s),
            LuaValue::Float(n) => write!(f, "{}", format_float(*n)),
            _ => write!(f, "{}", self),
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<i64> for LuaValue {
    fn from(i: i64) -> Self {
        LuaValue::Integer(i)
    }
}

impl From<f64> for LuaValue {
    fn from(f: f64) -> Self {
        LuaValue::Float(f)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::String(s.into())
    }
}

impl From<&[u8]> for LuaValue {
    fn from(bytes: &[u8]) -> Self {
        LuaValue::String(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(LuaValue::nil().is_falsy());
        assert!(LuaValue::boolean(false).is_falsy());
        assert!(LuaValue::integer(0).to_boolean());
        assert!(LuaValue::string("").to_boolean());
    }

    #[test]
    fn test_mixed_number_equality() {
        assert_eq!(LuaValue::integer(3), LuaValue::float(3.0));
        assert_ne!(LuaValue::integer(3), LuaValue::float(3.5));
        assert_ne!(LuaValue::float(f64::NAN), LuaValue::float(f64::NAN));
        assert_ne!(LuaValue::integer(1), LuaValue::string("1"));
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(LuaValue::string(" 10 ").to_numeric(), Some(LuaValue::integer(10)));
        assert_eq!(LuaValue::string("0x10").to_integer(), Some(16));
        assert_eq!(LuaValue::string("2.5").to_number(), Some(2.5));
        assert_eq!(LuaValue::string("1e2").to_integer(), Some(100));
        assert_eq!(LuaValue::string("abc").to_numeric(), None);
        assert_eq!(LuaValue::string("inf").to_numeric(), None);
        assert_eq!(LuaValue::float(2.5).to_integer(), None);
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(1e100), "1e+100");
        assert_eq!(format_float(1e-5), "1e-05");
        assert_eq!(format_float(3.14159265358979), "3.1415926535898");
        assert_eq!(format_float(2f64.powi(53)), "9.007199254741e+15");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_strings_are_bytes() {
        let raw = LuaValue::string(&b"a\xffb"[..]);
        assert_eq!(raw.as_bytes(), Some(&b"a\xffb"[..]));
        assert_eq!(raw.as_str(), None);
        assert_eq!(raw, LuaValue::from(&b"a\xffb"[..]));
        assert_ne!(raw, LuaValue::string("a\u{fffd}b"));
        assert_eq!(raw.to_numeric(), None);
        assert_eq!(raw.to_string(), "a\u{fffd}b");
    }

    #[test]
    fn test_display() {
        assert_eq!(LuaValue::integer(-42).to_string(), "-42");
        assert_eq!(LuaValue::boolean(true).to_string(), "true");
        assert_eq!(LuaValue::nil().to_string(), "nil");
    }
}
