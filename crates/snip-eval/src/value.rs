//! Runtime values: primitives, shared objects, callables and conversions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use snip_types::ast::FunctionDef;

use crate::env::ScopeId;

/// Shared, mutable handle to a heap object.
pub type ObjRef = Rc<RefCell<Object>>;

/// A JavaScript value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ObjRef),
}

impl fmt::Debug for Value {
    // Objects may be cyclic, so they never print their contents here.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(obj) => write!(f, "Object({})", obj.borrow().kind.tag()),
        }
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        self.as_object()
            .is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::Function(_)))
    }

    /// The `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_function() => "function",
            Value::Object(_) => "object",
        }
    }

    /// ToBoolean.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// ToNumber. Objects convert through their string form.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// ToString.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Object(obj) => object_to_string(obj, &mut Vec::new()),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Object(_), _) => Value::str(self.to_js_string()).loose_equals(other),
            (_, Value::Object(_)) => self.loose_equals(&Value::str(other.to_js_string())),
            _ => self.strict_equals(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Objects
// ══════════════════════════════════════════════════════════════════════════════

/// A heap object: a kind plus insertion-ordered own properties.
pub struct Object {
    pub kind: ObjectKind,
    pub properties: IndexMap<String, Value>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
        }
    }
}

pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    /// The `arguments` object: only what the caller actually passed.
    Arguments(Vec<Value>),
    Function(FunctionObject),
    /// The global object (`window`, `globalThis`).
    Global,
    /// `document`, holding registered event listeners in order.
    Document { listeners: Vec<(String, Value)> },
    Event,
}

impl ObjectKind {
    fn tag(&self) -> &'static str {
        match self {
            ObjectKind::Plain => "Plain",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Arguments(_) => "Arguments",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Global => "Global",
            ObjectKind::Document { .. } => "Document",
            ObjectKind::Event => "Event",
        }
    }
}

/// A function object's callable behaviour and its `prototype` slot.
///
/// Only ordinary functions get a `prototype`; arrows, bound functions and
/// built-ins have none.
pub struct FunctionObject {
    pub callable: Callable,
    pub prototype: Option<ObjRef>,
}

/// How a function object behaves when called.
///
/// The two closure variants differ only in where `this` comes from:
/// `Ordinary` receives it from each call site, `Arrow` fixed it when the
/// closure was created and ignores whatever a call site supplies.
#[derive(Clone)]
pub enum Callable {
    Ordinary {
        def: Rc<FunctionDef>,
        scope: ScopeId,
    },
    Arrow {
        def: Rc<FunctionDef>,
        scope: ScopeId,
        lexical_this: Value,
    },
    Bound {
        target: ObjRef,
        this: Value,
        args: Vec<Value>,
    },
    Builtin(Builtin),
}

impl Callable {
    /// The function's `name` property.
    pub fn name(&self) -> String {
        match self {
            Callable::Ordinary { def, .. } | Callable::Arrow { def, .. } => {
                def.name.clone().unwrap_or_default()
            }
            Callable::Bound { target, .. } => format!("bound {}", function_name(target)),
            Callable::Builtin(builtin) => builtin.name().to_string(),
        }
    }

    /// The function's `length` property: parameters before the first default.
    pub fn arity(&self) -> usize {
        match self {
            Callable::Ordinary { def, .. } | Callable::Arrow { def, .. } => def
                .params
                .iter()
                .take_while(|p| p.default.is_none())
                .count(),
            Callable::Bound { target, args, .. } => match &target.borrow().kind {
                ObjectKind::Function(f) => f.callable.arity().saturating_sub(args.len()),
                _ => 0,
            },
            Callable::Builtin(builtin) => builtin.arity(),
        }
    }
}

fn function_name(obj: &ObjRef) -> String {
    match &obj.borrow().kind {
        ObjectKind::Function(f) => f.callable.name(),
        _ => String::new(),
    }
}

/// Host and built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    ConsoleLog,
    ArrayPush,
    HasOwnProperty,
    FunctionBind,
    FunctionCall,
    FunctionApply,
    AddEventListener,
    DispatchEvent,
    /// `Function(...)` / `new Function(...)`
    FunctionCtor,
    /// `new Event(type)`
    EventCtor,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::ConsoleLog => "log",
            Builtin::ArrayPush => "push",
            Builtin::HasOwnProperty => "hasOwnProperty",
            Builtin::FunctionBind => "bind",
            Builtin::FunctionCall => "call",
            Builtin::FunctionApply => "apply",
            Builtin::AddEventListener => "addEventListener",
            Builtin::DispatchEvent => "dispatchEvent",
            Builtin::FunctionCtor => "Function",
            Builtin::EventCtor => "Event",
        }
    }

    fn arity(self) -> usize {
        match self {
            Builtin::ConsoleLog | Builtin::FunctionCtor => 0,
            Builtin::AddEventListener | Builtin::FunctionApply => 2,
            _ => 1,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Conversions
// ══════════════════════════════════════════════════════════════════════════════

/// ECMAScript `Number::toString(10)`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n == 0.0 {
        return "0".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // Shortest round-trip digits and decimal exponent, e.g. "1.284256e1".
    let sci = format!("{n:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let point = exponent.parse::<i32>().unwrap_or(0) + 1;

    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let e = point - 1;
        let sign = if e < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", e.abs())
        }
    }
}

/// StringToNumber for the decimal forms snippets use.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) =>
        {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// The property key a value converts to (`arr[0]` reads key `"0"`).
pub fn to_property_key(value: &Value) -> String {
    value.to_js_string()
}

/// Parse a canonical array index key.
pub fn array_index(key: &str) -> Option<usize> {
    if key == "0" {
        return Some(0);
    }
    if key.starts_with('0') || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn object_to_string(obj: &ObjRef, seen: &mut Vec<*const RefCell<Object>>) -> String {
    let ptr = Rc::as_ptr(obj);
    if seen.contains(&ptr) {
        return String::new();
    }
    let object = obj.borrow();
    match &object.kind {
        ObjectKind::Array(items) => {
            seen.push(ptr);
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    Value::Object(inner) => object_to_string(inner, seen),
                    other => other.to_js_string(),
                })
                .collect();
            seen.pop();
            parts.join(",")
        }
        ObjectKind::Function(f) => {
            format!("function {}() {{ [native code] }}", f.callable.name())
        }
        ObjectKind::Arguments(_) => "[object Arguments]".into(),
        ObjectKind::Global => "[object Window]".into(),
        ObjectKind::Document { .. } => "[object HTMLDocument]".into(),
        ObjectKind::Event => "[object Event]".into(),
        ObjectKind::Plain => "[object Object]".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string_integers() {
        assert_eq!(number_to_string(12.0), "12");
        assert_eq!(number_to_string(1000.0), "1000");
        assert_eq!(number_to_string(-45.0), "-45");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn test_number_to_string_decimals() {
        assert_eq!(number_to_string(5.99), "5.99");
        assert_eq!(number_to_string(2.0 * 5.99), "11.98");
        assert_eq!(number_to_string(2.0 * 5.99 * (1.0 + 0.072)), "12.84256");
        assert_eq!(number_to_string(5.0 + 5.0 * 0.07), "5.35");
        assert_eq!(number_to_string(20.0 + 20.0 * 0.07), "21.4");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_number_to_string_exponents() {
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e300), "1.5e+300");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(123e18), "123000000000000000000");
    }

    #[test]
    fn test_number_to_string_specials() {
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number("5.35"), 5.35);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("abc").is_nan());
    }

    #[test]
    fn test_typeof_and_truthiness() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::str("x").type_of(), "string");
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::str("0").truthy());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::str("1")));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
    }

    #[test]
    fn test_array_index_keys() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("length"), None);
        assert_eq!(array_index(""), None);
    }

    #[test]
    fn test_array_to_string_joins() {
        let array = Rc::new(RefCell::new(Object::new(ObjectKind::Array(vec![
            Value::Number(1.0),
            Value::Null,
            Value::str("a"),
        ]))));
        assert_eq!(Value::Object(array).to_js_string(), "1,,a");
    }
}
