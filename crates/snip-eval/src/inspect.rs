//! Console formatting in the style of Node's `util.inspect`.
//!
//! `console.log` prints strings raw and everything else inspected; inside
//! containers strings are quoted. Output is always a single line.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{number_to_string, Callable, Object, ObjectKind, ObjRef, Value};

/// Non-empty containers nested deeper than this print as `[Object]` /
/// `[Array]`.
const MAX_DEPTH: usize = 2;

/// Format `console.log` arguments into one output line.
pub fn format_log_line(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => inspect(other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inspect a single value.
pub fn inspect(value: &Value) -> String {
    Inspector::default().value(value, 0)
}

#[derive(Default)]
struct Inspector {
    /// Objects currently being printed, for cycle detection.
    stack: Vec<*const RefCell<Object>>,
    /// Targets of circular references, numbered by first sighting.
    circular: Vec<*const RefCell<Object>>,
}

impl Inspector {
    fn value(&mut self, value: &Value, depth: usize) -> String {
        match value {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if *n == 0.0 && n.is_sign_negative() => "-0".into(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => quote(s),
            Value::Object(obj) => self.object(obj, depth),
        }
    }

    fn object(&mut self, obj: &ObjRef, depth: usize) -> String {
        let ptr = Rc::as_ptr(obj);
        if self.stack.contains(&ptr) {
            return format!("[Circular *{}]", self.circular_index(ptr));
        }
        self.stack.push(ptr);
        let text = self.object_body(obj, depth);
        self.stack.pop();
        match self.circular.iter().position(|p| *p == ptr) {
            Some(i) => format!("<ref *{}> {text}", i + 1),
            None => text,
        }
    }

    fn circular_index(&mut self, ptr: *const RefCell<Object>) -> usize {
        match self.circular.iter().position(|p| *p == ptr) {
            Some(i) => i + 1,
            None => {
                self.circular.push(ptr);
                self.circular.len()
            }
        }
    }

    fn object_body(&mut self, obj: &ObjRef, depth: usize) -> String {
        let object = obj.borrow();
        match &object.kind {
            ObjectKind::Global => "Window".into(),
            ObjectKind::Document { .. } => "#document".into(),
            ObjectKind::Function(f) => {
                let label = function_label(&f.callable);
                if object.properties.is_empty() {
                    label
                } else {
                    format!("{label} {}", self.entries(&object, Vec::new(), depth))
                }
            }
            ObjectKind::Array(items) => {
                if items.is_empty() {
                    return "[]".into();
                }
                if depth > MAX_DEPTH {
                    return "[Array]".into();
                }
                let items: Vec<String> =
                    items.iter().map(|v| self.value(v, depth + 1)).collect();
                bracketed('[', items, ']')
            }
            ObjectKind::Arguments(items) => {
                if items.is_empty() && object.properties.is_empty() {
                    return "[Arguments] {}".into();
                }
                if depth > MAX_DEPTH {
                    return "[Arguments]".into();
                }
                let indexed = items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (format!("'{i}'"), self.value(v, depth + 1)))
                    .collect();
                format!("[Arguments] {}", self.entries(&object, indexed, depth))
            }
            ObjectKind::Event => {
                if depth > MAX_DEPTH {
                    return "[Event]".into();
                }
                format!("Event {}", self.entries(&object, Vec::new(), depth))
            }
            ObjectKind::Plain => {
                if object.properties.is_empty() {
                    return "{}".into();
                }
                if depth > MAX_DEPTH {
                    return "[Object]".into();
                }
                self.entries(&object, Vec::new(), depth)
            }
        }
    }

    /// `{ key: value, ... }` with `leading` entries first.
    fn entries(&mut self, object: &Object, leading: Vec<(String, String)>, depth: usize) -> String {
        let mut parts: Vec<String> = leading
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        for (key, value) in &object.properties {
            let value = self.value(value, depth + 1);
            parts.push(format!("{}: {value}", property_key(key)));
        }
        bracketed('{', parts, '}')
    }
}

fn bracketed(open: char, parts: Vec<String>, close: char) -> String {
    if parts.is_empty() {
        format!("{open}{close}")
    } else {
        format!("{open} {} {close}", parts.join(", "))
    }
}

fn function_label(callable: &Callable) -> String {
    let name = callable.name();
    if name.is_empty() {
        "[Function (anonymous)]".into()
    } else {
        format!("[Function: {name}]")
    }
}

/// Object keys print bare when they are identifiers, quoted otherwise.
fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_ident = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Single quotes unless the string contains one and no double quote.
fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    if s.contains('\'') && !s.contains('"') {
        format!("\"{escaped}\"")
    } else {
        format!("'{}'", escaped.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Builtin, FunctionObject};

    fn alloc(kind: ObjectKind) -> ObjRef {
        Rc::new(RefCell::new(Object::new(kind)))
    }

    fn plain(entries: &[(&str, Value)]) -> Value {
        let obj = alloc(ObjectKind::Plain);
        for (k, v) in entries {
            obj.borrow_mut().properties.insert(k.to_string(), v.clone());
        }
        Value::Object(obj)
    }

    fn builtin(b: Builtin) -> Value {
        Value::Object(alloc(ObjectKind::Function(FunctionObject {
            callable: Callable::Builtin(b),
            prototype: None,
        })))
    }

    #[test]
    fn test_top_level_strings_are_raw() {
        assert_eq!(
            format_log_line(&[Value::str("1000, hardware")]),
            "1000, hardware"
        );
        assert_eq!(
            format_log_line(&[Value::str("a"), Value::Number(1.0), Value::Undefined]),
            "a 1 undefined"
        );
    }

    #[test]
    fn test_plain_object() {
        let invoice = plain(&[("number", Value::Number(456.0))]);
        assert_eq!(inspect(&invoice), "{ number: 456 }");
        assert_eq!(inspect(&plain(&[])), "{}");
    }

    #[test]
    fn test_nested_strings_are_quoted() {
        let obj = plain(&[("type", Value::str("software")), ("it", Value::str("it's"))]);
        assert_eq!(inspect(&obj), "{ type: 'software', it: \"it's\" }");
    }

    #[test]
    fn test_non_identifier_keys_are_quoted() {
        let obj = plain(&[("0", Value::Number(5.0)), ("a-b", Value::Null)]);
        assert_eq!(inspect(&obj), "{ '0': 5, 'a-b': null }");
    }

    #[test]
    fn test_arrays() {
        let array = Value::Object(alloc(ObjectKind::Array(vec![
            Value::Number(1.0),
            Value::str("two"),
        ])));
        assert_eq!(inspect(&array), "[ 1, 'two' ]");
        assert_eq!(inspect(&Value::Object(alloc(ObjectKind::Array(vec![])))), "[]");
    }

    #[test]
    fn test_arguments_object() {
        let args = Value::Object(alloc(ObjectKind::Arguments(vec![
            Value::Number(5.0),
            Value::Undefined,
        ])));
        assert_eq!(inspect(&args), "[Arguments] { '0': 5, '1': undefined }");
    }

    #[test]
    fn test_functions() {
        assert_eq!(inspect(&builtin(Builtin::ConsoleLog)), "[Function: log]");
        let obj = plain(&[
            ("number", Value::Number(123.0)),
            ("process", builtin(Builtin::ArrayPush)),
        ]);
        assert_eq!(inspect(&obj), "{ number: 123, process: [Function: push] }");
    }

    #[test]
    fn test_host_objects() {
        assert_eq!(inspect(&Value::Object(alloc(ObjectKind::Global))), "Window");
        let document = alloc(ObjectKind::Document {
            listeners: Vec::new(),
        });
        assert_eq!(inspect(&Value::Object(document)), "#document");
    }

    #[test]
    fn test_cycle_is_marked() {
        let obj = alloc(ObjectKind::Plain);
        obj.borrow_mut()
            .properties
            .insert("self".into(), Value::Object(Rc::clone(&obj)));
        assert_eq!(
            inspect(&Value::Object(Rc::clone(&obj))),
            "<ref *1> { self: [Circular *1] }"
        );
        obj.borrow_mut().properties.clear();
    }

    #[test]
    fn test_cycle_target_is_labelled_where_it_prints() {
        let inner = alloc(ObjectKind::Plain);
        let outer = plain(&[("a", Value::Number(1.0)), ("inner", Value::Object(Rc::clone(&inner)))]);
        inner
            .borrow_mut()
            .properties
            .insert("back".into(), Value::Object(Rc::clone(&inner)));
        assert_eq!(
            inspect(&outer),
            "{ a: 1, inner: <ref *1> { back: [Circular *1] } }"
        );
        inner.borrow_mut().properties.clear();
    }

    #[test]
    fn test_depth_limit() {
        let deep = plain(&[("a", plain(&[("b", plain(&[("c", plain(&[("d", Value::Number(1.0))]))]))]))]);
        assert_eq!(inspect(&deep), "{ a: { b: { c: [Object] } } }");
    }

    #[test]
    fn test_empty_containers_print_past_depth_limit() {
        let empty = plain(&[("a", plain(&[("b", plain(&[("c", plain(&[]))]))]))]);
        assert_eq!(inspect(&empty), "{ a: { b: { c: {} } } }");
        let array = Value::Object(alloc(ObjectKind::Array(vec![])));
        let nested = plain(&[("a", plain(&[("b", plain(&[("c", array)]))]))]);
        assert_eq!(inspect(&nested), "{ a: { b: { c: [] } } }");
    }

    #[test]
    fn test_negative_zero() {
        assert_eq!(inspect(&Value::Number(-0.0)), "-0");
    }
}
