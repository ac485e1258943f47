//! Rendering values as they are written by `PRINT` and shown in stack
//! traces.

use crate::heap::Heap;
use crate::value::object::Obj;
use crate::value::{ObjRef, Value};

fn function_name(heap: &Heap, name: Option<ObjRef>) -> String {
    match name {
        Some(r) => match heap.get(r) {
            Obj::String(s) => s.chars.to_string(),
            _ => "?".to_string(),
        },
        None => "script".to_string(),
    }
}

/// Render `value` the way `PRINT` writes it to stdout.
///
/// Numbers use the shortest round-trippable decimal form; `Upvalue`s are
/// never observable from the language and are never passed here.
#[must_use]
pub fn print_value(heap: &Heap, value: Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::Obj(r) => print_obj(heap, r),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn print_obj(heap: &Heap, r: ObjRef) -> String {
    match heap.get(r) {
        Obj::String(s) => s.chars.to_string(),
        Obj::Function(f) => match f.name {
            Some(_) => format!("<fn {}>", function_name(heap, f.name)),
            None => "<script>".to_string(),
        },
        Obj::Native(_) => "<native fn>".to_string(),
        Obj::Closure(c) => {
            let Obj::Function(f) = heap.get(c.function) else {
                unreachable!("closure must wrap a function")
            };
            match f.name {
                Some(_) => format!("<fn {}>", function_name(heap, f.name)),
                None => "<script>".to_string(),
            }
        }
        Obj::Upvalue(_) => "<upvalue>".to_string(),
        Obj::Class(c) => function_name(heap, Some(c.name)),
        Obj::Instance(i) => {
            let Obj::Class(c) = heap.get(i.class) else {
                unreachable!("instance must reference a class")
            };
            format!("{} instance", function_name(heap, Some(c.name)))
        }
        Obj::BoundMethod(b) => {
            let Obj::Closure(c) = heap.get(b.method) else {
                unreachable!("bound method must wrap a closure")
            };
            let Obj::Function(f) = heap.get(c.function) else {
                unreachable!("closure must wrap a function")
            };
            match f.name {
                Some(_) => format!("<fn {}>", function_name(heap, f.name)),
                None => "<script>".to_string(),
            }
        }
    }
}
