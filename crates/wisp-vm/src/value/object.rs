//! Heap object variants.
//!
//! `Obj` is a tagged sum over the eight heap object kinds the language
//! needs. Keeping it a plain enum (rather than trait objects) means
//! blackening, freeing, and printing all switch exhaustively over the tag
//! and the compiler checks that every kind is handled.

use crate::bytecode::Chunk;
use crate::table::Table;
use crate::value::{ObjRef, Value};

/// An immutable, interned string.
///
/// Any two strings with equal bytes are interned to the same `ObjRef`, so
/// string equality is reference equality once interned.
#[derive(Debug)]
pub struct ObjString {
    /// Precomputed FNV-1a hash of `chars`, used both for table probing and
    /// for fast `findString` lookups during interning.
    pub hash: u32,
    pub chars: Box<str>,
}

impl ObjString {
    #[must_use]
    pub fn new(chars: Box<str>, hash: u32) -> Self {
        Self { hash, chars }
    }
}

/// A compiled function: arity, owned chunk, and an optional name.
///
/// The top-level script itself is an anonymous `ObjFunction` (`name` is
/// `None`), printed as `<script>`.
#[derive(Debug)]
pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    pub name: Option<ObjRef>,
}

impl ObjFunction {
    #[must_use]
    pub fn new(name: Option<ObjRef>) -> Self {
        Self {
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
            name,
        }
    }
}

/// A function pointer registered with [`crate::vm::Vm::define_native`].
pub type NativeFn = fn(args: &[Value]) -> Value;

/// A native (host-implemented) function.
pub struct ObjNative {
    pub function: NativeFn,
}

impl core::fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjNative").finish()
    }
}

/// Either an *open* upvalue (aliasing a live stack slot) or a *closed* one
/// (owning its own copy of the value, once the slot it aliased went out of
/// scope).
#[derive(Debug, Clone, Copy)]
pub enum UpvalueLocation {
    /// Aliases `stack[index]`.
    Open(usize),
    /// Owns its value directly.
    Closed(Value),
}

/// A captured-variable cell shared between the closures that close over it.
#[derive(Debug)]
pub struct ObjUpvalue {
    pub location: UpvalueLocation,
}

impl ObjUpvalue {
    #[must_use]
    pub const fn open(stack_index: usize) -> Self {
        Self {
            location: UpvalueLocation::Open(stack_index),
        }
    }

    #[must_use]
    pub const fn stack_index(&self) -> Option<usize> {
        match self.location {
            UpvalueLocation::Open(i) => Some(i),
            UpvalueLocation::Closed(_) => None,
        }
    }
}

/// A function value paired with the upvalues it captured at creation time.
#[derive(Debug)]
pub struct ObjClosure {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

impl ObjClosure {
    #[must_use]
    pub const fn new(function: ObjRef, upvalues: Vec<ObjRef>) -> Self {
        Self { function, upvalues }
    }
}

/// A class: a name and a method table (method name -> `Closure`).
#[derive(Debug)]
pub struct ObjClass {
    pub name: ObjRef,
    pub methods: Table,
}

impl ObjClass {
    #[must_use]
    pub fn new(name: ObjRef) -> Self {
        Self {
            name,
            methods: Table::new(),
        }
    }
}

/// An instance of a class: a class reference plus a field table.
#[derive(Debug)]
pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: Table,
}

impl ObjInstance {
    #[must_use]
    pub fn new(class: ObjRef) -> Self {
        Self {
            class,
            fields: Table::new(),
        }
    }
}

/// A method fused with the receiver it was looked up on.
///
/// Produced by `GET_PROPERTY` when the property names a method rather than
/// a field.
#[derive(Debug)]
pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

impl ObjBoundMethod {
    #[must_use]
    pub const fn new(receiver: Value, method: ObjRef) -> Self {
        Self { receiver, method }
    }
}

/// The tagged union of every heap object kind.
#[derive(Debug)]
pub enum Obj {
    String(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
    Upvalue(ObjUpvalue),
    Closure(ObjClosure),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
}

impl Obj {
    /// A short, stable name for error messages (`"string"`, `"function"`, ...).
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Native(_) => "native function",
            Self::Upvalue(_) => "upvalue",
            Self::Closure(_) => "closure",
            Self::Class(_) => "class",
            Self::Instance(_) => "instance",
            Self::BoundMethod(_) => "bound method",
        }
    }
}
