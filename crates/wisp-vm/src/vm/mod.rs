//! The interpreter: operand stack, call stack, globals, the string-intern
//! table, and the bytecode dispatch loop.

mod call;
mod frame;
mod gc;
mod upvalue;


pub use frame::CallFrame;

use crate::bytecode::OpCode;
use crate::error::{InterpretResult, RuntimeError};
use crate::hash::fnv1a;
use crate::heap::Heap;
use crate::table::Table;
use crate::value::object::{NativeFn, ObjClosure, ObjFunction, ObjString};
use crate::value::{print_value, Obj, ObjRef, Value};

/// Hard cap on call-frame depth. Exceeding it raises [`RuntimeError::StackOverflow`].
pub const FRAMES_MAX: usize = 64;

/// A hook the compiler collaborator registers so its own in-progress state
/// (`Function` objects under construction, not yet reachable from any
/// frame or constant pool) is visited during root marking.
///
/// Mirrors `markCompilerRoots` from the embedding contract: a GC cycle can
/// run at any allocation, including ones the compiler triggers while still
/// assembling a chunk, so the compiler's own live objects must be roots
/// too.
pub trait CompilerRoots {
    fn mark_roots(&self, heap: &mut Heap);
}

/// The tree-walking interpreter's antithesis: a stack machine over one
/// managed heap.
pub struct Vm {
    pub(crate) heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    strings: Table,
    /// Upvalues still aliasing a live stack slot, sorted by descending
    /// stack index so the front of the list is always the most recently
    /// opened one.
    open_upvalues: Vec<ObjRef>,
    init_string: Option<ObjRef>,
    compiler_roots: Option<Box<dyn CompilerRoots>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        let mut vm = Self {
            heap: Heap::new(),
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            strings: Table::new(),
            open_upvalues: Vec::new(),
            init_string: None,
            compiler_roots: None,
        };
        // Must happen after `strings` exists, since interning mutates it.
        vm.init_string = Some(vm.intern_string("init"));
        vm.define_native("clock", crate::native::clock);
        vm
    }

    /// Enable stress-GC mode: every allocation collects unconditionally.
    pub fn set_stress_gc(&mut self, enabled: bool) {
        self.heap.stress_gc = enabled;
    }

    /// Register the compiler collaborator's root-marking hook. Replaces
    /// any previously registered hook.
    pub fn set_compiler_roots(&mut self, roots: Box<dyn CompilerRoots>) {
        self.compiler_roots = Some(roots);
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[must_use]
    pub fn live_object_count(&self) -> usize {
        self.heap.live_count()
    }

    // -- operand stack -----------------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        let len = self.stack.len();
        self.stack[len - 1 - distance]
    }

    // -- allocation ----------------------------------------------------------

    fn allocate(&mut self, obj: Obj) -> ObjRef {
        let size = Heap::size_of(&obj);
        if self.heap.should_collect(size) {
            self.collect_garbage();
        }
        self.heap.insert(obj)
    }

    /// Intern `s`, returning the existing handle if an equal string is
    /// already interned.
    pub fn intern_string(&mut self, s: &str) -> ObjRef {
        let hash = fnv1a(s.as_bytes());
        if let Some(existing) = self.strings.find_string(&self.heap, s, hash) {
            return existing;
        }
        let r = self.allocate(Obj::String(ObjString::new(s.into(), hash)));
        self.strings.set(r, hash, Value::Nil);
        r
    }

    /// Allocate a fresh, empty function object for the compiler to populate.
    pub fn alloc_function(&mut self, name: Option<ObjRef>) -> ObjRef {
        self.allocate(Obj::Function(ObjFunction::new(name)))
    }

    /// Borrow a just-allocated function mutably so the compiler can emit
    /// bytecode into its chunk.
    ///
    /// # Panics
    /// Panics if `r` does not name a function.
    pub fn function_mut(&mut self, r: ObjRef) -> &mut ObjFunction {
        match self.heap.get_mut(r) {
            Obj::Function(f) => f,
            _ => panic!("function_mut: not a function"),
        }
    }

    fn obj_string_hash(&self, r: ObjRef) -> u32 {
        match self.heap.get(r) {
            Obj::String(s) => s.hash,
            other => panic!("expected string, found {}", other.kind_name()),
        }
    }

    fn string_contents(&self, r: ObjRef) -> String {
        match self.heap.get(r) {
            Obj::String(s) => s.chars.to_string(),
            other => panic!("expected string, found {}", other.kind_name()),
        }
    }

    /// Register a native function under `name`, following the push-then-set
    /// pattern so both the interned name and the native object are rooted
    /// on the stack for the duration of the allocation that might collect.
    pub fn define_native(&mut self, name: &str, function: NativeFn) {
        let name_ref = self.intern_string(name);
        self.push(Value::Obj(name_ref));
        let native_ref = self.allocate(Obj::Native(crate::value::object::ObjNative { function }));
        self.push(Value::Obj(native_ref));
        let hash = self.obj_string_hash(name_ref);
        let native_value = self.peek(0);
        self.globals.set(name_ref, hash, native_value);
        self.pop();
        self.pop();
    }

    // -- entry point -----------------------------------------------------

    /// Wrap the top-level compiled `function` in a closure, install the
    /// first call frame, and run the dispatch loop to completion.
    pub fn interpret_function(&mut self, function: ObjRef) -> Result<(), RuntimeError> {
        // `function` isn't reachable from any root yet (not on the stack,
        // not in a frame) until the closure wrapping it is pushed below, so
        // the allocation that builds that closure must not be the thing
        // that collects it out from under itself. Root it on the stack
        // first, per the push-then-allocate discipline in §5.
        self.push(Value::Obj(function));
        let closure = self.allocate(Obj::Closure(ObjClosure::new(function, Vec::new())));
        self.pop();
        self.push(Value::Obj(closure));
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots_base: 0,
        });
        self.run()
    }

    /// The embedding entry point: run an already-compiled top-level script.
    ///
    /// Turning source text into `script` is the compiler collaborator's
    /// job, not this crate's (see the crate-level docs); by the time a
    /// caller reaches this method, compilation has already succeeded, so
    /// this can only ever return [`InterpretResult::Ok`] or
    /// [`InterpretResult::RuntimeError`]. A driver that wires in a
    /// compiler and observes a compile error should short-circuit before
    /// calling this and report [`InterpretResult::CompileError`] itself.
    pub fn interpret(&mut self, script: ObjRef) -> InterpretResult {
        match self.interpret_function(script) {
            Ok(()) => InterpretResult::Ok,
            Err(_) => InterpretResult::RuntimeError,
        }
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active call frame")
    }

    fn current_closure(&self) -> ObjRef {
        self.frame().closure
    }

    fn current_function(&self) -> ObjRef {
        match self.heap.get(self.current_closure()) {
            Obj::Closure(c) => c.function,
            _ => unreachable!("a call frame always names a closure"),
        }
    }

    fn read_byte(&mut self) -> u8 {
        let fn_ref = self.current_function();
        let ip = self.frame().ip;
        let byte = match self.heap.get(fn_ref) {
            Obj::Function(f) => f.chunk.code[ip],
            _ => unreachable!(),
        };
        self.frame_mut().ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        (u16::from(hi) << 8) | u16::from(lo)
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        let fn_ref = self.current_function();
        match self.heap.get(fn_ref) {
            Obj::Function(f) => f.chunk.constants[idx as usize],
            _ => unreachable!(),
        }
    }

    fn read_string(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Obj(r) => r,
            _ => unreachable!("READ_STRING: constant pool entry is not a string"),
        }
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        match self.run_inner() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.report_runtime_error(&err);
                self.reset_stacks();
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn run_inner(&mut self) -> Result<(), RuntimeError> {
        loop {
            let op = OpCode::from_byte(self.read_byte());
            match op {
                OpCode::Constant => {
                    let v = self.read_constant();
                    self.push(v);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slots_base;
                    self.push(self.stack[base + slot]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slots_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let hash = self.obj_string_hash(name);
                    match self.globals.get(name, hash) {
                        Some(v) => self.push(v),
                        None => {
                            return Err(RuntimeError::UndefinedVariable(self.string_contents(name)))
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let hash = self.obj_string_hash(name);
                    let v = self.pop();
                    self.globals.set(name, hash, v);
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let hash = self.obj_string_hash(name);
                    let v = self.peek(0);
                    if self.globals.set(name, hash, v) {
                        self.globals.delete(name, hash);
                        return Err(RuntimeError::UndefinedVariable(self.string_contents(name)));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let up_ref = self.current_upvalue(slot);
                    self.push(self.read_upvalue_value(up_ref));
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let up_ref = self.current_upvalue(slot);
                    let v = self.peek(0);
                    self.write_upvalue_value(up_ref, v);
                }
                OpCode::GetProperty => self.get_property()?,
                OpCode::SetProperty => self.set_property()?,
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let superclass = self.pop();
                    let Value::Obj(class_ref) = superclass else {
                        unreachable!("superclass operand is always a class value")
                    };
                    self.bind_method(class_ref, name)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsy()));
                }
                OpCode::Negate => match self.peek(0) {
                    Value::Number(n) => {
                        self.pop();
                        self.push(Value::Number(-n));
                    }
                    _ => return Err(RuntimeError::NotANumber),
                },
                OpCode::Print => {
                    let v = self.pop();
                    println!("{}", print_value(&self.heap, v));
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if self.peek(0).is_falsy() {
                        self.frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.frame_mut().ip -= offset as usize;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    self.call_value(argc)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let argc = self.read_byte();
                    self.invoke(name, argc)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let argc = self.read_byte();
                    let superclass = self.pop();
                    let Value::Obj(class_ref) = superclass else {
                        unreachable!("superclass operand is always a class value")
                    };
                    self.invoke_from_class(class_ref, name, argc)?;
                }
                OpCode::Closure => self.closure_op(),
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let base = self.frame().slots_base;
                    self.close_upvalues(base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(base);
                    self.push(result);
                }
                OpCode::Class => {
                    let name = self.read_string();
                    let class_ref =
                        self.allocate(Obj::Class(crate::value::object::ObjClass::new(name)));
                    self.push(Value::Obj(class_ref));
                }
                OpCode::Inherit => self.inherit()?,
                OpCode::Method => self.method_op(),
            }
        }
    }

    fn binary_number_op(&mut self, f: impl Fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                self.push(f(a, b));
                Ok(())
            }
            _ => Err(RuntimeError::NotANumber),
        }
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(a + b));
                Ok(())
            }
            (Value::Obj(a), Value::Obj(b))
                if matches!(self.heap.get(a), Obj::String(_))
                    && matches!(self.heap.get(b), Obj::String(_)) =>
            {
                let combined = format!("{}{}", self.string_contents(a), self.string_contents(b));
                let result = self.intern_string(&combined);
                self.pop();
                self.pop();
                self.push(Value::Obj(result));
                Ok(())
            }
            _ => Err(RuntimeError::BadAddOperands),
        }
    }

    fn get_property(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let Value::Obj(r) = self.peek(0) else {
            return Err(RuntimeError::NotAnInstance);
        };
        let (field, class_ref) = match self.heap.get(r) {
            Obj::Instance(inst) => {
                let hash = self.obj_string_hash(name);
                (inst.fields.get(name, hash), inst.class)
            }
            _ => return Err(RuntimeError::NotAnInstance),
        };
        match field {
            Some(v) => {
                self.pop();
                self.push(v);
                Ok(())
            }
            None => self.bind_method(class_ref, name),
        }
    }

    fn set_property(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let value = self.peek(0);
        let Value::Obj(r) = self.peek(1) else {
            return Err(RuntimeError::NotAnInstance);
        };
        let hash = self.obj_string_hash(name);
        match self.heap.get_mut(r) {
            Obj::Instance(inst) => inst.fields.set(name, hash, value),
            _ => return Err(RuntimeError::NotAnInstance),
        };
        self.pop();
        self.pop();
        self.push(value);
        Ok(())
    }

    fn inherit(&mut self) -> Result<(), RuntimeError> {
        let Value::Obj(super_ref) = self.peek(1) else {
            return Err(RuntimeError::SuperclassNotClass);
        };
        if !matches!(self.heap.get(super_ref), Obj::Class(_)) {
            return Err(RuntimeError::SuperclassNotClass);
        }
        let Value::Obj(sub_ref) = self.peek(0) else {
            unreachable!("class declarations always push a class value")
        };
        let super_methods = match self.heap.get(super_ref) {
            Obj::Class(c) => c.methods.clone(),
            _ => unreachable!(),
        };
        if let Obj::Class(sub) = self.heap.get_mut(sub_ref) {
            super_methods.add_all(&mut sub.methods);
        }
        self.pop();
        Ok(())
    }

    fn method_op(&mut self) {
        let name = self.read_string();
        let method = self.peek(0);
        let Value::Obj(class_ref) = self.peek(1) else {
            unreachable!("METHOD always runs with the class below the closure")
        };
        let hash = self.obj_string_hash(name);
        if let Obj::Class(c) = self.heap.get_mut(class_ref) {
            c.methods.set(name, hash, method);
        }
        self.pop();
    }

    fn report_runtime_error(&self, err: &RuntimeError) {
        eprintln!("{err}");
        for frame in self.frames.iter().rev() {
            let Obj::Closure(c) = self.heap.get(frame.closure) else {
                continue;
            };
            let Obj::Function(f) = self.heap.get(c.function) else {
                continue;
            };
            let line = f.chunk.line_at(frame.ip.saturating_sub(1));
            let name = match f.name {
                Some(n) => format!("{}()", self.string_contents(n)),
                None => "script".to_string(),
            };
            eprintln!("[line {line}] in {name}");
        }
        tracing::error!(%err, "runtime fault, interpreter resuming at top level");
    }

    fn reset_stacks(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }
}
