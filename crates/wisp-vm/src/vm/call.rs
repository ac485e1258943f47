//! Call protocol: dispatching `CALL`/`INVOKE`/`SUPER_INVOKE` to whatever
//! kind of callable sits on the stack, and class instantiation.

use super::{CallFrame, Vm, FRAMES_MAX};
use crate::error::RuntimeError;
use crate::value::object::{ObjBoundMethod, ObjInstance};
use crate::value::{Obj, ObjRef, Value};

/// What kind of thing a heap-object operand resolved to, for `CALL`.
enum Callee {
    Closure(ObjRef),
    Native(crate::value::object::NativeFn),
    Class(ObjRef),
    BoundMethod(Value, ObjRef),
    Invalid,
}

impl Vm {
    fn classify(&self, r: ObjRef) -> Callee {
        match self.heap.get(r) {
            Obj::Closure(_) => Callee::Closure(r),
            Obj::Native(n) => Callee::Native(n.function),
            Obj::Class(_) => Callee::Class(r),
            Obj::BoundMethod(b) => Callee::BoundMethod(b.receiver, b.method),
            _ => Callee::Invalid,
        }
    }

    pub(super) fn call_value(&mut self, argc: u8) -> Result<(), RuntimeError> {
        let callee_index = self.stack.len() - 1 - argc as usize;
        match self.stack[callee_index] {
            Value::Obj(r) => match self.classify(r) {
                Callee::Closure(c) => self.call_closure(c, argc),
                Callee::Native(f) => {
                    let args: Vec<Value> = self.stack[callee_index + 1..].to_vec();
                    let result = f(&args);
                    self.stack.truncate(callee_index);
                    self.stack.push(result);
                    Ok(())
                }
                Callee::Class(class_ref) => {
                    let instance = self.allocate(Obj::Instance(ObjInstance::new(class_ref)));
                    self.stack[callee_index] = Value::Obj(instance);
                    match self.class_init(class_ref) {
                        Some(init_closure) => self.call_closure(init_closure, argc),
                        None if argc == 0 => Ok(()),
                        None => Err(RuntimeError::ArityMismatch {
                            expected: 0,
                            got: argc,
                        }),
                    }
                }
                Callee::BoundMethod(receiver, method) => {
                    self.stack[callee_index] = receiver;
                    self.call_closure(method, argc)
                }
                Callee::Invalid => Err(RuntimeError::NotCallable),
            },
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn class_init(&self, class_ref: ObjRef) -> Option<ObjRef> {
        let init_string = self.init_string?;
        let hash = self.obj_string_hash(init_string);
        let methods = match self.heap.get(class_ref) {
            Obj::Class(c) => &c.methods,
            _ => unreachable!("class_init called on a non-class"),
        };
        match methods.get(init_string, hash) {
            Some(Value::Obj(r)) => Some(r),
            _ => None,
        }
    }

    pub(super) fn call_closure(
        &mut self,
        closure_ref: ObjRef,
        argc: u8,
    ) -> Result<(), RuntimeError> {
        let function_ref = match self.heap.get(closure_ref) {
            Obj::Closure(c) => c.function,
            _ => unreachable!("call_closure called on a non-closure"),
        };
        let arity = match self.heap.get(function_ref) {
            Obj::Function(f) => f.arity,
            _ => unreachable!(),
        };
        if argc != arity {
            return Err(RuntimeError::ArityMismatch {
                expected: arity,
                got: argc,
            });
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        let slots_base = self.stack.len() - 1 - argc as usize;
        self.frames.push(CallFrame {
            closure: closure_ref,
            ip: 0,
            slots_base,
        });
        Ok(())
    }

    pub(super) fn invoke(&mut self, name: ObjRef, argc: u8) -> Result<(), RuntimeError> {
        let receiver_index = self.stack.len() - 1 - argc as usize;
        let Value::Obj(inst_ref) = self.stack[receiver_index] else {
            return Err(RuntimeError::NotAnInstance);
        };
        let hash = self.obj_string_hash(name);
        let (field, class_ref) = match self.heap.get(inst_ref) {
            Obj::Instance(inst) => (inst.fields.get(name, hash), inst.class),
            _ => return Err(RuntimeError::NotAnInstance),
        };
        if let Some(field) = field {
            self.stack[receiver_index] = field;
            return self.call_value(argc);
        }
        self.invoke_from_class(class_ref, name, argc)
    }

    pub(super) fn invoke_from_class(
        &mut self,
        class_ref: ObjRef,
        name: ObjRef,
        argc: u8,
    ) -> Result<(), RuntimeError> {
        let hash = self.obj_string_hash(name);
        let method = match self.heap.get(class_ref) {
            Obj::Class(c) => c.methods.get(name, hash),
            _ => unreachable!("invoke_from_class called on a non-class"),
        };
        match method {
            Some(Value::Obj(m)) => self.call_closure(m, argc),
            _ => Err(RuntimeError::UndefinedProperty(self.string_contents(name))),
        }
    }

    pub(super) fn bind_method(
        &mut self,
        class_ref: ObjRef,
        name: ObjRef,
    ) -> Result<(), RuntimeError> {
        let hash = self.obj_string_hash(name);
        let method = match self.heap.get(class_ref) {
            Obj::Class(c) => c.methods.get(name, hash),
            _ => unreachable!("bind_method called on a non-class"),
        };
        match method {
            Some(Value::Obj(m)) => {
                let receiver = self.peek(0);
                let bound = self.allocate(Obj::BoundMethod(ObjBoundMethod::new(receiver, m)));
                self.stack.pop();
                self.stack.push(Value::Obj(bound));
                Ok(())
            }
            _ => Err(RuntimeError::UndefinedProperty(self.string_contents(name))),
        }
    }
}
