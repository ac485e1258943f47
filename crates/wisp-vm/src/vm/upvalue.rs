//! Upvalue capture, closing, and the `CLOSURE` opcode.
//!
//! The open-upvalue list ([`super::Vm`]'s `open_upvalues`) doubles as a set
//! (unique by stack slot, so sibling closures that capture the same local
//! share one cell) and an ordered structure (`close_upvalues` only needs to
//! walk the prefix at or above a given slot). A plain `Vec` kept sorted by
//! descending stack index is the simplest encoding that satisfies both.

use super::Vm;
use crate::value::object::{ObjClosure, ObjUpvalue, UpvalueLocation};
use crate::value::{Obj, ObjRef, Value};

impl Vm {
    /// The `slot`-th upvalue reference of the currently executing closure.
    pub(super) fn current_upvalue(&self, slot: usize) -> ObjRef {
        match self.heap.get(self.current_closure()) {
            Obj::Closure(c) => c.upvalues[slot],
            _ => unreachable!("the active frame always names a closure"),
        }
    }

    pub(super) fn read_upvalue_value(&self, upvalue: ObjRef) -> Value {
        match self.heap.get(upvalue) {
            Obj::Upvalue(u) => match u.location {
                UpvalueLocation::Open(index) => self.stack[index],
                UpvalueLocation::Closed(value) => value,
            },
            _ => unreachable!("not an upvalue"),
        }
    }

    pub(super) fn write_upvalue_value(&mut self, upvalue: ObjRef, value: Value) {
        let open_index = match self.heap.get(upvalue) {
            Obj::Upvalue(u) => u.stack_index(),
            _ => unreachable!("not an upvalue"),
        };
        match open_index {
            Some(index) => self.stack[index] = value,
            None => {
                if let Obj::Upvalue(u) = self.heap.get_mut(upvalue) {
                    u.location = UpvalueLocation::Closed(value);
                }
            }
        }
    }

    /// Find the open upvalue for stack slot `local`, creating one if no
    /// existing closure has captured that slot yet.
    ///
    /// The list stays sorted by descending stack index: scanning stops at
    /// the first entry whose slot is `<=` local, either reusing an exact
    /// match or splicing a fresh upvalue in just before it.
    pub(super) fn capture_upvalue(&mut self, local: usize) -> ObjRef {
        let mut insert_at = self.open_upvalues.len();
        for (i, &existing) in self.open_upvalues.iter().enumerate() {
            let slot = match self.heap.get(existing) {
                Obj::Upvalue(u) => u
                    .stack_index()
                    .expect("open_upvalues holds only open upvalues"),
                _ => unreachable!("not an upvalue"),
            };
            if slot == local {
                return existing;
            }
            if slot < local {
                insert_at = i;
                break;
            }
        }
        let created = self.allocate(Obj::Upvalue(ObjUpvalue::open(local)));
        self.open_upvalues.insert(insert_at, created);
        created
    }

    /// Close every open upvalue whose stack slot is `>= last`: copy the
    /// stack value into the upvalue's own cell and drop it from the open
    /// list. Called on `CLOSE_UPVALUE`, on `RETURN` (with `last` = the
    /// frame's base), and nowhere else — the compiler emits `CLOSE_UPVALUE`
    /// wherever a block's locals go out of scope.
    pub(super) fn close_upvalues(&mut self, last: usize) {
        while let Some(&upvalue) = self.open_upvalues.first() {
            let slot = match self.heap.get(upvalue) {
                Obj::Upvalue(u) => u.stack_index(),
                _ => unreachable!("not an upvalue"),
            };
            let Some(slot) = slot else { break };
            if slot < last {
                break;
            }
            let value = self.stack[slot];
            if let Obj::Upvalue(u) = self.heap.get_mut(upvalue) {
                u.location = UpvalueLocation::Closed(value);
            }
            self.open_upvalues.remove(0);
        }
    }

    /// `CLOSURE fn_idx, (is_local, index)*` — build a closure over the
    /// function named by the constant at `fn_idx`, capturing each upvalue
    /// either from the enclosing frame's locals (`is_local != 0`) or from
    /// the enclosing closure's own upvalue array.
    pub(super) fn closure_op(&mut self) {
        let function = match self.read_constant() {
            Value::Obj(r) => r,
            _ => unreachable!("CLOSURE's operand is always a function constant"),
        };
        let upvalue_count = match self.heap.get(function) {
            Obj::Function(f) => f.upvalue_count,
            _ => unreachable!("CLOSURE's operand always names a function"),
        };
        let base = self.frame().slots_base;
        let mut upvalues = Vec::with_capacity(upvalue_count);
        for _ in 0..upvalue_count {
            let is_local = self.read_byte();
            let index = self.read_byte() as usize;
            upvalues.push(if is_local != 0 {
                self.capture_upvalue(base + index)
            } else {
                self.current_upvalue(index)
            });
        }
        let closure = self.allocate(Obj::Closure(ObjClosure::new(function, upvalues)));
        self.push(Value::Obj(closure));
    }
}
