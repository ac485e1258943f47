//! Root marking, the gray-stack trace loop, and the weak-reference sweep
//! of the string-intern table between trace and sweep.
//!
//! `collect_garbage` is invoked synchronously from [`super::Vm::allocate`]
//! whenever [`crate::heap::Heap::should_collect`] says so; there is no
//! background thread and no incremental phase. The whole cycle runs to
//! completion before the allocation that triggered it proceeds.

use super::Vm;
use crate::heap::HEAP_GROW_FACTOR;

impl Vm {
    /// Run one full mark-and-sweep cycle.
    pub(super) fn collect_garbage(&mut self) {
        self.mark_roots();
        self.trace_references();
        // Weak-reference sweep: an interned string that nothing else
        // reaches is dropped from the table before the sweep frees it,
        // so a later `find_string` never resurrects a dangling handle.
        self.strings.remove_white(&self.heap);
        self.heap.sweep();
        self.heap.next_gc = self.heap.bytes_allocated * HEAP_GROW_FACTOR;
    }

    /// Mark every root: the operand stack, every frame's closure, every
    /// open upvalue, the globals table, the cached `init` string, and
    /// whatever the compiler collaborator declares live.
    fn mark_roots(&mut self) {
        for i in 0..self.stack.len() {
            let value = self.stack[i];
            self.heap.mark_value(value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        for &upvalue in &self.open_upvalues {
            self.heap.mark_object(upvalue);
        }
        self.globals.mark_table(&mut self.heap);
        if let Some(init) = self.init_string {
            self.heap.mark_object(init);
        }
        if let Some(roots) = self.compiler_roots.as_deref() {
            roots.mark_roots(&mut self.heap);
        }
    }

    /// Drain the gray worklist, blackening each object (marking everything
    /// it directly references) until nothing gray remains.
    fn trace_references(&mut self) {
        while let Some(object) = self.heap.pop_gray() {
            self.heap.blacken(object);
        }
    }
}
