//! # Wisp VM
//!
//! Runtime core for Wisp, a tree-free, stack-based bytecode virtual machine
//! for a small class-based scripting language: dynamic typing, first-class
//! functions, lexical closures, single inheritance, and string interning.
//!
//! This crate provides:
//! - a tagged dynamic [`value`] type and a per-object tagged [`value::Obj`]
//! - [`bytecode`]: a linear instruction stream with line metadata and a
//!   constant pool
//! - [`table`]: the open-addressed hash table used as globals, method
//!   tables, field tables, and the string-intern table
//! - [`heap`]: allocation accounting and a tri-color mark-and-sweep
//!   collector
//! - [`vm`]: the operand-stack interpreter — call frames, upvalues, method
//!   dispatch, and the opcode dispatch loop
//!
//! The lexer, parser, and compiler that turn source text into a [`bytecode::Chunk`]
//! are deliberately **not** part of this crate: it is the runtime core only.
//! A compiler collaborator calls into [`Vm`] to intern strings and allocate
//! functions via [`Vm::alloc_function`], and registers a [`vm::CompilerRoots`]
//! implementation so in-progress compiler state is visited during root
//! marking.

pub mod bytecode;
pub mod error;
pub mod hash;
pub mod heap;
pub mod native;
pub mod table;
pub mod value;
pub mod vm;

pub use error::{InterpretResult, RuntimeError};
pub use vm::{CompilerRoots, Vm};

/// Crate version, as published in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
