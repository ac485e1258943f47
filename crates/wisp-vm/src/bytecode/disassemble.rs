//! A minimal chunk disassembler.
//!
//! A full standalone disassembler binary is outside this crate's scope;
//! this module exists only so that runtime error reporting and tests can
//! render an instruction for diagnostics without duplicating the opcode
//! table.

use super::{Chunk, OpCode};

/// Render the instruction at `offset` as `"LINE  OPCODE  operand"`, returning
/// the offset of the next instruction.
#[must_use]
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let line = chunk.line_at(offset);
    let op = OpCode::from_byte(chunk.code[offset]);
    let (name, next) = match op {
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call
        | OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::GetSuper
        | OpCode::Class
        | OpCode::Method => {
            let operand = chunk.code[offset + 1];
            (format!("{op:?} {operand}"), offset + 2)
        }
        OpCode::Invoke | OpCode::SuperInvoke => {
            let name_idx = chunk.code[offset + 1];
            let argc = chunk.code[offset + 2];
            (format!("{op:?} {name_idx} ({argc} args)"), offset + 3)
        }
        OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => {
            let hi = u16::from(chunk.code[offset + 1]);
            let lo = u16::from(chunk.code[offset + 2]);
            let jump = (hi << 8) | lo;
            (format!("{op:?} -> {jump}"), offset + 3)
        }
        OpCode::Closure => {
            // Upvalue count lives on the function object on the heap, which
            // this standalone disassembler does not resolve; callers that
            // need full fidelity should walk the heap directly.
            let fn_idx = chunk.code[offset + 1];
            (format!("{op:?} {fn_idx}"), offset + 2)
        }
        _ => (format!("{op:?}"), offset + 1),
    };
    (format!("{line:04}  {name}"), next)
}
