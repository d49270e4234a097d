//! Error types produced while constructing, optimizing, and lowering the IR.

use thiserror::Error;

use crate::types::CType;

/// Errors raised by the IR builder (C3) when a constructor would violate an
/// invariant from the data model (spec.md §3): wrong operand type, phi arity
/// mismatch, a non-terminator appended after a terminator, and so on.
///
/// These are recoverable from the caller's point of view — a parser can
/// catch one, emit a non-fatal diagnostic, and keep going — so they are
/// ordinary `Result` errors, never panics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuilderError {
    #[error("operand type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: CType, found: CType },

    #[error("phi for block with {predecessors} predecessor(s) given {operands} source(s)")]
    PhiArityMismatch { predecessors: usize, operands: usize },

    #[error("phi source value has type {found}, block result type is {expected}")]
    PhiTypeMismatch { expected: CType, found: CType },

    #[error("block already terminated by a previous instruction")]
    BlockAlreadyTerminated,

    #[error("alloca requested outside of the entry block")]
    AllocaOutsideEntry,

    #[error("unknown container: {0}")]
    UnknownContainer(String),

    #[error("unknown block: {0:?}")]
    UnknownBlock(crate::ir::BlockId),

    #[error("value does not belong to this container")]
    ForeignValue,

    #[error("deepptr index {index} out of range for pointee with {fields} member(s)")]
    IndexOutOfRange { index: usize, fields: usize },

    #[error("deepptr applied to a pointee that is neither a record, array, nor pointer")]
    NotIndexable,
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Errors that signal a violated internal invariant (spec.md §7: "Internal").
/// These always indicate a compiler bug — an opcode dispatched on an
/// unexpected type, a pass invariant broken between phases — and are never
/// recovered from; they exist so the driver can report them as bugs rather
/// than unwinding via a bare panic.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InternalError {
    #[error("register allocator could not color instruction {0:?}: no free register in either class")]
    AllocationFailed(crate::ir::InstrId),

    #[error("instruction {0:?} missing required location tag after register allocation")]
    MissingLocation(crate::ir::InstrId),

    #[error("opcode {opcode} dispatched on unexpected operand type {found}")]
    UnexpectedOperandType { opcode: &'static str, found: CType },

    #[error("lowering pass produced a block matching neither `phi*; any*` nor `alloca*; phi*; any*`")]
    MalformedBlockShape,

    #[error("emitter encountered unresolved successor label for block {0:?}")]
    UnresolvedLabel(crate::ir::BlockId),
}

pub type InternalResult<T> = Result<T, InternalError>;
