//! `accir` — the middle-end and back-end core of a self-contained C
//! compiler: a typed, block-structured SSA-like IR (C1-C2), a builder that
//! enforces its placement invariants (C3), dataflow analyses (C4), an
//! optimizer (C5), an x86 target description (C6), pre-allocation target
//! lowering (C7), a graph-colored register allocator (C8), and an
//! AT&T/NASM emitter (C9).
//!
//! The tokenizer, parsers, and source-level diagnostics driver are external
//! collaborators (spec.md §1): this crate exposes the builder API they call
//! into and the passes that run after it. `bin/accir.rs` is a small facade
//! over a minimal expression surface, included only to exercise the ambient
//! stack (CLI, logging, diagnostics) end to end — not a C front end.

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod ir;
pub mod ir_text;
pub mod lowering;
pub mod optimizer;
pub mod regalloc;
pub mod target;
pub mod types;

pub mod builder;

pub use builder::Builder;
pub use config::CompileOptions;
pub use diagnostics::{Diagnostic, DiagnosticSink, Severity};
pub use emitter::Emitter;
pub use ir::container::{Container, Linkage};
pub use lowering::Lowering;
pub use optimizer::{Optimizer, OptimizationLevel};
pub use regalloc::RegisterAllocator;
pub use target::Target;
pub use types::CType;

/// Runs the full per-container pipeline (spec.md §5 "Ordering guarantees"):
/// optimize, lower for the target, allocate registers, in that strict
/// order. Emission is left to the caller since it operates over every
/// container in a compilation unit at once (spec.md §4.6).
pub fn compile_container(container: &mut Container, target: &Target, level: OptimizationLevel) -> OptimizationStatsReport {
    let mut optimizer = Optimizer::new(level);
    optimizer.optimize(container);
    Lowering::new(target).lower(container);
    RegisterAllocator::new(target).allocate(container);
    OptimizationStatsReport(optimizer.stats().clone())
}

/// Thin wrapper so callers outside this crate don't need to name
/// `optimizer::OptimizationStats` directly when all they want is the count
/// summary for a `-v` log line.
#[derive(Debug, Clone, Default)]
pub struct OptimizationStatsReport(pub optimizer::OptimizationStats);
