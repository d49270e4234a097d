//! Configuration surface (C0, SPEC_FULL §4.8/§10): the `-std=`/`-f<ext>`
//! extension catalog and the `CompileOptions` record threaded explicitly
//! through the pipeline instead of living in global mutable state (spec.md
//! §5: only target selection and the enabled-extensions mask are
//! process-wide, and both are established once, read-only thereafter).
//!
//! Grounded on `examples/original_source/src/options.c`'s `-f`/`-fno-`
//! table for the exact extension names and `-std=` baselines; the
//! `bitflags` idiom is imported from `examples/messense-llvm-bitcode-rs`
//! the same way C6's register masks are (DESIGN.md, C6).

use bitflags::bitflags;

use crate::optimizer::OptimizationLevel;
use crate::target::{AsmFlavor, Cpu, Os, Target};

bitflags! {
    /// Language-extension toggles recognized by `-f<ext>`/`-fno-<ext>`
    /// (spec.md §6). This crate does not parse C source, so these flags are
    /// carried as inert configuration for a downstream parser to consult
    /// (SPEC_FULL §10), never read by the IR/optimizer/codegen passes
    /// themselves.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Extensions: u32 {
        const MIXED_DECLARATIONS       = 1 << 0;
        const BOOL                     = 1 << 1;
        const INLINE                   = 1 << 2;
        const LONG_LONG                = 1 << 3;
        const VLAS                     = 1 << 4;
        const COMPLEX                  = 1 << 5;
        const ONE_LINE_COMMENTS        = 1 << 6;
        const HEX_FLOAT                = 1 << 7;
        const LONG_DOUBLE              = 1 << 8;
        const DESIGNATED_INITIALIZERS  = 1 << 9;
        const COMPOUND_LITERALS        = 1 << 10;
        const VARIADIC_MACROS          = 1 << 11;
        const RESTRICT                 = 1 << 12;
        const UNIVERSAL_CHARACTER_NAMES = 1 << 13;
        const UNICODE_STRINGS          = 1 << 14;
        const UNSIGNED_CHAR            = 1 << 15;
        const BINARY_LITERALS          = 1 << 16;
        const DIGRAPHS                 = 1 << 17;
        const DIAGNOSTICS_COLOR        = 1 << 18;
    }
}

impl Extensions {
    /// Parses a single `-fname`/`-fno-name` flag body (without the leading
    /// `-f`), returning the bit and whether it is being enabled.
    pub fn parse_flag(body: &str) -> Option<(Extensions, bool)> {
        let (name, enable) = match body.strip_prefix("no-") {
            Some(rest) => (rest, false),
            None => (body, true),
        };
        let bit = match name {
            "mixed-declarations" => Extensions::MIXED_DECLARATIONS,
            "bool" => Extensions::BOOL,
            "inline" => Extensions::INLINE,
            "long-long" => Extensions::LONG_LONG,
            "vlas" => Extensions::VLAS,
            "complex" => Extensions::COMPLEX,
            "one-line-comments" => Extensions::ONE_LINE_COMMENTS,
            "hex-float" => Extensions::HEX_FLOAT,
            "long-double" => Extensions::LONG_DOUBLE,
            "designated-initializers" => Extensions::DESIGNATED_INITIALIZERS,
            "compound-literals" => Extensions::COMPOUND_LITERALS,
            "variadic-macros" => Extensions::VARIADIC_MACROS,
            "restrict" => Extensions::RESTRICT,
            "universal-character-names" => Extensions::UNIVERSAL_CHARACTER_NAMES,
            "unicode-strings" => Extensions::UNICODE_STRINGS,
            "unsigned-char" => Extensions::UNSIGNED_CHAR,
            "binary-literals" => Extensions::BINARY_LITERALS,
            "digraphs" => Extensions::DIGRAPHS,
            "diagnostics-color" => Extensions::DIAGNOSTICS_COLOR,
            _ => return None,
        };
        Some((bit, enable))
    }
}

/// `-std=` baseline (spec.md §6): selects the extension set a standard
/// revision enables before any individual `-f`/`-fno-` flag is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Std {
    C89,
    C95,
    C99,
}

impl Std {
    pub fn parse(s: &str) -> Option<Std> {
        match s {
            "c89" => Some(Std::C89),
            "c95" => Some(Std::C95),
            "c99" => Some(Std::C99),
            _ => None,
        }
    }

    /// Baseline extensions enabled by this standard, grounded on
    /// `options.c`'s `std_*` tables: C89 is the bare baseline, C95 adds
    /// digraphs and universal character names, C99 adds the rest the
    /// original gates behind `-std=c99` (`bool`, `long-long`,
    /// `one-line-comments`, `designated-initializers`, `compound-literals`,
    /// `variadic-macros`, `restrict`, `hex-float`).
    pub fn baseline_extensions(self) -> Extensions {
        match self {
            Std::C89 => Extensions::empty(),
            Std::C95 => Extensions::DIGRAPHS | Extensions::UNIVERSAL_CHARACTER_NAMES,
            Std::C99 => {
                Extensions::DIGRAPHS
                    | Extensions::UNIVERSAL_CHARACTER_NAMES
                    | Extensions::BOOL
                    | Extensions::LONG_LONG
                    | Extensions::ONE_LINE_COMMENTS
                    | Extensions::DESIGNATED_INITIALIZERS
                    | Extensions::COMPOUND_LITERALS
                    | Extensions::VARIADIC_MACROS
                    | Extensions::RESTRICT
                    | Extensions::HEX_FLOAT
            }
        }
    }
}

/// What to stop after (spec.md §6 `-S`/`-Sir`/`-c`, default: through
/// emission and on to assembling/linking, which is out of scope per
/// spec.md §1 — this crate only ever reaches `Assembly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAfter {
    Ir,
    Assembly,
    Assemble,
}

/// Fully parsed compilation options (SPEC_FULL §4.8), threaded explicitly
/// through the pipeline rather than read from global state — the one
/// exception spec.md §5 allows (target selection) is carried inside as a
/// `Target` value, itself read-only once constructed.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub inputs: Vec<String>,
    pub output: Option<String>,
    pub suppress_warnings: bool,
    pub optimization: OptimizationLevel,
    pub stop_after: StopAfter,
    pub std: Option<Std>,
    pub extensions: Extensions,
    pub target: Target,
}

impl CompileOptions {
    pub fn effective_extensions(&self) -> Extensions {
        self.std.map(Std::baseline_extensions).unwrap_or_default() | self.extensions
    }
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            inputs: Vec::new(),
            output: None,
            suppress_warnings: false,
            optimization: OptimizationLevel::None,
            stop_after: StopAfter::Assemble,
            std: None,
            extensions: Extensions::empty(),
            target: Target { cpu: Cpu::CPU_X86_64, os: Os::Linux, flavor: AsmFlavor::Att },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enable_and_disable() {
        assert_eq!(Extensions::parse_flag("bool"), Some((Extensions::BOOL, true)));
        assert_eq!(Extensions::parse_flag("no-bool"), Some((Extensions::BOOL, false)));
        assert_eq!(Extensions::parse_flag("not-a-real-extension"), None);
    }

    #[test]
    fn std_baseline_then_explicit_flag_can_override() {
        let mut opts = CompileOptions { std: Some(Std::C89), ..CompileOptions::default() };
        assert!(!opts.effective_extensions().contains(Extensions::BOOL));
        opts.extensions |= Extensions::BOOL;
        assert!(opts.effective_extensions().contains(Extensions::BOOL));
    }

    #[test]
    fn c99_baseline_includes_bool_and_restrict() {
        let opts = CompileOptions { std: Some(Std::C99), ..CompileOptions::default() };
        assert!(opts.effective_extensions().contains(Extensions::BOOL));
        assert!(opts.effective_extensions().contains(Extensions::RESTRICT));
    }

    #[test]
    fn asm_flavor_parses_all_aliases() {
        assert_eq!(AsmFlavor::parse("att"), Some(AsmFlavor::Att));
        assert_eq!(AsmFlavor::parse("gas"), Some(AsmFlavor::Att));
        assert_eq!(AsmFlavor::parse("nasm"), Some(AsmFlavor::Nasm));
        assert_eq!(AsmFlavor::parse("intel"), Some(AsmFlavor::Nasm));
        assert_eq!(AsmFlavor::parse("masm"), Some(AsmFlavor::Nasm));
    }
}
