//! Target description (C6): the CPU/OS table, per-target type sizing and
//! field alignment, and the x86 register catalog with parent/child aliasing
//! and bitmask identities.
//!
//! Grounded on `examples/original_source/src/target/cpus/x86/cpus.c` (the
//! `cpu8086`/`cpui386`/`cpui686`/`cpux86_64` table, `-mcpu` selection) and
//! `src/target/cpus/x86/emit.c`'s `NEW_REG` table (every architectural
//! sub-register sharing one identity bit with its parent — `al`/`ah`/`ax`/
//! `eax`/`rax` all alias bit 0). The teacher has no target-description
//! module of its own, so the bitmask idiom is imported from
//! `examples/messense-llvm-bitcode-rs`'s use of the `bitflags` crate rather
//! than hand-rolled (DESIGN.md, C6).

use bitflags::bitflags;

use crate::types::{CType, PrimitiveKind};

pub mod x86 {
    use super::*;

    bitflags! {
        /// One bit per architectural register *identity* (spec.md §3
        /// "Location": "Register identities use a bitmask so that a
        /// half-register is the union of its parts"). `RAX` is the same bit
        /// whether reached through `al`, `ax`, `eax`, or `rax` — this crate
        /// only ever materializes the full-width identity since it has no
        /// sub-register addressing of its own, but the mask-union semantics
        /// (`overlaps`) are what the allocator and lowering rely on.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct RegisterMask: u32 {
            const RAX = 1 << 0;
            const RBX = 1 << 1;
            const RCX = 1 << 2;
            const RDX = 1 << 3;
            const RSP = 1 << 4;
            const RBP = 1 << 5;
            const RSI = 1 << 6;
            const RDI = 1 << 7;
            const R8  = 1 << 8;
            const R9  = 1 << 9;
            const R10 = 1 << 10;
            const R11 = 1 << 11;
            const R12 = 1 << 12;
            const R13 = 1 << 13;
            const R14 = 1 << 14;
            const R15 = 1 << 15;

            // Synthetic condition-flag "registers" (spec.md §4.4): a
            // compare's result lives here rather than in a general-purpose
            // register, named by the predicate it carries.
            const EFLAG  = 1 << 16;
            const NEFLAG = 1 << 17;
            const GFLAG  = 1 << 18;
            const GEFLAG = 1 << 19;
            const LFLAG  = 1 << 20;
            const LEFLAG = 1 << 21;
        }
    }

    impl RegisterMask {
        pub fn overlaps(&self, other: RegisterMask) -> bool {
            self.intersects(other)
        }

        /// The individual set identities, in ascending bit order — used to
        /// render a composite location's register names (spec.md §4.6).
        pub fn iter_ids(&self) -> impl Iterator<Item = RegisterId> + '_ {
            RegisterId::ALL.iter().copied().filter(move |id| self.contains(id.mask()))
        }
    }

    /// A single architectural register identity, named the way
    /// `examples/original_source`'s `NEW_REG` table names its full-width
    /// members (`rax`, `rbx`, ...), plus the six synthetic flag registers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum RegisterId {
        Rax,
        Rbx,
        Rcx,
        Rdx,
        Rsp,
        Rbp,
        Rsi,
        Rdi,
        R8,
        R9,
        R10,
        R11,
        R12,
        R13,
        R14,
        R15,
        EFlag,
        NeFlag,
        GFlag,
        GeFlag,
        LFlag,
        LeFlag,
    }

    impl RegisterId {
        pub const ALL: &'static [RegisterId] = &[
            RegisterId::Rax,
            RegisterId::Rbx,
            RegisterId::Rcx,
            RegisterId::Rdx,
            RegisterId::Rsp,
            RegisterId::Rbp,
            RegisterId::Rsi,
            RegisterId::Rdi,
            RegisterId::R8,
            RegisterId::R9,
            RegisterId::R10,
            RegisterId::R11,
            RegisterId::R12,
            RegisterId::R13,
            RegisterId::R14,
            RegisterId::R15,
            RegisterId::EFlag,
            RegisterId::NeFlag,
            RegisterId::GFlag,
            RegisterId::GeFlag,
            RegisterId::LFlag,
            RegisterId::LeFlag,
        ];

        pub fn mask(self) -> RegisterMask {
            match self {
                RegisterId::Rax => RegisterMask::RAX,
                RegisterId::Rbx => RegisterMask::RBX,
                RegisterId::Rcx => RegisterMask::RCX,
                RegisterId::Rdx => RegisterMask::RDX,
                RegisterId::Rsp => RegisterMask::RSP,
                RegisterId::Rbp => RegisterMask::RBP,
                RegisterId::Rsi => RegisterMask::RSI,
                RegisterId::Rdi => RegisterMask::RDI,
                RegisterId::R8 => RegisterMask::R8,
                RegisterId::R9 => RegisterMask::R9,
                RegisterId::R10 => RegisterMask::R10,
                RegisterId::R11 => RegisterMask::R11,
                RegisterId::R12 => RegisterMask::R12,
                RegisterId::R13 => RegisterMask::R13,
                RegisterId::R14 => RegisterMask::R14,
                RegisterId::R15 => RegisterMask::R15,
                RegisterId::EFlag => RegisterMask::EFLAG,
                RegisterId::NeFlag => RegisterMask::NEFLAG,
                RegisterId::GFlag => RegisterMask::GFLAG,
                RegisterId::GeFlag => RegisterMask::GEFLAG,
                RegisterId::LFlag => RegisterMask::LFLAG,
                RegisterId::LeFlag => RegisterMask::LEFLAG,
            }
        }

        /// AT&T/NASM register operand text, sans syntax-specific prefix
        /// (the emitter's `Syntax` trait adds `%` in AT&T mode).
        pub fn name(self) -> &'static str {
            match self {
                RegisterId::Rax => "rax",
                RegisterId::Rbx => "rbx",
                RegisterId::Rcx => "rcx",
                RegisterId::Rdx => "rdx",
                RegisterId::Rsp => "rsp",
                RegisterId::Rbp => "rbp",
                RegisterId::Rsi => "rsi",
                RegisterId::Rdi => "rdi",
                RegisterId::R8 => "r8",
                RegisterId::R9 => "r9",
                RegisterId::R10 => "r10",
                RegisterId::R11 => "r11",
                RegisterId::R12 => "r12",
                RegisterId::R13 => "r13",
                RegisterId::R14 => "r14",
                RegisterId::R15 => "r15",
                RegisterId::EFlag => "e",
                RegisterId::NeFlag => "ne",
                RegisterId::GFlag => "g",
                RegisterId::GeFlag => "ge",
                RegisterId::LFlag => "l",
                RegisterId::LeFlag => "le",
            }
        }
    }

    impl std::fmt::Display for RegisterId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.name())
        }
    }

    /// The compare predicate a `cmp*` opcode lowers to (spec.md §4.4): each
    /// names the synthetic flag register its boolean result is pinned to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FlagPredicate {
        Eq,
        NotEq,
        Gt,
        GtEq,
        Lt,
        LtEq,
    }

    impl FlagPredicate {
        pub fn register(self) -> RegisterMask {
            match self {
                FlagPredicate::Eq => RegisterMask::EFLAG,
                FlagPredicate::NotEq => RegisterMask::NEFLAG,
                FlagPredicate::Gt => RegisterMask::GFLAG,
                FlagPredicate::GtEq => RegisterMask::GEFLAG,
                FlagPredicate::Lt => RegisterMask::LFLAG,
                FlagPredicate::LtEq => RegisterMask::LEFLAG,
            }
        }

        /// The conditional-jump mnemonic this predicate emits (spec.md
        /// §4.6 "Split").
        pub fn jump_mnemonic(self) -> &'static str {
            match self {
                FlagPredicate::Eq => "je",
                FlagPredicate::NotEq => "jne",
                FlagPredicate::Gt => "jg",
                FlagPredicate::GtEq => "jge",
                FlagPredicate::Lt => "jl",
                FlagPredicate::LtEq => "jle",
            }
        }

        /// The predicate with its sense flipped — used when the emitter
        /// inverts a `split` to land its fall-through on the true edge
        /// (spec.md §4.6 "Split").
        pub fn inverted(self) -> FlagPredicate {
            match self {
                FlagPredicate::Eq => FlagPredicate::NotEq,
                FlagPredicate::NotEq => FlagPredicate::Eq,
                FlagPredicate::Gt => FlagPredicate::LtEq,
                FlagPredicate::GtEq => FlagPredicate::Lt,
                FlagPredicate::Lt => FlagPredicate::GtEq,
                FlagPredicate::LtEq => FlagPredicate::Gt,
            }
        }
    }
}

/// Assembly syntax flavor (spec.md §4.6 "Syntax selection"), a process-wide
/// selection established once at startup (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmFlavor {
    Att,
    Nasm,
}

impl AsmFlavor {
    /// Parses the `-masm=` flag's argument (spec.md §6): `att`/`gas` select
    /// AT&T, `intel`/`nasm`/`masm` select NASM/Intel syntax (this crate does
    /// not distinguish MASM from NASM's operand order, matching
    /// `examples/original_source`'s two-flavor `enum asmflavor`).
    pub fn parse(s: &str) -> Option<AsmFlavor> {
        match s {
            "att" | "gas" => Some(AsmFlavor::Att),
            "nasm" | "intel" | "masm" => Some(AsmFlavor::Nasm),
            _ => None,
        }
    }
}

/// A selectable CPU (spec.md §6 `-mcpu`), grounded on
/// `examples/original_source/src/target/cpus/x86/cpus.c`'s `cpu8086`/
/// `cpui386`/`cpui686`/`cpux86_64` table: name, integer bit-width, and a
/// stack-frame base-pointer offset ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    pub name: &'static str,
    pub bits: u32,
    pub frame_base_ordinal: u32,
}

impl Cpu {
    pub const CPU_8086: Cpu = Cpu { name: "8086", bits: 16, frame_base_ordinal: 0 };
    pub const CPU_I386: Cpu = Cpu { name: "i386", bits: 32, frame_base_ordinal: 1 };
    pub const CPU_I686: Cpu = Cpu { name: "i686", bits: 32, frame_base_ordinal: 2 };
    pub const CPU_X86_64: Cpu = Cpu { name: "x86_64", bits: 64, frame_base_ordinal: 3 };

    pub const ALL: &'static [Cpu] = &[Cpu::CPU_8086, Cpu::CPU_I386, Cpu::CPU_I686, Cpu::CPU_X86_64];

    pub fn by_name(name: &str) -> Option<Cpu> {
        Cpu::ALL.iter().copied().find(|c| c.name == name)
    }
}

/// The register sets an architecture exposes to the allocator (spec.md
/// §4.5 "Architecture description"): `{all integer regs, saved integer
/// regs, all float regs, saved float regs}`. This crate's IR has no
/// floating-point register allocation (spec.md §1 Non-goals: "floating-point
/// code generation beyond scalar placeholders"), so the float sets are
/// carried empty rather than omitted, keeping the record shape the spec
/// names.
#[derive(Debug, Clone, Copy)]
pub struct ArchDescription {
    pub all_int_regs: x86::RegisterMask,
    pub saved_int_regs: x86::RegisterMask,
    pub all_float_regs: x86::RegisterMask,
    pub saved_float_regs: x86::RegisterMask,
}

/// A fully resolved compilation target: CPU, OS, and assembly flavor
/// selection (spec.md §5, "process-wide... established once during option
/// parsing, read-only thereafter").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Windows,
    MacOs,
}

impl Os {
    /// Windows disables ANSI color by build policy (spec.md §6 footnote,
    /// SPEC_FULL §4.7).
    pub fn disables_ansi_color(self) -> bool {
        matches!(self, Os::Windows)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub cpu: Cpu,
    pub os: Os,
    pub flavor: AsmFlavor,
}

impl Target {
    pub fn x86_64_linux() -> Target {
        Target { cpu: Cpu::CPU_X86_64, os: Os::Linux, flavor: AsmFlavor::Att }
    }

    /// x86-64 System V: all = `{rax,rbx,rcx,rdx,rdi,rsi,r8..r15}`, saved =
    /// `{rbx,r12..r15}` (spec.md §4.5). `rsp`/`rbp` are reserved for the
    /// frame and never handed to the colorer.
    pub fn arch_description(&self) -> ArchDescription {
        use x86::RegisterMask as M;
        ArchDescription {
            all_int_regs: M::RAX
                | M::RBX
                | M::RCX
                | M::RDX
                | M::RDI
                | M::RSI
                | M::R8
                | M::R9
                | M::R10
                | M::R11
                | M::R12
                | M::R13
                | M::R14
                | M::R15,
            saved_int_regs: M::RBX | M::R12 | M::R13 | M::R14 | M::R15,
            all_float_regs: M::empty(),
            saved_float_regs: M::empty(),
        }
    }

    /// Size in bytes of `ty` on this target (spec.md §3 "Type", "a size in
    /// bytes (target-dependent)"). Delegates to `CType::size_bytes` for the
    /// LP64 layout this crate's only supported target (`x86_64`) uses;
    /// narrower CPU selections (`-mcpu=i386`) shrink pointer/long width,
    /// matching `examples/original_source`'s `gettypesize`.
    pub fn size_of(&self, ty: &CType) -> usize {
        match ty.unqualified() {
            CType::Primitive(PrimitiveKind::Long) | CType::Primitive(PrimitiveKind::ULong)
                if self.cpu.bits < 64 =>
            {
                4
            }
            CType::Pointer(_) | CType::Function { .. } if self.cpu.bits < 64 => (self.cpu.bits / 8) as usize,
            other => other.size_bytes(),
        }
    }

    /// Byte alignment of a record field at the given sequential offset —
    /// the natural alignment of the field's own type, capped by the
    /// target's word size. A faithful bit-field/packing model is out of
    /// scope (spec.md §1 Non-goals: "bit-fields").
    pub fn field_alignment(&self, field_ty: &CType) -> usize {
        self.size_of(field_ty).max(1).min((self.cpu.bits / 8) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::x86::{FlagPredicate, RegisterId, RegisterMask};

    #[test]
    fn register_masks_overlap_only_when_shared() {
        assert!(RegisterMask::RAX.overlaps(RegisterMask::RAX));
        assert!(!RegisterMask::RAX.overlaps(RegisterMask::RBX));
    }

    #[test]
    fn flag_predicates_invert() {
        assert_eq!(FlagPredicate::Eq.inverted(), FlagPredicate::NotEq);
        assert_eq!(FlagPredicate::Gt.inverted(), FlagPredicate::LtEq);
    }

    #[test]
    fn cpu_lookup_by_name() {
        assert_eq!(Cpu::by_name("x86_64"), Some(Cpu::CPU_X86_64));
        assert_eq!(Cpu::by_name("bogus"), None);
    }

    #[test]
    fn sv_abi_caller_saved_excludes_callee_saved() {
        let desc = Target::x86_64_linux().arch_description();
        let caller_saved = desc.all_int_regs.difference(desc.saved_int_regs);
        assert!(caller_saved.contains(RegisterMask::RAX));
        assert!(!caller_saved.contains(RegisterMask::RBX));
    }

    #[test]
    fn iter_ids_renders_register_names() {
        let mask = RegisterMask::RAX | RegisterMask::RDX;
        let ids: Vec<RegisterId> = mask.iter_ids().collect();
        assert_eq!(ids, vec![RegisterId::Rax, RegisterId::Rdx]);
    }

    #[test]
    fn asm_flavor_parses_all_aliases() {
        assert_eq!(AsmFlavor::parse("att"), Some(AsmFlavor::Att));
        assert_eq!(AsmFlavor::parse("gas"), Some(AsmFlavor::Att));
        assert_eq!(AsmFlavor::parse("nasm"), Some(AsmFlavor::Nasm));
        assert_eq!(AsmFlavor::parse("intel"), Some(AsmFlavor::Nasm));
        assert_eq!(AsmFlavor::parse("masm"), Some(AsmFlavor::Nasm));
        assert_eq!(AsmFlavor::parse("bogus"), None);
    }
}
