//! x86 target lowering (C7): pre-register-allocation IR rewrites that make
//! every instruction satisfiable by a real x86 encoding.
//!
//! Grounded on `examples/original_source/src/target/cpus/x86/emit.c`'s
//! `x86_restrict*` family, called once per instruction before register
//! allocation runs. Four ISA constraints the typed IR itself knows nothing
//! about get made explicit here as ordinary `mov`/`clobb` instructions plus
//! `loc` tags the allocator (C8) treats as pre-pinned colors:
//!
//! - `x86_restrictarith`: asymmetric arithmetic (`sub`, `div`, shifts) needs
//!   its result in the same location as its left operand. When that operand
//!   isn't already an SSA instruction (a literal or `undef`), a `mov` of it
//!   is inserted immediately before and the original instruction is
//!   rewritten to read from it; an operand that's already an instruction
//!   already has a location of its own, so no mov is needed.
//! - `x86_restrictmul`: unsigned `mul` reads `rax`, writes the low half to
//!   `rax` and the high half to `rdx` — pinned here, with an explicit
//!   `clobb` of `rdx` so the allocator never assigns a live value there.
//! - `x86_restrictcmp`: a compare's result is a condition-flag location
//!   rather than a general register.
//! - `x86_restrictret`: the returned value is moved into `rax` immediately
//!   before `ret`, matching the System V/cdecl return-value convention.
//!
//! Each rewrite only ever inserts instructions and pins tags; it never
//! deletes or reorders anything the optimizer (C5) has already settled.

use crate::ir::container::Container;
use crate::ir::instr::{Opcode, Value};
use crate::ir::value::{tag_names, Location, TagPayload};
use crate::ir::{BlockId, InstrId};
use crate::target::x86::{FlagPredicate, RegisterMask};
use crate::target::Target;
use crate::types::CType;

pub struct Lowering<'t> {
    target: &'t Target,
}

impl<'t> Lowering<'t> {
    pub fn new(target: &'t Target) -> Lowering<'t> {
        Lowering { target }
    }

    /// Runs every restriction pass over every live instruction in the
    /// container, in lexical-chain block order (spec.md §4.6).
    pub fn lower(&self, container: &mut Container) {
        for block in container.lexical_order() {
            self.lower_block(container, block);
        }
    }

    fn lower_block(&self, container: &mut Container, block: BlockId) {
        // Each rewrite may insert instructions ahead of or after the one
        // it targets, so the ids are snapshotted up front and re-checked
        // for liveness on use rather than iterated by index into a list
        // that is changing length underneath us.
        let ids = container.block(block).instrs.clone();
        for id in ids {
            if !container.instr_exists(id) {
                continue;
            }
            let opcode = container.instr(id).opcode.clone();
            match opcode {
                Opcode::Mul(a, b) => self.restrict_mul(container, id, a, b),
                Opcode::Sub(..)
                | Opcode::Div(..)
                | Opcode::IDiv(..)
                | Opcode::Rem(..)
                | Opcode::Shl(..)
                | Opcode::Shr(..)
                | Opcode::Sal(..)
                | Opcode::Sar(..) => self.restrict_arith(container, id, opcode),
                Opcode::CmpEq(..)
                | Opcode::CmpNeq(..)
                | Opcode::CmpLt(..)
                | Opcode::CmpLte(..)
                | Opcode::CmpGt(..)
                | Opcode::CmpGte(..) => self.restrict_cmp(container, id, &opcode),
                Opcode::Ret(v) => self.restrict_ret(container, id, v),
                _ => {}
            }
        }
    }

    /// Asymmetric arithmetic: `sub %r, 1` must execute as `r -= 1` in
    /// place, so the left operand first needs a location of its own that
    /// the instruction's result can then reuse — a `mov` materializes that
    /// location and the instruction is rewritten to read from it instead
    /// of the original value (`x86_restrictarith`, the `!x86_issymm` arm).
    /// Only needed when the left operand isn't already an instruction: an
    /// instruction already has a location of its own the emitter can check
    /// against the destination (`x86_restrictarith`'s `head->etype ==
    /// ITME_INSTRUCTION` early return); inserting a mov there would just
    /// add a redundant register copy.
    fn restrict_arith(&self, container: &mut Container, id: InstrId, opcode: Opcode) {
        let (lhs, rest) = match &opcode {
            Opcode::Sub(a, b) => (*a, Opcode::Sub(Value::Undef, *b)),
            Opcode::Div(a, b) => (*a, Opcode::Div(Value::Undef, *b)),
            Opcode::IDiv(a, b) => (*a, Opcode::IDiv(Value::Undef, *b)),
            Opcode::Rem(a, b) => (*a, Opcode::Rem(Value::Undef, *b)),
            Opcode::Shl(a, b) => (*a, Opcode::Shl(Value::Undef, *b)),
            Opcode::Shr(a, b) => (*a, Opcode::Shr(Value::Undef, *b)),
            Opcode::Sal(a, b) => (*a, Opcode::Sal(Value::Undef, *b)),
            Opcode::Sar(a, b) => (*a, Opcode::Sar(Value::Undef, *b)),
            _ => unreachable!("restrict_arith only called for asymmetric binary opcodes"),
        };
        if matches!(lhs, Value::Instr(_)) {
            return;
        }
        let ty = container.instr(id).ty.clone();
        let mov = container.insert_instr_before(id, ty, Opcode::Mov(lhs));
        let rewritten = substitute_first_operand(rest, Value::Instr(mov));
        container.instr_mut(id).opcode = rewritten;
    }

    /// Unsigned multiply: the left operand must already be in `rax`, the
    /// low-order result lands in `rax`, and `rdx` is clobbered regardless of
    /// operand width (`x86_restrictmul`).
    fn restrict_mul(&self, container: &mut Container, id: InstrId, a: Value, b: Value) {
        debug_assert!(self.target.arch_description().all_int_regs.contains(RegisterMask::RAX));
        let ty = container.instr(id).ty.clone();
        let mov = container.insert_instr_before(id, ty.clone(), Opcode::Mov(a));
        container.set_tag(mov, tag_names::LOC, TagPayload::Location(Location::Register(RegisterMask::RAX)));
        container.instr_mut(id).opcode = Opcode::Mul(Value::Instr(mov), b);
        container.set_tag(id, tag_names::LOC, TagPayload::Location(Location::Register(RegisterMask::RAX)));
        let clobber = container.insert_instr_after(id, CType::VOID, Opcode::Clobb);
        container.set_tag(clobber, tag_names::LOC, TagPayload::Location(Location::Register(RegisterMask::RDX)));
    }

    /// A compare's natural x86 home is a condition-flag location, not a
    /// general register — pin that location so the allocator never tries
    /// to color it into one, and a fallthrough-aware `split` consuming it
    /// can be emitted as a single conditional jump (`x86_restrictcmp`).
    fn restrict_cmp(&self, container: &mut Container, id: InstrId, opcode: &Opcode) {
        let predicate = match opcode {
            Opcode::CmpEq(..) => FlagPredicate::Eq,
            Opcode::CmpNeq(..) => FlagPredicate::NotEq,
            Opcode::CmpLt(..) => FlagPredicate::Lt,
            Opcode::CmpLte(..) => FlagPredicate::LtEq,
            Opcode::CmpGt(..) => FlagPredicate::Gt,
            Opcode::CmpGte(..) => FlagPredicate::GtEq,
            _ => unreachable!("restrict_cmp only called for compare opcodes"),
        };
        container.set_tag(id, tag_names::LOC, TagPayload::Location(Location::Register(predicate.register())));
    }

    /// The returned value is moved into `rax` immediately before `ret`
    /// (`x86_restrictret`); `ret`-void (`Opcode::Leave`) needs no such move.
    fn restrict_ret(&self, container: &mut Container, id: InstrId, value: Value) {
        let ty = container.instr(id).ty.clone();
        let rax = RegisterMask::RAX;
        let mov = container.insert_instr_before(id, ty, Opcode::Mov(value));
        container.set_tag(mov, tag_names::LOC, TagPayload::Location(Location::Register(rax)));
        container.instr_mut(id).opcode = Opcode::Ret(Value::Instr(mov));
    }
}

/// Rewrites only the first value-operand of a freshly-constructed binary
/// opcode — used right after building a placeholder copy of the original
/// opcode with `Value::Undef` standing in for the left operand.
fn substitute_first_operand(opcode: Opcode, new_lhs: Value) -> Opcode {
    match opcode {
        Opcode::Sub(_, b) => Opcode::Sub(new_lhs, b),
        Opcode::Div(_, b) => Opcode::Div(new_lhs, b),
        Opcode::IDiv(_, b) => Opcode::IDiv(new_lhs, b),
        Opcode::Rem(_, b) => Opcode::Rem(new_lhs, b),
        Opcode::Shl(_, b) => Opcode::Shl(new_lhs, b),
        Opcode::Shr(_, b) => Opcode::Shr(new_lhs, b),
        Opcode::Sal(_, b) => Opcode::Sal(new_lhs, b),
        Opcode::Sar(_, b) => Opcode::Sar(new_lhs, b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::ir::container::{Container, Linkage};

    fn function_container() -> Container {
        Container::new(
            "f",
            Linkage::Global,
            CType::Function { return_type: Box::new(CType::INT), parameters: vec![] },
        )
    }

    #[test]
    fn sub_gets_a_dedicated_lhs_mov() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 10);
            let y = b.const_int(CType::INT, 3);
            let diff = b.build_sub(x, y, CType::INT).unwrap();
            b.build_ret(diff).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        let entry = c.entry.unwrap();
        let instrs = c.block(entry).instrs.clone();
        let sub_pos = instrs.iter().position(|id| matches!(c.instr(*id).opcode, Opcode::Sub(..))).unwrap();
        assert!(matches!(c.instr(instrs[sub_pos - 1]).opcode, Opcode::Mov(..)));
        if let Opcode::Sub(Value::Instr(lhs), _) = &c.instr(instrs[sub_pos]).opcode {
            assert_eq!(*lhs, instrs[sub_pos - 1]);
        } else {
            panic!("expected a rewritten sub");
        }
    }

    #[test]
    fn sub_with_an_instruction_lhs_gets_no_extra_mov() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        let sub_id;
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 10);
            let y = b.const_int(CType::INT, 3);
            let lhs = b.build_add(x, y, CType::INT).unwrap();
            let diff = b.build_sub(lhs, y, CType::INT).unwrap();
            sub_id = diff.as_instr().unwrap();
            b.build_ret(diff).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        let entry = c.entry.unwrap();
        let instrs = c.block(entry).instrs.clone();
        let sub_pos = instrs.iter().position(|id| *id == sub_id).unwrap();
        assert!(
            !matches!(c.instr(instrs[sub_pos - 1]).opcode, Opcode::Mov(..)),
            "an already-SSA left operand needs no dedicated mov"
        );
    }

    #[test]
    fn unsigned_mul_clobbers_rdx_and_pins_rax() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::UINT, 6);
            let y = b.const_int(CType::UINT, 7);
            let product = b.build_mul(x, y, CType::UINT).unwrap();
            b.build_ret(product).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        let entry = c.entry.unwrap();
        let instrs = c.block(entry).instrs.clone();
        let mul_pos = instrs.iter().position(|id| matches!(c.instr(*id).opcode, Opcode::Mul(..))).unwrap();
        let clobber = instrs[mul_pos + 1];
        assert!(matches!(c.instr(clobber).opcode, Opcode::Clobb));
        let loc = c.get_tag(clobber, tag_names::LOC).unwrap();
        assert_eq!(loc.payload, TagPayload::Location(Location::Register(RegisterMask::RDX)));
    }

    #[test]
    fn compare_is_tagged_with_its_flag_register() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        let cmp_id;
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 1);
            let y = b.const_int(CType::INT, 2);
            cmp_id = b.build_cmplt(x, y).unwrap().as_instr().unwrap();
            b.build_ret(x).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        let loc = c.get_tag(cmp_id, tag_names::LOC).unwrap();
        assert_eq!(loc.payload, TagPayload::Location(Location::Register(FlagPredicate::Lt.register())));
    }

    #[test]
    fn return_value_is_moved_into_rax() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 42);
            b.build_ret(x).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        let entry = c.entry.unwrap();
        let instrs = c.block(entry).instrs.clone();
        let ret_pos = instrs.iter().position(|id| matches!(c.instr(*id).opcode, Opcode::Ret(..))).unwrap();
        let mov = instrs[ret_pos - 1];
        assert!(matches!(c.instr(mov).opcode, Opcode::Mov(..)));
        let loc = c.get_tag(mov, tag_names::LOC).unwrap();
        assert_eq!(loc.payload, TagPayload::Location(Location::Register(RegisterMask::RAX)));
    }
}
