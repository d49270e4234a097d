//! Register allocation (C8): assigns every non-void instruction a concrete
//! `Location`, given the `loc`/`lochint` pins target lowering (C7) already
//! planted.
//!
//! Grounded on `examples/original_source/src/target/asm.c`'s `regalloc`,
//! ported phase for phase:
//!
//! - `getovlps`/`rgetovlps`/`killinstrs` — build the interference
//!   ("overlap") map of which instructions are simultaneously alive.
//! - `induceregs`/`inducereg`/`deducereg` — chase `mov` chains so a moved
//!   value and the place it's moved into share a location hint, letting the
//!   emitter (C9) elide the `mov` entirely when the hint is honored.
//! - `resolvconfls`/`resolvconfl` — where two overlapping instructions hint
//!   the same register, the one with more uses keeps it.
//! - `asnrems`/`asnrem`/`getreg`/`rgetreg` — colors everything still
//!   unlocated from the caller-saved set, falling back to callee-saved.
//!
//! The original builds its overlap map with a recursive per-CFG-edge walk
//! (`rgetovlps` recurses into every successor, duplicating work along every
//! path to a merge block); this port instead reuses the already-fixpointed
//! `endlife` tags from `analysis::run_lifetime` and sweeps each container
//! once in lexical-block order, killing a value's membership in the `alive`
//! set the instant its endlife tag fires. This is exact for the
//! structured (if/while) control flow this crate's builder produces and a
//! safe over-approximation on more exotic merge shapes — a spurious overlap
//! only costs a register, never correctness, matching the conservative
//! direction `analysis.rs` already took over the original's recursive
//! `a_lifetime`.

use std::collections::{HashMap, HashSet};

use crate::analysis;
use crate::ir::container::Container;
use crate::ir::instr::{Opcode, Value};
use crate::ir::value::{tag_names, Location, Tag, TagPayload};
use crate::ir::InstrId;
use crate::target::x86::RegisterMask;
use crate::target::Target;

type OverlapMap = HashMap<InstrId, HashSet<InstrId>>;

pub struct RegisterAllocator<'t> {
    target: &'t Target,
}

impl<'t> RegisterAllocator<'t> {
    pub fn new(target: &'t Target) -> RegisterAllocator<'t> {
        RegisterAllocator { target }
    }

    /// Runs the full allocation pipeline over `container`, leaving every
    /// non-void instruction tagged with a final `loc` (`regalloc`).
    pub fn allocate(&self, container: &mut Container) {
        analysis::run_lifetime(container);
        let overlaps = self.build_overlaps(container);

        analysis::run_use_count(container);
        self.induce_registers(container);
        self.resolve_conflicts(container, &overlaps);
        self.assign_remainder(container, &overlaps);
    }

    fn build_overlaps(&self, container: &Container) -> OverlapMap {
        let trackable = |c: &Container, id: InstrId| {
            let instr = c.instr(id);
            !instr.is_void() && !instr.opcode.is_alloca()
        };

        let mut overlaps: OverlapMap = HashMap::new();
        for id in container.instr_ids() {
            if trackable(container, id) {
                overlaps.entry(id).or_default();
            }
        }

        let mut alive: HashSet<InstrId> = HashSet::new();
        for block in container.lexical_order() {
            for id in container.block(block).instrs.clone() {
                for dead in analysis::endlife_values(container, id) {
                    alive.remove(&dead);
                }
                if trackable(container, id) {
                    for &other in &alive {
                        overlaps.entry(id).or_default().insert(other);
                        overlaps.entry(other).or_default().insert(id);
                    }
                    alive.insert(id);
                }
            }
        }
        overlaps
    }

    /// `induceregs`: for every `mov` already pinned to a register location,
    /// hint that register to its operand (`inducereg`); for every `mov` not
    /// yet located, adopt whatever location or hint its operand carries
    /// (`deducereg`). The original threads the overlap dict through both
    /// helpers but never reads it; dropped here rather than carried unused.
    fn induce_registers(&self, container: &mut Container) {
        for block in container.lexical_order() {
            for id in container.block(block).instrs.clone() {
                self.inducereg(container, id);
                self.deducereg(container, id);
            }
        }
    }

    fn inducereg(&self, container: &mut Container, id: InstrId) {
        let Opcode::Mov(op) = container.instr(id).opcode.clone() else { return };
        let Some(Location::Register(mask)) = loc_of(container, id) else { return };
        let Value::Instr(opi) = op else { return };
        if loc_of(container, opi).is_some() {
            return;
        }
        container.set_tag(opi, tag_names::LOCHINT, TagPayload::Location(Location::Register(mask)));
    }

    fn deducereg(&self, container: &mut Container, id: InstrId) {
        let Opcode::Mov(op) = container.instr(id).opcode.clone() else { return };
        if loc_of(container, id).is_some() {
            return;
        }
        let Value::Instr(opi) = op else { return };
        let hint = loc_of(container, opi).or_else(|| lochint_of(container, opi));
        let Some(Location::Register(mask)) = hint else { return };
        container.set_tag(id, tag_names::LOCHINT, TagPayload::Location(Location::Register(mask)));
    }

    /// `resolvconfls`/`resolvconfl`: where two register-overlapping
    /// instructions both hint the same register, the one with strictly
    /// more uses keeps it; the loser's hint is stripped so `asnrems` gives
    /// it an uncontested register instead.
    ///
    /// The original's `resolvconfl` always returns its own argument — its
    /// "the higher-use neighbor wins" branch reassigns `winner` to the
    /// variable it was already holding rather than to the neighbor, a slip
    /// this port corrects so the higher-use instruction's hint is the one
    /// actually promoted (DESIGN.md, C8 Open Question).
    fn resolve_conflicts(&self, container: &mut Container, overlaps: &OverlapMap) {
        for block in container.lexical_order() {
            for id in container.block(block).instrs.clone() {
                let Some(winner) = self.resolve_conflict(container, id, overlaps) else { continue };
                if loc_of(container, winner).is_some() {
                    continue;
                }
                if let Some(loc) = lochint_of(container, winner) {
                    container.remove_tag(winner, tag_names::LOCHINT);
                    container.set_tag(winner, tag_names::LOC, TagPayload::Location(loc));
                }
            }
        }
    }

    fn resolve_conflict(&self, container: &mut Container, id: InstrId, overlaps: &OverlapMap) -> Option<InstrId> {
        let loc = lochint_of(container, id)?;
        let used = analysis::use_count(container, id);

        let mut winner = id;
        let mut winner_used = used;

        let neighbors: Vec<InstrId> = overlaps.get(&id).into_iter().flatten().copied().collect();
        for other in neighbors {
            let Some(oloc) = lochint_of(container, other) else { continue };
            if !loc.overlaps(&oloc) {
                continue;
            }
            let other_used = analysis::use_count(container, other);
            if other_used > winner_used && self.resolve_conflict(container, other, overlaps) == Some(other) {
                winner = other;
                winner_used = other_used;
            } else if other != winner {
                container.remove_tag(other, tag_names::LOCHINT);
            }
        }
        Some(winner)
    }

    /// `asnrems`/`asnrem`/`getreg`/`rgetreg`: every instruction still
    /// without a `loc` gets the lowest-numbered caller-saved register that
    /// doesn't collide with an overlapping instruction's already-assigned
    /// register, falling back to the callee-saved set.
    fn assign_remainder(&self, container: &mut Container, overlaps: &OverlapMap) {
        let desc = self.target.arch_description();
        let caller_saved = desc.all_int_regs.difference(desc.saved_int_regs);

        for id in container.instr_ids().collect::<Vec<_>>() {
            if container.instr(id).is_void() || loc_of(container, id).is_some() {
                continue;
            }
            let chosen = self
                .pick_register(container, id, overlaps, caller_saved)
                .or_else(|| self.pick_register(container, id, overlaps, desc.saved_int_regs))
                .unwrap_or(RegisterMask::empty());
            container.set_tag(id, tag_names::LOC, TagPayload::Location(Location::Register(chosen)));
        }
    }

    fn pick_register(
        &self,
        container: &Container,
        id: InstrId,
        overlaps: &OverlapMap,
        available: RegisterMask,
    ) -> Option<RegisterMask> {
        let candidate = available.iter().next()?;
        let conflicts = overlaps.get(&id).into_iter().flatten().any(|other| match loc_of(container, *other) {
            Some(Location::Register(m)) => m.intersects(candidate),
            _ => false,
        });
        if conflicts {
            self.pick_register(container, id, overlaps, available.difference(candidate))
        } else {
            Some(candidate)
        }
    }
}

/// Looks up an instruction's final `loc` tag. Shared with the emitter (C9),
/// which needs the same resolved-location lookup to render operands.
pub(crate) fn loc_of(container: &Container, id: InstrId) -> Option<Location> {
    match container.get_tag(id, tag_names::LOC) {
        Some(Tag { payload: TagPayload::Location(loc), .. }) => Some(loc.clone()),
        _ => None,
    }
}

fn lochint_of(container: &Container, id: InstrId) -> Option<Location> {
    match container.get_tag(id, tag_names::LOCHINT) {
        Some(Tag { payload: TagPayload::Location(loc), .. }) => Some(loc.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::ir::container::{Container, Linkage};
    use crate::lowering::Lowering;
    use crate::types::CType;

    fn function_container() -> Container {
        Container::new(
            "f",
            Linkage::Global,
            CType::Function { return_type: Box::new(CType::INT), parameters: vec![] },
        )
    }

    #[test]
    fn every_non_void_instruction_gets_a_location() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 10);
            let y = b.const_int(CType::INT, 3);
            let sum = b.build_add(x, y, CType::INT).unwrap();
            b.build_ret(sum).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        RegisterAllocator::new(&target).allocate(&mut c);

        for id in c.instr_ids().collect::<Vec<_>>() {
            if c.instr(id).is_void() {
                continue;
            }
            assert!(loc_of(&c, id).is_some(), "{:?} missing a location", id);
        }
    }

    #[test]
    fn overlapping_values_never_share_a_register() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 1);
            let y = b.const_int(CType::INT, 2);
            let a = b.build_add(x, y, CType::INT).unwrap();
            let d = b.build_sub(x, y, CType::INT).unwrap();
            let sum = b.build_add(a, d, CType::INT).unwrap();
            b.build_ret(sum).unwrap();
        }
        Lowering::new(&target).lower(&mut c);
        let alloc = RegisterAllocator::new(&target);
        alloc.allocate(&mut c);

        let overlaps = alloc.build_overlaps(&c);
        for (id, others) in &overlaps {
            let Some(Location::Register(m)) = loc_of(&c, *id) else { continue };
            for other in others {
                if let Some(Location::Register(om)) = loc_of(&c, *other) {
                    assert!(!m.intersects(om), "{:?} and {:?} collide on a register", id, other);
                }
            }
        }
    }

    #[test]
    fn mov_of_a_located_register_hints_its_operand() {
        let mut c = function_container();
        let target = Target::x86_64_linux();
        let (add_id, mov_id);
        {
            let mut b = Builder::new(&mut c);
            let x = b.const_int(CType::INT, 5);
            let y = b.const_int(CType::INT, 1);
            let add = b.build_add(x, y, CType::INT).unwrap();
            add_id = add.as_instr().unwrap();
            let mov = b.build_mov(add, CType::INT).unwrap();
            mov_id = mov.as_instr().unwrap();
            b.build_ret(mov).unwrap();
        }
        c.set_tag(mov_id, tag_names::LOC, TagPayload::Location(Location::Register(RegisterMask::RBX)));

        RegisterAllocator::new(&target).induce_registers(&mut c);

        assert_eq!(
            lochint_of(&c, add_id),
            Some(Location::Register(RegisterMask::RBX)),
            "the mov's register should be hinted back to the value it moves"
        );
    }
}
