//! Dataflow analyses (C4): use counts, value lifetimes, and `alloca`
//! promotability (spec.md §4.2).
//!
//! Ported from `examples/original_source/src/itm/analyze.c`. The original's
//! `a_lifetime`/`lifetime` walk the CFG recursively with a "done" list to
//! avoid revisiting blocks; that recursion doesn't terminate cleanly on a
//! loop-bearing CFG without becoming a fixpoint, so this port computes the
//! same alive-in/alive-out relation with an explicit worklist over the
//! blocks reachable from each value's definition, iterating to a fixpoint
//! instead of recursing.

use std::collections::{HashSet, VecDeque};

use crate::ir::container::Container;
use crate::ir::instr::{Opcode, Value};
use crate::ir::value::{tag_names, TagPayload};
use crate::ir::{BlockId, InstrId};

/// Use-count analysis (`A_USED`, spec.md §4.2). Idempotent: clears its own
/// tags before recomputing.
pub fn run_use_count(container: &mut Container) {
    container.clear_tags_named(tag_names::USED);
    let mut counts: std::collections::HashMap<InstrId, u32> = std::collections::HashMap::new();
    for id in container.instr_ids() {
        for operand in container.instr(id).opcode.operands() {
            if let Value::Instr(used) = operand {
                *counts.entry(used).or_insert(0) += 1;
            }
        }
    }
    for (id, count) in counts {
        container.set_tag(id, tag_names::USED, TagPayload::UseCount(count));
    }
}

pub fn use_count(container: &Container, id: InstrId) -> u32 {
    match container.get_tag(id, tag_names::USED) {
        Some(crate::ir::value::Tag { payload: TagPayload::UseCount(n), .. }) => *n,
        _ => 0,
    }
}

/// Value-lifetime analysis (`A_LIFETIME`, spec.md §4.2). Idempotent: clears
/// its own tags before recomputing.
pub fn run_lifetime(container: &mut Container) {
    container.clear_tags_named(tag_names::ENDLIFE);

    let mut endlife: std::collections::HashMap<InstrId, Vec<InstrId>> = std::collections::HashMap::new();

    let value_ids: Vec<InstrId> = container
        .instr_ids()
        .filter(|id| {
            let instr = container.instr(*id);
            !instr.is_void() && !instr.opcode.is_alloca()
        })
        .collect();

    for v in value_ids {
        lifetime_for_value(container, v, &mut endlife);
    }

    for (instr, values) in endlife {
        container.set_tag(instr, tag_names::ENDLIFE, TagPayload::ValueList(values));
    }
}

fn lifetime_for_value(
    container: &Container,
    v: InstrId,
    endlife: &mut std::collections::HashMap<InstrId, Vec<InstrId>>,
) {
    let def_block = container.instr(v).block;

    // Reachable closure from the defining block (forward).
    let mut reachable: HashSet<BlockId> = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(def_block);
    reachable.insert(def_block);
    while let Some(b) = queue.pop_front() {
        for succ in &container.block(b).succs {
            if reachable.insert(*succ) {
                queue.push_back(*succ);
            }
        }
    }

    let used_in_block = |b: BlockId| -> bool {
        container.block(b).instrs.iter().any(|id| {
            container
                .instr(*id)
                .opcode
                .operands()
                .iter()
                .any(|op| *op == Value::Instr(v))
        })
    };

    let phi_source_on_edge = |from: BlockId, to: BlockId| -> bool {
        container.block(to).instrs.iter().any(|id| {
            if let Opcode::Phi(sources) = &container.instr(*id).opcode {
                sources.iter().any(|(pred, val)| *pred == from && *val == Value::Instr(v))
            } else {
                false
            }
        })
    };

    let mut alive_in: std::collections::HashMap<BlockId, bool> =
        reachable.iter().map(|b| (*b, false)).collect();
    let mut alive_out: std::collections::HashMap<BlockId, bool> =
        reachable.iter().map(|b| (*b, false)).collect();

    loop {
        let mut changed = false;
        for &b in &reachable {
            let new_out = container.block(b).succs.iter().any(|s| alive_in[s]);
            let new_in = used_in_block(b)
                || container.block(b).succs.iter().any(|s| phi_source_on_edge(b, *s))
                || new_out;
            if alive_out[&b] != new_out {
                alive_out.insert(b, new_out);
                changed = true;
            }
            if alive_in[&b] != new_in {
                alive_in.insert(b, new_in);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for &b in &reachable {
        for &succ in &container.block(b).succs {
            if !alive_in[&succ] {
                let first_non_phi = container
                    .block(succ)
                    .instrs
                    .iter()
                    .find(|id| !container.instr(**id).opcode.is_phi());
                if let Some(&first) = first_non_phi {
                    endlife.entry(first).or_default().push(v);
                }
            }
        }
    }

    // "In the defining block, if v has only local uses..." — v never
    // escapes def_block to a still-alive successor.
    if !alive_out[&def_block] {
        if let Some(&last_use) = container
            .block(def_block)
            .instrs
            .iter()
            .rev()
            .find(|id| container.instr(**id).opcode.operands().iter().any(|op| *op == Value::Instr(v)))
        {
            endlife.entry(last_use).or_default().push(v);
        }
    }
}

pub fn endlife_values(container: &Container, id: InstrId) -> Vec<InstrId> {
    match container.get_tag(id, tag_names::ENDLIFE) {
        Some(crate::ir::value::Tag { payload: TagPayload::ValueList(vs), .. }) => vs.clone(),
        _ => Vec::new(),
    }
}

/// `alloca` promotability (`A_PHIABLE`, spec.md §4.2): promotable iff the
/// slot is only ever consumed by `load`/`store` and never escapes as the
/// value side of a `store` or as an operand to any other opcode.
pub fn run_phiable(container: &mut Container) {
    container.clear_tags_named(tag_names::PHIABLE);

    let allocas: Vec<InstrId> = container
        .instr_ids()
        .filter(|id| container.instr(*id).opcode.is_alloca())
        .collect();

    for slot in allocas {
        let promotable = container.instr_ids().all(|id| instr_respects_slot(container, id, slot));
        container.set_tag(slot, tag_names::PHIABLE, TagPayload::UseCount(promotable as u32));
    }
}

fn instr_respects_slot(container: &Container, id: InstrId, slot: InstrId) -> bool {
    let target = Value::Instr(slot);
    match &container.instr(id).opcode {
        Opcode::Load(_) => true,
        Opcode::Store(value, _ptr) => *value != target,
        other => !other.operands().iter().any(|op| *op == target),
    }
}

pub fn is_phiable(container: &Container, slot: InstrId) -> bool {
    matches!(
        container.get_tag(slot, tag_names::PHIABLE),
        Some(crate::ir::value::Tag { payload: TagPayload::UseCount(1), .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::ir::container::{Container, Linkage};
    use crate::types::CType;

    fn fn_type() -> CType {
        CType::Function { return_type: Box::new(CType::INT), parameters: vec![] }
    }

    #[test]
    fn use_count_counts_phi_sources_once_per_slot() {
        let mut c = Container::new("f", Linkage::Global, fn_type());
        let mut b = Builder::new(&mut c);
        let entry = b.current_block();
        let merge = b.create_block();
        b.switch_to_block(entry);
        let one = b.const_int(CType::INT, 1);
        b.build_jmp(merge).unwrap();
        b.switch_to_block(merge);
        let phi = b.build_phi(merge, CType::INT, vec![(entry, one)]).unwrap();
        b.build_ret(phi).unwrap();
        run_use_count(&mut c);
        assert_eq!(use_count(&c, phi.as_instr().unwrap()), 1);
    }

    #[test]
    fn unescaped_alloca_is_phiable() {
        let mut c = Container::new("f", Linkage::Global, fn_type());
        let mut b = Builder::new(&mut c);
        let slot = b.build_alloca(CType::INT).unwrap();
        let one = b.const_int(CType::INT, 1);
        b.build_store(one, slot).unwrap();
        let loaded = b.build_load(slot, CType::INT).unwrap();
        b.build_ret(loaded).unwrap();
        run_phiable(&mut c);
        assert!(is_phiable(&c, slot.as_instr().unwrap()));
    }

    #[test]
    fn alloca_stored_as_a_value_is_not_phiable() {
        let mut c = Container::new("f", Linkage::Global, fn_type());
        let mut b = Builder::new(&mut c);
        let slot = b.build_alloca(CType::INT).unwrap();
        let other = b.build_alloca(CType::pointer_to(CType::INT)).unwrap();
        b.build_store(slot, other).unwrap();
        let one = b.const_int(CType::INT, 1);
        b.build_ret(one).unwrap();
        run_phiable(&mut c);
        assert!(!is_phiable(&c, slot.as_instr().unwrap()));
    }
}
