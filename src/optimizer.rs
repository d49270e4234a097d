//! The target-independent optimizer (C5, spec.md §4.3): SSA promotion,
//! constant folding, and dead-block pruning.
//!
//! Ported from `examples/original_source/src/itm/opt.c`'s `optimize()`
//! pipeline (`o_phiable` → `o_cfld` → `o_prune`), generalized the way the
//! teacher's `seen_ir::optimizer::IROptimizer` gates its own passes behind an
//! `OptimizationLevel` rather than the original's single `option_optimize() >
//! 0` switch.

use std::collections::HashMap;

use crate::analysis;
use crate::ir::container::Container;
use crate::ir::instr::{Opcode, Value};
use crate::ir::value::Literal;
use crate::ir::{BlockId, InstrId};

/// Mirrors the teacher's `seen_ir::optimizer::OptimizationLevel`: `-O0`
/// through `-O3` (spec.md §6), collapsed here to a single gate since the
/// original only ever asks "should optimization run at all". Kept as a tiered
/// enum rather than a `bool` so a future pass can be staged behind `Standard`
/// or `Aggressive` without changing every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptimizationLevel {
    None,
    Basic,
    Standard,
    Aggressive,
}

impl OptimizationLevel {
    pub fn from_level(level: u8) -> OptimizationLevel {
        match level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Basic,
            2 => OptimizationLevel::Standard,
            _ => OptimizationLevel::Aggressive,
        }
    }

    pub fn should_run_pass(&self, pass_level: OptimizationLevel) -> bool {
        *self >= pass_level
    }
}

/// Counts of what each pass actually did, for `-Sir`/verbose diagnostics.
#[derive(Debug, Clone, Default)]
pub struct OptimizationStats {
    pub loads_promoted: u32,
    pub stores_removed: u32,
    pub allocas_removed: u32,
    pub phis_inserted: u32,
    pub constants_folded: u32,
    pub blocks_pruned: u32,
    pub passes_run: Vec<String>,
}

pub struct Optimizer {
    level: OptimizationLevel,
    stats: OptimizationStats,
}

impl Optimizer {
    pub fn new(level: OptimizationLevel) -> Optimizer {
        Optimizer { level, stats: OptimizationStats::default() }
    }

    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }

    /// Runs the full pipeline in the original's order: promote first (it
    /// creates the phis and constant arithmetic that folding and pruning
    /// then clean up), fold, then prune.
    pub fn optimize(&mut self, container: &mut Container) {
        if !self.level.should_run_pass(OptimizationLevel::Basic) {
            return;
        }
        self.promote_allocas(container);
        self.fold_constants(container);
        self.prune_dead_blocks(container);
    }

    /// SSA promotion (spec.md §4.3 "SSA promotion"). Replaces every load of a
    /// never-escaping `alloca` with the value traced backward through stores,
    /// inserting a `phi` wherever the trace forks at a join point, then
    /// strips the now-dead stores, loads, and allocas.
    pub fn promote_allocas(&mut self, container: &mut Container) {
        analysis::run_phiable(container);

        let slots: Vec<InstrId> = container
            .instr_ids()
            .filter(|id| container.instr(*id).opcode.is_alloca() && analysis::is_phiable(container, *id))
            .collect();
        if slots.is_empty() {
            return;
        }

        let mut loads: Vec<(InstrId, InstrId)> = Vec::new();
        for block in container.lexical_order() {
            for id in container.block(block).instrs.clone() {
                if let Opcode::Load(ptr) = &container.instr(id).opcode {
                    if let Value::Instr(slot) = ptr {
                        if slots.contains(slot) {
                            loads.push((id, *slot));
                        }
                    }
                }
            }
        }

        let mut memo: HashMap<(BlockId, InstrId), Value> = HashMap::new();
        for (load, slot) in &loads {
            let resolved = trace_load(container, *load, *load, *slot, &mut memo);
            container.replace_occurrences(*load, resolved);
        }
        self.stats.loads_promoted += loads.len() as u32;
        self.stats.phis_inserted += memo.len() as u32;

        for (load, _) in &loads {
            remove_instr(container, *load);
        }
        for &slot in &slots {
            let uses: Vec<InstrId> = container
                .instr_ids()
                .filter(|id| {
                    matches!(&container.instr(*id).opcode, Opcode::Store(_, ptr) if *ptr == Value::Instr(slot))
                })
                .collect();
            self.stats.stores_removed += uses.len() as u32;
            for store in uses {
                remove_instr(container, store);
            }
            remove_instr(container, slot);
            self.stats.allocas_removed += 1;
        }

        self.stats.passes_run.push("ssa-promotion".to_string());
    }

    /// Constant folding (spec.md §4.3 "Constant folding"): evaluates every
    /// arithmetic, bitwise, shift, or compare instruction whose operands are
    /// all literal (or undef) and replaces its uses with the folded literal.
    /// Casts and memory operations are left alone — by the time this pass
    /// runs their operands are rarely literal, and folding them needs
    /// operand-width bookkeeping this pass doesn't otherwise track.
    pub fn fold_constants(&mut self, container: &mut Container) {
        let mut resolved: HashMap<InstrId, Literal> = HashMap::new();
        for block in container.lexical_order() {
            for id in container.block(block).instrs.clone() {
                if !container.instr_exists(id) {
                    continue;
                }
                let folded = {
                    let instr = container.instr(id);
                    let opcode = instr.opcode.clone();
                    let ty_is_floating = instr.ty.is_floating();
                    let ty_size = instr.ty.size_bytes();
                    eval_opcode(&opcode, ty_is_floating, ty_size, |v| match v {
                        Value::Literal(lid) => Some(container.literal(lid)),
                        Value::Undef => Some(Literal::Int(0)),
                        Value::Instr(iid) => resolved.get(&iid).copied(),
                    })
                };
                if let Some(lit) = folded {
                    let lid = container.intern_literal(lit);
                    container.replace_occurrences(id, Value::Literal(lid));
                    resolved.insert(id, lit);
                    self.stats.constants_folded += 1;
                }
            }
        }
        self.stats.passes_run.push("constant-folding".to_string());
    }

    /// Dead-block pruning (spec.md §4.3 "Dead-block pruning"): iterates to a
    /// fixpoint removing any non-entry block with no predecessors, stripping
    /// it from each successor's phis (collapsing a phi down to its sole
    /// surviving source) and unlinking it from the lexical chain.
    pub fn prune_dead_blocks(&mut self, container: &mut Container) {
        loop {
            let mut changed = false;
            for id in container.block_ids().collect::<Vec<_>>() {
                if !container.block_exists(id) || Some(id) == container.entry {
                    continue;
                }
                if !container.block(id).preds.is_empty() {
                    continue;
                }

                for succ in container.block(id).succs.clone() {
                    container.block_mut(succ).remove_pred(id);
                    for phi in container.block(succ).instrs.clone() {
                        if !container.instr(phi).opcode.is_phi() {
                            break;
                        }
                        let remaining = if let Opcode::Phi(sources) = &mut container.instr_mut(phi).opcode {
                            sources.retain(|(pred, _)| *pred != id);
                            sources.len()
                        } else {
                            unreachable!()
                        };
                        if remaining == 1 {
                            let sole = match &container.instr(phi).opcode {
                                Opcode::Phi(sources) => sources[0].1,
                                _ => unreachable!(),
                            };
                            container.replace_occurrences(phi, sole);
                            remove_instr(container, phi);
                        }
                    }
                }

                let prev = container.block(id).lex_prev;
                let next = container.block(id).lex_next;
                if let Some(p) = prev {
                    container.block_mut(p).lex_next = next;
                }
                if let Some(n) = next {
                    container.block_mut(n).lex_prev = prev;
                }
                container.free_block(id);
                self.stats.blocks_pruned += 1;
                changed = true;
            }
            if !changed {
                break;
            }
        }
        self.stats.passes_run.push("dead-block-pruning".to_string());
    }
}

fn remove_instr(container: &mut Container, id: InstrId) {
    let block = container.instr(id).block;
    container.block_mut(block).instrs.retain(|x| *x != id);
    container.free_instr(id);
}

fn phi_alloca_prefix_len(container: &Container, block: BlockId) -> usize {
    container
        .block(block)
        .instrs
        .iter()
        .take_while(|id| {
            let opcode = &container.instr(**id).opcode;
            opcode.is_phi() || opcode.is_alloca()
        })
        .count()
}

/// Resolves a load's value by walking backward through the instruction
/// stream and (recursively) through predecessor blocks, grounded on
/// `traceload` in `examples/original_source/src/itm/opt.c`:
///
/// 1. An earlier store to the same slot supplies its stored value directly.
/// 2. An earlier load of the same slot is itself resolved first (and its
///    uses rewritten), then its resolved value is reused.
/// 3. Reaching the head of a block with no predecessors yields `undef`.
/// 4. A single predecessor is traced into directly.
/// 5. Two or more predecessors need a `phi`; the new phi is recorded in
///    `memo` *before* recursing into the predecessors so a loop in the CFG
///    resolves to the phi itself instead of looping forever.
fn trace_load(
    container: &mut Container,
    ld: InstrId,
    at: InstrId,
    slot: InstrId,
    memo: &mut HashMap<(BlockId, InstrId), Value>,
) -> Value {
    if at != ld {
        enum Found {
            Stored(Value),
            PriorLoad,
        }
        let found = match &container.instr(at).opcode {
            Opcode::Store(value, ptr) if *ptr == Value::Instr(slot) => Some(Found::Stored(*value)),
            Opcode::Load(ptr) if *ptr == Value::Instr(slot) => Some(Found::PriorLoad),
            _ => None,
        };
        match found {
            Some(Found::Stored(value)) => return value,
            Some(Found::PriorLoad) => {
                let resolved = trace_load(container, at, at, slot, memo);
                container.replace_occurrences(at, resolved);
                return resolved;
            }
            None => {}
        }
    }

    let block = container.instr(at).block;
    let pos = container
        .block(block)
        .instrs
        .iter()
        .position(|id| *id == at)
        .expect("instruction belongs to the block recorded on it");

    if pos > 0 {
        let prev = container.block(block).instrs[pos - 1];
        if !container.instr(prev).opcode.is_phi() {
            return trace_load(container, ld, prev, slot, memo);
        }
    }

    let preds = container.block(block).preds.clone();
    match preds.len() {
        0 => Value::Undef,
        1 => {
            let last = *container.block(preds[0]).instrs.last().expect("block ends in a terminator");
            trace_load(container, ld, last, slot, memo)
        }
        _ => {
            if let Some(existing) = memo.get(&(block, slot)) {
                return *existing;
            }

            let ty = container.instr(ld).ty.clone();
            let phi_id = container.new_instr(block, ty, Opcode::Phi(Vec::new()));
            memo.insert((block, slot), Value::Instr(phi_id));
            let prefix = phi_alloca_prefix_len(container, block);
            container.block_mut(block).instrs.insert(prefix, phi_id);

            let mut sources = Vec::with_capacity(preds.len());
            for pred in preds {
                let last = *container.block(pred).instrs.last().expect("block ends in a terminator");
                let v = trace_load(container, ld, last, slot, memo);
                sources.push((pred, v));
            }
            if let Opcode::Phi(s) = &mut container.instr_mut(phi_id).opcode {
                *s = sources;
            }
            Value::Instr(phi_id)
        }
    }
}

/// Evaluates a single instruction whose operands are all resolvable via
/// `get`, returning `None` when the opcode isn't foldable or an operand
/// isn't yet constant (spec.md §4.3 "Constant folding").
fn eval_opcode(
    opcode: &Opcode,
    floating: bool,
    ty_size: usize,
    get: impl Fn(Value) -> Option<Literal>,
) -> Option<Literal> {
    use Opcode::*;

    let int_result = |v: i64| Literal::from_i64(v);
    let float_result = |v: f64| {
        if ty_size <= 4 {
            Literal::from_f32(v as f32)
        } else {
            Literal::from_f64(v)
        }
    };

    match opcode {
        Add(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(if floating {
                float_result(a.as_f64()? + b.as_f64()?)
            } else {
                int_result(a.as_i64()?.wrapping_add(b.as_i64()?))
            })
        }
        Sub(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(if floating {
                float_result(a.as_f64()? - b.as_f64()?)
            } else {
                int_result(a.as_i64()?.wrapping_sub(b.as_i64()?))
            })
        }
        Mul(a, b) => {
            // `build_mul` picks `Mul` for anything not signed-integral, i.e.
            // both unsigned multiply and float multiply land here.
            let (a, b) = (get(*a)?, get(*b)?);
            Some(if floating {
                float_result(a.as_f64()? * b.as_f64()?)
            } else {
                int_result((a.as_u64()?.wrapping_mul(b.as_u64()?)) as i64)
            })
        }
        IMul(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_i64()?.wrapping_mul(b.as_i64()?)))
        }
        Div(a, b) => {
            // `build_div` picks `Div` for anything not signed-integral —
            // unsigned integer division and float division both land here.
            let (a, b) = (get(*a)?, get(*b)?);
            if floating {
                let b = b.as_f64()?;
                if b == 0.0 {
                    return None;
                }
                return Some(float_result(a.as_f64()? / b));
            }
            let b = b.as_u64()?;
            if b == 0 {
                return None;
            }
            Some(int_result((a.as_u64()? / b) as i64))
        }
        IDiv(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            let b = b.as_i64()?;
            if b == 0 {
                return None;
            }
            Some(int_result(a.as_i64()?.wrapping_div(b)))
        }
        Rem(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            let bi = b.as_i64()?;
            if bi == 0 {
                return None;
            }
            Some(int_result(a.as_i64()?.wrapping_rem(bi)))
        }
        Shl(a, b) | Sal(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_i64()?.wrapping_shl(b.as_u64()? as u32)))
        }
        Shr(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_u64()?.wrapping_shr(b.as_u64()? as u32) as i64))
        }
        Sar(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_i64()?.wrapping_shr(b.as_u64()? as u32)))
        }
        And(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_i64()? & b.as_i64()?))
        }
        Or(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_i64()? | b.as_i64()?))
        }
        Xor(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(a.as_i64()? ^ b.as_i64()?))
        }
        CmpEq(a, b) => Some(int_result(values_equal(get(*a)?, get(*b)?) as i64)),
        CmpNeq(a, b) => Some(int_result(!values_equal(get(*a)?, get(*b)?) as i64)),
        CmpLt(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(compare(a, b)?.is_lt() as i64))
        }
        CmpLte(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(!compare(a, b)?.is_gt() as i64))
        }
        CmpGt(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(compare(a, b)?.is_gt() as i64))
        }
        CmpGte(a, b) => {
            let (a, b) = (get(*a)?, get(*b)?);
            Some(int_result(!compare(a, b)?.is_lt() as i64))
        }
        _ => None,
    }
}

fn values_equal(a: Literal, b: Literal) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => a.as_i64() == b.as_i64(),
    }
}

/// Best-effort ordering across mixed literal kinds: float if either operand
/// is floating-point, signed 64-bit integer otherwise. Neither this IR nor
/// its literals track an operand's original signedness independently of its
/// instruction's result type, so an unsigned comparison folds the same as a
/// signed one here; the same ambiguity exists in the unfolded lowering path.
fn compare(a: Literal, b: Literal) -> Option<std::cmp::Ordering> {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => a.as_i64()?.partial_cmp(&b.as_i64()?),
    }
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
    fn folds_constant_addition() {
        let mut c = Container::new("f", Linkage::Global, fn_type());
        let mut b = Builder::new(&mut c);
        let two = b.const_int(CType::INT, 2);
        let three = b.const_int(CType::INT, 3);
        let sum = b.build_add(two, three, CType::INT).unwrap();
        b.build_ret(sum).unwrap();

        let mut opt = Optimizer::new(OptimizationLevel::Basic);
        opt.fold_constants(&mut c);
        assert_eq!(opt.stats().constants_folded, 1);

        let ret_block = c.entry.unwrap();
        let ret_id = *c.block(ret_block).instrs.last().unwrap();
        if let Opcode::Ret(Value::Literal(lid)) = &c.instr(ret_id).opcode {
            assert_eq!(c.literal(*lid).as_i64(), Some(5));
        } else {
            panic!("expected a folded literal return operand");
        }
    }

    #[test]
    fn promotes_alloca_through_branch_into_phi() {
        let mut c = Container::new("f", Linkage::Global, fn_type());
        let mut b = Builder::new(&mut c);
        let slot = b.build_alloca(CType::INT).unwrap();
        let entry = b.current_block();
        let left = b.create_block();
        let right = b.create_block();
        let merge = b.create_block();

        b.switch_to_block(entry);
        let cond = b.const_int(CType::BOOL, 1);
        b.build_split(cond, left, right).unwrap();

        b.switch_to_block(left);
        let one = b.const_int(CType::INT, 1);
        b.build_store(one, slot).unwrap();
        b.build_jmp(merge).unwrap();

        b.switch_to_block(right);
        let two = b.const_int(CType::INT, 2);
        b.build_store(two, slot).unwrap();
        b.build_jmp(merge).unwrap();

        b.switch_to_block(merge);
        let loaded = b.build_load(slot, CType::INT).unwrap();
        b.build_ret(loaded).unwrap();

        let mut opt = Optimizer::new(OptimizationLevel::Basic);
        opt.promote_allocas(&mut c);

        assert_eq!(opt.stats().phis_inserted, 1);
        assert_eq!(opt.stats().allocas_removed, 1);
        let merge_instrs = c.block(merge).instrs.clone();
        assert!(merge_instrs.iter().any(|id| c.instr(*id).opcode.is_phi()));
        assert!(!c.instr_exists(slot.as_instr().unwrap()));
    }

    #[test]
    fn prunes_block_with_no_predecessors() {
        let mut c = Container::new("f", Linkage::Global, fn_type());
        let mut b = Builder::new(&mut c);
        let entry = b.current_block();
        let dead = b.create_block();
        let merge = b.create_block();

        b.switch_to_block(entry);
        b.build_jmp(merge).unwrap();

        b.switch_to_block(dead);
        b.build_jmp(merge).unwrap();

        b.switch_to_block(merge);
        let one = b.const_int(CType::INT, 1);
        b.build_ret(one).unwrap();

        // `dead` was constructed but never actually branched to.
        c.block_mut(dead).preds.clear();
        c.block_mut(merge).remove_pred(dead);

        let mut opt = Optimizer::new(OptimizationLevel::Basic);
        opt.prune_dead_blocks(&mut c);
        assert_eq!(opt.stats().blocks_pruned, 1);
        assert!(!c.block_exists(dead));
    }
}
