//! `Container` (spec.md §3): a named top-level entity owning all IR
//! produced into it — the arena for its blocks and instructions, its
//! interned literal pool, and the side-channel tag map analyses write into.
//!
//! Grounded on the teacher's `function.rs`/`module.rs` ownership shape
//! (function owns blocks, module owns functions) generalized from
//! `HashMap<String, _>` block lookup to arena indices (DESIGN.md, C2).

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::ir::block::Block;
use crate::ir::instr::{Instruction, Opcode, Value};
use crate::ir::value::{Literal, Tag, TagPayload};
use crate::ir::{BlockId, InstrId, LiteralId};
use crate::types::CType;

/// Linkage of a top-level container (spec.md §3 "Container").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Global,
    Static,
    Extern,
}

#[derive(Debug, Clone)]
pub struct Container {
    pub name: String,
    pub linkage: Linkage,
    /// Function type (for a function container) or value type (for a
    /// global); drives the emitter's declaration and the type-checked
    /// `ret` placement rule.
    pub ty: CType,
    pub entry: Option<BlockId>,

    blocks: Vec<Option<Block>>,
    instrs: Vec<Option<Instruction>>,
    literals: IndexSet<Literal>,
    tags: HashMap<(InstrId, &'static str), Tag>,
}

impl Container {
    pub fn new(name: impl Into<String>, linkage: Linkage, ty: CType) -> Container {
        Container {
            name: name.into(),
            linkage,
            ty,
            entry: None,
            blocks: Vec::new(),
            instrs: Vec::new(),
            literals: IndexSet::new(),
            tags: HashMap::new(),
        }
    }

    // -- blocks ----------------------------------------------------------

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(Block::new(id)));
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        self.blocks[id.0 as usize]
            .as_ref()
            .expect("block id live for the container's lifetime once allocated")
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.blocks[id.0 as usize]
            .as_mut()
            .expect("block id live for the container's lifetime once allocated")
    }

    pub fn block_exists(&self, id: BlockId) -> bool {
        self.blocks.get(id.0 as usize).map_or(false, |b| b.is_some())
    }

    /// Unlinks and frees a block (dead-block pruning, spec.md §4.3). The
    /// slot is tombstoned rather than reused so existing `BlockId`s held by
    /// other structures never silently alias a different block.
    pub fn free_block(&mut self, id: BlockId) {
        self.blocks[id.0 as usize] = None;
    }

    /// All currently-live block ids, in arena allocation order (NOT the
    /// lexical chain — use `lexical_order` for that).
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|_| BlockId(i as u32)))
    }

    /// Blocks in lexical-chain order starting from the entry block
    /// (spec.md §4.6, "Emit in lexical-chain order").
    pub fn lexical_order(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut cur = self.entry;
        while let Some(id) = cur {
            out.push(id);
            cur = self.block(id).lex_next;
        }
        out
    }

    // -- instructions ------------------------------------------------------

    pub fn new_instr(&mut self, block: BlockId, ty: CType, opcode: Opcode) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(Some(Instruction { id, block, ty, opcode }));
        id
    }

    pub fn instr(&self, id: InstrId) -> &Instruction {
        self.instrs[id.0 as usize]
            .as_ref()
            .expect("instruction id live for the container's lifetime once allocated")
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instruction {
        self.instrs[id.0 as usize]
            .as_mut()
            .expect("instruction id live for the container's lifetime once allocated")
    }

    pub fn instr_exists(&self, id: InstrId) -> bool {
        self.instrs.get(id.0 as usize).map_or(false, |i| i.is_some())
    }

    /// Removes an instruction from the arena (SSA promotion's store/load
    /// deletion, spec.md §4.3). Callers must already have unlinked it from
    /// its block's instruction list.
    pub fn free_instr(&mut self, id: InstrId) {
        self.instrs[id.0 as usize] = None;
    }

    /// Creates a new instruction and splices it into `block`'s instruction
    /// list immediately before `at` — the primitive target lowering (C7)
    /// uses to inject `mov`/`clobb` around an instruction it is rewriting.
    pub fn insert_instr_before(&mut self, at: InstrId, ty: CType, opcode: Opcode) -> InstrId {
        let block = self.instr(at).block;
        let id = self.new_instr(block, ty, opcode);
        let pos = self.block(block).instrs.iter().position(|x| *x == at).expect("at belongs to block");
        self.block_mut(block).instrs.insert(pos, id);
        id
    }

    /// As `insert_instr_before`, but splices immediately after `at`.
    pub fn insert_instr_after(&mut self, at: InstrId, ty: CType, opcode: Opcode) -> InstrId {
        let block = self.instr(at).block;
        let id = self.new_instr(block, ty, opcode);
        let pos = self.block(block).instrs.iter().position(|x| *x == at).expect("at belongs to block");
        self.block_mut(block).instrs.insert(pos + 1, id);
        id
    }

    pub fn instr_ids(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.instrs
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|_| InstrId(i as u32)))
    }

    /// Rewrite every occurrence of `old` to `new` across every live
    /// instruction's operands (spec.md §3 "Lifecycle", "replace-occurrences").
    pub fn replace_occurrences(&mut self, old: InstrId, new: Value) {
        for slot in self.instrs.iter_mut().flatten() {
            slot.opcode.replace_operand(Value::Instr(old), new);
        }
    }

    // -- literals ----------------------------------------------------------

    pub fn intern_literal(&mut self, lit: Literal) -> LiteralId {
        let (index, _) = self.literals.insert_full(lit);
        LiteralId(index as u32)
    }

    pub fn literal(&self, id: LiteralId) -> Literal {
        *self
            .literals
            .get_index(id.0 as usize)
            .expect("literal id allocated by this container")
    }

    // -- tags ----------------------------------------------------------------

    pub fn set_tag(&mut self, instr: InstrId, name: &'static str, payload: TagPayload) {
        self.tags.insert((instr, name), Tag::new(name, payload));
    }

    pub fn get_tag(&self, instr: InstrId, name: &'static str) -> Option<&Tag> {
        self.tags.get(&(instr, name))
    }

    pub fn remove_tag(&mut self, instr: InstrId, name: &'static str) {
        self.tags.remove(&(instr, name));
    }

    /// Clears every tag with the given name across all instructions —
    /// analyses call this before recomputing, so a second run produces
    /// identical tags rather than accumulating stale ones (spec.md §5,
    /// "Analyses are idempotent").
    pub fn clear_tags_named(&mut self, name: &'static str) {
        self.tags.retain(|(_, tag_name), _| *tag_name != name);
    }
}
