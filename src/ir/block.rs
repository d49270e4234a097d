//! Basic blocks (spec.md §3 "Block"): a CFG node plus a position in the
//! lexical chain used for ordered traversal, IR-text dumping, and the
//! emitter's fall-through elision.

use crate::ir::{BlockId, InstrId};

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    /// Instructions in construction/placement order. `alloca*`/`phi*` runs
    /// are maintained at the head per spec.md §4.1 "Placement rules".
    pub instrs: Vec<InstrId>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    pub lex_prev: Option<BlockId>,
    pub lex_next: Option<BlockId>,
}

impl Block {
    pub fn new(id: BlockId) -> Block {
        Block {
            id,
            instrs: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            lex_prev: None,
            lex_next: None,
        }
    }

    pub fn add_pred(&mut self, pred: BlockId) {
        if !self.preds.contains(&pred) {
            self.preds.push(pred);
        }
    }

    pub fn add_succ(&mut self, succ: BlockId) {
        if !self.succs.contains(&succ) {
            self.succs.push(succ);
        }
    }

    pub fn remove_pred(&mut self, pred: BlockId) {
        self.preds.retain(|p| *p != pred);
    }
}
