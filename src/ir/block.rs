//! # Blocks
//!
//! A block is a control-flow region that owns the nodes placed in it. The
//! reassociation middle-end never edits control flow, so blocks carry plain
//! predecessor/successor edge lists built by the IR construction layer.

use super::Graph;
use crate::{
    collections::storage::{ArenaAlloc, ArenaPtr, BaseArenaPtr},
    impl_arena,
};

pub struct BlockData {
    this: Block,
    preds: Vec<Block>,
    succs: Vec<Block>,
}

impl BlockData {
    pub fn self_ptr(&self) -> Block { self.this }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub struct Block(BaseArenaPtr<BlockData>);

impl_arena!(Graph, BlockData, Block, blocks);

impl Block {
    /// Create a new block with no edges.
    pub fn new(g: &mut Graph) -> Block {
        g.alloc_with(|this| BlockData {
            this,
            preds: Vec::new(),
            succs: Vec::new(),
        })
    }

    /// Add a control-flow edge from this block to `succ`.
    pub fn add_succ(self, g: &mut Graph, succ: Block) {
        self.deref_mut(g).succs.push(succ);
        succ.deref_mut(g).preds.push(self);
    }

    pub fn preds(self, g: &Graph) -> &[Block] { &self.deref(g).preds }

    pub fn succs(self, g: &Graph) -> &[Block] { &self.deref(g).succs }

    pub fn id(self) -> usize { self.0.id() }
}
