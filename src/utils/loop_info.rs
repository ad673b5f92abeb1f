//! # Loop Analysis
//!
//! Detects natural loops from back edges in the dominator tree and builds
//! the loop nesting forest. The loop membership query is what decides
//! whether a value is invariant relative to a block's enclosing loop.

use rustc_hash::FxHashMap;

use super::dominance::Dominance;
use crate::{
    collections::storage::{ArenaAlloc, ArenaDeref, ArenaPtr, BaseArena, BaseArenaPtr},
    ir::{Block, Graph},
};

/// Represents a natural loop in the control flow graph.
pub struct LoopInfo {
    /// The header of the loop.
    header: Block,
    /// The parent loop of this loop.
    parent: Option<Loop>,
    /// The children loops of this loop.
    children: Vec<Loop>,
    /// The depth of the loop.
    depth: u32,
}

#[derive(Debug)]
pub struct Loop(BaseArenaPtr<LoopInfo>);

pub struct LoopContext {
    loops: BaseArena<LoopInfo>,
    block_to_loop: FxHashMap<Block, Loop>,
}

impl Loop {
    fn new(loop_ctx: &mut LoopContext, header: Block) -> Self {
        loop_ctx.alloc(LoopInfo {
            header,
            parent: None,
            children: Vec::new(),
            depth: 0,
        })
    }

    pub fn header(self, loop_ctx: &LoopContext) -> Block { self.deref(loop_ctx).header }

    pub fn parent(self, loop_ctx: &LoopContext) -> Option<Loop> { self.deref(loop_ctx).parent }

    fn set_parent(self, loop_ctx: &mut LoopContext, parent: Option<Loop>) {
        if let Some(parent) = parent {
            parent.deref_mut(loop_ctx).children.push(self);
        }
        self.deref_mut(loop_ctx).parent = parent;
    }

    pub fn depth(self, loop_ctx: &LoopContext) -> u32 { self.deref(loop_ctx).depth }

    fn set_depth(self, loop_ctx: &mut LoopContext, depth: u32) {
        self.deref_mut(loop_ctx).depth = depth
    }

    pub fn children(self, loop_ctx: &LoopContext) -> Vec<Loop> {
        self.deref(loop_ctx).children.clone()
    }
}

impl Default for LoopContext {
    fn default() -> Self {
        Self {
            loops: BaseArena::default(),
            block_to_loop: FxHashMap::default(),
        }
    }
}

impl LoopContext {
    pub fn new(g: &Graph, dominance: &Dominance) -> Self {
        let mut ctx = LoopContext::default();
        ctx.detect_loops(g, dominance);
        ctx
    }

    /// The innermost loop containing the block, if any.
    pub fn get_loop(&self, block: Block) -> Option<Loop> {
        self.block_to_loop.get(&block).copied()
    }

    pub fn loops(&self) -> Vec<Loop> { self.loops.iter().map(|(p, _)| Loop(p)).collect() }

    /// Whether the block lies in the given loop or one of its children.
    pub fn is_in_loop(&self, block: Block, lp: Loop) -> bool {
        let mut current = self.get_loop(block);
        while let Some(l) = current {
            if l == lp {
                return true;
            }
            current = l.parent(self);
        }
        false
    }

    fn detect_loops(&mut self, g: &Graph, dominance: &Dominance) {
        // a sequence of detected loops
        let mut loops = Vec::new();

        // traverse in reverse post order first to get all the back edges
        for block in dominance.rpo().iter().copied() {
            for pred in block.preds(g).iter().copied() {
                // this block dominates its predecessor, there is a back edge
                if dominance.dominates(block, pred) {
                    let lp = Loop::new(self, block);
                    self.block_to_loop.insert(block, lp);
                    // because we traverse in reverse post order, the outer
                    // loop is created before the inner loop
                    loops.push(lp);
                    break;
                }
            }
        }

        // discover the loop bodies by walking back from the back edges; inner
        // loops were created later, so iterating in reverse visits them first
        // and builds the hierarchy bottom-up
        let mut stack = Vec::new();

        for lp in loops.into_iter().rev() {
            let header = lp.header(self);
            for pred in header.preds(g).iter().copied() {
                if dominance.dominates(header, pred) {
                    // multiple loops with the same header merge automatically
                    stack.push(pred);
                }
            }

            while let Some(block) = stack.pop() {
                match self.block_to_loop.get(&block) {
                    None => {
                        if !dominance.is_reachable(block) {
                            continue;
                        }
                        // this block is in this loop
                        self.block_to_loop.insert(block, lp);
                        for pred in block.preds(g).iter().copied() {
                            stack.push(pred);
                        }
                    }
                    Some(inner) => {
                        // visited before, find the outermost enclosing loop
                        let mut inner = *inner;
                        while let Some(p) = inner.parent(self) {
                            if p == lp {
                                break;
                            } else {
                                inner = p;
                            }
                        }
                        if inner.parent(self).is_none() {
                            if inner == lp {
                                // identical to the current loop, done
                            } else {
                                // the inner loop is nested in this one
                                inner.set_parent(self, Some(lp));
                                let header = inner.header(self);
                                for pred in header.preds(g).iter().copied() {
                                    stack.push(pred);
                                }
                            }
                        }
                    }
                }
            }
        }

        // then calculate the depth of each loop
        let mut stack = Vec::new();
        for lp in self.loops() {
            if lp.depth(self) == 0 {
                stack.push(lp);
                while let Some(lp) = stack.last() {
                    match lp.parent(self) {
                        None => {
                            lp.set_depth(self, 1);
                            stack.pop();
                        }
                        Some(p) => {
                            if p.depth(self) == 0 {
                                stack.push(p);
                            } else {
                                let depth = p.depth(self) + 1;
                                lp.set_depth(self, depth);
                                stack.pop();
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Clone for Loop {
    fn clone(&self) -> Self { *self }
}

impl Copy for Loop {}

impl PartialEq for Loop {
    fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}

impl Eq for Loop {}

impl std::hash::Hash for Loop {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.0.hash(state) }
}

impl ArenaPtr for Loop {
    type A = LoopContext;
    type T = LoopInfo;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T> { ArenaDeref::try_deref(arena, self) }

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
        ArenaDeref::try_deref_mut(arena, self)
    }
}

impl ArenaDeref<LoopInfo, Loop> for LoopContext {
    fn try_deref(&self, ptr: Loop) -> Option<&LoopInfo> { self.loops.try_deref(ptr.0) }

    fn try_deref_mut(&mut self, ptr: Loop) -> Option<&mut LoopInfo> {
        self.loops.try_deref_mut(ptr.0)
    }
}

impl ArenaAlloc<LoopInfo, Loop> for LoopContext {
    fn alloc_with<F>(&mut self, f: F) -> Loop
    where
        F: FnOnce(Loop) -> LoopInfo,
    {
        Loop(self.loops.alloc_with(|p| f(Loop(p))))
    }
}
