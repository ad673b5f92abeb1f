//! # Dominance Analysis
//!
//! Iterative dominator computation over the reverse post-order, following
//! Cooper, Harvey and Kennedy's "A Simple, Fast Dominance Algorithm". The
//! result answers the `dominates` queries that node placement relies on.

use rustc_hash::FxHashMap;

use super::dfs::DfsContext;
use crate::ir::{Block, Graph};

pub struct Dominance {
    /// The immediate dominator of each reachable block; the entry maps to
    /// `None`.
    idom: FxHashMap<Block, Option<Block>>,
    /// The dominator tree children of each reachable block.
    domtree: FxHashMap<Block, Vec<Block>>,
    /// The reverse post-order of reachable blocks.
    rpo: Vec<Block>,
}

impl Default for Dominance {
    fn default() -> Self {
        Self {
            idom: FxHashMap::default(),
            domtree: FxHashMap::default(),
            rpo: Vec::new(),
        }
    }
}

impl Dominance {
    pub fn new(g: &Graph) -> Dominance {
        let mut dominance = Dominance::default();
        dominance.compute(g);
        dominance
    }

    pub fn idom(&self, block: Block) -> Option<Block> {
        self.idom.get(&block).copied().flatten()
    }

    pub fn children(&self, block: Block) -> &[Block] {
        self.domtree.get(&block).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn rpo(&self) -> &[Block] { &self.rpo }

    /// Whether the block was reachable from the start block when the
    /// analysis ran.
    pub fn is_reachable(&self, block: Block) -> bool { self.idom.contains_key(&block) }

    /// Whether `a` dominates `b`. Unreachable blocks dominate nothing and
    /// are dominated by nothing.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        if a == b {
            return true;
        }
        let mut runner = b;
        while let Some(Some(parent)) = self.idom.get(&runner) {
            if *parent == a {
                return true;
            }
            runner = *parent;
        }
        false
    }

    fn intersect(&self, n1: Block, n2: Block, postorder: &FxHashMap<Block, usize>) -> Block {
        let mut finger1 = n1;
        let mut finger2 = n2;
        while finger1 != finger2 {
            while postorder[&finger1] < postorder[&finger2] {
                finger1 = self.idom[&finger1].unwrap();
            }
            while postorder[&finger2] < postorder[&finger1] {
                finger2 = self.idom[&finger2].unwrap();
            }
        }
        finger1
    }

    pub fn compute(&mut self, g: &Graph) {
        let mut dfs = DfsContext::default();

        let mut postorder = FxHashMap::default();
        let mut rpo = Vec::new();
        self.idom.clear();

        for (i, block) in dfs.post_order_iter(g).enumerate() {
            postorder.insert(block, i);
            rpo.push(block);
            self.idom.insert(block, None);
        }

        rpo.reverse();

        // seed the entry with itself so intersect can terminate
        assert!(rpo[0] == g.start_block());
        self.idom.insert(rpo[0], Some(rpo[0]));

        let mut changed = true;
        while changed {
            changed = false;
            for block in rpo.iter().skip(1) {
                let mut new_idom = None;
                for pred in block
                    .preds(g)
                    .iter()
                    .filter(|pred| *pred != block && postorder.contains_key(*pred))
                {
                    if self.idom[pred].is_some() {
                        new_idom = Some(*pred);
                        break;
                    }
                }

                if new_idom.is_none() {
                    continue;
                }

                for pred in block
                    .preds(g)
                    .iter()
                    .filter(|pred| postorder.contains_key(*pred))
                {
                    if self.idom[pred].is_some() {
                        new_idom = Some(self.intersect(new_idom.unwrap(), *pred, &postorder));
                    }
                }
                if self.idom[block] != new_idom {
                    self.idom.insert(*block, new_idom);
                    changed = true;
                }
            }
        }

        self.idom.insert(rpo[0], None);

        self.domtree.clear();
        for block in rpo.iter() {
            self.domtree.insert(*block, Vec::new());
        }

        for (block, idom) in self.idom.iter() {
            if let Some(idom) = idom {
                self.domtree.get_mut(idom).unwrap().push(*block);
            }
        }

        self.rpo = rpo;
    }
}
