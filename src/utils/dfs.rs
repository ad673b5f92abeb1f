//! # Depth-First Search on the Control Flow Graph
//!
//! A low-level DFS interface and iterators as reusable components; the
//! dominance analysis consumes the post-order.

use rustc_hash::FxHashSet;

use crate::ir::{Block, Graph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Enter,
    Leave,
}

pub struct DfsContext {
    stack: Vec<(Event, Block)>,
    visited: FxHashSet<Block>,
}

impl Default for DfsContext {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            visited: FxHashSet::default(),
        }
    }
}

impl DfsContext {
    /// Iterate blocks reachable from the start block, yielding enter and
    /// leave events.
    pub fn iter<'a>(&'a mut self, g: &'a Graph) -> DfsIterator<'a> {
        self.stack.clear();
        self.visited.clear();
        self.stack.push((Event::Enter, g.start_block()));
        DfsIterator { g, dfs: self }
    }

    pub fn pre_order_iter<'a>(&'a mut self, g: &'a Graph) -> DfsPreOrderIterator<'a> {
        DfsPreOrderIterator(self.iter(g))
    }

    pub fn post_order_iter<'a>(&'a mut self, g: &'a Graph) -> DfsPostOrderIterator<'a> {
        DfsPostOrderIterator(self.iter(g))
    }
}

pub struct DfsIterator<'a> {
    g: &'a Graph,
    dfs: &'a mut DfsContext,
}

impl<'a> Iterator for DfsIterator<'a> {
    type Item = (Event, Block);

    fn next(&mut self) -> Option<Self::Item> {
        let mut event_node = None;

        while let Some((event, block)) = self.dfs.stack.pop() {
            if event == Event::Enter && self.dfs.visited.contains(&block) {
                continue;
            }
            event_node = Some((event, block));
            break;
        }

        let (event, block) = event_node?;

        if event == Event::Enter && self.dfs.visited.insert(block) {
            self.dfs.stack.push((Event::Leave, block));
            self.dfs.stack.extend(
                block
                    .succs(self.g)
                    .iter()
                    // reversing prioritizes the first successor on the stack
                    .rev()
                    .filter(|succ| !self.dfs.visited.contains(*succ))
                    .map(|succ| (Event::Enter, *succ)),
            );
        }

        Some((event, block))
    }
}

pub struct DfsPreOrderIterator<'a>(DfsIterator<'a>);

impl<'a> Iterator for DfsPreOrderIterator<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.0.next()? {
                (Event::Enter, block) => return Some(block),
                (Event::Leave, _) => continue,
            }
        }
    }
}

pub struct DfsPostOrderIterator<'a>(DfsIterator<'a>);

impl<'a> Iterator for DfsPostOrderIterator<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.0.next()? {
                (Event::Leave, block) => return Some(block),
                (Event::Enter, _) => continue,
            }
        }
    }
}
