//! # Graphs
//!
//! A [Graph] is the container of all nodes and blocks of one procedure. It
//! owns the arenas, the start block, the analysis caches (dominance, loop
//! info) guarded by the property protocol, and the constructor's table of
//! existing nodes.

use std::ops;

use rustc_hash::FxHashMap;

use super::{construct::NodeSignature, BlockData, Node, NodeData, NodeKind};
use crate::{
    collections::storage::{ArenaPtr, BaseArena},
    ir::Block,
    utils::{dominance::Dominance, loop_info::LoopContext},
};

/// Whether the nodes of a graph are pinned to their blocks.
///
/// The reassociation pass requires a pinned graph: placement decisions are
/// made against the block a node actually sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Pinned,
    Floats,
}

/// A set of graph properties that analyses and passes rely on.
///
/// Passes assert the properties they need with
/// [assure_properties](Graph::assure_properties) and declare the ones they
/// kept intact with [confirm_properties](Graph::confirm_properties);
/// everything not confirmed is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphProperties(u32);

impl GraphProperties {
    pub const CONSISTENT_DOMINANCE: GraphProperties = GraphProperties(1 << 0);
    pub const CONSISTENT_LOOPINFO: GraphProperties = GraphProperties(1 << 1);
    pub const CONSISTENT_OUT_EDGES: GraphProperties = GraphProperties(1 << 2);
    /// The properties that only depend on control flow. A pass that rewrites
    /// values but never touches blocks or edges preserves these.
    pub const CONTROL_FLOW: GraphProperties =
        GraphProperties(Self::CONSISTENT_DOMINANCE.0 | Self::CONSISTENT_LOOPINFO.0);
    pub const NONE: GraphProperties = GraphProperties(0);

    pub fn contains(self, other: GraphProperties) -> bool { self.0 & other.0 == other.0 }
}

impl ops::BitOr for GraphProperties {
    type Output = GraphProperties;

    fn bitor(self, rhs: GraphProperties) -> GraphProperties { GraphProperties(self.0 | rhs.0) }
}

impl ops::BitOrAssign for GraphProperties {
    fn bitor_assign(&mut self, rhs: GraphProperties) { self.0 |= rhs.0; }
}

impl ops::BitAnd for GraphProperties {
    type Output = GraphProperties;

    fn bitand(self, rhs: GraphProperties) -> GraphProperties { GraphProperties(self.0 & rhs.0) }
}

/// The graph of one procedure.
pub struct Graph {
    /// The storage of nodes.
    pub(in crate::ir) nodes: BaseArena<NodeData>,
    /// The storage of blocks.
    pub(in crate::ir) blocks: BaseArena<BlockData>,
    /// The distinguished entry block. Constant leaves live here.
    start_block: Option<Block>,
    pin_state: PinState,
    properties: GraphProperties,
    /// Dominance information, valid while the property bit is set.
    dom: Option<Dominance>,
    /// Loop information, valid while the property bit is set.
    loops: Option<LoopContext>,
    /// The constructor's table of existing pure nodes.
    pub(in crate::ir) cse: FxHashMap<NodeSignature, Node>,
    /// Whether imprecise floating-point transforms are allowed.
    imprecise_float_transforms: bool,
}

impl Default for Graph {
    fn default() -> Graph { Graph::new() }
}

impl Graph {
    pub fn new() -> Graph {
        let mut g = Graph {
            nodes: BaseArena::default(),
            blocks: BaseArena::default(),
            start_block: None,
            pin_state: PinState::Pinned,
            properties: GraphProperties::NONE,
            dom: None,
            loops: None,
            cse: FxHashMap::default(),
            imprecise_float_transforms: false,
        };
        let entry = Block::new(&mut g);
        g.start_block = Some(entry);
        g
    }

    pub fn start_block(&self) -> Block { self.start_block.expect("graph has no start block") }

    pub fn pin_state(&self) -> PinState { self.pin_state }

    /// Whether imprecise floating-point transforms are allowed on this graph.
    pub fn imprecise_float_transforms_allowed(&self) -> bool { self.imprecise_float_transforms }

    pub fn set_imprecise_float_transforms(&mut self, allowed: bool) {
        self.imprecise_float_transforms = allowed;
    }

    /// All live nodes, in allocation order.
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.iter().map(|(_, data)| data.self_ptr()).collect()
    }

    /// All blocks, in allocation order.
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks
            .iter()
            .map(|(_, data)| data.self_ptr())
            .collect()
    }

    /// Replace `old` by `new`: every use of `old` is redirected to `new`,
    /// and `old` becomes a tombstone whose memory the graph reclaims in
    /// [sweep](Graph::sweep).
    ///
    /// # Panics
    ///
    /// Panics when exchanging a node with itself.
    pub fn exchange(&mut self, old: Node, new: Node) {
        assert_ne!(old, new, "exchanging a node with itself");

        for user in old.users(self) {
            for idx in 0..user.arity(self) {
                if user.input(self, idx) == old {
                    user.set_input(self, idx, new);
                }
            }
        }
        debug_assert!(!old.is_used(self));

        self.cse_evict(old);
        old.clear_inputs(self);
        old.deref_mut(self).kind = NodeKind::Deleted;
    }

    /// Reclaim the tombstones left behind by [exchange](Graph::exchange).
    pub fn sweep(&mut self) {
        let dead = self
            .nodes()
            .into_iter()
            .filter(|n| n.is_deleted(self) && !n.is_used(self))
            .collect::<Vec<_>>();
        for node in dead {
            node.drop(self);
        }
    }

    pub fn has_property(&self, props: GraphProperties) -> bool { self.properties.contains(props) }

    /// Make the requested properties hold, computing the missing analyses.
    pub fn assure_properties(&mut self, props: GraphProperties) {
        let needs_dom = props.contains(GraphProperties::CONSISTENT_DOMINANCE)
            || props.contains(GraphProperties::CONSISTENT_LOOPINFO);

        if needs_dom
            && (self.dom.is_none()
                || !self
                    .properties
                    .contains(GraphProperties::CONSISTENT_DOMINANCE))
        {
            let mut dom = Dominance::default();
            dom.compute(self);
            self.dom = Some(dom);
            self.properties |= GraphProperties::CONSISTENT_DOMINANCE;
        }

        if props.contains(GraphProperties::CONSISTENT_LOOPINFO)
            && (self.loops.is_none()
                || !self
                    .properties
                    .contains(GraphProperties::CONSISTENT_LOOPINFO))
        {
            let loops = LoopContext::new(self, self.dom.as_ref().unwrap());
            self.loops = Some(loops);
            self.properties |= GraphProperties::CONSISTENT_LOOPINFO;
        }

        // out edges are maintained dynamically together with the def-use
        // information, so the property holds as soon as it is requested
        self.properties |= props;
    }

    /// Declare that only the given properties survived a pass; everything
    /// else is invalidated and the corresponding caches are dropped.
    pub fn confirm_properties(&mut self, props: GraphProperties) {
        self.properties = self.properties & props;
        if !self
            .properties
            .contains(GraphProperties::CONSISTENT_DOMINANCE)
        {
            self.dom = None;
        }
        if !self
            .properties
            .contains(GraphProperties::CONSISTENT_LOOPINFO)
        {
            self.loops = None;
        }
    }

    /// The dominance information, while it is consistent.
    pub fn dominance(&self) -> Option<&Dominance> { self.dom.as_ref() }

    /// The loop information, while it is consistent.
    pub fn loop_info(&self) -> Option<&LoopContext> { self.loops.as_ref() }

    /// Whether block `a` dominates block `b`.
    ///
    /// # Panics
    ///
    /// Panics if dominance information has not been assured.
    pub fn block_dominates(&self, a: Block, b: Block) -> bool {
        self.dom
            .as_ref()
            .expect("dominance information not computed")
            .dominates(a, b)
    }

    /// Whether `n` is invariant relative to the loop enclosing `block`: the
    /// block must sit in some loop, and `n`'s block must lie outside of it.
    ///
    /// # Panics
    ///
    /// Panics if loop information has not been assured.
    pub fn is_loop_invariant(&self, n: Node, block: Block) -> bool {
        let loops = self.loops.as_ref().expect("loop information not computed");
        match loops.get_loop(block) {
            Some(lp) => !loops.is_in_loop(n.block(self), lp),
            None => false,
        }
    }
}
