//! # Nodes
//!
//! The IR is a sea of nodes: every value-producing operation is a [Node] with
//! an opcode, a mode, an ordered list of input edges to other nodes, and an
//! owning block. Def-use information is maintained dynamically as a multiset
//! of users per node, so the out-edge count of a node (with multiplicity) is
//! always available without a separate analysis pass.

use core::fmt;

use rustc_hash::FxHashMap;

use super::{Block, Graph, Mode, Span, Tarval};
use crate::{
    collections::storage::{ArenaFree, ArenaPtr, BaseArenaPtr},
    impl_arena,
};

/// A named entity referenced by constant-like nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Symbol { Symbol(name.into()) }

    pub fn name(&self) -> &str { &self.0 }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Symbol { Symbol(name.to_string()) }
}

impl From<String> for Symbol {
    fn from(name: String) -> Symbol { Symbol(name) }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "@{}", self.0) }
}

/// The opcode of a node, with payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A literal constant.
    Const(Tarval),
    /// The address of a named entity.
    Address(Symbol),
    /// The offset of an entity within its container.
    Offset(Symbol),
    /// The size of a named type or entity.
    Size(Symbol),
    /// The alignment of a named type or entity.
    Align(Symbol),
    /// The error sentinel.
    Bad,
    /// A procedure argument.
    Arg(u32),
    Add,
    Sub,
    Mul,
    /// Shift left. The shift amount may have any integer mode.
    Shl,
    And,
    Or,
    /// Bitwise exclusive or.
    Eor,
    /// Bitwise not.
    Not,
    /// Integer conversion; the target mode is the node's mode.
    Conv,
    /// Value join, one input per block predecessor.
    Phi,
    /// An opaque memory read.
    Load,
    /// Tombstone left behind by [Graph::exchange]. Reclaimed by the graph,
    /// never visited by passes.
    Deleted,
}

impl NodeKind {
    /// The opcode class, without payload.
    pub fn op(&self) -> NodeOp {
        match self {
            NodeKind::Const(_) => NodeOp::Const,
            NodeKind::Address(_) => NodeOp::Address,
            NodeKind::Offset(_) => NodeOp::Offset,
            NodeKind::Size(_) => NodeOp::Size,
            NodeKind::Align(_) => NodeOp::Align,
            NodeKind::Bad => NodeOp::Bad,
            NodeKind::Arg(_) => NodeOp::Arg,
            NodeKind::Add => NodeOp::Add,
            NodeKind::Sub => NodeOp::Sub,
            NodeKind::Mul => NodeOp::Mul,
            NodeKind::Shl => NodeOp::Shl,
            NodeKind::And => NodeOp::And,
            NodeKind::Or => NodeOp::Or,
            NodeKind::Eor => NodeOp::Eor,
            NodeKind::Not => NodeOp::Not,
            NodeKind::Conv => NodeOp::Conv,
            NodeKind::Phi => NodeOp::Phi,
            NodeKind::Load => NodeOp::Load,
            NodeKind::Deleted => NodeOp::Deleted,
        }
    }
}

/// The opcode class of a node.
///
/// Rules dispatch on this (a table keyed by opcode), and structural matches
/// compare opcode classes without caring about payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOp {
    Const,
    Address,
    Offset,
    Size,
    Align,
    Bad,
    Arg,
    Add,
    Sub,
    Mul,
    Shl,
    And,
    Or,
    Eor,
    Not,
    Conv,
    Phi,
    Load,
    Deleted,
}

impl NodeOp {
    /// Whether the two operands of the opcode can be swapped without changing
    /// semantics.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            NodeOp::Add | NodeOp::Mul | NodeOp::And | NodeOp::Or | NodeOp::Eor
        )
    }

    /// Whether the opcode is a two-operand operation.
    pub fn is_binop(self) -> bool {
        matches!(
            self,
            NodeOp::Add
                | NodeOp::Sub
                | NodeOp::Mul
                | NodeOp::Shl
                | NodeOp::And
                | NodeOp::Or
                | NodeOp::Eor
        )
    }

    /// Whether the opcode is a constant-like leaf: a value that is fixed for
    /// the whole procedure but not a foldable literal.
    pub fn is_constlike(self) -> bool {
        matches!(
            self,
            NodeOp::Address | NodeOp::Offset | NodeOp::Size | NodeOp::Align
        )
    }
}

impl fmt::Display for NodeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOp::Const => write!(f, "const"),
            NodeOp::Address => write!(f, "address"),
            NodeOp::Offset => write!(f, "offset"),
            NodeOp::Size => write!(f, "size"),
            NodeOp::Align => write!(f, "align"),
            NodeOp::Bad => write!(f, "bad"),
            NodeOp::Arg => write!(f, "arg"),
            NodeOp::Add => write!(f, "add"),
            NodeOp::Sub => write!(f, "sub"),
            NodeOp::Mul => write!(f, "mul"),
            NodeOp::Shl => write!(f, "shl"),
            NodeOp::And => write!(f, "and"),
            NodeOp::Or => write!(f, "or"),
            NodeOp::Eor => write!(f, "eor"),
            NodeOp::Not => write!(f, "not"),
            NodeOp::Conv => write!(f, "conv"),
            NodeOp::Phi => write!(f, "phi"),
            NodeOp::Load => write!(f, "load"),
            NodeOp::Deleted => write!(f, "deleted"),
        }
    }
}

pub struct NodeData {
    this: Node,
    pub(in crate::ir) kind: NodeKind,
    mode: Mode,
    block: Block,
    pub(in crate::ir) operands: Vec<Node>,
    /// The users of this node, mapped to the number of input slots through
    /// which they reference it.
    users: FxHashMap<Node, u32>,
    span: Span,
}

impl NodeData {
    pub fn self_ptr(&self) -> Node { self.this }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub struct Node(BaseArenaPtr<NodeData>);

impl_arena!(Graph, NodeData, Node, nodes);

impl Node {
    /// Allocate a node and register its uses.
    ///
    /// This is the raw allocation path; it performs no validation, no local
    /// optimization and no reuse of equivalent nodes. Use the typed creators
    /// unless constructing something deliberately unusual.
    pub(in crate::ir) fn new_raw(
        g: &mut Graph,
        span: Span,
        block: Block,
        kind: NodeKind,
        mode: Mode,
        operands: Vec<Node>,
    ) -> Node {
        use crate::collections::storage::ArenaAlloc;

        let node = g.alloc_with(|this| NodeData {
            this,
            kind,
            mode,
            block,
            operands: Vec::new(),
            users: FxHashMap::default(),
            span,
        });
        for opd in operands.iter() {
            opd.add_use(g, node);
        }
        node.deref_mut(g).operands = operands;
        node
    }

    pub fn kind(self, g: &Graph) -> &NodeKind { &self.deref(g).kind }

    pub fn op(self, g: &Graph) -> NodeOp { self.deref(g).kind.op() }

    pub fn mode(self, g: &Graph) -> Mode { self.deref(g).mode }

    pub fn block(self, g: &Graph) -> Block { self.deref(g).block }

    pub fn set_block(self, g: &mut Graph, block: Block) { self.deref_mut(g).block = block; }

    pub fn span(self, g: &Graph) -> Span { self.deref(g).span }

    /// The number of input edges.
    pub fn arity(self, g: &Graph) -> usize { self.deref(g).operands.len() }

    /// The input at the given index.
    pub fn input(self, g: &Graph, idx: usize) -> Node { self.deref(g).operands[idx] }

    /// All input edges, in order.
    pub fn inputs(self, g: &Graph) -> &[Node] { &self.deref(g).operands }

    /// Redirect the input at the given index, updating use counts.
    pub fn set_input(self, g: &mut Graph, idx: usize, new: Node) {
        let old = self.deref(g).operands[idx];
        if old == new {
            return;
        }
        old.remove_use(g, self);
        new.add_use(g, self);
        self.deref_mut(g).operands[idx] = new;
    }

    /// The distinct users of this node.
    pub fn users(self, g: &Graph) -> Vec<Node> { self.deref(g).users.keys().copied().collect() }

    /// The number of out edges, counting a user once per referencing slot.
    pub fn n_outs(self, g: &Graph) -> usize {
        self.deref(g).users.values().map(|c| *c as usize).sum()
    }

    pub fn is_used(self, g: &Graph) -> bool { !self.deref(g).users.is_empty() }

    pub(in crate::ir) fn add_use(self, g: &mut Graph, user: Node) {
        *self.deref_mut(g).users.entry(user).or_insert(0) += 1;
    }

    pub(in crate::ir) fn remove_use(self, g: &mut Graph, user: Node) {
        let data = self.deref_mut(g);
        let count = data
            .users
            .get_mut(&user)
            .expect("removing a use that was never recorded");
        if *count > 1 {
            *count -= 1;
        } else {
            data.users.remove(&user);
        }
    }

    /// Drop all input edges, releasing the uses.
    pub(in crate::ir) fn clear_inputs(self, g: &mut Graph) {
        let operands = std::mem::take(&mut self.deref_mut(g).operands);
        for opd in operands {
            opd.remove_use(g, self);
        }
    }

    /// Free the node from the graph.
    ///
    /// # Panics
    ///
    /// Panics if the node still has users.
    pub(in crate::ir) fn drop(self, g: &mut Graph) {
        if self.is_used(g) {
            panic!("cannot free a node that still has users");
        }
        self.clear_inputs(g);
        g.free(self);
    }

    pub fn is_const(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Const(_)) }

    pub fn is_bad(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Bad) }

    pub fn is_add(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Add) }

    pub fn is_sub(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Sub) }

    pub fn is_mul(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Mul) }

    pub fn is_shl(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Shl) }

    pub fn is_and(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::And) }

    pub fn is_or(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Or) }

    pub fn is_eor(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Eor) }

    pub fn is_not(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Not) }

    pub fn is_deleted(self, g: &Graph) -> bool { matches!(self.deref(g).kind, NodeKind::Deleted) }

    /// Whether the node is a constant-like leaf (Address, Offset, Size,
    /// Align).
    pub fn is_constlike(self, g: &Graph) -> bool { self.op(g).is_constlike() }

    pub fn is_commutative(self, g: &Graph) -> bool { self.op(g).is_commutative() }

    /// The left operand of a binary operation.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a binary operation.
    pub fn binop_left(self, g: &Graph) -> Node {
        assert!(self.op(g).is_binop(), "node is not a binary operation");
        self.input(g, 0)
    }

    /// The right operand of a binary operation.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a binary operation.
    pub fn binop_right(self, g: &Graph) -> Node {
        assert!(self.op(g).is_binop(), "node is not a binary operation");
        self.input(g, 1)
    }

    /// The operand of a `Not` node.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a `Not`.
    pub fn not_op(self, g: &Graph) -> Node {
        assert!(self.is_not(g), "node is not a Not");
        self.input(g, 0)
    }

    /// The literal value of a `Const` node.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a `Const`.
    pub fn const_tarval(self, g: &Graph) -> Tarval {
        match self.deref(g).kind {
            NodeKind::Const(tv) => tv,
            NodeKind::Address(_)
            | NodeKind::Offset(_)
            | NodeKind::Size(_)
            | NodeKind::Align(_)
            | NodeKind::Bad
            | NodeKind::Arg(_)
            | NodeKind::Add
            | NodeKind::Sub
            | NodeKind::Mul
            | NodeKind::Shl
            | NodeKind::And
            | NodeKind::Or
            | NodeKind::Eor
            | NodeKind::Not
            | NodeKind::Conv
            | NodeKind::Phi
            | NodeKind::Load
            | NodeKind::Deleted => panic!("node is not a Const"),
        }
    }

    /// Get the inner index, stable for the lifetime of the graph.
    pub fn id(self) -> usize { self.0.id() }
}
