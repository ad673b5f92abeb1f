//! # The Optimizing Node Constructor
//!
//! Every node enters the graph through this module: the requested node is
//! validated, locally optimized, and only then allocated. Local optimization
//! folds all-literal operations into constants, applies the algebraic
//! identities that need no analysis, and normalizes literal constants to the
//! right operand of commutative operations. If the result is equivalent to a
//! node that already exists, the existing node is returned instead of
//! allocating a duplicate.
//!
//! Callers that depend on the opcode of a constructed node must check it on
//! the returned node; local optimization is free to change it (for example
//! `x + x` becomes `x << 1`).

use super::{Block, Graph, Mode, Node, NodeKind, NodeOp, Span, Symbol, Tarval};

/// The identity of a pure node, used to find existing equivalent nodes.
///
/// Commutative operands are order-normalized. The owning block is part of the
/// identity: nodes are pinned, so two equal computations in different blocks
/// stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeSignature {
    kind: NodeKind,
    mode: Mode,
    block: Block,
    operands: Vec<Node>,
}

impl NodeSignature {
    fn new(kind: NodeKind, mode: Mode, block: Block, operands: &[Node]) -> NodeSignature {
        let mut operands = operands.to_vec();
        if kind.op().is_commutative() {
            operands.sort_by_key(|n| n.id());
        }
        NodeSignature {
            kind,
            mode,
            block,
            operands,
        }
    }

    /// The signature of an existing node, or `None` if the node does not
    /// participate in reuse (impure or deleted).
    pub(in crate::ir) fn of(g: &Graph, node: Node) -> Option<NodeSignature> {
        if !is_pure(node.op(g)) {
            return None;
        }
        Some(NodeSignature::new(
            node.kind(g).clone(),
            node.mode(g),
            node.block(g),
            node.inputs(g),
        ))
    }
}

/// Whether nodes of this opcode may be shared between all their users.
fn is_pure(op: NodeOp) -> bool {
    match op {
        NodeOp::Const
        | NodeOp::Address
        | NodeOp::Offset
        | NodeOp::Size
        | NodeOp::Align
        | NodeOp::Bad
        | NodeOp::Arg
        | NodeOp::Add
        | NodeOp::Sub
        | NodeOp::Mul
        | NodeOp::Shl
        | NodeOp::And
        | NodeOp::Or
        | NodeOp::Eor
        | NodeOp::Not
        | NodeOp::Conv => true,
        NodeOp::Phi | NodeOp::Load | NodeOp::Deleted => false,
    }
}

impl Graph {
    /// Drop a node from the reuse table, if it is the table's entry for its
    /// signature.
    pub(in crate::ir) fn cse_evict(&mut self, node: Node) {
        if let Some(sig) = NodeSignature::of(self, node) {
            if self.cse.get(&sig) == Some(&node) {
                self.cse.remove(&sig);
            }
        }
    }
}

/// The mode of a binary operation from its operands. `Add`/`Sub` may combine
/// a reference with an integer, in which case the result is a reference.
fn mode_from_ops(g: &Graph, a: Node, b: Node) -> Mode {
    let m1 = a.mode(g);
    if m1.is_reference() {
        return m1;
    }
    let m2 = b.mode(g);
    if m2.is_reference() {
        return m2;
    }
    assert_eq!(m1, m2, "operand modes do not agree");
    m1
}

fn verify_binop(g: &Graph, op: NodeOp, l: Node, r: Node) -> Mode {
    let ml = l.mode(g);
    let mr = r.mode(g);
    match op {
        NodeOp::Add => {
            if ml.is_reference() && mr.is_int() || ml.is_int() && mr.is_reference() {
                return mode_from_ops(g, l, r);
            }
            if !(ml.is_int() || ml.is_float()) {
                panic!("add requires integer, float or reference operands, got {}", ml);
            }
            assert_eq!(ml, mr, "operand modes of add do not agree");
            ml
        }
        NodeOp::Sub => {
            if ml.is_reference() && mr.is_int() {
                return ml;
            }
            if !(ml.is_int() || ml.is_float()) {
                panic!("sub requires integer, float or reference operands, got {}", ml);
            }
            assert_eq!(ml, mr, "operand modes of sub do not agree");
            ml
        }
        NodeOp::Mul => {
            if !(ml.is_int() || ml.is_float()) {
                panic!("mul requires integer or float operands, got {}", ml);
            }
            assert_eq!(ml, mr, "operand modes of mul do not agree");
            ml
        }
        NodeOp::Shl => {
            if !ml.is_int() || !mr.is_int() {
                panic!("shl requires integer operands, got {} and {}", ml, mr);
            }
            // the shift amount may have any integer mode
            ml
        }
        NodeOp::And | NodeOp::Or | NodeOp::Eor => {
            if !ml.is_int() {
                panic!("bitwise operations require integer operands, got {}", ml);
            }
            assert_eq!(ml, mr, "operand modes of bitwise operation do not agree");
            ml
        }
        NodeOp::Const
        | NodeOp::Address
        | NodeOp::Offset
        | NodeOp::Size
        | NodeOp::Align
        | NodeOp::Bad
        | NodeOp::Arg
        | NodeOp::Not
        | NodeOp::Conv
        | NodeOp::Phi
        | NodeOp::Load
        | NodeOp::Deleted => panic!("{} is not a binary operation", op),
    }
}

fn binop_kind(op: NodeOp) -> NodeKind {
    match op {
        NodeOp::Add => NodeKind::Add,
        NodeOp::Sub => NodeKind::Sub,
        NodeOp::Mul => NodeKind::Mul,
        NodeOp::Shl => NodeKind::Shl,
        NodeOp::And => NodeKind::And,
        NodeOp::Or => NodeKind::Or,
        NodeOp::Eor => NodeKind::Eor,
        NodeOp::Const
        | NodeOp::Address
        | NodeOp::Offset
        | NodeOp::Size
        | NodeOp::Align
        | NodeOp::Bad
        | NodeOp::Arg
        | NodeOp::Not
        | NodeOp::Conv
        | NodeOp::Phi
        | NodeOp::Load
        | NodeOp::Deleted => panic!("{} is not a binary operation", op),
    }
}

fn fold_binop(op: NodeOp, a: Tarval, b: Tarval) -> Option<Tarval> {
    match op {
        NodeOp::Add => a.add(b),
        NodeOp::Sub => a.sub(b),
        NodeOp::Mul => a.mul(b),
        NodeOp::Shl => a.shl(b),
        NodeOp::And => a.and(b),
        NodeOp::Or => a.or(b),
        NodeOp::Eor => a.eor(b),
        NodeOp::Const
        | NodeOp::Address
        | NodeOp::Offset
        | NodeOp::Size
        | NodeOp::Align
        | NodeOp::Bad
        | NodeOp::Arg
        | NodeOp::Not
        | NodeOp::Conv
        | NodeOp::Phi
        | NodeOp::Load
        | NodeOp::Deleted => None,
    }
}

fn const_value(g: &Graph, n: Node) -> Option<Tarval> {
    match *n.kind(g) {
        NodeKind::Const(tv) => Some(tv),
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
        | NodeKind::Deleted => None,
    }
}

/// Allocate the node unless an equivalent one already exists.
fn finish(g: &mut Graph, span: Span, block: Block, kind: NodeKind, mode: Mode, operands: Vec<Node>) -> Node {
    let sig = NodeSignature::new(kind.clone(), mode, block, &operands);
    if let Some(&existing) = g.cse.get(&sig) {
        // entries go stale when a user's operands are rewritten underneath
        // the table, so re-check before reusing
        if NodeSignature::of(g, existing).as_ref() == Some(&sig) {
            return existing;
        }
        g.cse.remove(&sig);
    }
    let node = Node::new_raw(g, span, block, kind, mode, operands);
    g.cse.insert(sig, node);
    node
}

impl Node {
    /// Create a binary operation, running local optimization. The result may
    /// be an existing node, a constant, or a node with a different opcode.
    pub fn binop(g: &mut Graph, span: Span, block: Block, op: NodeOp, l: Node, r: Node) -> Node {
        let mode = verify_binop(g, op, l, r);

        if let (Some(a), Some(b)) = (const_value(g, l), const_value(g, r)) {
            if let Some(tv) = fold_binop(op, a, b) {
                return Node::const_tv(g, span, tv);
            }
        }

        if !mode.is_float() {
            let lv = const_value(g, l);
            let rv = const_value(g, r);
            match op {
                NodeOp::Add => {
                    if rv.is_some_and(|tv| tv.is_zero()) {
                        return l;
                    }
                    if lv.is_some_and(|tv| tv.is_zero()) {
                        return r;
                    }
                    if l == r && mode.is_int() {
                        let one = Node::const_tv(g, span, Tarval::one(mode));
                        return Node::binop(g, span, block, NodeOp::Shl, l, one);
                    }
                }
                NodeOp::Sub => {
                    if rv.is_some_and(|tv| tv.is_zero()) {
                        return l;
                    }
                    if l == r {
                        return Node::const_tv(g, span, Tarval::zero(mode));
                    }
                }
                NodeOp::Mul => {
                    if rv.is_some_and(|tv| tv.is_one()) {
                        return l;
                    }
                    if lv.is_some_and(|tv| tv.is_one()) {
                        return r;
                    }
                    if rv.is_some_and(|tv| tv.is_zero()) || lv.is_some_and(|tv| tv.is_zero()) {
                        return Node::const_tv(g, span, Tarval::zero(mode));
                    }
                }
                NodeOp::Shl => {
                    if rv.is_some_and(|tv| tv.is_zero()) {
                        return l;
                    }
                }
                NodeOp::And => {
                    if rv.is_some_and(|tv| tv.is_all_ones()) {
                        return l;
                    }
                    if lv.is_some_and(|tv| tv.is_all_ones()) {
                        return r;
                    }
                    if l == r {
                        return l;
                    }
                    if rv.is_some_and(|tv| tv.is_zero()) || lv.is_some_and(|tv| tv.is_zero()) {
                        return Node::const_tv(g, span, Tarval::zero(mode));
                    }
                }
                NodeOp::Or => {
                    if rv.is_some_and(|tv| tv.is_zero()) {
                        return l;
                    }
                    if lv.is_some_and(|tv| tv.is_zero()) {
                        return r;
                    }
                    if l == r {
                        return l;
                    }
                    if rv.is_some_and(|tv| tv.is_all_ones()) || lv.is_some_and(|tv| tv.is_all_ones())
                    {
                        return Node::const_tv(g, span, Tarval::all_ones(mode));
                    }
                }
                NodeOp::Eor => {
                    if rv.is_some_and(|tv| tv.is_zero()) {
                        return l;
                    }
                    if lv.is_some_and(|tv| tv.is_zero()) {
                        return r;
                    }
                    if l == r {
                        return Node::const_tv(g, span, Tarval::zero(mode));
                    }
                }
                NodeOp::Const
                | NodeOp::Address
                | NodeOp::Offset
                | NodeOp::Size
                | NodeOp::Align
                | NodeOp::Bad
                | NodeOp::Arg
                | NodeOp::Not
                | NodeOp::Conv
                | NodeOp::Phi
                | NodeOp::Load
                | NodeOp::Deleted => unreachable!(),
            }
        }

        // normalize: a literal constant goes to the right operand
        let (l, r) = if op.is_commutative() && l.is_const(g) && !r.is_const(g) {
            (r, l)
        } else {
            (l, r)
        };

        finish(g, span, block, binop_kind(op), mode, vec![l, r])
    }

    pub fn add(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::Add, l, r)
    }

    pub fn sub(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::Sub, l, r)
    }

    pub fn mul(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::Mul, l, r)
    }

    pub fn shl(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::Shl, l, r)
    }

    pub fn and_(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::And, l, r)
    }

    pub fn or_(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::Or, l, r)
    }

    pub fn eor(g: &mut Graph, span: Span, block: Block, l: Node, r: Node) -> Node {
        Node::binop(g, span, block, NodeOp::Eor, l, r)
    }

    /// Create a bitwise not.
    pub fn not_(g: &mut Graph, span: Span, block: Block, v: Node) -> Node {
        let mode = v.mode(g);
        if !mode.is_int() {
            panic!("not requires an integer operand, got {}", mode);
        }
        if let Some(tv) = const_value(g, v) {
            if let Some(folded) = tv.not() {
                return Node::const_tv(g, span, folded);
            }
        }
        if v.is_not(g) {
            return v.not_op(g);
        }
        finish(g, span, block, NodeKind::Not, mode, vec![v])
    }

    /// Create an integer conversion to the given mode.
    pub fn conv(g: &mut Graph, span: Span, block: Block, v: Node, to: Mode) -> Node {
        let from = v.mode(g);
        if !from.is_data() || !to.is_data() {
            panic!("conv requires data modes, got {} -> {}", from, to);
        }
        if from == to {
            return v;
        }
        if let Some(tv) = const_value(g, v) {
            if let Some(folded) = tv.convert(to) {
                return Node::const_tv(g, span, folded);
            }
        }
        finish(g, span, block, NodeKind::Conv, to, vec![v])
    }

    /// Create a constant. Constants live in the start block.
    pub fn const_tv(g: &mut Graph, span: Span, tv: Tarval) -> Node {
        let block = g.start_block();
        finish(g, span, block, NodeKind::Const(tv), tv.mode(), Vec::new())
    }

    /// Create an integer constant from a signed value.
    pub fn iconst(g: &mut Graph, span: Span, value: i64, mode: Mode) -> Node {
        Node::const_tv(g, span, Tarval::from_i64(value, mode))
    }

    /// Create the address of a named entity.
    pub fn address(g: &mut Graph, span: Span, symbol: impl Into<Symbol>) -> Node {
        let block = g.start_block();
        finish(
            g,
            span,
            block,
            NodeKind::Address(symbol.into()),
            Mode::P,
            Vec::new(),
        )
    }

    pub fn offset_of(g: &mut Graph, span: Span, symbol: impl Into<Symbol>, mode: Mode) -> Node {
        assert!(mode.is_int(), "offset requires an integer mode");
        let block = g.start_block();
        finish(
            g,
            span,
            block,
            NodeKind::Offset(symbol.into()),
            mode,
            Vec::new(),
        )
    }

    pub fn size_of(g: &mut Graph, span: Span, symbol: impl Into<Symbol>, mode: Mode) -> Node {
        assert!(mode.is_int(), "size requires an integer mode");
        let block = g.start_block();
        finish(
            g,
            span,
            block,
            NodeKind::Size(symbol.into()),
            mode,
            Vec::new(),
        )
    }

    pub fn align_of(g: &mut Graph, span: Span, symbol: impl Into<Symbol>, mode: Mode) -> Node {
        assert!(mode.is_int(), "align requires an integer mode");
        let block = g.start_block();
        finish(
            g,
            span,
            block,
            NodeKind::Align(symbol.into()),
            mode,
            Vec::new(),
        )
    }

    /// Create a procedure argument. Arguments live in the start block.
    pub fn arg(g: &mut Graph, span: Span, index: u32, mode: Mode) -> Node {
        let block = g.start_block();
        finish(g, span, block, NodeKind::Arg(index), mode, Vec::new())
    }

    /// Create an error sentinel of the given mode.
    pub fn bad(g: &mut Graph, mode: Mode) -> Node {
        let block = g.start_block();
        finish(
            g,
            Span::default(),
            block,
            NodeKind::Bad,
            mode,
            Vec::new(),
        )
    }

    /// Create a value join with one input per predecessor of `block`.
    ///
    /// Phi nodes are never shared; their identity is their placement.
    pub fn phi(g: &mut Graph, span: Span, block: Block, mode: Mode, inputs: Vec<Node>) -> Node {
        assert_eq!(
            inputs.len(),
            block.preds(g).len(),
            "phi requires one input per block predecessor"
        );
        for input in inputs.iter() {
            assert_eq!(input.mode(g), mode, "phi input mode does not agree");
        }
        Node::new_raw(g, span, block, NodeKind::Phi, mode, inputs)
    }

    /// Create an opaque memory read. Loads are never shared.
    pub fn load(g: &mut Graph, span: Span, block: Block, mode: Mode, addr: Node) -> Node {
        assert!(
            addr.mode(g).is_reference(),
            "load requires a reference address"
        );
        Node::new_raw(g, span, block, NodeKind::Load, mode, vec![addr])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding() {
        let mut g = Graph::new();
        let span = Span::default();
        let block = g.start_block();

        let c1 = Node::iconst(&mut g, span, 3, Mode::I32);
        let c2 = Node::iconst(&mut g, span, 4, Mode::I32);

        let sum = Node::add(&mut g, span, block, c1, c2);
        assert_eq!(sum.const_tarval(&g), Tarval::from_i64(7, Mode::I32));

        let prod = Node::mul(&mut g, span, block, c1, c2);
        assert_eq!(prod.const_tarval(&g), Tarval::from_i64(12, Mode::I32));
    }

    #[test]
    fn test_constants_are_shared() {
        let mut g = Graph::new();
        let span = Span::default();

        let c1 = Node::iconst(&mut g, span, 42, Mode::I32);
        let c2 = Node::iconst(&mut g, span, 42, Mode::I32);
        assert_eq!(c1, c2);

        // a different mode yields a different node
        let c3 = Node::iconst(&mut g, span, 42, Mode::U32);
        assert_ne!(c1, c3);
    }

    #[test]
    fn test_identities() {
        let mut g = Graph::new();
        let span = Span::default();
        let block = g.start_block();

        let x = Node::arg(&mut g, span, 0, Mode::I32);
        let zero = Node::iconst(&mut g, span, 0, Mode::I32);

        assert_eq!(Node::add(&mut g, span, block, x, zero), x);
        assert_eq!(Node::eor(&mut g, span, block, x, zero), x);
        assert_eq!(Node::or_(&mut g, span, block, x, x), x);
        assert_eq!(Node::and_(&mut g, span, block, x, x), x);

        let xx = Node::eor(&mut g, span, block, x, x);
        assert!(xx.const_tarval(&g).is_zero());

        // x + x becomes a shift
        let doubled = Node::add(&mut g, span, block, x, x);
        assert!(doubled.is_shl(&g));
        assert_eq!(doubled.binop_left(&g), x);
    }

    #[test]
    fn test_const_normalized_right() {
        let mut g = Graph::new();
        let span = Span::default();
        let block = g.start_block();

        let x = Node::arg(&mut g, span, 0, Mode::I32);
        let c = Node::iconst(&mut g, span, 5, Mode::I32);

        let n = Node::add(&mut g, span, block, c, x);
        assert_eq!(n.binop_left(&g), x);
        assert_eq!(n.binop_right(&g), c);

        // the normalized forms are the same node
        let m = Node::add(&mut g, span, block, x, c);
        assert_eq!(n, m);
    }

    #[test]
    fn test_double_not() {
        let mut g = Graph::new();
        let span = Span::default();
        let block = g.start_block();

        let x = Node::arg(&mut g, span, 0, Mode::U32);
        let n1 = Node::not_(&mut g, span, block, x);
        let n2 = Node::not_(&mut g, span, block, n1);
        assert_eq!(n2, x);
    }

    #[test]
    fn test_pointer_add_mode() {
        let mut g = Graph::new();
        let span = Span::default();
        let block = g.start_block();

        let p = Node::arg(&mut g, span, 0, Mode::P);
        let off = Node::iconst(&mut g, span, 8, Mode::I32);

        let q = Node::add(&mut g, span, block, p, off);
        assert_eq!(q.mode(&g), Mode::P);
    }

    #[test]
    fn test_conv_fold() {
        let mut g = Graph::new();
        let span = Span::default();
        let block = g.start_block();

        let c = Node::iconst(&mut g, span, -2, Mode::I16);
        let widened = Node::conv(&mut g, span, block, c, Mode::I32);
        assert_eq!(widened.const_tarval(&g).as_i64(), -2);

        let x = Node::arg(&mut g, span, 0, Mode::I32);
        assert_eq!(Node::conv(&mut g, span, block, x, Mode::I32), x);
    }
}
