//! # Reassociation
//!
//! Rearranges associative and commutative expressions so that constants meet
//! and fold. The pass runs in four stages: the Shannon simplification and the
//! exclusive-or equality simplification rewrite bitwise subgraphs, then a
//! work-queue driven fixpoint pulls constants towards the root of commutative
//! chains, and a final reverse walk undoes the constant motion wherever it
//! did not collapse anything, factoring `(a*x) + (b*x)` into `(a+b)*x` on
//! the way.
//!
//! The forward and reverse rules are duals; the constant-class guards in the
//! commutative rule are what keep the pair from oscillating.

mod equality;
mod shannon;

use rustc_hash::FxHashMap;

use crate::{
    collections::worklist::Worklist,
    ir::{
        passman::{GraphPassMut, ParamStorage, PassManager, PassResult, TransformPass},
        Block,
        Graph,
        GraphProperties,
        Node,
        NodeOp,
        PinState,
    },
};

pub const REASSOCIATION: &str = "reassociation";

/// Whether the node is a bitwise function.
fn is_bitop(g: &Graph, node: Node) -> bool {
    matches!(
        node.op(g),
        NodeOp::And | NodeOp::Eor | NodeOp::Or | NodeOp::Not
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstClass {
    /// The node is not constant.
    NoConstant,
    /// A literal constant that is suitable for constant folding.
    RealConstant,
    /// A constant expression in the current context, e.g. an address or a
    /// loop-invariant value.
    RegionConst,
}

/// Classify a node relative to a block that might be in a loop.
fn const_class(g: &Graph, n: Node, block: Block) -> ConstClass {
    if n.is_const(g) {
        return ConstClass::RealConstant;
    }

    // constant nodes which can't be folded are region constants
    if n.is_constlike(g) {
        return ConstClass::RegionConst;
    }

    // Bad nodes are always loop-invariant, but cannot be handled in later
    // code, so filter them here
    if !n.is_bad(g) && g.is_loop_invariant(n, block) {
        return ConstClass::RegionConst;
    }

    ConstClass::NoConstant
}

/// The operands of a commutative binop; if one operand is constant-ish, it is
/// returned as the second one.
///
/// Real constants outrank region constants here, because the node constructor
/// can fold them.
fn comm_binop_ops(g: &Graph, binop: Node) -> (Node, Node) {
    assert!(binop.op(g).is_commutative());
    let op_a = binop.binop_left(g);
    let op_b = binop.binop_right(g);
    let block = binop.block(g);
    let class_a = const_class(g, op_a, block);
    let class_b = const_class(g, op_b, block);

    use ConstClass as C;
    if class_a == C::RealConstant && class_b == C::RealConstant {
        // if both are constants, one might be a pointer constant like null,
        // return the other one as the variable part
        if op_a.mode(g).is_reference() {
            (op_a, op_b)
        } else {
            (op_b, op_a)
        }
    } else if class_a == C::RealConstant || (class_a == C::RegionConst && class_b == C::NoConstant)
    {
        (op_b, op_a)
    } else {
        (op_a, op_b)
    }
}

type ReassocRule = fn(&mut Graph, Node) -> Option<Node>;

/// Reassociate a commutative binop, returning the new root on change.
///
/// The constant-class guard refuses the situations where pulling the constant
/// up and the reverse pass pushing it back down would chase each other
/// forever: all three positions region-constant, or two region-constant and
/// the third not constant at all.
fn reassoc_commutative(g: &mut Graph, n: Node) -> Option<Node> {
    let op = n.op(g);
    let block = n.block(g);

    let (mut t1, mut c1) = comm_binop_ops(g, n);

    if t1.op(g) == op {
        let (t2, mut c2) = comm_binop_ops(g, t1);
        let c_c1 = const_class(g, c1, block);
        let c_c2 = const_class(g, c2, block);
        let c_t2 = const_class(g, t2, block);

        if c_c1 != ConstClass::NoConstant {
            let classes = [c_c1, c_c2, c_t2];
            let regions = classes
                .iter()
                .filter(|c| **c == ConstClass::RegionConst)
                .count();
            let unclassified = classes
                .iter()
                .filter(|c| **c == ConstClass::NoConstant)
                .count();
            if regions == 3 || (regions == 2 && unclassified == 1) {
                // applying the rule here would lead into a cycle with the
                // reverse pass
                return None;
            }

            // convert c1 .op. (c2 .op. x) => x .op. (c1 .op. c2)
            let mode_c1 = c1.mode(g);
            let mode_c2 = c2.mode(g);

            // c1 and c2 may have different integer modes; widen the narrower
            // one, and on a width tie cast the real constant
            if mode_c1 != mode_c2 && mode_c1.is_int() && mode_c2.is_int() {
                let span = n.span(g);
                let bits_c1 = mode_c1.bits();
                let bits_c2 = mode_c2.bits();
                if bits_c1 > bits_c2 {
                    c2 = Node::conv(g, span, block, c2, mode_c1);
                } else if bits_c1 < bits_c2 {
                    c1 = Node::conv(g, span, block, c1, mode_c2);
                } else if c_c1 == ConstClass::RealConstant {
                    c1 = Node::conv(g, span, block, c1, mode_c2);
                } else {
                    c2 = Node::conv(g, span, block, c2, mode_c1);
                }
            }

            let span = n.span(g);
            let irn0 = Node::binop(g, span, block, op, c1, c2);
            let irn1 = Node::binop(g, span, block, op, t2, irn0);

            if irn1 == n {
                return None;
            }

            log::trace!(
                "applied: %{} .{}. (%{} .{}. %{}) => %{} .{}. (%{} .{}. %{})",
                c1.id(),
                op,
                c2.id(),
                op,
                t2.id(),
                t2.id(),
                op,
                c1.id(),
                op,
                c2.id()
            );

            g.exchange(n, irn1);
            return Some(irn1);
        }
    }

    if c1.op(g) == op {
        std::mem::swap(&mut t1, &mut c1);
    }
    if t1.op(g) == op {
        let mut l = t1.binop_left(g);
        let mut r = t1.binop_right(g);
        if r == c1 {
            std::mem::swap(&mut l, &mut r);
        }

        let c_r = const_class(g, r, block);
        if c_r != ConstClass::NoConstant {
            // a constant was already placed below; descending again would
            // fall into a loop
            return None;
        }

        if l == c1 && r != c1 {
            // convert x .op. (x .op. y) => y .op. (x .op. x)
            let span = n.span(g);
            let irn0 = Node::binop(g, span, block, op, c1, c1);
            let irn1 = Node::binop(g, span, block, op, r, irn0);

            if irn1 == n {
                return None;
            }

            log::trace!(
                "applied: %{} .{}. (%{} .{}. %{}) => %{} .{}. (%{} .{}. %{})",
                c1.id(),
                op,
                l.id(),
                op,
                r.id(),
                r.id(),
                op,
                c1.id(),
                op,
                c1.id()
            );

            g.exchange(n, irn1);
            return Some(irn1);
        }
    }
    None
}

/// Process the work queue until no rule fires anymore.
fn do_reassociation(
    g: &mut Graph,
    wq: &mut Worklist<Node>,
    rules: &FxHashMap<NodeOp, ReassocRule>,
) -> bool {
    let mut changed_any = false;

    while let Some(mut n) = wq.pop() {
        if n.is_deleted(g) {
            continue;
        }

        log::trace!("reassociate %{}", n.id());

        // reassociation must run until a fixpoint is reached
        let mut changed = false;
        loop {
            // reassociating floating-point ops is imprecise
            if n.mode(g).is_float() && !g.imprecise_float_transforms_allowed() {
                break;
            }

            let Some(rule) = rules.get(&n.op(g)) else {
                break;
            };
            match rule(g, n) {
                Some(new_n) => {
                    changed = true;
                    n = new_n;
                }
                None => break,
            }
        }

        if changed {
            changed_any = true;
            let preds = n.inputs(g).iter().rev().copied().collect::<Vec<_>>();
            for pred in preds {
                wq.insert(pred);
            }
        }
    }

    changed_any
}

/// The earliest block where `a` and `b` are both available. Both dominate the
/// block of the previous operation, so one must dominate the other.
///
/// If the earliest block is the start block, return `curr_blk` instead.
fn earliest_block(g: &Graph, a: Node, b: Node, curr_blk: Block) -> Block {
    // if the blocks differ, one must dominate the other
    let blk_a = a.block(g);
    let blk_b = b.block(g);
    let res = if g.block_dominates(blk_a, blk_b) {
        blk_b
    } else {
        blk_a
    };
    if res == g.start_block() {
        return curr_blk;
    }
    res
}

/// A leaf that is constant for the whole procedure.
fn is_simple_const(g: &Graph, node: Node) -> bool {
    matches!(
        node.op(g),
        NodeOp::Const | NodeOp::Address | NodeOp::Offset | NodeOp::Size | NodeOp::Align
    )
}

/// Whether the node is a constant expression: a constant leaf, or an `Add` of
/// two constant leaves.
fn is_constant_expr(g: &Graph, node: Node) -> bool {
    if is_simple_const(g, node) {
        return true;
    }
    if node.is_add(g) {
        return is_simple_const(g, node.binop_left(g)) && is_simple_const(g, node.binop_right(g));
    }
    false
}

/// Apply the distributive law for `Mul`/`Shl` under `Add`/`Sub`:
/// `(a * x) +/- (b * x) ==> (a +/- b) * x`.
fn reverse_rule_distributive(g: &mut Graph, n: Node) -> Option<Node> {
    let left = n.binop_left(g);
    let right = n.binop_right(g);
    let op = left.op(g);
    if op != right.op(g) {
        return None;
    }

    let (x, a, b) = if op == NodeOp::Shl {
        let x = left.binop_right(g);
        if x == right.binop_right(g) {
            // (a << x) +/- (b << x) ==> (a +/- b) << x
            (x, left.binop_left(g), right.binop_left(g))
        } else {
            return None;
        }
    } else if op == NodeOp::Mul {
        let x = left.binop_left(g);
        if x == right.binop_left(g) {
            // (x * a) +/- (x * b) ==> (a +/- b) * x
            (x, left.binop_right(g), right.binop_right(g))
        } else if x == right.binop_right(g) {
            // (x * a) +/- (b * x) ==> (a +/- b) * x
            (x, left.binop_right(g), right.binop_left(g))
        } else {
            let x = left.binop_right(g);
            if x == right.binop_right(g) {
                // (a * x) +/- (b * x) ==> (a +/- b) * x
                (x, left.binop_left(g), right.binop_left(g))
            } else if x == right.binop_left(g) {
                // (a * x) +/- (x * b) ==> (a +/- b) * x
                (x, left.binop_left(g), right.binop_right(g))
            } else {
                return None;
            }
        }
    } else {
        return None;
    };

    let curr_blk = n.block(g);
    let span = n.span(g);

    let blk = earliest_block(g, a, b, curr_blk);
    let irn = if n.is_add(g) {
        Node::add(g, span, blk, a, b)
    } else {
        Node::sub(g, span, blk, a, b)
    };

    let blk = earliest_block(g, irn, x, curr_blk);
    let irn = if op == NodeOp::Mul {
        Node::mul(g, span, blk, irn, x)
    } else {
        Node::shl(g, span, blk, irn, x)
    };

    if irn == n {
        return None;
    }
    g.exchange(n, irn);
    Some(irn)
}

/// Find the constant expression inside one of `n`'s same-opcode operands and
/// the pieces of the rewrite: the result is `(a, b, c, blk)` such that
/// `(a .op. b) .op. c` replaces `n`, built in `blk`.
fn const_motion_candidate(
    g: &Graph,
    l: Node,
    r: Node,
    op: NodeOp,
) -> Option<(Node, Node, Node, Block)> {
    if l.op(g) == op {
        // (a .op. b) .op. r
        let a = l.binop_left(g);
        let b = l.binop_right(g);
        if is_constant_expr(g, a) {
            // (C .op. b) .op. r ==> (r .op. b) .op. C
            return Some((r, b, a, l.block(g)));
        } else if is_constant_expr(g, b) {
            // (a .op. C) .op. r ==> (a .op. r) .op. C
            return Some((a, r, b, l.block(g)));
        }
    }
    if r.op(g) == op {
        // l .op. (a .op. b)
        let a = r.binop_left(g);
        let b = r.binop_right(g);
        if is_constant_expr(g, a) {
            // l .op. (C .op. b) ==> (l .op. b) .op. C
            return Some((l, b, a, r.block(g)));
        } else if is_constant_expr(g, b) {
            // l .op. (a .op. C) ==> (a .op. l) .op. C
            return Some((a, l, b, r.block(g)));
        }
    }
    None
}

/// Move constant expressions towards the root.
fn move_consts_up(g: &mut Graph, n: Node) -> Option<Node> {
    let l = n.binop_left(g);
    let r = n.binop_right(g);

    // check if one is already a constant expression
    if is_constant_expr(g, l) || is_constant_expr(g, r) {
        return None;
    }

    let op = n.op(g);
    let (a, b, c, blk) = const_motion_candidate(g, l, r, op)?;

    // a and b of different integer modes would need a coercion here; we do
    // not introduce one and leave the tree alone
    let ma = a.mode(g);
    let mb = b.mode(g);
    if ma != mb && ma.is_int() && mb.is_int() {
        return None;
    }

    // check that (a .op. b) can be calculated in the target block
    if !g.block_dominates(a.block(g), blk) {
        return None;
    }
    if !g.block_dominates(b.block(g), blk) {
        return None;
    }

    let span = n.span(g);
    let mut irn = Node::binop(g, span, blk, op, a, b);

    // the constructor might have changed the opcode, check again
    if irn.is_add(g) || irn.is_sub(g) {
        if let Some(new_irn) = reverse_rule_distributive(g, irn) {
            irn = new_irn;
        }
    }

    let irn1 = Node::binop(g, span, blk, op, irn, c);

    if irn1 == n {
        return None;
    }
    g.exchange(n, irn1);
    Some(irn1)
}

/// Apply the reverse rules on one node to a local fixed point, removing
/// constant concentrations that did not collapse.
fn reverse_rules(g: &mut Graph, node: Node) -> bool {
    // reassociating floating-point ops is imprecise
    if node.mode(g).is_float() && !g.imprecise_float_transforms_allowed() {
        return false;
    }

    let mut node = node;
    let mut changed = false;
    loop {
        let mut res = false;

        if node.op(g).is_commutative() {
            if let Some(new_node) = move_consts_up(g, node) {
                node = new_node;
                changed = true;
                res = true;
            }
        }
        // move_consts_up might have changed the opcode, check again
        if node.is_add(g) || node.is_sub(g) {
            res = match reverse_rule_distributive(g, node) {
                Some(new_node) => {
                    node = new_node;
                    changed = true;
                    true
                }
                None => false,
            };
        }

        if !res {
            break;
        }
    }
    changed
}

/// The reassociation pass.
///
/// The rule table attaches the commutative rule to the five commutative
/// opcodes; everything else is left alone.
pub struct Reassociation {
    rules: FxHashMap<NodeOp, ReassocRule>,
    /// Opt processed graphs into imprecise floating-point transforms.
    imprecise_float_transforms: bool,
}

impl Default for Reassociation {
    fn default() -> Self {
        let mut rules: FxHashMap<NodeOp, ReassocRule> = FxHashMap::default();
        for op in [
            NodeOp::Add,
            NodeOp::And,
            NodeOp::Eor,
            NodeOp::Mul,
            NodeOp::Or,
        ] {
            rules.insert(op, reassoc_commutative);
        }
        Reassociation {
            rules,
            imprecise_float_transforms: false,
        }
    }
}

impl GraphPassMut for Reassociation {
    type Output = ();

    fn run(&mut self, g: &mut Graph) -> PassResult<(Self::Output, bool)> {
        assert!(
            g.pin_state() == PinState::Pinned,
            "reassociation needs a pinned graph to work properly"
        );

        g.assure_properties(
            GraphProperties::CONSISTENT_DOMINANCE
                | GraphProperties::CONSISTENT_LOOPINFO
                | GraphProperties::CONSISTENT_OUT_EDGES,
        );

        if self.imprecise_float_transforms {
            g.set_imprecise_float_transforms(true);
        }

        let mut changed = false;

        log::debug!("shannon start");
        changed |= shannon::do_shannon(g);

        log::debug!("eor equality start");
        changed |= equality::do_equality(g);

        // now we have collected enough information, optimize
        let mut wq = Worklist::default();
        for node in g.nodes() {
            if !node.is_deleted(g) {
                wq.insert(node);
            }
        }
        changed |= do_reassociation(g, &mut wq, &self.rules);

        // reverse those rules that did not result in collapsed constants
        for node in g.nodes() {
            if node.is_deleted(g) {
                continue;
            }
            changed |= reverse_rules(g, node);
        }

        g.confirm_properties(GraphProperties::CONTROL_FLOW);

        Ok(((), changed))
    }

    fn fetch_params(&mut self, params: &ParamStorage) {
        self.imprecise_float_transforms = params
            .get("imprecise-float-transforms")
            .unwrap_or(self.imprecise_float_transforms);
    }
}

impl TransformPass for Reassociation {
    fn register(passman: &mut PassManager) {
        let pass = Reassociation::default();
        passman.register_transform(REASSOCIATION, pass, Vec::new());

        passman.add_parameter("imprecise-float-transforms", false);
    }
}

/// Apply reassociation to a procedure graph.
pub fn optimize_reassociation(g: &mut Graph) {
    let mut pass = Reassociation::default();
    let ((), _) = GraphPassMut::run(&mut pass, g).unwrap();
}
