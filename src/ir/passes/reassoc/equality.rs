//! Exclusive-or equality simplification.
//!
//! An `And`/`Or` with an `Eor a b` operand constrains the values `a` and `b`
//! can take inside the other operand, so occurrences there can be rewritten
//! to the algebraically simpler form:
//!
//! ```text
//!  (a ^ b) & f(a, b) ->  (a ^ b) & f(a, ~a)
//! ~(a ^ b) & f(a, b) -> ~(a ^ b) & f(a,  a)
//!  (a ^ b) | f(a, b) ->  (a ^ b) | f(a,  a)
//! ~(a ^ b) | f(a, b) -> ~(a ^ b) | f(a, ~a)
//! ```

use super::is_bitop;
use crate::ir::{Graph, GraphProperties, Node};

/// Returns true if we can be sure that the node only has a single read user.
fn only_one_user(g: &Graph, node: Node) -> bool {
    if !g.has_property(GraphProperties::CONSISTENT_OUT_EDGES) {
        return false;
    }
    node.n_outs(g) <= 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchResult {
    /// No match found.
    NotFound,
    /// Found a match for the first node.
    FoundFirst,
    /// Found a match for the second node.
    FoundSecond,
}

/// Recursively replaces `a` with `b`/`~b`, or `b` with `a`/`~a`, according to
/// `need_not`.
///
/// We only want to replace something if the subgraph contains both `a` and
/// `b`, so the `replace` flag is set when the first of them is found and the
/// actual replacement happens on the second. The walk stops at nodes that are
/// not bitwise or have other users.
///
/// The return value indicates which of `a`/`b` was found first along this
/// branch; a `FoundSecond` makes the caller swap the roles of `a` and `b` for
/// its remaining children.
fn replace_until_other_user(
    g: &mut Graph,
    node: Node,
    a: Node,
    b: Node,
    need_not: bool,
    replace: bool,
    changed: &mut bool,
) -> MatchResult {
    let mut a = a;
    let mut b = b;
    let mut replace = replace;
    let mut ret = if replace {
        MatchResult::FoundFirst
    } else {
        MatchResult::NotFound
    };

    if !is_bitop(g, node) || !only_one_user(g, node) {
        return ret;
    }

    for i in 0..node.arity(g) {
        let t = node.input(g, i);
        if t == a {
            if replace {
                let mut op = b;
                if need_not {
                    let span = op.span(g);
                    let block = op.block(g);
                    op = Node::not_(g, span, block, op);
                }
                log::trace!("replace %{} @ %{} with %{}", t.id(), node.id(), op.id());
                node.set_input(g, i, op);
                *changed = true;
            } else {
                replace = true;
                std::mem::swap(&mut a, &mut b);
                ret = MatchResult::FoundSecond;
            }
        } else if t == b {
            if !replace {
                replace = true;
                ret = MatchResult::FoundFirst;
            }
        } else {
            let res = replace_until_other_user(g, t, a, b, need_not, replace, changed);
            match res {
                MatchResult::FoundSecond => {
                    std::mem::swap(&mut a, &mut b);
                    if !replace {
                        ret = res;
                    }
                    replace = true;
                }
                MatchResult::FoundFirst => {
                    if !replace {
                        ret = res;
                    }
                    replace = true;
                }
                MatchResult::NotFound => {}
            }
        }
    }

    ret
}

/// Match one of the `(a ^ b)`-against-`f(a, b)` shapes on the node and run
/// the replacement walk over the `f` side.
fn walk_equality(g: &mut Graph, node: Node, changed: &mut bool) {
    if !node.is_and(g) && !node.is_or(g) {
        return;
    }

    let mut l = node.binop_left(g);
    let mut r = node.binop_right(g);
    let mut need_not = node.is_and(g);

    if l.is_not(g) && l.not_op(g).is_eor(g) {
        l = l.not_op(g);
        need_not = !need_not;
    } else if l.is_eor(g) {
        // already in shape
    } else if r.is_not(g) && r.not_op(g).is_eor(g) {
        let t = r.not_op(g);
        r = l;
        l = t;
        need_not = !need_not;
    } else if r.is_eor(g) {
        std::mem::swap(&mut l, &mut r);
    } else {
        return;
    }

    let mut a = l.binop_left(g);
    let mut b = l.binop_right(g);
    debug_assert_ne!(a, b);

    if b.is_const(g) {
        replace_until_other_user(g, r, a, b, need_not, true, changed);
    } else if a.is_const(g) {
        replace_until_other_user(g, r, b, a, need_not, true, changed);
    } else {
        if a.is_not(g) {
            need_not = !need_not;
            a = a.not_op(g);
        }

        if b.is_not(g) {
            need_not = !need_not;
            b = b.not_op(g);
        }

        replace_until_other_user(g, r, a, b, need_not, false, changed);
    }
}

/// Apply the exclusive-or equality simplification to the whole graph.
pub(super) fn do_equality(g: &mut Graph) -> bool {
    let mut changed = false;
    for node in g.nodes() {
        if node.is_deleted(g) {
            continue;
        }
        walk_equality(g, node, &mut changed);
    }
    changed
}
