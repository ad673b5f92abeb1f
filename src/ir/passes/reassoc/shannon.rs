//! Shannon simplification of bitwise subgraphs.
//!
//! For a base `And`/`Or` node, one operand (possibly behind a `Not` or an
//! `Eor` with a constant) names a `top` value. If the sibling operand reaches
//! another occurrence of `top` through bitwise nodes that are used nowhere
//! outside the explored region, that occurrence contributes either the
//! identity or the absorbing element of the base operation and can be
//! replaced by a constant.
//!
//! The search keeps a per-node visit counter together with a rolling
//! `walk_base`/`walk_max` window, so independent searches share the counter
//! map without clearing it: a node counts as fully explored once
//! `counter - walk_base` equals its out-edge count.

use rustc_hash::FxHashMap;

use super::is_bitop;
use crate::ir::{Graph, Node, Tarval};

struct ShannonData {
    optimizations: Vec<Optimization>,
    walk_counter: FxHashMap<Node, u32>,
    walk_base: u32,
    walk_max: u32,
}

struct Optimization {
    base_node: Node,
    middle_node: Option<Node>,
    top_node: Node,
    other_node: Node,
}

/// Try to find `middle_node` or `top_node` from `base_node` over a non-direct
/// path.
///
/// ```text
///              top_node
///              ^      ^
///              |      |
///          +---+      +------+
///          |                 |
///     other_node       middle_node (optional)
///          ^                 ^
///          |                 |
///          .                 |
///          .                 |
///          |                 |
///          +-------+   +-----+
///                  |   |
///               base_node
/// ```
fn find_path_to_top_node(
    g: &Graph,
    current: Node,
    other_node: Node,
    base_node: Node,
    middle_node: Option<Node>,
    top_node: Node,
    shdata: &mut ShannonData,
) {
    let (top_node2, middle_node2) = if Some(current) == middle_node {
        (current, None)
    } else {
        (top_node, middle_node)
    };

    if current == top_node2
        && (middle_node.is_some_and(|m| m.n_outs(g) > 1) || base_node != other_node)
    {
        shdata.optimizations.push(Optimization {
            base_node,
            middle_node: middle_node2,
            top_node: top_node2,
            other_node,
        });
        return;
    }

    let mut counter = shdata.walk_counter.get(&current).copied().unwrap_or(0);
    if counter < shdata.walk_base {
        counter = shdata.walk_base;
    }
    counter += 1;
    if counter > shdata.walk_max {
        shdata.walk_max = counter;
    }
    shdata.walk_counter.insert(current, counter);

    // only descend once every out edge of the node has been seen by this
    // search, i.e. the node has no users outside the explored region
    if (counter - shdata.walk_base) as usize == current.n_outs(g) && is_bitop(g, current) {
        for i in 0..current.arity(g) {
            let input = current.input(g, i);
            find_path_to_top_node(g, input, current, base_node, middle_node, top_node, shdata);
        }
    }
}

/// If the given node is a middle node, return its top node. Else return the
/// node itself.
fn top_from_middle(g: &Graph, node: Node) -> Node {
    if node.is_not(g) {
        return node.not_op(g);
    }

    if node.is_eor(g) {
        debug_assert!(!node.binop_left(g).is_const(g));

        let r = node.binop_right(g);
        if r.is_const(g) {
            return node.binop_left(g);
        }
    }

    node
}

/// Start searches from a base node, once for each operand orientation.
fn try_basenode(g: &Graph, base_node: Node, shdata: &mut ShannonData) {
    if !base_node.is_and(g) && !base_node.is_or(g) {
        return;
    }

    let mut l = base_node.binop_left(g);
    let mut r = base_node.binop_right(g);

    for _ in 0..2 {
        let top_node = top_from_middle(g, l);
        let middle_node = if top_node != l { Some(l) } else { None };

        shdata.walk_base = shdata.walk_max;
        find_path_to_top_node(g, r, base_node, base_node, middle_node, top_node, shdata);

        std::mem::swap(&mut l, &mut r);
    }
}

/// The constant operand of an `Eor`.
fn eor_tarval(g: &Graph, node: Node) -> Tarval {
    assert!(node.is_eor(g));
    let l = node.binop_left(g);
    let r = node.binop_right(g);

    if l.is_const(g) {
        return l.const_tarval(g);
    }

    assert!(r.is_const(g));
    r.const_tarval(g)
}

fn has_operand(g: &Graph, node: Node, operand: Node) -> bool {
    node.inputs(g).contains(&operand)
}

/// Replace the `top_node` edge of `other_node` by a constant. The base node
/// decides the orientation: the new constant is the base identity xor the
/// replacement, so the base operation keeps its value.
fn replace_node(
    g: &mut Graph,
    top_node: Node,
    base_node: Node,
    other_node: Node,
    replacement: Tarval,
) -> bool {
    assert!(base_node.is_and(g) || base_node.is_or(g));

    // find the input slot of top_node in other_node
    let pos = other_node
        .inputs(g)
        .iter()
        .position(|n| *n == top_node)
        .expect("top node must be an operand of the other node");

    let other_mode = other_node.mode(g);
    let base_val = if base_node.is_and(g) {
        Tarval::all_ones(other_mode)
    } else {
        Tarval::zero(other_mode)
    };
    let Some(tv) = base_val.eor(replacement) else {
        // mode disagreement, the candidate went stale
        return false;
    };

    let span = other_node.span(g);
    let c = Node::const_tv(g, span, tv);
    other_node.set_input(g, pos, c);
    true
}

/// Apply the Shannon simplification to the whole graph.
pub(super) fn do_shannon(g: &mut Graph) -> bool {
    let mut shdata = ShannonData {
        optimizations: Vec::new(),
        walk_counter: FxHashMap::default(),
        walk_base: 0,
        walk_max: 0,
    };

    // walk and collect optimization candidates
    for node in g.nodes() {
        if node.is_deleted(g) {
            continue;
        }
        try_basenode(g, node, &mut shdata);
    }

    let mut changed = false;
    for optimization in shdata.optimizations {
        let Optimization {
            base_node,
            middle_node,
            top_node,
            other_node,
        } = optimization;

        log::trace!(
            "shannon: base %{}, middle {}, top %{}, other %{}",
            base_node.id(),
            middle_node.map_or("-".to_string(), |m| format!("%{}", m.id())),
            top_node.id(),
            other_node.id()
        );

        // check if the optimization is still valid; earlier replacements may
        // have rewritten the subgraph underneath it
        if let Some(middle) = middle_node {
            if !has_operand(g, middle, top_node) || !has_operand(g, base_node, middle) {
                continue;
            }
        } else if !has_operand(g, base_node, top_node) {
            continue;
        }

        if !has_operand(g, other_node, top_node) {
            continue;
        }

        // calculate the replacement
        let mode = top_node.mode(g);
        let replacement = match middle_node {
            None => Tarval::zero(mode),
            Some(middle) if middle.is_not(g) => Tarval::all_ones(mode),
            Some(middle) => {
                debug_assert!(middle.is_eor(g));
                eor_tarval(g, middle)
            }
        };

        if replace_node(g, top_node, base_node, other_node, replacement) {
            log::trace!("shannon: replaced");
            changed = true;
        }
    }

    changed
}
