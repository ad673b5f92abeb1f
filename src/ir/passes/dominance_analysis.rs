use crate::{
    ir::{
        passman::{GraphPass, PassResult},
        Graph,
    },
    utils::dominance::Dominance,
};

/// Compute dominance information for a graph.
///
/// This is the pass-shaped entry to [Dominance]; the result is returned to
/// the caller instead of being cached on the graph, so it can be inspected
/// independently of the property protocol.
pub struct DominanceAnalysis;

impl GraphPass for DominanceAnalysis {
    type Output = Dominance;

    fn run(&mut self, g: &Graph) -> PassResult<Self::Output> { Ok(Dominance::new(g)) }
}
