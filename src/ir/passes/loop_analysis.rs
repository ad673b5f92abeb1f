use thiserror::Error;

use crate::{
    ir::{
        passman::{GraphPass, PassError, PassResult},
        Graph,
        GraphProperties,
    },
    utils::loop_info::LoopContext,
};

#[derive(Debug, Error)]
pub enum LoopAnalysisError {
    #[error("dominance information is not consistent, assure it before detecting loops")]
    InconsistentDominance,
}

impl From<LoopAnalysisError> for PassError {
    fn from(err: LoopAnalysisError) -> Self {
        PassError::analysis_error("loop-analysis", Box::new(err))
    }
}

/// Detect the natural loops of a graph.
///
/// Loop detection consumes the dominator tree, so the graph's dominance
/// information must be consistent when the pass runs.
pub struct LoopAnalysis;

impl GraphPass for LoopAnalysis {
    type Output = LoopContext;

    fn run(&mut self, g: &Graph) -> PassResult<Self::Output> {
        if !g.has_property(GraphProperties::CONSISTENT_DOMINANCE) {
            return Err(LoopAnalysisError::InconsistentDominance.into());
        }
        let dominance = g.dominance().expect("dominance property is consistent");
        Ok(LoopContext::new(g, dominance))
    }
}
