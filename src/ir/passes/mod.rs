pub mod dominance_analysis;
pub mod loop_analysis;
pub mod reassoc;
