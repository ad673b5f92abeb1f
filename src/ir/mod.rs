mod block;
mod construct;
mod format;
mod graph;
mod mode;
mod node;
mod source_loc;
mod tarval;

pub mod passes;
pub mod passman;

pub use block::{Block, BlockData};
pub use format::{DisplayGraph, DisplayNode};
pub use graph::{Graph, GraphProperties, PinState};
pub use mode::Mode;
pub use node::{Node, NodeData, NodeKind, NodeOp, Symbol};
pub use source_loc::{Loc, Span};
pub use tarval::Tarval;
