//! Textual display of IR entities, for debugging and test output.

use core::fmt;

use super::{Graph, Node, NodeKind};

pub struct DisplayNode<'a> {
    g: &'a Graph,
    node: Node,
}

impl Node {
    pub fn display(self, g: &Graph) -> DisplayNode<'_> { DisplayNode { g, node: self } }
}

impl<'a> fmt::Display for DisplayNode<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.g;
        write!(f, "%{} = ", self.node.id())?;
        match self.node.kind(g) {
            NodeKind::Const(tv) => write!(f, "const {}", tv)?,
            NodeKind::Address(sym) => write!(f, "address {}", sym)?,
            NodeKind::Offset(sym) => write!(f, "offset {}", sym)?,
            NodeKind::Size(sym) => write!(f, "size {}", sym)?,
            NodeKind::Align(sym) => write!(f, "align {}", sym)?,
            NodeKind::Arg(idx) => write!(f, "arg {}", idx)?,
            NodeKind::Bad
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
            | NodeKind::Deleted => {
                write!(f, "{}", self.node.op(g))?;
                for (i, opd) in self.node.inputs(g).iter().enumerate() {
                    if i == 0 {
                        write!(f, " ")?;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(f, "%{}", opd.id())?;
                }
            }
        }
        write!(f, " : {}", self.node.mode(g))
    }
}

pub struct DisplayGraph<'a> {
    g: &'a Graph,
}

impl Graph {
    pub fn display(&self) -> DisplayGraph<'_> { DisplayGraph { g: self } }
}

impl<'a> fmt::Display for DisplayGraph<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.g;
        for block in g.blocks() {
            writeln!(f, "^{}:", block.id())?;
            for node in g.nodes() {
                if node.block(g) == block && !node.is_deleted(g) {
                    writeln!(f, "    {}", node.display(g))?;
                }
            }
        }
        Ok(())
    }
}
