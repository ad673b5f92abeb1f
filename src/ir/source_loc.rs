//! # Source Locations
//!
//! Debug provenance for IR entities. Rewrites propagate the span of the node
//! they replace, so a combined node still points back at the expression it
//! came from.

use core::fmt;

/// A location in the original program.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    /// A byte offset into the original program text.
    At { idx: u32 },
    /// No location information.
    #[default]
    None,
}

impl From<u32> for Loc {
    fn from(idx: u32) -> Loc { Loc::At { idx } }
}

impl fmt::Debug for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::At { idx } => write!(f, "{}", idx),
            Loc::None => write!(f, "<none>"),
        }
    }
}

/// A span in the original program.
///
/// # Notes
///
/// Though [PartialEq] and [Eq] is implemented for [Span], the equality of any
/// IR entities should not be determined by the equality of their spans.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Loc,
    pub end: Loc,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.start, self.end)
    }
}

impl Span {
    pub fn new(start: Loc, end: Loc) -> Span { Span { start, end } }
}

impl From<(u32, u32)> for Span {
    fn from((start, end): (u32, u32)) -> Span { Span::new(start.into(), end.into()) }
}
