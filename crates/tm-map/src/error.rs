use core::fmt;

use crate::cell::{CellLabel, DartLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Node,
    Edge,
    Face,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Edge => write!(f, "edge"),
            Self::Face => write!(f, "face"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A label refers to an unknown or removed cell.
    InvalidHandle { kind: CellKind, label: CellLabel },
    /// A dart refers to a removed edge.
    DanglingDart { dart: DartLabel },
    /// An operator precondition does not hold.
    PreconditionViolated { op: &'static str, detail: String },
    /// Internal inconsistency; fatal to the operation.
    InvariantBroken { detail: String },
    /// A pre-operation hook returned false.
    HookVetoed { op: &'static str },
    /// A label or index outside the valid range.
    OutOfRange {
        what: &'static str,
        value: usize,
        limit: usize,
    },
    /// `sort_edges_eventually` ran out of edge geometry before the
    /// angular resolution was reached.
    Unsortable { node: CellLabel },
}

impl Error {
    pub(crate) fn precondition(op: &'static str, detail: impl Into<String>) -> Self {
        Self::PreconditionViolated {
            op,
            detail: detail.into(),
        }
    }

    pub(crate) fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantBroken {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle { kind, label } => {
                write!(f, "{kind} {label} is unknown or has been removed")
            }
            Self::DanglingDart { dart } => {
                write!(f, "dart {dart} references a removed edge")
            }
            Self::PreconditionViolated { op, detail } => {
                write!(f, "{op}: {detail}")
            }
            Self::InvariantBroken { detail } => {
                write!(f, "broken map invariant: {detail}")
            }
            Self::HookVetoed { op } => write!(f, "{op} cancelled by hook"),
            Self::OutOfRange { what, value, limit } => {
                write!(f, "{what} {value} out of range (limit {limit})")
            }
            Self::Unsortable { node } => {
                write!(
                    f,
                    "unsortable group of parallel edges at node {node}: \
                     all tangents reached their edge ends"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
