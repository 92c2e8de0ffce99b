use tm_map::{CellLabel, DartLabel};

/// One replayable map edit.
///
/// Primitive variants carry a serialized dart (the signed edge label) that
/// can be rehydrated against any map state in which the edge is still
/// alive; the isolated-node removal carries the node label, since an
/// isolated node has no incident dart. A composite owns its sub-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    RemoveIsolatedNode { node: CellLabel },
    MergeFaces { dart: DartLabel },
    RemoveBridge { dart: DartLabel },
    MergeEdges { dart: DartLabel },
    RemoveEdge { dart: DartLabel },
    RemoveEdgeWithEnds { dart: DartLabel },
    Composite(Vec<Operation>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    RemoveIsolatedNode,
    MergeFaces,
    RemoveBridge,
    MergeEdges,
    RemoveEdge,
    RemoveEdgeWithEnds,
    Composite,
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Self::RemoveIsolatedNode { .. } => OpKind::RemoveIsolatedNode,
            Self::MergeFaces { .. } => OpKind::MergeFaces,
            Self::RemoveBridge { .. } => OpKind::RemoveBridge,
            Self::MergeEdges { .. } => OpKind::MergeEdges,
            Self::RemoveEdge { .. } => OpKind::RemoveEdge,
            Self::RemoveEdgeWithEnds { .. } => OpKind::RemoveEdgeWithEnds,
            Self::Composite(_) => OpKind::Composite,
        }
    }

    /// Number of primitives replayed when this record is performed.
    pub fn primitive_count(&self) -> usize {
        match self {
            Self::Composite(ops) => ops.iter().map(Operation::primitive_count).sum(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(Operation::MergeFaces { dart: -3 }.kind(), OpKind::MergeFaces);
        assert_eq!(
            Operation::Composite(vec![Operation::MergeEdges { dart: 1 }]).kind(),
            OpKind::Composite
        );
    }

    #[test]
    fn primitive_count_recurses() {
        let op = Operation::Composite(vec![
            Operation::MergeFaces { dart: 1 },
            Operation::Composite(vec![
                Operation::RemoveBridge { dart: 2 },
                Operation::RemoveIsolatedNode { node: 4 },
            ]),
        ]);
        assert_eq!(op.primitive_count(), 3);
        assert_eq!(Operation::RemoveEdge { dart: 9 }.primitive_count(), 1);
    }

    #[test]
    fn clone_is_deep() {
        let op = Operation::Composite(vec![Operation::MergeFaces { dart: 1 }]);
        let mut copy = op.clone();
        if let Operation::Composite(list) = &mut copy {
            list.push(Operation::RemoveBridge { dart: 2 });
        }
        assert_eq!(op.primitive_count(), 1);
        assert_eq!(copy.primitive_count(), 2);
    }
}
