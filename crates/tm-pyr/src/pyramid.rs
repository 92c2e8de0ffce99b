use std::collections::BTreeMap;

use tm_map::{CellLabel, DartLabel, Error, PlanarMap, Result};

use crate::history::Operation;

/// One level of the pyramid: a map snapshot at `index` operations into
/// the history.
///
/// `sub_index` counts replayed primitives (composites count their
/// children) and drives checkpoint scheduling.
#[derive(Debug, Clone)]
pub struct Level {
    pub(crate) index: usize,
    pub(crate) sub_index: usize,
    pub(crate) map: PlanarMap,
}

impl Level {
    fn new(map: PlanarMap) -> Self {
        Self {
            index: 0,
            sub_index: 0,
            map,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn map(&self) -> &PlanarMap {
        &self.map
    }

    pub fn into_map(self) -> PlanarMap {
        self.map
    }

    fn perform(&mut self, op: &Operation) -> Result<()> {
        match op {
            Operation::RemoveIsolatedNode { node } => self.map.remove_isolated_node(*node)?,
            Operation::MergeFaces { dart } => {
                self.map.merge_faces(*dart)?;
            }
            Operation::RemoveBridge { dart } => {
                self.map.remove_bridge(*dart)?;
            }
            Operation::MergeEdges { dart } => {
                self.map.merge_edges(*dart)?;
            }
            Operation::RemoveEdge { dart } => {
                self.map.remove_edge(*dart)?;
            }
            Operation::RemoveEdgeWithEnds { dart } => {
                self.map.remove_edge_with_ends(*dart)?;
            }
            Operation::Composite(ops) => {
                for op in ops {
                    self.perform(op)?;
                }
                return Ok(());
            }
        }
        self.sub_index += 1;
        Ok(())
    }
}

fn replay(history: &[Operation], level: &mut Level, target: usize) -> Result<()> {
    while level.index < target {
        let op = history.get(level.index).ok_or(Error::OutOfRange {
            what: "history index",
            value: level.index,
            limit: history.len(),
        })?;
        level.perform(op)?;
        level.index += 1;
    }
    Ok(())
}

/// Jumps `level` back to the last checkpoint at or before `target`,
/// unless the level already sits between that checkpoint and the target.
/// Returns whether a jump happened.
fn goto_checkpoint_before(
    checkpoints: &BTreeMap<usize, Level>,
    level: &mut Level,
    target: usize,
) -> Result<bool> {
    let (&ck_index, checkpoint) =
        checkpoints
            .range(..=target)
            .next_back()
            .ok_or(Error::InvariantBroken {
                detail: format!("no checkpoint at or before level {target}"),
            })?;
    if level.index <= target && ck_index <= level.index {
        return Ok(false);
    }
    *level = checkpoint.clone();
    Ok(true)
}

/// Pyramid over a planar map: a replayable history of Euler operations,
/// sparse checkpoints of full map snapshots, and restore-then-replay
/// navigation to any level.
///
/// Level `i` is the initial map with the first `i` history entries
/// applied; `level_count() == history.len() + 1`, and at rest the top
/// level index equals the history length.
#[derive(Debug, Clone)]
pub struct MapPyramid {
    checkpoints: BTreeMap<usize, Level>,
    history: Vec<Operation>,
    top: Level,
    next_checkpoint_sub_index: usize,
    composing: u32,
}

impl MapPyramid {
    pub fn new(level0: PlanarMap) -> Self {
        let mut pyramid = Self {
            checkpoints: BTreeMap::new(),
            history: Vec::new(),
            top: Level::new(level0),
            next_checkpoint_sub_index: 0,
            composing: 0,
        };
        pyramid.store_top_checkpoint();
        pyramid
    }

    pub fn top_level(&self) -> &Level {
        &self.top
    }

    pub fn history(&self) -> &[Operation] {
        &self.history
    }

    pub fn level_count(&self) -> usize {
        self.history.len() + 1
    }

    /// Snapshots the top level (if not already stored) and schedules the
    /// next checkpoint `max(total_cells / 4, 10)` primitives further on.
    pub fn store_top_checkpoint(&mut self) {
        let Self {
            checkpoints,
            top,
            next_checkpoint_sub_index,
            ..
        } = self;
        let total_cells =
            top.map.node_count() + top.map.edge_count() + top.map.face_count();
        *next_checkpoint_sub_index = top.sub_index + (total_cells / 4).max(10);
        checkpoints.entry(top.index).or_insert_with(|| top.clone());
    }

    // ----- Euler operations -------------------------------------------

    pub fn remove_isolated_node(&mut self, node: CellLabel) -> Result<()> {
        self.add_and_perform(Operation::RemoveIsolatedNode { node })
    }

    pub fn merge_faces(&mut self, dart: DartLabel) -> Result<()> {
        self.add_and_perform(Operation::MergeFaces { dart })
    }

    pub fn remove_bridge(&mut self, dart: DartLabel) -> Result<()> {
        self.add_and_perform(Operation::RemoveBridge { dart })
    }

    pub fn merge_edges(&mut self, dart: DartLabel) -> Result<()> {
        self.add_and_perform(Operation::MergeEdges { dart })
    }

    pub fn remove_edge(&mut self, dart: DartLabel) -> Result<()> {
        self.add_and_perform(Operation::RemoveEdge { dart })
    }

    pub fn remove_edge_with_ends(&mut self, dart: DartLabel) -> Result<()> {
        self.add_and_perform(Operation::RemoveEdgeWithEnds { dart })
    }

    /// Appends the operation to the history (or to the open composite)
    /// and replays it on the top level. A failing operation is removed
    /// again and the top level restored by checkpoint + replay; inside a
    /// composite, the whole composite is rolled back.
    fn add_and_perform(&mut self, op: Operation) -> Result<()> {
        if self.composing == 0 {
            let old_index = self.top.index;
            self.history.push(op);
            let result = self
                .top
                .perform(self.history.last().expect("just pushed"));
            match result {
                Ok(()) => {
                    self.top.index += 1;
                    if self.top.sub_index >= self.next_checkpoint_sub_index {
                        self.store_top_checkpoint();
                    }
                    Ok(())
                }
                Err(err) => {
                    self.history.pop();
                    self.restore_top(old_index)?;
                    Err(err)
                }
            }
        } else {
            let replayed = op.clone();
            match self.history.last_mut() {
                Some(Operation::Composite(list)) => list.push(op),
                _ => {
                    return Err(Error::InvariantBroken {
                        detail: "composing without an open composite".to_string(),
                    });
                }
            }
            let result = self.top.perform(&replayed);
            if result.is_err() {
                // the whole composite is rolled back
                let old_index = self.top.index;
                self.history.pop();
                self.composing = 0;
                self.restore_top(old_index)?;
            }
            result
        }
    }

    /// Forced restore of the top level to `target` from the nearest
    /// checkpoint at or below it.
    fn restore_top(&mut self, target: usize) -> Result<()> {
        let (_, checkpoint) =
            self.checkpoints
                .range(..=target)
                .next_back()
                .ok_or(Error::InvariantBroken {
                    detail: format!("no checkpoint at or before level {target}"),
                })?;
        let mut level = checkpoint.clone();
        replay(&self.history, &mut level, target)?;
        self.top = level;
        Ok(())
    }

    // ----- composite transactions -------------------------------------

    /// Opens a composite history entry; nested calls only deepen the
    /// nesting counter.
    pub fn begin_composite(&mut self) {
        if self.composing == 0 {
            self.history.push(Operation::Composite(Vec::new()));
        }
        self.composing += 1;
    }

    /// Reopens the last history entry as a composite, so further
    /// operations join it.
    pub fn change_into_composite(&mut self) -> Result<()> {
        if self.composing == 0 {
            let last = self.history.pop().ok_or_else(|| {
                Error::PreconditionViolated {
                    op: "change_into_composite",
                    detail: "history is empty".to_string(),
                }
            })?;
            self.history.push(Operation::Composite(vec![last]));
            // the entry is open again; end_composite re-advances
            self.top.index -= 1;
        }
        self.composing += 1;
        Ok(())
    }

    /// Closes one nesting step. At the outermost close a single-operation
    /// composite is flattened into that operation, and the top level
    /// advances past the finished entry.
    pub fn end_composite(&mut self) -> Result<()> {
        if self.composing == 0 {
            return Err(Error::PreconditionViolated {
                op: "end_composite",
                detail: "no composite is open".to_string(),
            });
        }
        self.composing -= 1;
        if self.composing == 0 {
            match self.history.pop() {
                Some(Operation::Composite(mut list)) => {
                    if list.len() == 1 {
                        self.history.push(list.pop().expect("length checked"));
                    } else {
                        self.history.push(Operation::Composite(list));
                    }
                }
                Some(other) => {
                    self.history.push(other);
                    return Err(Error::InvariantBroken {
                        detail: "open composite missing from history".to_string(),
                    });
                }
                None => {
                    return Err(Error::InvariantBroken {
                        detail: "open composite missing from history".to_string(),
                    });
                }
            }
            self.top.index += 1;
            if self.top.sub_index >= self.next_checkpoint_sub_index {
                self.store_top_checkpoint();
            }
        }
        Ok(())
    }

    // ----- navigation -------------------------------------------------

    /// Brings a level (the top level's copy or one from `get_level`) to
    /// `target`, restoring from a checkpoint first when that is shorter.
    pub fn goto_level(&self, level: &mut Level, target: usize) -> Result<()> {
        self.check_level_index(target)?;
        goto_checkpoint_before(&self.checkpoints, level, target)?;
        replay(&self.history, level, target)
    }

    /// Bounded variant of `goto_level`: at most `max_steps` replays (a
    /// checkpoint jump counts as one). Returns whether the target was
    /// reached.
    pub fn approach_level(
        &self,
        level: &mut Level,
        target: usize,
        max_steps: usize,
    ) -> Result<bool> {
        self.check_level_index(target)?;
        let mut steps = usize::from(goto_checkpoint_before(&self.checkpoints, level, target)?);
        while level.index < target && steps < max_steps {
            level.perform(&self.history[level.index])?;
            level.index += 1;
            steps += 1;
        }
        Ok(level.index == target)
    }

    /// Fresh deep copy of the map state at `index`; its lifetime is
    /// independent of the pyramid's top level.
    pub fn get_level(&self, index: usize) -> Result<Level> {
        self.check_level_index(index)?;
        let (_, checkpoint) =
            self.checkpoints
                .range(..=index)
                .next_back()
                .ok_or(Error::InvariantBroken {
                    detail: format!("no checkpoint at or before level {index}"),
                })?;
        let mut level = checkpoint.clone();
        replay(&self.history, &mut level, index)?;
        Ok(level)
    }

    /// Truncates the pyramid: brings the top level to `index` if above,
    /// erases all history entries and checkpoints beyond it, and stores a
    /// fresh checkpoint at the new top.
    pub fn cut_above(&mut self, index: usize) -> Result<()> {
        if self.top.index != self.level_count() - 1 {
            return Err(Error::InvariantBroken {
                detail: format!(
                    "top level index {} does not match history length {}",
                    self.top.index,
                    self.history.len()
                ),
            });
        }
        if self.top.index > index {
            self.restore_top(index)?;
            self.history.truncate(index);
            self.checkpoints.retain(|&k, _| k <= index);
            self.store_top_checkpoint();
        }
        Ok(())
    }

    fn check_level_index(&self, index: usize) -> Result<()> {
        if index >= self.level_count() {
            return Err(Error::OutOfRange {
                what: "level index",
                value: index,
                limit: self.level_count(),
            });
        }
        Ok(())
    }
}
