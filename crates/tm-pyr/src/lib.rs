//! Checkpointing pyramid over planar maps.
//!
//! A [`MapPyramid`] records every Euler operation as a replayable
//! [`Operation`], keeps sparse checkpoints of full map snapshots, and
//! reaches any intermediate level by restoring the nearest checkpoint and
//! replaying history. Composite transactions group several operations
//! into one atomic history entry.

mod history;
mod pyramid;

pub use history::{OpKind, Operation};
pub use pyramid::{Level, MapPyramid};
