//! Background reclamation of expired objects.

mod sweeper;

pub use sweeper::{ExpirySweeper, SweepReport};
