//! Test harness utilities for the bootstrap behavioural suite.

mod reporter;
mod world;

pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use world::{TestWorld, world};
