//! Execution traces for WellCoach pipeline runs.
//!
//! Every executed pipeline node gets one [`StepSpan`] recording which model
//! answered, how long it took, how many tokens it used and whether it
//! succeeded. A [`PipelineTrace`] collects the spans of one run.

pub mod trace;

pub use trace::{PipelineTrace, StepOutcome, StepSpan};
