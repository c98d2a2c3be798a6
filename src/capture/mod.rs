//! Sample capture: rasterization and scheduling.
//!
//! This module turns tracked elements into bounded JPEG stills at an
//! adaptively controlled cadence. The sampler is mechanism (grab, bound,
//! encode); the scheduler is policy (when, and at what priority).

mod sample;
mod sampler;
mod scheduler;

pub use sample::{Priority, Sample, SampleImage};
pub use sampler::{GeometrySampler, SampleError};
pub use scheduler::{CaptureDecision, CaptureScheduler};
