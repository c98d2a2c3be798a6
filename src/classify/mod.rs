//! Submission of samples to the classification service.

mod client;
mod mock;

pub use client::{Classifier, ClassifyError, ClassifyRequest, HttpClassifier, Verdict};
pub use mock::{CallRecord, ScriptedClassifier};
