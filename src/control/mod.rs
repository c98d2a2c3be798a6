//! Feedback control for sampling rate and retries.

mod rate;
mod retry;

pub use rate::RateController;
pub use retry::RetryPolicy;
