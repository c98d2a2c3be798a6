//! Scripted classifier for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::client::{Classifier, ClassifyError, ClassifyRequest, Verdict};

/// One recorded submission, with wall-clock bounds for concurrency audits.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Correlation id of the submitted sample.
    pub sample_id: String,
    /// When the submission started.
    pub started: Instant,
    /// When the verdict was returned.
    pub finished: Instant,
}

#[derive(Debug, Clone)]
enum Fallback {
    Clean,
    Flagged(f32),
    FlagEvery(u64, f32),
}

impl Fallback {
    fn outcome(&self, call_number: u64) -> Result<Verdict, ClassifyError> {
        match self {
            Fallback::Clean => Ok(Verdict::clean()),
            Fallback::Flagged(confidence) => Ok(Verdict::flagged(*confidence)),
            Fallback::FlagEvery(n, confidence) => {
                if call_number % (*n).max(1) == 0 {
                    Ok(Verdict::flagged(*confidence))
                } else {
                    Ok(Verdict::clean())
                }
            }
        }
    }
}

struct Inner {
    script: VecDeque<Result<Verdict, ClassifyError>>,
    fallback: Fallback,
    calls: Vec<CallRecord>,
    total_calls: u64,
    healthy: bool,
}

/// Classifier that replays scripted outcomes and logs every call.
///
/// Outcomes pushed with [`push_outcome`](Self::push_outcome) are consumed
/// in order; once the script is exhausted the constructor's fallback
/// behavior takes over. Clones share the script and the call log.
#[derive(Clone)]
pub struct ScriptedClassifier {
    inner: Arc<Mutex<Inner>>,
    delay: Duration,
}

impl ScriptedClassifier {
    fn with_fallback(fallback: Fallback) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                script: VecDeque::new(),
                fallback,
                calls: Vec::new(),
                total_calls: 0,
                healthy: true,
            })),
            delay: Duration::ZERO,
        }
    }

    /// Every submission comes back clean.
    pub fn always_clean() -> Self {
        Self::with_fallback(Fallback::Clean)
    }

    /// Every submission comes back flagged at `confidence`.
    pub fn always_flagged(confidence: f32) -> Self {
        Self::with_fallback(Fallback::Flagged(confidence))
    }

    /// Every `n`th submission comes back flagged at `confidence`.
    pub fn flag_every(n: u64, confidence: f32) -> Self {
        Self::with_fallback(Fallback::FlagEvery(n, confidence))
    }

    /// Adds a simulated service latency to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues one outcome ahead of the fallback behavior.
    pub fn push_outcome(&self, outcome: Result<Verdict, ClassifyError>) {
        self.lock().script.push_back(outcome);
    }

    /// Scripts the health probe.
    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    /// Number of submissions seen so far.
    pub fn call_count(&self) -> u64 {
        self.lock().total_calls
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Largest number of submissions that were in flight at once.
    pub fn max_overlap(&self) -> usize {
        let calls = self.calls();
        let mut events: Vec<(Instant, i32)> = Vec::with_capacity(calls.len() * 2);
        for call in &calls {
            events.push((call.started, 1));
            events.push((call.finished, -1));
        }
        // A release and an acquire at the same instant do not overlap.
        events.sort_by_key(|(at, delta)| (*at, *delta));

        let mut current = 0i32;
        let mut peak = 0i32;
        for (_, delta) in events {
            current += delta;
            peak = peak.max(current);
        }
        peak as usize
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ScriptedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ScriptedClassifier")
            .field("scripted", &inner.script.len())
            .field("total_calls", &inner.total_calls)
            .field("delay", &self.delay)
            .finish()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, request: ClassifyRequest) -> Result<Verdict, ClassifyError> {
        let started = tokio::time::Instant::now().into_std();
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }

        let mut inner = self.lock();
        inner.total_calls += 1;
        let call_number = inner.total_calls;
        let outcome = inner
            .script
            .pop_front()
            .unwrap_or_else(|| inner.fallback.outcome(call_number));
        inner.calls.push(CallRecord {
            sample_id: request.sample_id,
            started,
            finished: tokio::time::Instant::now().into_std(),
        });

        tracing::trace!(call = call_number, ok = outcome.is_ok(), "Scripted verdict");
        outcome
    }

    async fn healthy(&self) -> bool {
        self.lock().healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ClassifyRequest {
        ClassifyRequest {
            sample_id: id.to_string(),
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            threshold: 0.5,
            fast_mode: true,
            page_host: "example.com".to_string(),
            categories: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_scripted_outcomes_consumed_in_order() {
        let classifier = ScriptedClassifier::always_clean();
        classifier.push_outcome(Ok(Verdict::flagged(0.9)));
        classifier.push_outcome(Err(ClassifyError::Network("down".to_string())));

        let first = classifier.classify(request("a")).await.unwrap();
        let second = classifier.classify(request("b")).await.unwrap_err();
        let third = classifier.classify(request("c")).await.unwrap();

        assert!(first.flagged);
        assert!(second.is_transient());
        assert!(!third.flagged);
    }

    #[tokio::test]
    async fn test_flag_every_third() {
        let classifier = ScriptedClassifier::flag_every(3, 0.8);

        let mut flags = Vec::new();
        for i in 0..6 {
            let verdict = classifier.classify(request(&format!("s{i}"))).await.unwrap();
            flags.push(verdict.flagged);
        }

        assert_eq!(flags, vec![false, false, true, false, false, true]);
    }

    #[tokio::test]
    async fn test_call_log_keeps_order_and_ids() {
        let classifier = ScriptedClassifier::always_clean();

        classifier.classify(request("first")).await.unwrap();
        classifier.classify(request("second")).await.unwrap();

        let ids: Vec<String> = classifier.calls().into_iter().map(|c| c.sample_id).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(classifier.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlap_audit_sees_concurrent_calls() {
        let classifier =
            ScriptedClassifier::always_clean().with_delay(Duration::from_millis(100));

        tokio::join!(
            async {
                classifier.classify(request("a")).await.unwrap();
            },
            async {
                classifier.classify(request("b")).await.unwrap();
            }
        );

        assert_eq!(classifier.max_overlap(), 2);
    }

    #[tokio::test]
    async fn test_health_scripting() {
        let classifier = ScriptedClassifier::always_clean();
        assert!(classifier.healthy().await);

        classifier.set_healthy(false);
        assert!(!classifier.healthy().await);
    }
}
