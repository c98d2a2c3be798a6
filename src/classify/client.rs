//! Remote classification client.
//!
//! Samples are submitted as JSON over HTTP to the classification service:
//! `POST /process-image` carries a base64 JPEG plus tuning parameters, and
//! the reply reports whether the image was flagged and at what confidence.
//! `GET /health` probes service readiness.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from submitting a sample for classification.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// The service did not answer within the submission deadline.
    #[error("classification deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The request never completed at the transport level.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a server-side failure (5xx).
    #[error("service unavailable: status {0}")]
    Unavailable(u16),

    /// The service refused the request (4xx); resubmitting the same
    /// sample will not help.
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code returned by the service.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The reply arrived but could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ClassifyError {
    /// Whether retrying the same submission could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClassifyError::DeadlineExceeded(_)
                | ClassifyError::Network(_)
                | ClassifyError::Unavailable(_)
        )
    }
}

/// One sample prepared for submission.
#[derive(Clone)]
pub struct ClassifyRequest {
    /// Correlation id echoed back by the service.
    pub sample_id: String,
    /// Encoded JPEG bytes.
    pub jpeg: Vec<u8>,
    /// Detection threshold the service should apply.
    pub threshold: f32,
    /// Trade accuracy for latency on the service side.
    pub fast_mode: bool,
    /// Host of the page the sample came from.
    pub page_host: String,
    /// Content categories the caller wants flagged.
    pub categories: Vec<String>,
}

impl std::fmt::Debug for ClassifyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifyRequest")
            .field("sample_id", &self.sample_id)
            .field("jpeg_bytes", &self.jpeg.len())
            .field("threshold", &self.threshold)
            .field("fast_mode", &self.fast_mode)
            .field("page_host", &self.page_host)
            .field("categories", &self.categories)
            .finish()
    }
}

/// Service verdict for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// True when the service flagged the image.
    pub flagged: bool,
    /// Confidence of the strongest detection, 0.0 when clean.
    pub confidence: f32,
    /// Number of detections the service reported.
    pub detections: u32,
    /// Time the service spent processing the image.
    pub service_time: Duration,
}

impl Verdict {
    /// A verdict reporting no objectionable content.
    pub fn clean() -> Self {
        Self {
            flagged: false,
            confidence: 0.0,
            detections: 0,
            service_time: Duration::ZERO,
        }
    }

    /// A flagged verdict at the given confidence.
    pub fn flagged(confidence: f32) -> Self {
        Self {
            flagged: true,
            confidence,
            detections: 1,
            service_time: Duration::ZERO,
        }
    }
}

/// Classification backend behind the engine.
///
/// Implementations must tolerate concurrent calls; the engine keeps a
/// small number of submissions in flight at once.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Submits one sample and waits for the verdict.
    async fn classify(&self, request: ClassifyRequest) -> Result<Verdict, ClassifyError>;

    /// Probes whether the backend is ready to accept submissions.
    async fn healthy(&self) -> bool {
        true
    }
}

#[derive(Serialize)]
struct WireRequest {
    image: String,
    image_id: String,
    confidence: f32,
    fast_mode: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    context: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<String>,
}

#[derive(Deserialize)]
struct WireResponse {
    nsfw_detected: bool,
    confidence: f32,
    #[serde(default)]
    detections: u32,
    #[serde(default)]
    processing_time: f64,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    error: String,
}

/// Maps an HTTP status and body onto a verdict or error.
fn parse_verdict(status: u16, body: &str) -> Result<Verdict, ClassifyError> {
    if status >= 500 {
        return Err(ClassifyError::Unavailable(status));
    }
    if status >= 400 {
        let message = serde_json::from_str::<WireError>(body)
            .map(|e| e.error)
            .unwrap_or_default();
        return Err(ClassifyError::Rejected { status, message });
    }

    let reply: WireResponse = serde_json::from_str(body)
        .map_err(|err| ClassifyError::MalformedResponse(err.to_string()))?;

    Ok(Verdict {
        flagged: reply.nsfw_detected,
        confidence: reply.confidence,
        detections: reply.detections,
        service_time: Duration::from_secs_f64(reply.processing_time.max(0.0)),
    })
}

/// HTTP client for a real classification service.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
    deadline: Duration,
}

impl HttpClassifier {
    /// Creates a client for the service at `endpoint` (scheme and
    /// authority, no trailing path).
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            endpoint,
            deadline,
        }
    }

    /// Base endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn wire(request: &ClassifyRequest) -> WireRequest {
        WireRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&request.jpeg),
            image_id: request.sample_id.clone(),
            confidence: request.threshold,
            fast_mode: request.fast_mode,
            context: request.page_host.clone(),
            categories: request.categories.clone(),
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: ClassifyRequest) -> Result<Verdict, ClassifyError> {
        let url = format!("{}/process-image", self.endpoint);
        let wire = Self::wire(&request);

        let response = match self
            .http
            .post(&url)
            .timeout(self.deadline)
            .json(&wire)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(ClassifyError::DeadlineExceeded(self.deadline));
            }
            Err(err) => return Err(ClassifyError::Network(err.to_string())),
        };

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| ClassifyError::Network(err.to_string()))?;

        let verdict = parse_verdict(status, &body)?;
        tracing::debug!(
            sample = %request.sample_id,
            flagged = verdict.flagged,
            confidence = verdict.confidence,
            "Service verdict"
        );
        Ok(verdict)
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.endpoint);
        match self.http.get(&url).timeout(self.deadline).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flagged_verdict() {
        let body = r#"{
            "nsfw_detected": true,
            "confidence": 0.91,
            "detections": 2,
            "image_id": "el7-s3",
            "processing_time": 0.042,
            "status": "success"
        }"#;

        let verdict = parse_verdict(200, body).unwrap();

        assert!(verdict.flagged);
        assert!((verdict.confidence - 0.91).abs() < 1e-6);
        assert_eq!(verdict.detections, 2);
        assert_eq!(verdict.service_time, Duration::from_secs_f64(0.042));
    }

    #[test]
    fn test_parse_clean_verdict() {
        let body = r#"{"nsfw_detected": false, "confidence": 0.0}"#;

        let verdict = parse_verdict(200, body).unwrap();

        assert!(!verdict.flagged);
        assert_eq!(verdict.detections, 0);
    }

    #[test]
    fn test_server_failure_is_transient() {
        let err = parse_verdict(500, r#"{"error": "boom", "status": "error"}"#).unwrap_err();

        assert!(matches!(err, ClassifyError::Unavailable(500)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_rejection_is_permanent_and_keeps_message() {
        let err = parse_verdict(400, r#"{"error": "Invalid image data"}"#).unwrap_err();

        match &err {
            ClassifyError::Rejected { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Invalid image data");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_transient());
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let err = parse_verdict(200, "not json").unwrap_err();

        assert!(matches!(err, ClassifyError::MalformedResponse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_negative_processing_time_clamped() {
        let body = r#"{"nsfw_detected": false, "confidence": 0.0, "processing_time": -1.0}"#;

        let verdict = parse_verdict(200, body).unwrap();

        assert_eq!(verdict.service_time, Duration::ZERO);
    }

    #[test]
    fn test_wire_request_shape() {
        let request = ClassifyRequest {
            sample_id: "el3-s1".to_string(),
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            threshold: 0.5,
            fast_mode: true,
            page_host: "example.com".to_string(),
            categories: vec!["explicit".to_string()],
        };

        let value = serde_json::to_value(HttpClassifier::wire(&request)).unwrap();

        assert_eq!(value["image_id"], "el3-s1");
        assert_eq!(value["confidence"], 0.5);
        assert_eq!(value["fast_mode"], true);
        assert_eq!(value["context"], "example.com");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value["image"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, request.jpeg);
    }

    #[test]
    fn test_wire_request_omits_empty_extras() {
        let request = ClassifyRequest {
            sample_id: "el3-s1".to_string(),
            jpeg: vec![1, 2, 3],
            threshold: 0.5,
            fast_mode: false,
            page_host: String::new(),
            categories: Vec::new(),
        };

        let value = serde_json::to_value(HttpClassifier::wire(&request)).unwrap();

        assert!(value.get("context").is_none());
        assert!(value.get("categories").is_none());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = HttpClassifier::new("http://127.0.0.1:5000/", Duration::from_secs(3));

        assert_eq!(client.endpoint(), "http://127.0.0.1:5000");
    }
}
