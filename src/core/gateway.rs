//! Remote operation gateway: typed client for the watermarking service.
//!
//! Four operations: health probe, embed, extract (with original), blind
//! verify. Binary uploads travel as multipart forms; responses are
//! structured envelopes. A response that parses to an error envelope
//! (`{ message, suggestion? }`) is an *application* error and is surfaced
//! verbatim; network failures and non-2xx responses without a usable
//! envelope are *transport* errors and are surfaced generically (the
//! details go to the logs).

use crate::core::config::{HEALTH_TIMEOUT, HTTP_TIMEOUT};
use crate::core::resources::ImageResource;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Structured failure from the service; message shown verbatim.
    #[error("{message}")]
    Application {
        message: String,
        suggestion: Option<String>,
    },
    /// Network failure or a response without a usable envelope.
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// The line shown in the status bar. Application errors pass through
    /// the server's wording (plus remediation suggestion, if any);
    /// transport errors collapse to a generic message.
    pub fn user_message(&self, operation: &str) -> String {
        match self {
            GatewayError::Application {
                message,
                suggestion,
            } => match suggestion {
                Some(s) => format!("{message} — {s}"),
                None => message.clone(),
            },
            GatewayError::Transport(_) => format!("{operation} failed: service unreachable"),
        }
    }
}

// ── Response payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmbedResult {
    pub image_url: String,
    #[serde(default)]
    pub signal_map_url: Option<String>,
    pub psnr: f64,
    pub ssim: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentStatus {
    Aligned,
    Failed,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Alignment {
    pub status: AlignmentStatus,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExtractResult {
    #[serde(default)]
    pub decoded_text: Option<String>,
    /// In [0, 1].
    pub confidence: f64,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeometryReport {
    pub rotation_degrees: f64,
    pub scale_factor: f64,
    #[serde(default)]
    pub peak_quality: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VerifyResult {
    pub verified: bool,
    #[serde(default)]
    pub watermark_text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub geometry: Option<GeometryReport>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
}

impl Gateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Probe the service. Any failure is treated as "offline"; used only
    /// for the header indicator, never fatal.
    pub async fn health(&self) -> bool {
        match self
            .http
            .get(self.endpoint("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("health probe failed: {e}");
                false
            }
        }
    }

    pub async fn embed(
        &self,
        image: &ImageResource,
        text: &str,
        alpha: f64,
    ) -> Result<EmbedResult, GatewayError> {
        let form = Form::new()
            .part("file", part_for(image)?)
            .text("text", text.to_string())
            .text("alpha", format!("{alpha}"));
        self.post("embed", form).await
    }

    pub async fn extract(
        &self,
        original: &ImageResource,
        suspect: &ImageResource,
    ) -> Result<ExtractResult, GatewayError> {
        let form = Form::new()
            .part("original_file", part_for(original)?)
            .part("suspect_file", part_for(suspect)?);
        self.post("extract", form).await
    }

    pub async fn verify(&self, suspect: &ImageResource) -> Result<VerifyResult, GatewayError> {
        let form = Form::new().part("image", part_for(suspect)?);
        self.post("verify", form).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(path);
        debug!(url = %url, "gateway request");
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, "gateway request failed: {e}");
                GatewayError::Transport(e.to_string())
            })?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        parse_envelope(status, &body)
    }

    /// Fetch a result image by the URL the service returned. Relative
    /// URLs (e.g. `/out/1.png`) resolve against the service base.
    pub async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.endpoint(url)
        };
        let resp = self
            .http
            .get(&target)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(GatewayError::Transport(format!(
                "artifact fetch returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn part_for(image: &ImageResource) -> Result<Part, GatewayError> {
    Part::bytes(image.bytes().to_vec())
        .file_name(image.name().to_string())
        .mime_str(image.mime_type())
        .map_err(|e| GatewayError::Transport(format!("invalid mime type: {e}")))
}

/// Classify and decode a response body. Success statuses must carry a
/// `{ data: ... }` envelope; failures with a parseable
/// `{ message, suggestion? }` envelope become application errors and
/// everything else becomes a transport error.
fn parse_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, GatewayError> {
    if status.is_success() {
        return match serde_json::from_slice::<Envelope<T>>(body) {
            Ok(envelope) => Ok(envelope.data),
            Err(e) => Err(GatewayError::Transport(format!(
                "malformed success envelope: {e}"
            ))),
        };
    }
    if let Ok(err) = serde_json::from_slice::<ErrorEnvelope>(body) {
        return Err(GatewayError::Application {
            message: err.message,
            suggestion: err.suggestion,
        });
    }
    Err(GatewayError::Transport(format!("HTTP {status}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_success_envelope() {
        let body = br#"{"status":"success","data":{"image_url":"/out/1.png","psnr":42.3,"ssim":0.98}}"#;
        let result: EmbedResult = parse_envelope(StatusCode::OK, body).unwrap();
        assert_eq!(result.image_url, "/out/1.png");
        assert_eq!(result.psnr, 42.3);
        assert_eq!(result.ssim, 0.98);
        assert!(result.signal_map_url.is_none());
    }

    #[test]
    fn test_embed_envelope_with_signal_map() {
        let body = br#"{"data":{"image_url":"/out/1.png","signal_map_url":"/out/1_map.png","psnr":40.0,"ssim":0.99}}"#;
        let result: EmbedResult = parse_envelope(StatusCode::OK, body).unwrap();
        assert_eq!(result.signal_map_url.as_deref(), Some("/out/1_map.png"));
    }

    #[test]
    fn test_extract_alignment_both_outcomes_parse() {
        for (status, expected) in [
            ("aligned", AlignmentStatus::Aligned),
            ("failed", AlignmentStatus::Failed),
        ] {
            let body = format!(
                r#"{{"data":{{"decoded_text":"© 2025","confidence":0.9,"alignment":{{"status":"{status}"}}}}}}"#
            );
            let result: ExtractResult =
                parse_envelope(StatusCode::OK, body.as_bytes()).unwrap();
            assert_eq!(result.alignment.status, expected);
            assert_eq!(result.decoded_text.as_deref(), Some("© 2025"));
        }
    }

    #[test]
    fn test_extract_without_decoded_text() {
        let body = br#"{"data":{"confidence":0.1,"alignment":{"status":"failed"}}}"#;
        let result: ExtractResult = parse_envelope(StatusCode::OK, body).unwrap();
        assert!(result.decoded_text.is_none());
    }

    #[test]
    fn test_verify_with_geometry() {
        let body = br#"{"data":{"verified":true,"watermark_text":"abc","confidence":0.87,
            "geometry":{"rotation_degrees":-9.8,"scale_factor":1.09,"peak_quality":4.2}}}"#;
        let result: VerifyResult = parse_envelope(StatusCode::OK, body).unwrap();
        assert!(result.verified);
        let geometry = result.geometry.unwrap();
        assert_eq!(geometry.rotation_degrees, -9.8);
        assert_eq!(geometry.peak_quality, Some(4.2));
    }

    #[test]
    fn test_verify_negative_has_no_geometry() {
        let body = br#"{"data":{"verified":false}}"#;
        let result: VerifyResult = parse_envelope(StatusCode::OK, body).unwrap();
        assert!(!result.verified);
        assert!(result.watermark_text.is_none());
        assert!(result.geometry.is_none());
    }

    #[test]
    fn test_error_envelope_is_application_error() {
        let body = br#"{"message":"image too small","suggestion":"use at least 256x256"}"#;
        let err = parse_envelope::<EmbedResult>(StatusCode::BAD_REQUEST, body).unwrap_err();
        match err {
            GatewayError::Application {
                message,
                suggestion,
            } => {
                assert_eq!(message, "image too small");
                assert_eq!(suggestion.as_deref(), Some("use at least 256x256"));
            }
            other => panic!("expected application error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_envelope_without_suggestion() {
        let body = br#"{"message":"no watermark found"}"#;
        let err = parse_envelope::<VerifyResult>(StatusCode::UNPROCESSABLE_ENTITY, body).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Application { suggestion: None, .. }
        ));
    }

    #[test]
    fn test_unstructured_failure_is_transport_error() {
        let err =
            parse_envelope::<EmbedResult>(StatusCode::BAD_GATEWAY, b"<html>nginx</html>").unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn test_malformed_success_body_is_transport_error() {
        let err = parse_envelope::<EmbedResult>(StatusCode::OK, b"{}").unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn test_user_message_prefers_server_wording() {
        let app = GatewayError::Application {
            message: "payload too long".into(),
            suggestion: Some("shorten to 32 chars".into()),
        };
        assert_eq!(
            app.user_message("Embed"),
            "payload too long — shorten to 32 chars"
        );

        let transport = GatewayError::Transport("connection refused".into());
        assert_eq!(
            transport.user_message("Embed"),
            "Embed failed: service unreachable"
        );
    }

    #[test]
    fn test_endpoint_join() {
        let gw = Gateway::new("http://localhost:8000/").unwrap();
        assert_eq!(gw.endpoint("/embed"), "http://localhost:8000/embed");
        assert_eq!(gw.endpoint("health"), "http://localhost:8000/health");
    }
}
