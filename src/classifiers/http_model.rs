use rand::{thread_rng, Rng};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::classifiers::contextual::{ContextualModel, ModelError, ModelPrediction};
use crate::config::{ConfigError, ContextualConfig};

const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a [String],
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Text-classification endpoints answer either with every label ranked per
/// input, or with one prediction per input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Ranked(Vec<Vec<ModelPrediction>>),
    Flat(Vec<ModelPrediction>),
}

impl InferenceResponse {
    fn into_top_predictions(self) -> Result<Vec<ModelPrediction>, ModelError> {
        match self {
            InferenceResponse::Flat(predictions) => Ok(predictions),
            InferenceResponse::Ranked(ranked) => ranked
                .into_iter()
                .enumerate()
                .map(|(idx, candidates)| {
                    candidates
                        .into_iter()
                        .max_by(|a, b| a.score.total_cmp(&b.score))
                        .ok_or_else(|| ModelError::Decode(format!("no label for input {idx}")))
                })
                .collect(),
        }
    }
}

fn parse_predictions(body: &str) -> Result<Vec<ModelPrediction>, ModelError> {
    let response: InferenceResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Decode(e.to_string()))?;
    response.into_top_predictions()
}

/// Remote contextual model served over HTTP, e.g. a hosted
/// `nlptown/bert-base-multilingual-uncased-sentiment`.
#[derive(Debug, Clone)]
pub struct HttpModel {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
    max_retries: usize,
    initial_backoff: Duration,
}

impl HttpModel {
    pub fn new(config: &ContextualConfig) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Invalid("contextual.endpoint", "no model endpoint configured".into())
            })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("dual-sentiment/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout()?)
            .build()
            .map_err(|e| ConfigError::Invalid("contextual", e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_token: config.api_token.clone(),
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, inputs: &[String]) -> Result<Vec<ModelPrediction>, ModelError> {
        let payload = InferenceRequest {
            inputs,
            options: InferenceOptions { wait_for_model: true },
        };

        let mut attempt = 0usize;
        let mut backoff = self.initial_backoff;
        loop {
            attempt += 1;
            let mut request = self.client.post(&self.endpoint).json(&payload);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await?;
                    debug!("Model answered {} inputs ({} bytes)", inputs.len(), body.len());
                    return parse_predictions(&body);
                }
                Ok(response) => {
                    let status = response.status();
                    if should_retry_status(status) && attempt <= self.max_retries {
                        let delay = with_jitter(backoff);
                        warn!(
                            "Model server status {} - retrying in {:?} (attempt {}/{})",
                            status, delay, attempt, self.max_retries
                        );
                        sleep(delay).await;
                        backoff = backoff.saturating_mul(2).min(MAX_BACKOFF);
                        continue;
                    }
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body read failed>".to_string());
                    return Err(ModelError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if attempt <= self.max_retries {
                        let delay = with_jitter(backoff);
                        warn!(
                            "Model request error: {} - retrying in {:?} (attempt {}/{})",
                            err, delay, attempt, self.max_retries
                        );
                        sleep(delay).await;
                        backoff = backoff.saturating_mul(2).min(MAX_BACKOFF);
                        continue;
                    }
                    return Err(ModelError::Request(err));
                }
            }
        }
    }
}

impl ContextualModel for HttpModel {
    async fn predict_batch(&self, inputs: &[String]) -> Result<Vec<ModelPrediction>, ModelError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.post(inputs).await
    }
}

fn with_jitter(backoff: Duration) -> Duration {
    let jitter_ms = thread_rng().gen_range(0..(backoff.as_millis() as u64 / 4 + 1));
    backoff + Duration::from_millis(jitter_ms)
}

fn should_retry_status(status: StatusCode) -> bool {
    match status {
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => true,
        _ if status.is_server_error() => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const PREDICTIONS: &str = r#"[{"label": "5 stars", "score": 0.83}]"#;

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length: usize = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    /// Answers one connection per canned response, in order, and counts
    /// the requests it saw.
    async fn serve(responses: Vec<(&'static str, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/predict", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_request(&mut stream).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });
        (url, hits)
    }

    fn model(endpoint: String) -> HttpModel {
        HttpModel::new(&ContextualConfig {
            endpoint: Some(endpoint),
            max_retries: 3,
            initial_backoff: "1ms".into(),
            timeout: "5s".into(),
            ..ContextualConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_ranked_response_keeps_top_label() {
        let body = r#"[
            [
                {"label": "1 star", "score": 0.05},
                {"label": "5 stars", "score": 0.71},
                {"label": "4 stars", "score": 0.2}
            ],
            [{"label": "2 stars", "score": 0.6}, {"label": "3 stars", "score": 0.4}]
        ]"#;
        let predictions = parse_predictions(body).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, "5 stars");
        assert_eq!(predictions[1].label, "2 stars");
        assert!((predictions[1].score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_parse_flat_response() {
        let body = r#"[{"label": "3 stars", "score": 0.52}, {"label": "1 star", "score": 0.9}]"#;
        let predictions = parse_predictions(body).unwrap();
        assert_eq!(
            predictions,
            vec![
                ModelPrediction {
                    label: "3 stars".into(),
                    score: 0.52
                },
                ModelPrediction {
                    label: "1 star".into(),
                    score: 0.9
                },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_bodies() {
        assert!(matches!(
            parse_predictions(r#"{"error": "loading"}"#),
            Err(ModelError::Decode(_))
        ));
        assert!(matches!(parse_predictions("[[]]"), Err(ModelError::Decode(_))));
    }

    #[test]
    fn test_should_retry_status() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(should_retry_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!should_retry_status(StatusCode::BAD_REQUEST));
        assert!(!should_retry_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let backoff = Duration::from_millis(400);
        for _ in 0..50 {
            let delay = with_jitter(backoff);
            assert!(delay >= backoff);
            assert!(delay <= backoff + Duration::from_millis(100));
        }
    }

    #[test]
    fn test_missing_endpoint_is_config_error() {
        let config = ContextualConfig::default();
        assert!(matches!(
            HttpModel::new(&config),
            Err(ConfigError::Invalid("contextual.endpoint", _))
        ));
        let config = ContextualConfig {
            endpoint: Some("http://localhost:8080/predict".into()),
            ..ContextualConfig::default()
        };
        assert_eq!(HttpModel::new(&config).unwrap().endpoint(), "http://localhost:8080/predict");
    }

    #[tokio::test]
    async fn test_unavailable_server_is_retried() {
        let (url, hits) = serve(vec![
            ("503 Service Unavailable", ""),
            ("503 Service Unavailable", ""),
            ("200 OK", PREDICTIONS),
        ])
        .await;
        let predictions = model(url)
            .predict_batch(&["Le réseau est top".to_string()])
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "5 stars");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (url, hits) = serve(vec![
            ("400 Bad Request", r#"{"error": "bad input"}"#),
            ("200 OK", PREDICTIONS),
        ])
        .await;
        let err = model(url)
            .predict_batch(&["Bof".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ModelError::Status { status: 400, ref body } if body.contains("bad input")
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_give_up_after_limit() {
        let unavailable = ("503 Service Unavailable", "");
        let (url, hits) = serve(vec![unavailable; 4]).await;
        let err = model(url)
            .predict_batch(&["Bof".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }
}
