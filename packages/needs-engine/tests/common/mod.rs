#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use learning_needs_engine::error::ExternalServiceError;
use learning_needs_engine::needs::{
    InferenceClient, InferenceRequest, InferenceResponse, InteractionSample,
};

/// A sample that triggers no difficulty rule.
pub fn baseline_sample() -> Value {
    json!({
        "readingSpeed": 95.0,
        "readingAccuracy": 0.92,
        "readingComprehension": 0.85,
        "mathAccuracy": 0.88,
        "mathSpeed": 12.0,
        "attentionSpan": 25.0,
        "taskCompletion": 0.9,
        "helpRequests": 1,
        "audioPreference": 0.2,
        "visualPreference": 0.5,
        "kinestheticPreference": 0.3,
        "readingErrors": {
            "substitutions": 1,
            "omissions": 0,
            "insertions": 0,
            "reversals": 0,
            "transpositions": 0
        },
        "mathErrors": {
            "calculation": 1,
            "procedural": 0,
            "conceptual": 0,
            "visual": 0
        },
        "responseTimes": { "mean": 3200.0, "variance": 400.0, "outliers": 0 },
        "language": "en",
        "culturalBackground": "western",
        "socioeconomicContext": "middle-income",
        "deviceType": "tablet"
    })
}

pub fn sample_with(overrides: Value) -> InteractionSample {
    let mut base = baseline_sample();
    merge(&mut base, overrides);
    InteractionSample::from_value(base).expect("sample is an object")
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Scenario A input: frequent letter reversals with slow reading.
pub fn reversal_sample() -> InteractionSample {
    sample_with(json!({
        "readingSpeed": 40.0,
        "readingErrors": { "reversals": 5, "omissions": 4 }
    }))
}

/// Short attention span: the rule path scores attention/cognitive load at 0.8.
pub fn inattentive_sample() -> InteractionSample {
    sample_with(json!({ "attentionSpan": 4.0 }))
}

pub struct StaticClient {
    pub response: InferenceResponse,
}

impl StaticClient {
    pub fn new(pairs: &[(&str, f64)], confidence: f64) -> Self {
        Self {
            response: InferenceResponse {
                category_probabilities: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                confidence,
            },
        }
    }
}

impl InferenceClient for StaticClient {
    fn score(
        &self,
        _request: &InferenceRequest,
    ) -> impl Future<Output = Result<InferenceResponse, ExternalServiceError>> + Send {
        let response = self.response.clone();
        async move { Ok(response) }
    }
}

pub struct FailingClient;

impl InferenceClient for FailingClient {
    fn score(
        &self,
        _request: &InferenceRequest,
    ) -> impl Future<Output = Result<InferenceResponse, ExternalServiceError>> + Send {
        async { Err(ExternalServiceError::Malformed("scorer offline".to_string())) }
    }
}

pub struct SlowClient {
    pub delay: Duration,
}

impl InferenceClient for SlowClient {
    fn score(
        &self,
        _request: &InferenceRequest,
    ) -> impl Future<Output = Result<InferenceResponse, ExternalServiceError>> + Send {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            Ok(InferenceResponse {
                category_probabilities: Default::default(),
                confidence: 1.0,
            })
        }
    }
}

/// Local HTTP endpoint that answers every request with 503. Returns its base URL.
pub async fn spawn_unavailable_scorer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut stream).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

async fn read_request(stream: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}
