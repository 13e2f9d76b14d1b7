use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::GenerateError;

/// Something that turns a user message into model text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestPart<'a> {
    text: &'a str,
}

// Every level is optional so a malformed body surfaces as MissingField rather than a
// serde error deep inside the shape.
#[derive(Deserialize, Debug, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl<'a> GenerateRequest<'a> {
    fn single_user_turn(text: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text }],
            }],
        }
    }
}

impl GenerateResponse {
    /// First text part of the first candidate.
    fn into_text(self) -> Result<String, GenerateError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(GenerateError::MissingField("candidates[0]"))?;
        let content = candidate
            .content
            .ok_or(GenerateError::MissingField("candidates[0].content"))?;
        let part = content
            .parts
            .into_iter()
            .next()
            .ok_or(GenerateError::MissingField("candidates[0].content.parts[0]"))?;
        part.text
            .ok_or(GenerateError::MissingField("candidates[0].content.parts[0].text"))
    }
}

/// Parse a raw `generateContent` body into the response text.
pub fn parse_response(body: &str) -> Result<String, GenerateError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    response.into_text()
}

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let api_key = self.api_key.as_deref().ok_or(GenerateError::MissingApiKey)?;
        let request = GenerateRequest::single_user_turn(prompt);

        tracing::debug!(model = %self.model, chars = prompt.chars().count(), "sending generation request");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GenerateError::Status { status, body });
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    #[test]
    fn request_has_single_user_content_entry() {
        let request = GenerateRequest::single_user_turn("hello there");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello there" }] }]
            })
        );
    }

    #[test]
    fn parses_first_candidate_first_part() {
        let body = r#"{
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "first" }, { "text": "second" }] } },
                { "content": { "parts": [{ "text": "other" }] } }
            ]
        }"#;
        assert_eq!(parse_response(body).unwrap(), "first");
    }

    #[test]
    fn missing_candidates_is_a_handled_error() {
        let err = parse_response(r#"{"promptFeedback": {}}"#).unwrap_err();
        assert!(matches!(err, GenerateError::MissingField("candidates[0]")));
    }

    #[test]
    fn missing_parts_is_a_handled_error() {
        let err = parse_response(r#"{"candidates": [{"content": {"parts": []}}]}"#).unwrap_err();
        assert!(matches!(err, GenerateError::MissingField("candidates[0].content.parts[0]")));

        let err = parse_response(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap_err();
        assert!(matches!(err, GenerateError::MissingField("candidates[0].content")));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = parse_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, GenerateError::Decode(_)));
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new("https://example.test/v1/", "gemini-pro", None);
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1/models/gemini-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let client = GeminiClient::new("http://127.0.0.1:9", "gemini-pro", None);
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerateError::MissingApiKey));
    }

    /// Answer a single HTTP request with `status` and `body`; yields the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(request).unwrap()
        });
        (base_url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn posts_user_turn_and_returns_first_text() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"hi there"}]}}]}"#,
        )
        .await;
        let client = GeminiClient::new(&base_url, "gemini-pro", Some("secret-key".into()));

        assert_eq!(client.generate("hello").await.unwrap(), "hi there");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/models/gemini-pro:generateContent HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: secret-key"));
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_carries_status_and_body() {
        let (base_url, server) =
            serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = GeminiClient::new(&base_url, "gemini-pro", Some("k".into()));

        let err = client.generate("hello").await.unwrap_err();
        match err {
            GenerateError::Status { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, r#"{"error":"boom"}"#);
            }
            other => panic!("expected a status error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn transport_failure_never_mentions_the_key() {
        // Bind then drop so the port is closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GeminiClient::new(
            &format!("http://{}/v1", addr),
            "gemini-pro",
            Some("very-secret-key".into()),
        );
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, GenerateError::Http(_)));
        assert!(!err.to_string().contains("very-secret-key"));
        assert!(!format!("{:?}", err).contains("very-secret-key"));
    }
}
