use crate::config::RunConfig;
use anyhow::{Context, Result, anyhow, bail};
use async_stream::try_stream;
use futures_core::stream::Stream;
use rand::{Rng, thread_rng};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// One incremental piece of a streamed completion. The first chunk of a
/// stream usually carries only the role, so `content` may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    pub content: Option<String>,
}

impl Fragment {
    pub fn text(s: impl Into<String>) -> Self {
        Self { content: Some(s.into()) }
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Groq,
    LmStudio,
    /// Offline echo provider.
    Mock,
}

impl Provider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "groq" => Some(Provider::Groq),
            "lmstudio" => Some(Provider::LmStudio),
            "mock" => Some(Provider::Mock),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
            Provider::LmStudio => "lmstudio",
            Provider::Mock => "mock",
        }
    }

    pub fn default_api_base(&self) -> Option<String> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1".to_string()),
            Provider::Groq => Some("https://api.groq.com/openai/v1".to_string()),
            Provider::LmStudio => std::env::var("LMSTUDIO_API_BASE")
                .ok()
                .or_else(|| Some("http://127.0.0.1:1234/v1".to_string())),
            Provider::Mock => None,
        }
    }

    pub fn key_env_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::LmStudio => Some("LMSTUDIO_API_KEY"),
            Provider::Mock => None,
        }
    }

    pub fn requires_key(&self) -> bool {
        matches!(self, Provider::OpenAi | Provider::Groq)
    }
}

/// A chat-completion backend: one request in, one response or a fragment stream out.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse>;
    async fn send_stream(&self, req: LlmRequest) -> Result<FragmentStream>;
}

/// Pick the backend for the configured provider.
pub fn backend_for(config: &RunConfig) -> Result<Box<dyn ChatBackend>> {
    match config.provider {
        Provider::Mock => Ok(Box::new(MockBackend)),
        provider => {
            let base = config
                .api_base
                .clone()
                .with_context(|| format!("no API base configured for {}", provider.name()))?;
            Ok(Box::new(LlmClient::new_with_timeout(
                provider,
                base,
                config.api_key.clone(),
                config.timeout,
            )?))
        }
    }
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct LlmClient {
    http: Client,
    provider: Provider,
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

impl LlmClient {
    pub fn new_with_timeout(
        provider: Provider,
        api_base: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        // No overall client timeout: a stream may legitimately run longer than
        // `timeout`. Blocking calls set it per request.
        let http = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { http, provider, api_base, api_key, timeout })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    async fn post(&self, body: &OpenAiRequest<'_>, overall_timeout: Option<Duration>) -> Result<reqwest::Response> {
        let url = self.url();
        tracing::debug!(%url, stream = body.stream, model = body.model, "sending completion request");
        let res = with_retries(|| async {
            let mut rb = self.http.post(&url).json(body);
            if let Some(key) = self.api_key.as_ref() {
                rb = rb.bearer_auth(key);
            }
            if let Some(t) = overall_timeout {
                rb = rb.timeout(t);
            }
            let resp = rb.send().await?;
            Ok::<_, anyhow::Error>(resp)
        })
        .await?;
        if res.status() != StatusCode::OK {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("{} error {}: {}", self.provider.name(), status, text);
        }
        Ok(res)
    }
}

#[async_trait::async_trait]
impl ChatBackend for LlmClient {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse> {
        #[derive(Deserialize)]
        struct OpenAiChoiceMessage {
            content: Option<String>,
        }

        #[derive(Deserialize)]
        struct OpenAiChoice {
            message: Option<OpenAiChoiceMessage>,
        }

        #[derive(Deserialize)]
        struct OpenAiUsage {
            prompt_tokens: Option<u32>,
            completion_tokens: Option<u32>,
            total_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            choices: Vec<OpenAiChoice>,
            usage: Option<OpenAiUsage>,
        }

        let body = OpenAiRequest { model: &req.model, messages: &req.messages, stream: false };
        let res = self.post(&body, Some(self.timeout)).await?;
        let parsed: OpenAiResponse = res.json().await.context("failed to parse completion response")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("malformed completion response: no choices"))?;
        let content = choice.message.and_then(|m| m.content).unwrap_or_default();
        let usage = parsed.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        Ok(LlmResponse { content, usage })
    }

    async fn send_stream(&self, req: LlmRequest) -> Result<FragmentStream> {
        let body = OpenAiRequest { model: &req.model, messages: &req.messages, stream: true };
        let res = self.post(&body, None).await?;

        let byte_stream = res.bytes_stream();
        let s = try_stream! {
            use futures_util::StreamExt;
            let mut decoder = SseDecoder::default();
            let mut done = false;
            futures_util::pin_mut!(byte_stream);
            while !done {
                let Some(chunk) = byte_stream.next().await else { break };
                let bytes = chunk.map_err(|e| anyhow!(e).context("reading completion stream"))?;
                for data in decoder.push(&bytes) {
                    match parse_stream_payload(&data)? {
                        Some(fragment) => {
                            yield fragment;
                        }
                        None => {
                            done = true;
                            break;
                        }
                    }
                }
            }
            if !done {
                if let Some(data) = decoder.finish() {
                    if let Some(fragment) = parse_stream_payload(&data)? {
                        yield fragment;
                    }
                }
            }
        };
        Ok(Box::pin(s))
    }
}

/// Splits a Server-Sent Events byte stream into `data:` payloads. Bytes are
/// buffered until a full line arrives, so multi-byte characters and JSON split
/// across network chunks are reassembled.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(data) = data_payload(&line[..line.len() - 1]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Payload of a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        return None;
    }
    Some(data.to_string())
}

/// Parse one `data:` payload. `Ok(None)` marks the end of the stream.
pub fn parse_stream_payload(data: &str) -> Result<Option<Fragment>> {
    #[derive(Deserialize)]
    struct StreamDelta {
        content: Option<String>,
    }

    #[derive(Deserialize)]
    struct StreamChoice {
        delta: Option<StreamDelta>,
    }

    #[derive(Deserialize)]
    struct StreamChunk {
        #[serde(default)]
        choices: Vec<StreamChoice>,
        error: Option<serde_json::Value>,
    }

    if data == "[DONE]" {
        return Ok(None);
    }
    let chunk: StreamChunk =
        serde_json::from_str(data).with_context(|| format!("failed to parse stream chunk: {}", data))?;
    if let Some(err) = chunk.error {
        bail!("completion stream error: {}", err);
    }
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content);
    Ok(Some(Fragment { content }))
}

/// Retry connection-level failures with jittered exponential backoff. Callers
/// only wrap the initial send; HTTP error statuses and stream failures pass through.
pub async fn with_retries<F, Fut, T>(mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let mut attempt = 0u32;
    let max_retries = 3u32;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(e).context("request failed after retries");
                }
                let backoff_ms = (2u64.pow(attempt) * 100) + thread_rng().gen_range(0..100);
                tracing::debug!(attempt, backoff_ms, error = %e, "retrying completion request");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Echoes the prompt back, for dry runs and tests. Streaming splits the same
/// answer into word-sized fragments after a role-only first chunk.
pub struct MockBackend;

impl MockBackend {
    fn answer(req: &LlmRequest) -> String {
        let prompt = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        format!("[stub answer] {}", prompt)
    }
}

#[async_trait::async_trait]
impl ChatBackend for MockBackend {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse> {
        Ok(LlmResponse { content: Self::answer(&req), usage: None })
    }

    async fn send_stream(&self, req: LlmRequest) -> Result<FragmentStream> {
        let answer = Self::answer(&req);
        let mut fragments: Vec<Result<Fragment>> = vec![Ok(Fragment::default())];
        fragments.extend(answer.split_inclusive(' ').map(|w| Ok(Fragment::text(w))));
        Ok(Box::pin(futures_util::stream::iter(fragments)))
    }
}
