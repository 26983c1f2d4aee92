//! Sends the rendered prompt and writes the answer to the terminal.
//!
//! Blocking mode writes the whole answer in one write. Streaming mode writes
//! and flushes each fragment as it arrives, in arrival order. Both end with a
//! newline and produce the same text for the same model response.

use crate::error::PromptError;
use crate::llm::{ChatBackend, ChatMessage, LlmRequest, Usage};
use crate::pipeline::RenderedPrompt;
use anyhow::Result;
use futures_util::StreamExt;
use std::io::Write;

/// Checked before each pull from a stream; returning `true` stops it.
pub type CutoffHook = Box<dyn Fn() -> bool + Send + Sync>;

/// What was shown to the user.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    /// Non-empty fragments written; 0 in blocking mode.
    pub fragments: usize,
    pub cut_off: bool,
    pub usage: Option<Usage>,
}

pub fn build_request(model: &str, prompt: RenderedPrompt, stream: bool) -> LlmRequest {
    LlmRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user(prompt.into_string())],
        stream,
    }
}

pub struct Executor<W: Write> {
    out: W,
    cutoff: Option<CutoffHook>,
}

impl<W: Write> Executor<W> {
    pub fn new(out: W) -> Self {
        Self { out, cutoff: None }
    }

    /// Stop a stream early when `hook` returns `true`. The CLI does not install
    /// one; embedders wire it to their own cancellation.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_cutoff(mut self, hook: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.cutoff = Some(Box::new(hook));
        self
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub async fn run(&mut self, backend: &dyn ChatBackend, req: LlmRequest) -> Result<Completion> {
        let completion = if req.stream {
            self.run_streaming(backend, req).await?
        } else {
            self.run_blocking(backend, req).await?
        };
        tracing::debug!(
            chars = completion.text.len(),
            fragments = completion.fragments,
            cut_off = completion.cut_off,
            usage = ?completion.usage,
            "completion finished"
        );
        Ok(completion)
    }

    async fn run_blocking(&mut self, backend: &dyn ChatBackend, req: LlmRequest) -> Result<Completion> {
        let res = backend.send(req).await?;
        let mut line = String::with_capacity(res.content.len() + 1);
        line.push_str(&res.content);
        line.push('\n');
        self.emit(line.as_bytes())?;
        Ok(Completion { text: res.content, usage: res.usage, ..Default::default() })
    }

    async fn run_streaming(&mut self, backend: &dyn ChatBackend, req: LlmRequest) -> Result<Completion> {
        let mut stream = backend.send_stream(req).await?;
        let mut completion = Completion::default();
        loop {
            if self.cutoff.as_ref().is_some_and(|hook| hook()) {
                tracing::debug!(fragments = completion.fragments, "stream cut off");
                completion.cut_off = true;
                break;
            }
            let Some(fragment) = stream.next().await else { break };
            // Text already written stays on screen if the stream fails here.
            let fragment = fragment?;
            let Some(text) = fragment.content.filter(|t| !t.is_empty()) else { continue };
            self.emit(text.as_bytes())?;
            completion.text.push_str(&text);
            completion.fragments += 1;
        }
        drop(stream);
        self.emit(b"\n")?;
        Ok(completion)
    }

    /// Write and flush, so the text is visible before the next pull.
    fn emit(&mut self, bytes: &[u8]) -> Result<(), PromptError> {
        self.out.write_all(bytes).map_err(PromptError::Output)?;
        self.out.flush().map_err(PromptError::Output)
    }
}
