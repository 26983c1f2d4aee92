//! Turns the command line into the single prompt string sent to the model.

use crate::args::resolve_arguments;
use crate::error::PromptError;
use crate::io::{StdinHandle, read_file_to_string};
use crate::source::{PromptSource, classify};
use crate::template::TemplateSpec;

/// Final prompt text, ready for the completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt(String);

impl RenderedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Classify, load, and (for templates) bind arguments and render.
///
/// A prompt read from standard input is sent verbatim: it is never parsed as
/// a template, so `args` are ignored on that path.
pub fn resolve_prompt(
    prompt: Option<&str>,
    args: &[String],
    stdin: &mut StdinHandle,
) -> Result<RenderedPrompt, PromptError> {
    let text = match classify(prompt)? {
        PromptSource::Stdin => {
            if !args.is_empty() {
                tracing::warn!(count = args.len(), "ignoring arguments for a prompt read from stdin");
            }
            let text = stdin.read_all("prompt")?;
            return Ok(RenderedPrompt(text));
        }
        PromptSource::File(path) => {
            tracing::debug!(path = %path.display(), "loading prompt from file");
            read_file_to_string(&path)?
        }
        PromptSource::Literal(text) => text,
    };

    let rendered = match TemplateSpec::parse(&text) {
        Some(template) => {
            tracing::debug!(variables = ?template.variable_names(), "prompt is a template");
            let values = resolve_arguments(template.variable_names(), args, stdin)?;
            template.render(&values)?
        }
        None => {
            if !args.is_empty() {
                tracing::warn!(count = args.len(), "prompt has no template variables; ignoring arguments");
            }
            text
        }
    };
    let prompt = RenderedPrompt(rendered);
    tracing::debug!(prompt = prompt.as_str(), "resolved prompt");
    Ok(prompt)
}
