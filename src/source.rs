use crate::error::PromptError;
use crate::io::is_existing_file;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

// Optional ./ ../ or / prefix, any number of directory components, then a
// file name with an extension. None of the parts may contain characters that
// are invalid in URLs/paths or cross a line break.
static FILE_PATH_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\.{0,2}[\\/])?(?:[^/:*?<>|\r\n]+[\\/])*[^/:*?<>|\r\n]+\.\w+$")
        .expect("file path pattern is valid")
});

/// Where the prompt text comes from, decided once before anything is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// No prompt argument: the whole of standard input is the prompt.
    Stdin,
    /// An existing file whose contents are the prompt (or template).
    File(PathBuf),
    /// The argument itself is the prompt (or template).
    Literal(String),
}

pub fn looks_like_file_path(s: &str) -> bool {
    FILE_PATH_SHAPE.is_match(s)
}

/// Classify the primary positional token. A token shaped like a file path that
/// does not exist is rejected rather than sent to the model verbatim. An empty
/// token counts as absent.
pub fn classify(prompt: Option<&str>) -> Result<PromptSource, PromptError> {
    let Some(prompt) = prompt.filter(|p| !p.is_empty()) else {
        return Ok(PromptSource::Stdin);
    };
    if is_existing_file(prompt) {
        return Ok(PromptSource::File(PathBuf::from(prompt)));
    }
    if looks_like_file_path(prompt) {
        return Err(PromptError::MissingFile(PathBuf::from(prompt)));
    }
    Ok(PromptSource::Literal(prompt.to_string()))
}
