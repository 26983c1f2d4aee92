//! Error types for the prompt pipeline.
//!
//! Transport failures stay as `anyhow::Error`; everything the user can fix by
//! changing their input or environment is a `PromptError`.

use std::path::PathBuf;
use thiserror::Error;

/// User input error: missing file, argument mismatch, stdin reuse, bad settings.
pub const USER_ERROR: i32 = 1;

/// No API credential could be found.
pub const CREDENTIAL_ERROR: i32 = 3;

/// The completion request failed (network, HTTP status, malformed response).
pub const API_FAILURE: i32 = 4;

/// The answer could not be written to standard output.
pub const OUTPUT_ERROR: i32 = 5;

#[derive(Error, Debug)]
pub enum PromptError {
    /// The prompt looks like a file path but nothing exists there.
    #[error("file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error(
        "number of arguments ({supplied}) does not match number of variables in prompt template: {expected:?}"
    )]
    ArgumentCountMismatch {
        expected: Vec<String>,
        supplied: usize,
    },

    #[error("no API key found for {provider}; {hint}")]
    CredentialMissing { provider: String, hint: String },

    /// Standard input is a single-use stream.
    #[error("standard input was already consumed by {first_reader}; it can only be read once")]
    StdinConsumed { first_reader: String },

    /// Bad profile name, unknown provider, or an unparsable config file.
    #[error("{0}")]
    Settings(String),

    #[error("writing response")]
    Output(#[source] std::io::Error),

    #[error("reading {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PromptError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PromptError::CredentialMissing { .. } => CREDENTIAL_ERROR,
            PromptError::Output(_) => OUTPUT_ERROR,
            PromptError::MissingFile(_)
            | PromptError::ArgumentCountMismatch { .. }
            | PromptError::StdinConsumed { .. }
            | PromptError::Settings(_)
            | PromptError::Io { .. } => USER_ERROR,
        }
    }
}

/// Exit code for any error reaching the top level. Typed pipeline errors carry
/// their own code; anything else came from the completion request.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PromptError>())
        .map(PromptError::exit_code)
        .unwrap_or(API_FAILURE)
}
