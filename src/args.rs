use crate::error::PromptError;
use crate::io::{StdinHandle, is_existing_file, read_file_to_string};
use std::path::Path;

/// Argument value meaning "read this one from standard input".
pub const STDIN_SENTINEL: &str = "-";

/// Bind positional `args` to template `variables`, producing one value per
/// variable. A one-variable template with no arguments takes all of stdin.
pub fn resolve_arguments(
    variables: &[String],
    args: &[String],
    stdin: &mut StdinHandle,
) -> Result<Vec<String>, PromptError> {
    if args.is_empty() && variables.len() == 1 {
        let purpose = format!("template variable '{}'", variables[0]);
        return Ok(vec![stdin.read_all(&purpose)?]);
    }
    if args.len() != variables.len() {
        return Err(PromptError::ArgumentCountMismatch {
            expected: variables.to_vec(),
            supplied: args.len(),
        });
    }
    args.iter()
        .enumerate()
        .map(|(idx, arg)| expand_argument(idx, arg, stdin))
        .collect()
}

/// An argument naming an existing file becomes that file's contents; the
/// sentinel becomes stdin; anything else is used as typed.
fn expand_argument(idx: usize, arg: &str, stdin: &mut StdinHandle) -> Result<String, PromptError> {
    if is_existing_file(arg) {
        tracing::debug!(position = idx + 1, path = arg, "expanding argument from file");
        return read_file_to_string(Path::new(arg));
    }
    if arg == STDIN_SENTINEL {
        return stdin.read_all(&format!("argument {}", idx + 1));
    }
    Ok(arg.to_string())
}
