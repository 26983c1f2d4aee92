use crate::error::PromptError;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub fn is_existing_file(path: &str) -> bool {
    !path.is_empty() && Path::new(path).is_file()
}

pub fn read_file_to_string(path: &Path) -> Result<String, PromptError> {
    fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Owned handle to standard input. The first `read_all` drains it; any later
/// read is an error instead of silently returning an empty string.
pub struct StdinHandle {
    reader: Option<Box<dyn Read + Send>>,
    consumed_by: Option<String>,
}

impl StdinHandle {
    pub fn from_process() -> Self {
        Self::from_reader(std::io::stdin())
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            consumed_by: None,
        }
    }

    #[cfg(test)]
    pub fn is_consumed(&self) -> bool {
        self.reader.is_none()
    }

    /// Read everything left on the stream. `purpose` is recorded so a second
    /// reader can be told who got there first.
    pub fn read_all(&mut self, purpose: &str) -> Result<String, PromptError> {
        let Some(mut reader) = self.reader.take() else {
            return Err(PromptError::StdinConsumed {
                first_reader: self.consumed_by.clone().unwrap_or_default(),
            });
        };
        self.consumed_by = Some(purpose.to_string());
        tracing::debug!(purpose, "reading standard input");
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|source| PromptError::Io {
                path: PathBuf::from("<stdin>"),
                source,
            })?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn stdin_reads_once_then_errors() {
        let mut stdin = StdinHandle::from_reader(Cursor::new("piped text\n"));
        assert!(!stdin.is_consumed());
        assert_eq!(stdin.read_all("prompt").unwrap(), "piped text\n");
        assert!(stdin.is_consumed());

        match stdin.read_all("argument 2") {
            Err(PromptError::StdinConsumed { first_reader }) => assert_eq!(first_reader, "prompt"),
            other => panic!("expected StdinConsumed, got {:?}", other),
        }
    }

    #[test]
    fn existing_file_check() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("p.txt");
        fs::write(&file, "hi").unwrap();
        assert!(is_existing_file(file.to_str().unwrap()));
        assert!(!is_existing_file(dir.path().to_str().unwrap()));
        assert!(!is_existing_file(""));
        assert_eq!(read_file_to_string(&file).unwrap(), "hi");
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = read_file_to_string(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
