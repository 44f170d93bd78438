//! 游戏错误处理模块
//!
//! Content and resource failures that abort level construction or startup.
//! Gameplay no-ops (blocked moves, unready upgrades) are not errors and never
//! show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the process boundary
#[derive(Debug, Error)]
pub enum GameError {
    /// A content file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A content file was read but is not valid JSON for its schema
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The requested level number has no content
    #[error("level {0} does not exist")]
    MissingLevel(u32),

    /// Structurally valid content that violates a content rule
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Terminal setup or drawing failed
    #[error("terminal error: {0}")]
    Terminal(String),
}

impl GameError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GameError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        GameError::Parse {
            path: path.into(),
            source,
        }
    }
}

/// 处理游戏错误并转换为用户友好的消息
pub fn handle_error(error: &GameError) -> String {
    match error {
        GameError::Io { path, source } => match source.kind() {
            std::io::ErrorKind::NotFound => {
                format!("Missing game data: {} was not found", path.display())
            }
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied while reading {}", path.display())
            }
            _ => format!("Could not read {}: {}", path.display(), source),
        },
        GameError::Parse { path, source } => format!(
            "Game data in {} is corrupted (line {}, column {})",
            path.display(),
            source.line(),
            source.column()
        ),
        GameError::MissingLevel(n) => format!("Level {} could not be found", n),
        GameError::InvalidContent(_) | GameError::Terminal(_) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_message_names_path() {
        let err = GameError::io(
            "data/levels/level9.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = handle_error(&err);
        assert!(msg.contains("level9.json"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_parse_error_reports_position() {
        let source = serde_json::from_str::<serde_json::Value>("{\n  oops").unwrap_err();
        let err = GameError::parse("characters.json", source);
        let msg = handle_error(&err);
        assert!(msg.contains("characters.json"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn test_other_errors_use_display() {
        let err = GameError::InvalidContent("ring is empty".to_string());
        assert_eq!(handle_error(&err), "invalid content: ring is empty");
    }
}
