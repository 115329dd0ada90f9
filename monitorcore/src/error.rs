//! Error types for the relay pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Number of characters kept from each end of a rejected frame.
const EXCERPT_CHARS: usize = 100;

/// Errors raised while launching the producer process.
///
/// A launch error is fatal for the pipeline instance that hit it; nothing
/// retries the launch.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The executable does not exist.
    #[error("producer executable not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The operating system refused to create the process.
    #[error("failed to spawn producer {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An output stream was not captured as a pipe, or was already taken.
    #[error("producer {0} is not available as a pipe")]
    MissingPipe(&'static str),
}

/// A discarded assembly attempt.
///
/// These are expected in steady-state operation (a frame truncated by the
/// producer exiting, stray output between frames) and never stop the pipeline.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The balanced buffer was not a valid structured record.
    #[error("malformed frame ({length} bytes): {source}")]
    Malformed {
        length: usize,
        head: String,
        tail: String,
        #[source]
        source: serde_json::Error,
    },

    /// More closing braces than opening braces were seen.
    #[error("unbalanced closing brace, {length} bytes discarded")]
    Unbalanced { length: usize },

    /// The buffer grew past the configured frame limit.
    #[error("frame exceeded {limit} bytes, {length} bytes discarded")]
    Oversized { length: usize, limit: usize },
}

impl DecodeError {
    pub(crate) fn malformed(text: &str, source: serde_json::Error) -> Self {
        DecodeError::Malformed {
            length: text.len(),
            head: text.chars().take(EXCERPT_CHARS).collect(),
            tail: tail_chars(text, EXCERPT_CHARS),
            source,
        }
    }

    /// Number of buffered bytes thrown away by this attempt.
    pub fn discarded_bytes(&self) -> usize {
        match self {
            DecodeError::Malformed { length, .. }
            | DecodeError::Unbalanced { length }
            | DecodeError::Oversized { length, .. } => *length,
        }
    }
}

fn tail_chars(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}

/// A failure delivering a snapshot to one subscriber.
///
/// Delivery failures never leave the broadcaster; the failing subscriber is
/// unregistered and everyone else keeps receiving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The receiving side has gone away.
    #[error("subscriber disconnected")]
    Disconnected,

    /// The sink reported a transport failure.
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Errors raised while loading settings or locating the producer.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// An explicitly configured producer path does not exist.
    #[error("configured producer does not exist: {}", .0.display())]
    MissingProducer(PathBuf),

    /// None of the candidate locations holds an executable.
    #[error("producer executable not found (searched: {})", display_paths(searched))]
    ProducerNotFound { searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no candidate paths".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Top-level error for operations that span several components.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_keeps_head_and_tail() {
        let text = format!("{{{}}}", "x".repeat(500));
        let source = serde_json::from_str::<serde_json::Value>(&text).unwrap_err();
        let err = DecodeError::malformed(&text, source);

        match err {
            DecodeError::Malformed {
                length, head, tail, ..
            } => {
                assert_eq!(length, 502);
                assert_eq!(head.chars().count(), 100);
                assert!(head.starts_with('{'));
                assert_eq!(tail.chars().count(), 100);
                assert!(tail.ends_with('}'));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_short_frame_excerpts_are_whole() {
        let source = serde_json::from_str::<serde_json::Value>("{x}").unwrap_err();
        let err = DecodeError::malformed("{x}", source);
        if let DecodeError::Malformed { head, tail, .. } = &err {
            assert_eq!(head, "{x}");
            assert_eq!(tail, "{x}");
        }
        assert_eq!(err.discarded_bytes(), 3);
    }

    #[test]
    fn test_not_found_message_lists_searched_paths() {
        let err = SettingsError::ProducerNotFound {
            searched: vec![PathBuf::from("a/monitor"), PathBuf::from("b/monitor")],
        };
        assert_eq!(
            err.to_string(),
            "producer executable not found (searched: a/monitor, b/monitor)"
        );
    }

    #[test]
    fn test_launch_error_converts_to_error() {
        let err: Error = LaunchError::NotFound(PathBuf::from("/nope")).into();
        assert_eq!(err.to_string(), "producer executable not found: /nope");
    }
}
