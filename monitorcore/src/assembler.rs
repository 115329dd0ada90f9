//! Frame assembler.
//!
//! Rebuilds complete records from a line stream where a record may span any
//! number of lines and line boundaries carry no meaning.
//!
//! Frame completion is detected by lexical brace counting: every `{` adds one
//! to the depth, every `}` subtracts one, wherever it appears. Braces inside
//! quoted strings are counted too, so a record such as `{"s":"{"}` leaves the
//! depth at one and holds the buffer open until something closes it. That
//! behavior is relied on downstream and is kept as is.
//!
//! ```text
//!   line ──▶ depth += count('{') - count('}') ──▶ buffer += line
//!                                                     │
//!                     depth == 0 && trimmed starts '{' ends '}' ?
//!                        │ yes                          │ no
//!                        ▼                              ▼
//!                   decode buffer                 keep accumulating
//!                 ok │        │ err
//!                    ▼        ▼
//!               emit+reset  discard+reset
//! ```

use crate::error::DecodeError;
use crate::snapshot::Snapshot;

/// Default upper bound on buffered frame text.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Observable assembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Buffer empty, depth zero.
    Idle,
    /// A frame is partially buffered.
    Accumulating,
}

/// Incremental frame assembler.
///
/// Owned by a single drain loop; it needs no synchronization.
///
/// # Example
///
/// ```rust
/// use monitorcore::FrameAssembler;
///
/// let mut assembler = FrameAssembler::new();
/// assert!(assembler.push_line(r#"{"cpu":"#).is_none());
///
/// let snapshot = assembler.push_line(r#"{"usage":50}}"#).unwrap().unwrap();
/// assert_eq!(snapshot.get("cpu").unwrap()["usage"], 50);
/// ```
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: String,
    depth: i64,
    max_frame_bytes: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an idle assembler with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create an idle assembler that discards frames larger than `limit` bytes.
    pub fn with_max_frame_bytes(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            depth: 0,
            max_frame_bytes: limit.max(1),
        }
    }

    /// Feed one line (without its terminator).
    ///
    /// Returns `None` while the frame is incomplete, `Some(Ok(_))` when a
    /// record was decoded and `Some(Err(_))` when an attempt was discarded.
    /// The assembler is idle again after any `Some`.
    pub fn push_line(&mut self, line: &str) -> Option<Result<Snapshot, DecodeError>> {
        self.depth += brace_delta(line);
        self.buffer.push_str(line);

        if self.depth < 0 {
            let length = self.buffer.len();
            self.reset();
            return Some(Err(DecodeError::Unbalanced { length }));
        }

        if self.depth == 0 {
            let trimmed = self.buffer.trim();
            // Depth zero with the wrong shape may still resolve later, so
            // only an attempted decode resets the buffer.
            if !trimmed.is_empty() && trimmed.starts_with('{') && trimmed.ends_with('}') {
                let outcome =
                    Snapshot::decode(trimmed).map_err(|source| DecodeError::malformed(trimmed, source));
                self.reset();
                return Some(outcome);
            }
        }

        if self.buffer.len() > self.max_frame_bytes {
            let length = self.buffer.len();
            self.reset();
            return Some(Err(DecodeError::Oversized {
                length,
                limit: self.max_frame_bytes,
            }));
        }

        None
    }

    /// Discard whatever is buffered, returning the number of bytes dropped.
    ///
    /// Called when the line stream ends; an incomplete tail is not an error.
    pub fn finish(&mut self) -> usize {
        let length = self.buffer.len();
        self.reset();
        length
    }

    /// Current brace depth.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Text buffered so far.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Largest frame kept before the buffer is discarded.
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// `Idle` when nothing is buffered and the depth is zero, otherwise
    /// `Accumulating`.
    pub fn state(&self) -> AssemblerState {
        if self.buffer.is_empty() && self.depth == 0 {
            AssemblerState::Idle
        } else {
            AssemblerState::Accumulating
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.depth = 0;
    }
}

fn brace_delta(line: &str) -> i64 {
    line.bytes().fold(0, |depth, b| match b {
        b'{' => depth + 1,
        b'}' => depth - 1,
        _ => depth,
    })
}
