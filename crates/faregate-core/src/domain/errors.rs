//! Errors - handler が返す実行エラーとその分類

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a task execution failure.
///
/// The scheduler itself never acts on the kind; it is recorded so the
/// orchestrating controller can decide whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 一時的なエラー（ネットワーク断、レート制限など）
    Transient,
    /// 恒久的なエラー（パース失敗、不正なパラメータなど）
    Permanent,
    /// Storage / warehouse / process spawning failures.
    Infrastructure,
    /// The handler panicked. Captured at the worker boundary.
    Panicked,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Infrastructure => "infrastructure",
            ErrorKind::Panicked => "panicked",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a task handler (the task execution error).
///
/// Serialized as `{ "kind": ..., "message": ... }` and stored on the task
/// record as its `error_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panicked, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = TaskError::transient("connection reset");
        assert_eq!(err.to_string(), "transient: connection reset");
    }

    #[test]
    fn serializes_as_kind_and_message() {
        let err = TaskError::infrastructure("bucket unavailable");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["kind"], "infrastructure");
        assert_eq!(v["message"], "bucket unavailable");
    }
}
