#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline messages, ingestion results, and progress reporting.

pub mod progress;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Kind of a pipeline message. String forms match the `message_type` field
/// on the wire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    TrackPointsSaved,
    TrackIngested,
    IndexesCalculated,
    BadgesUpdated,
    Unknown,
}

impl MessageType {
    /// Message published once the stage triggered by `self` succeeds.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::TrackPointsSaved => Some(Self::TrackIngested),
            Self::TrackIngested => Some(Self::IndexesCalculated),
            Self::IndexesCalculated => Some(Self::BadgesUpdated),
            Self::BadgesUpdated | Self::Unknown => None,
        }
    }
}

/// A message exchanged between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Message {
    /// A telemetry file has been uploaded.
    TrackPointsSaved {
        bucket_name: String,
        object_key: String,
    },
    /// A track has been stored.
    TrackIngested { track_id: i64 },
    /// Indexes of a track have been calculated.
    IndexesCalculated { track_id: i64 },
    /// Badges of the track owner have been re-evaluated.
    BadgesUpdated { track_id: i64 },
    #[serde(other)]
    Unknown,
}

impl Message {
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::TrackPointsSaved { .. } => MessageType::TrackPointsSaved,
            Self::TrackIngested { .. } => MessageType::TrackIngested,
            Self::IndexesCalculated { .. } => MessageType::IndexesCalculated,
            Self::BadgesUpdated { .. } => MessageType::BadgesUpdated,
            Self::Unknown => MessageType::Unknown,
        }
    }

    #[must_use]
    pub const fn track_id(&self) -> Option<i64> {
        match self {
            Self::TrackIngested { track_id }
            | Self::IndexesCalculated { track_id }
            | Self::BadgesUpdated { track_id } => Some(*track_id),
            Self::TrackPointsSaved { .. } | Self::Unknown => None,
        }
    }

    /// Human-readable `key: value` rendering, for plain-text transports.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::TrackPointsSaved {
                bucket_name,
                object_key,
            } => format!(
                "message_type: {}, bucket_name: {bucket_name}, object_key: {object_key}",
                self.message_type()
            ),
            Self::TrackIngested { track_id }
            | Self::IndexesCalculated { track_id }
            | Self::BadgesUpdated { track_id } => {
                format!("message_type: {}, track_id: {track_id}", self.message_type())
            }
            Self::Unknown => format!("message_type: {}", self.message_type()),
        }
    }
}

/// Result of ingesting one telemetry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub track_id: i64,
    pub is_valid: bool,
    pub segments: usize,
    pub points: usize,
    /// Validation error summary; empty for valid tracks.
    pub validation_error: String,
}

/// What happened to one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Processed into a valid track.
    Valid {
        segments: usize,
        points: usize,
        track_id: Option<i64>,
    },
    /// Processed, but at least one segment failed validation.
    Invalid {
        segments: usize,
        points: usize,
        track_id: Option<i64>,
        validation_error: String,
    },
    /// Processing aborted.
    Failed { message: String },
}

impl FileStatus {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        !matches!(self, Self::Valid { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_files: usize,
    /// Files that failed or produced an invalid track.
    pub files_with_errors: usize,
    /// Per-file outcomes, sorted by path.
    pub outcomes: Vec<FileOutcome>,
    pub duration: Duration,
}

impl BatchResult {
    /// Builds the summary, sorting outcomes by path.
    #[must_use]
    pub fn new(mut outcomes: Vec<FileOutcome>, duration: Duration) -> Self {
        outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            total_files: outcomes.len(),
            files_with_errors: outcomes.iter().filter(|o| o.status.is_error()).count(),
            outcomes,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_their_type_tag() {
        let json = serde_json::to_value(Message::TrackIngested { track_id: 12 }).unwrap();
        assert_eq!(json["message_type"], "track_ingested");
        assert_eq!(json["track_id"], 12);
    }

    #[test]
    fn unknown_message_types_parse_as_unknown() {
        let message: Message =
            serde_json::from_str(r#"{"message_type": "track_deleted", "track_id": 1}"#).unwrap();
        assert_eq!(message, Message::Unknown);
        assert_eq!(message.message_type().next(), None);
    }

    #[test]
    fn stages_chain_in_order() {
        let mut chain = vec![MessageType::TrackPointsSaved];
        while let Some(next) = chain.last().and_then(|t| t.next()) {
            chain.push(next);
        }
        assert_eq!(
            chain,
            [
                MessageType::TrackPointsSaved,
                MessageType::TrackIngested,
                MessageType::IndexesCalculated,
                MessageType::BadgesUpdated,
            ]
        );
    }

    #[test]
    fn batch_counts_invalid_and_failed_files() {
        let outcome = |path: &str, status| FileOutcome {
            path: PathBuf::from(path),
            status,
        };
        let result = BatchResult::new(
            vec![
                outcome(
                    "b.csv",
                    FileStatus::Failed {
                        message: "no points".to_string(),
                    },
                ),
                outcome(
                    "a.csv",
                    FileStatus::Valid {
                        segments: 2,
                        points: 40,
                        track_id: None,
                    },
                ),
                outcome(
                    "c.csv",
                    FileStatus::Invalid {
                        segments: 1,
                        points: 10,
                        track_id: None,
                        validation_error: "speed_too_high".to_string(),
                    },
                ),
            ],
            Duration::from_secs(1),
        );
        assert_eq!(result.total_files, 3);
        assert_eq!(result.files_with_errors, 2);
        assert_eq!(result.outcomes[0].path, PathBuf::from("a.csv"));
    }
}
