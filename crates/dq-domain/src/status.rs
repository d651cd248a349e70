//! Status vocabularies and the canonical normaliser
//!
//! Tasks and backlog items are served by resources that disagree on status
//! names. Every status is folded into [`CanonicalStatus`] at the boundary:
//! - Task vocabulary (already canonical)
//! - Backlog item vocabulary (Spanish names, see [`BacklogStatus`])
//! - A handful of historical spellings still present in old records
//!
//! Unrecognised strings are never rejected. They are carried verbatim in
//! [`Status::Unrecognized`] so rendering keeps working on unexpected input.

use crate::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The five workflow states every task status is normalised into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    /// Not started
    Todo,
    /// Being worked on
    InProgress,
    /// Awaiting review
    CodeReview,
    /// Under test
    Testing,
    /// Finished
    Done,
}

impl CanonicalStatus {
    /// All canonical values, in workflow order
    pub const ALL: [Self; 5] = [
        Self::Todo,
        Self::InProgress,
        Self::CodeReview,
        Self::Testing,
        Self::Done,
    ];

    /// Wire name of the status
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::CodeReview => "code_review",
            Self::Testing => "testing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalStatus {
    type Err = DomainError;

    /// Strict parse: accepts any known vocabulary, rejects everything else
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s).ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// Status vocabulary used by backlog items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogStatus {
    /// Pending
    Pendiente,
    /// In progress
    EnProgreso,
    /// In review
    EnRevision,
    /// In testing
    EnPruebas,
    /// Completed
    Completado,
}

impl BacklogStatus {
    /// Wire name of the status
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::EnProgreso => "en_progreso",
            Self::EnRevision => "en_revision",
            Self::EnPruebas => "en_pruebas",
            Self::Completado => "completado",
        }
    }
}

impl From<BacklogStatus> for CanonicalStatus {
    fn from(status: BacklogStatus) -> Self {
        match status {
            BacklogStatus::Pendiente => Self::Todo,
            BacklogStatus::EnProgreso => Self::InProgress,
            BacklogStatus::EnRevision => Self::CodeReview,
            BacklogStatus::EnPruebas => Self::Testing,
            BacklogStatus::Completado => Self::Done,
        }
    }
}

impl From<CanonicalStatus> for BacklogStatus {
    fn from(status: CanonicalStatus) -> Self {
        match status {
            CanonicalStatus::Todo => Self::Pendiente,
            CanonicalStatus::InProgress => Self::EnProgreso,
            CanonicalStatus::CodeReview => Self::EnRevision,
            CanonicalStatus::Testing => Self::EnPruebas,
            CanonicalStatus::Done => Self::Completado,
        }
    }
}

/// Exact-match mapping from every known spelling to its canonical value
const STATUS_TABLE: &[(&str, CanonicalStatus)] = &[
    // Task vocabulary
    ("todo", CanonicalStatus::Todo),
    ("in_progress", CanonicalStatus::InProgress),
    ("code_review", CanonicalStatus::CodeReview),
    ("testing", CanonicalStatus::Testing),
    ("done", CanonicalStatus::Done),
    // Backlog item vocabulary
    ("pendiente", CanonicalStatus::Todo),
    ("en_progreso", CanonicalStatus::InProgress),
    ("en_revision", CanonicalStatus::CodeReview),
    ("en_pruebas", CanonicalStatus::Testing),
    ("completado", CanonicalStatus::Done),
    // Historical variants
    ("pending", CanonicalStatus::Todo),
    ("por_hacer", CanonicalStatus::Todo),
    ("in-progress", CanonicalStatus::InProgress),
    ("inprogress", CanonicalStatus::InProgress),
    ("review", CanonicalStatus::CodeReview),
    ("code-review", CanonicalStatus::CodeReview),
    ("revision", CanonicalStatus::CodeReview),
    ("qa", CanonicalStatus::Testing),
    ("pruebas", CanonicalStatus::Testing),
    ("completed", CanonicalStatus::Done),
    ("terminado", CanonicalStatus::Done),
];

/// Look up a raw status in the mapping table
#[inline]
#[must_use]
pub fn lookup(raw: &str) -> Option<CanonicalStatus> {
    STATUS_TABLE
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, status)| *status)
}

/// Normalise a raw status string
///
/// Known spellings map to [`Status::Known`]. Anything else passes through
/// unchanged as [`Status::Unrecognized`] and is logged; this never fails.
#[must_use]
pub fn normalize(raw: &str) -> Status {
    resolve(raw, "unspecified")
}

/// Shared body of [`normalize`] and [`SourceStatus::normalize`]
fn resolve(raw: &str, source: &'static str) -> Status {
    match lookup(raw) {
        Some(status) => Status::Known(status),
        None => {
            tracing::warn!(source, status = raw, "unrecognized status passed through");
            Status::Unrecognized(raw.to_string())
        }
    }
}

/// Raw status tagged with the resource it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus<'a> {
    /// Value read from a task resource
    Task(&'a str),
    /// Value read from a backlog item resource
    BacklogItem(&'a str),
}

impl SourceStatus<'_> {
    /// Normalise into the task vocabulary
    #[must_use]
    pub fn normalize(self) -> Status {
        match self {
            Self::Task(raw) => resolve(raw, "task"),
            Self::BacklogItem(raw) => resolve(raw, "backlog_item"),
        }
    }
}

/// A normalised status value
///
/// Serialises as its wire string; deserialisation runs through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// One of the canonical values
    Known(CanonicalStatus),
    /// A value no vocabulary recognises, kept verbatim
    Unrecognized(String),
}

impl Status {
    /// Wire representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(status) => status.as_str(),
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Canonical value, if recognised
    #[inline]
    #[must_use]
    pub fn canonical(&self) -> Option<CanonicalStatus> {
        match self {
            Self::Known(status) => Some(*status),
            Self::Unrecognized(_) => None,
        }
    }

    /// Check against a canonical value
    #[inline]
    #[must_use]
    pub fn is(&self, status: CanonicalStatus) -> bool {
        self.canonical() == Some(status)
    }
}

impl From<CanonicalStatus> for Status {
    fn from(status: CanonicalStatus) -> Self {
        Self::Known(status)
    }
}

impl From<BacklogStatus> for Status {
    fn from(status: BacklogStatus) -> Self {
        Self::Known(status.into())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(normalize(&raw))
    }
}
