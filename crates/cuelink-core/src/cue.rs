//! Cue model.
//!
//! A [`Cue`] is one child of the main cue list, exactly as the server
//! reported it. Optional fields stay `None` when the reply omitted them;
//! defaults are only applied when a cue is displayed.

use serde::{Deserialize, Serialize};

/// Name displayed for cues without one.
pub const UNTITLED: &str = "Untitled";

/// A single cue from the main cue list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Server-assigned unique id.
    pub id: String,
    /// Cue number as typed by the operator (free text, may be absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Cue name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Cue type, e.g. `Audio`, `Group`, `Memo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Operator notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Cue {
    /// Creates a cue with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number: None,
            name: None,
            kind: None,
            notes: None,
        }
    }

    /// Builder: set the cue number.
    #[must_use]
    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    /// Builder: set the cue name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the cue type.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Builder: set the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Returns the cue number, or an empty string.
    pub fn number(&self) -> &str {
        self.number.as_deref().unwrap_or_default()
    }

    /// Returns the cue name, or [`UNTITLED`] when absent. A name QLab
    /// reports as blank is kept as is.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNTITLED)
    }

    /// Returns the cue type, or an empty string.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    /// Returns the notes, or an empty string.
    pub fn notes(&self) -> &str {
        self.notes.as_deref().unwrap_or_default()
    }

    /// Label used in playback snapshots: `"<number> - <name>"`, or just the
    /// name for unnumbered cues.
    pub fn display_label(&self) -> String {
        let number = self.number().trim();
        if number.is_empty() {
            self.name().to_string()
        } else {
            format!("{} - {}", number, self.name())
        }
    }
}
