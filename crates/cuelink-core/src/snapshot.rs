//! Playback snapshot derived from the cue table.
//!
//! [`CurrentCueInfo`] is recomputed from scratch on every read; the
//! neighbours of the current cue are defined by index adjacency in the
//! server-reported cue order, never by cue numbers.

use std::fmt;

use serde::Serialize;

use crate::cue::Cue;

/// Text rendered for an empty snapshot slot.
pub const NONE_SENTINEL: &str = "---";

/// What is playing, and what surrounds it.
///
/// Each slot holds the display label of a cue, or `None` when there is no
/// cue at that position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurrentCueInfo {
    /// Two cues before the current one.
    pub previous2: Option<String>,
    /// The cue before the current one.
    pub previous: Option<String>,
    /// The cue at the playback position.
    pub current: Option<String>,
    /// The cue after the current one.
    pub next: Option<String>,
    /// Two cues after the current one.
    pub next2: Option<String>,
    /// Notes of the current cue, empty when there are none.
    pub notes: String,
}

impl CurrentCueInfo {
    /// Builds a snapshot for `current_id` within `cues`.
    ///
    /// An absent, empty or unknown id yields an empty snapshot.
    pub fn from_cues(cues: &[Cue], current_id: Option<&str>) -> Self {
        let Some(index) = current_id
            .filter(|id| !id.is_empty())
            .and_then(|id| cues.iter().position(|cue| cue.id == id))
        else {
            return Self::default();
        };

        let label = |offset: isize| {
            index
                .checked_add_signed(offset)
                .and_then(|i| cues.get(i))
                .map(Cue::display_label)
        };

        Self {
            previous2: label(-2),
            previous: label(-1),
            current: label(0),
            next: label(1),
            next2: label(2),
            notes: cues[index].notes().to_string(),
        }
    }

    /// Returns true when no cue matched the playback position.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Returns the slot text, substituting [`NONE_SENTINEL`].
    pub fn slot(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or(NONE_SENTINEL)
    }
}

impl fmt::Display for CurrentCueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    {}", Self::slot(&self.previous2))?;
        writeln!(f, "    {}", Self::slot(&self.previous))?;
        writeln!(f, "  > {}", Self::slot(&self.current))?;
        writeln!(f, "    {}", Self::slot(&self.next))?;
        write!(f, "    {}", Self::slot(&self.next2))?;
        if !self.notes.is_empty() {
            write!(f, "\n\n{}", self.notes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues() -> Vec<Cue> {
        vec![
            Cue::new("a").with_number("1").with_name("Intro"),
            Cue::new("b")
                .with_number("2")
                .with_name("Blackout")
                .with_notes("Wait for applause"),
            Cue::new("c").with_number("3").with_name("Walk-in music"),
        ]
    }

    #[test]
    fn middle_cue_has_both_neighbours() {
        let info = CurrentCueInfo::from_cues(&cues(), Some("b"));
        assert_eq!(info.previous.as_deref(), Some("1 - Intro"));
        assert_eq!(info.current.as_deref(), Some("2 - Blackout"));
        assert_eq!(info.next.as_deref(), Some("3 - Walk-in music"));
        assert_eq!(info.previous2, None);
        assert_eq!(info.next2, None);
        assert_eq!(info.notes, "Wait for applause");
    }

    #[test]
    fn first_and_last_cues_use_sentinel() {
        let cues = cues();

        let first = CurrentCueInfo::from_cues(&cues, Some("a"));
        assert_eq!(CurrentCueInfo::slot(&first.previous), NONE_SENTINEL);
        assert_eq!(first.next.as_deref(), Some("2 - Blackout"));
        assert_eq!(first.next2.as_deref(), Some("3 - Walk-in music"));

        let last = CurrentCueInfo::from_cues(&cues, Some("c"));
        assert_eq!(last.previous2.as_deref(), Some("1 - Intro"));
        assert_eq!(CurrentCueInfo::slot(&last.next), NONE_SENTINEL);
        assert!(last.notes.is_empty());
    }

    #[test]
    fn unknown_or_missing_id_is_empty() {
        let cues = cues();
        for id in [None, Some(""), Some("zzz")] {
            let info = CurrentCueInfo::from_cues(&cues, id);
            assert!(info.is_empty());
            assert_eq!(info, CurrentCueInfo::default());
        }
    }

    #[test]
    fn empty_cue_table_is_empty() {
        let info = CurrentCueInfo::from_cues(&[], Some("a"));
        assert!(info.is_empty());
        assert!(info.notes.is_empty());
    }

    #[test]
    fn adjacency_follows_order_not_numbers() {
        let cues = vec![
            Cue::new("x").with_number("10"),
            Cue::new("y").with_number("2"),
            Cue::new("z").with_number("7"),
        ];
        let info = CurrentCueInfo::from_cues(&cues, Some("y"));
        assert_eq!(info.previous.as_deref(), Some("10 - Untitled"));
        assert_eq!(info.next.as_deref(), Some("7 - Untitled"));
    }

    #[test]
    fn display_renders_sentinels() {
        let info = CurrentCueInfo::from_cues(&cues(), Some("a"));
        let text = info.to_string();
        assert_eq!(
            text,
            "    ---\n    ---\n  > 1 - Intro\n    2 - Blackout\n    3 - Walk-in music"
        );
    }

    #[test]
    fn json_shape() {
        let info = CurrentCueInfo::from_cues(&cues(), Some("b"));
        insta::assert_json_snapshot!(info, @r#"
        {
          "previous2": null,
          "previous": "1 - Intro",
          "current": "2 - Blackout",
          "next": "3 - Walk-in music",
          "next2": null,
          "notes": "Wait for applause"
        }
        "#);
    }
}
