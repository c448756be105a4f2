//! The note entity and its derived identifier.
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Represents a single note in our system
///
/// Notes are full-replace documents: every save overwrites the record keyed
/// by [`Note::id`]; there is no field-level patching. Unknown fields in a
/// stored record are ignored on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Note body, free-form; must be non-empty to be saved
    pub text: String,
    /// Creation time in milliseconds since the epoch; never changed on edit
    pub date_created: i64,
    /// Name of the color tag, or None/empty for the default
    #[serde(default)]
    pub color: Option<String>,
}

impl Note {
    /// Creates a new note stamped with the current time
    pub fn new(text: String, color: Option<String>) -> Self {
        Note {
            text,
            date_created: Utc::now().timestamp_millis(),
            color,
        }
    }

    /// The note's identifier, derived from its creation timestamp.
    ///
    /// Two notes created in the same millisecond by the same user share an
    /// id and the later write replaces the earlier one. Known limitation of
    /// the id scheme; the path layout pins it.
    pub fn id(&self) -> String {
        self.date_created.to_string()
    }

    /// Validity rule for the note body: at least one character.
    pub fn text_is_valid(text: &str) -> bool {
        !text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_decimal_form_of_creation_time() {
        let note = Note {
            text: "Buy milk".to_string(),
            date_created: 1487654321000,
            color: None,
        };
        assert_eq!(note.id(), "1487654321000");
    }

    #[test]
    fn ids_collide_for_equal_creation_times() {
        let a = Note {
            text: "first".to_string(),
            date_created: 42,
            color: None,
        };
        let b = Note {
            text: "second".to_string(),
            date_created: 42,
            color: Some("red".to_string()),
        };
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn text_validity() {
        assert!(!Note::text_is_valid(""));
        assert!(Note::text_is_valid("a"));
        assert!(Note::text_is_valid(" "));
    }

    #[test]
    fn record_without_color_field_deserializes() {
        let note: Note =
            serde_json::from_str(r#"{"text":"Buy milk","date_created":1487654321000}"#)
                .expect("record without color should parse");
        assert_eq!(note.color, None);
        assert_eq!(note.text, "Buy milk");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let note: Note = serde_json::from_str(
            r#"{"text":"x","date_created":1,"color":"blue","extra":"ignored"}"#,
        )
        .expect("extra fields should be ignored");
        assert_eq!(note.color.as_deref(), Some("blue"));
    }
}
