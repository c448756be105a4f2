//! The note editor: a two-mode state machine over one note.
//!
//! The mode is chosen at entry and fixed for the editor's lifetime: create
//! starts from an empty note, edit loads an existing one by id. Every text
//! change recomputes save enablement immediately; save writes a full-replace
//! revision keyed by the derived id and reports the write's outcome.

use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::{
    tint_for, CkError, Note, NoteCollection, NoteColor, RemoteConfig, Result, UserId,
    COLOR_PICKER_ENABLED,
};

/// Which entry point the editor was opened through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit,
}

/// Editor over a single note of one user.
pub struct NoteEditor<'a> {
    collection: &'a NoteCollection,
    user: UserId,
    flags: Arc<Mutex<RemoteConfig>>,

    /// The loaded note in edit mode; None in create mode
    existing: Option<Note>,

    text: String,
    color: Option<String>,
}

impl<'a> NoteEditor<'a> {
    /// Opens the editor in create mode: empty text, default color, save
    /// disabled.
    pub fn create(
        collection: &'a NoteCollection,
        user: UserId,
        flags: Arc<Mutex<RemoteConfig>>,
    ) -> Self {
        debug!("Editor opened in create mode for {}", user);
        Self {
            collection,
            user,
            flags,
            existing: None,
            text: String::new(),
            color: None,
        }
    }

    /// Opens the editor in edit mode, loading the note by id.
    pub fn edit(
        collection: &'a NoteCollection,
        user: UserId,
        note_id: &str,
        flags: Arc<Mutex<RemoteConfig>>,
    ) -> Result<Self> {
        let note = collection.get_once(&user, note_id)?;
        debug!("Editor opened in edit mode for note {}", note_id);
        Ok(Self {
            collection,
            user,
            flags,
            text: note.text.clone(),
            color: note.color.clone(),
            existing: Some(note),
        })
    }

    pub fn mode(&self) -> EditorMode {
        if self.existing.is_some() {
            EditorMode::Edit
        } else {
            EditorMode::Create
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the note text. Save enablement reflects the new text
    /// immediately, not on focus change.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        debug!("Validity: {}", self.save_enabled());
    }

    /// Whether the save action is currently enabled.
    pub fn save_enabled(&self) -> bool {
        Note::text_is_valid(&self.text)
    }

    /// Whether the color input should be offered at all.
    pub fn color_picker_enabled(&self) -> bool {
        self.flags
            .lock()
            .map(|flags| flags.get_boolean(COLOR_PICKER_ENABLED))
            .unwrap_or(false)
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Selects a color tag, validating the name against the palette.
    /// Returns the resolved color so the caller can update its tint preview.
    pub fn set_color(&mut self, name: &str) -> Result<NoteColor> {
        let resolved = NoteColor::resolve(Some(name))?;
        self.color = Some(name.to_string());
        Ok(resolved)
    }

    /// The tint currently previewed, with the default fallback for records
    /// whose stored name no longer resolves.
    pub fn tint_preview(&self) -> NoteColor {
        tint_for(&Note {
            text: self.text.clone(),
            date_created: 0,
            color: self.color.clone(),
        })
    }

    /// Saves the note: constructs it in create mode, mutates it in place in
    /// edit mode (preserving `date_created` and thus the id), then submits
    /// the full-replace write and reports its outcome.
    pub fn save(&mut self) -> Result<Note> {
        if !self.save_enabled() {
            return Err(CkError::InvalidNote {
                message: "Note text must not be empty".to_string(),
            });
        }

        let note = match self.existing.take() {
            Some(mut note) => {
                note.text = self.text.clone();
                note.color = self.color.clone();
                note
            }
            None => Note::new(self.text.clone(), self.color.clone()),
        };

        self.collection.set(&self.user, &note)?;
        info!("Saved note {}", note.id());

        self.existing = Some(note.clone());
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn setup(dir: &std::path::Path) -> (NoteCollection, Arc<Mutex<RemoteConfig>>) {
        let config = Config {
            data_dir: dir.to_path_buf(),
            developer_mode: true,
            flags_source: None,
            editor_command: None,
            auto_sign_in: None,
        };
        (
            NoteCollection::new(&config),
            Arc::new(Mutex::new(RemoteConfig::new(&config))),
        )
    }

    #[test]
    fn create_mode_starts_with_save_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        let editor = NoteEditor::create(&collection, UserId("alice".to_string()), flags);

        assert_eq!(editor.mode(), EditorMode::Create);
        assert_eq!(editor.text(), "");
        assert_eq!(editor.color(), None);
        assert!(!editor.save_enabled());
    }

    #[test]
    fn save_enablement_tracks_every_text_change() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        let mut editor = NoteEditor::create(&collection, UserId("alice".to_string()), flags);

        editor.set_text("A");
        assert!(editor.save_enabled());
        // Clearing the text disables save right away, no blur required
        editor.set_text("");
        assert!(!editor.save_enabled());
    }

    #[test]
    fn saving_an_empty_note_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        let mut editor = NoteEditor::create(&collection, UserId("alice".to_string()), flags);

        assert!(matches!(editor.save(), Err(CkError::InvalidNote { .. })));
    }

    #[test]
    fn create_saves_a_record_with_unset_color() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        let user = UserId("alice".to_string());
        let mut editor = NoteEditor::create(&collection, user.clone(), flags);

        editor.set_text("Buy milk");
        let saved = editor.save().unwrap();

        assert_eq!(saved.text, "Buy milk");
        assert_eq!(saved.color, None);
        assert_eq!(saved.id(), saved.date_created.to_string());
        // The record round-trips with the color still unset, so it renders
        // with the default tint whenever the flag is later enabled
        let read = collection.get_once(&user, &saved.id()).unwrap();
        assert_eq!(read.color, None);
        assert_eq!(tint_for(&read), NoteColor::Default);
    }

    #[test]
    fn edit_mode_loads_and_preserves_creation_time() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        let user = UserId("alice".to_string());

        let original = Note {
            text: "old text".to_string(),
            date_created: 1487654321000,
            color: Some("blue".to_string()),
        };
        collection.set(&user, &original).unwrap();

        let mut editor =
            NoteEditor::edit(&collection, user.clone(), "1487654321000", flags).unwrap();
        assert_eq!(editor.mode(), EditorMode::Edit);
        assert_eq!(editor.text(), "old text");
        assert_eq!(editor.color(), Some("blue"));
        assert!(editor.save_enabled());

        editor.set_text("new text");
        let saved = editor.save().unwrap();
        assert_eq!(saved.date_created, 1487654321000);
        assert_eq!(saved.id(), "1487654321000");
        assert_eq!(collection.get_once(&user, "1487654321000").unwrap().text, "new text");
    }

    #[test]
    fn edit_of_a_missing_note_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        assert!(matches!(
            NoteEditor::edit(&collection, UserId("alice".to_string()), "404", flags),
            Err(CkError::NoteNotFound { .. })
        ));
    }

    #[test]
    fn color_selection_validates_and_previews() {
        let tmp = tempfile::tempdir().unwrap();
        let (collection, flags) = setup(tmp.path());
        let mut editor = NoteEditor::create(&collection, UserId("alice".to_string()), flags);

        assert_eq!(editor.tint_preview(), NoteColor::Default);
        assert_eq!(editor.set_color("green").unwrap(), NoteColor::Green);
        assert_eq!(editor.tint_preview(), NoteColor::Green);
        assert!(matches!(
            editor.set_color("magenta"),
            Err(CkError::UnknownColorName { .. })
        ));
        // A rejected selection leaves the previous one in place
        assert_eq!(editor.color(), Some("green"));
    }
}
