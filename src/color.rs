//! The note color palette and name resolution.
//!
//! Colors are stored on notes as names; rendering resolves a name to one
//! fixed hex value. Resolution is a total function: absent or blank input
//! falls back to [`NoteColor::Default`], while an unrecognized non-empty
//! name is reported as [`CkError::UnknownColorName`] so the caller decides
//! whether to fail or fall back.

use console::Style;

use crate::{CkError, Result};

/// The fixed, closed set of note colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteColor {
    Blue,
    Orange,
    Green,
    White,
    Default,
    Red,
    Gray,
    Yellow,
}

impl NoteColor {
    /// Resolves a color name to a palette entry.
    ///
    /// `None` and blank strings resolve to [`NoteColor::Default`]; lookup is
    /// case-insensitive. Pure function, no side effects.
    pub fn resolve(name: Option<&str>) -> Result<NoteColor> {
        let key = match name {
            None => "DEFAULT".to_string(),
            Some(s) if s.trim().is_empty() => "DEFAULT".to_string(),
            Some(s) => s.to_uppercase(),
        };

        match key.as_str() {
            "BLUE" => Ok(NoteColor::Blue),
            "ORANGE" => Ok(NoteColor::Orange),
            "GREEN" => Ok(NoteColor::Green),
            "WHITE" => Ok(NoteColor::White),
            "DEFAULT" => Ok(NoteColor::Default),
            "RED" => Ok(NoteColor::Red),
            "GRAY" => Ok(NoteColor::Gray),
            "YELLOW" => Ok(NoteColor::Yellow),
            _ => Err(CkError::UnknownColorName { name: key }),
        }
    }

    /// The hexadecimal RGB value of this palette entry.
    pub fn hex(&self) -> &'static str {
        match self {
            NoteColor::Blue => "#03A9F4",
            NoteColor::Orange => "#FFC107",
            NoteColor::Green => "#CDDC39",
            NoteColor::White => "#FFFFFF",
            NoteColor::Default => "#FFFFFF",
            NoteColor::Red => "#EF5350",
            NoteColor::Gray => "#E0E0E0",
            NoteColor::Yellow => "#FFEB3B",
        }
    }

    /// Nearest xterm-256 index for terminal background tinting.
    pub fn term_index(&self) -> u8 {
        match self {
            NoteColor::Blue => 39,
            NoteColor::Orange => 220,
            NoteColor::Green => 185,
            NoteColor::White | NoteColor::Default => 15,
            NoteColor::Red => 203,
            NoteColor::Gray => 254,
            NoteColor::Yellow => 227,
        }
    }

    /// Console style that tints a row background with this color.
    pub fn row_style(&self) -> Style {
        Style::new().black().on_color256(self.term_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_names_resolve_to_exact_hex_values() {
        let cases = [
            ("BLUE", "#03A9F4"),
            ("ORANGE", "#FFC107"),
            ("GREEN", "#CDDC39"),
            ("WHITE", "#FFFFFF"),
            ("DEFAULT", "#FFFFFF"),
            ("RED", "#EF5350"),
            ("GRAY", "#E0E0E0"),
            ("YELLOW", "#FFEB3B"),
        ];
        for (name, hex) in cases {
            let color = NoteColor::resolve(Some(name)).expect(name);
            assert_eq!(color.hex(), hex, "wrong hex for {}", name);
        }
    }

    #[test]
    fn resolution_is_case_insensitive() {
        assert_eq!(NoteColor::resolve(Some("blue")).unwrap(), NoteColor::Blue);
        assert_eq!(NoteColor::resolve(Some("Blue")).unwrap(), NoteColor::Blue);
        assert_eq!(
            NoteColor::resolve(Some("yElLoW")).unwrap(),
            NoteColor::Yellow
        );
    }

    #[test]
    fn absent_and_blank_names_fall_back_to_default() {
        assert_eq!(NoteColor::resolve(None).unwrap(), NoteColor::Default);
        assert_eq!(NoteColor::resolve(Some("")).unwrap(), NoteColor::Default);
        assert_eq!(NoteColor::resolve(Some("   ")).unwrap(), NoteColor::Default);
        assert_eq!(NoteColor::resolve(None).unwrap().hex(), "#FFFFFF");
    }

    #[test]
    fn unknown_names_are_reported() {
        match NoteColor::resolve(Some("magenta")) {
            Err(CkError::UnknownColorName { name }) => assert_eq!(name, "MAGENTA"),
            other => panic!("expected UnknownColorName, got {:?}", other),
        }
    }
}
