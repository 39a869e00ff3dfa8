//! Render settings and split options
//!
//! Both are plain serde structs with defaults, so callers can keep them in a
//! JSON config next to their scores and load them with `from_json`.

use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};

/// Options for the LilyPond renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Spaces per nesting level
    pub indent: usize,
    /// Append `%! TAG` to tagged tokens
    pub show_tags: bool,
    /// Written into `\version` by the file templates
    pub lilypond_version: String,
    /// Note-name language (`\language "english"`), omitted when `None`
    pub language: Option<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            indent: 4,
            show_tags: true,
            lilypond_version: "2.24.0".to_string(),
            language: None,
        }
    }
}

impl RenderSettings {
    pub fn from_json(json: &str) -> ScoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ScoreError::ParseError {
                line: e.line(),
                column: e.column(),
                message: format!("render settings: {}", e),
            })
    }

    pub fn indent_string(&self, depth: usize) -> String {
        " ".repeat(self.indent * depth)
    }
}

/// Options for `ScoreTree::split_leaf`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    /// Fracture spanners at every shard boundary
    pub fracture_spanners: bool,
    /// Tie the resulting notes and chords together
    pub tie_split_notes: bool,
    /// Tie the resulting rests together
    pub tie_split_rests: bool,
    /// Repeat the duration list until it covers the whole leaf
    pub cyclic: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            fracture_spanners: false,
            tie_split_notes: true,
            tie_split_rests: false,
            cyclic: false,
        }
    }
}

impl SplitOptions {
    pub fn fracturing(mut self) -> Self {
        self.fracture_spanners = true;
        self
    }

    pub fn untied(mut self) -> Self {
        self.tie_split_notes = false;
        self.tie_split_rests = false;
        self
    }

    pub fn cyclic(mut self) -> Self {
        self.cyclic = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.indent, 4);
        assert!(settings.show_tags);
        assert_eq!(settings.indent_string(2), "        ");
    }

    #[test]
    fn test_partial_json() {
        let settings = RenderSettings::from_json(r#"{"indent": 2, "language": "english"}"#).unwrap();
        assert_eq!(settings.indent, 2);
        assert_eq!(settings.language.as_deref(), Some("english"));
        assert_eq!(settings.lilypond_version, "2.24.0");
    }

    #[test]
    fn test_bad_json() {
        let err = RenderSettings::from_json("{indent").unwrap_err();
        assert!(matches!(err, ScoreError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_split_options_builders() {
        let options = SplitOptions::default().fracturing().untied();
        assert!(options.fracture_spanners);
        assert!(!options.tie_split_notes);
        assert!(!options.cyclic);
    }
}
