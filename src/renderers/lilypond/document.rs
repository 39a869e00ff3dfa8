//! LilyPond file wrapper
//!
//! Wraps a rendered score in a complete `.ly` document using mustache
//! templates:
//!
//! - `Minimal`: `\version` and the score, nothing else
//! - `Standard`: `\version`, `\header` and a `\score` block with `\layout`

use std::path::Path;

use serde::Serialize;

use crate::error::ScoreResult;
use crate::models::ComponentId;
use crate::settings::RenderSettings;
use crate::structure::ScoreTree;

use super::format::render;

/// Template selection for LilyPond output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileTemplate {
    Minimal,
    #[default]
    Standard,
}

impl FileTemplate {
    fn content(self) -> &'static str {
        match self {
            FileTemplate::Minimal => include_str!("templates/minimal.ly.mustache"),
            FileTemplate::Standard => include_str!("templates/standard.ly.mustache"),
        }
    }
}

/// Per-file options for `lilypond_file`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOptions {
    pub template: FileTemplate,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub source_comment: Option<String>,
    pub settings: RenderSettings,
}

impl FileOptions {
    pub fn minimal() -> Self {
        Self {
            template: FileTemplate::Minimal,
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn composer(mut self, composer: impl Into<String>) -> Self {
        self.composer = Some(composer.into());
        self
    }

    pub fn source_comment(mut self, comment: impl Into<String>) -> Self {
        self.source_comment = Some(comment.into());
        self
    }

    pub fn settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Context data for template rendering
///
/// Mustache sections only take booleans, lists and maps, so each optional
/// field has a `has_*` flag next to it.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub version: String,
    pub language: String,
    pub has_language: bool,
    pub title: String,
    pub has_title: bool,
    pub composer: String,
    pub has_composer: bool,
    pub source_comment: String,
    pub has_source_comment: bool,
    /// Rendered score, already indented for its place in the template
    pub score: String,
}

impl TemplateContext {
    pub fn new(version: impl Into<String>, score: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            language: String::new(),
            has_language: false,
            title: String::new(),
            has_title: false,
            composer: String::new(),
            has_composer: false,
            source_comment: String::new(),
            has_source_comment: false,
            score: score.into(),
        }
    }

    pub fn builder(version: impl Into<String>, score: impl Into<String>) -> TemplateContextBuilder {
        TemplateContextBuilder {
            context: TemplateContext::new(version, score),
        }
    }
}

pub struct TemplateContextBuilder {
    context: TemplateContext,
}

impl TemplateContextBuilder {
    pub fn language(mut self, language: Option<&str>) -> Self {
        self.context.has_language = language.is_some();
        self.context.language = language.unwrap_or_default().to_string();
        self
    }

    pub fn title(mut self, title: Option<&str>) -> Self {
        self.context.has_title = title.is_some();
        self.context.title = title.unwrap_or_default().to_string();
        self
    }

    pub fn composer(mut self, composer: Option<&str>) -> Self {
        self.context.has_composer = composer.is_some();
        self.context.composer = composer.unwrap_or_default().to_string();
        self
    }

    pub fn source_comment(mut self, comment: Option<&str>) -> Self {
        self.context.has_source_comment = comment.is_some();
        self.context.source_comment = comment.unwrap_or_default().to_string();
        self
    }

    pub fn build(self) -> TemplateContext {
        self.context
    }
}

/// Render a template with the given context
///
/// ## Errors
///
/// `ScoreError::Template` when the template does not compile or render.
pub fn render_template(template: FileTemplate, context: &TemplateContext) -> ScoreResult<String> {
    let compiled = mustache::compile_str(template.content())?;
    Ok(compiled.render_to_string(context)?)
}

/// Render `root` and wrap it in a complete LilyPond file
pub fn lilypond_file(tree: &ScoreTree, root: ComponentId, options: &FileOptions) -> ScoreResult<String> {
    let settings = &options.settings;
    let mut score = render(tree, root, settings)?;
    if options.template == FileTemplate::Standard {
        let indent = settings.indent_string(1);
        score = score
            .lines()
            .map(|line| format!("{}{}", indent, line))
            .collect::<Vec<_>>()
            .join("\n");
    }
    let context = TemplateContext::builder(settings.lilypond_version.as_str(), score)
        .language(settings.language.as_deref())
        .title(options.title.as_deref())
        .composer(options.composer.as_deref())
        .source_comment(options.source_comment.as_deref())
        .build();
    let document = render_template(options.template, &context)?;
    log::debug!(
        "built {:?} LilyPond file for {} ({} bytes)",
        options.template,
        root,
        document.len()
    );
    Ok(document)
}

/// Render `root` into a LilyPond file at `path`
pub fn write_lilypond_file(
    tree: &ScoreTree,
    root: ComponentId,
    options: &FileOptions,
    path: &Path,
) -> ScoreResult<()> {
    let document = lilypond_file(tree, root, options)?;
    std::fs::write(path, document)?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_context_builder() {
        let context = TemplateContext::builder("2.24.0", "c'4")
            .title(Some("Étude"))
            .composer(None)
            .build();
        assert!(context.has_title);
        assert_eq!(context.title, "Étude");
        assert!(!context.has_composer);
        assert_eq!(context.score, "c'4");
    }

    #[test]
    fn test_render_minimal_template() {
        let context = TemplateContext::new("2.24.0", "{\n    c'4\n}");
        let rendered = render_template(FileTemplate::Minimal, &context).unwrap();
        assert!(rendered.contains("\\version \"2.24.0\""));
        assert!(rendered.contains("{\n    c'4\n}"));
        assert!(!rendered.contains("\\language"));
    }

    #[test]
    fn test_render_standard_template() {
        let context = TemplateContext::builder("2.24.0", "    c'4")
            .title(Some("Sketch"))
            .language(Some("english"))
            .build();
        let rendered = render_template(FileTemplate::Standard, &context).unwrap();
        assert!(rendered.contains("title = \"Sketch\""));
        assert!(rendered.contains("\\language \"english\""));
        assert!(rendered.contains("\\score {"));
        assert!(!rendered.contains("composer"));
    }
}
