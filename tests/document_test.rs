//! Complete LilyPond files from the mustache templates

use scoretree::{
    lilypond_file, parse_context, write_lilypond_file, Component, FileOptions, RenderSettings,
    ScoreError, ScoreTree,
};

fn staff(tree: &mut ScoreTree) -> scoretree::ComponentId {
    parse_context(tree, Component::staff(None), "c'4 ( d'4 ) e'2").unwrap()
}

#[test]
fn test_standard_file() {
    let mut tree = ScoreTree::new();
    let root = staff(&mut tree);
    let options = FileOptions::default()
        .title("Little Study")
        .composer("Anonymous")
        .source_comment("generated by scoretree");
    let document = lilypond_file(&tree, root, &options).unwrap();

    assert!(document.starts_with("\\version \"2.24.0\"\n"));
    assert!(document.contains("% generated by scoretree\n"));
    assert!(document.contains("    title = \"Little Study\"\n"));
    assert!(document.contains("    composer = \"Anonymous\"\n"));
    assert!(document.contains("    tagline = \"\"\n"));
    assert!(document.contains("\\score {\n    \\new Staff\n    {\n        c'4\n        (\n"));
    assert!(document.contains("        e'2\n    }\n    \\layout { }\n}"));
    assert!(!document.contains("\\language"));
}

#[test]
fn test_minimal_file_with_language() {
    let mut tree = ScoreTree::new();
    let root = staff(&mut tree);
    let settings = RenderSettings {
        language: Some("english".to_string()),
        lilypond_version: "2.22.1".to_string(),
        ..RenderSettings::default()
    };
    let options = FileOptions::minimal().settings(settings);
    let document = lilypond_file(&tree, root, &options).unwrap();

    assert!(document.starts_with("\\version \"2.22.1\"\n"));
    assert!(document.contains("\\language \"english\"\n"));
    assert!(document.contains("\n\\new Staff\n{\n    c'4\n"));
    assert!(!document.contains("\\header"));
    assert!(!document.contains("\\score"));
}

#[test]
fn test_settings_from_json() {
    let settings = RenderSettings::from_json(r#"{"indent": 2, "show_tags": false}"#).unwrap();
    assert_eq!(settings.indent, 2);
    assert!(!settings.show_tags);
    assert_eq!(settings.lilypond_version, RenderSettings::default().lilypond_version);

    let err = RenderSettings::from_json("{\"indent\": }").unwrap_err();
    assert!(matches!(err, ScoreError::ParseError { line: 1, .. }));
}

#[test]
fn test_write_file() {
    let mut tree = ScoreTree::new();
    let root = staff(&mut tree);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.ly");

    write_lilypond_file(&tree, root, &FileOptions::minimal(), &path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, lilypond_file(&tree, root, &FileOptions::minimal()).unwrap());

    let missing = dir.path().join("no-such-dir").join("study.ly");
    let err = write_lilypond_file(&tree, root, &FileOptions::minimal(), &missing).unwrap_err();
    assert!(matches!(err, ScoreError::Io(_)));
}
