//! Component tree to LilyPond source
//!
//! One token per line, children indented one level deeper than their
//! container:
//!
//! ```text
//! \new Staff
//! {
//!     c'8
//!     [
//!     d'8
//!     ]
//! }
//! ```
//!
//! Leaf lines come out as: grace block, before, body (note, then
//! articulations and dynamics), close tokens, open tokens, after-grace
//! block, after. Containers: before, header and opening bracket, opening
//! lines, children, closing lines, closing bracket, after.

use std::collections::HashMap;

use crate::error::{ScoreError, ScoreResult};
use crate::models::{ComponentId, ContainerKind, GraceKind, Leaf, LeafKind};
use crate::settings::RenderSettings;
use crate::structure::ScoreTree;

use super::bundle::{Contribution, FormatBundle, Slot, Token};
use super::contributions::{ContributesFormat, FormatSite};

/// Format `component` with default settings
pub fn format(tree: &ScoreTree, component: ComponentId) -> ScoreResult<String> {
    render(tree, component, &RenderSettings::default())
}

/// Format `component` and everything below it
pub fn render(tree: &ScoreTree, component: ComponentId, settings: &RenderSettings) -> ScoreResult<String> {
    let mut renderer = Renderer {
        tree,
        settings,
        lines: Vec::new(),
        states: HashMap::new(),
    };
    renderer.emit(component, 0)?;
    log::trace!("rendered {} into {} lines", component, renderer.lines.len());
    Ok(renderer.lines.join("\n"))
}

/// Body text of a leaf: `c'8`, `<c' e'>4`, `r2.`, `s1 * 3/4`
pub fn leaf_body(leaf: &Leaf) -> ScoreResult<String> {
    let written = leaf.written_duration();
    let duration = written.lilypond_duration_string().ok_or_else(|| {
        ScoreError::InvalidDuration(format!("{} is not a single note value", written))
    })?;
    let mut body = match leaf.kind() {
        LeafKind::Note(pitch) => format!("{}{}", pitch, duration),
        LeafKind::Chord(pitches) => {
            let names: Vec<&str> = pitches.iter().map(|p| p.name()).collect();
            format!("<{}>{}", names.join(" "), duration)
        }
        LeafKind::Rest => format!("r{}", duration),
        LeafKind::Skip => format!("s{}", duration),
    };
    if let Some(multiplier) = leaf.multiplier() {
        if multiplier.denominator() == 1 {
            body.push_str(&format!(" * {}", multiplier.numerator()));
        } else {
            body.push_str(&format!(" * {}", multiplier));
        }
    }
    Ok(body)
}

/// Collect every contribution for `component`
pub fn build_bundle(tree: &ScoreTree, component: ComponentId) -> ScoreResult<FormatBundle> {
    let node = tree.component(component)?;
    let site = FormatSite {
        tree,
        component,
        is_leaf: node.is_leaf(),
    };
    let mut bundle = FormatBundle::new();
    match node.as_leaf() {
        Some(leaf) => {
            bundle.push(Contribution::new(Slot::Body, 0, Token::new(leaf_body(leaf)?)));
            for attached in tree.indicators(component)? {
                bundle.extend(attached.contribute(&site)?);
            }
            for &spanner in leaf.spanners.keys() {
                bundle.extend(tree.spanner(spanner)?.contribute(&site)?);
            }
        }
        None => {
            let container = tree.container(component)?;
            let (open, close) = if container.is_simultaneous() {
                ("<<", ">>")
            } else {
                ("{", "}")
            };
            let header = match (container.kind(), container.kind().context_name()) {
                (_, Some(context)) => Some(match container.name() {
                    Some(name) => format!("\\context {} = \"{}\"", context, name),
                    None => format!("\\new {}", context),
                }),
                (ContainerKind::Tuplet(multiplier), None) => Some(format!("\\times {}", multiplier)),
                (ContainerKind::Grace(GraceKind::Grace), None) => Some("\\grace".to_string()),
                _ => None,
            };
            if let Some(header) = header {
                bundle.push(Contribution::new(Slot::Open, 0, Token::new(header)));
            }
            bundle.push(Contribution::new(Slot::Open, 1, Token::new(open)));
            bundle.push(Contribution::new(Slot::Close, 0, Token::new(close)));
            for attached in tree.indicators(component)? {
                bundle.extend(attached.contribute(&site)?);
            }
        }
    }
    Ok(bundle)
}

/// Per-pass bookkeeping; a component reached twice means a broken tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    BundleBuilt,
    Emitted,
}

struct Renderer<'a> {
    tree: &'a ScoreTree,
    settings: &'a RenderSettings,
    lines: Vec<String>,
    states: HashMap<ComponentId, VisitState>,
}

impl Renderer<'_> {
    fn emit(&mut self, component: ComponentId, depth: usize) -> ScoreResult<()> {
        if let Some(state) = self.states.get(&component) {
            return Err(ScoreError::MalformedTree(format!(
                "{} reached twice during rendering ({:?})",
                component, state
            )));
        }
        let bundle = build_bundle(self.tree, component)?;
        self.states.insert(component, VisitState::BundleBuilt);
        match self.tree.component(component)?.as_leaf() {
            Some(leaf) => self.emit_leaf(leaf, &bundle, depth)?,
            None => self.emit_container(component, &bundle, depth)?,
        }
        self.states.insert(component, VisitState::Emitted);
        Ok(())
    }

    fn emit_leaf(&mut self, leaf: &Leaf, bundle: &FormatBundle, depth: usize) -> ScoreResult<()> {
        if let Some(grace) = leaf.grace() {
            self.emit(grace, depth)?;
        }
        self.push_slot(bundle, Slot::Before, depth);
        if leaf.after_grace().is_some() {
            self.push_line("\\afterGrace".to_string(), depth);
        }
        self.push_slot(bundle, Slot::Body, depth);
        self.push_slot(bundle, Slot::Close, depth);
        self.push_slot(bundle, Slot::Open, depth);
        if let Some(after_grace) = leaf.after_grace() {
            self.emit(after_grace, depth)?;
        }
        self.push_slot(bundle, Slot::After, depth);
        Ok(())
    }

    fn emit_container(&mut self, component: ComponentId, bundle: &FormatBundle, depth: usize) -> ScoreResult<()> {
        self.push_slot(bundle, Slot::Before, depth);
        self.push_slot(bundle, Slot::Open, depth);
        self.push_slot(bundle, Slot::Opening, depth + 1);
        for &child in self.tree.children_of(component)? {
            self.emit(child, depth + 1)?;
        }
        self.push_slot(bundle, Slot::Closing, depth + 1);
        self.push_slot(bundle, Slot::Close, depth);
        self.push_slot(bundle, Slot::After, depth);
        Ok(())
    }

    fn push_slot(&mut self, bundle: &FormatBundle, slot: Slot, depth: usize) {
        for token in bundle.tokens(slot) {
            let line = token.render(self.settings);
            self.push_line(line, depth);
        }
    }

    fn push_line(&mut self, line: String, depth: usize) {
        self.lines
            .push(format!("{}{}", self.settings.indent_string(depth), line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, Duration, Multiplier, Pitch};

    #[test]
    fn test_leaf_bodies() {
        let c = Pitch::new("c'").unwrap();
        let e = Pitch::new("e'").unwrap();
        let note = Component::note(c.clone(), Duration::new(1, 8));
        assert_eq!(leaf_body(note.as_leaf().unwrap()).unwrap(), "c'8");
        let chord = Component::chord(vec![c, e], Duration::new(3, 8));
        assert_eq!(leaf_body(chord.as_leaf().unwrap()).unwrap(), "<c' e'>4.");
        let skip = Component::skip(Duration::new(1, 1)).with_multiplier(Multiplier::new(3, 4));
        assert_eq!(leaf_body(skip.as_leaf().unwrap()).unwrap(), "s1 * 3/4");
        let rest = Component::rest(Duration::new(5, 16));
        assert!(leaf_body(rest.as_leaf().unwrap()).is_err());
    }

    #[test]
    fn test_empty_container() {
        let mut tree = ScoreTree::new();
        let container = tree.create(Component::container());
        assert_eq!(format(&tree, container).unwrap(), "{\n}");
    }

    #[test]
    fn test_named_voice_header() {
        let mut tree = ScoreTree::new();
        let voice = tree.create(Component::voice(Some("RH")));
        let note = tree.create(Component::note(Pitch::new("g'").unwrap(), Duration::new(1, 2)));
        tree.append(voice, note).unwrap();
        assert_eq!(
            format(&tree, voice).unwrap(),
            "\\context Voice = \"RH\"\n{\n    g'2\n}"
        );
    }
}
