//! LilyPond note-entry parser
//!
//! Builds a free container from a note-entry string such as
//! `"c'8 [ d'8 ( e'8 ) ] \times 2/3 { f'8 g'8 a'8 }"`.
//!
//! Markers are postfix and refer to the leaf before them, as in LilyPond.
//! Setup commands (`\clef`, `\time`, `\key`) and `\grace` blocks apply to
//! the next leaf. Spanners are collected while the tree is built and
//! attached once parsing has finished, so every leaf already sits in its
//! final logical voice.

use crate::error::{ScoreError, ScoreResult};
use crate::models::spanner::DYNAMIC_NAMES;
use crate::models::{
    Component, ComponentId, Duration, GraceKind, Glissando, Hairpin, Indicator, Multiplier, Pitch,
    SpannerKind, TextSpan,
};
use crate::structure::ScoreTree;

/// More dots than this cannot be engraved
const MAX_DOTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    /// Note, rest, skip, fraction or other bare word
    Word(String),
    /// Backslash command without the backslash (`times`, `(`, `<`, `!`)
    Command(String),
    /// `-\accent`
    Articulation(String),
    Str(String),
    Chord {
        pitches: Vec<String>,
        duration: String,
    },
    OpenBrace,
    CloseBrace,
    OpenSimultaneous,
    CloseSimultaneous,
    /// `[`, `]`, `(`, `)` or `~`
    Marker(char),
    Equals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    lexeme: Lexeme,
    line: usize,
    column: usize,
}

fn parse_error(line: usize, column: usize, message: impl Into<String>) -> ScoreError {
    ScoreError::ParseError {
        line,
        column,
        message: message.into(),
    }
}

/// Characters that end a bare word
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "{}<>[]()~\\%\"=".contains(c)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('%') => {
                    self.take_while(|c| c != '\n');
                }
                _ => break,
            }
        }
    }

    fn tokenize(mut self) -> ScoreResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                break;
            };
            let lexeme = match c {
                '{' => {
                    self.bump();
                    Lexeme::OpenBrace
                }
                '}' => {
                    self.bump();
                    Lexeme::CloseBrace
                }
                '=' => {
                    self.bump();
                    Lexeme::Equals
                }
                '[' | ']' | '(' | ')' | '~' => {
                    self.bump();
                    Lexeme::Marker(c)
                }
                '<' if self.peek_at(1) == Some('<') => {
                    self.bump();
                    self.bump();
                    Lexeme::OpenSimultaneous
                }
                '>' if self.peek_at(1) == Some('>') => {
                    self.bump();
                    self.bump();
                    Lexeme::CloseSimultaneous
                }
                '<' => self.chord(line, column)?,
                '>' => return Err(parse_error(line, column, "unexpected '>'")),
                '"' => {
                    self.bump();
                    let text = self.take_while(|c| c != '"');
                    if self.bump() != Some('"') {
                        return Err(parse_error(line, column, "unterminated string"));
                    }
                    Lexeme::Str(text)
                }
                '\\' => {
                    self.bump();
                    match self.peek() {
                        Some(symbol @ ('(' | ')' | '<' | '>' | '!')) => {
                            self.bump();
                            Lexeme::Command(symbol.to_string())
                        }
                        Some(c) if c.is_ascii_alphabetic() => {
                            Lexeme::Command(self.take_while(|c| c.is_ascii_alphabetic()))
                        }
                        _ => return Err(parse_error(line, column, "expected a command after '\\'")),
                    }
                }
                '-' if self.peek_at(1) == Some('\\') => {
                    self.bump();
                    self.bump();
                    let name = self.take_while(|c| c.is_ascii_alphabetic());
                    if name.is_empty() {
                        return Err(parse_error(line, column, "expected an articulation name"));
                    }
                    Lexeme::Articulation(name)
                }
                _ => Lexeme::Word(self.take_while(|c| !is_delimiter(c))),
            };
            tokens.push(Token {
                lexeme,
                line,
                column,
            });
        }
        Ok(tokens)
    }

    /// `<c' e' g'>4.` after the opening `<`
    fn chord(&mut self, line: usize, column: usize) -> ScoreResult<Lexeme> {
        self.bump();
        let mut pitches = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('>') => {
                    self.bump();
                    break;
                }
                Some(c) if !is_delimiter(c) => pitches.push(self.take_while(|c| !is_delimiter(c))),
                _ => return Err(parse_error(line, column, "unterminated chord")),
            }
        }
        if pitches.is_empty() {
            return Err(parse_error(line, column, "empty chord"));
        }
        let duration = self.take_while(|c| !is_delimiter(c));
        Ok(Lexeme::Chord { pitches, duration })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKey {
    Beam,
    Slur,
    PhrasingSlur,
    Hairpin,
    TextSpan,
    TrillSpan,
    Pedal,
    Group,
    Ottava,
}

struct OpenSpan {
    key: SpanKey,
    kind: SpannerKind,
    /// Index into `Parser::sequence`
    start: usize,
    line: usize,
    column: usize,
}

/// Tie and glissando chains grow one leaf at a time
#[derive(Default)]
struct Chain {
    leaves: Vec<ComponentId>,
    waiting: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Close {
    Brace,
    Simultaneous,
}

struct Parser<'t> {
    tree: &'t mut ScoreTree,
    tokens: Vec<Token>,
    pos: usize,
    previous_duration: Duration,
    /// Non-grace leaves in input order
    sequence: Vec<ComponentId>,
    last_leaf: Option<ComponentId>,
    grace_depth: usize,
    open: Vec<OpenSpan>,
    ties: Chain,
    glissandi: Chain,
    pending_setup: Vec<Indicator>,
    pending_grace: Option<ComponentId>,
    pending_ottava: Option<(i8, usize, usize)>,
    awaiting_after_grace_anchor: bool,
    after_grace_anchor: Option<ComponentId>,
    finished: Vec<(SpannerKind, Vec<ComponentId>)>,
}

impl<'t> Parser<'t> {
    fn new(tree: &'t mut ScoreTree, tokens: Vec<Token>) -> Self {
        Self {
            tree,
            tokens,
            pos: 0,
            previous_duration: Duration::new(1, 4),
            sequence: Vec::new(),
            last_leaf: None,
            grace_depth: 0,
            open: Vec::new(),
            ties: Chain::default(),
            glissandi: Chain::default(),
            pending_setup: Vec::new(),
            pending_grace: None,
            pending_ottava: None,
            awaiting_after_grace_anchor: false,
            after_grace_anchor: None,
            finished: Vec::new(),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_position(&self) -> (usize, usize) {
        self.tokens
            .last()
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1))
    }

    fn expect_word(&mut self, after: &Token, what: &str) -> ScoreResult<String> {
        match self.next() {
            Some(Token {
                lexeme: Lexeme::Word(word),
                ..
            }) => Ok(word),
            Some(token) => Err(parse_error(token.line, token.column, format!("expected {}", what))),
            None => Err(parse_error(after.line, after.column, format!("expected {}", what))),
        }
    }

    fn expect_string(&mut self, after: &Token) -> ScoreResult<String> {
        match self.next() {
            Some(Token {
                lexeme: Lexeme::Str(text),
                ..
            }) => Ok(text),
            _ => Err(parse_error(after.line, after.column, "expected a quoted string")),
        }
    }

    /// Consume `{` or `<<`, returning which one was found
    fn expect_open(&mut self, after: &Token) -> ScoreResult<Close> {
        match self.next().map(|t| t.lexeme) {
            Some(Lexeme::OpenBrace) => Ok(Close::Brace),
            Some(Lexeme::OpenSimultaneous) => Ok(Close::Simultaneous),
            _ => Err(parse_error(after.line, after.column, "expected '{' or '<<'")),
        }
    }

    fn parse_music(&mut self, container: ComponentId, close: Option<Close>) -> ScoreResult<()> {
        loop {
            let Some(token) = self.next() else {
                if close.is_some() {
                    let (line, column) = self.end_position();
                    return Err(parse_error(line, column, "unexpected end of input, unclosed block"));
                }
                return Ok(());
            };
            match &token.lexeme {
                Lexeme::CloseBrace if close == Some(Close::Brace) => return Ok(()),
                Lexeme::CloseSimultaneous if close == Some(Close::Simultaneous) => return Ok(()),
                Lexeme::CloseBrace | Lexeme::CloseSimultaneous => {
                    return Err(parse_error(token.line, token.column, "unmatched closing bracket"));
                }
                Lexeme::OpenBrace => {
                    if let Some(anchor) = self.after_grace_anchor.take() {
                        let grace = self.grace_block(GraceKind::AfterGrace)?;
                        self.tree.attach_grace(anchor, grace)?;
                    } else {
                        let child = self.tree.create(Component::container());
                        self.tree.append(container, child)?;
                        self.parse_music(child, Some(Close::Brace))?;
                    }
                }
                Lexeme::OpenSimultaneous => {
                    let child = self.tree.create(Component::simultaneous());
                    self.tree.append(container, child)?;
                    self.parse_music(child, Some(Close::Simultaneous))?;
                }
                Lexeme::Word(word) => {
                    let leaf = self.leaf_from_word(word, &token)?;
                    self.add_leaf(container, leaf, &token)?;
                }
                Lexeme::Chord { pitches, duration } => {
                    let pitches = pitches
                        .iter()
                        .map(|p| Pitch::new(p).map_err(|_| self.bad_pitch(p, &token)))
                        .collect::<ScoreResult<Vec<_>>>()?;
                    let (written, multiplier) = self.duration(duration, &token)?;
                    let mut chord = Component::chord(pitches, written);
                    if let Some(multiplier) = multiplier {
                        chord = chord.with_multiplier(multiplier);
                    }
                    self.add_leaf(container, chord, &token)?;
                }
                Lexeme::Marker(marker) => self.marker(*marker, &token)?,
                Lexeme::Command(name) => self.command(container, name, &token)?,
                Lexeme::Articulation(name) => {
                    let leaf = self.require_leaf(&token)?;
                    self.tree.attach_indicator(leaf, Indicator::articulation(name))?;
                }
                Lexeme::Str(_) | Lexeme::Equals => {
                    return Err(parse_error(token.line, token.column, "unexpected token"));
                }
            }
        }
    }

    fn bad_pitch(&self, pitch: &str, token: &Token) -> ScoreError {
        parse_error(token.line, token.column, format!("invalid pitch '{}'", pitch))
    }

    fn leaf_from_word(&mut self, word: &str, token: &Token) -> ScoreResult<Component> {
        let split = word
            .find(|c: char| c.is_ascii_digit() || c == '*')
            .unwrap_or(word.len());
        let (name, duration) = word.split_at(split);
        let (written, multiplier) = self.duration(duration, token)?;
        let leaf = match name {
            "r" => Component::rest(written),
            "s" => Component::skip(written),
            _ => {
                let pitch = Pitch::new(name).map_err(|_| self.bad_pitch(name, token))?;
                Component::note(pitch, written)
            }
        };
        Ok(match multiplier {
            Some(multiplier) => leaf.with_multiplier(multiplier),
            None => leaf,
        })
    }

    /// `4.`, `16*3/2` or empty (reuse the previous written duration)
    fn duration(&mut self, text: &str, token: &Token) -> ScoreResult<(Duration, Option<Multiplier>)> {
        let invalid = || parse_error(token.line, token.column, format!("invalid duration '{}'", text));
        let (base, factor) = match text.split_once('*') {
            Some((base, factor)) => (base, Some(factor)),
            None => (text, None),
        };
        let written = if base.is_empty() {
            self.previous_duration
        } else {
            let digits_end = base.find('.').unwrap_or(base.len());
            let (digits, dots) = base.split_at(digits_end);
            if !dots.chars().all(|c| c == '.') {
                return Err(invalid());
            }
            let denominator: i64 = digits.parse().map_err(|_| invalid())?;
            if denominator <= 0 || denominator > 128 || denominator & (denominator - 1) != 0 {
                return Err(invalid());
            }
            if dots.len() > MAX_DOTS {
                return Err(invalid());
            }
            let dots = dots.len() as u32;
            Duration::new((1 << (dots + 1)) - 1, denominator << dots)
        };
        self.previous_duration = written;
        let multiplier = match factor {
            None => None,
            Some(factor) => {
                let (n, d) = factor.split_once('/').unwrap_or((factor, "1"));
                let n: i64 = n.parse().map_err(|_| invalid())?;
                let d: i64 = d.parse().map_err(|_| invalid())?;
                if n <= 0 || d <= 0 {
                    return Err(invalid());
                }
                Some(Multiplier::new(n, d))
            }
        };
        Ok((written, multiplier))
    }

    fn add_leaf(&mut self, container: ComponentId, leaf: Component, token: &Token) -> ScoreResult<()> {
        if self.after_grace_anchor.is_some() {
            return Err(parse_error(token.line, token.column, "expected after-grace music '{'"));
        }
        let id = self.tree.create(leaf);
        self.tree.append(container, id)?;
        for indicator in std::mem::take(&mut self.pending_setup) {
            self.tree.attach_indicator(id, indicator)?;
        }
        self.last_leaf = Some(id);
        if self.grace_depth > 0 {
            return Ok(());
        }

        self.sequence.push(id);
        if let Some(grace) = self.pending_grace.take() {
            self.tree.attach_grace(id, grace)?;
        }
        if let Some((octaves, line, column)) = self.pending_ottava.take() {
            self.open.push(OpenSpan {
                key: SpanKey::Ottava,
                kind: SpannerKind::Ottava(octaves),
                start: self.sequence.len() - 1,
                line,
                column,
            });
        }
        if self.awaiting_after_grace_anchor {
            self.awaiting_after_grace_anchor = false;
            self.after_grace_anchor = Some(id);
        }
        Self::grow_chain(&mut self.ties, &mut self.finished, id, SpannerKind::tie());
        Self::grow_chain(
            &mut self.glissandi,
            &mut self.finished,
            id,
            SpannerKind::Glissando(Glissando::default()),
        );
        Ok(())
    }

    fn grow_chain(
        chain: &mut Chain,
        finished: &mut Vec<(SpannerKind, Vec<ComponentId>)>,
        leaf: ComponentId,
        kind: SpannerKind,
    ) {
        if chain.waiting.take().is_some() {
            chain.leaves.push(leaf);
        } else if !chain.leaves.is_empty() {
            finished.push((kind, std::mem::take(&mut chain.leaves)));
        }
    }

    fn continue_chain(&mut self, glissando: bool, token: &Token) -> ScoreResult<()> {
        let leaf = self.require_main_leaf(token)?;
        let chain = if glissando {
            &mut self.glissandi
        } else {
            &mut self.ties
        };
        if chain.leaves.last() != Some(&leaf) {
            chain.leaves.push(leaf);
        }
        chain.waiting = Some((token.line, token.column));
        Ok(())
    }

    fn require_leaf(&self, token: &Token) -> ScoreResult<ComponentId> {
        self.last_leaf
            .ok_or_else(|| parse_error(token.line, token.column, "marker before the first note"))
    }

    fn require_main_leaf(&self, token: &Token) -> ScoreResult<ComponentId> {
        if self.grace_depth > 0 {
            return Err(parse_error(
                token.line,
                token.column,
                "spanners cannot start or stop inside grace music",
            ));
        }
        let leaf = self.require_leaf(token)?;
        match self.sequence.last() {
            Some(&last) if last == leaf => Ok(leaf),
            _ => Err(parse_error(token.line, token.column, "marker must follow a note")),
        }
    }

    fn start_span(&mut self, key: SpanKey, kind: SpannerKind, token: &Token) -> ScoreResult<()> {
        self.require_main_leaf(token)?;
        if self.open.iter().any(|span| span.key == key) {
            return Err(parse_error(token.line, token.column, format!("{:?} already open", key)));
        }
        self.open.push(OpenSpan {
            key,
            kind,
            start: self.sequence.len() - 1,
            line: token.line,
            column: token.column,
        });
        Ok(())
    }

    fn stop_span(&mut self, key: SpanKey, token: &Token) -> ScoreResult<()> {
        self.require_main_leaf(token)?;
        let Some(at) = self.open.iter().rposition(|span| span.key == key) else {
            return Err(parse_error(token.line, token.column, format!("no open {:?} to close", key)));
        };
        let span = self.open.remove(at);
        let first = self.sequence[span.start];
        let mut leaves = Vec::new();
        for &leaf in &self.sequence[span.start..] {
            if self.tree.in_same_logical_voice(&[first, leaf])? {
                leaves.push(leaf);
            }
        }
        // Attaching would displace the earlier spanner
        let family = span.kind.family();
        let overlaps = family.is_exclusive()
            && self.finished.iter().any(|(kind, earlier)| {
                kind.family() == family && earlier.iter().any(|leaf| leaves.contains(leaf))
            });
        if overlaps {
            return Err(parse_error(
                span.line,
                span.column,
                format!("{:?} shares a note with the previous {:?}", span.key, span.key),
            ));
        }
        self.finished.push((span.kind, leaves));
        Ok(())
    }

    fn marker(&mut self, marker: char, token: &Token) -> ScoreResult<()> {
        match marker {
            '[' => self.start_span(SpanKey::Beam, SpannerKind::beam(), token),
            ']' => self.stop_span(SpanKey::Beam, token),
            '(' => self.start_span(SpanKey::Slur, SpannerKind::slur(), token),
            ')' => self.stop_span(SpanKey::Slur, token),
            _ => self.continue_chain(false, token),
        }
    }

    fn grace_block(&mut self, kind: GraceKind) -> ScoreResult<ComponentId> {
        let grace = self.tree.create(Component::grace(kind));
        let saved = self.last_leaf;
        self.grace_depth += 1;
        let parsed = self.parse_music(grace, Some(Close::Brace));
        self.grace_depth -= 1;
        self.last_leaf = saved;
        if let Err(err) = parsed {
            self.tree.free(grace)?;
            return Err(err);
        }
        Ok(grace)
    }

    fn command(&mut self, container: ComponentId, name: &str, token: &Token) -> ScoreResult<()> {
        match name {
            "(" => self.start_span(SpanKey::PhrasingSlur, SpannerKind::PhrasingSlur, token),
            ")" => self.stop_span(SpanKey::PhrasingSlur, token),
            "<" => self.start_span(SpanKey::Hairpin, SpannerKind::Hairpin(Hairpin::crescendo()), token),
            ">" => self.start_span(SpanKey::Hairpin, SpannerKind::Hairpin(Hairpin::decrescendo()), token),
            "!" => self.stop_span(SpanKey::Hairpin, token),
            "startTextSpan" => {
                self.start_span(SpanKey::TextSpan, SpannerKind::TextSpan(TextSpan::default()), token)
            }
            "stopTextSpan" => self.stop_span(SpanKey::TextSpan, token),
            "startTrillSpan" => self.start_span(SpanKey::TrillSpan, SpannerKind::TrillSpan, token),
            "stopTrillSpan" => self.stop_span(SpanKey::TrillSpan, token),
            "sustainOn" => self.start_span(SpanKey::Pedal, SpannerKind::PianoPedal, token),
            "sustainOff" => self.stop_span(SpanKey::Pedal, token),
            "startGroup" => self.start_span(SpanKey::Group, SpannerKind::HorizontalBracket, token),
            "stopGroup" => self.stop_span(SpanKey::Group, token),
            "glissando" => self.continue_chain(true, token),
            dynamic if DYNAMIC_NAMES.contains(&dynamic) => {
                let leaf = self.require_leaf(token)?;
                let hairpin_running = self
                    .open
                    .iter()
                    .any(|span| span.key == SpanKey::Hairpin && self.sequence.get(span.start) != Some(&leaf));
                if hairpin_running && self.grace_depth == 0 {
                    self.stop_span(SpanKey::Hairpin, token)?;
                }
                self.tree.attach_indicator(leaf, Indicator::dynamic(dynamic))?;
                Ok(())
            }
            "times" | "tuplet" => {
                let fraction = self.expect_word(token, "a fraction like 2/3")?;
                let (n, d) = fraction
                    .split_once('/')
                    .and_then(|(n, d)| Some((n.parse::<i64>().ok()?, d.parse::<i64>().ok()?)))
                    .filter(|&(n, d)| n > 0 && d > 0)
                    .ok_or_else(|| parse_error(token.line, token.column, "expected a fraction like 2/3"))?;
                let multiplier = if name == "times" {
                    Multiplier::new(n, d)
                } else {
                    Multiplier::new(d, n)
                };
                if self.expect_open(token)? != Close::Brace {
                    return Err(parse_error(token.line, token.column, "tuplets take '{'"));
                }
                let tuplet = self.tree.create(Component::tuplet(multiplier));
                self.tree.append(container, tuplet)?;
                self.parse_music(tuplet, Some(Close::Brace))
            }
            "grace" => {
                if self.pending_grace.is_some() || self.grace_depth > 0 {
                    return Err(parse_error(token.line, token.column, "nested grace music"));
                }
                if self.expect_open(token)? != Close::Brace {
                    return Err(parse_error(token.line, token.column, "grace music takes '{'"));
                }
                let grace = self.grace_block(GraceKind::Grace)?;
                self.pending_grace = Some(grace);
                Ok(())
            }
            "afterGrace" => {
                if self.grace_depth > 0 {
                    return Err(parse_error(token.line, token.column, "nested grace music"));
                }
                self.awaiting_after_grace_anchor = true;
                Ok(())
            }
            "new" | "context" => self.context(container, token),
            "clef" => {
                let clef = self.expect_string(token)?;
                self.pending_setup.push(Indicator::clef(&clef));
                Ok(())
            }
            "time" => {
                let fraction = self.expect_word(token, "a time signature like 3/4")?;
                let (numerator, denominator) = fraction
                    .split_once('/')
                    .and_then(|(n, d)| Some((n.parse::<u32>().ok()?, d.parse::<u32>().ok()?)))
                    .ok_or_else(|| parse_error(token.line, token.column, "expected a time signature like 3/4"))?;
                self.pending_setup.push(Indicator::TimeSignature {
                    numerator,
                    denominator,
                });
                Ok(())
            }
            "key" => {
                let tonic = self.expect_word(token, "a tonic")?;
                let mode = match self.next().map(|t| t.lexeme) {
                    Some(Lexeme::Command(mode)) => mode,
                    _ => return Err(parse_error(token.line, token.column, "expected a mode like \\major")),
                };
                self.pending_setup.push(Indicator::KeySignature { tonic, mode });
                Ok(())
            }
            "bar" => {
                let abbreviation = self.expect_string(token)?;
                let leaf = self.require_leaf(token)?;
                self.tree.attach_indicator(leaf, Indicator::BarLine(abbreviation))?;
                Ok(())
            }
            "ottava" => {
                let value = self.expect_word(token, "an octave count like #1")?;
                let octaves: i8 = value
                    .strip_prefix('#')
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| parse_error(token.line, token.column, "expected an octave count like #1"))?;
                if octaves == 0 {
                    self.stop_span(SpanKey::Ottava, token)
                } else {
                    self.pending_ottava = Some((octaves, token.line, token.column));
                    Ok(())
                }
            }
            _ => Err(parse_error(
                token.line,
                token.column,
                format!("unknown command \\{}", name),
            )),
        }
    }

    /// `\new Staff { ... }`, `\context Voice = "upper" { ... }`
    fn context(&mut self, container: ComponentId, token: &Token) -> ScoreResult<()> {
        let kind = self.expect_word(token, "a context name")?;
        let mut name = None;
        if matches!(self.tokens.get(self.pos).map(|t| &t.lexeme), Some(Lexeme::Equals)) {
            self.pos += 1;
            name = Some(self.expect_string(token)?);
        }
        let close = self.expect_open(token)?;
        let component = match kind.as_str() {
            "Voice" => Component::voice(None),
            "Staff" => Component::staff(None),
            "StaffGroup" => Component::staff_group(),
            "Score" => Component::score(),
            _ => {
                return Err(parse_error(
                    token.line,
                    token.column,
                    format!("unsupported context '{}'", kind),
                ))
            }
        }
        .with_simultaneous(close == Close::Simultaneous);
        let id = self.tree.create(component);
        if name.is_some() {
            self.tree.set_name(id, name.as_deref())?;
        }
        self.tree.append(container, id)?;
        self.parse_music(id, Some(close))
    }

    /// Check for dangling markers, then attach every collected spanner
    fn finish(mut self) -> ScoreResult<()> {
        if let Some(span) = self.open.first() {
            return Err(parse_error(
                span.line,
                span.column,
                format!("unterminated {:?}", span.key),
            ));
        }
        for chain in [&self.ties, &self.glissandi] {
            if let Some((line, column)) = chain.waiting {
                return Err(parse_error(line, column, "tie or glissando without a following note"));
            }
        }
        let (line, column) = self.end_position();
        if self.pending_grace.is_some() {
            return Err(parse_error(line, column, "grace music without a following note"));
        }
        if self.awaiting_after_grace_anchor || self.after_grace_anchor.is_some() {
            return Err(parse_error(line, column, "incomplete \\afterGrace"));
        }
        if let Some((_, line, column)) = self.pending_ottava {
            return Err(parse_error(line, column, "\\ottava without a following note"));
        }
        if !self.pending_setup.is_empty() {
            return Err(parse_error(line, column, "setup command without a following note"));
        }
        let ties = std::mem::take(&mut self.ties.leaves);
        if !ties.is_empty() {
            self.finished.push((SpannerKind::tie(), ties));
        }
        let glissandi = std::mem::take(&mut self.glissandi.leaves);
        if !glissandi.is_empty() {
            self.finished
                .push((SpannerKind::Glissando(Glissando::default()), glissandi));
        }
        for (kind, leaves) in std::mem::take(&mut self.finished) {
            self.tree.attach_spanner(kind, &leaves)?;
        }
        Ok(())
    }
}

/// Parse note-entry text into a new free container
pub fn parse_container(tree: &mut ScoreTree, text: &str) -> ScoreResult<ComponentId> {
    parse_context(tree, Component::container(), text)
}

/// Parse note-entry text into a new free container of the given kind
///
/// ## Parameters
///
/// - `context`: an empty container value, e.g. `Component::staff(None)`
///
/// ## Errors
///
/// `ParseError` with the line and column of the offending token. The
/// partially built tree is freed before returning.
pub fn parse_context(tree: &mut ScoreTree, context: Component, text: &str) -> ScoreResult<ComponentId> {
    if context.as_container().map_or(true, |c| !c.is_empty()) {
        return Err(parse_error(1, 1, "parse target must be an empty container"));
    }
    let tokens = Lexer::new(text).tokenize()?;
    let root = tree.create(context);
    let mut parser = Parser::new(tree, tokens);
    let result = parser.parse_music(root, None);
    let pending_grace = parser.pending_grace;
    let result = result.and_then(|()| parser.finish());
    if let Err(err) = result {
        log::debug!("note entry rejected: {}", err);
        if let Some(grace) = pending_grace {
            if tree.parent_of(grace)?.is_none() && tree.anchor_of(grace)?.is_none() {
                tree.free(grace)?;
            }
        }
        tree.free(root)?;
        return Err(err);
    }
    log::debug!("parsed {} leaves into {}", tree.leaves(root)?.len(), root);
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorKind, SpannerFamily};

    #[test]
    fn test_durations_are_inherited() {
        let mut tree = ScoreTree::new();
        let root = parse_container(&mut tree, "c'8. d' r16 <c' e'>").unwrap();
        let leaves = tree.leaves(root).unwrap();
        assert_eq!(leaves.len(), 4);
        assert_eq!(tree.leaf(leaves[1]).unwrap().written_duration(), Duration::new(3, 16));
        assert_eq!(tree.leaf(leaves[3]).unwrap().written_duration(), Duration::new(1, 16));
        assert_eq!(tree.duration_of(root).unwrap(), Duration::new(1, 2));
    }

    #[test]
    fn test_markers_become_spanners() {
        let mut tree = ScoreTree::new();
        let root = parse_container(&mut tree, "c'8 [ ( d'8 e'8 ) ~ e'8 ]").unwrap();
        let leaves = tree.leaves(root).unwrap();
        let beam = tree.spanners_of_family(leaves[0], SpannerFamily::Beam).unwrap();
        assert_eq!(tree.spanner(beam[0]).unwrap().leaves(), leaves.as_slice());
        let slur = tree.spanners_of_family(leaves[0], SpannerFamily::Slur).unwrap();
        assert_eq!(tree.spanner(slur[0]).unwrap().len(), 3);
        let tie = tree.spanners_of_family(leaves[3], SpannerFamily::Tie).unwrap();
        assert_eq!(tree.spanner(tie[0]).unwrap().leaves(), &leaves[2..]);
    }

    #[test]
    fn test_dynamic_ends_hairpin() {
        let mut tree = ScoreTree::new();
        let root = parse_container(&mut tree, "c'4 \\p \\< d'4 e'4 \\f").unwrap();
        let leaves = tree.leaves(root).unwrap();
        let hairpin = tree.spanners_of_family(leaves[0], SpannerFamily::Hairpin).unwrap();
        assert_eq!(tree.spanner(hairpin[0]).unwrap().len(), 3);
        assert_eq!(
            tree.indicator(leaves[2], IndicatorKind::Dynamic).unwrap(),
            &Indicator::dynamic("f")
        );
    }

    #[test]
    fn test_same_family_cannot_share_a_note() {
        let mut tree = ScoreTree::new();
        let err = parse_container(&mut tree, "c'8 ( d'8 ) ( e'8 )").unwrap_err();
        assert_eq!(
            err,
            ScoreError::ParseError {
                line: 1,
                column: 13,
                message: "Slur shares a note with the previous Slur".to_string(),
            }
        );
        assert!(parse_container(&mut tree, "c'8 [ d'8 ] [ e'8 ]").is_err());
        assert!(matches!(
            parse_container(&mut tree, "c'4 \\< d'4 \\> e'4 \\!"),
            Err(ScoreError::ParseError { .. })
        ));
        assert!(tree.is_empty());

        let root = parse_container(&mut tree, "c'8 ( d'8 ) e'8 ( f'8 )").unwrap();
        assert_eq!(tree.spanners().count(), 2);
        let leaves = tree.leaves(root).unwrap();
        let second = tree.spanners_of_family(leaves[3], SpannerFamily::Slur).unwrap();
        assert_eq!(tree.spanner(second[0]).unwrap().leaves(), &leaves[2..]);
    }

    #[test]
    fn test_dot_count_is_bounded() {
        let mut tree = ScoreTree::new();
        let root = parse_container(&mut tree, "c'4....").unwrap();
        assert_eq!(tree.duration_of(root).unwrap(), Duration::new(31, 64));
        tree.free(root).unwrap();

        let many = format!("c'4{}", ".".repeat(70));
        assert!(matches!(
            parse_container(&mut tree, &many),
            Err(ScoreError::ParseError { line: 1, column: 1, .. })
        ));
        assert!(parse_container(&mut tree, "c'128.....").is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_tuplets_and_contexts() {
        let mut tree = ScoreTree::new();
        let root = parse_container(
            &mut tree,
            "\\new Staff = \"upper\" { \\times 2/3 { c'8 d'8 e'8 } f'4 }",
        )
        .unwrap();
        let staff = tree.children_of(root).unwrap()[0];
        assert_eq!(tree.container(staff).unwrap().name(), Some("upper"));
        assert_eq!(tree.duration_of(staff).unwrap(), Duration::new(1, 2));
    }

    #[test]
    fn test_errors_carry_positions() {
        let mut tree = ScoreTree::new();
        let err = parse_container(&mut tree, "c'4 d'4\n  e'4 ]").unwrap_err();
        assert_eq!(
            err,
            ScoreError::ParseError {
                line: 2,
                column: 7,
                message: "no open Beam to close".to_string(),
            }
        );
        assert!(parse_container(&mut tree, "c'4 [ d'4").is_err());
        assert!(parse_container(&mut tree, "{ c'4").is_err());
        assert!(parse_container(&mut tree, "h4").is_err());
        assert!(parse_container(&mut tree, "c'3").is_err());
        assert!(tree.is_empty());
    }
}
