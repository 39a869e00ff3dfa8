//! Format bundles
//!
//! A bundle collects the tokens contributed to one component, sorted into
//! slots. The renderer emits the slots in a fixed order, which is what
//! makes the output independent of attach order.

use crate::models::Tag;
use crate::settings::RenderSettings;

/// Where a contribution lands relative to its component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Own line(s) before the component
    Before,
    /// Leaf: postfix opening tokens (`[`, `(`, `\<`).
    /// Container: header and opening bracket.
    Open,
    /// Container only: first lines inside the brackets
    Opening,
    /// Leaf: the note/rest itself followed by articulations and dynamics
    Body,
    /// Container only: last lines inside the brackets
    Closing,
    /// Leaf: postfix closing tokens (`]`, `)`, `\!`).
    /// Container: closing bracket.
    Close,
    /// Own line(s) after the component
    After,
}

/// A single output token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub tag: Option<Tag>,
    /// Emitted commented out as `%@% text`
    pub deactivated: bool,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: None,
            deactivated: false,
        }
    }

    pub fn tagged(mut self, tag: Option<&Tag>) -> Self {
        self.tag = tag.cloned();
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.deactivated = true;
        self
    }

    /// Final text of the token, including tag comment and deactivation
    pub fn render(&self, settings: &RenderSettings) -> String {
        let mut line = String::new();
        if self.deactivated {
            line.push_str("%@% ");
        }
        line.push_str(&self.text);
        if settings.show_tags {
            if let Some(tag) = &self.tag {
                line.push_str(" %! ");
                line.push_str(tag.as_str());
            }
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub slot: Slot,
    /// Lower priorities open first and close last
    pub priority: u16,
    pub token: Token,
}

impl Contribution {
    pub fn new(slot: Slot, priority: u16, token: Token) -> Self {
        Self {
            slot,
            priority,
            token,
        }
    }
}

/// Tokens for one component, grouped by slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatBundle {
    before: Vec<Contribution>,
    open: Vec<Contribution>,
    opening: Vec<Contribution>,
    body: Vec<Contribution>,
    closing: Vec<Contribution>,
    close: Vec<Contribution>,
    after: Vec<Contribution>,
}

impl FormatBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, contribution: Contribution) {
        self.slot_mut(contribution.slot).push(contribution);
    }

    pub fn extend(&mut self, contributions: impl IntoIterator<Item = Contribution>) {
        for contribution in contributions {
            self.push(contribution);
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Vec<Contribution> {
        match slot {
            Slot::Before => &mut self.before,
            Slot::Open => &mut self.open,
            Slot::Opening => &mut self.opening,
            Slot::Body => &mut self.body,
            Slot::Closing => &mut self.closing,
            Slot::Close => &mut self.close,
            Slot::After => &mut self.after,
        }
    }

    fn slot(&self, slot: Slot) -> &[Contribution] {
        match slot {
            Slot::Before => &self.before,
            Slot::Open => &self.open,
            Slot::Opening => &self.opening,
            Slot::Body => &self.body,
            Slot::Closing => &self.closing,
            Slot::Close => &self.close,
            Slot::After => &self.after,
        }
    }

    /// Tokens of `slot` in emission order
    ///
    /// Close slots sort by descending priority so that nested spanners
    /// close in the reverse order they opened; every other slot sorts
    /// ascending. Sorting is stable, so equal priorities keep the order
    /// they were contributed in.
    pub fn tokens(&self, slot: Slot) -> Vec<&Token> {
        let mut sorted: Vec<&Contribution> = self.slot(slot).iter().collect();
        match slot {
            Slot::Close => sorted.sort_by(|a, b| b.priority.cmp(&a.priority)),
            _ => sorted.sort_by_key(|c| c.priority),
        }
        sorted.into_iter().map(|c| &c.token).collect()
    }

    pub fn is_empty(&self) -> bool {
        [
            Slot::Before,
            Slot::Open,
            Slot::Opening,
            Slot::Body,
            Slot::Closing,
            Slot::Close,
            Slot::After,
        ]
        .iter()
        .all(|&slot| self.slot(slot).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_slot_descends() {
        let mut bundle = FormatBundle::new();
        bundle.push(Contribution::new(Slot::Close, 60, Token::new("]")));
        bundle.push(Contribution::new(Slot::Close, 50, Token::new(")")));
        bundle.push(Contribution::new(Slot::Open, 60, Token::new("[")));
        bundle.push(Contribution::new(Slot::Open, 50, Token::new("(")));
        let close: Vec<_> = bundle.tokens(Slot::Close).iter().map(|t| t.text.as_str()).collect();
        let open: Vec<_> = bundle.tokens(Slot::Open).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(close, vec!["]", ")"]);
        assert_eq!(open, vec!["(", "["]);
    }

    #[test]
    fn test_token_rendering() {
        let settings = RenderSettings::default();
        let tag = Tag::new("RIGHT_BROKEN");
        let token = Token::new("\\glissando").tagged(Some(&tag)).deactivated();
        assert_eq!(token.render(&settings), "%@% \\glissando %! RIGHT_BROKEN");
        let quiet = RenderSettings {
            show_tags: false,
            ..RenderSettings::default()
        };
        assert_eq!(token.render(&quiet), "%@% \\glissando");
    }
}
