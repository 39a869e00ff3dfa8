//! What indicators and spanners contribute to a format bundle
//!
//! Each contributor maps itself and the component being formatted to a
//! list of slot/priority/token triples. Contributors never look at other
//! contributors; the bundle's sort order does the rest.

use crate::error::ScoreResult;
use crate::models::{
    AttachedIndicator, ComponentId, Direction, Indicator, IndicatorKind, LiteralPlacement,
    Spanner, SpannerKind, Tag,
};
use crate::structure::ScoreTree;

use super::bundle::{Contribution, Slot, Token};

/// Priorities shared by all contributors (lower opens first, closes last)
pub mod priority {
    pub const ARTICULATION: u16 = 10;
    pub const DYNAMIC: u16 = 20;
    pub const HAIRPIN: u16 = 30;
    pub const TIE: u16 = 40;
    pub const SLUR: u16 = 50;
    pub const PHRASING_SLUR: u16 = 55;
    pub const BEAM: u16 = 60;
    pub const GLISSANDO: u16 = 70;
    pub const TEXT_SPAN: u16 = 80;
    pub const TRILL_SPAN: u16 = 85;
    pub const PEDAL: u16 = 90;
    pub const HORIZONTAL_BRACKET: u16 = 95;
    pub const MARKUP: u16 = 100;

    pub const KEY_SIGNATURE: u16 = 10;
    pub const CLEF: u16 = 20;
    pub const TIME_SIGNATURE: u16 = 30;
    pub const BEAM_COUNT: u16 = 40;
    pub const LITERAL: u16 = 50;
    pub const OTTAVA: u16 = 90;
    pub const BAR_LINE: u16 = 100;
}

/// The component a contribution is being asked for
pub struct FormatSite<'a> {
    pub tree: &'a ScoreTree,
    pub component: ComponentId,
    pub is_leaf: bool,
}

pub trait ContributesFormat {
    fn contribute(&self, site: &FormatSite<'_>) -> ScoreResult<Vec<Contribution>>;
}

fn with_direction(direction: Option<Direction>, symbol: &str) -> String {
    match direction {
        Some(direction) => format!("{}{}", direction.lilypond_symbol(), symbol),
        None => symbol.to_string(),
    }
}

impl ContributesFormat for AttachedIndicator {
    fn contribute(&self, site: &FormatSite<'_>) -> ScoreResult<Vec<Contribution>> {
        let tag = self.tag.as_ref();
        let token = |text: String| Token::new(text).tagged(tag);
        // Setup commands go inside a container's brackets, before a leaf
        let setup = if site.is_leaf { Slot::Before } else { Slot::Opening };
        let postfix = if site.is_leaf { Slot::Body } else { Slot::Opening };

        let contributions = match &self.indicator {
            Indicator::Clef(name) => vec![Contribution::new(
                setup,
                priority::CLEF,
                token(format!("\\clef \"{}\"", name)),
            )],
            Indicator::TimeSignature {
                numerator,
                denominator,
            } => vec![Contribution::new(
                setup,
                priority::TIME_SIGNATURE,
                token(format!("\\time {}/{}", numerator, denominator)),
            )],
            Indicator::KeySignature { tonic, mode } => vec![Contribution::new(
                setup,
                priority::KEY_SIGNATURE,
                token(format!("\\key {} \\{}", tonic, mode)),
            )],
            Indicator::BeamCount { left, right } => vec![
                Contribution::new(
                    setup,
                    priority::BEAM_COUNT,
                    token(format!("\\set stemLeftBeamCount = #{}", left)),
                ),
                Contribution::new(
                    setup,
                    priority::BEAM_COUNT,
                    token(format!("\\set stemRightBeamCount = #{}", right)),
                ),
            ],
            Indicator::Dynamic(name) => vec![Contribution::new(
                postfix,
                priority::DYNAMIC,
                token(format!("\\{}", name)),
            )],
            Indicator::Articulation(name) => vec![Contribution::new(
                postfix,
                priority::ARTICULATION,
                token(format!("-\\{}", name)),
            )],
            Indicator::Markup { text, direction } => vec![Contribution::new(
                postfix,
                priority::MARKUP,
                token(format!("{}\\markup {{ {} }}", direction.lilypond_symbol(), text)),
            )],
            Indicator::BarLine(abbreviation) => vec![Contribution::new(
                Slot::After,
                priority::BAR_LINE,
                token(format!("\\bar \"{}\"", abbreviation)),
            )],
            Indicator::Literal { text, placement } => {
                let slot = match (placement, site.is_leaf) {
                    (LiteralPlacement::Before, _) => Slot::Before,
                    (LiteralPlacement::Opening, true) => Slot::Before,
                    (LiteralPlacement::Opening, false) => Slot::Opening,
                    (LiteralPlacement::Postfix, true) => Slot::Body,
                    (LiteralPlacement::Postfix, false) => Slot::Closing,
                    (LiteralPlacement::Closing, true) => Slot::After,
                    (LiteralPlacement::Closing, false) => Slot::Closing,
                    (LiteralPlacement::After, _) => Slot::After,
                };
                let literal_priority = if slot == Slot::Body {
                    priority::MARKUP - 5
                } else {
                    priority::LITERAL
                };
                vec![Contribution::new(slot, literal_priority, token(text.clone()))]
            }
        };
        Ok(contributions)
    }
}

impl ContributesFormat for Spanner {
    fn contribute(&self, site: &FormatSite<'_>) -> ScoreResult<Vec<Contribution>> {
        let Some(index) = site.tree.index_in_spanner(self.id(), site.component)? else {
            return Ok(Vec::new());
        };
        let len = self.len();
        if len < 2 {
            return Ok(Vec::new());
        }
        let first = index == 0;
        let last = index + 1 == len;
        let tag = self.tag();
        let token = |text: &str| Token::new(text).tagged(tag);
        let mut out = Vec::new();
        let start_stop = |out: &mut Vec<Contribution>, p: u16, start: &str, stop: &str| {
            if first {
                out.push(Contribution::new(Slot::Open, p, token(start)));
            }
            if last {
                out.push(Contribution::new(Slot::Close, p, token(stop)));
            }
        };

        match self.kind() {
            SpannerKind::Beam { direction } => {
                let start = with_direction(*direction, "[");
                start_stop(&mut out, priority::BEAM, &start, "]");
            }
            SpannerKind::Slur { direction } => {
                let start = with_direction(*direction, "(");
                start_stop(&mut out, priority::SLUR, &start, ")");
            }
            SpannerKind::PhrasingSlur => {
                start_stop(&mut out, priority::PHRASING_SLUR, "\\(", "\\)");
            }
            SpannerKind::Tie { direction } => {
                if !last {
                    let text = with_direction(*direction, "~");
                    out.push(Contribution::new(Slot::Open, priority::TIE, token(&text)));
                }
            }
            SpannerKind::Hairpin(hairpin) => {
                let leaf = site.tree.leaf(site.component)?;
                let dynamic_allowed = hairpin.include_rests || leaf.kind().is_pitched();
                if first {
                    if let (Some(dynamic), true) = (&hairpin.start_dynamic, dynamic_allowed) {
                        out.push(Contribution::new(
                            Slot::Body,
                            priority::DYNAMIC,
                            token(&format!("\\{}", dynamic)),
                        ));
                    }
                    out.push(Contribution::new(
                        Slot::Open,
                        priority::HAIRPIN,
                        token(hairpin.shape_token()),
                    ));
                }
                if last {
                    match (&hairpin.stop_dynamic, dynamic_allowed) {
                        (Some(dynamic), true) => out.push(Contribution::new(
                            Slot::Body,
                            priority::DYNAMIC,
                            token(&format!("\\{}", dynamic)),
                        )),
                        _ => {
                            let has_dynamic = !site
                                .tree
                                .indicators_of(site.component, IndicatorKind::Dynamic)?
                                .is_empty();
                            if !has_dynamic {
                                out.push(Contribution::new(
                                    Slot::Close,
                                    priority::HAIRPIN,
                                    token("\\!"),
                                ));
                            }
                        }
                    }
                }
            }
            SpannerKind::TextSpan(text_span) => {
                if first {
                    let bounds = [("left", &text_span.left_text), ("right", &text_span.right_text)];
                    for (side, text) in bounds {
                        if let Some(text) = text {
                            out.push(Contribution::new(
                                Slot::Before,
                                priority::TEXT_SPAN,
                                token(&format!(
                                    "\\once \\override TextSpanner.bound-details.{}.text = \\markup {{ {} }}",
                                    side, text
                                )),
                            ));
                        }
                    }
                }
                start_stop(&mut out, priority::TEXT_SPAN, "\\startTextSpan", "\\stopTextSpan");
            }
            SpannerKind::Glissando(glissando) => {
                if !last {
                    let here = site.tree.leaf(site.component)?.kind();
                    let next = site.tree.leaf(self.leaves()[index + 1])?.kind();
                    let pitched = here.is_pitched() && next.is_pitched();
                    if pitched && (glissando.allow_repeats || here != next) {
                        out.push(Contribution::new(
                            Slot::Open,
                            priority::GLISSANDO,
                            token("\\glissando"),
                        ));
                    }
                } else if glissando.right_broken {
                    let broken = Tag::new("RIGHT_BROKEN");
                    out.push(Contribution::new(
                        Slot::Open,
                        priority::GLISSANDO,
                        Token::new("\\glissando")
                            .tagged(Some(tag.unwrap_or(&broken)))
                            .deactivated(),
                    ));
                }
            }
            SpannerKind::TrillSpan => {
                start_stop(&mut out, priority::TRILL_SPAN, "\\startTrillSpan", "\\stopTrillSpan");
            }
            SpannerKind::PianoPedal => {
                start_stop(&mut out, priority::PEDAL, "\\sustainOn", "\\sustainOff");
            }
            SpannerKind::Ottava(octaves) => {
                if first {
                    out.push(Contribution::new(
                        Slot::Before,
                        priority::OTTAVA,
                        token(&format!("\\ottava #{}", octaves)),
                    ));
                }
                if last {
                    out.push(Contribution::new(
                        Slot::After,
                        priority::OTTAVA,
                        token("\\ottava #0"),
                    ));
                }
            }
            SpannerKind::HorizontalBracket => {
                start_stop(
                    &mut out,
                    priority::HORIZONTAL_BRACKET,
                    "\\startGroup",
                    "\\stopGroup",
                );
            }
        }
        Ok(out)
    }
}
