//! Rename templates such as `{stem}_combo{count}`.
//!
//! A template is literal text with `{token}` placeholders. Templates are parsed
//! once (so unknown tokens are reported when the config is validated) and
//! rendered per file against a [`TemplateContext`].

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("Invalid template token regex"));

/// Characters that are invalid in filenames on common filesystems.
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Placeholders a rename template may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Original file name without extension
    Stem,
    /// Number of detected sequences
    Count,
    /// 1-based position of the file in the run
    Index,
    /// Match date, `YYYY-MM-DD`
    Date,
    /// Match start time, `HHMMSS`
    Time,
    Stage,
    /// Player names joined with `-vs-`
    Players,
    /// `combos` or `conversions`
    Mode,
}

impl Token {
    pub const ALL: [Token; 8] = [
        Token::Stem,
        Token::Count,
        Token::Index,
        Token::Date,
        Token::Time,
        Token::Stage,
        Token::Players,
        Token::Mode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Token::Stem => "stem",
            Token::Count => "count",
            Token::Index => "index",
            Token::Date => "date",
            Token::Time => "time",
            Token::Stage => "stage",
            Token::Players => "players",
            Token::Mode => "mode",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Token::ALL.into_iter().find(|t| t.name() == name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("unknown token {{{0}}}")]
    UnknownToken(String),

    #[error("unbalanced brace in template: {0}")]
    UnbalancedBrace(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Token(Token),
}

/// A parsed rename template.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameTemplate {
    segments: Vec<Segment>,
}

/// Values substituted into a template for one file.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub stem: &'a str,
    pub count: usize,
    pub index: usize,
    pub started_at: DateTime<Utc>,
    pub stage: Option<&'a str>,
    pub players: Vec<&'a str>,
    pub mode: &'a str,
}

impl RenameTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in TOKEN_PATTERN.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            push_literal(&mut segments, &template[last..whole.start()])?;

            let name = caps[1].trim();
            let token = Token::from_name(name)
                .ok_or_else(|| TemplateError::UnknownToken(name.to_string()))?;
            segments.push(Segment::Token(token));
            last = whole.end();
        }
        push_literal(&mut segments, &template[last..])?;

        Ok(Self { segments })
    }

    /// Whether the template references `token`.
    pub fn uses(&self, token: Token) -> bool {
        self.segments.contains(&Segment::Token(token))
    }

    /// Render the template and sanitize the result into a usable file stem.
    ///
    /// Falls back to the original stem if nothing printable is left.
    pub fn render(&self, ctx: &TemplateContext<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(token) => out.push_str(&render_token(*token, ctx)),
            }
        }

        let sanitized = sanitize_stem(&out);
        if sanitized.is_empty() {
            ctx.stem.to_string()
        } else {
            sanitized
        }
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<(), TemplateError> {
    if text.contains(['{', '}']) {
        return Err(TemplateError::UnbalancedBrace(text.to_string()));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

fn render_token(token: Token, ctx: &TemplateContext<'_>) -> String {
    match token {
        Token::Stem => ctx.stem.to_string(),
        Token::Count => ctx.count.to_string(),
        Token::Index => ctx.index.to_string(),
        Token::Date => ctx.started_at.format("%Y-%m-%d").to_string(),
        Token::Time => ctx.started_at.format("%H%M%S").to_string(),
        Token::Stage => ctx.stage.unwrap_or("unknown-stage").to_string(),
        Token::Players => {
            if ctx.players.is_empty() {
                "unknown-players".to_string()
            } else {
                ctx.players.join("-vs-")
            }
        }
        Token::Mode => ctx.mode.to_string(),
    }
}

/// Make a rendered name safe to use as a file stem.
///
/// Invalid filesystem characters are dropped, whitespace runs become a single
/// hyphen, and leading/trailing dots, spaces and hyphens are trimmed.
pub fn sanitize_stem(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut in_whitespace = false;

    for c in input.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                result.push('-');
                in_whitespace = true;
            }
        } else if INVALID_CHARS.contains(&c) || c.is_control() {
            continue;
        } else {
            result.push(c);
            in_whitespace = false;
        }
    }

    result.trim_matches(|c| c == '.' || c == '-' || c == ' ').to_string()
}
