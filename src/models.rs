// Parsers and conversions kept for the CLI and config surfaces, not all reached yet
#![allow(dead_code)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which memory model a store is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Ease,
    Fsrs,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ease => "ease",
            Scheme::Fsrs => "fsrs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ease" | "ease-streak" => Some(Scheme::Ease),
            "fsrs" => Some(Scheme::Fsrs),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            _ => Err(Error::InvalidRating(v.to_string())),
        }
    }

    /// Accepts the four names, their initials, digits 1-4 and the
    /// three-valued fail/okay/good vocabulary.
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "again" | "a" | "fail" | "f" | "1" => Ok(Rating::Again),
            "hard" | "h" | "okay" | "ok" | "2" => Ok(Rating::Hard),
            "good" | "g" | "3" => Ok(Rating::Good),
            "easy" | "e" | "4" => Ok(Rating::Easy),
            _ => Err(Error::InvalidRating(s.to_string())),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Rating::Again)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a line is pre-revealed as a scaffold.
///
/// Ordered by mastery: `All` is the lowest tier and reveals the whole line,
/// `None` is the highest and reveals nothing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DisplayTier {
    #[default]
    All = 0,
    WordInitials = 1,
    LineInitials = 2,
    None = 3,
}

impl DisplayTier {
    pub const LOWEST: DisplayTier = DisplayTier::All;
    pub const HIGHEST: DisplayTier = DisplayTier::None;

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => DisplayTier::WordInitials,
            2 => DisplayTier::LineInitials,
            3 => DisplayTier::None,
            _ => DisplayTier::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayTier::All => "All",
            DisplayTier::WordInitials => "Word initials",
            DisplayTier::LineInitials => "Line initials",
            DisplayTier::None => "None",
        }
    }

    /// One tier fewer hints. Saturates at `None`.
    pub fn advance(self) -> Self {
        Self::from_i32((self.as_i32() + 1).min(Self::HIGHEST.as_i32()))
    }

    /// One tier more hints. Saturates at `All`.
    pub fn reveal(self) -> Self {
        Self::from_i32((self.as_i32() - 1).max(Self::LOWEST.as_i32()))
    }

    pub fn render(&self, text: &str) -> String {
        match self {
            DisplayTier::All => text.to_string(),
            DisplayTier::WordInitials => text
                .split_whitespace()
                .map(word_initial)
                .collect::<Vec<_>>()
                .join(" "),
            DisplayTier::LineInitials => match text.split_whitespace().next() {
                Some(first) => format!("{}…", word_initial(first)),
                None => String::new(),
            },
            DisplayTier::None => String::new(),
        }
    }
}

// Keeps the first letter and any punctuation: "not," -> "n,"
fn word_initial(word: &str) -> String {
    let mut seen_letter = false;
    word.chars()
        .filter(|c| {
            if c.is_alphanumeric() {
                let keep = !seen_letter;
                seen_letter = true;
                keep
            } else {
                true
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    New,
    Learning,
    Review,
    Relearning,
}

impl Lifecycle {
    pub fn label(&self) -> &'static str {
        match self {
            Lifecycle::New => "New",
            Lifecycle::Learning => "Learning",
            Lifecycle::Review => "Review",
            Lifecycle::Relearning => "Relearning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EaseState {
    pub ease: f64,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsrsState {
    pub difficulty: f64,
    pub stability: f64,
    pub lifecycle: Lifecycle,
    pub reps: u32,
    pub lapses: u32,
    pub streak: u32,
    /// Warm-up ratings consumed so far. Steady state once it reaches the
    /// length of the configured warm-up sequence.
    pub warmup: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum CardState {
    Ease(EaseState),
    Fsrs(FsrsState),
}

impl CardState {
    pub fn scheme(&self) -> Scheme {
        match self {
            CardState::Ease(_) => Scheme::Ease,
            CardState::Fsrs(_) => Scheme::Fsrs,
        }
    }

    pub fn streak(&self) -> u32 {
        match self {
            CardState::Ease(s) => s.streak,
            CardState::Fsrs(s) => s.streak,
        }
    }

    /// Ease for the ease scheme, difficulty for FSRS.
    pub fn hardness(&self) -> f64 {
        match self {
            CardState::Ease(s) => s.ease,
            CardState::Fsrs(s) => s.difficulty,
        }
    }

    pub fn lifecycle(&self) -> Option<Lifecycle> {
        match self {
            CardState::Ease(_) => None,
            CardState::Fsrs(s) => Some(s.lifecycle),
        }
    }
}

/// Memory state for one line of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub due: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
    pub display: DisplayTier,
    pub state: CardState,
}

impl Card {
    pub fn scheme(&self) -> Scheme {
        self.state.scheme()
    }
}

/// How a card comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// One outcome recorded after chunked rehearsal; warm-up applies.
    Learned(Rating),
    /// Already-known material entered directly from a single rating.
    Ingested(Rating),
}

impl Seed {
    pub fn rating(&self) -> Rating {
        match self {
            Seed::Learned(r) | Seed::Ingested(r) => *r,
        }
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
