//! Content block domain model.
//!
//! # Responsibility
//! - Define the closed set of typed blocks a note is composed of.
//! - Own the persisted JSON shape of every block variant.
//! - Provide the pure helpers the presentation layer derives labels from
//!   (relative day, grouped money amounts, link open targets).
//!
//! # Invariants
//! - Blocks are plain values: equality is structural, copies never alias.
//! - Money amounts are raw `i64`; arithmetic is checked integer math only.
//! - Key symbols are restricted to the named set; free text is a label.
//! - Unknown block tags or key symbols fail to decode.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static MONEY_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*$").expect("valid money input regex"));
static LINK_SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid link scheme regex"));

/// Days on either side of today that get a relative label.
const RELATIVE_DAY_WINDOW: i64 = 7;
const ABSOLUTE_DATE_FORMAT: &str = "%d-%m-%Y";

/// Error for content-level edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// Adjusting a money amount would leave the `i64` range.
    MoneyOverflow { amount: i64, delta: u64 },
    /// A money adjustment targeted a block of another type.
    NotMoney(ContentType),
    /// Adjustment input is not a plain non-negative integer.
    InvalidMoneyInput(String),
    /// Key symbol is not one of the named symbols.
    UnknownKeySymbol(String),
}

impl Display for ContentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoneyOverflow { amount, delta } => {
                write!(f, "money adjustment by {delta} overflows amount {amount}")
            }
            Self::NotMoney(kind) => write!(f, "expected a money block, found `{}`", kind.tag()),
            Self::InvalidMoneyInput(input) => write!(f, "invalid money input `{input}`"),
            Self::UnknownKeySymbol(icon_ref) => write!(f, "unknown key symbol `{icon_ref}`"),
        }
    }
}

impl Error for ContentError {}

/// Tag identifying one content block variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Money,
    Date,
    Link,
    KeyCombination,
}

impl ContentType {
    /// All variants in catalogue order.
    pub const ALL: [ContentType; 5] = [
        ContentType::Text,
        ContentType::Money,
        ContentType::Date,
        ContentType::Link,
        ContentType::KeyCombination,
    ];

    /// Wire tag used in the persisted payload.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Money => "money",
            Self::Date => "date",
            Self::Link => "link",
            Self::KeyCombination => "key_combination",
        }
    }

    /// Parses a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Builds the default block for this type, dating `Date` blocks `today`.
    pub fn default_block_on(self, today: NaiveDate) -> ContentBlock {
        match self {
            Self::Text => ContentBlock::Text {
                body: String::new(),
            },
            Self::Money => ContentBlock::Money { amount: 0 },
            Self::Date => ContentBlock::Date { value: today },
            Self::Link => ContentBlock::Link { url: String::new() },
            Self::KeyCombination => ContentBlock::KeyCombination { keys: Vec::new() },
        }
    }

    /// Builds the default block for this type using the local calendar date.
    pub fn default_block(self) -> ContentBlock {
        self.default_block_on(Local::now().date_naive())
    }
}

/// One typed unit of note content.
///
/// Serialized as an internally tagged object, e.g.
/// `{"type":"money","amount":5000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { body: String },
    /// Raw amount; the currency unit is chosen by presentation.
    Money { amount: i64 },
    /// Calendar date, persisted as `YYYY-MM-DD`.
    Date { value: NaiveDate },
    /// Unvalidated url as typed by the user.
    Link { url: String },
    KeyCombination { keys: Vec<Key> },
}

impl ContentBlock {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Text { .. } => ContentType::Text,
            Self::Money { .. } => ContentType::Money,
            Self::Date { .. } => ContentType::Date,
            Self::Link { .. } => ContentType::Link,
            Self::KeyCombination { .. } => ContentType::KeyCombination,
        }
    }

    /// Returns a money block adjusted by `adjustment`.
    ///
    /// # Errors
    /// - `NotMoney` when this block is not a money block.
    /// - `MoneyOverflow` when the result leaves the `i64` range.
    pub fn adjusted_money(&self, adjustment: MoneyAdjustment) -> Result<Self, ContentError> {
        match self {
            Self::Money { amount } => Ok(Self::Money {
                amount: adjustment.apply(*amount)?,
            }),
            other => Err(ContentError::NotMoney(other.content_type())),
        }
    }

    /// Returns whether any user-visible text of this block contains `needle`.
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches_text(&self, needle: &str) -> bool {
        match self {
            Self::Text { body } => body.to_lowercase().contains(needle),
            Self::Link { url } => url.to_lowercase().contains(needle),
            Self::KeyCombination { keys } => keys
                .iter()
                .any(|key| key.to_string().to_lowercase().contains(needle)),
            Self::Money { .. } | Self::Date { .. } => false,
        }
    }
}

/// One key inside a key combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Key {
    /// Free-form or named text key such as `Ctrl`.
    Label { text: String },
    /// Icon-rendered key from the fixed named set.
    Symbol(KeySymbol),
}

impl Key {
    pub const CTRL: &'static str = "Ctrl";
    pub const ALT: &'static str = "Alt";
    pub const SHIFT: &'static str = "Shift";
    pub const TAB: &'static str = "Tab";
    pub const ENTER: &'static str = "Enter";
    pub const ESC: &'static str = "Esc";
    pub const BACKSPACE: &'static str = "Backspace";
    pub const DELETE: &'static str = "Delete";
    pub const FN: &'static str = "Fn";
    pub const SPACE: &'static str = "Space";

    /// Named labels offered as one-tap keys.
    pub const NAMED_LABELS: [&'static str; 10] = [
        Self::CTRL,
        Self::ALT,
        Self::SHIFT,
        Self::TAB,
        Self::ENTER,
        Self::ESC,
        Self::BACKSPACE,
        Self::DELETE,
        Self::FN,
        Self::SPACE,
    ];

    pub fn label(text: impl Into<String>) -> Self {
        Self::Label { text: text.into() }
    }

    pub fn symbol(symbol: NamedSymbol) -> Self {
        Self::Symbol(KeySymbol::from(symbol))
    }

    /// Every named key, labels first, in palette order.
    pub fn special_keys() -> Vec<Key> {
        Self::NAMED_LABELS
            .into_iter()
            .map(Key::label)
            .chain(NamedSymbol::ALL.into_iter().map(Key::symbol))
            .collect()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Label { text } => f.write_str(text),
            Self::Symbol(symbol) => f.write_str(symbol.description()),
        }
    }
}

/// Fixed set of icon-rendered keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedSymbol {
    Windows,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl NamedSymbol {
    pub const ALL: [NamedSymbol; 5] = [
        NamedSymbol::Windows,
        NamedSymbol::ArrowUp,
        NamedSymbol::ArrowDown,
        NamedSymbol::ArrowLeft,
        NamedSymbol::ArrowRight,
    ];

    pub fn icon_ref(self) -> &'static str {
        match self {
            Self::Windows => "key_sym_windows",
            Self::ArrowUp => "key_sym_arrow_up",
            Self::ArrowDown => "key_sym_arrow_down",
            Self::ArrowLeft => "key_sym_arrow_left",
            Self::ArrowRight => "key_sym_arrow_right",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::ArrowUp => "Arrow Up",
            Self::ArrowDown => "Arrow Down",
            Self::ArrowLeft => "Arrow Left",
            Self::ArrowRight => "Arrow Right",
        }
    }

    pub fn from_icon_ref(icon_ref: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|symbol| symbol.icon_ref() == icon_ref)
    }
}

/// Persisted form of a named key symbol.
///
/// Only values produced from [`NamedSymbol`] exist; decoding validates the
/// icon reference against the named set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKeySymbol", into = "RawKeySymbol")]
pub struct KeySymbol {
    symbol: NamedSymbol,
    description: String,
}

impl KeySymbol {
    pub fn named(&self) -> NamedSymbol {
        self.symbol
    }

    pub fn icon_ref(&self) -> &'static str {
        self.symbol.icon_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<NamedSymbol> for KeySymbol {
    fn from(symbol: NamedSymbol) -> Self {
        Self {
            symbol,
            description: symbol.description().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawKeySymbol {
    icon_ref: String,
    description: String,
}

impl TryFrom<RawKeySymbol> for KeySymbol {
    type Error = ContentError;

    fn try_from(raw: RawKeySymbol) -> Result<Self, Self::Error> {
        let symbol = NamedSymbol::from_icon_ref(&raw.icon_ref)
            .ok_or(ContentError::UnknownKeySymbol(raw.icon_ref))?;
        Ok(Self {
            symbol,
            description: raw.description,
        })
    }
}

impl From<KeySymbol> for RawKeySymbol {
    fn from(value: KeySymbol) -> Self {
        Self {
            icon_ref: value.symbol.icon_ref().to_string(),
            description: value.description,
        }
    }
}

/// Appends one key to a combination.
pub fn push_key(keys: &[Key], key: Key) -> Vec<Key> {
    let mut next = keys.to_vec();
    next.push(key);
    next
}

/// Removes the last key of a combination; empty input stays empty.
pub fn pop_key(keys: &[Key]) -> Vec<Key> {
    let mut next = keys.to_vec();
    next.pop();
    next
}

/// Renders a key combination as `Ctrl + Shift + T`.
pub fn format_key_combination(keys: &[Key]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" + ")
}

/// One step of the money adjustment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyAdjustment {
    Add(u64),
    Subtract(u64),
}

impl MoneyAdjustment {
    /// Parses user input (digits only, surrounding whitespace allowed).
    pub fn parse(input: &str, adding: bool) -> Result<Self, ContentError> {
        let digits = MONEY_INPUT_RE
            .captures(input)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| ContentError::InvalidMoneyInput(input.to_string()))?;
        let value = digits
            .as_str()
            .parse::<u64>()
            .map_err(|_| ContentError::InvalidMoneyInput(input.to_string()))?;
        Ok(if adding {
            Self::Add(value)
        } else {
            Self::Subtract(value)
        })
    }

    /// Applies the adjustment with checked integer arithmetic.
    pub fn apply(self, amount: i64) -> Result<i64, ContentError> {
        let result = match self {
            Self::Add(delta) => i64::try_from(delta)
                .ok()
                .and_then(|delta| amount.checked_add(delta)),
            Self::Subtract(delta) => i64::try_from(delta)
                .ok()
                .and_then(|delta| amount.checked_sub(delta)),
        };
        result.ok_or(ContentError::MoneyOverflow {
            amount,
            delta: self.delta(),
        })
    }

    fn delta(self) -> u64 {
        match self {
            Self::Add(delta) | Self::Subtract(delta) => delta,
        }
    }
}

/// Formats an amount with comma-grouped thousands, e.g. `-1,234,567`.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        grouped.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Returns the url to open for a link block.
///
/// Urls without an `http://` or `https://` scheme get `https://` prefixed.
/// The stored url is left untouched.
pub fn link_open_target(url: &str) -> String {
    let trimmed = url.trim();
    if LINK_SCHEME_RE.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Relative label for a date block as seen from `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeDay {
    Today,
    Yesterday,
    Tomorrow,
    /// 2..=7 days in the future.
    DaysAfter(u32),
    /// 2..=7 days in the past.
    DaysBefore(u32),
    Absolute(NaiveDate),
}

impl RelativeDay {
    /// Classifies `value` relative to `today`.
    ///
    /// Pure function; the window boundaries are inclusive on both sides.
    pub fn classify(today: NaiveDate, value: NaiveDate) -> Self {
        let offset = value.signed_duration_since(today).num_days();
        match offset {
            0 => Self::Today,
            -1 => Self::Yesterday,
            1 => Self::Tomorrow,
            2..=RELATIVE_DAY_WINDOW => Self::DaysAfter(offset as u32),
            days if (-RELATIVE_DAY_WINDOW..=-2).contains(&days) => {
                Self::DaysBefore(days.unsigned_abs() as u32)
            }
            _ => Self::Absolute(value),
        }
    }
}

impl Display for RelativeDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Today => f.write_str("today"),
            Self::Yesterday => f.write_str("yesterday"),
            Self::Tomorrow => f.write_str("tomorrow"),
            Self::DaysAfter(days) => write!(f, "{days} days after"),
            Self::DaysBefore(days) => write!(f, "{days} days before"),
            Self::Absolute(date) => f.write_str(&format_absolute_date(*date)),
        }
    }
}

/// Formats a date as `dd-mm-yyyy`.
pub fn format_absolute_date(date: NaiveDate) -> String {
    date.format(ABSOLUTE_DATE_FORMAT).to_string()
}
