//! Canonical artist keys.
//!
//! Two names from any source denote the same artist exactly when
//! [`normalize`] maps them to the same [`CanonicalKey`]. The rules are
//! applied in a fixed order; each pattern assumes the shape the previous
//! step left behind.

pub mod numbers;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key shared by names that are only placeholder glyphs, and the token that
/// replaces emoticon decorations.
pub const UNKNOWN_ARTIST: &str = "@artist";

static EMOTICON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*:[()]\s*").expect("emoticon pattern"));
static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[_\-:;/.,"`']"#).expect("separator pattern"));
static TRAILING_BANGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"!+$").expect("trailing bang pattern"));
static BANGS_BEFORE_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!+([^\w!])").expect("bang pattern"));
static BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]{}()]").expect("bracket pattern"));
static LEADING_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:the|a)\s+").expect("article pattern"));
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern"));

/// The identity of an artist across every source.
///
/// Produced by [`normalize`]. Keys read back from a registry dump
/// deserialize as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Wraps a string that is already known to be normalizer output.
    ///
    /// Nothing is checked. Lookups with a key built from a raw name are
    /// not guaranteed to match anything.
    pub fn assume_canonical(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for the placeholder bucket (`?`, `...`).
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_ARTIST
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps a free-text artist name to its canonical key.
///
/// Total and deterministic: every input, including the empty string,
/// produces a key.
pub fn normalize(raw_name: &str) -> CanonicalKey {
    let name = raw_name.to_lowercase();

    let trimmed = name.trim();
    if trimmed == "?" || trimmed == "..." {
        return CanonicalKey(UNKNOWN_ARTIST.to_string());
    }

    // Decorated and undecorated names must not collapse into one key
    let name = EMOTICON.replace_all(&name, " @artist ");
    let name = SEPARATORS.replace_all(&name, " ");

    // "!" closing a word is punctuation, inside a word it stands for "i"
    let name = TRAILING_BANGS.replace(&name, "");
    let name = BANGS_BEFORE_NON_WORD.replace_all(&name, "$1");
    let name = name.replace('!', "i");

    let name = BRACKETS.replace_all(&name, "");
    let name = LEADING_ARTICLE.replace(&name, "");
    let name = MULTI_SPACE.replace_all(&name, " ");

    let name = numbers::convert(&name);
    let name = name.replace(" and ", " & ");

    let name = MULTI_SPACE.replace_all(&name, " ");
    CanonicalKey(name.trim().to_string())
}
