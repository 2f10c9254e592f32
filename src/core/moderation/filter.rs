// Lexical filter - the local, always-available moderation tier.
//
// Runs on every submission before any remote call: contact-pattern pass
// (links, phones, @handles) on the raw text, then normalized root matching
// with exception windows over the loaded lexicon. Deterministic: the first
// matching term in configured order wins.
//
// No network, no shared state - just the term set loaded at startup.

use super::lexicon::{normalize, Lexicon, LexiconError, TermCategory};
use regex::Regex;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// The term (or pattern) that caused a rejection. `term` is the normalized
/// root for lexicon hits, or the matched snippet for contact-pattern hits;
/// it goes to the operational log, never to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermHit {
    pub category: TermCategory,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Allowed,
    Rejected(TermHit),
}

impl FilterDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, FilterDecision::Allowed)
    }
}

// ============================================================================
// CONTACT PATTERNS
// ============================================================================

// Checked on the raw text (digit folding in `normalize` would destroy phone
// numbers). Compiled once at filter construction.
struct ContactRules {
    url: Regex,
    mention: Regex,
    digit_run: Regex,
}

impl ContactRules {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            url: Regex::new(
                r"(?i)https?://\S+|www\.\S+|t\.me/\S+|telegram\.me/\S+|\b[a-z0-9-]+\.(?:ru|com|net|org|info|biz|рф|su|me|io|co|cc|ws|top|xyz|online|site|club|shop|store|pro|space|tech|live|tv|link|click|pw|tk|ml|ga|cf|gq)\b",
            )?,
            mention: Regex::new(r"@[a-zA-Z][a-zA-Z0-9_]{3,}")?,
            digit_run: Regex::new(r"\+?[0-9]+")?,
        })
    }

    fn check(&self, text: &str) -> Option<TermHit> {
        if let Some(m) = self.url.find(text).or_else(|| self.mention.find(text)) {
            return Some(TermHit {
                category: TermCategory::Links,
                term: m.as_str().to_string(),
            });
        }

        // Strip the separators people pad numbers with, then classify the
        // remaining maximal digit runs by length. A 16-digit serial number
        // is one long run, not a phone.
        let compact: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
            .collect();
        for m in self.digit_run.find_iter(&compact) {
            if looks_like_phone(m.as_str()) {
                return Some(TermHit {
                    category: TermCategory::Phones,
                    term: m.as_str().to_string(),
                });
            }
        }

        None
    }
}

// Russian numbers are 11 digits with an 8/+7 prefix; bare 10-11 digit runs
// and international +XX runs of 10-15 digits count too.
fn looks_like_phone(run: &str) -> bool {
    match run.strip_prefix('+') {
        Some(digits) => (10..=15).contains(&digits.len()),
        None => (10..=11).contains(&run.len()),
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Word-root matcher with exception windows.
///
/// A root occurrence is suppressed when it lies fully inside an occurrence of
/// one of the term's exception strings ("еб" inside "мебель", "анал" inside
/// "канал"). Matching happens in the normalized string space shared with the
/// lexicon, so lookalike tricks fold away before comparison.
pub struct LexicalFilter {
    lexicon: Lexicon,
    contacts: ContactRules,
}

impl LexicalFilter {
    pub fn new(lexicon: Lexicon) -> Result<Self, LexiconError> {
        Ok(Self {
            lexicon,
            contacts: ContactRules::compile()?,
        })
    }

    /// Check one piece of text. Total and deterministic; empty text passes.
    pub fn check(&self, text: &str) -> FilterDecision {
        if text.trim().is_empty() {
            return FilterDecision::Allowed;
        }

        if let Some(hit) = self.contacts.check(text) {
            return FilterDecision::Rejected(hit);
        }

        let normalized = normalize(text);
        for term in self.lexicon.terms() {
            'occurrence: for (start, matched) in normalized.match_indices(term.root.as_str()) {
                let end = start + matched.len();
                for exc in &term.exceptions {
                    for (exc_start, exc_match) in normalized.match_indices(exc.as_str()) {
                        if exc_start <= start && end <= exc_start + exc_match.len() {
                            continue 'occurrence;
                        }
                    }
                }
                return FilterDecision::Rejected(TermHit {
                    category: term.category,
                    term: term.root.clone(),
                });
            }
        }

        FilterDecision::Allowed
    }
}

// ============================================================================
// TESTS
// ============================================================================
