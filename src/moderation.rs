use thiserror::Error;

/// Minimum question length after trimming, in characters.
pub const MIN_LEN: usize = 20;
/// Maximum question length after trimming, in characters.
pub const MAX_LEN: usize = 400;

/// Punctuation accepted in submitted questions, beyond ASCII letters,
/// digits and whitespace. The en and em dash are deliberate inclusions.
const ALLOWED_PUNCTUATION: &str = ".,:;!?'\"()-\u{2013}\u{2014}/&%+*=#@";

/// Words replaced by their masked form before a question leaves the device.
const DENYLIST: [&str; 7] = [
    "fuck", "shit", "bitch", "asshole", "dick", "cunt", "bastard",
];

/// Why a submitted question was rejected. The display strings are shown to
/// the user verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Too short (min 20 chars)")]
    TooShort,

    #[error("Too long (max 400 chars)")]
    TooLong,

    #[error("Only English letters, numbers and punctuation")]
    InvalidCharacters,
}

/// Validate a question and return its masked form.
///
/// Checks run in order on the trimmed input: minimum length, maximum
/// length, allowed character set. On success the denylist mask is applied.
/// Both the immediate-submit path and the offline enqueue path call this,
/// so queued and direct submissions enforce the same policy.
pub fn validate_question(input: &str) -> Result<String, Rejection> {
    let trimmed = input.trim();
    let len = trimmed.chars().count();

    if len < MIN_LEN {
        return Err(Rejection::TooShort);
    }
    if len > MAX_LEN {
        return Err(Rejection::TooLong);
    }
    if !trimmed.chars().all(is_allowed_char) {
        return Err(Rejection::InvalidCharacters);
    }

    Ok(mask_denylisted(trimmed))
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(c)
}

/// Replace each whole-word denylist match with first char + asterisks +
/// last char (at least one asterisk), preserving the original casing of
/// the kept characters. Matching is case-insensitive and word-bounded:
/// "shithead" stays untouched while "shit!" is masked.
fn mask_denylisted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            flush_word(&mut out, &mut word);
            out.push(c);
        }
    }
    flush_word(&mut out, &mut word);

    out
}

fn flush_word(out: &mut String, word: &mut String) {
    if word.is_empty() {
        return;
    }
    if DENYLIST.contains(&word.to_ascii_lowercase().as_str()) {
        out.push_str(&mask_word(word));
    } else {
        out.push_str(word);
    }
    word.clear();
}

fn mask_word(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    let stars = chars.len().saturating_sub(2).max(1);

    let mut masked = String::with_capacity(chars.len() + 1);
    masked.push(chars[0]);
    for _ in 0..stars {
        masked.push('*');
    }
    masked.push(chars[chars.len() - 1]);
    masked
}
