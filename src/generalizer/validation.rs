//! Validation of generalized statements.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Pronouns a generalized statement must not contain.
pub const FORBIDDEN_PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "myself", "we", "us", "our", "ours", "ourselves", "you", "your",
    "yours", "yourself", "yourselves",
];

static PRONOUN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let alternation = FORBIDDEN_PRONOUNS.join("|");
    Regex::new(&format!(r"(?i)\b({})\b", alternation)).expect("valid regex")
});

/// Why a generalized statement was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Empty,
    TooLong { length: usize, max: usize },
    Pronoun(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "the answer was empty"),
            Self::TooLong { length, max } => {
                write!(f, "the answer has {} characters, the limit is {}", length, max)
            }
            Self::Pronoun(p) => write!(f, "the answer contains the pronoun '{}'", p),
        }
    }
}

/// First forbidden pronoun in `text`, matched on word boundaries.
pub fn find_forbidden_pronoun(text: &str) -> Option<String> {
    PRONOUN_PATTERN
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// Check a cleaned generalization against the output rules.
pub fn validate_generalization(text: &str, max_length: usize) -> Result<(), Violation> {
    if text.trim().is_empty() {
        return Err(Violation::Empty);
    }
    let length = text.chars().count();
    if length > max_length {
        return Err(Violation::TooLong {
            length,
            max: max_length,
        });
    }
    if let Some(p) = find_forbidden_pronoun(text) {
        return Err(Violation::Pronoun(p));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pronoun_adjacent_to_punctuation() {
        assert_eq!(find_forbidden_pronoun("Trust, (you) know, matters"), Some("you".to_string()));
        assert_eq!(find_forbidden_pronoun("Ask questions, then I."), Some("I".to_string()));
        assert_eq!(find_forbidden_pronoun("I'm careful"), Some("I".to_string()));
    }

    #[test]
    fn test_pronoun_inside_words_is_allowed() {
        assert!(find_forbidden_pronoun("Youthful curiosity drives insight").is_none());
        assert!(find_forbidden_pronoun("Use humour with museum guests").is_none());
        assert!(find_forbidden_pronoun("Pursue tourism with humility").is_none());
    }

    #[test]
    fn test_validate_rules() {
        assert_eq!(validate_generalization("  ", 50), Err(Violation::Empty));
        assert_eq!(
            validate_generalization("Prefer honesty over comfort", 10),
            Err(Violation::TooLong { length: 27, max: 10 })
        );
        assert_eq!(
            validate_generalization("Tell your truth", 50),
            Err(Violation::Pronoun("your".to_string()))
        );
        assert!(validate_generalization("Prefer honesty over comfort", 50).is_ok());
    }
}
