//! Additive password strength scoring.
//!
//! | Rule | Points |
//! |---|---|
//! | length ≥ 8 | +20 |
//! | length ≥ 12 | +15 |
//! | length ≥ 50 | +10 |
//! | each class present (lower, upper, digit, special) | +15 |
//! | same character three times in a row | −20 |
//! | exact match with a common password | −50 |
//!
//! The total is capped at 100 and has no lower bound. Below 45 is weak,
//! below 80 medium, anything else strong.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Short list of passwords that are never acceptable.
pub const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "12345678", "123456789", "qwerty", "abc123", "111111", "letmein",
    "welcome", "admin", "iloveyou", "monkey", "dragon", "password1",
];

/// Strength level derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLevel {
    /// Score below 45.
    Weak,
    /// Score from 45 up to 80.
    Medium,
    /// Score of 80 or more.
    Strong,
}

impl StrengthLevel {
    fn from_score(score: i32) -> Self {
        if score < 45 {
            Self::Weak
        } else if score < 80 {
            Self::Medium
        } else {
            Self::Strong
        }
    }
}

impl fmt::Display for StrengthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weak => f.write_str("weak"),
            Self::Medium => f.write_str("medium"),
            Self::Strong => f.write_str("strong"),
        }
    }
}

/// Result of [`strength`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strength {
    /// Score, at most 100.
    pub score: i32,
    /// Level derived from the score.
    pub level: StrengthLevel,
    /// What would raise the score.
    pub suggestions: Vec<String>,
}

/// Score `password`.
pub fn strength(password: &str) -> Strength {
    let mut score = 0;
    let mut suggestions = Vec::new();
    let length = password.chars().count();

    if length >= 8 {
        score += 20;
    } else {
        suggestions.push("Use at least 8 characters".to_string());
    }
    if length >= 12 {
        score += 15;
    } else if length >= 8 {
        suggestions.push("Use 12 or more characters".to_string());
    }
    if length >= 50 {
        score += 10;
    }

    let classes: [(fn(char) -> bool, &str); 4] = [
        (|c| c.is_lowercase(), "Add lowercase letters"),
        (|c| c.is_uppercase(), "Add uppercase letters"),
        (|c| c.is_ascii_digit(), "Add numbers"),
        (|c| !c.is_alphanumeric(), "Add special characters"),
    ];
    for (matches, hint) in classes {
        if password.chars().any(matches) {
            score += 15;
        } else {
            suggestions.push(hint.to_string());
        }
    }

    if has_triple_repeat(password) {
        score -= 20;
        suggestions.push("Avoid repeating the same character".to_string());
    }

    let lower = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lower.as_str()) {
        score -= 50;
        suggestions.push("Avoid common passwords".to_string());
    }

    let score = score.min(100);
    Strength {
        score,
        level: StrengthLevel::from_score(score),
        suggestions,
    }
}

fn has_triple_repeat(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}
