//! Wildmat pattern matching (RFC 3977 Section 4)
//!
//! A wildmat is a comma-separated list of glob patterns, each optionally
//! prefixed with `!` for negation. `*` matches any sequence (including the
//! empty one), `?` matches exactly one character, and matching is
//! case-insensitive. Patterns are evaluated right-to-left: the first pattern
//! that matches decides the verdict.

use crate::error::{NntpError, Result};

/// A compiled wildmat expression
///
/// # Example
///
/// ```
/// use nntpd_rs::Wildmat;
///
/// let w = Wildmat::parse("comp.*,!*.go").unwrap();
/// assert!(w.matches("comp.lang.rs"));
/// assert!(!w.matches("comp.lang.go"));
/// assert!(!w.matches("rec.food"));
/// ```
#[derive(Debug, Clone)]
pub struct Wildmat {
    /// Patterns in source order; `true` marks a negated pattern
    patterns: Vec<(bool, String)>,
}

impl Wildmat {
    /// Compile a wildmat expression
    ///
    /// The empty expression compiles to a wildmat that matches everything.
    ///
    /// # Errors
    ///
    /// Returns an error for a pattern that is empty or consists of a bare `!`.
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Ok(Self {
                patterns: Vec::new(),
            });
        }

        let mut patterns = Vec::new();
        for part in expression.split(',') {
            let part = part.trim();
            let (negated, pattern) = match part.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, part),
            };
            if pattern.is_empty() {
                return Err(NntpError::Other(format!(
                    "Empty pattern in wildmat expression: {expression}"
                )));
            }
            patterns.push((negated, pattern.to_ascii_lowercase()));
        }

        Ok(Self { patterns })
    }

    /// A wildmat that matches every name
    pub fn match_all() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Test a name against the expression
    ///
    /// The right-most matching pattern decides: a negated pattern yields
    /// `false`, a positive one `true`. If no pattern matches, the result is
    /// `false`. The empty expression matches everything.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let name = name.to_ascii_lowercase();
        for (negated, pattern) in self.patterns.iter().rev() {
            if glob_match(pattern.as_bytes(), name.as_bytes()) {
                return !negated;
            }
        }
        false
    }
}

/// Glob match with `*` and `?` over byte strings
///
/// Iterative with single-star backtracking; inputs are already lowercased.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            // Let the most recent star swallow one more character
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
