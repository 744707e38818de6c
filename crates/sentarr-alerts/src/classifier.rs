//! Ordered pattern classification of Plex log lines.
//!
//! A [`Classifier`] holds an ordered list of [`PatternRule`]s. A line gets the
//! category of the *first* rule that matches; later rules are never consulted.
//! Severity comes from [`resolve_severity`].

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::{AlertError, Result};
use crate::types::{Category, Severity};

/// Lines longer than this are rejected before matching.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Upper-case level tokens Plex writes into each line.
static LEVEL_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(CRITICAL|FATAL|ERROR|WARNING|WARN)\b").unwrap_or_else(|_| unreachable!())
});

/// The built-in Plex rule table, in priority order.
const PLEX_PATTERNS: [(Category, &str); 9] = [
    (Category::StreamError, r"ERROR.*(stream|playback|transcode)"),
    (Category::DatabaseError, r"ERROR.*(database|sqlite|corruption)"),
    (Category::NetworkError, r"ERROR.*(network|connection|timeout)"),
    (Category::AuthError, r"ERROR.*(authentication|unauthorized|token)"),
    (Category::ScannerError, r"ERROR.*(scanner|metadata|library)"),
    (Category::DiskError, r"ERROR.*(disk|i/o error|read error)"),
    (Category::TranscodingWarning, r"WARN.*(transcode|codec)"),
    (Category::PerformanceWarning, r"WARN.*(slow|performance|timeout)"),
    (Category::PermissionWarning, r"WARN.*(permission|access denied)"),
];

static PLEX_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    PLEX_PATTERNS
        .iter()
        .map(|(category, pattern)| {
            PatternRule::new(*category, pattern).unwrap_or_else(|_| unreachable!())
        })
        .collect()
});

/// The outcome of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The category of the first matching rule.
    pub category: Category,
    /// Effective severity after level-token escalation.
    pub severity: Severity,
    /// The span of the line the rule matched.
    pub matched_text: String,
}

/// One entry of the ordered rule table.
#[derive(Debug, Clone)]
pub struct PatternRule {
    category: Category,
    severity: Severity,
    regex: Regex,
}

impl PatternRule {
    /// Compiles a case-insensitive rule using the category's default severity.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not compile.
    pub fn new(category: Category, pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AlertError::config(format!("invalid pattern for {category}: {e}")))?;
        Ok(Self {
            category,
            severity: category.default_severity(),
            regex,
        })
    }

    /// Returns the category this rule assigns.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Returns the base severity of this rule.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Maps log lines to at most one category.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<PatternRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::plex_defaults()
    }
}

impl Classifier {
    /// Creates a classifier from an ordered rule list.
    #[must_use]
    pub const fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Creates a classifier with the built-in Plex rules.
    #[must_use]
    pub fn plex_defaults() -> Self {
        Self::new(PLEX_RULES.clone())
    }

    /// Returns the rules in match order.
    #[must_use]
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Classifies a line. First match wins.
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<Classification> {
        self.rules.iter().find_map(|rule| {
            rule.regex.find(line).map(|m| Classification {
                category: rule.category,
                severity: escalate(rule.severity, line),
                matched_text: m.as_str().to_string(),
            })
        })
    }

    /// Like [`Classifier::classify`], but rejects oversized lines.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Classification`] if the line exceeds [`MAX_LINE_BYTES`].
    pub fn try_classify(&self, line: &str) -> Result<Option<Classification>> {
        if line.len() > MAX_LINE_BYTES {
            return Err(AlertError::Classification {
                reason: format!("line of {} bytes exceeds {MAX_LINE_BYTES}", line.len()),
            });
        }
        Ok(self.classify(line))
    }
}

/// Returns the most severe level token present in the line, if any.
///
/// Tokens are matched case-sensitively as whole words.
#[must_use]
pub fn level_token(line: &str) -> Option<Severity> {
    LEVEL_TOKEN_REGEX
        .find_iter(line)
        .map(|m| match m.as_str() {
            "CRITICAL" | "FATAL" => Severity::Critical,
            "ERROR" => Severity::Error,
            _ => Severity::Warning,
        })
        .max()
}

/// Effective severity of a line of the given category.
///
/// A level token can escalate the category default but never lower it.
#[must_use]
pub fn resolve_severity(category: Category, line: &str) -> Severity {
    escalate(category.default_severity(), line)
}

fn escalate(base: Severity, line: &str) -> Severity {
    level_token(line).map_or(base, |token| base.max(token))
}
