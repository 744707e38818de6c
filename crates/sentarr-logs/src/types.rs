//! Line values produced by the tailer.

use chrono::{DateTime, Utc};

/// A single line read from a followed log file.
///
/// Lines are ephemeral: they are handed to the classifier and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Line content without the trailing newline.
    pub text: String,
    /// When the tailer read the line.
    pub received_at: DateTime<Utc>,
    /// Byte offset of the first character of the line in the source file.
    pub offset: u64,
}

impl LogLine {
    /// Creates a line received now.
    #[must_use]
    pub fn new(text: impl Into<String>, offset: u64) -> Self {
        Self::at(text, Utc::now(), offset)
    }

    /// Creates a line with an explicit arrival time.
    #[must_use]
    pub fn at(text: impl Into<String>, received_at: DateTime<Utc>, offset: u64) -> Self {
        Self {
            text: text.into(),
            received_at,
            offset,
        }
    }

    /// Returns the line content.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl AsRef<str> for LogLine {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_at_keeps_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let line = LogLine::at("ERROR - stream failed", ts, 128);

        assert_eq!(line.as_str(), "ERROR - stream failed");
        assert_eq!(line.received_at, ts);
        assert_eq!(line.offset, 128);
    }

    #[test]
    fn line_as_ref() {
        let line = LogLine::new("hello", 0);
        let s: &str = line.as_ref();
        assert_eq!(s, "hello");
    }
}
