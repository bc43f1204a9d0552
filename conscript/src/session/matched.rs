//! Result of a successful expectation.

use std::fmt;
use std::time::Duration;

/// What an `expect` call matched.
#[derive(Debug, Clone)]
pub struct ExpectMatch {
    /// Unconsumed output that preceded the match.
    pub before: String,

    /// The matched text itself.
    pub matched: String,

    /// Time spent waiting.
    pub elapsed: Duration,
}

impl ExpectMatch {
    pub(crate) fn new(before: String, matched: String, elapsed: Duration) -> Self {
        Self {
            before,
            matched,
            elapsed,
        }
    }

    /// The preceding output and the match, in order.
    pub fn output(&self) -> String {
        format!("{}{}", self.before, self.matched)
    }
}

impl fmt::Display for ExpectMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.before, self.matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_joins_before_and_match() {
        let m = ExpectMatch::new(
            "Database disk\n1) /dev/vdb\n".into(),
            "Choose the database disk: ".into(),
            Duration::from_millis(5),
        );
        assert_eq!(m.output(), m.to_string());
        assert!(m.output().ends_with("/dev/vdb\nChoose the database disk: "));
    }
}
