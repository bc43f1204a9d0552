//! Record of a finished dialogue.

use std::time::Duration;

/// Result of running a dialogue to completion.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Name of the dialogue.
    pub dialogue: String,

    /// One record per step, in order.
    pub steps: Vec<StepRecord>,

    /// Total time for the entire dialogue.
    pub elapsed: Duration,
}

impl Transcript {
    /// Create a new transcript.
    pub fn new(dialogue: impl Into<String>, steps: Vec<StepRecord>, elapsed: Duration) -> Self {
        Self {
            dialogue: dialogue.into(),
            steps,
            elapsed,
        }
    }

    /// Get the final output (from the last step).
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }

    /// Get all outputs concatenated.
    pub fn full_output(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.output.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Everything that was typed, secrets masked.
    pub fn inputs(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.input.as_deref())
            .collect()
    }
}

/// Result of a single step in a dialogue.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Position of the step in the dialogue.
    pub index: usize,

    /// Log-safe description of the step.
    pub description: String,

    /// The input that was typed (masked if secret). `None` for expectations
    /// and for answers that only waited.
    pub input: Option<String>,

    /// Output consumed by the step: preceding text plus the matched prompt.
    pub output: String,

    /// Time taken for this step.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, input: Option<&str>, output: &str) -> StepRecord {
        StepRecord {
            index,
            description: format!("step {index}"),
            input: input.map(str::to_owned),
            output: output.to_string(),
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_transcript_outputs() {
        let transcript = Transcript::new(
            "d",
            vec![
                record(0, Some("ap"), ""),
                record(1, None, "Press any key"),
                record(2, Some("7"), "Choose: "),
            ],
            Duration::from_millis(30),
        );

        assert_eq!(transcript.final_output(), Some("Choose: "));
        assert_eq!(transcript.full_output(), "Press any keyChoose: ");
        assert_eq!(transcript.inputs(), vec!["ap", "7"]);
    }
}
