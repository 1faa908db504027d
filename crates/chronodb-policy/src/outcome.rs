use std::fmt;

/// Result of a successful policy execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyOutcome {
    /// The policy did its work for this run.
    Completed,
    /// Nothing was eligible; the run was a no-op.
    NoWork,
    /// Work remains; the job should run again without waiting for its interval.
    NeedsImmediateRerun,
}

impl PolicyOutcome {
    /// Label used for the `outcome` metric dimension.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyOutcome::Completed => "completed",
            PolicyOutcome::NoWork => "no_work",
            PolicyOutcome::NeedsImmediateRerun => "rerun",
        }
    }
}

impl fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
