use std::fmt;

use serde::{Deserialize, Serialize};

use crate::verify::VerifyOutcome;

/// Final result of one test specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    /// The output mismatched but the test only reports it as a quality problem.
    QualityWarning(String),
    /// The device cannot run the test. Not a pass.
    Skipped(String),
}

impl Verdict {
    pub fn kind(&self) -> VerdictKind {
        match self {
            Verdict::Pass => VerdictKind::Pass,
            Verdict::Fail(_) => VerdictKind::Fail,
            Verdict::QualityWarning(_) => VerdictKind::QualityWarning,
            Verdict::Skipped(_) => VerdictKind::Skipped,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(msg) | Verdict::QualityWarning(msg) | Verdict::Skipped(msg) => {
                Some(msg)
            }
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Verdict::Fail(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "{}: {msg}", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Pass,
    Fail,
    QualityWarning,
    Skipped,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerdictKind::Pass => "pass",
            VerdictKind::Fail => "fail",
            VerdictKind::QualityWarning => "quality warning",
            VerdictKind::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Fail,
    QualityWarning,
}

/// How an output mismatch is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchPolicy {
    pub severity: Severity,
    /// Replaces the mismatch description in the verdict.
    pub message: Option<String>,
}

impl MismatchPolicy {
    pub fn quality_warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::QualityWarning,
            message: Some(message.into()),
        }
    }

    pub fn fail_with(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fail,
            message: Some(message.into()),
        }
    }
}

pub fn classify(outcome: &VerifyOutcome, policy: &MismatchPolicy) -> Verdict {
    let report = match outcome {
        VerifyOutcome::Match => return Verdict::Pass,
        VerifyOutcome::Mismatch(report) => report,
    };
    let message = policy
        .message
        .clone()
        .unwrap_or_else(|| report.description.clone());
    match policy.severity {
        Severity::Fail => Verdict::Fail(message),
        Severity::QualityWarning => Verdict::QualityWarning(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::MismatchReport;

    fn mismatch() -> VerifyOutcome {
        VerifyOutcome::Mismatch(MismatchReport {
            description: "output 0: 4 of 8 bytes differ (first at byte 4)".into(),
            diagnostics: vec![],
        })
    }

    #[test]
    fn match_is_always_pass() {
        for policy in [
            MismatchPolicy::default(),
            MismatchPolicy::quality_warning("imprecise"),
        ] {
            assert_eq!(classify(&VerifyOutcome::Match, &policy), Verdict::Pass);
        }
    }

    #[test]
    fn mismatch_fails_with_the_description_by_default() {
        assert_eq!(
            classify(&mismatch(), &MismatchPolicy::default()),
            Verdict::Fail("output 0: 4 of 8 bytes differ (first at byte 4)".into())
        );
        assert_eq!(
            classify(&mismatch(), &MismatchPolicy::fail_with("wrong rounding")),
            Verdict::Fail("wrong rounding".into())
        );
    }

    #[test]
    fn quality_warning_downgrade_keeps_the_message() {
        let verdict = classify(
            &mismatch(),
            &MismatchPolicy::quality_warning("denorms flushed"),
        );
        assert_eq!(verdict, Verdict::QualityWarning("denorms flushed".into()));
        assert_eq!(verdict.to_string(), "quality warning: denorms flushed");
        assert!(!verdict.is_fail());
    }
}
