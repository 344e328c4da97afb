use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::VerdictKind;
use crate::harness::{CaseOutcome, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub name: String,
    pub verdict: VerdictKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_ms: Option<f64>,
}

impl From<&CaseOutcome> for CaseRecord {
    fn from(outcome: &CaseOutcome) -> Self {
        Self {
            name: outcome.name.clone(),
            verdict: outcome.verdict.kind(),
            message: outcome.verdict.message().map(str::to_string),
            stage: outcome.stage,
            diagnostics: outcome.diagnostics.clone(),
            elapsed_ms: outcome.elapsed.as_secs_f64() * 1000.0,
            device_ms: outcome.device_time.map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}

/// Counts per verdict. Skipped cases are neither passes nor failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub quality_warnings: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn count(&mut self, kind: VerdictKind) {
        self.total += 1;
        match kind {
            VerdictKind::Pass => self.passed += 1,
            VerdictKind::Fail => self.failed += 1,
            VerdictKind::QualityWarning => self.quality_warnings += 1,
            VerdictKind::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub summary: RunSummary,
    pub cases: Vec<CaseRecord>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_adapter(info: &wgpu::AdapterInfo) -> Self {
        Self {
            adapter: Some(info.name.clone()),
            backend: Some(format!("{:?}", info.backend)),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &CaseOutcome) {
        let record = CaseRecord::from(outcome);
        self.summary.count(record.verdict);
        self.cases.push(record);
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn print_summary(&self) {
        let s = &self.summary;
        eprintln!(
            "spvexec: {} cases, {} passed, {} failed, {} quality warnings, {} skipped",
            s.total, s.passed, s.failed, s.quality_warnings, s.skipped
        );

        let flagged: Vec<&CaseRecord> = self
            .cases
            .iter()
            .filter(|c| matches!(c.verdict, VerdictKind::Fail | VerdictKind::QualityWarning))
            .collect();
        if !flagged.is_empty() {
            eprintln!("flagged:");
            for case in flagged {
                eprintln!(
                    "  - {} [{}]: {}",
                    case.name,
                    case.verdict,
                    case.message.as_deref().unwrap_or("")
                );
            }
        }
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Verdict;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn outcome(name: &str, verdict: Verdict, stage: Stage) -> CaseOutcome {
        CaseOutcome {
            name: name.to_string(),
            verdict,
            stage,
            diagnostics: Vec::new(),
            elapsed: Duration::from_millis(2),
            device_time: None,
        }
    }

    #[test]
    fn skipped_is_counted_separately() {
        let mut report = RunReport::new();
        report.record(&outcome("a", Verdict::Pass, Stage::Verification));
        report.record(&outcome("b", Verdict::Skipped("no f64".into()), Stage::Gate));
        report.record(&outcome(
            "c",
            Verdict::QualityWarning("imprecise".into()),
            Stage::Verification,
        ));
        assert_eq!(
            report.summary,
            RunSummary {
                total: 3,
                passed: 1,
                failed: 0,
                quality_warnings: 1,
                skipped: 1,
            }
        );
        assert!(!report.has_failures());

        report.record(&outcome("d", Verdict::Fail("boom".into()), Stage::Execution));
        assert!(report.has_failures());
    }

    #[test]
    fn json_report_round_trips() {
        let mut report = RunReport::new();
        report.record(&outcome("neg", Verdict::Fail("mismatch".into()), Stage::Verification));

        let dir = std::env::temp_dir().join(format!("spvexec-report-{}", std::process::id()));
        let path = dir.join("nested").join("report.json");
        report.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"verdict\": \"fail\""), "{text}");
        assert!(text.contains("\"stage\": \"verification\""), "{text}");
        let parsed: RunReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, report);
        std::fs::remove_dir_all(&dir).ok();
    }
}
