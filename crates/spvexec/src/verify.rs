//! Output and binary verification strategies.

use std::fmt::Write as _;

use spvexec_asm::BinaryModule;

use crate::resource::ResourceDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Match,
    Mismatch(MismatchReport),
}

impl VerifyOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, VerifyOutcome::Match)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    /// One-line summary used as the failure message.
    pub description: String,
    pub diagnostics: Vec<String>,
}

/// Free-form lines a verifier records while checking results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticLog {
    lines: Vec<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Custom output check. Returning `false` turns the run into a mismatch carrying the log.
pub trait OutputVerifier: Send + Sync {
    fn verify(
        &self,
        inputs: &[ResourceDescriptor],
        actual: &[Vec<u8>],
        expected: &[ResourceDescriptor],
        log: &mut DiagnosticLog,
    ) -> bool;
}

impl<F> OutputVerifier for F
where
    F: Fn(&[ResourceDescriptor], &[Vec<u8>], &[ResourceDescriptor], &mut DiagnosticLog) -> bool
        + Send
        + Sync,
{
    fn verify(
        &self,
        inputs: &[ResourceDescriptor],
        actual: &[Vec<u8>],
        expected: &[ResourceDescriptor],
        log: &mut DiagnosticLog,
    ) -> bool {
        self(inputs, actual, expected, log)
    }
}

/// Check run against the assembled module before anything touches the device.
pub trait BinaryVerifier: Send + Sync {
    fn verify(&self, module: &BinaryModule, log: &mut DiagnosticLog) -> bool;
}

impl<F> BinaryVerifier for F
where
    F: Fn(&BinaryModule, &mut DiagnosticLog) -> bool + Send + Sync,
{
    fn verify(&self, module: &BinaryModule, log: &mut DiagnosticLog) -> bool {
        self(module, log)
    }
}

/// Requires the given strings to appear among the module's string literals in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringsInOrder(pub Vec<String>);

impl StringsInOrder {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(markers.into_iter().map(Into::into).collect())
    }
}

impl BinaryVerifier for StringsInOrder {
    fn verify(&self, module: &BinaryModule, log: &mut DiagnosticLog) -> bool {
        let literals = module.string_literals();
        let mut remaining = literals.iter();
        for (i, marker) in self.0.iter().enumerate() {
            if !remaining.any(|s| s == marker) {
                log.log(format!(
                    "string {marker:?} (marker {i}) not found in order; module strings: {literals:?}"
                ));
                return false;
            }
        }
        true
    }
}

/// Default output comparison: read-back bytes must equal the expected bytes exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteExact {
    /// Differing offsets listed before the report is truncated.
    pub limit: usize,
}

impl ByteExact {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn compare(&self, expected: &[ResourceDescriptor], actual: &[Vec<u8>]) -> VerifyOutcome {
        let mut summaries = Vec::new();
        let mut diagnostics = Vec::new();
        let mut listed = 0usize;

        for (index, desc) in expected.iter().enumerate() {
            let want = desc.buffer.bytes();
            let Some(got) = actual.get(index) else {
                summaries.push(format!("output {index}: not read back"));
                continue;
            };

            let differing: Vec<usize> = want
                .iter()
                .zip(got.iter())
                .enumerate()
                .filter(|(_, (w, g))| w != g)
                .map(|(offset, _)| offset)
                .collect();

            if got.len() != want.len() {
                summaries.push(format!(
                    "output {index}: expected {} bytes, read back {}",
                    want.len(),
                    got.len()
                ));
            }
            if let Some(first) = differing.first() {
                summaries.push(format!(
                    "output {index}: {} of {} bytes differ (first at byte {first})",
                    differing.len(),
                    want.len()
                ));
            }

            for &offset in &differing {
                if listed == self.limit {
                    break;
                }
                listed += 1;
                diagnostics.push(describe_byte(index, desc, got, offset));
            }
        }

        if summaries.is_empty() {
            return VerifyOutcome::Match;
        }
        let total = expected
            .iter()
            .zip(actual)
            .map(|(d, got)| {
                d.buffer
                    .bytes()
                    .iter()
                    .zip(got)
                    .filter(|(w, g)| w != g)
                    .count()
            })
            .sum::<usize>();
        if total > listed {
            diagnostics.push(format!("... {} more differing bytes", total - listed));
        }
        VerifyOutcome::Mismatch(MismatchReport {
            description: summaries.join("; "),
            diagnostics,
        })
    }
}

fn describe_byte(index: usize, desc: &ResourceDescriptor, got: &[u8], offset: usize) -> String {
    let want = desc.buffer.bytes();
    let mut line = format!(
        "output {index} byte {offset}: expected 0x{:02x}, got 0x{:02x}",
        want[offset], got[offset]
    );
    if let Some(element) = desc.buffer.element_index(offset) {
        let expected = desc.buffer.element(element);
        let actual = desc.buffer.element_in(got, element);
        if let (Some(expected), Some(actual)) = (expected, actual) {
            let _ = write!(
                line,
                " (element {element} {}: expected {expected}, got {actual})",
                desc.buffer.element_type()
            );
        }
    }
    line
}

/// Runs the custom verifier if one is set, byte-exact comparison otherwise.
pub fn verify_outputs(
    custom: Option<&dyn OutputVerifier>,
    inputs: &[ResourceDescriptor],
    expected: &[ResourceDescriptor],
    actual: &[Vec<u8>],
    mismatch_limit: usize,
) -> VerifyOutcome {
    let Some(verifier) = custom else {
        return ByteExact::new(mismatch_limit).compare(expected, actual);
    };

    let mut log = DiagnosticLog::new();
    if verifier.verify(inputs, actual, expected, &mut log) {
        return VerifyOutcome::Match;
    }
    VerifyOutcome::Mismatch(MismatchReport {
        description: log
            .lines()
            .first()
            .cloned()
            .unwrap_or_else(|| "output verifier rejected the results".to_string()),
        diagnostics: log.into_lines(),
    })
}

pub fn verify_binary(verifier: &dyn BinaryVerifier, module: &BinaryModule) -> VerifyOutcome {
    let mut log = DiagnosticLog::new();
    if verifier.verify(module, &mut log) {
        return VerifyOutcome::Match;
    }
    VerifyOutcome::Mismatch(MismatchReport {
        description: "binary verifier rejected the assembled module".to_string(),
        diagnostics: log.into_lines(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TypedBuffer;
    use pretty_assertions::assert_eq;

    fn expected(values: &[f32]) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor::storage(TypedBuffer::from_slice(values))]
    }

    fn bytes(values: &[f32]) -> Vec<u8> {
        TypedBuffer::from_slice(values).bytes().to_vec()
    }

    #[test]
    fn byte_exact_matches_iff_bytes_are_equal() {
        let exact = ByteExact::new(16);
        let want = expected(&[1.0, -2.0]);
        assert!(exact.compare(&want, &[bytes(&[1.0, -2.0])]).is_match());

        // Same float value, different bit pattern: raw byte comparison still fails.
        let neg_zero = expected(&[-0.0]);
        assert!(!exact.compare(&neg_zero, &[bytes(&[0.0])]).is_match());

        let VerifyOutcome::Mismatch(report) = exact.compare(&want, &[bytes(&[1.0, 2.0])]) else {
            panic!("expected mismatch");
        };
        assert_eq!(report.description, "output 0: 1 of 8 bytes differ (first at byte 7)");
        assert_eq!(
            report.diagnostics,
            vec!["output 0 byte 7: expected 0xc0, got 0x40 (element 1 f32: expected -2.0, got 2.0)"]
        );
    }

    #[test]
    fn sentinel_tail_is_a_mismatch() {
        // A shader that writes only the first element leaves the 0xff fill in place.
        let want = expected(&[1.0, 1.0]);
        let mut got = bytes(&[1.0]);
        got.extend_from_slice(&[0xff; 4]);
        let VerifyOutcome::Mismatch(report) = ByteExact::new(2).compare(&want, &[got]) else {
            panic!("expected mismatch");
        };
        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(report.diagnostics[2], "... 2 more differing bytes");
    }

    #[test]
    fn length_differences_are_mismatches() {
        let want = expected(&[1.0]);
        let got = bytes(&[1.0, 1.0]);
        let VerifyOutcome::Mismatch(report) = ByteExact::new(16).compare(&want, &[got]) else {
            panic!("expected mismatch");
        };
        assert_eq!(report.description, "output 0: expected 4 bytes, read back 8");
        assert!(!ByteExact::new(16).compare(&want, &[]).is_match());
    }

    #[test]
    fn custom_verifier_log_becomes_diagnostics() {
        let verifier = |_: &[ResourceDescriptor],
                        actual: &[Vec<u8>],
                        _: &[ResourceDescriptor],
                        log: &mut DiagnosticLog| {
            log.log(format!("saw {} outputs", actual.len()));
            false
        };
        let outcome = verify_outputs(Some(&verifier), &[], &expected(&[0.0]), &[vec![]], 16);
        assert_eq!(
            outcome,
            VerifyOutcome::Mismatch(MismatchReport {
                description: "saw 1 outputs".into(),
                diagnostics: vec!["saw 1 outputs".into()],
            })
        );
    }
}
