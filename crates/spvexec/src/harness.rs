//! Orchestration of one test specification from gate to verdict.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use spvexec_asm::{Assemble, CachingAssembler, TextAssembler};
use tracing::{debug, info, info_span, warn};

use crate::backend::{ExecutionBackend, GpuBackend};
use crate::caps::{self, GateDecision};
use crate::classify::{classify, Verdict};
use crate::config::DEFAULT_MISMATCH_LIMIT;
use crate::context::ExecutionContext;
use crate::error::HarnessError;
use crate::spec::TestSpec;
use crate::verify::{verify_binary, verify_outputs, VerifyOutcome};

/// Step that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Gate,
    Assembly,
    BinaryCheck,
    Execution,
    Verification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub name: String,
    pub verdict: Verdict,
    pub stage: Stage,
    pub diagnostics: Vec<String>,
    pub elapsed: Duration,
    pub device_time: Option<Duration>,
}

/// Runs test specifications through gate, assembly, binary check, execution, verification and
/// classification, in that order. The first stage that decides the verdict ends the run.
pub struct Harness<A = CachingAssembler<TextAssembler>, B = GpuBackend> {
    assembler: A,
    backend: B,
    mismatch_limit: usize,
}

impl Harness {
    /// Harness over a shared context, with assembly cached per its configuration.
    pub fn with_context(context: Arc<ExecutionContext>) -> Self {
        let config = context.config();
        Self::new(
            CachingAssembler::new(TextAssembler, config.assembly_cache_capacity),
            GpuBackend::new(Arc::clone(&context)),
        )
        .mismatch_limit(config.mismatch_limit)
    }
}

impl<A: Assemble, B: ExecutionBackend> Harness<A, B> {
    pub fn new(assembler: A, backend: B) -> Self {
        Self {
            assembler,
            backend,
            mismatch_limit: DEFAULT_MISMATCH_LIMIT,
        }
    }

    pub fn mismatch_limit(mut self, limit: usize) -> Self {
        self.mismatch_limit = limit;
        self
    }

    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn run(&self, spec: &TestSpec) -> Verdict {
        self.run_detailed(spec).verdict
    }

    pub fn run_detailed(&self, spec: &TestSpec) -> CaseOutcome {
        let span = info_span!("case", name = spec.name());
        let _enter = span.enter();
        let start = Instant::now();

        let finish = |verdict: Verdict,
                      stage: Stage,
                      diagnostics: Vec<String>,
                      device_time: Option<Duration>| {
            match &verdict {
                Verdict::Pass => debug!(?stage, "pass"),
                Verdict::Skipped(reason) => info!(%reason, "skipped"),
                Verdict::Fail(msg) => warn!(?stage, %msg, "fail"),
                Verdict::QualityWarning(msg) => warn!(?stage, %msg, "quality warning"),
            }
            CaseOutcome {
                name: spec.name().to_string(),
                verdict,
                stage,
                diagnostics,
                elapsed: start.elapsed(),
                device_time,
            }
        };
        let fatal = |err: HarnessError, stage: Stage| {
            let diagnostics = match &err {
                HarnessError::Assembly(e) if !e.source_line.is_empty() => {
                    vec![e.source_line.clone()]
                }
                _ => Vec::new(),
            };
            finish(Verdict::Fail(err.to_string()), stage, diagnostics, None)
        };

        let requirements = spec.effective_requirements();
        if let GateDecision::Unsupported(reason) =
            caps::is_supported(&requirements, self.backend.caps())
        {
            return finish(Verdict::Skipped(reason), Stage::Gate, Vec::new(), None);
        }

        let module = match self.assembler.assemble(spec.source(), spec.module_version()) {
            Ok(module) => module,
            Err(err) => return fatal(err.into(), Stage::Assembly),
        };
        debug!(
            words = module.words().len(),
            bound = module.bound(),
            "assembled"
        );

        if let Some(verifier) = spec.binary_verifier() {
            let outcome = verify_binary(verifier, &module);
            if let VerifyOutcome::Mismatch(report) = &outcome {
                let verdict = classify(&outcome, spec.mismatch_policy());
                return finish(verdict, Stage::BinaryCheck, report.diagnostics.clone(), None);
            }
        }

        let execution = match self.backend.execute(&module, spec) {
            Ok(execution) => execution,
            Err(err) => return fatal(err, Stage::Execution),
        };

        let outcome = verify_outputs(
            spec.verifier(),
            spec.inputs(),
            spec.outputs(),
            &execution.outputs,
            self.mismatch_limit,
        );
        let verdict = classify(&outcome, spec.mismatch_policy());
        let diagnostics = match outcome {
            VerifyOutcome::Match => Vec::new(),
            VerifyOutcome::Mismatch(report) => report.diagnostics,
        };
        finish(
            verdict,
            Stage::Verification,
            diagnostics,
            Some(execution.device_time),
        )
    }
}
