//! Sequential catalog runs.

use std::io;

use log::{debug, info};
use serde::Serialize;
use sha2::{Digest, Sha256};
use snip_eval::{Executor, ExecutorConfig};

use crate::catalog::LoadedCatalog;
use crate::compare::{compare, Outcome};
use crate::example::Example;
use crate::report::Reporter;

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub executor: ExecutorConfig,
    /// Stop once this many examples have failed. Checked between examples.
    pub max_failures: Option<usize>,
    /// Only run examples whose id contains this substring.
    pub filter: Option<String>,
}

/// Totals for one run. `total` counts the selected examples, not the
/// rejected ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub rejected: usize,
    pub stopped_early: bool,
    /// SHA-256 over the `(id, passed)` pairs in run order.
    pub digest: String,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

pub struct Runner {
    executor: Executor,
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            executor: Executor::new(config.executor),
            config,
        }
    }

    /// Execute and judge a single example.
    pub fn run_example(&mut self, example: &Example) -> Outcome {
        let result = self.executor.run(example.id(), example.source());
        compare(example, &result)
    }

    /// Run the selected examples in catalog order, feeding each outcome to
    /// `reporter` before starting the next.
    pub fn run(
        &mut self,
        catalog: &LoadedCatalog,
        reporter: &mut dyn Reporter,
    ) -> io::Result<RunSummary> {
        let selected = catalog.select(self.config.filter.as_deref());
        info!(
            "running {} examples ({} rejected at load)",
            selected.len(),
            catalog.rejected.len()
        );

        let mut hasher = Sha256::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut stopped_early = false;

        for (index, example) in selected.iter().enumerate() {
            if self.config.max_failures.is_some_and(|cap| failed >= cap) {
                debug!(
                    "failure cap reached; skipping {} remaining examples",
                    selected.len() - index
                );
                stopped_early = true;
                break;
            }
            let outcome = self.run_example(example);
            hasher.update(outcome.example_id.as_bytes());
            hasher.update([0, u8::from(outcome.passed)]);
            if outcome.passed {
                passed += 1;
            } else {
                failed += 1;
            }
            reporter.outcome(&outcome)?;
        }

        let summary = RunSummary {
            total: selected.len(),
            passed,
            failed,
            rejected: catalog.rejected.len(),
            stopped_early,
            digest: hex::encode(hasher.finalize()),
        };
        reporter.finish(&summary)?;
        Ok(summary)
    }
}
