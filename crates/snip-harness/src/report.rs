//! Text and JSON reports.

use std::io::{self, Write};

use serde::Serialize;

use crate::compare::Outcome;
use crate::runner::RunSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// `PASS`/`FAIL` lines followed by `N/M passed`.
    #[default]
    Text,
    /// One JSON document with every outcome and the summary.
    Json,
}

/// Receives outcomes in catalog order, then the summary.
pub trait Reporter {
    fn outcome(&mut self, outcome: &Outcome) -> io::Result<()>;
    fn finish(&mut self, summary: &RunSummary) -> io::Result<()>;
}

/// `PASS <id>` or `FAIL <id>: expected <...> got <...>`.
pub fn outcome_line(outcome: &Outcome) -> String {
    if outcome.passed {
        format!("PASS {}", outcome.example_id)
    } else {
        format!(
            "FAIL {}: expected {} got {}",
            outcome.example_id, outcome.expected, outcome.actual
        )
    }
}

/// `N/M passed`.
pub fn summary_line(summary: &RunSummary) -> String {
    format!("{}/{} passed", summary.passed, summary.total)
}

/// Writes one line per outcome as it arrives.
pub struct TextReporter<W: Write> {
    out: W,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn outcome(&mut self, outcome: &Outcome) -> io::Result<()> {
        writeln!(self.out, "{}", outcome_line(outcome))
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        if summary.stopped_early {
            writeln!(
                self.out,
                "stopped after {} failures",
                summary.failed
            )?;
        }
        writeln!(self.out, "{}", summary_line(summary))?;
        self.out.flush()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    outcomes: &'a [Outcome],
    summary: &'a RunSummary,
}

/// Collects outcomes and writes a single JSON document at the end.
pub struct JsonReporter<W: Write> {
    out: W,
    outcomes: Vec<Outcome>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            outcomes: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn outcome(&mut self, outcome: &Outcome) -> io::Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        let report = JsonReport {
            outcomes: &self.outcomes,
            summary,
        };
        serde_json::to_writer_pretty(&mut self.out, &report)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
