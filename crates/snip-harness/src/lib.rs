//! snipcheck harness: example catalog, comparator, reporters and runner.
//!
//! Examples come from a TOML catalog and are validated on load. The
//! [`Runner`] executes them one at a time through [`snip_eval::Executor`],
//! judges each with [`compare`] and streams the outcomes to a [`Reporter`].

pub mod catalog;
pub mod compare;
pub mod example;
pub mod report;
pub mod runner;

pub use catalog::{Catalog, CatalogError, LoadedCatalog, Rejected, RejectReason, BUILTIN};
pub use compare::{compare, Outcome};
pub use example::{Example, Expectation, MalformedExampleError};
pub use report::{JsonReporter, ReportFormat, Reporter, TextReporter};
pub use runner::{RunConfig, RunSummary, Runner};
