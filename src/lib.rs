//! Best-effort collector for the PDDIKTI public student search API.
//!
//! [`client`] talks to the API, [`schema`] validates what comes back,
//! [`pipeline`] chains search and detail filters, [`batch`] runs many
//! queries and writes the results, and [`mcp`] exposes the two lookups
//! as tools over stdio.

pub mod batch;
pub mod client;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod protocol;
pub mod rules;
pub mod schema;
#[cfg(test)]
mod testing;

pub use client::{ClientConfig, FetchFailure, Fetched, PddiktiClient, StudentSource};
pub use error::{BatchError, SchemaError};
pub use models::{BatchOutput, DetailRecord, FilteredRecord, Gender, SearchSummary};
pub use pipeline::{DetailStage, Pddikti, PipelineObserver, SearchStage, TracingObserver};
