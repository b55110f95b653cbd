//! Runledger - run-once tracing of test-to-object call edges
//!
//! Every traced call is identified by a fingerprint of the call site that
//! made it and the member it reached. The first time a fingerprint is seen it
//! is appended to a ledger file and the member runs; afterwards the call is
//! skipped and returns an empty result. The ledger persists across processes,
//! so a suite can be re-run to resume where it stopped.
//!
//! The pieces:
//! - [`call_site`]: explicit caller identity (`call_site!`, `caller!`)
//! - [`classifier`]: static vs instance member classification
//! - [`fingerprint`]: the six-field edge identity and its line format
//! - [`ledger`]: file and in-memory ledgers
//! - [`tracer`]: the run-once wrapper and `Traced<T>`
//! - [`class`]: member tables and `annotate`
//! - [`singleton`]: one instance per constructor signature

pub mod call_site;
pub mod class;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod fingerprint;
pub mod ledger;
pub mod singleton;
pub mod summary;
pub mod tracer;
