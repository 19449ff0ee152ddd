//! Tenet core library: learned conventions, compliance checks, incremental
//! learning, and cross-project consensus.
//!
//! The main entry point is [`service::TenetService`], which wires a
//! project's [`store::SqliteStore`] to the [`detect::ConflictDetector`],
//! the [`learn::IncrementalLearner`] and the
//! [`aggregate::CrossProjectAggregator`].

pub mod aggregate;
pub mod config;
pub mod convention;
pub mod detect;
pub mod engine;
pub mod error;
pub mod extract;
pub mod learn;
pub mod progress;
pub mod scan;
pub mod service;
pub mod store;
pub mod types;
