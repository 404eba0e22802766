//! Core dispatch engine for the transaction latency benchmark.
//!
//! This crate drives a batch of transaction requests through the
//! sign → broadcast → confirm pipeline with bounded parallelism, collects exactly
//! one outcome per request in input order and summarizes the run. It also provides
//! the handshake with the external load generator that stages the batch, and the
//! builder that assembles an engine from configuration and implementation factories.

pub mod builder;
pub mod collector;
pub mod engine;
pub mod generator;
pub mod nonce;
pub mod summary;

pub use builder::{BenchBuilder, BenchFactories, BuilderError};
pub use collector::{CollectorError, OutcomeSink, ResultCollector};
pub use engine::event_bus::EventBus;
pub use engine::pipeline::PipelineError;
pub use engine::{BenchEngine, DispatchError, DispatchSettings, Dispatcher};
pub use generator::{GeneratorError, LoadGenerator};
pub use nonce::{NonceManager, NonceReservation};
pub use summary::{BatchSummary, LatencyStats};
