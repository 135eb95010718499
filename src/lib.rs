//! Turnstile - request admission control for chat proxy backends.
//!
//! This crate implements the admission side of a chat proxy: composite
//! fixed-window rate limiting per user and per IP, a daily token budget
//! with provisional charge and refund, heuristic spam scoring over prompt
//! text, and a durable record store with time-based garbage collection.
//! Transport and generation concerns stay in the embedding service; this
//! crate only decides whether a request may proceed and at what cost.

pub mod admission;
pub mod config;
pub mod error;
pub mod spam;
pub mod store;
pub mod sweep;

pub use admission::{estimate_tokens, AdmissionGate, AdmissionVerdict, TokenBudget};
pub use config::AdmissionConfig;
pub use error::{AdmissionError, Result};
pub use spam::{SpamClassifier, SpamScore};
pub use store::{FileStore, MemoryStore, RecordStore};
