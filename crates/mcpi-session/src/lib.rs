//! Connection lifecycle and request orchestration for the mcpi inspector.
//!
//! [`ConnectionManager`] tracks any number of servers, drives each one
//! through its `Stopped → Starting → Running` lifecycle over a
//! [`mcpi_core::TransportConnector`], dispatches typed protocol requests
//! with per-category error isolation and cursor-based pagination, and
//! queues server-initiated sampling requests for operator approval.
//!
//! Transports and response validation are ports: the embedding
//! application supplies a connector, and may supply a validator
//! ([`SerdeShapeValidator`] is the default). [`loopback`] provides an
//! in-memory connector for tests and demos.
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use anyhow as _;
#[cfg(test)]
use tracing_subscriber as _;

mod connection;
mod context;
mod dispatcher;
mod history;
mod inbound;
pub mod loopback;
mod manager;
mod notifications;
mod operations;
mod pagination;
mod sampling;
#[cfg(test)]
mod test_support;
mod validator;

pub use connection::{ConnectionSnapshot, ContentSlots, StatusObserver};
pub use history::{HistoryEntry, RequestHistory};
pub use manager::{ConnectionManager, ConnectionManagerBuilder};
pub use notifications::NotificationLog;
pub use pagination::PaginationState;
pub use sampling::SamplingQueue;
pub use validator::SerdeShapeValidator;
