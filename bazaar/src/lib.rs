#![deny(clippy::all)]

pub mod dispatch;
pub mod domain;
pub mod events;
pub mod keys;
pub mod ports;

pub use dispatch::Dispatcher;
pub use domain::{AggregatedResult, Platform, PlatformResult, Product, SearchSpec, SourceOutcome};
