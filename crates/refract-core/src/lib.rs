#![forbid(unsafe_code)]

//! Derived-value pipelines for Refract.
//!
//! This crate provides the change-propagation engine:
//!
//! - [`Publisher`]: a current value plus synchronously notified observers,
//!   with RAII [`Subscription`] handles.
//! - [`Stage`]: one transformation step. [`FnStage`] wraps a pure function;
//!   [`Processor`] and [`CachedProcessor`] are stateful, activatable stages
//!   built on [`ProcessorCore`].
//! - [`Queue`]: an ordered stage list that recomputes only the stages after a
//!   change.
//! - [`DataSource`] and [`ArrayDataSource`]: authoritative data feeding a
//!   preprocessor tier and a processor tier, republished to observers.
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous. Shared handles are
//! `Rc`-based and cloning a handle shares state. Back-references from stages
//! to the queues watching them are `Weak`, so dropping the outermost owner
//! releases the whole pipeline.
//!
//! # Invariants
//!
//! 1. Published values are owned clones; no observer or caller can alias the
//!    raw data held by a source.
//! 2. Stage evaluation order is insertion order.
//! 3. Re-entrant processing short-circuits to the last published value
//!    instead of recursing.

pub mod array_source;
pub mod cached;
pub mod error;
pub mod processor;
pub mod publisher;
pub mod queue;
pub mod source;
pub mod stage;
pub mod traced;

pub use array_source::ArrayDataSource;
pub use cached::CachedProcessor;
pub use error::{PipelineError, Result};
pub use processor::{ComplexStage, ProcessState, Processor, ProcessorCore};
pub use publisher::{Observer, Publisher, Subscription, SubscriptionId};
pub use queue::Queue;
pub use source::DataSource;
pub use stage::{FnStage, Stage, StageId};
pub use traced::TracedStage;
