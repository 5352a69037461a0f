//! # Turnstile
//!
//! Controlled scheduling of concurrent operations for systematic testing.
//!
//! Concurrency bugs hide in rare interleavings. Turnstile runs every
//! concurrent unit of work of a test (an *operation*) on its own thread but
//! lets only one of them execute at a time. At each *scheduling point* a
//! pluggable [`ExplorationStrategy`] decides which enabled operation runs
//! next, so interleavings become a sequence of explicit, recorded decisions.
//!
//! Key properties:
//! - **Mutually exclusive**: exactly one operation runs at any time
//! - **Reproducible**: same strategy and seed produce the same [`DecisionTrace`]
//! - **Live**: a state where nothing can run is reported as a deadlock
//! - **Free in production**: outside systematic testing every scheduling
//!   point returns immediately
//!
//! ## Core Components
//!
//! - [`scheduling_point`]: the calls instrumented code makes
//! - [`task`] and [`Signal`]: controlled spawning, joining and waiting
//! - [`Runtime`]: scheduler state of one iteration
//! - [`strategy`]: round-robin, seeded random and replay strategies
//! - [`TestEngine`]: runs a test body over many seeded iterations
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use turnstile::{scheduling_point, task, TestEngine};
//!
//! let report = TestEngine::new()
//!     .set_iterations(20)
//!     .set_base_seed(42)
//!     .run(|| {
//!         let counter = Arc::new(AtomicU32::new(0));
//!         let workers: Vec<_> = (0..2)
//!             .map(|_| {
//!                 let counter = counter.clone();
//!                 task::spawn(move || {
//!                     scheduling_point::read("counter");
//!                     let seen = counter.load(Ordering::SeqCst);
//!                     scheduling_point::write("counter");
//!                     counter.store(seen + 1, Ordering::SeqCst);
//!                 })
//!             })
//!             .collect();
//!         for worker in workers {
//!             worker.join().expect("worker failed");
//!         }
//!     })
//!     .expect("internal error");
//! assert_eq!(report.iterations, 20);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod assertions;
mod control;
pub mod engine;
mod error;
mod operation;
mod registry;
pub mod runtime;
pub mod scheduling_point;
mod signal;
pub mod strategy;
pub mod task;
mod trace;
mod types;
pub mod wrap;

pub use engine::{
    BugReport, IterationControl, IterationReport, StrategyKind, TestConfiguration, TestEngine,
    TestReport,
};
pub use error::{SchedulingError, SchedulingResult};
pub use operation::{BlockReason, ControlledOperation, OperationStatus};
pub use registry::OperationRegistry;
pub use runtime::Runtime;
pub use signal::Signal;
pub use strategy::{
    Decision, ExplorationStrategy, RandomStrategy, ReplayStrategy, RoundRobinStrategy,
};
pub use trace::{DecisionRecord, DecisionTrace, TraceParseError};
pub use types::{OperationId, SchedulingPointType, SchedulingPolicy, SignalId};
pub use wrap::{ensure_controlled, wrap, AsyncHandle, ControlledFuture};
