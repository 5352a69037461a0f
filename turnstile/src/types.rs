//! Core identifiers and tags for controlled scheduling.
//!
//! - [`OperationId`]: identity and creation order of a controlled operation
//! - [`SignalId`]: identity of a [`Signal`](crate::Signal)
//! - [`SchedulingPolicy`]: whether concurrency is controlled at all
//! - [`SchedulingPointType`]: why a scheduling decision was requested

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier of a controlled operation.
///
/// Identifiers are handed out sequentially per iteration, so ordering by id is
/// ordering by creation. Strategies rely on this for deterministic tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(u64);

impl OperationId {
    /// Create an id from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw value of this id.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Creation index of the operation.
    pub const fn sequence(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op({})", self.0)
    }
}

/// Identifier of a signal an operation can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    /// Allocate a fresh, process-unique signal id.
    pub(crate) fn next() -> Self {
        static NEXT_SIGNAL: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_SIGNAL.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal({})", self.0)
    }
}

/// Whether concurrency is virtualized for the current iteration.
///
/// Set by the harness before an iteration starts; the scheduler only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// Passthrough: every scheduling point is a no-op.
    Production,
    /// Every controlled operation runs under the scheduler's control.
    #[default]
    Systematic,
}

impl SchedulingPolicy {
    /// Whether this policy controls scheduling.
    pub const fn is_systematic(&self) -> bool {
        matches!(self, SchedulingPolicy::Systematic)
    }
}

/// Why a scheduling decision was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPointType {
    /// Voluntary interleaving point.
    Interleave,
    /// Voluntary point with a priority-lowering hint.
    Yield,
    /// Read of a tagged shared resource.
    Read,
    /// Write of a tagged shared resource.
    Write,
    /// The caller waits for another operation to complete.
    Join,
    /// The caller waits for a signal to be set.
    Wait,
    /// A wrapped foreign awaitable resolved.
    Resolve,
    /// The caller completed.
    Complete,
}

impl SchedulingPointType {
    /// All point types, in declaration order.
    pub const ALL: [SchedulingPointType; 8] = [
        SchedulingPointType::Interleave,
        SchedulingPointType::Yield,
        SchedulingPointType::Read,
        SchedulingPointType::Write,
        SchedulingPointType::Join,
        SchedulingPointType::Wait,
        SchedulingPointType::Resolve,
        SchedulingPointType::Complete,
    ];

    /// Whether a suppression region turns this point into a no-op.
    ///
    /// Points where the caller cannot keep running (it waits on something or
    /// it is done) are forced and always reach the strategy.
    pub const fn is_suppressible(&self) -> bool {
        match self {
            SchedulingPointType::Interleave
            | SchedulingPointType::Yield
            | SchedulingPointType::Read
            | SchedulingPointType::Write => true,
            SchedulingPointType::Join
            | SchedulingPointType::Wait
            | SchedulingPointType::Resolve
            | SchedulingPointType::Complete => false,
        }
    }

    /// Lowercase name used in text timelines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SchedulingPointType::Interleave => "interleave",
            SchedulingPointType::Yield => "yield",
            SchedulingPointType::Read => "read",
            SchedulingPointType::Write => "write",
            SchedulingPointType::Join => "join",
            SchedulingPointType::Wait => "wait",
            SchedulingPointType::Resolve => "resolve",
            SchedulingPointType::Complete => "complete",
        }
    }

    /// Parse a name produced by [`SchedulingPointType::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|point| point.as_str() == name)
    }
}

impl fmt::Display for SchedulingPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
