//! Decision traces.
//!
//! A trace is the ordered list of scheduling decisions realized during one
//! iteration. It is the only artifact the scheduler produces, and it is enough
//! to replay an iteration with [`ReplayStrategy`](crate::strategy::ReplayStrategy).
//!
//! Traces can be stored as JSON or as a compact timeline string. Each decision
//! is `id:point`, optionally followed by `(resource)` and by `>chosen` naming
//! the operation the strategy picked, joined by ` -> `. Inside a resource,
//! backslashes, `(`, `)` and `>` are escaped with a backslash:
//!
//! ```
//! use turnstile::DecisionTrace;
//!
//! let trace = DecisionTrace::parse("0:complete>1 -> 1:write(x)>2 -> 2:complete").expect("valid trace");
//! assert_eq!(trace.len(), 3);
//! assert_eq!(trace.to_string(), "0:complete>1 -> 1:write(x)>2 -> 2:complete");
//! ```

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OperationId, SchedulingPointType};

/// Error parsing a stored trace.
#[derive(Debug, Error)]
pub enum TraceParseError {
    /// A timeline segment is malformed.
    #[error("invalid trace segment '{segment}': {reason}")]
    InvalidSegment {
        /// The offending segment.
        segment: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The JSON document is malformed.
    #[error("invalid trace json: {0}")]
    Json(#[from] serde_json::Error),
}

/// One realized scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Operation that requested the decision.
    pub operation: OperationId,
    /// Why the decision was requested.
    pub point: SchedulingPointType,
    /// Resource tag of a `read`/`write` decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Operation picked to run next, `None` when the iteration ended here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen: Option<OperationId>,
}

impl fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation.as_u64(), self.point)?;
        if let Some(resource) = &self.resource {
            f.write_char('(')?;
            for c in resource.chars() {
                if matches!(c, '\\' | '(' | ')' | '>') {
                    f.write_char('\\')?;
                }
                f.write_char(c)?;
            }
            f.write_char(')')?;
        }
        if let Some(chosen) = self.chosen {
            write!(f, ">{}", chosen.as_u64())?;
        }
        Ok(())
    }
}

/// Append-only log of the decisions of one iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTrace {
    records: Vec<DecisionRecord>,
}

impl DecisionTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision.
    pub fn push(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    /// Number of recorded decisions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Recorded decisions in order.
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    /// Iterate recorded decisions in order.
    pub fn iter(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.records.iter()
    }

    /// Operations that requested a decision of the given type, in order.
    pub fn operations_at(&self, point: SchedulingPointType) -> Vec<OperationId> {
        self.records
            .iter()
            .filter(|record| record.point == point)
            .map(|record| record.operation)
            .collect()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON produced by [`DecisionTrace::to_json`].
    pub fn from_json(json: &str) -> Result<Self, TraceParseError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a timeline string produced by the `Display` implementation.
    pub fn parse(s: &str) -> Result<Self, TraceParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::new());
        }

        let records = trimmed
            .split(" -> ")
            .map(|segment| parse_segment(segment.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }
}

fn parse_segment(segment: &str) -> Result<DecisionRecord, TraceParseError> {
    let invalid = |reason: String| TraceParseError::InvalidSegment {
        segment: segment.to_string(),
        reason,
    };

    let (id_str, rest) = segment
        .split_once(':')
        .ok_or_else(|| invalid("missing ':'".to_string()))?;
    let id = id_str
        .parse::<u64>()
        .map_err(|e| invalid(format!("invalid operation id '{id_str}': {e}")))?;

    let (point_str, resource, tail) = match rest.find('(') {
        Some(open) => {
            let (resource, tail) = take_resource(&rest[open + 1..])
                .ok_or_else(|| invalid("unterminated resource".to_string()))?;
            (&rest[..open], Some(resource), tail)
        }
        None => match rest.find('>') {
            Some(mark) => (&rest[..mark], None, &rest[mark..]),
            None => (rest, None, ""),
        },
    };
    let point = SchedulingPointType::from_name(point_str)
        .ok_or_else(|| invalid(format!("unknown point type '{point_str}'")))?;

    let chosen = match tail {
        "" => None,
        _ => {
            let chosen_str = tail
                .strip_prefix('>')
                .ok_or_else(|| invalid(format!("unexpected '{tail}' after resource")))?;
            let chosen = chosen_str
                .parse::<u64>()
                .map_err(|e| invalid(format!("invalid chosen id '{chosen_str}': {e}")))?;
            Some(OperationId::new(chosen))
        }
    };

    Ok(DecisionRecord {
        operation: OperationId::new(id),
        point,
        resource,
        chosen,
    })
}

/// Unescape a resource up to its closing `)`, returning it and what follows.
fn take_resource(s: &str) -> Option<(String, &str)> {
    let mut resource = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => resource.push(chars.next()?.1),
            ')' => return Some((resource, &s[i + 1..])),
            _ => resource.push(c),
        }
    }
    None
}

impl fmt::Display for DecisionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DecisionTrace {
    type Item = &'a DecisionRecord;
    type IntoIter = std::slice::Iter<'a, DecisionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
