//! Event request filters.
//!
//! A request matches an event when all of its filters do. Filters are a
//! closed set; the count filter is the only one with a side effect, and the
//! matcher guarantees it ticks exactly once per observed event of the
//! request's kind.

use std::sync::atomic::{AtomicI64, Ordering};

use tern_jdwp::Location;

use crate::error::{DebugError, DebugResult};
use crate::events::MatchContext;
use crate::events::step::StepFilter;

pub enum Filter {
    /// Match only events raised by the thread with this wire id.
    ThreadOnly { thread_id: u64 },
    /// Match only events whose instance is the object with this wire id.
    InstanceOnly { object_id: u64 },
    /// Match only events at exactly this location.
    LocationOnly { location: Location },
    /// Match only events whose class name matches the pattern.
    ClassMatch(ClassPattern),
    /// Suppress events whose class name matches the pattern.
    ClassExclude(ClassPattern),
    /// Match the nth observed event, then never again.
    Count(CountFilter),
    /// Match when the requested single-step has completed.
    Step(StepFilter),
}

impl Filter {
    pub fn matches(&self, ctx: &MatchContext) -> DebugResult<bool> {
        match self {
            Filter::ThreadOnly { thread_id } => Ok(ctx.thread_id == Some(*thread_id)),
            Filter::InstanceOnly { object_id } => Ok(ctx.instance_id == Some(*object_id)),
            Filter::LocationOnly { location } => Ok(ctx.location == Some(*location)),
            Filter::ClassMatch(pattern) => Ok(ctx
                .class_name
                .as_deref()
                .is_some_and(|name| pattern.matches(name))),
            Filter::ClassExclude(pattern) => Ok(!ctx
                .class_name
                .as_deref()
                .is_some_and(|name| pattern.matches(name))),
            Filter::Count(count) => Ok(count.strike()),
            Filter::Step(step) => {
                let Some(instruction) = &ctx.instruction else {
                    return Ok(false);
                };
                let Some(thread_id) = ctx.thread_id else {
                    return Ok(false);
                };
                if thread_id != step.thread_id() {
                    return Ok(false);
                }
                let thread = ctx
                    .thread
                    .as_ref()
                    .and_then(|object| object.thread_meta())
                    .ok_or(DebugError::InvalidObject(thread_id))?;
                step.matches(thread_id, &thread, instruction)
            }
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::ThreadOnly { thread_id } => write!(f, "ThreadOnly({thread_id})"),
            Filter::InstanceOnly { object_id } => write!(f, "InstanceOnly({object_id})"),
            Filter::LocationOnly { location } => write!(f, "LocationOnly({location:?})"),
            Filter::ClassMatch(p) => write!(f, "ClassMatch({:?})", p.as_str()),
            Filter::ClassExclude(p) => write!(f, "ClassExclude({:?})", p.as_str()),
            Filter::Count(c) => write!(f, "Count({})", c.remaining()),
            Filter::Step(s) => write!(f, "Step({:?}/{:?})", s.size(), s.depth()),
        }
    }
}

/// A `*`-wildcard class-name pattern.
///
/// Literal fragments must appear in order, each found after the previous one;
/// a pattern that does not begin (end) with `*` additionally anchors its
/// first (last) fragment to the start (end) of the name.
pub struct ClassPattern {
    raw: String,
    fragments: Vec<String>,
    anchored_start: bool,
    anchored_end: bool,
}

impl ClassPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            raw: pattern.to_string(),
            fragments: pattern
                .split('*')
                .filter(|fragment| !fragment.is_empty())
                .map(str::to_string)
                .collect(),
            anchored_start: !pattern.starts_with('*'),
            anchored_end: !pattern.ends_with('*'),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, name: &str) -> bool {
        let count = self.fragments.len();
        if count == 0 {
            // Pure-wildcard patterns match anything; the empty pattern only
            // matches the empty name.
            return !(self.anchored_start && self.anchored_end) || name.is_empty();
        }

        let mut rest = name;
        for (i, fragment) in self.fragments.iter().enumerate() {
            let first = i == 0;
            let last = i + 1 == count;

            if first && self.anchored_start {
                if !rest.starts_with(fragment.as_str()) {
                    return false;
                }
                rest = &rest[fragment.len()..];
                if last && self.anchored_end {
                    return rest.is_empty();
                }
            } else if last && self.anchored_end {
                return rest.ends_with(fragment.as_str());
            } else {
                match rest.find(fragment.as_str()) {
                    Some(at) => rest = &rest[at + fragment.len()..],
                    None => return false,
                }
            }
        }
        true
    }
}

/// Decrements once per observed event; matches exactly when the count strikes
/// zero and is suppressed forever after, independent of other filters.
pub struct CountFilter {
    remaining: AtomicI64,
}

impl CountFilter {
    pub fn new(count: i64) -> DebugResult<Self> {
        if count <= 0 {
            return Err(DebugError::InvalidCount(count));
        }
        Ok(Self {
            remaining: AtomicI64::new(count),
        })
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn strike(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::SeqCst) == 1
    }
}
