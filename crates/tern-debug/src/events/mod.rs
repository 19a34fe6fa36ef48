//! Event requests and matching.
//!
//! The front end registers event requests (kind + suspend policy + filters);
//! the VM raises typed notifications; [`EventRequests::match_event`] decides
//! which requests fire and folds their suspend policies into one directive
//! for the composite packet.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use tern_jdwp::{EventKind, Location, SuspendPolicy, Value};

use crate::error::DebugResult;
use crate::vm::{VmInstruction, VmObject, VmReferenceType};

pub mod filter;
pub mod step;

pub use filter::{ClassPattern, CountFilter, Filter};
pub use step::{StepDepth, StepFilter, StepSize};

/// Everything a filter may inspect about one raised event. Fields irrelevant
/// to the event's kind stay `None`.
pub struct MatchContext {
    pub kind: EventKind,
    pub thread: Option<Arc<dyn VmObject>>,
    pub thread_id: Option<u64>,
    pub class: Option<Arc<dyn VmReferenceType>>,
    pub class_name: Option<String>,
    pub instance_id: Option<u64>,
    pub location: Option<Location>,
    pub instruction: Option<Arc<dyn VmInstruction>>,
    pub field_id: Option<u64>,
    pub value_to_be: Option<Value>,
}

impl MatchContext {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            thread: None,
            thread_id: None,
            class: None,
            class_name: None,
            instance_id: None,
            location: None,
            instruction: None,
            field_id: None,
            value_to_be: None,
        }
    }
}

pub struct EventRequest {
    pub id: u32,
    pub kind: EventKind,
    pub suspend_policy: SuspendPolicy,
    pub filters: Vec<Filter>,
}

impl EventRequest {
    /// All filters must pass. Filters are evaluated without short-circuiting
    /// so a count filter ticks exactly once per observed event regardless of
    /// its position or the verdict of its neighbors.
    pub fn matches(&self, ctx: &MatchContext) -> DebugResult<bool> {
        let mut all = true;
        for filter in &self.filters {
            if !filter.matches(ctx)? {
                all = false;
            }
        }
        Ok(all)
    }
}

/// The requests that fired for one event, with the folded suspend policy.
pub struct MatchOutcome {
    pub requests: Vec<Arc<EventRequest>>,
    pub suspend_policy: SuspendPolicy,
}

impl MatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Registered event requests, grouped by event kind.
pub struct EventRequests {
    next_id: AtomicU32,
    tables: Mutex<HashMap<EventKind, HashMap<u32, Arc<EventRequest>>>>,
}

impl Default for EventRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRequests {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates a request id and stores the request under its kind.
    pub fn register(
        &self,
        kind: EventKind,
        suspend_policy: SuspendPolicy,
        filters: Vec<Filter>,
    ) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(?kind, id, ?suspend_policy, "registering event request");
        let request = Arc::new(EventRequest {
            id,
            kind,
            suspend_policy,
            filters,
        });
        self.tables
            .lock()
            .entry(kind)
            .or_default()
            .insert(id, request);
        id
    }

    /// Removes one request. Unknown ids are ignored; deleting a request that
    /// already fired its count filter is routine.
    pub fn delete(&self, kind: EventKind, id: u32) {
        if let Some(table) = self.tables.lock().get_mut(&kind) {
            table.remove(&id);
        }
    }

    /// Removes every request of one kind.
    pub fn clear(&self, kind: EventKind) {
        self.tables.lock().remove(&kind);
    }

    pub fn clear_all(&self) {
        self.tables.lock().clear();
    }

    pub fn get(&self, kind: EventKind, id: u32) -> Option<Arc<EventRequest>> {
        self.tables.lock().get(&kind)?.get(&id).cloned()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.tables.lock().get(&kind).map_or(0, HashMap::len)
    }

    /// Evaluates every request registered for `ctx.kind` and returns the
    /// matches in ascending request-id order, with the suspend policies of
    /// the matched requests folded to the strictest.
    ///
    /// Filter evaluation runs outside the table lock so a filter may resolve
    /// identifiers (or register new ones) without deadlocking against
    /// concurrent request registration.
    pub fn match_event(&self, ctx: &MatchContext) -> DebugResult<MatchOutcome> {
        let mut candidates: Vec<Arc<EventRequest>> = self
            .tables
            .lock()
            .get(&ctx.kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        candidates.sort_by_key(|request| request.id);

        let mut requests = Vec::new();
        let mut suspend_policy = SuspendPolicy::None;
        for request in candidates {
            if request.matches(ctx)? {
                suspend_policy = suspend_policy.max(request.suspend_policy);
                requests.push(request);
            }
        }
        Ok(MatchOutcome {
            requests,
            suspend_policy,
        })
    }
}
