//! Suspension and event delivery plumbing: the run lock, the suspend-policy
//! enforcement against the collaborator VM, and the hold/release queue that
//! buffers composed packets while a multi-step transaction is in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use tern_jdwp::SuspendPolicy;

use crate::vm::{VmObject, VmScheduler};

/// Where composed event packets go. The transport behind it is not the
/// engine's concern.
pub trait EventSink: Send + Sync {
    fn send(&self, packet: Vec<u8>);
}

/// A non-recursive, single-owner lock over debuggee execution.
///
/// Exactly one party runs the debuggee at a time: the VM's interpreter loop
/// or a command handler mutating its state. `lock()` blocks until the lock is
/// free. Acquiring or releasing against the discipline is a programmer error
/// and panics rather than deadlocking silently.
pub struct RunLock {
    owner: Mutex<Option<ThreadId>>,
    freed: Condvar,
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLock {
    pub fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            freed: Condvar::new(),
        }
    }

    /// Blocks until the lock is free, then takes it.
    ///
    /// # Panics
    /// If the calling thread already holds the lock.
    pub fn lock(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        assert!(*owner != Some(me), "run lock is not recursive");
        while owner.is_some() {
            self.freed.wait(&mut owner);
        }
        *owner = Some(me);
        trace!(target: "tern.debug", "run lock acquired");
    }

    /// # Panics
    /// If the calling thread does not hold the lock.
    pub fn unlock(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        assert!(
            *owner == Some(me),
            "run lock released by a thread that does not hold it"
        );
        *owner = None;
        trace!(target: "tern.debug", "run lock released");
        self.freed.notify_one();
    }

    /// Releases the lock if the calling thread holds it; reports whether it
    /// did. For cleanup paths that may or may not have acquired.
    pub fn unlock_if_owned(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner == Some(me) {
            *owner = None;
            self.freed.notify_one();
            true
        } else {
            false
        }
    }

    pub fn is_held(&self) -> bool {
        self.owner.lock().is_some()
    }
}

/// Routes composed event packets to the sink (or the hold queue) and turns
/// folded suspend policies into scheduler directives.
pub struct SuspendCoordinator {
    run_lock: RunLock,
    scheduler: Arc<dyn VmScheduler>,
    sink: Arc<dyn EventSink>,
    /// `Some` while a hold transaction is open.
    held: Mutex<Option<VecDeque<Vec<u8>>>>,
    hold_warn_len: usize,
}

impl SuspendCoordinator {
    pub fn new(
        scheduler: Arc<dyn VmScheduler>,
        sink: Arc<dyn EventSink>,
        hold_warn_len: usize,
    ) -> Self {
        Self {
            run_lock: RunLock::new(),
            scheduler,
            sink,
            held: Mutex::new(None),
            hold_warn_len,
        }
    }

    pub fn run_lock(&self) -> &RunLock {
        &self.run_lock
    }

    /// Opens a hold transaction: packets queue up instead of reaching the
    /// sink. Re-holding while already holding keeps the open queue.
    pub fn hold_events(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            trace!(target: "tern.debug", "holding event delivery");
            *held = Some(VecDeque::new());
        }
    }

    /// Closes the hold transaction and flushes the queue to the sink in
    /// arrival order. The flush runs under the queue lock so a packet
    /// dispatched concurrently cannot overtake a held one.
    pub fn release_events(&self) {
        let mut held = self.held.lock();
        if let Some(queue) = held.take() {
            debug!(target: "tern.debug", packets = queue.len(), "releasing held events");
            for packet in queue {
                self.sink.send(packet);
            }
        }
    }

    pub fn is_holding(&self) -> bool {
        self.held.lock().is_some()
    }

    /// Sends one composed packet, or queues it while holding.
    pub fn dispatch(&self, packet: Vec<u8>) {
        let mut held = self.held.lock();
        match held.as_mut() {
            Some(queue) => {
                queue.push_back(packet);
                if queue.len() > self.hold_warn_len {
                    warn!(
                        target: "tern.debug",
                        len = queue.len(),
                        "hold queue exceeds its warning threshold"
                    );
                }
            }
            None => self.sink.send(packet),
        }
    }

    /// Applies a folded suspend policy. Called after the event packet has
    /// been dispatched, so the front end never sees a suspension it has no
    /// event for.
    pub fn enforce(&self, policy: SuspendPolicy, origin: Option<&Arc<dyn VmObject>>) {
        match policy {
            SuspendPolicy::None => {}
            SuspendPolicy::EventThread => match origin {
                Some(thread) => {
                    debug!(target: "tern.debug", "suspending event thread");
                    self.scheduler.suspend_thread(thread);
                }
                // Events such as class unload have no originating thread;
                // there is nothing coherent to suspend.
                None => warn!(
                    target: "tern.debug",
                    "event-thread suspend requested for an event with no thread"
                ),
            },
            SuspendPolicy::All => {
                debug!(target: "tern.debug", "suspending all threads");
                self.scheduler.suspend_all();
            }
        }
    }

    pub fn resume_all(&self) {
        debug!(target: "tern.debug", "resuming all threads");
        self.scheduler.resume_all();
    }

    pub fn resume_thread(&self, thread: &Arc<dyn VmObject>) {
        self.scheduler.resume_thread(thread);
    }
}
