//! The debugging session: one object owning the registry, the request
//! tables and the suspend coordinator, fed typed notifications by the VM and
//! emitting composite event packets to the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use tern_jdwp::{
    tag, EventKind, JdwpWriter, LineTable, Location, SuspendPolicy, VariableTable,
};

use crate::config::SessionConfig;
use crate::error::{DebugError, DebugResult};
use crate::events::{EventRequests, Filter, MatchContext, StepFilter};
use crate::registry::EntityRegistry;
use crate::suspend::{EventSink, SuspendCoordinator};
use crate::vm::{VmEvent, VmInstruction, VmObject, VmScheduler};

/// Wire class status for a loaded class: verified | prepared.
const CLASS_STATUS_PREPARED: i32 = 3;

pub struct DebugSession {
    config: SessionConfig,
    registry: Arc<EntityRegistry>,
    requests: Arc<EventRequests>,
    coordinator: Arc<SuspendCoordinator>,
    events_seen: AtomicU64,
}

impl DebugSession {
    pub fn new(
        config: SessionConfig,
        scheduler: Arc<dyn VmScheduler>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let coordinator = Arc::new(SuspendCoordinator::new(
            scheduler,
            sink,
            config.hold_queue_warn_len,
        ));
        Self {
            config,
            registry: Arc::new(EntityRegistry::new()),
            requests: Arc::new(EventRequests::new()),
            coordinator,
            events_seen: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn requests(&self) -> &Arc<EventRequests> {
        &self.requests
    }

    pub fn coordinator(&self) -> &Arc<SuspendCoordinator> {
        &self.coordinator
    }

    // ---- notification pipeline ------------------------------------------

    /// Processes notifications raised together at one VM safepoint.
    ///
    /// Each notification is matched against the registered requests; the
    /// requests that fire become one composite packet, dispatched before the
    /// folded suspend policy is enforced so the front end never observes a
    /// suspension it has no event for.
    pub fn notify(&self, events: &[VmEvent]) -> DebugResult<()> {
        for event in events {
            self.notify_one(event)?;
            self.bump_and_maybe_sweep();
        }
        Ok(())
    }

    fn notify_one(&self, event: &VmEvent) -> DebugResult<()> {
        let origin = event_thread(event);
        let mut policy = SuspendPolicy::None;
        // (kind, request id, body) triples in dispatch order.
        let mut units: Vec<(EventKind, u32, Vec<u8>)> = Vec::new();

        for kind in kinds_for(event) {
            let ctx = self.match_context(kind, event);
            let outcome = self.requests.match_event(&ctx)?;
            if outcome.is_empty() {
                continue;
            }
            trace!(
                target: "tern.debug",
                ?kind,
                matched = outcome.requests.len(),
                "event matched"
            );
            policy = policy.max(outcome.suspend_policy);
            let body = self.encode_body(event);
            for request in outcome.requests {
                units.push((kind, request.id, body.clone()));
            }
        }

        if units.is_empty() {
            return Ok(());
        }

        let mut writer = JdwpWriter::new();
        writer.write_u8(policy.as_u8());
        writer.write_u32(units.len() as u32);
        for (kind, request_id, body) in units {
            writer.write_u8(kind.as_u8());
            writer.write_i32(request_id as i32);
            writer.write_bytes(&body);
        }
        self.coordinator.dispatch(writer.into_vec());
        self.coordinator.enforce(policy, origin.as_ref());
        Ok(())
    }

    fn bump_and_maybe_sweep(&self) {
        let seen = self.events_seen.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = self.config.sweep_interval_events;
        if interval > 0 && seen % interval == 0 {
            let dropped = self.registry.sweep();
            debug!(target: "tern.debug", dropped, "periodic registry sweep");
        }
    }

    fn match_context(&self, kind: EventKind, event: &VmEvent) -> MatchContext {
        let mut ctx = MatchContext::new(kind);
        if let Some(thread) = event_thread(event) {
            ctx.thread_id = Some(self.registry.object_id(&thread));
            ctx.thread = Some(thread);
        }
        match event {
            VmEvent::ClassLoad { class, .. } | VmEvent::ClassPrepare { class, .. } => {
                ctx.class_name = Some(class.name());
                ctx.class = Some(class.clone());
            }
            VmEvent::ClassUnload { signature } => {
                ctx.class_name = binary_name_of_signature(signature);
            }
            VmEvent::MethodEntry { instruction, .. }
            | VmEvent::InstructionBoundary { instruction, .. } => {
                self.fill_instruction_context(&mut ctx, instruction);
            }
            VmEvent::FieldAccess {
                instruction,
                field,
                object,
                ..
            } => {
                self.fill_instruction_context(&mut ctx, instruction);
                ctx.field_id = Some(self.registry.field_id(field));
                ctx.instance_id = object.as_ref().map(|o| self.registry.object_id(o));
            }
            VmEvent::FieldModification {
                instruction,
                field,
                object,
                value_to_be,
                ..
            } => {
                self.fill_instruction_context(&mut ctx, instruction);
                ctx.field_id = Some(self.registry.field_id(field));
                ctx.instance_id = object.as_ref().map(|o| self.registry.object_id(o));
                ctx.value_to_be = Some(value_to_be.clone());
            }
            _ => {}
        }
        ctx
    }

    fn fill_instruction_context(&self, ctx: &mut MatchContext, instruction: &Arc<dyn VmInstruction>) {
        let method = instruction.method();
        ctx.class_name = Some(method.declaring_type().name());
        ctx.location = Some(self.location_of(instruction));
        ctx.instruction = Some(instruction.clone());
    }

    /// The wire location of an instruction. Interns the declaring type and
    /// records the method's weak back reference as a side effect.
    fn location_of(&self, instruction: &Arc<dyn VmInstruction>) -> Location {
        let method = instruction.method();
        let declaring = method.declaring_type();
        Location {
            type_tag: declaring.type_tag(),
            class_id: self.registry.reference_type_id(&declaring),
            method_id: self.registry.method_id(&method),
            index: instruction.index(),
        }
    }

    fn encode_body(&self, event: &VmEvent) -> Vec<u8> {
        let mut w = JdwpWriter::new();
        match event {
            VmEvent::VmStart { thread }
            | VmEvent::ThreadStart { thread }
            | VmEvent::ThreadDeath { thread } => {
                w.write_id(self.registry.object_id(thread));
            }
            VmEvent::VmDeath => {}
            VmEvent::ClassLoad { thread, class } | VmEvent::ClassPrepare { thread, class } => {
                w.write_id(self.registry.object_id(thread));
                w.write_u8(class.type_tag().as_u8());
                w.write_id(self.registry.reference_type_id(class));
                w.write_string(&class.signature());
                w.write_i32(CLASS_STATUS_PREPARED);
            }
            VmEvent::ClassUnload { signature } => {
                w.write_string(signature);
            }
            VmEvent::MethodEntry {
                thread,
                instruction,
            }
            | VmEvent::InstructionBoundary {
                thread,
                instruction,
            } => {
                w.write_id(self.registry.object_id(thread));
                w.write_location(&self.location_of(instruction));
            }
            VmEvent::FieldAccess {
                thread,
                instruction,
                field,
                object,
            } => {
                self.encode_field_event(&mut w, thread, instruction, field, object);
            }
            VmEvent::FieldModification {
                thread,
                instruction,
                field,
                object,
                value_to_be,
            } => {
                self.encode_field_event(&mut w, thread, instruction, field, object);
                w.write_tagged_value(value_to_be);
            }
        }
        w.into_vec()
    }

    fn encode_field_event(
        &self,
        w: &mut JdwpWriter,
        thread: &Arc<dyn VmObject>,
        instruction: &Arc<dyn VmInstruction>,
        field: &Arc<dyn crate::vm::VmField>,
        object: &Option<Arc<dyn VmObject>>,
    ) {
        w.write_id(self.registry.object_id(thread));
        w.write_location(&self.location_of(instruction));
        let declaring = field.declaring_type();
        w.write_u8(declaring.type_tag().as_u8());
        w.write_id(self.registry.reference_type_id(&declaring));
        w.write_id(self.registry.field_id(field));
        match object {
            // Static accesses carry a null tagged object.
            None => w.write_tagged_id(tag::OBJECT, 0),
            Some(object) => {
                let id = self.registry.object_id(object);
                let tag = self
                    .registry
                    .tag_of(id)
                    .and_then(|t| t.object_tag_byte())
                    .unwrap_or(tag::OBJECT);
                w.write_tagged_id(tag, id);
            }
        }
    }

    // ---- command surface -------------------------------------------------

    /// `Method.LineTable`: native methods answer the −1/−1 empty table, a
    /// bytecode method without line info is `ABSENT_INFORMATION`.
    pub fn line_table(&self, method_id: u64) -> DebugResult<LineTable> {
        let method = self.registry.resolve_method(method_id)?;
        if method.is_native() {
            return Ok(LineTable::native());
        }
        method
            .instruction_lines()
            .map(LineTable::from_instruction_lines)
            .ok_or(DebugError::AbsentInformation(method_id))
    }

    /// `Method.VariableTable`.
    pub fn variable_table(&self, method_id: u64) -> DebugResult<VariableTable> {
        let method = self.registry.resolve_method(method_id)?;
        method
            .variable_table()
            .ok_or(DebugError::AbsentInformation(method_id))
    }

    /// Builds a validated location inside a known method.
    pub fn location(&self, method_id: u64, index: u64) -> DebugResult<Location> {
        let method = self.registry.resolve_method(method_id)?;
        if index >= method.instruction_count() {
            return Err(DebugError::InvalidLocation { method_id, index });
        }
        let declaring = method.declaring_type();
        Ok(Location {
            type_tag: declaring.type_tag(),
            class_id: self.registry.reference_type_id(&declaring),
            method_id,
            index,
        })
    }

    /// `EventRequest.Set` for a single step: validates the raw wire integers,
    /// snapshots the thread's stack and registers the request.
    pub fn create_step_request(
        &self,
        thread_id: u64,
        raw_size: u32,
        raw_depth: u32,
        suspend_policy: Option<SuspendPolicy>,
    ) -> DebugResult<u32> {
        let (thread_object, _) = self.registry.resolve_thread(thread_id)?;
        let filter = StepFilter::from_wire(&self.registry, &thread_object, raw_size, raw_depth)?;
        Ok(self.requests.register(
            EventKind::SingleStep,
            self.effective_policy(suspend_policy),
            vec![Filter::Step(filter)],
        ))
    }

    /// `EventRequest.Set` for a breakpoint at a validated location.
    pub fn create_breakpoint_request(
        &self,
        location: Location,
        suspend_policy: Option<SuspendPolicy>,
    ) -> DebugResult<u32> {
        // The location must refer to a known method and a valid index.
        self.location(location.method_id, location.index)?;
        Ok(self.requests.register(
            EventKind::Breakpoint,
            self.effective_policy(suspend_policy),
            vec![Filter::LocationOnly { location }],
        ))
    }

    fn effective_policy(&self, explicit: Option<SuspendPolicy>) -> SuspendPolicy {
        explicit.unwrap_or_else(|| self.config.default_suspend_policy.as_wire())
    }

    pub fn clear_request(&self, kind: EventKind, id: u32) {
        self.requests.delete(kind, id);
    }

    pub fn hold_events(&self) {
        self.coordinator.hold_events();
    }

    pub fn release_events(&self) {
        self.coordinator.release_events();
    }

    pub fn resume_all(&self) {
        self.coordinator.resume_all();
    }

    pub fn resume_thread(&self, thread_id: u64) -> DebugResult<()> {
        let (thread_object, _) = self.registry.resolve_thread(thread_id)?;
        self.coordinator.resume_thread(&thread_object);
        Ok(())
    }
}

/// The request tables a notification feeds. Instruction boundaries feed both
/// the breakpoint and the single-step tables; everything else maps 1:1.
fn kinds_for(event: &VmEvent) -> Vec<EventKind> {
    match event {
        VmEvent::VmStart { .. } => vec![EventKind::VmStart],
        VmEvent::VmDeath => vec![EventKind::VmDeath],
        VmEvent::ThreadStart { .. } => vec![EventKind::ThreadStart],
        VmEvent::ThreadDeath { .. } => vec![EventKind::ThreadDeath],
        VmEvent::ClassLoad { .. } => vec![EventKind::ClassLoad],
        VmEvent::ClassPrepare { .. } => vec![EventKind::ClassPrepare],
        VmEvent::ClassUnload { .. } => vec![EventKind::ClassUnload],
        VmEvent::MethodEntry { .. } => vec![EventKind::MethodEntry],
        VmEvent::InstructionBoundary { .. } => {
            vec![EventKind::Breakpoint, EventKind::SingleStep]
        }
        VmEvent::FieldAccess { .. } => vec![EventKind::FieldAccess],
        VmEvent::FieldModification { .. } => vec![EventKind::FieldModification],
    }
}

fn event_thread(event: &VmEvent) -> Option<Arc<dyn VmObject>> {
    match event {
        VmEvent::VmStart { thread }
        | VmEvent::ThreadStart { thread }
        | VmEvent::ThreadDeath { thread }
        | VmEvent::ClassLoad { thread, .. }
        | VmEvent::ClassPrepare { thread, .. }
        | VmEvent::MethodEntry { thread, .. }
        | VmEvent::InstructionBoundary { thread, .. }
        | VmEvent::FieldAccess { thread, .. }
        | VmEvent::FieldModification { thread, .. } => Some(thread.clone()),
        VmEvent::VmDeath | VmEvent::ClassUnload { .. } => None,
    }
}

/// `Lcom/example/Foo;` → `com.example.Foo`. Class filters match binary
/// names; unload notifications only carry the signature.
fn binary_name_of_signature(signature: &str) -> Option<String> {
    signature
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .map(|s| s.replace('/', "."))
}
