//! A small deterministic debuggee: one class, two methods, one thread.

use std::sync::Arc;

use tern_debug::config::SessionConfig;
use tern_debug::mock::{
    MockFrame, MockInstruction, MockMethod, MockObject, MockThread, MockType, RecordingScheduler,
    RecordingSink,
};
use tern_debug::session::DebugSession;
use tern_debug::vm::{ObjectKind, VmEvent, VmFrame, VmMethod, VmObject};

pub struct TestVm {
    pub session: DebugSession,
    pub scheduler: Arc<RecordingScheduler>,
    pub sink: Arc<RecordingSink>,
    pub thread_object: Arc<dyn VmObject>,
    pub thread: Arc<MockThread>,
    pub thread_id: u64,
    pub ty: Arc<MockType>,
    /// `outer` calls `inner` from its invoke at index 0, line 104.
    pub outer: Arc<MockMethod>,
    pub inner: Arc<MockMethod>,
}

/// Best-effort tracing init so `RUST_LOG=tern.debug=trace cargo test` shows
/// the engine's decisions; a second call is a no-op.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl TestVm {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        init_tracing();
        let scheduler = Arc::new(RecordingScheduler::new());
        let sink = Arc::new(RecordingSink::new());
        let session = DebugSession::new(config, scheduler.clone(), sink.clone());

        let ty = MockType::class("com.example.Main");
        let outer = MockMethod::new(1, &ty, "outer", vec![(0, 104), (4, 105), (8, 106)]);
        let inner = MockMethod::new(2, &ty, "inner", vec![(0, 40), (2, 41)]);
        // Locations resolve through the registry, so the methods must be
        // known to it before any command names them.
        session.registry().method_id(&(outer.clone() as Arc<dyn VmMethod>));
        session.registry().method_id(&(inner.clone() as Arc<dyn VmMethod>));

        let thread_obj = MockObject::new(ObjectKind::Thread);
        let thread = thread_obj.attach_thread("main");
        let thread_object: Arc<dyn VmObject> = thread_obj;
        let thread_id = session.registry().object_id(&thread_object);

        Self {
            session,
            scheduler,
            sink,
            thread_object,
            thread,
            thread_id,
            ty,
            outer,
            inner,
        }
    }

    pub fn set_stack(&self, pcs: &[&Arc<MockInstruction>]) {
        let frames: Vec<Arc<dyn VmFrame>> = pcs
            .iter()
            .map(|pc| -> Arc<dyn VmFrame> { MockFrame::new((*pc).clone()) })
            .collect();
        self.thread.set_frames(frames);
    }

    /// An instruction-boundary notification for the fixture thread.
    pub fn boundary(&self, pc: &Arc<MockInstruction>) -> VmEvent {
        VmEvent::InstructionBoundary {
            thread: self.thread_object.clone(),
            instruction: pc.clone(),
        }
    }
}
