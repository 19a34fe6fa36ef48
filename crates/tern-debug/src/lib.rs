//! Debuggee-side backend engine for the JDWP front end of the model-checking
//! VM.
//!
//! The engine owns no transport and interprets no command packets; it sits
//! between a collaborator VM (reached through the traits in [`vm`]) and an
//! injected [`suspend::EventSink`], providing:
//!
//! - the identifier registry mapping wire ids to weakly-held VM entities,
//! - event request registration and matching with the JDWP filter set,
//! - step-completion decisions against a stack snapshot,
//! - suspend-policy enforcement, the run lock and the hold/release queue,
//! - composite event packet encoding via `tern-jdwp`.
//!
//! [`session::DebugSession`] wires the pieces together; [`mock`] provides
//! deterministic VM doubles for driving the engine in tests.

pub mod config;
pub mod error;
pub mod events;
pub mod mock;
pub mod registry;
pub mod session;
pub mod suspend;
pub mod vm;

pub use config::{ConfigError, SessionConfig};
pub use error::{DebugError, DebugResult};
pub use events::{
    ClassPattern, CountFilter, EventRequest, EventRequests, Filter, MatchContext, MatchOutcome,
    StepDepth, StepFilter, StepSize,
};
pub use registry::{EntityRegistry, EntityTag};
pub use session::DebugSession;
pub use suspend::{EventSink, RunLock, SuspendCoordinator};
