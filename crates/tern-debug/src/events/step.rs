//! Step completion: decides, one instruction boundary at a time, whether a
//! requested single-step has finished.
//!
//! A step request snapshots the requesting thread's non-synthetic stack shape
//! at creation. Each boundary notification is then compared against that
//! snapshot by depth and line number. The engine keeps no other state: a
//! boundary either completes the step or it does not, and a match never
//! deletes the request (clients clear or replace step requests explicitly).

use std::sync::Arc;

use crate::error::{DebugError, DebugResult};
use crate::registry::EntityRegistry;
use crate::vm::{same_instruction, InstructionKind, VmInstruction, VmObject, VmThread};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepSize {
    /// Complete on any instruction other than the originating one.
    Min,
    /// Complete when the source line changes.
    Line,
}

impl StepSize {
    pub fn from_wire(raw: u32) -> DebugResult<Self> {
        match raw {
            0 => Ok(StepSize::Min),
            1 => Ok(StepSize::Line),
            other => Err(DebugError::IllegalArgument(format!(
                "invalid step size {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDepth {
    Into,
    Over,
    Out,
}

impl StepDepth {
    pub fn from_wire(raw: u32) -> DebugResult<Self> {
        match raw {
            0 => Ok(StepDepth::Into),
            1 => Ok(StepDepth::Over),
            2 => Ok(StepDepth::Out),
            other => Err(DebugError::IllegalArgument(format!(
                "invalid step depth {other}"
            ))),
        }
    }
}

struct FrameSnapshot {
    pc: Arc<dyn VmInstruction>,
}

impl std::fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSnapshot")
            .field("pc", &self.pc.index())
            .finish()
    }
}

/// The requesting thread's stack shape at request creation: every
/// non-synthetic frame's pc, innermost first.
#[derive(Debug)]
struct StackSnapshot {
    thread_id: u64,
    frames: Vec<FrameSnapshot>,
}

/// Immutable after construction; owned exclusively by its event request.
#[derive(Debug)]
pub struct StepFilter {
    size: StepSize,
    depth: StepDepth,
    snapshot: StackSnapshot,
}

impl StepFilter {
    pub fn new(
        registry: &EntityRegistry,
        thread_object: &Arc<dyn VmObject>,
        size: StepSize,
        depth: StepDepth,
    ) -> DebugResult<Self> {
        let thread_id = registry.object_id(thread_object);
        let thread = thread_object
            .thread_meta()
            .ok_or(DebugError::InvalidObject(thread_id))?;

        let frames: Vec<FrameSnapshot> = thread
            .frames()
            .into_iter()
            .filter(|frame| !frame.is_synthetic())
            .map(|frame| FrameSnapshot { pc: frame.pc() })
            .collect();
        if frames.is_empty() {
            return Err(DebugError::IllegalArgument(
                "stepping thread has no non-synthetic frames".to_string(),
            ));
        }

        Ok(Self {
            size,
            depth,
            snapshot: StackSnapshot { thread_id, frames },
        })
    }

    /// Construct from the raw wire integers, validating both before any
    /// snapshot is taken.
    pub fn from_wire(
        registry: &EntityRegistry,
        thread_object: &Arc<dyn VmObject>,
        raw_size: u32,
        raw_depth: u32,
    ) -> DebugResult<Self> {
        let size = StepSize::from_wire(raw_size)?;
        let depth = StepDepth::from_wire(raw_depth)?;
        Self::new(registry, thread_object, size, depth)
    }

    pub fn thread_id(&self) -> u64 {
        self.snapshot.thread_id
    }

    pub fn size(&self) -> StepSize {
        self.size
    }

    pub fn depth(&self) -> StepDepth {
        self.depth
    }

    /// Evaluate one instruction-boundary notification.
    ///
    /// `thread_id`/`thread` identify the notifying thread; `instruction` is
    /// the boundary's instruction. Returns whether the step completed here.
    pub fn matches(
        &self,
        thread_id: u64,
        thread: &Arc<dyn VmThread>,
        instruction: &Arc<dyn VmInstruction>,
    ) -> DebugResult<bool> {
        // Step requests are per-thread.
        if thread_id != self.snapshot.thread_id {
            return Ok(false);
        }

        // Current top non-synthetic frame and the non-synthetic depth.
        let frames = thread.frames();
        let mut depth = 0usize;
        let mut top_pc: Option<Arc<dyn VmInstruction>> = None;
        for frame in &frames {
            if frame.is_synthetic() {
                continue;
            }
            if top_pc.is_none() {
                top_pc = Some(frame.pc());
            }
            depth += 1;
        }
        let Some(top_pc) = top_pc else {
            return Ok(false);
        };

        // Inside a synthetic frame or instruction context: never a step
        // completion, regardless of mode.
        if !same_instruction(instruction.as_ref(), top_pc.as_ref()) {
            return Ok(false);
        }

        let size = self.snapshot.frames.len();
        let origin = &self.snapshot.frames[0].pc;

        let matched = match (self.size, self.depth) {
            // MIN: any movement away from the originating instruction
            // completes the step; the depth mode is irrelevant.
            (StepSize::Min, _) => !same_instruction(instruction.as_ref(), origin.as_ref()),

            (StepSize::Line, StepDepth::Into) => {
                if depth > size {
                    // Only a method's true entry counts as "stepped into",
                    // and never into a native call.
                    instruction.index() == 0
                        && instruction.kind() != InstructionKind::NativeInvoke
                } else if depth == size {
                    line_differs(instruction, origin)
                } else {
                    returned_to_caller_completes(&self.snapshot, size, depth, instruction)
                }
            }

            (StepSize::Line, StepDepth::Out) => {
                depth < size
                    && returned_to_caller_completes(&self.snapshot, size, depth, instruction)
            }

            (StepSize::Line, StepDepth::Over) => {
                (depth == size && line_differs(instruction, origin))
                    || (depth < size
                        && returned_to_caller_completes(&self.snapshot, size, depth, instruction))
            }
        };

        Ok(matched)
    }
}

fn line_differs(current: &Arc<dyn VmInstruction>, snapshot_pc: &Arc<dyn VmInstruction>) -> bool {
    current.line() != snapshot_pc.line()
}

/// The `depth < size` rule shared by INTO, OVER and OUT: back in a caller
/// frame, the step completes when the line differs from the snapshot frame at
/// that depth, or when the current instruction is an invoke. The invoke case
/// keeps a step visible between two calls on the same source line.
fn returned_to_caller_completes(
    snapshot: &StackSnapshot,
    size: usize,
    depth: usize,
    instruction: &Arc<dyn VmInstruction>,
) -> bool {
    let caller_pc = &snapshot.frames[size - depth].pc;
    line_differs(instruction, caller_pc) || instruction.kind().is_invoke()
}
