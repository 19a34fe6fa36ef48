//! A LINE/OVER step driven end to end through the session.

use std::sync::Arc;

use tern_debug::error::DebugError;
use tern_debug::mock::{MockFrame, MockInstruction};
use tern_debug::vm::VmFrame;
use tern_jdwp::{EventKind, JdwpReader, SuspendPolicy, TypeTag};

use crate::suite::fixtures::TestVm;

const SIZE_LINE: u32 = 1;
const DEPTH_OVER: u32 = 1;

#[test]
fn line_over_step_completes_after_the_call_returns() {
    let vm = TestVm::new();

    // Two-frame snapshot: stopped on the call at line 104, with the program
    // entry point below it.
    let base = MockInstruction::invoke(&vm.inner, 2, 41);
    let call = MockInstruction::invoke(&vm.outer, 0, 104);
    vm.set_stack(&[&call, &base]);
    let request_id = vm
        .session
        .create_step_request(vm.thread_id, SIZE_LINE, DEPTH_OVER, Some(SuspendPolicy::All))
        .unwrap();

    // Inside the callee: deeper than the snapshot, OVER does not complete.
    let callee = MockInstruction::plain(&vm.inner, 0, 40);
    vm.set_stack(&[&callee, &call, &base]);
    vm.session.notify(&[vm.boundary(&callee)]).unwrap();
    assert!(vm.sink.is_empty());

    // A boundary raised from inside a synthetic frame: the notifying
    // instruction is not the top non-synthetic frame's pc, skipped outright.
    let returned = MockInstruction::plain(&vm.outer, 4, 105);
    let synthetic_pc = MockInstruction::plain(&vm.inner, 2, 41);
    vm.thread.set_frames(vec![
        MockFrame::synthetic(synthetic_pc.clone()) as Arc<dyn VmFrame>,
        MockFrame::new(returned.clone()),
        MockFrame::new(base.clone()),
    ]);
    vm.session.notify(&[vm.boundary(&synthetic_pc)]).unwrap();
    assert!(vm.sink.is_empty());

    // Back at the snapshot depth on line 105: the step completes.
    vm.set_stack(&[&returned, &base]);
    vm.session.notify(&[vm.boundary(&returned)]).unwrap();

    let packets = vm.sink.packets();
    assert_eq!(packets.len(), 1);
    let mut r = JdwpReader::new(&packets[0]);
    assert_eq!(r.read_u8().unwrap(), SuspendPolicy::All.as_u8());
    assert_eq!(r.read_u32().unwrap(), 1);
    assert_eq!(r.read_u8().unwrap(), EventKind::SingleStep.as_u8());
    assert_eq!(r.read_i32().unwrap(), request_id as i32);
    assert_eq!(r.read_id().unwrap(), vm.thread_id);
    let location = r.read_location().unwrap();
    assert_eq!(location.type_tag, TypeTag::Class);
    assert_eq!(location.method_id, 1);
    assert_eq!(location.index, 4);
    assert_eq!(r.remaining(), 0);

    // Step requests persist until the front end clears them.
    assert_eq!(vm.session.requests().count(EventKind::SingleStep), 1);
    assert!(vm
        .session
        .requests()
        .get(EventKind::SingleStep, request_id)
        .is_some());
}

#[test]
fn min_step_fires_again_on_the_next_boundary() {
    let vm = TestVm::new();
    let at = MockInstruction::plain(&vm.outer, 0, 104);
    vm.set_stack(&[&at]);
    let request_id = vm
        .session
        .create_step_request(vm.thread_id, 0, DEPTH_OVER, Some(SuspendPolicy::EventThread))
        .unwrap();

    let next = MockInstruction::plain(&vm.outer, 4, 105);
    vm.set_stack(&[&next]);
    vm.session.notify(&[vm.boundary(&next)]).unwrap();
    assert_eq!(vm.sink.len(), 1);

    // Persistent: any further movement away from the origin fires too.
    let further = MockInstruction::plain(&vm.outer, 8, 106);
    vm.set_stack(&[&further]);
    vm.session.notify(&[vm.boundary(&further)]).unwrap();
    assert_eq!(vm.sink.len(), 2);

    vm.session.clear_request(EventKind::SingleStep, request_id);
    vm.session.notify(&[vm.boundary(&next)]).unwrap();
    assert_eq!(vm.sink.len(), 2);
}

#[test]
fn bad_wire_integers_are_rejected_before_any_snapshot() {
    let vm = TestVm::new();
    let at = MockInstruction::plain(&vm.outer, 0, 104);
    vm.set_stack(&[&at]);

    let err = vm
        .session
        .create_step_request(vm.thread_id, 7, DEPTH_OVER, None)
        .unwrap_err();
    assert!(matches!(err, DebugError::IllegalArgument(_)));
    assert_eq!(err.error_code().as_u16(), 103);

    let err = vm
        .session
        .create_step_request(vm.thread_id, SIZE_LINE, 9, None)
        .unwrap_err();
    assert!(matches!(err, DebugError::IllegalArgument(_)));

    assert_eq!(vm.session.requests().count(EventKind::SingleStep), 0);
}

#[test]
fn step_request_for_an_unknown_thread_fails() {
    let vm = TestVm::new();
    assert!(matches!(
        vm.session.create_step_request(9999, SIZE_LINE, DEPTH_OVER, None),
        Err(DebugError::InvalidThread(9999))
    ));
}
