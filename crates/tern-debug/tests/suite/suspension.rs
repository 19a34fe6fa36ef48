//! Suspend-policy enforcement and the hold/release queue, driven through the
//! session rather than against the coordinator directly.

use std::sync::Arc;

use tern_debug::mock::{Directive, MockInstruction, MockObject};
use tern_debug::vm::{ObjectKind, VmEvent, VmObject, VmScheduler};
use tern_jdwp::{EventKind, SuspendPolicy};

use crate::suite::fixtures::TestVm;

#[test]
fn suspend_none_delivers_without_touching_the_scheduler() {
    let vm = TestVm::new();
    vm.session.requests().register(
        EventKind::ThreadStart,
        SuspendPolicy::None,
        vec![],
    );
    vm.session
        .notify(&[VmEvent::ThreadStart {
            thread: vm.thread_object.clone(),
        }])
        .unwrap();
    assert_eq!(vm.sink.len(), 1);
    assert!(vm.scheduler.directives().is_empty());
}

#[test]
fn event_thread_policy_suspends_only_the_origin() {
    let vm = TestVm::new();
    vm.session.requests().register(
        EventKind::ThreadStart,
        SuspendPolicy::EventThread,
        vec![],
    );
    vm.session
        .notify(&[VmEvent::ThreadStart {
            thread: vm.thread_object.clone(),
        }])
        .unwrap();

    assert_eq!(
        vm.scheduler.directives(),
        vec![Directive::SuspendThread("main".into())]
    );
    assert!(vm.scheduler.is_thread_suspended(&vm.thread_object));

    let other = MockObject::new(ObjectKind::Thread);
    other.attach_thread("worker");
    let other: Arc<dyn VmObject> = other;
    assert!(!vm.scheduler.is_thread_suspended(&other));

    vm.session.resume_thread(vm.thread_id).unwrap();
    assert!(!vm.scheduler.is_thread_suspended(&vm.thread_object));
}

#[test]
fn all_policy_suspends_everything_and_resume_all_undoes_it() {
    let vm = TestVm::new();
    vm.session
        .requests()
        .register(EventKind::VmDeath, SuspendPolicy::All, vec![]);
    vm.session.notify(&[VmEvent::VmDeath]).unwrap();

    assert_eq!(vm.scheduler.directives(), vec![Directive::SuspendAll]);
    assert!(vm.scheduler.is_thread_suspended(&vm.thread_object));

    vm.session.resume_all();
    assert!(!vm.scheduler.is_thread_suspended(&vm.thread_object));
}

#[test]
fn held_packets_reach_the_sink_only_on_release_in_order() {
    let vm = TestVm::new();
    vm.session
        .requests()
        .register(EventKind::Breakpoint, SuspendPolicy::None, vec![]);

    vm.session.hold_events();

    let first = MockInstruction::plain(&vm.outer, 0, 104);
    let second = MockInstruction::plain(&vm.outer, 4, 105);
    vm.set_stack(&[&first]);
    vm.session.notify(&[vm.boundary(&first)]).unwrap();
    vm.set_stack(&[&second]);
    vm.session.notify(&[vm.boundary(&second)]).unwrap();
    assert!(vm.sink.is_empty());

    vm.session.release_events();
    let packets = vm.sink.packets();
    assert_eq!(packets.len(), 2);

    // Arrival order: the first packet carries the index-0 location, the
    // second the index-4 one. The location's index is the final 8 bytes.
    let index_of = |packet: &[u8]| {
        u64::from_be_bytes(packet[packet.len() - 8..].try_into().unwrap())
    };
    assert_eq!(index_of(&packets[0]), 0);
    assert_eq!(index_of(&packets[1]), 4);
}

#[test]
fn suspension_is_still_enforced_while_holding() {
    let vm = TestVm::new();
    vm.session
        .requests()
        .register(EventKind::Breakpoint, SuspendPolicy::All, vec![]);

    vm.session.hold_events();
    let at = MockInstruction::plain(&vm.outer, 0, 104);
    vm.set_stack(&[&at]);
    vm.session.notify(&[vm.boundary(&at)]).unwrap();

    // The packet is parked but the debuggee stops now.
    assert!(vm.sink.is_empty());
    assert_eq!(vm.scheduler.directives(), vec![Directive::SuspendAll]);
}
