//! Request matching through the notification pipeline.

use std::sync::Arc;

use tern_debug::events::{ClassPattern, CountFilter, Filter};
use tern_debug::mock::{MockInstruction, MockObject, MockType};
use tern_debug::vm::{ObjectKind, VmEvent, VmObject, VmReferenceType};
use tern_jdwp::{EventKind, JdwpReader, SuspendPolicy};

use crate::suite::fixtures::TestVm;

#[test]
fn breakpoint_fires_only_at_its_location() {
    let vm = TestVm::new();
    let location = vm.session.location(1, 4).unwrap();
    let request_id = vm
        .session
        .create_breakpoint_request(location, Some(SuspendPolicy::EventThread))
        .unwrap();

    let elsewhere = MockInstruction::plain(&vm.outer, 0, 104);
    vm.set_stack(&[&elsewhere]);
    vm.session.notify(&[vm.boundary(&elsewhere)]).unwrap();
    assert!(vm.sink.is_empty());

    let hit = MockInstruction::plain(&vm.outer, 4, 105);
    vm.set_stack(&[&hit]);
    vm.session.notify(&[vm.boundary(&hit)]).unwrap();

    let packets = vm.sink.packets();
    assert_eq!(packets.len(), 1);
    let mut r = JdwpReader::new(&packets[0]);
    assert_eq!(r.read_u8().unwrap(), SuspendPolicy::EventThread.as_u8());
    assert_eq!(r.read_u32().unwrap(), 1);
    assert_eq!(r.read_u8().unwrap(), EventKind::Breakpoint.as_u8());
    assert_eq!(r.read_i32().unwrap(), request_id as i32);
}

#[test]
fn breakpoint_and_step_share_one_composite_packet() {
    let vm = TestVm::new();
    let call = MockInstruction::invoke(&vm.outer, 0, 104);
    vm.set_stack(&[&call]);
    let step_id = vm
        .session
        .create_step_request(vm.thread_id, 1, 1, Some(SuspendPolicy::EventThread))
        .unwrap();
    let bp_id = vm
        .session
        .create_breakpoint_request(vm.session.location(1, 4).unwrap(), Some(SuspendPolicy::All))
        .unwrap();

    // One boundary satisfies both: the breakpoint's location and the step's
    // line change at the same depth.
    let hit = MockInstruction::plain(&vm.outer, 4, 105);
    vm.set_stack(&[&hit]);
    vm.session.notify(&[vm.boundary(&hit)]).unwrap();

    let packets = vm.sink.packets();
    assert_eq!(packets.len(), 1);
    let mut r = JdwpReader::new(&packets[0]);
    // Folded to the strictest policy of the two requests.
    assert_eq!(r.read_u8().unwrap(), SuspendPolicy::All.as_u8());
    assert_eq!(r.read_u32().unwrap(), 2);
    // Breakpoints are reported before steps.
    assert_eq!(r.read_u8().unwrap(), EventKind::Breakpoint.as_u8());
    assert_eq!(r.read_i32().unwrap(), bp_id as i32);
    r.read_id().unwrap();
    r.read_location().unwrap();
    assert_eq!(r.read_u8().unwrap(), EventKind::SingleStep.as_u8());
    assert_eq!(r.read_i32().unwrap(), step_id as i32);

    // One packet, one suspension.
    assert_eq!(
        vm.scheduler.directives(),
        vec![tern_debug::mock::Directive::SuspendAll]
    );
}

#[test]
fn class_prepare_honors_match_and_exclude_patterns() {
    let vm = TestVm::new();
    vm.session.requests().register(
        EventKind::ClassPrepare,
        SuspendPolicy::None,
        vec![
            Filter::ClassMatch(ClassPattern::new("com.example.*")),
            Filter::ClassExclude(ClassPattern::new("*$Generated")),
        ],
    );

    let prepare = |class: Arc<dyn VmReferenceType>| VmEvent::ClassPrepare {
        thread: vm.thread_object.clone(),
        class,
    };

    vm.session
        .notify(&[prepare(MockType::class("com.example.Worker"))])
        .unwrap();
    assert_eq!(vm.sink.len(), 1);

    vm.session
        .notify(&[prepare(MockType::class("org.elsewhere.Worker"))])
        .unwrap();
    assert_eq!(vm.sink.len(), 1);

    vm.session
        .notify(&[prepare(MockType::class("com.example.Worker$Generated"))])
        .unwrap();
    assert_eq!(vm.sink.len(), 1);
}

#[test]
fn count_filter_passes_exactly_its_nth_event() {
    let vm = TestVm::new();
    vm.session.requests().register(
        EventKind::ThreadStart,
        SuspendPolicy::None,
        vec![Filter::Count(CountFilter::new(2).unwrap())],
    );

    let start = || {
        let obj = MockObject::new(ObjectKind::Thread);
        obj.attach_thread("worker");
        VmEvent::ThreadStart {
            thread: obj as Arc<dyn VmObject>,
        }
    };

    vm.session.notify(&[start()]).unwrap();
    assert!(vm.sink.is_empty());
    vm.session.notify(&[start()]).unwrap();
    assert_eq!(vm.sink.len(), 1);
    vm.session.notify(&[start()]).unwrap();
    assert_eq!(vm.sink.len(), 1);
}

#[test]
fn thread_filter_limits_a_request_to_one_thread() {
    let vm = TestVm::new();
    vm.session.requests().register(
        EventKind::ThreadDeath,
        SuspendPolicy::None,
        vec![Filter::ThreadOnly {
            thread_id: vm.thread_id,
        }],
    );

    let other = MockObject::new(ObjectKind::Thread);
    other.attach_thread("worker");
    vm.session
        .notify(&[VmEvent::ThreadDeath {
            thread: other as Arc<dyn VmObject>,
        }])
        .unwrap();
    assert!(vm.sink.is_empty());

    vm.session
        .notify(&[VmEvent::ThreadDeath {
            thread: vm.thread_object.clone(),
        }])
        .unwrap();
    assert_eq!(vm.sink.len(), 1);
}
