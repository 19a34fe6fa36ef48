//! Byte-level checks of what actually leaves the engine.

use std::sync::Arc;

use tern_debug::events::Filter;
use tern_debug::mock::{MockField, MockInstruction, MockObject};
use tern_debug::vm::{ObjectKind, VmEvent, VmObject};
use tern_jdwp::{tag, EventKind, JdwpReader, JdwpWriter, SuspendPolicy, Value};

use crate::suite::fixtures::TestVm;

#[test]
fn thread_start_composite_is_byte_exact() {
    let vm = TestVm::new();
    let request_id = vm.session.requests().register(
        EventKind::ThreadStart,
        SuspendPolicy::None,
        vec![],
    );
    vm.session
        .notify(&[VmEvent::ThreadStart {
            thread: vm.thread_object.clone(),
        }])
        .unwrap();

    let mut expected = JdwpWriter::new();
    expected.write_u8(0); // suspend policy NONE
    expected.write_u32(1); // one event
    expected.write_u8(6); // THREAD_START
    expected.write_i32(request_id as i32);
    expected.write_id(vm.thread_id);

    assert_eq!(vm.sink.packets(), vec![expected.into_vec()]);
}

#[test]
fn class_prepare_body_carries_signature_and_status() {
    let vm = TestVm::new();
    vm.session
        .requests()
        .register(EventKind::ClassPrepare, SuspendPolicy::None, vec![]);
    vm.session
        .notify(&[VmEvent::ClassPrepare {
            thread: vm.thread_object.clone(),
            class: vm.ty.clone(),
        }])
        .unwrap();

    let packets = vm.sink.packets();
    let mut r = JdwpReader::new(&packets[0]);
    r.read_u8().unwrap(); // policy
    assert_eq!(r.read_u32().unwrap(), 1);
    assert_eq!(r.read_u8().unwrap(), EventKind::ClassPrepare.as_u8());
    r.read_i32().unwrap();
    assert_eq!(r.read_id().unwrap(), vm.thread_id);
    assert_eq!(r.read_u8().unwrap(), 1); // CLASS type tag
    let class_id = r.read_id().unwrap();
    assert!(class_id != 0);
    assert_eq!(r.read_string().unwrap(), "Lcom/example/Main;");
    assert_eq!(r.read_i32().unwrap(), 3); // verified | prepared
    assert_eq!(r.remaining(), 0);
}

#[test]
fn field_modification_body_round_trips_through_the_reader() {
    let vm = TestVm::new();
    let field = MockField::new(77, &vm.ty, "counter");
    let receiver = MockObject::new(ObjectKind::Plain);
    let receiver: Arc<dyn VmObject> = receiver;
    let receiver_id = vm.session.registry().object_id(&receiver);
    vm.session.requests().register(
        EventKind::FieldModification,
        SuspendPolicy::None,
        vec![Filter::InstanceOnly {
            object_id: receiver_id,
        }],
    );

    let at = MockInstruction::plain(&vm.outer, 4, 105);
    vm.set_stack(&[&at]);
    vm.session
        .notify(&[VmEvent::FieldModification {
            thread: vm.thread_object.clone(),
            instruction: at.clone(),
            field: field.clone(),
            object: Some(receiver.clone()),
            value_to_be: Value::Int(-7),
        }])
        .unwrap();

    let packets = vm.sink.packets();
    assert_eq!(packets.len(), 1);
    let mut r = JdwpReader::new(&packets[0]);
    r.read_u8().unwrap(); // policy
    assert_eq!(r.read_u32().unwrap(), 1);
    assert_eq!(r.read_u8().unwrap(), EventKind::FieldModification.as_u8());
    r.read_i32().unwrap();
    assert_eq!(r.read_id().unwrap(), vm.thread_id);
    let location = r.read_location().unwrap();
    assert_eq!(location.method_id, 1);
    assert_eq!(location.index, 4);
    assert_eq!(r.read_u8().unwrap(), 1); // declaring type tag
    r.read_id().unwrap(); // declaring type id
    r.read_id().unwrap(); // field id
    let (obj_tag, obj_id) = r.read_tagged_id().unwrap();
    assert_eq!(obj_tag, tag::OBJECT);
    assert_eq!(obj_id, receiver_id);
    assert_eq!(r.read_tagged_value().unwrap(), Value::Int(-7));
    assert_eq!(r.remaining(), 0);
}

#[test]
fn static_field_access_writes_a_null_tagged_object() {
    let vm = TestVm::new();
    let field = MockField::new(78, &vm.ty, "INSTANCES");
    vm.session
        .requests()
        .register(EventKind::FieldAccess, SuspendPolicy::None, vec![]);

    let at = MockInstruction::plain(&vm.outer, 0, 104);
    vm.set_stack(&[&at]);
    vm.session
        .notify(&[VmEvent::FieldAccess {
            thread: vm.thread_object.clone(),
            instruction: at.clone(),
            field,
            object: None,
        }])
        .unwrap();

    let packets = vm.sink.packets();
    let mut r = JdwpReader::new(&packets[0]);
    r.read_u8().unwrap();
    r.read_u32().unwrap();
    r.read_u8().unwrap();
    r.read_i32().unwrap();
    r.read_id().unwrap();
    r.read_location().unwrap();
    r.read_u8().unwrap();
    r.read_id().unwrap();
    r.read_id().unwrap();
    assert_eq!(r.read_tagged_id().unwrap(), (tag::OBJECT, 0));
    assert_eq!(r.remaining(), 0);
}
