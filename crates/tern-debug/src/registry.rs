//! The identifier registry: stable wire-visible ids for live debuggee
//! entities.
//!
//! Every entity gets exactly one id for its lifetime, allocated lazily the
//! first time it crosses the wire boundary and never reused. The registry
//! holds the entity side weakly, so an entry never keeps a debuggee object
//! alive; once the VM collects the entity, resolution fails with the
//! kind-specific error, which is a normal terminal state rather than a bug.
//!
//! Methods are the one exception to in-registry id allocation: the VM already
//! assigns them a globally unique id that travels in `Location`s, so the
//! registry only records the weak back reference under that id.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use tern_jdwp::{tag, TypeTag};

use crate::error::{DebugError, DebugResult};
use crate::vm::{
    ObjectKind, VmClassLoader, VmField, VmFrame, VmMethod, VmObject, VmReferenceType, VmThread,
};

/// Closed classification of everything that can carry a wire id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityTag {
    Array,
    Thread,
    ThreadGroup,
    ClassLoader,
    ClassObject,
    String,
    PlainObject,
    ClassReference,
    InterfaceReference,
    ArrayReference,
    Field,
    Frame,
    Method,
}

impl EntityTag {
    fn from_object_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Array => EntityTag::Array,
            ObjectKind::Thread => EntityTag::Thread,
            ObjectKind::ThreadGroup => EntityTag::ThreadGroup,
            ObjectKind::ClassLoader => EntityTag::ClassLoader,
            ObjectKind::ClassObject => EntityTag::ClassObject,
            ObjectKind::String => EntityTag::String,
            ObjectKind::Plain => EntityTag::PlainObject,
        }
    }

    fn from_type_tag(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Class => EntityTag::ClassReference,
            TypeTag::Interface => EntityTag::InterfaceReference,
            TypeTag::Array => EntityTag::ArrayReference,
        }
    }

    pub fn is_object(self) -> bool {
        self.object_tag_byte().is_some()
    }

    /// The JDWP value tag byte written in front of tagged object ids.
    pub fn object_tag_byte(self) -> Option<u8> {
        match self {
            EntityTag::Array => Some(tag::ARRAY),
            EntityTag::Thread => Some(tag::THREAD),
            EntityTag::ThreadGroup => Some(tag::THREAD_GROUP),
            EntityTag::ClassLoader => Some(tag::CLASS_LOADER),
            EntityTag::ClassObject => Some(tag::CLASS_OBJECT),
            EntityTag::String => Some(tag::STRING),
            EntityTag::PlainObject => Some(tag::OBJECT),
            _ => None,
        }
    }
}

#[derive(Clone)]
enum EntityRef {
    Object(Weak<dyn VmObject>),
    ReferenceType(Weak<dyn VmReferenceType>),
    Field(Weak<dyn VmField>),
    Frame(Weak<dyn VmFrame>),
}

impl EntityRef {
    fn is_live(&self) -> bool {
        match self {
            EntityRef::Object(w) => w.strong_count() > 0,
            EntityRef::ReferenceType(w) => w.strong_count() > 0,
            EntityRef::Field(w) => w.strong_count() > 0,
            EntityRef::Frame(w) => w.strong_count() > 0,
        }
    }
}

struct Entry {
    tag: EntityTag,
    target: EntityRef,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    by_id: HashMap<u64, Entry>,
    by_entity: HashMap<usize, u64>,
    methods: HashMap<u64, Weak<dyn VmMethod>>,
}

/// See the module docs. All operations are atomic with respect to each other;
/// the internal lock is never held across collaborator introspection calls.
pub struct EntityRegistry {
    inner: Mutex<Inner>,
}

/// Identity key for an `Arc`-owned entity: the address of its data.
fn key_of<T: ?Sized>(entity: &Arc<T>) -> usize {
    Arc::as_ptr(entity) as *const () as usize
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Get-or-create the id for a heap object. Classification happens once,
    /// here, via [`VmObject::kind`].
    pub fn object_id(&self, object: &Arc<dyn VmObject>) -> u64 {
        let tag = EntityTag::from_object_kind(object.kind());
        self.intern(
            key_of(object),
            tag,
            EntityRef::Object(Arc::downgrade(object)),
        )
    }

    pub fn reference_type_id(&self, ty: &Arc<dyn VmReferenceType>) -> u64 {
        let tag = EntityTag::from_type_tag(ty.type_tag());
        self.intern(
            key_of(ty),
            tag,
            EntityRef::ReferenceType(Arc::downgrade(ty)),
        )
    }

    pub fn field_id(&self, field: &Arc<dyn VmField>) -> u64 {
        self.intern(
            key_of(field),
            EntityTag::Field,
            EntityRef::Field(Arc::downgrade(field)),
        )
    }

    pub fn frame_id(&self, frame: &Arc<dyn VmFrame>) -> u64 {
        self.intern(
            key_of(frame),
            EntityTag::Frame,
            EntityRef::Frame(Arc::downgrade(frame)),
        )
    }

    /// Record a method under the VM-assigned global id and return that id.
    pub fn method_id(&self, method: &Arc<dyn VmMethod>) -> u64 {
        let id = method.global_id();
        let mut inner = self.inner.lock();
        inner.methods.insert(id, Arc::downgrade(method));
        id
    }

    fn intern(&self, key: usize, tag: EntityTag, target: EntityRef) -> u64 {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.by_entity.get(&key) {
            let live = inner.by_id.get(&id).is_some_and(|e| e.target.is_live());
            if live {
                return id;
            }
            // The entity previously at this address was collected and the
            // address reused. Ids are never recycled, so the stale entry is
            // dropped and a fresh id allocated.
            inner.by_id.remove(&id);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_entity.insert(key, id);
        inner.by_id.insert(id, Entry { tag, target });
        trace!(target: "tern.debug", id, ?tag, "registered entity");
        id
    }

    pub fn tag_of(&self, id: u64) -> Option<EntityTag> {
        let inner = self.inner.lock();
        inner
            .by_id
            .get(&id)
            .map(|entry| entry.tag)
            .or_else(|| inner.methods.contains_key(&id).then_some(EntityTag::Method))
    }

    fn entry(&self, id: u64) -> Option<(EntityTag, EntityRef)> {
        let inner = self.inner.lock();
        inner
            .by_id
            .get(&id)
            .map(|entry| (entry.tag, entry.target.clone()))
    }

    /// Resolve any object-kind id. Unknown ids, collected entities and ids of
    /// a non-object kind all fail with `InvalidObject`.
    pub fn resolve_object(&self, id: u64) -> DebugResult<Arc<dyn VmObject>> {
        match self.entry(id) {
            Some((tag, EntityRef::Object(weak))) if tag.is_object() => {
                weak.upgrade().ok_or(DebugError::InvalidObject(id))
            }
            _ => Err(DebugError::InvalidObject(id)),
        }
    }

    /// Resolve a thread id to the thread object plus its control block.
    ///
    /// A live object of the wrong kind fails with `InvalidThread`; a thread
    /// object whose control block cannot be located fails with
    /// `InvalidObject` (the metadata pairing is resolved lazily, so this can
    /// happen when the object was registered before the VM attached it).
    pub fn resolve_thread(&self, id: u64) -> DebugResult<(Arc<dyn VmObject>, Arc<dyn VmThread>)> {
        match self.entry(id) {
            Some((EntityTag::Thread, EntityRef::Object(weak))) => {
                let object = weak.upgrade().ok_or(DebugError::InvalidThread(id))?;
                let thread = object.thread_meta().ok_or(DebugError::InvalidObject(id))?;
                Ok((object, thread))
            }
            _ => Err(DebugError::InvalidThread(id)),
        }
    }

    /// Resolve a class-object id to the object plus its class descriptor.
    pub fn resolve_class_object(
        &self,
        id: u64,
    ) -> DebugResult<(Arc<dyn VmObject>, Arc<dyn VmReferenceType>)> {
        match self.entry(id) {
            Some((EntityTag::ClassObject, EntityRef::Object(weak))) => {
                let object = weak.upgrade().ok_or(DebugError::InvalidObject(id))?;
                let class = object.class_meta().ok_or(DebugError::InvalidObject(id))?;
                Ok((object, class))
            }
            _ => Err(DebugError::InvalidObject(id)),
        }
    }

    /// Resolve a classloader-object id to the object plus its loader
    /// descriptor.
    pub fn resolve_class_loader(
        &self,
        id: u64,
    ) -> DebugResult<(Arc<dyn VmObject>, Arc<dyn VmClassLoader>)> {
        match self.entry(id) {
            Some((EntityTag::ClassLoader, EntityRef::Object(weak))) => {
                let object = weak.upgrade().ok_or(DebugError::InvalidClassLoader(id))?;
                let loader = object.loader_meta().ok_or(DebugError::InvalidObject(id))?;
                Ok((object, loader))
            }
            _ => Err(DebugError::InvalidClassLoader(id)),
        }
    }

    pub fn resolve_reference_type(&self, id: u64) -> DebugResult<Arc<dyn VmReferenceType>> {
        match self.entry(id) {
            Some((
                EntityTag::ClassReference | EntityTag::InterfaceReference | EntityTag::ArrayReference,
                EntityRef::ReferenceType(weak),
            )) => weak.upgrade().ok_or(DebugError::InvalidClass(id)),
            _ => Err(DebugError::InvalidClass(id)),
        }
    }

    pub fn resolve_field(&self, id: u64) -> DebugResult<Arc<dyn VmField>> {
        match self.entry(id) {
            Some((EntityTag::Field, EntityRef::Field(weak))) => {
                weak.upgrade().ok_or(DebugError::InvalidField(id))
            }
            _ => Err(DebugError::InvalidField(id)),
        }
    }

    pub fn resolve_frame(&self, id: u64) -> DebugResult<Arc<dyn VmFrame>> {
        match self.entry(id) {
            Some((EntityTag::Frame, EntityRef::Frame(weak))) => {
                weak.upgrade().ok_or(DebugError::InvalidFrame(id))
            }
            _ => Err(DebugError::InvalidFrame(id)),
        }
    }

    pub fn resolve_method(&self, id: u64) -> DebugResult<Arc<dyn VmMethod>> {
        let weak = {
            let inner = self.inner.lock();
            inner.methods.get(&id).cloned()
        };
        weak.and_then(|w| w.upgrade())
            .ok_or(DebugError::InvalidMethod(id))
    }

    /// Drop entries whose entity has been collected. Resolution of a dead id
    /// fails identically whether or not a sweep has run; sweeping only
    /// reclaims map space. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.by_id.len() + inner.methods.len();
        inner.by_id.retain(|_, entry| entry.target.is_live());
        let by_id = std::mem::take(&mut inner.by_id);
        inner.by_entity.retain(|_, id| by_id.contains_key(id));
        inner.by_id = by_id;
        inner.methods.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - (inner.by_id.len() + inner.methods.len());
        if removed > 0 {
            trace!(target: "tern.debug", removed, "swept collected registry entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.by_id.len() + inner.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
