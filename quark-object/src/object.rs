//! The generic object surface and the publication facade.

use crate::{
    context::{Context, ObjectContext},
    dispatch::{CallFuture, CallMode},
    dynamic::DynamicObject,
    event_loop::EventLoop,
    manageable::Manageable,
    signal::{SignalLink, Subscriber},
};
use quark_value::{ActionId, AnyValue, MetaObject};
use std::sync::Arc;
use tracing::debug;

/// The capability set every object implementation exposes, whether generated
/// at compile time or assembled at runtime.
///
/// Callers only ever see this contract; the trait object's vtable is what
/// binds an opaque instance to its implementation.
pub trait ObjectType: Send + Sync {
    fn meta_object(&self) -> MetaObject;

    fn meta_call(
        &self,
        context: Option<Arc<dyn Context>>,
        action: ActionId,
        params: Vec<AnyValue>,
        call_type: CallMode,
    ) -> CallFuture;

    fn meta_post(&self, context: Option<Arc<dyn Context>>, event: ActionId, params: Vec<AnyValue>);

    fn connect(&self, event: ActionId, subscriber: Subscriber) -> CallFuture<SignalLink>;

    fn disconnect(&self, link: SignalLink) -> CallFuture<()>;

    fn property(&self, id: ActionId) -> CallFuture<AnyValue>;

    fn set_property(&self, id: ActionId, value: AnyValue) -> CallFuture<()>;

    /// The implementations this one derives from. Runtime-assembled objects
    /// have none.
    fn parent_types(&self) -> Vec<std::any::TypeId> {
        Vec::new()
    }
}

impl ObjectType for DynamicObject {
    fn meta_object(&self) -> MetaObject {
        DynamicObject::meta_object(self)
    }

    fn meta_call(
        &self,
        context: Option<Arc<dyn Context>>,
        action: ActionId,
        params: Vec<AnyValue>,
        call_type: CallMode,
    ) -> CallFuture {
        DynamicObject::meta_call(self, context, action, params, call_type)
    }

    fn meta_post(&self, context: Option<Arc<dyn Context>>, event: ActionId, params: Vec<AnyValue>) {
        DynamicObject::meta_post(self, context, event, params)
    }

    fn connect(&self, event: ActionId, subscriber: Subscriber) -> CallFuture<SignalLink> {
        DynamicObject::meta_connect(self, event, subscriber)
    }

    fn disconnect(&self, link: SignalLink) -> CallFuture<()> {
        DynamicObject::meta_disconnect(self, link)
    }

    fn property(&self, id: ActionId) -> CallFuture<AnyValue> {
        DynamicObject::meta_property(self, id)
    }

    fn set_property(&self, id: ActionId, value: AnyValue) -> CallFuture<()> {
        DynamicObject::meta_set_property(self, id, value)
    }
}

/// Cleanup hook run when the last handle to a published object is dropped.
pub type OnDelete = Box<dyn FnOnce(&DynamicObject) + Send>;

struct CleanupGuard {
    object: DynamicObject,
    destroy_object: bool,
    on_delete: parking_lot::Mutex<Option<OnDelete>>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        debug!(
            destroy = self.destroy_object,
            "cleaning up published dynamic object"
        );
        if let Some(on_delete) = self.on_delete.lock().take() {
            on_delete(&self.object);
        }
        if self.destroy_object {
            self.object.terminate();
        }
    }
}

/// A shared handle to a published object.
///
/// The handle carries the object's call context: its [`Manageable`] facet as
/// observability state, the per-object call lock, and an optional bound event
/// loop. Clones share all of it.
#[derive(Clone)]
pub struct Object {
    object: Arc<dyn ObjectType>,
    context: Arc<ObjectContext>,
    _cleanup: Option<Arc<CleanupGuard>>,
}

impl Object {
    pub fn meta_object(&self) -> MetaObject {
        self.object.meta_object()
    }

    pub fn context(&self) -> Arc<ObjectContext> {
        Arc::clone(&self.context)
    }

    /// Rebinds the handle to an event loop; calls made through it are queued
    /// there unless already running on one of its threads.
    pub fn bind_event_loop(&mut self, event_loop: Option<Arc<dyn EventLoop>>) {
        self.context = Arc::new(self.context.with_event_loop(event_loop));
    }

    pub fn meta_call(
        &self,
        action: ActionId,
        params: Vec<AnyValue>,
        call_type: CallMode,
    ) -> CallFuture {
        self.object
            .meta_call(Some(self.context()), action, params, call_type)
    }

    pub fn meta_post(&self, event: ActionId, params: Vec<AnyValue>) {
        self.object.meta_post(Some(self.context()), event, params)
    }

    pub fn meta_connect(&self, event: ActionId, subscriber: Subscriber) -> CallFuture<SignalLink> {
        self.object.connect(event, subscriber)
    }

    pub fn meta_disconnect(&self, link: SignalLink) -> CallFuture<()> {
        self.object.disconnect(link)
    }

    pub fn meta_property(&self, id: ActionId) -> CallFuture<AnyValue> {
        self.object.property(id)
    }

    pub fn meta_set_property(&self, id: ActionId, value: AnyValue) -> CallFuture<()> {
        self.object.set_property(id, value)
    }

    pub fn parent_types(&self) -> Vec<std::any::TypeId> {
        self.object.parent_types()
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("context", &self.context)
            .finish()
    }
}

/// Publishes a dynamic object behind an [`Object`] handle. This is the only
/// sanctioned path to hand a [`DynamicObject`] out to callers.
///
/// When the last clone of the handle goes away, `on_delete` (if any) runs
/// first, then the object is terminated iff `destroy_object` — a caller
/// keeping its own [`DynamicObject`] clone alive passes `false`.
pub fn make_dynamic_object(
    object: DynamicObject,
    destroy_object: bool,
    on_delete: Option<OnDelete>,
) -> Object {
    let manageable = object
        .manageable()
        .unwrap_or_else(|| Arc::new(Manageable::new()));
    let context = Arc::new(ObjectContext::new(manageable, None));
    let cleanup = (destroy_object || on_delete.is_some()).then(|| {
        Arc::new(CleanupGuard {
            object: object.clone(),
            destroy_object,
            on_delete: parking_lot::Mutex::new(on_delete),
        })
    });
    Object {
        object: Arc::new(object),
        context,
        _cleanup: cleanup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Receiver;
    use futures::FutureExt;
    use quark_value::object::MetaMethod;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn published_echo() -> Object {
        let object = DynamicObject::new();
        let mut builder = MetaObject::builder();
        builder.add_method({
            let mut builder = MetaMethod::builder(100u32);
            builder.set_name("echo");
            builder.build()
        });
        object.set_meta_object(builder.build());
        object.set_method(
            ActionId(100),
            Arc::new(|_receiver: &Receiver, params: &[AnyValue]| {
                Ok(params.first().cloned().unwrap_or_default())
            }),
            CallMode::Auto,
        );
        object.set_manageable(Arc::new(Manageable::new()));
        make_dynamic_object(object, true, None)
    }

    #[test]
    fn test_object_forwards_meta_call() {
        let object = published_echo();
        let result = object
            .meta_call(ActionId(100), vec!["hello".into()], CallMode::Auto)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(result, AnyValue::from("hello"));
        assert!(object.parent_types().is_empty());
    }

    #[test]
    fn test_last_handle_drop_runs_cleanup() {
        let deleted = Arc::new(AtomicBool::new(false));
        let deleted2 = Arc::clone(&deleted);
        let inner = DynamicObject::new();
        let handle = make_dynamic_object(
            inner.clone(),
            true,
            Some(Box::new(move |_object| {
                deleted2.store(true, Ordering::SeqCst);
            })),
        );
        let clone = handle.clone();
        drop(handle);
        assert!(!deleted.load(Ordering::SeqCst));
        drop(clone);
        assert!(deleted.load(Ordering::SeqCst));
        assert!(inner.is_dying());
    }

    #[test]
    fn test_keep_alive_publication_does_not_terminate() {
        let inner = DynamicObject::new();
        let handle = make_dynamic_object(inner.clone(), false, None);
        drop(handle);
        assert!(!inner.is_dying());
    }
}
