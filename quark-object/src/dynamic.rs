//! Objects whose members are declared at runtime.

use crate::{
    context::Context,
    dispatch::{self, CallFuture, CallMode, Method, Receiver, ThreadingModel},
    error::{Error, PropertyError},
    event_loop::default_event_loop,
    manageable::Manageable,
    property::Property,
    signal::{Signal, SignalLink, Subscriber, INVALID_LOCAL_LINK},
};
use parking_lot::Mutex;
use quark_value::{ActionId, AnyValue, MetaObject};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, error};

/// A cell of the signal table.
///
/// Signals declared as such are owned by the object; a signal mirroring a
/// property is owned by that property and only borrowed here, so that the
/// table never releases it.
enum SignalCell {
    Owned(Arc<Signal>),
    FromProperty(ActionId),
}

#[derive(Default)]
struct Tables {
    meta: MetaObject,
    methods: HashMap<ActionId, (Method, CallMode)>,
    signals: HashMap<ActionId, SignalCell>,
    properties: HashMap<ActionId, Arc<Property>>,
    threading_model: ThreadingModel,
    manageable: Option<Arc<Manageable>>,
}

struct Inner {
    dying: AtomicBool,
    tables: Mutex<Tables>,
}

/// An object assembled at runtime from a [`MetaObject`] and a set of
/// callables, reached through the uniform call/post/connect/disconnect verbs.
///
/// The handle is cheap to clone; clones share the object. An instance is
/// populated by the builder-phase setters, then serves calls; its signal and
/// property tables keep growing on demand when a declared-but-untouched
/// member id is first referenced.
#[derive(Clone)]
pub struct DynamicObject {
    inner: Arc<Inner>,
}

impl DynamicObject {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                dying: AtomicBool::new(false),
                tables: Mutex::new(Tables::default()),
            }),
        }
    }

    pub fn meta_object(&self) -> MetaObject {
        self.inner.tables.lock().meta.clone()
    }

    /// Replaces the interface snapshot wholesale. Members are materialized
    /// on demand afterwards.
    pub fn set_meta_object(&self, meta: MetaObject) {
        self.inner.tables.lock().meta = meta;
    }

    pub fn threading_model(&self) -> ThreadingModel {
        self.inner.tables.lock().threading_model
    }

    pub fn set_threading_model(&self, model: ThreadingModel) {
        self.inner.tables.lock().threading_model = model;
    }

    pub fn set_method(&self, id: ActionId, method: Method, hint: CallMode) {
        self.inner.tables.lock().methods.insert(id, (method, hint));
    }

    pub fn method(&self, id: ActionId) -> Option<Method> {
        self.inner
            .tables
            .lock()
            .methods
            .get(&id)
            .map(|(method, _hint)| Arc::clone(method))
    }

    pub fn set_signal(&self, id: ActionId, signal: Signal) {
        self.inner
            .tables
            .lock()
            .signals
            .insert(id, SignalCell::Owned(Arc::new(signal)));
    }

    pub fn set_property(&self, id: ActionId, property: Property) {
        self.inner
            .tables
            .lock()
            .properties
            .insert(id, Arc::new(property));
    }

    /// Merges the builtin lifecycle facet into this object: its metadata,
    /// its method callables and its signal cells.
    pub fn set_manageable(&self, manageable: Arc<Manageable>) {
        let mut tables = self.inner.tables.lock();
        tables.meta = MetaObject::merge(&tables.meta, Manageable::meta_object());
        tables.methods.extend(
            Manageable::method_map()
                .iter()
                .map(|(id, (method, hint))| (*id, (Arc::clone(method), *hint))),
        );
        for (id, signal) in manageable.signals() {
            tables.signals.insert(id, SignalCell::Owned(signal));
        }
        tables.manageable = Some(manageable);
    }

    pub fn manageable(&self) -> Option<Arc<Manageable>> {
        self.inner.tables.lock().manageable.clone()
    }

    pub fn is_dying(&self) -> bool {
        self.inner.dying.load(Ordering::Acquire)
    }

    /// Begins destruction: further verbs are rejected, every signal owned by
    /// the object is drained, and the member tables are released. Signals
    /// owned by properties are left to the property cells.
    pub fn terminate(&self) {
        self.inner.dying.store(true, Ordering::Release);
        let mut tables = self.inner.tables.lock();
        for cell in tables.signals.values() {
            if let SignalCell::Owned(signal) = cell {
                signal.disconnect_all();
            }
        }
        tables.signals.clear();
        tables.properties.clear();
        tables.methods.clear();
        tables.manageable = None;
    }

    /// The signal registered under `id`, materializing it on first reference.
    ///
    /// For an id declared as a property this is the property's own signal;
    /// for an id declared as a signal, a fresh cell carrying the declared
    /// parameter signature. Undeclared ids have no signal.
    pub fn signal(&self, id: ActionId) -> Option<Arc<Signal>> {
        let mut tables = self.inner.tables.lock();
        Self::signal_cell(&mut tables, id)
    }

    /// The property cell registered under `id`, materializing it from the
    /// declared value signature on first reference.
    pub fn property(&self, id: ActionId) -> Result<Arc<Property>, PropertyError> {
        let mut tables = self.inner.tables.lock();
        Self::property_cell(&mut tables, id)
    }

    fn signal_cell(tables: &mut Tables, id: ActionId) -> Option<Arc<Signal>> {
        match tables.signals.get(&id) {
            Some(SignalCell::Owned(signal)) => return Some(Arc::clone(signal)),
            Some(SignalCell::FromProperty(property_id)) => {
                let property_id = *property_id;
                return tables
                    .properties
                    .get(&property_id)
                    .map(|property| Arc::clone(property.signal()));
            }
            None => {}
        }
        if tables.meta.property(id).is_some() {
            let property = Self::property_cell(tables, id).ok()?;
            let signal = Arc::clone(property.signal());
            tables.signals.insert(id, SignalCell::FromProperty(id));
            return Some(signal);
        }
        let declared = tables
            .meta
            .signal(id)
            .map(|signal| signal.signature.clone());
        declared.map(|signature| {
            let signal = Arc::new(Signal::new(signature));
            tables
                .signals
                .insert(id, SignalCell::Owned(Arc::clone(&signal)));
            signal
        })
    }

    fn property_cell(tables: &mut Tables, id: ActionId) -> Result<Arc<Property>, PropertyError> {
        if let Some(property) = tables.properties.get(&id) {
            return Ok(Arc::clone(property));
        }
        let declared = tables
            .meta
            .property(id)
            .map(|property| property.signature.clone())
            .ok_or(PropertyError::NotAProperty(id))?;
        let property = Arc::new(Property::new(declared.into_type()));
        tables.properties.insert(id, Arc::clone(&property));
        Ok(property)
    }

    /// Invokes the method registered under `action` through the dispatcher.
    ///
    /// Methods of the reserved facet range receive the [`Manageable`]
    /// instance as implicit receiver; every other method receives the object
    /// itself.
    pub fn meta_call(
        &self,
        context: Option<Arc<dyn Context>>,
        action: ActionId,
        params: Vec<AnyValue>,
        call_type: CallMode,
    ) -> CallFuture {
        if self.is_dying() {
            return CallFuture::error(Error::ObjectDying);
        }
        let (method, hint, threading_model, receiver) = {
            let tables = self.inner.tables.lock();
            let (method, hint) = match tables.methods.get(&action) {
                Some((method, hint)) => (Arc::clone(method), *hint),
                None => return CallFuture::error(Error::MethodNotFound(action)),
            };
            let receiver = match &tables.manageable {
                Some(manageable)
                    if action >= Manageable::START_ID && action < Manageable::END_ID =>
                {
                    Receiver::Manageable(Arc::clone(manageable))
                }
                _ => Receiver::Object(self.clone()),
            };
            (method, hint, tables.threading_model, receiver)
        };
        let el = context.as_ref().and_then(|context| context.event_loop());
        dispatch::dispatch(
            el,
            threading_model,
            hint,
            call_type,
            context,
            action,
            method,
            receiver,
            params,
        )
    }

    /// Fire-and-forget emission on `event`.
    ///
    /// A declared signal is triggered synchronously. Posting on a method id
    /// issues a queued call whose failure is logged and dropped. Anything
    /// else is logged and dropped.
    pub fn meta_post(
        &self,
        context: Option<Arc<dyn Context>>,
        event: ActionId,
        params: Vec<AnyValue>,
    ) {
        if self.is_dying() {
            error!(%event, "post on an object being destroyed");
            return;
        }
        if let Some(signal) = self.signal(event) {
            signal.trigger(&params);
            return;
        }
        // Allow posting on a method.
        let is_method = self.inner.tables.lock().meta.method(event).is_some();
        if is_method {
            let future = self.meta_call(context, event, params, CallMode::Queued);
            default_event_loop().watch(async move {
                if let Err(err) = future.await {
                    error!(error = &err as &dyn std::error::Error, "post call failed");
                }
            });
            return;
        }
        error!(%event, "post on unknown event");
    }

    /// Subscribes to `event` and returns the composed subscription handle.
    pub fn meta_connect(&self, event: ActionId, subscriber: Subscriber) -> CallFuture<SignalLink> {
        if self.is_dying() {
            return CallFuture::error(Error::ObjectDying);
        }
        let signal = match self.signal(event) {
            Some(signal) => signal,
            None => return CallFuture::error(Error::SignalNotFound(event)),
        };
        let local = signal.connect(subscriber);
        if local == INVALID_LOCAL_LINK {
            return CallFuture::ready(SignalLink::INVALID);
        }
        let link = SignalLink::new(event, local);
        debug_assert_eq!(link.event(), event);
        debug_assert_eq!(link.local(), local);
        debug!(%link, %event, "new signal subscriber");
        CallFuture::ready(link)
    }

    /// Removes the subscription designated by `link`.
    // TODO: use a non-creating lookup here; going through the materializing
    // one can allocate a signal solely for the disconnection to then fail.
    pub fn meta_disconnect(&self, link: SignalLink) -> CallFuture<()> {
        let event = link.event();
        let local = link.local();
        match self.signal(event) {
            Some(signal) if signal.disconnect(local) => CallFuture::ready(()),
            _ => CallFuture::error(Error::SignalConnectionNotFound(link)),
        }
    }

    pub fn meta_property(&self, id: ActionId) -> CallFuture<AnyValue> {
        match self.property(id) {
            Ok(property) => CallFuture::ready(property.value()),
            Err(err) => CallFuture::error(Error::Property(err)),
        }
    }

    pub fn meta_set_property(&self, id: ActionId, value: AnyValue) -> CallFuture<()> {
        // Write outside of the table lock: the property signal triggers
        // subscribers that may call back into the object.
        match self
            .property(id)
            .and_then(|property| property.set_value(value))
        {
            Ok(()) => CallFuture::ready(()),
            Err(err) => CallFuture::error(Error::SetProperty(err)),
        }
    }
}

impl Default for DynamicObject {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.inner.tables.lock();
        f.debug_struct("DynamicObject")
            .field("methods", &tables.methods.len())
            .field("signals", &tables.signals.len())
            .field("properties", &tables.properties.len())
            .field("threading_model", &tables.threading_model)
            .field("dying", &self.is_dying())
            .finish()
    }
}
