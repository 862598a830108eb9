//! Call-site contract between an object handle and the dispatcher.

use crate::{
    event_loop::EventLoop,
    manageable::Manageable,
    trace::EventTrace,
};
use parking_lot::ReentrantMutex;
use quark_value::ActionId;
use std::sync::Arc;

/// The per-object call lock.
///
/// Re-entrant so that a method body may call another method of the same
/// object from the same thread.
pub type ObjectMutex = ReentrantMutex<()>;

/// What the dispatcher needs to know about the invoking object handle: where
/// queued calls go, which lock serializes them, and where observability
/// samples are pushed.
///
/// Trace-id allocation and stats live on the context rather than on the
/// object so that one object can participate in several traced call trees.
pub trait Context: Send + Sync {
    /// The event loop this handle is bound to, if any. When present, calls
    /// made from outside of the loop are queued onto it.
    fn event_loop(&self) -> Option<Arc<dyn EventLoop>>;

    fn mutex(&self) -> Arc<ObjectMutex>;

    fn is_stats_enabled(&self) -> bool;

    fn is_trace_enabled(&self) -> bool;

    fn next_trace_id(&self) -> u32;

    /// Records one timing sample, in seconds, for `action`.
    fn push_stats(&self, action: ActionId, wall: f32, user: f32, system: f32);

    fn trace(&self, trace: EventTrace);
}

/// The [`Context`] of a published object: observability state is the
/// object's [`Manageable`] facet, trace events fan out on its `traceObject`
/// signal.
pub struct ObjectContext {
    manageable: Arc<Manageable>,
    event_loop: Option<Arc<dyn EventLoop>>,
    mutex: Arc<ObjectMutex>,
}

impl ObjectContext {
    pub fn new(manageable: Arc<Manageable>, event_loop: Option<Arc<dyn EventLoop>>) -> Self {
        Self {
            manageable,
            event_loop,
            mutex: Arc::new(ObjectMutex::new(())),
        }
    }

    pub fn manageable(&self) -> &Arc<Manageable> {
        &self.manageable
    }

    /// A copy of this context bound to another event loop, sharing the
    /// observability state and the call lock.
    pub fn with_event_loop(&self, event_loop: Option<Arc<dyn EventLoop>>) -> Self {
        Self {
            manageable: Arc::clone(&self.manageable),
            event_loop,
            mutex: Arc::clone(&self.mutex),
        }
    }
}

impl Context for ObjectContext {
    fn event_loop(&self) -> Option<Arc<dyn EventLoop>> {
        self.event_loop.clone()
    }

    fn mutex(&self) -> Arc<ObjectMutex> {
        Arc::clone(&self.mutex)
    }

    fn is_stats_enabled(&self) -> bool {
        self.manageable.is_stats_enabled()
    }

    fn is_trace_enabled(&self) -> bool {
        self.manageable.is_trace_enabled()
    }

    fn next_trace_id(&self) -> u32 {
        self.manageable.next_trace_id()
    }

    fn push_stats(&self, action: ActionId, wall: f32, user: f32, system: f32) {
        self.manageable.push_stats(action, wall, user, system);
    }

    fn trace(&self, trace: EventTrace) {
        self.manageable.trace_signal().trigger(&[trace.to_value()]);
    }
}

impl std::fmt::Debug for ObjectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectContext")
            .field("manageable", &self.manageable)
            .field("bound_event_loop", &self.event_loop.is_some())
            .finish()
    }
}
