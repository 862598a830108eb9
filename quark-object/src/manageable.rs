//! The lifecycle-introspection facet shared by every managed object.
//!
//! A reserved slice of the member id space carries builtin methods toggling
//! and reading per-object statistics and tracing. Objects opt in through
//! [`DynamicObject::set_manageable`](crate::DynamicObject::set_manageable),
//! which merges the facet's registry into their own.

use crate::{
    dispatch::{CallMode, Method, Receiver},
    error::BoxError,
    signal::Signal,
    trace::MethodStatistics,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use quark_value::{
    object::{MetaMethod, MetaSignal},
    ActionId, AnyValue, Map, MetaObject, Signature, Type,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
};

pub const ID_IS_STATS_ENABLED: ActionId = ActionId(80);
pub const ID_ENABLE_STATS: ActionId = ActionId(81);
pub const ID_STATS: ActionId = ActionId(82);
pub const ID_CLEAR_STATS: ActionId = ActionId(83);
pub const ID_IS_TRACE_ENABLED: ActionId = ActionId(84);
pub const ID_ENABLE_TRACE: ActionId = ActionId(85);
pub const ID_TRACE_OBJECT: ActionId = ActionId(86);

/// Observability state and builtin member registry of one object.
///
/// Methods with an id in `[START_ID, END_ID)` receive this facet as their
/// implicit receiver instead of the object.
pub struct Manageable {
    stats_enabled: AtomicBool,
    trace_enabled: AtomicBool,
    next_trace_id: AtomicU32,
    stats: Mutex<HashMap<ActionId, MethodStatistics>>,
    trace_signal: Arc<Signal>,
}

impl Manageable {
    /// First id of the reserved range.
    pub const START_ID: ActionId = ID_IS_STATS_ENABLED;
    /// One past the last id of the reserved range; user members live at or
    /// above it.
    pub const END_ID: ActionId = ActionId(100);

    pub fn new() -> Self {
        Self {
            stats_enabled: AtomicBool::new(false),
            trace_enabled: AtomicBool::new(false),
            next_trace_id: AtomicU32::new(1),
            stats: Mutex::new(HashMap::new()),
            trace_signal: Arc::new(Signal::new(
                Self::meta_object()
                    .signal(ID_TRACE_OBJECT)
                    .map(|signal| signal.signature.clone())
                    .unwrap_or_default(),
            )),
        }
    }

    pub fn is_stats_enabled(&self) -> bool {
        self.stats_enabled.load(Ordering::Acquire)
    }

    pub fn enable_stats(&self, enabled: bool) {
        self.stats_enabled.store(enabled, Ordering::Release);
    }

    pub fn is_trace_enabled(&self) -> bool {
        self.trace_enabled.load(Ordering::Acquire)
    }

    pub fn enable_trace(&self, enabled: bool) {
        self.trace_enabled.store(enabled, Ordering::Release);
    }

    pub fn next_trace_id(&self) -> u32 {
        self.next_trace_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn push_stats(&self, action: ActionId, wall: f32, user: f32, system: f32) {
        self.stats
            .lock()
            .entry(action)
            .or_default()
            .push(wall, user, system);
    }

    pub fn stats(&self) -> HashMap<ActionId, MethodStatistics> {
        self.stats.lock().clone()
    }

    pub fn clear_stats(&self) {
        self.stats.lock().clear();
    }

    /// The signal every trace event of this object is emitted on.
    pub fn trace_signal(&self) -> &Arc<Signal> {
        &self.trace_signal
    }

    /// The interface slice describing the builtin members.
    pub fn meta_object() -> &'static MetaObject {
        static META: Lazy<MetaObject> = Lazy::new(|| {
            let mut builder = MetaObject::builder();
            builder
                .add_method({
                    let mut builder = MetaMethod::builder(ID_IS_STATS_ENABLED);
                    builder.set_name("isStatsEnabled");
                    builder.return_value().set_type(Type::Bool);
                    builder.build()
                })
                .add_method({
                    let mut builder = MetaMethod::builder(ID_ENABLE_STATS);
                    builder.set_name("enableStats");
                    builder.parameter(0).set_type(Type::Bool);
                    builder.build()
                })
                .add_method({
                    let mut builder = MetaMethod::builder(ID_STATS);
                    builder.set_name("stats");
                    builder.return_value().set_signature(Signature::dynamic());
                    builder.build()
                })
                .add_method({
                    let mut builder = MetaMethod::builder(ID_CLEAR_STATS);
                    builder.set_name("clearStats");
                    builder.build()
                })
                .add_method({
                    let mut builder = MetaMethod::builder(ID_IS_TRACE_ENABLED);
                    builder.set_name("isTraceEnabled");
                    builder.return_value().set_type(Type::Bool);
                    builder.build()
                })
                .add_method({
                    let mut builder = MetaMethod::builder(ID_ENABLE_TRACE);
                    builder.set_name("enableTrace");
                    builder.parameter(0).set_type(Type::Bool);
                    builder.build()
                })
                .add_signal(MetaSignal {
                    uid: ID_TRACE_OBJECT,
                    name: "traceObject".to_owned(),
                    signature: "(IiImlll)".parse().unwrap_or_default(),
                });
            builder.build()
        });
        &META
    }

    /// The callables backing the builtin methods. They run with the `Direct`
    /// hint: none of them blocks, and introspection must stay reachable while
    /// the object lock is held.
    pub fn method_map() -> &'static HashMap<ActionId, (Method, CallMode)> {
        static METHODS: Lazy<HashMap<ActionId, (Method, CallMode)>> = Lazy::new(|| {
            let mut methods = HashMap::new();
            methods.insert(
                ID_IS_STATS_ENABLED,
                facet_method(|manageable, _params| {
                    Ok(AnyValue::from(manageable.is_stats_enabled()))
                }),
            );
            methods.insert(
                ID_ENABLE_STATS,
                facet_method(|manageable, params| {
                    manageable.enable_stats(bool_argument(params)?);
                    Ok(AnyValue::Unit)
                }),
            );
            methods.insert(
                ID_STATS,
                facet_method(|manageable, _params| {
                    let stats: Map<AnyValue, AnyValue> = manageable
                        .stats()
                        .into_iter()
                        .map(|(action, stats)| (AnyValue::from(action.0), stats.to_value()))
                        .collect();
                    Ok(AnyValue::Map(stats))
                }),
            );
            methods.insert(
                ID_CLEAR_STATS,
                facet_method(|manageable, _params| {
                    manageable.clear_stats();
                    Ok(AnyValue::Unit)
                }),
            );
            methods.insert(
                ID_IS_TRACE_ENABLED,
                facet_method(|manageable, _params| {
                    Ok(AnyValue::from(manageable.is_trace_enabled()))
                }),
            );
            methods.insert(
                ID_ENABLE_TRACE,
                facet_method(|manageable, params| {
                    manageable.enable_trace(bool_argument(params)?);
                    Ok(AnyValue::Unit)
                }),
            );
            methods
        });
        &METHODS
    }

    /// The signal cells the facet contributes to an object's signal table.
    pub fn signals(&self) -> Vec<(ActionId, Arc<Signal>)> {
        vec![(ID_TRACE_OBJECT, Arc::clone(&self.trace_signal))]
    }
}

impl Default for Manageable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Manageable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manageable")
            .field("stats_enabled", &self.is_stats_enabled())
            .field("trace_enabled", &self.is_trace_enabled())
            .finish()
    }
}

fn facet_method<F>(f: F) -> (Method, CallMode)
where
    F: Fn(&Manageable, &[AnyValue]) -> Result<AnyValue, BoxError> + Send + Sync + 'static,
{
    let method: Method = Arc::new(move |receiver: &Receiver, params: &[AnyValue]| {
        let manageable = receiver
            .manageable()
            .ok_or("builtin method routed to a plain object receiver")?;
        f(manageable, params)
    });
    (method, CallMode::Direct)
}

fn bool_argument(params: &[AnyValue]) -> Result<bool, BoxError> {
    params
        .first()
        .and_then(AnyValue::as_bool)
        .ok_or_else(|| "expected one boolean argument".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manageable_trace_ids_are_monotonic() {
        let manageable = Manageable::new();
        let first = manageable.next_trace_id();
        let second = manageable.next_trace_id();
        assert!(second > first);
    }

    #[test]
    fn test_manageable_stats_accumulate_and_clear() {
        let manageable = Manageable::new();
        manageable.push_stats(ActionId(100), 1.0, 0.5, 0.1);
        manageable.push_stats(ActionId(100), 3.0, 0.5, 0.1);
        let stats = manageable.stats();
        assert_eq!(stats[&ActionId(100)].count, 2);
        assert_eq!(stats[&ActionId(100)].wall.cumulated, 4.0);
        manageable.clear_stats();
        assert!(manageable.stats().is_empty());
    }

    #[test]
    fn test_manageable_meta_object_covers_reserved_range() {
        let meta = Manageable::meta_object();
        for (id, _method) in meta.methods.iter() {
            assert!(*id >= Manageable::START_ID && *id < Manageable::END_ID);
        }
        assert!(meta.signal(ID_TRACE_OBJECT).is_some());
        assert!(Manageable::method_map().contains_key(&ID_ENABLE_STATS));
    }

    #[test]
    fn test_facet_method_requires_manageable_receiver() {
        let (method, mode) = facet_method(|_manageable, _params| Ok(AnyValue::Unit));
        assert_eq!(mode, CallMode::Direct);
        let manageable = Arc::new(Manageable::new());
        let result = method(&Receiver::Manageable(manageable), &[]);
        assert!(result.is_ok());
    }
}
