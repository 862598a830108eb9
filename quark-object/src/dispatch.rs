//! The central call dispatcher.
//!
//! Every method invocation of a dynamic object funnels through [`dispatch`],
//! which is the only place deciding whether a callable runs synchronously in
//! the caller's thread or is handed off to an event loop, and whether it must
//! hold the per-object lock while it runs.

use crate::{
    context::{Context, ObjectMutex},
    dynamic::DynamicObject,
    error::{BoxError, Error},
    event_loop::{default_event_loop, EventLoop},
    manageable::Manageable,
    os,
    trace::{EventTrace, TraceKind},
};
use futures::channel::oneshot;
use once_cell::sync::Lazy;
use quark_value::{ActionId, AnyValue};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Whether concurrent invocations on the same object must be serialized.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum ThreadingModel {
    #[default]
    SingleThread,
    MultiThread,
}

/// Synchronicity preference, carried both as a per-method hint and as a
/// per-invocation request.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum CallMode {
    #[default]
    Auto,
    Direct,
    Queued,
}

/// The implicit receiver a callable is invoked on.
#[derive(Clone)]
pub enum Receiver {
    Object(DynamicObject),
    Manageable(Arc<Manageable>),
}

impl Receiver {
    pub fn object(&self) -> Option<&DynamicObject> {
        match self {
            Receiver::Object(object) => Some(object),
            Receiver::Manageable(_) => None,
        }
    }

    pub fn manageable(&self) -> Option<&Arc<Manageable>> {
        match self {
            Receiver::Manageable(manageable) => Some(manageable),
            Receiver::Object(_) => None,
        }
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Receiver::Object(_) => f.write_str("Receiver::Object"),
            Receiver::Manageable(_) => f.write_str("Receiver::Manageable"),
        }
    }
}

/// A type-erased callable bound to a method id.
pub type Method = Arc<dyn Fn(&Receiver, &[AnyValue]) -> Result<AnyValue, BoxError> + Send + Sync>;

/// The future of a dispatched call.
///
/// Synchronously dispatched calls return an already-settled future; queued
/// calls settle when the posted task runs. Either way the caller never blocks
/// inside the engine.
#[derive(Debug)]
pub struct CallFuture<T = AnyValue>(State<T>);

#[derive(Debug)]
enum State<T> {
    Ready(Option<Result<T, Error>>),
    Pending(oneshot::Receiver<Result<T, Error>>),
}

impl<T> CallFuture<T> {
    pub fn from_result(result: Result<T, Error>) -> Self {
        Self(State::Ready(Some(result)))
    }

    pub fn ready(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    pub fn error(error: Error) -> Self {
        Self::from_result(Err(error))
    }
}

impl<T> Unpin for CallFuture<T> {}

impl<T> std::future::Future for CallFuture<T> {
    type Output = Result<T, Error>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        match &mut self.get_mut().0 {
            State::Ready(result) => match result.take() {
                Some(result) => std::task::Poll::Ready(result),
                None => panic!("call future polled after completion"),
            },
            State::Pending(receiver) => std::pin::Pin::new(receiver)
                .poll(cx)
                .map(|settled| settled.unwrap_or(Err(Error::BrokenPromise))),
        }
    }
}

pub(crate) struct Promise<T>(oneshot::Sender<Result<T, Error>>);

impl<T> Promise<T> {
    pub(crate) fn settle(self, result: Result<T, Error>) {
        // The receiving future may have been dropped; a fire-and-forget
        // caller does exactly that.
        drop(self.0.send(result));
    }
}

pub(crate) fn promise<T>() -> (Promise<T>, CallFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (Promise(tx), CallFuture(State::Pending(rx)))
}

/// Dispatches one method invocation and returns its future.
///
/// The synchronicity decision, in priority order:
/// 1. an event loop was supplied: synchronous iff the current thread belongs
///    to it;
/// 2. the method carries a non-`Auto` hint: synchronous iff the hint is
///    `Direct`;
/// 3. otherwise: synchronous iff the caller did not request `Queued`.
///
/// The callable holds the context's per-object lock while it runs iff a
/// context is present, the object is `SingleThread` and the method hint is
/// `Auto`.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    el: Option<Arc<dyn EventLoop>>,
    object_model: ThreadingModel,
    method_model: CallMode,
    call_type: CallMode,
    context: Option<Arc<dyn Context>>,
    action: ActionId,
    method: Method,
    receiver: Receiver,
    params: Vec<AnyValue>,
) -> CallFuture {
    let sync = match &el {
        Some(el) => el.is_in_loop_thread(),
        None if method_model != CallMode::Auto => method_model == CallMode::Direct,
        None => call_type != CallMode::Queued,
    };
    let do_lock = context.is_some()
        && object_model == ThreadingModel::SingleThread
        && method_model == CallMode::Auto;
    debug!(
        %action,
        sync,
        lock = do_lock,
        call_type = ?call_type,
        "dispatching method call"
    );
    if sync {
        CallFuture::from_result(invoke(
            context.as_deref(),
            do_lock,
            action,
            &method,
            &receiver,
            &params,
        ))
    } else {
        let el = el.unwrap_or_else(|| Arc::clone(default_event_loop()) as Arc<dyn EventLoop>);
        let (promise, future) = promise();
        el.post(Box::new(move || {
            promise.settle(invoke(
                context.as_deref(),
                do_lock,
                action,
                &method,
                &receiver,
                &params,
            ));
        }));
        future
    }
}

/// Runs the callable, recording stats and trace events on the context when
/// enabled. Errors never unwind out of this function.
fn invoke(
    context: Option<&dyn Context>,
    lock: bool,
    action: ActionId,
    method: &Method,
    receiver: &Receiver,
    params: &[AnyValue],
) -> Result<AnyValue, Error> {
    let stats = context.is_some_and(|context| context.is_stats_enabled());
    let trace = context.is_some_and(|context| context.is_trace_enabled());

    let mut trace_id = 0;
    if trace {
        if let Some(context) = context {
            trace_id = context.next_trace_id();
            context.trace(EventTrace::call(trace_id, action, trace_arguments(params)));
        }
    }

    let wall_start = stats.then(Instant::now);
    let cpu_start = (stats || trace).then(os::cpu_time);

    let result = run_callable(lock, context, method, receiver, params);

    let cpu_delta = cpu_start.map(|start| os::cpu_time() - start);
    if stats {
        if let (Some(context), Some(wall_start), Some(cpu_delta)) = (context, wall_start, cpu_delta)
        {
            context.push_stats(
                action,
                wall_start.elapsed().as_secs_f32(),
                cpu_delta.user_usecs as f32 / 1e6,
                cpu_delta.system_usecs as f32 / 1e6,
            );
        }
    }
    if trace {
        if let (Some(context), Some(cpu_delta)) = (context, cpu_delta) {
            let (kind, value) = match &result {
                Ok(value) => (TraceKind::Result, value.clone()),
                Err(err) => (TraceKind::Error, AnyValue::from(err.to_string())),
            };
            context.trace(EventTrace::outcome(
                trace_id,
                kind,
                action,
                value,
                cpu_delta.user_usecs,
                cpu_delta.system_usecs,
            ));
        }
    }
    result
}

fn run_callable(
    lock: bool,
    context: Option<&dyn Context>,
    method: &Method,
    receiver: &Receiver,
    params: &[AnyValue],
) -> Result<AnyValue, Error> {
    let call = || match (lock, context) {
        (true, Some(context)) => locked_call(method, receiver, params, &context.mutex()),
        _ => method(receiver, params).map_err(Error::Other),
    };
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(panic_error(payload)),
    }
}

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> Error {
    if let Some(message) = payload.downcast_ref::<&str>() {
        Error::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Error::from(message.clone())
    } else {
        Error::UnknownException
    }
}

fn locked_call(
    method: &Method,
    receiver: &Receiver,
    params: &[AnyValue],
    mutex: &ObjectMutex,
) -> Result<AnyValue, Error> {
    match deadlock_timeout() {
        None => {
            let _lock = mutex.lock();
            method(receiver, params).map_err(Error::Other)
        }
        Some(timeout) => {
            debug!("acquiring object lock");
            match mutex.try_lock_for(timeout) {
                Some(_lock) => method(receiver, params).map_err(Error::Other),
                None => {
                    warn!("time-out acquiring object lock when calling method");
                    Err(Error::LockTimeout)
                }
            }
        }
    }
}

const DEADLOCK_TIMEOUT_ENV: &str = "QI_DEADLOCK_TIMEOUT";
const DEADLOCK_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// The wait budget of the per-object lock; `None` means wait forever. Read
/// once per process.
fn deadlock_timeout() -> Option<Duration> {
    static TIMEOUT: Lazy<Option<Duration>> = Lazy::new(|| {
        let msecs = match std::env::var(DEADLOCK_TIMEOUT_ENV) {
            Err(_) => return Some(DEADLOCK_TIMEOUT_DEFAULT),
            Ok(value) => value.trim().parse::<u64>().unwrap_or(0),
        };
        (msecs != 0).then(|| Duration::from_millis(msecs))
    });
    *TIMEOUT
}

const OPAQUE_ARGUMENT: &str = "<??>";

// Value kinds with no self-describing textual form are replaced by an opaque
// placeholder in trace events.
fn trace_arguments(params: &[AnyValue]) -> AnyValue {
    AnyValue::List(
        params
            .iter()
            .map(|param| match param {
                AnyValue::Unit | AnyValue::Raw(_) => AnyValue::from(OPAQUE_ARGUMENT),
                param => param.clone(),
            })
            .collect(),
    )
}
