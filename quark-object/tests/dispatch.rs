//! End-to-end coverage of the dispatch engine through the public verbs.

use assert_matches::assert_matches;
use futures::FutureExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use quark_object::{
    make_dynamic_object, CallMode, Context, DynamicObject, Error, EventLoop, EventTrace,
    Manageable, ObjectMutex, SignalLink, Subscriber, ThreadingModel, TraceKind,
};
use quark_value::{
    object::{MetaMethod, MetaObject, MetaProperty, MetaSignal},
    ActionId, AnyValue, Type,
};
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

const ADD: ActionId = ActionId(100);
const THRESHOLD: ActionId = ActionId(200);
const FIRED: ActionId = ActionId(300);
const SLOW: ActionId = ActionId(400);
const FAILING: ActionId = ActionId(500);

/// A recording observability context.
struct TestContext {
    stats_enabled: bool,
    trace_enabled: bool,
    event_loop: Option<Arc<dyn EventLoop>>,
    mutex: Arc<ObjectMutex>,
    stats: Mutex<Vec<(ActionId, f32, f32, f32)>>,
    traces: Mutex<Vec<EventTrace>>,
    next_trace_id: AtomicU32,
}

impl TestContext {
    fn new() -> Arc<Self> {
        Self::with_toggles(false, false)
    }

    fn with_toggles(stats: bool, trace: bool) -> Arc<Self> {
        Arc::new(Self {
            stats_enabled: stats,
            trace_enabled: trace,
            event_loop: None,
            mutex: Arc::new(ObjectMutex::new(())),
            stats: Mutex::new(Vec::new()),
            traces: Mutex::new(Vec::new()),
            next_trace_id: AtomicU32::new(1),
        })
    }

    fn with_event_loop(event_loop: Arc<dyn EventLoop>) -> Arc<Self> {
        Arc::new(Self {
            stats_enabled: false,
            trace_enabled: false,
            event_loop: Some(event_loop),
            mutex: Arc::new(ObjectMutex::new(())),
            stats: Mutex::new(Vec::new()),
            traces: Mutex::new(Vec::new()),
            next_trace_id: AtomicU32::new(1),
        })
    }
}

impl Context for TestContext {
    fn event_loop(&self) -> Option<Arc<dyn EventLoop>> {
        self.event_loop.clone()
    }

    fn mutex(&self) -> Arc<ObjectMutex> {
        Arc::clone(&self.mutex)
    }

    fn is_stats_enabled(&self) -> bool {
        self.stats_enabled
    }

    fn is_trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    fn next_trace_id(&self) -> u32 {
        self.next_trace_id.fetch_add(1, Ordering::Relaxed)
    }

    fn push_stats(&self, action: ActionId, wall: f32, user: f32, system: f32) {
        self.stats.lock().push((action, wall, user, system));
    }

    fn trace(&self, trace: EventTrace) {
        self.traces.lock().push(trace);
    }
}

/// An event loop running posted tasks on one dedicated thread.
struct WorkerLoop {
    sender: Mutex<mpsc::Sender<Box<dyn FnOnce() + Send>>>,
    thread_id: thread::ThreadId,
}

impl WorkerLoop {
    fn spawn() -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let (id_sender, id_receiver) = mpsc::channel();
        thread::spawn(move || {
            id_sender.send(thread::current().id()).unwrap();
            while let Ok(task) = receiver.recv() {
                task();
            }
        });
        Arc::new(Self {
            sender: Mutex::new(sender),
            thread_id: id_receiver.recv().unwrap(),
        })
    }
}

impl EventLoop for WorkerLoop {
    fn post(&self, task: Box<dyn FnOnce() + Send>) {
        self.sender.lock().send(task).unwrap();
    }

    fn is_in_loop_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

fn test_object() -> DynamicObject {
    let mut builder = MetaObject::builder();
    builder
        .add_method({
            let mut builder = MetaMethod::builder(ADD);
            builder.set_name("add");
            builder.parameter(0).set_type(Type::Int32);
            builder.parameter(1).set_type(Type::Int32);
            builder.return_value().set_type(Type::Int32);
            builder.build()
        })
        .add_method({
            let mut builder = MetaMethod::builder(SLOW);
            builder.set_name("slow");
            builder.build()
        })
        .add_method({
            let mut builder = MetaMethod::builder(FAILING);
            builder.set_name("failing");
            builder.build()
        })
        .add_property(MetaProperty {
            uid: THRESHOLD,
            name: "threshold".to_owned(),
            signature: "i".parse().unwrap(),
        })
        .add_signal(MetaSignal {
            uid: FIRED,
            name: "fired".to_owned(),
            signature: "s".parse().unwrap(),
        });

    let object = DynamicObject::new();
    object.set_meta_object(builder.build());
    object.set_method(
        ADD,
        Arc::new(|_receiver, params| {
            let lhs = params[0].as_int32().ok_or("expected an integer")?;
            let rhs = params[1].as_int32().ok_or("expected an integer")?;
            Ok(AnyValue::from(lhs + rhs))
        }),
        CallMode::Auto,
    );
    object.set_method(
        SLOW,
        Arc::new(|_receiver, _params| {
            thread::sleep(Duration::from_millis(150));
            Ok(AnyValue::Unit)
        }),
        CallMode::Auto,
    );
    object.set_method(
        FAILING,
        Arc::new(|_receiver, _params| Err("boom".into())),
        CallMode::Auto,
    );
    object
}

fn recording_subscriber() -> (Subscriber, Arc<Mutex<Vec<Vec<AnyValue>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    let subscriber: Subscriber = Arc::new(move |params: &[AnyValue]| {
        seen2.lock().push(params.to_vec());
    });
    (subscriber, seen)
}

#[test]
fn test_call_resolves_and_samples_stats() {
    let object = test_object();
    let context = TestContext::with_toggles(true, false);
    let result = object
        .meta_call(
            Some(Arc::clone(&context) as Arc<dyn Context>),
            ADD,
            vec![3i32.into(), 4i32.into()],
            CallMode::Auto,
        )
        .now_or_never()
        .expect("an auto call from outside any event loop is synchronous")
        .unwrap();
    assert_eq!(result, AnyValue::from(7i32));
    let stats = context.stats.lock();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].0, ADD);
}

#[test]
fn test_call_unknown_method_fails() {
    let object = test_object();
    let context = TestContext::new();
    let err = object
        .meta_call(
            Some(context as Arc<dyn Context>),
            ActionId(101),
            vec![],
            CallMode::Auto,
        )
        .now_or_never()
        .unwrap()
        .unwrap_err();
    assert!(err.to_string().starts_with("Can't find methodID:"));
}

#[test]
fn test_property_writes_reach_every_subscriber() {
    let object = test_object();
    let (first_subscriber, first_seen) = recording_subscriber();
    let (second_subscriber, second_seen) = recording_subscriber();
    object
        .meta_connect(THRESHOLD, first_subscriber)
        .now_or_never()
        .unwrap()
        .unwrap();
    object
        .meta_connect(THRESHOLD, second_subscriber)
        .now_or_never()
        .unwrap()
        .unwrap();

    for _round in 0..2 {
        object
            .meta_set_property(THRESHOLD, 42i32.into())
            .now_or_never()
            .unwrap()
            .unwrap();
    }

    let expected = [vec![AnyValue::from(42i32)], vec![AnyValue::from(42i32)]];
    assert_eq!(first_seen.lock().as_slice(), expected);
    assert_eq!(second_seen.lock().as_slice(), expected);
    let value = object
        .meta_property(THRESHOLD)
        .now_or_never()
        .unwrap()
        .unwrap();
    assert_eq!(value, AnyValue::from(42i32));
}

#[test]
fn test_set_property_rejects_type_mismatch() {
    let object = test_object();
    let err = object
        .meta_set_property(THRESHOLD, "not an integer".into())
        .now_or_never()
        .unwrap()
        .unwrap_err();
    assert!(err.to_string().starts_with("setProperty: "));
}

#[test]
fn test_signal_connect_post_disconnect_roundtrip() {
    let object = test_object();
    let (subscriber, seen) = recording_subscriber();
    let link = object
        .meta_connect(FIRED, subscriber)
        .now_or_never()
        .unwrap()
        .unwrap();
    assert_eq!(link.event(), FIRED);
    assert_eq!(u64::from(link) >> 32, 300);

    object.meta_post(None, FIRED, vec!["x".into()]);
    object.meta_disconnect(link).now_or_never().unwrap().unwrap();
    object.meta_post(None, FIRED, vec!["y".into()]);

    assert_eq!(seen.lock().as_slice(), [vec![AnyValue::from("x")]]);
    assert_matches!(
        object.meta_disconnect(link).now_or_never().unwrap(),
        Err(Error::SignalConnectionNotFound(failed)) => assert_eq!(failed, link)
    );
}

#[test]
fn test_connect_unknown_event_fails() {
    let object = test_object();
    let (subscriber, _seen) = recording_subscriber();
    assert_matches!(
        object
            .meta_connect(ActionId(999), subscriber)
            .now_or_never()
            .unwrap(),
        Err(Error::SignalNotFound(ActionId(999)))
    );
    assert_matches!(
        object
            .meta_disconnect(SignalLink::new(ActionId(999), 1))
            .now_or_never()
            .unwrap(),
        Err(Error::SignalConnectionNotFound(_))
    );
}

#[test]
fn test_post_on_method_runs_queued() {
    let object = test_object();
    let (sender, receiver) = mpsc::channel();
    let sender = Mutex::new(sender);
    object.set_method(
        ActionId(110),
        Arc::new(move |_receiver, params| {
            sender
                .lock()
                .send(params.first().cloned().unwrap_or_default())
                .unwrap();
            Ok(AnyValue::Unit)
        }),
        CallMode::Auto,
    );
    let mut builder = MetaObject::builder();
    builder.add_method({
        let mut builder = MetaMethod::builder(ActionId(110));
        builder.set_name("notify");
        builder.build()
    });
    object.set_meta_object(MetaObject::merge(&object.meta_object(), &builder.build()));

    object.meta_post(None, ActionId(110), vec!["ping".into()]);
    assert_eq!(
        receiver.recv_timeout(Duration::from_secs(5)),
        Ok(AnyValue::from("ping"))
    );
}

#[test]
fn test_post_on_unknown_event_is_dropped() {
    let object = test_object();
    // Nothing to observe; the post must neither panic nor invoke anything.
    object.meta_post(None, ActionId(999), vec![]);
}

#[test]
fn test_single_thread_auto_calls_do_not_overlap() {
    let object = test_object();
    object.set_threading_model(ThreadingModel::SingleThread);
    let intervals = Arc::new(Mutex::new(Vec::new()));
    let intervals2 = Arc::clone(&intervals);
    object.set_method(
        ActionId(120),
        Arc::new(move |_receiver, _params| {
            let start = Instant::now();
            thread::sleep(Duration::from_millis(100));
            intervals2.lock().push((start, Instant::now()));
            Ok(AnyValue::Unit)
        }),
        CallMode::Auto,
    );
    let context = TestContext::new();

    thread::scope(|scope| {
        for _call in 0..2 {
            let object = object.clone();
            let context = Arc::clone(&context);
            scope.spawn(move || {
                object
                    .meta_call(
                        Some(context as Arc<dyn Context>),
                        ActionId(120),
                        vec![],
                        CallMode::Auto,
                    )
                    .now_or_never()
                    .unwrap()
                    .unwrap();
            });
        }
    });

    let mut intervals = intervals.lock().clone();
    intervals.sort_by_key(|(start, _end)| *start);
    assert_eq!(intervals.len(), 2);
    assert!(
        intervals[0].1 <= intervals[1].0,
        "execution intervals overlap"
    );
}

#[test]
fn test_call_from_loop_thread_is_inlined() {
    let worker = WorkerLoop::spawn();
    let object = test_object();
    let context = TestContext::with_event_loop(Arc::clone(&worker) as Arc<dyn EventLoop>);
    let (sender, receiver) = mpsc::channel();

    let posted_object = object.clone();
    let posted_context = Arc::clone(&context);
    worker.post(Box::new(move || {
        let future = posted_object.meta_call(
            Some(posted_context as Arc<dyn Context>),
            ADD,
            vec![1i32.into(), 2i32.into()],
            CallMode::Auto,
        );
        // Settled before the future is even returned.
        sender.send(future.now_or_never()).unwrap();
    }));

    let settled = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(settled.unwrap().unwrap(), AnyValue::from(3i32));
}

#[test]
fn test_call_from_outside_loop_thread_is_queued_on_it() {
    let worker = WorkerLoop::spawn();
    let object = test_object();
    let context = TestContext::with_event_loop(Arc::clone(&worker) as Arc<dyn EventLoop>);
    let worker_thread = Arc::new(Mutex::new(None));
    let worker_thread2 = Arc::clone(&worker_thread);
    object.set_method(
        ActionId(130),
        Arc::new(move |_receiver, _params| {
            *worker_thread2.lock() = Some(thread::current().id());
            Ok(AnyValue::Unit)
        }),
        CallMode::Auto,
    );

    let future = object.meta_call(
        Some(context as Arc<dyn Context>),
        ActionId(130),
        vec![],
        CallMode::Auto,
    );
    futures::executor::block_on(future).unwrap();
    assert_eq!(*worker_thread.lock(), Some(worker.thread_id));
}

#[test]
fn test_disabled_observability_records_nothing() {
    let object = test_object();
    let context = TestContext::with_toggles(false, false);
    object
        .meta_call(
            Some(Arc::clone(&context) as Arc<dyn Context>),
            ADD,
            vec![1i32.into(), 1i32.into()],
            CallMode::Auto,
        )
        .now_or_never()
        .unwrap()
        .unwrap();
    assert!(context.stats.lock().is_empty());
    assert!(context.traces.lock().is_empty());
}

#[test]
fn test_failing_call_traces_paired_events() {
    let object = test_object();
    let context = TestContext::with_toggles(false, true);
    let err = object
        .meta_call(
            Some(Arc::clone(&context) as Arc<dyn Context>),
            FAILING,
            vec![],
            CallMode::Auto,
        )
        .now_or_never()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.to_string(), "boom");

    let traces = context.traces.lock();
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].kind, TraceKind::Call);
    assert_eq!(traces[1].kind, TraceKind::Error);
    assert_eq!(traces[0].id, traces[1].id);
    assert_eq!(traces[0].action, FAILING);
    assert_eq!(traces[1].arguments, AnyValue::from("boom"));
}

#[test]
fn test_published_object_exposes_manageable_members() {
    let object = test_object();
    object.set_manageable(Arc::new(Manageable::new()));
    let handle = make_dynamic_object(object, true, None);

    // Enable tracing through the builtin method, then watch the trace feed
    // through the builtin signal.
    handle
        .meta_call(
            quark_object::manageable::ID_ENABLE_TRACE,
            vec![true.into()],
            CallMode::Auto,
        )
        .now_or_never()
        .unwrap()
        .unwrap();
    let (subscriber, seen) = recording_subscriber();
    handle
        .meta_connect(quark_object::manageable::ID_TRACE_OBJECT, subscriber)
        .now_or_never()
        .unwrap()
        .unwrap();

    let result = handle
        .meta_call(ADD, vec![20i32.into(), 22i32.into()], CallMode::Auto)
        .now_or_never()
        .unwrap()
        .unwrap();
    assert_eq!(result, AnyValue::from(42i32));

    let seen = seen.lock();
    assert_eq!(seen.len(), 2, "one call event and one result event");
    let call_event = seen[0][0].as_tuple().unwrap();
    let result_event = seen[1][0].as_tuple().unwrap();
    // Both events share the allocated trace id.
    assert_eq!(call_event[0], result_event[0]);
}

#[test]
fn test_queued_call_type_defers_execution() {
    let object = test_object();
    let context = TestContext::new();
    let (sender, receiver) = mpsc::channel();
    let sender = Mutex::new(sender);
    object.set_method(
        ActionId(140),
        Arc::new(move |_receiver, _params| {
            sender.lock().send(thread::current().id()).unwrap();
            Ok(AnyValue::Unit)
        }),
        CallMode::Auto,
    );
    let future = object.meta_call(
        Some(context as Arc<dyn Context>),
        ActionId(140),
        vec![],
        CallMode::Queued,
    );
    futures::executor::block_on(future).unwrap();
    let executed_on = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(executed_on, thread::current().id());
}
