//! Task-posting execution contexts.

use once_cell::sync::Lazy;
use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// A unit of work posted to an event loop.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that runs posted tasks on its own threads.
///
/// The engine only ever posts fire-and-forget closures and asks whether the
/// current thread already belongs to the loop; everything else (sizing,
/// shutdown, fairness) is the implementation's business.
pub trait EventLoop: Send + Sync {
    fn post(&self, task: Task);

    fn is_in_loop_thread(&self) -> bool;
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// An [`EventLoop`] backed by a multi-threaded tokio runtime.
///
/// Posted tasks may block (they typically wait on the per-object call lock),
/// so they are scheduled on the runtime's blocking pool.
pub struct ThreadPoolEventLoop {
    id: usize,
    runtime: tokio::runtime::Runtime,
}

impl ThreadPoolEventLoop {
    pub fn new() -> std::io::Result<Self> {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name(format!("quark-eventloop-{id}"))
            .on_thread_start(move || CURRENT_POOL.with(|current| current.set(id)))
            .build()?;
        Ok(Self { id, runtime })
    }

    /// Drives a future to completion on the loop's threads, detached from the
    /// caller.
    pub fn watch<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        drop(self.runtime.spawn(future));
    }
}

impl EventLoop for ThreadPoolEventLoop {
    fn post(&self, task: Task) {
        drop(self.runtime.spawn_blocking(task));
    }

    fn is_in_loop_thread(&self) -> bool {
        CURRENT_POOL.with(|current| current.get()) == self.id
    }
}

impl std::fmt::Debug for ThreadPoolEventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolEventLoop")
            .field("id", &self.id)
            .finish()
    }
}

/// The process-wide event loop used when an asynchronous call has no loop to
/// go to.
pub fn default_event_loop() -> &'static Arc<ThreadPoolEventLoop> {
    static DEFAULT: Lazy<Arc<ThreadPoolEventLoop>> = Lazy::new(|| {
        Arc::new(
            ThreadPoolEventLoop::new().expect("failed to start the default thread-pool event loop"),
        )
    });
    &DEFAULT
}
