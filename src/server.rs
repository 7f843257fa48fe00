//! Background resource thread.
//!
//! A [`RenderServer`] owns one worker thread that executes resource tasks
//! (shader compilation, texture upload, asset decoding) in submission order.
//! Every task hands its result back through a [`TaskFuture`], which can be
//! waited on, polled, or awaited.
//!
//! The worker drains the queue and then sleeps on a condition variable until
//! a task arrives or a join is requested. The shutdown flag is checked under
//! the same lock as the queue, so no wakeup is missed. Tasks still queued
//! when the join is requested are executed before the thread exits.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::{RenderError, RenderResult};

type Job = Box<dyn FnOnce() + Send>;

/// Lifecycle of the resource thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Running,
    /// Join requested; the worker finishes the queue and exits
    JoinRequested,
    Joined,
}

struct Queue {
    tasks: VecDeque<Job>,
    state: ServerState,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
}

enum Slot<T> {
    Pending(Option<Waker>),
    Ready(RenderResult<T>),
    Taken,
}

struct TaskSlot<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> TaskSlot<T> {
    fn fulfill(&self, result: RenderResult<T>) {
        let waker = {
            let mut slot = self.slot.lock();
            let waker = match &mut *slot {
                Slot::Pending(waker) => waker.take(),
                _ => return,
            };
            *slot = Slot::Ready(result);
            waker
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Producer half of a task result.
///
/// Dropping it unfulfilled (the task was discarded without running) resolves
/// the future with [`RenderError::TaskCancelled`].
struct Promise<T> {
    slot: Option<Arc<TaskSlot<T>>>,
}

impl<T> Promise<T> {
    fn set(mut self, result: RenderResult<T>) {
        if let Some(slot) = self.slot.take() {
            slot.fulfill(result);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.fulfill(Err(RenderError::TaskCancelled));
        }
    }
}

/// Result of a task spawned on the resource thread.
pub struct TaskFuture<T> {
    slot: Arc<TaskSlot<T>>,
}

impl<T> TaskFuture<T> {
    fn pair() -> (Promise<T>, Self) {
        let slot = Arc::new(TaskSlot {
            slot: Mutex::new(Slot::Pending(None)),
            ready: Condvar::new(),
        });
        (
            Promise {
                slot: Some(slot.clone()),
            },
            Self { slot },
        )
    }

    /// A future that is already resolved.
    pub fn ready(result: RenderResult<T>) -> Self {
        let (promise, future) = Self::pair();
        promise.set(result);
        future
    }

    /// Whether the result is available.
    pub fn is_ready(&self) -> bool {
        matches!(*self.slot.slot.lock(), Slot::Ready(_))
    }

    /// Block until the task finished and return its result.
    pub fn wait(self) -> RenderResult<T> {
        let mut slot = self.slot.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Ready(result) => return result,
                Slot::Taken => return Err(RenderError::TaskCancelled),
                pending @ Slot::Pending(_) => {
                    *slot = pending;
                    self.slot.ready.wait(&mut slot);
                }
            }
        }
    }

    /// Take the result without blocking, if it is available.
    ///
    /// Returns `None` while the task is pending and after the result has been
    /// taken once.
    pub fn try_get(&mut self) -> Option<RenderResult<T>> {
        let mut slot = self.slot.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => Some(result),
            other => {
                *slot = other;
                None
            }
        }
    }
}

impl<T> Future for TaskFuture<T> {
    type Output = RenderResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => Poll::Ready(result),
            Slot::Taken => Poll::Ready(Err(RenderError::TaskCancelled)),
            Slot::Pending(_) => {
                *slot = Slot::Pending(Some(cx.waker().clone()));
                Poll::Pending
            }
        }
    }
}

impl<T> std::fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `task`, converting a panic into [`RenderError::TaskFailed`].
pub(crate) fn run_task<F, T>(task: F) -> RenderResult<T>
where
    F: FnOnce() -> RenderResult<T>,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)).unwrap_or_else(|payload| {
        let message = panic_message(&*payload);
        log::debug!("resource task panicked: {}", message);
        Err(RenderError::TaskFailed(message))
    })
}

/// Executor owning the background resource thread.
pub struct RenderServer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl RenderServer {
    /// Name of the worker thread.
    pub const THREAD_NAME: &'static str = "sequoia-resource";

    /// Create a server without a thread. Tasks queue up until
    /// [`init_resource_thread`](Self::init_resource_thread) is called.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    state: ServerState::NotStarted,
                }),
                wake: Condvar::new(),
            }),
            thread: None,
        }
    }

    /// Start the worker thread.
    ///
    /// `init` runs first on the new thread, typically to make a shared
    /// graphics context current there.
    pub fn init_resource_thread<F>(&mut self, init: F) -> RenderResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut queue = self.shared.queue.lock();
            if queue.state != ServerState::NotStarted {
                return Err(RenderError::ThreadSpawnFailed(format!(
                    "resource thread cannot start in state {:?}",
                    queue.state
                )));
            }
            queue.state = ServerState::Running;
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(Self::THREAD_NAME.into())
            .spawn(move || {
                if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(init))
                {
                    log::error!(
                        "resource thread initialization panicked: {}",
                        panic_message(&*payload)
                    );
                }
                Self::run(&shared);
            });

        match spawned {
            Ok(handle) => {
                log::info!("resource thread started");
                self.thread = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.queue.lock().state = ServerState::NotStarted;
                Err(RenderError::ThreadSpawnFailed(err.to_string()))
            }
        }
    }

    fn run(shared: &Shared) {
        loop {
            let job = {
                let mut queue = shared.queue.lock();
                loop {
                    if let Some(job) = queue.tasks.pop_front() {
                        break Some(job);
                    }
                    if queue.state != ServerState::Running {
                        break None;
                    }
                    shared.wake.wait(&mut queue);
                }
            };
            match job {
                Some(job) => job(),
                None => break,
            }
        }
        log::debug!("resource thread exiting");
    }

    /// Queue `task` and return the future of its result.
    ///
    /// Never blocks on the task. A panic inside the task is delivered as
    /// [`RenderError::TaskFailed`]. Tasks submitted after shutdown resolve to
    /// [`RenderError::TaskCancelled`].
    pub fn spawn_resource_task<F, T>(&self, task: F) -> TaskFuture<T>
    where
        F: FnOnce() -> RenderResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (promise, future) = TaskFuture::pair();
        let job: Job = Box::new(move || promise.set(run_task(task)));

        {
            let mut queue = self.shared.queue.lock();
            match queue.state {
                ServerState::NotStarted | ServerState::Running => queue.tasks.push_back(job),
                ServerState::JoinRequested | ServerState::Joined => {
                    drop(queue);
                    log::warn!("resource task submitted after shutdown");
                    return future;
                }
            }
        }
        self.shared.wake.notify_one();
        future
    }

    pub fn state(&self) -> ServerState {
        self.shared.queue.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Number of tasks waiting to be picked up.
    pub fn pending_tasks(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Request a join, wait for the worker to drain the queue, and join it.
    ///
    /// Tasks of a server whose thread never started are discarded and their
    /// futures resolve to [`RenderError::TaskCancelled`]. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.state == ServerState::Joined {
                return;
            }
            queue.state = ServerState::JoinRequested;
        }
        self.shared.wake.notify_all();

        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("resource thread panicked");
            }
            log::info!("resource thread joined");
        }

        let discarded = {
            let mut queue = self.shared.queue.lock();
            queue.state = ServerState::Joined;
            std::mem::take(&mut queue.tasks)
        };
        if !discarded.is_empty() {
            log::debug!("discarding {} unexecuted resource tasks", discarded.len());
        }
    }
}

impl Default for RenderServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RenderServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderServer")
            .field("state", &self.state())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderServer: Send, Sync);
static_assertions::assert_impl_all!(TaskFuture<u32>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{RawWaker, RawWakerVTable};

    fn noop_waker() -> Waker {
        fn noop(_: *const ()) {}
        fn clone(p: *const ()) -> RawWaker {
            RawWaker::new(p, &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }

    fn started() -> RenderServer {
        let mut server = RenderServer::new();
        server.init_resource_thread(|| {}).unwrap();
        server
    }

    #[test]
    fn test_task_result() {
        let server = started();
        let future = server.spawn_resource_task(|| Ok(6 * 7));
        assert_eq!(future.wait(), Ok(42));
    }

    #[test]
    fn test_init_runs_on_worker_thread() {
        let mut server = RenderServer::new();
        let (tx, rx) = std::sync::mpsc::channel();
        server
            .init_resource_thread(move || {
                tx.send(thread::current().name().map(str::to_string)).unwrap();
            })
            .unwrap();
        assert_eq!(
            rx.recv().unwrap().as_deref(),
            Some(RenderServer::THREAD_NAME)
        );
    }

    #[test]
    fn test_fifo_order() {
        let server = started();
        let counter = Arc::new(AtomicUsize::new(0));
        let futures: Vec<_> = (0..64)
            .map(|_| {
                let counter = counter.clone();
                server.spawn_resource_task(move || Ok(counter.fetch_add(1, Ordering::SeqCst)))
            })
            .collect();

        for (expected, future) in futures.into_iter().enumerate() {
            assert_eq!(future.wait(), Ok(expected));
        }
    }

    #[test]
    fn test_panic_is_delivered_and_worker_survives() {
        let server = started();
        let failing = server.spawn_resource_task(|| -> RenderResult<()> { panic!("bad asset") });
        let next = server.spawn_resource_task(|| Ok("still running"));

        assert_eq!(
            failing.wait(),
            Err(RenderError::TaskFailed("bad asset".to_string()))
        );
        assert_eq!(next.wait(), Ok("still running"));
    }

    #[test]
    fn test_error_is_delivered() {
        let server = started();
        let future =
            server.spawn_resource_task(|| -> RenderResult<()> { Err(RenderError::ContextLost) });
        assert_eq!(future.wait(), Err(RenderError::ContextLost));
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let mut server = started();
        let executed = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let executed = executed.clone();
            let _ = server.spawn_resource_task(move || {
                thread::sleep(std::time::Duration::from_millis(1));
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        server.shutdown();
        assert_eq!(executed.load(Ordering::SeqCst), 16);
        assert_eq!(server.state(), ServerState::Joined);
    }

    #[test]
    fn test_tasks_without_thread_are_cancelled() {
        let mut server = RenderServer::new();
        let future = server.spawn_resource_task(|| Ok(1));
        assert_eq!(server.pending_tasks(), 1);
        server.shutdown();
        assert_eq!(future.wait(), Err(RenderError::TaskCancelled));
    }

    #[test]
    fn test_spawn_after_shutdown() {
        let mut server = started();
        server.shutdown();
        let future = server.spawn_resource_task(|| Ok(1));
        assert_eq!(future.wait(), Err(RenderError::TaskCancelled));
    }

    #[test]
    fn test_double_init_fails() {
        let mut server = started();
        assert!(matches!(
            server.init_resource_thread(|| {}),
            Err(RenderError::ThreadSpawnFailed(_))
        ));
    }

    #[test]
    fn test_try_get_and_poll() {
        let mut server = RenderServer::new();
        let mut future = server.spawn_resource_task(|| Ok(5u32));
        assert!(!future.is_ready());
        assert!(future.try_get().is_none());

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut future).poll(&mut cx).is_pending());

        server.init_resource_thread(|| {}).unwrap();
        server.shutdown();
        assert!(future.is_ready());
        assert_eq!(future.try_get(), Some(Ok(5)));
        assert!(future.try_get().is_none());
    }

    #[test]
    fn test_ready_future() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut future = TaskFuture::ready(Ok("done"));
        assert_eq!(Pin::new(&mut future).poll(&mut cx), Poll::Ready(Ok("done")));
    }
}
