//! Affinity dispatcher: every read and write of affinity-owned state runs on
//! the one thread that created the dispatcher.
//!
//! Calls made on the affinity thread execute inline. Calls made anywhere else
//! are queued, the affinity thread is woken, and the caller blocks until the
//! call has run, so a returned write is already visible to every later read.

use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, OnceLock, PoisonError, TryLockError,
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{trace, warn};

use crate::error::DispatchError;

const AFFINITY_PUMP_INTERVAL: Duration = Duration::from_millis(20);

type Job<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;
type Waker = Box<dyn Fn() + Send + Sync + 'static>;

/// Typed accessor for one piece of affinity-owned state.
pub struct Property<T, V> {
    name: &'static str,
    get: fn(&T) -> V,
    set: Option<fn(&mut T, V)>,
}

impl<T, V> Property<T, V> {
    pub const fn new(name: &'static str, get: fn(&T) -> V, set: fn(&mut T, V)) -> Self {
        Self {
            name,
            get,
            set: Some(set),
        }
    }

    pub const fn read_only(name: &'static str, get: fn(&T) -> V) -> Self {
        Self {
            name,
            get,
            set: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

impl<T, V> Clone for Property<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Property<T, V> {}

pub struct Dispatcher<T: Send + 'static> {
    inner: Arc<DispatcherInner<T>>,
}

impl<T: Send + 'static> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct DispatcherInner<T> {
    affinity: ThreadId,
    state: Mutex<T>,
    jobs_tx: Sender<Job<T>>,
    jobs_rx: Mutex<Option<Receiver<Job<T>>>>,
    closed: AtomicBool,
    waker: OnceLock<Waker>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Creates a dispatcher whose affinity thread is the calling thread.
    pub fn new(state: T) -> Self {
        let (jobs_tx, jobs_rx) = unbounded();
        Self {
            inner: Arc::new(DispatcherInner {
                affinity: thread::current().id(),
                state: Mutex::new(state),
                jobs_tx,
                jobs_rx: Mutex::new(Some(jobs_rx)),
                closed: AtomicBool::new(false),
                waker: OnceLock::new(),
            }),
        }
    }

    /// Starts a dedicated affinity thread that builds the state with `init`
    /// and pumps queued calls until the returned handle is shut down.
    pub fn spawn<F>(name: &str, init: F) -> io::Result<AffinityThread<T>>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let dispatcher = Dispatcher::new(init());
                if ready_tx.send(dispatcher.clone()).is_err() {
                    return;
                }
                while !thread_stop.load(Ordering::Acquire) {
                    if let Err(err) = dispatcher.pump_timeout(AFFINITY_PUMP_INTERVAL) {
                        warn!("affinity pump stopped: {err}");
                        break;
                    }
                }
                if let Err(err) = dispatcher.shutdown() {
                    warn!("affinity shutdown failed: {err}");
                }
            })?;

        let dispatcher = ready_rx
            .recv()
            .map_err(|_| io::Error::other("affinity thread exited during startup"))?;

        Ok(AffinityThread {
            dispatcher,
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_affinity_thread(&self) -> bool {
        thread::current().id() == self.inner.affinity
    }

    /// Installs the callback used to wake the affinity thread after work is
    /// queued. Only the first waker is kept.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) -> bool {
        self.inner.waker.set(Box::new(waker)).is_ok()
    }

    pub fn set_property<V>(&self, property: Property<T, V>, value: V) -> Result<(), DispatchError>
    where
        V: Send + 'static,
    {
        let Some(set) = property.set else {
            return Err(DispatchError::ReadOnlyProperty(property.name));
        };
        trace!(property = property.name, "set_property");
        self.invoke_func(move |state| set(state, value))
    }

    pub fn get_property<V>(&self, property: Property<T, V>) -> Result<V, DispatchError>
    where
        V: Send + 'static,
    {
        let get = property.get;
        self.invoke_func(move |state| get(state))
    }

    pub fn invoke_action<F>(&self, action: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.invoke_func(action)
    }

    pub fn invoke_func<F, R>(&self, func: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_affinity_thread() {
            self.run_inline(func)
        } else {
            self.marshal(func)
        }
    }

    /// Queues `action` without waiting for it. Runs on the next pump, even
    /// when called from the affinity thread itself.
    pub fn post<F>(&self, action: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let job: Job<T> = Box::new(move |state: &mut T| {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| action(state))) {
                warn!("posted call panicked: {}", panic_message(payload));
            }
        });
        self.enqueue(job)
    }

    /// Borrows the state directly. Affinity thread only; intended for
    /// rendering, which needs non-`'static` borrows.
    pub fn with_local<R>(&self, func: impl FnOnce(&mut T) -> R) -> Result<R, DispatchError> {
        if !self.is_affinity_thread() {
            return Err(DispatchError::WrongThread);
        }
        let mut guard = self.lock_state()?;
        Ok(func(&mut *guard))
    }

    /// Runs every queued call without blocking. Returns how many ran.
    pub fn pump(&self) -> Result<usize, DispatchError> {
        self.pump_inner(None)
    }

    /// Waits up to `timeout` for the first queued call, then drains the queue.
    pub fn pump_timeout(&self, timeout: Duration) -> Result<usize, DispatchError> {
        self.pump_inner(Some(timeout))
    }

    /// Stops accepting work. Queued calls are dropped and their callers, like
    /// every later off-thread caller, receive [`DispatchError::Disconnected`].
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        if !self.is_affinity_thread() {
            return Err(DispatchError::WrongThread);
        }
        self.inner.closed.store(true, Ordering::Release);
        let receiver = self
            .inner
            .jobs_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(receiver);
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn pump_inner(&self, timeout: Option<Duration>) -> Result<usize, DispatchError> {
        if !self.is_affinity_thread() {
            return Err(DispatchError::WrongThread);
        }
        let Some(receiver) = self
            .inner
            .jobs_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return Ok(0);
        };

        let first = match timeout {
            Some(timeout) => match receiver.recv_timeout(timeout) {
                Ok(job) => Some(job),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(DispatchError::Disconnected),
            },
            None => None,
        };

        let mut guard = self.lock_state()?;
        let mut handled = 0;
        for job in first.into_iter().chain(receiver.try_iter()) {
            job(&mut *guard);
            handled += 1;
        }
        Ok(handled)
    }

    fn run_inline<F, R>(&self, func: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_state()?;
        panic::catch_unwind(AssertUnwindSafe(|| func(&mut *guard)))
            .map_err(|payload| DispatchError::Panicked(panic_message(payload)))
    }

    fn marshal<F, R>(&self, func: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded::<Result<R, DispatchError>>(1);
        let job: Job<T> = Box::new(move |state: &mut T| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| func(state)))
                .map_err(|payload| DispatchError::Panicked(panic_message(payload)));
            let _ = reply_tx.send(outcome);
        });
        self.enqueue(job)?;
        reply_rx.recv().map_err(|_| DispatchError::Disconnected)?
    }

    fn enqueue(&self, job: Job<T>) -> Result<(), DispatchError> {
        if self.is_shut_down() {
            return Err(DispatchError::Disconnected);
        }
        self.inner
            .jobs_tx
            .send(job)
            .map_err(|_| DispatchError::Disconnected)?;
        if let Some(waker) = self.inner.waker.get() {
            waker();
        }
        Ok(())
    }

    // Only the affinity thread ever locks the state, so contention here means
    // a dispatched call is already running further up this thread's stack.
    fn lock_state(&self) -> Result<MutexGuard<'_, T>, DispatchError> {
        match self.inner.state.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(DispatchError::Reentrant),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }
}

/// Handle to a dedicated affinity thread started by [`Dispatcher::spawn`].
pub struct AffinityThread<T: Send + 'static> {
    dispatcher: Dispatcher<T>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> AffinityThread<T> {
    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Stops pumping and joins the thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("affinity thread panicked");
            }
        }
    }
}

impl<T: Send + 'static> Drop for AffinityThread<T> {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
