//! Lazy, thread-safe validation of backend objects.
//!
//! Every GPU-backed object (shader, program, texture, vertex data, frame
//! buffer) is created cheaply and becomes usable on the first call to
//! [`RenderResource::make_valid`]. The backend work runs exactly once, under
//! the resource's own lock. A failure is cached and replayed to every later
//! caller; it is never retried.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{RenderError, RenderResult};
use crate::RenderSystemKind;

#[derive(Debug, Clone)]
enum Validity {
    Unresolved,
    Valid,
    Failed(RenderError),
}

/// Validity state of a render resource.
///
/// Starts unresolved and moves to valid or failed exactly once. The valid
/// flag is mirrored in an atomic so [`is_valid`](Self::is_valid) never locks.
#[derive(Debug)]
pub struct ResourceValidity {
    valid: AtomicBool,
    state: Mutex<Validity>,
}

impl ResourceValidity {
    pub fn new() -> Self {
        Self {
            valid: AtomicBool::new(false),
            state: Mutex::new(Validity::Unresolved),
        }
    }

    /// Lock-free check of the valid flag.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Run `init` if no attempt has been made yet.
    ///
    /// Concurrent callers block on the lock until the first attempt finished
    /// and then return without running `init` again.
    pub fn resolve_with<F>(&self, init: F)
    where
        F: FnOnce() -> RenderResult<()>,
    {
        if self.is_valid() {
            return;
        }

        let mut state = self.state.lock();
        if !matches!(*state, Validity::Unresolved) {
            return;
        }

        match init() {
            Ok(()) => {
                *state = Validity::Valid;
                self.valid.store(true, Ordering::Release);
            }
            Err(err) => {
                log::warn!("render resource failed to become valid: {err}");
                *state = Validity::Failed(err);
            }
        }
    }

    /// Whether an initialization attempt failed.
    pub fn has_error(&self) -> bool {
        matches!(*self.state.lock(), Validity::Failed(_))
    }

    /// The cached failure, if any.
    pub fn error(&self) -> Option<RenderError> {
        match &*self.state.lock() {
            Validity::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Replay the cached failure, if any.
    pub fn rethrow_error(&self) -> RenderResult<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for ResourceValidity {
    fn default() -> Self {
        Self::new()
    }
}

/// A backend object with deferred one-time initialization.
///
/// Implementors provide the backend work in
/// [`make_valid_impl`](Self::make_valid_impl) and store whatever handle it
/// produces with interior mutability; the provided methods take care of the
/// once-only and sticky-failure semantics.
pub trait RenderResource: Send + Sync {
    /// Backend owning this resource.
    fn kind(&self) -> RenderSystemKind;

    /// Validity state of this resource.
    fn validity(&self) -> &ResourceValidity;

    /// Backend specific initialization, called at most once.
    fn make_valid_impl(&self) -> RenderResult<()>;

    /// Initialize the resource if that has not been attempted yet.
    ///
    /// Failures are cached, not returned; see
    /// [`rethrow_error`](Self::rethrow_error).
    fn make_valid(&self) {
        self.validity().resolve_with(|| self.make_valid_impl());
    }

    fn is_valid(&self) -> bool {
        self.validity().is_valid()
    }

    fn has_error(&self) -> bool {
        self.validity().has_error()
    }

    fn rethrow_error(&self) -> RenderResult<()> {
        self.validity().rethrow_error()
    }

    /// [`make_valid`](Self::make_valid) followed by
    /// [`rethrow_error`](Self::rethrow_error).
    fn ensure_valid(&self) -> RenderResult<()> {
        self.make_valid();
        self.rethrow_error()
    }
}

static_assertions::assert_impl_all!(ResourceValidity: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    struct CountingResource {
        validity: ResourceValidity,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingResource {
        fn new(fail: bool) -> Self {
            Self {
                validity: ResourceValidity::new(),
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl RenderResource for CountingResource {
        fn kind(&self) -> RenderSystemKind {
            RenderSystemKind::Null
        }

        fn validity(&self) -> &ResourceValidity {
            &self.validity
        }

        fn make_valid_impl(&self) -> RenderResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            if self.fail {
                Err(RenderError::ProgramLinkFailed("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_starts_invalid() {
        let resource = CountingResource::new(false);
        assert!(!resource.is_valid());
        assert!(!resource.has_error());
        assert!(resource.rethrow_error().is_ok());
    }

    #[test]
    fn test_make_valid_runs_once() {
        let resource = CountingResource::new(false);
        resource.make_valid();
        resource.make_valid();
        assert!(resource.is_valid());
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_make_valid_runs_once() {
        let resource = Arc::new(CountingResource::new(false));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resource = Arc::clone(&resource);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    resource.make_valid();
                    resource.is_valid()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_sticky() {
        let resource = Arc::new(CountingResource::new(true));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resource = Arc::clone(&resource);
                std::thread::spawn(move || {
                    resource.make_valid();
                    resource.rethrow_error()
                })
            })
            .collect();

        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert_eq!(err, RenderError::ProgramLinkFailed("boom".into()));
        }

        resource.make_valid();
        assert!(!resource.is_valid());
        assert!(resource.has_error());
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
        assert!(resource.ensure_valid().is_err());
    }
}
