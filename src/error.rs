//! Error types and the process-level fatal error path.
//!
//! Recoverable failures travel as [`RenderError`] values. Resource failures are
//! cached by [`ResourceValidity`](crate::resource::ResourceValidity) and replayed,
//! which is why the error is `Clone`.
//!
//! Unrecoverable conditions go through [`fatal`], which hands the message to a
//! pluggable handler before terminating the process.

use parking_lot::{const_rwlock, RwLock};
use thiserror::Error;

use crate::render::uniform::UniformType;
use crate::RenderSystemKind;

/// Render error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("failed to compile shader \"{file}\": {log}")]
    ShaderCompilationFailed { file: String, log: String },
    #[error("failed to link program: {0}")]
    ProgramLinkFailed(String),
    #[error("failed to create {what}: {reason}")]
    ResourceCreationFailed { what: &'static str, reason: String },
    #[error("invalid type '{requested}' of uniform variable, expected '{stored}'")]
    TypeMismatch {
        requested: UniformType,
        stored: UniformType,
    },
    #[error("render system '{0}' is not supported: {1}")]
    Unsupported(RenderSystemKind, String),
    #[error("no render target set")]
    NoRenderTarget,
    #[error("no viewport set on render target")]
    NoViewport,
    #[error("resource task failed: {0}")]
    TaskFailed(String),
    #[error("resource task was dropped before it ran")]
    TaskCancelled,
    #[error("failed to spawn resource thread: {0}")]
    ThreadSpawnFailed(String),
    #[error("failed to read file \"{path}\": {reason}")]
    Io { path: String, reason: String },
    #[error("backend call failed: {0}")]
    Backend(String),
    #[error("render context lost")]
    ContextLost,
}

pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    /// Returns true for errors after which the render system cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::ContextLost)
    }
}

type FatalHandler = Box<dyn Fn(&str, bool) + Send + Sync>;

static FATAL_HANDLER: RwLock<Option<FatalHandler>> = const_rwlock(None);

/// Install a handler invoked by [`fatal`] instead of the default one.
///
/// The handler receives the message and whether the process should crash
/// (abort) rather than exit. It may diverge itself, e.g. by panicking; if it
/// returns, the process is terminated anyway.
pub fn set_fatal_handler<F>(handler: F)
where
    F: Fn(&str, bool) + Send + Sync + 'static,
{
    *FATAL_HANDLER.write() = Some(Box::new(handler));
}

/// Restore the default print-and-exit behavior.
pub fn reset_fatal_handler() {
    *FATAL_HANDLER.write() = None;
}

/// Report an unrecoverable error and terminate.
pub fn fatal(message: &str, crash: bool) -> ! {
    log::error!("{message}");
    {
        let handler = FATAL_HANDLER.read();
        if let Some(handler) = handler.as_ref() {
            handler(message, crash);
        } else {
            eprintln!("error: {message}");
        }
    }
    if crash {
        std::process::abort()
    } else {
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex};

    #[test]
    fn test_error_display() {
        let err = RenderError::ProgramLinkFailed("missing main".to_string());
        assert_eq!(err.to_string(), "failed to link program: missing main");

        let err = RenderError::TypeMismatch {
            requested: UniformType::Int,
            stored: UniformType::Float,
        };
        assert_eq!(
            err.to_string(),
            "invalid type 'Int' of uniform variable, expected 'Float'"
        );

        let err = RenderError::Unsupported(RenderSystemKind::D3D12, "stub".into());
        assert_eq!(err.to_string(), "render system 'D3D12' is not supported: stub");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(RenderError::ContextLost.is_fatal());
        assert!(!RenderError::NoViewport.is_fatal());
        assert!(!RenderError::TaskCancelled.is_fatal());
    }

    /// Serializes tests that install a process-wide handler.
    static HANDLER_LOCK: Mutex<()> = const_mutex(());

    /// Restores the default handler when dropped, also while unwinding.
    struct HandlerGuard;

    impl Drop for HandlerGuard {
        fn drop(&mut self) {
            reset_fatal_handler();
        }
    }

    #[test]
    #[should_panic(expected = "fatal: device gone")]
    fn test_fatal_uses_installed_handler() {
        let _serial = HANDLER_LOCK.lock();
        let _guard = HandlerGuard;
        set_fatal_handler(|message, _crash| panic!("fatal: {message}"));
        fatal("device gone", false);
    }

    #[test]
    fn test_handler_guard_restores_default() {
        let _serial = HANDLER_LOCK.lock();
        let result = std::panic::catch_unwind(|| {
            let _guard = HandlerGuard;
            set_fatal_handler(|message, _crash| panic!("fatal: {message}"));
            fatal("context lost", true);
        });
        assert!(result.is_err());
        assert!(FATAL_HANDLER.read().is_none());
    }
}
