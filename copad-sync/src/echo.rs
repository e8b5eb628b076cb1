//! Re-entrancy guard separating remote content application from local edits.
//!
//! Applying a remote document replacement drives the editing surface's
//! "set text" path, and most surfaces report that mutation back through
//! the same change callback as a keystroke. Without a guard the client
//! would re-broadcast every remote update it applies:
//!
//! ```text
//! content_update ──► set_text ──► change callback ──► content_change ──► ...
//!                        ▲                                   │
//!                        └───────────── echo loop ───────────┘
//! ```
//!
//! [`EchoGuard`] breaks the loop: the flag is raised strictly for the
//! synchronous duration of [`EchoGuard::with_remote_application`], and the
//! outbound edit path drops emissions while it is up. Release is tied to
//! a drop guard, so a panicking application closure cannot leave the flag
//! stuck.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag marking "a remote content update is being applied".
///
/// Handlers run on one logical thread (see the crate docs), but the flag
/// is atomic so the guard can be shared across the controller and any
/// surface implementation without threading restrictions.
#[derive(Debug, Default)]
pub struct EchoGuard {
    applying_remote: AtomicBool,
}

/// Lowers the flag when dropped, unwinding included.
struct Lower<'a>(&'a AtomicBool);

impl Drop for Lower<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EchoGuard {
    pub fn new() -> Self {
        Self {
            applying_remote: AtomicBool::new(false),
        }
    }

    /// Whether a remote update is currently being applied.
    pub fn is_applying_remote(&self) -> bool {
        self.applying_remote.load(Ordering::SeqCst)
    }

    /// Run `f` with the flag raised.
    ///
    /// `f` is expected to call the editing surface's set-text capability.
    /// The flag is lowered when `f` returns or unwinds.
    pub fn with_remote_application<R>(&self, f: impl FnOnce() -> R) -> R {
        self.applying_remote.store(true, Ordering::SeqCst);
        let _lower = Lower(&self.applying_remote);
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;

    #[test]
    fn test_flag_down_initially() {
        let guard = EchoGuard::new();
        assert!(!guard.is_applying_remote());
    }

    #[test]
    fn test_flag_up_only_during_application() {
        let guard = EchoGuard::new();

        guard.with_remote_application(|| {
            assert!(guard.is_applying_remote());
        });

        assert!(!guard.is_applying_remote());
    }

    #[test]
    fn test_flag_released_on_panic() {
        let guard = EchoGuard::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            guard.with_remote_application(|| panic!("surface rejected the text"));
        }));

        assert!(result.is_err());
        assert!(!guard.is_applying_remote());
    }

    #[test]
    fn test_shared_handle_observes_application() {
        let guard = Arc::new(EchoGuard::new());
        let observer = guard.clone();

        guard.with_remote_application(|| {
            assert!(observer.is_applying_remote());
        });
        assert!(!observer.is_applying_remote());
    }

    #[test]
    fn test_returns_closure_value() {
        let guard = EchoGuard::new();
        let n = guard.with_remote_application(|| 41 + 1);
        assert_eq!(n, 42);
    }
}
