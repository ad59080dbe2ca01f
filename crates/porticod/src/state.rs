//! Process-wide flags shared by the request pipeline and the lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether plain-listener traffic is redirected to the secure listener.
///
/// The flag is cleared while a certificate is being acquired so the issuing
/// authority's challenge can reach the plain listener.
#[derive(Debug, Default)]
pub struct RedirectFlag {
    enabled: AtomicBool,
}

impl RedirectFlag {
    /// Creates a flag with redirects disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when plain traffic should be redirected.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Sets the flag.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Clears the flag until the returned guard drops, then restores it.
    #[must_use = "redirects resume as soon as the guard is dropped"]
    pub fn suspend(&self) -> RedirectSuspension<'_> {
        let previous = self.enabled.swap(false, Ordering::SeqCst);
        RedirectSuspension {
            flag: self,
            previous,
        }
    }
}

/// Scope guard returned by [`RedirectFlag::suspend`].
#[derive(Debug)]
pub struct RedirectSuspension<'a> {
    flag: &'a RedirectFlag,
    previous: bool,
}

impl Drop for RedirectSuspension<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Monotonic shutdown marker flipped once by a termination signal.
#[derive(Debug, Default)]
pub struct ShutdownState {
    shutting_down: AtomicBool,
}

impl ShutdownState {
    /// Creates a state that is not shutting down.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the state; returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        !self.shutting_down.swap(true, Ordering::SeqCst)
    }

    /// Returns `true` once shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
