//! Navigation boundary with scoped unsaved-work intercepts.
//!
//! Whoever is about to discard the session (quit, end of input, replacing the
//! process) asks [`NavigationBoundary::is_guarded`] first and requires an
//! explicit confirmation while any [`Intercept`] is alive. Intercepts are
//! removed when dropped, so an owner that goes away can never leave a stale
//! guard behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct NavigationBoundary {
    active: Arc<AtomicUsize>,
}

impl NavigationBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self) -> Intercept {
        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Unsaved-work intercept installed");
        Intercept {
            active: Arc::clone(&self.active),
        }
    }

    pub fn is_guarded(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }
}

/// Live registration on a [`NavigationBoundary`].
#[derive(Debug)]
pub struct Intercept {
    active: Arc<AtomicUsize>,
}

impl Drop for Intercept {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("Unsaved-work intercept removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intercept_lifetime() {
        let boundary = NavigationBoundary::new();
        assert!(!boundary.is_guarded());

        let first = boundary.install();
        let second = boundary.clone().install();
        assert!(boundary.is_guarded());

        drop(first);
        assert!(boundary.is_guarded());
        drop(second);
        assert!(!boundary.is_guarded());
    }
}
