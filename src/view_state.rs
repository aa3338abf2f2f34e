//! View State (spec.md §2.5, §3, §4.6): the `(currentView, expectedView)`
//! pair, monotone non-decreasing, `currentView <= expectedView` always.
//! Grounded on the Go source's `viewstate.State`/`HoldView`/
//! `AdvanceExpectedView`.

use std::sync::{RwLock, RwLockReadGuard};

use crate::message::View;

#[derive(Debug, Clone, Copy)]
struct ViewPair {
    current: View,
    expected: View,
}

pub struct ViewState {
    pair: RwLock<ViewPair>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            pair: RwLock::new(ViewPair {
                current: 0,
                expected: 0,
            }),
        }
    }

    /// Acquires a shared, non-exclusive lease preventing concurrent view
    /// transitions while held (spec.md §4.6).
    pub fn hold_view(&self) -> ViewHold<'_> {
        let guard = self.pair.read().unwrap();
        ViewHold { guard }
    }

    /// Succeeds iff `v > expectedView`; advances it atomically (spec.md
    /// §4.7). Returns `false` otherwise, leaving state untouched.
    pub fn advance_expected_view(&self, v: View) -> bool {
        let mut guard = self.pair.write().unwrap();
        if v > guard.expected {
            guard.expected = v;
            true
        } else {
            false
        }
    }

    /// Installs `v` as the current (and expected) view, the operation a
    /// full `NewView` application would perform (spec.md §9 open
    /// question; not driven by any pipeline code path in this stubbed
    /// design, kept for completeness and tests).
    pub fn advance_current_view(&self, v: View) -> bool {
        let mut guard = self.pair.write().unwrap();
        if v > guard.current && v <= guard.expected {
            guard.current = v;
            true
        } else {
            false
        }
    }
}

/// RAII lease over a consistent `(currentView, expectedView)` snapshot
/// (spec.md §4.6, §9 RAII redesign flag).
pub struct ViewHold<'a> {
    guard: RwLockReadGuard<'a, ViewPair>,
}

impl ViewHold<'_> {
    pub fn current_view(&self) -> View {
        self.guard.current
    }

    pub fn expected_view(&self) -> View {
        self.guard.expected
    }

    /// `currentView == expectedView` — no view change in flight.
    pub fn active(&self) -> bool {
        self.guard.current == self.guard.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_active_at_view_zero() {
        let state = ViewState::new();
        let hold = state.hold_view();
        assert_eq!(hold.current_view(), 0);
        assert_eq!(hold.expected_view(), 0);
        assert!(hold.active());
    }

    #[test]
    fn advance_expected_view_requires_strictly_greater() {
        let state = ViewState::new();
        assert!(state.advance_expected_view(1));
        assert!(!state.advance_expected_view(1));
        assert!(!state.advance_expected_view(0));
        let hold = state.hold_view();
        assert_eq!(hold.expected_view(), 1);
        assert!(!hold.active());
    }

    #[test]
    fn current_view_never_exceeds_expected() {
        let state = ViewState::new();
        assert!(!state.advance_current_view(1));
        state.advance_expected_view(1);
        assert!(state.advance_current_view(1));
        let hold = state.hold_view();
        assert!(hold.active());
    }
}
