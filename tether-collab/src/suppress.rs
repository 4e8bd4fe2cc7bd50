//! Echo suppression for inbound applies.
//!
//! While a remote-originated change is being applied to the local buffer
//! or overlays, the editor emits the same change events a user edit
//! would. Every outbound listener consults the binding's
//! `SuppressionContext` and returns early while an apply is in flight,
//! which is what keeps a remote edit from being re-sent as a local one.
//!
//! The context is a re-entrant depth counter, not a boolean: nested
//! inbound applies stack, and the count only reaches zero when the
//! outermost guard releases. Release is tied to [`SuppressionGuard`]'s
//! `Drop`, so it happens on every exit path — early returns, `?`, and
//! unwinding included. A flag stuck high would permanently sever the
//! outbound path, so no code path may touch the counter except through a
//! guard.
//!
//! One context is shared by the text and reference engines of a single
//! binding; separate bindings get separate contexts.

use std::cell::Cell;
use std::rc::Rc;

/// Shared suppression state of one document binding. Cheap to clone;
/// clones observe the same depth.
#[derive(Debug, Clone, Default)]
pub struct SuppressionContext {
    depth: Rc<Cell<u32>>,
}

impl SuppressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while any inbound apply is in flight.
    pub fn is_suppressed(&self) -> bool {
        self.depth.get() > 0
    }

    /// Current nesting depth, mostly useful in assertions.
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Mark an inbound apply as in flight until the guard drops.
    #[must_use = "suppression ends when the guard is dropped"]
    pub fn enter(&self) -> SuppressionGuard {
        self.depth.set(self.depth.get() + 1);
        SuppressionGuard { depth: Rc::clone(&self.depth) }
    }
}

/// RAII scope of one inbound apply.
#[derive(Debug)]
pub struct SuppressionGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        let depth = self.depth.get();
        debug_assert!(depth > 0, "suppression depth underflow");
        self.depth.set(depth.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_initially_unsuppressed() {
        let ctx = SuppressionContext::new();
        assert!(!ctx.is_suppressed());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_guard_scopes_suppression() {
        let ctx = SuppressionContext::new();
        {
            let _guard = ctx.enter();
            assert!(ctx.is_suppressed());
        }
        assert!(!ctx.is_suppressed());
    }

    #[test]
    fn test_nested_guards_count() {
        let ctx = SuppressionContext::new();
        let outer = ctx.enter();
        {
            let _inner = ctx.enter();
            assert_eq!(ctx.depth(), 2);
        }
        assert!(ctx.is_suppressed());
        drop(outer);
        assert!(!ctx.is_suppressed());
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = SuppressionContext::new();
        let clone = ctx.clone();
        let _guard = ctx.enter();
        assert!(clone.is_suppressed());
    }

    #[test]
    fn test_released_on_early_return() {
        fn apply(ctx: &SuppressionContext, fail: bool) -> Result<(), ()> {
            let _guard = ctx.enter();
            if fail {
                return Err(());
            }
            Ok(())
        }

        let ctx = SuppressionContext::new();
        assert!(apply(&ctx, true).is_err());
        assert!(!ctx.is_suppressed());
        assert!(apply(&ctx, false).is_ok());
        assert!(!ctx.is_suppressed());
    }

    #[test]
    fn test_released_on_unwind() {
        let ctx = SuppressionContext::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = ctx.enter();
            panic!("mutation failed mid-apply");
        }));
        assert!(result.is_err());
        assert!(!ctx.is_suppressed());
    }
}
