//! Scoped extra-field propagation for log records.
//!
//! Every execution scope (a thread, or a future wrapped with
//! [`LogExtraExt::with_log_extra`]) carries its own mapping of structured
//! fields. Children spawned from a scope inherit a snapshot taken at spawn
//! time; their later updates never flow back to the parent or to siblings.

use crate::record::ExtraFields;
use std::cell::RefCell;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

thread_local! {
    static LOG_EXTRA: RefCell<ExtraFields> = RefCell::new(ExtraFields::new());
}

/// Replace the current scope's extra fields.
pub fn set_log_extra(extra: ExtraFields) {
    LOG_EXTRA.with(|cell| *cell.borrow_mut() = extra);
}

/// Snapshot the current scope's extra fields.
///
/// An unset scope reads as an empty mapping; background code may log before
/// any fields were ever installed. The returned map is an independent deep
/// copy, safe to mutate.
pub fn get_log_extra() -> ExtraFields {
    LOG_EXTRA.with(|cell| cell.borrow().clone())
}

/// Merge `updates` into the current scope's extra fields.
///
/// The merge is copy-then-replace: the current mapping is cloned, updated
/// with a flat key union (values from `updates` win) and installed as the
/// new scope mapping. A child scope that inherited the previous mapping is
/// unaffected, which is what keeps concurrent tasks from corrupting each
/// other's fields.
pub fn update_log_extra(updates: ExtraFields) {
    LOG_EXTRA.with(|cell| {
        let mut merged = cell.borrow().clone();
        for (key, value) in updates {
            merged.insert(key, value);
        }
        *cell.borrow_mut() = merged;
    });
}

/// Future combinator carrying its own extra-fields scope.
///
/// The scope travels with the future: it is installed into the polling
/// thread's slot for the duration of every `poll` and stashed back
/// afterwards, so the mapping survives executor thread migration and never
/// leaks into unrelated tasks sharing the same worker thread.
pub struct WithLogExtra<F> {
    inner: Pin<Box<F>>,
    extra: ExtraFields,
}

impl<F: Future> Future for WithLogExtra<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let scope = mem::take(&mut this.extra);
        let parent = LOG_EXTRA.with(|cell| mem::replace(&mut *cell.borrow_mut(), scope));
        let result = this.inner.as_mut().poll(cx);
        this.extra = LOG_EXTRA.with(|cell| mem::replace(&mut *cell.borrow_mut(), parent));
        result
    }
}

/// Extension methods attaching an extra-fields scope to a future.
pub trait LogExtraExt: Future + Sized {
    /// Wrap the future with a snapshot of the caller's current extra fields.
    ///
    /// Call this at spawn time: the snapshot is the child's inherited scope.
    fn with_log_extra(self) -> WithLogExtra<Self> {
        self.with_extra(get_log_extra())
    }

    /// Wrap the future with an explicit extra-fields scope.
    fn with_extra(self, extra: ExtraFields) -> WithLogExtra<Self> {
        WithLogExtra {
            inner: Box::pin(self),
            extra,
        }
    }
}

impl<F: Future> LogExtraExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> ExtraFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn unset_scope_reads_as_empty() {
        std::thread::spawn(|| assert!(get_log_extra().is_empty()))
            .join()
            .unwrap();
    }

    #[test]
    fn update_from_fresh_scope_returns_exactly_the_patch() {
        std::thread::spawn(|| {
            let patch = fields(&[("request_id", json!("abc")), ("user", json!(7))]);
            update_log_extra(patch.clone());
            assert_eq!(get_log_extra(), patch);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn update_is_a_union_with_patch_winning() {
        std::thread::spawn(|| {
            set_log_extra(fields(&[("a", json!(1)), ("b", json!(2))]));
            update_log_extra(fields(&[("b", json!(20)), ("c", json!(3))]));
            assert_eq!(
                get_log_extra(),
                fields(&[("a", json!(1)), ("b", json!(20)), ("c", json!(3))])
            );
        })
        .join()
        .unwrap();
    }

    #[test]
    fn snapshot_is_independent_of_later_writes() {
        std::thread::spawn(|| {
            set_log_extra(fields(&[("a", json!(1))]));
            let snapshot = get_log_extra();
            update_log_extra(fields(&[("a", json!(2))]));
            assert_eq!(snapshot, fields(&[("a", json!(1))]));
        })
        .join()
        .unwrap();
    }
}
