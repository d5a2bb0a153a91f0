//! Deterministic fault injection for the in-memory store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use fireeats_core::DocumentRef;
use parking_lot::Mutex;

/// Faults armed by tests and consumed by the commit path.
#[derive(Debug, Default)]
pub struct FaultInjector {
    forced_conflicts: AtomicU32,
    failing_writes: Mutex<HashSet<DocumentRef>>,
}

impl FaultInjector {
    /// The next `count` commits report a conflict instead of applying.
    pub fn inject_conflicts(&self, count: u32) {
        self.forced_conflicts.fetch_add(count, Ordering::SeqCst);
    }

    /// Any commit writing `reference` fails without applying anything.
    pub fn fail_writes_to(&self, reference: &DocumentRef) {
        self.failing_writes.lock().insert(reference.clone());
    }

    /// Disarms every write failure.
    pub fn clear_write_failures(&self) {
        self.failing_writes.lock().clear();
    }

    /// Consumes one forced conflict, if any are armed.
    pub(crate) fn take_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// The first written reference armed to fail.
    pub(crate) fn failing_write<'a>(
        &self,
        mut written: impl Iterator<Item = &'a DocumentRef>,
    ) -> Option<DocumentRef> {
        let failing = self.failing_writes.lock();
        written.find(|r| failing.contains(*r)).cloned()
    }

    /// Forced conflicts still armed.
    #[must_use]
    pub fn pending_conflicts(&self) -> u32 {
        self.forced_conflicts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use fireeats_core::CollectionPath;

    use super::*;

    #[test]
    fn conflicts_are_consumed_one_at_a_time() {
        let faults = FaultInjector::default();
        faults.inject_conflicts(2);
        assert!(faults.take_conflict());
        assert!(faults.take_conflict());
        assert!(!faults.take_conflict());
        assert_eq!(faults.pending_conflicts(), 0);
    }

    #[test]
    fn failing_write_matches_armed_references_only() {
        let faults = FaultInjector::default();
        let a = CollectionPath::root("restaurants").doc("a");
        let b = CollectionPath::root("restaurants").doc("b");
        faults.fail_writes_to(&a);

        assert_eq!(faults.failing_write([&b, &a].into_iter()), Some(a.clone()));
        assert_eq!(faults.failing_write([&b].into_iter()), None);

        faults.clear_write_failures();
        assert_eq!(faults.failing_write([&a].into_iter()), None);
    }
}
