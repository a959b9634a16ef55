use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single-slot guard against duplicate submissions.
///
/// At most one [`BusyPermit`] exists at a time. Trying to acquire another
/// one fails instead of waiting.
#[derive(Clone, Debug, Default)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl BusyGuard {
    /// Takes the slot, or returns `None` if it is already taken.
    #[inline]
    pub fn try_acquire(&self) -> Option<BusyPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Returns whether the slot is taken.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding a [`BusyGuard`], which frees the slot when dropped.
#[derive(Debug)]
pub struct BusyPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyPermit {
    #[inline]
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slot() {
        let guard = BusyGuard::default();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
        assert!(guard.clone().try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }
}
