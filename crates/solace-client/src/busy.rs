use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ClientError, Result};

/// Single in-flight slot for one action.
#[derive(Debug, Default)]
pub(crate) struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub(crate) fn try_acquire(&self) -> Result<BusyGuard<'_>> {
        if self.0.swap(true, Ordering::AcqRel) {
            return Err(ClientError::Busy);
        }
        Ok(BusyGuard(&self.0))
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One in-flight slot per key, e.g. per (post, action).
#[derive(Debug)]
pub(crate) struct InFlight<K> {
    keys: Mutex<HashSet<K>>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    pub(crate) fn try_acquire(&self, key: K) -> Result<InFlightGuard<'_, K>> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if !keys.insert(key.clone()) {
            return Err(ClientError::Busy);
        }
        Ok(InFlightGuard { owner: self, key })
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key)
    }
}

pub(crate) struct InFlightGuard<'a, K: Eq + Hash + Clone> {
    owner: &'a InFlight<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for InFlightGuard<'_, K> {
    fn drop(&mut self) {
        self.owner
            .keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire().unwrap();
        assert!(matches!(flag.try_acquire(), Err(ClientError::Busy)));
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_ok());
    }

    #[test]
    fn keys_are_independent() {
        let slots = InFlight::default();
        let _a = slots.try_acquire(1).unwrap();
        assert!(matches!(slots.try_acquire(1), Err(ClientError::Busy)));
        let b = slots.try_acquire(2).unwrap();
        drop(b);
        assert!(!slots.contains(&2));
        assert!(slots.contains(&1));
    }
}
