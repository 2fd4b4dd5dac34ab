//! Canopy Registry - A process-wide build-once cache of virtual views.
//!
//! The registry maps `(name, version)` keys to views. A key's builder
//! function runs exactly once even under concurrent requests: the first
//! caller builds while later callers block on a condition variable and
//! receive the same instance. Eviction is idle-based and explicit
//! (`cleanup_expired_views`), never timer-driven; evicting a view only
//! removes it from the registry, so navigators already holding it keep
//! it alive through their own `Arc`.
//!
//! # Example
//!
//! ```rust
//! use canopy_core::ViewColumn;
//! use canopy_registry::ViewRegistry;
//! use canopy_view::VirtualView;
//! use std::time::Duration;
//!
//! let registry = ViewRegistry::new();
//! let view = registry.create_view_once("people", 1, Duration::from_secs(60), |name| {
//!     VirtualView::builder(name)
//!         .column(ViewColumn::new("Lastname").category())
//!         .column(ViewColumn::new("Firstname").ascending())
//!         .build()
//!         .expect("static view configuration")
//! });
//!
//! // The same key returns the same instance without rebuilding
//! let again = registry.create_view_once("people", 1, Duration::from_secs(60), |_| {
//!     unreachable!("the builder must not run twice")
//! });
//! assert!(std::sync::Arc::ptr_eq(&view, &again));
//! ```

use canopy_view::VirtualView;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Registry key: a view name plus a configuration version. Bumping the
/// version forces a rebuild under the same name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ViewKey {
    name: String,
    version: u32,
}

struct ReadyView {
    view: Arc<VirtualView>,
    idle_timeout: Duration,
    last_access: Instant,
}

enum SlotState {
    /// A builder is running; waiters block on the condvar.
    Building,
    /// The builder panicked; waiters restart against a fresh slot.
    Failed,
    Ready(ReadyView),
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn building() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Building),
            ready: Condvar::new(),
        })
    }
}

/// Removes a slot whose builder unwound, and wakes its waiters.
struct BuildGuard<'a> {
    registry: &'a ViewRegistry,
    key: ViewKey,
    slot: Arc<Slot>,
    armed: bool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.registry.slots.lock().remove(&self.key);
        *self.slot.state.lock() = SlotState::Failed;
        self.slot.ready.notify_all();
    }
}

/// A process-wide `(name, version)` → view cache.
#[derive(Default)]
pub struct ViewRegistry {
    slots: Mutex<HashMap<ViewKey, Arc<Slot>>>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the view for `(name, version)`, building it at most once.
    ///
    /// A hit resets the key's idle timer (and adopts the given
    /// timeout). Concurrent requests for the same missing key block
    /// until the single builder finishes and then share its result. An
    /// expired entry is treated as absent and rebuilt.
    pub fn create_view_once<F>(
        &self,
        name: &str,
        version: u32,
        idle_timeout: Duration,
        build: F,
    ) -> Arc<VirtualView>
    where
        F: FnOnce(&str) -> VirtualView,
    {
        let key = ViewKey {
            name: name.to_string(),
            version,
        };
        loop {
            let (slot, is_builder) = {
                let mut slots = self.slots.lock();
                match slots.get(&key) {
                    Some(slot) => (slot.clone(), false),
                    None => {
                        let slot = Slot::building();
                        slots.insert(key.clone(), slot.clone());
                        (slot, true)
                    }
                }
            };

            if is_builder {
                let mut guard = BuildGuard {
                    registry: self,
                    key: key.clone(),
                    slot: slot.clone(),
                    armed: true,
                };
                let view = Arc::new(build(name));
                guard.armed = false;
                *slot.state.lock() = SlotState::Ready(ReadyView {
                    view: view.clone(),
                    idle_timeout,
                    last_access: Instant::now(),
                });
                slot.ready.notify_all();
                return view;
            }

            enum WaitOutcome {
                Got(Arc<VirtualView>),
                Expired,
                Retry,
            }
            let outcome = {
                let mut state = slot.state.lock();
                loop {
                    match &mut *state {
                        SlotState::Building => slot.ready.wait(&mut state),
                        SlotState::Failed => break WaitOutcome::Retry,
                        SlotState::Ready(ready) => {
                            if ready.last_access.elapsed() > ready.idle_timeout {
                                break WaitOutcome::Expired;
                            }
                            ready.last_access = Instant::now();
                            ready.idle_timeout = idle_timeout;
                            break WaitOutcome::Got(ready.view.clone());
                        }
                    }
                }
            };
            match outcome {
                WaitOutcome::Got(view) => return view,
                WaitOutcome::Expired => {
                    // Drop the lapsed entry, unless another thread
                    // already replaced it with a fresh slot.
                    let mut slots = self.slots.lock();
                    if let Some(existing) = slots.get(&key) {
                        if Arc::ptr_eq(existing, &slot) {
                            slots.remove(&key);
                        }
                    }
                }
                WaitOutcome::Retry => {}
            }
            // Failed or expired: retry against a fresh slot
        }
    }

    /// Returns the view for `(name, version)` without building,
    /// resetting its idle timer on a hit.
    pub fn get(&self, name: &str, version: u32) -> Option<Arc<VirtualView>> {
        let key = ViewKey {
            name: name.to_string(),
            version,
        };
        let slot = self.slots.lock().get(&key).cloned()?;
        let mut state = slot.state.lock();
        match &mut *state {
            SlotState::Ready(ready) if ready.last_access.elapsed() <= ready.idle_timeout => {
                ready.last_access = Instant::now();
                Some(ready.view.clone())
            }
            _ => None,
        }
    }

    /// Returns the number of registered keys (including in-flight
    /// builds).
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if the registry holds no views.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Evicts views whose idle timer has lapsed and returns how many
    /// were removed. Open navigators keep evicted views alive; only
    /// future lookups are affected.
    pub fn cleanup_expired_views(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    /// Eviction against an explicit clock reading; lets tests drive
    /// expiry without sleeping.
    pub fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|key, slot| {
            let Some(state) = slot.state.try_lock() else {
                return true;
            };
            match &*state {
                SlotState::Building => true,
                SlotState::Failed => false,
                SlotState::Ready(ready) => {
                    let idle = now.saturating_duration_since(ready.last_access);
                    let keep = idle <= ready.idle_timeout;
                    if !keep {
                        log::debug!(
                            "evicting idle view {}@{} after {:?}",
                            key.name,
                            key.version,
                            idle
                        );
                    }
                    keep
                }
            }
        });
        before - slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::ViewColumn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn build_people(name: &str) -> VirtualView {
        VirtualView::builder(name)
            .column(ViewColumn::new("Lastname").category())
            .column(ViewColumn::new("Firstname").ascending())
            .build()
            .expect("static view configuration")
    }

    #[test]
    fn test_second_lookup_reuses_instance() {
        let registry = ViewRegistry::new();
        let first =
            registry.create_view_once("people", 1, Duration::from_secs(60), build_people);
        let second = registry.create_view_once("people", 1, Duration::from_secs(60), |_| {
            panic!("builder must not run twice")
        });
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_version_bump_is_a_distinct_key() {
        let registry = ViewRegistry::new();
        let v1 = registry.create_view_once("people", 1, Duration::from_secs(60), build_people);
        let v2 = registry.create_view_once("people", 2, Duration::from_secs(60), build_people);
        assert!(!Arc::ptr_eq(&v1, &v2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_requests_build_once() {
        let registry = Arc::new(ViewRegistry::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let builds = builds.clone();
                thread::spawn(move || {
                    registry.create_view_once("people", 1, Duration::from_secs(60), |name| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        // A deliberately slow builder widens the race
                        thread::sleep(Duration::from_millis(50));
                        build_people(name)
                    })
                })
            })
            .collect();

        let views: Vec<Arc<VirtualView>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        for view in &views[1..] {
            assert!(Arc::ptr_eq(&views[0], view));
        }
    }

    #[test]
    fn test_idle_eviction() {
        let registry = ViewRegistry::new();
        let view =
            registry.create_view_once("people", 1, Duration::from_millis(100), build_people);

        // Not yet idle long enough
        let evicted = registry.cleanup_expired_at(Instant::now());
        assert_eq!(evicted, 0);

        let evicted =
            registry.cleanup_expired_at(Instant::now() + Duration::from_millis(200));
        assert_eq!(evicted, 1);
        assert!(registry.is_empty());

        // The evicted view stays alive through our Arc
        assert_eq!(view.name(), "people");
        assert_eq!(view.document_count(), 0);
    }

    #[test]
    fn test_lookup_resets_idle_timer() {
        let registry = ViewRegistry::new();
        registry.create_view_once("people", 1, Duration::from_millis(100), build_people);
        thread::sleep(Duration::from_millis(60));

        // Access the key again: the idle timer restarts
        registry.create_view_once("people", 1, Duration::from_millis(100), |_| {
            panic!("still cached")
        });
        thread::sleep(Duration::from_millis(60));
        assert_eq!(registry.cleanup_expired_views(), 0);
    }

    #[test]
    fn test_get_does_not_build() {
        let registry = ViewRegistry::new();
        assert!(registry.get("people", 1).is_none());
        registry.create_view_once("people", 1, Duration::from_secs(60), build_people);
        assert!(registry.get("people", 1).is_some());
        assert!(registry.get("people", 2).is_none());
    }
}
