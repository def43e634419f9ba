//! # Subscription Registry
//!
//! The set of live `(session, symbol)` interests. Every operation is a single
//! critical section over one `RwLock`ed map, so registrations, removals and
//! snapshot reads are linearizable with respect to each other. Nothing awaits
//! or performs I/O while the lock is held: readers clone the `Arc`s they need
//! and release the lock before any push happens.
//!
//! Removal is remove-if-present. The connection handler (on read failure) and
//! the broadcaster (on push failure) may both try to remove the same
//! subscription; whichever comes second is a no-op.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::session::Session;

/// Identity of a subscription, unique for the lifetime of a `Registry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The live association between one session and one symbol.
///
/// Compared by `id` only; two subscriptions for the same session and symbol
/// are still distinct.
pub struct Subscription {
    id: SubscriptionId,
    item: String,
    session: Arc<dyn Session>,
}

impl Subscription {
    /// Registry-assigned identity.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The symbol this subscription wants updates for.
    pub fn item(&self) -> &str {
        &self.item
    }

    /// The connection pushes go to.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("item", &self.item)
            .field("session", &self.session.id())
            .finish()
    }
}

/// The authoritative set of active subscriptions.
#[derive(Default)]
pub struct Registry {
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new subscription of `session` to `item`. Never fails.
    pub fn register(&self, session: Arc<dyn Session>, item: impl Into<String>) -> Arc<Subscription> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription {
            id,
            item: item.into(),
            session,
        });

        self.write().insert(id, Arc::clone(&subscription));
        log::debug!(
            "Registered {} for {} (session {})",
            id,
            subscription.item,
            subscription.session.id()
        );
        subscription
    }

    /// Removes `subscription` if it is still present.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn deregister(&self, subscription: &Subscription) -> bool {
        let removed = self.write().remove(&subscription.id).is_some();
        if removed {
            log::debug!("Deregistered {} for {}", subscription.id, subscription.item);
        }
        removed
    }

    /// Every symbol with at least one active subscription.
    pub fn distinct_items(&self) -> BTreeSet<String> {
        self.read().values().map(|s| s.item.clone()).collect()
    }

    /// The active subscriptions for `item` at call time.
    ///
    /// The returned vector is a snapshot: later registrations and removals do
    /// not affect it.
    pub fn subscribers_of(&self, item: &str) -> Vec<Arc<Subscription>> {
        self.read()
            .values()
            .filter(|s| s.item == item)
            .cloned()
            .collect()
    }

    /// Whether `subscription` is still active.
    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.read().contains_key(&subscription.id)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// `true` when nobody is subscribed to anything.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ties `subscription` to a scope: dropping the guard deregisters it.
    pub fn guard(self: &Arc<Self>, subscription: Arc<Subscription>) -> SubscriptionGuard {
        SubscriptionGuard {
            registry: Arc::clone(self),
            subscription,
        }
    }

    // Each critical section is a single map operation, so a panicking holder
    // cannot leave the map half-updated and the poison flag can be ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriptionId, Arc<Subscription>>> {
        self.subscriptions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriptionId, Arc<Subscription>>> {
        self.subscriptions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped ownership of a subscription.
///
/// The connection handler holds one for as long as its connection lives; it
/// deregisters on every exit path, including unwinding.
pub struct SubscriptionGuard {
    registry: Arc<Registry>,
    subscription: Arc<Subscription>,
}

impl SubscriptionGuard {
    /// The guarded subscription.
    pub fn subscription(&self) -> &Arc<Subscription> {
        &self.subscription
    }

    /// Shorthand for `subscription().item()`.
    pub fn item(&self) -> &str {
        self.subscription.item()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::RecordingSession;

    #[test]
    fn test_register_and_read_back() {
        let registry = Registry::new();
        let a = registry.register(RecordingSession::new(1), "AAPL");
        let b = registry.register(RecordingSession::new(2), "AAPL");
        let c = registry.register(RecordingSession::new(3), "MSFT");

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.distinct_items().into_iter().collect::<Vec<_>>(),
            vec!["AAPL".to_string(), "MSFT".to_string()]
        );

        let aapl = registry.subscribers_of("AAPL");
        assert_eq!(aapl.len(), 2);
        assert!(aapl.iter().any(|s| s.id() == a.id()));
        assert!(aapl.iter().any(|s| s.id() == b.id()));
        assert_eq!(registry.subscribers_of("MSFT"), vec![c]);
        assert!(registry.subscribers_of("TSLA").is_empty());
    }

    #[test]
    fn test_identity_is_per_subscription() {
        let registry = Registry::new();
        let session = RecordingSession::new(1);
        let first = registry.register(session.clone(), "AAPL");
        let second = registry.register(session, "AAPL");

        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);

        assert!(registry.deregister(&first));
        assert_eq!(registry.subscribers_of("AAPL"), vec![second]);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let registry = Registry::new();
        let sub = registry.register(RecordingSession::new(1), "AAPL");
        let other = registry.register(RecordingSession::new(2), "MSFT");

        assert!(registry.deregister(&sub));
        assert!(!registry.deregister(&sub));

        assert!(!registry.contains(&sub));
        assert!(registry.contains(&other));
        assert_eq!(registry.len(), 1);
        assert!(!registry.distinct_items().contains("AAPL"));
    }

    #[test]
    fn test_item_disappears_with_last_subscriber() {
        let registry = Registry::new();
        let a = registry.register(RecordingSession::new(1), "AAPL");
        let b = registry.register(RecordingSession::new(2), "AAPL");

        registry.deregister(&a);
        assert!(registry.distinct_items().contains("AAPL"));
        registry.deregister(&b);
        assert!(registry.distinct_items().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscriber_snapshot_is_detached() {
        let registry = Registry::new();
        let a = registry.register(RecordingSession::new(1), "AAPL");
        let snapshot = registry.subscribers_of("AAPL");

        registry.deregister(&a);
        registry.register(RecordingSession::new(2), "AAPL");

        assert_eq!(snapshot, vec![a]);
    }

    #[test]
    fn test_guard_deregisters_on_drop() {
        let registry = Arc::new(Registry::new());
        let sub = registry.register(RecordingSession::new(1), "AAPL");
        let guard = registry.guard(Arc::clone(&sub));
        assert_eq!(guard.item(), "AAPL");

        // The broadcaster got there first; dropping the guard must still be fine.
        assert!(registry.deregister(&sub));
        drop(guard);

        assert!(registry.is_empty());

        let sub = registry.register(RecordingSession::new(2), "MSFT");
        {
            let _guard = registry.guard(Arc::clone(&sub));
            assert!(registry.contains(&sub));
        }
        assert!(!registry.contains(&sub));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_deregister_is_consistent() {
        let registry = Arc::new(Registry::new());

        let mut handles = Vec::new();
        for i in 0..256u64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let item = format!("SYM{}", i % 16);
                let sub = registry.register(RecordingSession::new(i), item.clone());
                tokio::task::yield_now().await;
                // Interleave readers with the writers.
                let _ = registry.distinct_items();
                if i % 3 == 0 {
                    // Two racing removal paths.
                    let r1 = Arc::clone(&registry);
                    let r2 = Arc::clone(&registry);
                    let s1 = Arc::clone(&sub);
                    let s2 = Arc::clone(&sub);
                    let (a, b) = tokio::join!(
                        tokio::spawn(async move { r1.deregister(&s1) }),
                        tokio::spawn(async move { r2.deregister(&s2) }),
                    );
                    let removed = [a.expect("task"), b.expect("task")];
                    assert_eq!(removed.iter().filter(|r| **r).count(), 1);
                    None
                } else {
                    Some(item)
                }
            }));
        }

        let mut expected_items = BTreeSet::new();
        let mut expected_len = 0;
        for handle in handles {
            if let Some(item) = handle.await.expect("task") {
                expected_items.insert(item);
                expected_len += 1;
            }
        }

        assert_eq!(registry.distinct_items(), expected_items);
        assert_eq!(registry.len(), expected_len);
    }
}
