use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::ws::WsWriter;
use crate::core::types::Subscription;
use std::sync::Mutex;

/// Last-known-desired set of subscriptions for one session.
///
/// Mutated by the caller's subscribe/unsubscribe calls and read by the
/// reconnect path, possibly from different OS threads, so every access
/// goes through a mutex. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a subscription.
    ///
    /// An entry with the same channels and symbols is replaced in place,
    /// keeping its original position in replay order. Returns `true` when
    /// the entry was not already present with identical extras.
    pub fn add(&self, subscription: Subscription) -> bool {
        let mut entries = self.lock();
        match entries
            .iter_mut()
            .find(|e| e.same_target(&subscription.channels, subscription.symbols.as_deref()))
        {
            Some(existing) if *existing == subscription => false,
            Some(existing) => {
                *existing = subscription;
                true
            }
            None => {
                entries.push(subscription);
                true
            }
        }
    }

    /// Stop tracking matching entries.
    ///
    /// With `symbols` the exact channel/symbol entry is removed; without,
    /// every entry on those channels goes. Removing something absent is a
    /// no-op. Returns the number of entries removed.
    pub fn remove(&self, channels: &[String], symbols: Option<&[String]>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        match symbols {
            Some(_) => entries.retain(|e| !e.same_target(channels, symbols)),
            None => entries.retain(|e| e.channels != channels),
        }
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Snapshot of the tracked entries in insertion order
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.lock().clone()
    }

    /// Send one subscribe frame per entry, in insertion order.
    ///
    /// Works from a snapshot, so callers may keep mutating the registry
    /// while frames are in flight. Returns the number of frames sent.
    pub async fn replay<C: WsCodec>(
        &self,
        codec: &C,
        writer: &WsWriter,
    ) -> Result<usize, ExchangeError> {
        let entries = self.snapshot();
        for subscription in &entries {
            writer.send(codec.encode_subscription(subscription)?).await?;
        }
        Ok(entries.len())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        // a poisoned registry still holds a consistent Vec
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let sub = Subscription::new(["book"]).with_symbols(["BTC_USDT"]);

        assert!(registry.add(sub.clone()));
        assert!(!registry.add(sub));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_replaces_extras_in_place() {
        let registry = SubscriptionRegistry::new();
        registry.add(Subscription::new(["book"]).with_symbols(["BTC_USDT"]));
        registry.add(Subscription::new(["trades"]).with_symbols(["BTC_USDT"]));
        registry.add(
            Subscription::new(["book"])
                .with_symbols(["BTC_USDT"])
                .with_extra("depth", json!(20)),
        );

        let entries = registry.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].channels, strings(&["book"]));
        assert_eq!(entries[0].extras.get("depth"), Some(&json!(20)));
        assert_eq!(entries[1].channels, strings(&["trades"]));
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let registry = SubscriptionRegistry::new();
        for channel in ["ticker", "book", "trades"] {
            registry.add(Subscription::new([channel]));
        }

        let channels: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|s| s.channels[0].clone())
            .collect();
        assert_eq!(channels, strings(&["ticker", "book", "trades"]));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.add(Subscription::new(["book"]).with_symbols(["BTC_USDT"]));

        let symbols = strings(&["ETH_USDT"]);
        let removed = registry.remove(&strings(&["trades"]), Some(symbols.as_slice()));
        assert_eq!(removed, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_exact_and_by_channel() {
        let registry = SubscriptionRegistry::new();
        registry.add(Subscription::new(["book"]).with_symbols(["BTC_USDT"]));
        registry.add(Subscription::new(["book"]).with_symbols(["ETH_USDT"]));
        registry.add(Subscription::new(["trades"]).with_symbols(["BTC_USDT"]));

        let symbols = strings(&["ETH_USDT"]);
        assert_eq!(
            registry.remove(&strings(&["book"]), Some(symbols.as_slice())),
            1
        );
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.remove(&strings(&["book"]), None), 1);
        assert_eq!(registry.snapshot()[0].channels, strings(&["trades"]));
    }

    #[test]
    fn test_clear() {
        let registry = SubscriptionRegistry::new();
        registry.add(Subscription::new(["auth_orders"]));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_replay_without_connection() {
        let registry = SubscriptionRegistry::new();
        let writer = WsWriter::default();
        let codec = crate::exchanges::poloniex::PoloniexCodec;

        assert_eq!(registry.replay(&codec, &writer).await.unwrap(), 0);

        registry.add(Subscription::new(["book"]));
        assert!(matches!(
            registry.replay(&codec, &writer).await,
            Err(ExchangeError::NotConnected)
        ));
    }
}
