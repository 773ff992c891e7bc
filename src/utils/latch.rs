use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Single-assignment slot shared by racing completion signals.
///
/// The first caller of [`ResponseLatch::resolve`] hands its value to the
/// waiting receiver; every later call is a no-op and returns `false`.
pub struct ResponseLatch<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResponseLatch<T> {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let latch = Arc::new(Self {
            slot: Mutex::new(Some(tx)),
        });
        (latch, rx)
    }

    /// Returns `true` only for the call that won the race.
    ///
    /// A dropped receiver still counts as resolved: the winner owns the
    /// outcome even if nobody is listening any more.
    pub fn resolve(&self, value: T) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_resolution_wins() {
        let (latch, rx) = ResponseLatch::new();
        assert!(latch.resolve("exit"));
        assert!(!latch.resolve("timeout"));

        assert_eq!(rx.await.unwrap(), "exit");
    }

    #[tokio::test]
    async fn test_resolve_after_receiver_dropped() {
        let (latch, rx) = ResponseLatch::new();
        drop(rx);

        assert!(latch.resolve(1));
        assert!(!latch.resolve(2));
    }

    #[tokio::test]
    async fn test_concurrent_resolvers_produce_one_value() {
        let (latch, rx) = ResponseLatch::new();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let latch = latch.clone();
                tokio::spawn(async move { latch.resolve(i) })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(rx.await.is_ok());
    }
}
