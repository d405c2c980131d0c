use std::sync::{Arc, Mutex, MutexGuard};

/// Single-slot handoff between one producer and one consumer.
///
/// `post` always overwrites whatever is waiting; `take` never blocks and
/// returns `None` when nothing new arrived since the last take. Unread items
/// are dropped, so the consumer only ever sees the most recent one.
pub struct Mailbox<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Store `item`, replacing any unread one. Returns true if an unread item
    /// was dropped.
    pub fn post(&self, item: T) -> bool {
        self.lock().replace(item).is_some()
    }

    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // a panicking producer leaves at worst a stale frame behind
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_overwrites_unread() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.post(1));
        assert!(mailbox.post(2));
        assert_eq!(mailbox.take(), Some(2));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn clones_share_the_slot() {
        let producer = Mailbox::new();
        let consumer = producer.clone();
        let handle = std::thread::spawn(move || {
            producer.post("frame");
        });
        handle.join().unwrap();
        assert_eq!(consumer.take(), Some("frame"));
        assert!(consumer.is_empty());
    }
}
