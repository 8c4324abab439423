use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Instant};

use super::{CoordinationStore, StoreError, StoreResult};

#[derive(Debug)]
enum Value {
    Str(String),
    Set(HashSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Slot {
    value: Value,
    expires: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires.map_or(false, |at| at <= now)
    }
}

/// In-process coordination store shared by detectors running in one daemon
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
    // Woken on every list push so blocked `blpop` callers can retry
    pushed: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Drop the slot if it has expired, then return what's left
fn live<'a>(slots: &'a mut HashMap<String, Slot>, key: &str) -> Option<&'a mut Slot> {
    let now = Instant::now();
    if slots.get(key).map_or(false, |s| s.is_expired(now)) {
        trace!("Expired key {}", key);
        slots.remove(key);
    }
    slots.get_mut(key)
}

fn pop_front(slots: &mut HashMap<String, Slot>, key: &str) -> StoreResult<Option<String>> {
    let (popped, now_empty) = match live(slots, key) {
        Some(Slot {
            value: Value::List(list),
            ..
        }) => (list.pop_front(), list.is_empty()),
        Some(_) => return Err(StoreError::WrongType(key.to_string())),
        None => (None, false),
    };
    if now_empty {
        slots.remove(key);
    }
    Ok(popped)
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut slots = self.slots.lock().await;
        match live(&mut slots, key) {
            Some(Slot {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        slots.insert(key.to_string(), Slot::new(Value::Str(value.to_string())));
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        let slot = Slot {
            value: Value::Str(value.to_string()),
            expires: Some(Instant::now() + ttl),
        };
        slots.insert(key.to_string(), slot);
        Ok(())
    }

    async fn getset(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let mut slots = self.slots.lock().await;
        let previous = match live(&mut slots, key) {
            Some(Slot {
                value: Value::Str(previous),
                ..
            }) => Some(previous.clone()),
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
            None => None,
        };
        slots.insert(key.to_string(), Slot::new(Value::Str(value.to_string())));
        Ok(previous)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut slots = self.slots.lock().await;
        Ok(live(&mut slots, key).is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.slots.lock().await.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        if live(&mut slots, key).is_none() {
            slots.insert(key.to_string(), Slot::new(Value::Set(HashSet::new())));
        }
        match slots.get_mut(key) {
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => {
                set.insert(member.to_string());
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut slots = self.slots.lock().await;
        let now_empty = match live(&mut slots, key) {
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => {
                set.remove(member);
                set.is_empty()
            }
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
            None => false,
        };
        if now_empty {
            slots.remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut slots = self.slots.lock().await;
        match live(&mut slots, key) {
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(vec![]),
        }
    }

    async fn scard(&self, key: &str) -> StoreResult<usize> {
        let mut slots = self.slots.lock().await;
        match live(&mut slots, key) {
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => Ok(set.len()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(0),
        }
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        {
            let mut slots = self.slots.lock().await;
            if live(&mut slots, key).is_none() {
                slots.insert(key.to_string(), Slot::new(Value::List(VecDeque::new())));
            }
            match slots.get_mut(key) {
                Some(Slot {
                    value: Value::List(list),
                    ..
                }) => list.push_front(value.to_string()),
                _ => return Err(StoreError::WrongType(key.to_string())),
            }
        }
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn blpop(&self, key: &str, timeout: Duration) -> StoreResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeups before looking, so a push between the
            // check and the wait is not missed
            let pushed = self.pushed.notified();
            tokio::pin!(pushed);
            pushed.as_mut().enable();

            if let Some(value) = pop_front(&mut *self.slots.lock().await, key)? {
                return Ok(Some(value));
            }
            if time::timeout_at(deadline, pushed).await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_string_ops() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.getset("a", "1").await.unwrap(), None);
        assert_eq!(store.getset("a", "2").await.unwrap(), Some("1".to_string()));
        assert!(store.exists("a").await.unwrap());
        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_ops() {
        let store = MemoryStore::new();
        store.sadd("s", "x").await.unwrap();
        store.sadd("s", "y").await.unwrap();
        store.sadd("s", "x").await.unwrap();
        assert_eq!(store.scard("s").await.unwrap(), 2);
        store.srem("s", "x").await.unwrap();
        assert_eq!(store.smembers("s").await.unwrap(), vec!["y".to_string()]);
        store.srem("s", "y").await.unwrap();
        assert!(!store.exists("s").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(
            store.sadd("k", "m").await,
            Err(StoreError::WrongType("k".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let store = MemoryStore::new();
        store
            .set_ex("seen_1", "1", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(store.exists("seen_1").await.unwrap());
        time::advance(Duration::from_secs(11)).await;
        assert!(!store.exists("seen_1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blpop_times_out() {
        let store = MemoryStore::new();
        let popped = store.blpop("token", Duration::from_secs(60)).await.unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn test_blpop_wakes_on_push() {
        let store = Arc::new(MemoryStore::new());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.blpop("token", Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        store.lpush("token", "token").await.unwrap();
        let popped = waiter.await.unwrap().unwrap();
        assert_eq!(popped, Some("token".to_string()));
        assert!(!store.exists("token").await.unwrap());
    }
}
