use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSession {
    pub listing_url: String,
    pub slug: String,
    pub candidates: Vec<String>,
    pub last_downloaded: Vec<String>,
}

#[derive(Debug)]
struct Entry {
    session: ListingSession,
    created: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, session: ListingSession) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut entries = self.lock();
        purge_locked(&mut entries, self.ttl);
        entries.insert(
            token.clone(),
            Entry {
                session,
                created: Instant::now(),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<ListingSession> {
        let mut entries = self.lock();
        let expired = match entries.get(token) {
            None => return None,
            Some(entry) => entry.created.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(token);
            return None;
        }
        entries.get(token).map(|entry| entry.session.clone())
    }

    pub fn update<F>(&self, token: &str, f: F) -> bool
    where
        F: FnOnce(&mut ListingSession),
    {
        let mut entries = self.lock();
        match entries.get_mut(token) {
            Some(entry) if entry.created.elapsed() <= self.ttl => {
                f(&mut entry.session);
                true
            }
            Some(_) => {
                entries.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn remove(&self, token: &str) -> Option<ListingSession> {
        self.lock().remove(token).map(|entry| entry.session)
    }

    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        purge_locked(&mut entries, self.ttl)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn purge_locked(entries: &mut HashMap<String, Entry>, ttl: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.created.elapsed() <= ttl);
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ListingSession {
        ListingSession {
            listing_url: "https://www.2dehands.be/v/x/m1-bike".to_string(),
            slug: "m1-bike".to_string(),
            candidates: vec!["https://img.example.com/a.jpg".to_string()],
            last_downloaded: Vec::new(),
        }
    }

    #[test]
    fn create_get_update_roundtrip() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(session());
        assert_eq!(token.len(), 36);

        assert!(store.update(&token, |s| s.last_downloaded.push("001_a.jpg".to_string())));
        let got = store.get(&token).expect("live session");
        assert_eq!(got.last_downloaded, vec!["001_a.jpg".to_string()]);
        assert_eq!(got.candidates.len(), 1);
    }

    #[test]
    fn tokens_are_distinct() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.create(session());
        let b = store.create(session());
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_sessions_are_gone() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.create(session());
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(&token).is_none());
        assert!(!store.update(&token, |_| {}));
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_token_is_none() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.get("nope").is_none());
        assert!(store.remove("nope").is_none());
    }
}
