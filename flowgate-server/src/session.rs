//! Web sessions of logged-in users.
//!
//! The cache holds at most `max.num.sessions` sessions. A session not used
//! for `session.time.to.live` milliseconds expires; when the cache is full
//! the least recently used session is evicted to make room.

use crate::error::ConfigurationError;
use crate::subsystems::User;
use chrono::{DateTime, Duration, Utc};
use flowgate_props::Props;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

pub const KEY_MAX_SESSIONS: &str = "max.num.sessions";
pub const KEY_SESSION_TTL: &str = "session.time.to.live";

pub const DEFAULT_MAX_SESSIONS: i64 = 10_000;
pub const DEFAULT_SESSION_TTL_MS: i64 = 86_400_000;

/// A logged-in user, keyed by an id the login handler hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user: User,
    pub ip: String,
    pub created: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, user: User, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user,
            ip: ip.into(),
            created: Utc::now(),
        }
    }
}

struct Entry {
    session: Session,
    last_access: DateTime<Utc>,
}

pub struct SessionCache {
    max_sessions: usize,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionCache {
    pub fn from_props(props: &Props) -> Result<Self, ConfigurationError> {
        let max_sessions = props.get_int_or(KEY_MAX_SESSIONS, DEFAULT_MAX_SESSIONS)?;
        let max_sessions = usize::try_from(max_sessions)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigurationError::InvalidSetting {
                key: KEY_MAX_SESSIONS.to_string(),
                message: format!("expected a positive session count, got {}", max_sessions),
            })?;

        let ttl_ms = props.get_int_or(KEY_SESSION_TTL, DEFAULT_SESSION_TTL_MS)?;
        if ttl_ms <= 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: KEY_SESSION_TTL.to_string(),
                message: format!("expected a positive duration in ms, got {}", ttl_ms),
            });
        }

        Ok(Self {
            max_sessions,
            ttl: Duration::milliseconds(ttl_ms),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look a session up and mark it used.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Utc::now())
    }

    /// Store a session, replacing any with the same id.
    pub fn add(&self, session: Session) {
        self.add_at(session, Utc::now())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(id)?;
        if now - entry.last_access > self.ttl {
            debug!("Session {} expired", id);
            sessions.remove(id);
            return None;
        }
        entry.last_access = now;
        Some(entry.session.clone())
    }

    fn add_at(&self, session: Session, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock();
        let ttl = self.ttl;
        sessions.retain(|_, entry| now - entry.last_access <= ttl);

        if !sessions.contains_key(&session.id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!("Session cache full, evicting {}", oldest);
                sessions.remove(&oldest);
            }
        }

        sessions.insert(
            session.id.clone(),
            Entry {
                session,
                last_access: now,
            },
        );
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("max_sessions", &self.max_sessions)
            .field("ttl_ms", &self.ttl.num_milliseconds())
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(settings: &str) -> SessionCache {
        SessionCache::from_props(&Props::from_str(None, settings).unwrap()).unwrap()
    }

    fn session(id: &str) -> Session {
        let user = User {
            name: "azure".to_string(),
            roles: vec!["admin".to_string()],
        };
        Session::new(id, user, "127.0.0.1")
    }

    #[test]
    fn test_defaults() {
        let cache = cache("");
        assert_eq!(cache.max_sessions(), 10_000);
        assert_eq!(cache.ttl(), Duration::days(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_add_get_remove() {
        let cache = cache("");
        cache.add(session("abc"));

        let found = cache.get("abc").unwrap();
        assert_eq!(found.user.name, "azure");
        assert_eq!(found.ip, "127.0.0.1");
        assert!(cache.get("missing").is_none());

        assert!(cache.remove("abc"));
        assert!(!cache.remove("abc"));
        assert!(cache.get("abc").is_none());
    }

    #[test]
    fn test_idle_session_expires() {
        let cache = cache("session.time.to.live = 1000");
        let start = Utc::now();
        cache.add_at(session("abc"), start);

        assert!(cache.get_at("abc", start + Duration::milliseconds(900)).is_some());
        assert!(cache
            .get_at("abc", start + Duration::milliseconds(1800))
            .is_some());
        assert!(cache.get_at("abc", start + Duration::seconds(5)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_evicts_least_recently_used() {
        let cache = cache("max.num.sessions = 2");
        let start = Utc::now();
        cache.add_at(session("a"), start);
        cache.add_at(session("b"), start + Duration::seconds(1));
        cache.get_at("a", start + Duration::seconds(2));

        cache.add_at(session("c"), start + Duration::seconds(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        for settings in ["max.num.sessions = 0", "session.time.to.live = -5"] {
            let props = Props::from_str(None, settings).unwrap();
            assert!(matches!(
                SessionCache::from_props(&props),
                Err(ConfigurationError::InvalidSetting { .. })
            ));
        }
    }
}
