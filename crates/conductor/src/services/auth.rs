//! Sender authorization with a TTL decision cache
//!
//! Authorization is an allow-list membership test on normalized identities.
//! Decisions are cached with a TTL so a chatty sender does not pay the
//! format/membership cost on every message; [`IdentityValidator::reload`]
//! swaps the allow-list and drops the cache in one step, so concurrent
//! lookups observe either the old or the new list in full.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{RwLock, broadcast};

use crate::domain::events::DomainEvent;
use crate::domain::identity::{is_valid_format, normalize, short_identity};

/// Default lifetime of a cached authorization decision.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct AuthDecision {
    authorized: bool,
    decided_at: Instant,
}

/// Allow-list and decision cache behind one lock; `reload` relies on that
/// to stay atomic for readers.
struct AuthState {
    allowed: HashSet<String>,
    cache: HashMap<String, AuthDecision>,
}

/// Validates sender identities against a configured allow-list.
pub struct IdentityValidator {
    state: RwLock<AuthState>,
    ttl: Duration,
    events: Option<broadcast::Sender<DomainEvent>>,
}

impl IdentityValidator {
    /// Create a validator for the given allow-list. Entries are normalized
    /// up front so lookups compare normalized forms only.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|identity| normalize(identity.as_ref()))
            .filter(|identity| !identity.is_empty())
            .collect();

        Self {
            state: RwLock::new(AuthState {
                allowed,
                cache: HashMap::new(),
            }),
            ttl: DEFAULT_CACHE_TTL,
            events: None,
        }
    }

    /// Override the decision cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Attach an event channel for rejection reporting.
    pub fn with_events(mut self, events: broadcast::Sender<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Check whether `identity` may trigger pipelines. Never fails: absent,
    /// empty, or malformed identities are simply unauthorized.
    pub async fn validate(&self, identity: &str) -> bool {
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            return false;
        }
        let normalized = normalize(trimmed);

        {
            let state = self.state.read().await;
            if let Some(decision) = state.cache.get(&normalized) {
                if decision.decided_at.elapsed() < self.ttl {
                    return decision.authorized;
                }
            }
        }

        let mut state = self.state.write().await;
        let authorized = is_valid_format(&normalized) && state.allowed.contains(&normalized);
        state.cache.insert(
            normalized,
            AuthDecision {
                authorized,
                decided_at: Instant::now(),
            },
        );
        drop(state);

        if !authorized {
            let display_id = short_identity(trimmed);
            tracing::warn!(sender = %display_id, "rejected unauthorized sender");
            if let Some(events) = &self.events {
                let _ = events.send(DomainEvent::SenderRejected {
                    sender: display_id,
                    timestamp: Utc::now(),
                });
            }
        }

        authorized
    }

    /// Replace the allow-list and invalidate every cached decision.
    pub async fn reload<I, S>(&self, new_list: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed: HashSet<String> = new_list
            .into_iter()
            .map(|identity| normalize(identity.as_ref()))
            .filter(|identity| !identity.is_empty())
            .collect();

        let mut state = self.state.write().await;
        tracing::info!(entries = allowed.len(), "reloaded authorized sender list");
        state.allowed = allowed;
        state.cache.clear();
    }

    /// Number of live cache entries.
    pub async fn cache_len(&self) -> usize {
        self.state.read().await.cache.len()
    }

    /// The cached decision for an identity, if one exists (live or not).
    pub async fn cached_decision(&self, identity: &str) -> Option<bool> {
        let normalized = normalize(identity);
        self.state
            .read()
            .await
            .cache
            .get(&normalized)
            .map(|decision| decision.authorized)
    }

    /// Size of the configured allow-list.
    pub async fn allowed_len(&self) -> usize {
        self.state.read().await.allowed.len()
    }
}
