use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::api_key::{fingerprint, ApiKeyRecord};
use super::store::ApiKeyStore;
use crate::database::DatabaseError;
use crate::query::QueryError;
use crate::types::Verb;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("API key not found")]
    KeyNotFound,

    #[error("API key is inactive or expired")]
    KeyInactiveOrExpired,

    #[error("API key does not permit {0} requests")]
    InsufficientAccess(Verb),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl GateError {
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::KeyNotFound => "key_not_found",
            GateError::KeyInactiveOrExpired => "key_inactive_or_expired",
            GateError::InsufficientAccess(_) => "insufficient_access",
            GateError::Store(_) => "store_unavailable",
        }
    }
}

impl From<GateError> for QueryError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::KeyNotFound | GateError::KeyInactiveOrExpired => QueryError::Auth(err.to_string()),
            GateError::InsufficientAccess(_) => QueryError::Permission(err.to_string()),
            GateError::Store(e) => QueryError::Database(e),
        }
    }
}

/// Checks a presented key against the store before any query runs.
///
/// Expiry is lazy: a key whose `expires_at` has passed is switched off in the store the first
/// time it is presented afterwards, and stays off until an admin reactivates it.
#[derive(Clone)]
pub struct ApiKeyGate {
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyGate {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }

    pub async fn validate(&self, key: &str, verb: Verb) -> Result<ApiKeyRecord, GateError> {
        self.validate_at(key, verb, Utc::now()).await
    }

    pub async fn validate_at(&self, key: &str, verb: Verb, now: DateTime<Utc>) -> Result<ApiKeyRecord, GateError> {
        if key.is_empty() {
            return Err(GateError::KeyNotFound);
        }
        let record = match self.store.find_by_key(key).await? {
            Some(record) => record,
            None => {
                warn!("Rejected unknown API key {}", fingerprint(key));
                return Err(GateError::KeyNotFound);
            }
        };

        if !record.is_active {
            warn!("Rejected inactive API key {} (id {})", record.fingerprint(), record.id);
            return Err(GateError::KeyInactiveOrExpired);
        }
        if record.is_expired_at(now) {
            if self.store.deactivate(record.id).await? {
                info!("API key {} (id {}) expired at {}; deactivated", record.fingerprint(), record.id, record.expires_at);
            }
            return Err(GateError::KeyInactiveOrExpired);
        }
        if !record.access.permits(verb) {
            warn!(
                "API key {} with {} access cannot {}",
                record.fingerprint(),
                record.access,
                verb
            );
            return Err(GateError::InsufficientAccess(verb));
        }

        debug!("API key {} accepted for {}", record.fingerprint(), verb);
        Ok(record)
    }
}
