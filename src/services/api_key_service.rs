use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{fingerprint, generate_key, AccessLevel, ApiKeyRecord, ApiKeyStore, NewApiKey};
use crate::database::DatabaseError;

const MAX_GENERATION_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum KeyServiceError {
    #[error("API key not found: {0}")]
    NotFound(i32),
    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),
    #[error("Expiry must be in the future")]
    ExpiryInPast,
    #[error("API key {0} has expired; reactivate it with a new expiry")]
    ExpiredNeedsNewExpiry(i32),
    #[error("Could not generate a unique API key")]
    Exhausted,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Listing view of a key; the secret is reduced to its fingerprint
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeySummary {
    pub id: i32,
    pub fingerprint: String,
    pub label: Option<String>,
    pub access: AccessLevel,
    pub is_active: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ApiKeySummary {
    fn from_record(record: &ApiKeyRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            fingerprint: record.fingerprint(),
            label: record.label.clone(),
            access: record.access,
            is_active: record.is_active,
            expired: record.is_expired_at(now),
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// Admin actions on API keys
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }

    /// Create a key with a fresh random secret, retrying on the (unlikely) collision
    pub async fn generate(
        &self,
        label: Option<String>,
        expires_at: DateTime<Utc>,
        access: AccessLevel,
        is_active: bool,
    ) -> Result<ApiKeyRecord, KeyServiceError> {
        if expires_at <= Utc::now() {
            return Err(KeyServiceError::ExpiryInPast);
        }
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let key = generate_key();
            if self.store.find_by_key(&key).await?.is_some() {
                warn!("Generated API key {} collides; retrying", fingerprint(&key));
                continue;
            }
            let record = self
                .store
                .insert(NewApiKey {
                    key,
                    label: label.clone(),
                    expires_at,
                    is_active,
                    access,
                })
                .await?;
            info!("Created API key {} (id {}, {} access)", record.fingerprint(), record.id, record.access);
            return Ok(record);
        }
        Err(KeyServiceError::Exhausted)
    }

    pub async fn list(&self) -> Result<Vec<ApiKeySummary>, KeyServiceError> {
        let now = Utc::now();
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .map(|r| ApiKeySummary::from_record(r, now))
            .collect())
    }

    /// Flip a key between active and inactive.
    ///
    /// An expired key stays expired when switched on, so activating one is refused;
    /// use [`ApiKeyService::reactivate`] with a new expiry instead.
    pub async fn toggle(&self, id: i32) -> Result<ApiKeySummary, KeyServiceError> {
        let now = Utc::now();
        let current = self
            .store
            .list()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(KeyServiceError::NotFound(id))?;
        if !current.is_active && current.is_expired_at(now) {
            return Err(KeyServiceError::ExpiredNeedsNewExpiry(id));
        }

        let record = self.store.toggle_active(id).await?.ok_or(KeyServiceError::NotFound(id))?;
        info!("API key {} is now {}", id, if record.is_active { "active" } else { "inactive" });
        Ok(ApiKeySummary::from_record(&record, now))
    }

    /// Activate a key with a new, future expiry; the way back for expired keys
    pub async fn reactivate(&self, id: i32, expires_at: DateTime<Utc>) -> Result<ApiKeySummary, KeyServiceError> {
        let now = Utc::now();
        if expires_at <= now {
            return Err(KeyServiceError::ExpiryInPast);
        }
        let record = self
            .store
            .reactivate(id, expires_at)
            .await?
            .ok_or(KeyServiceError::NotFound(id))?;
        info!("API key {} reactivated until {}", id, record.expires_at);
        Ok(ApiKeySummary::from_record(&record, now))
    }

    pub async fn delete(&self, id: i32) -> Result<(), KeyServiceError> {
        if !self.store.delete(id).await? {
            return Err(KeyServiceError::NotFound(id));
        }
        info!("Deleted API key {}", id);
        Ok(())
    }
}

/// Accepts RFC 3339 timestamps or plain dates (end of that day, UTC)
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, KeyServiceError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|t| t.and_utc())
        .ok_or_else(|| KeyServiceError::InvalidExpiry(raw.to_string()))
}
