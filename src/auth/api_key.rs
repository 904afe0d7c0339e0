use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::Verb;

/// Permission string stored on a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    Read,
    Update,
    ReadUpdate,
    Delete,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Update => "update",
            AccessLevel::ReadUpdate => "read-update",
            AccessLevel::Delete => "delete",
        }
    }

    /// GET needs read or read-update; POST/PUT need update or read-update; DELETE needs delete
    pub fn permits(&self, verb: Verb) -> bool {
        match verb {
            Verb::Get => matches!(self, AccessLevel::Read | AccessLevel::ReadUpdate),
            Verb::Post | Verb::Put => matches!(self, AccessLevel::Update | AccessLevel::ReadUpdate),
            Verb::Delete => matches!(self, AccessLevel::Delete),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(AccessLevel::Read),
            "update" => Ok(AccessLevel::Update),
            "read-update" => Ok(AccessLevel::ReadUpdate),
            "delete" => Ok(AccessLevel::Delete),
            other => Err(format!("Unknown access level: {}", other)),
        }
    }
}

#[derive(Clone, PartialEq, Serialize)]
pub struct ApiKeyRecord {
    pub id: i32,
    pub key: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub access: AccessLevel,
}

impl ApiKeyRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.key)
    }
}

// Keeps the secret out of logs and panics
impl fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("key", &self.fingerprint())
            .field("label", &self.label)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("is_active", &self.is_active)
            .field("access", &self.access)
            .finish()
    }
}

/// Row shape of the `api_keys` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRow {
    pub id: i32,
    pub key: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub access: String,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = String;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        Ok(ApiKeyRecord {
            access: row.access.parse()?,
            id: row.id,
            key: row.key,
            label: row.label,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        })
    }
}

/// Values for a key about to be inserted
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key: String,
    pub label: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub access: AccessLevel,
}

/// 64 hex characters of randomness
pub fn generate_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Short stable identifier for a key, safe to log
pub fn fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mapping() {
        assert!(AccessLevel::Read.permits(Verb::Get));
        for verb in [Verb::Post, Verb::Put, Verb::Delete] {
            assert!(!AccessLevel::Read.permits(verb));
        }
        for verb in [Verb::Get, Verb::Post, Verb::Put] {
            assert!(!AccessLevel::Delete.permits(verb));
        }
        assert!(AccessLevel::Delete.permits(Verb::Delete));
        assert!(AccessLevel::ReadUpdate.permits(Verb::Get));
        assert!(AccessLevel::ReadUpdate.permits(Verb::Put));
        assert!(!AccessLevel::ReadUpdate.permits(Verb::Delete));
        assert!(!AccessLevel::Update.permits(Verb::Get));
        assert!(AccessLevel::Update.permits(Verb::Post));
    }

    #[test]
    fn access_levels_round_trip_as_strings() {
        for level in [AccessLevel::Read, AccessLevel::Update, AccessLevel::ReadUpdate, AccessLevel::Delete] {
            assert_eq!(level.as_str().parse::<AccessLevel>().unwrap(), level);
        }
        assert!("admin".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn generated_keys_are_hex() {
        let key = generate_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let record = ApiKeyRecord {
            id: 1,
            key: "supersecretvalue".into(),
            label: None,
            created_at: Utc::now(),
            expires_at: Utc::now(),
            is_active: true,
            access: AccessLevel::Read,
        };
        let debug = format!("{:?}", record);
        assert!(!debug.contains("supersecretvalue"));
        assert!(debug.contains(&fingerprint("supersecretvalue")));
        assert_eq!(record.fingerprint().len(), 12);
    }
}
