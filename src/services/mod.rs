pub mod api_key_service;

pub use api_key_service::{parse_expiry, ApiKeyService, ApiKeySummary, KeyServiceError};
