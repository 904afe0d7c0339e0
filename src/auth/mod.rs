pub mod api_key;
pub mod gate;
pub mod store;

pub use api_key::{fingerprint, generate_key, AccessLevel, ApiKeyRecord, NewApiKey};
pub use gate::{ApiKeyGate, GateError};
pub use store::{ApiKeyStore, PgApiKeyStore};

/// Request headers that may carry the API key, in lookup order
pub const API_KEY_HEADERS: [&str; 3] = ["api_key", "api-key", "x-api-key"];
