//! Metadata registry: static mapping from logical module name to table name and enabled verbs.
//!
//! The registry is built once at start-up (built-in set or a YAML file) and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

use crate::types::Verb;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Module API \"{0}\" not found")]
    ModuleNotFound(String),

    #[error("Schema \"{0}\" not found")]
    SchemaNotFound(String),

    #[error("Module \"{0}\" is registered more than once (names are case-insensitive)")]
    DuplicateModule(String),

    #[error("Invalid schema name for module \"{module}\": {schema}")]
    InvalidSchemaName { module: String, schema: String },

    #[error("Failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse registry file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub module_name: String,
    pub schema_name: String,
    pub allowed_verbs: BTreeSet<Verb>,
}

impl ModuleMetadata {
    pub fn new(module_name: &str, schema_name: &str, verbs: &[Verb]) -> Self {
        Self {
            module_name: module_name.to_ascii_lowercase(),
            schema_name: schema_name.to_string(),
            allowed_verbs: verbs.iter().copied().collect(),
        }
    }

    pub fn allows(&self, verb: Verb) -> bool {
        self.allowed_verbs.contains(&verb)
    }
}

/// Shape of the optional registry file:
///
/// ```yaml
/// modules:
///   users:
///     schema: users
///     routes: [GET, POST, PUT, DELETE]
/// ```
#[derive(Debug, Deserialize)]
struct RegistryFile {
    modules: BTreeMap<String, RegistryFileEntry>,
}

#[derive(Debug, Deserialize)]
struct RegistryFileEntry {
    schema: String,
    routes: Vec<Verb>,
}

#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleMetadata>,
}

impl ModuleRegistry {
    /// The modules exposed when no registry file is configured
    pub fn builtin() -> Self {
        let modules = ["users", "avatars", "posts", "messages"]
            .iter()
            .map(|name| (name.to_string(), ModuleMetadata::new(name, name, &Verb::ALL)))
            .collect();
        Self { modules }
    }

    pub fn from_modules(modules: impl IntoIterator<Item = ModuleMetadata>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for module in modules {
            if !is_valid_identifier(&module.schema_name) {
                return Err(RegistryError::InvalidSchemaName {
                    module: module.module_name,
                    schema: module.schema_name,
                });
            }
            let key = module.module_name.to_ascii_lowercase();
            if map.contains_key(&key) {
                return Err(RegistryError::DuplicateModule(key));
            }
            map.insert(key, module);
        }
        Ok(Self { modules: map })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(yaml)?;
        Self::from_modules(
            file.modules
                .into_iter()
                .map(|(name, entry)| ModuleMetadata::new(&name, &entry.schema, &entry.routes)),
        )
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Built-in registry unless a registry file is configured
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self, RegistryError> {
        match config.api.registry_path.as_deref() {
            Some(path) => {
                let registry = Self::from_yaml_file(path)?;
                tracing::info!("Loaded {} modules from registry file {}", registry.modules.len(), path);
                Ok(registry)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn lookup_by_module(&self, name: &str) -> Result<&ModuleMetadata, RegistryError> {
        self.modules
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))
    }

    pub fn lookup_by_schema(&self, schema_name: &str) -> Result<Vec<&ModuleMetadata>, RegistryError> {
        let found: Vec<_> = self
            .modules
            .values()
            .filter(|m| m.schema_name == schema_name)
            .collect();
        if found.is_empty() {
            return Err(RegistryError::SchemaNotFound(schema_name.to_string()));
        }
        Ok(found)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleMetadata> {
        self.modules.values()
    }
}

/// Plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
