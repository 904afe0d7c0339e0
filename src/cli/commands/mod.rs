pub mod keys;
pub mod modules;
pub mod schema;
