// handlers/mod.rs - HTTP handlers
//
// dynamic: the header-driven REST layer over registered modules (/api/:module[/:pk])
pub mod dynamic;

pub use dynamic::{module_request, record_request};
