//! Public surface for the `kinship-node` crate.
//!
//! Exposes the router builder, config, storage and credential types so that
//! external crates (e.g. the conformance test suite) can spin up an
//! in-process node without spawning a subprocess.

pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod passwords;
pub mod router;
pub mod social;
pub mod storage;

pub use config::NodeConfig;
pub use credentials::{CredentialIssuer, SignedTokenIssuer};
pub use passwords::Passwords;
pub use router::build_router;
pub use social::SocialGraph;
pub use storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage};
