#![doc = include_str!("../README.md")]

/// RFC 5536 article format: parsing, normalization and serialization
pub mod article;
/// Password hashing and constant-time verification
pub mod auth;
mod commands;
mod config;
mod error;
/// NNTP response codes
pub mod response;
mod server;
mod session;
/// Storage contract and the in-memory backend
pub mod store;
/// RFC 5536 header validation helpers
pub mod validation;
/// Wildmat pattern matching (RFC 3977 Section 4)
pub mod wildmat;

pub use article::{Article, HeaderMap, Rejection, parse_article};
pub use config::{Config, Endpoint, Security, TlsMaterial};
pub use error::{NntpError, Result};
pub use response::codes;
pub use server::{ConnectionInfo, Server, ServerHandle};
pub use store::{
    ArticleFilter, CapabilitySet, Catalog, Identity, Located, MemoryStore, Peer, Placement,
    PostOutcome, PostReceipt, PostRejection, PostSource, Store, StoreError,
};
pub use wildmat::Wildmat;
