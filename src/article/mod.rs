//! RFC 5536 article format: parsing, normalization and wire serialization

mod parsing;
mod types;

pub use parsing::{Rejection, parse_article};
pub use types::{Article, HeaderMap};
