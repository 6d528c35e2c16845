//! Query tokenization and parameter name parsing.

pub mod escape;
mod name;
mod token;

pub use name::{NameParser, ParsedName, is_has_key};
pub use token::{RawParameter, RawQuery, RepetitionGroup};
