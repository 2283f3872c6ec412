//! Character catalogue: domain types and the HTTP remote source.

mod api_types;
mod cache;
mod client;
mod types;

pub use cache::namespace_for;
pub use client::HttpCharacterSource;
pub use types::Character;
