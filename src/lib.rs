//! Cache-first paged access to a remote character catalogue.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod paging;
