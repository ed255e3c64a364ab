//! Persistent state (SQLite via sqlx): the discovery cache and account records.
//!
//! Both stores share one `StateDb` pool under the XDG state directory.

mod accounts;
mod db;
mod store;

pub use accounts::{AccountRecord, AccountStore};
pub use db::StateDb;
pub use store::CacheStore;

#[cfg(test)]
pub(crate) use db::open_memory;
