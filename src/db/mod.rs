//! Database module: models, schema and queries for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pool setup and account queries
//! - `restaurants.rs`, `bookmarks.rs`: per-table queries
//! - `merge.rs`: statements run inside an account-merge transaction

pub mod bookmarks;
pub mod merge;
pub mod models;
pub mod restaurants;
pub mod schema;
pub mod sqlite;

pub use merge::BookmarkMoves;
pub use models::{DbAccount, DbBookmark, DbRestaurant};
pub use schema::SQLITE_INIT;
pub use sqlite::{ChowStorage, SqlitePool};
