//! SQL DDL for initializing the application store (SQLite).

/// Schema notes:
/// - `accounts.identity` is immutable and referenced by bookmarks and invitees
/// - `accounts.user_name` is UNIQUE but nullable (external stubs have none)
/// - `bookmarks` enforce one row per (owner, restaurant, note)
/// - invitee identities are not foreign keys; a merge rewrites them
/// - timestamps are RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL CHECK (kind IN ('local', 'external')),
    user_name TEXT NULL UNIQUE,
    password_digest TEXT NULL,
    thumbnail_image TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS restaurants (
    restaurant_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT NULL,
    city TEXT NULL,
    state TEXT NULL,
    rating_average REAL NOT NULL DEFAULT -1.0,
    rating_count INTEGER NOT NULL DEFAULT 0,
    url TEXT NULL,
    latitude REAL NULL,
    longitude REAL NULL,
    categories TEXT NOT NULL DEFAULT '[]', -- JSON array
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_identity TEXT NOT NULL REFERENCES accounts(identity),
    restaurant_id TEXT NOT NULL REFERENCES restaurants(restaurant_id),
    note TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (owner_identity, restaurant_id, note)
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_owner_updated ON bookmarks(owner_identity, updated_at);

CREATE TABLE IF NOT EXISTS bookmark_invitees (
    bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
    identity TEXT NOT NULL,
    PRIMARY KEY (bookmark_id, identity)
);

CREATE INDEX IF NOT EXISTS idx_bookmark_invitees_identity ON bookmark_invitees(identity);
"#;
