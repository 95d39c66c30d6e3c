//! Raw row types for the storage tables.

use rusqlite::Row;

/// A catalog row exactly as stored: genres as one comma-delimited string,
/// rating/platform in whatever case they were written with.
#[derive(Debug, Clone)]
pub struct StoredGame {
    pub name: String,
    pub source_b64: String,
    pub downloads: i64,
    pub genres: String,
    pub url: String,
    pub screenshots_url: String,
    pub description: String,
    pub rating: String,
    pub platform: String,
    pub added_at: i64,
    pub in_package_manager: bool,
}

impl StoredGame {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            source_b64: row.get(1)?,
            downloads: row.get(2)?,
            genres: row.get(3)?,
            url: row.get(4)?,
            screenshots_url: row.get(5)?,
            description: row.get(6)?,
            rating: row.get(7)?,
            platform: row.get(8)?,
            added_at: row.get(9)?,
            in_package_manager: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub username: String,
    pub password_hash: String,
    pub hash_algorithm: String,
    pub rehash_count: u32,
    pub removable: bool,
}

impl StoredAccount {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get(0)?,
            password_hash: row.get(1)?,
            hash_algorithm: row.get(2)?,
            rehash_count: row.get(3)?,
            removable: row.get(4)?,
        })
    }
}
