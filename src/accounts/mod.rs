//! Maintainer accounts and credential verification.
//!
//! Every operation re-reads the credential store; nothing is cached in
//! process memory, so concurrent edits cannot leave a stale copy behind.

pub mod algo;

pub use algo::HashAlgorithm;

use crate::error::DepotError;
use crate::storage::models::StoredAccount;
use crate::storage::Storage;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use subtle::ConstantTimeEq;

/// A maintainer account as held in the credential store.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub algorithm: HashAlgorithm,
    pub rehash_count: u32,
    pub removable: bool,
}

impl TryFrom<StoredAccount> for Account {
    type Error = DepotError;

    fn try_from(row: StoredAccount) -> Result<Self, DepotError> {
        let algorithm = HashAlgorithm::from_name(&row.hash_algorithm).ok_or_else(|| {
            DepotError::Internal(format!(
                "account {} uses unknown hash algorithm {}",
                row.username, row.hash_algorithm
            ))
        })?;
        Ok(Self {
            username: row.username,
            password_hash: row.password_hash,
            algorithm,
            rehash_count: row.rehash_count,
            removable: row.removable,
        })
    }
}

/// Account metadata safe to show other maintainers. Hashes stay in the
/// store.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub username: String,
    pub hash_algorithm: &'static str,
    pub rehash_count: u32,
    pub removable: bool,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            hash_algorithm: account.algorithm.name(),
            rehash_count: account.rehash_count,
            removable: account.removable,
        }
    }
}

/// Fields collected when provisioning a maintainer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub confirm: String,
    pub algorithm: HashAlgorithm,
    pub rehash_count: u32,
    pub removable: bool,
}

#[derive(Clone)]
pub struct Accounts {
    storage: Storage,
}

impl Accounts {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn load(conn: &Connection, username: &str) -> Result<Option<Account>, DepotError> {
        let row = conn
            .query_row(
                "SELECT username, password_hash, hash_algorithm, rehash_count, removable
                 FROM accounts WHERE username = ?1",
                [username],
                StoredAccount::from_row,
            )
            .optional()?;
        row.map(Account::try_from).transpose()
    }

    /// Verify a submitted password against the account's own scheme. The
    /// stored algorithm and iteration count drive the derivation; there is
    /// no global default. Unknown usernames and wrong passwords produce
    /// the same error.
    pub fn verify(&self, username: &str, password: &str) -> Result<Account, DepotError> {
        let account = {
            let conn = self.storage.conn()?;
            Self::load(&conn, username)?.ok_or_else(bad_credentials)?
        };
        let derived = account.algorithm.chain(password, account.rehash_count);
        if bool::from(derived.as_bytes().ct_eq(account.password_hash.as_bytes())) {
            Ok(account)
        } else {
            Err(bad_credentials())
        }
    }

    pub fn provision(&self, req: NewAccount) -> Result<Account, DepotError> {
        if req.username.trim().is_empty() {
            return Err(DepotError::Validation("username must not be empty".into()));
        }
        if req.password.is_empty() {
            return Err(DepotError::Validation("password must not be empty".into()));
        }
        if req.rehash_count == 0 {
            return Err(DepotError::Validation(
                "rehash count must be at least 1".into(),
            ));
        }
        if req.password != req.confirm {
            return Err(DepotError::Mismatch);
        }

        let mut conn = self.storage.conn()?;
        let tx = conn.transaction()?;
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1)",
            [&req.username],
            |row| row.get(0),
        )?;
        if taken {
            return Err(DepotError::Conflict(format!(
                "username {} is taken",
                req.username
            )));
        }

        let account = Account {
            password_hash: req.algorithm.chain(&req.password, req.rehash_count),
            username: req.username,
            algorithm: req.algorithm,
            rehash_count: req.rehash_count,
            removable: req.removable,
        };
        tx.execute(
            "INSERT INTO accounts (username, password_hash, hash_algorithm, rehash_count, removable)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                account.username,
                account.password_hash,
                account.algorithm.name(),
                account.rehash_count,
                account.removable,
            ],
        )?;
        tx.commit()?;
        Ok(account)
    }

    /// Rotate credentials. Changing the digest scheme requires supplying a
    /// new password; an empty password with an unchanged scheme leaves the
    /// stored hash as it is.
    pub fn rotate(
        &self,
        username: &str,
        new_password: &str,
        confirm: &str,
        algorithm: HashAlgorithm,
        rehash_count: u32,
    ) -> Result<Account, DepotError> {
        if new_password != confirm {
            return Err(DepotError::Mismatch);
        }

        let conn = self.storage.conn()?;
        let current = Self::load(&conn, username)?
            .ok_or_else(|| DepotError::NotFound(format!("no account named {}", username)))?;

        let scheme_changed =
            algorithm != current.algorithm || rehash_count != current.rehash_count;
        if new_password.is_empty() {
            if scheme_changed {
                return Err(DepotError::InvalidRequest(
                    "changing hash settings requires a new password".into(),
                ));
            }
            return Ok(current);
        }
        if rehash_count == 0 {
            return Err(DepotError::Validation(
                "rehash count must be at least 1".into(),
            ));
        }

        let password_hash = algorithm.chain(new_password, rehash_count);
        conn.execute(
            "UPDATE accounts SET password_hash = ?1, hash_algorithm = ?2, rehash_count = ?3
             WHERE username = ?4",
            rusqlite::params![password_hash, algorithm.name(), rehash_count, username],
        )?;
        Ok(Account {
            username: username.to_owned(),
            password_hash,
            algorithm,
            rehash_count,
            removable: current.removable,
        })
    }

    /// Delete an account. The removable flag is enforced: the bootstrap
    /// maintainer cannot be deleted through this flow.
    pub fn remove(&self, username: &str) -> Result<(), DepotError> {
        let conn = self.storage.conn()?;
        let account = Self::load(&conn, username)?
            .ok_or_else(|| DepotError::NotFound(format!("no account named {}", username)))?;
        if !account.removable {
            return Err(DepotError::InvalidRequest(format!(
                "account {} is not removable",
                username
            )));
        }
        conn.execute("DELETE FROM accounts WHERE username = ?1", [username])?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<AccountInfo>, DepotError> {
        let conn = self.storage.conn()?;
        let mut stmt = conn.prepare(
            "SELECT username, password_hash, hash_algorithm, rehash_count, removable
             FROM accounts ORDER BY username",
        )?;
        let rows = stmt
            .query_map([], StoredAccount::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|row| Account::try_from(row).map(|a| AccountInfo::from(&a)))
            .collect()
    }

    pub fn count(&self) -> Result<i64, DepotError> {
        let conn = self.storage.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn bad_credentials() -> DepotError {
    DepotError::Unauthorized("unknown username or wrong password".into())
}
