use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::Pool;

use crate::error::DBError;

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Stable identifier, the `sub` of user-bound tokens.
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    /// Disabled accounts cannot authenticate.
    pub is_active: bool,
}

/// Lookup of accounts by id.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Returns the account with the given id.
    ///
    /// # Errors
    /// - [`DBError::NotFound`] if no account has that id
    /// - the store is unreachable
    async fn get_account(&self, id: &str) -> Result<Account, DBError>;
}

#[derive(Clone)]
pub struct PostgresAccountStore {
    pub pool: Pool,
}

impl PostgresAccountStore {
    /// Creates a new `PostgresAccountStore`.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    /// Returns an account from the externally owned `accounts` table.
    ///
    /// # Errors
    /// - not found
    /// - database connection cannot be established
    /// - executing database statement fails
    async fn get_account(&self, id: &str) -> Result<Account, DBError> {
        let client = self.pool.get().await?;

        let stmt = client
            .prepare(
                "SELECT id::text AS id, username, email, is_active FROM accounts WHERE id::text = $1",
            )
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?;
        let Some(row) = row else {
            return Err(DBError::NotFound);
        };

        Ok(Account {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

/// Account store held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: HashMap<String, Account>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }
}

impl FromIterator<Account> for InMemoryAccountStore {
    fn from_iter<T: IntoIterator<Item = Account>>(iter: T) -> Self {
        let mut store = Self::new();
        for account in iter {
            store.insert(account);
        }
        store
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_account(&self, id: &str) -> Result<Account, DBError> {
        self.accounts.get(id).cloned().ok_or(DBError::NotFound)
    }
}
