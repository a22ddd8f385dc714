use crate::error::AppError;

use super::{types::run_state::RunState, vector_index::COLLECTION_REGISTRY_TABLE};
use std::ops::Deref;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// # Initialize a new database client
    ///
    /// # Arguments
    /// * `address` - A SurrealDB server endpoint, e.g. `ws://localhost:8000`
    ///
    /// # Returns
    /// * `SurrealDbClient` initialized
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        db.signin(Root { username, password }).await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Defines the bookkeeping tables shared by every collection.
    pub async fn ensure_initialized(&self) -> Result<(), AppError> {
        let res = self
            .client
            .query(format!(
                "DEFINE TABLE IF NOT EXISTS {COLLECTION_REGISTRY_TABLE} SCHEMALESS;
                 DEFINE TABLE IF NOT EXISTS {} SCHEMALESS;",
                RunState::TABLE
            ))
            .await?;
        res.check()?;
        Ok(())
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}
