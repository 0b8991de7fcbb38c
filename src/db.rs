use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{
    Client, Collection, Database as MongoDatabase, IndexModel,
    bson::{Document, doc, oid::ObjectId},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::CONFIG;
use crate::data_models::ScrapedRecord;
use crate::error::PersistError;

/// Collection names as constants for consistency
pub mod collections {
    pub const SCRAPED_RESULTS: &str = "scraped_results";
}

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Main database wrapper providing connection management and collection access
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    /// Create a new Database instance with custom URI and database name.
    /// Useful for testing with a different database.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client_options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;

        let client =
            Client::with_options(client_options).context("Failed to create MongoDB client")?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        log::info!("Connected to MongoDB database: {}", db_name);

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Create a Database instance using environment configuration
    pub async fn from_config() -> Result<Self> {
        Self::new(&CONFIG.mongo_uri, &CONFIG.mongo_db_name).await
    }

    /// Get a typed collection by name
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.db.collection(name)
    }

    /// Get the underlying MongoDB client (for advanced operations)
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn scraped_results(&self) -> Collection<ScrapedRecord> {
        self.collection(collections::SCRAPED_RESULTS)
    }
}

// =============================================================================
// Generic operations
// =============================================================================

pub struct Repository<T>
where
    T: Send + Sync,
{
    collection: Collection<T>,
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(collection: Collection<T>) -> Self {
        Self { collection }
    }

    pub async fn insert(&self, doc: &T) -> Result<(), mongodb::error::Error> {
        self.collection.insert_one(doc).await?;
        Ok(())
    }

    /// Find all documents matching a filter, at most `limit` when given
    pub async fn find(
        &self,
        filter: Document,
        limit: Option<i64>,
    ) -> Result<Vec<T>, mongodb::error::Error> {
        use futures::TryStreamExt;

        let mut find = self.collection.find(filter).sort(doc! { "_id": 1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        find.await?.try_collect().await
    }

    pub async fn count(&self, filter: Document) -> Result<u64, mongodb::error::Error> {
        self.collection.count_documents(filter).await
    }

    pub async fn exists(&self, filter: Document) -> Result<bool, mongodb::error::Error> {
        Ok(self.count(filter).await? > 0)
    }
}

// =============================================================================
// Durable record store
// =============================================================================

/// Result of an insert against the unique URL constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(ObjectId),
    /// Another writer already persisted this URL.
    Duplicate,
}

/// Durable, append-only storage of scraped records. `url` is unique.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &ScrapedRecord) -> Result<InsertOutcome, PersistError>;

    async fn url_exists(&self, url: &str) -> Result<bool, PersistError>;

    /// The subset of `urls` that already have a record, in one round trip.
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, PersistError>;

    /// Records whose query contains `query`, case-insensitively, oldest first.
    async fn find_by_query(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ScrapedRecord>, PersistError>;
}

pub struct ScrapedRecordRepo {
    repo: Repository<ScrapedRecord>,
}

impl ScrapedRecordRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db.scraped_results()),
        }
    }

    /// Creates the unique URL index and the query index if they are missing.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let url_index = IndexModel::builder()
            .keys(doc! { "url": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let query_index = IndexModel::builder().keys(doc! { "query": 1 }).build();

        self.repo
            .collection
            .create_indexes([url_index, query_index])
            .await
            .context("Failed to create scraped_results indexes")?;
        Ok(())
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl RecordStore for ScrapedRecordRepo {
    async fn insert(&self, record: &ScrapedRecord) -> Result<InsertOutcome, PersistError> {
        match self.repo.insert(record).await {
            Ok(()) => Ok(InsertOutcome::Inserted(record.id)),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn url_exists(&self, url: &str) -> Result<bool, PersistError> {
        Ok(self.repo.exists(doc! { "url": url }).await?)
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, PersistError> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }
        let found = self
            .repo
            .find(doc! { "url": { "$in": urls.to_vec() } }, None)
            .await?;
        Ok(found.into_iter().map(|r| r.url).collect())
    }

    async fn find_by_query(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ScrapedRecord>, PersistError> {
        let filter = doc! {
            "query": { "$regex": regex::escape(query), "$options": "i" }
        };
        Ok(self.repo.find(filter, limit).await?)
    }
}

/// In-process store keyed by URL. Used by tests and for running without MongoDB.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, ScrapedRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<ScrapedRecord> {
        self.records.get(url).map(|r| r.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &ScrapedRecord) -> Result<InsertOutcome, PersistError> {
        match self.records.entry(record.url.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted(record.id))
            }
        }
    }

    async fn url_exists(&self, url: &str) -> Result<bool, PersistError> {
        Ok(self.records.contains_key(url))
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, PersistError> {
        Ok(urls
            .iter()
            .filter(|u| self.records.contains_key(u.as_str()))
            .cloned()
            .collect())
    }

    async fn find_by_query(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ScrapedRecord>, PersistError> {
        let needle = query.to_lowercase();
        let mut found: Vec<ScrapedRecord> = self
            .records
            .iter()
            .filter(|r| r.query.to_lowercase().contains(&needle))
            .map(|r| r.clone())
            .collect();
        found.sort_by_key(|r| r.id);
        if let Some(limit) = limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }
}

// =============================================================================
// Test utilities
// =============================================================================
