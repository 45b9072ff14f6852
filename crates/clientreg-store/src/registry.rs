//! Client identity registry.
//!
//! Hands out random client identifiers and records them in the `users`
//! table. Registration is self-verifying: after the insert, the registry
//! reads the row back and only reports success if it is visible.
//!
//! Lookups come in two flavours. [`ClientRegistry::lookup`] returns a
//! tagged [`Lookup`] that separates "absent" from "query failed".
//! [`ClientRegistry::exists`] keeps the stricter contract embedding
//! servers rely on: it resolves `true` when the client is known and fails
//! with [`StoreError::NotFound`] otherwise, never resolving `false`.

use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{FromRow, Store};

/// Entity name reported in [`StoreError::NotFound`].
const ENTITY: &str = "client";

const SELECT_BY_ID: &str = "SELECT * FROM users WHERE uuid = ?1";
const INSERT: &str = "INSERT INTO users (uuid) VALUES (?1)";

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A freshly generated client identifier.
///
/// Always the 36-character hyphenated form of a random (v4) UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a new client identifier. Pure; performs no I/O.
#[must_use]
pub fn generate_client_id() -> ClientId {
    ClientId::generate()
}

/// A registered client as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// The registered identifier (`users.uuid`).
    pub id: String,
}

impl FromRow for ClientRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("uuid")?,
        })
    }
}

/// Outcome of a registry lookup that completed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The identifier is registered.
    Found(ClientRecord),
    /// No record holds the identifier.
    NotFound,
}

impl Lookup {
    /// Whether the lookup found a record.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Whether `err` is a uniqueness violation. Other constraint failures
/// (CHECK, NOT NULL, FOREIGN KEY) are reported as query errors.
fn is_duplicate_key(err: &rusqlite::ffi::Error) -> bool {
    matches!(
        err.extended_code,
        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

struct Count(i64);

impl FromRow for Count {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self(row.get(0)?))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ClientRegistry
// ═══════════════════════════════════════════════════════════════════════

/// Registration and membership queries over a [`Store`].
///
/// The store must be open while registry methods run; wrap a sequence of
/// calls in [`Store::scope`] to get open/close handled on every path.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    store: Store,
}

impl ClientRegistry {
    /// Create a registry backed by `store`.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The store this registry reads and writes.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Generate a new client identifier.
    #[must_use]
    pub fn generate_client_id() -> ClientId {
        ClientId::generate()
    }

    /// Look up `id`, distinguishing absence from failure.
    #[instrument(skip(self))]
    pub async fn lookup(&self, id: &str) -> StoreResult<Lookup> {
        let record: Option<ClientRecord> = self
            .store
            .fetch_one(SELECT_BY_ID, vec![Value::from(id.to_string())])
            .await?;
        Ok(match record {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        })
    }

    /// Resolve `true` if `id` is registered.
    ///
    /// An unregistered id fails with [`StoreError::NotFound`]; this method
    /// never returns `Ok(false)`. Use [`StoreError::is_not_found`] to tell
    /// absence apart from a failed query, or call [`Self::lookup`].
    #[instrument(skip(self))]
    pub async fn exists(&self, id: &str) -> StoreResult<bool> {
        match self.lookup(id).await? {
            Lookup::Found(_) => Ok(true),
            Lookup::NotFound => Err(StoreError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            }),
        }
    }

    /// Insert `id`, then confirm it can be read back.
    ///
    /// Fails with [`StoreError::AlreadyRegistered`] when the unique index
    /// rejects the insert, and with [`StoreError::Unconfirmed`] when the
    /// insert succeeded but the follow-up read finds nothing.
    #[instrument(skip(self))]
    pub async fn register(&self, id: &str) -> StoreResult<()> {
        let inserted = self
            .store
            .execute(INSERT, vec![Value::from(id.to_string())])
            .await;
        if let Err(StoreError::Query(rusqlite::Error::SqliteFailure(ref err, _))) = inserted
            && is_duplicate_key(err)
        {
            return Err(StoreError::AlreadyRegistered { id: id.to_string() });
        }
        inserted?;

        match self.exists(id).await {
            Ok(_) => {
                debug!(client_id = %id, "client registered");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(StoreError::Unconfirmed { id: id.to_string() }),
            Err(e) => Err(e),
        }
    }

    /// Generate a fresh identifier and register it.
    #[instrument(skip(self))]
    pub async fn register_new(&self) -> StoreResult<ClientId> {
        let id = ClientId::generate();
        self.register(id.as_str()).await?;
        Ok(id)
    }

    /// All registered clients, in insertion order.
    #[instrument(skip(self))]
    pub async fn list(&self) -> StoreResult<Vec<ClientRecord>> {
        self.store
            .fetch_all("SELECT uuid FROM users ORDER BY rowid", vec![])
            .await
    }

    /// Number of registered clients.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        let count: Option<Count> = self
            .store
            .fetch_one("SELECT COUNT(*) FROM users", vec![])
            .await?;
        Ok(count.map(|c| c.0).unwrap_or(0))
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_registry() -> ClientRegistry {
        let store = Store::in_memory();
        store.open().await.unwrap();
        store.ensure_schema().await.unwrap();
        ClientRegistry::new(store)
    }

    #[test]
    fn generated_ids_are_canonical_v4() {
        let id = generate_client_id();
        assert_eq!(id.as_str().len(), 36);
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.hyphenated().to_string(), id.to_string());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ClientRegistry::generate_client_id(), generate_client_id());
    }

    #[tokio::test]
    async fn register_then_exists() {
        let registry = setup_registry().await;
        let id = generate_client_id();

        registry.register(id.as_str()).await.unwrap();
        assert!(registry.exists(id.as_str()).await.unwrap());
        assert_eq!(
            registry.lookup(id.as_str()).await.unwrap(),
            Lookup::Found(ClientRecord {
                id: id.to_string()
            })
        );
    }

    #[tokio::test]
    async fn exists_fails_for_unknown_id() {
        let registry = setup_registry().await;
        let err = registry.exists("nonexistent-id").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            StoreError::NotFound { entity: "client", ref id } if id == "nonexistent-id"
        ));
    }

    #[tokio::test]
    async fn lookup_reports_absence_without_error() {
        let registry = setup_registry().await;
        let result = registry.lookup("nonexistent-id").await.unwrap();
        assert_eq!(result, Lookup::NotFound);
        assert!(!result.is_found());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = setup_registry().await;
        let id = generate_client_id();
        registry.register(id.as_str()).await.unwrap();

        let err = registry.register(id.as_str()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered { .. }));
        assert_eq!(registry.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn register_fails_when_row_is_not_visible() {
        let registry = setup_registry().await;
        // Swallow every insert so the confirmation read finds nothing.
        registry
            .store()
            .execute(
                "CREATE TRIGGER vanish AFTER INSERT ON users BEGIN \
                 DELETE FROM users WHERE uuid = NEW.uuid; END",
                vec![],
            )
            .await
            .unwrap();

        let err = registry.register("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::Unconfirmed { ref id } if id == "ghost"));
    }

    #[tokio::test]
    async fn check_constraint_failure_is_query_error() {
        let store = Store::in_memory();
        store.open().await.unwrap();
        store
            .execute("CREATE TABLE users (uuid TEXT CHECK (length(uuid) = 36))", vec![])
            .await
            .unwrap();
        let registry = ClientRegistry::new(store);

        let err = registry.register("short").await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)), "got {err:?}");
        assert_eq!(registry.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn not_null_failure_is_query_error() {
        let store = Store::in_memory();
        store.open().await.unwrap();
        store
            .execute("CREATE TABLE users (uuid TEXT, label TEXT NOT NULL)", vec![])
            .await
            .unwrap();
        let registry = ClientRegistry::new(store);

        let err = registry.register("id").await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn primary_key_conflict_is_already_registered() {
        let store = Store::in_memory();
        store.open().await.unwrap();
        store
            .execute("CREATE TABLE users (uuid TEXT PRIMARY KEY)", vec![])
            .await
            .unwrap();
        let registry = ClientRegistry::new(store);

        registry.register("id").await.unwrap();
        let err = registry.register("id").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn register_without_table_is_query_error() {
        let store = Store::in_memory();
        store.open().await.unwrap();
        let registry = ClientRegistry::new(store);

        let err = registry.register("id").await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[tokio::test]
    async fn register_on_closed_store_fails() {
        let registry = ClientRegistry::new(Store::in_memory());
        let err = registry.register("id").await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[tokio::test]
    async fn register_new_list_and_count() {
        let registry = setup_registry().await;
        assert!(registry.list().await.unwrap().is_empty());
        assert_eq!(registry.count().await.unwrap(), 0);

        let first = registry.register_new().await.unwrap();
        let second = registry.register_new().await.unwrap();

        let ids: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![first.into_inner(), second.into_inner()]);
        assert_eq!(registry.count().await.unwrap(), 2);
    }
}
