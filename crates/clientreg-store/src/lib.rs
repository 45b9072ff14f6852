//! # clientreg-store
//!
//! Storage core for clientreg.
//!
//! Provides a single-connection SQLite [`Store`] with an async,
//! parameterized query surface, and a [`ClientRegistry`] that generates
//! client identifiers and records them in the `users(uuid)` table.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  ClientRegistry (register / exists)     │
//! ├─────────────────────────────────────────┤
//! │  Store (open / close / scope,           │
//! │         execute / fetch_one / fetch_all)│
//! ├─────────────────────────────────────────┤
//! │  rusqlite Connection (spawn_blocking)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use clientreg_store::{ClientRegistry, Store, generate_client_id};
//!
//! let store = Store::file("data/clientreg.db");
//! let id = generate_client_id();
//! store
//!     .scope(|store| async move {
//!         store.ensure_schema().await?;
//!         let registry = ClientRegistry::new(store);
//!         registry.register(id.as_str()).await?;
//!         registry.exists(id.as_str()).await
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod schema;
pub mod store;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use registry::{ClientId, ClientRecord, ClientRegistry, Lookup, generate_client_id};
pub use store::{FromRow, Params, Store};
