//! Table setup for the client registry.
//!
//! The `users` table may be created by an external tool; [`ensure`] only
//! fills in what is missing. Uniqueness of `users.uuid` is enforced by the
//! `idx_users_uuid` index, so a bare `users(uuid TEXT)` table created
//! elsewhere also rejects duplicate registrations once this has run.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};

/// Statements applied by [`ensure`], in order.
const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        uuid TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_users_uuid ON users(uuid);
"#;

/// Create the `users` table and its unique index if they do not exist.
///
/// Runs inside a single transaction. Fails with [`StoreError::Schema`] if
/// the existing table already holds duplicate identifiers.
pub fn ensure(conn: &Connection) -> StoreResult<()> {
    // `conn.transaction()` needs `&mut Connection`, so the transaction is
    // managed by hand.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Schema(format!("failed to begin transaction: {e}")))?;

    match conn.execute_batch(SCHEMA_SQL) {
        Ok(()) => {
            commit(conn)?;
            info!("users schema ready");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "schema setup failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
            Err(StoreError::Schema(e.to_string()))
        }
    }
}

/// Commit the open transaction, rolling back if the commit is refused so
/// the connection is never left mid-transaction.
fn commit(conn: &Connection) -> StoreResult<()> {
    if let Err(e) = conn.execute_batch("COMMIT;") {
        warn!(error = %e, "commit failed, rolling back");
        let _ = conn.execute_batch("ROLLBACK;");
        return Err(StoreError::Schema(format!("failed to commit: {e}")));
    }
    Ok(())
}
