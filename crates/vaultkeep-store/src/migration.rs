//! Versioned schema migrations.
//!
//! Each [`Migration`] is applied at most once, inside its own transaction, and
//! recorded in the `_migrations` table.  Append new steps to [`MIGRATIONS`];
//! never edit one that has shipped.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "vaults keyed by (owner, number), slot contents as JSON",
    sql: r#"
        CREATE TABLE vaults (
            owner      TEXT NOT NULL,
            number     INTEGER NOT NULL CHECK(number >= 1),
            contents   TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (owner, number)
        );
    "#,
}];

fn failed(version: u32, step: &str) -> impl FnOnce(rusqlite::Error) -> StoreError + '_ {
    move |err| StoreError::Migration {
        version,
        message: format!("{step}: {err}"),
    }
}

/// Bring the schema at `conn` up to date.  Synchronous; run it on the
/// blocking pool.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(failed(0, "creating _migrations"))?;

    let current = current_version(conn)?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(version = current, "schema up to date");
    } else {
        info!(from = current, applied, "schema migrated");
    }
    Ok(())
}

/// Highest applied migration, or 0 on a fresh database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
        row.get(0)
    })
    .map_err(failed(0, "reading schema version"))
}

fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let version = migration.version;
    info!(version, description = migration.description, "applying migration");

    // Rolls back on drop unless committed.
    let tx = conn
        .unchecked_transaction()
        .map_err(failed(version, "begin"))?;
    tx.execute_batch(migration.sql)
        .map_err(failed(version, "executing migration"))?;
    tx.execute(
        "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, migration.description, chrono::Utc::now().timestamp()],
    )
    .map_err(failed(version, "recording migration"))?;
    tx.commit().map_err(failed(version, "commit"))
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LATEST_VERSION: u32 = 1;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[1].version > window[0].version);
        }
    }

    #[test]
    fn rerunning_is_a_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn vaults_table_enforces_key_and_index() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO vaults (owner, number, contents, updated_at) VALUES ('steve', 1, '[]', 0)",
            [],
        )
        .unwrap();

        // Duplicate primary key.
        let duplicate = conn.execute(
            "INSERT INTO vaults (owner, number, contents, updated_at) VALUES ('steve', 1, '[]', 0)",
            [],
        );
        assert!(duplicate.is_err());

        // CHECK(number >= 1).
        let zero = conn.execute(
            "INSERT INTO vaults (owner, number, contents, updated_at) VALUES ('steve', 0, '[]', 0)",
            [],
        );
        assert!(zero.is_err());
    }
}
