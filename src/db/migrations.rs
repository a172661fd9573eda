use color_eyre::Result;
use libsql::params;

use super::helpers::query_i64;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "V1",
        sql: include_str!("../../migrations/V1__init.sql"),
    },
    Migration {
        version: "V2",
        sql: include_str!("../../migrations/V2__achievements.sql"),
    },
    Migration {
        version: "V3",
        sql: include_str!("../../migrations/V3__multiplayer.sql"),
    },
    Migration {
        version: "V4",
        sql: include_str!("../../migrations/V4__daily_challenge.sql"),
    },
];

pub async fn run(conn: &libsql::Connection) -> Result<()> {
    apply(conn, MIGRATIONS).await
}

/// Applies every pending migration in order. Each one commits together with
/// its `schema_migrations` row or not at all.
async fn apply(conn: &libsql::Connection, migrations: &[Migration]) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        (),
    )
    .await?;

    for migration in migrations {
        if is_applied(conn, migration.version).await? {
            continue;
        }

        let tx = conn.transaction().await?;
        let applied = async {
            tx.execute_batch(migration.sql).await?;
            tx.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )
            .await?;
            Ok::<_, libsql::Error>(())
        }
        .await;

        if let Err(e) = applied {
            tx.rollback().await?;
            tracing::error!(version = migration.version, "database migration failed: {e}");
            return Err(e.into());
        }
        tx.commit().await?;

        tracing::info!(version = migration.version, "applied database migration");
    }

    Ok(())
}

pub async fn is_applied(conn: &libsql::Connection, version: &str) -> Result<bool> {
    let count = query_i64(
        conn,
        "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
        params![version],
    )
    .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> libsql::Connection {
        libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap()
    }

    async fn table_exists(conn: &libsql::Connection, name: &str) -> bool {
        query_i64(
            conn,
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![name],
        )
        .await
        .unwrap()
            > 0
    }

    #[tokio::test]
    async fn failed_migration_leaves_nothing_behind() {
        let conn = memory().await;
        let migrations = [
            Migration {
                version: "T1",
                sql: "CREATE TABLE first (id INTEGER PRIMARY KEY);",
            },
            Migration {
                version: "T2",
                sql: "CREATE TABLE second (id INTEGER PRIMARY KEY); \
                      INSERT INTO no_such_table VALUES (1);",
            },
        ];

        assert!(apply(&conn, &migrations).await.is_err());

        assert!(is_applied(&conn, "T1").await.unwrap());
        assert!(table_exists(&conn, "first").await);
        assert!(!is_applied(&conn, "T2").await.unwrap());
        assert!(!table_exists(&conn, "second").await);
    }

    #[tokio::test]
    async fn applied_migrations_are_skipped() {
        let conn = memory().await;
        let migrations = [Migration {
            version: "T1",
            sql: "CREATE TABLE once (id INTEGER PRIMARY KEY);",
        }];

        apply(&conn, &migrations).await.unwrap();
        // Re-running would fail on the existing table if it were not skipped.
        apply(&conn, &migrations).await.unwrap();
        assert!(table_exists(&conn, "once").await);
    }
}
