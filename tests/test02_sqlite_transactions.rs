#![cfg(feature = "sqlite")]

use std::time::Duration;

use sql_conduit::prelude::*;
use tempfile::{TempDir, tempdir};
use tokio::runtime::Runtime;

async fn open_with_table(dir: &TempDir, name: &str) -> Result<SqlConnector, SqlConduitError> {
    let path = dir.path().join(name).to_string_lossy().into_owned();
    let mut db = SqlConnector::new(ConnectionConfig::sqlite(&path));
    db.try_open().await?;
    db.try_execute("CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL)", None)
        .await?;
    Ok(db)
}

async fn count(db: &SqlConnector) -> Result<i64, SqlConduitError> {
    let rows = db.try_query("SELECT COUNT(*) AS n FROM ledger", None).await?;
    Ok(rows.results[0].get("n").and_then(RowValues::as_int).copied().unwrap_or(-1))
}

/// Wait for a background rollback to hand its connection back.
async fn idle_settles(db: &SqlConnector, expected: u32) -> bool {
    for _ in 0..50 {
        if db.pool_status().is_some_and(|s| s.idle_connections == expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[test]
fn commit_makes_every_statement_visible() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let db = open_with_table(&dir, "commit.db").await?;

        let mut tx = db.trans_begin(Some("t-1")).await?;
        assert_eq!(tx.state(), TransactionState::Active);
        assert_eq!(tx.kind(), BackendKind::Sqlite);
        db.trans_act(&mut tx, "INSERT INTO ledger VALUES (1, 10)", None).await?;
        db.trans_act(&mut tx, "INSERT INTO ledger VALUES (2, 20)", None).await?;
        let inside = db.trans_query(&mut tx, "SELECT SUM(amount) AS s FROM ledger", None).await?;
        assert_eq!(inside.results[0].get("s"), Some(&RowValues::Int(30)));

        assert_eq!(db.try_trans_commit(tx, Some("t-1")).await?, TransactionState::Committed);
        assert_eq!(count(&db).await?, 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn rollback_discards_every_statement() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let db = open_with_table(&dir, "rollback.db").await?;

        let mut tx = db.trans_begin(None).await?;
        db.trans_act(&mut tx, "INSERT INTO ledger VALUES (1, 10)", None).await?;
        db.trans_act(&mut tx, "INSERT INTO ledger VALUES (2, 20)", None).await?;
        assert!(db.trans_rollback(tx, None).await);
        assert_eq!(count(&db).await?, 0);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn failed_statement_leaves_transaction_for_caller() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let db = open_with_table(&dir, "act_error.db").await?;
        let before = db.pool_status().ok_or("closed")?;

        let mut tx = db.trans_begin(None).await?;
        db.trans_act(&mut tx, "INSERT INTO ledger VALUES (1, 10)", None).await?;
        let err = db
            .trans_act(&mut tx, "INSERT INTO ledger VALUES (1, 99)", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlConduitError::TransactionActError(_)));
        assert_eq!(tx.state(), TransactionState::Active);

        assert!(db.trans_rollback(tx, None).await);
        assert_eq!(count(&db).await?, 0);
        // the connection went back to the pool
        assert_eq!(db.pool_status().ok_or("closed")?, before);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn commit_and_rollback_release_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let db = open_with_table(&dir, "release.db").await?;
        let before = db.pool_status().ok_or("closed")?;

        for round in 0..5 {
            let mut tx = db.trans_begin(None).await?;
            let during = db.pool_status().ok_or("closed")?;
            assert!(during.idle_connections < before.idle_connections || before.idle_connections == 0);
            db.trans_act(&mut tx, &format!("INSERT INTO ledger VALUES ({round}, 1)"), None)
                .await?;
            if round % 2 == 0 {
                assert!(db.trans_commit(tx, None).await);
            } else {
                assert!(db.trans_rollback(tx, None).await);
            }
            let after = db.pool_status().ok_or("closed")?;
            assert_eq!(after.idle_connections, after.connections);
        }
        assert_eq!(count(&db).await?, 3);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn dropped_handle_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let db = open_with_table(&dir, "dropped.db").await?;

        {
            let mut tx = db.trans_begin(None).await?;
            db.trans_act(&mut tx, "INSERT INTO ledger VALUES (1, 10)", None).await?;
            // no commit, no rollback
        }
        let status = db.pool_status().ok_or("closed")?;
        assert!(idle_settles(&db, status.connections).await);
        assert_eq!(count(&db).await?, 0);

        // the returned connection is usable for a new transaction
        let mut tx = db.trans_begin(None).await?;
        db.trans_act(&mut tx, "INSERT INTO ledger VALUES (2, 20)", None).await?;
        assert!(db.trans_commit(tx, None).await);
        assert_eq!(count(&db).await?, 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn handle_from_another_connector_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let first = open_with_table(&dir, "first.db").await?;
        let second = open_with_table(&dir, "second.db").await?;

        let mut tx = first.trans_begin(None).await?;
        first.trans_act(&mut tx, "INSERT INTO ledger VALUES (1, 10)", None).await?;
        let err = second
            .trans_act(&mut tx, "INSERT INTO ledger VALUES (2, 20)", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlConduitError::HandleMismatch(_)));

        // committing through the wrong connector never commits
        assert!(!second.trans_commit(tx, None).await);
        let status = first.pool_status().ok_or("closed")?;
        assert!(idle_settles(&first, status.connections).await);
        assert_eq!(count(&first).await?, 0);
        assert_eq!(count(&second).await?, 0);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn crud_inside_a_transaction_is_atomic() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let db = open_with_table(&dir, "crud_tx.db").await?;
        let schema = TableSchema::new("ledger", &["id"])
            .property("id", ColumnSpec::new(InternalType::Int64))
            .property("amount", ColumnSpec::new(InternalType::Int64).not_null());

        let mut tx = db.trans_begin(None).await?;
        let rows = serde_json::json!([{"id": 1, "amount": 5}, {"id": 2, "amount": 6}]);
        let inserted = records_insert((&db, &mut tx), &rows, &schema, None, None).await?;
        assert_eq!(inserted, 2);
        assert!(db.trans_rollback(tx, None).await);
        assert_eq!(count(&db).await?, 0);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}
