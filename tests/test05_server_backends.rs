//! Runs against live servers named by `CONDUIT_<BACKEND>_HOST`, `_PORT`, `_DB`, `_USER` and
//! `_PASSWORD` (`BACKEND` is `PG`, `MYSQL` or `MSSQL`). Each test returns early when its
//! host variable is unset.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use sql_conduit::prelude::*;
use tokio::runtime::Runtime;

fn server_config(prefix: &str, kind: BackendKind) -> Option<ConnectionConfig> {
    let var = |name: &str| std::env::var(format!("CONDUIT_{prefix}_{name}")).ok();
    let host = var("HOST")?;
    let port = var("PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(match kind {
            BackendKind::Postgres => 5432,
            BackendKind::Mssql => 1433,
            _ => 3306,
        });
    let database = var("DB").unwrap_or_else(|| "conduit_test".to_string());
    let user = var("USER").unwrap_or_default();
    let password = var("PASSWORD").unwrap_or_default();
    let config = match kind {
        BackendKind::Postgres => ConnectionConfig::postgres(&host, port, &database, &user, &password),
        BackendKind::Mssql => ConnectionConfig::mssql(&host, port, &database, &user, &password)
            .builder()
            .trust_cert(true)
            .finish(),
        _ => ConnectionConfig::mysql(&host, port, &database, &user, &password),
    };
    Some(config)
}

fn drinks(table: &str) -> TableSchema {
    TableSchema::new(table, &["drinkid"])
        .property("drinkid", ColumnSpec::new(InternalType::Varchar).max_length(32))
        .property("price", ColumnSpec::new(InternalType::Float64))
        .property("label", ColumnSpec::new(InternalType::Varchar).max_length(64))
}

/// Shared scenario: CRUD, transaction atomicity, pool release, bounded streaming.
async fn exercise(mut db: SqlConnector, table: &str) -> Result<(), Box<dyn std::error::Error>> {
    db.try_open().await?;
    let schema = drinks(table);
    let _ = db.execute(&format!("DROP TABLE {table}"), None).await;
    create_table(&db, &schema, None).await?;

    // quoting survives a round trip, and so does text outside the code page
    let tricky = "it's a \\ back'slash\n\t\u{1a}";
    let unicode = "é漢字 Ωμέγα";
    let rows = json!([
        {"drinkid": "D01", "price": 1.99, "label": tricky},
        {"drinkid": "D02", "price": 2.5, "label": "plain"},
        {"drinkid": "D03", "price": 0.5, "label": unicode},
    ]);
    assert_eq!(records_insert(&db, &rows, &schema, None, None).await?, 3);
    let got = table_get(&db, &[json!("D01"), json!("D03")], &schema, None).await?;
    let label = |id: &str| {
        got.iter()
            .find(|row| row.get("drinkid").and_then(RowValues::as_text) == Some(id))
            .and_then(|row| row.get("label").and_then(RowValues::as_text))
            .map(str::to_string)
    };
    assert_eq!(label("D01").as_deref(), Some(tricky));
    assert_eq!(label("D03").as_deref(), Some(unicode));
    let price = got
        .iter()
        .find(|row| row.get("drinkid").and_then(RowValues::as_text) == Some("D01"))
        .and_then(|row| row.get("price").and_then(RowValues::as_float));
    assert_eq!(price, Some(1.99));

    // rollback hides, commit shows; the pool gets its connection back either way
    let before = db.pool_status().ok_or("closed")?;
    let mut tx = db.trans_begin(None).await?;
    db.trans_act(&mut tx, &format!("DELETE FROM {table}"), None).await?;
    assert!(db.trans_rollback(tx, None).await);
    assert_eq!(
        count_rows(&db, table, "drinkid", &RowValues::Text("D02".into()), false).await,
        1
    );
    let mut tx = db.trans_begin(None).await?;
    record_update((&db, &mut tx), &json!({"drinkid": "D02", "price": 3}), &schema, &json!("D02"), None)
        .await?;
    assert!(db.trans_commit(tx, None).await);
    let after = db.pool_status().ok_or("closed")?;
    assert_eq!(after.connections - after.idle_connections, before.connections - before.idle_connections);

    // bounded stream over a few thousand generated rows
    let many: Vec<_> = (0..1_500)
        .map(|i| json!({"drinkid": format!("S{i:05}"), "price": i}))
        .collect();
    let mut tx = db.trans_begin(None).await?;
    records_insert((&db, &mut tx), &json!(many), &schema, None, None).await?;
    assert!(db.trans_commit(tx, None).await);

    let mut stream = db
        .try_stream_query(&format!("SELECT drinkid, price FROM {table}"), true, None)
        .await?;
    let mut consumed = 0;
    while consumed < 300 {
        stream.next().await.ok_or("ended early")??;
        consumed += 1;
        if consumed % 100 == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(stream.rows_fetched() <= consumed + PREFETCH_WINDOW + 1);
        }
    }
    drop(stream);

    let _ = db.execute(&format!("DROP TABLE {table}"), None).await;
    db.close().await;
    Ok(())
}

#[cfg(feature = "postgres")]
#[test]
fn postgres_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = server_config("PG", BackendKind::Postgres) else {
        return Ok(());
    };
    let rt = Runtime::new()?;
    rt.block_on(exercise(SqlConnector::new(config), "conduit_drinks"))
}

#[cfg(feature = "postgres")]
#[test]
fn postgres_commit_after_failed_statement_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = server_config("PG", BackendKind::Postgres) else {
        return Ok(());
    };
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut db = SqlConnector::new(config);
        db.try_open().await?;
        let _ = db.execute("DROP TABLE conduit_ledger", None).await;
        db.try_execute("CREATE TABLE conduit_ledger (id int PRIMARY KEY)", None)
            .await?;

        let mut tx = db.trans_begin(None).await?;
        db.trans_act(&mut tx, "INSERT INTO conduit_ledger VALUES (1)", None).await?;
        let err = db
            .trans_act(&mut tx, "INSERT INTO conduit_ledger VALUES (1)", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlConduitError::TransactionActError(_)));

        // the server turns this COMMIT into a rollback
        let err = db.try_trans_commit(tx, None).await.unwrap_err();
        assert!(matches!(err, SqlConduitError::TransactionCommitError(_)));
        assert_eq!(
            count_rows(&db, "conduit_ledger", "id", &RowValues::Int(1), false).await,
            0
        );

        // the next transaction on the same pool starts clean
        let mut tx = db.trans_begin(None).await?;
        db.trans_act(&mut tx, "INSERT INTO conduit_ledger VALUES (2)", None).await?;
        assert!(db.trans_commit(tx, None).await);
        assert_eq!(
            count_rows(&db, "conduit_ledger", "id", &RowValues::Int(2), false).await,
            1
        );

        let _ = db.execute("DROP TABLE conduit_ledger", None).await;
        db.close().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[cfg(feature = "mysql")]
#[test]
fn mysql_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = server_config("MYSQL", BackendKind::Mysql) else {
        return Ok(());
    };
    let rt = Runtime::new()?;
    rt.block_on(exercise(SqlConnector::new(config), "conduit_drinks"))
}

#[cfg(feature = "mssql")]
#[test]
fn mssql_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = server_config("MSSQL", BackendKind::Mssql) else {
        return Ok(());
    };
    let rt = Runtime::new()?;
    rt.block_on(exercise(SqlConnector::new(config), "conduit_drinks"))
}
