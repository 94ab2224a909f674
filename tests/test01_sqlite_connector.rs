#![cfg(feature = "sqlite")]

use sql_conduit::prelude::*;
use tempfile::{TempDir, tempdir};
use tokio::runtime::Runtime;

fn db_in(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn open_query_execute_close() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let mut db = SqlConnector::new(ConnectionConfig::sqlite(&db_in(&dir, "basic.db")));
        assert_eq!(db.state(), ConnectorState::Closed);
        assert!(db.open().await);
        assert_eq!(db.state(), ConnectorState::Open);
        // second open is a no-op
        assert!(db.open().await);

        assert_eq!(
            db.execute(
                "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, data BLOB)",
                Some("req-1"),
            )
            .await,
            0
        );
        assert_eq!(
            db.execute(
                "INSERT INTO items VALUES (1, 'alpha', 1.5, x'0102'), (2, NULL, 2.0, NULL)",
                None,
            )
            .await,
            2
        );

        let rows = db.query("SELECT id, name, price, data FROM items ORDER BY id", None).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.results[0].get("id"), Some(&RowValues::Int(1)));
        assert_eq!(rows.results[0].get("name"), Some(&RowValues::Text("alpha".into())));
        assert_eq!(rows.results[0].get("price"), Some(&RowValues::Float(1.5)));
        assert_eq!(rows.results[0].get("data"), Some(&RowValues::Blob(vec![1, 2])));
        assert_eq!(rows.results[1].get("name"), Some(&RowValues::Null));

        assert_eq!(db.execute("UPDATE items SET price = price * 2", None).await, 2);

        db.close().await;
        assert_eq!(db.state(), ConnectorState::Closed);
        assert!(db.query("SELECT 1", None).await.is_empty());
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn failures_are_sentinels() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let mut db = SqlConnector::new(ConnectionConfig::sqlite(&db_in(&dir, "fail.db")));
        assert!(db.open().await);

        assert!(db.query("SELECT * FROM missing_table", Some("r-9")).await.is_empty());
        assert_eq!(db.execute("INSERT INTO missing_table VALUES (1)", None).await, -1);
        assert!(db.stream_query("SELECT * FROM missing_table", true, None).await.is_none());

        let err = db.try_query("SELEC 1", None).await.unwrap_err();
        assert!(matches!(err, SqlConduitError::SqliteError(_)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn credentials_are_gone_after_open() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let mut db = SqlConnector::new(ConnectionConfig::sqlite(&db_in(&dir, "once.db")));
        db.try_open().await?;
        db.close().await;
        // the parameters were consumed by the first open
        assert!(matches!(db.try_open().await, Err(SqlConduitError::ConfigMissing)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn failed_open_can_be_retried() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let missing = dir.path().join("no-such-dir").join("x.db");
        let mut db = SqlConnector::new(ConnectionConfig::sqlite(&missing.to_string_lossy()));
        assert!(!db.open().await);
        assert_eq!(db.state(), ConnectorState::Closed);

        std::fs::create_dir_all(dir.path().join("no-such-dir"))?;
        assert!(db.open().await);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn lower_case_names_apply_to_results() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let mut db = SqlConnector::new(
            ConnectionConfig::sqlite(&db_in(&dir, "lower.db"))
                .builder()
                .lower_case_names(true)
                .finish(),
        );
        db.try_open().await?;
        let rows = db.try_query("SELECT 1 AS MixedCase, 'x' AS Other", None).await?;
        let names = rows.get_column_names().map(|n| n.as_slice().to_vec());
        assert_eq!(names, Some(vec!["mixedcase".to_string(), "other".to_string()]));
        assert_eq!(db.enclose("Drinks.Price"), "\"drinks\".\"price\"");
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn config_file_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let path = dir.path().join("conduit.json");
        let db_path = db_in(&dir, "fromfile.db");
        std::fs::write(
            &path,
            serde_json::json!({
                "backend": "sqlite3",
                "connection": {"path": db_path, "maxConnections": 2},
                "tablePrefix": "main."
            })
            .to_string(),
        )?;
        let mut db = SqlConnector::new(ConnectionConfig::from_file(&path)?);
        assert_eq!(db.kind(), BackendKind::Sqlite);
        assert_eq!(db.table_prefix(), Some("main."));
        db.try_open().await?;
        let status = db.pool_status().ok_or("pool status")?;
        assert!(status.connections >= 1 && status.connections <= 2);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

#[test]
fn sanitized_literals_read_back_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let dir = tempdir()?;
        let mut db = SqlConnector::new(ConnectionConfig::sqlite(&db_in(&dir, "literals.db")));
        db.try_open().await?;
        db.try_execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", None)
            .await?;

        let controls: String = ('\u{1}'..='\u{1f}').collect();
        let samples = [
            "O'Brien".to_string(),
            "''".to_string(),
            "a\\b\\".to_string(),
            "\\'".to_string(),
            "line\nbreak\r\ttab".to_string(),
            controls,
            "\u{1a}".to_string(),
            "a\0b\0".to_string(),
            "'; DROP TABLE notes; --".to_string(),
            "é漢字 🍵".to_string(),
        ];
        let sanitizer = db.sanitizer();
        for (id, sample) in samples.iter().enumerate() {
            let literal = sanitizer.sql_string(&RowValues::Text(sample.clone()), false);

            let selected = db.try_query(&format!("SELECT {literal} AS v"), None).await?;
            assert_eq!(
                selected.results[0].get("v").and_then(RowValues::as_text),
                Some(sample.as_str()),
                "select of {literal}"
            );

            db.try_execute(&format!("INSERT INTO notes VALUES ({id}, {literal})"), None)
                .await?;
            let stored = db
                .try_query(&format!("SELECT body FROM notes WHERE id = {id}"), None)
                .await?;
            assert_eq!(
                stored.results[0].get("body").and_then(RowValues::as_text),
                Some(sample.as_str()),
                "stored {literal}"
            );
        }
        let all = db.try_query("SELECT COUNT(*) AS n FROM notes", None).await?;
        assert_eq!(all.results[0].get("n"), Some(&RowValues::Int(i64::try_from(samples.len())?)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}
