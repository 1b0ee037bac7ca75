#![cfg(feature = "pool")]

use sqkit::qb::{self, NumberField, StringField};
use sqkit::{
    Dialect, ExecFlags, GenericClient, SqError, SqResult, Table, ensure_tables, exec, exists,
    fetch_all, with_tx,
};
use std::time::{SystemTime, UNIX_EPOCH};

sqkit::table! {
    pub struct Pages("pm_pages") {
        url: StringField [primary_key, not_null],
        content: StringField,
        views: NumberField,
    }
}

fn database_url(test: &str) -> Option<String> {
    let _ = dotenvy::dotenv();
    match std::env::var("DATABASE_URL") {
        Ok(url) if url.starts_with("postgres") => Some(url),
        _ => {
            eprintln!("DATABASE_URL is not a PostgreSQL URL; skipping {test}");
            None
        }
    }
}

fn unique_table() -> Pages {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    Pages::with_name(format!("sqkit_test_pages_{}_{nanos}", std::process::id()), "")
}

#[tokio::test]
async fn postgres_roundtrip() -> SqResult<()> {
    let Some(url) = database_url("postgres_roundtrip") else {
        return Ok(());
    };
    let pool = sqkit::create_pool(&url)?;
    let mut client = pool.get().await?;
    assert_eq!(client.dialect(), Dialect::Postgres);

    let p = unique_table();
    ensure_tables(&client, &[&p]).await?;
    ensure_tables(&client, &[&p]).await?;

    let upsert = |content: &str| {
        qb::insert_into(&p)
            .valuesx(|col| {
                col.set(&p.url, "/a").set(&p.content, content).set(&p.views, 1);
            })
            .on_conflict([&p.url])
            .do_update_set([qb::set_excluded(&p.content)])
    };
    exec(&client, &upsert("hi"), ExecFlags::empty()).await?;
    let result = exec(&client, &upsert("hello"), ExecFlags::ROWS_AFFECTED).await?;
    assert_eq!(result.rows_affected, Some(1));

    let err = exec(&client, &upsert("x"), ExecFlags::LAST_INSERT_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::Unsupported { .. }));

    let rows = fetch_all(&client, &qb::from(&p), |row| {
        Ok((row.string(&p.url)?, row.string(&p.content)?, row.int64(&p.views)?))
    })
    .await?;
    assert_eq!(rows, [("/a".to_string(), "hello".to_string(), 1)]);
    assert!(exists(&client, &qb::from(&p).where_(p.views.eq(1))).await?);
    assert!(!exists(&client, &qb::from(&p).where_(p.views.gt(1))).await?);

    let rolled_back = with_tx(&mut client, |tx| {
        let delete = qb::delete_from(&p);
        Box::pin(async move {
            exec(tx, &delete, ExecFlags::empty()).await?;
            Err::<(), _>(SqError::Other("keep the row".to_string()))
        })
    })
    .await;
    assert!(rolled_back.is_err());
    assert!(exists(&client, &qb::from(&p)).await?);

    let drop = format!("DROP TABLE {}", p.table_info().name);
    exec(&client, &qb::raw(drop), ExecFlags::empty()).await?;
    Ok(())
}

#[tokio::test]
async fn postgres_unique_violation_keeps_identity() -> SqResult<()> {
    let Some(url) = database_url("postgres_unique_violation_keeps_identity") else {
        return Ok(());
    };
    let pool = sqkit::create_pool(&url)?;
    let client = pool.get().await?;

    let p = unique_table();
    ensure_tables(&client, &[&p]).await?;
    let insert = qb::insert_into(&p).valuesx(|col| {
        col.set(&p.url, "/a");
    });
    exec(&client, &insert, ExecFlags::empty()).await?;
    let err = exec(&client, &insert, ExecFlags::empty()).await.unwrap_err();
    assert!(err.is_unique_violation());
    assert!(err.sql().is_some_and(|sql| sql.contains("$1")));

    let drop = format!("DROP TABLE {}", p.table_info().name);
    exec(&client, &qb::raw(drop), ExecFlags::empty()).await?;
    Ok(())
}
