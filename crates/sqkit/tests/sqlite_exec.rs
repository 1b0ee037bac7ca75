use sqkit::qb::{self, BooleanField, NumberField, StringField, case_when, not};
use sqkit::{
    Context, ExecFlags, RowAction, SqResult, SqliteConfig, connect_sqlite, ensure_tables, exec,
    exists, fetch, fetch_all, fetch_context,
};
use sqlx::SqlitePool;

sqkit::table! {
    pub struct Pages("pm_pages") {
        url: StringField [primary_key, not_null],
        content: StringField,
        views: NumberField,
        disabled: BooleanField,
    }
}

async fn setup() -> SqResult<SqlitePool> {
    let pool = connect_sqlite(&SqliteConfig::default()).await?;
    ensure_tables(&pool, &[&Pages::new("")]).await?;
    Ok(pool)
}

async fn seed(pool: &SqlitePool, n: i64) -> SqResult<()> {
    let p = Pages::new("");
    let mut insert = qb::insert_into(&p);
    for i in 0..n {
        insert = insert.valuesx(|col| {
            col.set(&p.url, format!("/{i}"))
                .set(&p.content, format!("page {i}"))
                .set(&p.views, i)
                .set(&p.disabled, false);
        });
    }
    exec(pool, &insert, ExecFlags::empty()).await?;
    Ok(())
}

async fn urls(pool: &SqlitePool, query: &qb::SelectQb, p: &Pages) -> SqResult<Vec<String>> {
    fetch_all(pool, query, |row| row.string(&p.url)).await
}

#[tokio::test]
async fn upsert_twice_keeps_one_row() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("");
    let upsert = qb::insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a").set(&p.content, "hi");
        })
        .on_conflict([&p.url])
        .do_update_set([qb::set_excluded(&p.content)]);

    exec(&pool, &upsert, ExecFlags::empty()).await?;
    exec(&pool, &upsert, ExecFlags::empty()).await?;

    let rows = fetch_all(&pool, &qb::from(&p), |row| {
        Ok((row.string(&p.url)?, row.string(&p.content)?))
    })
    .await?;
    assert_eq!(rows, [("/a".to_string(), "hi".to_string())]);
    Ok(())
}

#[tokio::test]
async fn bulk_valuesx_inserts_every_row() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("");
    let mut insert = qb::insert_into(&p);
    for url in ["/a", "/b", "/c"] {
        insert = insert.valuesx(|col| {
            col.set(&p.url, url).set(&p.views, 1);
        });
    }
    let result = exec(&pool, &insert, ExecFlags::ROWS_AFFECTED).await?;
    assert_eq!(result.rows_affected, Some(3));
    assert_eq!(result.last_insert_id, None);
    Ok(())
}

#[tokio::test]
async fn last_insert_id_on_sqlite() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("");
    let mut ids = Vec::new();
    for url in ["/a", "/b"] {
        let insert = qb::insert_into(&p).valuesx(|col| {
            col.set(&p.url, url);
        });
        let result = exec(&pool, &insert, ExecFlags::LAST_INSERT_ID).await?;
        assert_eq!(result.rows_affected, None);
        ids.extend(result.last_insert_id);
    }
    assert_eq!(ids, [1, 2]);
    Ok(())
}

#[tokio::test]
async fn update_and_delete_report_rows_affected() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 5).await?;
    let p = Pages::new("");

    let update = qb::update(&p)
        .set(p.disabled.set(true))
        .where_(p.views.lt(2));
    let result = exec(&pool, &update, ExecFlags::ROWS_AFFECTED).await?;
    assert_eq!(result.rows_affected, Some(2));

    let delete = qb::delete_from(&p).where_(p.disabled.is_true());
    let result = exec(&pool, &delete, ExecFlags::ROWS_AFFECTED).await?;
    assert_eq!(result.rows_affected, Some(2));

    let p = Pages::new("p");
    let left = urls(&pool, &qb::from(&p).order_by(p.url.asc()), &p).await?;
    assert_eq!(left, ["/2", "/3", "/4"]);
    Ok(())
}

#[tokio::test]
async fn zero_rows_never_call_extract() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("p");
    let mut extracted = 0;
    let mut committed = 0;
    let n = fetch(
        &pool,
        &qb::from(&p),
        |_| {
            extracted += 1;
            Ok(RowAction::Keep(()))
        },
        |()| {
            committed += 1;
            Ok(())
        },
    )
    .await?;
    assert_eq!(n, 0);
    assert_eq!(extracted, 0);
    assert_eq!(committed, 0);
    Ok(())
}

#[tokio::test]
async fn skipped_rows_are_counted_but_not_committed() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 6).await?;
    let p = Pages::new("p");
    let mut even = Vec::new();
    let n = fetch(
        &pool,
        &qb::from(&p).order_by(p.views.asc()),
        |row| {
            let views = row.int64(&p.views)?;
            Ok(if views % 2 == 0 {
                RowAction::Keep(views)
            } else {
                RowAction::Skip
            })
        },
        |views| {
            even.push(views);
            Ok(())
        },
    )
    .await?;
    assert_eq!(n, 6);
    assert_eq!(even, [0, 2, 4]);
    Ok(())
}

#[tokio::test]
async fn commit_error_stops_the_fetch() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 4).await?;
    let p = Pages::new("p");
    let err = fetch(
        &pool,
        &qb::from(&p).order_by(p.views.asc()),
        |row| Ok(RowAction::Keep(row.int64(&p.views)?)),
        |views| {
            if views == 1 {
                return Err(sqkit::SqError::Other("stop".to_string()));
            }
            Ok(())
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.rows, 2);
    assert!(err.error.sql().is_some());
    assert!(matches!(err.error.root(), sqkit::SqError::Other(msg) if msg == "stop"));
    Ok(())
}

#[tokio::test]
async fn cancel_after_first_row() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 10).await?;
    let p = Pages::new("p");

    let (ctx, cancel) = Context::background().with_cancel();
    let mut extracted = 0;
    let err = fetch_context(
        &ctx,
        &pool,
        &qb::from(&p).order_by(p.views.asc()),
        |row| {
            extracted += 1;
            if extracted == 1 {
                cancel.cancel();
            }
            Ok(RowAction::Keep(row.string(&p.url)?))
        },
        |_| Ok(()),
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(err.rows <= 1);
    assert!(extracted <= 1);

    // The connection is still usable afterwards.
    let all = urls(&pool, &qb::from(&p), &p).await?;
    assert_eq!(all.len(), 10);
    Ok(())
}

#[tokio::test]
async fn cancelled_context_runs_nothing() -> SqResult<()> {
    let pool = setup().await?;
    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();

    let p = Pages::new("");
    let insert = qb::insert_into(&p).valuesx(|col| {
        col.set(&p.url, "/a");
    });
    let err = sqkit::exec_context(&ctx, &pool, &insert, ExecFlags::empty())
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let p = Pages::new("p");
    assert!(urls(&pool, &qb::from(&p), &p).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn exists_agrees_with_fetch() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 5).await?;
    let p = Pages::new("p");

    for threshold in [0, 3, 4, 10] {
        let query = qb::from(&p).where_(p.views.gt(threshold));
        let found = exists(&pool, &query).await?;
        let count = urls(&pool, &query, &p).await?.len();
        assert_eq!(found, count > 0, "views > {threshold}");
    }
    Ok(())
}

#[tokio::test]
async fn double_negation_selects_the_same_rows() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 6).await?;
    let p = Pages::new("p");

    let plain = qb::from(&p).where_(p.views.ge(3)).order_by(p.url.asc());
    let negated = qb::from(&p)
        .where_(not(not(p.views.ge(3))))
        .order_by(p.url.asc());
    let expected = urls(&pool, &plain, &p).await?;
    assert_eq!(expected, ["/3", "/4", "/5"]);
    assert_eq!(urls(&pool, &negated, &p).await?, expected);
    Ok(())
}

#[tokio::test]
async fn row_value_in_matches_pairs() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 4).await?;
    let p = Pages::new("p");
    let query = qb::from(&p)
        .where_(
            qb::RowValue::from((&p.url, &p.views)).in_values([("/1", 1), ("/2", 3), ("/3", 3)]),
        )
        .order_by(p.url.asc());
    assert_eq!(urls(&pool, &query, &p).await?, ["/1", "/3"]);
    Ok(())
}

#[tokio::test]
async fn case_without_else_is_null() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 2).await?;
    let p = Pages::new("p");

    let heat = |with_else: bool| {
        let expr = case_when(p.views.gt(0), "hot");
        let expr = if with_else { expr.else_("cold") } else { expr };
        qb::select()
            .from(&p)
            .column(expr.as_("heat"))
            .order_by(p.views.asc())
    };

    let without_else = fetch_all(&pool, &heat(false), |row| {
        row.get_named::<Option<String>>("heat")
    })
    .await?;
    assert_eq!(without_else, [None, Some("hot".to_string())]);

    let with_else = fetch_all(&pool, &heat(true), |row| row.get_named::<String>("heat")).await?;
    assert_eq!(with_else, ["cold", "hot"]);
    Ok(())
}

#[tokio::test]
async fn self_join_reads_both_sides() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 3).await?;
    let a = Pages::new("a");
    let b = Pages::new("b");
    let query = qb::select()
        .from(&a)
        .join(&b, b.views.eq_field(&a.views))
        .columns([&a.url, &b.url])
        .where_(a.views.eq(2));
    let pairs = fetch_all(&pool, &query, |row| {
        Ok((row.string(&a.url)?, row.string(&b.url)?))
    })
    .await?;
    assert_eq!(pairs, [("/2".to_string(), "/2".to_string())]);
    Ok(())
}

#[tokio::test]
async fn ensure_tables_is_idempotent() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 1).await?;
    ensure_tables(&pool, &[&Pages::new("")]).await?;
    ensure_tables(&pool, &[&Pages::new("")]).await?;
    let p = Pages::new("p");
    assert_eq!(urls(&pool, &qb::from(&p), &p).await?, ["/0"]);
    Ok(())
}

#[tokio::test]
async fn unique_violation_survives_annotation() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("");
    let insert = qb::insert_into(&p).valuesx(|col| {
        col.set(&p.url, "/a");
    });
    exec(&pool, &insert, ExecFlags::empty()).await?;
    let err = exec(&pool, &insert, ExecFlags::empty()).await.unwrap_err();
    assert!(err.is_unique_violation());
    assert_eq!(err.sql(), Some("INSERT INTO pm_pages (url) VALUES (?)"));
    Ok(())
}

#[tokio::test]
async fn build_errors_are_not_annotated() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("");
    let insert = qb::insert_into(&p).columns([&p.url]);
    let err = exec(&pool, &insert, ExecFlags::empty())
        .await
        .unwrap_err();
    assert!(err.is_build());
    assert_eq!(err.sql(), None);
    Ok(())
}

#[tokio::test]
async fn raw_or_predicate_keeps_its_grouping() -> SqResult<()> {
    let pool = setup().await?;
    seed(&pool, 4).await?;
    let p = Pages::new("p");
    let either = qb::predicate(
        "? = ? OR ? = ?",
        [
            p.views.expr(),
            qb::Expr::value(1),
            p.views.expr(),
            qb::Expr::value(2),
        ],
    );
    let query = qb::from(&p).where_(either).where_(p.url.eq("/2"));
    assert_eq!(urls(&pool, &query, &p).await?, ["/2"]);

    let query = qb::from(&p)
        .where_(qb::Predicate::Expr(qb::literal("p.views = 0 OR p.views = 3")))
        .where_(p.views.gt(0));
    assert_eq!(urls(&pool, &query, &p).await?, ["/3"]);
    Ok(())
}

#[tokio::test]
async fn aliased_upsert_increments_existing_row() -> SqResult<()> {
    let pool = setup().await?;
    let p = Pages::new("p");
    let bump = qb::insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a").set(&p.views, 1);
        })
        .on_conflict([&p.url])
        .do_update_set([p.views.set_expr(qb::template("? + 1", [p.views.expr()]))])
        .where_(p.views.lt(10));

    for _ in 0..3 {
        exec(&pool, &bump, ExecFlags::empty()).await?;
    }
    let views = fetch_all(&pool, &qb::from(&p), |row| row.int64(&p.views)).await?;
    assert_eq!(views, [3]);
    Ok(())
}
