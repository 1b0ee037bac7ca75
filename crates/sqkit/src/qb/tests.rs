//! Rendering tests for the qb module.

use crate::dialect::Dialect;
use crate::qb::*;
use crate::table::{ColumnOptions, TableBuilder};
use crate::value::Value;

crate::table! {
    struct Pages("pm_pages") {
        url: StringField [primary_key, not_null],
        lang: StringField,
        content: StringField,
        views: NumberField,
        disabled: BooleanField,
    }
}

fn sqlite<S: Statement>(stmt: &S) -> Rendered {
    stmt.to_sql(Dialect::Sqlite).unwrap()
}

fn pg<S: Statement>(stmt: &S) -> Rendered {
    stmt.to_sql(Dialect::Postgres).unwrap()
}

#[test]
fn test_select_default_projection() {
    let p = Pages::new("p");
    let r = sqlite(&from(&p));
    assert_eq!(
        r.sql,
        "SELECT p.url, p.lang, p.content, p.views, p.disabled FROM pm_pages AS p"
    );
    assert!(r.args.is_empty());
}

#[test]
fn test_select_where_placeholders() {
    let p = Pages::new("p");
    let q = from(&p)
        .where_(p.url.eq("/a"))
        .where_(p.views.gt(10));

    let r = sqlite(&q);
    assert!(r.sql.ends_with("WHERE p.url = ? AND p.views > ?"));
    assert_eq!(r.args, vec![Value::Text("/a".into()), Value::Int(10)]);

    let r = pg(&q);
    assert!(r.sql.ends_with("WHERE p.url = $1 AND p.views > $2"));
}

#[test]
fn test_or_inside_and_is_parenthesized() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.url)
        .where_(or([p.url.eq("/a"), p.url.eq("/b")]))
        .where_(p.disabled.is_false());
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p WHERE (p.url = ? OR p.url = ?) AND NOT p.disabled"
    );
}

#[test]
fn test_double_negation() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.url)
        .where_(not(not(p.url.eq("/a"))));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p WHERE NOT (NOT (p.url = ?))"
    );
}

#[test]
fn test_empty_in_list() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.url)
        .where_(p.url.in_list(Vec::<String>::new()));
    assert_eq!(sqlite(&q).sql, "SELECT p.url FROM pm_pages AS p WHERE 1 = 0");

    let q = select()
        .from(&p)
        .column(&p.url)
        .where_(p.lang.in_list(["en", "de"]));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p WHERE p.lang IN (?, ?)"
    );
}

#[test]
fn test_row_value_in() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.content)
        .where_(RowValue::from((&p.url, &p.lang)).in_values([("/a", "en"), ("/b", "de")]));
    let r = sqlite(&q);
    assert_eq!(
        r.sql,
        "SELECT p.content FROM pm_pages AS p WHERE (p.url, p.lang) IN (VALUES (?, ?), (?, ?))"
    );
    assert_eq!(r.args.len(), 4);
}

#[test]
fn test_row_value_arity_is_build_error() {
    let p = Pages::new("p");
    let q = from(&p).where_(
        RowValue::from((&p.url, &p.lang)).in_values([RowValue::from(("/a",))]),
    );
    let err = q.to_sql(Dialect::Sqlite).unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("SelectQb::where_"));
    assert!(err.to_string().contains("expected 2"));
}

#[test]
fn test_searched_case() {
    let p = Pages::new("p");
    let heat = case_when(p.views.gt(100), "hot")
        .when(p.views.gt(10), "warm")
        .else_("cold")
        .as_("heat");
    let q = select().from(&p).column(&p.url).column(heat);
    let r = sqlite(&q);
    assert_eq!(
        r.sql,
        "SELECT p.url, CASE WHEN p.views > ? THEN ? WHEN p.views > ? THEN ? ELSE ? END AS heat \
         FROM pm_pages AS p"
    );
    assert_eq!(
        r.args,
        vec![
            Value::Int(100),
            Value::Text("hot".into()),
            Value::Int(10),
            Value::Text("warm".into()),
            Value::Text("cold".into()),
        ]
    );
}

#[test]
fn test_simple_case_without_else() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(case(&p.lang).when("en", "English").as_("language"));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT CASE p.lang WHEN ? THEN ? END AS language FROM pm_pages AS p"
    );
}

#[test]
fn test_case_needs_a_when() {
    assert!(CaseExpr::from_whens(Vec::new()).unwrap_err().is_build());
    assert!(SimpleCase::from_whens(Expr::value(1), Vec::new()).unwrap_err().is_build());
}

#[test]
fn test_bulk_insert_in_declared_order() {
    let p = Pages::new("");
    let mut q = insert_into(&p);
    for (url, content) in [("/a", "A"), ("/b", "B"), ("/c", "C")] {
        q = q.valuesx(|col| {
            col.set(&p.content, content).set(&p.url, url);
        });
    }
    let r = sqlite(&q);
    assert_eq!(
        r.sql,
        "INSERT INTO pm_pages (url, content) VALUES (?, ?), (?, ?), (?, ?)"
    );
    assert_eq!(r.args[0], Value::Text("/a".into()));
    assert_eq!(r.args[1], Value::Text("A".into()));
    assert_eq!(r.args[5], Value::Text("C".into()));
}

#[test]
fn test_repeated_column_starts_new_row() {
    let p = Pages::new("");
    let q = insert_into(&p).valuesx(|col| {
        for url in ["/a", "/b"] {
            col.set(&p.url, url);
        }
    });
    assert_eq!(sqlite(&q).sql, "INSERT INTO pm_pages (url) VALUES (?), (?)");
}

#[test]
fn test_mismatched_rows_are_build_error() {
    let p = Pages::new("");
    let q = insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a").set(&p.content, "A");
        })
        .valuesx(|col| {
            col.set(&p.url, "/b");
        });
    let err = q.to_sql(Dialect::Sqlite).unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("InsertQb::valuesx"));
}

#[test]
fn test_empty_valuesx_is_build_error() {
    let p = Pages::new("");
    let err = insert_into(&p)
        .valuesx(|_| {})
        .to_sql(Dialect::Sqlite)
        .unwrap_err();
    assert!(err.is_build());
}

#[test]
fn test_upsert_do_update() {
    let p = Pages::new("p");
    let q = insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a").set(&p.content, "hi");
        })
        .on_conflict([&p.url])
        .do_update_set([set_excluded(&p.content)])
        .where_(p.content.ne("hi"));
    assert_eq!(
        sqlite(&q).sql,
        "INSERT INTO pm_pages AS p (url, content) VALUES (?, ?) \
         ON CONFLICT (url) DO UPDATE SET content = EXCLUDED.content WHERE p.content <> ?"
    );
    assert_eq!(
        pg(&q).sql,
        "INSERT INTO pm_pages AS p (url, content) VALUES ($1, $2) \
         ON CONFLICT (url) DO UPDATE SET content = EXCLUDED.content WHERE p.content <> $3"
    );
}

#[test]
fn test_upsert_right_hand_side_stays_qualified() {
    let p = Pages::new("");
    let q = insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a").set(&p.views, 1);
        })
        .on_conflict([&p.url])
        .do_update_set([p.views.set_expr(template("? + 1", [p.views.expr()]))]);
    assert_eq!(
        pg(&q).sql,
        "INSERT INTO pm_pages (url, views) VALUES ($1, $2) \
         ON CONFLICT (url) DO UPDATE SET views = pm_pages.views + 1"
    );
}

#[test]
fn test_upsert_without_target_is_build_error() {
    let p = Pages::new("");
    let err = insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a");
        })
        .on_conflict(Vec::<ColumnRef>::new())
        .do_update_set([set_excluded(&p.content)])
        .to_sql(Dialect::Sqlite)
        .unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("conflict target"));
}

#[test]
fn test_do_nothing_and_returning() {
    let p = Pages::new("p");
    let q = insert_into(&p)
        .valuesx(|col| {
            col.set(&p.url, "/a");
        })
        .on_conflict_do_nothing()
        .returning(&p.url);
    assert_eq!(
        sqlite(&q).sql,
        "INSERT INTO pm_pages AS p (url) VALUES (?) ON CONFLICT DO NOTHING RETURNING url"
    );
}

#[test]
fn test_update() {
    let p = Pages::new("p");
    let q = update(&p)
        .set(p.content.set("x"))
        .set(p.views.set_null())
        .where_(p.url.eq("/a"));
    assert_eq!(
        pg(&q).sql,
        "UPDATE pm_pages AS p SET content = $1, views = $2 WHERE p.url = $3"
    );
}

#[test]
fn test_update_setx_twice_is_build_error() {
    let p = Pages::new("p");
    let err = update(&p)
        .setx(|col| {
            col.set(&p.content, "a").set(&p.content, "b");
        })
        .to_sql(Dialect::Sqlite)
        .unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("UpdateQb::setx"));
}

#[test]
fn test_update_without_assignments_is_build_error() {
    let p = Pages::new("p");
    assert!(update(&p).to_sql(Dialect::Sqlite).unwrap_err().is_build());
}

#[test]
fn test_delete() {
    let p = Pages::new("p");
    assert_eq!(
        sqlite(&delete_from(&p).where_(p.url.eq("/a"))).sql,
        "DELETE FROM pm_pages AS p WHERE p.url = ?"
    );
    // No WHERE: full-table delete is allowed.
    assert_eq!(sqlite(&delete_from(&p)).sql, "DELETE FROM pm_pages AS p");
}

#[test]
fn test_exists_wrapper() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.content)
        .where_(p.url.eq("/a"))
        .exists_query();
    assert_eq!(
        sqlite(&q).sql,
        "SELECT EXISTS (SELECT 1 FROM pm_pages AS p WHERE p.url = ?)"
    );
}

#[test]
fn test_subquery_args_are_spliced_in_order() {
    let p = Pages::new("p");
    let q2 = Pages::new("q");
    let sub = select()
        .from(&q2)
        .column(&q2.url)
        .where_(q2.lang.eq("en"));
    let q = select()
        .from(&p)
        .column(&p.url)
        .where_(p.views.gt(1))
        .where_(p.url.in_select(sub))
        .where_(p.lang.ne("de"));
    let r = pg(&q);
    assert_eq!(
        r.sql,
        "SELECT p.url FROM pm_pages AS p WHERE p.views > $1 \
         AND p.url IN (SELECT q.url FROM pm_pages AS q WHERE q.lang = $2) AND p.lang <> $3"
    );
    assert_eq!(
        r.args,
        vec![
            Value::Int(1),
            Value::Text("en".into()),
            Value::Text("de".into())
        ]
    );
}

#[test]
fn test_named_params_are_reused() {
    let p = Pages::new("p");
    let q = select().from(&p).column(&p.url).where_(
        p.url
            .cmp(CmpOp::Eq, param("u", "/a"))
            .or(p.lang.cmp(CmpOp::Eq, param("u", "/a"))),
    );

    let r = pg(&q);
    assert!(r.sql.ends_with("WHERE p.url = $1 OR p.lang = $1"));
    assert_eq!(r.args.len(), 1);
    assert_eq!(r.params.get("u"), Some(&1));

    let r = sqlite(&q);
    assert!(r.sql.ends_with("WHERE p.url = ?1 OR p.lang = ?1"));
}

#[test]
fn test_interpolated_logging_form() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.url)
        .where_(p.url.eq("it's"))
        .where_(p.disabled.eq(true));
    assert_eq!(
        q.to_interpolated_sql(Dialect::Sqlite).unwrap(),
        "SELECT p.url FROM pm_pages AS p WHERE p.url = 'it''s' AND p.disabled = 1"
    );
    assert!(
        q.to_interpolated_sql(Dialect::Postgres)
            .unwrap()
            .ends_with("p.disabled = TRUE")
    );
}

#[test]
fn test_render_is_deterministic() {
    let p = Pages::new("p");
    let q = from(&p)
        .where_(p.url.like("/docs/%"))
        .order_by(p.url.asc())
        .limit(5);
    assert_eq!(sqlite(&q), sqlite(&q));
    assert_eq!(pg(&q), pg(&q));
}

#[test]
fn test_ilike_is_unsupported_on_sqlite() {
    let p = Pages::new("p");
    let q = select().from(&p).column(&p.url).where_(p.url.ilike("/A%"));
    let err = q.to_sql(Dialect::Sqlite).unwrap_err();
    assert!(matches!(err, crate::SqError::Unsupported { feature: "ILIKE", .. }));
    assert!(pg(&q).sql.ends_with("WHERE p.url ILIKE $1"));
}

#[test]
fn test_self_join_with_aliases() {
    let a = Pages::new("a");
    let b = Pages::new("b");
    let q = select()
        .from(&a)
        .join(&b, a.url.eq_field(&b.url))
        .column(&a.url)
        .column(b.lang.as_("other_lang"));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT a.url, b.lang AS other_lang FROM pm_pages AS a JOIN pm_pages AS b ON a.url = b.url"
    );
}

#[test]
fn test_group_by_having_order_limit() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.lang)
        .column(count_star().as_("n"))
        .group_by([p.lang.expr()])
        .having(predicate("COUNT(*) > ?", [Expr::value(1)]))
        .order_by(p.lang.desc().nulls_last())
        .limit(10)
        .offset(20);
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.lang, COUNT(*) AS n FROM pm_pages AS p GROUP BY p.lang HAVING COUNT(*) > ? \
         ORDER BY p.lang DESC NULLS LAST LIMIT 10 OFFSET 20"
    );
}

#[test]
fn test_offset_without_limit() {
    let p = Pages::new("p");
    let q = select().from(&p).column(&p.url).offset(5);
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p LIMIT -1 OFFSET 5"
    );
    assert_eq!(pg(&q).sql, "SELECT p.url FROM pm_pages AS p OFFSET 5");
}

#[test]
fn test_clause_given_twice_is_build_error() {
    let p = Pages::new("p");
    let err = from(&p).limit(1).limit(2).to_sql(Dialect::Sqlite).unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("SelectQb::limit"));
}

#[test]
fn test_distinct_on_is_postgres_only() {
    let p = Pages::new("p");
    let q = select()
        .from(&p)
        .column(&p.lang)
        .distinct_on([p.lang.expr()]);
    assert_eq!(
        pg(&q).sql,
        "SELECT DISTINCT ON (p.lang) p.lang FROM pm_pages AS p"
    );
    assert!(matches!(
        q.to_sql(Dialect::Sqlite).unwrap_err(),
        crate::SqError::Unsupported { .. }
    ));
}

#[test]
fn test_raw_query_fields() {
    let p = Pages::new("");
    let q = raw("FROM pm_pages WHERE url = ? AND note <> '?'")
        .bind("/a")
        .field(&p.url);
    assert_eq!(
        pg(&q).sql,
        "SELECT pm_pages.url FROM pm_pages WHERE url = $1 AND note <> '?'"
    );
}

#[test]
fn test_raw_placeholder_mismatch_is_render_error() {
    let err = raw("SELECT ?, ?").bind(1).to_sql(Dialect::Sqlite).unwrap_err();
    assert!(matches!(err, crate::SqError::Render(_)));
}

#[test]
fn test_reserved_column_is_quoted() {
    let mut builder = TableBuilder::new("items", "");
    let order = builder
        .field::<i64>("order", ColumnOptions::new())
        .unwrap();
    let items = builder.finish();
    let q = select().from(&items).where_(order.ge(3));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT items.\"order\" FROM items WHERE items.\"order\" >= ?"
    );
}

#[test]
fn test_subquery_as_assignment_value() {
    let p = Pages::new("p");
    let src = Pages::new("src");
    let q = update(&p)
        .set(p.content.set_expr(
            select()
                .from(&src)
                .column(&src.content)
                .where_(src.url.eq("/template")),
        ))
        .where_(p.url.eq("/a"));
    assert_eq!(
        sqlite(&q).sql,
        "UPDATE pm_pages AS p SET content = (SELECT src.content FROM pm_pages AS src \
         WHERE src.url = ?) WHERE p.url = ?"
    );
}

#[test]
fn test_set_json_serializes_values() {
    #[derive(serde::Serialize)]
    struct Meta<'a> {
        tags: &'a [&'a str],
    }

    let mut t = TableBuilder::new("docs", "");
    let meta = t.field::<serde_json::Value>("meta", ColumnOptions::new()).unwrap();
    let table = t.finish();

    let q = insert_into(&table).valuesx(|col| {
        col.set_json(&meta, &Meta { tags: &["a"] });
    });
    let r = sqlite(&q);
    assert_eq!(r.sql, "INSERT INTO docs (meta) VALUES (?)");
    assert_eq!(r.args, vec![Value::Json(serde_json::json!({"tags": ["a"]}))]);

    let q = update(&table).set(meta.set_json(&serde_json::json!([1, 2])).unwrap());
    assert_eq!(sqlite(&q).sql, "UPDATE docs SET meta = ?");
}

#[test]
fn test_raw_predicates_are_grouped() {
    let p = Pages::new("p");
    let either = predicate(
        "? = ? OR ? = ?",
        [p.views.expr(), Expr::value(1), p.views.expr(), Expr::value(2)],
    );
    let q = from(&p)
        .columns([&p.url])
        .where_(either.clone())
        .where_(p.url.eq("/b"));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p WHERE (p.views = ? OR p.views = ?) AND p.url = ?"
    );

    let q = from(&p)
        .columns([&p.url])
        .where_(or([
            Predicate::Expr(literal("p.views > 2 AND p.views < 5")),
            p.url.eq("/a"),
        ]));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p WHERE (p.views > 2 AND p.views < 5) OR p.url = ?"
    );

    // A one-item group is transparent, so its raw operand still gets wrapped.
    let q = from(&p)
        .columns([&p.url])
        .where_(and([or([either]), p.disabled.is_null()]));
    assert_eq!(
        sqlite(&q).sql,
        "SELECT p.url FROM pm_pages AS p WHERE (p.views = ? OR p.views = ?) AND p.disabled IS NULL"
    );
}
