use funnelcrate::{
    ConditionBuilder, FilterSelect, Filterable, FunnelError, Operator, QueryBuilder, QueryParams,
    SortDirection,
};
use funnelcrate::query::sea::ConditionScope;
use sea_orm::{DatabaseConnection, DbBackend, EntityTrait, QueryTrait};

mod common;
use common::{Post, catalog, comment, filtered_post_ids, node, setup_seeded_db};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn post_sql(query: &str) -> String {
    Post::filtered(&QueryParams::parse(query))
        .expect("Failed to apply filters")
        .into_select()
        .build(DbBackend::Sqlite)
        .to_string()
}

fn sorted(mut ids: Vec<i32>) -> Vec<i32> {
    ids.sort_unstable();
    ids
}

#[test]
fn test_scalar_filter_sql() {
    let sql = post_sql("published=1");
    assert!(sql.contains(r#""posts"."is_published" = "#), "{sql}");
    assert!(!sql.contains("'1'"), "{sql}");
    assert!(!sql.contains("LIKE"), "{sql}");
}

#[test]
fn test_values_bind_with_column_types() {
    let sql = Post::filtered(&QueryParams::parse("min_id=2&title=lorem"))
        .unwrap()
        .into_select()
        .build(DbBackend::Postgres)
        .to_string();
    assert!(sql.contains(r#""posts"."id" >= 2"#), "{sql}");
    assert!(sql.contains(r#""posts"."title" = 'lorem'"#), "{sql}");

    // not a number, so it stays text
    let sql = post_sql("min_id=abc");
    assert!(sql.contains(r#""posts"."id" >= 'abc'"#), "{sql}");
}

#[test]
fn test_absent_parameters_leave_select_untouched() {
    let sql = post_sql("unrelated=1");
    let plain = common::post::Entity::find().build(DbBackend::Sqlite).to_string();
    assert_eq!(sql, plain);
}

#[test]
fn test_searchable_filter_sql() {
    let sql = post_sql("search=lorem");
    assert!(sql.contains(r#""posts"."title" LIKE '%lorem%'"#), "{sql}");
}

#[test]
fn test_list_filter_sql_is_or_group() {
    let sql = post_sql("title[]=lorem&title[]=ipsum");
    assert!(sql.contains(r#""posts"."title" = 'lorem'"#), "{sql}");
    assert!(sql.contains(" OR "), "{sql}");
    assert!(sql.contains(r#""posts"."title" = 'ipsum'"#), "{sql}");
}

#[test]
fn test_relation_filter_sql_is_correlated_exists() {
    let sql = post_sql("reply=hi");
    assert!(sql.contains("EXISTS"), "{sql}");
    assert!(sql.contains(r#"FROM "comments" AS "comments_1""#), "{sql}");
    assert!(sql.contains(r#""comments_1"."post_id" = "posts"."id""#), "{sql}");
    assert!(sql.contains(r#"FROM "replies" AS "replies_2""#), "{sql}");
    assert!(sql.contains(r#""replies_2"."comment_id" = "comments_1"."id""#), "{sql}");
    assert!(sql.contains(r#""replies_2"."body" = 'hi'"#), "{sql}");
}

#[test]
fn test_sort_filter_sql() {
    let sql = post_sql("sort=asc");
    assert!(sql.contains(r#"ORDER BY "posts"."title" ASC"#), "{sql}");

    let sql = post_sql("sort=whatever");
    assert!(sql.contains(r#"ORDER BY "posts"."title" DESC"#), "{sql}");
}

#[test]
fn test_unknown_relation_is_an_error() {
    let result = FilterSelect::<comment::Entity>::new(catalog())
        .where_has("replies.authors", |q| Ok(q.and_where("name", Operator::Eq, "x")));
    assert_eq!(
        result.unwrap_err(),
        FunnelError::UnknownRelation {
            table: "replies".to_string(),
            relation: "authors".to_string(),
        }
    );
}

#[test]
fn test_has_relation_follows_catalog() {
    let query = Post::query();
    assert!(query.has_relation("comments"));
    assert!(!query.has_relation("replies"));
    assert!(!query.has_relation("authors"));
}

#[test]
fn test_eager_relations_are_returned_with_select() {
    let (_, eager) = Post::filtered(&QueryParams::parse("with=comments,authors,comments.replies"))
        .unwrap()
        .into_parts();
    assert_eq!(eager, vec!["comments".to_string(), "comments.replies".to_string()]);
}

#[test]
fn test_multi_value_sort_is_rejected() {
    let result = Post::filtered(&QueryParams::parse("sort[]=asc"));
    assert!(matches!(result, Err(FunnelError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_no_parameters_return_everything() {
    init_tracing();
    let db = setup_seeded_db().await;
    assert_eq!(sorted(filtered_post_ids(&db, "").await), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_boolean_filter() {
    let db = setup_seeded_db().await;
    assert_eq!(sorted(filtered_post_ids(&db, "published=1").await), vec![1, 3]);
    assert_eq!(sorted(filtered_post_ids(&db, "published=0").await), vec![2]);
}

#[tokio::test]
async fn test_search_filter() {
    let db = setup_seeded_db().await;
    assert_eq!(sorted(filtered_post_ids(&db, "search=lorem").await), vec![1, 3]);
    assert_eq!(sorted(filtered_post_ids(&db, "search=DOLOR").await), vec![2, 3]);
    assert!(filtered_post_ids(&db, "search=amet").await.is_empty());
}

#[tokio::test]
async fn test_list_and_comma_filters() {
    let db = setup_seeded_db().await;
    let by_list = filtered_post_ids(&db, "title[]=Lorem%20ipsum&title[]=Dolor%20sit").await;
    assert_eq!(sorted(by_list), vec![1, 2]);

    let by_commas = filtered_post_ids(&db, "title=Lorem%20ipsum,Dolor%20sit").await;
    assert_eq!(sorted(by_commas), vec![1, 2]);
}

#[tokio::test]
async fn test_group_binds_inside_and() {
    let db = setup_seeded_db().await;
    let ids = filtered_post_ids(
        &db,
        "published=1&title[]=Dolor%20sit&title[]=Lorem%20dolor",
    )
    .await;
    assert_eq!(ids, vec![3]);
}

#[tokio::test]
async fn test_numeric_comparison() {
    let db = setup_seeded_db().await;
    assert_eq!(sorted(filtered_post_ids(&db, "min_id=2").await), vec![2, 3]);
}

#[tokio::test]
async fn test_relation_filters() {
    let db = setup_seeded_db().await;
    assert_eq!(filtered_post_ids(&db, "comment=nice").await, vec![1]);
    assert_eq!(sorted(filtered_post_ids(&db, "comment=e").await), vec![1, 2]);
    assert_eq!(filtered_post_ids(&db, "reply=hi").await, vec![1]);
    assert!(filtered_post_ids(&db, "reply=hello").await.is_empty());
}

#[tokio::test]
async fn test_sorting() {
    let db = setup_seeded_db().await;
    assert_eq!(filtered_post_ids(&db, "sort=asc").await, vec![2, 3, 1]);
    assert_eq!(filtered_post_ids(&db, "sort=desc").await, vec![1, 3, 2]);
    assert_eq!(filtered_post_ids(&db, "published=1&sort=desc").await, vec![1, 3]);
}

#[tokio::test]
async fn test_belongs_to_relation() {
    let db = setup_seeded_db().await;
    let comments = FilterSelect::<comment::Entity>::new(catalog())
        .where_has("post", |q| Ok(q.and_where("is_published", Operator::Eq, "1")))
        .unwrap()
        .order_by("id", SortDirection::Asc)
        .into_select()
        .all(&db)
        .await
        .unwrap();
    let ids: Vec<i32> = comments.iter().map(|comment| comment.id).collect();
    assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn test_from_existing_select() {
    let db = setup_seeded_db().await;
    let base = common::post::Entity::find();
    let posts = FilterSelect::from_select(base, catalog())
        .and_where("title", Operator::NotLike, "%ipsum%")
        .or_where("id", Operator::Eq, "1")
        .order_by("id", SortDirection::Desc)
        .into_select()
        .all(&db)
        .await
        .unwrap();
    let ids: Vec<i32> = posts.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

async fn node_ids<F>(db: &DatabaseConnection, relation: &str, scope: F) -> Vec<i32>
where
    F: FnOnce(ConditionScope) -> Result<ConditionScope, FunnelError>,
{
    FilterSelect::<node::Entity>::new(catalog())
        .where_has(relation, scope)
        .unwrap()
        .order_by("id", SortDirection::Asc)
        .into_select()
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|node| node.id)
        .collect()
}

#[test]
fn test_self_relation_sql_correlates_with_outer_row() {
    let sql = FilterSelect::<node::Entity>::new(catalog())
        .where_has("children", |q| Ok(q.and_where("name", Operator::Eq, "leaf")))
        .unwrap()
        .into_select()
        .build(DbBackend::Sqlite)
        .to_string();
    assert!(sql.contains(r#"FROM "nodes" AS "nodes_1""#), "{sql}");
    assert!(sql.contains(r#""nodes_1"."parent_id" = "nodes"."id""#), "{sql}");
    assert!(sql.contains(r#""nodes_1"."name" = 'leaf'"#), "{sql}");
}

#[tokio::test]
async fn test_self_referencing_relations() {
    let db = setup_seeded_db().await;

    let with_leaf = node_ids(&db, "children", |q| {
        Ok(q.and_where("name", Operator::Eq, "leaf"))
    })
    .await;
    assert_eq!(with_leaf, vec![1]);

    let under_root = node_ids(&db, "parent", |q| {
        Ok(q.and_where("name", Operator::Eq, "root"))
    })
    .await;
    assert_eq!(under_root, vec![2]);

    let with_grandchild = node_ids(&db, "children.children", |q| {
        Ok(q.and_where("name", Operator::Eq, "bud"))
    })
    .await;
    assert_eq!(with_grandchild, vec![1]);

    let has_children = node_ids(&db, "children", Ok).await;
    assert_eq!(has_children, vec![1, 2]);
}
