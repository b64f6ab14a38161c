#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use funnelcrate::{
    Filter, FilterChain, FilterSelect, Filterable, FunnelConfig, FunnelError, QueryParams,
    RelationCatalog,
};
use sea_orm::sea_query::SqliteQueryBuilder;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Schema, Set,
};
use serde_json::{Value, json};
use std::sync::{Arc, LazyLock};

pub mod post {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
    #[sea_orm(table_name = "posts")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub title: String,
        #[sea_orm(column_type = "Text")]
        pub body: String,
        pub is_published: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod comment {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
    #[sea_orm(table_name = "comments")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub post_id: i32,
        pub body: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod reply {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
    #[sea_orm(table_name = "replies")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub comment_id: i32,
        pub body: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod node {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
    #[sea_orm(table_name = "nodes")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub parent_id: i32,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

static CATALOG: LazyLock<Arc<RelationCatalog>> = LazyLock::new(|| {
    Arc::new(
        RelationCatalog::new()
            .relation::<post::Entity, comment::Entity>(
                "comments",
                post::Column::Id,
                comment::Column::PostId,
            )
            .relation::<comment::Entity, reply::Entity>(
                "replies",
                comment::Column::Id,
                reply::Column::CommentId,
            )
            .relation::<comment::Entity, post::Entity>(
                "post",
                comment::Column::PostId,
                post::Column::Id,
            )
            .relation::<node::Entity, node::Entity>(
                "children",
                node::Column::Id,
                node::Column::ParentId,
            )
            .relation::<node::Entity, node::Entity>(
                "parent",
                node::Column::ParentId,
                node::Column::Id,
            ),
    )
});

pub fn catalog() -> Arc<RelationCatalog> {
    Arc::clone(&CATALOG)
}

pub struct Post;

impl Filterable for Post {
    type Query = FilterSelect<post::Entity>;

    fn query() -> Self::Query {
        FilterSelect::new(catalog())
    }

    fn filters() -> Result<FilterChain<Self::Query>, FunnelError> {
        FilterChain::from_filters(
            FunnelConfig::default(),
            [
                Filter::new("published", "is_published", "=")?,
                Filter::new("search", "title", "like")?,
                Filter::new("title", "title", "=")?,
                Filter::new("min_id", "id", ">=")?,
                Filter::new("comment", "comments.body", "like")?,
                Filter::new("reply", "comments.replies.body", "=")?,
                Filter::sort("sort", "title"),
            ],
        )
    }
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    let schema = Schema::new(sea_orm::DatabaseBackend::Sqlite);
    let statements = [
        schema.create_table_from_entity(post::Entity),
        schema.create_table_from_entity(comment::Entity),
        schema.create_table_from_entity(reply::Entity),
        schema.create_table_from_entity(node::Entity),
    ];
    for statement in statements {
        db.execute_unprepared(&statement.to_string(SqliteQueryBuilder))
            .await?;
    }

    Ok(db)
}

/// Three posts:
///
/// 1. "Lorem ipsum", published, comment "nice post" with reply "hi"
/// 2. "Dolor sit", draft, comment "meh" without replies
/// 3. "Lorem dolor", published, no comments
///
/// and a `nodes` tree for self-referencing relations.
pub async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    let posts = [
        (1, "Lorem ipsum", true),
        (2, "Dolor sit", false),
        (3, "Lorem dolor", true),
    ];
    for (id, title, is_published) in posts {
        post::ActiveModel {
            id: Set(id),
            title: Set(title.to_string()),
            body: Set(format!("Body of {title}")),
            is_published: Set(is_published),
        }
        .insert(db)
        .await?;
    }

    for (id, post_id, body) in [(1, 1, "nice post"), (2, 2, "meh")] {
        comment::ActiveModel {
            id: Set(id),
            post_id: Set(post_id),
            body: Set(body.to_string()),
        }
        .insert(db)
        .await?;
    }

    reply::ActiveModel {
        id: Set(1),
        comment_id: Set(1),
        body: Set("hi".to_string()),
    }
    .insert(db)
    .await?;

    // root -> leaf -> bud, plus a node without children
    let nodes = [(1, 0, "root"), (2, 1, "leaf"), (3, 0, "lonely"), (4, 2, "bud")];
    for (id, parent_id, name) in nodes {
        node::ActiveModel {
            id: Set(id),
            parent_id: Set(parent_id),
            name: Set(name.to_string()),
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

pub async fn setup_seeded_db() -> DatabaseConnection {
    let db = setup_test_db()
        .await
        .expect("Failed to setup test database");
    seed(&db).await.expect("Failed to seed test data");
    db
}

/// Run the `Post` chain and return matching ids in result order
pub async fn filtered_post_ids(db: &DatabaseConnection, query: &str) -> Vec<i32> {
    let select = Post::filtered(&QueryParams::parse(query))
        .expect("Failed to apply filters")
        .into_select();
    select
        .all(db)
        .await
        .expect("Failed to run filtered query")
        .into_iter()
        .map(|post| post.id)
        .collect()
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let api = Router::new()
        .route("/posts", axum::routing::get(list_posts))
        .with_state(db);

    Router::new().nest("/api/v1", api)
}

async fn list_posts(
    State(db): State<DatabaseConnection>,
    params: QueryParams,
) -> Result<Json<Vec<Value>>, Response> {
    let (select, eager) = Post::filtered(&params)
        .map_err(IntoResponse::into_response)?
        .into_parts();
    let posts = select.all(&db).await.map_err(internal_error)?;

    let comments = if eager.iter().any(|relation| relation == "comments") {
        let ids: Vec<i32> = posts.iter().map(|post| post.id).collect();
        Some(
            comment::Entity::find()
                .filter(comment::Column::PostId.is_in(ids))
                .all(&db)
                .await
                .map_err(internal_error)?,
        )
    } else {
        None
    };

    let body = posts
        .into_iter()
        .map(|post| {
            let post_id = post.id;
            let mut value = json!(post);
            if let Some(comments) = &comments {
                let related: Vec<&comment::Model> = comments
                    .iter()
                    .filter(|comment| comment.post_id == post_id)
                    .collect();
                value["comments"] = json!(related);
            }
            value
        })
        .collect();

    Ok(Json(body))
}

fn internal_error(error: DbErr) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
}
