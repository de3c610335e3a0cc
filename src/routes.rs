use std::path::Path;
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use serde_json::Value;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::compat::{MyJson, MyQuery};
use crate::model::network::{DeleteQuery, Post, Posts};
use crate::model::ApiError;
use crate::service::PostService;
use crate::site::Site;

pub struct AppState {
    pub posts: PostService,
    pub site: Option<Site>,
}

impl AppState {
    /// Regenerates the published site, if there is one. Failures are logged
    /// and never reach the client.
    pub async fn republish(&self) {
        let Some(site) = &self.site else {
            return;
        };

        let posts = match self.posts.list().await {
            Ok(posts) => posts,
            Err(err) => {
                tracing::error!("could not load posts for site build: {}", err);
                return;
            }
        };

        if let Err(err) = site.build(&posts).await {
            tracing::error!("site build failed: {}", err);
        }
    }
}

pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route(
            "/posts",
            get(list_posts)
                .post(create_post)
                .patch(update_post)
                .delete(delete_post),
        )
        .with_state(state.clone());

    if let Some(site) = &state.site {
        router = router.nest_service("/site", ServeDir::new(site.out_dir()));
    }

    if let Some(static_dir) = static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router.layer(TraceLayer::new_for_http())
}

async fn list_posts(State(state): State<Arc<AppState>>) -> Result<MyJson<Posts>, ApiError> {
    Ok(MyJson(state.posts.posts().await?))
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    MyJson(body): MyJson<Value>,
) -> Result<MyJson<Post>, ApiError> {
    let post = state.posts.create(body).await?;
    state.republish().await;
    Ok(MyJson(post))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    MyJson(body): MyJson<Value>,
) -> Result<MyJson<Post>, ApiError> {
    let post = state.posts.update(body).await?;
    state.republish().await;
    Ok(MyJson(post))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    MyQuery(DeleteQuery { id }): MyQuery<DeleteQuery>,
) -> Result<&'static str, ApiError> {
    state.posts.delete(&id).await?;
    state.republish().await;
    Ok("ok")
}
