use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::database::{PostStore, StoreError};
use crate::model::network::{Post, PostDraft, Posts};
use crate::validate::{validate, PropertyError};

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    ValidationFailed(#[from] PropertyError),

    #[error("Post with slug '{0}' already exists.")]
    DuplicateSlug(String),

    #[error("No post with id {0} exists.")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create, update and delete posts against a [`PostStore`].
///
/// Every mutation holds `mutation` from load to persist, so concurrent
/// writers are applied one after another and none of them is lost.
pub struct PostService {
    store: Box<dyn PostStore>,
    mutation: Mutex<()>,
}

impl PostService {
    pub fn new(store: impl PostStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            mutation: Mutex::new(()),
        }
    }

    /// All posts keyed by id, in `dateCreated` order.
    pub async fn posts(&self) -> Result<Posts, ServiceError> {
        let mut posts = self.store.load().await?;
        posts.sort_by(|_, a, _, b| a.draft.date_created.total_cmp(&b.draft.date_created));
        Ok(posts)
    }

    /// All posts in `dateCreated` order. Ties keep storage order.
    pub async fn list(&self) -> Result<Vec<Post>, ServiceError> {
        Ok(self.posts().await?.into_values().collect())
    }

    pub async fn create(&self, raw: Value) -> Result<Post, ServiceError> {
        let draft: PostDraft = validate(raw).inspect_err(|err| {
            tracing::debug!(key = %err.key, "rejected post creation: {}", err);
        })?;

        let _guard = self.mutation.lock().await;
        let mut posts = self.store.load().await?;

        if posts.values().any(|post| post.draft.slug == draft.slug) {
            return Err(ServiceError::DuplicateSlug(draft.slug));
        }

        let id = loop {
            let id = Uuid::new_v4().to_string();
            if !posts.contains_key(&id) {
                break id;
            }
        };

        let post = Post { draft, id };
        posts.insert(post.id.clone(), post.clone());
        self.store.replace_all(posts).await?;

        tracing::info!(id = %post.id, slug = %post.draft.slug, "created post");
        Ok(post)
    }

    /// Replaces the stored post with the same id. No field-level merge.
    pub async fn update(&self, raw: Value) -> Result<Post, ServiceError> {
        let post: Post = validate(raw).inspect_err(|err| {
            tracing::debug!(key = %err.key, "rejected post update: {}", err);
        })?;

        let _guard = self.mutation.lock().await;
        let mut posts = self.store.load().await?;

        let Some(existing) = posts.get(&post.id) else {
            return Err(ServiceError::NotFound(post.id));
        };

        if existing.draft.slug != post.draft.slug
            && posts.values().any(|other| other.draft.slug == post.draft.slug)
        {
            return Err(ServiceError::DuplicateSlug(post.draft.slug));
        }

        posts.insert(post.id.clone(), post.clone());
        self.store.replace_all(posts).await?;

        tracing::info!(id = %post.id, slug = %post.draft.slug, "updated post");
        Ok(post)
    }

    /// Removing an id that does not exist is not an error.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let _guard = self.mutation.lock().await;
        let mut posts = self.store.load().await?;

        match posts.shift_remove(id) {
            Some(post) => tracing::info!(id, slug = %post.draft.slug, "deleted post"),
            None => tracing::debug!(id, "delete of unknown post"),
        }

        self.store.replace_all(posts).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::database::memory::MemoryStore;
    use crate::model::network::Timestamp;
    use crate::validate::PropertyErrorKind;
    use serde_json::json;

    fn request(slug: &str, created: i64) -> Value {
        json!({
            "slug": slug,
            "title": "Hello",
            "description": "d",
            "dateCreated": created,
            "dateModified": created,
            "content": "# hi",
        })
    }

    fn service() -> (PostService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (PostService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_on_empty_collection() {
        let (service, store) = service();

        let post = service.create(request("hello-world", 1000)).await.unwrap();
        assert!(!post.id.is_empty());

        let mut expected = request("hello-world", 1000);
        expected["id"] = json!(post.id);
        assert_eq!(serde_json::to_value(&post).unwrap(), expected);

        let posts = service.posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts.get(&post.id), Some(&post));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected_without_mutation() {
        let (service, store) = service();
        service.create(request("dup", 1)).await.unwrap();

        let err = service.create(request("dup", 2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateSlug(ref slug) if slug == "dup"));
        let message = err.to_string();
        assert!(message.contains("dup"));
        assert!(message.contains("already exists"));

        let posts = service.list().await.unwrap();
        assert_eq!(posts.iter().filter(|p| p.draft.slug == "dup").count(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn validation_failure_names_the_field() {
        let (service, store) = service();

        let mut raw = request("a", 1);
        raw.as_object_mut().unwrap().remove("description");
        let err = service.create(raw).await.unwrap_err();
        match err {
            ServiceError::ValidationFailed(err) => {
                assert_eq!(err.key, "description");
                assert_eq!(err.kind, PropertyErrorKind::MissingKey);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = service.update(request("a", 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(ref err) if err.key == "id"));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn update_replaces_the_whole_record() {
        let (service, _store) = service();
        let created = service.create(request("first", 10)).await.unwrap();

        let mut raw = request("renamed", 10);
        raw["id"] = json!(created.id);
        raw["title"] = json!("New title");
        raw["dateModified"] = json!(20);
        let updated = service.update(raw).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.draft.slug, "renamed");
        assert_eq!(updated.draft.date_modified, Timestamp::from(20_i64));

        let posts = service.posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[&created.id], updated);
    }

    #[tokio::test]
    async fn update_keeping_own_slug_is_allowed() {
        let (service, _store) = service();
        let created = service.create(request("same", 10)).await.unwrap();

        let mut raw = request("same", 10);
        raw["id"] = json!(created.id);
        raw["content"] = json!("edited");
        let updated = service.update(raw).await.unwrap();
        assert_eq!(updated.draft.content, "edited");
    }

    #[tokio::test]
    async fn update_cannot_take_another_posts_slug() {
        let (service, store) = service();
        service.create(request("taken", 1)).await.unwrap();
        let other = service.create(request("mine", 2)).await.unwrap();

        let mut raw = request("taken", 2);
        raw["id"] = json!(other.id);
        let err = service.update(raw).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateSlug(ref slug) if slug == "taken"));

        assert_eq!(service.posts().await.unwrap()[&other.id].draft.slug, "mine");
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let (service, store) = service();
        service.create(request("a", 1)).await.unwrap();
        let before = service.posts().await.unwrap();

        let mut raw = request("b", 1);
        raw["id"] = json!("missing");
        let err = service.update(raw).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref id) if id == "missing"));
        assert_eq!(err.to_string(), "No post with id missing exists.");

        assert_eq!(service.posts().await.unwrap(), before);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (service, _store) = service();
        let post = service.create(request("a", 1)).await.unwrap();
        let before = service.posts().await.unwrap();

        service.delete("nope").await.unwrap();
        assert_eq!(service.posts().await.unwrap(), before);

        service.delete(&post.id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());

        service.delete(&post.id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_orders_by_date_created() {
        let (service, _store) = service();
        service.create(request("late", 300)).await.unwrap();
        service.create(request("early", 100)).await.unwrap();
        service.create(request("tie-a", 200)).await.unwrap();
        service.create(request("tie-b", 200)).await.unwrap();

        let slugs: Vec<_> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.draft.slug)
            .collect();
        assert_eq!(slugs, ["early", "tie-a", "tie-b", "late"]);
    }

    #[tokio::test]
    async fn concurrent_creates_are_not_lost() {
        let (service, store) = service();
        let service = Arc::new(service);

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let service = service.clone();
                tokio::spawn(async move { service.create(request(&format!("post-{n}"), n)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.list().await.unwrap().len(), 16);
        assert_eq!(store.writes(), 16);
    }

    #[tokio::test]
    async fn concurrent_duplicate_creates_keep_one() {
        let (service, _store) = service();
        let service = Arc::new(service);

        let a = tokio::spawn({
            let service = service.clone();
            async move { service.create(request("dup", 1)).await }
        });
        let b = tokio::spawn({
            let service = service.clone();
            async move { service.create(request("dup", 2)).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }
}
