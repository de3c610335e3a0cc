use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::network::Posts;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("could not access post store {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed post store document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("post stored under key '{key}' has id '{id}'")]
    KeyMismatch { key: String, id: String },
}

/// Whole-collection persistence. There are no incremental writes: callers
/// load everything, mutate in memory and hand the full collection back.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn load(&self) -> Result<Posts, StoreError>;
    async fn replace_all(&self, posts: Posts) -> Result<(), StoreError>;
}

/// The on-disk document. Top-level keys other than `posts` are carried
/// through writes untouched.
#[derive(Serialize, Deserialize, Debug)]
struct Document {
    #[serde(default)]
    posts: Posts,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// A single JSON file holding `{ "posts": { [id]: Post } }`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read_document(&self) -> Result<Document, StoreError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|err| self.io_error(err))?;
        let document: Document = serde_json::from_slice(&raw)?;

        let misfiled = document
            .posts
            .iter()
            .find(|(key, post)| post.id.is_empty() || **key != post.id);
        if let Some((key, post)) = misfiled {
            return Err(StoreError::KeyMismatch {
                key: key.clone(),
                id: post.id.clone(),
            });
        }

        Ok(document)
    }
}

#[async_trait]
impl PostStore for JsonFileStore {
    async fn load(&self) -> Result<Posts, StoreError> {
        Ok(self.read_document().await?.posts)
    }

    async fn replace_all(&self, posts: Posts) -> Result<(), StoreError> {
        let mut document = self.read_document().await?;
        document.posts = posts;

        let mut raw = serde_json::to_vec_pretty(&document)?;
        raw.push(b'\n');

        // readers see either the old or the new document
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, raw)
            .await
            .map_err(|err| self.io_error(err))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| self.io_error(err))?;

        tracing::debug!(path = %self.path.display(), "wrote post store");
        Ok(())
    }
}
