//! Persistence boundary for registered resources.
//!
//! A key-value store keyed by resource URI. The registry rebuilds all
//! index state from disk on startup, so the store only holds resource
//! records, never index contents.

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::resource::Resource;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn put(&self, resource: &Resource) -> CoreResult<()>;
    async fn delete(&self, uri: &str) -> CoreResult<()>;
    async fn all(&self) -> CoreResult<Vec<Resource>>;
}

pub type SharedStore = Arc<dyn ResourceStore>;
