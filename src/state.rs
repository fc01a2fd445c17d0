//! Application state shared across all request handlers

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::database::EmbeddedStore;
use crate::error::StoreError;
use crate::hosted::HostedStore;
use crate::render::Pages;
use crate::store::{ContentStore, ObjectStore};

#[derive(Clone)]
pub struct AppState {
    /// Relational data: users, sessions, folders, links
    pub store: Arc<dyn ContentStore>,

    /// Uploaded file bytes of the `content` bucket
    pub objects: Arc<dyn ObjectStore>,

    pub pages: Arc<Pages>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to load templates: {0}")]
    Templates(#[from] tera::Error),
}

impl AppState {
    pub fn new(
        store: Arc<dyn ContentStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<Self, StartupError> {
        Ok(Self {
            store,
            objects,
            pages: Arc::new(Pages::new()?),
        })
    }

    /// One redb file serves as both the Content Store and the object store
    pub fn embedded(store: EmbeddedStore) -> Result<Self, StartupError> {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StartupError> {
        match config {
            StoreConfig::Embedded { path } => Self::embedded(EmbeddedStore::open(path)?),
            StoreConfig::Hosted { url, key } => {
                let store = Arc::new(HostedStore::new(url.clone(), key.clone()));
                Self::new(store.clone(), store)
            }
        }
    }
}
