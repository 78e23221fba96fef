use crate::config::AppConfig;
use crate::store::RecordStore;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: Arc<RwLock<Arc<dyn RecordStore>>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Current record store. Requests keep the handle they started with
    /// even if the store is replaced meanwhile.
    pub async fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&*self.store.read().await)
    }

    pub async fn replace_store(&self, store: Arc<dyn RecordStore>) {
        *self.store.write().await = store;
    }
}
