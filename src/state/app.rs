use super::AppState;
use crate::trivia::TriviaResult;

impl AppState {
    /// Whether gameplay is enabled. Asks the backend and refreshes the cache;
    /// falls back to the cached value when the backend can't be reached.
    pub async fn is_app_active(&self) -> bool {
        match self.trivia.app_status().await {
            Ok(active) => {
                *self.app_active.write().await = active;
                active
            }
            Err(e) => {
                let cached = *self.app_active.read().await;
                tracing::warn!("Failed to refresh app status ({}), using cached value {}", e, cached);
                cached
            }
        }
    }

    pub async fn cached_app_active(&self) -> bool {
        *self.app_active.read().await
    }

    /// Toggle gameplay on the backend, then mirror the stored value locally
    pub async fn set_app_active(&self, active: bool) -> TriviaResult<bool> {
        let stored = self.trivia.set_app_status(active).await?;
        *self.app_active.write().await = stored;
        tracing::info!(active = stored, "App status changed");
        Ok(stored)
    }
}
