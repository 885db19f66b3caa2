use std::sync::Arc;

use crate::{
    db::WatchlistStore,
    error::{AppError, AppResult},
    models::{AddWatchlistRequest, WatchlistEntry},
};

/// Watchlist rules on top of the store: validation and the per-user cap
pub struct WatchlistService {
    store: Arc<dyn WatchlistStore>,
    max_items: i64,
}

impl WatchlistService {
    pub fn new(store: Arc<dyn WatchlistStore>, max_items: i64) -> Self {
        Self { store, max_items }
    }

    pub async fn list(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>> {
        self.store.list_entries(user_id).await
    }

    /// Adds or refreshes an entry; only brand new titles count against the cap
    pub async fn add(
        &self,
        user_id: &str,
        mut request: AddWatchlistRequest,
    ) -> AppResult<WatchlistEntry> {
        if let Some(problem) = request.validation_error() {
            return Err(AppError::InvalidInput(problem));
        }
        request.title = request.title.trim().to_string();

        let Some(entry) = self
            .store
            .upsert_entry(user_id, request, self.max_items)
            .await?
        else {
            return Err(AppError::InvalidInput(format!(
                "Watchlist is full (max {} items)",
                self.max_items
            )));
        };
        tracing::debug!(tmdb_id = entry.tmdb_id, "Watchlist entry saved");
        Ok(entry)
    }

    pub async fn remove(&self, user_id: &str, tmdb_id: i64) -> AppResult<()> {
        if self.store.remove_entry(user_id, tmdb_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Title {} is not on the watchlist",
                tmdb_id
            )))
        }
    }
}
