use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppResult;

pub mod catalog;
pub mod fingerprint;
pub mod image_match;
pub mod mood;
pub mod providers;
pub mod retry;
pub mod scene_search;
pub mod similar_titles;
pub mod similarity;
pub mod taxonomy;
pub mod trending;
pub mod vibe_search;

pub use catalog::{CatalogClient, TmdbClient};
pub use image_match::ImageMatchEngine;
pub use mood::MoodSearchEngine;
pub use providers::ProviderRegistry;
pub use retry::{RequestScheduler, RetryPolicy};
pub use scene_search::SceneSearchEngine;
pub use similar_titles::SimilarTitlesEngine;
pub use trending::TrendingRanker;
pub use vibe_search::VibeSearchEngine;

/// Catalog client plus the pacing and retry policy every engine applies to it
///
/// Cloning is cheap and clones share one scheduler, so all engines built
/// from the same value draw from the same request budget.
#[derive(Clone)]
pub struct PacedCatalog {
    client: Arc<dyn CatalogClient>,
    scheduler: RequestScheduler,
    retry: RetryPolicy,
}

impl PacedCatalog {
    pub fn new(client: Arc<dyn CatalogClient>, scheduler: RequestScheduler, retry: RetryPolicy) -> Self {
        Self {
            client,
            scheduler,
            retry,
        }
    }

    /// Calls go straight through: no spacing, a single attempt
    pub fn without_pacing(client: Arc<dyn CatalogClient>) -> Self {
        Self::new(
            client,
            RequestScheduler::new(Duration::ZERO),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
            },
        )
    }

    pub fn client(&self) -> &dyn CatalogClient {
        self.client.as_ref()
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Waits for a scheduler slot before each attempt and retries transient failures
    pub async fn call<T, F, Fut>(&self, label: &str, operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.scheduler.call(&self.retry, label, operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MockCatalogClient;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_one_request_budget() {
        let mut client = MockCatalogClient::new();
        client.expect_now_playing().returning(|_| Ok(Vec::new()));

        let catalog = PacedCatalog::new(
            Arc::new(client),
            RequestScheduler::new(Duration::from_millis(300)),
            RetryPolicy::default(),
        );
        let other_engine = catalog.clone();
        let started = Instant::now();

        catalog.call("first", || catalog.client().now_playing("IN")).await.unwrap();
        other_engine
            .call("second", || other_engine.client().now_playing("IN"))
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }
}
