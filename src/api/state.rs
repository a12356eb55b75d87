use std::sync::Arc;

use crate::{
    cache::PosterStore,
    config::Config,
    services::{
        ImageMatchEngine, MoodSearchEngine, PacedCatalog, ProviderRegistry, SceneSearchEngine,
        SimilarTitlesEngine, TrendingRanker, VibeSearchEngine,
    },
};

/// Shared application state
///
/// Every engine is built over the same [`PacedCatalog`], so all of them draw
/// from one upstream request budget. Slots are handed out process-wide in
/// arrival order: concurrent requests queue behind each other, and a video
/// search loading its poster corpus delays a trending call issued meanwhile.
#[derive(Clone)]
pub struct AppState {
    pub vibe_search: VibeSearchEngine,
    pub scene_search: SceneSearchEngine,
    pub similar_titles: SimilarTitlesEngine,
    pub mood_search: MoodSearchEngine,
    pub trending: TrendingRanker,
    pub providers: ProviderRegistry,
}

impl AppState {
    pub fn new(
        catalog: PacedCatalog,
        providers: ProviderRegistry,
        posters: Arc<dyn PosterStore>,
        trending_region: impl Into<String>,
        trending_languages: Vec<String>,
    ) -> Self {
        let matcher = ImageMatchEngine::new(catalog.clone(), posters);

        Self {
            vibe_search: VibeSearchEngine::new(catalog.clone(), providers.clone()),
            scene_search: SceneSearchEngine::new(catalog.clone(), providers.clone(), matcher),
            similar_titles: SimilarTitlesEngine::new(catalog.clone()),
            mood_search: MoodSearchEngine::new(catalog.clone()),
            trending: TrendingRanker::new(catalog, trending_region, trending_languages),
            providers,
        }
    }

    pub fn from_config(
        config: &Config,
        catalog: PacedCatalog,
        providers: ProviderRegistry,
        posters: Arc<dyn PosterStore>,
    ) -> Self {
        Self::new(
            catalog,
            providers,
            posters,
            config.trending_region.clone(),
            config.trending_languages.clone(),
        )
    }
}
