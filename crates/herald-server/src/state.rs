use herald_core::IngestService;
use herald_core::traits::{FeedSource, FeedStore};

/// Shared application state, available to all route handlers via `State<Arc<AppState<F, S>>>`.
pub struct AppState<F, S>
where
    F: FeedSource,
    S: FeedStore,
{
    pub service: IngestService<F, S>,
}

impl<F, S> AppState<F, S>
where
    F: FeedSource,
    S: FeedStore,
{
    pub fn new(service: IngestService<F, S>) -> Self {
        Self { service }
    }
}
