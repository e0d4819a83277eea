use axum::Router;

use crate::{Config, PgStore};

mod get_observations;
mod get_summaries;
mod health;
mod recompute_summaries;

// ---

pub fn router(store: PgStore, config: Config) -> Router {
    // ---
    Router::new()
        .merge(get_observations::router())
        .merge(get_summaries::router())
        .merge(recompute_summaries::router())
        .merge(health::router())
        .with_state((store, config))
}
