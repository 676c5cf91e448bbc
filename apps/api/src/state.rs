use std::sync::Arc;

use crate::config::Config;
use crate::popularity::clock::Clock;
use crate::popularity::elo::RatingEngine;
use crate::popularity::pairing::{IdSampler, PairingManager};
use crate::store::{RatingStore, SessionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ratings: RatingEngine,
    pub pairing: PairingManager,
}

impl AppState {
    pub fn new(
        config: Config,
        rating_store: Arc<dyn RatingStore>,
        session_store: Arc<dyn SessionStore>,
        sampler: Arc<dyn IdSampler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ratings = RatingEngine::new(rating_store);
        let pairing = PairingManager::new(
            session_store,
            ratings.clone(),
            sampler,
            clock,
            config.session_ttl,
        );
        Self {
            config,
            ratings,
            pairing,
        }
    }
}
