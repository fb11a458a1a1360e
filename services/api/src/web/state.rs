//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use crate::config::Config;
use crate::web::rate_limit::RateLimiter;
use agent_metrics_core::classify::{AllowListClassifier, Classifier};
use agent_metrics_core::ports::{DatabaseService, InsightService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub classifier: Arc<dyn Classifier>,
    /// `None` when no LLM key is configured; the insights endpoint then answers 503.
    pub insights: Option<Arc<dyn InsightService>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Builds the state, deriving the classifier and rate limiter from `config`.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        insights: Option<Arc<dyn InsightService>>,
    ) -> Self {
        let classifier = Arc::new(AllowListClassifier::from_csv(&config.no_showings_agents));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));
        Self {
            db,
            config,
            classifier,
            insights,
            rate_limiter,
        }
    }
}
