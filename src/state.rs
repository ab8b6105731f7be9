use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::rate_limit::RateLimits;
use crate::sgg::{SggProxy, Upstream};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub sgg: Arc<SggProxy>,
    pub limits: Arc<RateLimits>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, upstream: Arc<dyn Upstream>) -> Self {
        let sgg = SggProxy::new(
            upstream,
            config.startgg.cache_ttl(),
            config.startgg.cache_max_entries,
        );
        let limits = RateLimits::from_config(&config.rate_limits);
        Self {
            db,
            config,
            sgg: Arc::new(sgg),
            limits: Arc::new(limits),
        }
    }
}
