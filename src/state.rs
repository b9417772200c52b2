use std::time::Duration;

use actix::prelude::*;

use crate::cache::PageCache;
use crate::config::Config;
use crate::db::DbExecutor;

pub struct AppState {
    pub db: Addr<DbExecutor>,
    pub config: Config,
    pub index_cache: PageCache,
}

impl AppState {
    pub fn new(db: Addr<DbExecutor>, config: Config) -> AppState {
        let index_cache = PageCache::new(Duration::from_secs(config.index_cache_seconds));

        AppState {
            db,
            config,
            index_cache,
        }
    }
}
