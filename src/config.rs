use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use failure::{format_err, Error};
use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "blogging.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub media_root: PathBuf,
    /// Lifetime of cached index pages; zero turns the cache off.
    pub index_cache_seconds: u64,
    pub max_upload_bytes: usize,
    pub db_pool_size: u32,
    pub db_workers: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_address: "127.0.0.1:8000".to_string(),
            media_root: PathBuf::from("media"),
            index_cache_seconds: 20,
            max_upload_bytes: 5 * 1024 * 1024,
            db_pool_size: 8,
            db_workers: 4,
        }
    }
}

impl Config {
    /// Reads settings from the environment, after loading `.env` if present.
    pub fn load() -> Result<Config, Error> {
        let _ = dotenv::dotenv();
        let defaults = Config::default();

        Ok(Config {
            database_url: try_load("DATABASE_URL", defaults.database_url)?,
            bind_address: try_load("BIND_ADDRESS", defaults.bind_address)?,
            media_root: try_load("MEDIA_ROOT", defaults.media_root.display())?,
            index_cache_seconds: try_load("INDEX_CACHE_SECONDS", defaults.index_cache_seconds)?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            db_pool_size: try_load("DB_POOL_SIZE", defaults.db_pool_size)?,
            db_workers: try_load("DB_WORKERS", defaults.db_workers)?,
        })
    }
}

fn try_load<T: FromStr, D: Display>(key: &str, default: D) -> Result<T, Error>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {} value: {}", key, e);
        format_err!("invalid value for {}: {}", key, e)
    })
}
