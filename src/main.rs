use std::process::exit;

use actix::prelude::*;
use actix_web::{middleware, web, App, HttpServer};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use blogging::config::Config;
use blogging::db::{self, DbExecutor};
use blogging::routes;
use blogging::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            exit(1);
        }
    };

    let pool = match db::init_pool(&config.database_url, config.db_pool_size) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Error: {}", e);
            exit(1);
        }
    };

    let migrated = pool
        .get()
        .map_err(failure::Error::from)
        .and_then(|mut conn| db::run_migrations(&mut conn));
    match migrated {
        Ok(0) => {}
        Ok(n) => info!("Applied {} migrations", n),
        Err(e) => {
            error!("Error: {}", e);
            exit(1);
        }
    }

    let executor_pool = pool.clone();
    let addr = SyncArbiter::start(config.db_workers.max(1), move || DbExecutor(executor_pool.clone()));

    if let Err(e) = std::fs::create_dir_all(config.media_root.join("posts")) {
        error!("Error: cannot create {}: {}", config.media_root.display(), e);
        exit(1);
    }

    let bind_address = config.bind_address.clone();
    let media_root = config.media_root.clone();
    let state = web::Data::new(AppState::new(addr, config));

    info!("Listening on {}", bind_address);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes::configure(media_root.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
