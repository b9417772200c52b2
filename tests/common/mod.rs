#![allow(dead_code)]

use std::path::PathBuf;

use actix::prelude::*;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::test::TestRequest;
use actix_web::web;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use uuid::Uuid;

use blogging::config::Config;
use blogging::db::{self, DbExecutor, SqlitePool};
use blogging::models::PostInsert;
use blogging::schema::{comments, follows, posts};
use blogging::state::AppState;

/// Builds the routed app around a harness' state.
macro_rules! app {
    ($harness:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($harness.state.clone())
                .configure(blogging::routes::configure($harness.media_root.clone())),
        )
        .await
    };
}

pub const BOUNDARY: &str = "----blogging-test-boundary";

pub struct Harness {
    pub state: web::Data<AppState>,
    pub pool: SqlitePool,
    pub media_root: PathBuf,
}

impl Harness {
    /// Fresh in-memory database with the index cache switched off.
    pub fn new() -> Harness {
        Harness::with_cache(0)
    }

    pub fn with_cache(index_cache_seconds: u64) -> Harness {
        let pool = db::init_pool(":memory:", 1).unwrap();
        db::run_migrations(&mut pool.get().unwrap()).unwrap();

        let executor_pool = pool.clone();
        let addr = SyncArbiter::start(1, move || DbExecutor(executor_pool.clone()));

        let media_root = std::env::temp_dir().join(format!("blogging-test-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&media_root).unwrap();
        let config = Config {
            database_url: ":memory:".to_string(),
            media_root: media_root.clone(),
            index_cache_seconds,
            ..Config::default()
        };

        Harness {
            state: web::Data::new(AppState::new(addr, config)),
            pool,
            media_root,
        }
    }

    /// Runs `f` on a pooled connection and hands it back before returning.
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> T) -> T {
        let mut conn = self.pool.get().unwrap();
        f(&mut conn)
    }

    pub fn user(&self, username: &str) -> i32 {
        self.with_conn(|conn| db::create_user(conn, username, "!").unwrap().unwrap())
    }

    pub fn group(&self, title: &str, slug: &str) -> i32 {
        self.with_conn(|conn| db::create_group(conn, title, slug, "").unwrap())
    }

    pub fn post(&self, author_id: i32, group_id: Option<i32>, text: &str) -> i32 {
        self.with_conn(|conn| {
            db::create_post(
                conn,
                &PostInsert {
                    text: text.to_string(),
                    pub_date: Utc::now().naive_utc(),
                    author_id,
                    group_id,
                    image: None,
                },
            )
            .unwrap()
        })
    }

    /// Session cookie for an already existing user.
    pub fn login(&self, user_id: i32) -> Cookie<'static> {
        let key = self.with_conn(|conn| db::create_session(conn, user_id).unwrap());
        Cookie::new("sessionid", key)
    }

    pub fn post_count(&self) -> i64 {
        self.with_conn(|conn| posts::table.count().get_result(conn).unwrap())
    }

    pub fn comment_count(&self) -> i64 {
        self.with_conn(|conn| comments::table.count().get_result(conn).unwrap())
    }

    pub fn follow_count(&self) -> i64 {
        self.with_conn(|conn| follows::table.count().get_result(conn).unwrap())
    }

    pub fn post_text(&self, post_id: i32) -> String {
        self.with_conn(|conn| {
            posts::table
                .find(post_id)
                .select(posts::text)
                .first(conn)
                .unwrap()
        })
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}

/// Builds a `multipart/form-data` body from text fields and an optional
/// `(filename, content type, bytes)` image.
pub fn multipart(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for &(name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }

    if let Some((filename, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn multipart_post(uri: &str, fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> TestRequest {
    let (content_type, body) = multipart(fields, image);
    TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
}

pub fn location(resp: &ServiceResponse) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\
\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\
\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";
