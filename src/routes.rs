use std::path::PathBuf;

use actix_files::Files;
use actix_web::web;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{about, auth, error, views};

/// Bytes that may not appear raw inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub fn profile_url(username: &str) -> String {
    format!("/{}/", utf8_percent_encode(username, SEGMENT))
}

pub fn post_url(username: &str, post_id: i32) -> String {
    format!("/{}/{}/", utf8_percent_encode(username, SEGMENT), post_id)
}

/// Fixed paths are registered before the `{username}` patterns so they win.
/// Uploaded images are served from `media_root` under `/media/`.
pub fn configure(media_root: PathBuf) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.service(
            web::scope("")
                .wrap(error::error_handlers())
                .service(Files::new("/media", media_root))
                .route("/", web::get().to(views::index))
                .route("/group/{slug}/", web::get().to(views::group_posts))
                .service(
                    web::resource("/new/")
                        .route(web::get().to(views::new_post_form))
                        .route(web::post().to(views::new_post)),
                )
                .route("/follow/", web::get().to(views::follow_index))
                .route("/about/author/", web::get().to(about::author))
                .route("/about/tech/", web::get().to(about::tech))
                .service(
                    web::resource("/auth/login/")
                        .route(web::get().to(auth::login_form))
                        .route(web::post().to(auth::login)),
                )
                .route("/auth/logout/", web::get().to(auth::logout))
                .service(
                    web::resource("/auth/signup/")
                        .route(web::get().to(auth::signup_form))
                        .route(web::post().to(auth::signup)),
                )
                .route("/404/", web::get().to(error::page_not_found))
                .route("/500/", web::get().to(error::server_error))
                .route("/{username}/", web::get().to(views::profile))
                .route("/{username}/follow", web::get().to(views::profile_follow))
                .route("/{username}/unfollow", web::get().to(views::profile_unfollow))
                .route(r"/{username}/{post_id:\d+}/", web::get().to(views::post_view))
                .service(
                    web::resource(r"/{username}/{post_id:\d+}/edit/")
                        .route(web::get().to(views::post_edit_form))
                        .route(web::post().to(views::post_edit)),
                )
                .route(r"/{username}/{post_id:\d+}/comment", web::post().to(views::add_comment))
                .default_service(web::to(error::page_not_found)),
        );
    }
}
