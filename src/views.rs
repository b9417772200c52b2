use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::prelude::*;

use crate::auth::Viewer;
use crate::error::Error;
use crate::forms::{CommentForm, FormContext, ImageAction, PostForm};
use crate::messages::*;
use crate::models::{Group, PostInsert};
use crate::paginator::Paginator;
use crate::responses::*;
use crate::routes::{post_url, profile_url};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

fn found(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Back to where the user came from, or to the author's profile.
fn back_or_profile(req: &HttpRequest, username: &str) -> HttpResponse {
    let referer = req
        .headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string());

    match referer {
        Some(location) => found(&location),
        None => found(&profile_url(username)),
    }
}

fn group_choices(groups: &[Group]) -> Vec<GroupChoice> {
    groups
        .iter()
        .map(|g| GroupChoice {
            id: g.id,
            title: g.title.clone(),
        })
        .collect()
}

pub async fn index(state: web::Data<AppState>, query: web::Query<PageQuery>) -> Result<HttpResponse, Error> {
    let page = query.into_inner().page;
    let requested = Paginator::requested(page.as_deref()).to_string();

    if let Some(body) = state.index_cache.get(&requested) {
        return Ok(HttpResponse::Ok().content_type("application/json").body(body));
    }

    let page = state
        .db
        .send(ListPosts {
            filter: PostFilter::All,
            page,
        })
        .await??;

    // stored under the page actually served, so out-of-range numbers add nothing
    let key = page.number.to_string();
    let body = web::Bytes::from(serde_json::to_vec(&IndexContext { page }).map_err(failure::Error::from)?);
    state.index_cache.insert(key, body.clone());

    Ok(HttpResponse::Ok().content_type("application/json").body(body))
}

pub async fn group_posts(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let context = state
        .db
        .send(GroupListing {
            slug: slug.into_inner(),
            page: query.into_inner().page,
        })
        .await??
        .ok_or(Error::NotFound)?;

    Ok(HttpResponse::Ok().json(context))
}

pub async fn profile(
    state: web::Data<AppState>,
    viewer: Viewer,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let context = state
        .db
        .send(ProfileListing {
            username: username.into_inner(),
            viewer: viewer.id(),
            page: query.into_inner().page,
        })
        .await??
        .ok_or(Error::NotFound)?;

    Ok(HttpResponse::Ok().json(context))
}

pub async fn post_view(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<(String, i32)>,
) -> Result<HttpResponse, Error> {
    let (username, post_id) = path.into_inner();

    let (detail, following) = state
        .db
        .send(ShowPost {
            username,
            post_id,
            viewer: viewer.id(),
        })
        .await??
        .ok_or(Error::NotFound)?;

    Ok(HttpResponse::Ok().json(PostContext {
        detail,
        following,
        form: FormContext::default(),
    }))
}

pub async fn new_post_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
) -> Result<HttpResponse, Error> {
    viewer.require(&req)?;
    let groups = state.db.send(ListGroups).await??;

    Ok(HttpResponse::Ok().json(PostFormContext {
        is_edit: false,
        form: FormContext::default(),
        groups: group_choices(&groups),
        post: None,
    }))
}

pub async fn new_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;
    let submitted = PostForm::from_multipart(payload, state.config.max_upload_bytes).await?;
    let groups = state.db.send(ListGroups).await??;

    let valid = match submitted.validate(&groups) {
        Ok(valid) => valid,
        Err(form) => {
            return Ok(HttpResponse::Ok().json(PostFormContext {
                is_edit: false,
                form,
                groups: group_choices(&groups),
                post: None,
            }))
        }
    };

    let image = match valid.image {
        ImageAction::Replace(upload) => {
            let root = state.config.media_root.clone();
            Some(web::block(move || upload.store(&root)).await??)
        }
        ImageAction::Keep | ImageAction::Clear => None,
    };

    let post_id = state
        .db
        .send(MakePost(PostInsert {
            text: valid.text,
            pub_date: Utc::now().naive_utc(),
            author_id: user.id,
            group_id: valid.group_id,
            image,
        }))
        .await??;

    tracing::info!(post_id, author = %user.username, "post created");
    Ok(found("/"))
}

pub async fn post_edit_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<(String, i32)>,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;
    let (username, post_id) = path.into_inner();

    if user.username != username {
        return Ok(found(&post_url(&username, post_id)));
    }

    let detail = state
        .db
        .send(ShowPost {
            username,
            post_id,
            viewer: None,
        })
        .await??
        .map(|(detail, _)| detail)
        .ok_or(Error::NotFound)?;
    let groups = state.db.send(ListGroups).await??;

    let group = detail
        .post
        .group
        .as_ref()
        .map(|g| g.id.to_string())
        .unwrap_or_default();
    let form = FormContext::default()
        .with_value("text", &detail.post.text)
        .with_value("group", &group);

    Ok(HttpResponse::Ok().json(PostFormContext {
        is_edit: true,
        form,
        groups: group_choices(&groups),
        post: Some(detail.post),
    }))
}

pub async fn post_edit(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<(String, i32)>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;
    let (username, post_id) = path.into_inner();

    if user.username != username {
        tracing::debug!(post_id, editor = %user.username, "edit by non-author redirected");
        return Ok(found(&post_url(&username, post_id)));
    }

    let post = state
        .db
        .send(FindPost {
            username: username.clone(),
            post_id,
        })
        .await??
        .ok_or(Error::NotFound)?;

    let submitted = PostForm::from_multipart(payload, state.config.max_upload_bytes).await?;
    let groups = state.db.send(ListGroups).await??;

    let valid = match submitted.validate(&groups) {
        Ok(valid) => valid,
        Err(form) => {
            let current = state
                .db
                .send(ShowPost {
                    username,
                    post_id,
                    viewer: None,
                })
                .await??
                .map(|(detail, _)| detail.post);

            return Ok(HttpResponse::Ok().json(PostFormContext {
                is_edit: true,
                form,
                groups: group_choices(&groups),
                post: current,
            }));
        }
    };

    let image = match valid.image {
        ImageAction::Keep => post.image,
        ImageAction::Clear => None,
        ImageAction::Replace(upload) => {
            let root = state.config.media_root.clone();
            Some(web::block(move || upload.store(&root)).await??)
        }
    };

    state
        .db
        .send(EditPost {
            post_id,
            text: valid.text,
            group_id: valid.group_id,
            image,
        })
        .await??;

    tracing::info!(post_id, author = %user.username, "post edited");
    Ok(found(&post_url(&username, post_id)))
}

pub async fn add_comment(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<(String, i32)>,
    payload: web::Payload,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;
    let (username, post_id) = path.into_inner();

    let post = state
        .db
        .send(FindPost {
            username: username.clone(),
            post_id,
        })
        .await??
        .ok_or(Error::NotFound)?;

    let form = CommentForm::from_payload(req.headers(), payload).await?;
    match form.validate() {
        Ok(text) => {
            state
                .db
                .send(MakeComment {
                    post_id: post.id,
                    author_id: user.id,
                    text,
                })
                .await??;
            tracing::info!(post_id, author = %user.username, "comment added");
        }
        Err(_) => tracing::debug!(post_id, "invalid comment ignored"),
    }

    Ok(found(&post_url(&username, post_id)))
}

pub async fn follow_index(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;

    let page = state
        .db
        .send(ListPosts {
            filter: PostFilter::FollowedBy(user.id),
            page: query.into_inner().page,
        })
        .await??;

    Ok(HttpResponse::Ok().json(FollowContext { page }))
}

pub async fn profile_follow(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    username: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;
    let username = username.into_inner();

    let created = state
        .db
        .send(FollowAuthor {
            user_id: user.id,
            username: username.clone(),
        })
        .await??
        .ok_or(Error::NotFound)?;

    if created {
        tracing::info!(follower = %user.username, author = %username, "follow added");
    }

    Ok(back_or_profile(&req, &username))
}

pub async fn profile_unfollow(
    req: HttpRequest,
    state: web::Data<AppState>,
    viewer: Viewer,
    username: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user = viewer.require(&req)?;
    let username = username.into_inner();

    let removed = state
        .db
        .send(UnfollowAuthor {
            user_id: user.id,
            username: username.clone(),
        })
        .await??
        .ok_or(Error::NotFound)?;

    if removed > 0 {
        tracing::info!(follower = %user.username, author = %username, "follow removed");
    }

    Ok(back_or_profile(&req, &username))
}
