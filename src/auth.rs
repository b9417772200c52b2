use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use futures::future::LocalBoxFuture;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::db;
use crate::error::Error;
use crate::forms::{FormContext, LoginForm, SignupForm};
use crate::messages::*;
use crate::models::User;
use crate::responses::{LoginContext, SignupContext};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/auth/login/";

/// Characters left readable in the `next` parameter.
const NEXT_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, utf8_percent_encode(next, NEXT_PARAM))
}

pub fn hash_password(password: &str) -> Result<String, failure::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| failure::err_msg(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Unparseable hashes (including the `!` unusable marker) never verify.
pub fn verify_password(user: &User, password: &str) -> bool {
    let hash = match PasswordHash::new(&user.password_hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

fn full_path(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string())
}

/// The signed-in user of the current request, if any.
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.id)
    }

    /// Gate for login-only routes.
    pub fn require(&self, req: &HttpRequest) -> Result<&User, Error> {
        self.0.as_ref().ok_or_else(|| Error::LoginRequired {
            next: full_path(req),
        })
    }
}

impl FromRequest for Viewer {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Viewer, Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let key = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            match (key, state) {
                (Some(key), Some(state)) => {
                    let user = state.db.send(LookupSession { key }).await??;
                    Ok(Viewer(user))
                }
                _ => Ok(Viewer(None)),
            }
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_form(query: web::Query<NextQuery>) -> HttpResponse {
    HttpResponse::Ok().json(LoginContext {
        form: FormContext::default(),
        next: query.into_inner().next.unwrap_or_default(),
    })
}

pub async fn login(state: web::Data<AppState>, form: web::Form<LoginForm>) -> Result<HttpResponse, Error> {
    let form = form.into_inner();

    if let Err(context) = form.validate() {
        return Ok(HttpResponse::Ok().json(LoginContext { form: context, next: form.next }));
    }

    let user = state
        .db
        .send(FindUser {
            username: form.username.trim().to_string(),
        })
        .await??;

    let user = match user {
        Some(user) => {
            let password = form.password.clone();
            let checked = user.clone();
            if web::block(move || verify_password(&checked, &password)).await? {
                Some(user)
            } else {
                None
            }
        }
        None => None,
    };

    let user = match user {
        Some(user) => user,
        None => {
            tracing::debug!(username = %form.username, "rejected login");
            return Ok(HttpResponse::Ok().json(LoginContext {
                form: form.rejected(),
                next: form.next,
            }));
        }
    };

    let key = state.db.send(StartSession { user_id: user.id }).await??;
    tracing::info!(username = %user.username, "user logged in");

    let cookie = Cookie::build(SESSION_COOKIE, key)
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::days(db::SESSION_DAYS))
        .finish();

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, safe_next(&form.next)))
        .cookie(cookie)
        .finish())
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state
            .db
            .send(EndSession {
                key: cookie.value().to_string(),
            })
            .await??;
    }

    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(removal)
        .finish())
}

pub async fn signup_form() -> HttpResponse {
    HttpResponse::Ok().json(SignupContext {
        form: FormContext::default(),
    })
}

pub async fn signup(state: web::Data<AppState>, form: web::Form<SignupForm>) -> Result<HttpResponse, Error> {
    let form = form.into_inner();

    let username = match form.validate() {
        Ok(username) => username,
        Err(context) => return Ok(HttpResponse::Ok().json(SignupContext { form: context })),
    };

    let password = form.password1.clone();
    let password_hash = web::block(move || hash_password(&password)).await??;

    let created = state
        .db
        .send(MakeUser {
            username: username.clone(),
            password_hash,
        })
        .await??;

    if created.is_none() {
        return Ok(HttpResponse::Ok().json(SignupContext { form: form.taken() }));
    }

    tracing::info!(username = %username, "user signed up");
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, LOGIN_URL))
        .finish())
}
