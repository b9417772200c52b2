use actix::MailboxError;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::error::BlockingError;
use actix_web::http::{header, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpResponse, ResponseError};
use failure::Fail;

use crate::auth::login_url;
use crate::responses::{NotFoundContext, ServerErrorContext};

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "not found")]
    NotFound,
    /// The route needs a signed-in user; `next` is where to come back to.
    #[fail(display = "login required for {}", next)]
    LoginRequired { next: String },
    #[fail(display = "bad request: {}", _0)]
    BadRequest(String),
    #[fail(display = "internal error: {}", _0)]
    Internal(failure::Error),
}

impl From<failure::Error> for Error {
    fn from(err: failure::Error) -> Error {
        Error::Internal(err)
    }
}

impl From<MailboxError> for Error {
    fn from(err: MailboxError) -> Error {
        Error::Internal(failure::err_msg(format!("db executor unavailable: {}", err)))
    }
}

impl From<BlockingError> for Error {
    fn from(err: BlockingError) -> Error {
        Error::Internal(failure::err_msg(err.to_string()))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Internal(err.into())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match *self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::LoginRequired { .. } => StatusCode::FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match *self {
            Error::NotFound => HttpResponse::NotFound().finish(),
            Error::LoginRequired { ref next } => HttpResponse::Found()
                .insert_header((header::LOCATION, login_url(next)))
                .finish(),
            Error::BadRequest(ref reason) => HttpResponse::BadRequest().body(reason.clone()),
            Error::Internal(ref err) => {
                tracing::error!(error = %err, "request failed");
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

/// Renders every 404 and 500 leaving the app, whether produced by a handler
/// or by the router.
pub fn error_handlers<B: MessageBody + 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::NOT_FOUND, render_not_found)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, render_server_error)
}

fn render_not_found<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let (req, _) = res.into_parts();
    let path = req.path().to_string();
    let response = HttpResponse::NotFound().json(NotFoundContext { path });
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

fn render_server_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let (req, _) = res.into_parts();
    let response = HttpResponse::InternalServerError().json(ServerErrorContext::default());
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

pub async fn page_not_found() -> Result<HttpResponse, Error> {
    Err(Error::NotFound)
}

pub async fn server_error() -> Result<HttpResponse, Error> {
    Err(Error::Internal(failure::err_msg("error page requested")))
}
