use actix_web::HttpResponse;

use crate::responses::AboutContext;

pub async fn author() -> HttpResponse {
    HttpResponse::Ok().json(AboutContext {
        title: "About the author".to_string(),
        text: "A small blogging platform where people publish posts, gather them into groups, \
               comment on each other's writing and follow the authors they like."
            .to_string(),
    })
}

pub async fn tech() -> HttpResponse {
    HttpResponse::Ok().json(AboutContext {
        title: "Technologies".to_string(),
        text: "Rust, actix-web, diesel with SQLite, r2d2 connection pooling and argon2 password hashing."
            .to_string(),
    })
}
