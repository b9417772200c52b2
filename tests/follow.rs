#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test::{self, TestRequest};

use blogging::responses::*;

use common::*;

#[actix_web::test]
async fn following_twice_keeps_one_relation() {
    let h = Harness::new();
    let dj = h.user("DJ");
    h.user("MC");
    let session = h.login(dj);
    let app = app!(h);

    for _ in 0..2 {
        let resp = test::call_service(
            &app,
            TestRequest::get().uri("/MC/follow").cookie(session.clone()).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/MC/");
    }
    assert_eq!(h.follow_count(), 1);

    let resp = test::call_service(&app, TestRequest::get().uri("/MC/").cookie(session.clone()).to_request()).await;
    let context: ProfileContext = test::read_body_json(resp).await;
    assert!(context.following);

    let req = TestRequest::get()
        .uri("/MC/unfollow")
        .cookie(session.clone())
        .insert_header((header::REFERER, "/MC/7/"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/MC/7/");
    assert_eq!(h.follow_count(), 0);

    // removing a relation that is gone already is quiet
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/MC/unfollow").cookie(session).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(h.follow_count(), 0);
}

#[actix_web::test]
async fn following_yourself_is_ignored() {
    let h = Harness::new();
    let dj = h.user("DJ");
    let session = h.login(dj);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/DJ/follow").cookie(session).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(h.follow_count(), 0);
}

#[actix_web::test]
async fn follow_needs_login_and_a_real_author() {
    let h = Harness::new();
    let dj = h.user("DJ");
    h.user("MC");
    let session = h.login(dj);
    let app = app!(h);

    let resp = test::call_service(&app, TestRequest::get().uri("/MC/follow").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=/MC/follow");
    assert_eq!(h.follow_count(), 0);

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/nobody/follow").cookie(session).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn feed_shows_followed_authors_only() {
    let h = Harness::new();
    let dj = h.user("DJ");
    let mc = h.user("MC");
    let lonely = h.user("Lonely");
    h.post(mc, None, "From MC");
    h.post(dj, None, "From DJ");
    h.with_conn(|conn| blogging::db::follow(conn, dj, mc).unwrap());
    let dj_session = h.login(dj);
    let lonely_session = h.login(lonely);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/follow/").cookie(dj_session).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let context: FollowContext = test::read_body_json(resp).await;
    assert_eq!(context.page.object_list.len(), 1);
    assert_eq!(context.page.object_list[0].text, "From MC");

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/follow/").cookie(lonely_session).to_request(),
    )
    .await;
    let context: FollowContext = test::read_body_json(resp).await;
    assert!(context.page.object_list.is_empty());
    assert_eq!(context.page.num_pages, 1);

    let resp = test::call_service(&app, TestRequest::get().uri("/follow/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=/follow/");
}
