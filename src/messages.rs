use actix::prelude::*;
use failure::Error;

use crate::models::{Group, Post, PostInsert, User};
use crate::responses::*;

/// Which posts a listing shows.
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    All,
    Group(i32),
    Author(i32),
    FollowedBy(i32),
}

pub struct ListPosts {
    pub filter: PostFilter,
    pub page: Option<String>,
}

impl Message for ListPosts {
    type Result = Result<PageResponse<PostResponse>, Error>;
}

pub struct GroupListing {
    pub slug: String,
    pub page: Option<String>,
}

impl Message for GroupListing {
    type Result = Result<Option<GroupContext>, Error>;
}

pub struct ProfileListing {
    pub username: String,
    pub viewer: Option<i32>,
    pub page: Option<String>,
}

impl Message for ProfileListing {
    type Result = Result<Option<ProfileContext>, Error>;
}

pub struct ShowPost {
    pub username: String,
    pub post_id: i32,
    pub viewer: Option<i32>,
}

impl Message for ShowPost {
    type Result = Result<Option<(PostDetail, bool)>, Error>;
}

pub struct FindPost {
    pub username: String,
    pub post_id: i32,
}

impl Message for FindPost {
    type Result = Result<Option<Post>, Error>;
}

pub struct ListGroups;

impl Message for ListGroups {
    type Result = Result<Vec<Group>, Error>;
}

pub struct MakePost(pub PostInsert);

impl Message for MakePost {
    type Result = Result<i32, Error>;
}

pub struct EditPost {
    pub post_id: i32,
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl Message for EditPost {
    type Result = Result<(), Error>;
}

pub struct MakeComment {
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
}

impl Message for MakeComment {
    type Result = Result<i32, Error>;
}

pub struct FollowAuthor {
    pub user_id: i32,
    pub username: String,
}

/// `None` when the author does not exist, otherwise whether a row was added.
impl Message for FollowAuthor {
    type Result = Result<Option<bool>, Error>;
}

pub struct UnfollowAuthor {
    pub user_id: i32,
    pub username: String,
}

impl Message for UnfollowAuthor {
    type Result = Result<Option<usize>, Error>;
}

pub struct FindUser {
    pub username: String,
}

impl Message for FindUser {
    type Result = Result<Option<User>, Error>;
}

pub struct MakeUser {
    pub username: String,
    pub password_hash: String,
}

/// `None` when the username is taken.
impl Message for MakeUser {
    type Result = Result<Option<i32>, Error>;
}

pub struct StartSession {
    pub user_id: i32,
}

impl Message for StartSession {
    type Result = Result<String, Error>;
}

pub struct LookupSession {
    pub key: String,
}

impl Message for LookupSession {
    type Result = Result<Option<User>, Error>;
}

pub struct EndSession {
    pub key: String,
}

impl Message for EndSession {
    type Result = Result<(), Error>;
}
