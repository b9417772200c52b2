use chrono::prelude::*;

use crate::forms::FormContext;
use crate::models::{Group, User};
use crate::paginator::PageWindow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorResponse {
    pub id: i32,
    pub username: String,
}

impl<'a> From<&'a User> for AuthorResponse {
    fn from(user: &'a User) -> AuthorResponse {
        AuthorResponse {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupResponse {
    pub id: i32,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> GroupResponse {
        GroupResponse {
            id: group.id,
            title: group.title,
            slug: group.slug,
            description: group.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostResponse {
    pub id: i32,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group: Option<GroupResponse>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    pub comments_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageResponse<T> {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_page_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_page_number: Option<i64>,
    pub object_list: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn new(window: PageWindow, object_list: Vec<T>) -> PageResponse<T> {
        PageResponse {
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
            next_page_number: window.next_page_number(),
            previous_page_number: window.previous_page_number(),
            object_list,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentResponse {
    pub id: i32,
    pub author: String,
    pub text: String,
    pub created: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexContext {
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupContext {
    pub group: GroupResponse,
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileContext {
    pub author: AuthorResponse,
    pub post_count: i64,
    pub following: bool,
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowContext {
    pub page: PageResponse<PostResponse>,
}

/// Everything the detail page shows except the viewer-specific parts.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: PostResponse,
    pub author: AuthorResponse,
    pub post_count: i64,
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostContext {
    #[serde(flatten)]
    pub detail: PostDetail,
    pub following: bool,
    pub form: FormContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupChoice {
    pub id: i32,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostFormContext {
    pub is_edit: bool,
    pub form: FormContext,
    pub groups: Vec<GroupChoice>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub post: Option<PostResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginContext {
    pub form: FormContext,
    pub next: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupContext {
    pub form: FormContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AboutContext {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotFoundContext {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerErrorContext {
    pub error: String,
}

impl Default for ServerErrorContext {
    fn default() -> ServerErrorContext {
        ServerErrorContext {
            error: "server error".to_string(),
        }
    }
}
