use std::fmt;

use chrono::prelude::*;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub date_joined: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct UserInsert<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub date_joined: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct SessionInsert<'a> {
    pub key: &'a str,
    pub user_id: i32,
    pub created: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Insertable)]
#[diesel(table_name = groups)]
pub struct GroupInsert<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// Posts print as the first 15 characters of their text.
impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let head: String = self.text.chars().take(15).collect();
        f.write_str(&head)
    }
}

#[derive(Insertable)]
#[diesel(table_name = posts)]
pub struct PostInsert {
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Queryable)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
pub struct CommentInsert {
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable)]
pub struct Follow {
    pub id: i32,
    pub user_id: i32,
    pub author_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = follows)]
pub struct FollowInsert {
    pub user_id: i32,
    pub author_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_displays_first_fifteen_chars() {
        let post = Post {
            id: 1,
            text: "Текст для тестрирования 15 знаков текста".to_string(),
            pub_date: Utc::now().naive_utc(),
            author_id: 1,
            group_id: None,
            image: None,
        };
        assert_eq!(post.to_string(), "Текст для тестр");
    }

    #[test]
    fn group_displays_title() {
        let group = Group {
            id: 1,
            title: "тестирование Group".to_string(),
            slug: "test_group".to_string(),
            description: "описание сообщества".to_string(),
        };
        assert_eq!(group.to_string(), "тестирование Group");
    }
}
