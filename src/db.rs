use std::collections::HashMap;

use actix::prelude::*;
use chrono::prelude::*;
use chrono::Duration;
use diesel::connection::SimpleConnection;
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use failure::{err_msg, Error};
use r2d2::Pool;
use uuid::Uuid;

use crate::messages::*;
use crate::models::*;
use crate::paginator::{Paginator, PER_PAGE};
use crate::responses::*;
use crate::schema::{comments, follows, groups, posts, sessions, users};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

type PostRow = (Post, User, Option<Group>);

/// Per-connection settings. SQLite leaves foreign keys off unless asked.
fn configure_connection(conn: &mut SqliteConnection) -> Result<(), DieselError> {
    conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        configure_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn init_pool(url: &str, size: u32) -> Result<SqlitePool, Error> {
    let manager = ConnectionManager::<SqliteConnection>::new(url);
    let builder = Pool::builder().connection_customizer(Box::new(ConnectionOptions));

    // Every in-memory connection is its own database, so keep exactly one alive.
    let builder = if url == ":memory:" {
        builder.max_size(1).idle_timeout(None).max_lifetime(None)
    } else {
        builder.max_size(size)
    };

    Ok(builder.build(manager)?)
}

pub fn establish(url: &str) -> Result<SqliteConnection, Error> {
    let mut conn = SqliteConnection::establish(url)?;
    configure_connection(&mut conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<usize, Error> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| err_msg(e.to_string()))?;
    Ok(applied.len())
}

fn post_response(row: PostRow, comments_count: i64) -> PostResponse {
    let (post, author, group) = row;
    PostResponse {
        id: post.id,
        text: post.text,
        pub_date: post.pub_date,
        author: author.username,
        group: group.map(GroupResponse::from),
        image: post.image,
        comments_count,
    }
}

fn comment_counts(conn: &mut SqliteConnection, ids: Vec<i32>) -> Result<HashMap<i32, i64>, Error> {
    let mut counts = HashMap::new();
    if ids.is_empty() {
        return Ok(counts);
    }

    let post_ids: Vec<i32> = comments::table
        .select(comments::post_id)
        .filter(comments::post_id.eq_any(ids))
        .load(conn)?;

    for id in post_ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Loads one page of posts, newest first.
pub fn list_posts(
    conn: &mut SqliteConnection,
    filter: PostFilter,
    page: Option<&str>,
) -> Result<PageResponse<PostResponse>, Error> {
    let mut count_query = posts::table.select(count_star()).into_boxed();
    let mut rows_query = posts::table
        .inner_join(users::table)
        .left_join(groups::table)
        .select((
            posts::all_columns,
            users::all_columns,
            groups::all_columns.nullable(),
        ))
        .order((posts::pub_date.desc(), posts::id.desc()))
        .into_boxed();

    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            count_query = count_query.filter(posts::group_id.eq(group_id));
            rows_query = rows_query.filter(posts::group_id.eq(group_id));
        }
        PostFilter::Author(author_id) => {
            count_query = count_query.filter(posts::author_id.eq(author_id));
            rows_query = rows_query.filter(posts::author_id.eq(author_id));
        }
        PostFilter::FollowedBy(user_id) => {
            let authors: Vec<i32> = follows::table
                .select(follows::author_id)
                .filter(follows::user_id.eq(user_id))
                .load(conn)?;

            if authors.is_empty() {
                let window = Paginator::new(0, PER_PAGE).get_page(page);
                return Ok(PageResponse::new(window, Vec::new()));
            }

            count_query = count_query.filter(posts::author_id.eq_any(authors.clone()));
            rows_query = rows_query.filter(posts::author_id.eq_any(authors));
        }
    }

    let count: i64 = count_query.get_result(conn)?;
    let window = Paginator::new(count, PER_PAGE).get_page(page);

    let rows: Vec<PostRow> = rows_query
        .limit(window.limit())
        .offset(window.offset())
        .load(conn)?;

    let counts = comment_counts(conn, rows.iter().map(|r| r.0.id).collect())?;
    let object_list = rows
        .into_iter()
        .map(|row| {
            let n = counts.get(&row.0.id).cloned().unwrap_or(0);
            post_response(row, n)
        })
        .collect();

    Ok(PageResponse::new(window, object_list))
}

pub fn find_group(conn: &mut SqliteConnection, slug: &str) -> Result<Option<Group>, Error> {
    Ok(groups::table
        .filter(groups::slug.eq(slug))
        .first::<Group>(conn)
        .optional()?)
}

pub fn list_groups(conn: &mut SqliteConnection) -> Result<Vec<Group>, Error> {
    Ok(groups::table.order(groups::title.asc()).load::<Group>(conn)?)
}

pub fn find_user(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>, Error> {
    Ok(users::table
        .filter(users::username.eq(username))
        .first::<User>(conn)
        .optional()?)
}

pub fn count_posts_by(conn: &mut SqliteConnection, author_id: i32) -> Result<i64, Error> {
    Ok(posts::table
        .filter(posts::author_id.eq(author_id))
        .select(count_star())
        .get_result(conn)?)
}

pub fn is_following(conn: &mut SqliteConnection, user_id: i32, author_id: i32) -> Result<bool, Error> {
    Ok(diesel::select(exists(
        follows::table
            .filter(follows::user_id.eq(user_id))
            .filter(follows::author_id.eq(author_id)),
    ))
    .get_result(conn)?)
}

pub fn group_listing(
    conn: &mut SqliteConnection,
    slug: &str,
    page: Option<&str>,
) -> Result<Option<GroupContext>, Error> {
    let group = match find_group(conn, slug)? {
        Some(group) => group,
        None => return Ok(None),
    };

    let page = list_posts(conn, PostFilter::Group(group.id), page)?;
    Ok(Some(GroupContext {
        group: group.into(),
        page,
    }))
}

pub fn profile_listing(
    conn: &mut SqliteConnection,
    username: &str,
    viewer: Option<i32>,
    page: Option<&str>,
) -> Result<Option<ProfileContext>, Error> {
    let author = match find_user(conn, username)? {
        Some(author) => author,
        None => return Ok(None),
    };

    let page = list_posts(conn, PostFilter::Author(author.id), page)?;
    let following = match viewer {
        Some(user_id) => is_following(conn, user_id, author.id)?,
        None => false,
    };

    Ok(Some(ProfileContext {
        author: AuthorResponse::from(&author),
        post_count: page.count,
        following,
        page,
    }))
}

/// A post scoped to its author's username.
pub fn find_post(conn: &mut SqliteConnection, username: &str, post_id: i32) -> Result<Option<Post>, Error> {
    Ok(posts::table
        .inner_join(users::table)
        .filter(posts::id.eq(post_id))
        .filter(users::username.eq(username))
        .select(posts::all_columns)
        .first::<Post>(conn)
        .optional()?)
}

pub fn post_detail(conn: &mut SqliteConnection, username: &str, post_id: i32) -> Result<Option<PostDetail>, Error> {
    let row: Option<PostRow> = posts::table
        .inner_join(users::table)
        .left_join(groups::table)
        .filter(posts::id.eq(post_id))
        .filter(users::username.eq(username))
        .select((
            posts::all_columns,
            users::all_columns,
            groups::all_columns.nullable(),
        ))
        .first(conn)
        .optional()?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let comments: Vec<CommentResponse> = comments::table
        .inner_join(users::table)
        .filter(comments::post_id.eq(post_id))
        .order((comments::created.asc(), comments::id.asc()))
        .select((comments::all_columns, users::username))
        .load::<(Comment, String)>(conn)?
        .into_iter()
        .map(|(comment, author)| CommentResponse {
            id: comment.id,
            author,
            text: comment.text,
            created: comment.created,
        })
        .collect();

    let author = AuthorResponse::from(&row.1);
    let post_count = count_posts_by(conn, author.id)?;
    let post = post_response(row, comments.len() as i64);

    Ok(Some(PostDetail {
        post,
        author,
        post_count,
        comments,
    }))
}

pub fn create_post(conn: &mut SqliteConnection, new_post: &PostInsert) -> Result<i32, Error> {
    Ok(diesel::insert_into(posts::table)
        .values(new_post)
        .returning(posts::id)
        .get_result(conn)?)
}

pub fn update_post(
    conn: &mut SqliteConnection,
    post_id: i32,
    text: &str,
    group_id: Option<i32>,
    image: Option<&str>,
) -> Result<(), Error> {
    diesel::update(posts::table.find(post_id))
        .set((
            posts::text.eq(text),
            posts::group_id.eq(group_id),
            posts::image.eq(image),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn create_comment(conn: &mut SqliteConnection, post_id: i32, author_id: i32, text: &str) -> Result<i32, Error> {
    let new_comment = CommentInsert {
        post_id,
        author_id,
        text: text.to_string(),
        created: Utc::now().naive_utc(),
    };

    Ok(diesel::insert_into(comments::table)
        .values(&new_comment)
        .returning(comments::id)
        .get_result(conn)?)
}

/// Adds the (user, author) relation. Returns whether a row was written;
/// self-follows and existing relations leave the table untouched.
pub fn follow(conn: &mut SqliteConnection, user_id: i32, author_id: i32) -> Result<bool, Error> {
    if user_id == author_id || is_following(conn, user_id, author_id)? {
        return Ok(false);
    }

    let result = diesel::insert_into(follows::table)
        .values(&FollowInsert { user_id, author_id })
        .execute(conn);

    match result {
        Ok(_) => Ok(true),
        // lost a race against the same insert; the `follower` constraint held
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn unfollow(conn: &mut SqliteConnection, user_id: i32, author_id: i32) -> Result<usize, Error> {
    Ok(diesel::delete(
        follows::table
            .filter(follows::user_id.eq(user_id))
            .filter(follows::author_id.eq(author_id)),
    )
    .execute(conn)?)
}

pub fn list_follows(conn: &mut SqliteConnection) -> Result<Vec<(String, String)>, Error> {
    let rows: Vec<Follow> = follows::table.order(follows::id.asc()).load(conn)?;
    let names: HashMap<i32, String> = users::table
        .select((users::id, users::username))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();

    Ok(rows
        .into_iter()
        .map(|f| {
            let name = |id: i32| names.get(&id).cloned().unwrap_or_default();
            (name(f.user_id), name(f.author_id))
        })
        .collect())
}

pub fn create_group(conn: &mut SqliteConnection, title: &str, slug: &str, description: &str) -> Result<i32, Error> {
    Ok(diesel::insert_into(groups::table)
        .values(&GroupInsert {
            title,
            slug,
            description,
        })
        .returning(groups::id)
        .get_result(conn)?)
}

/// Removes a group, detaching its posts. Returns how many posts lost the
/// group, or `None` when no group has that slug.
pub fn delete_group(conn: &mut SqliteConnection, slug: &str) -> Result<Option<usize>, Error> {
    let detached = conn.transaction::<_, DieselError, _>(|conn| {
        let group: Option<Group> = groups::table
            .filter(groups::slug.eq(slug))
            .first(conn)
            .optional()?;

        let group = match group {
            Some(group) => group,
            None => return Ok(None),
        };

        let detached = diesel::update(posts::table.filter(posts::group_id.eq(group.id)))
            .set(posts::group_id.eq(None::<i32>))
            .execute(conn)?;
        diesel::delete(groups::table.find(group.id)).execute(conn)?;

        Ok(Some(detached))
    })?;

    Ok(detached)
}

/// Posts with author name and group title, for the admin listing.
pub fn admin_posts(
    conn: &mut SqliteConnection,
    group_slug: Option<&str>,
) -> Result<Vec<(Post, String, Option<String>)>, Error> {
    let mut query = posts::table
        .inner_join(users::table)
        .left_join(groups::table)
        .select((posts::all_columns, users::username, groups::title.nullable()))
        .order((posts::pub_date.desc(), posts::id.desc()))
        .into_boxed();

    if let Some(slug) = group_slug {
        query = query.filter(groups::slug.eq(slug.to_string()));
    }

    Ok(query.load(conn)?)
}

/// Inserts a user. `None` when the username is already taken.
pub fn create_user(conn: &mut SqliteConnection, username: &str, password_hash: &str) -> Result<Option<i32>, Error> {
    let result = diesel::insert_into(users::table)
        .values(&UserInsert {
            username,
            password_hash,
            date_joined: Utc::now().naive_utc(),
        })
        .returning(users::id)
        .get_result(conn);

    match result {
        Ok(id) => Ok(Some(id)),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub const SESSION_DAYS: i64 = 14;

/// How long a login stays valid.
pub fn session_age() -> Duration {
    Duration::days(SESSION_DAYS)
}

fn session_cutoff() -> NaiveDateTime {
    Utc::now().naive_utc() - session_age()
}

pub fn create_session(conn: &mut SqliteConnection, user_id: i32) -> Result<String, Error> {
    purge_sessions(conn)?;

    let key = Uuid::new_v4().simple().to_string();
    diesel::insert_into(sessions::table)
        .values(&SessionInsert {
            key: &key,
            user_id,
            created: Utc::now().naive_utc(),
        })
        .execute(conn)?;
    Ok(key)
}

pub fn session_user(conn: &mut SqliteConnection, key: &str) -> Result<Option<User>, Error> {
    Ok(sessions::table
        .inner_join(users::table)
        .filter(sessions::key.eq(key))
        .filter(sessions::created.gt(session_cutoff()))
        .select(users::all_columns)
        .first::<User>(conn)
        .optional()?)
}

/// Removes sessions older than `session_age()`.
pub fn purge_sessions(conn: &mut SqliteConnection) -> Result<usize, Error> {
    Ok(diesel::delete(sessions::table.filter(sessions::created.le(session_cutoff()))).execute(conn)?)
}

pub fn delete_session(conn: &mut SqliteConnection, key: &str) -> Result<(), Error> {
    diesel::delete(sessions::table.filter(sessions::key.eq(key))).execute(conn)?;
    Ok(())
}

pub struct DbExecutor(pub SqlitePool);

impl Actor for DbExecutor {
    type Context = SyncContext<Self>;
}

impl Handler<ListPosts> for DbExecutor {
    type Result = Result<PageResponse<PostResponse>, Error>;

    fn handle(&mut self, msg: ListPosts, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        list_posts(&mut conn, msg.filter, msg.page.as_deref())
    }
}

impl Handler<GroupListing> for DbExecutor {
    type Result = Result<Option<GroupContext>, Error>;

    fn handle(&mut self, msg: GroupListing, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        group_listing(&mut conn, &msg.slug, msg.page.as_deref())
    }
}

impl Handler<ProfileListing> for DbExecutor {
    type Result = Result<Option<ProfileContext>, Error>;

    fn handle(&mut self, msg: ProfileListing, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        profile_listing(&mut conn, &msg.username, msg.viewer, msg.page.as_deref())
    }
}

impl Handler<ShowPost> for DbExecutor {
    type Result = Result<Option<(PostDetail, bool)>, Error>;

    fn handle(&mut self, msg: ShowPost, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;

        let detail = match post_detail(&mut conn, &msg.username, msg.post_id)? {
            Some(detail) => detail,
            None => return Ok(None),
        };

        let following = match msg.viewer {
            Some(user_id) => is_following(&mut conn, user_id, detail.author.id)?,
            None => false,
        };

        Ok(Some((detail, following)))
    }
}

impl Handler<FindPost> for DbExecutor {
    type Result = Result<Option<Post>, Error>;

    fn handle(&mut self, msg: FindPost, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        find_post(&mut conn, &msg.username, msg.post_id)
    }
}

impl Handler<ListGroups> for DbExecutor {
    type Result = Result<Vec<Group>, Error>;

    fn handle(&mut self, _msg: ListGroups, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        list_groups(&mut conn)
    }
}

impl Handler<MakePost> for DbExecutor {
    type Result = Result<i32, Error>;

    fn handle(&mut self, msg: MakePost, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        create_post(&mut conn, &msg.0)
    }
}

impl Handler<EditPost> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: EditPost, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        update_post(&mut conn, msg.post_id, &msg.text, msg.group_id, msg.image.as_deref())
    }
}

impl Handler<MakeComment> for DbExecutor {
    type Result = Result<i32, Error>;

    fn handle(&mut self, msg: MakeComment, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        create_comment(&mut conn, msg.post_id, msg.author_id, &msg.text)
    }
}

impl Handler<FollowAuthor> for DbExecutor {
    type Result = Result<Option<bool>, Error>;

    fn handle(&mut self, msg: FollowAuthor, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;

        match find_user(&mut conn, &msg.username)? {
            Some(author) => Ok(Some(follow(&mut conn, msg.user_id, author.id)?)),
            None => Ok(None),
        }
    }
}

impl Handler<UnfollowAuthor> for DbExecutor {
    type Result = Result<Option<usize>, Error>;

    fn handle(&mut self, msg: UnfollowAuthor, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;

        match find_user(&mut conn, &msg.username)? {
            Some(author) => Ok(Some(unfollow(&mut conn, msg.user_id, author.id)?)),
            None => Ok(None),
        }
    }
}

impl Handler<FindUser> for DbExecutor {
    type Result = Result<Option<User>, Error>;

    fn handle(&mut self, msg: FindUser, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        find_user(&mut conn, &msg.username)
    }
}

impl Handler<MakeUser> for DbExecutor {
    type Result = Result<Option<i32>, Error>;

    fn handle(&mut self, msg: MakeUser, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        create_user(&mut conn, &msg.username, &msg.password_hash)
    }
}

impl Handler<StartSession> for DbExecutor {
    type Result = Result<String, Error>;

    fn handle(&mut self, msg: StartSession, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        create_session(&mut conn, msg.user_id)
    }
}

impl Handler<LookupSession> for DbExecutor {
    type Result = Result<Option<User>, Error>;

    fn handle(&mut self, msg: LookupSession, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        session_user(&mut conn, &msg.key)
    }
}

impl Handler<EndSession> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: EndSession, _: &mut Self::Context) -> Self::Result {
        let mut conn = self.0.get()?;
        delete_session(&mut conn, &msg.key)
    }
}
