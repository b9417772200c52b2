table! {
    users (id) {
        id -> Integer,
        username -> Text,
        password_hash -> Text,
        date_joined -> Timestamp,
    }
}

table! {
    sessions (key) {
        key -> Text,
        user_id -> Integer,
        created -> Timestamp,
    }
}

table! {
    groups (id) {
        id -> Integer,
        title -> Text,
        slug -> Text,
        description -> Text,
    }
}

table! {
    posts (id) {
        id -> Integer,
        text -> Text,
        pub_date -> Timestamp,
        author_id -> Integer,
        group_id -> Nullable<Integer>,
        image -> Nullable<Text>,
    }
}

table! {
    comments (id) {
        id -> Integer,
        post_id -> Integer,
        author_id -> Integer,
        text -> Text,
        created -> Timestamp,
    }
}

table! {
    follows (id) {
        id -> Integer,
        user_id -> Integer,
        author_id -> Integer,
    }
}

joinable!(sessions -> users (user_id));
joinable!(posts -> users (author_id));
joinable!(posts -> groups (group_id));
joinable!(comments -> posts (post_id));
joinable!(comments -> users (author_id));

allow_tables_to_appear_in_same_query!(
    users,
    sessions,
    groups,
    posts,
    comments,
    follows,
);
