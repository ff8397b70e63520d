// Maintained by hand; schema changes land here and in the deployment DDL
// together (no migration tooling in this repo).

diesel::table! {
    profiles (user_id) {
        user_id -> Int8,
        display_name -> Nullable<Text>,
        bio -> Nullable<Text>,
        link1 -> Nullable<Text>,
        link2 -> Nullable<Text>,
        link3 -> Nullable<Text>,
        link4 -> Nullable<Text>,
        link5 -> Nullable<Text>,
        photo_path -> Nullable<Text>,
        skills -> Nullable<Text>,
        language -> Text,
        theme -> Text,
        custom_theme -> Nullable<Text>,
        status -> Text,
        is_private -> Bool,
    }
}

diesel::table! {
    work_history (id) {
        id -> Int8,
        user_id -> Int8,
        job_title -> Nullable<Text>,
        company -> Nullable<Text>,
        start_date -> Nullable<Text>,
        end_date -> Nullable<Text>,
        description -> Nullable<Text>,
        is_current -> Bool,
    }
}

diesel::table! {
    education (id) {
        id -> Int8,
        user_id -> Int8,
        institution -> Nullable<Text>,
        degree -> Nullable<Text>,
        field_of_study -> Nullable<Text>,
        start_date -> Nullable<Text>,
        end_date -> Nullable<Text>,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    follows (follower_id, following_id) {
        follower_id -> Int8,
        following_id -> Int8,
        created -> Timestamp,
    }
}

diesel::table! {
    posts (post_id) {
        post_id -> Int8,
        user_id -> Int8,
        post_type -> Text,
        content -> Text,
        full_description -> Nullable<Text>,
        skill_tags -> Text,
        experience_level -> Nullable<Text>,
        created -> Timestamp,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int8,
        user_id -> Int8,
        kind -> Text,
        from_user_id -> Nullable<Int8>,
        post_id -> Nullable<Int8>,
        message -> Text,
        is_read -> Bool,
        created -> Timestamp,
    }
}

diesel::table! {
    notification_log (user_id, date, kind) {
        user_id -> Int8,
        date -> Date,
        kind -> Text,
        sent -> Int4,
    }
}

diesel::joinable!(posts -> profiles (user_id));
diesel::joinable!(work_history -> profiles (user_id));
diesel::joinable!(education -> profiles (user_id));
diesel::joinable!(notifications -> profiles (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    profiles,
    work_history,
    education,
    follows,
    posts,
    notifications,
    notification_log,
);
