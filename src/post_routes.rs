use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth_layer::AuthUser;
use crate::dispatcher::{self, NotifyTask};
use crate::error::ServerError;
use crate::models::{NewNotification, NewPost, NotificationKind, PostChanges, PostRow, PostType};
use crate::notify_repo::NotificationRepository;
use crate::post_repo::{FeedRow, PostRepository};
use crate::profile_repo::ProfileRepository;
use crate::validation::{
    check_len, MAX_EXPERIENCE_LABEL, MAX_POST_CONTENT, MAX_POST_DESCRIPTION, MAX_POST_SKILLS_JSON,
};
use crate::ServiceArcState;

const DEFAULT_FEED_LIMIT: i64 = 50;
const MAX_FEED_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct PostBody {
    post_type: String,
    content: String,
    #[serde(default)]
    full_description: Option<String>,
    #[serde(default)]
    skill_tags: Vec<String>,
    #[serde(default)]
    experience_level: Option<String>,
}

struct ValidatedPost {
    post_type: PostType,
    content: String,
    full_description: Option<String>,
    skill_tags_json: String,
    experience_level: Option<String>,
}

fn validate_post(body: PostBody) -> Result<ValidatedPost, ServerError> {
    if body.content.is_empty() {
        return Err(ServerError::BadRequest("Missing fields"));
    }
    let post_type =
        PostType::parse(&body.post_type).ok_or(ServerError::BadRequest("Invalid post type"))?;
    check_len("error_post_content_too_long", &body.content, MAX_POST_CONTENT)?;
    if let Some(description) = &body.full_description {
        check_len("error_post_full_description_too_long", description, MAX_POST_DESCRIPTION)?;
    }
    let skill_tags_json = serde_json::to_string(&body.skill_tags)
        .map_err(|_| ServerError::BadRequest("Invalid skill tags"))?;
    check_len("error_post_skills_too_long", &skill_tags_json, MAX_POST_SKILLS_JSON)?;
    if let Some(level) = &body.experience_level {
        check_len("error_experience_level_too_long", level, MAX_EXPERIENCE_LABEL)?;
    }
    Ok(ValidatedPost {
        post_type,
        content: body.content,
        full_description: body.full_description,
        skill_tags_json,
        experience_level: body.experience_level,
    })
}

#[derive(Serialize)]
struct AuthorInfo {
    user_id: i64,
    display_name: Option<String>,
    photo_path: Option<String>,
}

#[derive(Serialize)]
struct PostResponse {
    post_id: i64,
    post_type: String,
    content: String,
    full_description: Option<String>,
    skill_tags: Vec<String>,
    experience_level: Option<String>,
    created: DateTime<Utc>,
    author: AuthorInfo,
}

fn to_response((post, display_name, photo_path): FeedRow) -> PostResponse {
    PostResponse {
        post_id: post.post_id,
        post_type: post.post_type.clone(),
        skill_tags: post.tag_list(),
        created: DateTime::from_naive_utc_and_offset(post.created, Utc),
        author: AuthorInfo { user_id: post.user_id, display_name, photo_path },
        content: post.content,
        full_description: post.full_description,
        experience_level: post.experience_level,
    }
}

pub async fn create_post(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<PostBody>,
) -> Result<Json<Value>, ServerError> {
    let post = validate_post(body)?;
    let created = state
        .create_post(NewPost {
            user_id,
            post_type: post.post_type.as_str().to_string(),
            content: post.content,
            full_description: post.full_description,
            skill_tags: post.skill_tags_json,
            experience_level: post.experience_level,
            created: Utc::now().naive_utc(),
        })
        .await?;
    state.queue_notify(NotifyTask::PostPublished {
        post_id: created.post_id,
        author: user_id,
    });
    Ok(Json(json!({ "ok": true, "post_id": created.post_id })))
}

#[derive(Deserialize)]
pub struct FeedQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn posts_feed(
    State(state): ServiceArcState,
    Extension(AuthUser(_)): Extension<AuthUser>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);
    let posts: Vec<PostResponse> = state
        .feed(limit, offset)
        .await?
        .into_iter()
        .map(to_response)
        .collect();
    Ok(Json(json!({ "ok": true, "posts": posts })))
}

pub async fn my_posts(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Value>, ServerError> {
    let posts: Vec<PostResponse> = state
        .posts_by(user_id)
        .await?
        .into_iter()
        .map(to_response)
        .collect();
    Ok(Json(json!({ "ok": true, "posts": posts })))
}

/// Loads the post and enforces ownership for mutations.
async fn owned_post(
    state: &crate::service::ServiceState,
    post_id: i64,
    user_id: i64,
) -> Result<PostRow, ServerError> {
    let post = state.get_post(post_id).await?.ok_or(ServerError::NotFound)?;
    if post.user_id != user_id {
        return Err(ServerError::NotAuthorized);
    }
    Ok(post)
}

pub async fn update_post(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(post_id): Path<i64>,
    Json(body): Json<PostBody>,
) -> Result<Json<Value>, ServerError> {
    let post = validate_post(body)?;
    owned_post(&state, post_id, user_id).await?;
    state
        .update_post(
            post_id,
            PostChanges {
                post_type: post.post_type.as_str().to_string(),
                content: post.content,
                full_description: post.full_description,
                skill_tags: post.skill_tags_json,
                experience_level: post.experience_level,
            },
        )
        .await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_post(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    owned_post(&state, post_id, user_id).await?;
    state.delete_post(post_id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn respond_to_post(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    let post = state.get_post(post_id).await?.ok_or(ServerError::NotFound)?;
    if post.user_id == user_id {
        return Err(ServerError::BadRequest("Cannot respond to your own post"));
    }
    let responder = state
        .display_name(user_id)
        .await?
        .unwrap_or_else(|| "Someone".to_string());
    // the in-app row lands before delivery is attempted
    state
        .insert_notification(NewNotification {
            user_id: post.user_id,
            kind: NotificationKind::ResponseRequest.as_str().to_string(),
            from_user_id: Some(user_id),
            post_id: Some(post_id),
            message: dispatcher::response_message(&responder, &dispatcher::preview(&post.content)),
            is_read: false,
            created: Utc::now().naive_utc(),
        })
        .await?;
    state.queue_notify(NotifyTask::ResponseRequested { post_id, responder: user_id });
    Ok(Json(json!({ "ok": true })))
}
