use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth_layer::AuthUser;
use crate::dispatcher::{follow_message, NotifyTask};
use crate::error::ServerError;
use crate::models::{NewNotification, NotificationKind, ProfileRow};
use crate::notify_repo::NotificationRepository;
use crate::profile_repo::{FollowDirection, ProfileRepository};
use crate::ServiceArcState;

pub async fn follow(
    State(state): ServiceArcState,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
    Path(target): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    if target == viewer {
        return Err(ServerError::BadRequest("Invalid target user"));
    }
    state.get_profile(target).await?.ok_or(ServerError::NotFound)?;

    // re-following is a no-op; only a fresh edge notifies
    if state.insert_follow(viewer, target).await? {
        let name = state
            .display_name(viewer)
            .await?
            .unwrap_or_else(|| "Someone".to_string());
        state
            .insert_notification(NewNotification {
                user_id: target,
                kind: NotificationKind::Follow.as_str().to_string(),
                from_user_id: Some(viewer),
                post_id: None,
                message: follow_message(&name),
                is_read: false,
                created: Utc::now().naive_utc(),
            })
            .await?;
        state.queue_notify(NotifyTask::FollowerAdded { follower: viewer, followee: target });
    }
    Ok(Json(json!({ "ok": true })))
}

pub async fn unfollow(
    State(state): ServiceArcState,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
    Path(target): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    if target == viewer {
        return Err(ServerError::BadRequest("Invalid target user"));
    }
    state.delete_follow(viewer, target).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Serialize)]
struct ProfileCard {
    user_id: i64,
    display_name: Option<String>,
    photo_path: Option<String>,
    status: String,
}

impl From<ProfileRow> for ProfileCard {
    fn from(profile: ProfileRow) -> Self {
        ProfileCard {
            user_id: profile.user_id,
            display_name: profile.display_name,
            photo_path: profile.photo_path,
            status: profile.status,
        }
    }
}

pub async fn followed_by(
    State(state): ServiceArcState,
    Extension(AuthUser(_)): Extension<AuthUser>,
    Path(target): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    let cards: Vec<ProfileCard> = state
        .get_profile_links(target, FollowDirection::FollowedBy)
        .await?
        .into_iter()
        .map(ProfileCard::from)
        .collect();
    Ok(Json(json!({ "ok": true, "profiles": cards })))
}

pub async fn following(
    State(state): ServiceArcState,
    Extension(AuthUser(_)): Extension<AuthUser>,
    Path(target): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    let cards: Vec<ProfileCard> = state
        .get_profile_links(target, FollowDirection::Following)
        .await?
        .into_iter()
        .map(ProfileCard::from)
        .collect();
    Ok(Json(json!({ "ok": true, "profiles": cards })))
}

#[derive(Serialize)]
struct NotificationResponse {
    id: i64,
    kind: String,
    from_user_id: Option<i64>,
    post_id: Option<i64>,
    message: String,
    created: DateTime<Utc>,
}

/// Fetches unread notifications and marks them read in the same transaction.
pub async fn notifications(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Value>, ServerError> {
    let rows = state.unread_and_mark_read(user_id).await?;
    let items: Vec<NotificationResponse> = rows
        .into_iter()
        .map(|row| NotificationResponse {
            id: row.id,
            kind: row.kind,
            from_user_id: row.from_user_id,
            post_id: row.post_id,
            message: row.message,
            created: DateTime::from_naive_utc_and_offset(row.created, Utc),
        })
        .collect();
    Ok(Json(json!({ "ok": true, "notifications": items })))
}

/// Public front-end bootstrap values; the only unauthenticated endpoint.
pub async fn app_config(State(state): ServiceArcState) -> Json<Value> {
    Json(json!({
        "backendUrl": state.config.backend_url,
        "botUsername": state.config.bot_username,
        "appSlug": state.config.app_slug,
    }))
}
