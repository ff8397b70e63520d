use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::auth_layer::AuthUser;
use crate::dispatcher::NotifyTask;
use crate::error::ServerError;
use crate::models::{
    EducationEntryInput, EducationEntryRow, NetworkStatus, NewEducationEntry, NewWorkEntry,
    ProfileRow, ProfileSave, Theme, WorkEntryInput, WorkEntryRow,
};
use crate::profile_repo::ProfileRepository;
use crate::service::ServiceState;
use crate::validation::{
    check_count, check_len, check_photo, ALLOWED_LOCALES, MAX_BIO, MAX_EDUCATION_ENTRIES,
    MAX_LINKS, MAX_NAME, MAX_SKILLS_JSON, MAX_WORK_ENTRIES,
};
use crate::ServiceArcState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub links: Vec<String>,
    pub photo_path: Option<String>,
    pub skills: Vec<String>,
    pub language: String,
    pub theme: String,
    pub custom_theme: Option<String>,
    pub status: String,
    pub is_private: bool,
    pub experience: Vec<WorkEntryRow>,
    pub education: Vec<EducationEntryRow>,
    pub followers_count: i64,
    pub following_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_followed_by_viewer: Option<bool>,
}

async fn assemble(
    state: &ServiceState,
    profile: ProfileRow,
    followed_by_viewer: Option<bool>,
) -> Result<ProfileResponse, ServerError> {
    let experience = state.work_entries(profile.user_id).await?;
    let education = state.education_entries(profile.user_id).await?;
    let (followers_count, following_count) = state.follow_counts(profile.user_id).await?;
    Ok(ProfileResponse {
        user_id: profile.user_id,
        display_name: profile.display_name.clone(),
        bio: profile.bio.clone(),
        links: profile.links(),
        photo_path: profile.photo_path.clone(),
        skills: profile.skill_list(),
        language: profile.language,
        theme: profile.theme,
        custom_theme: profile.custom_theme,
        status: profile.status,
        is_private: profile.is_private,
        experience,
        education,
        followers_count,
        following_count,
        is_followed_by_viewer: followed_by_viewer,
    })
}

pub async fn my_profile(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Value>, ServerError> {
    match state.get_profile(user_id).await? {
        Some(profile) => {
            let profile = assemble(&state, profile, None).await?;
            Ok(Json(json!({ "ok": true, "profile": profile })))
        }
        // a first-time caller has no profile yet; that is not an error
        None => Ok(Json(json!({ "ok": true, "profile": null }))),
    }
}

pub async fn user_profile(
    State(state): ServiceArcState,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
    Path(target): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    let profile = state.get_profile(target).await?.ok_or(ServerError::NotFound)?;
    let followed = if viewer == target {
        None
    } else {
        Some(state.is_following(viewer, target).await?)
    };
    let profile = assemble(&state, profile, followed).await?;
    Ok(Json(json!({ "ok": true, "profile": profile })))
}

#[derive(Default)]
struct SaveForm {
    display_name: Option<String>,
    bio: Option<String>,
    links: [Option<String>; MAX_LINKS],
    skills: Option<String>,
    language: Option<String>,
    experience: Option<String>,
    education: Option<String>,
    photo: Option<(String, Option<String>, Vec<u8>)>,
}

async fn field_text(field: Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|_| ServerError::BadRequest("Malformed form data"))
}

async fn read_form(multipart: &mut Multipart) -> Result<SaveForm, ServerError> {
    let mut form = SaveForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ServerError::BadRequest("Malformed form data"))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("display_name") => form.display_name = Some(field_text(field).await?),
            Some("bio") => form.bio = Some(field_text(field).await?),
            Some("link1") => form.links[0] = Some(field_text(field).await?),
            Some("link2") => form.links[1] = Some(field_text(field).await?),
            Some("link3") => form.links[2] = Some(field_text(field).await?),
            Some("link4") => form.links[3] = Some(field_text(field).await?),
            Some("link5") => form.links[4] = Some(field_text(field).await?),
            Some("skills") => form.skills = Some(field_text(field).await?),
            Some("language") => form.language = Some(field_text(field).await?),
            Some("experience") => form.experience = Some(field_text(field).await?),
            Some("education") => form.education = Some(field_text(field).await?),
            Some("photo") => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ServerError::BadRequest("Malformed form data"))?;
                if let Some(file_name) = file_name.filter(|f| !f.is_empty()) {
                    if !data.is_empty() {
                        form.photo = Some((file_name, content_type, data.to_vec()));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn save_profile(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ServerError> {
    let form = read_form(&mut multipart).await?;

    if let Some(name) = &form.display_name {
        check_len("error_name_too_long", name, MAX_NAME)?;
    }
    if let Some(bio) = &form.bio {
        check_len("error_bio_too_long", bio, MAX_BIO)?;
    }
    if let Some(skills) = &form.skills {
        check_len("error_skills_too_long", skills, MAX_SKILLS_JSON)?;
    }
    let language = match form.language {
        Some(lang) if ALLOWED_LOCALES.contains(&lang.as_str()) => lang,
        Some(_) => return Err(ServerError::BadRequest("Invalid language code")),
        None => "en".to_string(),
    };

    let mut experience: Vec<WorkEntryInput> = match &form.experience {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ServerError::BadRequest("Invalid experience data"))?,
        None => Vec::new(),
    };
    check_count("error_experience_max_items", experience.len(), MAX_WORK_ENTRIES)?;
    experience.truncate(MAX_WORK_ENTRIES);

    let mut education: Vec<EducationEntryInput> = match &form.education {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ServerError::BadRequest("Invalid education data"))?,
        None => Vec::new(),
    };
    check_count("error_education_max_items", education.len(), MAX_EDUCATION_ENTRIES)?;
    education.truncate(MAX_EDUCATION_ENTRIES);

    let photo_path = match form.photo {
        Some((file_name, content_type, data)) => {
            let ext = check_photo(&file_name, content_type.as_deref(), data.len())?;
            let stored = format!("{user_id}.{ext}");
            tokio::fs::create_dir_all(&state.config.upload_dir).await?;
            tokio::fs::write(state.config.upload_dir.join(&stored), &data).await?;
            debug!("stored photo for {user_id} as {stored}");
            Some(format!("uploads/{stored}"))
        }
        // no new upload keeps whatever was there before
        None => state.photo_path(user_id).await?,
    };

    let [link1, link2, link3, link4, link5] = form.links;
    let save = ProfileSave {
        display_name: form.display_name,
        bio: form.bio,
        link1,
        link2,
        link3,
        link4,
        link5,
        photo_path,
        skills: form.skills,
        language,
    };
    let work = experience
        .into_iter()
        .map(|input| NewWorkEntry::from_input(user_id, input))
        .collect();
    let edu = education
        .into_iter()
        .map(|input| NewEducationEntry::from_input(user_id, input))
        .collect();
    state.save_profile(user_id, save, work, edu).await?;

    state.queue_notify(NotifyTask::ProfileSaved { user: user_id });
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_profile(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Value>, ServerError> {
    let existed = state.delete_profile(user_id).await?;
    debug!("profile {user_id} delete request, existed: {existed}");
    Ok(Json(json!({ "ok": true })))
}

pub async fn directory(
    State(state): ServiceArcState,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<Json<Value>, ServerError> {
    let entries = state.directory(viewer).await?;
    let profiles: Vec<Value> = entries
        .into_iter()
        .map(|entry| {
            json!({
                "user_id": entry.profile.user_id,
                "display_name": entry.profile.display_name,
                "bio": entry.profile.bio,
                "photo_path": entry.profile.photo_path,
                "skills": entry.profile.skill_list(),
                "language": entry.profile.language,
                "status": entry.profile.status,
                "job_title": entry.job_title,
                "company": entry.company,
            })
        })
        .collect();
    Ok(Json(json!({ "ok": true, "profiles": profiles })))
}

#[derive(Deserialize)]
pub struct LanguageBody {
    lang: String,
}

pub async fn save_language(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<LanguageBody>,
) -> Result<Json<Value>, ServerError> {
    if !ALLOWED_LOCALES.contains(&body.lang.as_str()) {
        return Err(ServerError::BadRequest("Invalid language code"));
    }
    state.update_language(user_id, &body.lang).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ThemeBody {
    theme: String,
}

pub async fn save_theme(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<ThemeBody>,
) -> Result<Json<Value>, ServerError> {
    let theme = Theme::parse(&body.theme).ok_or(ServerError::BadRequest("Invalid theme value"))?;
    state.update_theme(user_id, theme.as_str()).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct CustomThemeBody {
    colors: Value,
}

pub async fn save_custom_theme(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<CustomThemeBody>,
) -> Result<Json<Value>, ServerError> {
    if body.colors.is_null() {
        return Err(ServerError::BadRequest("No colors provided"));
    }
    state
        .update_custom_theme(user_id, &body.colors.to_string())
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct StatusBody {
    status: String,
}

pub async fn save_status(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Value>, ServerError> {
    let status = NetworkStatus::parse(&body.status)
        .ok_or(ServerError::BadRequest("Invalid status value"))?;
    state.update_status(user_id, status.as_str()).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct PrivacyBody {
    is_private: bool,
}

pub async fn save_privacy(
    State(state): ServiceArcState,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<PrivacyBody>,
) -> Result<Json<Value>, ServerError> {
    state.update_privacy(user_id, body.is_private).await?;
    Ok(Json(json!({ "ok": true })))
}
