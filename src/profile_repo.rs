use std::collections::HashMap;

use axum::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use crate::error::ServerError;
use crate::models::{
    skills_from_json, EducationEntryRow, NewEducationEntry, NewFollow, NewWorkEntry, ProfileRow,
    ProfileSave, WorkEntryRow,
};
use crate::schema::education::dsl as ed;
use crate::schema::follows::dsl::{follower_id, following_id, follows};
use crate::schema::notification_log::dsl as nl;
use crate::schema::notifications::dsl as nt;
use crate::schema::posts::dsl as po;
use crate::schema::profiles::dsl::{
    custom_theme as p_custom_theme, display_name as p_display_name, is_private as p_is_private,
    language as p_language, photo_path as p_photo_path, profiles, skills as p_skills,
    status as p_status, theme as p_theme, user_id as p_user_id,
};
use crate::schema::work_history::dsl as wh;
use crate::service::ServiceState;

#[derive(Debug, Copy, Clone)]
pub enum FollowDirection {
    Following,
    FollowedBy,
}

/// A directory listing: the profile plus its most relevant work entry.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub profile: ProfileRow,
    pub job_title: Option<String>,
    pub company: Option<String>,
}

#[async_trait]
pub trait ProfileRepository {
    async fn get_profile(&self, user: i64) -> Result<Option<ProfileRow>, ServerError>;
    async fn display_name(&self, user: i64) -> Result<Option<String>, ServerError>;
    async fn photo_path(&self, user: i64) -> Result<Option<String>, ServerError>;
    async fn save_profile(
        &self,
        user: i64,
        save: ProfileSave,
        work: Vec<NewWorkEntry>,
        edu: Vec<NewEducationEntry>,
    ) -> Result<(), ServerError>;
    async fn delete_profile(&self, user: i64) -> Result<bool, ServerError>;
    async fn work_entries(&self, user: i64) -> Result<Vec<WorkEntryRow>, ServerError>;
    async fn education_entries(&self, user: i64) -> Result<Vec<EducationEntryRow>, ServerError>;
    async fn directory(&self, viewer: i64) -> Result<Vec<DirectoryEntry>, ServerError>;
    /// All discoverable profiles with a non-empty skill set.
    async fn skill_profiles(&self) -> Result<Vec<(i64, Vec<String>)>, ServerError>;

    async fn update_language(&self, user: i64, lang: &str) -> Result<(), ServerError>;
    async fn update_theme(&self, user: i64, theme: &str) -> Result<(), ServerError>;
    async fn update_custom_theme(&self, user: i64, colors: &str) -> Result<(), ServerError>;
    async fn update_status(&self, user: i64, status: &str) -> Result<(), ServerError>;
    async fn update_privacy(&self, user: i64, private: bool) -> Result<(), ServerError>;

    /// Creates the edge; false when it already existed.
    async fn insert_follow(&self, viewer: i64, target: i64) -> Result<bool, ServerError>;
    async fn delete_follow(&self, viewer: i64, target: i64) -> Result<(), ServerError>;
    async fn is_following(&self, viewer: i64, target: i64) -> Result<bool, ServerError>;
    /// (followers, following) for the given user.
    async fn follow_counts(&self, user: i64) -> Result<(i64, i64), ServerError>;
    async fn follower_ids(&self, user: i64) -> Result<Vec<i64>, ServerError>;
    async fn get_profile_links(
        &self,
        user: i64,
        direction: FollowDirection,
    ) -> Result<Vec<ProfileRow>, ServerError>;
}

fn initial_row(user: i64, save: &ProfileSave) -> ProfileRow {
    ProfileRow {
        user_id: user,
        display_name: save.display_name.clone(),
        bio: save.bio.clone(),
        link1: save.link1.clone(),
        link2: save.link2.clone(),
        link3: save.link3.clone(),
        link4: save.link4.clone(),
        link5: save.link5.clone(),
        photo_path: save.photo_path.clone(),
        skills: save.skills.clone(),
        language: save.language.clone(),
        theme: "auto".to_string(),
        custom_theme: None,
        status: "networking".to_string(),
        is_private: false,
    }
}

fn has_content(profile: &ProfileRow) -> bool {
    profile.bio.as_deref().is_some_and(|b| !b.is_empty())
        || profile.photo_path.is_some()
        || profile.skills.as_deref().is_some_and(|s| !s.is_empty() && s != "[]")
}

#[async_trait]
impl ProfileRepository for ServiceState {
    async fn get_profile(&self, user: i64) -> Result<Option<ProfileRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let existing = profiles
            .filter(p_user_id.eq(user))
            .select(ProfileRow::as_select())
            .get_result(&mut db)
            .optional()?;
        Ok(existing)
    }

    async fn display_name(&self, user: i64) -> Result<Option<String>, ServerError> {
        let mut db = self.db_pool.get()?;
        let name = profiles
            .filter(p_user_id.eq(user))
            .select(p_display_name)
            .get_result::<Option<String>>(&mut db)
            .optional()?;
        Ok(name.flatten())
    }

    async fn photo_path(&self, user: i64) -> Result<Option<String>, ServerError> {
        let mut db = self.db_pool.get()?;
        let path = profiles
            .filter(p_user_id.eq(user))
            .select(p_photo_path)
            .get_result::<Option<String>>(&mut db)
            .optional()?;
        Ok(path.flatten())
    }

    async fn save_profile(
        &self,
        user: i64,
        save: ProfileSave,
        work: Vec<NewWorkEntry>,
        edu: Vec<NewEducationEntry>,
    ) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        // parent upsert and child list replacement are one unit; readers never
        // observe a half-replaced profile
        db.transaction::<_, diesel::result::Error, _>(|db| {
            diesel::insert_into(profiles)
                .values(&initial_row(user, &save))
                .on_conflict(p_user_id)
                .do_update()
                .set(&save)
                .execute(db)?;

            diesel::delete(wh::work_history.filter(wh::user_id.eq(user))).execute(db)?;
            if !work.is_empty() {
                diesel::insert_into(wh::work_history).values(&work).execute(db)?;
            }

            diesel::delete(ed::education.filter(ed::user_id.eq(user))).execute(db)?;
            if !edu.is_empty() {
                diesel::insert_into(ed::education).values(&edu).execute(db)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn delete_profile(&self, user: i64) -> Result<bool, ServerError> {
        let mut db = self.db_pool.get()?;
        let deleted = db.transaction::<_, diesel::result::Error, _>(|db| {
            diesel::delete(nl::notification_log.filter(nl::user_id.eq(user))).execute(db)?;
            diesel::delete(nt::notifications.filter(nt::user_id.eq(user))).execute(db)?;
            diesel::delete(po::posts.filter(po::user_id.eq(user))).execute(db)?;
            diesel::delete(
                follows.filter(follower_id.eq(user).or(following_id.eq(user))),
            )
            .execute(db)?;
            diesel::delete(wh::work_history.filter(wh::user_id.eq(user))).execute(db)?;
            diesel::delete(ed::education.filter(ed::user_id.eq(user))).execute(db)?;
            diesel::delete(profiles.filter(p_user_id.eq(user))).execute(db)
        })?;
        Ok(deleted == 1)
    }

    async fn work_entries(&self, user: i64) -> Result<Vec<WorkEntryRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let entries = wh::work_history
            .filter(wh::user_id.eq(user))
            .order(wh::id.desc())
            .select(WorkEntryRow::as_select())
            .load(&mut db)?;
        Ok(entries)
    }

    async fn education_entries(&self, user: i64) -> Result<Vec<EducationEntryRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let entries = ed::education
            .filter(ed::user_id.eq(user))
            .order(ed::id.desc())
            .select(EducationEntryRow::as_select())
            .load(&mut db)?;
        Ok(entries)
    }

    async fn directory(&self, viewer: i64) -> Result<Vec<DirectoryEntry>, ServerError> {
        let mut db = self.db_pool.get()?;
        let rows: Vec<ProfileRow> = profiles
            .filter(p_user_id.ne(viewer).and(p_is_private.eq(false)))
            .select(ProfileRow::as_select())
            .load(&mut db)?;
        let rows: Vec<ProfileRow> = rows.into_iter().filter(has_content).collect();
        let ids: Vec<i64> = rows.iter().map(|p| p.user_id).collect();

        // current position first, then the newest entry
        let jobs: Vec<WorkEntryRow> = wh::work_history
            .filter(wh::user_id.eq_any(ids))
            .order((wh::is_current.desc(), wh::id.desc()))
            .select(WorkEntryRow::as_select())
            .load(&mut db)?;
        let mut top_job: HashMap<i64, WorkEntryRow> = HashMap::new();
        for job in jobs {
            top_job.entry(job.user_id).or_insert(job);
        }

        Ok(rows
            .into_iter()
            .map(|profile| {
                let job = top_job.remove(&profile.user_id);
                DirectoryEntry {
                    job_title: job.as_ref().and_then(|j| j.job_title.clone()),
                    company: job.and_then(|j| j.company),
                    profile,
                }
            })
            .collect())
    }

    async fn skill_profiles(&self) -> Result<Vec<(i64, Vec<String>)>, ServerError> {
        let mut db = self.db_pool.get()?;
        let rows: Vec<(i64, Option<String>)> = profiles
            .filter(p_skills.is_not_null().and(p_is_private.eq(false)))
            .select((p_user_id, p_skills))
            .load(&mut db)?;
        Ok(rows
            .into_iter()
            .map(|(id, raw)| (id, skills_from_json(raw.as_deref())))
            .filter(|(_, skills)| !skills.is_empty())
            .collect())
    }

    async fn update_language(&self, user: i64, lang: &str) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::update(profiles.filter(p_user_id.eq(user)))
            .set(p_language.eq(lang))
            .execute(&mut db)?;
        Ok(())
    }

    async fn update_theme(&self, user: i64, theme: &str) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::update(profiles.filter(p_user_id.eq(user)))
            .set(p_theme.eq(theme))
            .execute(&mut db)?;
        Ok(())
    }

    async fn update_custom_theme(&self, user: i64, colors: &str) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::update(profiles.filter(p_user_id.eq(user)))
            .set((p_theme.eq("custom"), p_custom_theme.eq(colors)))
            .execute(&mut db)?;
        Ok(())
    }

    async fn update_status(&self, user: i64, status: &str) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::update(profiles.filter(p_user_id.eq(user)))
            .set(p_status.eq(status))
            .execute(&mut db)?;
        Ok(())
    }

    async fn update_privacy(&self, user: i64, private: bool) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::update(profiles.filter(p_user_id.eq(user)))
            .set(p_is_private.eq(private))
            .execute(&mut db)?;
        Ok(())
    }

    async fn insert_follow(&self, viewer: i64, target: i64) -> Result<bool, ServerError> {
        let mut db = self.db_pool.get()?;
        let inserted = diesel::insert_into(follows)
            .values(&NewFollow {
                follower_id: viewer,
                following_id: target,
                created: Utc::now().naive_utc(),
            })
            .on_conflict_do_nothing()
            .execute(&mut db)?;
        Ok(inserted == 1)
    }

    async fn delete_follow(&self, viewer: i64, target: i64) -> Result<(), ServerError> {
        let mut db = self.db_pool.get()?;
        diesel::delete(
            follows.filter(follower_id.eq(viewer).and(following_id.eq(target))),
        )
        .execute(&mut db)?;
        Ok(())
    }

    async fn is_following(&self, viewer: i64, target: i64) -> Result<bool, ServerError> {
        let mut db = self.db_pool.get()?;
        let count: i64 = follows
            .filter(follower_id.eq(viewer).and(following_id.eq(target)))
            .count()
            .get_result(&mut db)?;
        Ok(count > 0)
    }

    async fn follow_counts(&self, user: i64) -> Result<(i64, i64), ServerError> {
        let mut db = self.db_pool.get()?;
        let followers: i64 = follows
            .filter(following_id.eq(user))
            .count()
            .get_result(&mut db)?;
        let following: i64 = follows
            .filter(follower_id.eq(user))
            .count()
            .get_result(&mut db)?;
        Ok((followers, following))
    }

    async fn follower_ids(&self, user: i64) -> Result<Vec<i64>, ServerError> {
        let mut db = self.db_pool.get()?;
        let ids = follows
            .filter(following_id.eq(user))
            .select(follower_id)
            .load(&mut db)?;
        Ok(ids)
    }

    async fn get_profile_links(
        &self,
        user: i64,
        direction: FollowDirection,
    ) -> Result<Vec<ProfileRow>, ServerError> {
        let mut db = self.db_pool.get()?;
        let linked = match direction {
            FollowDirection::FollowedBy => profiles
                .filter(p_user_id.eq_any(follows.select(follower_id).filter(following_id.eq(user))))
                .select(ProfileRow::as_select())
                .load(&mut db),
            FollowDirection::Following => profiles
                .filter(p_user_id.eq_any(follows.select(following_id).filter(follower_id.eq(user))))
                .select(ProfileRow::as_select())
                .load(&mut db),
        }?;
        Ok(linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_profile(user_id: i64) -> ProfileRow {
        ProfileRow {
            user_id,
            display_name: None,
            bio: None,
            link1: None,
            link2: None,
            link3: None,
            link4: None,
            link5: None,
            photo_path: None,
            skills: None,
            language: "en".into(),
            theme: "auto".into(),
            custom_theme: None,
            status: "networking".into(),
            is_private: false,
        }
    }

    #[test]
    fn empty_profiles_are_hidden_from_the_directory() {
        let blank = empty_profile(1);
        assert!(!has_content(&blank));

        let mut with_bio = empty_profile(2);
        with_bio.bio = Some("hi".into());
        assert!(has_content(&with_bio));

        let mut blank_bio = empty_profile(3);
        blank_bio.bio = Some(String::new());
        assert!(!has_content(&blank_bio));

        let mut with_photo = empty_profile(4);
        with_photo.photo_path = Some("uploads/4.jpg".into());
        assert!(has_content(&with_photo));

        let mut empty_skills = empty_profile(5);
        empty_skills.skills = Some("[]".into());
        assert!(!has_content(&empty_skills));

        let mut with_skills = empty_profile(6);
        with_skills.skills = Some("[\"rust\"]".into());
        assert!(has_content(&with_skills));
    }

    #[test]
    fn first_save_defaults_theme_and_status() {
        let save = ProfileSave {
            display_name: Some("Ada".into()),
            bio: None,
            link1: None,
            link2: None,
            link3: None,
            link4: None,
            link5: None,
            photo_path: None,
            skills: None,
            language: "en".into(),
        };
        let row = initial_row(7, &save);
        assert_eq!(row.theme, "auto");
        assert_eq!(row.status, "networking");
        assert!(!row.is_private);
        assert_eq!(row.display_name.as_deref(), Some("Ada"));
    }
}
