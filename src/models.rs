use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Tag carried by every post: what the author wants from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Looking,
    Offering,
    Showcase,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Looking => "looking",
            PostType::Offering => "offering",
            PostType::Showcase => "showcase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "looking" => Some(PostType::Looking),
            "offering" => Some(PostType::Offering),
            "showcase" => Some(PostType::Showcase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Networking,
    OpenToWork,
    Hiring,
    OpenToGigs,
    Busy,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkStatus::Networking => "networking",
            NetworkStatus::OpenToWork => "open_to_work",
            NetworkStatus::Hiring => "hiring",
            NetworkStatus::OpenToGigs => "open_to_gigs",
            NetworkStatus::Busy => "busy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "networking" => Some(NetworkStatus::Networking),
            "open_to_work" => Some(NetworkStatus::OpenToWork),
            "hiring" => Some(NetworkStatus::Hiring),
            "open_to_gigs" => Some(NetworkStatus::OpenToGigs),
            "busy" => Some(NetworkStatus::Busy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Custom,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Theme::Auto),
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "custom" => Some(Theme::Custom),
            _ => None,
        }
    }
}

/// Closed set of notification kinds, matched exhaustively at render and
/// persistence time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    ResponseRequest,
    SkillMatch,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::ResponseRequest => "response_request",
            NotificationKind::SkillMatch => "skill_match",
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileRow {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub link1: Option<String>,
    pub link2: Option<String>,
    pub link3: Option<String>,
    pub link4: Option<String>,
    pub link5: Option<String>,
    pub photo_path: Option<String>,
    pub skills: Option<String>,
    pub language: String,
    pub theme: String,
    pub custom_theme: Option<String>,
    pub status: String,
    pub is_private: bool,
}

impl ProfileRow {
    /// The non-empty links in slot order.
    pub fn links(&self) -> Vec<String> {
        [&self.link1, &self.link2, &self.link3, &self.link4, &self.link5]
            .into_iter()
            .filter_map(|l| l.as_deref())
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn skill_list(&self) -> Vec<String> {
        skills_from_json(self.skills.as_deref())
    }
}

/// Changeset applied on re-save; theme, status and privacy have their own
/// endpoints and are deliberately absent. A `None` here overwrites, it does
/// not skip: clearing the bio must stick.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(treat_none_as_null = true)]
pub struct ProfileSave {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub link1: Option<String>,
    pub link2: Option<String>,
    pub link3: Option<String>,
    pub link4: Option<String>,
    pub link5: Option<String>,
    pub photo_path: Option<String>,
    pub skills: Option<String>,
    pub language: String,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::work_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkEntryRow {
    pub id: i64,
    pub user_id: i64,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub is_current: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkEntryInput {
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::work_history)]
pub struct NewWorkEntry {
    pub user_id: i64,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub is_current: bool,
}

impl NewWorkEntry {
    pub fn from_input(user_id: i64, input: WorkEntryInput) -> Self {
        NewWorkEntry {
            user_id,
            job_title: input.job_title,
            company: input.company,
            start_date: input.start_date,
            end_date: input.end_date,
            description: input.description,
            is_current: input.is_current,
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::education)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EducationEntryRow {
    pub id: i64,
    pub user_id: i64,
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EducationEntryInput {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::education)]
pub struct NewEducationEntry {
    pub user_id: i64,
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
}

impl NewEducationEntry {
    pub fn from_input(user_id: i64, input: EducationEntryInput) -> Self {
        NewEducationEntry {
            user_id,
            institution: input.institution,
            degree: input.degree,
            field_of_study: input.field_of_study,
            start_date: input.start_date,
            end_date: input.end_date,
            description: input.description,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::follows)]
pub struct NewFollow {
    pub follower_id: i64,
    pub following_id: i64,
    pub created: NaiveDateTime,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PostRow {
    pub post_id: i64,
    pub user_id: i64,
    pub post_type: String,
    pub content: String,
    pub full_description: Option<String>,
    pub skill_tags: String,
    pub experience_level: Option<String>,
    pub created: NaiveDateTime,
}

impl PostRow {
    pub fn tag_list(&self) -> Vec<String> {
        skills_from_json(Some(&self.skill_tags))
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost {
    pub user_id: i64,
    pub post_type: String,
    pub content: String,
    pub full_description: Option<String>,
    pub skill_tags: String,
    pub experience_level: Option<String>,
    pub created: NaiveDateTime,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(treat_none_as_null = true)]
pub struct PostChanges {
    pub post_type: String,
    pub content: String,
    pub full_description: Option<String>,
    pub skill_tags: String,
    pub experience_level: Option<String>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub from_user_id: Option<i64>,
    pub post_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: String,
    pub from_user_id: Option<i64>,
    pub post_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::notification_log)]
pub struct NewLogEntry {
    pub user_id: i64,
    pub date: NaiveDate,
    pub kind: String,
    pub sent: i32,
}

/// Skill sets are stored serialized; anything unparseable reads as empty
/// rather than failing the surrounding query.
pub fn skills_from_json(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_type_roundtrip() {
        for t in [PostType::Looking, PostType::Offering, PostType::Showcase] {
            assert_eq!(PostType::parse(t.as_str()), Some(t));
        }
        assert_eq!(PostType::parse("networking"), None);
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            NetworkStatus::Networking,
            NetworkStatus::OpenToWork,
            NetworkStatus::Hiring,
            NetworkStatus::OpenToGigs,
            NetworkStatus::Busy,
        ] {
            assert_eq!(NetworkStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(NetworkStatus::parse(""), None);
    }

    #[test]
    fn skills_tolerate_garbage() {
        assert_eq!(skills_from_json(Some("[\"Rust\",\"SQL\"]")), vec!["Rust", "SQL"]);
        assert!(skills_from_json(Some("not json")).is_empty());
        assert!(skills_from_json(None).is_empty());
    }

    #[test]
    fn links_skip_empty_slots() {
        let mut row = ProfileRow {
            user_id: 1,
            display_name: None,
            bio: None,
            link1: Some("https://a.example".into()),
            link2: None,
            link3: Some(String::new()),
            link4: Some("https://b.example".into()),
            link5: None,
            photo_path: None,
            skills: None,
            language: "en".into(),
            theme: "auto".into(),
            custom_theme: None,
            status: "networking".into(),
            is_private: false,
        };
        assert_eq!(row.links(), vec!["https://a.example", "https://b.example"]);
        row.link1 = None;
        row.link4 = None;
        assert!(row.links().is_empty());
    }
}
