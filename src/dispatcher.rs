use std::collections::HashSet;

use chrono::Local;
use tracing::{debug, warn};

use crate::delivery::{Button, DeepLink, DeliveryChannel};
use crate::error::ServerError;
use crate::models::ProfileRow;
use crate::notify_repo::NotificationRepository;
use crate::post_repo::PostRepository;
use crate::profile_repo::ProfileRepository;
use crate::service::ServiceState;

/// Characters of post content shown in a notification.
const PREVIEW_LEN: usize = 50;
/// Skill tags named in a skill-match message.
const SHOWN_TAGS: usize = 3;

const FALLBACK_NAME: &str = "Someone";

/// Work consumed by the notification worker, queued from request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTask {
    FollowerAdded { follower: i64, followee: i64 },
    PostPublished { post_id: i64, author: i64 },
    ResponseRequested { post_id: i64, responder: i64 },
    ProfileSaved { user: i64 },
}

pub async fn dispatch(state: &ServiceState, task: NotifyTask) -> Result<(), ServerError> {
    match task {
        NotifyTask::FollowerAdded { follower, followee } => {
            follower_added(state, follower, followee).await
        }
        NotifyTask::PostPublished { post_id, author } => {
            post_published(state, post_id, author).await
        }
        NotifyTask::ResponseRequested { post_id, responder } => {
            response_requested(state, post_id, responder).await
        }
        NotifyTask::ProfileSaved { user } => profile_saved(state, user).await,
    }
}

async fn follower_added(
    state: &ServiceState,
    follower: i64,
    followee: i64,
) -> Result<(), ServerError> {
    // the notification row was appended by the handler; this is delivery only
    let name = state
        .display_name(follower)
        .await?
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let button = Button { label: "Open profile", link: DeepLink::Profile(follower) };
    if let Err(e) = state
        .channel
        .send(followee, &follow_message(&name), Some(&button))
        .await
    {
        warn!("Failed to notify {followee}: {e}");
    }
    Ok(())
}

async fn post_published(state: &ServiceState, post_id: i64, author: i64) -> Result<(), ServerError> {
    let Some(post) = state.get_post(post_id).await? else {
        debug!("post {post_id} deleted before fan-out");
        return Ok(());
    };
    let author_name = state
        .display_name(author)
        .await?
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let snippet = preview(&post.content);
    let button = Button { label: "Open post", link: DeepLink::Post(post_id) };

    let followers = state.follower_ids(author).await?;
    let delivered = fan_out(
        state.channel.as_ref(),
        &followers,
        &post_message(&author_name, &snippet),
        Some(&button),
    )
    .await;
    debug!("notified {delivered}/{} followers of post {post_id}", followers.len());

    let tags = post.tag_list();
    if tags.is_empty() {
        return Ok(());
    }
    let text = skill_match_message(&tags, &snippet);
    let audience = match_audience(&tags, &state.skill_profiles().await?);
    let today = Local::now().date_naive();
    for recipient in audience {
        // the slot is claimed before the send; a failed send still consumes
        // it, which under-notifies rather than double counts
        if !state.try_count_skill_match(recipient, today).await? {
            debug!("skill-match cap reached for {recipient}");
            continue;
        }
        if let Err(e) = state.channel.send(recipient, &text, Some(&button)).await {
            warn!("Failed to notify {recipient}: {e}");
        }
    }
    Ok(())
}

async fn response_requested(
    state: &ServiceState,
    post_id: i64,
    responder: i64,
) -> Result<(), ServerError> {
    let Some(post) = state.get_post(post_id).await? else {
        debug!("post {post_id} deleted before response delivery");
        return Ok(());
    };
    let name = state
        .display_name(responder)
        .await?
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let button = Button { label: "Open profile", link: DeepLink::Profile(responder) };
    if let Err(e) = state
        .channel
        .send(post.user_id, &response_message(&name, &preview(&post.content)), Some(&button))
        .await
    {
        warn!("Failed to notify {}: {e}", post.user_id);
    }
    Ok(())
}

async fn profile_saved(state: &ServiceState, user: i64) -> Result<(), ServerError> {
    let Some(profile) = state.get_profile(user).await? else {
        return Ok(());
    };
    if let Err(e) = state
        .channel
        .send(user, &profile_saved_message(&profile), None)
        .await
    {
        warn!("Failed to confirm save to {user}: {e}");
    }
    Ok(())
}

/// Delivers one message to each recipient; a failed send is logged and the
/// loop moves on. Returns how many sends went through.
pub async fn fan_out(
    channel: &dyn DeliveryChannel,
    recipients: &[i64],
    text: &str,
    button: Option<&Button>,
) -> usize {
    let mut delivered = 0;
    for &recipient in recipients {
        match channel.send(recipient, text, button).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Failed to notify {recipient}: {e}"),
        }
    }
    delivered
}

/// Recipients whose skill set intersects the post's tags, case-insensitively.
pub fn match_audience(tags: &[String], profiles: &[(i64, Vec<String>)]) -> Vec<i64> {
    profiles
        .iter()
        .filter(|(_, skills)| skills_intersect(tags, skills))
        .map(|(id, _)| *id)
        .collect()
}

pub fn skills_intersect(tags: &[String], skills: &[String]) -> bool {
    let tags: HashSet<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    skills.iter().any(|s| tags.contains(&s.to_lowercase()))
}

pub fn preview(content: &str) -> String {
    let mut truncated: String = content.chars().take(PREVIEW_LEN).collect();
    if content.chars().count() > PREVIEW_LEN {
        truncated.push_str("...");
    }
    truncated
}

pub fn follow_message(follower: &str) -> String {
    format!("<b>{}</b> started following you", escape_html(follower))
}

pub fn post_message(author: &str, snippet: &str) -> String {
    format!("<b>{}</b> published a post:\n\n{}", escape_html(author), escape_html(snippet))
}

pub fn skill_match_message(tags: &[String], snippet: &str) -> String {
    let shown = tags
        .iter()
        .take(SHOWN_TAGS)
        .map(|t| escape_html(t))
        .collect::<Vec<_>>()
        .join(", ");
    format!("New post matching your skills (<b>{shown}</b>):\n\n{}", escape_html(snippet))
}

pub fn response_message(responder: &str, snippet: &str) -> String {
    format!("<b>{}</b> responded to your post:\n\n{}", escape_html(responder), escape_html(snippet))
}

pub fn profile_saved_message(profile: &ProfileRow) -> String {
    let mut text = String::from("Your profile has been updated.");
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
        text.push_str("\n\nAbout:\n<i>");
        text.push_str(&escape_html(bio));
        text.push_str("</i>");
    }
    let links = profile.links();
    if !links.is_empty() {
        text.push('\n');
        for link in links {
            text.push('\n');
            text.push_str(&escape_html(&link));
        }
    }
    text
}

// message text is interpolated into HTML parse mode
fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryError;
    use axum::async_trait;
    use std::sync::Mutex;

    struct FakeChannel {
        fail_for: HashSet<i64>,
        sent: Mutex<Vec<(i64, String, Option<String>)>>,
    }

    impl FakeChannel {
        fn new(fail_for: impl IntoIterator<Item = i64>) -> Self {
            FakeChannel {
                fail_for: fail_for.into_iter().collect(),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn recipients(&self) -> Vec<i64> {
            self.sent.lock().unwrap().iter().map(|(r, _, _)| *r).collect()
        }
    }

    #[async_trait]
    impl DeliveryChannel for FakeChannel {
        async fn send(
            &self,
            recipient: i64,
            text: &str,
            button: Option<&Button>,
        ) -> Result<(), DeliveryError> {
            if self.fail_for.contains(&recipient) {
                return Err(DeliveryError::Api(403));
            }
            self.sent.lock().unwrap().push((
                recipient,
                text.to_string(),
                button.map(|b| b.link.start_param()),
            ));
            Ok(())
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn fan_out_isolates_per_recipient_failures() {
        let channel = FakeChannel::new([2]);
        let delivered = fan_out(&channel, &[1, 2, 3], "hello", None).await;
        assert_eq!(delivered, 2);
        assert_eq!(channel.recipients(), vec![1, 3]);
    }

    #[tokio::test]
    async fn fan_out_carries_the_deep_link() {
        let channel = FakeChannel::new([]);
        let button = Button { label: "Open post", link: DeepLink::Post(456) };
        fan_out(&channel, &[9], "hello", Some(&button)).await;
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent[0].2.as_deref(), Some("p_456"));
    }

    #[test]
    fn preview_truncates_past_fifty_chars() {
        assert_eq!(preview("Looking for reviewer"), "Looking for reviewer");
        let exact = "x".repeat(50);
        assert_eq!(preview(&exact), exact);
        let long = "x".repeat(51);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let cyrillic = "д".repeat(50);
        assert_eq!(preview(&cyrillic), cyrillic);
    }

    #[test]
    fn skill_matching_is_case_insensitive() {
        assert!(skills_intersect(&tags(&["rust"]), &tags(&["Rust", "SQL"])));
        assert!(skills_intersect(&tags(&["RUST", "go"]), &tags(&["golang", "rust"])));
        assert!(!skills_intersect(&tags(&["rust"]), &tags(&["python"])));
        assert!(!skills_intersect(&[], &tags(&["rust"])));
    }

    #[test]
    fn audience_is_the_intersecting_profiles() {
        let profiles = vec![
            (1, tags(&["Rust", "SQL"])),
            (2, tags(&["python"])),
            (3, tags(&["RUST"])),
        ];
        assert_eq!(match_audience(&tags(&["rust"]), &profiles), vec![1, 3]);
        assert!(match_audience(&tags(&["haskell"]), &profiles).is_empty());
    }

    #[test]
    fn skill_match_message_names_at_most_three_tags() {
        let msg = skill_match_message(&tags(&["a", "b", "c", "d"]), "snippet");
        assert!(msg.contains("a, b, c"));
        assert!(!msg.contains("d"));
    }

    #[test]
    fn messages_escape_markup() {
        let msg = follow_message("<script>");
        assert!(msg.contains("&lt;script&gt;"));
        assert!(!msg.contains("<script>"));
    }

    #[test]
    fn saved_profile_message_lists_bio_and_links() {
        let profile = ProfileRow {
            user_id: 1,
            display_name: Some("Ada".into()),
            bio: Some("Engineer".into()),
            link1: Some("https://a.example".into()),
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
        };
        let msg = profile_saved_message(&profile);
        assert!(msg.contains("Engineer"));
        assert!(msg.contains("https://a.example"));
    }
}
