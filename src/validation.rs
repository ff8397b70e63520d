use crate::error::ServerError;

// Server-side limits, enforced before anything is persisted.
pub const MAX_NAME: usize = 100;
pub const MAX_BIO: usize = 1000;
pub const MAX_SKILLS_JSON: usize = 5000;
pub const MAX_LINKS: usize = 5;
pub const MAX_WORK_ENTRIES: usize = 10;
pub const MAX_EDUCATION_ENTRIES: usize = 5;
pub const MAX_POST_CONTENT: usize = 500;
pub const MAX_POST_DESCRIPTION: usize = 2000;
pub const MAX_POST_SKILLS_JSON: usize = 2000;
pub const MAX_EXPERIENCE_LABEL: usize = 50;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_LOCALES: [&str; 2] = ["ru", "en"];
pub const ALLOWED_PHOTO_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub fn check_len(key: &'static str, value: &str, limit: usize) -> Result<(), ServerError> {
    if value.chars().count() > limit {
        return Err(ServerError::Validation { key, limit });
    }
    Ok(())
}

pub fn check_count(key: &'static str, count: usize, limit: usize) -> Result<(), ServerError> {
    if count > limit {
        return Err(ServerError::Validation { key, limit });
    }
    Ok(())
}

/// Validates an uploaded photo part and returns the normalized extension.
pub fn check_photo(
    file_name: &str,
    content_type: Option<&str>,
    size: usize,
) -> Result<String, ServerError> {
    if size > MAX_PHOTO_BYTES {
        return Err(ServerError::Validation { key: "error_photo_too_large", limit: MAX_PHOTO_BYTES });
    }
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .filter(|e| ALLOWED_PHOTO_EXTENSIONS.contains(&e.as_str()))
        .ok_or(ServerError::BadRequest("Unsupported photo type"))?;
    match content_type {
        Some(ct) if ct.starts_with("image/") => Ok(ext),
        _ => Err(ServerError::BadRequest("Unsupported photo type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_limit_is_inclusive() {
        assert!(check_len("error_name_too_long", &"x".repeat(MAX_NAME), MAX_NAME).is_ok());
        assert!(check_len("error_name_too_long", &"x".repeat(MAX_NAME + 1), MAX_NAME).is_err());
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        // 100 multibyte chars are within the name limit even at 200 bytes
        let name = "й".repeat(MAX_NAME);
        assert!(check_len("error_name_too_long", &name, MAX_NAME).is_ok());
    }

    #[test]
    fn violation_carries_key_and_limit() {
        match check_count("error_experience_max_items", 11, MAX_WORK_ENTRIES) {
            Err(ServerError::Validation { key, limit }) => {
                assert_eq!(key, "error_experience_max_items");
                assert_eq!(limit, 10);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn photo_checks_extension_type_and_size() {
        assert_eq!(check_photo("me.JPG", Some("image/jpeg"), 100).unwrap(), "jpg");
        assert!(check_photo("me.bmp", Some("image/bmp"), 100).is_err());
        assert!(check_photo("me.png", Some("text/html"), 100).is_err());
        assert!(check_photo("noext", Some("image/png"), 100).is_err());
        assert!(check_photo("me.png", Some("image/png"), MAX_PHOTO_BYTES + 1).is_err());
    }
}
