//! Submitted form payloads and the validators that turn them into drafts.
//!
//! Validators are pure: they only check shape and limits. Checks that need the
//! store (category exists, username is free) happen in the owning service and
//! are reported through the same [`FormErrors`].

use std::collections::BTreeMap;
use std::path::Path;

use bytes::Bytes;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{PostRecord, UserRecord};
use crate::util::timezone;

pub const TITLE_MAX_CHARS: usize = 256;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const NAME_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const PASSWORD_MIN_CHARS: usize = 8;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const IMAGE_EMPTY: &str = "The submitted file is empty.";
pub const IMAGE_INVALID: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const IMAGE_CONFLICT: &str =
    "Please either submit a file or check the clear checkbox, not both.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn has(&self, name: &str) -> bool {
        !self.field(name).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Either an existing record picked from a select, or free text for a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Existing(Uuid),
    New(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub is_published: Option<String>,
    /// Path of the image already attached to the post; never read from a submission.
    #[serde(default, skip_deserializing)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_clear: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub new_category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub new_location: Option<String>,
}

impl PostForm {
    /// A blank form for a new post: published, dated now.
    pub fn blank(now: OffsetDateTime, tz: Tz) -> Self {
        Self {
            pub_date: Some(timezone::datetime_local_value(now, tz)),
            is_published: Some("on".to_string()),
            ..Self::default()
        }
    }

    pub fn from_post(post: &PostRecord, tz: Tz) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: Some(timezone::datetime_local_value(post.pub_date, tz)),
            is_published: post.is_published.then(|| "on".to_string()),
            image: post.image.clone(),
            image_clear: None,
            category: post.category_id.map(|id| id.to_string()),
            new_category: None,
            location: post.location_id.map(|id| id.to_string()),
            new_location: None,
        }
    }

    pub fn published_checked(&self) -> bool {
        checkbox(self.is_published.as_deref())
    }

    pub fn clear_checked(&self) -> bool {
        checkbox(self.image_clear.as_deref())
    }
}

/// A file submitted through the post form's image input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: Bytes,
}

/// What a post form submission does to the post's image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Clear,
    /// A validated image; `file_name` carries the extension of the detected format.
    Replace(ImageUpload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub is_published: bool,
    pub image: ImageChange,
    pub category: Choice,
    pub location: Option<Choice>,
}

pub fn validate_post(
    form: &PostForm,
    upload: Option<&ImageUpload>,
    tz: Tz,
    now: OffsetDateTime,
) -> Result<PostDraft, FormErrors> {
    let mut errors = FormErrors::default();

    let title = form.title.trim();
    check_length(&mut errors, "title", title, 1, TITLE_MAX_CHARS);

    let text = form.text.trim();
    if text.is_empty() {
        errors.add("text", REQUIRED);
    }

    let pub_date = match non_blank(form.pub_date.as_deref()) {
        None => now,
        Some(raw) => match timezone::parse_datetime_local(raw, tz) {
            Ok(value) => value,
            Err(_) => {
                errors.add("pub_date", "Enter a valid date/time.");
                now
            }
        },
    };

    let image = match (upload, form.clear_checked()) {
        (Some(_), true) => {
            errors.add("image", IMAGE_CONFLICT);
            ImageChange::Keep
        }
        (Some(upload), false) => match validate_image(upload) {
            Ok(image) => ImageChange::Replace(image),
            Err(message) => {
                errors.add("image", message);
                ImageChange::Keep
            }
        },
        (None, true) => ImageChange::Clear,
        (None, false) => ImageChange::Keep,
    };

    let category = choice(
        &mut errors,
        "category",
        form.category.as_deref(),
        "new_category",
        form.new_category.as_deref(),
    );
    if category.is_none() && !errors.has("category") && !errors.has("new_category") {
        errors.add("category", REQUIRED);
    }

    let location = choice(
        &mut errors,
        "location",
        form.location.as_deref(),
        "new_location",
        form.new_location.as_deref(),
    );

    match category {
        Some(category) => errors.into_result(PostDraft {
            title: title.to_string(),
            text: text.to_string(),
            pub_date,
            is_published: form.published_checked(),
            image,
            category,
            location,
        }),
        None => Err(errors),
    }
}

/// Accept an upload only when its leading bytes match an image format browsers
/// render. The stored name takes the detected extension, whatever the client sent.
pub fn validate_image(upload: &ImageUpload) -> Result<ImageUpload, &'static str> {
    if upload.data.is_empty() {
        return Err(IMAGE_EMPTY);
    }
    let extension = sniff_image_extension(&upload.data).ok_or(IMAGE_INVALID)?;
    let stem = Path::new(&upload.file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or("image");

    Ok(ImageUpload {
        file_name: format!("{stem}.{extension}"),
        data: upload.data.clone(),
    })
}

fn sniff_image_extension(data: &[u8]) -> Option<&'static str> {
    const SIGNATURES: [(&[u8], &str); 5] = [
        (b"\x89PNG\r\n\x1a\n", "png"),
        (b"\xff\xd8\xff", "jpg"),
        (b"GIF87a", "gif"),
        (b"GIF89a", "gif"),
        (b"BM", "bmp"),
    ];

    if let Some(&(_, extension)) = SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
    {
        return Some(extension);
    }
    (data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP").then_some("webp")
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

pub fn validate_comment(form: &CommentForm) -> Result<String, FormErrors> {
    let text = form.text.trim();
    if text.is_empty() {
        return Err(FormErrors::single("text", REQUIRED));
    }
    Ok(text.to_string())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl ProfileForm {
    pub fn from_user(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

pub fn validate_profile(form: &ProfileForm) -> Result<ProfileDraft, FormErrors> {
    let mut errors = FormErrors::default();
    let draft = profile_draft(&mut errors, form);
    errors.into_result(draft)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    fn profile(&self) -> ProfileForm {
        ProfileForm {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupDraft {
    pub profile: ProfileDraft,
    pub password: String,
}

pub fn validate_signup(form: &SignupForm) -> Result<SignupDraft, FormErrors> {
    let mut errors = FormErrors::default();
    let profile = profile_draft(&mut errors, &form.profile());

    if form.password1.is_empty() {
        errors.add("password1", REQUIRED);
    } else if form.password1.chars().count() < PASSWORD_MIN_CHARS {
        errors.add(
            "password1",
            format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."
            ),
        );
    }

    if form.password2.is_empty() {
        errors.add("password2", REQUIRED);
    } else if form.password1 != form.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    errors.into_result(SignupDraft {
        profile,
        password: form.password1.clone(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

pub fn validate_login(form: &LoginForm) -> Result<(String, String), FormErrors> {
    let mut errors = FormErrors::default();
    let username = form.username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    }
    if form.password.is_empty() {
        errors.add("password", REQUIRED);
    }
    errors.into_result((username.to_string(), form.password.clone()))
}

/// Only same-site absolute paths are honoured as post-login targets.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = non_blank(next)?;
    let local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    local.then_some(next)
}

fn profile_draft(errors: &mut FormErrors, form: &ProfileForm) -> ProfileDraft {
    let username = form.username.trim();
    if check_length(errors, "username", username, 1, USERNAME_MAX_CHARS)
        && !username.chars().all(is_username_char)
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let email = form.email.trim();
    if check_length(errors, "email", email, 1, EMAIL_MAX_CHARS) && !is_email(email) {
        errors.add("email", "Enter a valid email address.");
    }

    let first_name = form.first_name.trim();
    check_length(errors, "first_name", first_name, 0, NAME_MAX_CHARS);
    let last_name = form.last_name.trim();
    check_length(errors, "last_name", last_name, 0, NAME_MAX_CHARS);

    ProfileDraft {
        username: username.to_string(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    }
}

fn choice(
    errors: &mut FormErrors,
    select_field: &'static str,
    selected: Option<&str>,
    new_field: &'static str,
    new_value: Option<&str>,
) -> Option<Choice> {
    if let Some(selected) = non_blank(selected) {
        return match Uuid::parse_str(selected) {
            Ok(id) => Some(Choice::Existing(id)),
            Err(_) => {
                errors.add(select_field, INVALID_CHOICE);
                None
            }
        };
    }

    let new_value = non_blank(new_value)?;
    check_length(errors, new_field, new_value, 1, TITLE_MAX_CHARS)
        .then(|| Choice::New(new_value.to_string()))
}

/// Records a field error and returns `false` when `value` is outside `min..=max` chars.
fn check_length(
    errors: &mut FormErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> bool {
    let count = value.chars().count();
    if count < min {
        errors.add(field, REQUIRED);
        return false;
    }
    if count > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {count})."),
        );
        return false;
    }
    true
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn checkbox(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("on" | "true" | "1" | "yes")
    )
}

fn is_username_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_')
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn post_form() -> PostForm {
        PostForm {
            title: "  Trip  ".into(),
            text: "Mountains".into(),
            pub_date: Some("2024-05-01T10:00".into()),
            is_published: Some("on".into()),
            image: None,
            image_clear: None,
            category: None,
            new_category: Some("Travel".into()),
            location: Some("".into()),
            new_location: None,
        }
    }

    #[test]
    fn valid_post_form_builds_draft() {
        let now = datetime!(2024-06-01 00:00 UTC);
        let draft = validate_post(&post_form(), None, chrono_tz::UTC, now).expect("valid");

        assert_eq!(draft.title, "Trip");
        assert_eq!(draft.pub_date, datetime!(2024-05-01 10:00 UTC));
        assert!(draft.is_published);
        assert_eq!(draft.image, ImageChange::Keep);
        assert_eq!(draft.category, Choice::New("Travel".into()));
        assert_eq!(draft.location, None);
    }

    #[test]
    fn missing_publish_date_defaults_to_now() {
        let now = datetime!(2024-06-01 00:00 UTC);
        let mut form = post_form();
        form.pub_date = None;
        form.is_published = None;

        let draft = validate_post(&form, None, chrono_tz::UTC, now).expect("valid");
        assert_eq!(draft.pub_date, now);
        assert!(!draft.is_published);
    }

    #[test]
    fn selected_category_wins_over_new_text() {
        let id = Uuid::new_v4();
        let mut form = post_form();
        form.category = Some(id.to_string());

        let draft =
            validate_post(&form, None, chrono_tz::UTC, OffsetDateTime::now_utc()).expect("valid");
        assert_eq!(draft.category, Choice::Existing(id));
    }

    #[test]
    fn invalid_post_form_reports_every_field() {
        let form = PostForm {
            title: "x".repeat(TITLE_MAX_CHARS + 1),
            pub_date: Some("soon".into()),
            category: Some("not-a-uuid".into()),
            ..PostForm::default()
        };

        let errors = validate_post(&form, None, chrono_tz::UTC, OffsetDateTime::now_utc())
            .expect_err("invalid");
        assert!(errors.has("title"));
        assert_eq!(errors.field("text"), [REQUIRED.to_string()]);
        assert!(errors.has("pub_date"));
        assert_eq!(errors.field("category"), [INVALID_CHOICE.to_string()]);
    }

    #[test]
    fn category_is_required() {
        let mut form = post_form();
        form.new_category = None;

        let errors = validate_post(&form, None, chrono_tz::UTC, OffsetDateTime::now_utc())
            .expect_err("invalid");
        assert_eq!(errors.field("category"), [REQUIRED.to_string()]);
    }

    #[test]
    fn blank_comment_is_rejected() {
        let errors = validate_comment(&CommentForm { text: "   ".into() }).expect_err("blank");
        assert!(errors.has("text"));
        assert_eq!(
            validate_comment(&CommentForm { text: " hi ".into() }).expect("valid"),
            "hi"
        );
    }

    #[test]
    fn signup_checks_username_email_and_passwords() {
        let form = SignupForm {
            username: "bad name!".into(),
            email: "nobody".into(),
            first_name: String::new(),
            last_name: String::new(),
            password1: "short".into(),
            password2: "different".into(),
        };

        let errors = validate_signup(&form).expect_err("invalid");
        assert!(errors.has("username"));
        assert!(errors.has("email"));
        assert!(errors.has("password1"));
        assert!(errors.has("password2"));

        let ok = SignupForm {
            username: "leo.tolstoy".into(),
            email: "leo@example.org".into(),
            first_name: "Leo".into(),
            last_name: "Tolstoy".into(),
            password1: "war-and-peace".into(),
            password2: "war-and-peace".into(),
        };
        let draft = validate_signup(&ok).expect("valid");
        assert_eq!(draft.profile.username, "leo.tolstoy");
    }

    #[test]
    fn only_local_paths_are_safe_redirect_targets() {
        assert_eq!(safe_next(Some("/posts/create/")), Some("/posts/create/"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }

    fn upload(file_name: &str, data: &'static [u8]) -> ImageUpload {
        ImageUpload {
            file_name: file_name.into(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn uploaded_image_takes_the_detected_extension() {
        let png = upload("Holiday.html", b"\x89PNG\r\n\x1a\n....");
        let draft = validate_post(
            &post_form(),
            Some(&png),
            chrono_tz::UTC,
            OffsetDateTime::now_utc(),
        )
        .expect("valid");

        match draft.image {
            ImageChange::Replace(image) => {
                assert_eq!(image.file_name, "Holiday.png");
                assert_eq!(image.data, png.data);
            }
            other => panic!("unexpected image change: {other:?}"),
        }
    }

    #[test]
    fn non_images_and_empty_files_are_rejected() {
        assert_eq!(
            validate_image(&upload("notes.png", b"just some text")),
            Err(IMAGE_INVALID)
        );
        assert_eq!(validate_image(&upload("empty.png", b"")), Err(IMAGE_EMPTY));

        let webp = validate_image(&upload("", b"RIFF\0\0\0\0WEBPVP8 ")).expect("webp");
        assert_eq!(webp.file_name, "image.webp");
    }

    #[test]
    fn clearing_and_uploading_at_once_is_a_conflict() {
        let mut form = post_form();
        form.image_clear = Some("on".into());

        let gif = upload("a.gif", b"GIF89a....");
        let errors = validate_post(&form, Some(&gif), chrono_tz::UTC, OffsetDateTime::now_utc())
            .expect_err("conflict");
        assert_eq!(errors.field("image"), [IMAGE_CONFLICT.to_string()]);

        let draft = validate_post(&form, None, chrono_tz::UTC, OffsetDateTime::now_utc())
            .expect("valid");
        assert_eq!(draft.image, ImageChange::Clear);
    }
}
