//! Intake form rules.
//!
//! Everything here is pure: the handler collects the multipart fields into a
//! [`RawIntake`], and [`validate`] either produces a [`ValidatedIntake`] or the
//! first rule violated. No photo is stored and no row is written until this
//! has passed.

use axum::body::Bytes;
use chrono::{DateTime, NaiveDate};
use url::Url;

use crate::error::{AppError, Result, msg};
use crate::models::{Contact, Plan};

pub const MAX_NAMES_CHARS: usize = 60;
pub const MAX_EMAIL_CHARS: usize = 120;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const MIN_YOUTUBE_ID_LEN: usize = 6;

/// One uploaded file part.
#[derive(Debug, Clone)]
pub struct PhotoPart {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Form fields as submitted, before any rule is applied.
#[derive(Debug, Clone, Default)]
pub struct RawIntake {
    pub plan: Option<String>,
    pub names: Option<String>,
    pub start_date: Option<String>,
    pub message: Option<String>,
    pub music_url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photos: Vec<PhotoPart>,
}

#[derive(Debug, Clone)]
pub struct ValidatedIntake {
    pub plan: Plan,
    pub names: String,
    pub start_date: NaiveDate,
    pub message: Option<String>,
    /// Canonical watch URL
    pub music_url: Option<String>,
    pub contact: Contact,
    pub photos: Vec<PhotoPart>,
}

/// Apply every intake rule. `today` is the server's current UTC date.
pub fn validate(raw: RawIntake, today: NaiveDate) -> Result<ValidatedIntake> {
    let plan = parse_plan(raw.plan.as_deref())?;
    let names = validate_names(raw.names.as_deref())?;
    let start_date = parse_start_date(raw.start_date.as_deref(), today)?;
    let message = validate_message(plan, raw.message.as_deref())?;
    let photos = validate_photos(plan, raw.photos)?;
    let music_url = validate_music(plan, raw.music_url.as_deref())?;
    let contact = validate_contact(raw.email.as_deref(), raw.phone.as_deref())?;

    Ok(ValidatedIntake {
        plan,
        names,
        start_date,
        message,
        music_url,
        contact,
        photos,
    })
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_plan(raw: Option<&str>) -> Result<Plan> {
    blank_to_none(raw)
        .and_then(|p| p.parse::<Plan>().ok())
        .ok_or_else(|| AppError::validation("plan", msg::INVALID_PLAN))
}

pub fn validate_names(raw: Option<&str>) -> Result<String> {
    let names = blank_to_none(raw).ok_or_else(|| AppError::validation("names", msg::NAMES_REQUIRED))?;
    if names.chars().count() > MAX_NAMES_CHARS {
        return Err(AppError::validation("names", msg::NAMES_TOO_LONG));
    }
    Ok(names.to_string())
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to the date it was
/// written with.
pub fn parse_start_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    let raw =
        blank_to_none(raw).ok_or_else(|| AppError::validation("startDate", msg::START_DATE_REQUIRED))?;

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local().date())
        })
        .ok_or_else(|| AppError::validation("startDate", msg::START_DATE_INVALID))?;

    if date > today {
        return Err(AppError::validation("startDate", msg::START_DATE_IN_FUTURE));
    }
    Ok(date)
}

pub fn validate_message(plan: Plan, raw: Option<&str>) -> Result<Option<String>> {
    let Some(message) = blank_to_none(raw) else {
        return Ok(None);
    };
    let limit = plan.message_limit();
    if message.chars().count() > limit {
        return Err(AppError::validation(
            "message",
            format!(
                "Message must be at most {} characters on the {} plan",
                limit,
                plan.as_ref()
            ),
        ));
    }
    Ok(Some(message.to_string()))
}

/// Drops empty parts, then checks count, type and size of the rest.
pub fn validate_photos(plan: Plan, photos: Vec<PhotoPart>) -> Result<Vec<PhotoPart>> {
    let photos: Vec<PhotoPart> = photos.into_iter().filter(|p| !p.bytes.is_empty()).collect();

    if photos.is_empty() {
        return Err(AppError::validation("photos", msg::PHOTOS_REQUIRED));
    }
    let limit = plan.photo_limit();
    if photos.len() > limit {
        return Err(AppError::validation(
            "photos",
            format!("The {} plan allows at most {} photos", plan.as_ref(), limit),
        ));
    }
    for photo in &photos {
        if !photo.content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(AppError::validation("photos", msg::PHOTO_NOT_IMAGE));
        }
        if photo.bytes.len() > MAX_PHOTO_BYTES {
            return Err(AppError::validation("photos", msg::PHOTO_TOO_LARGE));
        }
    }
    Ok(photos)
}

pub fn validate_music(plan: Plan, raw: Option<&str>) -> Result<Option<String>> {
    let Some(url) = blank_to_none(raw) else {
        return Ok(None);
    };
    if !plan.allows_music() {
        return Err(AppError::validation("musicUrl", msg::MUSIC_NOT_IN_PLAN));
    }
    let id = youtube_video_id(url).ok_or_else(|| AppError::validation("musicUrl", msg::MUSIC_URL_INVALID))?;
    Ok(Some(format!("https://www.youtube.com/watch?v={}", id)))
}

fn is_youtube_id(id: &str) -> bool {
    id.len() >= MIN_YOUTUBE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Video id from a YouTube link: `youtu.be/<id>`, `watch?v=<id>`,
/// `/shorts/<id>` or `/embed/<id>`. A missing scheme is tolerated.
pub fn youtube_video_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = Url::parse(raw)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{}", raw)).ok())?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            match segments.next() {
                Some("shorts") | Some("embed") => segments.next().map(str::to_string),
                _ => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
            }
        }
        _ => None,
    }?;

    is_youtube_id(&id).then_some(id)
}

pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_CHARS || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Digits of a phone number, if there are 10 to 13 of them.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    (10..=13).contains(&digits.len()).then_some(digits)
}

pub fn validate_contact(email: Option<&str>, phone: Option<&str>) -> Result<Contact> {
    let email = match blank_to_none(email) {
        Some(e) if is_valid_email(e) => Some(e.to_string()),
        Some(_) => return Err(AppError::validation("email", msg::EMAIL_INVALID)),
        None => None,
    };
    let phone = match blank_to_none(phone) {
        Some(p) => Some(normalize_phone(p).ok_or_else(|| AppError::validation("phone", msg::PHONE_INVALID))?),
        None => None,
    };

    if email.is_none() && phone.is_none() {
        return Err(AppError::validation("contact", msg::CONTACT_REQUIRED));
    }
    Ok(Contact { email, phone })
}
