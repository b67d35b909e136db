use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Product tier. Governs photo count, message length and music eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Plan {
    Basic,
    Premium,
}

impl Plan {
    pub fn photo_limit(self) -> usize {
        match self {
            Plan::Basic => 3,
            Plan::Premium => 5,
        }
    }

    /// Maximum message length in characters (not bytes).
    pub fn message_limit(self) -> usize {
        match self {
            Plan::Basic => 280,
            Plan::Premium => 800,
        }
    }

    pub fn allows_music(self) -> bool {
        matches!(self, Plan::Premium)
    }

    /// One-time PIX price in centavos.
    pub fn price_cents(self) -> i64 {
        match self {
            Plan::Basic => 2990,
            Plan::Premium => 4990,
        }
    }

    /// Product name shown on the checkout page.
    pub fn product_name(self) -> &'static str {
        match self {
            Plan::Basic => "Love365 - Anual",
            Plan::Premium => "Love365 - Vitalício",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Approved,
}

/// How to reach the customer once the page is paid. At least one is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: Option<String>,
    /// Digits only.
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub token: String,
    pub plan: Plan,
    pub names: String,
    pub start_date: NaiveDate,
    pub message: Option<String>,
    pub photo_urls: Vec<String>,
    pub music_url: Option<String>,
    pub contact: Contact,
    pub status: OrderStatus,
    pub created_at: i64,
    pub approved_at: Option<i64>,
}

/// Validated intake data, ready to be inserted.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub token: String,
    pub plan: Plan,
    pub names: String,
    pub start_date: NaiveDate,
    pub message: Option<String>,
    pub photo_urls: Vec<String>,
    pub music_url: Option<String>,
    pub contact: Contact,
}

/// Time since the couple's start date, as shown by the page counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Elapsed {
    /// Whole units between midnight UTC of `start` and `now`. Clamps to zero
    /// if `now` is earlier.
    pub fn between(start: NaiveDate, now: DateTime<Utc>) -> Self {
        let start = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let secs = (now - start).num_seconds().max(0);

        Self {
            days: secs / 86_400,
            hours: ((secs % 86_400) / 3_600) as u32,
            minutes: ((secs % 3_600) / 60) as u32,
            seconds: (secs % 60) as u32,
        }
    }
}

/// What the public page may see. Contact details are never included.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPage {
    pub token: String,
    pub plan: Plan,
    pub names: String,
    pub start_date: NaiveDate,
    pub message: Option<String>,
    pub photo_urls: Vec<String>,
    pub music_url: Option<String>,
    pub status: OrderStatus,
    pub created_at: i64,
    pub elapsed: Elapsed,
}

impl Order {
    pub fn to_public(&self, now: DateTime<Utc>) -> PublicPage {
        PublicPage {
            token: self.token.clone(),
            plan: self.plan,
            names: self.names.clone(),
            start_date: self.start_date,
            message: self.message.clone(),
            photo_urls: self.photo_urls.clone(),
            music_url: self.music_url.clone(),
            status: self.status,
            created_at: self.created_at,
            elapsed: Elapsed::between(self.start_date, now),
        }
    }
}
