mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::Notifier;
use crate::payments::PaymentGateway;
use crate::storage::PhotoStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
///
/// External collaborators are created once at startup and injected here.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public base URL for shareable links (e.g., https://love365.app)
    pub base_url: String,
    /// Where intake writes photos
    pub photos: Arc<dyn PhotoStore>,
    /// Checkout provider. `None` in development: intake returns the page URL.
    pub payments: Option<Arc<dyn PaymentGateway>>,
    /// Sends the "page ready" message after approval
    pub notifier: Arc<dyn Notifier>,
    /// Shared secret expected in the webhook query string, if configured
    pub webhook_secret: Option<String>,
    /// Upper bound for photo uploads plus the checkout call
    pub intake_timeout: Duration,
}

impl AppState {
    /// Shareable URL of the public page for `token`.
    pub fn page_url(&self, token: &str) -> String {
        format!("{}/p/{}", self.base_url, token)
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
    Pool::builder().max_size(10).build(manager)
}
