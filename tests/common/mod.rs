//! Test utilities and fixtures for Love365 integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::Value;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub use love365::db::{AppState, DbPool, create_pool, init_db, queries};
pub use love365::email::{Notifier, NotifyResult, PageReadyNotice};
pub use love365::error::{AppError, Result, msg};
pub use love365::handlers::public::{INTAKE_BODY_LIMIT, create_page, get_page, health};
pub use love365::handlers::trace_layer;
pub use love365::handlers::webhooks::{WebhookOutcome, handle_abacatepay_webhook, process_payment_notice};
pub use love365::id::gen_token;
pub use love365::models::*;
pub use love365::payments::{Checkout, CheckoutRequest, PaymentGateway, PaymentNotice};
pub use love365::storage::{LocalFsStore, PhotoStore};

pub const BASE_URL: &str = "http://localhost:3000";
pub const CHECKOUT_URL: &str = "https://pay.example.com/checkout/bill_test";
pub const BOUNDARY: &str = "love365-test-boundary";

/// Gateway double that records what it was asked for.
#[derive(Default)]
pub struct FakeGateway {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    /// (token, plan, return_url) of the last request
    pub last_request: Mutex<Option<(String, Plan, String)>>,
}

impl FakeGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn create_checkout(&self, request: &CheckoutRequest<'_>) -> Result<Checkout> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((
            request.token.to_string(),
            request.plan,
            request.return_url.to_string(),
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Upstream("gateway down".into()));
        }
        Ok(Checkout {
            id: Some("bill_test".into()),
            url: CHECKOUT_URL.into(),
        })
    }
}

/// Notifier double that records every notice it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    /// (token, page_url, email) per call
    pub sent: Mutex<Vec<(String, String, Option<String>)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn page_ready(&self, notice: &PageReadyNotice<'_>) -> Result<NotifyResult> {
        self.sent.lock().unwrap().push((
            notice.token.to_string(),
            notice.page_url.to_string(),
            notice.contact.email.clone(),
        ));
        if self.fail {
            return Err(AppError::Internal("mail server unreachable".into()));
        }
        Ok(NotifyResult::Sent)
    }
}

/// Photo store that fails from the `fail_on`-th upload (1-based) on.
pub struct FailingStore {
    pub fail_on: usize,
    pub puts: AtomicUsize,
}

impl FailingStore {
    pub fn on_put(fail_on: usize) -> Self {
        Self {
            fail_on,
            puts: AtomicUsize::new(0),
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoStore for FailingStore {
    fn backend_tag(&self) -> &'static str {
        "failing"
    }

    async fn put(&self, key: &str, _content_type: &str, _bytes: Bytes) -> Result<String> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.fail_on {
            return Err(AppError::Storage("bucket unavailable".into()));
        }
        Ok(format!("https://cdn.example.com/{key}"))
    }
}

/// Collects formatted log lines, filtered like the server's default.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("love365=debug,tower_http=debug"))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A fresh app state backed by a temp directory: SQLite file, uploads dir,
/// fake gateway and recording notifier.
pub struct TestContext {
    pub state: AppState,
    pub gateway: Option<Arc<FakeGateway>>,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::default())
    }

    pub fn with_gateway(gateway: FakeGateway) -> Self {
        Self::build(Some(gateway), RecordingNotifier::default())
    }

    /// Development setup: intake returns the page URL.
    pub fn without_gateway() -> Self {
        Self::build(None, RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(Some(FakeGateway::default()), notifier)
    }

    fn build(gateway: Option<FakeGateway>, notifier: RecordingNotifier) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_test_pool(&dir);

        let gateway = gateway.map(Arc::new);
        let payments = gateway
            .clone()
            .map(|g| g as Arc<dyn PaymentGateway>);
        let notifier = Arc::new(notifier);

        let state = AppState {
            db: pool,
            base_url: BASE_URL.to_string(),
            photos: Arc::new(LocalFsStore::new(
                dir.path().join("uploads"),
                &format!("{}/uploads", BASE_URL),
            )),
            payments,
            notifier: notifier.clone(),
            webhook_secret: None,
            intake_timeout: Duration::from_secs(30),
        };

        Self {
            state,
            gateway,
            notifier,
            dir,
        }
    }

    pub fn gateway(&self) -> &FakeGateway {
        self.gateway.as_deref().expect("context has no gateway")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn conn(&self) -> PooledConnection<SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn app(&self) -> Router {
        test_app(self.state.clone())
    }

    pub fn order_count(&self) -> i64 {
        queries::count_orders(&self.conn()).unwrap()
    }

    /// Number of files written under the uploads dir.
    pub fn stored_photo_count(&self) -> usize {
        count_files(&self.uploads_dir())
    }
}

fn count_files(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

/// File-backed pool; an in-memory manager would give each pooled connection
/// its own empty database.
pub fn create_test_pool(dir: &TempDir) -> DbPool {
    let path = dir.path().join("test.db");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

/// Same routes as production, without the per-IP rate limiters (they need
/// connect info the oneshot requests don't carry).
pub fn test_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/pages",
            post(create_page).layer(DefaultBodyLimit::max(INTAKE_BODY_LIMIT)),
        )
        .route("/api/pages/{token}", get(get_page))
        .route("/webhook/abacatepay", post(handle_abacatepay_webhook))
        .with_state(state)
}

/// Builder for multipart/form-data request bodies.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Adds `n` small JPEG photo parts.
    pub fn photos(mut self, n: usize) -> Self {
        for i in 1..=n {
            self = self.file("photos", &format!("photo{i}.jpg"), "image/jpeg", b"\xff\xd8\xff\xe0fakejpeg");
        }
        self
    }

    pub fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/pages")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub fn yesterday() -> String {
    (chrono::Utc::now().date_naive() - chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

/// A valid BASIC submission without photos.
pub fn basic_form() -> MultipartForm {
    MultipartForm::new()
        .text("plan", "BASIC")
        .text("names", "Ana e Bruno")
        .text("startDate", &yesterday())
        .text("message", "Feliz aniversário de namoro!")
        .text("email", "a@b.com")
}

/// A valid PREMIUM submission without photos.
pub fn premium_form() -> MultipartForm {
    MultipartForm::new()
        .text("plan", "PREMIUM")
        .text("names", "Carla e Davi")
        .text("startDate", "2019-06-12")
        .text("phone", "+55 11 98765-4321")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn webhook_request(query: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/webhook/abacatepay{query}"))
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Insert a PENDING order directly, bypassing intake.
pub fn create_test_order(conn: &rusqlite::Connection, plan: Plan, contact: Contact) -> Order {
    let input = CreateOrder {
        token: gen_token(),
        plan,
        names: "Ana e Bruno".to_string(),
        start_date: chrono::NaiveDate::from_ymd_opt(2020, 2, 14).unwrap(),
        message: Some("Te amo".to_string()),
        photo_urls: vec![format!("{}/uploads/x/1.jpg", BASE_URL)],
        music_url: None,
        contact,
    };
    queries::create_order(conn, &input).expect("Failed to create test order")
}

pub fn email_contact(email: &str) -> Contact {
    Contact {
        email: Some(email.to_string()),
        phone: None,
    }
}
