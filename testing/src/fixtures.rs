use serde_json::{Value, json};
use std::sync::Once;
use wiremock::matchers::{basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_USERNAME: &str = "crucible-bot";
pub const TEST_PASSWORD: &str = "crucible-secret";
pub const TEST_API_KEY: &str = "crucible-api-key";
pub const TEST_GITLAB_TOKEN: &str = "gitlab-hook-token";

pub const LISTING_PATH: &str = "/admin/repositories/";

static LOGGING: Once = Once::new();

/// Routes `tracing` output through the test harness writer. Safe to call from
/// every test.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn repository_json(name: &str, location: &str) -> Value {
    json!({
        "name": name,
        "displayName": name,
        "enabled": true,
        "type": "git",
        "git": { "location": location }
    })
}

pub fn svn_repository_json(name: &str) -> Value {
    json!({
        "name": name,
        "type": "svn",
        "svn": { "url": format!("svn://svn.example.com/{name}") }
    })
}

pub fn page_json(start: u32, values: Vec<Value>, last_page: bool) -> Value {
    json!({
        "start": start,
        "size": values.len(),
        "limit": values.len(),
        "lastPage": last_page,
        "values": values
    })
}

pub fn system_hook_json(event_name: &str, web_url: &str) -> Value {
    json!({
        "event_name": event_name,
        "project": {
            "name": "example",
            "web_url": web_url,
            "path_with_namespace": "jsmith/example"
        }
    })
}

/// Mock Crucible admin API on a random local port.
pub struct MockCrucible {
    server: MockServer
}

impl MockCrucible {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serves `repositories` as consecutive pages of at most `page_size`
    /// entries, each matched by its `start` query parameter and the test
    /// credentials.
    pub async fn mount_listing(&self, repositories: Vec<Value>, page_size: usize) {
        let page_size = page_size.max(1);
        if repositories.is_empty() {
            self.mount_page(0, page_json(0, Vec::new(), true)).await;
            return;
        }

        let total = repositories.len();
        for (index, chunk) in repositories.chunks(page_size).enumerate() {
            let start = index * page_size;
            let last_page = start + chunk.len() >= total;
            self.mount_page(start as u32, page_json(start as u32, chunk.to_vec(), last_page))
                .await;
        }
    }

    pub async fn mount_page(&self, start: u32, body: Value) {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("start", start.to_string()))
            .and(basic_auth(TEST_USERNAME, TEST_PASSWORD))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_page_response(&self, start: u32, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("start", start.to_string()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_trigger(&self, project_id: &str, status: u16) {
        Mock::given(method("PUT"))
            .and(path(format!("/admin/repositories/{project_id}/incremental-index")))
            .and(header("X-Api-Key", TEST_API_KEY))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Paths of every trigger call received so far, in arrival order.
    pub async fn received_triggers(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == "PUT")
            .map(|request| request.url.path().to_string())
            .collect()
    }

    pub async fn listing_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == LISTING_PATH)
            .count()
    }
}
