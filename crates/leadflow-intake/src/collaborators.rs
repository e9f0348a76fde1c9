//! External collaborators used by intake side effects
//!
//! Every collaborator is best-effort: intake calls it from a spawned task
//! under a timeout and only logs failures.

use crate::{CollaboratorError, LeadNotice};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Metric counting every created lead
pub const METRIC_LEADS_CREATED: &str = "leads_created";

/// Metric counting marketing qualified leads
pub const METRIC_MQL_LEADS: &str = "mql_leads";

/// Sends new-lead notifications (e-mail relay, chat hook, ...)
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Announce a newly created lead
    async fn notify(&self, notice: &LeadNotice) -> Result<(), CollaboratorError>;
}

/// Resolves a client IP to a human-readable location
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Locate an IP; `Ok(None)` when the service has no answer
    async fn locate(&self, ip: &str) -> Result<Option<String>, CollaboratorError>;
}

/// Receives analytics counters
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Increment a counter for a lead
    async fn increment(&self, metric: &str, notice: &LeadNotice) -> Result<(), CollaboratorError>;
}

/// Notifier that drops every notice
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationDispatcher for NoopNotifier {
    async fn notify(&self, _notice: &LeadNotice) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Geo lookup that never knows the answer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeoLookup;

#[async_trait]
impl GeoLookup for NoopGeoLookup {
    async fn locate(&self, _ip: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(None)
    }
}

/// Analytics sink keeping counters in memory
#[derive(Debug, Default)]
pub struct InMemoryAnalytics {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryAnalytics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter
    pub fn count(&self, metric: &str) -> u64 {
        self.snapshot().get(metric).copied().unwrap_or(0)
    }

    /// Copy of every counter
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AnalyticsSink for InMemoryAnalytics {
    async fn increment(&self, metric: &str, _notice: &LeadNotice) -> Result<(), CollaboratorError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| CollaboratorError::Network("analytics counters poisoned".to_string()))?;
        *counters.entry(metric.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

/// Posts each notice as JSON to a webhook
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`, with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url: url.into(), client })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn notify(&self, notice: &LeadNotice) -> Result<(), CollaboratorError> {
        let response = self.client.post(&self.url).json(notice).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api(status.as_u16(), body));
        }
        Ok(())
    }
}

/// Response of the geo lookup service
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeoResponse {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl GeoResponse {
    fn location(self) -> Option<String> {
        let parts: Vec<String> = [self.city, self.region, self.country]
            .into_iter()
            .flatten()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Looks up `GET {base_url}/{ip}` and reads `city`, `region` and `country`
pub struct HttpGeoLookup {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGeoLookup {
    /// Create a lookup against `base_url`, with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn locate(&self, ip: &str) -> Result<Option<String>, CollaboratorError> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api(status.as_u16(), body));
        }

        let geo: GeoResponse = response.json().await?;
        Ok(geo.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::Arc;

    fn notice() -> LeadNotice {
        LeadNotice {
            lead_id: "lead-1".to_string(),
            form_id: "contact".to_string(),
            pipeline_id: "sales".to_string(),
            stage_id: "new".to_string(),
            origin: "Website".to_string(),
            score: 80,
            is_mql: true,
            assigned_member_id: Some("alice".to_string()),
            allocation: "assigned".to_string(),
            created_at: 1,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_geo_response_location() {
        let full = GeoResponse {
            city: Some("Lisbon".to_string()),
            region: Some(" ".to_string()),
            country: Some("PT".to_string()),
        };
        assert_eq!(full.location().as_deref(), Some("Lisbon, PT"));
        assert_eq!(GeoResponse::default().location(), None);
    }

    #[tokio::test]
    async fn test_in_memory_analytics() {
        let analytics = InMemoryAnalytics::new();
        analytics.increment(METRIC_LEADS_CREATED, &notice()).await.unwrap();
        analytics.increment(METRIC_LEADS_CREATED, &notice()).await.unwrap();
        analytics.increment(METRIC_MQL_LEADS, &notice()).await.unwrap();

        assert_eq!(analytics.count(METRIC_LEADS_CREATED), 2);
        assert_eq!(analytics.count(METRIC_MQL_LEADS), 1);
        assert_eq!(analytics.count("unknown"), 0);
    }

    #[tokio::test]
    async fn test_webhook_posts_notice() {
        let received: Arc<Mutex<Vec<LeadNotice>>> = Arc::default();
        let sink = Arc::clone(&received);
        let app = Router::new().route(
            "/hook",
            post(move |Json(notice): Json<LeadNotice>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(notice);
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let base = serve(app).await;

        let notifier = WebhookNotifier::new(format!("{}/hook", base), Duration::from_secs(5)).unwrap();
        notifier.notify(&notice()).await.unwrap();

        assert_eq!(received.lock().unwrap().as_slice(), &[notice()]);
    }

    #[tokio::test]
    async fn test_webhook_error_status() {
        let app = Router::new().route("/hook", post(|| async { (StatusCode::BAD_GATEWAY, "down") }));
        let base = serve(app).await;

        let notifier = WebhookNotifier::new(format!("{}/hook", base), Duration::from_secs(5)).unwrap();
        let result = notifier.notify(&notice()).await;
        assert!(matches!(result, Err(CollaboratorError::Api(502, ref body)) if body == "down"));
    }

    #[tokio::test]
    async fn test_http_geo_lookup() {
        let app = Router::new().route(
            "/geo/:ip",
            get(|Path(ip): Path<String>| async move {
                if ip == "10.0.0.1" {
                    Ok(Json(serde_json::json!({ "city": "Porto", "country": "PT" })))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }),
        );
        let base = serve(app).await;

        let geo = HttpGeoLookup::new(format!("{}/geo/", base), Duration::from_secs(5)).unwrap();
        assert_eq!(geo.locate("10.0.0.1").await.unwrap().as_deref(), Some("Porto, PT"));
        assert_eq!(geo.locate("10.0.0.2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Nothing listens on the discard port
        let geo = HttpGeoLookup::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(matches!(geo.locate("10.0.0.1").await, Err(CollaboratorError::Network(_))));
    }
}
