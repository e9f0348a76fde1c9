//! HTTP request handlers.
//!
//! Implements intake, lead reads, stage moves and the health check using axum.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use leadflow_domain::traits::LeadQuery;
use leadflow_domain::{now_millis, FieldValue, Lead, LeadId, Origin, RuleOutcome, Submission, SubmissionId, TemperatureTier, UtmParams};
use leadflow_intake::{IntakeCoordinator, IntakeError, IntakeOutcome};
use leadflow_store::SqliteStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Intake coordinator
    pub coordinator: Arc<IntakeCoordinator<SqliteStore>>,
    /// Store, for health checks
    pub store: Arc<SqliteStore>,
}

/// Field value as sent by clients
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(f64),
    /// JSON string
    Text(String),
}

impl From<FieldInput> for FieldValue {
    fn from(input: FieldInput) -> Self {
        match input {
            FieldInput::Bool(b) => FieldValue::Boolean(b),
            FieldInput::Number(n) => FieldValue::Number(n),
            FieldInput::Text(s) => FieldValue::Text(s),
        }
    }
}

/// Body of `POST /submissions`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionRequest {
    /// Idempotency key; generated when absent
    pub id: Option<String>,
    /// Target form
    pub form_id: String,
    /// Field values keyed by field id
    pub field_values: HashMap<String, FieldInput>,
    /// `utm_source`
    pub utm_source: Option<String>,
    /// `utm_medium`
    pub utm_medium: Option<String>,
    /// `utm_campaign`
    pub utm_campaign: Option<String>,
    /// `utm_content`
    pub utm_content: Option<String>,
    /// `utm_term`
    pub utm_term: Option<String>,
    /// Referrer URL
    pub referrer: Option<String>,
    /// Landing page URL
    pub landing_page: Option<String>,
    /// Client IP; falls back to the first `X-Forwarded-For` hop
    pub client_ip: Option<String>,
    /// Client user agent; falls back to the `User-Agent` header
    pub user_agent: Option<String>,
    /// Submission time (ms since epoch); defaults to now
    pub timestamp: Option<u64>,
}

impl SubmissionRequest {
    /// Build the domain submission
    pub fn into_submission(self, headers: &HeaderMap) -> Result<Submission, AppError> {
        let id = match self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(raw) => SubmissionId::from_string(raw)
                .map_err(|e| AppError::BadRequest(format!("invalid submission id: {}", e)))?,
            None => SubmissionId::new(),
        };

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let client_ip = self.client_ip.or_else(|| {
            header("x-forwarded-for").and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        });
        let user_agent = self.user_agent.or_else(|| header("user-agent"));

        let mut submission = Submission::new(self.form_id, self.timestamp.unwrap_or_else(now_millis)).with_utm(
            UtmParams {
                source: self.utm_source,
                medium: self.utm_medium,
                campaign: self.utm_campaign,
                content: self.utm_content,
                term: self.utm_term,
            },
        );
        submission.id = id;
        submission.field_values = self
            .field_values
            .into_iter()
            .map(|(field, value)| (field, value.into()))
            .collect();
        submission.referrer = self.referrer;
        submission.landing_page = self.landing_page;
        submission.client_ip = client_ip;
        submission.user_agent = user_agent;
        Ok(submission)
    }
}

/// Origin as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginResponse {
    /// Display name
    pub name: String,
    /// default, utm_automatic, custom_defined or form_based
    pub source_type: String,
    /// Source label
    pub source: Option<String>,
    /// Medium label
    pub medium: Option<String>,
    /// Campaign label
    pub campaign: Option<String>,
    /// `utm_content`
    pub content: Option<String>,
    /// `utm_term`
    pub term: Option<String>,
    /// Referrer
    pub referrer: Option<String>,
    /// Landing page
    pub landing_page: Option<String>,
}

impl From<Origin> for OriginResponse {
    fn from(origin: Origin) -> Self {
        Self {
            name: origin.name,
            source_type: origin.source_type.as_str().to_string(),
            source: origin.source,
            medium: origin.medium,
            campaign: origin.campaign,
            content: origin.content,
            term: origin.term,
            referrer: origin.referrer,
            landing_page: origin.landing_page,
        }
    }
}

/// Lead as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadResponse {
    /// Lead id
    pub id: String,
    /// Submission the lead was built from
    pub submission_id: String,
    /// Form id
    pub form_id: String,
    /// Score in 0..=100
    pub score: u8,
    /// Marketing qualified
    pub is_mql: bool,
    /// Temperature tier at response time
    pub temperature: String,
    /// Attribution
    pub origin: OriginResponse,
    /// Assigned member
    pub assigned_member_id: Option<String>,
    /// Pipeline id
    pub pipeline_id: String,
    /// Current stage id
    pub stage_id: String,
    /// Geo location, "unknown" until looked up
    pub location: String,
    /// Creation time (ms)
    pub created_at: u64,
    /// Last entry into the initial stage (ms)
    pub initial_stage_entry_time: u64,
    /// Entry into the current stage (ms)
    pub current_stage_entry_time: u64,
}

impl From<Lead> for LeadResponse {
    fn from(lead: Lead) -> Self {
        Self {
            id: lead.id.to_string(),
            submission_id: lead.submission_id.to_string(),
            form_id: lead.form_id,
            score: lead.score,
            is_mql: lead.is_mql,
            temperature: lead.temperature_tier.as_str().to_string(),
            origin: lead.origin.into(),
            assigned_member_id: lead.assigned_member_id,
            pipeline_id: lead.pipeline_id,
            stage_id: lead.stage_id,
            location: lead.location,
            created_at: lead.created_at,
            initial_stage_entry_time: lead.initial_stage_entry_time,
            current_stage_entry_time: lead.current_stage_entry_time,
        }
    }
}

/// One scoring rule's contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcomeResponse {
    /// Position of the rule on the form
    pub rule_index: usize,
    /// Whether the rule matched
    pub matched: bool,
    /// Points it contributed
    pub points_awarded: u32,
}

impl From<RuleOutcome> for RuleOutcomeResponse {
    fn from(outcome: RuleOutcome) -> Self {
        Self {
            rule_index: outcome.rule_index,
            matched: outcome.matched,
            points_awarded: outcome.points_awarded,
        }
    }
}

/// Response of `POST /submissions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResponse {
    /// The lead
    pub lead: LeadResponse,
    /// assigned, rule_inactive, manual_mode, no_eligible_members,
    /// outside_working_hours, exhausted or replayed
    pub allocation: String,
    /// Whether someone has to assign the lead by hand
    pub requires_manual_intervention: bool,
    /// True when the submission had been seen before
    pub replayed: bool,
    /// Per-rule scoring detail
    pub score_breakdown: Vec<RuleOutcomeResponse>,
}

impl From<IntakeOutcome> for SubmissionResponse {
    fn from(outcome: IntakeOutcome) -> Self {
        Self {
            allocation: outcome.allocation.as_str().to_string(),
            requires_manual_intervention: outcome.allocation.requires_manual_intervention(),
            replayed: outcome.replayed,
            lead: outcome.lead.into(),
            score_breakdown: outcome.score_breakdown.into_iter().map(Into::into).collect(),
        }
    }
}

/// Query string of `GET /leads`
#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsParams {
    /// Filter by pipeline
    pub pipeline_id: Option<String>,
    /// Filter by temperature tier as recomputed at request time
    pub tier: Option<String>,
    /// Rows to skip
    pub offset: Option<usize>,
    /// Maximum rows
    pub limit: Option<usize>,
}

/// Response of `GET /leads`
#[derive(Debug, Serialize, Deserialize)]
pub struct LeadListResponse {
    /// Matching leads
    pub leads: Vec<LeadResponse>,
    /// Number of leads returned
    pub count: usize,
}

/// Body of `POST /leads/:id/stage`
#[derive(Debug, Deserialize)]
pub struct StageMoveRequest {
    /// Target stage
    pub stage_id: String,
    /// Move time (ms since epoch); defaults to now
    #[serde(default)]
    pub at: Option<u64>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// "ok" or the store error
    pub store: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Validation reasons
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Intake error
    Intake(IntakeError),
    /// Malformed request
    BadRequest(String),
}

impl From<IntakeError> for AppError {
    fn from(e: IntakeError) -> Self {
        AppError::Intake(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::BadRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, Vec::new()),
            AppError::Intake(IntakeError::Validation(reasons)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Submission rejected".to_string(),
                reasons,
            ),
            AppError::Intake(e @ (IntakeError::InvalidStage { .. } | IntakeError::StageTimeRegression { .. })) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), Vec::new())
            }
            AppError::Intake(e @ IntakeError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string(), Vec::new()),
            AppError::Intake(e @ IntakeError::Allocation(_)) => {
                tracing::warn!(error = %e, "Allocation unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Lead distribution is busy, retry later".to_string(),
                    Vec::new(),
                )
            }
            AppError::Intake(e) => {
                tracing::error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Vec::new(),
                )
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

fn parse_lead_id(raw: &str) -> Result<LeadId, AppError> {
    // A malformed id can't name a stored lead
    LeadId::from_string(raw).map_err(|_| AppError::Intake(IntakeError::NotFound(raw.to_string())))
}

/// POST /submissions - Run intake
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let submission = request.into_submission(&headers)?;
    let outcome = state.coordinator.submit(submission).await?;

    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.into())))
}

/// GET /leads/:id - Read a lead with its temperature recomputed
async fn get_lead(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<LeadResponse>, AppError> {
    let id = parse_lead_id(&id)?;
    let lead = state.coordinator.read_lead(id, now_millis())?;
    Ok(Json(lead.into()))
}

/// GET /leads - List leads
async fn list_leads(
    State(state): State<AppState>,
    Query(params): Query<ListLeadsParams>,
) -> Result<Json<LeadListResponse>, AppError> {
    let tier = params
        .tier
        .as_deref()
        .map(|t| t.parse::<TemperatureTier>().map_err(AppError::BadRequest))
        .transpose()?;

    let query = LeadQuery {
        pipeline_id: params.pipeline_id,
        tier,
        offset: params.offset,
        limit: params.limit,
    };
    let leads: Vec<LeadResponse> = state
        .coordinator
        .list_leads(&query, now_millis())?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(LeadListResponse {
        count: leads.len(),
        leads,
    }))
}

/// POST /leads/:id/stage - Move a lead to another stage
async fn move_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StageMoveRequest>,
) -> Result<Json<LeadResponse>, AppError> {
    let id = parse_lead_id(&id)?;
    let at = request.at.unwrap_or_else(now_millis);
    let lead = state.coordinator.move_stage(id, &request.stage_id, at)?;
    Ok(Json(lead.into()))
}

/// GET /health - Liveness and store reachability
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthCheckResponse>) {
    match state.store.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthCheckResponse {
                status: "healthy".to_string(),
                store: "ok".to_string(),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthCheckResponse {
                status: "unhealthy".to_string(),
                store: e.to_string(),
            }),
        ),
    }
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/submissions", post(submit))
        .route("/leads", get(list_leads))
        .route("/leads/:id", get(get_lead))
        .route("/leads/:id/stage", post(move_stage))
        .route("/health", get(health_check))
        .with_state(state)
}
