//! Agent roster API handlers
//!
//! GET/POST /api/agents, DELETE /api/agents/:id

use std::sync::OnceLock;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use regex::Regex;
use roster_common::db::Agent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::agents;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Word characters are ASCII only
const EMAIL_PATTERN: &str = concat!(
    r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*",
    r"@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*",
    r"(\.[A-Za-z0-9_]{2,3})+$",
);

/// POST /api/agents request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile_number: String,
}

/// POST /api/agents response
#[derive(Debug, Serialize)]
pub struct CreateAgentResponse {
    pub success: bool,
    pub message: String,
    pub agent: Agent,
}

/// GET /api/agents response
#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub success: bool,
    pub count: usize,
    pub agents: Vec<Agent>,
}

/// DELETE /api/agents/:id response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

fn is_valid_email(email: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

/// Check a create request and build the agent to insert
pub fn validate_new_agent(request: CreateAgentRequest) -> roster_common::Result<Agent> {
    let name = request.name.trim();
    let email = request.email.trim();
    let mobile_number = request.mobile_number.trim();

    if name.is_empty() || email.is_empty() || mobile_number.is_empty() {
        return Err(roster_common::Error::InvalidInput(
            "Please provide all required fields: name, email, mobileNumber".to_string(),
        ));
    }

    if !is_valid_email(email) {
        return Err(roster_common::Error::InvalidInput(
            "Please provide a valid email address".to_string(),
        ));
    }

    Ok(Agent {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_lowercase(),
        mobile_number: mobile_number.to_string(),
        created_at: roster_common::time::now(),
    })
}

/// POST /api/agents
pub async fn create_agent(
    State(state): State<AppState>,
    request: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateAgentResponse>)> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let agent = validate_new_agent(request)?;

    agents::insert_agent(&state.db, &agent).await?;

    tracing::info!(agent_id = %agent.id, email = %agent.email, "Agent created");

    Ok((
        StatusCode::CREATED,
        Json(CreateAgentResponse {
            success: true,
            message: "Agent created successfully".to_string(),
            agent,
        }),
    ))
}

/// GET /api/agents
///
/// Newest first.
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<Json<AgentsResponse>> {
    let agents = agents::list_agents(&state.db).await?;

    Ok(Json(AgentsResponse {
        success: true,
        count: agents.len(),
        agents,
    }))
}

/// DELETE /api/agents/:id
///
/// Also removes every list assigned to the agent.
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    agents::delete_agent(&state.db, &id).await.map_err(|e| match e {
        roster_common::Error::NotFound(_) => ApiError::NotFound("Agent not found".to_string()),
        other => ApiError::from(other),
    })?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Agent and associated lists deleted successfully".to_string(),
    }))
}

/// Build agent routes
pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/api/agents", get(list_agents).post(create_agent))
        .route("/api/agents/:id", delete(delete_agent))
}
