//! `POST /api/powerbi/axia/query` · `/api/v1/powerbi/query`,
//! `/api/v1/powerbi/axia/query/natural`, and `/api/v1/powerbi/axia/refresh`
//! (§6): direct DAX execution, a natural-language front-end to it that
//! routes through the chat model first, and dataset refresh.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use gateway_audit::{Actor, EventType, NewEvent, Outcome, Severity};
use gateway_auth::Permission;
use gateway_router::{ChatMessage, ChatRequest, SelectionContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFormat {
    Json,
    Csv,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_format")]
    pub format: QueryFormat,
}

fn default_format() -> QueryFormat {
    QueryFormat::Json
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub format: &'static str,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    if !auth.has_permission(Permission::Execute) {
        return Err(GatewayError::Auth(gateway_auth::AuthError::Forbidden));
    }
    if body.query.trim().is_empty() {
        return Err(GatewayError::Validation("query must not be empty".to_string()));
    }

    let data = state.analytics.query(&body.query).await?;

    state.audit.log_event(
        EventType::DataQueryExecuted,
        "analytics dataset query executed",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            detail: serde_json::json!({ "query": body.query }),
            ..Default::default()
        },
    );

    Ok(Json(render(body.format, data)))
}

#[derive(Deserialize)]
pub struct NaturalQueryRequest {
    pub question: String,
    #[serde(default = "default_format")]
    pub format: QueryFormat,
}

/// Asks the chat model to translate a natural-language question into a DAX
/// query, then executes that query against the dataset — the two-step flow
/// the original service's `natural_language_query` route performs inline.
pub async fn query_natural(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<NaturalQueryRequest>,
) -> ApiResult<QueryResponse> {
    if body.question.trim().is_empty() {
        return Err(GatewayError::Validation("question must not be empty".to_string()));
    }

    let translation_request = ChatRequest {
        content: format!(
            "Translate this question into a single DAX query against the connected dataset. \
             Respond with only the DAX query, no commentary: {}",
            body.question
        ),
        conversation: vec![ChatMessage {
            role: "system".to_string(),
            content: "You translate analytics questions into DAX queries.".to_string(),
        }],
        stable_context: String::new(),
        streaming: false,
        selection: SelectionContext::default(),
    };
    let translated = state.router.chat(translation_request).await;
    let dax_query = translated.content.trim().to_string();

    let data = state.analytics.query(&dax_query).await?;

    state.audit.log_event(
        EventType::DataQueryExecuted,
        "natural language query translated and executed",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            detail: serde_json::json!({ "question": body.question, "dax_query": dax_query }),
            ..Default::default()
        },
    );

    Ok(Json(render(body.format, data)))
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub status: String,
}

pub async fn refresh(State(state): State<Arc<AppState>>, auth: AuthContext) -> ApiResult<RefreshResponse> {
    if !auth.has_permission(Permission::Execute) {
        return Err(GatewayError::Auth(gateway_auth::AuthError::Forbidden));
    }

    let result = state.analytics.refresh_dataset().await?;

    state.audit.log_event(
        EventType::DataWrite,
        "dataset refresh triggered",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            ..Default::default()
        },
    );

    let status = result.get("status").and_then(Value::as_str).unwrap_or("triggered").to_string();
    Ok(Json(RefreshResponse { status }))
}

fn render(format: QueryFormat, data: Value) -> QueryResponse {
    match format {
        QueryFormat::Json => QueryResponse { format: "json", data, csv: None },
        QueryFormat::Csv => {
            let csv = to_csv(&data);
            QueryResponse { format: "csv", data, csv: Some(csv) }
        }
    }
}

/// Flattens a JSON array of flat objects into CSV. Anything shaped
/// differently (nested objects, a bare scalar) is rendered as a single
/// `value` column rather than rejected, since the dataset service's
/// response shape isn't under this gateway's control.
fn to_csv(value: &Value) -> String {
    let Some(rows) = value.as_array() else {
        return format!("value\n{}\n", value);
    };
    if rows.is_empty() {
        return String::new();
    }

    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    if columns.is_empty() {
        return rows.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n");
    }

    let mut out = String::new();
    out.push_str(&columns.join(","));
    out.push('\n');
    for row in rows {
        let obj = row.as_object();
        let cells: Vec<String> = columns
            .iter()
            .map(|col| {
                let cell = obj.and_then(|o| o.get(col)).map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                csv_escape(cell.unwrap_or_default())
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn csv_escape(field: String) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}
