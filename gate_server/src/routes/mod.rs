//! Gateway HTTP routes — login, review submission, OSC control, charts.

pub mod ajax;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::FormRejection;
use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use tower_http::trace::TraceLayer;

use crate::dashboard::charts::{MonthCount, PersonCount};
use crate::errors::GatewayError;
use crate::models::envelope::Envelope;
use crate::services::auth_service::{Authenticator, LoginOutcome};
use crate::services::orchestrator::Orchestrator;
use crate::services::session::SessionStore;
use crate::services::workflow_store::WorkflowStore;

use self::ajax::{LoginForm, OscForm, SimpleCheckForm, WorkflowForm, WorkflowStatusReply};

/// Shared state for gateway route handlers.
#[derive(Clone)]
pub struct GateState {
    pub orchestrator: Orchestrator,
    pub store: Arc<dyn WorkflowStore>,
    pub auth: Authenticator,
    pub sessions: SessionStore,
    pub request_timeout: Duration,
}

/// Build the gateway's Axum router.
pub fn gate_router(state: GateState) -> Router {
    let request_timeout = state.request_timeout;
    Router::new()
        .route("/health", get(health))
        // Login
        .route("/authenticate/", post(authenticate_handler))
        .route("/logout/", post(logout_handler))
        // Review + OSC
        .route("/simplecheck/", post(simplecheck_handler))
        .route("/getOscPercent/", post(osc_percent_handler))
        .route("/getWorkflowStatus/", post(workflow_status_handler))
        .route("/stopOscProgress/", post(stop_osc_handler))
        // Charts
        .route("/getMonthCharts/", post(month_charts_handler))
        .route("/getPersonCharts/", post(person_charts_handler))
        .route("/templateList/", post(template_list_handler))
        .layer(middleware::from_fn_with_state(request_timeout, request_deadline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cut off a request that outlives `timeout` and answer with an envelope.
async fn request_deadline(State(timeout): State<Duration>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(path = %path, ?timeout, "Request timed out");
            let err = GatewayError::Timeout(timeout);
            let envelope = if path == "/simplecheck/" {
                ajax::review_envelope(Err(err))
            } else {
                ajax::error_envelope(&err)
            };
            Json(envelope).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

// ── Login ──

async fn authenticate_handler(
    State(state): State<GateState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ajax::error_envelope(&ajax::rejected_form(&rejection))).into_response(),
    };
    let window = state.auth.guard().window();
    let outcome = match state
        .auth
        .authenticate(form.username.as_deref(), form.password.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return Json(ajax::error_envelope(&e)).into_response(),
    };

    if outcome == LoginOutcome::Ok {
        let username = form.username.unwrap_or_default();
        let token = state.sessions.create(&username);
        tracing::info!(username = %username, "Login succeeded");
        return (
            [(SET_COOKIE, state.sessions.cookie(&token))],
            Json(outcome.into_envelope(window)),
        )
            .into_response();
    }
    Json(outcome.into_envelope(window)).into_response()
}

async fn logout_handler(State(state): State<GateState>, headers: HeaderMap) -> Response {
    if let Some(token) = SessionStore::token(&headers) {
        state.sessions.remove(&token);
    }
    (
        [(SET_COOKIE, SessionStore::expired_cookie())],
        Json(Envelope::ok("")),
    )
        .into_response()
}

// ── Review + OSC ──

async fn simplecheck_handler(
    State(state): State<GateState>,
    form: Result<Form<SimpleCheckForm>, FormRejection>,
) -> Json<Envelope> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ajax::review_envelope(Err(ajax::rejected_form(&rejection)))),
    };
    let result = state
        .orchestrator
        .submit_for_review(form.sql_content.as_deref(), form.cluster_name.as_deref())
        .await;
    Json(ajax::review_envelope(result))
}

async fn osc_percent_handler(
    State(state): State<GateState>,
    form: Result<Form<OscForm>, FormRejection>,
) -> Json<Envelope> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ajax::error_envelope(&ajax::rejected_form(&rejection))),
    };
    let (workflow_id, sql_id) = match ajax::osc_ids(&form) {
        Ok(ids) => ids,
        Err(e) => return Json(ajax::error_envelope(&e)),
    };
    match state.orchestrator.progress(workflow_id, sql_id).await {
        Ok(outcome) => Json(outcome.into_envelope()),
        Err(e) => Json(ajax::error_envelope(&e)),
    }
}

async fn workflow_status_handler(
    State(state): State<GateState>,
    form: Result<Form<WorkflowForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ajax::error_envelope(&ajax::rejected_form(&rejection))).into_response(),
    };
    let workflow_id = match ajax::required_id("workflowid", form.workflowid.as_deref()) {
        Ok(id) => id,
        Err(e) => return Json(ajax::error_envelope(&e)).into_response(),
    };
    match state.orchestrator.status(workflow_id).await {
        Ok(status) => Json(WorkflowStatusReply {
            status,
            msg: String::new(),
            data: String::new(),
        })
        .into_response(),
        Err(e) => Json(ajax::error_envelope(&e)).into_response(),
    }
}

async fn stop_osc_handler(
    State(state): State<GateState>,
    headers: HeaderMap,
    form: Result<Form<OscForm>, FormRejection>,
) -> Json<Envelope> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ajax::error_envelope(&ajax::rejected_form(&rejection))),
    };
    let (workflow_id, sql_id) = match ajax::osc_ids(&form) {
        Ok(ids) => ids,
        Err(e) => return Json(ajax::error_envelope(&e)),
    };
    let actor = state.sessions.actor(&headers);
    match state
        .orchestrator
        .cancel(actor.as_deref(), workflow_id, sql_id)
        .await
    {
        Ok(outcome) => Json(outcome.into_envelope()),
        Err(e) => Json(ajax::error_envelope(&e)),
    }
}

// ── Charts ──

async fn month_charts_handler(
    State(state): State<GateState>,
) -> Result<Json<Vec<MonthCount>>, Json<Envelope>> {
    state.store.month_counts().await.map(Json).map_err(|e| {
        tracing::error!("Month chart query failed: {e:#}");
        Json(Envelope::failure(crate::errors::STATUS_FAILED, "chart query failed"))
    })
}

async fn person_charts_handler(
    State(state): State<GateState>,
) -> Result<Json<Vec<PersonCount>>, Json<Envelope>> {
    state.store.person_counts().await.map(Json).map_err(|e| {
        tracing::error!("Person chart query failed: {e:#}");
        Json(Envelope::failure(crate::errors::STATUS_FAILED, "chart query failed"))
    })
}

async fn template_list_handler() -> Json<&'static str> {
    Json(ajax::TABLE_TEMPLATE)
}
