//! HTTP routing and request/response mapping.
//!
//! # Responsibility
//! - Expose the JSON API over the core services.
//! - Translate domain errors into status codes and `{success, message}`
//!   bodies at the request boundary.
//!
//! # Invariants
//! - Handlers never leak internal error detail for 5xx responses; the
//!   original error goes to the log instead.
//! - Every `/todos` route resolves the owner from the bearer token first.

use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Local;
use log::error;
use morrow_core::{
    AuthError, AuthService, CompletionAnalysis, CreateTodoInput, PlanError, PlanOutcome,
    PlannerService, Priority, RepoError, SqliteTodoRepository, SqliteUserRepository, Todo,
    TodoId, TodoService, TokenError, UpdateTodoInput, UserId, UserProfile,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/send-verification-code", post(send_verification_code))
        .route("/auth/verify-code", post(verify_code))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/user", get(current_user))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", put(update_todo).delete(delete_todo))
        .route("/todos/plan-tomorrow", post(plan_tomorrow))
        .with_state(state)
}

/// Boundary error: an HTTP status plus the client-facing message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: &dyn std::fmt::Display) -> Self {
        error!("event=request_error module=http status=error error={err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    #[cfg(test)]
    fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingFields
            | AuthError::InvalidCode
            | AuthError::CodeExpired
            | AuthError::InvalidOrExpiredCode
            | AuthError::AlreadyVerified
            | AuthError::UserExists
            | AuthError::VerificationRequired => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            AuthError::InvalidCredentials | AuthError::EmailNotVerified => {
                Self::new(StatusCode::UNAUTHORIZED, err.to_string())
            }
            AuthError::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            AuthError::Token(token_err) => Self::from(token_err),
            AuthError::Delivery(_) | AuthError::Password(_) | AuthError::Repo(_) => {
                Self::internal(&err)
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingToken | TokenError::InvalidToken => {
                Self::new(StatusCode::UNAUTHORIZED, err.to_string())
            }
            TokenError::Signing(_) => Self::internal(&err),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::TodoNotFound(_) | RepoError::UserNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            RepoError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            _ => Self::internal(&err),
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Repo(repo_err) => Self::from(repo_err),
            PlanError::UnresolvableWindow => Self::internal(&err),
        }
    }
}

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

#[derive(Deserialize)]
struct VerifyCodeRequest {
    email: String,
    code: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
    code: String,
    new_password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

#[derive(Serialize)]
struct SessionResponse {
    success: bool,
    token: String,
    user: UserProfile,
}

#[derive(Serialize)]
struct UserResponse {
    success: bool,
    user: UserProfile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTodoRequest {
    title: String,
    #[serde(default)]
    completed: bool,
    due_date: Option<i64>,
    priority: Option<Priority>,
    #[serde(default)]
    tags: Vec<String>,
    category: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateTodoRequest {
    title: Option<String>,
    completed: Option<bool>,
    due_date: Option<i64>,
    priority: Option<Priority>,
    tags: Option<Vec<String>>,
    category: Option<String>,
    notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    success: bool,
    planned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tasks_existing: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tasks_planned: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<CompletionAnalysis>,
}

fn bearer_user(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Ok(state.tokens.authenticate(authorization)?)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": morrow_core::core_version(),
    }))
}

async fn send_verification_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    auth.request_verification_code(&body.email)?;
    Ok(MessageResponse::ok("verification code sent"))
}

async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    auth.verify_code(&body.email, &body.code)?;
    Ok(MessageResponse::ok("email verified"))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    let session = auth.register(&body.name, &body.email, &body.password)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            success: true,
            token: session.token,
            user: session.user,
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    let session = auth.login(&body.email, &body.password)?;
    Ok(Json(SessionResponse {
        success: true,
        token: session.token,
        user: session.user,
    }))
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = bearer_user(&state, &headers)?;
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    let user = auth.current_user(user_id)?;
    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    auth.request_password_reset(&body.email)?;
    Ok(MessageResponse::ok("password reset code sent"))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = state.db();
    let auth = AuthService::new(
        SqliteUserRepository::try_new(&conn)?,
        state.mailer,
        state.tokens.clone(),
    );
    auth.reset_password(&body.email, &body.code, &body.new_password)?;
    Ok(MessageResponse::ok("password updated"))
}

async fn list_todos(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Todo>>, ApiError> {
    let owner = bearer_user(&state, &headers)?;
    let mut conn = state.db();
    let todos = TodoService::new(SqliteTodoRepository::try_new(&mut conn)?);
    Ok(Json(todos.list(owner)?))
}

async fn create_todo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateTodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let owner = bearer_user(&state, &headers)?;
    let mut conn = state.db();
    let mut todos = TodoService::new(SqliteTodoRepository::try_new(&mut conn)?);
    let created = todos.create(
        owner,
        CreateTodoInput {
            title: body.title,
            completed: body.completed,
            due_date: body.due_date,
            priority: body.priority,
            tags: body.tags,
            category: body.category,
            notes: body.notes,
        },
    )?;
    Ok(Json(created))
}

async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TodoId>,
    headers: HeaderMap,
    Json(body): Json<UpdateTodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let owner = bearer_user(&state, &headers)?;
    let mut conn = state.db();
    let mut todos = TodoService::new(SqliteTodoRepository::try_new(&mut conn)?);
    let updated = todos.update(
        owner,
        id,
        UpdateTodoInput {
            title: body.title,
            completed: body.completed,
            due_date: body.due_date,
            priority: body.priority,
            tags: body.tags,
            category: body.category,
            notes: body.notes,
        },
    )?;
    Ok(Json(updated))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TodoId>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let owner = bearer_user(&state, &headers)?;
    let mut conn = state.db();
    let mut todos = TodoService::new(SqliteTodoRepository::try_new(&mut conn)?);
    todos.delete(owner, id)?;
    Ok(MessageResponse::ok("todo deleted"))
}

async fn plan_tomorrow(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PlanResponse>, ApiError> {
    let owner = bearer_user(&state, &headers)?;
    let mut conn = state.db();
    let planner = PlannerService::new(SqliteTodoRepository::try_new(&mut conn)?);
    let response = match planner.plan_tomorrow(owner, Local::now())? {
        PlanOutcome::AlreadyPlanned { tasks_existing } => PlanResponse {
            success: true,
            planned: false,
            tasks_existing: Some(tasks_existing),
            tasks_planned: None,
            analysis: None,
        },
        PlanOutcome::Planned {
            tasks_planned,
            analysis,
        } => PlanResponse {
            success: true,
            planned: true,
            tasks_existing: None,
            tasks_planned: Some(tasks_planned),
            analysis: Some(analysis),
        },
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::{ApiError, PlanResponse, ResetPasswordRequest, UpdateTodoRequest};
    use axum::http::StatusCode;
    use morrow_core::{AuthError, RepoError, TokenError};
    use uuid::Uuid;

    #[test]
    fn auth_errors_map_to_the_documented_statuses() {
        assert_eq!(
            ApiError::from(AuthError::MissingFields).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::UserExists).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::EmailNotVerified).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn token_errors_are_unauthorized() {
        assert_eq!(
            ApiError::from(TokenError::MissingToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TokenError::InvalidToken).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn foreign_todo_access_maps_to_not_found() {
        assert_eq!(
            ApiError::from(RepoError::TodoNotFound(Uuid::new_v4())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_errors_hide_their_detail() {
        let err = ApiError::from(RepoError::InvalidData("corrupt row".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn plan_response_omits_absent_fields() {
        let skipped = PlanResponse {
            success: true,
            planned: false,
            tasks_existing: Some(2),
            tasks_planned: None,
            analysis: None,
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["tasksExisting"], 2);
        assert!(json.get("tasksPlanned").is_none());
        assert!(json.get("analysis").is_none());
    }

    #[test]
    fn request_bodies_use_camel_case_fields() {
        let reset: ResetPasswordRequest = serde_json::from_str(
            r#"{"email":"a@example.com","code":"123456","newPassword":"pw"}"#,
        )
        .unwrap();
        assert_eq!(reset.new_password, "pw");

        let update: UpdateTodoRequest =
            serde_json::from_str(r#"{"dueDate":1700000000000,"completed":true}"#).unwrap();
        assert_eq!(update.due_date, Some(1_700_000_000_000));
        assert_eq!(update.completed, Some(true));
    }
}
