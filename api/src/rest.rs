use crate::AppState;
use application::{
    ApplicationError, CreateTermRequest, ListTermsQuery, MessageResponse, TermResponse,
    UpdateTermRequest,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Json as JsonResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::OpenApi;

/// Error body shared by every REST failure.
#[derive(Serialize, Deserialize, Debug, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Glossary REST API",
        description = "REST API for glossary terms",
        version = "1.0.0"
    ),
    paths(
        list_terms_handler,
        get_term_handler,
        create_term_handler,
        update_term_handler,
        delete_term_handler
    ),
    components(schemas(
        TermResponse,
        CreateTermRequest,
        UpdateTermRequest,
        MessageResponse,
        ErrorResponse
    )),
    tags((name = "Terms", description = "Glossary term management"))
)]
pub(crate) struct ApiDoc;

const OPENAPI_PATH: &str = "/openapi.json";

// Swagger UI assets come from the CDN; only the document is served locally
const SWAGGER_UI_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
<title>Glossary REST API - Swagger UI</title>
<link type="text/css" rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
</script>
</body>
</html>
"##;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .route("/docs", get(docs_handler))
        .route(OPENAPI_PATH, get(openapi_handler))
        .route("/health", get(health_check))
        .route("/stats", get(get_stats_handler))
        .route("/terms", get(list_terms_handler).post(create_term_handler))
        .route(
            "/terms/:term",
            get(get_term_handler)
                .put(update_term_handler)
                .delete(delete_term_handler),
        )
        .with_state(state)
}

// --- API Handlers ---

async fn root_redirect() -> Redirect {
    Redirect::temporary("/docs")
}

async fn docs_handler() -> Html<&'static str> {
    Html(SWAGGER_UI_PAGE)
}

async fn openapi_handler() -> JsonResponse<utoipa::openapi::OpenApi> {
    JsonResponse(ApiDoc::openapi())
}

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (StatusCode::OK, "OK")
}

async fn get_stats_handler(State(state): State<AppState>) -> Response {
    info!("Received request to get statistics");
    match state.stats_service.get_stats().await {
        Ok(stats) => (StatusCode::OK, JsonResponse(stats)).into_response(),
        Err(e) => {
            error!("Failed to get statistics via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

// --- Term Handlers ---

/// Handler for listing terms (GET /terms?sort_by=...&order=...).
#[utoipa::path(
    get,
    path = "/terms",
    tag = "Terms",
    params(ListTermsQuery),
    responses(
        (status = 200, description = "Terms in the requested order", body = [TermResponse]),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub(crate) async fn list_terms_handler(
    State(state): State<AppState>,
    Query(query): Query<ListTermsQuery>,
) -> Response {
    info!(sort_by = ?query.sort_by, order = ?query.order, "Received request to list terms");
    match state.glossary_service.list_terms(&query).await {
        Ok(terms) => (StatusCode::OK, JsonResponse(terms)).into_response(),
        Err(e) => {
            error!("Failed to list terms via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for fetching one term (GET /terms/:term).
#[utoipa::path(
    get,
    path = "/terms/{term}",
    tag = "Terms",
    params(("term" = String, Path, description = "Exact, case-sensitive term")),
    responses(
        (status = 200, description = "The term", body = TermResponse),
        (status = 404, description = "No such term", body = ErrorResponse)
    )
)]
pub(crate) async fn get_term_handler(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Response {
    info!(term = %term, "Received request to get term");
    match state.glossary_service.get_term(&term).await {
        Ok(found) => (StatusCode::OK, JsonResponse(found)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for creating a term (POST /terms).
#[utoipa::path(
    post,
    path = "/terms",
    tag = "Terms",
    request_body = CreateTermRequest,
    responses(
        (status = 201, description = "Term created", body = TermResponse),
        (status = 400, description = "Empty term or definition", body = ErrorResponse),
        (status = 409, description = "Term already exists", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub(crate) async fn create_term_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateTermRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    info!(term = %request.term, "Received request to create term");
    match state.glossary_service.create_term(request).await {
        Ok(created) => (StatusCode::CREATED, JsonResponse(created)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for replacing a definition (PUT /terms/:term).
#[utoipa::path(
    put,
    path = "/terms/{term}",
    tag = "Terms",
    params(("term" = String, Path, description = "Exact, case-sensitive term")),
    request_body = UpdateTermRequest,
    responses(
        (status = 200, description = "Definition replaced", body = TermResponse),
        (status = 400, description = "Empty definition", body = ErrorResponse),
        (status = 404, description = "No such term", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub(crate) async fn update_term_handler(
    State(state): State<AppState>,
    Path(term): Path<String>,
    payload: Result<Json<UpdateTermRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    info!(term = %term, "Received request to update term");
    match state.glossary_service.update_term(&term, request).await {
        Ok(updated) => (StatusCode::OK, JsonResponse(updated)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for deleting a term (DELETE /terms/:term).
#[utoipa::path(
    delete,
    path = "/terms/{term}",
    tag = "Terms",
    params(("term" = String, Path, description = "Exact, case-sensitive term")),
    responses(
        (status = 200, description = "Term deleted", body = MessageResponse),
        (status = 404, description = "No such term", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_term_handler(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Response {
    info!(term = %term, "Received request to delete term");
    match state.glossary_service.delete_term(&term).await {
        Ok(message) => (StatusCode::OK, JsonResponse(message)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Keeps axum's status for body errors but reports them in the shared error shape.
fn map_rejection_to_response(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(rejection.status(), rejection.body_text())
}

/// Maps ApplicationError to HTTP status codes and an error body.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    let (status, detail) = match err {
        ApplicationError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        e @ ApplicationError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        e @ ApplicationError::AlreadyExists(_) => (StatusCode::CONFLICT, e.to_string()),
        ApplicationError::StorageFailure { context, source } => {
            error!(context = %context, "Storage failure: {}", source);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            )
        }
    };
    error_response(status, detail)
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, JsonResponse(ErrorResponse { detail })).into_response()
}
