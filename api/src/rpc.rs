//! RPC front-end: one `POST /rpc` endpoint carrying a tagged request union.
//!
//! The outcome travels in the envelope's `status`, gRPC style, so the HTTP
//! status is always 200. A missing `params` object reads as `{}` and missing
//! string fields read as empty; empty required fields are rejected here
//! before the repository is called.

use crate::AppState;
use application::{
    ApplicationError, CreateTermRequest, GlossaryService, ListTermsQuery, TermResponse,
    UpdateTermRequest,
};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{error, info};

/// Wire form of a call, before the method name is resolved.
#[derive(Deserialize, Debug)]
pub struct RpcEnvelope {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "params")]
pub enum RpcRequest {
    GetTerms {
        #[serde(default)]
        sort_by: Option<String>,
        #[serde(default)]
        order: Option<String>,
    },
    GetTerm {
        #[serde(default)]
        term: String,
    },
    CreateTerm {
        #[serde(default)]
        term: String,
        #[serde(default)]
        definition: String,
    },
    UpdateTerm {
        #[serde(default)]
        term: String,
        #[serde(default)]
        definition: String,
    },
    DeleteTerm {
        #[serde(default)]
        term: String,
    },
}

impl TryFrom<RpcEnvelope> for RpcRequest {
    type Error = serde_json::Error;

    fn try_from(envelope: RpcEnvelope) -> Result<Self, Self::Error> {
        let params = envelope
            .params
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(json!({ "method": envelope.method, "params": params }))
    }
}

impl RpcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetTerms { .. } => "GetTerms",
            Self::GetTerm { .. } => "GetTerm",
            Self::CreateTerm { .. } => "CreateTerm",
            Self::UpdateTerm { .. } => "UpdateTerm",
            Self::DeleteTerm { .. } => "DeleteTerm",
        }
    }

    /// Rejects requests whose required fields are empty.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::GetTerms { .. } => Ok(()),
            Self::GetTerm { term } | Self::DeleteTerm { term } => {
                if term.trim().is_empty() {
                    Err("Term name required")
                } else {
                    Ok(())
                }
            }
            Self::CreateTerm { term, definition } | Self::UpdateTerm { term, definition } => {
                if term.trim().is_empty() || definition.trim().is_empty() {
                    Err("Term and definition required")
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcStatus {
    Ok,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Internal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RpcResult {
    Term(TermResponse),
    TermList { terms: Vec<TermResponse> },
    OperationResult { success: bool, message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub status: RpcStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResult>,
}

impl RpcResponse {
    fn ok(result: RpcResult) -> Self {
        Self {
            status: RpcStatus::Ok,
            message: None,
            result: Some(result),
        }
    }

    fn failure(status: RpcStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            result: None,
        }
    }
}

impl From<ApplicationError> for RpcResponse {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::InvalidInput(msg) => Self::failure(RpcStatus::InvalidArgument, msg),
            e @ ApplicationError::NotFound(_) => Self::failure(RpcStatus::NotFound, e.to_string()),
            e @ ApplicationError::AlreadyExists(_) => {
                Self::failure(RpcStatus::AlreadyExists, e.to_string())
            }
            ApplicationError::StorageFailure { context, source } => {
                error!(context = %context, "Storage failure: {}", source);
                Self::failure(RpcStatus::Internal, "An internal error occurred")
            }
        }
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .with_state(state)
}

pub(crate) async fn rpc_handler(
    State(state): State<AppState>,
    payload: Result<Json<RpcEnvelope>, JsonRejection>,
) -> Json<RpcResponse> {
    let envelope = match payload {
        Ok(Json(envelope)) => envelope,
        Err(rejection) => {
            info!("Rejected RPC payload: {}", rejection.body_text());
            return Json(RpcResponse::failure(
                RpcStatus::InvalidArgument,
                rejection.body_text(),
            ));
        }
    };
    let request = match RpcRequest::try_from(envelope) {
        Ok(request) => request,
        Err(e) => {
            info!("Rejected RPC call: {}", e);
            return Json(RpcResponse::failure(RpcStatus::InvalidArgument, e.to_string()));
        }
    };
    Json(dispatch(&state.glossary_service, request).await)
}

/// Validates and executes one RPC request against the glossary service.
pub async fn dispatch(service: &GlossaryService, request: RpcRequest) -> RpcResponse {
    let method = request.method();
    info!(method, "RPC call received");
    if let Err(reason) = request.validate() {
        info!(method, reason, "RPC call rejected");
        return RpcResponse::failure(RpcStatus::InvalidArgument, reason);
    }

    let outcome = match request {
        RpcRequest::GetTerms { sort_by, order } => service
            .list_terms(&ListTermsQuery { sort_by, order })
            .await
            .map(|terms| RpcResult::TermList { terms }),
        RpcRequest::GetTerm { term } => service.get_term(&term).await.map(RpcResult::Term),
        RpcRequest::CreateTerm { term, definition } => service
            .create_term(CreateTermRequest { term, definition })
            .await
            .map(RpcResult::Term),
        RpcRequest::UpdateTerm { term, definition } => service
            .update_term(&term, UpdateTermRequest { definition })
            .await
            .map(RpcResult::Term),
        RpcRequest::DeleteTerm { term } => {
            service
                .delete_term(&term)
                .await
                .map(|response| RpcResult::OperationResult {
                    success: true,
                    message: response.message,
                })
        }
    };

    match outcome {
        Ok(result) => {
            info!(method, "RPC call succeeded");
            RpcResponse::ok(result)
        }
        Err(e) => {
            let response = RpcResponse::from(e);
            info!(method, status = ?response.status, "RPC call failed");
            response
        }
    }
}
