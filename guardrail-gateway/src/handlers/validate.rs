// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use guardrail_policy_engine::policy::RuleBackend;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::admission::{
    build_input, decide, route_package, AdmissionResponse, AdmissionReview,
    AdmissionReviewResponse,
};
use crate::state::GatewayState;

const JSON_MEDIA_TYPE: &str = "application/json";

/// A request refused before any policy was evaluated.
#[derive(Debug, Error)]
pub enum MalformedRequest {
    #[error("unsupported content type '{0}', expected application/json")]
    UnsupportedMediaType(String),

    /// `uid` and `api_version` are recovered from the body when it is at
    /// least valid JSON, so the control plane can still correlate the reply.
    #[error("malformed admission review: {reason}")]
    Decode {
        uid: Option<String>,
        api_version: Option<String>,
        reason: String,
    },
}

impl MalformedRequest {
    fn decode(body: &[u8], reason: String) -> Self {
        let document: Option<Value> = serde_json::from_slice(body).ok();
        let field = |pointer: &str| {
            document
                .as_ref()
                .and_then(|doc| doc.pointer(pointer))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        MalformedRequest::Decode {
            uid: field("/request/uid"),
            api_version: field("/apiVersion"),
            reason,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            MalformedRequest::UnsupportedMediaType(_) => "unsupported_media_type",
            MalformedRequest::Decode { .. } => "decode",
        }
    }
}

impl IntoResponse for MalformedRequest {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            MalformedRequest::UnsupportedMediaType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(json!({ "error": message })),
            )
                .into_response(),
            MalformedRequest::Decode {
                uid: Some(uid),
                api_version,
                ..
            } => {
                let review = AdmissionReviewResponse::new(
                    api_version.as_deref(),
                    AdmissionResponse::deny(uid, message),
                );
                (StatusCode::BAD_REQUEST, Json(review)).into_response()
            }
            MalformedRequest::Decode { uid: None, .. } => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
        }
    }
}

fn is_json(headers: &HeaderMap) -> Result<(), MalformedRequest> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
        Ok(())
    } else {
        Err(MalformedRequest::UnsupportedMediaType(content_type.to_string()))
    }
}

/// Admission webhook endpoint.
///
/// Always answers 200 with an AdmissionReview once the body decodes; policy
/// failures become denials, never HTTP errors.
///
/// # Endpoint
/// `POST /validate`
pub async fn validate<B: RuleBackend>(
    State(state): State<GatewayState<B>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match admit(&state, &headers, &body).await {
        Ok(review) => (StatusCode::OK, Json(review)).into_response(),
        Err(rejected) => {
            warn!(error = %rejected, "rejected admission request");
            state.metrics().record_rejection(rejected.reason());
            rejected.into_response()
        }
    }
}

async fn admit<B: RuleBackend>(
    state: &GatewayState<B>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<AdmissionReviewResponse, MalformedRequest> {
    is_json(headers)?;
    let review: AdmissionReview = serde_json::from_slice(body)
        .map_err(|err| MalformedRequest::decode(body, err.to_string()))?;
    let request = &review.request;

    let config = state.config();
    let package = route_package(&config.package_prefix, &request.kind.kind);
    let input = build_input(request);

    let started = Instant::now();
    let evaluation = state.evaluate(package.clone(), input).await;
    if let Err(failure) = &evaluation {
        warn!(
            uid = %request.uid,
            package = %package,
            error = %failure,
            "policy evaluation failed, denying request"
        );
    }
    let verdict = decide(&request.uid, &package, evaluation, config.unresolved_policy);

    state.metrics().record_decision(verdict.outcome.as_str());
    info!(
        uid = %request.uid,
        kind = %request.kind.kind,
        operation = request.operation.as_str(),
        namespace = request.namespace.as_deref().unwrap_or_default(),
        package = %package,
        allowed = verdict.response.allowed,
        outcome = verdict.outcome.as_str(),
        duration_ms = started.elapsed().as_millis() as u64,
        "admission decision"
    );

    Ok(AdmissionReviewResponse::new(
        review.api_version.as_deref(),
        verdict.response,
    ))
}
