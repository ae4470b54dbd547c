use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

use crate::database::user_repo;
use crate::models::AccessLevel;
use crate::AppState;

/// The resolved caller, injected into request extensions. Session issuing and
/// validation live in the auth service; this middleware only reads the token
/// payload and loads the caller's directory entry.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: String,
    pub access_level: AccessLevel,
}

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
}

fn token_from_request(request: &Request) -> Option<String> {
    // Bearer header first, access_token cookie as fallback.
    if let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(value.to_string());
    }

    request
        .headers()
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split("; ")
                .find_map(|c| c.strip_prefix("access_token=").map(|t| t.to_string()))
        })
}

fn subject_from_token(token: &str) -> Option<String> {
    // Parse JWT payload (middle part).
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let payload = serde_json::from_slice::<JwtPayload>(&payload_bytes).ok()?;
    Some(payload.sub)
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let subject = token_from_request(&request).and_then(|t| subject_from_token(&t));

    if let Some(user_id) = subject {
        match user_repo::get_user(&state.pool, &user_id).await {
            Ok(Some(user)) => {
                let access_level = user.access_level();
                request.extensions_mut().insert(AuthenticatedUser {
                    id: user.user_id,
                    access_level,
                });
                return next.run(request).await;
            }
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "token subject not in user directory");
            }
            Err(e) => {
                tracing::error!(error = %e, "auth lookup failed");
                return Response::builder()
                    .status(500)
                    .body(axum::body::Body::from("Internal server error"))
                    .unwrap();
            }
        }
    }

    Response::builder()
        .status(401)
        .body(axum::body::Body::from("Unauthorized - Please login"))
        .unwrap()
}
