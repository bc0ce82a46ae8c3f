use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::AppState;

pub const READ_ROLE: &str = "SHARK_ATTACK_READ";
pub const WRITE_ROLE: &str = "SHARK_ATTACK_WRITE";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub preferred_username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthUser {
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Health stays open; the websocket route validates its own token
    // because browsers cannot set headers on upgrade requests.
    let path = req.uri().path();
    if path == "/health" || path == "/ws" {
        return Ok(next.run(req).await);
    }

    /// 401 with a stable code so clients can tell an auth rejection from
    /// a network failure.
    fn auth_declined_response() -> Response {
        let body = serde_json::json!({
            "code": "SHARK_ATTACK_AUTH_DECLINED",
            "message": "Authentication required or session invalid"
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }

    // Extract token from Authorization header
    let auth_header = match req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        Some(h) => h,
        None => return Ok(auth_declined_response()),
    };

    if !auth_header.starts_with("Bearer ") {
        return Ok(auth_declined_response());
    }

    let token = &auth_header[7..]; // Skip "Bearer "

    // Decode and validate JWT
    let decoding_key = DecodingKey::from_secret(state.config.jwt_secret.as_ref());
    let validation = Validation::new(Algorithm::HS256);

    let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(d) => d,
        Err(_) => return Ok(auth_declined_response()),
    };

    let claims = token_data.claims;

    // Reads require the read role, mutations the write role. The roles
    // are independent grants, neither implies the other.
    let required_role = if matches!(*req.method(), Method::GET | Method::HEAD) {
        READ_ROLE
    } else {
        WRITE_ROLE
    };

    if !claims.roles.iter().any(|r| r == required_role) {
        let body = serde_json::json!({
            "code": "SHARK_ATTACK_INSUFFICIENT_PERMISSION",
            "message": format!("Missing required role {}", required_role)
        });
        return Ok((StatusCode::FORBIDDEN, Json(body)).into_response());
    }

    // Attach user info to request
    let auth_user = AuthUser {
        username: claims.preferred_username,
        roles: claims.roles,
    };
    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}
