use axum::extract::{Query, State};
use axum::http::{header, Request, StatusCode};
use axum::Json;
use axum::middleware::Next;
use axum::response::IntoResponse;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Serialize, Deserialize};
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

/// Claims of the backend-issued session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "rol", default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub iat: Option<usize>,
    pub exp: usize,
}

fn default_role() -> String {
    "user".to_string()
}

/// An authenticated map user. The raw token is kept to call the favorites
/// store on the user's behalf.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub name: String,
    pub role: String,
    pub token: String,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub jwt_secret: String,
}

impl JwtConfig {
    pub fn new(jwt_secret: impl Into<String>) -> JwtConfig {
        JwtConfig {
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<TokenClaims> {
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        ).map(|data| data.claims)
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer header first, then a `token` query parameter (browsers cannot set
/// headers on WebSocket upgrades).
fn extract_token<B>(req: &Request<B>) -> Option<String> {
    let from_header = req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(str::to_owned);

    from_header.or_else(|| {
        let Query(query) = Query::<TokenQuery>::try_from_uri(req.uri()).ok()?;
        query.token.filter(|token| !token.is_empty())
    })
}

/// Optional authentication: requests without a token pass through as
/// anonymous, requests with an invalid one are rejected.
pub async fn auth<B>(
    State(config): State<JwtConfig>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    if let Some(token) = extract_token(&req) {
        let claims = config.verify(&token).map_err(|e| {
            warn!("Rejected token: {}", e);
            let json_error = ErrorResponse {
                status: "fail",
                message: "Invalid token".to_string(),
            };
            (StatusCode::UNAUTHORIZED, Json(json_error))
        })?;

        req.extensions_mut().insert(Identity {
            user_id: claims.id,
            name: claims.name,
            role: claims.role,
            token,
        });
    }
    Ok(next.run(req).await)
}
