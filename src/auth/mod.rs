//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose claims carry the user id and role. Issuing tokens is left to
//! the identity service; this module only verifies them.

mod policy;

pub use policy::*;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Role carried in the token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Donor,
    Hospital,
    Admin,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    /// Expiry as seconds since the epoch
    pub exp: usize,
}

/// Authenticated caller, available to handlers as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Verifies bearer tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Unauthorized("Invalid token signature".to_string())
                }
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        Ok(Actor {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

/// Auth layer: resolves the bearer token into an [`Actor`] extension or rejects with 401.
pub async fn bearer_auth_layer(
    verifier: Option<TokenVerifier>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(verifier) = verifier else {
        return AppError::Unauthorized("Authentication is not configured".to_string())
            .into_response();
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let Some(token) = token else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match verifier.verify(&token) {
        Ok(actor) => {
            tracing::debug!(user_id = %actor.user_id, role = ?actor.role, "Authenticated request");
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Token from an `Authorization` value; the scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    const SECRET: &str = "unit-test-secret";

    fn token(sub: &str, role: Role, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            role,
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn app(verifier: Option<TokenVerifier>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|Extension(actor): Extension<Actor>| async move { actor.user_id }),
            )
            .layer(middleware::from_fn(move |req, next| {
                bearer_auth_layer(verifier.clone(), req, next)
            }))
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = TokenVerifier::new(SECRET);
        let actor = verifier.verify(&token("user-1", Role::Admin, 3600)).unwrap();
        assert_eq!(actor.user_id, "user-1");
        assert!(actor.is_admin());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let verifier = TokenVerifier::new("other-secret");
        let err = verifier
            .verify(&token("user-1", Role::User, 3600))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let verifier = TokenVerifier::new(SECRET);
        let err = verifier
            .verify(&token("user-1", Role::User, -3600))
            .unwrap_err();
        assert_eq!(err.message(), "Token has expired");
    }

    #[tokio::test]
    async fn test_layer_inserts_actor() {
        let request = Request::builder()
            .uri("/whoami")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", token("donor-7", Role::Donor, 3600)),
            )
            .body(Body::empty())
            .unwrap();

        let response = app(Some(TokenVerifier::new(SECRET)))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], b"donor-7");
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn test_layer_accepts_lowercase_scheme() {
        let request = Request::builder()
            .uri("/whoami")
            .header(
                header::AUTHORIZATION,
                format!("bearer {}", token("donor-8", Role::Donor, 3600)),
            )
            .body(Body::empty())
            .unwrap();
        let response = app(Some(TokenVerifier::new(SECRET)))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_layer_rejects_missing_token() {
        let request = Request::builder()
            .uri("/whoami")
            .body(Body::empty())
            .unwrap();
        let response = app(Some(TokenVerifier::new(SECRET)))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_layer_rejects_everything_without_secret() {
        let request = Request::builder()
            .uri("/whoami")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", token("user-1", Role::User, 3600)),
            )
            .body(Body::empty())
            .unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
