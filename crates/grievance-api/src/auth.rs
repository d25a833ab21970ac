//! # Authentication Middleware
//!
//! Resolves the calling organization and user for every request.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {organization_id}:{user_id}:{secret}
//! ```
//!
//! The secret is compared in constant time against `AUTH_TOKEN`. When no
//! token is configured (development), the identity is read from the
//! `X-Organization-Id` and `X-User-Id` headers instead.
//!
//! The secret is shared by every tenant, so it proves only that the token
//! came from the trusted issuer. The organization in the token is taken as
//! given: tenant isolation holds only as long as the issuer never mints a
//! token naming an organization the caller does not belong to.
//!
//! ## CallerIdentity
//!
//! The resolved [`CallerIdentity`] is inserted into the request extensions.
//! Handlers extract it via the `FromRequestParts` impl and pass
//! [`CallerIdentity::actor`] to the engine, which scopes every read and
//! write by its organization.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grievance_core::{OrganizationId, UserId};
use grievance_lifecycle::ActorContext;
use subtle::ConstantTimeEq;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Development header carrying the organization id.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";
/// Development header carrying the user id.
pub const USER_HEADER: &str = "x-user-id";

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
}

impl CallerIdentity {
    pub fn actor(&self) -> ActorContext {
        ActorContext {
            organization_id: self.organization_id,
            user_id: self.user_id,
        }
    }
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets. Lengths that differ still
/// cost one comparison.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

fn parse_identity(organization: &str, user: &str) -> Result<CallerIdentity, String> {
    let organization_id = organization
        .parse::<OrganizationId>()
        .map_err(|e| e.to_string())?;
    let user_id = user.parse::<UserId>().map_err(|e| e.to_string())?;
    Ok(CallerIdentity {
        organization_id,
        user_id,
    })
}

/// Parse a bearer token in the format `{organization_id}:{user_id}:{secret}`.
///
/// The secret is checked before the identifiers are parsed, so a wrong
/// secret is always reported the same way.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    match parts.as_slice() {
        [organization, user, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            parse_identity(organization, user)
        }
        _ => Err("invalid token format, expected {organization_id}:{user_id}:{secret}".into()),
    }
}

/// Read the development identity headers.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<CallerIdentity, String> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| format!("missing {name} header"))
    };
    parse_identity(read(ORGANIZATION_HEADER)?, read(USER_HEADER)?)
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the caller and inject a [`CallerIdentity`] into the request.
///
/// With a configured token the `Authorization: Bearer` header is required.
/// Without one, the identity headers are required instead.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    let identity = match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    parse_bearer_token(&header_value[7..], expected).map_err(|msg| {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        msg
                    })
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    Err("authorization header must use Bearer scheme".to_string())
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    Err("missing authorization header".to_string())
                }
            }
        }
        _ => identity_from_headers(request.headers()).map_err(|msg| {
            tracing::warn!(reason = %msg, "authentication failed: identity headers");
            msg
        }),
    };

    match identity {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(msg) => unauthorized_response(&msg),
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(caller: CallerIdentity) -> String {
        format!("{}:{}", caller.organization_id, caller.user_id)
    }

    /// Build a minimal router with the auth middleware and an echo handler.
    fn test_app(token: Option<String>) -> Router {
        let auth_config = AuthConfig { token };
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn valid_bearer_token_resolves_identity() {
        let org = OrganizationId::new();
        let user = UserId::new();
        let app = test_app(Some("my-secret".to_string()));

        let request = Request::builder()
            .uri("/whoami")
            .header("authorization", format!("Bearer {org}:{user}:my-secret"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("{org}:{user}"));
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let app = test_app(Some("my-secret".to_string()));
        let token = format!("Bearer {}:{}:not-it", OrganizationId::new(), UserId::new());
        let request = Request::builder()
            .uri("/whoami")
            .header("authorization", token)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_header_rejected() {
        let app = test_app(Some("my-secret".to_string()));
        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_scheme_rejected() {
        let app = test_app(Some("my-secret".to_string()));
        let request = Request::builder()
            .uri("/whoami")
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_disabled_uses_identity_headers() {
        let org = OrganizationId::new();
        let user = UserId::new();
        let app = test_app(None);
        let request = Request::builder()
            .uri("/whoami")
            .header(ORGANIZATION_HEADER, org.to_string())
            .header(USER_HEADER, user.to_string())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("{org}:{user}"));
    }

    #[tokio::test]
    async fn auth_disabled_without_headers_rejected() {
        let app = test_app(None);
        let request = Request::builder()
            .uri("/whoami")
            .header(ORGANIZATION_HEADER, OrganizationId::new().to_string())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn token_with_bad_organization_is_rejected_after_secret_check() {
        let err = parse_bearer_token("acme:user:secret", "secret").unwrap_err();
        assert!(err.contains("organization_id"), "{err}");
        let err = parse_bearer_token("acme:user:wrong", "secret").unwrap_err();
        assert_eq!(err, "invalid bearer token");
    }

    #[test]
    fn token_organization_is_trusted_as_issued() {
        // Two tenants, one shared secret: each token resolves to whatever
        // organization the issuer wrote into it.
        let (a, b, user) = (OrganizationId::new(), OrganizationId::new(), UserId::new());
        let as_a = parse_bearer_token(&format!("{a}:{user}:secret"), "secret").unwrap();
        let as_b = parse_bearer_token(&format!("{b}:{user}:secret"), "secret").unwrap();
        assert_eq!(as_a.organization_id, a);
        assert_eq!(as_b.organization_id, b);
        assert_eq!(as_a.user_id, as_b.user_id);
    }

    #[test]
    fn bare_secret_is_not_a_valid_token() {
        assert!(parse_bearer_token("secret", "secret").is_err());
    }

    #[test]
    fn secret_may_contain_colons() {
        let org = OrganizationId::new();
        let user = UserId::new();
        let identity = parse_bearer_token(&format!("{org}:{user}:a:b:c"), "a:b:c").unwrap();
        assert_eq!(identity.organization_id, org);
    }

    #[test]
    fn constant_time_eq_length_mismatch() {
        assert!(!constant_time_token_eq("short", "longer-secret"));
        assert!(constant_time_token_eq("same", "same"));
    }

    #[test]
    fn auth_config_debug_redacts_token() {
        let config = AuthConfig {
            token: Some("super-secret".into()),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
