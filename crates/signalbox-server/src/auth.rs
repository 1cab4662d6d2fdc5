//! Admin authentication: identity-provider JWTs and the user directory.
//!
//! The admin settings API sits behind `Authorization: Bearer <jwt>`. The
//! identity provider's edge verifies the JWT signature before the request
//! reaches this service; here we decode the payload, check expiration, and
//! authorize the email claim against the CRM user directory.
//!
//! Authorization rule: the user must be `active` and either hold the
//! `master` role or hold the `admin` role for the configured tenant.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Directory lookup failure (the database, not the user, is at fault).
#[derive(Debug, thiserror::Error)]
#[error("directory lookup failed: {reason}")]
pub struct DirectoryError {
    pub reason: String,
}

/// Role a directory user holds in the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full access across every tenant.
    Master,
    /// Access limited to the user's own company.
    Admin,
    /// Any other role; never authorized for the settings API.
    Other,
}

impl Role {
    /// Parse the role column value; unknown strings collapse to [`Role::Other`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "master" => Self::Master,
            "admin" => Self::Admin,
            _ => Self::Other,
        }
    }
}

/// An active CRM user row, as much of it as authorization needs.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub email: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
}

impl DirectoryUser {
    /// Whether this user may manage the given tenant's settings.
    #[must_use]
    pub fn may_manage(&self, tenant_id: Uuid) -> bool {
        match self.role {
            Role::Master => true,
            Role::Admin => self.company_id == Some(tenant_id),
            Role::Other => false,
        }
    }
}

/// Lookup of active CRM users by email.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Find an active user by email. `Ok(None)` means no active user;
    /// inactive rows are filtered out at the query level.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the underlying lookup fails.
    async fn find_active_by_email(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError>;
}

/// Fixed in-memory directory for development and tests.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<String, DirectoryUser>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user.
    #[must_use]
    pub fn with_user(mut self, user: DirectoryUser) -> Self {
        self.users.insert(user.email.clone(), user);
        self
    }
}

#[async_trait::async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_active_by_email(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.get(email).cloned())
    }
}

/// PostgreSQL-backed directory over the `crm_users` table.
#[cfg(feature = "postgres-backend")]
pub struct PgDirectory {
    pool: sqlx::PgPool,
}

#[cfg(feature = "postgres-backend")]
impl PgDirectory {
    #[must_use]
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "postgres-backend")]
#[async_trait::async_trait]
impl UserDirectory for PgDirectory {
    async fn find_active_by_email(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError> {
        let row: Option<(String, String, Option<Uuid>)> = sqlx::query_as(
            r"SELECT email, role, company_id FROM crm_users
              WHERE email = $1 AND status = 'active'",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DirectoryError {
            reason: e.to_string(),
        })?;

        Ok(row.map(|(email, role, company_id)| DirectoryUser {
            email,
            role: Role::parse(&role),
            company_id,
        }))
    }
}

// ── JWT claims ───────────────────────────────────────────────────────

/// Claims extracted from an identity-provider JWT.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct JwtClaims {
    /// Subject (provider-side user ID).
    #[serde(default)]
    pub sub: Option<String>,
    /// User's email address; the directory key.
    #[serde(default)]
    pub email: Option<String>,
    /// JWT expiration timestamp.
    pub exp: u64,
}

/// Decode a JWT payload and check expiration.
///
/// The signature is validated upstream at the identity provider's edge,
/// so this function only parses the claims and rejects expired tokens.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if the JWT is malformed or expired.
pub fn decode_jwt(token: &str) -> Result<JwtClaims, AppError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AppError::Unauthorized("invalid JWT format".to_owned()));
    }

    // Decode the payload (middle part), base64url encoded JSON.
    let payload_bytes = base64_url_decode(parts[1])
        .map_err(|_| AppError::Unauthorized("invalid JWT payload encoding".to_owned()))?;

    let claims: JwtClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AppError::Unauthorized(format!("invalid JWT claims: {e}")))?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| AppError::Internal(format!("system time error: {e}")))?
        .as_secs();

    if claims.exp < now {
        return Err(AppError::Unauthorized("JWT expired".to_owned()));
    }

    Ok(claims)
}

/// Decode a base64url-encoded string (no padding).
fn base64_url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(input)
}

// ── Middleware ───────────────────────────────────────────────────────

/// Identity of the authenticated admin, injected into request extensions.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub email: String,
    pub role: Role,
}

/// Axum middleware guarding the admin settings routes.
///
/// Decodes the bearer JWT, looks the email claim up in the directory, and
/// applies the master-or-tenant-admin rule. Injects [`AdminIdentity`] into
/// request extensions on success.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] for missing/invalid tokens or unknown
/// users, and [`AppError::Forbidden`] for users outside the tenant.
pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let Some(header) = auth_header else {
        return Err(AppError::Unauthorized(
            "missing Authorization header".to_owned(),
        ));
    };

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Bearer scheme".to_owned())
    })?;

    let claims = decode_jwt(token)?;
    let email = claims
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Unauthorized("JWT carries no email claim".to_owned()))?;

    let user = state
        .directory
        .find_active_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("no active user for this email".to_owned()))?;

    if !user.may_manage(state.config.tenant_id) {
        return Err(AppError::Forbidden(
            "not an administrator of this tenant".to_owned(),
        ));
    }

    req.extensions_mut().insert(AdminIdentity {
        email: user.email,
        role: user.role,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_jwt(payload: &serde_json::Value) -> String {
        use base64::Engine;
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = engine.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = engine.encode(payload.to_string().as_bytes());
        format!("{header}.{body}.sig")
    }

    fn future_exp() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600
    }

    #[test]
    fn decodes_valid_jwt() {
        let token = make_jwt(&serde_json::json!({
            "sub": "user_1",
            "email": "ana@example.com",
            "exp": future_exp(),
        }));

        let claims = decode_jwt(&token).unwrap();
        assert_eq!(claims.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn rejects_expired_jwt() {
        let token = make_jwt(&serde_json::json!({
            "email": "ana@example.com",
            "exp": 1_000_000,
        }));

        assert!(matches!(
            decode_jwt(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(matches!(
            decode_jwt("not-a-jwt"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            decode_jwt("a.%%%.c"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn master_manages_any_tenant() {
        let user = DirectoryUser {
            email: "root@example.com".to_owned(),
            role: Role::Master,
            company_id: None,
        };

        assert!(user.may_manage(Uuid::new_v4()));
    }

    #[test]
    fn admin_manages_only_own_company() {
        let tenant = Uuid::new_v4();
        let admin = DirectoryUser {
            email: "ana@example.com".to_owned(),
            role: Role::Admin,
            company_id: Some(tenant),
        };
        let outsider = DirectoryUser {
            company_id: Some(Uuid::new_v4()),
            ..admin.clone()
        };
        let viewer = DirectoryUser {
            role: Role::Other,
            ..admin.clone()
        };

        assert!(admin.may_manage(tenant));
        assert!(!outsider.may_manage(tenant));
        assert!(!viewer.may_manage(tenant));
    }
}
