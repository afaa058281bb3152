use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use shared::{
    require_non_empty, validate_email, validate_password, AccountStatus, AuthResponse,
    LoginRequest, NavigateResponse, Policy, RegisterRequest, Role, SessionState, UserInfo,
};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    db::User,
    error::AppError,
    extract::{AppJson, AppQuery},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "vmg_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub jti: String,
    pub exp: usize,
}

/// Authenticated caller, resolved from a bearer token or the session cookie
#[derive(Debug)]
pub struct CurrentUser {
    pub user: UserInfo,
    pub claims: Claims,
}

/// Caller that may or may not be signed in. Invalid or expired tokens count
/// as signed out.
#[derive(Debug)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn require(&self, policy: &Policy) -> Result<(), AppError> {
        if policy.permits(&self.user.role) {
            Ok(())
        } else {
            tracing::debug!("User {} ({}) denied by {:?}", self.user.id, self.user.role, policy);
            Err(AppError::Forbidden("You do not have access to this resource".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require(&Policy::Role(Role::Admin))
    }

    /// Owners and administrators only
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin() || self.id() == owner_id
    }
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

async fn resolve_user(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let claims = verify_token(token, &state.config.auth.jwt_secret)?;
    if state.is_revoked(&claims.jti) {
        return Err(AppError::AuthError("Session has been signed out".to_string()));
    }

    let user = state
        .db
        .get_user_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

    let status = user.account_status();
    if !status.can_sign_in() {
        return Err(AppError::AuthError(format!("Account is {}", status)));
    }

    Ok(CurrentUser {
        user: user.info(),
        claims,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)
            .ok_or_else(|| AppError::AuthError("Not signed in".to_string()))?;
        resolve_user(state, &token).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_parts(parts) else {
            return Ok(OptionalUser(None));
        };
        match resolve_user(state, &token).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(AppError::AuthError(reason)) => {
                tracing::debug!("Treating request as signed out: {}", reason);
                Ok(OptionalUser(None))
            }
            Err(e) => Err(e),
        }
    }
}

fn session_cookie(token: String, auth_config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth_config.cookie_secure)
        .build()
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Create an account
/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_password(&req.password)?;
    require_non_empty("display_name", &req.display_name)?;

    if req.role == Some(Role::Admin) {
        return Err(AppError::BadRequest(
            "Administrator accounts cannot be self-registered".to_string(),
        ));
    }

    // Check if user already exists
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let (role, status) = if state.config.auth.is_admin_email(&email) {
        (Role::Admin, AccountStatus::Active)
    } else {
        (req.role.unwrap_or(Role::Student), AccountStatus::Pending)
    };

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: hash_password(&req.password)?,
        display_name: req.display_name.trim().to_string(),
        role: role.to_string(),
        department: req.department,
        status: status.to_string(),
        created_at: None,
        last_active: None,
    };
    if !state.db.create_user(&user).await? {
        // Lost a race with a concurrent registration for the same email
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    state.db.touch_last_active(&user.id).await?;

    tracing::info!("Registered {} as {} ({})", user.email, role, status);

    let token = generate_token(&user.id, &state.config.auth)?;
    let info = state
        .db
        .get_user_by_id(&user.id)
        .await?
        .map(|u| u.info())
        .ok_or_else(|| AppError::Internal("User vanished after registration".to_string()))?;

    Ok((
        jar.add(session_cookie(token.clone(), &state.config.auth)),
        Json(AuthResponse { token, user: info }),
    ))
}

/// Sign in
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = req.email.trim().to_lowercase();

    // Find user
    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::AuthError("Invalid email or password".to_string()))?;

    let status = user.account_status();
    if !status.can_sign_in() {
        tracing::info!("Refused sign-in for {} account {}", status, user.email);
        return Err(AppError::AuthError(format!("Account is {}", status)));
    }

    state.db.touch_last_active(&user.id).await?;
    let token = generate_token(&user.id, &state.config.auth)?;
    let info = state
        .db
        .get_user_by_id(&user.id)
        .await?
        .map(|u| u.info())
        .unwrap_or_else(|| user.info());

    Ok((
        jar.add(session_cookie(token.clone(), &state.config.auth)),
        Json(AuthResponse { token, user: info }),
    ))
}

/// Sign out and revoke the current token
/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    let expires_at = DateTime::<Utc>::from_timestamp(current.claims.exp as i64, 0)
        .unwrap_or_else(|| Utc::now() + Duration::hours(state.config.auth.token_expiry_hours as i64));
    state.revoke_token(current.claims.jti.clone(), expires_at);
    tracing::info!("User {} signed out", current.user.email);

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(serde_json::json!({ "success": true })),
    )
}

/// Current user
/// GET /auth/me
pub async fn me(current: CurrentUser) -> Json<UserInfo> {
    Json(current.user)
}

#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    pub path: Option<String>,
}

/// Decide what the dashboard should do when the caller opens `path`
/// GET /auth/navigate?path=/admin/users
pub async fn navigate(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
    AppQuery(query): AppQuery<NavigateQuery>,
) -> Json<NavigateResponse> {
    let path = query.path.unwrap_or_else(|| "/".to_string());
    let session = match &current {
        Some(current) => SessionState::authenticated(current.user.session_user()),
        None => SessionState::Unauthenticated,
    };

    let decision = state.views.navigate(&session, &path);
    tracing::debug!("Navigation to {} -> {:?}", path, decision);

    Json(NavigateResponse {
        redirect: decision.location().map(str::to_string),
        path,
        decision,
    })
}

fn generate_token(user_id: &str, auth_config: &AuthConfig) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_expiry_hours: 1,
            cookie_secure: false,
            admin_emails: Vec::new(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = generate_token("user-1", &auth_config()).unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_token_ids_are_unique() {
        let a = verify_token(&generate_token("u", &auth_config()).unwrap(), "test-secret").unwrap();
        let b = verify_token(&generate_token("u", &auth_config()).unwrap(), "test-secret").unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = generate_token("user-1", &auth_config()).unwrap();
        assert!(matches!(
            verify_token(&token, "other-secret"),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie("abc".to_string(), &auth_config());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
