/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token authentication for the shop API.
 *
 * - Shop owners and employees log in with email and password (Argon2 hashes).
 * - A successful login yields an HS256 JWT carrying the user's role.
 * - Route groups are gated by a permission derived from that role.
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::{employee, shop_owner};
use crate::services::normalize_email;
use crate::ApiResponse;

pub mod password;
mod permissions;

pub use password::{hash_password, verify_password};
pub use permissions::*;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,             // User ID (shop owner or employee)
    pub name: String,            // Display name
    pub email: String,           // Login email
    pub role: Role,              // Decides the permission set
    pub shop_id: Option<String>, // Employees belong to one shop
    pub jti: String,             // Unique token id
    pub iat: i64,                // Issued at
    pub exp: i64,                // Expiration time
    pub nbf: i64,                // Not valid before
    pub iss: String,             // Issuer
    pub aud: String,             // Audience
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub shop_id: Option<Uuid>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role.allows(permission)
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let shop_id = claims
            .shop_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            shop_id,
            token_id: claims.jti,
        })
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration_secs),
        }
    }
}

/// The person behind a login, as returned by `/Auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub shop_id: Option<Uuid>,
}

impl From<&shop_owner::Model> for UserProfile {
    fn from(owner: &shop_owner::Model) -> Self {
        Self {
            id: owner.id,
            name: owner.full_name.clone(),
            email: owner.email.clone(),
            role: Role::Owner,
            shop_id: None,
        }
    }
}

impl From<&employee::Model> for UserProfile {
    fn from(emp: &employee::Model) -> Self {
        Self {
            id: emp.id,
            name: emp.full_name.clone(),
            email: emp.email.clone(),
            role: Role::Employee,
            shop_id: Some(emp.shop_id),
        }
    }
}

/// Token response returned by a successful login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginCredentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "New password must be 8-128 characters"))]
    pub new_password: String,
}

/// Authentication service that handles credential checks and token issuance
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

enum Account {
    Owner(shop_owner::Model),
    Employee(employee::Model),
}

impl Account {
    fn password_hash(&self) -> Option<&str> {
        match self {
            Account::Owner(owner) => Some(owner.password_hash.as_str()),
            Account::Employee(emp) => emp.password_hash.as_deref(),
        }
    }

    fn profile(&self) -> UserProfile {
        match self {
            Account::Owner(owner) => owner.into(),
            Account::Employee(emp) => emp.into(),
        }
    }
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Signs an access token for `user`.
    pub fn issue_token(&self, user: &UserProfile) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            shop_id: user.shop_id.map(|id| id.to_string()),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user: user.clone(),
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.validate_nbf = true;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Shop owners are checked first, then active employees that have a password.
    async fn find_account(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let db = &*self.db;
        if let Some(owner) = shop_owner::Entity::find()
            .filter(shop_owner::Column::Email.eq(email))
            .one(db)
            .await?
        {
            return Ok(Some(Account::Owner(owner)));
        }

        let employee = employee::Entity::find()
            .filter(employee::Column::Email.eq(email))
            .filter(employee::Column::IsActive.eq(true))
            .one(db)
            .await?;
        Ok(employee.map(Account::Employee))
    }

    /// Checks credentials and issues a token. Unknown email and wrong password
    /// produce the same error.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, AuthError> {
        let email = normalize_email(&credentials.email);
        let account = self
            .find_account(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let verified = account
            .password_hash()
            .map(|hash| verify_password(&credentials.password, hash))
            .unwrap_or(false);
        if !verified {
            warn!(email = %email, "Rejected login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let profile = account.profile();
        info!(user_id = %profile.id, role = ?profile.role, "User logged in");
        self.issue_token(&profile)
    }

    /// Reloads the caller's profile so deactivated accounts are noticed.
    pub async fn profile(&self, user: &AuthUser) -> Result<UserProfile, AuthError> {
        match user.role {
            Role::Owner => shop_owner::Entity::find_by_id(user.user_id)
                .one(&*self.db)
                .await?
                .map(|owner| UserProfile::from(&owner))
                .ok_or(AuthError::UserNotFound),
            Role::Employee => employee::Entity::find_by_id(user.user_id)
                .one(&*self.db)
                .await?
                .filter(|emp| emp.is_active)
                .map(|emp| UserProfile::from(&emp))
                .ok_or(AuthError::UserNotFound),
        }
    }

    pub async fn change_password(
        &self,
        user: &AuthUser,
        request: &ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let db = &*self.db;
        let new_hash =
            hash_password(&request.new_password).map_err(|e| AuthError::InternalError(e.to_string()))?;

        match user.role {
            Role::Owner => {
                let owner = shop_owner::Entity::find_by_id(user.user_id)
                    .one(db)
                    .await?
                    .ok_or(AuthError::UserNotFound)?;
                if !verify_password(&request.current_password, &owner.password_hash) {
                    return Err(AuthError::IncorrectPassword);
                }
                let mut active = owner.into_active_model();
                active.password_hash = Set(new_hash);
                active.update(db).await?;
            }
            Role::Employee => {
                let emp = employee::Entity::find_by_id(user.user_id)
                    .one(db)
                    .await?
                    .ok_or(AuthError::UserNotFound)?;
                let matches = emp
                    .password_hash
                    .as_deref()
                    .map(|hash| verify_password(&request.current_password, hash))
                    .unwrap_or(false);
                if !matches {
                    return Err(AuthError::IncorrectPassword);
                }
                let mut active = emp.into_active_model();
                active.password_hash = Set(Some(new_hash));
                active.update(db).await?;
            }
        }

        info!(user_id = %user.user_id, "Password changed");
        Ok(())
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<DbErr> for AuthError {
    fn from(err: DbErr) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuth
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::IncorrectPassword => StatusCode::BAD_REQUEST,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Authentication failure");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::failure(message, None))).into_response()
    }
}

/// Handlers take `AuthUser` as an argument on routes behind [`auth_middleware`].
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<&'static str>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_permission(required_permission) {
        debug!(
            user_id = %user.user_id,
            permission = required_permission,
            "Permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    AuthUser::try_from(claims)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &'static str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    /// The permission check runs after authentication (outer layer first).
    fn with_permission(self, permission: &'static str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission,
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig {
                jwt_secret: "unit_test_secret_that_is_long_enough_1234".into(),
                jwt_audience: "shop-api-clients".into(),
                jwt_issuer: "shop-api".into(),
                access_token_expiration: Duration::from_secs(600),
            },
            Arc::new(DatabaseConnection::default()),
        )
    }

    fn cashier() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: "Mai Tran".into(),
            email: "mai@shop.test".into(),
            role: Role::Employee,
            shop_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn issued_token_validates_and_maps_to_auth_user() {
        let svc = service();
        let profile = cashier();
        let token = svc.issue_token(&profile).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 600);

        let claims = svc.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, profile.id.to_string());
        let user = AuthUser::try_from(claims).unwrap();
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.shop_id, profile.shop_id);
        assert!(user.has_permission(consts::SALES_WRITE));
        assert!(!user.has_permission(consts::PROCUREMENT_WRITE));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let mut other = service();
        other.config.jwt_secret = "a_completely_different_secret_value_9876".into();
        let token = other.issue_token(&cashier()).unwrap();
        assert_matches!(
            service().validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn token_for_other_audience_is_rejected() {
        let mut other = service();
        other.config.jwt_audience = "someone-else".into();
        let token = other.issue_token(&cashier()).unwrap();
        assert_matches!(
            service().validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn bearer_header_is_required() {
        let svc = service();
        let mut headers = HeaderMap::new();
        assert_matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        );

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        );

        let token = svc.issue_token(&cashier()).unwrap().access_token;
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        assert!(extract_auth_from_headers(&headers, &svc).is_ok());
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::IncorrectPassword.status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
