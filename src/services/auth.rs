use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    config::Config,
    db::{Storage, StoreError},
    error::{AppError, FieldErrors},
    models::{
        auth::{Claims, SessionIdentity},
        tenant::Tenant,
        user::{LoginResponse, NewUser, RegisterRequest, Role, User},
    },
    services::metrics::LOGINS_COUNTER,
};

/// Password hashing and session token issuance. Holds the process-wide
/// signing key; nothing here reads request data.
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(secret: &str, ttl_seconds: u64, bcrypt_cost: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
            bcrypt_cost,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.session_ttl_seconds, config.bcrypt_cost)
    }

    pub fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        bcrypt::hash(plain, self.bcrypt_cost).map_err(|e| AppError::Internal(e.into()))
    }

    /// A malformed stored hash counts as a mismatch.
    pub fn verify_password(&self, plain: &str, hash: &str) -> bool {
        bcrypt::verify(plain, hash).unwrap_or(false)
    }

    pub fn issue_session(&self, user_id: Uuid, tenant_id: Uuid, role: Role) -> Result<String, AppError> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.ttl_seconds as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// Signature and expiry check only; revocation is checked by the caller.
    pub fn verify_session(&self, token: &str) -> Result<SessionIdentity, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AppError::InvalidSession)?
            .claims;

        let parse = |s: &str| s.parse::<Uuid>().map_err(|_| AppError::InvalidSession);
        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .ok_or(AppError::InvalidSession)?;

        Ok(SessionIdentity {
            user_id: parse(&claims.sub)?,
            tenant_id: parse(&claims.tenant_id)?,
            role: claims.role,
            jti: parse(&claims.jti)?,
            expires_at,
        })
    }

    /// Missing user, inactive user and wrong password all fail with the
    /// same `InvalidCredentials`.
    pub async fn login(
        &self,
        store: &dyn Storage,
        tenant: &Tenant,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, AppError> {
        let user = store
            .user_by_email(tenant.id, email.trim())
            .await?
            .filter(|u| u.is_active)
            .filter(|u| self.verify_password(password, &u.password_hash));

        let Some(user) = user else {
            LOGINS_COUNTER.with_label_values(&[tenant.subdomain.as_str(), "failure"]).inc();
            tracing::info!(tenant = %tenant.subdomain, "login failed");
            return Err(AppError::InvalidCredentials);
        };

        store.record_login(tenant.id, user.id, Utc::now()).await?;
        let token = self.issue_session(user.id, tenant.id, user.role)?;

        LOGINS_COUNTER.with_label_values(&[tenant.subdomain.as_str(), "success"]).inc();
        tracing::info!(tenant = %tenant.subdomain, user = %user.id, "login succeeded");

        Ok(LoginResponse {
            token,
            user: user.into(),
        })
    }

    /// Creates a user in `tenant` with the given role. The tenant id comes
    /// from the resolved tenant, never from the request body.
    pub async fn register(
        &self,
        store: &dyn Storage,
        tenant: &Tenant,
        req: &RegisterRequest,
        role: Role,
    ) -> Result<User, AppError> {
        let new = self.new_user(req, role)?;
        if store.user_by_email(tenant.id, &new.email).await?.is_some() {
            return Err(AppError::UserAlreadyExists);
        }
        store.create_user(tenant.id, &new).await.map_err(registration_error)
    }

    /// Registers the tenant's first account as an admin. `None` once the
    /// tenant has any user.
    pub async fn register_first_admin(
        &self,
        store: &dyn Storage,
        tenant: &Tenant,
        req: &RegisterRequest,
    ) -> Result<Option<User>, AppError> {
        let new = self.new_user(req, Role::Admin)?;
        store
            .create_first_user(tenant.id, &new)
            .await
            .map_err(registration_error)
    }

    fn new_user(&self, req: &RegisterRequest, role: Role) -> Result<NewUser, AppError> {
        validate_registration(req)?;
        Ok(NewUser {
            email: req.email.trim().to_lowercase(),
            password_hash: self.hash_password(&req.password)?,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role,
            phone: req.phone.clone(),
            address: req.address.clone(),
        })
    }
}

fn registration_error(e: StoreError) -> AppError {
    match e {
        StoreError::Conflict(_) => AppError::UserAlreadyExists,
        e => e.into(),
    }
}

pub fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    errors
        .check(req.email.contains('@'), "email", "Email is invalid")
        .check(req.password.len() >= 8, "password", "Password must be at least 8 characters")
        .check(!req.first_name.trim().is_empty(), "firstName", "First name is required")
        .check(!req.last_name.trim().is_empty(), "lastName", "Last name is required");
    errors.finish()
}
