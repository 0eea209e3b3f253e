use uuid::Uuid;

use crate::{
    db::Storage,
    error::AppError,
    models::{
        auth::Session,
        tenant::Tenant,
        user::{RegisterRequest, Role, User, UserPatch, UserProfile},
    },
    services::{audit, auth::AuthService},
};

pub struct UserService;

fn parents_only() -> AppError {
    AppError::validation("role", "Only parent accounts can self-register")
}

impl UserService {
    /// Self-registration. Creates a parent, or the first admin of a tenant
    /// that has no users yet.
    pub async fn self_register(
        auth: &AuthService,
        store: &dyn Storage,
        tenant: &Tenant,
        req: &RegisterRequest,
    ) -> Result<User, AppError> {
        let user = match req.role.unwrap_or(Role::Parent) {
            Role::Parent => auth.register(store, tenant, req, Role::Parent).await?,
            Role::Admin => auth
                .register_first_admin(store, tenant, req)
                .await?
                .ok_or_else(parents_only)?,
            Role::Teacher => return Err(parents_only()),
        };
        tracing::info!(tenant = %tenant.subdomain, user = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Admin-created account of any role.
    pub async fn create(
        auth: &AuthService,
        store: &dyn Storage,
        tenant: &Tenant,
        session: &Session,
        req: &RegisterRequest,
    ) -> Result<User, AppError> {
        let role = req.role.unwrap_or(Role::Parent);
        let user = auth.register(store, tenant, req, role).await?;
        audit::log(
            store,
            session,
            audit::entry(session, "user.create", "user", user.id).after(&UserProfile::from(user.clone())),
        )
        .await;
        Ok(user)
    }

    pub async fn list(
        store: &dyn Storage,
        session: &Session,
        role: Option<Role>,
        limit: i64,
    ) -> Result<Vec<User>, AppError> {
        Ok(store.list_users(session.tenant_id, role, limit).await?)
    }

    pub async fn me(store: &dyn Storage, session: &Session) -> Result<UserProfile, AppError> {
        store
            .user_by_id(session.tenant_id, session.user_id)
            .await?
            .map(UserProfile::from)
            .ok_or(AppError::NotFound("User"))
    }

    pub async fn update(
        store: &dyn Storage,
        session: &Session,
        id: Uuid,
        patch: &UserPatch,
    ) -> Result<User, AppError> {
        if patch.first_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::validation("firstName", "First name cannot be empty"));
        }
        if patch.last_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::validation("lastName", "Last name cannot be empty"));
        }
        if id == session.user_id && (patch.is_active == Some(false) || patch.role.is_some_and(|r| r != Role::Admin)) {
            return Err(AppError::Conflict("Admins cannot demote or deactivate themselves".into()));
        }

        let before = store
            .user_by_id(session.tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        let after = store
            .update_user(session.tenant_id, id, patch)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        audit::log(store, session, audit::entry(session, "user.update", "user", id).before(&before).after(&after)).await;
        Ok(after)
    }

    /// Soft delete: the account stays for audit history but can no longer log in.
    pub async fn deactivate(store: &dyn Storage, session: &Session, id: Uuid) -> Result<(), AppError> {
        let patch = UserPatch {
            is_active: Some(false),
            ..Default::default()
        };
        Self::update(store, session, id, &patch).await?;
        Ok(())
    }
}
