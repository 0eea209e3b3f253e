use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use crate::routes::extract::Json;
use crate::{
    error::AppError,
    middleware::platform::PlatformAuth,
    models::tenant::{CreateTenantRequest, Subscription, Tenant},
    services::tenants::TenantService,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ProvisionedTenant {
    pub tenant: Tenant,
    pub subscription: Subscription,
}

/// POST /platform/tenants — operator provisioning with a trial subscription.
pub async fn create_tenant(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Json(body): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<ProvisionedTenant>), AppError> {
    let (tenant, subscription) = TenantService::provision(state.storage.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(ProvisionedTenant { tenant, subscription })))
}
