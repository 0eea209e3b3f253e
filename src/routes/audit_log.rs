use axum::extract::State;

use crate::routes::extract::{Json, Query};
use crate::{
    error::AppError,
    models::{audit::AuditLog, auth::Session},
    routes::PageQuery,
    services::policy::{Action, Resource},
    AppState,
};

/// GET /audit-log — newest first.
pub async fn list_audit_log(
    State(state): State<AppState>,
    session: Session,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<AuditLog>>, AppError> {
    session.require(Resource::AuditLog, Action::Read)?;
    let entries = state
        .storage
        .list_audit(session.tenant_id, page.resolve(&state))
        .await?;
    Ok(Json(entries))
}
