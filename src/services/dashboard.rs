use chrono::Utc;

use crate::{
    db::Storage,
    error::AppError,
    models::{auth::Session, dashboard::DashboardStats},
};

pub struct DashboardService;

impl DashboardService {
    pub async fn stats(store: &dyn Storage, session: &Session) -> Result<DashboardStats, AppError> {
        let tenant = session.tenant_id;
        Ok(DashboardStats {
            total_students: store.count_students(tenant).await?,
            present_today: store.count_present_on(tenant, Utc::now().date_naive()).await?,
            pending_forms: store.count_pending_forms(tenant).await?,
            unread_messages: store.unread_count(tenant, session.user_id).await?,
        })
    }
}
