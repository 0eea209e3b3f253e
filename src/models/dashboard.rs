use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: i64,
    pub present_today: i64,
    pub pending_forms: i64,
    pub unread_messages: i64,
}
