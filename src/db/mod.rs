//! Data access seam. Every tenant-owned query takes the caller's tenant id;
//! implementations must apply it to reads and to the predicate of every
//! update, so a guessed identifier from another tenant never matches.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    announcement::{Announcement, NewAnnouncement, UpdateAnnouncementRequest},
    attendance::{AttendanceMark, AttendanceRecord},
    audit::{AuditEntry, AuditLog},
    form::{FormDecision, FormRequest, FormStatus, NewFormRequest},
    grade::{
        Assignment, AssignmentScore, CreateAssignmentRequest, CreateGradeCategoryRequest,
        GradeCategory, GradeEntry, ScoreEntry,
    },
    message::{Conversation, Message, NewMessage},
    progression::{NewSnapshot, ProgressionSnapshot},
    student::{
        Classroom, CreateClassroomRequest, CreateSchoolRequest, CreateStudentRequest, Enrollment,
        LinkParentRequest, ParentLink, School, Student,
    },
    tenant::{CreateTenantRequest, Subscription, Tenant, UpsertSubscriptionRequest},
    user::{NewUser, Role, User, UserPatch},
};

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule was violated (duplicate email, subdomain, period...).
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict("Record already exists".to_string());
            }
        }
        StoreError::Backend(e.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
    async fn tenant_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Tenant>>;
    async fn tenant_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>>;
    async fn create_tenant(&self, req: &CreateTenantRequest) -> StoreResult<Tenant>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_email(&self, tenant: Uuid, email: &str) -> StoreResult<Option<User>>;
    async fn user_by_id(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<User>>;
    async fn create_user(&self, tenant: Uuid, user: &NewUser) -> StoreResult<User>;
    /// Inserts only while the tenant has no users at all; `None` otherwise.
    /// The check and the insert are atomic.
    async fn create_first_user(&self, tenant: Uuid, user: &NewUser) -> StoreResult<Option<User>>;
    async fn list_users(&self, tenant: Uuid, role: Option<Role>, limit: i64) -> StoreResult<Vec<User>>;
    async fn update_user(&self, tenant: Uuid, id: Uuid, patch: &UserPatch) -> StoreResult<Option<User>>;
    async fn record_login(&self, tenant: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    /// How many of `ids` are active users of the tenant.
    async fn count_active_users(&self, tenant: Uuid, ids: &[Uuid]) -> StoreResult<i64>;
    async fn revoke_session(&self, tenant: Uuid, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<()>;
    async fn is_session_revoked(&self, jti: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn create_school(&self, tenant: Uuid, req: &CreateSchoolRequest) -> StoreResult<School>;
    async fn school(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<School>>;
    async fn list_schools(&self, tenant: Uuid) -> StoreResult<Vec<School>>;
    async fn create_classroom(&self, tenant: Uuid, req: &CreateClassroomRequest) -> StoreResult<Classroom>;
    async fn classroom(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Classroom>>;
    /// Active classrooms, optionally only those taught by `teacher`.
    async fn list_classrooms(&self, tenant: Uuid, teacher: Option<Uuid>) -> StoreResult<Vec<Classroom>>;
    async fn enroll(&self, tenant: Uuid, classroom: Uuid, student: Uuid) -> StoreResult<Enrollment>;
    async fn create_student(&self, tenant: Uuid, req: &CreateStudentRequest) -> StoreResult<Student>;
    async fn student(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Student>>;
    async fn list_students(&self, tenant: Uuid, limit: i64) -> StoreResult<Vec<Student>>;
    async fn count_students(&self, tenant: Uuid) -> StoreResult<i64>;
    async fn students_by_parent(&self, tenant: Uuid, parent: Uuid) -> StoreResult<Vec<Student>>;
    /// Students actively enrolled in any active classroom of `teacher`, without duplicates.
    async fn students_by_teacher(&self, tenant: Uuid, teacher: Uuid) -> StoreResult<Vec<Student>>;
    async fn link_parent(&self, tenant: Uuid, student: Uuid, req: &LinkParentRequest) -> StoreResult<ParentLink>;
    async fn is_parent_of(&self, tenant: Uuid, parent: Uuid, student: Uuid) -> StoreResult<bool>;
    async fn parents_of(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<Uuid>>;
}

#[async_trait]
pub trait AnnouncementStore: Send + Sync {
    /// Active, unexpired announcements, newest first.
    async fn list_announcements(&self, tenant: Uuid, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Announcement>>;
    /// Any announcement of the tenant, active or not.
    async fn announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Announcement>>;
    /// Fetches an active, unexpired announcement and counts the view.
    async fn view_announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Announcement>>;
    async fn create_announcement(&self, tenant: Uuid, new: &NewAnnouncement) -> StoreResult<Announcement>;
    async fn update_announcement(
        &self,
        tenant: Uuid,
        id: Uuid,
        patch: &UpdateAnnouncementRequest,
    ) -> StoreResult<Option<Announcement>>;
    /// Soft delete. Returns whether the row exists in the tenant.
    async fn deactivate_announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Insert-or-update keyed by (student, date, classroom).
    async fn upsert_attendance(&self, tenant: Uuid, mark: &AttendanceMark) -> StoreResult<AttendanceRecord>;
    async fn attendance_record(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<AttendanceRecord>>;
    async fn attendance_by_date(
        &self,
        tenant: Uuid,
        date: NaiveDate,
        classroom: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceRecord>>;
    async fn attendance_by_student(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<AttendanceRecord>>;
    async fn count_present_on(&self, tenant: Uuid, date: NaiveDate) -> StoreResult<i64>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Creates the conversation and its participant rows atomically.
    async fn create_conversation(
        &self,
        tenant: Uuid,
        created_by: Uuid,
        title: Option<&str>,
        participants: &[Uuid],
    ) -> StoreResult<Conversation>;
    /// The conversation, if `user` actively participates in it.
    async fn conversation_for_participant(
        &self,
        tenant: Uuid,
        conversation: Uuid,
        user: Uuid,
    ) -> StoreResult<Option<Conversation>>;
    async fn conversations_for_user(&self, tenant: Uuid, user: Uuid) -> StoreResult<Vec<Conversation>>;
    async fn participant_ids(&self, tenant: Uuid, conversation: Uuid) -> StoreResult<Vec<Uuid>>;
    /// Most recent `limit` messages, oldest first.
    async fn messages_in(&self, tenant: Uuid, conversation: Uuid, limit: i64) -> StoreResult<Vec<Message>>;
    async fn create_message(&self, tenant: Uuid, new: &NewMessage) -> StoreResult<Message>;
    async fn message(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Message>>;
    async fn mark_read(&self, tenant: Uuid, message: Uuid, user: Uuid) -> StoreResult<()>;
    /// Messages from others in the user's active conversations with no read row.
    async fn unread_count(&self, tenant: Uuid, user: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait GradeStore: Send + Sync {
    async fn create_grade_category(&self, tenant: Uuid, req: &CreateGradeCategoryRequest) -> StoreResult<GradeCategory>;
    async fn grade_category(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<GradeCategory>>;
    async fn create_assignment(&self, tenant: Uuid, req: &CreateAssignmentRequest) -> StoreResult<Assignment>;
    async fn assignment(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Assignment>>;
    async fn assignments_by_classroom(&self, tenant: Uuid, classroom: Uuid) -> StoreResult<Vec<Assignment>>;
    async fn upsert_score(&self, tenant: Uuid, entry: &ScoreEntry) -> StoreResult<AssignmentScore>;
    async fn grades_by_student(
        &self,
        tenant: Uuid,
        student: Uuid,
        classroom: Option<Uuid>,
    ) -> StoreResult<Vec<GradeEntry>>;
}

#[async_trait]
pub trait FormStore: Send + Sync {
    async fn create_form(&self, tenant: Uuid, new: &NewFormRequest) -> StoreResult<FormRequest>;
    async fn form(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<FormRequest>>;
    async fn list_forms(
        &self,
        tenant: Uuid,
        status: Option<FormStatus>,
        parent: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<FormRequest>>;
    /// Applies the decision only while the request is still pending.
    /// `None` when no pending request with that id exists in the tenant.
    async fn decide_form(&self, tenant: Uuid, id: Uuid, decision: &FormDecision) -> StoreResult<Option<FormRequest>>;
    async fn count_pending_forms(&self, tenant: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait ProgressionStore: Send + Sync {
    async fn create_snapshot(&self, tenant: Uuid, new: &NewSnapshot) -> StoreResult<ProgressionSnapshot>;
    async fn snapshots_by_student(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<ProgressionSnapshot>>;
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn subscription(&self, tenant: Uuid) -> StoreResult<Option<Subscription>>;
    async fn upsert_subscription(&self, tenant: Uuid, req: &UpsertSubscriptionRequest) -> StoreResult<Subscription>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, tenant: Uuid, entry: &AuditEntry) -> StoreResult<()>;
    async fn list_audit(&self, tenant: Uuid, limit: i64) -> StoreResult<Vec<AuditLog>>;
}

/// The whole persistence surface, as held by `AppState`.
pub trait Storage:
    TenantStore
    + UserStore
    + StudentStore
    + AnnouncementStore
    + AttendanceStore
    + MessageStore
    + GradeStore
    + FormStore
    + ProgressionStore
    + BillingStore
    + AuditStore
{
}

impl<T> Storage for T where
    T: TenantStore
        + UserStore
        + StudentStore
        + AnnouncementStore
        + AttendanceStore
        + MessageStore
        + GradeStore
        + FormStore
        + ProgressionStore
        + BillingStore
        + AuditStore
{
}

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the schema migrations embedded from ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
