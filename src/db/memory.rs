//! In-process storage used by the test suites. Mirrors the Postgres
//! backend's tenant filtering and uniqueness rules on plain vectors.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AnnouncementStore, AttendanceStore, AuditStore, BillingStore, FormStore, GradeStore,
    MessageStore, ProgressionStore, StoreError, StoreResult, StudentStore, TenantStore, UserStore,
};
use crate::models::{
    announcement::{Announcement, NewAnnouncement, UpdateAnnouncementRequest},
    attendance::{AttendanceMark, AttendanceRecord, AttendanceStatus},
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

struct Participant {
    tenant_id: Uuid,
    conversation_id: Uuid,
    user_id: Uuid,
    is_active: bool,
}

#[derive(Default)]
struct Tables {
    tenants: Vec<Tenant>,
    users: Vec<User>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
    schools: Vec<School>,
    classrooms: Vec<Classroom>,
    enrollments: Vec<Enrollment>,
    students: Vec<Student>,
    parent_links: Vec<ParentLink>,
    announcements: Vec<Announcement>,
    attendance: Vec<AttendanceRecord>,
    conversations: Vec<Conversation>,
    participants: Vec<Participant>,
    messages: Vec<Message>,
    /// (message, user)
    reads: Vec<(Uuid, Uuid)>,
    categories: Vec<GradeCategory>,
    assignments: Vec<Assignment>,
    scores: Vec<AssignmentScore>,
    forms: Vec<FormRequest>,
    snapshots: Vec<ProgressionSnapshot>,
    subscriptions: Vec<Subscription>,
    audit: Vec<AuditLog>,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_user(t: &mut Tables, tenant: Uuid, user: &NewUser) -> StoreResult<User> {
    if t.users
        .iter()
        .any(|u| u.tenant_id == tenant && u.email.eq_ignore_ascii_case(&user.email))
    {
        return Err(StoreError::Conflict("User already exists".into()));
    }
    let now = Utc::now();
    let row = User {
        id: Uuid::new_v4(),
        tenant_id: tenant,
        email: user.email.clone(),
        password_hash: user.password_hash.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        role: user.role,
        phone: user.phone.clone(),
        address: user.address.clone(),
        is_active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    t.users.push(row.clone());
    Ok(row)
}

fn role_rank(role: Role) -> u8 {
    match role {
        Role::Admin => 0,
        Role::Teacher => 1,
        Role::Parent => 2,
    }
}

fn newest_first<T, F>(rows: &mut [T], created: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by_key(|r| std::cmp::Reverse(created(r)));
}

#[async_trait]
impl TenantStore for MemoryStorage {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn tenant_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Tenant>> {
        let t = self.tables.lock().await;
        Ok(t.tenants.iter().find(|x| x.subdomain == subdomain).cloned())
    }

    async fn tenant_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        let t = self.tables.lock().await;
        Ok(t.tenants.iter().find(|x| x.id == id).cloned())
    }

    async fn create_tenant(&self, req: &CreateTenantRequest) -> StoreResult<Tenant> {
        let mut t = self.tables.lock().await;
        if t.tenants.iter().any(|x| x.subdomain == req.subdomain) {
            return Err(StoreError::Conflict("Subdomain already exists".into()));
        }
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            subdomain: req.subdomain.clone(),
            contact_email: req.contact_email.clone(),
            phone: req.phone.clone(),
            address: req.address.clone(),
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        t.tenants.push(tenant.clone());
        Ok(tenant)
    }
}

#[async_trait]
impl UserStore for MemoryStorage {
    async fn user_by_email(&self, tenant: Uuid, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users
            .iter()
            .find(|u| u.tenant_id == tenant && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn user_by_id(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.tenant_id == tenant && u.id == id).cloned())
    }

    async fn create_user(&self, tenant: Uuid, user: &NewUser) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        insert_user(&mut t, tenant, user)
    }

    async fn create_first_user(&self, tenant: Uuid, user: &NewUser) -> StoreResult<Option<User>> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.tenant_id == tenant) {
            return Ok(None);
        }
        insert_user(&mut t, tenant, user).map(Some)
    }

    async fn list_users(&self, tenant: Uuid, role: Option<Role>, limit: i64) -> StoreResult<Vec<User>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<User> = t
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant && role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (role_rank(a.role), &a.last_name, &a.first_name).cmp(&(role_rank(b.role), &b.last_name, &b.first_name))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn update_user(&self, tenant: Uuid, id: Uuid, patch: &UserPatch) -> StoreResult<Option<User>> {
        let mut t = self.tables.lock().await;
        let Some(u) = t.users.iter_mut().find(|u| u.tenant_id == tenant && u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.first_name {
            u.first_name = v.clone();
        }
        if let Some(v) = &patch.last_name {
            u.last_name = v.clone();
        }
        if let Some(v) = &patch.phone {
            u.phone = Some(v.clone());
        }
        if let Some(v) = &patch.address {
            u.address = Some(v.clone());
        }
        if let Some(v) = patch.role {
            u.role = v;
        }
        if let Some(v) = patch.is_active {
            u.is_active = v;
        }
        u.updated_at = Utc::now();
        Ok(Some(u.clone()))
    }

    async fn record_login(&self, tenant: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        if let Some(u) = t.users.iter_mut().find(|u| u.tenant_id == tenant && u.id == id) {
            u.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn count_active_users(&self, tenant: Uuid, ids: &[Uuid]) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        Ok(t.users
            .iter()
            .filter(|u| u.tenant_id == tenant && u.is_active && ids.contains(&u.id))
            .count() as i64)
    }

    async fn revoke_session(&self, _tenant: Uuid, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<()> {
        self.tables.lock().await.revoked.entry(jti).or_insert(expires_at);
        Ok(())
    }

    async fn is_session_revoked(&self, jti: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.revoked.contains_key(&jti))
    }
}

#[async_trait]
impl StudentStore for MemoryStorage {
    async fn create_school(&self, tenant: Uuid, req: &CreateSchoolRequest) -> StoreResult<School> {
        let now = Utc::now();
        let school = School {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            name: req.name.clone(),
            address: req.address.clone(),
            phone: req.phone.clone(),
            email: req.email.clone(),
            principal_name: req.principal_name.clone(),
            grade_range: req.grade_range.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.schools.push(school.clone());
        Ok(school)
    }

    async fn school(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<School>> {
        let t = self.tables.lock().await;
        Ok(t.schools.iter().find(|s| s.tenant_id == tenant && s.id == id).cloned())
    }

    async fn list_schools(&self, tenant: Uuid) -> StoreResult<Vec<School>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<School> = t.schools.iter().filter(|s| s.tenant_id == tenant).cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn create_classroom(&self, tenant: Uuid, req: &CreateClassroomRequest) -> StoreResult<Classroom> {
        let now = Utc::now();
        let classroom = Classroom {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            school_id: req.school_id,
            teacher_id: req.teacher_id,
            name: req.name.clone(),
            grade: req.grade.clone(),
            subject: req.subject.clone(),
            room: req.room.clone(),
            capacity: req.capacity,
            academic_year: req.academic_year.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.classrooms.push(classroom.clone());
        Ok(classroom)
    }

    async fn classroom(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Classroom>> {
        let t = self.tables.lock().await;
        Ok(t.classrooms.iter().find(|c| c.tenant_id == tenant && c.id == id).cloned())
    }

    async fn list_classrooms(&self, tenant: Uuid, teacher: Option<Uuid>) -> StoreResult<Vec<Classroom>> {
        let t = self.tables.lock().await;
        Ok(t.classrooms
            .iter()
            .filter(|c| c.tenant_id == tenant && c.is_active && teacher.map_or(true, |id| c.teacher_id == id))
            .cloned()
            .collect())
    }

    async fn enroll(&self, tenant: Uuid, classroom: Uuid, student: Uuid) -> StoreResult<Enrollment> {
        let mut t = self.tables.lock().await;
        if let Some(e) = t
            .enrollments
            .iter_mut()
            .find(|e| e.student_id == student && e.classroom_id == classroom)
        {
            if e.tenant_id != tenant {
                return Err(StoreError::Conflict("Enrollment belongs to another tenant".into()));
            }
            e.is_active = true;
            return Ok(e.clone());
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            student_id: student,
            classroom_id: classroom,
            enrolled_at: Utc::now(),
            is_active: true,
        };
        t.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn create_student(&self, tenant: Uuid, req: &CreateStudentRequest) -> StoreResult<Student> {
        let mut t = self.tables.lock().await;
        if t.students
            .iter()
            .any(|s| s.tenant_id == tenant && s.student_number == req.student_number)
        {
            return Err(StoreError::Conflict("Student number already in use".into()));
        }
        let now = Utc::now();
        let student = Student {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            student_number: req.student_number.clone(),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            date_of_birth: req.date_of_birth,
            grade: req.grade.clone(),
            emergency_contact: req.emergency_contact.clone().map(Json),
            medical_info: req.medical_info.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.students.push(student.clone());
        Ok(student)
    }

    async fn student(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Student>> {
        let t = self.tables.lock().await;
        Ok(t.students.iter().find(|s| s.tenant_id == tenant && s.id == id).cloned())
    }

    async fn list_students(&self, tenant: Uuid, limit: i64) -> StoreResult<Vec<Student>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<Student> = t
            .students
            .iter()
            .filter(|s| s.tenant_id == tenant && s.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn count_students(&self, tenant: Uuid) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        Ok(t.students.iter().filter(|s| s.tenant_id == tenant && s.is_active).count() as i64)
    }

    async fn students_by_parent(&self, tenant: Uuid, parent: Uuid) -> StoreResult<Vec<Student>> {
        let t = self.tables.lock().await;
        let ids: Vec<Uuid> = t
            .parent_links
            .iter()
            .filter(|l| l.tenant_id == tenant && l.parent_id == parent)
            .map(|l| l.student_id)
            .collect();
        Ok(t.students
            .iter()
            .filter(|s| s.tenant_id == tenant && ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn students_by_teacher(&self, tenant: Uuid, teacher: Uuid) -> StoreResult<Vec<Student>> {
        let t = self.tables.lock().await;
        let classrooms: Vec<Uuid> = t
            .classrooms
            .iter()
            .filter(|c| c.tenant_id == tenant && c.teacher_id == teacher && c.is_active)
            .map(|c| c.id)
            .collect();
        let ids: Vec<Uuid> = t
            .enrollments
            .iter()
            .filter(|e| e.tenant_id == tenant && e.is_active && classrooms.contains(&e.classroom_id))
            .map(|e| e.student_id)
            .collect();
        Ok(t.students
            .iter()
            .filter(|s| s.tenant_id == tenant && ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn link_parent(&self, tenant: Uuid, student: Uuid, req: &LinkParentRequest) -> StoreResult<ParentLink> {
        let mut t = self.tables.lock().await;
        if let Some(l) = t
            .parent_links
            .iter_mut()
            .find(|l| l.parent_id == req.parent_id && l.student_id == student)
        {
            if l.tenant_id != tenant {
                return Err(StoreError::Conflict("Link belongs to another tenant".into()));
            }
            l.relationship = req.relationship.clone();
            l.is_primary = req.is_primary;
            return Ok(l.clone());
        }
        let link = ParentLink {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            parent_id: req.parent_id,
            student_id: student,
            relationship: req.relationship.clone(),
            is_primary: req.is_primary,
            created_at: Utc::now(),
        };
        t.parent_links.push(link.clone());
        Ok(link)
    }

    async fn is_parent_of(&self, tenant: Uuid, parent: Uuid, student: Uuid) -> StoreResult<bool> {
        let t = self.tables.lock().await;
        Ok(t.parent_links
            .iter()
            .any(|l| l.tenant_id == tenant && l.parent_id == parent && l.student_id == student))
    }

    async fn parents_of(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<Uuid>> {
        let t = self.tables.lock().await;
        Ok(t.parent_links
            .iter()
            .filter(|l| l.tenant_id == tenant && l.student_id == student)
            .map(|l| l.parent_id)
            .collect())
    }
}

#[async_trait]
impl AnnouncementStore for MemoryStorage {
    async fn list_announcements(&self, tenant: Uuid, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Announcement>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<Announcement> = t
            .announcements
            .iter()
            .filter(|a| a.tenant_id == tenant && a.is_active && a.expires_at.map_or(true, |e| e > now))
            .cloned()
            .collect();
        newest_first(&mut rows, |a| a.created_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Announcement>> {
        let t = self.tables.lock().await;
        Ok(t.announcements.iter().find(|a| a.tenant_id == tenant && a.id == id).cloned())
    }

    async fn view_announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Announcement>> {
        let now = Utc::now();
        let mut t = self.tables.lock().await;
        Ok(t.announcements
            .iter_mut()
            .find(|a| {
                a.tenant_id == tenant && a.id == id && a.is_active && a.expires_at.map_or(true, |e| e > now)
            })
            .map(|a| {
                a.view_count += 1;
                a.clone()
            }))
    }

    async fn create_announcement(&self, tenant: Uuid, new: &NewAnnouncement) -> StoreResult<Announcement> {
        let now = Utc::now();
        let row = Announcement {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            author_id: new.author_id,
            title: new.title.clone(),
            content: new.content.clone(),
            category: new.category,
            priority: new.priority,
            expires_at: new.expires_at,
            is_active: true,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.announcements.push(row.clone());
        Ok(row)
    }

    async fn update_announcement(
        &self,
        tenant: Uuid,
        id: Uuid,
        patch: &UpdateAnnouncementRequest,
    ) -> StoreResult<Option<Announcement>> {
        let mut t = self.tables.lock().await;
        let Some(a) = t
            .announcements
            .iter_mut()
            .find(|a| a.tenant_id == tenant && a.id == id && a.is_active)
        else {
            return Ok(None);
        };
        if let Some(v) = &patch.title {
            a.title = v.clone();
        }
        if let Some(v) = &patch.content {
            a.content = v.clone();
        }
        if let Some(v) = patch.category {
            a.category = v;
        }
        if let Some(v) = patch.priority {
            a.priority = v;
        }
        if patch.expires_at.is_some() {
            a.expires_at = patch.expires_at;
        }
        a.updated_at = Utc::now();
        Ok(Some(a.clone()))
    }

    async fn deactivate_announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        match t.announcements.iter_mut().find(|a| a.tenant_id == tenant && a.id == id) {
            Some(a) => {
                a.is_active = false;
                a.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AttendanceStore for MemoryStorage {
    async fn upsert_attendance(&self, tenant: Uuid, mark: &AttendanceMark) -> StoreResult<AttendanceRecord> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        if let Some(r) = t.attendance.iter_mut().find(|r| {
            r.tenant_id == tenant
                && r.student_id == mark.student_id
                && r.date == mark.date
                && r.classroom_id == mark.classroom_id
        }) {
            r.status = mark.status;
            r.arrival_time = mark.arrival_time;
            r.notes = mark.notes.clone();
            r.marked_by = mark.marked_by;
            r.updated_at = now;
            return Ok(r.clone());
        }
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            student_id: mark.student_id,
            classroom_id: mark.classroom_id,
            date: mark.date,
            status: mark.status,
            arrival_time: mark.arrival_time,
            notes: mark.notes.clone(),
            marked_by: mark.marked_by,
            created_at: now,
            updated_at: now,
        };
        t.attendance.push(record.clone());
        Ok(record)
    }

    async fn attendance_record(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<AttendanceRecord>> {
        let t = self.tables.lock().await;
        Ok(t.attendance.iter().find(|r| r.tenant_id == tenant && r.id == id).cloned())
    }

    async fn attendance_by_date(
        &self,
        tenant: Uuid,
        date: NaiveDate,
        classroom: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let t = self.tables.lock().await;
        Ok(t.attendance
            .iter()
            .filter(|r| r.tenant_id == tenant && r.date == date && classroom.map_or(true, |c| r.classroom_id == c))
            .cloned()
            .collect())
    }

    async fn attendance_by_student(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<AttendanceRecord>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<AttendanceRecord> = t
            .attendance
            .iter()
            .filter(|r| r.tenant_id == tenant && r.student_id == student)
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.date));
        Ok(rows)
    }

    async fn count_present_on(&self, tenant: Uuid, date: NaiveDate) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        Ok(t.attendance
            .iter()
            .filter(|r| r.tenant_id == tenant && r.date == date && r.status == AttendanceStatus::Present)
            .count() as i64)
    }
}

#[async_trait]
impl MessageStore for MemoryStorage {
    async fn create_conversation(
        &self,
        tenant: Uuid,
        created_by: Uuid,
        title: Option<&str>,
        participants: &[Uuid],
    ) -> StoreResult<Conversation> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            title: title.map(str::to_string),
            is_group: participants.len() > 2,
            created_by,
            created_at: now,
            updated_at: now,
        };
        t.conversations.push(conversation.clone());
        for user_id in participants {
            let exists = t
                .participants
                .iter()
                .any(|p| p.conversation_id == conversation.id && p.user_id == *user_id);
            if !exists {
                t.participants.push(Participant {
                    tenant_id: tenant,
                    conversation_id: conversation.id,
                    user_id: *user_id,
                    is_active: true,
                });
            }
        }
        Ok(conversation)
    }

    async fn conversation_for_participant(
        &self,
        tenant: Uuid,
        conversation: Uuid,
        user: Uuid,
    ) -> StoreResult<Option<Conversation>> {
        let t = self.tables.lock().await;
        let member = t.participants.iter().any(|p| {
            p.tenant_id == tenant && p.conversation_id == conversation && p.user_id == user && p.is_active
        });
        if !member {
            return Ok(None);
        }
        Ok(t.conversations
            .iter()
            .find(|c| c.tenant_id == tenant && c.id == conversation)
            .cloned())
    }

    async fn conversations_for_user(&self, tenant: Uuid, user: Uuid) -> StoreResult<Vec<Conversation>> {
        let t = self.tables.lock().await;
        let ids: Vec<Uuid> = t
            .participants
            .iter()
            .filter(|p| p.tenant_id == tenant && p.user_id == user && p.is_active)
            .map(|p| p.conversation_id)
            .collect();
        let mut rows: Vec<Conversation> = t
            .conversations
            .iter()
            .filter(|c| c.tenant_id == tenant && ids.contains(&c.id))
            .cloned()
            .collect();
        newest_first(&mut rows, |c| c.updated_at);
        Ok(rows)
    }

    async fn participant_ids(&self, tenant: Uuid, conversation: Uuid) -> StoreResult<Vec<Uuid>> {
        let t = self.tables.lock().await;
        Ok(t.participants
            .iter()
            .filter(|p| p.tenant_id == tenant && p.conversation_id == conversation && p.is_active)
            .map(|p| p.user_id)
            .collect())
    }

    async fn messages_in(&self, tenant: Uuid, conversation: Uuid, limit: i64) -> StoreResult<Vec<Message>> {
        let t = self.tables.lock().await;
        let rows: Vec<Message> = t
            .messages
            .iter()
            .filter(|m| m.tenant_id == tenant && m.conversation_id == conversation)
            .cloned()
            .collect();
        let skip = rows.len().saturating_sub(limit.max(0) as usize);
        Ok(rows.into_iter().skip(skip).collect())
    }

    async fn create_message(&self, tenant: Uuid, new: &NewMessage) -> StoreResult<Message> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content.clone(),
            message_type: new.message_type.clone(),
            attachments: new.attachments.clone().map(Json),
            created_at: now,
            updated_at: now,
        };
        t.messages.push(message.clone());
        if let Some(c) = t
            .conversations
            .iter_mut()
            .find(|c| c.tenant_id == tenant && c.id == new.conversation_id)
        {
            c.updated_at = now;
        }
        Ok(message)
    }

    async fn message(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Message>> {
        let t = self.tables.lock().await;
        Ok(t.messages.iter().find(|m| m.tenant_id == tenant && m.id == id).cloned())
    }

    async fn mark_read(&self, _tenant: Uuid, message: Uuid, user: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        if !t.reads.contains(&(message, user)) {
            t.reads.push((message, user));
        }
        Ok(())
    }

    async fn unread_count(&self, tenant: Uuid, user: Uuid) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        let conversations: Vec<Uuid> = t
            .participants
            .iter()
            .filter(|p| p.tenant_id == tenant && p.user_id == user && p.is_active)
            .map(|p| p.conversation_id)
            .collect();
        Ok(t.messages
            .iter()
            .filter(|m| {
                m.tenant_id == tenant
                    && conversations.contains(&m.conversation_id)
                    && m.sender_id != user
                    && !t.reads.contains(&(m.id, user))
            })
            .count() as i64)
    }
}

#[async_trait]
impl GradeStore for MemoryStorage {
    async fn create_grade_category(&self, tenant: Uuid, req: &CreateGradeCategoryRequest) -> StoreResult<GradeCategory> {
        let row = GradeCategory {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            classroom_id: req.classroom_id,
            name: req.name.clone(),
            weight: req.weight,
            description: req.description.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.tables.lock().await.categories.push(row.clone());
        Ok(row)
    }

    async fn grade_category(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<GradeCategory>> {
        let t = self.tables.lock().await;
        Ok(t.categories.iter().find(|c| c.tenant_id == tenant && c.id == id).cloned())
    }

    async fn create_assignment(&self, tenant: Uuid, req: &CreateAssignmentRequest) -> StoreResult<Assignment> {
        let now = Utc::now();
        let row = Assignment {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            classroom_id: req.classroom_id,
            category_id: req.category_id,
            title: req.title.clone(),
            description: req.description.clone(),
            max_points: req.max_points,
            due_date: req.due_date,
            assigned_date: now,
            instructions: req.instructions.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.assignments.push(row.clone());
        Ok(row)
    }

    async fn assignment(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Assignment>> {
        let t = self.tables.lock().await;
        Ok(t.assignments.iter().find(|a| a.tenant_id == tenant && a.id == id).cloned())
    }

    async fn assignments_by_classroom(&self, tenant: Uuid, classroom: Uuid) -> StoreResult<Vec<Assignment>> {
        let t = self.tables.lock().await;
        Ok(t.assignments
            .iter()
            .filter(|a| a.tenant_id == tenant && a.classroom_id == classroom && a.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_score(&self, tenant: Uuid, entry: &ScoreEntry) -> StoreResult<AssignmentScore> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        if let Some(s) = t
            .scores
            .iter_mut()
            .find(|s| s.assignment_id == entry.assignment_id && s.student_id == entry.student_id)
        {
            if s.tenant_id != tenant {
                return Err(StoreError::Conflict("Record already exists".into()));
            }
            s.points = entry.points;
            s.feedback = entry.feedback.clone();
            s.submitted_at = entry.submitted_at.or(s.submitted_at);
            s.graded_at = entry.graded_at;
            s.graded_by = entry.graded_by;
            s.updated_at = now;
            return Ok(s.clone());
        }
        let row = AssignmentScore {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            assignment_id: entry.assignment_id,
            student_id: entry.student_id,
            points: entry.points,
            feedback: entry.feedback.clone(),
            submitted_at: entry.submitted_at,
            graded_at: entry.graded_at,
            graded_by: entry.graded_by,
            created_at: now,
            updated_at: now,
        };
        t.scores.push(row.clone());
        Ok(row)
    }

    async fn grades_by_student(
        &self,
        tenant: Uuid,
        student: Uuid,
        classroom: Option<Uuid>,
    ) -> StoreResult<Vec<GradeEntry>> {
        let t = self.tables.lock().await;
        let mut rows = Vec::new();
        for s in t.scores.iter().filter(|s| s.tenant_id == tenant && s.student_id == student) {
            let Some(a) = t
                .assignments
                .iter()
                .find(|a| a.tenant_id == tenant && a.id == s.assignment_id)
            else {
                continue;
            };
            if classroom.is_some_and(|c| a.classroom_id != c) {
                continue;
            }
            let Some(category) = t
                .categories
                .iter()
                .find(|c| c.tenant_id == tenant && c.id == a.category_id)
            else {
                continue;
            };
            rows.push(GradeEntry {
                assignment_id: a.id,
                assignment_title: a.title.clone(),
                classroom_id: a.classroom_id,
                category_id: category.id,
                category_weight: category.weight,
                points: s.points,
                max_points: a.max_points,
                feedback: s.feedback.clone(),
                graded_at: s.graded_at,
                due_date: a.due_date,
            });
        }
        Ok(rows)
    }
}

#[async_trait]
impl FormStore for MemoryStorage {
    async fn create_form(&self, tenant: Uuid, new: &NewFormRequest) -> StoreResult<FormRequest> {
        let now = Utc::now();
        let row = FormRequest {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            student_id: new.student_id,
            parent_id: new.parent_id,
            form_type: new.form_type,
            title: new.title.clone(),
            reason: new.reason.clone(),
            request_date: new.request_date,
            end_date: new.end_date,
            status: FormStatus::Pending,
            admin_notes: None,
            processed_by: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.forms.push(row.clone());
        Ok(row)
    }

    async fn form(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<FormRequest>> {
        let t = self.tables.lock().await;
        Ok(t.forms.iter().find(|f| f.tenant_id == tenant && f.id == id).cloned())
    }

    async fn list_forms(
        &self,
        tenant: Uuid,
        status: Option<FormStatus>,
        parent: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<FormRequest>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<FormRequest> = t
            .forms
            .iter()
            .filter(|f| {
                f.tenant_id == tenant
                    && status.map_or(true, |s| f.status == s)
                    && parent.map_or(true, |p| f.parent_id == p)
            })
            .cloned()
            .collect();
        newest_first(&mut rows, |f| f.created_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn decide_form(&self, tenant: Uuid, id: Uuid, decision: &FormDecision) -> StoreResult<Option<FormRequest>> {
        let mut t = self.tables.lock().await;
        Ok(t.forms
            .iter_mut()
            .find(|f| f.tenant_id == tenant && f.id == id && f.status == FormStatus::Pending)
            .map(|f| {
                f.status = decision.status;
                f.admin_notes = decision.admin_notes.clone();
                f.processed_by = Some(decision.processed_by);
                f.processed_at = Some(decision.processed_at);
                f.updated_at = Utc::now();
                f.clone()
            }))
    }

    async fn count_pending_forms(&self, tenant: Uuid) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        Ok(t.forms
            .iter()
            .filter(|f| f.tenant_id == tenant && f.status == FormStatus::Pending)
            .count() as i64)
    }
}

#[async_trait]
impl ProgressionStore for MemoryStorage {
    async fn create_snapshot(&self, tenant: Uuid, new: &NewSnapshot) -> StoreResult<ProgressionSnapshot> {
        let mut t = self.tables.lock().await;
        let duplicate = t.snapshots.iter().any(|s| {
            s.tenant_id == tenant
                && s.student_id == new.student_id
                && s.classroom_id == new.classroom_id
                && s.reporting_period == new.reporting_period
        });
        if duplicate {
            return Err(StoreError::Conflict(
                "Snapshot already exists for this reporting period".into(),
            ));
        }
        let row = ProgressionSnapshot {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            student_id: new.student_id,
            classroom_id: new.classroom_id,
            reporting_period: new.reporting_period.clone(),
            overall_grade: new.overall_grade,
            attendance_rate: new.attendance_rate,
            behavior_notes: new.behavior_notes.clone(),
            academic_notes: new.academic_notes.clone(),
            goals: Json(new.goals.clone()),
            created_at: Utc::now(),
        };
        t.snapshots.push(row.clone());
        Ok(row)
    }

    async fn snapshots_by_student(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<ProgressionSnapshot>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<ProgressionSnapshot> = t
            .snapshots
            .iter()
            .filter(|s| s.tenant_id == tenant && s.student_id == student)
            .cloned()
            .collect();
        newest_first(&mut rows, |s| s.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl BillingStore for MemoryStorage {
    async fn subscription(&self, tenant: Uuid) -> StoreResult<Option<Subscription>> {
        let t = self.tables.lock().await;
        Ok(t.subscriptions.iter().find(|s| s.tenant_id == tenant).cloned())
    }

    async fn upsert_subscription(&self, tenant: Uuid, req: &UpsertSubscriptionRequest) -> StoreResult<Subscription> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        if let Some(s) = t.subscriptions.iter_mut().find(|s| s.tenant_id == tenant) {
            s.plan_name = req.plan_name.clone();
            s.status = req.status;
            s.student_limit = req.student_limit;
            s.monthly_price = req.monthly_price;
            s.billing_email = req.billing_email.clone();
            if let Some(start) = req.start_date {
                s.start_date = start;
            }
            s.end_date = req.end_date;
            s.trial_ends_at = req.trial_ends_at;
            s.updated_at = now;
            return Ok(s.clone());
        }
        let row = Subscription {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            plan_name: req.plan_name.clone(),
            status: req.status,
            student_limit: req.student_limit,
            monthly_price: req.monthly_price,
            billing_email: req.billing_email.clone(),
            start_date: req.start_date.unwrap_or(now),
            end_date: req.end_date,
            trial_ends_at: req.trial_ends_at,
            created_at: now,
            updated_at: now,
        };
        t.subscriptions.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl AuditStore for MemoryStorage {
    async fn append_audit(&self, tenant: Uuid, entry: &AuditEntry) -> StoreResult<()> {
        let row = AuditLog {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            user_id: entry.user_id,
            action: entry.action.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id,
            old_values: entry.old_values.clone(),
            new_values: entry.new_values.clone(),
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.audit.push(row);
        Ok(())
    }

    async fn list_audit(&self, tenant: Uuid, limit: i64) -> StoreResult<Vec<AuditLog>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<AuditLog> = t.audit.iter().filter(|a| a.tenant_id == tenant).cloned().collect();
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_req(sub: &str) -> CreateTenantRequest {
        CreateTenantRequest {
            name: sub.to_uppercase(),
            subdomain: sub.to_string(),
            contact_email: format!("office@{sub}.example"),
            phone: None,
            address: None,
        }
    }

    fn user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "x".to_string(),
            first_name: "Pat".to_string(),
            last_name: "Lee".to_string(),
            role: Role::Teacher,
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn duplicate_subdomain_conflicts() {
        let store = MemoryStorage::new();
        store.create_tenant(&tenant_req("school-a")).await.unwrap();
        let err = store.create_tenant(&tenant_req("school-a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn same_email_is_allowed_in_different_tenants() {
        let store = MemoryStorage::new();
        let a = store.create_tenant(&tenant_req("school-a")).await.unwrap();
        let b = store.create_tenant(&tenant_req("school-b")).await.unwrap();

        store.create_user(a.id, &user("pat@example.com")).await.unwrap();
        store.create_user(b.id, &user("pat@example.com")).await.unwrap();
        let err = store.create_user(a.id, &user("PAT@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookups_never_cross_tenants() {
        let store = MemoryStorage::new();
        let a = store.create_tenant(&tenant_req("school-a")).await.unwrap();
        let b = store.create_tenant(&tenant_req("school-b")).await.unwrap();
        let pat = store.create_user(a.id, &user("pat@example.com")).await.unwrap();

        assert!(store.user_by_id(b.id, pat.id).await.unwrap().is_none());
        assert!(store.user_by_email(b.id, "pat@example.com").await.unwrap().is_none());
        let patch = UserPatch {
            first_name: Some("Mallory".into()),
            ..Default::default()
        };
        assert!(store.update_user(b.id, pat.id, &patch).await.unwrap().is_none());
        assert_eq!(store.user_by_id(a.id, pat.id).await.unwrap().unwrap().first_name, "Pat");
    }

    #[tokio::test]
    async fn decide_form_only_applies_once() {
        let store = MemoryStorage::new();
        let a = store.create_tenant(&tenant_req("school-a")).await.unwrap();
        let form = store
            .create_form(
                a.id,
                &NewFormRequest {
                    parent_id: Uuid::new_v4(),
                    student_id: Uuid::new_v4(),
                    form_type: crate::models::form::FormType::SickLeave,
                    title: "Flu".into(),
                    reason: "Fever".into(),
                    request_date: None,
                    end_date: None,
                },
            )
            .await
            .unwrap();
        let decision = FormDecision {
            status: FormStatus::Approved,
            admin_notes: None,
            processed_by: Uuid::new_v4(),
            processed_at: Utc::now(),
        };
        assert!(store.decide_form(a.id, form.id, &decision).await.unwrap().is_some());
        assert!(store.decide_form(a.id, form.id, &decision).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn messages_in_returns_latest_window_oldest_first() {
        let store = MemoryStorage::new();
        let a = store.create_tenant(&tenant_req("school-a")).await.unwrap();
        let sender = Uuid::new_v4();
        let conv = store.create_conversation(a.id, sender, None, &[sender]).await.unwrap();
        for i in 0..5 {
            store
                .create_message(
                    a.id,
                    &NewMessage {
                        conversation_id: conv.id,
                        sender_id: sender,
                        content: format!("m{i}"),
                        message_type: "text".into(),
                        attachments: None,
                    },
                )
                .await
                .unwrap();
        }
        let window = store.messages_in(a.id, conv.id, 3).await.unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
    }
}
