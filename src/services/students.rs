use uuid::Uuid;

use crate::{
    db::Storage,
    error::{AppError, FieldErrors},
    models::{
        auth::Session,
        student::{
            Classroom, CreateClassroomRequest, CreateSchoolRequest, CreateStudentRequest, Enrollment,
            LinkParentRequest, ParentLink, School, Student,
        },
        user::{Role, UserProfile},
    },
};

pub struct StudentService;

impl StudentService {
    /// Parents see their linked children, teachers the students enrolled in
    /// their classrooms, admins every active student.
    pub async fn list(store: &dyn Storage, session: &Session, limit: i64) -> Result<Vec<Student>, AppError> {
        let students = match session.role {
            Role::Parent => store.students_by_parent(session.tenant_id, session.user_id).await?,
            Role::Teacher => store.students_by_teacher(session.tenant_id, session.user_id).await?,
            Role::Admin => store.list_students(session.tenant_id, limit).await?,
        };
        Ok(students)
    }

    /// The student, if it exists in the caller's tenant and the caller may
    /// see it. A parent asking for someone else's child gets `NotFound`.
    pub async fn visible(store: &dyn Storage, session: &Session, id: Uuid) -> Result<Student, AppError> {
        let student = store
            .student(session.tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;

        if session.role == Role::Parent
            && !store.is_parent_of(session.tenant_id, session.user_id, id).await?
        {
            return Err(AppError::NotFound("Student"));
        }
        Ok(student)
    }

    pub async fn create(
        store: &dyn Storage,
        session: &Session,
        req: &CreateStudentRequest,
    ) -> Result<Student, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(!req.student_number.trim().is_empty(), "studentNumber", "Student number is required")
            .check(!req.first_name.trim().is_empty(), "firstName", "First name is required")
            .check(!req.last_name.trim().is_empty(), "lastName", "Last name is required")
            .check(!req.grade.trim().is_empty(), "grade", "Grade is required");
        errors.finish()?;

        if let Some(sub) = store.subscription(session.tenant_id).await? {
            if sub.status.is_current() {
                let enrolled = store.count_students(session.tenant_id).await?;
                if enrolled >= i64::from(sub.student_limit) {
                    return Err(AppError::Conflict(format!(
                        "Student limit of {} reached for the {} plan",
                        sub.student_limit, sub.plan_name
                    )));
                }
            }
        }

        let student = store.create_student(session.tenant_id, req).await?;
        tracing::info!(tenant = %session.subdomain, student = %student.id, "student created");
        Ok(student)
    }

    pub async fn link_parent(
        store: &dyn Storage,
        session: &Session,
        student_id: Uuid,
        req: &LinkParentRequest,
    ) -> Result<ParentLink, AppError> {
        store
            .student(session.tenant_id, student_id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;

        let parent = store
            .user_by_id(session.tenant_id, req.parent_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        if parent.role != Role::Parent {
            return Err(AppError::validation("parentId", "User is not a parent"));
        }
        if req.relationship.trim().is_empty() {
            return Err(AppError::validation("relationship", "Relationship is required"));
        }

        Ok(store.link_parent(session.tenant_id, student_id, req).await?)
    }

    pub async fn parents(store: &dyn Storage, session: &Session, student_id: Uuid) -> Result<Vec<UserProfile>, AppError> {
        store
            .student(session.tenant_id, student_id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;

        let mut parents = Vec::new();
        for id in store.parents_of(session.tenant_id, student_id).await? {
            if let Some(user) = store.user_by_id(session.tenant_id, id).await? {
                parents.push(user.into());
            }
        }
        Ok(parents)
    }
}

pub struct SchoolService;

impl SchoolService {
    pub async fn create_school(
        store: &dyn Storage,
        session: &Session,
        req: &CreateSchoolRequest,
    ) -> Result<School, AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name", "Name is required"));
        }
        Ok(store.create_school(session.tenant_id, req).await?)
    }

    pub async fn create_classroom(
        store: &dyn Storage,
        session: &Session,
        req: &CreateClassroomRequest,
    ) -> Result<Classroom, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(!req.name.trim().is_empty(), "name", "Name is required")
            .check(!req.grade.trim().is_empty(), "grade", "Grade is required")
            .check(!req.academic_year.trim().is_empty(), "academicYear", "Academic year is required")
            .check(req.capacity.map_or(true, |c| c > 0), "capacity", "Capacity must be positive");
        errors.finish()?;

        store
            .school(session.tenant_id, req.school_id)
            .await?
            .ok_or(AppError::NotFound("School"))?;

        let teacher = store
            .user_by_id(session.tenant_id, req.teacher_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        if teacher.role != Role::Teacher {
            return Err(AppError::validation("teacherId", "User is not a teacher"));
        }

        Ok(store.create_classroom(session.tenant_id, req).await?)
    }

    pub async fn list_schools(store: &dyn Storage, session: &Session) -> Result<Vec<School>, AppError> {
        Ok(store.list_schools(session.tenant_id).await?)
    }

    pub async fn list_classrooms(store: &dyn Storage, session: &Session) -> Result<Vec<Classroom>, AppError> {
        let teacher = (session.role == Role::Teacher).then_some(session.user_id);
        Ok(store.list_classrooms(session.tenant_id, teacher).await?)
    }

    pub async fn enroll(
        store: &dyn Storage,
        session: &Session,
        classroom_id: Uuid,
        student_id: Uuid,
    ) -> Result<Enrollment, AppError> {
        store
            .classroom(session.tenant_id, classroom_id)
            .await?
            .ok_or(AppError::NotFound("Classroom"))?;
        store
            .student(session.tenant_id, student_id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;

        Ok(store.enroll(session.tenant_id, classroom_id, student_id).await?)
    }
}
