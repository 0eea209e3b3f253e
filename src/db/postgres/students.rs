use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{StoreError, StoreResult, StudentStore},
    models::student::{
        Classroom, CreateClassroomRequest, CreateSchoolRequest, CreateStudentRequest, Enrollment,
        LinkParentRequest, ParentLink, School, Student,
    },
};

/// Student columns, qualified for use in joins.
const STUDENT_COLS: &str = "s.id, s.tenant_id, s.student_number, s.first_name, s.last_name,
     s.date_of_birth, s.grade, s.emergency_contact, s.medical_info, s.is_active,
     s.created_at, s.updated_at";

#[async_trait]
impl StudentStore for PgStorage {
    async fn create_school(&self, tenant: Uuid, req: &CreateSchoolRequest) -> StoreResult<School> {
        let school = sqlx::query_as::<_, School>(
            "INSERT INTO schools (tenant_id, name, address, phone, email, principal_name, grade_range)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(tenant)
        .bind(&req.name)
        .bind(&req.address)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.principal_name)
        .bind(&req.grade_range)
        .fetch_one(&self.pool)
        .await?;
        Ok(school)
    }

    async fn school(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<School>> {
        let school = sqlx::query_as::<_, School>("SELECT * FROM schools WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(school)
    }

    async fn list_schools(&self, tenant: Uuid) -> StoreResult<Vec<School>> {
        let schools = sqlx::query_as::<_, School>("SELECT * FROM schools WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant)
            .fetch_all(&self.pool)
            .await?;
        Ok(schools)
    }

    async fn create_classroom(&self, tenant: Uuid, req: &CreateClassroomRequest) -> StoreResult<Classroom> {
        let classroom = sqlx::query_as::<_, Classroom>(
            "INSERT INTO classrooms
                 (tenant_id, school_id, teacher_id, name, grade, subject, room, capacity, academic_year)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(tenant)
        .bind(req.school_id)
        .bind(req.teacher_id)
        .bind(&req.name)
        .bind(&req.grade)
        .bind(&req.subject)
        .bind(&req.room)
        .bind(req.capacity)
        .bind(&req.academic_year)
        .fetch_one(&self.pool)
        .await?;
        Ok(classroom)
    }

    async fn classroom(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Classroom>> {
        let classroom =
            sqlx::query_as::<_, Classroom>("SELECT * FROM classrooms WHERE tenant_id = $1 AND id = $2")
                .bind(tenant)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(classroom)
    }

    async fn list_classrooms(&self, tenant: Uuid, teacher: Option<Uuid>) -> StoreResult<Vec<Classroom>> {
        let classrooms = sqlx::query_as::<_, Classroom>(
            "SELECT * FROM classrooms
             WHERE tenant_id = $1 AND is_active = TRUE AND ($2::uuid IS NULL OR teacher_id = $2)
             ORDER BY academic_year DESC, name",
        )
        .bind(tenant)
        .bind(teacher)
        .fetch_all(&self.pool)
        .await?;
        Ok(classrooms)
    }

    async fn enroll(&self, tenant: Uuid, classroom: Uuid, student: Uuid) -> StoreResult<Enrollment> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (tenant_id, student_id, classroom_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (student_id, classroom_id) DO UPDATE SET is_active = TRUE
             WHERE enrollments.tenant_id = EXCLUDED.tenant_id
             RETURNING *",
        )
        .bind(tenant)
        .bind(student)
        .bind(classroom)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Conflict("Enrollment belongs to another tenant".into()))?;
        Ok(enrollment)
    }

    async fn create_student(&self, tenant: Uuid, req: &CreateStudentRequest) -> StoreResult<Student> {
        sqlx::query_as::<_, Student>(
            "INSERT INTO students
                 (tenant_id, student_number, first_name, last_name, date_of_birth, grade,
                  emergency_contact, medical_info)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(tenant)
        .bind(&req.student_number)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.date_of_birth)
        .bind(&req.grade)
        .bind(req.emergency_contact.clone().map(Json))
        .bind(&req.medical_info)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict("Student number already in use".into()),
            other => other,
        })
    }

    async fn student(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    async fn list_students(&self, tenant: Uuid, limit: i64) -> StoreResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE tenant_id = $1 AND is_active = TRUE
             ORDER BY last_name, first_name LIMIT $2",
        )
        .bind(tenant)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn count_students(&self, tenant: Uuid) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE tenant_id = $1 AND is_active = TRUE")
            .bind(tenant)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn students_by_parent(&self, tenant: Uuid, parent: Uuid) -> StoreResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLS}
             FROM students s
             JOIN parents_students ps ON ps.student_id = s.id AND ps.tenant_id = s.tenant_id
             WHERE s.tenant_id = $1 AND ps.parent_id = $2
             ORDER BY s.last_name, s.first_name"
        ))
        .bind(tenant)
        .bind(parent)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn students_by_teacher(&self, tenant: Uuid, teacher: Uuid) -> StoreResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(&format!(
            "SELECT DISTINCT ON (s.id) {STUDENT_COLS}
             FROM students s
             JOIN enrollments e ON e.student_id = s.id AND e.tenant_id = s.tenant_id
             JOIN classrooms c ON c.id = e.classroom_id AND c.tenant_id = s.tenant_id
             WHERE s.tenant_id = $1 AND c.teacher_id = $2
               AND e.is_active = TRUE AND c.is_active = TRUE
             ORDER BY s.id"
        ))
        .bind(tenant)
        .bind(teacher)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn link_parent(&self, tenant: Uuid, student: Uuid, req: &LinkParentRequest) -> StoreResult<ParentLink> {
        let link = sqlx::query_as::<_, ParentLink>(
            "INSERT INTO parents_students (tenant_id, parent_id, student_id, relationship, is_primary)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (parent_id, student_id)
             DO UPDATE SET relationship = EXCLUDED.relationship, is_primary = EXCLUDED.is_primary
             WHERE parents_students.tenant_id = EXCLUDED.tenant_id
             RETURNING *",
        )
        .bind(tenant)
        .bind(req.parent_id)
        .bind(student)
        .bind(&req.relationship)
        .bind(req.is_primary)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Conflict("Link belongs to another tenant".into()))?;
        Ok(link)
    }

    async fn is_parent_of(&self, tenant: Uuid, parent: Uuid, student: Uuid) -> StoreResult<bool> {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM parents_students
                 WHERE tenant_id = $1 AND parent_id = $2 AND student_id = $3
             )",
        )
        .bind(tenant)
        .bind(parent)
        .bind(student)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn parents_of(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT parent_id FROM parents_students WHERE tenant_id = $1 AND student_id = $2",
        )
        .bind(tenant)
        .bind(student)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
