use async_trait::async_trait;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{GradeStore, StoreResult},
    models::grade::{
        Assignment, AssignmentScore, CreateAssignmentRequest, CreateGradeCategoryRequest, GradeCategory,
        GradeEntry, ScoreEntry,
    },
};

#[async_trait]
impl GradeStore for PgStorage {
    async fn create_grade_category(&self, tenant: Uuid, req: &CreateGradeCategoryRequest) -> StoreResult<GradeCategory> {
        let row = sqlx::query_as::<_, GradeCategory>(
            "INSERT INTO grade_categories (tenant_id, classroom_id, name, weight, description)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(tenant)
        .bind(req.classroom_id)
        .bind(&req.name)
        .bind(req.weight)
        .bind(&req.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn grade_category(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<GradeCategory>> {
        let row = sqlx::query_as::<_, GradeCategory>(
            "SELECT * FROM grade_categories WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_assignment(&self, tenant: Uuid, req: &CreateAssignmentRequest) -> StoreResult<Assignment> {
        let row = sqlx::query_as::<_, Assignment>(
            "INSERT INTO assignments
                 (tenant_id, classroom_id, category_id, title, description, max_points, due_date, instructions)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(tenant)
        .bind(req.classroom_id)
        .bind(req.category_id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.max_points)
        .bind(req.due_date)
        .bind(&req.instructions)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn assignment(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, Assignment>("SELECT * FROM assignments WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn assignments_by_classroom(&self, tenant: Uuid, classroom: Uuid) -> StoreResult<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM assignments
             WHERE tenant_id = $1 AND classroom_id = $2 AND is_active = TRUE
             ORDER BY due_date NULLS LAST, created_at",
        )
        .bind(tenant)
        .bind(classroom)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_score(&self, tenant: Uuid, entry: &ScoreEntry) -> StoreResult<AssignmentScore> {
        let row = sqlx::query_as::<_, AssignmentScore>(
            "INSERT INTO assignment_scores
                 (tenant_id, assignment_id, student_id, points, feedback, submitted_at, graded_at, graded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (assignment_id, student_id) DO UPDATE SET
                 points       = EXCLUDED.points,
                 feedback     = EXCLUDED.feedback,
                 submitted_at = COALESCE(EXCLUDED.submitted_at, assignment_scores.submitted_at),
                 graded_at    = EXCLUDED.graded_at,
                 graded_by    = EXCLUDED.graded_by,
                 updated_at   = NOW()
             WHERE assignment_scores.tenant_id = EXCLUDED.tenant_id
             RETURNING *",
        )
        .bind(tenant)
        .bind(entry.assignment_id)
        .bind(entry.student_id)
        .bind(entry.points)
        .bind(&entry.feedback)
        .bind(entry.submitted_at)
        .bind(entry.graded_at)
        .bind(entry.graded_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn grades_by_student(
        &self,
        tenant: Uuid,
        student: Uuid,
        classroom: Option<Uuid>,
    ) -> StoreResult<Vec<GradeEntry>> {
        let rows = sqlx::query_as::<_, GradeEntry>(
            "SELECT a.id AS assignment_id, a.title AS assignment_title, a.classroom_id,
                    a.category_id, gc.weight AS category_weight, s.points, a.max_points,
                    s.feedback, s.graded_at, a.due_date
             FROM assignment_scores s
             JOIN assignments a ON a.id = s.assignment_id AND a.tenant_id = s.tenant_id
             JOIN grade_categories gc ON gc.id = a.category_id AND gc.tenant_id = s.tenant_id
             WHERE s.tenant_id = $1 AND s.student_id = $2
               AND ($3::uuid IS NULL OR a.classroom_id = $3)
             ORDER BY a.due_date NULLS LAST, a.created_at",
        )
        .bind(tenant)
        .bind(student)
        .bind(classroom)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
