use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::Storage,
    error::{AppError, FieldErrors},
    models::{
        auth::Session,
        grade::{
            Assignment, AssignmentScore, CreateAssignmentRequest, CreateGradeCategoryRequest, GradeCategory,
            GradeEntry, RecordScoreRequest, ScoreEntry,
        },
    },
    services::students::StudentService,
};

pub struct GradeService;

impl GradeService {
    pub async fn create_category(
        store: &dyn Storage,
        session: &Session,
        req: &CreateGradeCategoryRequest,
    ) -> Result<GradeCategory, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(!req.name.trim().is_empty(), "name", "Name is required")
            .check((0.0..=100.0).contains(&req.weight), "weight", "Weight must be between 0 and 100");
        errors.finish()?;

        store
            .classroom(session.tenant_id, req.classroom_id)
            .await?
            .ok_or(AppError::NotFound("Classroom"))?;

        Ok(store.create_grade_category(session.tenant_id, req).await?)
    }

    pub async fn create_assignment(
        store: &dyn Storage,
        session: &Session,
        req: &CreateAssignmentRequest,
    ) -> Result<Assignment, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(!req.title.trim().is_empty(), "title", "Title is required")
            .check(req.max_points > 0.0, "maxPoints", "Max points must be positive");
        errors.finish()?;

        store
            .classroom(session.tenant_id, req.classroom_id)
            .await?
            .ok_or(AppError::NotFound("Classroom"))?;
        let category = store
            .grade_category(session.tenant_id, req.category_id)
            .await?
            .ok_or(AppError::NotFound("Grade category"))?;
        if category.classroom_id != req.classroom_id {
            return Err(AppError::validation("categoryId", "Category belongs to another classroom"));
        }

        Ok(store.create_assignment(session.tenant_id, req).await?)
    }

    pub async fn assignments(
        store: &dyn Storage,
        session: &Session,
        classroom_id: Option<Uuid>,
    ) -> Result<Vec<Assignment>, AppError> {
        let classroom_id = classroom_id.ok_or_else(|| AppError::validation("classroomId", "classroomId is required"))?;
        Ok(store.assignments_by_classroom(session.tenant_id, classroom_id).await?)
    }

    /// Stamps the grader and time whenever points are given.
    pub async fn record_score(
        store: &dyn Storage,
        session: &Session,
        assignment_id: Uuid,
        student_id: Uuid,
        req: &RecordScoreRequest,
    ) -> Result<AssignmentScore, AppError> {
        let assignment = store
            .assignment(session.tenant_id, assignment_id)
            .await?
            .ok_or(AppError::NotFound("Assignment"))?;
        store
            .student(session.tenant_id, student_id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;

        if let Some(points) = req.points {
            if !(0.0..=assignment.max_points).contains(&points) {
                return Err(AppError::validation(
                    "points",
                    &format!("Points must be between 0 and {}", assignment.max_points),
                ));
            }
        }

        let graded = req.points.is_some();
        let entry = ScoreEntry {
            assignment_id,
            student_id,
            points: req.points,
            feedback: req.feedback.clone(),
            submitted_at: req.submitted_at,
            graded_at: graded.then(Utc::now),
            graded_by: graded.then_some(session.user_id),
        };
        Ok(store.upsert_score(session.tenant_id, &entry).await?)
    }

    pub async fn student_grades(
        store: &dyn Storage,
        session: &Session,
        student_id: Uuid,
        classroom_id: Option<Uuid>,
    ) -> Result<Vec<GradeEntry>, AppError> {
        StudentService::visible(store, session, student_id).await?;
        Ok(store.grades_by_student(session.tenant_id, student_id, classroom_id).await?)
    }
}
