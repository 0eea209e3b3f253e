use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    db::Storage,
    error::AppError,
    models::{
        attendance::{AttendanceRecord, AttendanceStatus},
        auth::Session,
        grade::GradeEntry,
        progression::{CreateSnapshotRequest, NewSnapshot, ProgressionSnapshot},
    },
    services::students::StudentService,
};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Weighted percentage over graded entries. Each category contributes its
/// own points ratio scaled by its weight; ungraded entries are ignored.
/// Falls back to equal weights when every graded category weighs zero.
pub fn overall_grade(entries: &[GradeEntry]) -> Option<f64> {
    let mut by_category: HashMap<Uuid, (f64, f64, f64)> = HashMap::new();
    for e in entries {
        let Some(points) = e.points else { continue };
        if e.max_points <= 0.0 {
            continue;
        }
        let slot = by_category.entry(e.category_id).or_insert((0.0, 0.0, e.category_weight));
        slot.0 += points;
        slot.1 += e.max_points;
    }
    if by_category.is_empty() {
        return None;
    }

    let total_weight: f64 = by_category.values().map(|(_, _, w)| w).sum();
    let pct = |earned: f64, possible: f64| earned / possible * 100.0;

    let grade = if total_weight > 0.0 {
        by_category
            .values()
            .map(|&(earned, possible, w)| pct(earned, possible) * w)
            .sum::<f64>()
            / total_weight
    } else {
        by_category
            .values()
            .map(|&(earned, possible, _)| pct(earned, possible))
            .sum::<f64>()
            / by_category.len() as f64
    };
    Some(round2(grade))
}

/// Share of records marked present or late.
pub fn attendance_rate(records: &[AttendanceRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let attended = records
        .iter()
        .filter(|r| matches!(r.status, AttendanceStatus::Present | AttendanceStatus::Late))
        .count();
    Some(round2(attended as f64 / records.len() as f64 * 100.0))
}

pub struct ProgressionService;

impl ProgressionService {
    /// Computes and stores the snapshot for one reporting period. Snapshots
    /// are write-once.
    pub async fn create(
        store: &dyn Storage,
        session: &Session,
        req: &CreateSnapshotRequest,
    ) -> Result<ProgressionSnapshot, AppError> {
        let period = req.reporting_period.trim();
        if period.is_empty() {
            return Err(AppError::validation("reportingPeriod", "Reporting period is required"));
        }
        store
            .student(session.tenant_id, req.student_id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;
        store
            .classroom(session.tenant_id, req.classroom_id)
            .await?
            .ok_or(AppError::NotFound("Classroom"))?;

        let grades = store
            .grades_by_student(session.tenant_id, req.student_id, Some(req.classroom_id))
            .await?;
        let attendance: Vec<AttendanceRecord> = store
            .attendance_by_student(session.tenant_id, req.student_id)
            .await?
            .into_iter()
            .filter(|r| r.classroom_id == req.classroom_id)
            .collect();

        let new = NewSnapshot {
            student_id: req.student_id,
            classroom_id: req.classroom_id,
            reporting_period: period.to_string(),
            overall_grade: overall_grade(&grades),
            attendance_rate: attendance_rate(&attendance),
            behavior_notes: req.behavior_notes.clone(),
            academic_notes: req.academic_notes.clone(),
            goals: req.goals.clone(),
        };
        Ok(store.create_snapshot(session.tenant_id, &new).await?)
    }

    pub async fn for_student(
        store: &dyn Storage,
        session: &Session,
        student_id: Uuid,
    ) -> Result<Vec<ProgressionSnapshot>, AppError> {
        StudentService::visible(store, session, student_id).await?;
        Ok(store.snapshots_by_student(session.tenant_id, student_id).await?)
    }
}
