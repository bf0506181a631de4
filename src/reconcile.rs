use tracing::debug;
use uuid::Uuid;

use crate::dimension::DimensionResolver;
use crate::error::EtlError;
use crate::models::{CourseRecord, NewFact};
use crate::store::{Outcome, WarehouseTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactOutcome {
    Inserted,
    AlreadyLoaded,
}

/// Writes the transcript fact for one course record of a resolved student.
///
/// The course-offering tally is bumped only when the fact row is new, so a
/// transcript that is loaded again leaves both the facts and the tallies
/// untouched. An unknown grade letter fails with `EtlError::UnknownGrade`
/// before anything is written for the record.
pub async fn reconcile_course(
    tx: &mut dyn WarehouseTx,
    resolver: &mut DimensionResolver,
    student_id: Uuid,
    course: &CourseRecord,
) -> Result<FactOutcome, EtlError> {
    let grade = resolver
        .grade(tx, &course.grade)
        .await?
        .ok_or_else(|| EtlError::UnknownGrade(course.grade.clone()))?;
    let course_id = resolver.course(tx, course).await?;
    let time_id = resolver.time(tx, course.time_key()).await?;

    let fact = NewFact {
        student_id,
        course_id,
        time_id,
        grade_id: grade.id,
        weighted_points: f64::from(course.credits) * grade.weight,
    };

    if !tx.insert_fact_if_absent(&fact).await? {
        debug!(code = %course.code, time = %course.time_key(), "fact already loaded");
        return Ok(FactOutcome::AlreadyLoaded);
    }

    let outcome = if grade.grade.is_passing() {
        Outcome::Passed
    } else {
        Outcome::Failed
    };
    tx.increment_tally(course_id, time_id, outcome).await?;

    Ok(FactOutcome::Inserted)
}
