use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{SemesterSnapshot, StudentCourse};
use crate::store::WarehouseTx;

/// Groups a student's stored courses by semester and walks them
/// chronologically, carrying cumulative credits and points. The result
/// depends only on the facts, so it is the same whichever document loaded
/// them.
pub fn compute_semesters(student_id: Uuid, courses: &[StudentCourse]) -> Vec<SemesterSnapshot> {
    let mut by_semester: BTreeMap<_, Vec<&StudentCourse>> = BTreeMap::new();
    for course in courses {
        by_semester
            .entry((course.time, course.time_id))
            .or_default()
            .push(course);
    }

    let mut total_credits = 0i32;
    let mut total_points = 0.0f64;
    let mut previous_gpa = 0.0f64;
    let mut snapshots = Vec::with_capacity(by_semester.len());

    for ((time, time_id), entries) in by_semester {
        let credits: i32 = entries.iter().map(|course| course.credits).sum();
        let points: f64 = entries
            .iter()
            .map(|course| f64::from(course.credits) * course.weight)
            .sum();
        let credits_passed: i32 = entries
            .iter()
            .filter(|course| course.grade.is_passing())
            .map(|course| course.credits)
            .sum();

        let gpa = ratio(points, credits);
        total_credits += credits;
        total_points += points;
        let gpa_delta = if previous_gpa > 0.0 {
            gpa - previous_gpa
        } else {
            0.0
        };

        snapshots.push(SemesterSnapshot {
            student_id,
            time_id,
            time,
            gpa,
            credits_attempted: credits,
            credits_passed,
            course_count: entries.len() as i32,
            cumulative_gpa: ratio(total_points, total_credits),
            gpa_delta,
        });
        previous_gpa = gpa;
    }

    snapshots
}

/// Recomputes and overwrites every semester snapshot of one student from
/// the facts stored for them so far, including those written earlier in `tx`.
pub async fn refresh_snapshots(
    tx: &mut dyn WarehouseTx,
    student_id: Uuid,
) -> Result<usize, StoreError> {
    let courses = tx.student_courses(student_id).await?;
    let snapshots = compute_semesters(student_id, &courses);

    for snapshot in &snapshots {
        tx.upsert_snapshot(snapshot).await?;
    }

    Ok(snapshots.len())
}

fn ratio(points: f64, credits: i32) -> f64 {
    if credits > 0 {
        points / f64::from(credits)
    } else {
        0.0
    }
}
