use std::collections::BTreeMap;

use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CourseAnalytics, FactGrade, GradeHistogram};
use crate::store::Warehouse;

/// Aggregates transcript facts into one analytics row per course offering.
pub fn summarize(facts: &[FactGrade]) -> Vec<CourseAnalytics> {
    let mut groups: BTreeMap<(Uuid, Uuid), (GradeHistogram, f64, i32)> = BTreeMap::new();

    for fact in facts {
        let (histogram, weight_sum, passed) = groups
            .entry((fact.course_id, fact.time_id))
            .or_insert((GradeHistogram::default(), 0.0, 0));
        histogram.record(fact.grade);
        *weight_sum += fact.weight;
        if fact.grade.is_passing() {
            *passed += 1;
        }
    }

    groups
        .into_iter()
        .map(|((course_id, time_id), (histogram, weight_sum, passed))| {
            let enrollment = histogram.total();
            let (average_weight, pass_percentage) = if enrollment > 0 {
                (
                    weight_sum / f64::from(enrollment),
                    f64::from(passed) / f64::from(enrollment) * 100.0,
                )
            } else {
                (0.0, 0.0)
            };
            CourseAnalytics {
                course_id,
                time_id,
                average_weight,
                pass_percentage,
                enrollment,
                histogram,
            }
        })
        .collect()
}

/// Rebuilds every course analytics row from all accumulated facts in a
/// transaction of its own. Safe to run any number of times.
pub async fn recompute(warehouse: &dyn Warehouse) -> Result<usize, StoreError> {
    let mut tx = warehouse.begin().await?;
    let result = async {
        let facts = tx.fact_grades().await?;
        let rows = summarize(&facts);
        for row in &rows {
            tx.upsert_analytics(row).await?;
        }
        Ok::<_, StoreError>(rows.len())
    }
    .await;

    match result {
        Ok(count) => {
            tx.commit().await?;
            info!(rows = count, "course analytics recomputed");
            Ok(count)
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grade;

    fn fact(course_id: Uuid, time_id: Uuid, grade: Grade) -> FactGrade {
        FactGrade {
            course_id,
            time_id,
            grade,
            weight: grade.weight(),
        }
    }

    #[test]
    fn groups_by_course_offering() {
        let course = Uuid::new_v4();
        let odd = Uuid::new_v4();
        let even = Uuid::new_v4();
        let facts = vec![
            fact(course, odd, Grade::A),
            fact(course, odd, Grade::B),
            fact(course, even, Grade::E),
        ];

        let rows = summarize(&facts);
        assert_eq!(rows.len(), 2);
        let odd_row = rows.iter().find(|row| row.time_id == odd).expect("odd row");
        assert_eq!(odd_row.enrollment, 2);
        assert!((odd_row.average_weight - 3.5).abs() < 1e-9);
        assert!((odd_row.pass_percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn pass_percentage_and_histogram_agree_with_enrollment() {
        let course = Uuid::new_v4();
        let time = Uuid::new_v4();
        let facts = vec![
            fact(course, time, Grade::A),
            fact(course, time, Grade::AB),
            fact(course, time, Grade::D),
            fact(course, time, Grade::E),
        ];

        let rows = summarize(&facts);
        let row = &rows[0];
        assert_eq!(row.enrollment, 4);
        assert_eq!(row.histogram.total(), row.enrollment);
        assert_eq!(row.histogram.count(Grade::D), 1);
        assert_eq!(row.histogram.count(Grade::BC), 0);
        assert!((row.pass_percentage - 50.0).abs() < 1e-9);
        assert!((row.average_weight - (4.0 + 3.5 + 1.0 + 0.0) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn no_facts_no_rows() {
        assert!(summarize(&[]).is_empty());
    }
}
