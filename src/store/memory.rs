use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{Outcome, Warehouse, WarehouseTx};
use crate::error::StoreError;
use crate::models::{
    AnalyticsRow, CourseAnalytics, CourseRecord, FactGrade, Grade, GradeRow, NewFact,
    SemesterSnapshot, StudentCourse, StudentSummary, TimeKey,
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredStudent {
    pub id: Uuid,
    pub summary: StudentSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredCourse {
    pub id: Uuid,
    pub record: CourseRecord,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredFact {
    pub id: Uuid,
    pub grade_id: Uuid,
    pub weighted_points: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: i32,
    pub failed: i32,
}

/// Full contents of an in-memory warehouse. Keys mirror the uniqueness
/// constraints of the Postgres schema.
#[derive(Debug, Clone, Default)]
pub struct WarehouseState {
    pub students: HashMap<String, StoredStudent>,
    pub courses: HashMap<String, StoredCourse>,
    pub terms: HashMap<TimeKey, Uuid>,
    pub grades: Vec<GradeRow>,
    pub facts: HashMap<(Uuid, Uuid, Uuid), StoredFact>,
    pub tallies: HashMap<(Uuid, Uuid), Tally>,
    pub snapshots: HashMap<(Uuid, Uuid), SemesterSnapshot>,
    pub analytics: HashMap<(Uuid, Uuid), CourseAnalytics>,
}

/// Warehouse kept in process memory. A transaction works on a private copy
/// of the state and publishes it on commit, so it supports one writer at a
/// time.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<WarehouseState>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state.
    pub fn state(&self) -> Result<WarehouseState, StoreError> {
        Ok(lock(&self.state)?.clone())
    }
}

fn lock(state: &Mutex<WarehouseState>) -> Result<MutexGuard<'_, WarehouseState>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory warehouse lock poisoned".to_string()))
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn init_schema(&self) -> Result<(), StoreError> {
        let mut state = lock(&self.state)?;
        if state.grades.is_empty() {
            state.grades = Grade::ALL
                .iter()
                .map(|grade| GradeRow {
                    id: Uuid::new_v4(),
                    grade: *grade,
                    weight: grade.weight(),
                })
                .collect();
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn WarehouseTx>, StoreError> {
        let working = lock(&self.state)?.clone();
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.state),
            working,
        }))
    }

    async fn close(&self) {
        debug!("in-memory warehouse released");
    }
}

struct MemoryTx {
    shared: Arc<Mutex<WarehouseState>>,
    working: WarehouseState,
}

#[async_trait]
impl WarehouseTx for MemoryTx {
    async fn upsert_student(&mut self, student: &StudentSummary) -> Result<Uuid, StoreError> {
        let stored = self
            .working
            .students
            .entry(student.nrp.clone())
            .or_insert_with(|| StoredStudent {
                id: Uuid::new_v4(),
                summary: student.clone(),
            });
        stored.summary = student.clone();
        Ok(stored.id)
    }

    async fn find_course(&mut self, code: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self.working.courses.get(code).map(|course| course.id))
    }

    async fn insert_course(&mut self, course: &CourseRecord) -> Result<Uuid, StoreError> {
        if self.working.courses.contains_key(&course.code) {
            return Err(StoreError::Corrupt(format!(
                "duplicate course code {}",
                course.code
            )));
        }
        let id = Uuid::new_v4();
        self.working.courses.insert(
            course.code.clone(),
            StoredCourse {
                id,
                record: course.clone(),
            },
        );
        Ok(id)
    }

    async fn find_time(&mut self, key: TimeKey) -> Result<Option<Uuid>, StoreError> {
        Ok(self.working.terms.get(&key).copied())
    }

    async fn insert_time(&mut self, key: TimeKey) -> Result<Uuid, StoreError> {
        if self.working.terms.contains_key(&key) {
            return Err(StoreError::Corrupt(format!("duplicate term {key}")));
        }
        let id = Uuid::new_v4();
        self.working.terms.insert(key, id);
        Ok(id)
    }

    async fn grades(&mut self) -> Result<Vec<GradeRow>, StoreError> {
        Ok(self.working.grades.clone())
    }

    async fn insert_fact_if_absent(&mut self, fact: &NewFact) -> Result<bool, StoreError> {
        let key = (fact.student_id, fact.course_id, fact.time_id);
        if self.working.facts.contains_key(&key) {
            return Ok(false);
        }
        self.working.facts.insert(
            key,
            StoredFact {
                id: Uuid::new_v4(),
                grade_id: fact.grade_id,
                weighted_points: fact.weighted_points,
            },
        );
        Ok(true)
    }

    async fn increment_tally(
        &mut self,
        course_id: Uuid,
        time_id: Uuid,
        outcome: Outcome,
    ) -> Result<(), StoreError> {
        let tally = self
            .working
            .tallies
            .entry((course_id, time_id))
            .or_default();
        match outcome {
            Outcome::Passed => tally.passed += 1,
            Outcome::Failed => tally.failed += 1,
        }
        Ok(())
    }

    async fn student_courses(
        &mut self,
        student_id: Uuid,
    ) -> Result<Vec<StudentCourse>, StoreError> {
        let credits: HashMap<Uuid, i32> = self
            .working
            .courses
            .values()
            .map(|course| (course.id, course.record.credits))
            .collect();
        let terms: HashMap<Uuid, TimeKey> = self
            .working
            .terms
            .iter()
            .map(|(key, id)| (*id, *key))
            .collect();
        let grades: HashMap<Uuid, GradeRow> = self
            .working
            .grades
            .iter()
            .map(|row| (row.id, *row))
            .collect();

        self.working
            .facts
            .iter()
            .filter(|((student, _, _), _)| *student == student_id)
            .map(|((_, course_id, time_id), fact)| -> Result<StudentCourse, StoreError> {
                let (Some(credits), Some(time), Some(grade)) = (
                    credits.get(course_id),
                    terms.get(time_id),
                    grades.get(&fact.grade_id),
                ) else {
                    return Err(StoreError::Corrupt(format!(
                        "fact {} references a missing dimension",
                        fact.id
                    )));
                };
                Ok(StudentCourse {
                    time_id: *time_id,
                    time: *time,
                    credits: *credits,
                    grade: grade.grade,
                    weight: grade.weight,
                })
            })
            .collect()
    }

    async fn upsert_snapshot(&mut self, snapshot: &SemesterSnapshot) -> Result<(), StoreError> {
        self.working
            .snapshots
            .insert((snapshot.student_id, snapshot.time_id), snapshot.clone());
        Ok(())
    }

    async fn fact_grades(&mut self) -> Result<Vec<FactGrade>, StoreError> {
        let grades: HashMap<Uuid, GradeRow> = self
            .working
            .grades
            .iter()
            .map(|row| (row.id, *row))
            .collect();

        self.working
            .facts
            .iter()
            .map(|((_, course_id, time_id), fact)| -> Result<FactGrade, StoreError> {
                let row = grades.get(&fact.grade_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("fact {} references unknown grade", fact.id))
                })?;
                Ok(FactGrade {
                    course_id: *course_id,
                    time_id: *time_id,
                    grade: row.grade,
                    weight: row.weight,
                })
            })
            .collect()
    }

    async fn upsert_analytics(&mut self, analytics: &CourseAnalytics) -> Result<(), StoreError> {
        self.working
            .analytics
            .insert((analytics.course_id, analytics.time_id), analytics.clone());
        Ok(())
    }

    async fn analytics_rows(&mut self) -> Result<Vec<AnalyticsRow>, StoreError> {
        let courses: HashMap<Uuid, &CourseRecord> = self
            .working
            .courses
            .values()
            .map(|course| (course.id, &course.record))
            .collect();
        let terms: HashMap<Uuid, TimeKey> = self
            .working
            .terms
            .iter()
            .map(|(key, id)| (*id, *key))
            .collect();

        let mut rows = Vec::with_capacity(self.working.analytics.len());
        for analytics in self.working.analytics.values() {
            let (Some(course), Some(time)) = (
                courses.get(&analytics.course_id),
                terms.get(&analytics.time_id),
            ) else {
                return Err(StoreError::Corrupt(
                    "analytics row references a missing dimension".to_string(),
                ));
            };
            let histogram = &analytics.histogram;
            rows.push(AnalyticsRow {
                course_code: course.code.clone(),
                course_name: course.name.clone(),
                year: time.year,
                term: time.term,
                average_weight: analytics.average_weight,
                pass_percentage: analytics.pass_percentage,
                enrollment: analytics.enrollment,
                grade_a: histogram.count(Grade::A),
                grade_ab: histogram.count(Grade::AB),
                grade_b: histogram.count(Grade::B),
                grade_bc: histogram.count(Grade::BC),
                grade_c: histogram.count(Grade::C),
                grade_d: histogram.count(Grade::D),
                grade_e: histogram.count(Grade::E),
            });
        }

        rows.sort_by(|a, b| {
            (a.year, a.term, &a.course_code).cmp(&(b.year, b.term, &b.course_code))
        });
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        *lock(&this.shared)? = this.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Phase, Term};

    fn course(code: &str) -> CourseRecord {
        CourseRecord {
            code: code.to_string(),
            name: "Struktur Data".to_string(),
            credits: 3,
            year: 2021,
            term: Term::Odd,
            grade: "A".to_string(),
            phase: Phase::Preparatory,
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let warehouse = MemoryWarehouse::new();
        warehouse.init_schema().await.expect("schema");

        let mut tx = warehouse.begin().await.expect("begin");
        tx.insert_course(&course("IF184201")).await.expect("insert");
        tx.commit().await.expect("commit");

        let state = warehouse.state().expect("state");
        assert_eq!(state.courses.len(), 1);
        assert_eq!(state.grades.len(), 7);
    }

    #[tokio::test]
    async fn rolled_back_writes_are_discarded() {
        let warehouse = MemoryWarehouse::new();
        warehouse.init_schema().await.expect("schema");

        let mut tx = warehouse.begin().await.expect("begin");
        tx.insert_course(&course("IF184201")).await.expect("insert");
        tx.rollback().await.expect("rollback");

        assert!(warehouse.state().expect("state").courses.is_empty());
    }

    #[tokio::test]
    async fn fact_insert_reports_duplicates() {
        let warehouse = MemoryWarehouse::new();
        let mut tx = warehouse.begin().await.expect("begin");
        let fact = NewFact {
            student_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            time_id: Uuid::new_v4(),
            grade_id: Uuid::new_v4(),
            weighted_points: 12.0,
        };

        assert!(tx.insert_fact_if_absent(&fact).await.expect("first insert"));
        assert!(!tx.insert_fact_if_absent(&fact).await.expect("second insert"));
    }

    #[tokio::test]
    async fn grade_seeding_is_idempotent() {
        let warehouse = MemoryWarehouse::new();
        warehouse.init_schema().await.expect("schema");
        let first = warehouse.state().expect("state").grades;
        warehouse.init_schema().await.expect("schema again");
        assert_eq!(warehouse.state().expect("state").grades, first);
    }
}
