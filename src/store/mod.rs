//! Transactional warehouse seam.
//!
//! `Warehouse` owns the session (connection pool or in-process state) and
//! hands out `WarehouseTx` units of work. Everything the loader writes goes
//! through a transaction; dropping a transaction without committing discards
//! its writes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    AnalyticsRow, CourseAnalytics, CourseRecord, FactGrade, GradeRow, NewFact, SemesterSnapshot,
    StudentCourse, StudentSummary, TimeKey,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;

/// Which counter of a course-offering tally to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Creates relations that do not exist yet and seeds the grade dimension.
    async fn init_schema(&self) -> Result<(), StoreError>;
    async fn begin(&self) -> Result<Box<dyn WarehouseTx>, StoreError>;
    async fn close(&self);
}

#[async_trait]
pub trait WarehouseTx: Send {
    /// Last-write-wins on `nrp`; returns the student's surrogate id.
    async fn upsert_student(&mut self, student: &StudentSummary) -> Result<Uuid, StoreError>;

    async fn find_course(&mut self, code: &str) -> Result<Option<Uuid>, StoreError>;
    async fn insert_course(&mut self, course: &CourseRecord) -> Result<Uuid, StoreError>;
    async fn find_time(&mut self, key: TimeKey) -> Result<Option<Uuid>, StoreError>;
    async fn insert_time(&mut self, key: TimeKey) -> Result<Uuid, StoreError>;
    async fn grades(&mut self) -> Result<Vec<GradeRow>, StoreError>;

    /// Returns `true` only when a new row was written.
    async fn insert_fact_if_absent(&mut self, fact: &NewFact) -> Result<bool, StoreError>;
    async fn increment_tally(
        &mut self,
        course_id: Uuid,
        time_id: Uuid,
        outcome: Outcome,
    ) -> Result<(), StoreError>;
    /// Every stored fact of one student, joined with course credits, term
    /// and grade weight.
    async fn student_courses(&mut self, student_id: Uuid)
        -> Result<Vec<StudentCourse>, StoreError>;
    async fn upsert_snapshot(&mut self, snapshot: &SemesterSnapshot) -> Result<(), StoreError>;

    async fn fact_grades(&mut self) -> Result<Vec<FactGrade>, StoreError>;
    async fn upsert_analytics(&mut self, analytics: &CourseAnalytics) -> Result<(), StoreError>;
    async fn analytics_rows(&mut self) -> Result<Vec<AnalyticsRow>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
