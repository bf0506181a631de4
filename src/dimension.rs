//! Natural key to surrogate id resolution for the course, time and grade
//! dimensions.
//!
//! Ids are cached for the whole run. Ids created inside a transaction stay
//! pending until the caller reports the commit; a rollback drops them so the
//! cache never hands out an id whose row was discarded.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CourseRecord, Grade, GradeRow, TimeKey};
use crate::store::WarehouseTx;

#[derive(Debug, Clone, Copy)]
pub enum DimensionRequest<'a> {
    /// Keyed by course code; the record supplies attributes on first sight.
    Course(&'a CourseRecord),
    Time(TimeKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingKey {
    Course(String),
    Time(TimeKey),
}

#[derive(Debug, Default)]
pub struct DimensionResolver {
    courses: HashMap<String, Uuid>,
    times: HashMap<TimeKey, Uuid>,
    grades: Option<HashMap<Grade, GradeRow>>,
    pending: Vec<PendingKey>,
}

impl DimensionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the surrogate id for the request's natural key, inserting the
    /// dimension row on first sight. Existing rows are never modified.
    pub async fn resolve_or_create(
        &mut self,
        tx: &mut dyn WarehouseTx,
        request: DimensionRequest<'_>,
    ) -> Result<Uuid, StoreError> {
        match request {
            DimensionRequest::Course(course) => {
                if let Some(id) = self.courses.get(&course.code) {
                    return Ok(*id);
                }
                let id = match tx.find_course(&course.code).await? {
                    Some(id) => id,
                    None => {
                        let id = tx.insert_course(course).await?;
                        debug!(code = %course.code, "created course dimension");
                        self.pending.push(PendingKey::Course(course.code.clone()));
                        id
                    }
                };
                self.courses.insert(course.code.clone(), id);
                Ok(id)
            }
            DimensionRequest::Time(key) => {
                if let Some(id) = self.times.get(&key) {
                    return Ok(*id);
                }
                let id = match tx.find_time(key).await? {
                    Some(id) => id,
                    None => {
                        let id = tx.insert_time(key).await?;
                        debug!(time = %key, "created time dimension");
                        self.pending.push(PendingKey::Time(key));
                        id
                    }
                };
                self.times.insert(key, id);
                Ok(id)
            }
        }
    }

    pub async fn course(
        &mut self,
        tx: &mut dyn WarehouseTx,
        course: &CourseRecord,
    ) -> Result<Uuid, StoreError> {
        self.resolve_or_create(tx, DimensionRequest::Course(course)).await
    }

    pub async fn time(&mut self, tx: &mut dyn WarehouseTx, key: TimeKey) -> Result<Uuid, StoreError> {
        self.resolve_or_create(tx, DimensionRequest::Time(key)).await
    }

    /// Looks up a grade letter in the seeded grade dimension.
    pub async fn grade(
        &mut self,
        tx: &mut dyn WarehouseTx,
        letter: &str,
    ) -> Result<Option<GradeRow>, StoreError> {
        let Ok(grade) = letter.parse::<Grade>() else {
            return Ok(None);
        };
        Ok(self.grade_rows(tx).await?.get(&grade).copied())
    }

    async fn grade_rows(
        &mut self,
        tx: &mut dyn WarehouseTx,
    ) -> Result<&HashMap<Grade, GradeRow>, StoreError> {
        if self.grades.is_none() {
            let rows = tx.grades().await?;
            self.grades = Some(rows.into_iter().map(|row| (row.grade, row)).collect());
        }
        Ok(&*self.grades.get_or_insert_with(HashMap::new))
    }

    /// Promotes ids created in the transaction that just committed.
    pub fn commit(&mut self) {
        self.pending.clear();
    }

    /// Forgets ids created in the transaction that was rolled back.
    pub fn discard(&mut self) {
        for key in self.pending.drain(..) {
            match key {
                PendingKey::Course(code) => {
                    self.courses.remove(&code);
                }
                PendingKey::Time(time) => {
                    self.times.remove(&time);
                }
            }
        }
    }
}
