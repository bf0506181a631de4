use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{Outcome, Warehouse, WarehouseTx};
use crate::error::StoreError;
use crate::models::{
    AnalyticsRow, CourseAnalytics, CourseRecord, FactGrade, Grade, GradeRow, NewFact,
    SemesterSnapshot, StudentCourse, StudentSummary, Term, TimeKey,
};

pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("connected to Postgres");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        for grade in Grade::ALL {
            sqlx::query(
                r#"
                INSERT INTO transcript_warehouse.grades (id, letter, weight)
                VALUES ($1, $2, $3)
                ON CONFLICT (letter) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(grade.letter())
            .bind(grade.weight())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn WarehouseTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Postgres connection pool closed");
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl WarehouseTx for PgTx {
    async fn upsert_student(&mut self, student: &StudentSummary) -> Result<Uuid, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO transcript_warehouse.students
            (id, nrp, full_name, status, gpa, credits_attempted, credits_passed,
             preparatory_gpa, preparatory_credits, bachelor_gpa, bachelor_credits)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (nrp) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                status = EXCLUDED.status,
                gpa = EXCLUDED.gpa,
                credits_attempted = EXCLUDED.credits_attempted,
                credits_passed = EXCLUDED.credits_passed,
                preparatory_gpa = EXCLUDED.preparatory_gpa,
                preparatory_credits = EXCLUDED.preparatory_credits,
                bachelor_gpa = EXCLUDED.bachelor_gpa,
                bachelor_credits = EXCLUDED.bachelor_credits
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&student.nrp)
        .bind(&student.name)
        .bind(&student.status)
        .bind(student.gpa)
        .bind(student.credits_attempted)
        .bind(student.credits_passed)
        .bind(student.preparatory_gpa)
        .bind(student.preparatory_credits)
        .bind(student.bachelor_gpa)
        .bind(student.bachelor_credits)
        .fetch_one(&mut *self.tx)
        .await?
        .try_get("id")?;

        Ok(id)
    }

    async fn find_course(&mut self, code: &str) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT id FROM transcript_warehouse.courses WHERE code = $1")
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|row| row.try_get("id")).transpose()?)
    }

    async fn insert_course(&mut self, course: &CourseRecord) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO transcript_warehouse.courses (id, code, name, credits, phase)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(course.credits)
        .bind(course.phase.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn find_time(&mut self, key: TimeKey) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query(
            "SELECT id FROM transcript_warehouse.terms WHERE year = $1 AND term = $2",
        )
        .bind(key.year)
        .bind(key.term.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|row| row.try_get("id")).transpose()?)
    }

    async fn insert_time(&mut self, key: TimeKey) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO transcript_warehouse.terms (id, year, term) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(key.year)
            .bind(key.term.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn grades(&mut self) -> Result<Vec<GradeRow>, StoreError> {
        let rows = sqlx::query("SELECT id, letter, weight FROM transcript_warehouse.grades")
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| -> Result<GradeRow, StoreError> {
                Ok(GradeRow {
                    id: row.try_get("id")?,
                    grade: grade_column(row, "letter")?,
                    weight: row.try_get("weight")?,
                })
            })
            .collect()
    }

    async fn insert_fact_if_absent(&mut self, fact: &NewFact) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transcript_warehouse.transcript_facts
            (id, student_id, course_id, time_id, grade_id, weighted_points)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, course_id, time_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(fact.student_id)
        .bind(fact.course_id)
        .bind(fact.time_id)
        .bind(fact.grade_id)
        .bind(fact.weighted_points)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_tally(
        &mut self,
        course_id: Uuid,
        time_id: Uuid,
        outcome: Outcome,
    ) -> Result<(), StoreError> {
        let (passed, failed) = match outcome {
            Outcome::Passed => (1, 0),
            Outcome::Failed => (0, 1),
        };

        sqlx::query(
            r#"
            INSERT INTO transcript_warehouse.course_outcomes
            (id, course_id, time_id, passed, failed)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (course_id, time_id) DO UPDATE
            SET passed = course_outcomes.passed + EXCLUDED.passed,
                failed = course_outcomes.failed + EXCLUDED.failed
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(time_id)
        .bind(passed)
        .bind(failed)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn student_courses(
        &mut self,
        student_id: Uuid,
    ) -> Result<Vec<StudentCourse>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT f.time_id, t.year, t.term, c.credits, g.letter, g.weight
            FROM transcript_warehouse.transcript_facts f
            JOIN transcript_warehouse.courses c ON c.id = f.course_id
            JOIN transcript_warehouse.terms t ON t.id = f.time_id
            JOIN transcript_warehouse.grades g ON g.id = f.grade_id
            WHERE f.student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<StudentCourse, StoreError> {
                let term: String = row.try_get("term")?;
                Ok(StudentCourse {
                    time_id: row.try_get("time_id")?,
                    time: TimeKey {
                        year: row.try_get("year")?,
                        term: term.parse::<Term>().map_err(StoreError::Corrupt)?,
                    },
                    credits: row.try_get("credits")?,
                    grade: grade_column(row, "letter")?,
                    weight: row.try_get("weight")?,
                })
            })
            .collect()
    }

    async fn upsert_snapshot(&mut self, snapshot: &SemesterSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transcript_warehouse.semester_snapshots
            (id, student_id, time_id, gpa, credits_attempted, credits_passed,
             course_count, cumulative_gpa, gpa_delta)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (student_id, time_id) DO UPDATE
            SET gpa = EXCLUDED.gpa,
                credits_attempted = EXCLUDED.credits_attempted,
                credits_passed = EXCLUDED.credits_passed,
                course_count = EXCLUDED.course_count,
                cumulative_gpa = EXCLUDED.cumulative_gpa,
                gpa_delta = EXCLUDED.gpa_delta
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(snapshot.student_id)
        .bind(snapshot.time_id)
        .bind(snapshot.gpa)
        .bind(snapshot.credits_attempted)
        .bind(snapshot.credits_passed)
        .bind(snapshot.course_count)
        .bind(snapshot.cumulative_gpa)
        .bind(snapshot.gpa_delta)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn fact_grades(&mut self) -> Result<Vec<FactGrade>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT f.course_id, f.time_id, g.letter, g.weight
            FROM transcript_warehouse.transcript_facts f
            JOIN transcript_warehouse.grades g ON g.id = f.grade_id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<FactGrade, StoreError> {
                Ok(FactGrade {
                    course_id: row.try_get("course_id")?,
                    time_id: row.try_get("time_id")?,
                    grade: grade_column(row, "letter")?,
                    weight: row.try_get("weight")?,
                })
            })
            .collect()
    }

    async fn upsert_analytics(&mut self, analytics: &CourseAnalytics) -> Result<(), StoreError> {
        let histogram = &analytics.histogram;
        sqlx::query(
            r#"
            INSERT INTO transcript_warehouse.course_analytics
            (id, course_id, time_id, average_weight, pass_percentage, enrollment,
             grade_a, grade_ab, grade_b, grade_bc, grade_c, grade_d, grade_e)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (course_id, time_id) DO UPDATE
            SET average_weight = EXCLUDED.average_weight,
                pass_percentage = EXCLUDED.pass_percentage,
                enrollment = EXCLUDED.enrollment,
                grade_a = EXCLUDED.grade_a,
                grade_ab = EXCLUDED.grade_ab,
                grade_b = EXCLUDED.grade_b,
                grade_bc = EXCLUDED.grade_bc,
                grade_c = EXCLUDED.grade_c,
                grade_d = EXCLUDED.grade_d,
                grade_e = EXCLUDED.grade_e
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(analytics.course_id)
        .bind(analytics.time_id)
        .bind(analytics.average_weight)
        .bind(analytics.pass_percentage)
        .bind(analytics.enrollment)
        .bind(histogram.count(Grade::A))
        .bind(histogram.count(Grade::AB))
        .bind(histogram.count(Grade::B))
        .bind(histogram.count(Grade::BC))
        .bind(histogram.count(Grade::C))
        .bind(histogram.count(Grade::D))
        .bind(histogram.count(Grade::E))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn analytics_rows(&mut self) -> Result<Vec<AnalyticsRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.code, c.name, t.year, t.term,
                   a.average_weight, a.pass_percentage, a.enrollment,
                   a.grade_a, a.grade_ab, a.grade_b, a.grade_bc, a.grade_c, a.grade_d, a.grade_e
            FROM transcript_warehouse.course_analytics a
            JOIN transcript_warehouse.courses c ON c.id = a.course_id
            JOIN transcript_warehouse.terms t ON t.id = a.time_id
            ORDER BY t.year, t.term DESC, c.code
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<AnalyticsRow, StoreError> {
                let term: String = row.try_get("term")?;
                Ok(AnalyticsRow {
                    course_code: row.try_get("code")?,
                    course_name: row.try_get("name")?,
                    year: row.try_get("year")?,
                    term: term.parse::<Term>().map_err(StoreError::Corrupt)?,
                    average_weight: row.try_get("average_weight")?,
                    pass_percentage: row.try_get("pass_percentage")?,
                    enrollment: row.try_get("enrollment")?,
                    grade_a: row.try_get("grade_a")?,
                    grade_ab: row.try_get("grade_ab")?,
                    grade_b: row.try_get("grade_b")?,
                    grade_bc: row.try_get("grade_bc")?,
                    grade_c: row.try_get("grade_c")?,
                    grade_d: row.try_get("grade_d")?,
                    grade_e: row.try_get("grade_e")?,
                })
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn grade_column(row: &PgRow, column: &str) -> Result<Grade, StoreError> {
    let letter: String = row.try_get(column)?;
    letter.parse::<Grade>().map_err(StoreError::Corrupt)
}
