use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Academic term within a year. Odd (Gasal) precedes even (Genap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Odd,
    Even,
}

impl Term {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Gs" => Some(Term::Odd),
            "Gn" => Some(Term::Even),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Term::Odd => "odd",
            Term::Even => "even",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Term {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "odd" => Ok(Term::Odd),
            "even" => Ok(Term::Even),
            other => Err(format!("unknown term '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Preparatory,
    Bachelor,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparatory => "preparatory",
            Phase::Bachelor => "bachelor",
        }
    }
}

/// Letter grades of the reference grade dimension, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade {
    A,
    AB,
    B,
    BC,
    C,
    D,
    E,
}

impl Grade {
    pub const ALL: [Grade; 7] = [
        Grade::A,
        Grade::AB,
        Grade::B,
        Grade::BC,
        Grade::C,
        Grade::D,
        Grade::E,
    ];

    pub fn letter(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::AB => "AB",
            Grade::B => "B",
            Grade::BC => "BC",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }

    /// Reference weight seeded into the grade dimension.
    pub fn weight(&self) -> f64 {
        match self {
            Grade::A => 4.0,
            Grade::AB => 3.5,
            Grade::B => 3.0,
            Grade::BC => 2.5,
            Grade::C => 2.0,
            Grade::D => 1.0,
            Grade::E => 0.0,
        }
    }

    pub fn is_passing(&self) -> bool {
        !matches!(self, Grade::D | Grade::E)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .iter()
            .copied()
            .find(|grade| grade.letter() == value)
            .ok_or_else(|| format!("unknown grade letter '{value}'"))
    }
}

/// Natural key of the time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey {
    pub year: i32,
    pub term: Term,
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.term)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub nrp: String,
    pub name: String,
    pub status: String,
    pub gpa: f64,
    pub credits_attempted: i32,
    pub credits_passed: i32,
    pub preparatory_gpa: f64,
    pub preparatory_credits: i32,
    pub bachelor_gpa: f64,
    pub bachelor_credits: i32,
}

/// One line item of a transcript. The grade letter is kept verbatim; it is
/// only checked against the grade dimension when the record is reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseRecord {
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub year: i32,
    pub term: Term,
    pub grade: String,
    pub phase: Phase,
}

impl CourseRecord {
    pub fn time_key(&self) -> TimeKey {
        TimeKey {
            year: self.year,
            term: self.term,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTranscript {
    pub student: StudentSummary,
    pub courses: Vec<CourseRecord>,
}

/// Grade dimension row as stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeRow {
    pub id: Uuid,
    pub grade: Grade,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFact {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub time_id: Uuid,
    pub grade_id: Uuid,
    pub weighted_points: f64,
}

/// One of a student's stored facts joined with its course credits, term and
/// grade weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentCourse {
    pub time_id: Uuid,
    pub time: TimeKey,
    pub credits: i32,
    pub grade: Grade,
    pub weight: f64,
}

/// A transcript fact joined with its grade, as read back for analytics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactGrade {
    pub course_id: Uuid,
    pub time_id: Uuid,
    pub grade: Grade,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemesterSnapshot {
    pub student_id: Uuid,
    pub time_id: Uuid,
    pub time: TimeKey,
    pub gpa: f64,
    pub credits_attempted: i32,
    pub credits_passed: i32,
    pub course_count: i32,
    pub cumulative_gpa: f64,
    pub gpa_delta: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeHistogram([i32; 7]);

impl GradeHistogram {
    pub fn record(&mut self, grade: Grade) {
        self.0[grade.index()] += 1;
    }

    pub fn count(&self, grade: Grade) -> i32 {
        self.0[grade.index()]
    }

    pub fn total(&self) -> i32 {
        self.0.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseAnalytics {
    pub course_id: Uuid,
    pub time_id: Uuid,
    pub average_weight: f64,
    pub pass_percentage: f64,
    pub enrollment: i32,
    pub histogram: GradeHistogram,
}

/// Course analytics joined with course and time attributes for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsRow {
    pub course_code: String,
    pub course_name: String,
    pub year: i32,
    pub term: Term,
    pub average_weight: f64,
    pub pass_percentage: f64,
    pub enrollment: i32,
    pub grade_a: i32,
    pub grade_ab: i32,
    pub grade_b: i32,
    pub grade_bc: i32,
    pub grade_c: i32,
    pub grade_d: i32,
    pub grade_e: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadStats {
    pub started_at: DateTime<Utc>,
    pub processed: usize,
    pub failed: usize,
    pub facts_inserted: usize,
    pub facts_existing: usize,
    pub courses_skipped: usize,
    pub analytics_rows: usize,
}

impl LoadStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            processed: 0,
            failed: 0,
            facts_inserted: 0,
            facts_existing: 0,
            courses_skipped: 0,
            analytics_rows: 0,
        }
    }
}

impl Default for LoadStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_codes_map_to_terms() {
        assert_eq!(Term::from_code("Gs"), Some(Term::Odd));
        assert_eq!(Term::from_code("Gn"), Some(Term::Even));
        assert_eq!(Term::from_code("Sm"), None);
        assert!(Term::Odd < Term::Even);
    }

    #[test]
    fn grades_parse_and_classify() {
        assert_eq!("AB".parse::<Grade>(), Ok(Grade::AB));
        assert!("F".parse::<Grade>().is_err());
        assert!(Grade::C.is_passing());
        assert!(!Grade::D.is_passing());
        assert!(!Grade::E.is_passing());
        assert_eq!(Grade::BC.weight(), 2.5);
    }

    #[test]
    fn time_keys_sort_chronologically() {
        let mut keys = vec![
            TimeKey { year: 2022, term: Term::Odd },
            TimeKey { year: 2021, term: Term::Even },
            TimeKey { year: 2021, term: Term::Odd },
        ];
        keys.sort();
        assert_eq!(keys[0], TimeKey { year: 2021, term: Term::Odd });
        assert_eq!(keys[2], TimeKey { year: 2022, term: Term::Odd });
    }

    #[test]
    fn histogram_counts_per_grade() {
        let mut histogram = GradeHistogram::default();
        histogram.record(Grade::A);
        histogram.record(Grade::A);
        histogram.record(Grade::E);
        assert_eq!(histogram.count(Grade::A), 2);
        assert_eq!(histogram.count(Grade::E), 1);
        assert_eq!(histogram.total(), 3);
    }

    #[test]
    fn load_stats_serialize_for_json_output() {
        let mut stats = LoadStats::new();
        stats.processed = 2;
        let value = serde_json::to_value(&stats).expect("json");
        assert_eq!(value["processed"], 2);
        assert_eq!(value["failed"], 0);
        assert!(value["started_at"].is_string());
    }
}
