//! Recovers a student summary and course line items from normalized
//! transcript text.
//!
//! Every header field has its own matcher so a layout drift shows up as one
//! named missing field rather than a silent mismatch of a combined pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::ParseError;
use crate::models::{CourseRecord, ParsedTranscript, Phase, StudentSummary, Term};

static IDENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)NRP\s*/\s*Nama\s*:?\s*(\d+)\s*/\s*(.*?)\s*SKS\s*Tempuh").expect("identity regex")
});
static CREDITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SKS\s*Tempuh\s*/\s*SKS\s*Lulus\s*:?\s*(\d+)\s*/\s*(\d+)").expect("credits regex")
});
static STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Status\s*:?\s*(.*?)(?:\s*Tahap|---)").expect("status regex"));
static GPA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"IPK\s*:?\s*(\d+(?:\.\d+)?)").expect("gpa regex"));
static PREPARATORY_GPA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)IP Tahap Persiapan\s*:\s*(\d+(?:\.\d+)?)").expect("preparatory gpa regex")
});
static PREPARATORY_CREDITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Total Sks Tahap Persiapan\s*:\s*(\d+)").expect("preparatory credits regex")
});
static BACHELOR_GPA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)IP Tahap Sarjana\s*:\s*(\d+(?:\.\d+)?)").expect("bachelor gpa regex")
});
static BACHELOR_CREDITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Total Sks Tahap Sarjana\s*:\s*(\d+)").expect("bachelor credits regex")
});
static COURSE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)([A-Z]{2}\d{5,6})\s*(.*?)\s*(\d)\s*(\d{4})/(Gs|Gn)/[A-Z]{1,2}\s*([A-Z]{1,2})")
        .expect("course line regex")
});
static BACHELOR_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tahap:\s*Sarjana").expect("bachelor marker regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Parses a whole transcript. Either both the header and at least one course
/// are recovered, or nothing is returned.
pub fn parse_transcript(text: &str) -> Result<ParsedTranscript, ParseError> {
    let student = parse_student(text)?;
    let courses = parse_courses(text);
    if courses.is_empty() {
        return Err(ParseError::NoCourses);
    }
    Ok(ParsedTranscript { student, courses })
}

pub fn parse_student(text: &str) -> Result<StudentSummary, ParseError> {
    let (nrp, name) = match_identity(text).ok_or(ParseError::MissingField("nrp/name"))?;
    let (credits_attempted, credits_passed) =
        match_credits(text).ok_or(ParseError::MissingField("credits"))?;
    let status = match_status(text).ok_or(ParseError::MissingField("status"))?;
    let gpa = match_decimal(&GPA, text).ok_or(ParseError::MissingField("gpa"))?;

    Ok(StudentSummary {
        nrp,
        name,
        status,
        gpa,
        credits_attempted,
        credits_passed,
        preparatory_gpa: match_decimal(&PREPARATORY_GPA, text).unwrap_or(0.0),
        preparatory_credits: match_integer(&PREPARATORY_CREDITS, text).unwrap_or(0),
        bachelor_gpa: match_decimal(&BACHELOR_GPA, text).unwrap_or(0.0),
        bachelor_credits: match_integer(&BACHELOR_CREDITS, text).unwrap_or(0),
    })
}

pub fn parse_courses(text: &str) -> Vec<CourseRecord> {
    let bachelor_start = BACHELOR_MARKER.find(text).map(|marker| marker.start());
    let mut courses = Vec::new();

    for caps in COURSE_LINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let (Some(credits), Some(year), Some(term)) = (
            caps[3].parse::<i32>().ok(),
            caps[4].parse::<i32>().ok(),
            Term::from_code(&caps[5]),
        ) else {
            debug!(line = whole.as_str(), "skipping unreadable course line");
            continue;
        };
        if credits <= 0 {
            debug!(line = whole.as_str(), "skipping course line without credits");
            continue;
        }

        let phase = match bachelor_start {
            Some(start) if whole.start() > start => Phase::Bachelor,
            _ => Phase::Preparatory,
        };

        courses.push(CourseRecord {
            code: caps[1].trim().to_string(),
            name: collapse(&caps[2]),
            credits,
            year,
            term,
            grade: caps[6].trim().to_string(),
            phase,
        });
    }

    courses
}

fn match_identity(text: &str) -> Option<(String, String)> {
    let caps = IDENTITY.captures(text)?;
    Some((caps[1].trim().to_string(), collapse(&caps[2])))
}

fn match_credits(text: &str) -> Option<(i32, i32)> {
    let caps = CREDITS.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

fn match_status(text: &str) -> Option<String> {
    let caps = STATUS.captures(text)?;
    Some(collapse(&caps[1]))
}

fn match_decimal(pattern: &Regex, text: &str) -> Option<f64> {
    pattern.captures(text)?[1].parse().ok()
}

fn match_integer(pattern: &Regex, text: &str) -> Option<i32> {
    pattern.captures(text)?[1].parse().ok()
}

fn collapse(value: &str) -> String {
    WHITESPACE.replace_all(value, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "TRANSKRIP AKADEMIK NRP / Nama 5025211001 / Budi Santoso \
        SKS Tempuh / SKS Lulus 144 / 140 Status Lulus Tahap: Persiapan \
        IF184101 Dasar Pemrograman 4 2021/Gs/A A \
        IF184102 Matematika Diskrit 3 2021/Gn/B AB \
        Tahap: Sarjana IF184201 Struktur Data 3 2022/Gs/A B \
        IP Tahap Persiapan : 3.80 Total Sks Tahap Persiapan : 7 \
        IP Tahap Sarjana : 3.00 Total Sks Tahap Sarjana : 3 IPK 3.45";

    #[test]
    fn parses_header_fields() {
        let student = parse_student(TRANSCRIPT).expect("header parses");
        assert_eq!(student.nrp, "5025211001");
        assert_eq!(student.name, "Budi Santoso");
        assert_eq!(student.status, "Lulus");
        assert_eq!(student.credits_attempted, 144);
        assert_eq!(student.credits_passed, 140);
        assert!((student.gpa - 3.45).abs() < 1e-9);
        assert!((student.preparatory_gpa - 3.80).abs() < 1e-9);
        assert_eq!(student.preparatory_credits, 7);
        assert!((student.bachelor_gpa - 3.00).abs() < 1e-9);
        assert_eq!(student.bachelor_credits, 3);
    }

    #[test]
    fn optional_phase_fields_default_to_zero() {
        let text = "NRP / Nama: 12345 / Jane Doe SKS Tempuh / SKS Lulus 120/118 \
            Status Aktif --- IPK 3.45";
        let student = parse_student(text).expect("header parses");
        assert_eq!(student.nrp, "12345");
        assert_eq!(student.name, "Jane Doe");
        assert_eq!(student.status, "Aktif");
        assert_eq!(student.preparatory_gpa, 0.0);
        assert_eq!(student.preparatory_credits, 0);
        assert_eq!(student.bachelor_gpa, 0.0);
        assert_eq!(student.bachelor_credits, 0);
    }

    #[test]
    fn each_mandatory_field_is_reported_when_missing() {
        let without_gpa = TRANSCRIPT.replace("IPK 3.45", "");
        assert_eq!(
            parse_student(&without_gpa),
            Err(ParseError::MissingField("gpa"))
        );

        let without_status = TRANSCRIPT.replace("Status", "Keterangan");
        assert_eq!(
            parse_student(&without_status),
            Err(ParseError::MissingField("status"))
        );

        let without_credits = TRANSCRIPT.replace("SKS Lulus", "SKS Diulang");
        assert_eq!(
            parse_student(&without_credits),
            Err(ParseError::MissingField("credits"))
        );

        let without_identity = TRANSCRIPT.replace("NRP", "NIM");
        assert_eq!(
            parse_student(&without_identity),
            Err(ParseError::MissingField("nrp/name"))
        );
    }

    #[test]
    fn parses_course_lines_with_terms() {
        let courses = parse_courses(TRANSCRIPT);
        assert_eq!(courses.len(), 3);

        assert_eq!(courses[0].code, "IF184101");
        assert_eq!(courses[0].name, "Dasar Pemrograman");
        assert_eq!(courses[0].credits, 4);
        assert_eq!(courses[0].year, 2021);
        assert_eq!(courses[0].term, Term::Odd);
        assert_eq!(courses[0].grade, "A");

        assert_eq!(courses[1].term, Term::Even);
        assert_eq!(courses[1].grade, "AB");
    }

    #[test]
    fn zero_credit_lines_are_skipped() {
        let text = TRANSCRIPT.replace("Dasar Pemrograman 4 2021", "Dasar Pemrograman 0 2021");
        let courses = parse_courses(&text);
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].code, "IF184102");
        assert!(courses.iter().all(|course| course.credits > 0));
    }

    #[test]
    fn phase_follows_bachelor_marker_position() {
        let courses = parse_courses(TRANSCRIPT);
        assert_eq!(courses[0].phase, Phase::Preparatory);
        assert_eq!(courses[1].phase, Phase::Preparatory);
        assert_eq!(courses[2].phase, Phase::Bachelor);
    }

    #[test]
    fn all_courses_are_preparatory_without_marker() {
        let text = TRANSCRIPT.replace("Tahap: Sarjana", "");
        let courses = parse_courses(&text);
        assert!(courses.iter().all(|course| course.phase == Phase::Preparatory));
    }

    #[test]
    fn transcript_without_courses_fails() {
        let text = "NRP / Nama 12345 / Jane Doe SKS Tempuh / SKS Lulus 120 / 118 \
            Status Aktif --- IPK 3.45";
        assert_eq!(parse_transcript(text), Err(ParseError::NoCourses));
    }

    #[test]
    fn full_transcript_parses() {
        let parsed = parse_transcript(TRANSCRIPT).expect("transcript parses");
        assert_eq!(parsed.student.nrp, "5025211001");
        assert_eq!(parsed.courses.len(), 3);
    }
}
