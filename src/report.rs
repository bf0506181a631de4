use std::fmt::Write;
use std::io;

use chrono::{DateTime, Utc};

use crate::models::{AnalyticsRow, LoadStats};

pub fn build_report(generated_at: DateTime<Utc>, rows: &[AnalyticsRow]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Course Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} across {} course offerings",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        rows.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Lowest Pass Rates");

    let mut ranked: Vec<&AnalyticsRow> = rows.iter().collect();
    ranked.sort_by(|a, b| {
        a.pass_percentage
            .partial_cmp(&b.pass_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.enrollment.cmp(&a.enrollment))
    });

    if ranked.is_empty() {
        let _ = writeln!(output, "No course analytics recorded yet.");
    } else {
        for row in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} {} ({} {}): {:.1}% passed of {} (avg weight {:.2})",
                row.course_code,
                row.course_name,
                row.year,
                row.term,
                row.pass_percentage,
                row.enrollment,
                row.average_weight
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");

    if rows.is_empty() {
        let _ = writeln!(output, "No course analytics recorded yet.");
    } else {
        let _ = writeln!(output, "| Course | Term | A | AB | B | BC | C | D | E |");
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for row in rows {
            let _ = writeln!(
                output,
                "| {} | {}/{} | {} | {} | {} | {} | {} | {} | {} |",
                row.course_code,
                row.year,
                row.term,
                row.grade_a,
                row.grade_ab,
                row.grade_b,
                row.grade_bc,
                row.grade_c,
                row.grade_d,
                row.grade_e
            );
        }
    }

    output
}

pub fn summarize_load(stats: &LoadStats) -> String {
    format!(
        "Processed: {}, Failed: {} ({} new facts, {} already loaded, {} courses skipped, {} analytics rows)",
        stats.processed,
        stats.failed,
        stats.facts_inserted,
        stats.facts_existing,
        stats.courses_skipped,
        stats.analytics_rows
    )
}

pub fn write_csv<W: io::Write>(writer: W, rows: &[AnalyticsRow]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Term;

    fn row(code: &str, pass_percentage: f64, enrollment: i32) -> AnalyticsRow {
        AnalyticsRow {
            course_code: code.to_string(),
            course_name: "Struktur Data".to_string(),
            year: 2021,
            term: Term::Odd,
            average_weight: 3.0,
            pass_percentage,
            enrollment,
            grade_a: 1,
            grade_ab: 0,
            grade_b: 1,
            grade_bc: 0,
            grade_c: 0,
            grade_d: 0,
            grade_e: 0,
        }
    }

    #[test]
    fn report_ranks_lowest_pass_rates_first() {
        let rows = vec![row("IF184101", 100.0, 2), row("IF184102", 50.0, 2)];
        let report = build_report(Utc::now(), &rows);

        let low = report.find("IF184102 Struktur Data").expect("low row listed");
        let high = report.find("IF184101 Struktur Data").expect("high row listed");
        assert!(low < high);
        assert!(report.contains("| IF184101 | 2021/odd | 1 | 0 | 1 |"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(Utc::now(), &[]);
        assert!(report.contains("No course analytics recorded yet."));
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[row("IF184101", 100.0, 2)]).expect("csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let mut lines = text.lines();
        assert!(lines
            .next()
            .expect("header")
            .starts_with("course_code,course_name,year,term,"));
        assert!(lines.next().expect("row").starts_with("IF184101,Struktur Data,2021,odd,"));
    }

    #[test]
    fn load_summary_mentions_counts() {
        let mut stats = LoadStats::new();
        stats.processed = 3;
        stats.failed = 1;
        assert!(summarize_load(&stats).starts_with("Processed: 3, Failed: 1"));
    }
}
