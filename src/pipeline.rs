use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::analytics;
use crate::dimension::DimensionResolver;
use crate::error::{EtlError, ExtractError};
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::models::{LoadStats, ParsedTranscript};
use crate::normalize::Normalizer;
use crate::parser::parse_transcript;
use crate::reconcile::{reconcile_course, FactOutcome};
use crate::semester::refresh_snapshots;
use crate::store::{Warehouse, WarehouseTx};

/// What one committed document contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub facts_inserted: usize,
    pub facts_existing: usize,
    pub courses_skipped: usize,
    pub semesters: usize,
}

pub struct Pipeline<'a> {
    warehouse: &'a dyn Warehouse,
    extractor: &'a dyn TextExtractor,
    normalizer: Normalizer,
    resolver: DimensionResolver,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        warehouse: &'a dyn Warehouse,
        extractor: &'a dyn TextExtractor,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            warehouse,
            extractor,
            normalizer,
            resolver: DimensionResolver::new(),
        }
    }

    /// Extracts, parses and loads one document as a single transaction.
    pub async fn process_document(&mut self, path: &Path) -> Result<DocumentReport, EtlError> {
        let extraction = |source| EtlError::Extraction {
            path: path.to_path_buf(),
            source,
        };
        let pages = self.extractor.extract(path).map_err(extraction)?;
        let text = self.normalizer.normalize_pages(&pages);
        if text.trim().is_empty() {
            return Err(extraction(ExtractError::Empty));
        }

        let parsed = parse_transcript(&text)?;
        self.load_transcript(&parsed).await
    }

    /// Writes a parsed transcript. Any store failure rolls back every write
    /// made for it.
    pub async fn load_transcript(
        &mut self,
        parsed: &ParsedTranscript,
    ) -> Result<DocumentReport, EtlError> {
        let mut tx = self.warehouse.begin().await?;

        match load_into(tx.as_mut(), &mut self.resolver, parsed).await {
            Ok(report) => match tx.commit().await {
                Ok(()) => {
                    self.resolver.commit();
                    Ok(report)
                }
                Err(err) => {
                    self.resolver.discard();
                    Err(err.into())
                }
            },
            Err(err) => {
                self.resolver.discard();
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Loads every transcript document in `dir`. Individual document failures
    /// are counted, never propagated.
    pub async fn process_folder(&mut self, dir: &Path) -> Result<LoadStats, EtlError> {
        let mut stats = LoadStats::new();

        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|err| {
                EtlError::Setup(format!("cannot create input folder {}: {err}", dir.display()))
            })?;
            info!(
                folder = %dir.display(),
                "input folder created; add transcript documents to it and run again"
            );
            return Ok(stats);
        }

        let documents = list_documents(dir)?;
        info!(count = documents.len(), folder = %dir.display(), "found transcript documents");

        for path in documents {
            info!(file = %path.display(), "processing");
            match self.process_document(&path).await {
                Ok(report) => {
                    stats.processed += 1;
                    stats.facts_inserted += report.facts_inserted;
                    stats.facts_existing += report.facts_existing;
                    stats.courses_skipped += report.courses_skipped;
                    info!(
                        file = %path.display(),
                        new_facts = report.facts_inserted,
                        existing_facts = report.facts_existing,
                        semesters = report.semesters,
                        "loaded"
                    );
                }
                Err(err) => {
                    stats.failed += 1;
                    error!(file = %path.display(), error = %err, "document failed");
                }
            }
        }

        info!(
            processed = stats.processed,
            failed = stats.failed,
            "processing complete"
        );
        Ok(stats)
    }

    /// Folder load followed by the course analytics recompute. A failed
    /// recompute is logged and leaves the committed documents in place.
    pub async fn run_batch(&mut self, dir: &Path) -> Result<LoadStats, EtlError> {
        let mut stats = self.process_folder(dir).await?;
        match analytics::recompute(self.warehouse).await {
            Ok(rows) => stats.analytics_rows = rows,
            Err(err) => error!(error = %err, "course analytics recompute failed"),
        }
        Ok(stats)
    }
}

async fn load_into(
    tx: &mut dyn WarehouseTx,
    resolver: &mut DimensionResolver,
    parsed: &ParsedTranscript,
) -> Result<DocumentReport, EtlError> {
    let student_id = tx.upsert_student(&parsed.student).await?;
    let mut report = DocumentReport::default();

    for course in &parsed.courses {
        match reconcile_course(tx, resolver, student_id, course).await {
            Ok(FactOutcome::Inserted) => report.facts_inserted += 1,
            Ok(FactOutcome::AlreadyLoaded) => report.facts_existing += 1,
            Err(EtlError::UnknownGrade(letter)) => {
                warn!(
                    nrp = %parsed.student.nrp,
                    code = %course.code,
                    grade = %letter,
                    "skipping course record with unknown grade"
                );
                report.courses_skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    report.semesters = refresh_snapshots(tx, student_id).await?;
    Ok(report)
}

/// Supported documents directly inside `dir`, sorted by file name.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, EtlError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| EtlError::Setup(format!("cannot read {}: {err}", dir.display())))?;

    let mut documents: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && DocumentExtractor::supports(path))
        .collect();
    documents.sort();
    Ok(documents)
}
