// ========================================================================================
//                         The Per-Disease Batch Engine
// ========================================================================================
//
// One disease's computation is a pure pipeline over immutable inputs: hash-join
// match, weighted aggregation, population normalization. The batch fans the
// independent per-disease computations out across a rayon pool; the genotype
// record set is shared read-only and nothing mutates across tasks. A disease
// whose scoring table is unavailable fails alone — siblings always run to
// completion.

use crate::dosage::aggregate;
use crate::matcher::match_variants;
use crate::normalize::{normalize, NormalizeError};
use crate::scoring::ScoringTable;
use crate::types::{AggregateResult, GenotypeRecord, RiskResult};
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("Scoring table unavailable for '{disease}': {reason}")]
    TableUnavailable { disease: String, reason: String },
}

/// The full per-disease outcome. `risk` is absent when no variants matched:
/// an aggregate over nothing is reportable, a percentile over nothing is not.
#[derive(Debug, Clone, Serialize)]
pub struct DiseaseRisk {
    pub disease: String,
    pub aggregate: AggregateResult,
    pub risk: Option<RiskResult>,
}

/// One row of a batch report: either a computed risk or an explicit error
/// marker with neutral default values. Never both.
#[derive(Debug, Clone, Serialize)]
pub struct DiseaseReport {
    pub disease: String,
    pub aggregate: AggregateResult,
    pub risk: Option<RiskResult>,
    pub error: Option<String>,
}

impl DiseaseReport {
    fn from_risk(risk: DiseaseRisk) -> Self {
        DiseaseReport {
            disease: risk.disease,
            aggregate: risk.aggregate,
            risk: risk.risk,
            error: None,
        }
    }

    /// The error marker row: neutral defaults, explicit reason.
    fn from_error(disease: String, error: &EngineError) -> Self {
        DiseaseReport {
            disease,
            aggregate: AggregateResult::empty(),
            risk: None,
            error: Some(error.to_string()),
        }
    }
}

/// An entry in the batch's elevated-risk summary.
#[derive(Debug, Clone, Serialize)]
pub struct ElevatedRisk {
    pub disease: String,
    pub percentile: f64,
    pub category: String,
}

/// The result of a whole batch run: per-disease reports in input order plus
/// the headline summary.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub ancestry: String,
    pub reports: Vec<DiseaseReport>,
    /// Diseases at or above the 75th percentile, highest first, capped at 5.
    pub elevated_risks: Vec<ElevatedRisk>,
    pub diseases_analyzed: usize,
    pub diseases_with_data: usize,
}

/// Computes one disease end to end: match, aggregate, normalize.
///
/// A table that matched nothing yields the aggregate with `risk: None`
/// (insufficient data) rather than an error; an empty table behaves the same
/// way through the empty-but-valid aggregate.
pub fn compute_disease(
    records: &[GenotypeRecord],
    table: &ScoringTable,
    disease: &str,
    ancestry: &str,
) -> Result<DiseaseRisk, EngineError> {
    let outcome = match_variants(records, table);
    let aggregate = aggregate(&outcome.pairs, table.len());

    let risk = if aggregate.matched_count > 0 {
        Some(normalize(aggregate.raw_score, ancestry)?)
    } else {
        log::warn!("No variants matched for '{disease}'; risk withheld as insufficient data");
        None
    };

    log::info!(
        "{disease}: matched {}/{} entries (rate {:.1}%), raw score {:.4}",
        aggregate.matched_count,
        aggregate.total_count,
        aggregate.match_rate * 100.0,
        aggregate.raw_score
    );
    Ok(DiseaseRisk {
        disease: disease.to_string(),
        aggregate,
        risk,
    })
}

/// One disease's input to a batch: the table resolution is a `Result` so that
/// an unavailable table (missing file, parse failure upstream) flows into the
/// batch as data instead of aborting it.
pub struct DiseaseInput {
    pub disease: String,
    pub table: Result<ScoringTable, String>,
}

/// Runs the batch across a rayon worker pool, one task per disease.
///
/// The ancestry code is validated once up front so an unknown code fails the
/// whole call (there is nothing meaningful to isolate), while per-disease
/// failures are captured in their report rows and never cancel siblings.
pub fn compute_batch(
    records: &[GenotypeRecord],
    inputs: Vec<DiseaseInput>,
    ancestry: &str,
) -> Result<BatchReport, EngineError> {
    // Fail fast on an unusable ancestry code before spawning any work.
    normalize(0.0, ancestry)?;

    let reports: Vec<DiseaseReport> = inputs
        .into_par_iter()
        .map(|input| match input.table {
            Ok(table) => match compute_disease(records, &table, &input.disease, ancestry) {
                Ok(risk) => DiseaseReport::from_risk(risk),
                Err(err) => DiseaseReport::from_error(input.disease, &err),
            },
            Err(reason) => {
                let err = EngineError::TableUnavailable {
                    disease: input.disease.clone(),
                    reason,
                };
                log::warn!("{err}");
                DiseaseReport::from_error(input.disease, &err)
            }
        })
        .collect();

    let elevated_risks: Vec<ElevatedRisk> = reports
        .iter()
        .filter_map(|report| {
            let risk = report.risk.as_ref()?;
            (risk.percentile >= 75.0).then(|| ElevatedRisk {
                disease: report.disease.clone(),
                percentile: risk.percentile,
                category: risk.category.label().to_string(),
            })
        })
        .sorted_by(|a, b| b.percentile.total_cmp(&a.percentile))
        .take(5)
        .collect();

    let diseases_analyzed = reports.len();
    let diseases_with_data = reports.iter().filter(|r| r.risk.is_some()).count();

    Ok(BatchReport {
        ancestry: ancestry.to_string(),
        reports,
        elevated_risks,
        diseases_analyzed,
        diseases_with_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chromosome, GenomeBuild, RiskCategory, ScoringEntry};
    use approx::assert_relative_eq;

    fn record(id: &str, chrom: &str, pos: u32, a1: &str, a2: &str) -> GenotypeRecord {
        GenotypeRecord {
            variant_id: Some(id.to_string()),
            chromosome: Chromosome::parse(chrom).unwrap(),
            position: pos,
            allele1: a1.into(),
            allele2: a2.into(),
            build: GenomeBuild::Build37,
        }
    }

    fn entry(chrom: &str, pos: u32, eff: &str, oth: &str, weight: f64) -> ScoringEntry {
        ScoringEntry {
            variant_id: None,
            chromosome: Some(Chromosome::parse(chrom).unwrap()),
            position: Some(pos),
            harmonized_chromosome: None,
            harmonized_position: None,
            effect_allele: eff.into(),
            other_allele: oth.into(),
            effect_weight: weight,
        }
    }

    #[test]
    fn single_disease_runs_end_to_end() {
        let records = vec![
            record("rs1", "1", 100, "A", "A"),
            record("rs2", "2", 200, "A", "G"),
        ];
        let table = ScoringTable::from_entries(vec![
            entry("1", 100, "A", "G", 0.5),
            entry("2", 200, "A", "G", 0.25),
        ]);

        let risk = compute_disease(&records, &table, "cad", "EUR").unwrap();
        // 2 * 0.5 + 1 * 0.25
        assert_relative_eq!(risk.aggregate.raw_score, 1.25, epsilon = 1e-12);
        assert_eq!(risk.aggregate.matched_count, 2);

        let result = risk.risk.unwrap();
        assert_relative_eq!(result.zscore, 1.25, epsilon = 1e-12);
        assert!(result.percentile > 75.0);
    }

    #[test]
    fn zero_matches_withholds_risk_without_error() {
        let records = vec![record("rs1", "1", 100, "A", "A")];
        let table = ScoringTable::from_entries(vec![entry("9", 900, "C", "T", 1.0)]);

        let risk = compute_disease(&records, &table, "cad", "EUR").unwrap();
        assert_eq!(risk.aggregate.matched_count, 0);
        assert!(risk.risk.is_none());
    }

    #[test]
    fn empty_table_is_a_valid_degenerate_result() {
        let records = vec![record("rs1", "1", 100, "A", "A")];
        let table = ScoringTable::default();

        let risk = compute_disease(&records, &table, "cad", "EUR").unwrap();
        assert_eq!(risk.aggregate, AggregateResult::empty());
        assert!(risk.risk.is_none());
    }

    #[test]
    fn unknown_ancestry_fails_the_call() {
        let records = vec![record("rs1", "1", 100, "A", "A")];
        let table = ScoringTable::from_entries(vec![entry("1", 100, "A", "G", 0.5)]);
        let err = compute_disease(&records, &table, "cad", "XYZ").unwrap_err();
        assert!(matches!(err, EngineError::Normalize(_)));
    }

    #[test]
    fn batch_isolates_per_disease_failures() {
        let records = vec![record("rs1", "1", 100, "A", "A")];
        let inputs = vec![
            DiseaseInput {
                disease: "cad".into(),
                table: Ok(ScoringTable::from_entries(vec![entry(
                    "1", 100, "A", "G", 2.0,
                )])),
            },
            DiseaseInput {
                disease: "t2d".into(),
                table: Err("scoring file not found".into()),
            },
        ];

        let batch = compute_batch(&records, inputs, "EUR").unwrap();
        assert_eq!(batch.diseases_analyzed, 2);
        assert_eq!(batch.diseases_with_data, 1);

        let cad = batch.reports.iter().find(|r| r.disease == "cad").unwrap();
        assert!(cad.error.is_none());
        assert!(cad.risk.is_some());

        let t2d = batch.reports.iter().find(|r| r.disease == "t2d").unwrap();
        assert!(t2d.risk.is_none());
        assert_eq!(t2d.aggregate, AggregateResult::empty());
        assert!(t2d.error.as_deref().unwrap().contains("not found"));
    }

    #[test]
    fn elevated_summary_ranks_by_percentile() {
        let records = vec![
            record("rs1", "1", 100, "A", "A"),
            record("rs2", "2", 200, "T", "T"),
        ];
        let strong = ScoringTable::from_entries(vec![entry("1", 100, "A", "G", 3.0)]);
        let stronger = ScoringTable::from_entries(vec![entry("2", 200, "T", "C", 4.0)]);
        let quiet = ScoringTable::from_entries(vec![entry("1", 100, "G", "A", 0.0)]);

        let inputs = vec![
            DiseaseInput { disease: "a".into(), table: Ok(strong) },
            DiseaseInput { disease: "b".into(), table: Ok(stronger) },
            DiseaseInput { disease: "c".into(), table: Ok(quiet) },
        ];
        let batch = compute_batch(&records, inputs, "EUR").unwrap();

        assert_eq!(batch.elevated_risks.len(), 2);
        assert_eq!(batch.elevated_risks[0].disease, "b");
        assert_eq!(batch.elevated_risks[1].disease, "a");
        assert_eq!(batch.elevated_risks[0].category, RiskCategory::High.label());
    }

    #[test]
    fn batch_rejects_unknown_ancestry_up_front() {
        let result = compute_batch(&[], vec![], "klingon");
        assert!(result.is_err());
    }
}
