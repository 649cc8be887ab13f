// ========================================================================================
//                        Scoring Table Model & File Parsing
// ========================================================================================
//
// A scoring table is the per-disease list of weighted variants the matcher
// joins against. The on-disk form is the PGS Catalog harmonized scoring file:
// '#'-prefixed metadata lines followed by a tab-separated table whose exact
// column set varies between releases. Parsing is tolerant by design — a row
// missing its effect allele or carrying a non-numeric weight is a counted
// skip, never a fatal error — because published files do contain such rows.

use crate::types::{Chromosome, ScoringEntry};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("IO error reading scoring file: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error in scoring file: {0}")]
    Csv(#[from] csv::Error),
    #[error("Scoring file has no header row")]
    MissingHeader,
    #[error(
        "Scoring file header lacks required columns: found {found:?}, need effect_allele and effect_weight"
    )]
    MissingColumns { found: Vec<String> },
}

/// A read-only, per-disease scoring table. An empty table is valid and yields
/// an empty-but-valid aggregate downstream.
#[derive(Debug, Clone, Default)]
pub struct ScoringTable {
    entries: Vec<ScoringEntry>,
    /// Malformed data rows skipped during parsing.
    pub skipped_rows: usize,
}

impl ScoringTable {
    pub fn from_entries(entries: Vec<ScoringEntry>) -> Self {
        ScoringTable {
            entries,
            skipped_rows: 0,
        }
    }

    #[inline]
    pub fn entries(&self) -> &[ScoringEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a harmonized scoring file, transparently handling gzip.
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        let file = File::open(path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Self::from_reader(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Self::from_reader(BufReader::new(file))
        }
    }

    /// Parses the harmonized scoring format from any reader.
    pub fn from_reader<R: Read>(reader: BufReader<R>) -> Result<Self, ScoreError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ScoreError::MissingHeader);
        }
        let columns = ColumnLayout::from_headers(&headers)?;

        let mut entries = Vec::new();
        let mut skipped_rows = 0usize;

        for row in csv_reader.records() {
            let row = row?;
            match columns.parse_row(&row) {
                Some(entry) => entries.push(entry),
                None => skipped_rows += 1,
            }
        }

        if skipped_rows > 0 {
            log::warn!("Skipped {skipped_rows} malformed scoring rows ({} kept)", entries.len());
        }
        Ok(ScoringTable {
            entries,
            skipped_rows,
        })
    }
}

/// Resolved column indices for the fields the engine consumes. PGS files vary
/// in naming ("reference_allele" for "other_allele", "rsID" casing), so the
/// layout is resolved once per file.
struct ColumnLayout {
    rsid: Option<usize>,
    chr_name: Option<usize>,
    chr_position: Option<usize>,
    hm_chr: Option<usize>,
    hm_pos: Option<usize>,
    effect_allele: usize,
    other_allele: Option<usize>,
    effect_weight: usize,
}

impl ColumnLayout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ScoreError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        };

        let effect_allele = find(&["effect_allele"]);
        let effect_weight = find(&["effect_weight"]);
        let (Some(effect_allele), Some(effect_weight)) = (effect_allele, effect_weight) else {
            return Err(ScoreError::MissingColumns {
                found: headers.iter().map(str::to_string).collect(),
            });
        };

        Ok(ColumnLayout {
            rsid: find(&["rsID", "rsid"]),
            chr_name: find(&["chr_name"]),
            chr_position: find(&["chr_position"]),
            hm_chr: find(&["hm_chr"]),
            hm_pos: find(&["hm_pos"]),
            effect_allele,
            other_allele: find(&["other_allele", "reference_allele"]),
            effect_weight,
        })
    }

    /// Parses one data row; `None` marks a counted skip.
    fn parse_row(&self, row: &csv::StringRecord) -> Option<ScoringEntry> {
        let field = |idx: Option<usize>| -> Option<&str> {
            let value = row.get(idx?)?.trim();
            (!value.is_empty()).then_some(value)
        };

        let effect_allele = field(Some(self.effect_allele))?.to_ascii_uppercase();
        let effect_weight: f64 = field(Some(self.effect_weight))?.parse().ok()?;
        if !effect_weight.is_finite() {
            return None;
        }

        // Rows with an inferable other allele missing are kept: dosage
        // resolution degrades to effect-allele-only containment and may still
        // reject them, but that is a per-pair decision, not a parse decision.
        let other_allele = field(self.other_allele)
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();

        let chromosome = field(self.chr_name).and_then(parse_chromosome);
        let position = field(self.chr_position).and_then(|p| p.parse::<u32>().ok());

        // Harmonized coordinates fall back to the originals when blank, the
        // same fill-in the harmonized releases themselves document.
        let harmonized_chromosome = field(self.hm_chr)
            .and_then(parse_chromosome)
            .or(chromosome);
        let harmonized_position = field(self.hm_pos)
            .and_then(|p| p.parse::<u32>().ok())
            .or(position);

        Some(ScoringEntry {
            variant_id: field(self.rsid).map(str::to_string),
            chromosome,
            position,
            harmonized_chromosome,
            harmonized_position,
            effect_allele,
            other_allele,
            effect_weight,
        })
    }
}

/// Chromosome parsing for scoring-file coordinates. Some catalog releases
/// encode the allosomes numerically (23/24/25 for X/Y/MT); consumer exports
/// never do, so the mapping stays local to this parser.
fn parse_chromosome(label: &str) -> Option<Chromosome> {
    match label.trim() {
        "23" => Some(Chromosome::X),
        "24" => Some(Chromosome::Y),
        "25" => Some(Chromosome::MT),
        other => Chromosome::parse(other).ok(),
    }
}
