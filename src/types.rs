// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only
// are used in one file.

use serde::Serialize;
use std::fmt;

/// The two genome reference builds the engine understands.
///
/// Consumer arrays overwhelmingly ship GRCh37 coordinates; harmonized scoring
/// files exist for both builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GenomeBuild {
    Build37,
    Build38,
}

impl GenomeBuild {
    /// Parses a build label, accepting the common aliases
    /// (GRCh37/hg19/b37/build37 and GRCh38/hg38/b38/build38).
    pub fn parse(label: &str) -> Result<Self, String> {
        let trimmed = label.trim();
        let lower = trimmed.to_ascii_lowercase();
        match lower.as_str() {
            "grch37" | "hg19" | "b37" | "build37" | "37" => Ok(GenomeBuild::Build37),
            "grch38" | "hg38" | "b38" | "build38" | "38" => Ok(GenomeBuild::Build38),
            _ => Err(format!(
                "Invalid genome build '{trimmed}'. Expected GRCh37/hg19 or GRCh38/hg38."
            )),
        }
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenomeBuild::Build37 => write!(f, "GRCh37"),
            GenomeBuild::Build38 => write!(f, "GRCh38"),
        }
    }
}

/// A canonical chromosome, encoded compactly: 1-22, X=23, Y=24, MT=25.
///
/// All parsing funnels through [`Chromosome::parse`], so any chromosome held by
/// a `Chromosome` value is already canonical: no "chr" prefix, "M" folded into
/// "MT". This makes positional matching a plain key comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Chromosome(u8);

impl Chromosome {
    pub const X: Chromosome = Chromosome(23);
    pub const Y: Chromosome = Chromosome(24);
    pub const MT: Chromosome = Chromosome(25);

    /// Parses a chromosome label, stripping any "chr" prefix and folding
    /// "M" into "MT". Rejects anything outside 1-22/X/Y/MT.
    pub fn parse(label: &str) -> Result<Self, String> {
        let mut trimmed = label.trim();

        // get() rather than a length-guarded slice: a multi-byte character
        // straddling index 3 must fall through to the error, not panic.
        if trimmed
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("chr"))
        {
            trimmed = &trimmed[3..];
        }

        if trimmed.eq_ignore_ascii_case("X") {
            return Ok(Chromosome::X);
        }
        if trimmed.eq_ignore_ascii_case("Y") {
            return Ok(Chromosome::Y);
        }
        if trimmed.eq_ignore_ascii_case("MT") || trimmed.eq_ignore_ascii_case("M") {
            return Ok(Chromosome::MT);
        }

        match trimmed.parse::<u8>() {
            Ok(n) if (1..=22).contains(&n) => Ok(Chromosome(n)),
            _ => Err(format!(
                "Invalid chromosome '{}'. Expected 1-22, 'X', 'Y', 'MT', or a 'chr' prefix.",
                label.trim()
            )),
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            23 => write!(f, "X"),
            24 => write!(f, "Y"),
            25 => write!(f, "MT"),
            n => write!(f, "{n}"),
        }
    }
}

impl Serialize for Chromosome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The primitive key used for every positional join: (chromosome, 1-based position).
pub type VariantKey = (Chromosome, u32);

/// One genotyped variant from a consumer test export. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeRecord {
    /// External identifier (rsID or vendor ID); absent for unnamed VCF sites.
    pub variant_id: Option<String>,
    pub chromosome: Chromosome,
    /// 1-based position in `build` coordinates.
    pub position: u32,
    /// Uppercase nucleotide string, length >= 1.
    pub allele1: String,
    pub allele2: String,
    pub build: GenomeBuild,
}

impl GenotypeRecord {
    #[inline]
    pub fn key(&self) -> VariantKey {
        (self.chromosome, self.position)
    }
}

/// One row of a disease scoring table, as supplied by the scoring-file
/// collaborator. Coordinates may exist in two systems: the publication's
/// original build and the harmonized target build.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringEntry {
    pub variant_id: Option<String>,
    /// Original-build coordinates, when the file carries them.
    pub chromosome: Option<Chromosome>,
    pub position: Option<u32>,
    /// Harmonized coordinates, preferred for matching when present.
    pub harmonized_chromosome: Option<Chromosome>,
    pub harmonized_position: Option<u32>,
    pub effect_allele: String,
    pub other_allele: String,
    /// Finite beta or log-odds weight.
    pub effect_weight: f64,
}

impl ScoringEntry {
    /// The key this entry should be matched under: harmonized coordinates when
    /// present, original coordinates otherwise, `None` when the entry carries
    /// no usable coordinates at all.
    #[inline]
    pub fn match_key(&self) -> Option<VariantKey> {
        match (self.harmonized_chromosome, self.harmonized_position) {
            (Some(chr), Some(pos)) => Some((chr, pos)),
            _ => match (self.chromosome, self.position) {
                (Some(chr), Some(pos)) => Some((chr, pos)),
                _ => None,
            },
        }
    }
}

/// A `#[repr(transparent)]` wrapper for an effect-allele count.
///
/// A dosage is always 0, 1, or 2; unresolved genotypes are represented by the
/// absence of a value (`Option<EffectAlleleDosage>`), never by a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct EffectAlleleDosage(u8);

impl EffectAlleleDosage {
    /// Creates a new dosage, asserting the value is valid in debug builds.
    #[inline]
    pub fn new(value: u8) -> Self {
        debug_assert!(value <= 2, "Invalid dosage value created: {value}");
        Self(value)
    }

    #[inline]
    pub fn count(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

/// The ephemeral product of one successful match attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedPair {
    pub dosage: EffectAlleleDosage,
    pub effect_weight: f64,
}

/// The reduction of all matched pairs for one disease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// Sum of dosage x effect_weight over resolved matches.
    pub raw_score: f64,
    /// Number of scoring entries that resolved to a dosage.
    pub matched_count: usize,
    /// Size of the scoring table, not just attempted matches, so that
    /// `match_rate` is a true coverage metric.
    pub total_count: usize,
    /// matched_count / total_count as a fraction in [0,1]; 0 for an empty table.
    pub match_rate: f64,
}

impl AggregateResult {
    /// The empty-but-valid result: an empty scoring table is not an error.
    pub fn empty() -> Self {
        AggregateResult {
            raw_score: 0.0,
            matched_count: 0,
            total_count: 0,
            match_rate: 0.0,
        }
    }
}

/// Ancestry-specific reference distribution parameters. Static, loaded once,
/// never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationParams {
    pub code: &'static str,
    pub name: &'static str,
    pub mean: f64,
    /// Always > 0.
    pub sd: f64,
}

/// Discrete risk label over percentile bands. The five bands partition
/// [0,100] contiguously with boundaries at 10, 25, 75, 90 (lower-inclusive,
/// upper-exclusive, final band closed at 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskCategory {
    VeryLow,
    Low,
    Average,
    Elevated,
    High,
}

impl RiskCategory {
    /// Band lookup. Input outside [0,100] is clamped, so this is total over
    /// all finite values.
    pub fn from_percentile(percentile: f64) -> Self {
        let p = percentile.clamp(0.0, 100.0);
        if p < 10.0 {
            RiskCategory::VeryLow
        } else if p < 25.0 {
            RiskCategory::Low
        } else if p < 75.0 {
            RiskCategory::Average
        } else if p < 90.0 {
            RiskCategory::Elevated
        } else {
            RiskCategory::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::VeryLow => "Very Low",
            RiskCategory::Low => "Low",
            RiskCategory::Average => "Average",
            RiskCategory::Elevated => "Elevated",
            RiskCategory::High => "High",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The population-normalized outcome for one disease.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskResult {
    pub zscore: f64,
    /// Always in [0,100].
    pub percentile: f64,
    pub category: RiskCategory,
}
