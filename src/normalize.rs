// ========================================================================================
//                             Population Normalization
// ========================================================================================
//
// Maps a raw weighted sum onto an ancestry-specific reference distribution:
// z-score, standard-normal percentile, and the discrete risk band. Pure and
// total for every finite raw score and every recognized ancestry code.

use crate::catalog::population_params;
use crate::types::{RiskCategory, RiskResult};
use statrs::distribution::{ContinuousCDF, Normal};
use std::sync::LazyLock;
use thiserror::Error;

// Unit normal, shared by every call; construction cannot fail for these
// parameters.
static STANDARD_NORMAL: LazyLock<Normal> =
    LazyLock::new(|| Normal::new(0.0, 1.0).expect("unit normal parameters are valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error(
        "Unknown ancestry '{0}'. Expected one of EUR, AFR, EAS, SAS, AMR or a documented alias."
    )]
    UnknownAncestry(String),
}

/// Normalizes a raw aggregate score against the reference distribution for
/// `ancestry` (exact code or common alias).
///
/// percentile = standard-normal CDF(zscore) x 100, clamped to [0,100]; the
/// category comes from the contiguous five-band partition with boundaries at
/// 10/25/75/90.
pub fn normalize(raw_score: f64, ancestry: &str) -> Result<RiskResult, NormalizeError> {
    let params = population_params(ancestry)
        .ok_or_else(|| NormalizeError::UnknownAncestry(ancestry.to_string()))?;

    let zscore = (raw_score - params.mean) / params.sd;
    let percentile = (STANDARD_NORMAL.cdf(zscore) * 100.0).clamp(0.0, 100.0);

    Ok(RiskResult {
        zscore,
        percentile,
        category: RiskCategory::from_percentile(percentile),
    })
}
