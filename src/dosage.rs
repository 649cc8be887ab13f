// ========================================================================================
//                          Dosage Resolution & Aggregation
// ========================================================================================
//
// This module converts a (genotype, scoring-entry) pair into an effect-allele
// count and reduces resolved pairs to a single weighted sum. Strand ambiguity
// is resolved here: a genotype read from the complementary strand matches the
// scoring alleles only after complementation, and the dosage is then counted
// against the complemented effect allele.

use crate::types::{AggregateResult, EffectAlleleDosage, MatchedPair};

/// Returns the reverse-strand rendering of an allele, complementing every base
/// (A<->T, C<->G). `None` if any base is not a plain nucleotide, in which case
/// no strand-flip rescue is possible.
pub fn complement(allele: &str) -> Option<String> {
    let mut out = String::with_capacity(allele.len());
    for base in allele.chars() {
        out.push(match base.to_ascii_uppercase() {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            _ => return None,
        });
    }
    Some(out)
}

/// True for the missing-data sentinels consumer exports use: an empty string
/// or any run of '-', '0', or 'N' ("--", "00", "NN", ...).
fn is_missing(allele: &str) -> bool {
    allele.is_empty() || allele.chars().all(|c| matches!(c, '-' | '0' | 'N' | 'n'))
}

/// Counts `effect` among the two genotype alleles, provided both alleles are
/// drawn from the scoring pair {effect, other}. A homozygous genotype is a
/// single repeated allele and still counts twice.
fn count_effect(a1: &str, a2: &str, effect: &str, other: &str) -> Option<EffectAlleleDosage> {
    let consistent = |a: &str| a == effect || a == other;
    if !consistent(a1) || !consistent(a2) {
        return None;
    }
    let count = u8::from(a1 == effect) + u8::from(a2 == effect);
    Some(EffectAlleleDosage::new(count))
}

/// Computes the effect-allele dosage (0, 1, or 2) for one genotype against one
/// scoring entry, or `None` when the pair is unresolvable.
///
/// Resolution order:
/// 1. missing-data sentinels in either genotype allele -> unresolved;
/// 2. direct match against {effect_allele, other_allele};
/// 3. strand-flip rescue: match against the complemented scoring alleles;
/// 4. otherwise unresolved (likely multiallelic or a data error).
pub fn compute_dosage(
    allele1: &str,
    allele2: &str,
    effect_allele: &str,
    other_allele: &str,
) -> Option<EffectAlleleDosage> {
    let a1 = allele1.trim().to_ascii_uppercase();
    let a2 = allele2.trim().to_ascii_uppercase();
    if is_missing(&a1) || is_missing(&a2) {
        return None;
    }

    let eff = effect_allele.trim().to_ascii_uppercase();
    let oth = other_allele.trim().to_ascii_uppercase();

    if let Some(dosage) = count_effect(&a1, &a2, &eff, &oth) {
        return Some(dosage);
    }

    let eff_comp = complement(&eff)?;
    let oth_comp = complement(&oth)?;
    count_effect(&a1, &a2, &eff_comp, &oth_comp)
}

/// Reduces resolved matches to a single weighted sum.
///
/// `total_count` is the size of the scoring table, not the number of attempted
/// matches, so `match_rate` reports coverage of the published score. An empty
/// table yields the all-zero result with no error raised.
pub fn aggregate(matches: &[MatchedPair], total_count: usize) -> AggregateResult {
    if total_count == 0 {
        return AggregateResult::empty();
    }

    let raw_score: f64 = matches
        .iter()
        .map(|pair| pair.dosage.as_f64() * pair.effect_weight)
        .sum();

    let matched_count = matches.len();
    AggregateResult {
        raw_score,
        matched_count,
        total_count,
        match_rate: matched_count as f64 / total_count as f64,
    }
}
