// ========================================================================================
//                          The Variant Matching Hash Join
// ========================================================================================
//
// Joins a genotype record set to a scoring table already expressed in the same
// reference build. The join is an explicit hash index over scoring entries,
// probed once per genotype record, so matching stays O(n + m) regardless of
// table size. Each scoring entry resolves at most once; probing follows input
// order, which makes the whole operation deterministic and idempotent.

use crate::dosage::compute_dosage;
use crate::scoring::ScoringTable;
use crate::types::{GenotypeRecord, MatchedPair, VariantKey};
use ahash::AHashMap;

/// Which join key a table was matched under. Exactly one strategy applies per
/// scoring table, selected by which fields the table populates: coordinates
/// when any entry carries them, rsIDs as the documented fallback for tables
/// that ship none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Coordinate,
    VariantId,
}

/// The set of resolved pairs plus the attempted-vs-resolved bookkeeping the
/// aggregation stage reports.
#[derive(Debug)]
pub struct MatchOutcome {
    pub pairs: Vec<MatchedPair>,
    /// Scoring entries probed by at least one genotype record.
    pub attempted: usize,
    /// Scoring entries that resolved to a dosage. Equals `pairs.len()`.
    pub resolved: usize,
    pub strategy: MatchStrategy,
}

/// Matches genotype records against one scoring table.
///
/// Index construction prefers harmonized coordinates, falling back to the
/// original coordinates per entry (see [`crate::types::ScoringEntry::match_key`]).
/// A coordinate hit that fails dosage resolution is dropped from the matches
/// but still counted as attempted. An empty table yields an empty outcome,
/// never an error.
pub fn match_variants(records: &[GenotypeRecord], table: &ScoringTable) -> MatchOutcome {
    let entries = table.entries();

    let has_coordinates = entries.iter().any(|e| e.match_key().is_some());
    let strategy = if has_coordinates || entries.is_empty() {
        MatchStrategy::Coordinate
    } else {
        MatchStrategy::VariantId
    };

    // Index scoring entries by join key. Duplicate keys are legitimate
    // (multiallelic sites published as separate rows), so each key holds the
    // list of entry indices.
    let mut index: AHashMap<IndexKey, Vec<u32>> = AHashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let key = match strategy {
            MatchStrategy::Coordinate => entry.match_key().map(IndexKey::Position),
            MatchStrategy::VariantId => entry
                .variant_id
                .as_deref()
                .map(|id| IndexKey::Id(id.to_string())),
        };
        if let Some(key) = key {
            index.entry(key).or_default().push(i as u32);
        }
    }

    let mut resolved_entries = vec![false; entries.len()];
    let mut attempted_entries = vec![false; entries.len()];
    let mut pairs = Vec::new();

    for record in records {
        let key = match strategy {
            MatchStrategy::Coordinate => IndexKey::Position(record.key()),
            MatchStrategy::VariantId => match record.variant_id.as_deref() {
                Some(id) => IndexKey::Id(id.to_string()),
                None => continue,
            },
        };
        let Some(entry_indices) = index.get(&key) else {
            continue;
        };

        for &entry_idx in entry_indices {
            let entry_idx = entry_idx as usize;
            if resolved_entries[entry_idx] {
                continue;
            }
            attempted_entries[entry_idx] = true;

            let entry = &entries[entry_idx];
            if let Some(dosage) = compute_dosage(
                &record.allele1,
                &record.allele2,
                &entry.effect_allele,
                &entry.other_allele,
            ) {
                resolved_entries[entry_idx] = true;
                pairs.push(MatchedPair {
                    dosage,
                    effect_weight: entry.effect_weight,
                });
            }
        }
    }

    let attempted = attempted_entries.iter().filter(|&&a| a).count();
    let resolved = pairs.len();
    log::debug!(
        "Matched {resolved}/{attempted} attempted entries against a table of {} ({strategy:?} join)",
        entries.len()
    );

    MatchOutcome {
        pairs,
        attempted,
        resolved,
        strategy,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Position(VariantKey),
    Id(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chromosome, GenomeBuild, ScoringEntry};

    fn chr(label: &str) -> Chromosome {
        Chromosome::parse(label).unwrap()
    }

    fn record(id: &str, chrom: &str, pos: u32, a1: &str, a2: &str) -> GenotypeRecord {
        GenotypeRecord {
            variant_id: Some(id.to_string()),
            chromosome: chr(chrom),
            position: pos,
            allele1: a1.into(),
            allele2: a2.into(),
            build: GenomeBuild::Build37,
        }
    }

    fn entry(chrom: &str, pos: u32, eff: &str, oth: &str, weight: f64) -> ScoringEntry {
        ScoringEntry {
            variant_id: None,
            chromosome: Some(chr(chrom)),
            position: Some(pos),
            harmonized_chromosome: None,
            harmonized_position: None,
            effect_allele: eff.into(),
            other_allele: oth.into(),
            effect_weight: weight,
        }
    }

    fn table(entries: Vec<ScoringEntry>) -> ScoringTable {
        ScoringTable::from_entries(entries)
    }

    #[test]
    fn coordinate_join_resolves_overlapping_variants() {
        let records = vec![
            record("rs1", "1", 100, "A", "G"),
            record("rs2", "2", 200, "T", "T"),
            record("rs3", "3", 300, "C", "C"),
        ];
        let tbl = table(vec![
            entry("1", 100, "A", "G", 0.1), // heterozygous -> dosage 1
            entry("2", 200, "A", "C", 0.2), // strand flip -> dosage 2
            entry("4", 400, "A", "G", 0.4), // no genotype at this position
        ]);

        let outcome = match_variants(&records, &tbl);
        assert_eq!(outcome.strategy, MatchStrategy::Coordinate);
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.resolved, 2);
        assert_eq!(outcome.pairs.len(), 2);
    }

    #[test]
    fn failed_dosage_counts_as_attempted_not_resolved() {
        // A/G cannot be drawn from {C, A} on either strand.
        let records = vec![record("rs1", "1", 100, "A", "G")];
        let tbl = table(vec![entry("1", 100, "C", "A", 0.1)]);

        let outcome = match_variants(&records, &tbl);
        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.resolved, 0);
        assert!(outcome.pairs.is_empty());
    }

    #[test]
    fn harmonized_coordinates_take_precedence() {
        let mut shifted = entry("1", 999, "A", "G", 0.5);
        shifted.harmonized_chromosome = Some(chr("1"));
        shifted.harmonized_position = Some(100);
        let tbl = table(vec![shifted]);

        let records = vec![record("rs1", "1", 100, "A", "A")];
        let outcome = match_variants(&records, &tbl);
        assert_eq!(outcome.resolved, 1);
        assert_eq!(outcome.pairs[0].dosage.count(), 2);
    }

    #[test]
    fn rsid_strategy_applies_when_table_has_no_coordinates() {
        let keyless = ScoringEntry {
            variant_id: Some("rs77".into()),
            chromosome: None,
            position: None,
            harmonized_chromosome: None,
            harmonized_position: None,
            effect_allele: "G".into(),
            other_allele: "A".into(),
            effect_weight: 1.5,
        };
        let tbl = table(vec![keyless]);

        let records = vec![record("rs77", "9", 1234, "G", "A")];
        let outcome = match_variants(&records, &tbl);
        assert_eq!(outcome.strategy, MatchStrategy::VariantId);
        assert_eq!(outcome.resolved, 1);
        assert_eq!(outcome.pairs[0].dosage.count(), 1);
    }

    #[test]
    fn each_entry_resolves_at_most_once() {
        // Two records at the same position (distinct vendor IDs survive
        // rsid-dedup); the single entry must contribute one pair.
        let records = vec![
            record("rs1", "1", 100, "A", "G"),
            record("i100", "1", 100, "A", "A"),
        ];
        let tbl = table(vec![entry("1", 100, "A", "G", 0.1)]);

        let outcome = match_variants(&records, &tbl);
        assert_eq!(outcome.resolved, 1);
        assert_eq!(outcome.pairs[0].dosage.count(), 1); // first record wins
    }

    #[test]
    fn empty_table_yields_empty_outcome() {
        let records = vec![record("rs1", "1", 100, "A", "G")];
        let outcome = match_variants(&records, &table(vec![]));
        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.resolved, 0);
        assert!(outcome.pairs.is_empty());
    }

    #[test]
    fn matching_is_idempotent() {
        let records = vec![
            record("rs1", "1", 100, "A", "G"),
            record("rs2", "2", 200, "T", "T"),
        ];
        let tbl = table(vec![
            entry("1", 100, "A", "G", 0.1),
            entry("2", 200, "T", "C", 0.7),
        ]);

        let first = match_variants(&records, &tbl);
        let second = match_variants(&records, &tbl);
        assert_eq!(first.pairs, second.pairs);
        assert_eq!(first.attempted, second.attempted);
        assert_eq!(first.resolved, second.resolved);
    }
}
