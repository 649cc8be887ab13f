// ========================================================================================
//                              Genome Build Resolution
// ========================================================================================
//
// Consumer exports rarely state their reference build outright. This module
// decides between GRCh37 and GRCh38 from header text when possible, and
// otherwise from positional agreement with a handful of well-characterized
// marker variants present on essentially every consumer array.

use crate::types::{GenomeBuild, GenotypeRecord};

/// A marker variant with known coordinates in both supported builds.
struct MarkerVariant {
    rsid: &'static str,
    // (chromosome code, position) per build; all markers sit on autosomes.
    build37: (u8, u32),
    build38: (u8, u32),
}

/// Well-characterized SNPs used for positional build detection: the two APOE
/// SNPs, MTHFR C677T, and the two pigmentation SNPs. All are present on the
/// major consumer arrays.
const BUILD_MARKERS: [MarkerVariant; 5] = [
    MarkerVariant {
        rsid: "rs7412",
        build37: (19, 45_412_079),
        build38: (19, 44_908_822),
    },
    MarkerVariant {
        rsid: "rs429358",
        build37: (19, 45_411_941),
        build38: (19, 44_908_684),
    },
    MarkerVariant {
        rsid: "rs1801133",
        build37: (1, 11_856_378),
        build38: (1, 11_796_321),
    },
    MarkerVariant {
        rsid: "rs12913832",
        build37: (15, 28_365_618),
        build38: (15, 28_120_472),
    },
    MarkerVariant {
        rsid: "rs1426654",
        build37: (15, 48_426_484),
        build38: (15, 48_134_287),
    },
];

/// Scans header lines for an explicit build declaration.
fn build_from_headers(header_lines: &[String]) -> Option<GenomeBuild> {
    for line in header_lines {
        let lower = line.to_ascii_lowercase();
        if lower.contains("grch38") || lower.contains("hg38") || lower.contains("build 38") {
            return Some(GenomeBuild::Build38);
        }
        if lower.contains("grch37") || lower.contains("hg19") || lower.contains("build 37") {
            return Some(GenomeBuild::Build37);
        }
        // VCF reference-genome declarations name the FASTA rather than the build.
        if lower.contains("##reference") {
            if lower.contains("38") {
                return Some(GenomeBuild::Build38);
            }
            if lower.contains("37") || lower.contains("19") {
                return Some(GenomeBuild::Build37);
            }
        }
    }
    None
}

/// Determines the reference build of a genotype record set.
///
/// Header text naming a build wins outright. Otherwise each marker variant
/// found among the records votes for the build whose known chr:pos it sits at;
/// strictly more GRCh38 votes selects GRCh38. Ties and marker-free inputs
/// default to GRCh37, the build of nearly all consumer arrays. This default is
/// a known accuracy limitation for sparse arrays that carry none of the
/// markers; no confidence threshold is applied.
///
/// Never fails; always returns one of the two supported builds.
pub fn resolve_build(header_lines: &[String], records: &[GenotypeRecord]) -> GenomeBuild {
    if let Some(build) = build_from_headers(header_lines) {
        log::info!("Build declared in header: {build}");
        return build;
    }

    let mut votes37 = 0usize;
    let mut votes38 = 0usize;

    for record in records {
        let Some(rsid) = record.variant_id.as_deref() else {
            continue;
        };
        let Some(marker) = BUILD_MARKERS.iter().find(|m| m.rsid == rsid) else {
            continue;
        };
        let key = (record.chromosome.code(), record.position);
        if key == marker.build37 {
            votes37 += 1;
        } else if key == marker.build38 {
            votes38 += 1;
        }
    }

    let resolved = if votes38 > votes37 {
        GenomeBuild::Build38
    } else {
        GenomeBuild::Build37
    };
    log::info!(
        "Build resolved from marker positions: {resolved} ({votes37} GRCh37 votes, {votes38} GRCh38 votes)"
    );
    if votes37 == 0 && votes38 == 0 {
        log::warn!("No build markers found among {} records; defaulting to GRCh37", records.len());
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chromosome;

    fn marker_record(rsid: &str, chrom: u8, pos: u32) -> GenotypeRecord {
        GenotypeRecord {
            variant_id: Some(rsid.to_string()),
            chromosome: Chromosome::parse(&chrom.to_string()).unwrap(),
            position: pos,
            allele1: "A".into(),
            allele2: "A".into(),
            build: GenomeBuild::Build37,
        }
    }

    #[test]
    fn header_hint_wins_over_markers() {
        let headers = vec!["# reference human assembly build 38 (GRCh38)".to_string()];
        // Record positions say GRCh37, but the header is explicit.
        let records = vec![marker_record("rs7412", 19, 45_412_079)];
        assert_eq!(resolve_build(&headers, &records), GenomeBuild::Build38);
    }

    #[test]
    fn vcf_reference_line_is_recognized() {
        let headers = vec!["##reference=file:///refs/GRCh38_full_analysis_set.fa".to_string()];
        assert_eq!(resolve_build(&headers, &[]), GenomeBuild::Build38);
    }

    #[test]
    fn marker_positions_select_build38() {
        let records = vec![
            marker_record("rs7412", 19, 44_908_822),
            marker_record("rs429358", 19, 44_908_684),
        ];
        assert_eq!(resolve_build(&[], &records), GenomeBuild::Build38);
    }

    #[test]
    fn marker_positions_select_build37() {
        let records = vec![
            marker_record("rs1801133", 1, 11_856_378),
            marker_record("rs12913832", 15, 28_365_618),
            marker_record("rs1426654", 15, 48_134_287), // one dissenting GRCh38 vote
        ];
        assert_eq!(resolve_build(&[], &records), GenomeBuild::Build37);
    }

    #[test]
    fn ties_and_empty_inputs_default_to_build37() {
        assert_eq!(resolve_build(&[], &[]), GenomeBuild::Build37);

        let tied = vec![
            marker_record("rs7412", 19, 45_412_079),
            marker_record("rs429358", 19, 44_908_684),
        ];
        assert_eq!(resolve_build(&[], &tied), GenomeBuild::Build37);
    }

    #[test]
    fn marker_at_unknown_position_votes_for_neither() {
        let records = vec![marker_record("rs7412", 19, 1234)];
        assert_eq!(resolve_build(&[], &records), GenomeBuild::Build37);
    }
}
