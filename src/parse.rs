// ========================================================================================
//                        Consumer Genotype Export Parsing
// ========================================================================================
//
// Line parsers for the three consumer export formats the engine accepts:
// 23andMe raw data, AncestryDNA raw data, and single-sample VCF. The format is
// chosen explicitly by the caller; there is no content sniffing here. Malformed
// lines are counted skips, never fatal — consumer exports are messy and a
// single bad line must not sink a 600k-variant file.
//
// Header lines ('#'-prefixed) are captured verbatim so the build resolver can
// look for explicit build declarations.

use crate::build::resolve_build;
use crate::types::{Chromosome, GenomeBuild, GenotypeRecord};
use ahash::AHashSet;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading genotype file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Genotype file contained no parseable records")]
    NoRecords,
}

/// The consumer export formats the engine parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    /// Tab-separated rsid/chromosome/position/genotype.
    TwentyThreeAndMe,
    /// Tab- or comma-separated rsid/chromosome/position/allele1/allele2.
    AncestryDna,
    /// VCF; the first sample's GT field is decoded against REF/ALT.
    Vcf,
}

/// Bookkeeping for one parse run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub parsed: usize,
    /// Malformed, no-call, off-catalog-chromosome, and duplicate lines.
    pub skipped: usize,
}

/// A parsed record set: canonicalized, deduplicated records plus the captured
/// header lines and parse bookkeeping.
#[derive(Debug)]
pub struct ParsedGenotypes {
    pub records: Vec<GenotypeRecord>,
    pub header_lines: Vec<String>,
    pub stats: ParseStats,
}

impl ParsedGenotypes {
    /// The resolved reference build of this record set.
    pub fn build(&self) -> GenomeBuild {
        match self.records.first() {
            Some(record) => record.build,
            None => GenomeBuild::Build37,
        }
    }
}

/// Parses a genotype export file, transparently handling gzip.
pub fn parse_genotype_file(path: &Path, format: RawFormat) -> Result<ParsedGenotypes, ParseError> {
    let file = File::open(path)?;
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gz {
        parse_genotype_reader(BufReader::new(MultiGzDecoder::new(file)), format)
    } else {
        parse_genotype_reader(BufReader::new(file), format)
    }
}

/// Parses a genotype export from any reader.
///
/// Two passes over the data are deliberately avoided: lines are parsed into
/// provisional records with a placeholder build, the build is resolved from
/// headers/markers afterwards, and the records are stamped in one sweep.
pub fn parse_genotype_reader<R: Read>(
    reader: BufReader<R>,
    format: RawFormat,
) -> Result<ParsedGenotypes, ParseError> {
    let mut header_lines = Vec::new();
    let mut records: Vec<GenotypeRecord> = Vec::new();
    let mut stats = ParseStats::default();
    let mut seen_ids: AHashSet<String> = AHashSet::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            header_lines.push(line.to_string());
            continue;
        }

        let parsed = match format {
            RawFormat::TwentyThreeAndMe => parse_23andme_line(line),
            RawFormat::AncestryDna => parse_ancestry_line(line),
            RawFormat::Vcf => parse_vcf_line(line),
        };

        match parsed {
            LineOutcome::Record(record) => {
                // Deduplicate by variant_id, first occurrence wins. Unnamed
                // records cannot collide and are always kept.
                let duplicate = record
                    .variant_id
                    .as_ref()
                    .is_some_and(|id| !seen_ids.insert(id.clone()));
                if duplicate {
                    stats.skipped += 1;
                } else {
                    stats.parsed += 1;
                    records.push(record);
                }
            }
            LineOutcome::Skip => stats.skipped += 1,
            // Column header rows (AncestryDNA) are structural, not data, so
            // they count as neither parsed nor skipped.
            LineOutcome::Structural => {}
        }
    }

    if records.is_empty() {
        return Err(ParseError::NoRecords);
    }

    let build = resolve_build(&header_lines, &records);
    for record in &mut records {
        record.build = build;
    }

    log::info!(
        "Parsed {} records ({} lines skipped), build {build}",
        stats.parsed,
        stats.skipped
    );
    Ok(ParsedGenotypes {
        records,
        header_lines,
        stats,
    })
}

enum LineOutcome {
    Record(GenotypeRecord),
    Skip,
    Structural,
}

// Records are stamped with the resolved build after the full pass; this is the
// provisional value in the meantime.
const PROVISIONAL_BUILD: GenomeBuild = GenomeBuild::Build37;

fn is_no_call(genotype: &str) -> bool {
    genotype.is_empty() || genotype.chars().all(|c| matches!(c, '-' | '0' | 'N' | 'n'))
}

/// 23andMe: `rsid<TAB>chromosome<TAB>position<TAB>genotype`. One-character
/// genotypes are haploid calls (MT, Y, X in males) and are duplicated; longer
/// than two characters means an indel call kept whole.
fn parse_23andme_line(line: &str) -> LineOutcome {
    let mut fields = line.split('\t');
    let (Some(rsid), Some(chrom), Some(pos), Some(genotype)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return LineOutcome::Skip;
    };

    let Ok(chromosome) = Chromosome::parse(chrom) else {
        return LineOutcome::Skip;
    };
    let Ok(position) = pos.trim().parse::<u32>() else {
        return LineOutcome::Skip;
    };
    let genotype = genotype.trim().to_ascii_uppercase();
    if is_no_call(&genotype) {
        return LineOutcome::Skip;
    }

    let (allele1, allele2) = match genotype.len() {
        1 => (genotype.clone(), genotype),
        2 => (genotype[..1].to_string(), genotype[1..].to_string()),
        _ => (genotype.clone(), genotype),
    };

    LineOutcome::Record(GenotypeRecord {
        variant_id: Some(rsid.trim().to_string()),
        chromosome,
        position,
        allele1,
        allele2,
        build: PROVISIONAL_BUILD,
    })
}

/// AncestryDNA: `rsid<SEP>chromosome<SEP>position<SEP>allele1<SEP>allele2`,
/// tab- or comma-separated, usually with a column header row.
fn parse_ancestry_line(line: &str) -> LineOutcome {
    let fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split(',').collect()
    };
    if fields.len() < 4 {
        return LineOutcome::Skip;
    }

    let first = fields[0].trim();
    if matches!(
        first.to_ascii_lowercase().as_str(),
        "rsid" | "rs" | "snp" | "marker"
    ) {
        return LineOutcome::Structural;
    }

    let Ok(chromosome) = Chromosome::parse(fields[1]) else {
        return LineOutcome::Skip;
    };
    let Ok(position) = fields[2].trim().parse::<u32>() else {
        return LineOutcome::Skip;
    };

    let (allele1, allele2) = if fields.len() >= 5 {
        (
            fields[3].trim().to_ascii_uppercase(),
            fields[4].trim().to_ascii_uppercase(),
        )
    } else {
        // Four-column variant: combined genotype like the 23andMe layout.
        let genotype = fields[3].trim().to_ascii_uppercase();
        if genotype.len() >= 2 {
            (genotype[..1].to_string(), genotype[1..].to_string())
        } else {
            (genotype.clone(), genotype)
        }
    };

    if is_no_call(&allele1) || is_no_call(&allele2) {
        return LineOutcome::Skip;
    }

    LineOutcome::Record(GenotypeRecord {
        variant_id: Some(first.to_string()),
        chromosome,
        position,
        allele1,
        allele2,
        build: PROVISIONAL_BUILD,
    })
}

/// VCF data line: decodes the first sample's GT indices against REF and the
/// comma-separated ALT list. Sites with a missing GT ('.') are skipped.
fn parse_vcf_line(line: &str) -> LineOutcome {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 10 {
        return LineOutcome::Skip;
    }

    let Ok(chromosome) = Chromosome::parse(fields[0]) else {
        return LineOutcome::Skip;
    };
    let Ok(position) = fields[1].trim().parse::<u32>() else {
        return LineOutcome::Skip;
    };
    let variant_id = match fields[2].trim() {
        "." | "" => None,
        id => Some(id.to_string()),
    };

    let reference = fields[3].trim().to_ascii_uppercase();
    let alt = fields[4].trim().to_ascii_uppercase();
    let mut allele_options: Vec<&str> = vec![&reference];
    allele_options.extend(alt.split(','));

    // Locate GT within the FORMAT field; it is usually but not always first.
    let format_keys: Vec<&str> = fields[8].split(':').collect();
    let sample_values: Vec<&str> = fields[9].split(':').collect();
    let Some(gt_idx) = format_keys.iter().position(|&k| k == "GT") else {
        return LineOutcome::Skip;
    };
    let Some(gt) = sample_values.get(gt_idx) else {
        return LineOutcome::Skip;
    };

    let gt = gt.replace('|', "/");
    let mut indices = gt.split('/');
    let first = indices.next().unwrap_or(".");
    let second = indices.next().unwrap_or(first); // haploid: duplicate

    if first == "." || second == "." {
        return LineOutcome::Skip;
    }
    let (Ok(i1), Ok(i2)) = (first.parse::<usize>(), second.parse::<usize>()) else {
        return LineOutcome::Skip;
    };
    let (Some(&a1), Some(&a2)) = (allele_options.get(i1), allele_options.get(i2)) else {
        return LineOutcome::Skip;
    };

    LineOutcome::Record(GenotypeRecord {
        variant_id,
        chromosome,
        position,
        allele1: a1.to_string(),
        allele2: a2.to_string(),
        build: PROVISIONAL_BUILD,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str, format: RawFormat) -> ParsedGenotypes {
        parse_genotype_reader(BufReader::new(Cursor::new(text.to_string())), format).unwrap()
    }

    #[test]
    fn parses_23andme_lines() {
        let data = "\
# This data file generated by 23andMe
rs1\t1\t1000\tAG
rs2\tchr2\t2000\tTT
rs3\tMT\t300\tA
rs4\t1\t4000\t--
bad line without tabs
";
        let parsed = parse(data, RawFormat::TwentyThreeAndMe);
        assert_eq!(parsed.stats.parsed, 3);
        assert_eq!(parsed.stats.skipped, 2); // the no-call and the bad line
        assert_eq!(parsed.header_lines.len(), 1);

        let rs1 = &parsed.records[0];
        assert_eq!(rs1.allele1, "A");
        assert_eq!(rs1.allele2, "G");

        // Haploid MT call is duplicated.
        let rs3 = &parsed.records[2];
        assert_eq!(rs3.allele1, "A");
        assert_eq!(rs3.allele2, "A");
    }

    #[test]
    fn deduplicates_by_variant_id_first_wins() {
        let data = "rs1\t1\t1000\tAG\nrs1\t1\t1000\tGG\nrs2\t2\t2000\tCC\n";
        let parsed = parse(data, RawFormat::TwentyThreeAndMe);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.stats.skipped, 1);
        assert_eq!(parsed.records[0].allele1, "A"); // the first rs1 survived
    }

    #[test]
    fn nonstandard_chromosomes_are_skipped() {
        // Includes a non-ASCII chromosome field: a counted skip, never a panic.
        let data = "rs1\t1\t1000\tAG\nrs2\tscaffold_17\t99\tCC\nrs3\téé\t100\tAA\n";
        let parsed = parse(data, RawFormat::TwentyThreeAndMe);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.stats.skipped, 2);
    }

    #[test]
    fn parses_ancestry_lines_with_header_row() {
        let data = "\
#AncestryDNA raw data download
rsid\tchromosome\tposition\tallele1\tallele2
rs10\t5\t500\tA\tC
rs11\t5\t600\t0\t0
";
        let parsed = parse(data, RawFormat::AncestryDna);
        assert_eq!(parsed.stats.parsed, 1);
        assert_eq!(parsed.stats.skipped, 1); // the 0/0 no-call
        assert_eq!(parsed.records[0].allele2, "C");
    }

    #[test]
    fn parses_vcf_first_sample_genotype() {
        let data = "\
##fileformat=VCFv4.2
##reference=GRCh38
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE1
chr1\t1000\trs1\tA\tG\t.\tPASS\t.\tGT:DP\t0/1:30
chr1\t2000\t.\tC\tT,G\t.\tPASS\t.\tGT\t2|2
chr1\t3000\trs3\tA\tG\t.\tPASS\t.\tGT\t./.
";
        let parsed = parse(data, RawFormat::Vcf);
        assert_eq!(parsed.stats.parsed, 2);
        assert_eq!(parsed.stats.skipped, 1); // the ./. site

        let named = &parsed.records[0];
        assert_eq!(named.allele1, "A");
        assert_eq!(named.allele2, "G");

        // Second ALT allele selected by index 2.
        let unnamed = &parsed.records[1];
        assert_eq!(unnamed.variant_id, None);
        assert_eq!(unnamed.allele1, "G");

        // The ##reference header drove build resolution.
        assert_eq!(parsed.build(), GenomeBuild::Build38);
    }

    #[test]
    fn build_stamps_every_record() {
        let data = "# build 38 raw data\nrs1\t1\t1000\tAG\nrs2\t2\t2000\tCC\n";
        let parsed = parse(data, RawFormat::TwentyThreeAndMe);
        assert!(parsed
            .records
            .iter()
            .all(|r| r.build == GenomeBuild::Build38));
    }

    #[test]
    fn empty_input_is_an_error() {
        let result = parse_genotype_reader(
            BufReader::new(Cursor::new("# only headers\n".to_string())),
            RawFormat::TwentyThreeAndMe,
        );
        assert!(matches!(result, Err(ParseError::NoRecords)));
    }

    #[test]
    fn haploid_vcf_genotype_is_duplicated() {
        let data = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS\nchrY\t100\trsY\tC\tT\t.\t.\t.\tGT\t1\n";
        let parsed = parse(data, RawFormat::Vcf);
        assert_eq!(parsed.records[0].allele1, "T");
        assert_eq!(parsed.records[0].allele2, "T");
    }
}
