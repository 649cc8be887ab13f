// ========================================================================================
//                                Coordinate Lifting
// ========================================================================================
//
// Converts genomic positions between GRCh37 and GRCh38 via a precomputed
// interval remapping loaded from a UCSC chain file. Lifting is a pure lookup:
// a position either falls inside a covering alignment block or it is unmapped.
// There are no retries and no partial mappings.
//
// Chain files are 0-based half-open; the engine's coordinates are 1-based.
// The conversion happens once at the lookup boundary so everything else in the
// crate stays 1-based.

use crate::types::{Chromosome, GenomeBuild, GenotypeRecord, VariantKey};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiftError {
    #[error("IO error reading chain file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed chain file at line {line}: {reason}")]
    MalformedChain { line: usize, reason: String },
    // `source` is reserved by thiserror for the error cause, hence `from_build`.
    #[error(
        "No chain mapping supplied for {from_build} -> {to_build}; cannot lift coordinates between builds"
    )]
    MissingChain {
        from_build: GenomeBuild,
        to_build: GenomeBuild,
    },
}

/// One gapless alignment block: a source interval plus where it lands on the
/// target assembly.
#[derive(Debug, Clone, Copy)]
struct ChainBlock {
    /// 0-based half-open source interval.
    src_start: u32,
    src_end: u32,
    target_chrom: Chromosome,
    /// 0-based target start of the block. For reverse-strand chains this is
    /// measured on the forward target strand after flipping.
    target_start: u32,
    reverse: bool,
    /// Length of the block; positions mirror within it on reverse strands.
    len: u32,
    /// Running maximum of `src_end` over this block and every earlier-starting
    /// block on the chromosome. Blocks from different chains can overlap, and
    /// this bounds the backward scan for a covering block.
    max_end: u32,
}

impl ChainBlock {
    /// Maps a 0-based source position inside this block to the target assembly.
    #[inline]
    fn map(&self, pos0: u32) -> (Chromosome, u32) {
        let offset = pos0 - self.src_start;
        let target0 = if self.reverse {
            self.target_start + (self.len - 1 - offset)
        } else {
            self.target_start + offset
        };
        (self.target_chrom, target0)
    }
}

/// A piecewise interval remapping between two builds, keyed by source
/// chromosome with blocks sorted by source start for binary search.
///
/// Loaded once from a chain file by the caller and shared immutably; lifting
/// never mutates it.
#[derive(Debug, Default)]
pub struct ChainMap {
    blocks: ahash::AHashMap<Chromosome, Vec<ChainBlock>>,
}

impl ChainMap {
    /// Loads a UCSC chain file, transparently handling gzip.
    pub fn load(path: &Path) -> Result<Self, LiftError> {
        let file = File::open(path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Self::from_reader(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Self::from_reader(BufReader::new(file))
        }
    }

    /// Parses the UCSC chain format: a `chain` header per alignment followed
    /// by `size [dt dq]` block lines. Chromosomes outside 1-22/X/Y/MT are
    /// skipped along with their blocks.
    pub fn from_reader<R: Read>(reader: BufReader<R>) -> Result<Self, LiftError> {
        let mut blocks: ahash::AHashMap<Chromosome, Vec<ChainBlock>> = ahash::AHashMap::new();

        // State of the chain currently being read, None while skipping one.
        struct Cursor {
            src_chrom: Chromosome,
            src_pos: u32,
            target_chrom: Chromosome,
            target_pos: u32,
            target_size: u32,
            reverse: bool,
        }
        let mut cursor: Option<Cursor> = None;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = |reason: &str| LiftError::MalformedChain {
                line: idx + 1,
                reason: reason.to_string(),
            };

            if let Some(rest) = line.strip_prefix("chain ") {
                // chain score tName tSize tStrand tStart tEnd qName qSize qStrand qStart qEnd id
                // UCSC liftOver chains map tName (source) onto qName (target).
                let fields: Vec<&str> = rest.split_ascii_whitespace().collect();
                if fields.len() < 11 {
                    return Err(malformed("incomplete chain header"));
                }
                let src_chrom = Chromosome::parse(fields[1]).ok();
                let src_strand = fields[3];
                let src_start: u32 = fields[4]
                    .parse()
                    .map_err(|_| malformed("bad source start"))?;
                let target_chrom = Chromosome::parse(fields[6]).ok();
                let target_size: u32 = fields[7]
                    .parse()
                    .map_err(|_| malformed("bad target size"))?;
                let target_strand = fields[8];
                let target_start: u32 = fields[9]
                    .parse()
                    .map_err(|_| malformed("bad target start"))?;

                if src_strand != "+" {
                    return Err(malformed("source strand must be '+'"));
                }

                cursor = match (src_chrom, target_chrom) {
                    (Some(src), Some(target)) => Some(Cursor {
                        src_chrom: src,
                        src_pos: src_start,
                        target_chrom: target,
                        target_pos: target_start,
                        target_size,
                        reverse: target_strand == "-",
                    }),
                    // Alt contigs and patches: skip the whole chain.
                    _ => None,
                };
                continue;
            }

            let Some(state) = cursor.as_mut() else {
                continue;
            };

            let fields: Vec<&str> = line.split_ascii_whitespace().collect();
            let size: u32 = fields[0].parse().map_err(|_| malformed("bad block size"))?;

            if size > 0 {
                // Reverse-strand target coordinates in the chain run along the
                // reversed strand; flip them onto the forward strand here.
                let target_start = if state.reverse {
                    state
                        .target_size
                        .checked_sub(state.target_pos + size)
                        .ok_or_else(|| malformed("target block exceeds chromosome size"))?
                } else {
                    state.target_pos
                };
                blocks.entry(state.src_chrom).or_default().push(ChainBlock {
                    src_start: state.src_pos,
                    src_end: state.src_pos + size,
                    target_chrom: state.target_chrom,
                    target_start,
                    reverse: state.reverse,
                    len: size,
                    max_end: 0, // filled in after sorting
                });
            }

            match fields.len() {
                1 => {
                    // Terminal block of this chain.
                    cursor = None;
                }
                3 => {
                    let dt: u32 = fields[1].parse().map_err(|_| malformed("bad source gap"))?;
                    let dq: u32 = fields[2].parse().map_err(|_| malformed("bad target gap"))?;
                    state.src_pos += size + dt;
                    state.target_pos += size + dq;
                }
                _ => return Err(malformed("block line must have 1 or 3 fields")),
            }
        }

        for chrom_blocks in blocks.values_mut() {
            chrom_blocks.sort_unstable_by_key(|b| b.src_start);
            let mut max_end = 0;
            for block in chrom_blocks.iter_mut() {
                max_end = max_end.max(block.src_end);
                block.max_end = max_end;
            }
        }

        Ok(ChainMap { blocks })
    }

    /// The total number of alignment blocks held, across all chromosomes.
    pub fn block_count(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// Maps a single 1-based position, or `None` when no block covers it.
    pub fn lift_position(&self, chromosome: Chromosome, position: u32) -> Option<VariantKey> {
        if position == 0 {
            return None;
        }
        let pos0 = position - 1;
        let chrom_blocks = self.blocks.get(&chromosome)?;

        // Scan backwards from the last block starting at or before pos0.
        // Overlapping blocks from different chains mean the nearest-starting
        // block may end before pos0 while a wider, earlier one covers it; the
        // running `max_end` tells us when no earlier block can.
        let idx = chrom_blocks.partition_point(|b| b.src_start <= pos0);
        for block in chrom_blocks[..idx].iter().rev() {
            if pos0 < block.src_end {
                let (target_chrom, target0) = block.map(pos0);
                return Some((target_chrom, target0 + 1));
            }
            if block.max_end <= pos0 {
                return None;
            }
        }
        None
    }
}

/// The outcome of lifting a batch of positions. `positions` is parallel to the
/// input; `None` marks a position with no covering interval data.
#[derive(Debug)]
pub struct LiftOutcome {
    pub positions: Vec<Option<VariantKey>>,
    pub lifted: usize,
    pub unmapped: usize,
}

/// Converts a list of (chromosome, position) pairs from `source` to `target`
/// coordinates.
///
/// Identity when the builds already match: every input maps to itself and the
/// chain is not consulted. Otherwise each position is looked up independently;
/// unmapped positions are reported per slot and counted, never dropped
/// silently.
pub fn lift_coordinates(
    source: GenomeBuild,
    target: GenomeBuild,
    chain: Option<&ChainMap>,
    positions: &[VariantKey],
) -> Result<LiftOutcome, LiftError> {
    if source == target {
        return Ok(LiftOutcome {
            positions: positions.iter().copied().map(Some).collect(),
            lifted: positions.len(),
            unmapped: 0,
        });
    }

    let chain = chain.ok_or(LiftError::MissingChain {
        from_build: source,
        to_build: target,
    })?;

    let mut lifted = 0usize;
    let mapped: Vec<Option<VariantKey>> = positions
        .iter()
        .map(|&(chrom, pos)| {
            let result = chain.lift_position(chrom, pos);
            if result.is_some() {
                lifted += 1;
            }
            result
        })
        .collect();

    let unmapped = positions.len() - lifted;
    Ok(LiftOutcome {
        positions: mapped,
        lifted,
        unmapped,
    })
}

/// Rewrites a record set into `target` coordinates, excluding records whose
/// positions cannot be mapped. Returns the surviving records plus the count of
/// exclusions.
pub fn ensure_build(
    records: Vec<GenotypeRecord>,
    target: GenomeBuild,
    chain: Option<&ChainMap>,
) -> Result<(Vec<GenotypeRecord>, usize), LiftError> {
    let source = match records.first() {
        Some(record) => record.build,
        None => return Ok((records, 0)),
    };
    if source == target {
        return Ok((records, 0));
    }

    let keys: Vec<VariantKey> = records.iter().map(GenotypeRecord::key).collect();
    let outcome = lift_coordinates(source, target, chain, &keys)?;

    let kept: Vec<GenotypeRecord> = records
        .into_iter()
        .zip(outcome.positions)
        .filter_map(|(mut record, mapped)| {
            let (chrom, pos) = mapped?;
            record.chromosome = chrom;
            record.position = pos;
            record.build = target;
            Some(record)
        })
        .collect();

    if outcome.unmapped > 0 {
        log::warn!(
            "Excluded {} of {} records with no {target} mapping",
            outcome.unmapped,
            outcome.unmapped + kept.len()
        );
    }
    Ok((kept, outcome.unmapped))
}
