// ========================================================================================
//
//                         THE STRATEGIC ORCHESTRATOR: CENTILE
//
// ========================================================================================
//
// The binary owns the application lifecycle: argument parsing, loading the
// genotype export and the local scoring files, conducting the batch engine,
// and writing the report. All I/O lives here — the library's entry points take
// fully-materialized in-memory inputs and stay pure.

use centile::catalog::{disease_info, DISEASE_CATALOG};
use centile::liftover::{ensure_build, ChainMap};
use centile::parse::{parse_genotype_file, RawFormat};
use centile::pipeline::{compute_batch, BatchReport, DiseaseInput};
use centile::scoring::ScoringTable;
use centile::types::GenomeBuild;
use clap::{Parser, ValueEnum};
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    #[value(name = "23andme")]
    TwentyThreeAndMe,
    Ancestry,
    Vcf,
}

impl From<FormatArg> for RawFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::TwentyThreeAndMe => RawFormat::TwentyThreeAndMe,
            FormatArg::Ancestry => RawFormat::AncestryDna,
            FormatArg::Vcf => RawFormat::Vcf,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "centile",
    version,
    about = "An engine for population-normalized polygenic risk percentiles."
)]
struct Args {
    /// Path to the genotype export (23andMe, AncestryDNA, or VCF; .gz accepted).
    genotype_path: PathBuf,

    /// Input format. Defaults to VCF for .vcf/.vcf.gz paths, 23andMe otherwise.
    #[clap(long, value_enum)]
    format: Option<FormatArg>,

    /// Ancestry code (EUR, AFR, EAS, SAS, AMR) or a common alias.
    #[clap(long, default_value = "EUR")]
    ancestry: String,

    /// Comma-separated disease keys; the whole catalog when omitted.
    #[clap(long, value_delimiter = ',')]
    diseases: Option<Vec<String>>,

    /// Directory holding harmonized scoring files named <PGSID>_hmPOS_<build>.txt[.gz].
    #[clap(long)]
    scores_dir: PathBuf,

    /// Target build of the scoring files.
    #[clap(long, default_value = "GRCh37")]
    build: String,

    /// UCSC chain file for lifting genotype coordinates when their build
    /// differs from --build.
    #[clap(long)]
    chain: Option<PathBuf>,

    /// Report destination; stdout when omitted.
    #[clap(long)]
    output: Option<PathBuf>,

    /// Emit the report as JSON instead of TSV.
    #[clap(long)]
    json: bool,
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    // --- Phase 1: Parse the genotype export ---
    let format = args
        .format
        .map(RawFormat::from)
        .unwrap_or_else(|| infer_format(&args.genotype_path));
    eprintln!(
        "> Parsing {} ({format:?})...",
        args.genotype_path.display()
    );
    let parsed = parse_genotype_file(&args.genotype_path, format)?;
    eprintln!(
        "> Parsed {} records ({} skipped), detected build {}",
        parsed.stats.parsed,
        parsed.stats.skipped,
        parsed.build()
    );

    // --- Phase 2: Reconcile builds ---
    let target_build = GenomeBuild::parse(&args.build)?;
    let chain = match &args.chain {
        Some(path) => Some(ChainMap::load(path)?),
        None => None,
    };
    let (records, unmapped) = ensure_build(parsed.records, target_build, chain.as_ref())?;
    if unmapped > 0 {
        eprintln!("> Excluded {unmapped} records with no {target_build} mapping");
    }

    // --- Phase 3: Resolve diseases and load their scoring tables ---
    let disease_keys: Vec<String> = match &args.diseases {
        Some(keys) => keys.clone(),
        None => DISEASE_CATALOG.iter().map(|d| d.key.to_string()).collect(),
    };

    let inputs: Vec<DiseaseInput> = disease_keys
        .iter()
        .map(|key| DiseaseInput {
            disease: key.clone(),
            table: load_table(key, &args.scores_dir, target_build),
        })
        .collect();
    eprintln!("> Scoring {} diseases ({} ancestry)...", inputs.len(), args.ancestry);

    // --- Phase 4: Run the batch engine ---
    let batch = compute_batch(&records, inputs, &args.ancestry)?;
    eprintln!(
        "> Computed risk for {}/{} diseases",
        batch.diseases_with_data, batch.diseases_analyzed
    );

    // --- Phase 5: Write the report ---
    match &args.output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            write_report(writer, &batch, args.json)?;
            eprintln!("> Report written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            write_report(stdout.lock(), &batch, args.json)?;
        }
    }
    Ok(())
}

// ========================================================================================
//                                  HELPER FUNCTIONS
// ========================================================================================

/// Extension-only format default: .vcf/.vcf.gz means VCF, everything else is
/// treated as a 23andMe-style export unless --format says otherwise.
fn infer_format(path: &Path) -> RawFormat {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".vcf") || name.ends_with(".vcf.gz") {
        RawFormat::Vcf
    } else {
        RawFormat::TwentyThreeAndMe
    }
}

/// Resolves a disease key against the catalog and loads its local harmonized
/// scoring file. Failures are reported as per-disease strings so the batch
/// can isolate them.
fn load_table(key: &str, scores_dir: &Path, build: GenomeBuild) -> Result<ScoringTable, String> {
    let info = disease_info(key).ok_or_else(|| format!("unknown disease key '{key}'"))?;

    let plain = scores_dir.join(format!("{}_hmPOS_{build}.txt", info.pgs_id));
    let gz = scores_dir.join(format!("{}_hmPOS_{build}.txt.gz", info.pgs_id));
    let path = if plain.exists() {
        plain
    } else if gz.exists() {
        gz
    } else {
        return Err(format!(
            "no scoring file for {} ({}) under {}",
            info.pgs_id,
            build,
            scores_dir.display()
        ));
    };

    ScoringTable::load(&path).map_err(|e| e.to_string())
}

/// Writes the batch report as TSV or JSON.
fn write_report<W: Write>(mut writer: W, batch: &BatchReport, json: bool) -> io::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut writer, batch)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(
        writer,
        "disease\tmatched\ttotal\tmatch_rate\traw_score\tzscore\tpercentile\tcategory\terror"
    )?;

    let mut line = String::new();
    for report in &batch.reports {
        line.clear();
        write!(
            &mut line,
            "{}\t{}\t{}\t{:.1}%\t{:.4}",
            report.disease,
            report.aggregate.matched_count,
            report.aggregate.total_count,
            report.aggregate.match_rate * 100.0,
            report.aggregate.raw_score
        )
        .expect("writing to a String cannot fail");

        match &report.risk {
            Some(risk) => write!(
                &mut line,
                "\t{:.3}\t{:.1}\t{}",
                risk.zscore, risk.percentile, risk.category
            )
            .expect("writing to a String cannot fail"),
            None => line.push_str("\t-\t-\t-"),
        }
        match &report.error {
            Some(error) => {
                line.push('\t');
                line.push_str(error);
            }
            None => line.push_str("\t-"),
        }
        writeln!(writer, "{line}")?;
    }

    if !batch.elevated_risks.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "# Elevated risks (>= 75th percentile)")?;
        for elevated in &batch.elevated_risks {
            writeln!(
                writer,
                "# {}\t{:.1}\t{}",
                elevated.disease, elevated.percentile, elevated.category
            )?;
        }
    }
    Ok(())
}
