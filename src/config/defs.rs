use std::path::PathBuf;
use crate::cli::Arguments;
use lazy_static::lazy_static;
use std::collections::HashMap;

// External software
pub const ART_TAG: &str = "art_illumina";
pub const PBSIM_TAG: &str = "pbsim";
pub const QUAST_TAG: &str = "quast.py";

// Read file naming convention
pub const READ_1_SUFFIX: &str = "_1.fastq.gz";
pub const READ_2_SUFFIX: &str = "_2.fastq.gz";
pub const LONG_READ_SUFFIX: &str = "_long.fastq.gz";
pub const QUALITY_TIERS: &[&str] = &["bad", "medium", "good"];

// Command template placeholders
pub const SHORT_READS_1_TOKEN: &str = "SHORT_READS_1";
pub const SHORT_READS_2_TOKEN: &str = "SHORT_READS_2";
pub const LONG_READS_TOKEN: &str = "LONG_READS";
pub const GENOME_SIZE_TOKEN: &str = "GENOME_SIZE";

// Genome size substituted when no reference is known.
pub const DEFAULT_GENOME_SIZE: u64 = 5_000_000;

// Static filenames
pub const RESULTS_TABLE_NAME: &str = "results.tsv";
pub const QUAST_REPORT_NAME: &str = "report.tsv";

// An assembly totalling fewer bases than this is a degenerate/failed one.
pub const MIN_ASSEMBLY_LENGTH: u64 = 100_000;

// Platform tokens accepted by ART, as <seqSys>_<readLength>.
pub const ART_PLATFORMS: &[&str] = &[
    "GA1_36", "GA1_44", "GA2_50", "GA2_75", "HS10_100", "HS20_100", "HS25_125",
    "HS25_150", "HSXn_150", "HSXt_150", "MinS_50", "MSv1_250", "MSv3_250",
    "NS50_75",
];

lazy_static! {
    // Illumina presets: quality tier -> (depth, platform)
    pub static ref ILLUMINA_PRESETS: HashMap<&'static str, (f64, &'static str)> = {
        let mut m = HashMap::new();
        m.insert("good", (100.0, "HS25_150"));
        m.insert("medium", (40.0, "HS25_125"));
        m.insert("bad", (40.0, "HS10_100"));
        m
    };

    // Long read presets: preset name -> (length, id_alpha, id_beta, id_max).
    // Nanopore presets have a wider distribution of read identity.
    pub static ref LONG_READ_PRESETS: HashMap<&'static str, (u32, f64, f64, f64)> = {
        let mut m = HashMap::new();
        m.insert("good_nanopore", (20000, 13.0, 2.0, 0.98));
        m.insert("medium_nanopore", (10000, 12.0, 3.0, 0.95));
        m.insert("bad_nanopore", (5000, 11.0, 4.0, 0.9));
        m.insert("good_pacbio", (20000, 90.0, 10.0, 1.0));
        m.insert("medium_pacbio", (10000, 85.0, 15.0, 1.0));
        m.insert("bad_pacbio", (5000, 75.0, 25.0, 1.0));
        m
    };
}

pub struct RunConfig {
    pub cwd: PathBuf,
    pub args: Arguments,
}
