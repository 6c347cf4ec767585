use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "asmbench", version)]
pub struct Arguments {

    #[arg(short, long, help = "Pipeline module to run: compare, comparison_table, illumina_reads or long_reads")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[clap(long, help = "Optional fixed seed for reproducibility; defaults to OS entropy")]
    pub seed: Option<u64>,

    // compare
    #[arg(long = "real_read_dir", help = "Directory containing real read sets (named as *_1.fastq.gz, *_2.fastq.gz and *_long.fastq.gz)")]
    pub real_read_dir: Option<String>,

    #[arg(long = "fake_read_dir", help = "Directory containing synthetic read sets (named as *_good_illumina_1.fastq.gz, *_bad_long.fastq.gz, etc.)")]
    pub fake_read_dir: Option<String>,

    #[arg(long = "ref_dir", help = "Directory containing reference FASTA files")]
    pub ref_dir: Option<String>,

    #[arg(long = "command_file", help = "Text file containing assembler command templates")]
    pub command_file: Option<String>,

    #[arg(short = 'o', long = "out", help = "Output directory for assemblies and the results table (compare), or the filtered table path (comparison_table)")]
    pub out_dir: Option<String>,

    // comparison_table
    #[arg(long, help = "Full table of results to summarize")]
    pub results: Option<String>,

    #[arg(long = "type", help = "short-only or hybrid")]
    pub set_type: Option<String>,

    #[arg(long = "illumina_qual", help = "bad, medium or good")]
    pub illumina_qual: Option<String>,

    #[arg(long = "long_qual", help = "bad, medium or good")]
    pub long_qual: Option<String>,

    #[arg(long, help = "Semicolon-delimited list of assembler,setting,version triples to include (Example: Unicycler,normal,0.2.0;SPAdes,contigs,3.9.1)")]
    pub include: Option<String>,

    // read generators
    #[arg(long, help = "The reference genome to shred")]
    pub reference: Option<String>,

    #[arg(short = '1', long = "short_1", help = "Synthetic reads output file (first reads of pair)")]
    pub short_1: Option<String>,

    #[arg(short = '2', long = "short_2", help = "Synthetic reads output file (second reads of pair)")]
    pub short_2: Option<String>,

    #[arg(short = 'l', long = "long", help = "Synthetic long reads output file")]
    pub long_out: Option<String>,

    #[arg(long, default_value_t = 50.0, help = "Read depth")]
    pub depth: f64,

    #[arg(long = "rotation_count", default_value_t = 50, help = "The number of times to run the short read simulator with random start positions")]
    pub rotation_count: u32,

    #[arg(long, default_value = "HS25_125",
          help = "Illumina platform and read length (same as ART options: GA1_36, GA1_44, GA2_50, GA2_75, HS10_100, HS20_100, HS25_125, HS25_150, HSXn_150, HSXt_150, MinS_50, MSv1_250, MSv3_250, NS50_75)")]
    pub platform: String,

    #[arg(long, action, help = "Equivalent to --depth 100.0 --platform HS25_150")]
    pub good: bool,

    #[arg(long, action, help = "Equivalent to --depth 40.0 --platform HS25_125")]
    pub medium: bool,

    #[arg(long, action, help = "Equivalent to --depth 40.0 --platform HS10_100")]
    pub bad: bool,

    #[arg(long, default_value_t = 10000, help = "Read length")]
    pub length: u32,

    #[arg(long = "length_sigma", default_value_t = 1.0, help = "Sigma for the log-normal distribution used for read lengths")]
    pub length_sigma: f64,

    #[arg(long = "length_max", default_value_t = 100000, help = "Maximum allowed read length")]
    pub length_max: u64,

    #[arg(long = "id_alpha", default_value_t = 12.0, help = "Alpha parameter for the beta distribution used to get read identity")]
    pub id_alpha: f64,

    #[arg(long = "id_beta", default_value_t = 3.0, help = "Beta parameter for the beta distribution used to get read identity")]
    pub id_beta: f64,

    #[arg(long = "id_max", default_value_t = 0.95, help = "Maximum allowed identity")]
    pub id_max: f64,

    #[arg(long = "model_qc", default_value = "model_qc_clr", help = "Model QC file for pbsim")]
    pub model_qc: String,

    #[arg(long = "good_nanopore", action, help = "Equivalent to --length 20000 --id_alpha 13 --id_beta 2 --id_max 0.98")]
    pub good_nanopore: bool,

    #[arg(long = "medium_nanopore", action, help = "Equivalent to --length 10000 --id_alpha 12 --id_beta 3 --id_max 0.95")]
    pub medium_nanopore: bool,

    #[arg(long = "bad_nanopore", action, help = "Equivalent to --length 5000 --id_alpha 11 --id_beta 4 --id_max 0.9")]
    pub bad_nanopore: bool,

    #[arg(long = "good_pacbio", action, help = "Equivalent to --length 20000 --id_alpha 90 --id_beta 10 --id_max 1.0")]
    pub good_pacbio: bool,

    #[arg(long = "medium_pacbio", action, help = "Equivalent to --length 10000 --id_alpha 85 --id_beta 15 --id_max 1.0")]
    pub medium_pacbio: bool,

    #[arg(long = "bad_pacbio", action, help = "Equivalent to --length 5000 --id_alpha 75 --id_beta 25 --id_max 1.0")]
    pub bad_pacbio: bool,
}
