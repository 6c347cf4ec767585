use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use log::warn;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::process::Command;

use crate::config::defs::{ART_PLATFORMS, ART_TAG, ILLUMINA_PRESETS, RunConfig};
use crate::utils::fasta::{load_fasta, relative_depths, write_fasta_record};
use crate::utils::fastq::{load_fastq, write_fastq_record};
use crate::utils::file::{absolute, create_writer};
use crate::utils::system::generate_rng;

/// Resolved options for one Illumina simulation run.
struct IlluminaOptions {
    reference: PathBuf,
    short_1: PathBuf,
    short_2: PathBuf,
    rotation_count: u32,
    depth: f64,
    seq_sys: String,
    read_length: u32,
    insert_size: u32,
    insert_stdev: u32,
}

/// One simulated read pair. Pooled, shuffled and renamed before writing.
struct ReadPair {
    seq_1: Vec<u8>,
    qual_1: Vec<u8>,
    seq_2: Vec<u8>,
    qual_2: Vec<u8>,
}

pub async fn run(config: &RunConfig) -> Result<()> {
    let opts = IlluminaOptions::from_config(config)?;
    println!();
    println!("Making fake Illumina reads for {}", opts.reference.display());
    println!("  platform:     {}", opts.seq_sys);
    println!("  read length:  {}", opts.read_length);
    println!("  insert size:  {}", opts.insert_size);
    println!("  insert stdev: {}", opts.insert_stdev);
    println!("  output 1:     {}", opts.short_1.display());
    println!("  output 2:     {}", opts.short_2.display());
    println!();

    let mut rng = generate_rng(config.args.seed);
    make_fake_short_reads(&opts, &mut rng).await?;
    println!();
    Ok(())
}

impl IlluminaOptions {
    fn from_config(config: &RunConfig) -> Result<Self> {
        let args = &config.args;

        let preset_count = [args.good, args.medium, args.bad]
            .iter()
            .filter(|&&flag| flag)
            .count();
        if preset_count > 1 {
            bail!("Only one preset can be used at a time");
        }

        let mut depth = args.depth;
        let mut platform = args.platform.clone();
        for (flag, tier) in [(args.good, "good"), (args.medium, "medium"), (args.bad, "bad")] {
            if flag {
                let (preset_depth, preset_platform) = ILLUMINA_PRESETS[tier];
                depth = preset_depth;
                platform = preset_platform.to_string();
            }
        }

        if !ART_PLATFORMS.contains(&platform.as_str()) {
            bail!(
                "--platform must be one of the following: {}",
                ART_PLATFORMS.join(", ")
            );
        }
        let (seq_sys, read_length) = platform
            .split_once('_')
            .ok_or_else(|| anyhow!("Invalid platform token: {}", platform))?;
        let read_length: u32 = read_length
            .parse()
            .with_context(|| format!("Invalid platform read length in {}", platform))?;
        let insert_size = 500u32.min((read_length as f64 * 3.5) as u32);
        let insert_stdev = 25u32.max(insert_size / 6);

        Ok(IlluminaOptions {
            reference: required_path(config, &args.reference, "--reference")?,
            short_1: required_path(config, &args.short_1, "--short_1")?,
            short_2: required_path(config, &args.short_2, "--short_2")?,
            rotation_count: args.rotation_count,
            depth,
            seq_sys: seq_sys.to_string(),
            read_length,
            insert_size,
            insert_stdev,
        })
    }
}

fn required_path(config: &RunConfig, value: &Option<String>, flag: &str) -> Result<PathBuf> {
    value
        .as_ref()
        .map(|v| absolute(&config.cwd, v))
        .ok_or_else(|| anyhow!("{} is required for this module", flag))
}

async fn make_fake_short_reads(opts: &IlluminaOptions, rng: &mut StdRng) -> Result<()> {
    let references = load_fasta(&opts.reference)?;
    let depths = relative_depths(&references)?;

    let mut short_read_pairs: Vec<ReadPair> = Vec::new();
    println!("Reference\tLength\tDepth");

    for (i, reference) in references.iter().enumerate() {
        let short_depth = depths[i] * opts.depth;
        println!("{}\t{}\t{}", reference.name, reference.len(), short_depth);
        if reference.is_empty() {
            warn!("Skipping empty reference sequence {}", reference.name);
            continue;
        }

        if reference.circular {
            // Random rotations so coverage crosses the origin of a
            // circular sequence.
            let depth_per_rotation = short_depth / opts.rotation_count as f64;
            for _ in 0..opts.rotation_count {
                let random_start = rng.random_range(0..reference.seq.len());
                let rotated = rotate_sequence(&reference.seq, random_start);
                short_read_pairs
                    .extend(run_art(&reference.name, &rotated, depth_per_rotation, opts).await?);
            }
        } else {
            short_read_pairs
                .extend(run_art(&reference.name, &reference.seq, short_depth, opts).await?);
        }
    }

    short_read_pairs.shuffle(rng);

    let mut reads_1 = create_writer(&opts.short_1)
        .with_context(|| format!("Failed to create {}", opts.short_1.display()))?;
    let mut reads_2 = create_writer(&opts.short_2)
        .with_context(|| format!("Failed to create {}", opts.short_2.display()))?;
    for (i, pair) in short_read_pairs.iter().enumerate() {
        let read_name = format!("short_read_{}", i + 1);
        write_fastq_record(&mut reads_1, &format!("{}/1", read_name), None, &pair.seq_1, &pair.qual_1)?;
        write_fastq_record(&mut reads_2, &format!("{}/2", read_name), None, &pair.seq_2, &pair.qual_2)?;
    }
    reads_1.finish()?;
    reads_2.finish()?;
    Ok(())
}

fn rotate_sequence(seq: &[u8], start: usize) -> Vec<u8> {
    let mut rotated = Vec::with_capacity(seq.len());
    rotated.extend_from_slice(&seq[start..]);
    rotated.extend_from_slice(&seq[..start]);
    rotated
}

/// Runs ART on one (possibly rotated) sequence and collects its paired
/// output reads. ART failures are fatal with ART's own output attached.
async fn run_art(
    ref_name: &str,
    seq: &[u8],
    depth: f64,
    opts: &IlluminaOptions,
) -> Result<Vec<ReadPair>> {
    let work_dir = tempfile::tempdir().context("Failed to create a temp directory")?;
    let input_fasta = work_dir.path().join("rotated.fasta");
    {
        let mut file = std::fs::File::create(&input_fasta)?;
        write_fasta_record(&mut file, ref_name, None, seq)?;
    }
    let out_prefix = work_dir.path().join("art_output");

    let output = Command::new(ART_TAG)
        .arg("--seqSys")
        .arg(&opts.seq_sys)
        .arg("--in")
        .arg(&input_fasta)
        .arg("--len")
        .arg(opts.read_length.to_string())
        .arg("--mflen")
        .arg(opts.insert_size.to_string())
        .arg("--sdev")
        .arg(opts.insert_stdev.to_string())
        .arg("--fcov")
        .arg(depth.to_string())
        .arg("--out")
        .arg(&out_prefix)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}. Is it installed?", ART_TAG))?;
    if !output.status.success() {
        bail!(
            "{} encountered an error:\n{}{}",
            ART_TAG,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let fastq_1 = PathBuf::from(format!("{}1.fq", out_prefix.display()));
    let fastq_2 = PathBuf::from(format!("{}2.fq", out_prefix.display()));
    let reads_1 = load_fastq(&fastq_1).context("Could not find the simulator's output read files")?;
    let reads_2 = load_fastq(&fastq_2).context("Could not find the simulator's output read files")?;
    if reads_1.len() != reads_2.len() {
        bail!("{} produced unpaired output files", ART_TAG);
    }

    Ok(reads_1
        .into_iter()
        .zip(reads_2)
        .map(|(r1, r2)| ReadPair {
            seq_1: r1.seq,
            qual_1: r1.qual,
            seq_2: r2.seq,
            qual_2: r2.qual,
        })
        .collect())
}
