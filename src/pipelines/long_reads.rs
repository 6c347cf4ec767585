use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Beta, Distribution, LogNormal};
use tokio::process::Command;

use crate::config::defs::{LONG_READ_PRESETS, PBSIM_TAG, RunConfig};
use crate::utils::fasta::{RefSeq, load_fasta, relative_depths, write_fasta_record};
use crate::utils::fastq::{load_first_fastq_read, write_fastq_record};
use crate::utils::file::{absolute, create_writer};
use crate::utils::system::generate_rng;

/// Resolved options for one long read simulation run.
struct LongReadOptions {
    reference: PathBuf,
    long_out: PathBuf,
    depth: f64,
    length: u32,
    length_sigma: f64,
    length_max: u64,
    id_alpha: f64,
    id_beta: f64,
    id_max: f64,
    model_qc: PathBuf,
}

pub async fn run(config: &RunConfig) -> Result<()> {
    let opts = LongReadOptions::from_config(config)?;
    println!();
    println!("Making fake long reads for {}", opts.reference.display());
    println!("  read length:   {}", opts.length);
    println!(
        "  read identity: {:.1}%",
        100.0 * opts.id_alpha / (opts.id_alpha + opts.id_beta)
    );
    println!("  output:        {}", opts.long_out.display());
    println!();

    let mut rng = generate_rng(config.args.seed);
    make_fake_long_reads(&opts, &mut rng).await?;
    println!();
    Ok(())
}

impl LongReadOptions {
    fn from_config(config: &RunConfig) -> Result<Self> {
        let args = &config.args;

        let presets = [
            (args.good_nanopore, "good_nanopore"),
            (args.medium_nanopore, "medium_nanopore"),
            (args.bad_nanopore, "bad_nanopore"),
            (args.good_pacbio, "good_pacbio"),
            (args.medium_pacbio, "medium_pacbio"),
            (args.bad_pacbio, "bad_pacbio"),
        ];
        if presets.iter().filter(|(flag, _)| *flag).count() > 1 {
            bail!("Only one preset can be used at a time");
        }

        let mut length = args.length;
        let mut id_alpha = args.id_alpha;
        let mut id_beta = args.id_beta;
        let mut id_max = args.id_max;
        for (flag, name) in presets {
            if flag {
                (length, id_alpha, id_beta, id_max) = LONG_READ_PRESETS[name];
            }
        }

        let model_qc = absolute(&config.cwd, &args.model_qc);
        if !model_qc.is_file() {
            bail!("Could not find {}", model_qc.display());
        }

        let reference = args
            .reference
            .as_ref()
            .map(|v| absolute(&config.cwd, v))
            .ok_or_else(|| anyhow!("--reference is required for this module"))?;
        let long_out = args
            .long_out
            .as_ref()
            .map(|v| absolute(&config.cwd, v))
            .ok_or_else(|| anyhow!("--long is required for this module"))?;

        Ok(LongReadOptions {
            reference,
            long_out,
            depth: args.depth,
            length,
            length_sigma: args.length_sigma,
            length_max: args.length_max,
            id_alpha,
            id_beta,
            id_max,
            model_qc,
        })
    }
}

/// Draws a read length from a log-normal distribution, rejecting zero and
/// anything over the maximum.
fn sample_read_length(rng: &mut StdRng, length: u32, sigma: f64, max_length: u64) -> Result<u64> {
    let log_normal =
        LogNormal::new(0.0, sigma).map_err(|e| anyhow!("Invalid --length_sigma: {}", e))?;
    loop {
        let read_length = (length as f64 * log_normal.sample(rng)).round() as u64;
        if read_length > 0 && read_length <= max_length {
            return Ok(read_length);
        }
    }
}

/// Draws a read identity from a beta distribution, rejecting zero and
/// anything over the maximum.
fn sample_read_identity(rng: &mut StdRng, alpha: f64, beta: f64, max_id: f64) -> Result<f64> {
    let dist =
        Beta::new(alpha, beta).map_err(|e| anyhow!("Invalid --id_alpha/--id_beta: {}", e))?;
    loop {
        let read_id = dist.sample(rng);
        if read_id > 0.0 && read_id <= max_id {
            return Ok(read_id);
        }
    }
}

async fn make_fake_long_reads(opts: &LongReadOptions, rng: &mut StdRng) -> Result<()> {
    let references = load_fasta(&opts.reference)?;
    let depths = relative_depths(&references)?;

    // Each entry is one simulated read's sequence and quality line.
    let mut long_reads: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    println!("Reference\tLength\tTarget depth\tFinal depth");

    for (i, reference) in references.iter().enumerate() {
        let target_depth = depths[i] * opts.depth;
        print!("{}\t{}\t{}", reference.name, reference.len(), target_depth);
        if reference.is_empty() {
            println!("\t0");
            continue;
        }

        let mut current_bases = 0u64;
        let mut current_depth = 0.0;
        while current_depth < target_depth {
            let mut read_length =
                sample_read_length(rng, opts.length, opts.length_sigma, opts.length_max)?;
            let read_id = sample_read_identity(rng, opts.id_alpha, opts.id_beta, opts.id_max)?;

            // Don't let the read get longer than the actual sequence.
            if read_length > reference.len() {
                read_length = reference.len();
            }

            // Circular sequences are rotated so reads cross the origin.
            let random_start = if reference.circular {
                rng.random_range(0..reference.seq.len())
            } else {
                0
            };

            long_reads.push(run_pbsim(reference, random_start, read_length, read_id, opts, rng).await?);

            current_bases += read_length;
            current_depth = current_bases as f64 / reference.len() as f64;
        }
        println!("\t{}", current_depth);
    }

    long_reads.retain(|(seq, _)| !seq.is_empty());
    long_reads.shuffle(rng);

    let mut reads = create_writer(&opts.long_out)
        .with_context(|| format!("Failed to create {}", opts.long_out.display()))?;
    for (i, (seq, qual)) in long_reads.iter().enumerate() {
        write_fastq_record(&mut reads, &format!("long_read_{}", i + 1), None, seq, qual)?;
    }
    reads.finish()?;
    Ok(())
}

/// Runs pbsim for a single read over a rotated copy of the reference.
async fn run_pbsim(
    reference: &RefSeq,
    random_start: usize,
    read_length: u64,
    read_id: f64,
    opts: &LongReadOptions,
    rng: &mut StdRng,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let work_dir = tempfile::tempdir().context("Failed to create a temp directory")?;
    let input_fasta = work_dir.path().join("rotated.fasta");
    {
        let mut rotated = Vec::with_capacity(reference.seq.len());
        rotated.extend_from_slice(&reference.seq[random_start..]);
        rotated.extend_from_slice(&reference.seq[..random_start]);
        let mut file = std::fs::File::create(&input_fasta)?;
        write_fasta_record(&mut file, "ref", None, &rotated)?;
    }

    // A depth just above one read's worth makes pbsim emit a single read.
    let depth = 1.5 * read_length as f64 / reference.len() as f64;
    let prefix = work_dir.path().join("sim");

    let output = Command::new(PBSIM_TAG)
        .arg("--depth")
        .arg(depth.to_string())
        .arg("--length-min")
        .arg(read_length.to_string())
        .arg("--length-max")
        .arg(read_length.to_string())
        .arg("--length-mean")
        .arg(read_length.to_string())
        .arg("--length-sd")
        .arg("0")
        .arg("--accuracy-min")
        .arg(read_id.to_string())
        .arg("--accuracy-max")
        .arg(read_id.to_string())
        .arg("--accuracy-mean")
        .arg(read_id.to_string())
        .arg("--accuracy-sd")
        .arg("0")
        .arg("--model_qc")
        .arg(&opts.model_qc)
        .arg("--difference-ratio")
        .arg("10:40:30")
        .arg("--seed")
        .arg(rng.random_range(0..1_000_000u64).to_string())
        .arg("--prefix")
        .arg(&prefix)
        .arg(&input_fasta)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}. Is it installed?", PBSIM_TAG))?;
    if !output.status.success() {
        bail!(
            "{} encountered an error:\n{}{}",
            PBSIM_TAG,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let output_fastq = PathBuf::from(format!("{}_0001.fastq", prefix.display()));
    load_first_fastq_read(&output_fastq)
        .with_context(|| format!("Could not find the output reads of {}", PBSIM_TAG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Arguments;
    use crate::utils::system::generate_rng;

    fn config_with(args: Arguments, cwd: &std::path::Path) -> RunConfig {
        RunConfig {
            cwd: cwd.to_path_buf(),
            args,
        }
    }

    fn base_args() -> Arguments {
        Arguments {
            module: "long_reads".to_string(),
            reference: Some("ref.fasta".to_string()),
            long_out: Some("reads_long.fastq.gz".to_string()),
            depth: 50.0,
            length: 10000,
            length_sigma: 1.0,
            length_max: 100000,
            id_alpha: 12.0,
            id_beta: 3.0,
            id_max: 0.95,
            model_qc: "model_qc_clr".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_preset_resolution() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("model_qc_clr"), "")?;

        let mut args = base_args();
        args.good_nanopore = true;
        let opts = LongReadOptions::from_config(&config_with(args, dir.path()))?;
        assert_eq!(opts.length, 20000);
        assert_eq!(opts.id_alpha, 13.0);
        assert_eq!(opts.id_beta, 2.0);
        assert_eq!(opts.id_max, 0.98);
        Ok(())
    }

    #[test]
    fn test_conflicting_presets_are_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("model_qc_clr"), "")?;

        let mut args = base_args();
        args.good_nanopore = true;
        args.bad_pacbio = true;
        assert!(LongReadOptions::from_config(&config_with(args, dir.path())).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_model_qc_is_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let args = base_args();
        assert!(LongReadOptions::from_config(&config_with(args, dir.path())).is_err());
        Ok(())
    }

    #[test]
    fn test_sampled_lengths_respect_bounds() -> Result<()> {
        let mut rng = generate_rng(Some(7));
        for _ in 0..100 {
            let length = sample_read_length(&mut rng, 10000, 1.0, 50000)?;
            assert!(length > 0 && length <= 50000);
        }
        Ok(())
    }

    #[test]
    fn test_sampled_identities_respect_bounds() -> Result<()> {
        let mut rng = generate_rng(Some(7));
        for _ in 0..100 {
            let read_id = sample_read_identity(&mut rng, 12.0, 3.0, 0.95)?;
            assert!(read_id > 0.0 && read_id <= 0.95);
        }
        Ok(())
    }
}
