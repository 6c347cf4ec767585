use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use log::warn;
use tokio::process::Command;

use crate::config::defs::{
    MIN_ASSEMBLY_LENGTH, QUAST_REPORT_NAME, QUAST_TAG, RunConfig,
};
use crate::utils::commands::CommandSet;
use crate::utils::fasta::{load_fasta, total_length};
use crate::utils::file::absolute;
use crate::utils::read_sets::{ReadSet, SetType, group_fake_reads, group_real_reads};
use crate::utils::table::{ResultRecord, ResultsTable};
use crate::utils::term::{bold_yellow_underline, green, red};

/// Identity of the assembler under test, resolved once per run.
pub struct AssemblerId {
    pub name: String,
    pub setting: String,
    pub version: String,
}

pub async fn run(config: &RunConfig) -> Result<()> {
    println!("\n-------------\n Assembler comparison\n-------------\n");

    let args = &config.args;
    if args.real_read_dir.is_none() && args.fake_read_dir.is_none() {
        bail!("You must supply either --real_read_dir or --fake_read_dir");
    }

    let mut read_sets = Vec::new();
    if let Some(dir) = &args.real_read_dir {
        read_sets.extend(group_real_reads(&required_dir(&config.cwd, dir)?)?);
    }
    if let Some(dir) = &args.fake_read_dir {
        read_sets.extend(group_fake_reads(&required_dir(&config.cwd, dir)?)?);
    }

    let command_file = args
        .command_file
        .as_ref()
        .ok_or_else(|| anyhow!("--command_file is required for the compare module"))?;
    let commands = CommandSet::load(&absolute(&config.cwd, command_file))?;

    let out_dir = args
        .out_dir
        .as_ref()
        .map(|dir| absolute(&config.cwd, dir))
        .ok_or_else(|| anyhow!("--out is required for the compare module"))?;
    let table = ResultsTable::create(&out_dir)?;
    let assembly_dir = out_dir.join(format!("ASSEMBLY_TEMP_{}", std::process::id()));

    // Remove read sets this assembler can't handle, e.g. a hybrid read set
    // for a short-read-only assembler.
    read_sets.retain(|read_set| match read_set.set_type() {
        SetType::ShortOnly => commands.can_do_short_only(),
        SetType::Hybrid => commands.can_do_hybrid(),
        SetType::Incomplete => false,
    });

    if let Some(ref_dir) = &args.ref_dir {
        let ref_dir = required_dir(&config.cwd, ref_dir)?;
        for read_set in &mut read_sets {
            read_set.find_reference(&ref_dir)?;
        }
    }

    println!();
    println!("{}", bold_yellow_underline("Read sets to assemble"));
    if read_sets.is_empty() {
        println!("None");
    }
    for read_set in &read_sets {
        println!("{}", read_set);
    }
    println!("\nAssembly temp directory: {}\n", assembly_dir.display());

    let assembler = AssemblerId {
        name: commands.assembler_name(),
        setting: commands.assembler_setting(),
        version: commands.assembler_version().await?,
    };

    for read_set in &read_sets {
        println!();
        println!(
            "{}",
            bold_yellow_underline(&format!("Read set: {}", read_set.set_name))
        );

        // A pre-existing final FASTA means a previous run finished this
        // read set, so crashed/stopped runs resume without redoing work.
        let (copied_fasta_name, copied_fasta) =
            copied_assembly_name(read_set, &assembler, &out_dir);
        if copied_fasta.is_file() {
            println!("Already done");
            continue;
        }

        fs::create_dir_all(&assembly_dir)
            .with_context(|| format!("Failed to create {}", assembly_dir.display()))?;
        let (assembly_time, assembly_stdout) =
            execute_commands(&commands, read_set, &assembly_dir).await?;
        evaluate_results(
            &commands,
            read_set,
            &assembly_dir,
            assembly_time,
            &assembly_stdout,
            &out_dir,
            &assembler,
            &copied_fasta_name,
            &copied_fasta,
            &table,
        )
        .await?;
        fs::remove_dir_all(&assembly_dir)
            .with_context(|| format!("Failed to remove {}", assembly_dir.display()))?;
    }
    Ok(())
}

fn required_dir(cwd: &Path, path: &str) -> Result<PathBuf> {
    let dir = absolute(cwd, path);
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    Ok(dir)
}

/// Runs the read set's substituted commands sequentially in the scratch
/// directory, returning the total wall-clock time in seconds and the
/// concatenated output of every command.
///
/// A command's non-zero exit is captured and execution continues; whether
/// anything usable came out is decided later by the final-output check.
pub async fn execute_commands(
    commands: &CommandSet,
    read_set: &ReadSet,
    assembly_dir: &Path,
) -> Result<(f64, String)> {
    let set_commands = match read_set.set_type() {
        SetType::ShortOnly => commands.short_read_assembly_commands(read_set)?,
        _ => commands.hybrid_assembly_commands(read_set)?,
    };

    let start = Instant::now();
    let mut all_output = String::new();
    for command in &set_commands {
        println!("{}", command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(assembly_dir)
            .output()
            .await
            .with_context(|| format!("Failed to run: {}", command))?;
        all_output.push_str(&String::from_utf8_lossy(&output.stdout));
        all_output.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            warn!("Command exited with {}: {}", output.status, command);
        }
        println!();
    }
    Ok((start.elapsed().as_secs_f64(), all_output))
}

#[allow(clippy::too_many_arguments)]
async fn evaluate_results(
    commands: &CommandSet,
    read_set: &ReadSet,
    assembly_dir: &Path,
    assembly_time: f64,
    assembly_stdout: &str,
    out_dir: &Path,
    assembler: &AssemblerId,
    copied_fasta_name: &str,
    copied_fasta: &Path,
    table: &ResultsTable,
) -> Result<()> {
    let mut result = ResultRecord::new();
    result.set("Read set name", &read_set.set_name);
    result.set("Read set type", read_set.set_type().to_string());
    result.set("Real or fake reads", read_set.real_or_fake());
    result.set("Fake Illumina read quality", read_set.fake_illumina_quality());
    result.set("Fake long read quality", read_set.fake_long_quality());
    result.set("Read files", read_set.read_list_str());

    let (ref_count, longest_ref) = match &read_set.reference {
        Some(reference) => {
            result.set("Reference name", read_set.reference_name());
            let ref_seqs = load_fasta(reference)?;
            let lengths: Vec<u64> = ref_seqs.iter().map(|s| s.len()).collect();
            result.set("Reference total length", total_length(&ref_seqs).to_string());
            result.set("# reference sequences", ref_seqs.len().to_string());
            result.set("Reference sequence lengths", join_values(&lengths));
            result.set(
                "Reference sequence depths",
                join_values(&ref_seqs.iter().map(|s| s.depth).collect::<Vec<_>>()),
            );
            result.set(
                "Reference sequence circularity",
                ref_seqs
                    .iter()
                    .map(|s| if s.circular { "yes" } else { "no" })
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            (ref_seqs.len(), lengths.iter().max().copied().unwrap_or(0))
        }
        None => (0, 0),
    };

    result.set("Assembler", &assembler.name);
    result.set("Assembler setting/output", &assembler.setting);
    result.set("Assembler version", &assembler.version);

    let commands_str = match read_set.set_type() {
        SetType::ShortOnly => commands.short_read_assembly_commands(read_set)?.join("; "),
        _ => commands.hybrid_assembly_commands(read_set)?.join("; "),
    };
    result.set("Assembly command(s)", commands_str);
    result.set("Assembly kmer size", commands.kmer_size());

    // Check to see that the final FASTA exists and contains sequence.
    let final_fasta = assembly_dir.join(&commands.final_assembly_fasta);
    let failed = if !final_fasta.is_file() {
        println!(
            "{}",
            red(&format!("assembly failed: {} does not exist", final_fasta.display()))
        );
        true
    } else {
        match load_fasta(&final_fasta) {
            Ok(seqs) => {
                let length = total_length(&seqs);
                if length == 0 {
                    println!(
                        "{}",
                        red(&format!("assembly failed: {} is empty", final_fasta.display()))
                    );
                    true
                } else if length < MIN_ASSEMBLY_LENGTH {
                    println!(
                        "{}",
                        red(&format!(
                            "assembly failed: {} contains only {} bp",
                            final_fasta.display(),
                            length
                        ))
                    );
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                println!(
                    "{}",
                    red(&format!(
                        "assembly failed: could not read {}: {}",
                        final_fasta.display(),
                        e
                    ))
                );
                true
            }
        }
    };

    if failed {
        result.set("Assembly result", "fail");
    } else {
        result.set("Assembly result", "success");
        println!("{}", green("assembly succeeded"));
    }

    let assembly_stdout_name = copied_fasta_name.replace(".fasta", ".out");
    let assembly_stdout_path = out_dir.join(&assembly_stdout_name);
    fs::write(&assembly_stdout_path, assembly_stdout)
        .with_context(|| format!("Failed to write {}", assembly_stdout_path.display()))?;
    println!("OUTPUT -> {}", assembly_stdout_path.display());

    if !failed {
        fs::copy(&final_fasta, copied_fasta).with_context(|| {
            format!("Failed to copy {} to {}", final_fasta.display(), copied_fasta.display())
        })?;
        println!("{} -> {}", final_fasta.display(), copied_fasta.display());

        if let Some(graph_name) = &commands.final_assembly_graph {
            let final_graph = assembly_dir.join(graph_name);
            if !final_graph.is_file() {
                bail!("Could not find {}", final_graph.display());
            }
            let extension = if graph_name.ends_with(".gfa") {
                "gfa"
            } else if graph_name.ends_with(".fastg") {
                "fastg"
            } else {
                bail!("Assembly graph must be gfa or fastg");
            };
            let copied_graph_name =
                copied_fasta_name.replace(".fasta", &format!(".{}", extension));
            let copied_graph = out_dir.join(&copied_graph_name);
            fs::copy(&final_graph, &copied_graph).with_context(|| {
                format!("Failed to copy {} to {}", final_graph.display(), copied_graph.display())
            })?;
            println!("{} -> {}", final_graph.display(), copied_graph.display());
            result.set("Assembly graph", copied_graph_name);
        }

        result.set("Assembly time (seconds)", format!("{:.1}", assembly_time));
        result.set("Assembly FASTA", copied_fasta_name);

        let merged = run_quast(copied_fasta, read_set, out_dir, &mut result).await?;

        if merged && read_set.reference.is_some() {
            derive_classifications(&mut result, ref_count, longest_ref);
        }
    }

    table.append(&result)?;
    println!();
    Ok(())
}

fn join_values<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Deterministic name of the permanent copy of a read set's assembly.
pub fn copied_assembly_name(
    read_set: &ReadSet,
    assembler: &AssemblerId,
    out_dir: &Path,
) -> (String, PathBuf) {
    let mut copied_fasta_name = format!("{}__{}", read_set.set_name, assembler.name);
    if !assembler.setting.is_empty() {
        copied_fasta_name.push('_');
        copied_fasta_name.push_str(&assembler.setting);
    }
    copied_fasta_name.push('_');
    copied_fasta_name.push_str(&assembler.version);
    copied_fasta_name.push_str(".fasta");
    let copied_fasta = out_dir.join(&copied_fasta_name);
    (copied_fasta_name, copied_fasta)
}

/// Runs the external QC tool and merges recognized report metrics into the
/// result. Returns false (leaving metrics blank) when no report came back.
async fn run_quast(
    fasta: &Path,
    read_set: &ReadSet,
    out_dir: &Path,
    result: &mut ResultRecord,
) -> Result<bool> {
    let quast_dir = out_dir.join(format!("QUAST_TEMP_{}", std::process::id()));

    let mut quast_command = Command::new(QUAST_TAG);
    quast_command.arg(fasta);
    if let Some(reference) = &read_set.reference {
        quast_command.arg("-R").arg(reference);
    }
    quast_command
        .arg("-o")
        .arg(&quast_dir)
        .arg("-l")
        .arg(format!("\"{}\"", read_set.set_name.replace(',', "")))
        .arg("--no-plots")
        .arg("--strict-NA");

    println!();
    println!("{:?}", quast_command.as_std());
    let output = quast_command
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}. Is it installed?", QUAST_TAG))?;
    if !output.status.success() {
        warn!("{} exited with {}", QUAST_TAG, output.status);
    }

    let report_path = quast_dir.join(QUAST_REPORT_NAME);
    let report = match fs::read_to_string(&report_path) {
        Ok(report) => report,
        Err(e) => {
            warn!("No QC report at {}: {}", report_path.display(), e);
            return Ok(false);
        }
    };
    for line in report.lines() {
        let mut parts = line.trim().split('\t');
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if name.is_empty() || name == "Assembly" {
            continue;
        }
        result.set(name, value);
    }

    fs::remove_dir_all(&quast_dir)
        .with_context(|| format!("Failed to remove {}", quast_dir.display()))?;
    Ok(true)
}

fn parse_i64(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}

/// Derives the Complete / Structurally perfect / Completely perfect
/// classifications from the merged QC metrics. Fields whose inputs are
/// missing or non-numeric stay blank.
pub fn derive_classifications(result: &mut ResultRecord, ref_count: usize, longest_ref: u64) {
    let (Some(extensive), Some(local)) = (
        parse_i64(result.get("# misassemblies")),
        parse_i64(result.get("# local misassemblies")),
    ) else {
        warn!("Misassembly counts missing from the QC report");
        return;
    };
    let total_misassemblies = extensive + local;
    result.set("Total misassemblies", total_misassemblies.to_string());

    // The assembly is considered complete if the number of contigs matches
    // the reference sequence count and the largest contig matches the
    // largest reference to 10%.
    let (Some(contigs), Some(largest_contig)) = (
        parse_i64(result.get("# contigs")),
        parse_i64(result.get("Largest contig")),
    ) else {
        return;
    };
    let count_match = ref_count as i64 == contigs;
    let longest_contig_diff = (longest_ref as i64 - largest_contig).abs();
    let longest_match =
        longest_ref > 0 && (longest_contig_diff as f64 / longest_ref as f64) < 0.1;
    let complete = count_match && longest_match;
    result.set("Complete", if complete { "yes" } else { "no" });

    // Structurally perfect needs no mistakes and nothing extra
    // (mismatches and small indels are still okay).
    let (Some(unaligned_length), Some(duplication_ratio)) = (
        parse_i64(result.get("Unaligned length")),
        parse_f64(result.get("Duplication ratio")),
    ) else {
        return;
    };
    let structurally_perfect = complete
        && total_misassemblies == 0
        && unaligned_length == 0
        && duplication_ratio == 1.0;
    result.set(
        "Structurally perfect",
        if structurally_perfect { "yes" } else { "no" },
    );

    // Completely perfect needs no mistakes at all.
    let (Some(mismatches), Some(indels), Some(ref_total_length), Some(assembly_total_length)) = (
        parse_f64(result.get("# mismatches per 100 kbp")),
        parse_f64(result.get("# indels per 100 kbp")),
        parse_i64(result.get("Reference total length")),
        parse_i64(result.get("Total length")),
    ) else {
        return;
    };
    let completely_perfect = structurally_perfect
        && mismatches == 0.0
        && indels == 0.0
        && ref_total_length == assembly_total_length;
    result.set(
        "Completely perfect",
        if completely_perfect { "yes" } else { "no" },
    );
}
