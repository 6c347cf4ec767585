use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tokio::process::Command;

use crate::config::defs::{
    DEFAULT_GENOME_SIZE, GENOME_SIZE_TOKEN, LONG_READS_TOKEN, SHORT_READS_1_TOKEN,
    SHORT_READS_2_TOKEN,
};
use crate::utils::fasta::{linear_count, load_fasta, total_length};
use crate::utils::read_sets::ReadSet;

pub const SHORT_SECTION_HEADER: &str = "# Short read assembly commands";
pub const HYBRID_SECTION_HEADER: &str = "# Hybrid assembly commands";
pub const FINAL_SECTION_HEADER: &str = "# Final assembly files";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Short,
    Hybrid,
    Final,
}

/// Assembler invocation templates loaded from a command file, with the
/// final-output filenames the assembler is expected to leave behind.
#[derive(Debug, Clone)]
pub struct CommandSet {
    pub short_read_commands: Vec<String>,
    pub hybrid_commands: Vec<String>,
    pub final_assembly_fasta: String,
    pub final_assembly_graph: Option<String>,
}

impl CommandSet {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read command file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Bad command file {}", path.display()))
    }

    /// Parses the three-section command file format. A blank line ends a
    /// section; `#` starts an inline comment on content lines.
    pub fn parse(text: &str) -> Result<Self> {
        let mut short_read_commands = Vec::new();
        let mut hybrid_commands = Vec::new();
        let mut final_assembly_files = Vec::new();

        let mut mode: Option<Section> = None;
        for line in text.lines() {
            let line = line.trim();
            let cleaned_line = line.split('#').next().unwrap_or_default().trim();
            if line == SHORT_SECTION_HEADER {
                mode = Some(Section::Short);
            } else if line == HYBRID_SECTION_HEADER {
                mode = Some(Section::Hybrid);
            } else if line == FINAL_SECTION_HEADER {
                mode = Some(Section::Final);
            } else if line.is_empty() {
                mode = None;
            } else if !cleaned_line.is_empty() {
                match mode {
                    Some(Section::Short) => short_read_commands.push(cleaned_line.to_string()),
                    Some(Section::Hybrid) => hybrid_commands.push(cleaned_line.to_string()),
                    Some(Section::Final) => final_assembly_files.push(cleaned_line.to_string()),
                    None => {}
                }
            }
        }

        if (short_read_commands.is_empty() && hybrid_commands.is_empty())
            || final_assembly_files.is_empty()
        {
            bail!("No assembly commands or no final assembly files declared");
        }

        let final_assembly_fasta = final_assembly_files
            .iter()
            .find(|f| f.ends_with(".fasta") || f.ends_with(".fa"))
            .cloned()
            .ok_or_else(|| anyhow!("No final assembly FASTA (.fasta/.fa) declared"))?;
        let final_assembly_graph = final_assembly_files
            .iter()
            .find(|f| f.ends_with(".gfa") || f.ends_with(".fastg"))
            .cloned();

        Ok(CommandSet {
            short_read_commands,
            hybrid_commands,
            final_assembly_fasta,
            final_assembly_graph,
        })
    }

    pub fn can_do_short_only(&self) -> bool {
        !self.short_read_commands.is_empty()
    }

    pub fn can_do_hybrid(&self) -> bool {
        !self.hybrid_commands.is_empty()
    }

    fn all_commands_str(&self) -> String {
        let mut commands = self.short_read_commands.join(" ");
        commands.push(' ');
        commands.push_str(&self.hybrid_commands.join(" "));
        commands
    }

    /// Recognizes the assembler from the command text. Empty string when
    /// no known assembler appears.
    pub fn assembler_name(&self) -> String {
        let commands = self.all_commands_str();
        if commands.contains("jsa.np.gapcloser") || commands.contains("jsa.np.npscarf") {
            "npScarf"
        } else if commands.contains("unicycler") {
            "Unicycler"
        } else if commands.contains("abyss") {
            "ABySS"
        } else if commands.contains("spades") {
            "SPAdes"
        } else if commands.contains("velveth") {
            "Velvet"
        } else if commands.starts_with("canu") {
            "Canu"
        } else {
            ""
        }
        .to_string()
    }

    /// Returns contigs/scaffolds for SPAdes and ABySS, and
    /// conservative/normal/bold for Unicycler.
    pub fn assembler_setting(&self) -> String {
        match self.assembler_name().as_str() {
            "Unicycler" => {
                let commands = self.all_commands_str();
                if commands.contains("mode bold") {
                    "bold".to_string()
                } else if commands.contains("mode conservative") {
                    "conservative".to_string()
                } else {
                    "normal".to_string()
                }
            }
            "SPAdes" | "ABySS" => {
                for setting in ["contigs", "scaffolds", "before_rr"] {
                    if self.final_assembly_fasta.contains(setting) {
                        return setting.to_string();
                    }
                }
                String::new()
            }
            _ => String::new(),
        }
    }

    /// The token of the command text that invokes the assembler itself.
    fn assembler_program(&self) -> Result<String> {
        let needle = match self.assembler_name().as_str() {
            "Unicycler" => "unicycler",
            "SPAdes" => "spades",
            "Velvet" => "velveth",
            "npScarf" => "jsa.np.gapcloser",
            "ABySS" => "abyss",
            "Canu" => "canu",
            _ => return Ok(String::new()),
        };
        self.all_commands_str()
            .split(' ')
            .find(|part| part.contains(needle))
            .map(|part| part.to_string())
            .ok_or_else(|| anyhow!("Could not locate the assembler program in the command file"))
    }

    /// Asks the assembler for its version via its own CLI convention.
    pub async fn assembler_version(&self) -> Result<String> {
        let assembler_name = self.assembler_name();
        match assembler_name.as_str() {
            "Unicycler" | "Canu" => {
                let all_out =
                    run_shell_capture(&format!("{} --version", self.assembler_program()?)).await?;
                parse_after(&all_out, "v")
            }
            "SPAdes" => {
                let all_out =
                    run_shell_capture(&format!("{} --version", self.assembler_program()?)).await?;
                let version = parse_after(&all_out, " v")?;
                Ok(version.trim_start_matches('.').to_string())
            }
            "Velvet" => {
                let all_out = run_shell_capture(&self.assembler_program()?).await?;
                parse_after(&all_out, "Version ")
            }
            "ABySS" => abyss_version().await,
            "npScarf" => {
                let program = self.assembler_program()?.replace("jsa.np.gapcloser", "jsa");
                let all_out = run_shell_capture(&program).await?;
                let rest = all_out
                    .split_once("Version ")
                    .map(|(_, rest)| rest)
                    .ok_or_else(|| anyhow!("Invalid version output: {}", all_out))?;
                Ok(rest.split(',').next().unwrap_or_default().to_string())
            }
            _ => Ok(String::new()),
        }
    }

    pub fn kmer_size(&self) -> String {
        match self.assembler_name().as_str() {
            "Unicycler" | "SPAdes" | "npScarf" => return "auto".to_string(),
            "Canu" => return "n/a".to_string(),
            _ => {}
        }
        let commands = self.short_read_commands.join(" ");
        match self.assembler_name().as_str() {
            "Velvet" => commands
                .split(' ')
                .nth(2)
                .unwrap_or_default()
                .to_string(),
            "ABySS" => match commands.split_once("k=") {
                Some((_, rest)) => rest.split_whitespace().next().unwrap_or_default().to_string(),
                None => String::new(),
            },
            _ => String::new(),
        }
    }

    /// Total reference length and expected linear sequence count for a
    /// read set, with defaults when no reference is known.
    fn reference_stats(&self, read_set: &ReadSet) -> Result<(usize, u64)> {
        match &read_set.reference {
            Some(reference) => {
                let ref_seqs = load_fasta(reference)?;
                Ok((linear_count(&ref_seqs), total_length(&ref_seqs)))
            }
            None => Ok((0, DEFAULT_GENOME_SIZE)),
        }
    }

    pub fn short_read_assembly_commands(&self, read_set: &ReadSet) -> Result<Vec<String>> {
        self.substituted(&self.short_read_commands, read_set, false)
    }

    pub fn hybrid_assembly_commands(&self, read_set: &ReadSet) -> Result<Vec<String>> {
        self.substituted(&self.hybrid_commands, read_set, true)
    }

    fn substituted(
        &self,
        templates: &[String],
        read_set: &ReadSet,
        with_long_reads: bool,
    ) -> Result<Vec<String>> {
        let (expected_linear_seqs, total_ref_length) = self.reference_stats(read_set)?;
        let assembler_name = self.assembler_name();

        let short_reads_1 = required_path(&read_set.short_reads_1, "short read 1")?;
        let short_reads_2 = required_path(&read_set.short_reads_2, "short read 2")?;

        let mut substituted_commands = Vec::new();
        for template in templates {
            let mut line = template.replace(SHORT_READS_1_TOKEN, &short_reads_1);
            line = line.replace(SHORT_READS_2_TOKEN, &short_reads_2);
            if with_long_reads {
                let long_reads = required_path(&read_set.long_reads, "long read")?;
                line = line.replace(LONG_READS_TOKEN, &long_reads);
            }
            line = line.replace(GENOME_SIZE_TOKEN, &total_ref_length.to_string());
            if assembler_name == "Unicycler" && expected_linear_seqs > 0 {
                line.push_str(&format!(" --expected_linear_seqs {}", expected_linear_seqs));
            }
            substituted_commands.push(line);
        }
        Ok(substituted_commands)
    }
}

fn required_path(path: &Option<PathBuf>, what: &str) -> Result<String> {
    path.as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Read set has no {} file", what))
}

/// First whitespace token after `marker` in version-command output.
fn parse_after(all_out: &str, marker: &str) -> Result<String> {
    let rest = all_out
        .split_once(marker)
        .map(|(_, rest)| rest)
        .ok_or_else(|| anyhow!("Invalid version output: {}", all_out))?;
    rest.split_whitespace()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid version output: {}", all_out))
}

/// Runs a shell command, returning combined stdout and stderr.
async fn run_shell_capture(command: &str) -> Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .with_context(|| format!("Failed to run: {}", command))?;
    let mut all_out = String::from_utf8_lossy(&output.stdout).into_owned();
    all_out.push(' ');
    all_out.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(all_out)
}

/// ABySS reports no version on its own; locate the program and fall back
/// to its man page, per its packaging conventions.
async fn abyss_version() -> Result<String> {
    let abyss_path = run_shell_capture("which abyss-pe").await?.trim().to_string();
    if let Some((_, rest)) = abyss_path.split_once("easybuild/software/ABySS/") {
        return Ok(rest.split('-').next().unwrap_or_default().to_string());
    }
    let doc_path = abyss_path.replace("bin/abyss-pe", "doc/abyss-pe.1");
    let doc_data = std::fs::read_to_string(&doc_path)
        .with_context(|| format!("Failed to read {}", doc_path))?;
    let version = parse_after(&doc_data, "abyss-pe (ABySS) ")?;
    Ok(version.replace('"', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::read_sets::ReadSet;
    use std::io::Write;

    const UNICYCLER_COMMANDS: &str = "\
# Short read assembly commands\n\
unicycler -1 SHORT_READS_1 -2 SHORT_READS_2 -o out  # inline comment\n\
\n\
# Hybrid assembly commands\n\
unicycler -1 SHORT_READS_1 -2 SHORT_READS_2 -l LONG_READS -o out\n\
\n\
# Final assembly files\n\
out/assembly.fasta\n\
out/assembly.gfa\n";

    fn read_set_with_reads(dir: &Path) -> ReadSet {
        let mut read_set = ReadSet::new("sample", true);
        for name in ["sample_1.fastq.gz", "sample_2.fastq.gz", "sample_long.fastq.gz"] {
            let path = dir.join(name);
            std::fs::write(&path, "").unwrap();
            read_set.add_read(&path);
        }
        read_set
    }

    #[test]
    fn test_parse_sections_and_comments() -> Result<()> {
        let commands = CommandSet::parse(UNICYCLER_COMMANDS)?;
        assert_eq!(commands.short_read_commands.len(), 1);
        assert_eq!(commands.hybrid_commands.len(), 1);
        assert!(!commands.short_read_commands[0].contains("inline comment"));
        assert_eq!(commands.final_assembly_fasta, "out/assembly.fasta");
        assert_eq!(commands.final_assembly_graph.as_deref(), Some("out/assembly.gfa"));
        assert!(commands.can_do_short_only());
        assert!(commands.can_do_hybrid());
        Ok(())
    }

    #[test]
    fn test_missing_commands_or_final_files_is_fatal() {
        assert!(CommandSet::parse("# Final assembly files\nassembly.fasta\n").is_err());
        assert!(CommandSet::parse("# Short read assembly commands\nspades.py\n").is_err());
        // Declared final files but none of them a FASTA.
        assert!(
            CommandSet::parse(
                "# Short read assembly commands\nspades.py\n\n# Final assembly files\nassembly.gfa\n"
            )
            .is_err()
        );
    }

    #[test]
    fn test_assembler_identity() -> Result<()> {
        let commands = CommandSet::parse(UNICYCLER_COMMANDS)?;
        assert_eq!(commands.assembler_name(), "Unicycler");
        assert_eq!(commands.assembler_setting(), "normal");
        assert_eq!(commands.kmer_size(), "auto");

        let spades = CommandSet::parse(
            "# Short read assembly commands\n\
             spades.py -1 SHORT_READS_1 -2 SHORT_READS_2 -o .\n\
             \n\
             # Final assembly files\n\
             scaffolds.fasta\n",
        )?;
        assert_eq!(spades.assembler_name(), "SPAdes");
        assert_eq!(spades.assembler_setting(), "scaffolds");

        let abyss = CommandSet::parse(
            "# Short read assembly commands\n\
             abyss-pe k=64 in='SHORT_READS_1 SHORT_READS_2' name=asm\n\
             \n\
             # Final assembly files\n\
             asm-contigs.fa\n",
        )?;
        assert_eq!(abyss.assembler_name(), "ABySS");
        assert_eq!(abyss.kmer_size(), "64");
        Ok(())
    }

    #[test]
    fn test_substitution_with_reference() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ref_path = dir.path().join("sample.fasta");
        {
            let mut file = std::fs::File::create(&ref_path)?;
            writeln!(file, ">chromosome circular=true")?;
            writeln!(file, "{}", "A".repeat(1000))?;
            writeln!(file, ">plasmid")?;
            writeln!(file, "{}", "C".repeat(200))?;
        }

        let mut read_set = read_set_with_reads(dir.path());
        read_set.reference = Some(ref_path);

        let commands = CommandSet::parse(UNICYCLER_COMMANDS)?;
        let substituted = commands.hybrid_assembly_commands(&read_set)?;
        assert_eq!(substituted.len(), 1);
        let line = &substituted[0];
        assert!(line.contains("sample_1.fastq.gz"));
        assert!(line.contains("sample_2.fastq.gz"));
        assert!(line.contains("sample_long.fastq.gz"));
        // One linear reference sequence makes Unicycler get the extra flag.
        assert!(line.ends_with("--expected_linear_seqs 1"));
        Ok(())
    }

    #[test]
    fn test_substitution_without_reference_uses_default_genome_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let read_set = read_set_with_reads(dir.path());

        let commands = CommandSet::parse(
            "# Short read assembly commands\n\
             spades.py -1 SHORT_READS_1 -2 SHORT_READS_2 --genome-size GENOME_SIZE\n\
             \n\
             # Final assembly files\n\
             contigs.fasta\n",
        )?;
        let substituted = commands.short_read_assembly_commands(&read_set)?;
        assert!(substituted[0].contains(&DEFAULT_GENOME_SIZE.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_assembler_version_is_empty() -> Result<()> {
        let commands = CommandSet::parse(
            "# Short read assembly commands\n\
             myassembler SHORT_READS_1 SHORT_READS_2\n\
             \n\
             # Final assembly files\n\
             final.fasta\n",
        )?;
        assert_eq!(commands.assembler_name(), "");
        assert_eq!(commands.assembler_version().await?, "");
        Ok(())
    }
}
