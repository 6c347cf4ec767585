use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use fxhash::FxHashMap;

use crate::config::defs::RunConfig;
use crate::utils::file::absolute;

pub const SMALL_ERRORS_COLUMN: &str = "# small errors per 100 kbp";
pub const TIME_MINUTES_COLUMN: &str = "Assembly time (minutes)";

/// One results-table row keyed by header name.
pub type TableRecord = FxHashMap<String, String>;

/// An (assembler, setting, version) triple requested for the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeTriple {
    pub assembler: String,
    pub setting: String,
    pub version: String,
}

pub fn run(config: &RunConfig) -> Result<()> {
    println!("\n-------------\n Comparison table\n-------------\n");

    let args = &config.args;
    let results_path = args
        .results
        .as_ref()
        .map(|p| absolute(&config.cwd, p))
        .ok_or_else(|| anyhow!("--results is required for the comparison_table module"))?;
    let include = args
        .include
        .as_ref()
        .ok_or_else(|| anyhow!("--include is required for the comparison_table module"))?;
    let include_list = parse_include_list(include)?;
    let out_path = args
        .out_dir
        .as_ref()
        .map(|p| absolute(&config.cwd, p))
        .ok_or_else(|| anyhow!("--out is required for the comparison_table module"))?;

    let (headers, mut results) = load_table(&results_path)?;
    println!();
    println!("Assemblies in full table:   {}", results.len());

    if let Some(set_type) = &args.set_type {
        results.retain(|r| field(r, "Read set type") == set_type.as_str());
    }
    if let Some(illumina_qual) = &args.illumina_qual {
        results.retain(|r| field(r, "Fake Illumina read quality") == illumina_qual.as_str());
    }
    if let Some(long_qual) = &args.long_qual {
        results.retain(|r| field(r, "Fake long read quality") == long_qual.as_str());
    }
    results.retain(|r| field(r, "Assembly result") == "success");
    results.retain(|r| include_list.iter().any(|inc| record_matches_include(r, inc)));
    let results = filter_for_read_sets(results, &include_list);

    println!("Assemblies passing filters: {}", results.len());
    println!();
    if results.is_empty() {
        bail!("No assemblies passed the filters");
    }

    let read_sets: BTreeSet<&str> = results.iter().map(|r| field(r, "Read set name")).collect();
    println!("Read sets passing filters:  {}", read_sets.len());
    for read_set in &read_sets {
        println!("  {}", read_set);
    }
    println!();

    let mut summary: Vec<Vec<String>> = vec![
        ["Assembler", "Setting/output", "Version", "N50", "NGA50", "Misassemblies",
         "Small errors per 100 kbp", "Time"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    ];
    for include in &include_list {
        summary.push(vec![
            include.assembler.clone(),
            include.setting.clone(),
            include.version.clone(),
            format_mean(mean_metric(&results, include, "N50"), 0),
            format_mean(mean_metric(&results, include, "NGA50"), 0),
            format_mean(mean_metric(&results, include, "Total misassemblies"), 2),
            format_mean(mean_metric(&results, include, SMALL_ERRORS_COLUMN), 2),
            format_mean(mean_metric(&results, include, TIME_MINUTES_COLUMN), 2),
        ]);
    }
    print!("{}", render_summary_table(&summary));
    println!();

    write_table(&headers, &results, &out_path)?;
    Ok(())
}

pub fn parse_include_list(include: &str) -> Result<Vec<IncludeTriple>> {
    let mut include_list = Vec::new();
    for entry in include.split(';') {
        let parts: Vec<&str> = entry.split(',').collect();
        if parts.len() != 3 {
            bail!(
                "--include entries must be assembler,setting,version (got '{}')",
                entry
            );
        }
        include_list.push(IncludeTriple {
            assembler: parts[0].to_string(),
            setting: parts[1].to_string(),
            version: parts[2].to_string(),
        });
    }
    Ok(include_list)
}

/// Loads a results table keyed by its header row, deriving the combined
/// small-error rate and assembly minutes for each record. Non-numeric
/// source fields leave the derived fields blank.
pub fn load_table(path: &Path) -> Result<(Vec<String>, Vec<TableRecord>)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut headers: Vec<String> = Vec::new();
    let mut records = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts[0] == "Read set name" {
            headers = parts.iter().map(|s| s.to_string()).collect();
            headers.push(SMALL_ERRORS_COLUMN.to_string());
            headers.push(TIME_MINUTES_COLUMN.to_string());
            continue;
        }
        if headers.is_empty() {
            bail!("{} has no header row", path.display());
        }

        let mut record = TableRecord::default();
        for (i, header) in headers.iter().enumerate() {
            record.insert(
                header.clone(),
                parts.get(i).map(|s| s.to_string()).unwrap_or_default(),
            );
        }

        let small_errors = ["# N's per 100 kbp", "# mismatches per 100 kbp", "# indels per 100 kbp"]
            .iter()
            .map(|column| field(&record, column).parse::<f64>())
            .try_fold(0.0, |acc, v| v.map(|v| acc + v))
            .map(|v| v.to_string())
            .unwrap_or_default();
        record.insert(SMALL_ERRORS_COLUMN.to_string(), small_errors);

        let minutes = field(&record, "Assembly time (seconds)")
            .parse::<f64>()
            .map(|secs| (secs / 60.0).to_string())
            .unwrap_or_default();
        record.insert(TIME_MINUTES_COLUMN.to_string(), minutes);

        records.push(record);
    }
    if headers.is_empty() {
        bail!("{} has no header row", path.display());
    }
    Ok((headers, records))
}

pub fn field<'a>(record: &'a TableRecord, name: &str) -> &'a str {
    record.get(name).map(String::as_str).unwrap_or_default()
}

pub fn record_matches_include(record: &TableRecord, include: &IncludeTriple) -> bool {
    field(record, "Assembler") == include.assembler
        && field(record, "Assembler setting/output") == include.setting
        && field(record, "Assembler version") == include.version
}

/// Restricts records to read sets for which every requested triple has at
/// least one matching record, so partial coverage excludes the whole read
/// set instead of leaving holes in the averages.
pub fn filter_for_read_sets(
    results: Vec<TableRecord>,
    include_list: &[IncludeTriple],
) -> Vec<TableRecord> {
    let all_read_sets: BTreeSet<String> = results
        .iter()
        .map(|r| field(r, "Read set name").to_string())
        .collect();

    let mut passing_read_sets = BTreeSet::new();
    for read_set in &all_read_sets {
        let read_set_records: Vec<&TableRecord> = results
            .iter()
            .filter(|r| field(r, "Read set name") == read_set)
            .collect();
        let matches_every_include = include_list.iter().all(|include| {
            read_set_records
                .iter()
                .any(|r| record_matches_include(r, include))
        });
        if matches_every_include {
            passing_read_sets.insert(read_set.clone());
        }
    }

    results
        .into_iter()
        .filter(|r| passing_read_sets.contains(field(r, "Read set name")))
        .collect()
}

/// Arithmetic mean of a metric across the records matching an include
/// triple. Values that fail to parse are skipped; None when nothing
/// parseable remains.
pub fn mean_metric(
    results: &[TableRecord],
    include: &IncludeTriple,
    metric: &str,
) -> Option<f64> {
    let values: Vec<f64> = results
        .iter()
        .filter(|r| record_matches_include(r, include))
        .filter_map(|r| field(r, metric).parse::<f64>().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn format_mean(mean: Option<f64>, decimals: usize) -> String {
    match mean {
        Some(mean) => format!("{:.*}", decimals, mean),
        None => String::new(),
    }
}

/// Renders a Markdown-style table: the first three columns left-aligned,
/// the numeric columns right-aligned, with an alignment separator row
/// after the header.
pub fn render_summary_table(table: &[Vec<String>]) -> String {
    let column_count = table.first().map(|row| row.len()).unwrap_or(0);
    let mut col_widths = vec![0usize; column_count];
    for row in table {
        for (j, value) in row.iter().take(column_count).enumerate() {
            col_widths[j] = col_widths[j].max(value.len());
        }
    }

    let mut out = String::new();
    for (i, row) in table.iter().enumerate() {
        let mut aligned_row = Vec::new();
        for j in 0..column_count {
            let value = row.get(j).map(String::as_str).unwrap_or_default();
            if j < 3 {
                aligned_row.push(format!("{:<width$}", value, width = col_widths[j]));
            } else {
                aligned_row.push(format!("{:>width$}", value, width = col_widths[j]));
            }
        }
        out.push_str(&format!("| {} |\n", aligned_row.join(" | ")));
        if i == 0 {
            let mut separator = Vec::new();
            for (j, width) in col_widths.iter().enumerate() {
                let dashes = "-".repeat(width.saturating_sub(1));
                if j < 3 {
                    separator.push(format!(":{}", dashes));
                } else {
                    separator.push(format!("{}:", dashes));
                }
            }
            out.push_str(&format!("| {} |\n", separator.join(" | ")));
        }
    }
    out
}

/// Exports the filtered records (with the derived columns) as a new table.
pub fn write_table(headers: &[String], results: &[TableRecord], out_path: &Path) -> Result<()> {
    let mut out_file = fs::File::create(out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    writeln!(out_file, "{}", headers.join("\t"))?;
    for record in results {
        let row: Vec<&str> = headers.iter().map(|h| field(record, h)).collect();
        writeln!(out_file, "{}", row.join("\t"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::table::ResultRecord;

    fn results_row(
        read_set: &str,
        include: &IncludeTriple,
        result: &str,
        n50: &str,
        seconds: &str,
    ) -> String {
        let mut record = ResultRecord::new();
        record.set("Read set name", read_set);
        record.set("Read set type", "hybrid");
        record.set("Assembler", &include.assembler);
        record.set("Assembler setting/output", &include.setting);
        record.set("Assembler version", &include.version);
        record.set("Assembly result", result);
        record.set("N50", n50);
        record.set("NGA50", n50);
        record.set("Total misassemblies", "0");
        record.set("# N's per 100 kbp", "1.0");
        record.set("# mismatches per 100 kbp", "2.0");
        record.set("# indels per 100 kbp", "3.0");
        record.set("Assembly time (seconds)", seconds);
        record.to_row()
    }

    fn unicycler() -> IncludeTriple {
        IncludeTriple {
            assembler: "Unicycler".into(),
            setting: "normal".into(),
            version: "0.2.0".into(),
        }
    }

    fn spades() -> IncludeTriple {
        IncludeTriple {
            assembler: "SPAdes".into(),
            setting: "contigs".into(),
            version: "3.9.1".into(),
        }
    }

    fn write_results_table(dir: &Path, rows: &[String]) -> std::path::PathBuf {
        let path = dir.join("results.tsv");
        let mut contents = ResultRecord::header();
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_include_list() -> Result<()> {
        let include_list = parse_include_list("Unicycler,normal,0.2.0;SPAdes,contigs,3.9.1")?;
        assert_eq!(include_list.len(), 2);
        assert_eq!(include_list[0], unicycler());
        assert_eq!(include_list[1], spades());
        assert!(parse_include_list("Unicycler,normal").is_err());
        Ok(())
    }

    #[test]
    fn test_load_table_derives_columns() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_results_table(
            dir.path(),
            &[results_row("set_a", &unicycler(), "success", "1000", "120.0")],
        );

        let (headers, records) = load_table(&path)?;
        assert_eq!(headers.last().map(String::as_str), Some(TIME_MINUTES_COLUMN));
        assert_eq!(records.len(), 1);
        assert_eq!(field(&records[0], SMALL_ERRORS_COLUMN), "6");
        assert_eq!(field(&records[0], TIME_MINUTES_COLUMN), "2");
        Ok(())
    }

    #[test]
    fn test_load_table_blank_derived_on_non_numeric() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // A failed row has blank metric fields.
        let path = write_results_table(
            dir.path(),
            &[results_row("set_a", &unicycler(), "fail", "", "")],
        );

        let (_, records) = load_table(&path)?;
        assert_eq!(field(&records[0], TIME_MINUTES_COLUMN), "");
        Ok(())
    }

    #[test]
    fn test_read_set_coverage_filter() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // set_a was assembled by both assemblers, set_b only by one.
        let path = write_results_table(
            dir.path(),
            &[
                results_row("set_a", &unicycler(), "success", "1000", "60.0"),
                results_row("set_a", &spades(), "success", "2000", "60.0"),
                results_row("set_b", &unicycler(), "success", "9000", "60.0"),
            ],
        );

        let (_, records) = load_table(&path)?;
        let include_list = vec![unicycler(), spades()];
        let filtered = filter_for_read_sets(records, &include_list);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| field(r, "Read set name") == "set_a"));
        Ok(())
    }

    #[test]
    fn test_mean_metric() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_results_table(
            dir.path(),
            &[
                results_row("set_a", &unicycler(), "success", "1000", "60.0"),
                results_row("set_b", &unicycler(), "success", "3000", "60.0"),
            ],
        );

        let (_, records) = load_table(&path)?;
        assert_eq!(mean_metric(&records, &unicycler(), "N50"), Some(2000.0));
        assert_eq!(mean_metric(&records, &spades(), "N50"), None);
        Ok(())
    }

    #[test]
    fn test_render_summary_table_alignment() {
        let table = vec![
            vec!["Assembler".to_string(), "Setting/output".to_string(), "Version".to_string(),
                 "N50".to_string()],
            vec!["Unicycler".to_string(), "normal".to_string(), "0.2.0".to_string(),
                 "4000000".to_string()],
        ];
        let rendered = render_summary_table(&table);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        // Header, then the alignment separator, then the data row.
        assert!(lines[0].starts_with("| Assembler"));
        assert!(lines[1].contains(":--------"));
        assert!(lines[1].ends_with("------: |"));
        assert!(lines[2].starts_with("| Unicycler"));
    }

    #[test]
    fn test_write_table_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_results_table(
            dir.path(),
            &[results_row("set_a", &unicycler(), "success", "1000", "60.0")],
        );

        let (headers, records) = load_table(&path)?;
        let out_path = dir.path().join("filtered.tsv");
        write_table(&headers, &records, &out_path)?;

        let (headers_again, records_again) = load_table(&out_path)?;
        assert_eq!(headers.len() + 2, headers_again.len());
        assert_eq!(records_again.len(), 1);
        assert_eq!(field(&records_again[0], "N50"), "1000");
        Ok(())
    }
}
