use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use seq_io::fasta::{Reader as FastaReader, Record};

use crate::utils::file::open_reader;

/// One reference sequence, with the depth and circularity annotations
/// carried on its FASTA header. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RefSeq {
    pub name: String,
    pub seq: Vec<u8>,
    pub depth: f64,
    pub circular: bool,
}

impl RefSeq {
    pub fn len(&self) -> u64 {
        self.seq.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Loads all records of a FASTA file (optionally gzip-compressed) into memory.
///
/// Headers may carry `depth=<float>` and `circular=true` annotations after
/// the sequence name, space-delimited. Depth defaults to 1.0 and circularity
/// to false when unannotated.
///
/// # Arguments
///
/// * `path` - Valid path to a FASTA file.
///
/// # Returns
/// Result<Vec<RefSeq>>: all parsed records, in file order.
pub fn load_fasta(path: &Path) -> Result<Vec<RefSeq>> {
    let reader = open_reader(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut fasta = FastaReader::new(reader);

    let mut seqs = Vec::new();
    while let Some(result) = fasta.next() {
        let record = result
            .map_err(|e| anyhow!("Invalid FASTA record in {}: {}", path.display(), e))?;
        let head = String::from_utf8_lossy(record.head()).into_owned();
        let (name, depth, circular) = parse_ref_header(&head)
            .with_context(|| format!("Bad FASTA header in {}", path.display()))?;
        seqs.push(RefSeq {
            name,
            seq: record.full_seq().into_owned(),
            depth,
            circular,
        });
    }
    Ok(seqs)
}

/// Splits a FASTA header into (name, depth, circular).
fn parse_ref_header(head: &str) -> Result<(String, f64, bool)> {
    let name = head
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    let depth = match head.split_once("depth=") {
        Some((_, rest)) => {
            let token = rest.split_whitespace().next().unwrap_or_default();
            token
                .parse::<f64>()
                .with_context(|| format!("Invalid depth annotation '{}'", token))?
        }
        None => 1.0,
    };

    let circular = head.to_lowercase().contains("circular=true");
    Ok((name, depth, circular))
}

/// Total length across all sequences.
pub fn total_length(seqs: &[RefSeq]) -> u64 {
    seqs.iter().map(|s| s.len()).sum()
}

/// Count of sequences not annotated circular.
pub fn linear_count(seqs: &[RefSeq]) -> usize {
    seqs.iter().filter(|s| !s.circular).count()
}

/// Depths normalized against the depth of the longest sequence.
pub fn relative_depths(seqs: &[RefSeq]) -> Result<Vec<f64>> {
    let mut longest_len = 0u64;
    let mut longest_depth = 0.0f64;
    for seq in seqs {
        if seq.len() > longest_len {
            longest_len = seq.len();
            longest_depth = seq.depth;
        }
    }
    if longest_depth <= 0.0 {
        bail!("Longest reference sequence has a non-positive depth");
    }
    Ok(seqs.iter().map(|s| s.depth / longest_depth).collect())
}

pub fn write_fasta_record<W: Write>(
    writer: &mut W,
    id: &str,
    desc: Option<&str>,
    seq: &[u8],
) -> io::Result<()> {
    // Write header
    writer.write_all(b">")?;
    writer.write_all(id.as_bytes())?;
    if let Some(desc) = desc {
        writer.write_all(b" ")?;
        writer.write_all(desc.as_bytes())?;
    }
    writer.write_all(b"\n")?;

    // Write sequence with line wrapping
    for chunk in seq.chunks(80) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}
