use crate::data::{Genotype, GenotypeMatrix};
use crate::utils::Result;
use flate2::read::MultiGzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads a tabular marker matrix, one `GenotypeMatrix` per chromosome.
///
/// Expected layout: a header line `marker chrom pos <taxon> ...` followed
/// by one line per site with two-character genotype cells. Rows must be
/// grouped by chromosome with increasing positions; `.gz` input is
/// transparently decompressed. Malformed input fails fast with the line
/// number.
pub fn read_matrix(path: &Path) -> Result<Vec<GenotypeMatrix>> {
    let file = File::open(path).map_err(|e| format!("File {}: {}", path.display(), e))?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    read_from(reader)
}

pub fn read_from<R: BufRead>(reader: R) -> Result<Vec<GenotypeMatrix>> {
    let mut lines = reader.lines().enumerate();

    let header = match lines.next() {
        Some((_, line)) => line.map_err(|e| format!("Error reading header: {}", e))?,
        None => return Err("Marker file is empty".to_string()),
    };
    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(format!(
            "Header must be 'marker chrom pos <taxa...>', got {} columns",
            fields.len()
        ));
    }
    let taxa: Vec<String> = fields[3..].iter().map(|t| t.to_string()).collect();

    let mut matrices = Vec::new();
    let mut finished: HashSet<String> = HashSet::new();
    let mut current: Option<(String, crate::data::MatrixBuilder)> = None;
    for (index, line) in lines {
        let line_number = index + 1;
        let line = line.map_err(|e| format!("Error reading line {}: {}", line_number, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != taxa.len() + 3 {
            return Err(format!(
                "Line {}: expected {} columns, got {}",
                line_number,
                taxa.len() + 3,
                fields.len()
            ));
        }
        let (marker, chrom) = (fields[0], fields[1]);
        let position: u64 = fields[2]
            .parse()
            .map_err(|_| format!("Line {}: invalid position '{}'", line_number, fields[2]))?;
        let calls: Vec<Genotype> = fields[3..]
            .iter()
            .map(|cell| cell.parse())
            .collect::<Result<_>>()
            .map_err(|e| format!("Line {}: {}", line_number, e))?;

        let start_new = match &current {
            Some((current_chrom, _)) => current_chrom != chrom,
            None => true,
        };
        if start_new {
            if let Some((name, builder)) = current.take() {
                matrices.push(builder.build()?);
                finished.insert(name);
            }
            if finished.contains(chrom) {
                return Err(format!(
                    "Line {}: rows for chromosome {} are not contiguous",
                    line_number, chrom
                ));
            }
            current = Some((
                chrom.to_string(),
                GenotypeMatrix::builder(chrom, taxa.clone()),
            ));
        }
        let (_, builder) = current.as_mut().unwrap();
        builder
            .push_site(marker, position, calls)
            .map_err(|e| format!("Line {}: {}", line_number, e))?;
    }

    if let Some((_, builder)) = current.take() {
        matrices.push(builder.build()?);
    }
    if matrices.is_empty() {
        return Err("Marker file has no sites".to_string());
    }
    Ok(matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_two_chromosomes() {
        let data = "\
marker chrom pos s1 s2 s3
m1 1 100 AA AC NN
m2 1 250 GG GG GT
m3 2 50 TT TT AA
";
        let matrices = read_from(Cursor::new(data)).unwrap();
        assert_eq!(matrices.len(), 2);
        assert_eq!(matrices[0].chrom(), "1");
        assert_eq!(matrices[0].num_sites(), 2);
        assert_eq!(matrices[0].num_taxa(), 3);
        assert_eq!(matrices[1].chrom(), "2");
        assert_eq!(matrices[1].position(0), 50);
        assert_eq!(matrices[0].get(2, 0), Genotype::Missing);
    }

    #[test]
    fn rejects_ragged_row() {
        let data = "\
marker chrom pos s1 s2
m1 1 100 AA
";
        assert!(read_from(Cursor::new(data)).is_err());
    }

    #[test]
    fn rejects_non_contiguous_chromosome() {
        let data = "\
marker chrom pos s1
m1 1 100 AA
m2 2 100 AA
m3 1 200 AA
";
        let err = read_from(Cursor::new(data)).unwrap_err();
        assert!(err.contains("not contiguous"));
    }

    #[test]
    fn rejects_unsorted_positions() {
        let data = "\
marker chrom pos s1
m1 1 200 AA
m2 1 100 AA
";
        assert!(read_from(Cursor::new(data)).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(read_from(Cursor::new("")).is_err());
        assert!(read_from(Cursor::new("marker chrom pos s1\n")).is_err());
    }
}
