use crate::data::GenotypeMatrix;
use crate::utils::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes matrices back out in the reader's tabular layout, one row per
/// site, gzip-compressed when the path ends in `.gz`. All matrices must
/// share one taxa list.
pub fn write_matrix(path: &Path, matrices: &[GenotypeMatrix]) -> Result<()> {
    let first = match matrices.first() {
        Some(m) => m,
        None => return Err("Nothing to write".to_string()),
    };
    if matrices.iter().any(|m| m.taxa() != first.taxa()) {
        return Err("Chromosome matrices disagree on taxa".to_string());
    }

    let file = File::create(path).map_err(|e| format!("File {}: {}", path.display(), e))?;
    let writer: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };
    write_to(writer, matrices)
}

pub fn write_to<W: Write>(mut writer: W, matrices: &[GenotypeMatrix]) -> Result<()> {
    let report = |e: std::io::Error| format!("Write failed: {}", e);

    let taxa = matrices[0].taxa().join("\t");
    writeln!(writer, "marker\tchrom\tpos\t{}", taxa).map_err(report)?;
    for matrix in matrices {
        for site in 0..matrix.num_sites() {
            write!(
                writer,
                "{}\t{}\t{}",
                matrix.marker(site),
                matrix.chrom(),
                matrix.position(site)
            )
            .map_err(report)?;
            for taxon in 0..matrix.num_taxa() {
                write!(writer, "\t{}", matrix.get(taxon, site)).map_err(report)?;
            }
            writeln!(writer).map_err(report)?;
        }
    }
    writer.flush().map_err(report)
}
