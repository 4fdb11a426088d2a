use crate::data::genotype::{Allele, Genotype};
use crate::utils::Result;
use itertools::Itertools;

/// Immutable bi-allelic genotype calls for one chromosome: taxa in rows,
/// sites in columns ordered by physical position. Allele queries count
/// gametes, so a homozygous call contributes two copies and a heterozygous
/// call one copy of each allele.
#[derive(Debug, Clone)]
pub struct GenotypeMatrix {
    chrom: String,
    taxa: Vec<String>,
    markers: Vec<String>,
    positions: Vec<u64>,
    calls: Vec<Genotype>,
}

impl GenotypeMatrix {
    pub fn builder(chrom: impl Into<String>, taxa: Vec<String>) -> MatrixBuilder {
        MatrixBuilder {
            chrom: chrom.into(),
            taxa,
            markers: Vec::new(),
            positions: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn num_taxa(&self) -> usize {
        self.taxa.len()
    }

    pub fn num_sites(&self) -> usize {
        self.positions.len()
    }

    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    pub fn taxon_name(&self, taxon: usize) -> &str {
        &self.taxa[taxon]
    }

    pub fn taxon_index(&self, name: &str) -> Option<usize> {
        self.taxa.iter().position(|t| t == name)
    }

    pub fn marker(&self, site: usize) -> &str {
        &self.markers[site]
    }

    pub fn position(&self, site: usize) -> u64 {
        self.positions[site]
    }

    pub fn get(&self, taxon: usize, site: usize) -> Genotype {
        self.calls[taxon * self.num_sites() + site]
    }

    pub(crate) fn set(&mut self, taxon: usize, site: usize, genotype: Genotype) {
        let num_sites = self.num_sites();
        self.calls[taxon * num_sites + site] = genotype;
    }

    /// Gamete counts per allele at a site over the given taxa, most frequent
    /// first; count ties break by allele order.
    pub fn allele_counts_in(&self, site: usize, taxa: &[usize]) -> Vec<(Allele, usize)> {
        let mut counts = [0usize; 4];
        for &t in taxa {
            if let Some((first, second)) = self.get(t, site).alleles() {
                counts[first.index()] += 1;
                counts[second.index()] += 1;
            }
        }
        Allele::ALL
            .iter()
            .filter(|a| counts[a.index()] > 0)
            .map(|&a| (a, counts[a.index()]))
            .sorted_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)))
            .collect()
    }

    pub fn allele_counts(&self, site: usize) -> Vec<(Allele, usize)> {
        let all: Vec<usize> = (0..self.num_taxa()).collect();
        self.allele_counts_in(site, &all)
    }

    pub fn major_allele(&self, site: usize) -> Option<Allele> {
        self.allele_counts(site).first().map(|&(a, _)| a)
    }

    pub fn major_allele_in(&self, site: usize, taxa: &[usize]) -> Option<Allele> {
        self.allele_counts_in(site, taxa).first().map(|&(a, _)| a)
    }

    /// Frequency of the major allele among non-missing gametes of the given
    /// taxa, 0 when every call is missing.
    pub fn major_allele_freq_in(&self, site: usize, taxa: &[usize]) -> f64 {
        let counts = self.allele_counts_in(site, taxa);
        let total: usize = counts.iter().map(|&(_, n)| n).sum();
        match counts.first() {
            Some(&(_, major)) if total > 0 => major as f64 / total as f64,
            _ => 0.0,
        }
    }

    /// Frequency of the second most frequent allele among non-missing
    /// gametes, 0 for monomorphic or empty sites.
    pub fn minor_allele_frequency(&self, site: usize) -> f64 {
        let counts = self.allele_counts(site);
        let total: usize = counts.iter().map(|&(_, n)| n).sum();
        match counts.get(1) {
            Some(&(_, minor)) if total > 0 => minor as f64 / total as f64,
            _ => 0.0,
        }
    }

    /// Fraction of taxa with a missing call at the site.
    pub fn missing_fraction(&self, site: usize) -> f64 {
        let missing = (0..self.num_taxa())
            .filter(|&t| self.get(t, site).is_missing())
            .count();
        missing as f64 / self.num_taxa() as f64
    }
}

/// Collects per-site rows and validates the assembled matrix. Builder misuse
/// (duplicate taxa, ragged rows, unsorted positions) fails fast.
pub struct MatrixBuilder {
    chrom: String,
    taxa: Vec<String>,
    markers: Vec<String>,
    positions: Vec<u64>,
    rows: Vec<Vec<Genotype>>,
}

impl MatrixBuilder {
    pub fn push_site(
        &mut self,
        marker: impl Into<String>,
        position: u64,
        calls: Vec<Genotype>,
    ) -> Result<()> {
        if calls.len() != self.taxa.len() {
            return Err(format!(
                "Site {} has {} calls for {} taxa",
                self.markers.len(),
                calls.len(),
                self.taxa.len()
            ));
        }
        if let Some(&prev) = self.positions.last() {
            if position <= prev {
                return Err(format!(
                    "Positions not increasing on {}: {} after {}",
                    self.chrom, position, prev
                ));
            }
        }
        self.markers.push(marker.into());
        self.positions.push(position);
        self.rows.push(calls);
        Ok(())
    }

    pub fn build(self) -> Result<GenotypeMatrix> {
        if self.taxa.is_empty() {
            return Err("Matrix has no taxa".to_string());
        }
        if self.rows.is_empty() {
            return Err(format!("Matrix for {} has no sites", self.chrom));
        }
        if self.taxa.iter().unique().count() != self.taxa.len() {
            return Err("Duplicate taxon names".to_string());
        }

        let num_taxa = self.taxa.len();
        let num_sites = self.rows.len();
        let mut calls = vec![Genotype::Missing; num_taxa * num_sites];
        for (s, row) in self.rows.iter().enumerate() {
            for (t, &genotype) in row.iter().enumerate() {
                calls[t * num_sites + s] = genotype;
            }
        }

        Ok(GenotypeMatrix {
            chrom: self.chrom,
            taxa: self.taxa,
            markers: self.markers,
            positions: self.positions,
            calls,
        })
    }
}
