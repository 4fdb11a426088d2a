use crate::data::GenotypeMatrix;
use crate::stats::linkage::site_r;

/// Symmetric matrix of pairwise distances, either site x site (linkage) or
/// taxon x taxon (IBS). Cells may be NaN until `repair` runs; clustering
/// requires a repaired matrix.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn from_fn(size: usize, mut dist: impl FnMut(usize, usize) -> f64) -> DistanceMatrix {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            for j in i..size {
                let d = dist(i, j);
                values[i * size + j] = d;
                values[j * size + i] = d;
            }
        }
        DistanceMatrix { size, values }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.size + j] = value;
        self.values[j * self.size + i] = value;
    }

    /// Replaces every NaN cell with the mean of the finite off-diagonal
    /// distances and zeroes the diagonal. With no finite off-diagonal value
    /// at all, everything becomes 0.
    pub fn repair(&mut self) {
        let mut total = 0.0;
        let mut count = 0usize;
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                let d = self.get(i, j);
                if d.is_finite() {
                    total += d;
                    count += 1;
                }
            }
        }
        let mean = if count > 0 { total / count as f64 } else { 0.0 };

        for i in 0..self.size {
            self.set(i, i, 0.0);
            for j in (i + 1)..self.size {
                if !self.get(i, j).is_finite() {
                    self.set(i, j, mean);
                }
            }
        }
    }

    /// Condensed upper-triangle layout consumed by kodama.
    pub fn condensed(&self) -> Vec<f64> {
        let mut condensed = Vec::with_capacity(self.size * (self.size.saturating_sub(1)) / 2);
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                condensed.push(self.get(i, j));
            }
        }
        condensed
    }
}

/// Identity-by-state distance between two taxa over the given sites: 0 per
/// identical call, 0.5 when the calls share one allele, 1 otherwise;
/// missing calls are skipped. NaN when no site is comparable.
pub fn ibs_distance(matrix: &GenotypeMatrix, taxon1: usize, taxon2: usize, sites: &[usize]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for &site in sites {
        let g1 = matrix.get(taxon1, site);
        let g2 = matrix.get(taxon2, site);
        let (p1, p2) = match (g1.alleles(), g2.alleles()) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => continue,
        };
        count += 1;
        if g1 == g2 {
            continue;
        }
        let shares_allele = g1.contains(p2.0) || g1.contains(p2.1) || g2.contains(p1.0);
        total += if shares_allele { 0.5 } else { 1.0 };
    }
    if count == 0 {
        f64::NAN
    } else {
        total / count as f64
    }
}

/// Taxon x taxon IBS distance matrix restricted to a site subset.
pub fn ibs_matrix(matrix: &GenotypeMatrix, sites: &[usize]) -> DistanceMatrix {
    DistanceMatrix::from_fn(matrix.num_taxa(), |i, j| {
        if i == j {
            0.0
        } else {
            ibs_distance(matrix, i, j, sites)
        }
    })
}

/// Site x site linkage distance matrix, 1 - r^2 over the given sites.
pub fn ld_matrix(matrix: &GenotypeMatrix, sites: &[usize]) -> DistanceMatrix {
    DistanceMatrix::from_fn(sites.len(), |i, j| {
        let r = site_r(matrix, sites[i], sites[j]);
        1.0 - r * r
    })
}
