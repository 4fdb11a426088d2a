use crate::data::{GenotypeMatrix, SiteMask};

/// Minor-allele copies a site must exceed no matter how the thresholds are
/// configured.
const MIN_MINOR_GAMETES: usize = 2;

#[derive(Debug, Clone)]
pub struct SiteFilterParams {
    /// Minimum gamete count of the minor allele.
    pub min_minor_count: usize,
    /// Minimum minor-allele frequency (exclusive).
    pub min_minor_frequency: f64,
    /// Maximum fraction of taxa with a missing call (inclusive).
    pub max_missing: f64,
}

impl Default for SiteFilterParams {
    fn default() -> Self {
        SiteFilterParams {
            min_minor_count: 10,
            min_minor_frequency: 0.05,
            max_missing: 0.9,
        }
    }
}

/// Flags the sites worth clustering on: at least two observed alleles, a
/// minor allele above both the fixed floor and the configured count, minor
/// frequency above the configured minimum, and not too much missing data.
pub fn polymorphic_sites(matrix: &GenotypeMatrix, params: &SiteFilterParams) -> SiteMask {
    let mut mask = SiteMask::new(matrix.num_sites());
    for site in 0..matrix.num_sites() {
        let counts = matrix.allele_counts(site);
        let minor = match counts.get(1) {
            Some(&(_, n)) => n,
            None => continue,
        };
        if minor <= MIN_MINOR_GAMETES || minor < params.min_minor_count {
            continue;
        }
        if matrix.minor_allele_frequency(site) <= params.min_minor_frequency {
            continue;
        }
        if matrix.missing_fraction(site) > params.max_missing {
            continue;
        }
        mask.set(site);
    }
    mask
}
