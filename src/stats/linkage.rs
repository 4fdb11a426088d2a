use crate::data::GenotypeMatrix;
use std::collections::HashSet;

/// Genotype correlation between two sites, computed over taxa that are
/// homozygous and non-missing at both. Returns NaN with fewer than two
/// comparable taxa or when either site is fixed in the comparable subset.
pub fn site_r(matrix: &GenotypeMatrix, site1: usize, site2: usize) -> f64 {
    let major1 = match matrix.major_allele(site1) {
        Some(a) => a,
        None => return f64::NAN,
    };
    let major2 = match matrix.major_allele(site2) {
        Some(a) => a,
        None => return f64::NAN,
    };

    let mut total = 0usize;
    let mut count1 = 0usize;
    let mut count2 = 0usize;
    let mut joint = 0usize;
    for taxon in 0..matrix.num_taxa() {
        let hom1 = matrix.get(taxon, site1).hom_allele();
        let hom2 = matrix.get(taxon, site2).hom_allele();
        if let (Some(a1), Some(a2)) = (hom1, hom2) {
            total += 1;
            let x = a1 == major1;
            let y = a2 == major2;
            if x {
                count1 += 1;
            }
            if y {
                count2 += 1;
            }
            if x && y {
                joint += 1;
            }
        }
    }

    if total < 2 {
        return f64::NAN;
    }
    let n = total as f64;
    let (s1, s2) = (count1 as f64, count2 as f64);
    let num = joint as f64 - s1 * s2 / n;
    let denom = (s1 * (n - s1) / n) * (s2 * (n - s2) / n);
    if denom == 0.0 {
        return f64::NAN;
    }
    num / denom.sqrt()
}

/// Pearson r of a 2x2 contingency table given as cell counts
/// [[n11, n12], [n21, n22]], from the sufficient-statistic form used for
/// the linkage extension test. NaN for degenerate margins.
pub fn table_r(n11: f64, n12: f64, n21: f64, n22: f64) -> f64 {
    let n = n11 + n12 + n21 + n22;
    if n == 0.0 {
        return f64::NAN;
    }
    let sum_x = n11 + n12;
    let sum_y = n11 + n21;
    let num = n11 - sum_x * sum_y / n;
    let denom = (sum_x - sum_x * sum_x / n) * (sum_y - sum_y * sum_y / n);
    num / denom.sqrt()
}

/// Phi correlation between two two-way taxa partitions, from the 2x2 table
/// of shared members. +1 means identical group labels, -1 inverted labels.
pub fn group_correlation(
    previous: (&[usize], &[usize]),
    current: (&[usize], &[usize]),
) -> f64 {
    let shared = |a: &[usize], b: &[usize]| -> f64 {
        let set: HashSet<usize> = a.iter().copied().collect();
        b.iter().filter(|t| set.contains(t)).count() as f64
    };
    let c00 = shared(previous.0, current.0);
    let c01 = shared(previous.0, current.1);
    let c10 = shared(previous.1, current.0);
    let c11 = shared(previous.1, current.1);

    let num = c00 * c11 - c01 * c10;
    let p1 = c00 + c01;
    let q1 = c10 + c11;
    let p2 = c00 + c10;
    let q2 = c01 + c11;
    num / (p1 * q1 * p2 * q2).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matrix_from_rows_spaced;

    #[test]
    fn perfectly_linked_sites_have_unit_r() {
        let m = matrix_from_rows_spaced(&["AA AA CC CC", "GG GG TT TT"]);
        assert!((site_r(&m, 0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_sites_have_negative_r() {
        let m = matrix_from_rows_spaced(&["AA AA CC CC", "TT TT GG GG"]);
        assert!((site_r(&m, 0, 1) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_site_gives_nan() {
        let m = matrix_from_rows_spaced(&["AA AA CC CC", "GG GG GG GG"]);
        assert!(site_r(&m, 0, 1).is_nan());
    }

    #[test]
    fn het_taxa_are_excluded_from_comparisons() {
        // only two hom-hom pairs remain and they are concordant
        let m = matrix_from_rows_spaced(&["AA AC CC AC", "GG GT TT TT"]);
        let r = site_r(&m, 0, 1);
        assert!(r.is_finite());
    }

    #[test]
    fn too_few_comparisons_give_nan() {
        let m = matrix_from_rows_spaced(&["AA NN CC NN", "GG TT NN NN"]);
        assert!(site_r(&m, 0, 1).is_nan());
    }

    #[test]
    fn table_r_extremes() {
        assert!((table_r(10.0, 0.0, 0.0, 10.0) - 1.0).abs() < 1e-12);
        assert!((table_r(0.0, 10.0, 10.0, 0.0) + 1.0).abs() < 1e-12);
        assert!(table_r(0.0, 0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn group_correlation_signs() {
        let g0 = [0usize, 1, 2];
        let g1 = [3usize, 4, 5];
        assert!((group_correlation((&g0, &g1), (&g0, &g1)) - 1.0).abs() < 1e-12);
        assert!((group_correlation((&g0, &g1), (&g1, &g0)) + 1.0).abs() < 1e-12);
    }
}
