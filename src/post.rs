use crate::data::{CalledMatrix, FounderCalls, Genotype, GenotypeMatrix, ParentCall};
use crate::utils::Result;

/// Fills short runs of missing calls per taxon: a gap is filled only when
/// both bracketing non-missing calls agree, with the shared value. Gaps at
/// the ends of the sequence and gaps with disagreeing brackets stay
/// missing.
pub fn fill_gaps(called: &mut CalledMatrix) {
    for taxon in 0..called.num_taxa() {
        let mut previous: Option<(usize, ParentCall)> = None;
        for col in 0..called.num_sites() {
            let value = called.get(taxon, col);
            if value.is_missing() {
                continue;
            }
            if let Some((prev_col, prev_value)) = previous {
                if prev_value == value {
                    for gap_col in (prev_col + 1)..col {
                        called.set(taxon, gap_col, value);
                    }
                }
            }
            previous = Some((col, value));
        }
    }
}

/// Rewrites the source matrix from the founder-dosage calls: every called
/// site becomes the explicit genotype built from that site's founder
/// alleles (missing dosage calls become missing genotypes); uncalled sites
/// are left exactly as they were. Pure in its inputs, so running it twice
/// gives the same matrix as running it once.
pub fn rewrite_alignment(
    matrix: &GenotypeMatrix,
    calls: &FounderCalls,
    imputed: &CalledMatrix,
) -> Result<GenotypeMatrix> {
    if calls.num_sites() != matrix.num_sites() {
        return Err(format!(
            "Founder calls cover {} sites but the matrix has {}",
            calls.num_sites(),
            matrix.num_sites()
        ));
    }
    if imputed.num_sites() != calls.num_called() || imputed.num_taxa() != matrix.num_taxa() {
        return Err("Imputed calls do not match the founder call set".to_string());
    }

    let mut result = matrix.clone();
    for (col, (site, allele_a, allele_c)) in calls.iter().enumerate() {
        let genotype_a = Genotype::Hom(allele_a);
        let genotype_c = Genotype::Hom(allele_c);
        let genotype_het = Genotype::het(allele_a, allele_c);
        for taxon in 0..matrix.num_taxa() {
            let rewritten = match imputed.get(taxon, col) {
                ParentCall::A => genotype_a,
                ParentCall::C => genotype_c,
                ParentCall::Het => genotype_het,
                ParentCall::Missing => Genotype::Missing,
            };
            result.set(taxon, site, rewritten);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matrix_from_rows;
    use crate::data::Allele;

    fn one_taxon_calls(calls: &[ParentCall]) -> CalledMatrix {
        let sites: Vec<usize> = (0..calls.len()).collect();
        let positions: Vec<u64> = (1..=calls.len() as u64).map(|i| i * 10).collect();
        let mut m = CalledMatrix::new(1, sites, positions).unwrap();
        for (col, &call) in calls.iter().enumerate() {
            m.set(0, col, call);
        }
        m
    }

    #[test]
    fn gap_between_matching_calls_is_filled() {
        use ParentCall::{Missing, A};
        let mut m = one_taxon_calls(&[A, Missing, Missing, A]);
        fill_gaps(&mut m);
        for col in 0..4 {
            assert_eq!(m.get(0, col), A);
        }
    }

    #[test]
    fn gap_between_disagreeing_calls_stays_missing() {
        use ParentCall::{Missing, A, C};
        let mut m = one_taxon_calls(&[A, Missing, C]);
        fill_gaps(&mut m);
        assert_eq!(m.get(0, 0), A);
        assert_eq!(m.get(0, 1), Missing);
        assert_eq!(m.get(0, 2), C);
    }

    #[test]
    fn end_gaps_stay_missing() {
        use ParentCall::{Het, Missing};
        let mut m = one_taxon_calls(&[Missing, Het, Het, Missing]);
        fill_gaps(&mut m);
        assert_eq!(m.get(0, 0), Missing);
        assert_eq!(m.get(0, 3), Missing);
        assert_eq!(m.get(0, 1), Het);
    }

    fn rewrite_fixture() -> (GenotypeMatrix, FounderCalls, CalledMatrix) {
        let matrix = matrix_from_rows(&["GG TT AC", "AA AA AA"], &[10, 20]);
        let mut calls = FounderCalls::new(2);
        calls.record(0, Allele::G, Allele::T);
        let mut imputed = CalledMatrix::new(3, vec![0], vec![10]).unwrap();
        imputed.set(0, 0, ParentCall::A);
        imputed.set(1, 0, ParentCall::C);
        imputed.set(2, 0, ParentCall::Het);
        (matrix, calls, imputed)
    }

    #[test]
    fn called_sites_are_rewritten_and_uncalled_sites_kept() {
        let (matrix, calls, imputed) = rewrite_fixture();
        let result = rewrite_alignment(&matrix, &calls, &imputed).unwrap();
        assert_eq!(result.get(0, 0), Genotype::Hom(Allele::G));
        assert_eq!(result.get(1, 0), Genotype::Hom(Allele::T));
        assert_eq!(result.get(2, 0), Genotype::het(Allele::G, Allele::T));
        // the uncalled site is untouched
        for taxon in 0..3 {
            assert_eq!(result.get(taxon, 1), Genotype::Hom(Allele::A));
        }
    }

    #[test]
    fn rewriting_twice_equals_rewriting_once() {
        let (matrix, calls, imputed) = rewrite_fixture();
        let once = rewrite_alignment(&matrix, &calls, &imputed).unwrap();
        let twice = rewrite_alignment(&once, &calls, &imputed).unwrap();
        for taxon in 0..3 {
            for site in 0..2 {
                assert_eq!(once.get(taxon, site), twice.get(taxon, site));
            }
        }
    }

    #[test]
    fn mismatched_call_set_fails_fast() {
        let (matrix, calls, _) = rewrite_fixture();
        let wrong = CalledMatrix::new(3, vec![0, 1], vec![10, 20]).unwrap();
        assert!(rewrite_alignment(&matrix, &calls, &wrong).is_err());
        let short_calls = FounderCalls::new(1);
        let imputed = CalledMatrix::new(3, Vec::new(), Vec::new()).unwrap();
        assert!(rewrite_alignment(&matrix, &short_calls, &imputed).is_err());
    }
}
