use crate::calling::core_snps::{find_core_snps, find_founder_groups, CoreSnpParams, GroupingPolicy};
use crate::data::{
    Allele, CalledMatrix, FamilyContext, FounderCalls, GenotypeMatrix, ParentCall, SiteMask,
};
use crate::stats::table_r;
use crate::utils::Result;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct LinkageCallParams {
    pub core: CoreSnpParams,
    pub grouping: GroupingPolicy,
    /// Minimum |r| between a candidate site and the reference window.
    pub min_r: f64,
    /// Number of already-called sites the extension tests against.
    pub extension_window: usize,
}

impl Default for LinkageCallParams {
    fn default() -> Self {
        LinkageCallParams {
            core: CoreSnpParams::default(),
            grouping: GroupingPolicy::default(),
            min_r: 0.5,
            extension_window: 25,
        }
    }
}

/// Whole-chromosome calling: discover the core-SNP block and the two
/// founder taxa groups, code the core sites to founder dosage, then extend
/// the calls outward in both directions, accepting each polymorphic site
/// only while it stays in linkage with a sliding window of already-called
/// sites. Uncallable sites are skipped, never an error.
pub fn call_by_linkage(
    matrix: &GenotypeMatrix,
    family: &FamilyContext,
    polymorphic: &SiteMask,
    params: &LinkageCallParams,
) -> Result<(FounderCalls, CalledMatrix)> {
    if params.extension_window == 0 {
        return Err("Extension window must be positive".to_string());
    }

    let num_sites = matrix.num_sites();
    let num_taxa = matrix.num_taxa();
    let mut calls = FounderCalls::new(num_sites);

    let core = find_core_snps(matrix, polymorphic, &params.core)?;
    if core.is_empty() {
        log::warn!("Family {}: no core SNPs found", family.name);
        return finish(matrix, calls, Vec::new(), num_taxa);
    }

    let (group_one, group_two) = find_founder_groups(matrix, &core, &params.grouping);
    if group_one.is_empty() || group_two.is_empty() {
        log::warn!("Family {}: could not split taxa into founder groups", family.name);
        return finish(matrix, calls, Vec::new(), num_taxa);
    }
    let (group_a, group_c) = orient_groups(matrix, family, group_one, group_two);

    // founder dosage per taxon; uncoded sites read from the source matrix
    let mut coded: Vec<Option<ParentCall>> = vec![None; num_taxa * num_sites];
    for &snp in &core {
        let allele_a = matrix.major_allele_in(snp, &group_a);
        let allele_c = matrix.major_allele_in(snp, &group_c);
        let (allele_a, allele_c) = match (allele_a, allele_c) {
            (Some(a), Some(c)) => (a, c),
            _ => {
                log::debug!("Core site {} lacks a major allele in one group", snp);
                continue;
            }
        };
        calls.record(snp, allele_a, allele_c);
        for taxon in 0..num_taxa {
            coded[taxon * num_sites + snp] =
                Some(ParentCall::classify(matrix.get(taxon, snp), allele_a, allele_c));
        }
    }

    let window = params.extension_window.min(core.len());

    // extend from the core block toward the chromosome start
    let mut test_sites: VecDeque<usize> = core[..window].iter().rev().copied().collect();
    for snp in (0..core[0]).rev() {
        if !polymorphic.get(snp) {
            continue;
        }
        if let Some((a, c)) = recode_site(matrix, &mut coded, snp, &test_sites, params.min_r) {
            calls.record(snp, a, c);
            test_sites.push_back(snp);
            test_sites.pop_front();
        }
    }

    // and toward the chromosome end
    let mut test_sites: VecDeque<usize> = core[core.len() - window..].to_vec().into();
    for snp in (core[core.len() - 1] + 1)..num_sites {
        if !polymorphic.get(snp) {
            continue;
        }
        if let Some((a, c)) = recode_site(matrix, &mut coded, snp, &test_sites, params.min_r) {
            calls.record(snp, a, c);
            test_sites.push_back(snp);
            test_sites.pop_front();
        }
    }

    log::info!(
        "Family {} on {}: {} sites, {} polymorphic, {} called",
        family.name,
        matrix.chrom(),
        num_sites,
        polymorphic.count(),
        calls.num_called()
    );
    finish(matrix, calls, coded, num_taxa)
}

/// Orients the two discovered groups so the first corresponds to parent A:
/// membership of parent A wins, then membership of parent C, then the
/// discovery order stands.
fn orient_groups(
    matrix: &GenotypeMatrix,
    family: &FamilyContext,
    group_one: Vec<usize>,
    group_two: Vec<usize>,
) -> (Vec<usize>, Vec<usize>) {
    let index_a = matrix.taxon_index(&family.parent_a);
    let index_c = matrix.taxon_index(&family.parent_c);
    let holds = |group: &[usize], index: Option<usize>| {
        index.map_or(false, |i| group.contains(&i))
    };

    if holds(&group_one, index_a) {
        (group_one, group_two)
    } else if holds(&group_two, index_a) {
        (group_two, group_one)
    } else if holds(&group_one, index_c) {
        (group_two, group_one)
    } else {
        (group_one, group_two)
    }
}

/// Tests one site for linkage with the reference window and codes it on
/// success. Each taxon homozygous at the site votes its allele class into
/// the A or C column once per reference site where its coded call is a
/// founder homozygote; the two winning classes form a 2x2 table whose |r|
/// decides acceptance.
fn recode_site(
    matrix: &GenotypeMatrix,
    coded: &mut [Option<ParentCall>],
    snp: usize,
    test_sites: &VecDeque<usize>,
    min_r: f64,
) -> Option<(Allele, Allele)> {
    let num_sites = matrix.num_sites();
    let num_taxa = matrix.num_taxa();

    let mut a_count = [0usize; 4];
    let mut c_count = [0usize; 4];
    for taxon in 0..num_taxa {
        let allele = match matrix.get(taxon, snp).hom_allele() {
            Some(a) => a,
            None => continue,
        };
        for &test in test_sites {
            match coded[taxon * num_sites + test] {
                Some(ParentCall::A) => a_count[allele.index()] += 1,
                Some(ParentCall::C) => c_count[allele.index()] += 1,
                _ => {}
            }
        }
    }

    let max_a = argmax(&a_count);
    let max_c = argmax(&c_count);
    if max_a == max_c {
        return None;
    }

    let r = table_r(
        a_count[max_a] as f64,
        a_count[max_c] as f64,
        c_count[max_a] as f64,
        c_count[max_c] as f64,
    )
    .abs();
    if !(r >= min_r) {
        return None;
    }

    let allele_a = Allele::ALL[max_a];
    let allele_c = Allele::ALL[max_c];
    for taxon in 0..num_taxa {
        let call = ParentCall::classify(matrix.get(taxon, snp), allele_a, allele_c);
        coded[taxon * num_sites + snp] = Some(call);
    }
    Some((allele_a, allele_c))
}

fn argmax(counts: &[usize; 4]) -> usize {
    let mut best = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = i;
        }
    }
    best
}

/// Compacts the coded calls onto the called sites.
fn finish(
    matrix: &GenotypeMatrix,
    calls: FounderCalls,
    coded: Vec<Option<ParentCall>>,
    num_taxa: usize,
) -> Result<(FounderCalls, CalledMatrix)> {
    let sites = calls.called_sites();
    let positions = sites.iter().map(|&s| matrix.position(s)).collect();
    let mut called = CalledMatrix::new(num_taxa, sites.clone(), positions)?;
    for (col, &site) in sites.iter().enumerate() {
        for taxon in 0..num_taxa {
            let call = coded[taxon * matrix.num_sites() + site].unwrap_or(ParentCall::Missing);
            called.set(taxon, col, call);
        }
    }
    Ok((calls, called))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matrix_from_rows;
    use crate::sites::{polymorphic_sites, SiteFilterParams};

    fn family() -> FamilyContext {
        FamilyContext {
            name: "fam1".to_string(),
            parent_a: "t0".to_string(),
            parent_c: "t10".to_string(),
        }
    }

    fn loose_filter() -> SiteFilterParams {
        SiteFilterParams {
            min_minor_count: 3,
            min_minor_frequency: 0.0,
            max_missing: 1.0,
        }
    }

    fn params() -> LinkageCallParams {
        LinkageCallParams {
            core: CoreSnpParams {
                window_size: 6,
                num_trials: 1,
                cut_height: 0.3,
            },
            grouping: GroupingPolicy::default(),
            min_r: 0.5,
            extension_window: 5,
        }
    }

    /// 20 taxa split 10/10 between founder haplotypes; sites 2..=9 are
    /// perfectly linked, site 0 is unlinked noise, site 1 is monomorphic.
    fn linked_matrix() -> GenotypeMatrix {
        let hap = |left: &str, right: &str| format!("{}{}", left.repeat(10), right.repeat(10));
        let alternating = "AA CC ".repeat(10);
        let mono = "GG ".repeat(20);
        let linked_gt = hap("GG ", "TT ");
        let linked_ac = hap("AA ", "CC ");
        let mut rows: Vec<String> = vec![alternating, mono];
        for s in 0..8 {
            rows.push(if s % 2 == 0 {
                linked_gt.clone()
            } else {
                linked_ac.clone()
            });
        }
        let owned: Vec<&str> = rows.iter().map(|r| r.as_str()).collect();
        let positions: Vec<u64> = (1..=owned.len() as u64).map(|i| i * 100).collect();
        matrix_from_rows(&owned, &positions)
    }

    #[test]
    fn core_block_extends_across_linked_sites_and_skips_noise() {
        let m = linked_matrix();
        let mask = polymorphic_sites(&m, &loose_filter());
        assert!(!mask.get(1));
        let (calls, called) = call_by_linkage(&m, &family(), &mask, &params()).unwrap();

        // every linked site gets a call, the unlinked site does not
        let called_sites = calls.called_sites();
        assert!(called_sites.contains(&2));
        assert!(called_sites.contains(&9));
        assert!(!called_sites.contains(&0));
        assert!(!called_sites.contains(&1));
        assert_eq!(called.num_sites(), called_sites.len());

        // parent A's haplotype group codes as founder A everywhere
        for col in 0..called.num_sites() {
            assert_eq!(called.get(0, col), ParentCall::A);
            assert_eq!(called.get(10, col), ParentCall::C);
        }
    }

    #[test]
    fn founder_allele_identities_follow_the_groups() {
        let m = linked_matrix();
        let mask = polymorphic_sites(&m, &loose_filter());
        let (calls, _) = call_by_linkage(&m, &family(), &mask, &params()).unwrap();
        for (site, a, c) in calls.iter() {
            if site % 2 == 0 {
                assert_eq!((a, c), (Allele::G, Allele::T), "site {}", site);
            } else {
                assert_eq!((a, c), (Allele::A, Allele::C), "site {}", site);
            }
        }
    }

    #[test]
    fn zero_extension_window_fails_fast() {
        let m = linked_matrix();
        let mask = polymorphic_sites(&m, &loose_filter());
        let mut p = params();
        p.extension_window = 0;
        assert!(call_by_linkage(&m, &family(), &mask, &p).is_err());
    }

    #[test]
    fn no_polymorphic_sites_degrades_to_empty_calls() {
        let mono = "GG ".repeat(20);
        let rows = [mono.as_str(), mono.as_str()];
        let m = matrix_from_rows(&rows, &[100, 200]);
        let mask = polymorphic_sites(&m, &loose_filter());
        let (calls, called) = call_by_linkage(&m, &family(), &mask, &params()).unwrap();
        assert_eq!(calls.num_called(), 0);
        assert_eq!(called.num_sites(), 0);
    }
}
