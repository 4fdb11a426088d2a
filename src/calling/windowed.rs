use crate::data::{CalledMatrix, FamilyContext, FounderCalls, GenotypeMatrix, ParentCall, SiteMask};
use crate::stats::{group_correlation, ibs_matrix};
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct WindowCallParams {
    /// Target number of polymorphic sites per window.
    pub window_size: usize,
    /// Major-allele frequency both groups must reach for a site call.
    pub min_group_frequency: f64,
    /// Re-cluster a window only when more than this many sites survive the
    /// group screen.
    pub min_screened_sites: usize,
    /// Swap group labels when the correlation with the previous window
    /// falls below this threshold.
    pub swap_threshold: f64,
}

impl Default for WindowCallParams {
    fn default() -> Self {
        WindowCallParams {
            window_size: 100,
            min_group_frequency: 0.6,
            min_screened_sites: 5,
            swap_threshold: -0.05,
        }
    }
}

/// Windowed calling: split the polymorphic sites into near-equal windows,
/// cluster the taxa into two groups per window (seeded by the founders when
/// both are present), keep each window's orientation consistent with its
/// predecessor, and call each screened site from the two group major
/// alleles. Windows and sites that fail any screen are skipped silently.
pub fn call_by_window(
    matrix: &GenotypeMatrix,
    family: &FamilyContext,
    polymorphic: &SiteMask,
    params: &WindowCallParams,
) -> Result<(FounderCalls, CalledMatrix)> {
    if params.window_size == 0 {
        return Err("Window size must be positive".to_string());
    }

    let index_a = matrix.taxon_index(&family.parent_a);
    let index_c = matrix.taxon_index(&family.parent_c);
    if index_a.is_none() || index_c.is_none() {
        log::warn!(
            "Family {}: founders not both present in the matrix; windows seed from the most distant taxa",
            family.name
        );
    }
    let seeds = match (index_a, index_c) {
        (Some(a), Some(c)) if a != c => Some((a, c)),
        _ => None,
    };

    let mut calls = FounderCalls::new(matrix.num_sites());
    let mut previous: Option<(Vec<usize>, Vec<usize>)> = None;
    for window in site_windows(polymorphic, params.window_size) {
        let (mut groups, kept_sites) = window_groups(matrix, &window, seeds, params);

        let r = previous
            .as_ref()
            .map_or(0.0, |p| group_correlation((&p.0, &p.1), (&groups.0, &groups.1)));
        log::info!(
            "Family {}: window at {} has {} usable sites, r = {:.3} with previous window",
            family.name,
            matrix.marker(window[0]),
            kept_sites.len(),
            r
        );
        align_with_previous(&mut groups, family, r, index_a, index_c, params.swap_threshold);
        previous = Some(groups.clone());

        for &site in &kept_sites {
            let major_a = matrix.major_allele_in(site, &groups.0);
            let major_c = matrix.major_allele_in(site, &groups.1);
            if let (Some(a), Some(c)) = (major_a, major_c) {
                if a != c {
                    calls.record(site, a, c);
                }
            }
        }
    }
    log::info!("Family {}: {} called sites", family.name, calls.num_called());

    let sites = calls.called_sites();
    let positions = sites.iter().map(|&s| matrix.position(s)).collect();
    let mut called = CalledMatrix::new(matrix.num_taxa(), sites, positions)?;
    for (col, (site, a, c)) in calls.iter().enumerate() {
        for taxon in 0..matrix.num_taxa() {
            called.set(taxon, col, ParentCall::classify(matrix.get(taxon, site), a, c));
        }
    }
    Ok((calls, called))
}

/// Partitions the polymorphic sites into consecutive near-equal windows. A
/// trailing remainder larger than half a window earns its own window;
/// otherwise the last window absorbs it.
pub fn site_windows(polymorphic: &SiteMask, window_size: usize) -> Vec<Vec<usize>> {
    let poly: Vec<usize> = polymorphic.indices().collect();
    let num_poly = poly.len();
    let mut num_windows = num_poly / window_size;
    if num_poly % window_size > window_size / 2 {
        num_windows += 1;
    }
    if num_windows == 0 {
        return Vec::new();
    }

    let mut windows = Vec::with_capacity(num_windows);
    let mut set_size = num_poly / num_windows;
    let mut taken = 0;
    for _ in 0..num_windows {
        let left = num_poly - taken;
        if left < set_size * 2 {
            set_size = left;
        }
        windows.push(poly[taken..taken + set_size].to_vec());
        taken += set_size;
    }
    windows
}

/// Clusters the window's taxa into two groups, then screens the window to
/// sites where the groups disagree with a confident major allele each; with
/// enough surviving sites the taxa are re-clustered on those alone.
fn window_groups(
    matrix: &GenotypeMatrix,
    window: &[usize],
    seeds: Option<(usize, usize)>,
    params: &WindowCallParams,
) -> ((Vec<usize>, Vec<usize>), Vec<usize>) {
    let groups = cluster_pair(matrix, window, seeds);

    let screened: Vec<usize> = window
        .iter()
        .copied()
        .filter(|&site| site_separates_groups(matrix, site, &groups, params.min_group_frequency))
        .collect();

    if screened.len() > params.min_screened_sites {
        (cluster_pair(matrix, &screened, seeds), screened)
    } else {
        (groups, window.to_vec())
    }
}

fn site_separates_groups(
    matrix: &GenotypeMatrix,
    site: usize,
    groups: &(Vec<usize>, Vec<usize>),
    min_frequency: f64,
) -> bool {
    let major_a = matrix.major_allele_in(site, &groups.0);
    let major_c = matrix.major_allele_in(site, &groups.1);
    match (major_a, major_c) {
        (Some(a), Some(c)) => {
            a != c
                && matrix.major_allele_freq_in(site, &groups.0) > min_frequency
                && matrix.major_allele_freq_in(site, &groups.1) > min_frequency
        }
        _ => false,
    }
}

/// Two-way taxa clustering over a site subset, seeded by the founder rows
/// when available and by the most distant taxon pair otherwise. Taxa move
/// to the group with the smaller mean IBS distance; seeds stay pinned.
fn cluster_pair(
    matrix: &GenotypeMatrix,
    sites: &[usize],
    seeds: Option<(usize, usize)>,
) -> (Vec<usize>, Vec<usize>) {
    const MAX_ROUNDS: usize = 10;

    let num_taxa = matrix.num_taxa();
    if num_taxa < 2 {
        return ((0..num_taxa).collect(), Vec::new());
    }

    let mut distances = ibs_matrix(matrix, sites);
    distances.repair();

    let (seed_a, seed_c) = seeds.unwrap_or_else(|| {
        let mut best = (0, 1);
        for i in 0..num_taxa {
            for j in (i + 1)..num_taxa {
                if distances.get(i, j) > distances.get(best.0, best.1) {
                    best = (i, j);
                }
            }
        }
        best
    });

    let mut assignment: Vec<bool> = (0..num_taxa)
        .map(|t| distances.get(t, seed_c) < distances.get(t, seed_a))
        .collect();
    assignment[seed_a] = false;
    assignment[seed_c] = true;

    for _ in 0..MAX_ROUNDS {
        let mut next = assignment.clone();
        for t in 0..num_taxa {
            if t == seed_a || t == seed_c {
                continue;
            }
            let mean_to = |in_second: bool| {
                let mut total = 0.0;
                let mut count = 0;
                for u in 0..num_taxa {
                    if u != t && assignment[u] == in_second {
                        total += distances.get(t, u);
                        count += 1;
                    }
                }
                if count == 0 {
                    f64::INFINITY
                } else {
                    total / count as f64
                }
            };
            next[t] = mean_to(true) < mean_to(false);
        }
        if next == assignment {
            break;
        }
        assignment = next;
    }

    let mut group_a = Vec::new();
    let mut group_c = Vec::new();
    for (t, &in_second) in assignment.iter().enumerate() {
        if in_second {
            group_c.push(t);
        } else {
            group_a.push(t);
        }
    }
    (group_a, group_c)
}

/// Keeps window orientation consistent with the previous window, swapping
/// the labels when the membership correlation goes negative past the
/// threshold, and reporting founders that cluster suspiciously.
fn align_with_previous(
    groups: &mut (Vec<usize>, Vec<usize>),
    family: &FamilyContext,
    r: f64,
    index_a: Option<usize>,
    index_c: Option<usize>,
    swap_threshold: f64,
) {
    let group_of = |index: Option<usize>| -> Option<usize> {
        let i = index?;
        if groups.0.contains(&i) {
            Some(0)
        } else if groups.1.contains(&i) {
            Some(1)
        } else {
            None
        }
    };
    let p1 = group_of(index_a);
    let p2 = group_of(index_c);

    let mut in_same_group = false;
    let mut in_wrong_groups = false;
    match (p1, p2) {
        (Some(0), Some(0)) | (Some(1), Some(1)) => in_same_group = true,
        (Some(0), Some(1)) | (Some(0), None) | (None, Some(1)) => {
            if r < 0.0 {
                in_wrong_groups = true;
            }
        }
        (Some(1), Some(0)) | (Some(1), None) | (None, Some(0)) => {
            if r > 0.0 {
                in_wrong_groups = true;
            }
        }
        (None, None) => {}
        _ => {}
    }

    if r < swap_threshold {
        std::mem::swap(&mut groups.0, &mut groups.1);
    }
    if in_same_group {
        log::warn!("Family {}: both founders cluster into the same group", family.name);
    }
    if in_wrong_groups {
        log::warn!("Family {}: founders cluster into unexpected groups", family.name);
    }
}
