use crate::cluster::{group_members, group_sizes, upgma};
use crate::data::{GenotypeMatrix, SiteMask};
use crate::stats::{ibs_matrix, ld_matrix};
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct CoreSnpParams {
    /// Number of consecutive polymorphic sites per candidate window.
    pub window_size: usize,
    /// Number of evenly offset windows to try.
    pub num_trials: usize,
    /// Dendrogram cut height for site clusters.
    pub cut_height: f64,
}

impl Default for CoreSnpParams {
    fn default() -> Self {
        CoreSnpParams {
            window_size: 100,
            num_trials: 5,
            cut_height: 0.3,
        }
    }
}

/// Finds a compact set of mutually correlated marker sites to seed founder
/// discovery. Tries `num_trials` windows of consecutive polymorphic sites
/// spread across the chromosome, clusters each window on 1 - r^2 linkage
/// distance, cuts at the configured height, and returns the largest site
/// group over all windows (the first window wins ties).
pub fn find_core_snps(
    matrix: &GenotypeMatrix,
    polymorphic: &SiteMask,
    params: &CoreSnpParams,
) -> Result<Vec<usize>> {
    if params.window_size == 0 || params.num_trials == 0 {
        return Err("Core-SNP window size and trial count must be positive".to_string());
    }

    let poly: Vec<usize> = polymorphic.indices().collect();
    if poly.is_empty() {
        return Ok(Vec::new());
    }

    let interval = poly.len() / (params.num_trials + 1);
    let mut best: Vec<usize> = Vec::new();
    let mut start = -((params.window_size / 2) as i64);
    for trial in 0..params.num_trials {
        start += interval as i64;
        let begin = start.max(0) as usize;
        if begin >= poly.len() {
            break;
        }
        let window = &poly[begin..poly.len().min(begin + params.window_size)];
        if window.len() < 2 {
            continue;
        }

        let mut distances = ld_matrix(matrix, window);
        distances.repair();
        let tree = upgma(&distances);
        let partition = tree.cut_at_height(params.cut_height);

        let sizes = group_sizes(&partition);
        let largest = match largest_group(&sizes) {
            Some(group) => group,
            None => continue,
        };
        let group_sites: Vec<usize> = group_members(&partition, largest)
            .into_iter()
            .map(|leaf| window[leaf])
            .collect();
        log::debug!(
            "Core-SNP trial {}: window of {} sites, largest cluster {}",
            trial,
            window.len(),
            group_sites.len()
        );
        if group_sites.len() > best.len() {
            best = group_sites;
        }
    }
    Ok(best)
}

/// Termination rule for founder-group discovery. The boundary is an
/// empirical policy, not a law; both knobs are caller-tunable.
#[derive(Debug, Clone)]
pub struct GroupingPolicy {
    /// Largest acceptable fraction of taxa in the majority group.
    pub max_major_fraction: f64,
    /// Smallest acceptable size of the second group.
    pub min_minor_size: usize,
}

impl Default for GroupingPolicy {
    fn default() -> Self {
        GroupingPolicy {
            max_major_fraction: 0.5,
            min_minor_size: 10,
        }
    }
}

/// Splits the taxa into the two founder-origin groups by IBS clustering
/// over the core sites, raising the group count until the policy is
/// satisfied (or every taxon is a singleton). Returns the two largest
/// groups, larger first; ties keep the group that appears first.
pub fn find_founder_groups(
    matrix: &GenotypeMatrix,
    core_snps: &[usize],
    policy: &GroupingPolicy,
) -> (Vec<usize>, Vec<usize>) {
    if core_snps.is_empty() || matrix.num_taxa() < 2 {
        return (Vec::new(), Vec::new());
    }

    let mut distances = ibs_matrix(matrix, core_snps);
    distances.repair();
    let tree = upgma(&distances);

    let num_taxa = matrix.num_taxa();
    let max_major = (policy.max_major_fraction * num_taxa as f64).floor() as usize;
    let mut partition = Vec::new();
    let mut major = 0;
    let mut minor = 0;
    for num_groups in 2..=num_taxa {
        partition = tree.cut_into_groups(num_groups);
        let sizes = group_sizes(&partition);
        (major, minor) = two_largest_groups(&sizes);
        if sizes[major] <= max_major && sizes[minor] >= policy.min_minor_size {
            break;
        }
        if num_groups == num_taxa {
            log::warn!(
                "Founder grouping exhausted at {} singleton groups; population may be too small",
                num_taxa
            );
        }
    }

    let sizes = group_sizes(&partition);
    for (group, &size) in sizes.iter().enumerate() {
        if size > 5 {
            log::info!("Taxa group {} has {} members", group, size);
        }
    }

    (
        group_members(&partition, major),
        group_members(&partition, minor),
    )
}

fn largest_group(sizes: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (group, &size) in sizes.iter().enumerate() {
        if best.map_or(true, |b| size > sizes[b]) {
            best = Some(group);
        }
    }
    best
}

fn two_largest_groups(sizes: &[usize]) -> (usize, usize) {
    let major = largest_group(sizes).unwrap_or(0);
    let mut minor = if major == 0 { 1 } else { 0 };
    for (group, &size) in sizes.iter().enumerate() {
        if group != major && size > sizes[minor] {
            minor = group;
        }
    }
    (major, minor)
}
