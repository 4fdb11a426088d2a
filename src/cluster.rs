use crate::stats::DistanceMatrix;
use kodama::{linkage, Dendrogram, Method, Step};

/// Average-linkage (UPGMA) dendrogram over a repaired distance matrix.
/// Leaves are labeled 0..n-1, the cluster formed by merge step i is labeled
/// n+i, and steps come in merge order with non-decreasing dissimilarity.
pub struct ClusterTree {
    num_leaves: usize,
    dendrogram: Option<Dendrogram<f64>>,
}

pub fn upgma(distances: &DistanceMatrix) -> ClusterTree {
    let num_leaves = distances.size();
    if num_leaves < 2 {
        return ClusterTree {
            num_leaves,
            dendrogram: None,
        };
    }
    let mut condensed = distances.condensed();
    let dendrogram = linkage(&mut condensed, num_leaves, Method::Average);
    ClusterTree {
        num_leaves,
        dendrogram: Some(dendrogram),
    }
}

impl ClusterTree {
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Partition obtained by merging every step at or below the given
    /// height.
    pub fn cut_at_height(&self, height: f64) -> Vec<usize> {
        self.partition_with(|_, step| step.dissimilarity <= height)
    }

    /// Partition into the requested number of groups by replaying merge
    /// steps; requesting >= n groups yields all singletons.
    pub fn cut_into_groups(&self, num_groups: usize) -> Vec<usize> {
        let merges = self.num_leaves.saturating_sub(num_groups.max(1));
        self.partition_with(|index, _| index < merges)
    }

    /// Walks steps top-down, propagating a group id through every allowed
    /// merge; unreached leaves become singletons. Group ids are renumbered
    /// by first-appearing leaf so equal inputs give identical partitions.
    fn partition_with(&self, allow: impl Fn(usize, &Step<f64>) -> bool) -> Vec<usize> {
        let n = self.num_leaves;
        let steps = match &self.dendrogram {
            Some(d) => d.steps(),
            None => return vec![0; n],
        };

        let mut membership: Vec<Option<usize>> = vec![None; 2 * n - 1];
        let mut num_groups = 0;
        for (index, step) in steps.iter().enumerate().rev() {
            if !allow(index, step) {
                continue;
            }
            let cluster = n + index;
            if membership[cluster].is_none() {
                membership[cluster] = Some(num_groups);
                num_groups += 1;
            }
            membership[step.cluster1] = membership[cluster];
            membership[step.cluster2] = membership[cluster];
        }

        let mut groups = Vec::with_capacity(n);
        for leaf in 0..n {
            match membership[leaf] {
                Some(group) => groups.push(group),
                None => {
                    groups.push(num_groups);
                    num_groups += 1;
                }
            }
        }
        renumber_by_first_leaf(&groups)
    }
}

fn renumber_by_first_leaf(groups: &[usize]) -> Vec<usize> {
    let mut remap: Vec<Option<usize>> = vec![None; groups.len()];
    let mut next = 0;
    groups
        .iter()
        .map(|&g| {
            *remap[g].get_or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

/// Group sizes indexed by group id.
pub fn group_sizes(partition: &[usize]) -> Vec<usize> {
    let num_groups = partition.iter().max().map_or(0, |&g| g + 1);
    let mut sizes = vec![0usize; num_groups];
    for &g in partition {
        sizes[g] += 1;
    }
    sizes
}

/// Members of one group, in leaf order.
pub fn group_members(partition: &[usize], group: usize) -> Vec<usize> {
    partition
        .iter()
        .enumerate()
        .filter_map(|(leaf, &g)| if g == group { Some(leaf) } else { None })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blob_matrix() -> DistanceMatrix {
        DistanceMatrix::from_fn(6, |i, j| {
            if i == j {
                0.0
            } else if (i < 3) == (j < 3) {
                0.1
            } else {
                0.9
            }
        })
    }

    #[test]
    fn cut_into_two_groups_finds_the_blobs() {
        let tree = upgma(&two_blob_matrix());
        assert_eq!(tree.cut_into_groups(2), vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn cut_at_height_between_blob_levels() {
        let tree = upgma(&two_blob_matrix());
        assert_eq!(tree.cut_at_height(0.5), vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(tree.cut_at_height(1.0), vec![0; 6]);
    }

    #[test]
    fn requesting_n_groups_yields_singletons() {
        let tree = upgma(&two_blob_matrix());
        assert_eq!(tree.cut_into_groups(6), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn clustering_is_deterministic() {
        // all-equal distances force linkage ties
        let dm = DistanceMatrix::from_fn(5, |i, j| if i == j { 0.0 } else { 0.5 });
        let first = upgma(&dm).cut_into_groups(2);
        let second = upgma(&dm).cut_into_groups(2);
        assert_eq!(first, second);
    }

    #[test]
    fn random_matrices_cluster_identically_across_runs() {
        use rand::{rng, Rng};
        let n = 12;
        let mut r = rng();
        let mut values = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = r.random_range(0.1..1.0);
                values[i][j] = d;
                values[j][i] = d;
            }
        }
        let dm = DistanceMatrix::from_fn(n, |i, j| values[i][j]);
        for k in [2, 3, 5] {
            assert_eq!(upgma(&dm).cut_into_groups(k), upgma(&dm).cut_into_groups(k));
        }
        assert_eq!(upgma(&dm).cut_at_height(0.5), upgma(&dm).cut_at_height(0.5));
    }

    #[test]
    fn single_leaf_partitions() {
        let dm = DistanceMatrix::from_fn(1, |_, _| 0.0);
        let tree = upgma(&dm);
        assert_eq!(tree.cut_at_height(0.5), vec![0]);
        assert_eq!(tree.cut_into_groups(2), vec![0]);
    }

    #[test]
    fn group_helpers() {
        let partition = vec![0, 1, 0, 1, 1];
        assert_eq!(group_sizes(&partition), vec![2, 3]);
        assert_eq!(group_members(&partition, 1), vec![1, 3, 4]);
    }
}
