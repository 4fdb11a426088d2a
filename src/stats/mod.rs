mod distance;
mod linkage;

pub use distance::{ibs_distance, ibs_matrix, ld_matrix, DistanceMatrix};
pub use linkage::{group_correlation, site_r, table_r};
