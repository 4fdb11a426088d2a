mod chromosome;
mod core_snps;
mod windowed;

pub use chromosome::{call_by_linkage, LinkageCallParams};
pub use core_snps::{find_core_snps, find_founder_groups, CoreSnpParams, GroupingPolicy};
pub use windowed::{call_by_window, site_windows, WindowCallParams};
