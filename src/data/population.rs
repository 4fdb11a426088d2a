use crate::data::genotype::{Allele, ParentCall};
use crate::data::site_mask::SiteMask;
use crate::utils::Result;

/// One biparental family: the two founder names and a label used in logs.
#[derive(Debug, Clone)]
pub struct FamilyContext {
    pub name: String,
    pub parent_a: String,
    pub parent_c: String,
}

/// Founder-allele assignments for the sites of one chromosome: a has-a-call
/// flag per site plus the A-parent and C-parent allele wherever a call was
/// made. Iteration always yields calls in increasing site order.
#[derive(Debug, Clone)]
pub struct FounderCalls {
    mask: SiteMask,
    allele_a: Vec<Option<Allele>>,
    allele_c: Vec<Option<Allele>>,
}

impl FounderCalls {
    pub fn new(num_sites: usize) -> FounderCalls {
        FounderCalls {
            mask: SiteMask::new(num_sites),
            allele_a: vec![None; num_sites],
            allele_c: vec![None; num_sites],
        }
    }

    pub fn num_sites(&self) -> usize {
        self.mask.len()
    }

    pub fn num_called(&self) -> usize {
        self.mask.count()
    }

    pub fn mask(&self) -> &SiteMask {
        &self.mask
    }

    pub fn record(&mut self, site: usize, allele_a: Allele, allele_c: Allele) {
        self.mask.set(site);
        self.allele_a[site] = Some(allele_a);
        self.allele_c[site] = Some(allele_c);
    }

    pub fn get(&self, site: usize) -> Option<(Allele, Allele)> {
        match (self.allele_a[site], self.allele_c[site]) {
            (Some(a), Some(c)) => Some((a, c)),
            _ => None,
        }
    }

    pub fn called_sites(&self) -> Vec<usize> {
        self.mask.indices().collect()
    }

    /// (site, founder A allele, founder C allele) in increasing site order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Allele, Allele)> + '_ {
        self.mask
            .indices()
            .map(|s| (s, self.allele_a[s].unwrap(), self.allele_c[s].unwrap()))
    }
}

/// Founder-coded calls over the called sites of a chromosome. Columns keep
/// the original site index and physical position so decoded states can be
/// mapped back onto the source matrix.
#[derive(Debug, Clone)]
pub struct CalledMatrix {
    num_taxa: usize,
    sites: Vec<usize>,
    positions: Vec<u64>,
    calls: Vec<ParentCall>,
}

impl CalledMatrix {
    pub fn new(num_taxa: usize, sites: Vec<usize>, positions: Vec<u64>) -> Result<CalledMatrix> {
        if sites.len() != positions.len() {
            return Err(format!(
                "Called-site index and position arrays differ in length: {} vs {}",
                sites.len(),
                positions.len()
            ));
        }
        if sites.windows(2).any(|w| w[0] >= w[1]) {
            return Err("Called sites are not in increasing order".to_string());
        }
        let calls = vec![ParentCall::Missing; num_taxa * sites.len()];
        Ok(CalledMatrix {
            num_taxa,
            sites,
            positions,
            calls,
        })
    }

    pub fn num_taxa(&self) -> usize {
        self.num_taxa
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// Original site index of a column.
    pub fn site(&self, col: usize) -> usize {
        self.sites[col]
    }

    pub fn position(&self, col: usize) -> u64 {
        self.positions[col]
    }

    pub fn get(&self, taxon: usize, col: usize) -> ParentCall {
        self.calls[taxon * self.sites.len() + col]
    }

    pub fn set(&mut self, taxon: usize, col: usize, call: ParentCall) {
        let width = self.sites.len();
        self.calls[taxon * width + col] = call;
    }
}
