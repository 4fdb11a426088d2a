use crate::calling::{call_by_linkage, call_by_window, LinkageCallParams, WindowCallParams};
use crate::data::{FamilyContext, GenotypeMatrix};
use crate::hmm::{self, HmmParams, ImputeOutcome};
use crate::post;
use crate::sites::{polymorphic_sites, SiteFilterParams};
use crate::utils::Result;
use std::str::FromStr;

#[derive(Debug, Clone, Copy)]
pub enum CallMode {
    /// Independent windows with cross-window consistency checking.
    Window,
    /// Core-SNP clustering followed by whole-chromosome linkage extension.
    Chromosome,
}

impl FromStr for CallMode {
    type Err = &'static str;
    fn from_str(mode: &str) -> std::result::Result<Self, Self::Err> {
        match mode {
            "window" => Ok(CallMode::Window),
            "chrom" | "chromosome" => Ok(CallMode::Chromosome),
            _ => Err("Invalid calling mode"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub mode: CallMode,
    pub filter: SiteFilterParams,
    pub linkage: LinkageCallParams,
    pub window: WindowCallParams,
    pub hmm: HmmParams,
}

impl Default for PipelineParams {
    fn default() -> Self {
        PipelineParams {
            mode: CallMode::Window,
            filter: SiteFilterParams::default(),
            linkage: LinkageCallParams::default(),
            window: WindowCallParams::default(),
            hmm: HmmParams::default(),
        }
    }
}

pub struct FamilyResult {
    pub matrix: GenotypeMatrix,
    pub called_sites: usize,
    pub hmm: ImputeOutcome,
}

/// Runs the whole per-chromosome engine for one family: site filtering,
/// founder-allele calling in the selected mode, HMM imputation, gap
/// filling, and the final rewrite of the source matrix. A chromosome with
/// nothing callable comes back unchanged.
pub fn impute_family(
    matrix: &GenotypeMatrix,
    family: &FamilyContext,
    params: &PipelineParams,
) -> Result<FamilyResult> {
    let polymorphic = polymorphic_sites(matrix, &params.filter);
    log::info!(
        "Family {} on {}: {} of {} sites polymorphic",
        family.name,
        matrix.chrom(),
        polymorphic.count(),
        matrix.num_sites()
    );

    let (calls, mut called) = match params.mode {
        CallMode::Window => call_by_window(matrix, family, &polymorphic, &params.window)?,
        CallMode::Chromosome => call_by_linkage(matrix, family, &polymorphic, &params.linkage)?,
    };
    if calls.num_called() == 0 {
        log::warn!(
            "Family {} on {}: no callable sites, matrix left unchanged",
            family.name,
            matrix.chrom()
        );
        return Ok(FamilyResult {
            matrix: matrix.clone(),
            called_sites: 0,
            hmm: ImputeOutcome {
                iterations: 0,
                converged: true,
            },
        });
    }

    let outcome = hmm::impute(&mut called, &params.hmm, &family.name)?;
    post::fill_gaps(&mut called);
    let rewritten = post::rewrite_alignment(matrix, &calls, &called)?;

    log::info!(
        "Family {} on {}: called {} of {} sites ({:.1}%)",
        family.name,
        matrix.chrom(),
        calls.num_called(),
        matrix.num_sites(),
        100.0 * calls.num_called() as f64 / matrix.num_sites() as f64
    );
    Ok(FamilyResult {
        matrix: rewritten,
        called_sites: calls.num_called(),
        hmm: outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matrix_from_rows;
    use crate::data::Genotype;
    use crate::sites::SiteFilterParams;

    fn family() -> FamilyContext {
        FamilyContext {
            name: "fam1".to_string(),
            parent_a: "t0".to_string(),
            parent_c: "t10".to_string(),
        }
    }

    fn params(mode: CallMode) -> PipelineParams {
        let mut params = PipelineParams {
            mode,
            filter: SiteFilterParams {
                min_minor_count: 3,
                min_minor_frequency: 0.0,
                max_missing: 1.0,
            },
            ..PipelineParams::default()
        };
        params.window.window_size = 10;
        params.linkage.core.window_size = 10;
        params.linkage.core.num_trials = 1;
        params.hmm.min_obs_for_decoding = 10;
        params
    }

    /// 20 taxa in two founder haplotype groups over 30 clean sites, with
    /// taxon 5 missing a short run in the middle.
    fn synthetic_family() -> GenotypeMatrix {
        let clean = format!("{}{}", "GG ".repeat(10), "TT ".repeat(10));
        let gapped = format!(
            "{}NN {}{}",
            "GG ".repeat(5),
            "GG ".repeat(4),
            "TT ".repeat(10)
        );
        let mut rows: Vec<&str> = Vec::new();
        for site in 0..30 {
            rows.push(if (10..13).contains(&site) {
                gapped.as_str()
            } else {
                clean.as_str()
            });
        }
        let positions: Vec<u64> = (1..=30).map(|i| i * 100).collect();
        matrix_from_rows(&rows, &positions)
    }

    #[test]
    fn window_mode_imputes_the_missing_run() {
        let m = synthetic_family();
        let result = impute_family(&m, &family(), &params(CallMode::Window)).unwrap();
        assert_eq!(result.called_sites, 30);
        assert!(result.hmm.converged);
        for site in 10..13 {
            assert_eq!(m.get(5, site), Genotype::Missing);
            assert_eq!(result.matrix.get(5, site), "GG".parse().unwrap());
        }
        assert_eq!(result.matrix.get(0, 0), "GG".parse().unwrap());
        assert_eq!(result.matrix.get(19, 29), "TT".parse().unwrap());
    }

    #[test]
    fn chromosome_mode_matches_on_clean_data() {
        let m = synthetic_family();
        let result = impute_family(&m, &family(), &params(CallMode::Chromosome)).unwrap();
        assert_eq!(result.called_sites, 30);
        for site in 10..13 {
            assert_eq!(result.matrix.get(5, site), "GG".parse().unwrap());
        }
    }

    #[test]
    fn monomorphic_chromosome_passes_through_unchanged() {
        let mono = "GG ".repeat(20);
        let rows: Vec<&str> = (0..3).map(|_| mono.as_str()).collect();
        let m = matrix_from_rows(&rows, &[100, 200, 300]);
        let result = impute_family(&m, &family(), &params(CallMode::Window)).unwrap();
        assert_eq!(result.called_sites, 0);
        for site in 0..3 {
            for taxon in 0..20 {
                assert_eq!(result.matrix.get(taxon, site), m.get(taxon, site));
            }
        }
    }
}
