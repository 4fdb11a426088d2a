use crate::data::{CalledMatrix, ParentCall};
use crate::hmm::model::{
    initial_state_ln_probs, EmissionModel, TransitionModel, NUM_OBS, NUM_STATES,
};
use crate::hmm::viterbi::{decode, ObsSequence};
use crate::utils::Result;
use itertools::Itertools;

#[derive(Debug, Clone)]
pub struct HmmParams {
    /// Prior probability of a heterozygous state.
    pub het_prob: f64,
    /// Taxa with fewer observations than this are assigned states straight
    /// from their observations instead of being decoded.
    pub min_obs_for_decoding: usize,
    pub max_iterations: usize,
}

impl Default for HmmParams {
    fn default() -> Self {
        HmmParams {
            het_prob: 0.07,
            min_obs_for_decoding: 20,
            max_iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImputeOutcome {
    pub iterations: usize,
    pub converged: bool,
}

/// Imputes founder-dosage calls in place. Each taxon's non-missing calls
/// form an observation sequence that is Viterbi-decoded; decoded paths feed
/// count-based re-estimation of the transition and emission matrices until
/// the emission-count table stops changing or the iteration cap is hit (the
/// cap is reported, not an error). Final states overwrite each taxon's
/// non-missing cells; missing cells are left untouched here.
pub fn impute(
    called: &mut CalledMatrix,
    params: &HmmParams,
    family_name: &str,
) -> Result<ImputeOutcome> {
    if params.max_iterations == 0 {
        return Err("HMM iteration cap must be positive".to_string());
    }
    let outcome = ImputeOutcome {
        iterations: 0,
        converged: true,
    };
    if called.num_sites() == 0 {
        return Ok(outcome);
    }

    let mean_spacing = mean_spacing(called);
    let mut transitions = TransitionModel::new(mean_spacing);
    let mut emissions = EmissionModel::new();
    let initial_ln = initial_state_ln_probs(params.het_prob);

    // per taxon: the observed classes with their positions and columns
    let sequences: Vec<(ObsSequence, Vec<usize>)> = (0..called.num_taxa())
        .map(|taxon| observations(called, taxon))
        .collect();

    let mut paths: Vec<Vec<u8>> = vec![Vec::new(); called.num_taxa()];
    let mut previous_em_counts = [[0usize; NUM_OBS]; NUM_STATES];
    let mut iteration = 0;
    let mut converged = false;
    while iteration < params.max_iterations {
        iteration += 1;
        log::debug!("Family {}: EM iteration {}", family_name, iteration);

        for (taxon, (seq, _)) in sequences.iter().enumerate() {
            if seq.len() >= params.min_obs_for_decoding {
                paths[taxon] = decode(seq, &transitions, &emissions, &initial_ln);
            } else {
                log::debug!(
                    "Family {}: taxon {} has only {} observations, assigning states directly",
                    family_name,
                    taxon,
                    seq.len()
                );
                paths[taxon] = seq.classes.iter().map(|&obs| direct_state(obs)).collect();
            }
        }

        let mut transition_counts = [[0usize; NUM_STATES]; NUM_STATES];
        let mut emission_counts = [[0usize; NUM_OBS]; NUM_STATES];
        for (taxon, (seq, _)) in sequences.iter().enumerate() {
            let path = &paths[taxon];
            for step in 1..path.len() {
                transition_counts[path[step - 1] as usize][path[step] as usize] += 1;
            }
            for (state, &obs) in path.iter().zip(&seq.classes) {
                emission_counts[*state as usize][obs as usize] += 1;
            }
        }

        if emission_counts == previous_em_counts {
            converged = true;
            break;
        }
        previous_em_counts = emission_counts;
        transitions.set_counts(&transition_counts);
        emissions.set_counts(&emission_counts);
    }

    if converged {
        log::info!(
            "Family {}: EM converged after {} iterations",
            family_name,
            iteration
        );
    } else {
        log::warn!(
            "Family {}: EM did not converge within {} iterations, using the last decoding",
            family_name,
            iteration
        );
    }
    log::debug!(
        "Family {}: final emission counts {}",
        family_name,
        previous_em_counts
            .iter()
            .map(|row| format!("[{}]", row.iter().join(", ")))
            .join(" ")
    );

    for (taxon, (_, columns)) in sequences.iter().enumerate() {
        for (state, &col) in paths[taxon].iter().zip(columns) {
            called.set(taxon, col, state_call(*state));
        }
    }

    Ok(ImputeOutcome {
        iterations: iteration,
        converged,
    })
}

fn observations(called: &CalledMatrix, taxon: usize) -> (ObsSequence, Vec<usize>) {
    let mut positions = Vec::new();
    let mut classes = Vec::new();
    let mut columns = Vec::new();
    for col in 0..called.num_sites() {
        let obs = match called.get(taxon, col) {
            ParentCall::A => 0u8,
            ParentCall::Het => 1,
            ParentCall::C => 2,
            ParentCall::Missing => continue,
        };
        positions.push(called.position(col));
        classes.push(obs);
        columns.push(col);
    }
    (ObsSequence { positions, classes }, columns)
}

fn mean_spacing(called: &CalledMatrix) -> f64 {
    let n = called.num_sites();
    if n < 2 {
        return 1.0;
    }
    let span = called.position(n - 1) - called.position(0);
    (span as f64 / n as f64).max(1.0)
}

/// States for taxa too sparse to decode: homozygous observations map to the
/// matching end state, heterozygous ones to the balanced middle state.
fn direct_state(obs: u8) -> u8 {
    match obs {
        0 => 0,
        2 => 4,
        _ => 2,
    }
}

/// Decoded states collapse back to three call classes: any mixed-dosage
/// state reports as heterozygous.
fn state_call(state: u8) -> ParentCall {
    match state {
        0 => ParentCall::A,
        4 => ParentCall::C,
        _ => ParentCall::Het,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating_matrix(num_sites: usize) -> CalledMatrix {
        let sites: Vec<usize> = (0..num_sites).collect();
        let positions: Vec<u64> = (1..=num_sites as u64).map(|i| i * 100).collect();
        let mut m = CalledMatrix::new(1, sites, positions).unwrap();
        for col in 0..num_sites {
            let call = if col < num_sites / 2 {
                ParentCall::A
            } else {
                ParentCall::C
            };
            m.set(0, col, call);
        }
        m
    }

    #[test]
    fn noise_free_path_round_trips_and_converges_fast() {
        let mut m = alternating_matrix(40);
        let outcome = impute(&mut m, &HmmParams::default(), "fam").unwrap();
        assert!(outcome.converged);
        assert!(outcome.iterations <= 2);
        for col in 0..40 {
            let expected = if col < 20 { ParentCall::A } else { ParentCall::C };
            assert_eq!(m.get(0, col), expected);
        }
    }

    #[test]
    fn sparse_taxon_states_come_straight_from_observations() {
        let sites: Vec<usize> = (0..5).collect();
        let positions: Vec<u64> = (1..=5).map(|i| i * 100).collect();
        let mut m = CalledMatrix::new(1, sites, positions).unwrap();
        m.set(0, 0, ParentCall::A);
        m.set(0, 1, ParentCall::C);
        m.set(0, 2, ParentCall::Het);
        m.set(0, 4, ParentCall::A);
        let outcome = impute(&mut m, &HmmParams::default(), "fam").unwrap();
        assert!(outcome.converged);
        assert_eq!(m.get(0, 0), ParentCall::A);
        assert_eq!(m.get(0, 1), ParentCall::C);
        assert_eq!(m.get(0, 2), ParentCall::Het);
        assert_eq!(m.get(0, 3), ParentCall::Missing);
        assert_eq!(m.get(0, 4), ParentCall::A);
    }

    #[test]
    fn missing_cells_stay_missing_after_decoding() {
        let num_sites = 30;
        let sites: Vec<usize> = (0..num_sites).collect();
        let positions: Vec<u64> = (1..=num_sites as u64).map(|i| i * 100).collect();
        let mut m = CalledMatrix::new(1, sites, positions).unwrap();
        for col in 0..num_sites {
            if col != 7 {
                m.set(0, col, ParentCall::A);
            }
        }
        impute(&mut m, &HmmParams::default(), "fam").unwrap();
        assert_eq!(m.get(0, 7), ParentCall::Missing);
        assert_eq!(m.get(0, 8), ParentCall::A);
    }

    #[test]
    fn empty_matrix_is_a_no_op() {
        let mut m = CalledMatrix::new(3, Vec::new(), Vec::new()).unwrap();
        let outcome = impute(&mut m, &HmmParams::default(), "fam").unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn zero_iteration_cap_fails_fast() {
        let mut m = alternating_matrix(10);
        let params = HmmParams {
            max_iterations: 0,
            ..HmmParams::default()
        };
        assert!(impute(&mut m, &params, "fam").is_err());
    }
}
