//! Founder-dosage states and the position-dependent transition and
//! emission models of the five-state imputation chain.

pub const NUM_STATES: usize = 5;
pub const NUM_OBS: usize = 3;

/// Largest total probability a row may put on leaving its state, however
/// long the gap to the next site.
const MAX_SWITCH_PROB: f64 = 0.98;

/// Transition probabilities between dosage states, interpreted per average
/// inter-site step. At decode time off-diagonal entries scale with the
/// physical gap between consecutive observed sites and the diagonal absorbs
/// the remainder, so longer gaps make a state change more likely.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    probs: [[f64; NUM_STATES]; NUM_STATES],
    mean_spacing: f64,
}

impl TransitionModel {
    pub fn new(mean_spacing: f64) -> TransitionModel {
        TransitionModel {
            probs: [
                [0.999, 0.0001, 0.0003, 0.0001, 0.0005],
                [0.0002, 0.999, 0.00005, 0.00005, 0.0002],
                [0.0002, 0.00005, 0.999, 0.00005, 0.0002],
                [0.0002, 0.00005, 0.00005, 0.999, 0.0002],
                [0.0005, 0.0001, 0.0003, 0.0001, 0.999],
            ],
            mean_spacing: mean_spacing.max(1.0),
        }
    }

    /// Log probability of moving between states across a physical gap.
    pub fn ln_prob(&self, from: usize, to: usize, gap: u64) -> f64 {
        let ratio = gap as f64 / self.mean_spacing;
        let row = &self.probs[from];
        let mut switch_total = 0.0;
        for (state, &p) in row.iter().enumerate() {
            if state != from {
                switch_total += p * ratio;
            }
        }
        let scale = if switch_total > MAX_SWITCH_PROB {
            MAX_SWITCH_PROB / switch_total
        } else {
            1.0
        };

        if to == from {
            (1.0 - switch_total.min(MAX_SWITCH_PROB)).ln()
        } else {
            (row[to] * ratio * scale).ln()
        }
    }

    /// Replaces the matrix with row-normalized transition counts from the
    /// decoded paths. Rows without any count keep their probabilities.
    pub fn set_counts(&mut self, counts: &[[usize; NUM_STATES]; NUM_STATES]) {
        for (row, row_counts) in self.probs.iter_mut().zip(counts) {
            let total: usize = row_counts.iter().sum();
            if total == 0 {
                continue;
            }
            for (p, &count) in row.iter_mut().zip(row_counts) {
                *p = count as f64 / total as f64;
            }
        }
    }
}

/// Probability of each observation class given a dosage state.
#[derive(Debug, Clone)]
pub struct EmissionModel {
    probs: [[f64; NUM_OBS]; NUM_STATES],
}

impl EmissionModel {
    pub fn new() -> EmissionModel {
        EmissionModel {
            // observations: A, het, C
            probs: [
                [0.98, 0.001, 0.001],
                [0.6, 0.2, 0.2],
                [0.4, 0.2, 0.4],
                [0.2, 0.2, 0.6],
                [0.001, 0.001, 0.98],
            ],
        }
    }

    pub fn ln_prob(&self, state: usize, obs: usize) -> f64 {
        self.probs[state][obs].ln()
    }

    /// Replaces the matrix with row-normalized emission counts; rows without
    /// any count keep their probabilities.
    pub fn set_counts(&mut self, counts: &[[usize; NUM_OBS]; NUM_STATES]) {
        for (row, row_counts) in self.probs.iter_mut().zip(counts) {
            let total: usize = row_counts.iter().sum();
            if total == 0 {
                continue;
            }
            for (p, &count) in row.iter_mut().zip(row_counts) {
                *p = count as f64 / total as f64;
            }
        }
    }
}

impl Default for EmissionModel {
    fn default() -> Self {
        EmissionModel::new()
    }
}

/// Log prior over states: heterozygous probability split 1:2:1 across the
/// three mixed states, the rest split evenly between the homozygous ends.
pub fn initial_state_ln_probs(het_prob: f64) -> [f64; NUM_STATES] {
    let hom = (1.0 - het_prob) / 2.0;
    [
        hom.ln(),
        (0.25 * het_prob).ln(),
        (0.5 * het_prob).ln(),
        (0.25 * het_prob).ln(),
        hom.ln(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stay_probability_shrinks_with_distance() {
        let tm = TransitionModel::new(100.0);
        let near = tm.ln_prob(0, 0, 100);
        let far = tm.ln_prob(0, 0, 10_000);
        assert!(near > far);
        let switch_near = tm.ln_prob(0, 4, 100);
        let switch_far = tm.ln_prob(0, 4, 10_000);
        assert!(switch_far > switch_near);
    }

    #[test]
    fn rows_stay_normalized_after_scaling() {
        let tm = TransitionModel::new(50.0);
        for gap in [1u64, 50, 500, 50_000] {
            for from in 0..NUM_STATES {
                let total: f64 = (0..NUM_STATES)
                    .map(|to| tm.ln_prob(from, to, gap).exp())
                    .sum();
                assert!((total - 1.0).abs() < 1e-9, "gap {} from {}", gap, from);
            }
        }
    }

    #[test]
    fn counts_replace_rows_and_zero_rows_are_kept() {
        let mut em = EmissionModel::new();
        let mut counts = [[0usize; NUM_OBS]; NUM_STATES];
        counts[0] = [8, 1, 1];
        em.set_counts(&counts);
        assert!((em.ln_prob(0, 0).exp() - 0.8).abs() < 1e-12);
        // state 4 saw no counts and keeps its initial emissions
        assert!((em.ln_prob(4, 2).exp() - 0.98).abs() < 1e-12);
    }

    #[test]
    fn initial_state_priors_sum_to_one() {
        let prior = initial_state_ln_probs(0.07);
        let total: f64 = prior.iter().map(|lp| lp.exp()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
