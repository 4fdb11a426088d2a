mod imputer;
mod model;
mod viterbi;

pub use imputer::{impute, HmmParams, ImputeOutcome};
pub use model::{initial_state_ln_probs, EmissionModel, TransitionModel, NUM_OBS, NUM_STATES};
pub use viterbi::{decode, ObsSequence};
