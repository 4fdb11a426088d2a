mod genotype;
mod matrix;
mod population;
mod site_mask;

pub use genotype::{Allele, Genotype, ParentCall};
pub use matrix::{GenotypeMatrix, MatrixBuilder};
pub use population::{CalledMatrix, FamilyContext, FounderCalls};
pub use site_mask::SiteMask;
