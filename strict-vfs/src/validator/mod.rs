pub mod allowed_roots;
pub mod constraint;
pub mod rules;

pub use allowed_roots::{AllowedRoots, ALLOWED_ROOTS_ENV};
pub use constraint::{Constraint, Violation, Violations};
pub use rules::{Rule, Rules};

#[cfg(test)]
mod tests;
