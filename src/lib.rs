#![deny(dead_code)]
#![deny(unused_imports)]

pub mod build;
pub mod catalog;
pub mod dosage;
pub mod liftover;
pub mod matcher;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod scoring;
pub mod types;

pub use build::resolve_build;
pub use dosage::{aggregate, compute_dosage};
pub use liftover::lift_coordinates;
pub use matcher::match_variants;
pub use normalize::normalize;
