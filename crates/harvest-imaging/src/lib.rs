//! Harvest imaging: post-processing for downloaded images.

pub mod process;
pub mod types;

pub use process::{decode, resize_encoded, resize_in_place, Image};
pub use types::*;
