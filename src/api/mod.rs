//! DTOs and conversions at the boundary between JSON scenario files and the
//! internal engine model (spec §6 "External interfaces").

pub mod dto;

pub use dto::{build_output, build_scenario};
