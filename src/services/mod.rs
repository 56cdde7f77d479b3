// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod analysis;
pub mod fees;
pub mod meli;

pub use analysis::{AnalysisRequest, MarketAnalyzer};
pub use meli::{MeliClient, MeliService};
