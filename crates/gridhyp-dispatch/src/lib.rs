//! # gridhyp-dispatch: Generator startup hypotheses
//!
//! Computes a plausible, cost-ordered active-power dispatch for the generators
//! of a [`gridhyp_core::Network`] so that production matches load plus losses
//! in every connected component. This is a single-pass merit-order heuristic,
//! not a power flow or a market-clearing optimizer.
//!
//! ## Pipeline
//!
//! | Step | Module | Role |
//! |------|--------|------|
//! | Partition | [`area`] | One [`Area`] per connected component |
//! | Demand | [`demand`] | Loads times `(1 + loss_factor)` |
//! | Availability | [`availability`] | Imposed power and available capacity |
//! | Stacking | [`merit_order`] | Greedy allocation by startup cost |
//! | Refinement | [`regional`] | Optional cross-region rebalancing ([`breakpoint`] kernel) |
//! | Commit | [`merit_order`] | Setpoints and voltage control written back |
//!
//! Business-level failures (infeasible areas, consistency mismatches, abandoned
//! refinements) never abort the run: they are recorded in the
//! [`DispatchReport`] diagnostics and the area is left untouched where needed.
//!
//! ## Example
//!
//! ```ignore
//! use gridhyp_core::ProfileSet;
//! use gridhyp_dispatch::{DispatchConfig, GeneratorsStartup, MarginalMode};
//!
//! let config = DispatchConfig::load("dispatch.toml")?
//!     .with_marginal_mode(MarginalMode::Regional);
//! ProfileSet::load("profiles.json")?.apply_to(&mut network, &mut diag)?;
//!
//! let report = GeneratorsStartup::new(config).apply(&mut network)?;
//! println!("{}", report);
//! ```

pub mod area;
pub mod availability;
pub mod breakpoint;
pub mod config;
pub mod demand;
pub mod error;
pub mod merit_order;
pub mod regional;
pub mod report;
pub mod startup;
pub mod state;

pub use area::{Area, AreaStatus};
pub use breakpoint::{solve_separable_qp, QpFailure, QpTerm, QpTolerances};
pub use config::{AdequacyMargins, DispatchConfig, MarginalMode, RegionalConfig};
pub use error::DispatchError;
pub use regional::{BusZoneTagger, NamedRegions, Region, RegionTagger, RegionalOutcome};
pub use report::{AreaReport, DispatchReport};
pub use startup::GeneratorsStartup;
pub use state::{StartedUnit, UnitState};
