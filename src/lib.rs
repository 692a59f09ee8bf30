#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod baseline;
mod config;
mod distribution;
mod error;
mod family;
mod kernel;
mod link;
mod multi;
mod operator;
mod params;
mod predictors;
mod prior;
mod summary;
mod unit;

pub use crate::{
    baseline::*, config::*, distribution::*, error::*, family::*, kernel::*, link::*, multi::*,
    operator::*, params::*, predictors::*, prior::*, summary::*, unit::*,
};
