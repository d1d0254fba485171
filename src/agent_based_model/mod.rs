//! Agent-based housing market
//! Consumers with incomes and savings buy houses from a shared market.

mod consumer;
mod house;
mod market;
mod simulation;

pub use consumer::{Consumer, Segment, DEFAULT_INTEREST_RATE, DEFAULT_SAVING_RATE};
pub use house::{House, QualityScore, NEW_CONSTRUCTION_YEARS, REFERENCE_YEAR};
pub use market::HousingMarket;
pub use simulation::{
    AnnualIncomeStatistics, ChildrenRange, CleaningMarketMechanism, Simulation,
    SimulationConfig, SimulationOutcome,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("House with ID {0} not found")]
    HouseNotFound(u64),
    #[error("House {0} has zero area")]
    ZeroArea(u64),
    #[error("Quality score must be between 1 and 5, got {0}")]
    InvalidQualityScore(u8),
    #[error("Unknown consumer segment: {0}")]
    InvalidSegment(String),
}

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Record {index} is not a house: {source}")]
    InvalidHouse {
        index: usize,
        source: serde_json::Error,
    },
    #[error("Invalid income statistics: {0}")]
    InvalidIncome(String),
    #[error("Invalid children range {minimum}..={maximum}")]
    InvalidChildrenRange { minimum: u32, maximum: u32 },
    #[error("No income inside [{minimum}, {maximum}] after {draws} draws")]
    IncomeOutOfReach { minimum: f64, maximum: f64, draws: usize },
    #[error("Housing market has not been created")]
    MarketNotCreated,
}
