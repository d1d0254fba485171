//! Real Estate Toolkit
//!
//! Loads real estate CSV files into generic records, checks that required
//! columns are present, cleans column names and describes the data.
//! `analytics` charts the Ames housing data and `agent_based_model`
//! simulates buyers on a housing market.

pub mod agent_based_model;
pub mod analytics;
pub mod data;
pub mod stats;
