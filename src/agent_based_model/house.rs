//! House Module
//! A single property on the market.

use serde::{Deserialize, Serialize};

use super::MarketError;

/// Year that house age is measured against.
pub const REFERENCE_YEAR: i32 = 2024;

/// Houses younger than this count as new construction.
pub const NEW_CONSTRUCTION_YEARS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QualityScore {
    Poor = 1,
    Fair = 2,
    Average = 3,
    Good = 4,
    Excellent = 5,
}

impl TryFrom<u8> for QualityScore {
    type Error = MarketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QualityScore::Poor),
            2 => Ok(QualityScore::Fair),
            3 => Ok(QualityScore::Average),
            4 => Ok(QualityScore::Good),
            5 => Ok(QualityScore::Excellent),
            other => Err(MarketError::InvalidQualityScore(other)),
        }
    }
}

impl From<QualityScore> for u8 {
    fn from(score: QualityScore) -> u8 {
        score as u8
    }
}

fn available_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct House {
    pub id: u64,
    pub price: f64,
    /// Square feet.
    pub area: f64,
    pub bedrooms: u32,
    pub year_built: i32,
    #[serde(default)]
    pub quality_score: Option<QualityScore>,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

impl House {
    pub fn new(id: u64, price: f64, area: f64, bedrooms: u32, year_built: i32) -> Self {
        Self {
            id,
            price,
            area,
            bedrooms,
            year_built,
            quality_score: None,
            available: true,
        }
    }

    pub fn with_quality_score(mut self, score: QualityScore) -> Self {
        self.quality_score = Some(score);
        self
    }

    /// Price per square foot, rounded to cents.
    pub fn price_per_square_foot(&self) -> Result<f64, MarketError> {
        if self.area == 0.0 {
            return Err(MarketError::ZeroArea(self.id));
        }
        Ok((self.price / self.area * 100.0).round() / 100.0)
    }

    pub fn is_new_construction(&self, current_year: i32) -> bool {
        current_year - self.year_built < NEW_CONSTRUCTION_YEARS
    }

    /// Score the house from its age, size and bedrooms unless a score is already set.
    pub fn ensure_quality_score(&mut self) -> QualityScore {
        if let Some(score) = self.quality_score {
            return score;
        }

        let base: u8 = match REFERENCE_YEAR - self.year_built {
            age if age < 5 => 5,
            age if age < 15 => 4,
            age if age < 30 => 3,
            age if age < 50 => 2,
            _ => 1,
        };
        let size_bonus = u8::from(self.area > 2000.0);
        let bedroom_bonus = u8::from(self.bedrooms > 3);

        let score = QualityScore::try_from((base + size_bonus + bedroom_bonus).min(5))
            .unwrap_or(QualityScore::Excellent);
        self.quality_score = Some(score);
        score
    }

    pub fn sell(&mut self) {
        self.available = false;
    }
}
