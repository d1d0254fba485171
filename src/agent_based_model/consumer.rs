//! Consumer Module
//! A buyer who saves up and tries to buy one house.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::house::REFERENCE_YEAR;
use super::{HousingMarket, MarketError, QualityScore};

pub const DEFAULT_SAVING_RATE: f64 = 0.3;
pub const DEFAULT_INTEREST_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Segment {
    /// New construction with an excellent quality score.
    Fancy,
    /// Price per square foot within a month of income.
    Optimizer,
    /// Anything at or below the market's average price.
    Average,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Fancy, Segment::Optimizer, Segment::Average];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Fancy => "FANCY",
            Segment::Optimizer => "OPTIMIZER",
            Segment::Average => "AVERAGE",
        };
        f.write_str(name)
    }
}

impl FromStr for Segment {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Segment::ALL
            .into_iter()
            .find(|segment| segment.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| MarketError::InvalidSegment(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumer {
    pub id: u64,
    pub annual_income: f64,
    pub children_number: u32,
    pub segment: Segment,
    /// Id of the house bought, if any.
    pub house: Option<u64>,
    pub savings: f64,
    pub saving_rate: f64,
    pub interest_rate: f64,
}

impl Consumer {
    pub fn new(id: u64, annual_income: f64, children_number: u32, segment: Segment) -> Self {
        Self {
            id,
            annual_income,
            children_number,
            segment,
            house: None,
            savings: 0.0,
            saving_rate: DEFAULT_SAVING_RATE,
            interest_rate: DEFAULT_INTEREST_RATE,
        }
    }

    /// Savings after `years` of yearly deposits with compound interest.
    pub fn compute_savings(&mut self, years: u32) {
        let annual_savings = self.annual_income * self.saving_rate;
        self.savings = if self.interest_rate == 0.0 {
            annual_savings * f64::from(years)
        } else {
            annual_savings * ((1.0 + self.interest_rate).powf(f64::from(years)) - 1.0)
                / self.interest_rate
        };
    }

    /// Buy the first available house that suits the segment and fits the savings.
    ///
    /// Returns the id of the house bought. A consumer who already owns a house
    /// does not buy another.
    pub fn buy_a_house(&mut self, market: &mut HousingMarket) -> Option<u64> {
        if self.house.is_some() {
            return None;
        }

        let average_price = market.calculate_average_price(None);
        let monthly_income = self.annual_income / 12.0;
        let pick = market.houses().iter().position(|house| {
            let suitable = match self.segment {
                Segment::Fancy => {
                    house.is_new_construction(REFERENCE_YEAR)
                        && house.quality_score == Some(QualityScore::Excellent)
                }
                Segment::Optimizer => house
                    .price_per_square_foot()
                    .is_ok_and(|ppsf| ppsf <= monthly_income),
                Segment::Average => house.price <= average_price,
            };
            house.available && suitable && self.savings >= house.price
        });

        let Some(index) = pick else {
            debug!(consumer = self.id, segment = %self.segment, "No suitable house");
            return None;
        };

        let house = &mut market.houses_mut()[index];
        house.sell();
        self.savings -= house.price;
        self.house = Some(house.id);
        info!(consumer = self.id, house = house.id, price = house.price, "House bought");
        Some(house.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_based_model::House;

    #[test]
    fn savings_compound_yearly() {
        let mut consumer = Consumer::new(1, 100_000.0, 0, Segment::Average);
        consumer.compute_savings(2);
        // 30_000 * ((1.05^2 - 1) / 0.05) = 30_000 * 2.05
        assert!((consumer.savings - 61_500.0).abs() < 1e-6);

        consumer.interest_rate = 0.0;
        consumer.compute_savings(3);
        assert_eq!(consumer.savings, 90_000.0);
    }

    #[test]
    fn savings_grow_for_very_long_horizons() {
        let mut consumer = Consumer::new(1, 10_000.0, 0, Segment::Average);
        consumer.interest_rate = 1e-12;
        consumer.compute_savings(u32::MAX);
        // Roughly 3_000 * u32::MAX; a wrapped exponent would go negative.
        assert!(consumer.savings > 1e13);
    }

    #[test]
    fn parses_segments_case_insensitively() {
        assert_eq!("fancy".parse::<Segment>(), Ok(Segment::Fancy));
        assert_eq!("OPTIMIZER".parse::<Segment>(), Ok(Segment::Optimizer));
        assert_eq!(
            "luxury".parse::<Segment>(),
            Err(MarketError::InvalidSegment("luxury".into()))
        );
    }

    fn market() -> HousingMarket {
        HousingMarket::new(vec![
            House::new(1, 500_000.0, 2000.0, 4, 2022).with_quality_score(QualityScore::Excellent),
            House::new(2, 120_000.0, 1500.0, 2, 1990),
            House::new(3, 90_000.0, 1000.0, 2, 1970),
        ])
    }

    #[test]
    fn average_buyer_takes_first_affordable_below_average() {
        let mut market = market();
        let mut consumer = Consumer::new(1, 50_000.0, 1, Segment::Average);
        consumer.savings = 100_000.0;

        assert_eq!(consumer.buy_a_house(&mut market), Some(3));
        assert_eq!(consumer.house, Some(3));
        assert_eq!(consumer.savings, 10_000.0);
        assert!(!market.get_house_by_id(3).unwrap().available);

        // Already an owner.
        consumer.savings = 1_000_000.0;
        assert_eq!(consumer.buy_a_house(&mut market), None);
    }

    #[test]
    fn fancy_buyer_needs_new_excellent_house_and_savings() {
        let mut market = market();
        let mut consumer = Consumer::new(1, 200_000.0, 0, Segment::Fancy);
        consumer.savings = 400_000.0;
        assert_eq!(consumer.buy_a_house(&mut market), None);

        consumer.savings = 500_000.0;
        assert_eq!(consumer.buy_a_house(&mut market), Some(1));
        assert_eq!(consumer.savings, 0.0);
    }

    #[test]
    fn optimizer_compares_price_per_foot_with_monthly_income() {
        let mut market = market();
        // Monthly income 85; house 2 is 80/sq ft, house 3 is 90/sq ft.
        let mut consumer = Consumer::new(1, 1020.0, 0, Segment::Optimizer);
        consumer.savings = 1_000_000.0;

        assert_eq!(consumer.buy_a_house(&mut market), Some(2));
    }
}
