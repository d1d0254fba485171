//! Housing Market Module
//! The set of houses consumers buy from.

use super::{House, MarketError, QualityScore, Segment};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HousingMarket {
    houses: Vec<House>,
}

impl HousingMarket {
    pub fn new(houses: Vec<House>) -> Self {
        Self { houses }
    }

    pub fn houses(&self) -> &[House] {
        &self.houses
    }

    pub fn houses_mut(&mut self) -> &mut [House] {
        &mut self.houses
    }

    pub fn get_house_by_id(&self, house_id: u64) -> Result<&House, MarketError> {
        self.houses
            .iter()
            .find(|house| house.id == house_id)
            .ok_or(MarketError::HouseNotFound(house_id))
    }

    /// Average price, optionally only over houses with `bedrooms` bedrooms; 0 when none match.
    pub fn calculate_average_price(&self, bedrooms: Option<u32>) -> f64 {
        let prices: Vec<f64> = self
            .houses
            .iter()
            .filter(|house| bedrooms.map_or(true, |b| house.bedrooms == b))
            .map(|house| house.price)
            .collect();
        if prices.is_empty() {
            return 0.0;
        }
        prices.iter().sum::<f64>() / prices.len() as f64
    }

    /// Available houses priced at most `max_price` that suit `segment`.
    ///
    /// Fancy buyers want a quality score of at least good; optimizers want the
    /// price per square foot under `max_price / area`.
    pub fn get_houses_that_meet_requirements(&self, max_price: f64, segment: Segment) -> Vec<&House> {
        self.houses
            .iter()
            .filter(|house| house.available && house.price <= max_price)
            .filter(|house| match segment {
                Segment::Fancy => house
                    .quality_score
                    .is_some_and(|score| score >= QualityScore::Good),
                Segment::Optimizer => house.area > 0.0
                    && house
                        .price_per_square_foot()
                        .is_ok_and(|ppsf| ppsf < max_price / house.area),
                Segment::Average => true,
            })
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.houses.iter().filter(|house| house.available).count()
    }
}
