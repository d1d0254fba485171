//! Market Simulation
//! Builds a market from loaded records, draws a consumer population and
//! lets it buy houses in a chosen order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::consumer::{DEFAULT_INTEREST_RATE, DEFAULT_SAVING_RATE};
use super::{Consumer, House, HousingMarket, Segment, SimulationError};
use crate::data::Record;

/// Normal draws per consumer before the income bounds are judged unreachable.
const MAX_INCOME_DRAWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleaningMarketMechanism {
    IncomeOrderDescendant,
    IncomeOrderAscendant,
    Random,
}

/// Incomes are drawn from Normal(average, standard_deviation) and kept only inside [minimum, maximum].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualIncomeStatistics {
    pub minimum: f64,
    pub average: f64,
    pub standard_deviation: f64,
    pub maximum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildrenRange {
    pub minimum: u32,
    pub maximum: u32,
}

impl Default for ChildrenRange {
    fn default() -> Self {
        Self { minimum: 0, maximum: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub consumers_number: usize,
    pub years: u32,
    pub annual_income: AnnualIncomeStatistics,
    pub children_range: ChildrenRange,
    pub cleaning_market_mechanism: CleaningMarketMechanism,
    pub saving_rate: f64,
    pub interest_rate: f64,
    pub seed: u64,
}

impl SimulationConfig {
    pub fn new(
        consumers_number: usize,
        years: u32,
        annual_income: AnnualIncomeStatistics,
        cleaning_market_mechanism: CleaningMarketMechanism,
    ) -> Self {
        Self {
            consumers_number,
            years,
            annual_income,
            children_range: ChildrenRange::default(),
            cleaning_market_mechanism,
            saving_rate: DEFAULT_SAVING_RATE,
            interest_rate: DEFAULT_INTEREST_RATE,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutcome {
    pub owners_population_rate: f64,
    pub houses_availability_rate: f64,
    pub houses_sold: usize,
    pub consumers: usize,
    pub houses: usize,
}

pub struct Simulation {
    housing_market_data: Vec<Record>,
    config: SimulationConfig,
    rng: StdRng,
    housing_market: Option<HousingMarket>,
    consumers: Vec<Consumer>,
}

impl Simulation {
    pub fn new(housing_market_data: Vec<Record>, config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            housing_market_data,
            config,
            rng,
            housing_market: None,
            consumers: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn housing_market(&self) -> Option<&HousingMarket> {
        self.housing_market.as_ref()
    }

    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }

    /// Turn every record into a house; records need `id`, `price`, `area`,
    /// `bedrooms` and `year_built`. Houses without a quality score get one.
    pub fn create_housing_market(&mut self) -> Result<(), SimulationError> {
        let houses = self
            .housing_market_data
            .iter()
            .enumerate()
            .map(|(index, record)| -> Result<House, SimulationError> {
                let mut house = serde_json::from_value::<House>(Value::Object(record.clone()))
                    .map_err(|source| SimulationError::InvalidHouse { index, source })?;
                house.ensure_quality_score();
                Ok(house)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(houses = houses.len(), "Housing market created");
        self.housing_market = Some(HousingMarket::new(houses));
        Ok(())
    }

    pub fn create_consumers(&mut self) -> Result<(), SimulationError> {
        let income = self.config.annual_income;
        if income.minimum > income.maximum {
            return Err(SimulationError::InvalidIncome(format!(
                "minimum {} is above maximum {}",
                income.minimum, income.maximum
            )));
        }
        let normal = Normal::new(income.average, income.standard_deviation)
            .map_err(|err| SimulationError::InvalidIncome(err.to_string()))?;

        let children = self.config.children_range;
        if children.minimum > children.maximum {
            return Err(SimulationError::InvalidChildrenRange {
                minimum: children.minimum,
                maximum: children.maximum,
            });
        }

        let mut consumers = Vec::with_capacity(self.config.consumers_number);
        for id in 1..=self.config.consumers_number as u64 {
            let annual_income = self.draw_income(&normal)?;
            let children_number = self.rng.gen_range(children.minimum..=children.maximum);
            let segment = Segment::ALL[self.rng.gen_range(0..Segment::ALL.len())];

            let mut consumer = Consumer::new(id, annual_income, children_number, segment);
            consumer.saving_rate = self.config.saving_rate;
            consumer.interest_rate = self.config.interest_rate;
            consumers.push(consumer);
        }

        info!(consumers = consumers.len(), "Consumers created");
        self.consumers = consumers;
        Ok(())
    }

    fn draw_income(&mut self, normal: &Normal<f64>) -> Result<f64, SimulationError> {
        let AnnualIncomeStatistics { minimum, maximum, .. } = self.config.annual_income;
        for _ in 0..MAX_INCOME_DRAWS {
            let income = normal.sample(&mut self.rng);
            if (minimum..=maximum).contains(&income) {
                return Ok(income);
            }
        }
        Err(SimulationError::IncomeOutOfReach {
            minimum,
            maximum,
            draws: MAX_INCOME_DRAWS,
        })
    }

    pub fn compute_consumers_savings(&mut self) {
        for consumer in &mut self.consumers {
            consumer.compute_savings(self.config.years);
        }
    }

    /// Order the consumers by the configured mechanism and let each try to buy once.
    pub fn clean_the_market(&mut self) -> Result<usize, SimulationError> {
        let market = self
            .housing_market
            .as_mut()
            .ok_or(SimulationError::MarketNotCreated)?;

        match self.config.cleaning_market_mechanism {
            CleaningMarketMechanism::IncomeOrderDescendant => self
                .consumers
                .sort_by(|a, b| b.annual_income.total_cmp(&a.annual_income)),
            CleaningMarketMechanism::IncomeOrderAscendant => self
                .consumers
                .sort_by(|a, b| a.annual_income.total_cmp(&b.annual_income)),
            CleaningMarketMechanism::Random => self.consumers.shuffle(&mut self.rng),
        }

        let mut sold = 0;
        for consumer in &mut self.consumers {
            if consumer.buy_a_house(market).is_some() {
                sold += 1;
            }
        }
        debug!(sold, mechanism = ?self.config.cleaning_market_mechanism, "Market cleaned");
        Ok(sold)
    }

    /// Share of consumers owning a house; 0 with no consumers.
    pub fn compute_owners_population_rate(&self) -> f64 {
        if self.consumers.is_empty() {
            return 0.0;
        }
        let owners = self.consumers.iter().filter(|c| c.house.is_some()).count();
        owners as f64 / self.consumers.len() as f64
    }

    /// Share of houses still available; 0 with no market or no houses.
    pub fn compute_houses_availability_rate(&self) -> f64 {
        match &self.housing_market {
            Some(market) if !market.houses().is_empty() => {
                market.available_count() as f64 / market.houses().len() as f64
            }
            _ => 0.0,
        }
    }

    /// Create the market and consumers, accumulate savings and clean the market.
    pub fn run(&mut self) -> Result<SimulationOutcome, SimulationError> {
        self.create_housing_market()?;
        self.create_consumers()?;
        self.compute_consumers_savings();
        let houses_sold = self.clean_the_market()?;

        let outcome = SimulationOutcome {
            owners_population_rate: self.compute_owners_population_rate(),
            houses_availability_rate: self.compute_houses_availability_rate(),
            houses_sold,
            consumers: self.consumers.len(),
            houses: self.housing_market.as_ref().map_or(0, |m| m.houses().len()),
        };
        info!(
            owners = outcome.owners_population_rate,
            available = outcome.houses_availability_rate,
            "Simulation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn houses(n: u64) -> Vec<Record> {
        (1..=n)
            .map(|id| {
                record(json!({
                    "id": id,
                    "price": 50_000 * id,
                    "area": 1000 + 100 * id,
                    "bedrooms": 3,
                    "year_built": 1990,
                }))
            })
            .collect()
    }

    fn income() -> AnnualIncomeStatistics {
        AnnualIncomeStatistics {
            minimum: 20_000.0,
            average: 60_000.0,
            standard_deviation: 20_000.0,
            maximum: 150_000.0,
        }
    }

    fn config(mechanism: CleaningMarketMechanism) -> SimulationConfig {
        SimulationConfig {
            seed: 42,
            ..SimulationConfig::new(50, 10, income(), mechanism)
        }
    }

    #[test]
    fn market_is_built_from_records() {
        let mut sim = Simulation::new(houses(3), config(CleaningMarketMechanism::Random));
        assert_eq!(sim.compute_houses_availability_rate(), 0.0);

        sim.create_housing_market().unwrap();
        let market = sim.housing_market().unwrap();
        assert_eq!(market.houses().len(), 3);
        assert_eq!(market.get_house_by_id(2).unwrap().price, 100_000.0);
        // Built 1990 (age 34) with 3 bedrooms and under 2000 sq ft.
        assert_eq!(
            market.get_house_by_id(2).unwrap().quality_score,
            Some(crate::agent_based_model::QualityScore::Fair)
        );
        assert_eq!(sim.compute_houses_availability_rate(), 1.0);
    }

    #[test]
    fn record_without_required_field_is_rejected() {
        let mut data = houses(2);
        data[1].remove("area");
        let mut sim = Simulation::new(data, config(CleaningMarketMechanism::Random));

        assert!(matches!(
            sim.create_housing_market(),
            Err(SimulationError::InvalidHouse { index: 1, .. })
        ));
    }

    #[test]
    fn consumers_respect_income_and_children_bounds() {
        let mut sim = Simulation::new(Vec::new(), config(CleaningMarketMechanism::Random));
        sim.create_consumers().unwrap();

        assert_eq!(sim.consumers().len(), 50);
        for (i, consumer) in sim.consumers().iter().enumerate() {
            assert_eq!(consumer.id, i as u64 + 1);
            assert!((20_000.0..=150_000.0).contains(&consumer.annual_income));
            assert!(consumer.children_number <= 5);
            assert_eq!(consumer.saving_rate, DEFAULT_SAVING_RATE);
        }
    }

    #[test]
    fn same_seed_gives_same_population() {
        let run = || {
            let mut sim = Simulation::new(houses(20), config(CleaningMarketMechanism::Random));
            sim.run().unwrap();
            sim.consumers().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn unreachable_income_bounds_are_an_error() {
        let mut cfg = config(CleaningMarketMechanism::Random);
        cfg.annual_income = AnnualIncomeStatistics {
            minimum: 1_000_000.0,
            average: 0.0,
            standard_deviation: 0.0,
            maximum: 2_000_000.0,
        };
        let mut sim = Simulation::new(Vec::new(), cfg);
        assert!(matches!(
            sim.create_consumers(),
            Err(SimulationError::IncomeOutOfReach { .. })
        ));

        cfg = config(CleaningMarketMechanism::Random);
        cfg.annual_income.standard_deviation = -1.0;
        let mut sim = Simulation::new(Vec::new(), cfg);
        assert!(matches!(
            sim.create_consumers(),
            Err(SimulationError::InvalidIncome(_))
        ));

        cfg = config(CleaningMarketMechanism::Random);
        cfg.children_range = ChildrenRange { minimum: 3, maximum: 1 };
        let mut sim = Simulation::new(Vec::new(), cfg);
        assert!(matches!(
            sim.create_consumers(),
            Err(SimulationError::InvalidChildrenRange { minimum: 3, maximum: 1 })
        ));
    }

    #[test]
    fn cleaning_needs_a_market() {
        let mut sim = Simulation::new(houses(1), config(CleaningMarketMechanism::Random));
        assert!(matches!(
            sim.clean_the_market(),
            Err(SimulationError::MarketNotCreated)
        ));
    }

    #[test]
    fn rates_agree_with_sales() {
        let mut sim = Simulation::new(
            houses(20),
            config(CleaningMarketMechanism::IncomeOrderDescendant),
        );
        let outcome = sim.run().unwrap();

        let owners = sim.consumers().iter().filter(|c| c.house.is_some()).count();
        assert_eq!(owners, outcome.houses_sold);
        assert_eq!(outcome.owners_population_rate, owners as f64 / 50.0);
        assert_eq!(
            outcome.houses_availability_rate,
            (20 - outcome.houses_sold) as f64 / 20.0
        );

        let incomes: Vec<f64> = sim.consumers().iter().map(|c| c.annual_income).collect();
        assert!(incomes.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn ascending_order_is_applied_before_buying() {
        let mut sim = Simulation::new(
            houses(5),
            config(CleaningMarketMechanism::IncomeOrderAscendant),
        );
        sim.run().unwrap();

        let incomes: Vec<f64> = sim.consumers().iter().map(|c| c.annual_income).collect();
        assert!(incomes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn empty_population_has_zero_owner_rate() {
        let mut cfg = config(CleaningMarketMechanism::Random);
        cfg.consumers_number = 0;
        let mut sim = Simulation::new(houses(2), cfg);
        let outcome = sim.run().unwrap();

        assert_eq!(outcome.owners_population_rate, 0.0);
        assert_eq!(outcome.houses_availability_rate, 1.0);
    }
}
