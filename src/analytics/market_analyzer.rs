//! Market Analyzer Module
//! Cleans a housing dataset and computes price, neighborhood and feature statistics with Polars.

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::charts;
use crate::data::NA_MARKER;

pub const SALE_PRICE: &str = "SalePrice";
pub const NEIGHBORHOOD: &str = "Neighborhood";

/// Bins in the sale price histogram.
pub const PRICE_HISTOGRAM_BINS: usize = 50;

/// Feature pairs plotted against each other: (x column, y column, title).
pub const SCATTER_PAIRS: [(&str, &str, &str); 3] = [
    ("GrLivArea", SALE_PRICE, "Living Area vs. Sale Price"),
    ("YearBuilt", SALE_PRICE, "Year Built vs. Sale Price"),
    ("OverallQual", SALE_PRICE, "Overall Quality vs. Sale Price"),
];

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),
    #[error("Data has not been cleaned yet")]
    NotCleaned,
    #[error("Chart rendering failed: {0}")]
    Chart(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary of the sale price column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStatistics {
    pub count: u64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Sale price statistics for one neighborhood.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodStats {
    pub neighborhood: String,
    pub count: u64,
    pub mean_price: f64,
    pub median_price: f64,
    pub std_dev_price: f64,
}

/// Pairwise Pearson correlations, row/column order matching `variables`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub variables: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.variables.iter().position(|v| v == a)?;
        let j = self.variables.iter().position(|v| v == b)?;
        Some(self.values[i][j])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub neighborhood: String,
}

/// Points of one feature pair plus its least-squares trend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterData {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ScatterPoint>,
    /// `(slope, intercept)`; `None` with fewer than two distinct x values.
    pub trend: Option<(f64, f64)>,
}

/// Exploratory analysis over a housing dataset in the Ames layout.
pub struct MarketAnalyzer {
    raw: DataFrame,
    clean: Option<DataFrame>,
}

impl MarketAnalyzer {
    /// Load the CSV with Polars; `NA` cells read as null.
    pub fn new(data_path: impl AsRef<Path>) -> Result<Self, AnalyticsError> {
        let data_path = data_path.as_ref();
        let raw = LazyCsvReader::new(data_path)
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_null_values(Some(NullValues::AllColumnsSingle(NA_MARKER.into())))
            .finish()?
            .collect()?;
        info!(path = %data_path.display(), rows = raw.height(), "Loaded market data");
        Ok(Self::from_dataframe(raw))
    }

    pub fn from_dataframe(raw: DataFrame) -> Self {
        Self { raw, clean: None }
    }

    pub fn raw_data(&self) -> &DataFrame {
        &self.raw
    }

    /// Cleaned data, once [`MarketAnalyzer::clean_data`] has run.
    pub fn clean_data_frame(&self) -> Result<&DataFrame, AnalyticsError> {
        self.clean.as_ref().ok_or(AnalyticsError::NotCleaned)
    }

    /// Fill known gaps, drop rows without a sale price and fix column types.
    ///
    /// `LotFrontage` is filled with its mean, `GarageYrBlt` with its median and
    /// `MasVnrType` with `"None"`, each only when the column exists.
    pub fn clean_data(&mut self) -> Result<&DataFrame, AnalyticsError> {
        for required in [SALE_PRICE, NEIGHBORHOOD] {
            if !self.has_column(required) {
                return Err(AnalyticsError::MissingColumn(required.to_string()));
            }
        }

        let mut fills = Vec::new();
        if self.has_column("LotFrontage") {
            fills.push(col("LotFrontage").fill_null(col("LotFrontage").mean()));
        }
        if self.has_column("GarageYrBlt") {
            fills.push(col("GarageYrBlt").fill_null(col("GarageYrBlt").median()));
        }
        if self.has_column("MasVnrType") {
            fills.push(col("MasVnrType").fill_null(lit("None")));
        }

        let mut casts = vec![col(SALE_PRICE).cast(DataType::Float64)];
        if self.has_column("YearBuilt") {
            casts.push(col("YearBuilt").cast(DataType::Int32));
        }

        let mut lf = self.raw.clone().lazy();
        if !fills.is_empty() {
            lf = lf.with_columns(fills);
        }
        let clean = lf
            .filter(col(SALE_PRICE).is_not_null())
            .with_columns(casts)
            .collect()?;

        info!(
            kept = clean.height(),
            dropped = self.raw.height() - clean.height(),
            "Cleaned market data"
        );
        self.clean = Some(clean);
        self.clean_data_frame()
    }

    pub fn price_statistics(&self) -> Result<PriceStatistics, AnalyticsError> {
        let price = || col(SALE_PRICE);
        let stats = self
            .clean_data_frame()?
            .clone()
            .lazy()
            .select([
                price().count().cast(DataType::UInt64).alias("count"),
                price().mean().alias("mean"),
                price().median().alias("median"),
                price().std(1).alias("std_dev"),
                price().min().alias("min"),
                price().max().alias("max"),
            ])
            .collect()?;

        Ok(PriceStatistics {
            count: stats.column("count")?.u64()?.get(0).unwrap_or(0),
            mean: first_f64(&stats, "mean")?,
            median: first_f64(&stats, "median")?,
            std_dev: first_f64(&stats, "std_dev")?,
            min: first_f64(&stats, "min")?,
            max: first_f64(&stats, "max")?,
        })
    }

    /// Price statistics plus a histogram written to `output_dir/price_distribution.png`.
    pub fn generate_price_distribution_analysis(
        &self,
        output_dir: &Path,
    ) -> Result<PriceStatistics, AnalyticsError> {
        let stats = self.price_statistics()?;
        let prices: Vec<f64> = self
            .clean_data_frame()?
            .column(SALE_PRICE)?
            .f64()?
            .into_iter()
            .flatten()
            .collect();
        charts::price_histogram(
            &prices,
            PRICE_HISTOGRAM_BINS,
            &output_dir.join("price_distribution.png"),
        )?;
        Ok(stats)
    }

    /// Per-neighborhood sale price statistics, highest median first.
    pub fn neighborhood_price_comparison(&self) -> Result<Vec<NeighborhoodStats>, AnalyticsError> {
        let price = || col(SALE_PRICE);
        let grouped = self
            .clean_data_frame()?
            .clone()
            .lazy()
            .group_by([col(NEIGHBORHOOD)])
            .agg([
                len().cast(DataType::UInt64).alias("count"),
                price().mean().alias("mean_price"),
                price().median().alias("median_price"),
                price().std(1).alias("std_dev_price"),
            ])
            .sort(
                ["median_price", NEIGHBORHOOD],
                SortMultipleOptions::default()
                    .with_order_descending_multi([true, false])
                    .with_nulls_last(true),
            )
            .collect()?;

        let names = grouped.column(NEIGHBORHOOD)?.cast(&DataType::String)?;
        let names = names.str()?;
        let counts = grouped.column("count")?.u64()?;
        let means = grouped.column("mean_price")?.f64()?;
        let medians = grouped.column("median_price")?.f64()?;
        let stds = grouped.column("std_dev_price")?.f64()?;

        Ok((0..grouped.height())
            .map(|i| NeighborhoodStats {
                neighborhood: names.get(i).unwrap_or_default().to_string(),
                count: counts.get(i).unwrap_or(0),
                mean_price: means.get(i).unwrap_or(f64::NAN),
                median_price: medians.get(i).unwrap_or(f64::NAN),
                std_dev_price: stds.get(i).unwrap_or(f64::NAN),
            })
            .collect())
    }

    /// Sale prices grouped by neighborhood, in comparison order.
    pub fn prices_by_neighborhood(&self) -> Result<Vec<(String, Vec<f64>)>, AnalyticsError> {
        let order = self.neighborhood_price_comparison()?;
        let df = self.clean_data_frame()?;
        let names = df.column(NEIGHBORHOOD)?.cast(&DataType::String)?;
        let prices = df.column(SALE_PRICE)?.f64()?;

        let mut grouped: HashMap<String, Vec<f64>> = HashMap::new();
        for (name, price) in names.str()?.into_iter().zip(prices.into_iter()) {
            if let Some(price) = price {
                grouped
                    .entry(name.unwrap_or_default().to_string())
                    .or_default()
                    .push(price);
            }
        }

        Ok(order
            .into_iter()
            .map(|stats| {
                let values = grouped.remove(&stats.neighborhood).unwrap_or_default();
                (stats.neighborhood, values)
            })
            .collect())
    }

    /// Neighborhood statistics plus a boxplot at `output_dir/neighborhood_prices.png`.
    pub fn generate_neighborhood_comparison(
        &self,
        output_dir: &Path,
    ) -> Result<Vec<NeighborhoodStats>, AnalyticsError> {
        let stats = self.neighborhood_price_comparison()?;
        charts::neighborhood_boxplot(
            &self.prices_by_neighborhood()?,
            &output_dir.join("neighborhood_prices.png"),
        )?;
        Ok(stats)
    }

    /// Pearson correlation of every pair of `variables`, over rows where both are set.
    pub fn feature_correlation<S: AsRef<str>>(
        &self,
        variables: &[S],
    ) -> Result<CorrelationMatrix, AnalyticsError> {
        let df = self.clean_data_frame()?;
        let columns = variables
            .iter()
            .map(|name| numeric_column(df, name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let values: Vec<Vec<f64>> = columns
            .par_iter()
            .map(|a| columns.iter().map(|b| pearson(a, b)).collect::<Vec<f64>>())
            .collect();

        Ok(CorrelationMatrix {
            variables: variables.iter().map(|v| v.as_ref().to_string()).collect(),
            values,
        })
    }

    /// Correlation matrix plus a heatmap at `output_dir/correlation_heatmap.png`.
    pub fn feature_correlation_heatmap<S: AsRef<str>>(
        &self,
        variables: &[S],
        output_dir: &Path,
    ) -> Result<CorrelationMatrix, AnalyticsError> {
        let matrix = self.feature_correlation(variables)?;
        charts::correlation_heatmap(&matrix, &output_dir.join("correlation_heatmap.png"))?;
        Ok(matrix)
    }

    pub fn scatter_data(&self, x: &str, y: &str) -> Result<ScatterData, AnalyticsError> {
        let df = self.clean_data_frame()?;
        let xs = numeric_column(df, x)?;
        let ys = numeric_column(df, y)?;
        let names = df.column(NEIGHBORHOOD)?.cast(&DataType::String)?;

        let points: Vec<ScatterPoint> = xs
            .iter()
            .zip(&ys)
            .zip(names.str()?.into_iter())
            .filter_map(|((x, y), name)| {
                Some(ScatterPoint {
                    x: (*x)?,
                    y: (*y)?,
                    neighborhood: name.unwrap_or_default().to_string(),
                })
            })
            .collect();
        let trend = least_squares(&points);

        Ok(ScatterData {
            x_label: x.to_string(),
            y_label: y.to_string(),
            points,
            trend,
        })
    }

    /// One scatter chart per entry of [`SCATTER_PAIRS`]; returns the written paths.
    pub fn create_scatter_plots(&self, output_dir: &Path) -> Result<Vec<PathBuf>, AnalyticsError> {
        SCATTER_PAIRS
            .iter()
            .map(|(x, y, title)| {
                let data = self.scatter_data(x, y)?;
                let path = output_dir.join(format!("{x}_vs_{y}.png").to_lowercase());
                charts::scatter_with_trend(&data, title, &path)?;
                Ok(path)
            })
            .collect()
    }

    fn has_column(&self, name: &str) -> bool {
        self.raw.get_column_index(name).is_some()
    }
}

fn first_f64(df: &DataFrame, name: &str) -> Result<f64, AnalyticsError> {
    let value = df.column(name)?.cast(&DataType::Float64)?;
    Ok(value.f64()?.get(0).unwrap_or(f64::NAN))
}

/// Values of an integer or float column as `f64`; text columns are rejected
/// rather than cast to all-null.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, AnalyticsError> {
    let column = df
        .column(name)
        .map_err(|_| AnalyticsError::MissingColumn(name.to_string()))?;
    let dtype = column.dtype();
    if !(dtype.is_integer() || dtype.is_float()) {
        return Err(AnalyticsError::NotNumeric(name.to_string()));
    }
    let column = column.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Pearson correlation over the rows where both sides are present.
/// NaN with fewer than two such rows or a constant side.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x * var_y).sqrt()
}

/// Ordinary least squares fit `y = slope * x + intercept`.
fn least_squares(points: &[ScatterPoint]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points
        .iter()
        .map(|p| (p.x - mean_x) * (p.y - mean_y))
        .sum();
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const AMES_SAMPLE: &str = "\
Id,Neighborhood,LotFrontage,GarageYrBlt,MasVnrType,YearBuilt,GrLivArea,OverallQual,SalePrice
1,CollgCr,60,2000,BrkFace,2003,1000,5,200000
2,CollgCr,NA,1990,NA,1976,1500,6,250000
3,OldTown,80,NA,None,1915,800,4,100000
4,OldTown,70,1980,Stone,1960,1200,5,140000
5,NoRidge,90,2005,BrkFace,2005,2500,9,400000
6,NoRidge,100,2006,Stone,2006,NA,8,NA
";

    fn cleaned_sample() -> MarketAnalyzer {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ames.csv");
        fs::write(&path, AMES_SAMPLE).unwrap();
        let mut analyzer = MarketAnalyzer::new(&path).unwrap();
        analyzer.clean_data().unwrap();
        analyzer
    }

    #[test]
    fn clean_fills_gaps_and_drops_unpriced_rows() {
        let analyzer = cleaned_sample();
        let df = analyzer.clean_data_frame().unwrap();

        assert_eq!(analyzer.raw_data().height(), 6);
        assert_eq!(df.height(), 5);
        assert_eq!(df.column("LotFrontage").unwrap().null_count(), 0);
        assert_eq!(df.column("GarageYrBlt").unwrap().null_count(), 0);
        assert_eq!(df.column("MasVnrType").unwrap().null_count(), 0);
        assert_eq!(df.column("YearBuilt").unwrap().dtype(), &DataType::Int32);
        assert_eq!(df.column(SALE_PRICE).unwrap().dtype(), &DataType::Float64);

        // Mean of the five known frontages: (60 + 80 + 70 + 90 + 100) / 5.
        let frontage = df.column("LotFrontage").unwrap().cast(&DataType::Float64).unwrap();
        assert_eq!(frontage.f64().unwrap().get(1), Some(80.0));
    }

    #[test]
    fn analysis_requires_clean_data() {
        let df = df!(SALE_PRICE => [1.0, 2.0], NEIGHBORHOOD => ["A", "B"]).unwrap();
        let analyzer = MarketAnalyzer::from_dataframe(df);

        assert!(matches!(
            analyzer.price_statistics(),
            Err(AnalyticsError::NotCleaned)
        ));
    }

    #[test]
    fn clean_requires_price_and_neighborhood() {
        let df = df!(SALE_PRICE => [1.0, 2.0]).unwrap();
        let mut analyzer = MarketAnalyzer::from_dataframe(df);

        match analyzer.clean_data() {
            Err(AnalyticsError::MissingColumn(name)) => assert_eq!(name, NEIGHBORHOOD),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn price_statistics_of_clean_data() {
        let stats = cleaned_sample().price_statistics().unwrap();

        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean, 218000.0);
        assert_eq!(stats.median, 200000.0);
        assert_eq!(stats.min, 100000.0);
        assert_eq!(stats.max, 400000.0);
        assert!(stats.std_dev > 0.0);
    }

    #[test]
    fn neighborhoods_ordered_by_median_price() {
        let stats = cleaned_sample().neighborhood_price_comparison().unwrap();

        let order: Vec<&str> = stats.iter().map(|s| s.neighborhood.as_str()).collect();
        assert_eq!(order, ["NoRidge", "CollgCr", "OldTown"]);
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[1].mean_price, 225000.0);
        assert_eq!(stats[2].median_price, 120000.0);
    }

    #[test]
    fn prices_grouped_in_comparison_order() {
        let groups = cleaned_sample().prices_by_neighborhood().unwrap();

        assert_eq!(groups[1].0, "CollgCr");
        assert_eq!(groups[1].1, vec![200000.0, 250000.0]);
    }

    #[test]
    fn correlation_matrix_is_symmetric_with_unit_diagonal() {
        let matrix = cleaned_sample()
            .feature_correlation(&["GrLivArea", "OverallQual", SALE_PRICE])
            .unwrap();

        for i in 0..3 {
            assert!((matrix.values[i][i] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((matrix.values[i][j] - matrix.values[j][i]).abs() < 1e-12);
            }
        }
        assert!(matrix.get("GrLivArea", SALE_PRICE).unwrap() > 0.9);
        assert_eq!(matrix.get("GrLivArea", "Missing"), None);
    }

    #[test]
    fn correlation_rejects_unknown_column() {
        let err = cleaned_sample()
            .feature_correlation(&["GrLivArea", "PoolArea"])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingColumn(name) if name == "PoolArea"));
    }

    #[test]
    fn text_columns_are_not_correlated_or_plotted() {
        let analyzer = cleaned_sample();

        let err = analyzer
            .feature_correlation(&[NEIGHBORHOOD, SALE_PRICE])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::NotNumeric(name) if name == NEIGHBORHOOD));

        let err = analyzer.scatter_data(NEIGHBORHOOD, SALE_PRICE).unwrap_err();
        assert!(matches!(err, AnalyticsError::NotNumeric(name) if name == NEIGHBORHOOD));
    }

    #[test]
    fn pearson_handles_gaps_and_constants() {
        let xs = [Some(1.0), Some(2.0), None, Some(3.0)];
        let ys = [Some(2.0), Some(4.0), Some(9.0), Some(6.0)];
        assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);

        let flat = [Some(5.0), Some(5.0), Some(5.0), Some(5.0)];
        assert!(pearson(&xs, &flat).is_nan());
        assert!(pearson(&[Some(1.0)], &[Some(1.0)]).is_nan());
    }

    #[test]
    fn scatter_data_fits_a_trend_line() {
        let data = cleaned_sample().scatter_data("GrLivArea", SALE_PRICE).unwrap();

        assert_eq!(data.points.len(), 5);
        assert_eq!(data.points[2].neighborhood, "OldTown");
        let (slope, _) = data.trend.unwrap();
        assert!(slope > 0.0);
    }

    #[test]
    fn least_squares_recovers_a_line() {
        let points: Vec<ScatterPoint> = [(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]
            .into_iter()
            .map(|(x, y)| ScatterPoint {
                x,
                y,
                neighborhood: String::new(),
            })
            .collect();

        let (slope, intercept) = least_squares(&points).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert_eq!(least_squares(&points[..1]), None);
    }
}
