//! Analytics module - Exploratory market analysis and charts

mod charts;
mod market_analyzer;

pub use charts::{heat_color, histogram_bins, HistogramBin};
pub use market_analyzer::{
    pearson, AnalyticsError, CorrelationMatrix, MarketAnalyzer, NeighborhoodStats,
    PriceStatistics, ScatterData, ScatterPoint, NEIGHBORHOOD, PRICE_HISTOGRAM_BINS, SALE_PRICE,
    SCATTER_PAIRS,
};
