//! salescope is the data core behind an interactive retail sales dashboard.
//! It ingests the raw transaction export into a typed table, applies the
//! sidebar-style selections a user makes, and computes the chart-ready
//! summaries the presentation layer renders.

pub mod aggregate;
pub mod dataset;
pub mod filter;
pub mod logging;

pub use aggregate::{
    AggregateError, AggregateResult, DescriptiveStats, WEEKDAY_ORDER, average_daily_total,
    category_breakdown, category_stats, correlation_matrix, daily_totals,
    daily_transaction_counts, descriptive_stats, hourly_distribution, payment_method_frequency,
    total_sum, transaction_count, value_histogram, weekday_means,
};
pub use dataset::{DatasetError, DatasetResult, MONTH_ORDER, SalesData};
pub use filter::{CategorySelection, Selection, apply};

pub type Result<T> = anyhow::Result<T>;
