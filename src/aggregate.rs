use std::collections::BTreeMap;

use polars::prelude::*;
use rayon::prelude::*;
use thiserror::Error;

use crate::logging::log_event;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("aggregation requires column `{0}`")]
    MissingColumn(String),
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type AggregateResult<T> = Result<T, AggregateError>;

/// Weekday labels in the fixed Monday-first order the weekly chart uses.
pub const WEEKDAY_ORDER: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Summary statistics for one numeric column. Every field is `NaN` when the
/// input holds no finite values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    pub mean: f64,
    pub median: f64,
    pub lower_quartile: f64,
    pub upper_quartile: f64,
}

impl DescriptiveStats {
    fn from_values(mut values: Vec<f64>) -> Self {
        values.retain(|value| value.is_finite());
        if values.is_empty() {
            return Self {
                mean: f64::NAN,
                median: f64::NAN,
                lower_quartile: f64::NAN,
                upper_quartile: f64::NAN,
            };
        }
        values.sort_by(f64::total_cmp);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Self {
            mean,
            median: quantile(&values, 0.5),
            lower_quartile: quantile(&values, 0.25),
            upper_quartile: quantile(&values, 0.75),
        }
    }
}

/// Sum of `Total` over all rows. Non-finite values are skipped; an empty
/// table sums to zero.
pub fn total_sum(frame: &DataFrame) -> AggregateResult<f64> {
    Ok(numeric_values(frame, "Total")?
        .into_iter()
        .filter(|value| value.is_finite())
        .sum())
}

/// Number of transactions in the table.
pub fn transaction_count(frame: &DataFrame) -> usize {
    frame.height()
}

/// Per-date `Total` sums in ascending date order.
pub fn daily_totals(frame: &DataFrame) -> AggregateResult<DataFrame> {
    let sums = daily_sum_map(frame)?;
    let (days, totals): (Vec<i32>, Vec<f64>) = sums.into_iter().unzip();
    let result = DataFrame::new(vec![
        Int32Chunked::from_vec("Date", days).into_date().into_series(),
        Series::new("Total", totals),
    ])?;

    log_event(
        file!(),
        "Aggregation",
        "daily_totals",
        "aggregate.daily",
        line!(),
        "Computed per-date totals",
        None,
        Some(result.height()),
    );

    Ok(result)
}

/// Per-date transaction counts in ascending date order.
pub fn daily_transaction_counts(frame: &DataFrame) -> AggregateResult<DataFrame> {
    let dates = date_values(frame, "Date")?;
    let mut counts: BTreeMap<i32, u32> = BTreeMap::new();
    for days in dates.into_iter().flatten() {
        *counts.entry(days).or_insert(0) += 1;
    }
    let (days, counts): (Vec<i32>, Vec<u32>) = counts.into_iter().unzip();
    Ok(DataFrame::new(vec![
        Int32Chunked::from_vec("Date", days).into_date().into_series(),
        Series::new("Transactions", counts),
    ])?)
}

/// Mean of the per-date sums; `NaN` for an empty table.
pub fn average_daily_total(frame: &DataFrame) -> AggregateResult<f64> {
    let sums = daily_sum_map(frame)?;
    if sums.is_empty() {
        return Ok(f64::NAN);
    }
    Ok(sums.values().sum::<f64>() / sums.len() as f64)
}

/// Mean `Total` per weekday, always exactly seven rows in Monday→Sunday
/// order. A weekday absent from the input carries a null mean, not zero.
pub fn weekday_means(frame: &DataFrame) -> AggregateResult<DataFrame> {
    let days = string_values(frame, "Day")?;
    let totals = numeric_values(frame, "Total")?;

    let mut grouped: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (day, total) in days.iter().zip(totals) {
        if total.is_finite() {
            let entry = grouped.entry(day.as_str()).or_insert((0.0, 0));
            entry.0 += total;
            entry.1 += 1;
        }
    }

    let means: Vec<Option<f64>> = WEEKDAY_ORDER
        .iter()
        .map(|day| grouped.get(*day).map(|(sum, count)| sum / *count as f64))
        .collect();

    let result = DataFrame::new(vec![
        Series::new("Day", WEEKDAY_ORDER.as_slice()),
        Series::new("Total", means),
    ])?;

    log_event(
        file!(),
        "Aggregation",
        "weekday_means",
        "aggregate.weekday",
        line!(),
        "Computed weekday means",
        None,
        Some(result.height()),
    );

    Ok(result)
}

/// `Total` summed into 24 fixed hour-of-day bins. Hours with no
/// transactions hold 0.0.
pub fn hourly_distribution(frame: &DataFrame) -> AggregateResult<DataFrame> {
    let casted = require_column(frame, "Hour")?.cast(&DataType::UInt32)?;
    let hours = casted.u32().expect("series cast to u32");
    let totals = numeric_values(frame, "Total")?;

    let mut bins = [0.0f64; 24];
    for (hour, total) in hours.into_iter().zip(totals) {
        if let Some(hour) = hour
            && (hour as usize) < bins.len()
            && total.is_finite()
        {
            bins[hour as usize] += total;
        }
    }

    Ok(DataFrame::new(vec![
        Series::new("Hour", (0u32..24).collect::<Vec<_>>()),
        Series::new("Total", bins.to_vec()),
    ])?)
}

/// Mean, median and quartiles of one numeric column. Quantiles use linear
/// interpolation between order statistics.
pub fn descriptive_stats(frame: &DataFrame, column: &str) -> AggregateResult<DescriptiveStats> {
    Ok(DescriptiveStats::from_values(numeric_values(frame, column)?))
}

/// Per-category sums of one numeric column, one row per category in category
/// order. The output keeps the input column names.
pub fn category_breakdown(
    frame: &DataFrame,
    category: &str,
    value: &str,
) -> AggregateResult<DataFrame> {
    let categories = string_values(frame, category)?;
    let values = numeric_values(frame, value)?;

    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for (key, v) in categories.into_iter().zip(values) {
        if v.is_finite() {
            *sums.entry(key).or_insert(0.0) += v;
        }
    }

    let (keys, totals): (Vec<String>, Vec<f64>) = sums.into_iter().unzip();
    Ok(DataFrame::new(vec![
        Series::new(category, keys),
        Series::new(value, totals),
    ])?)
}

/// Per-category descriptive statistics of one numeric column, for
/// distributional views such as box plots.
pub fn category_stats(
    frame: &DataFrame,
    category: &str,
    value: &str,
) -> AggregateResult<DataFrame> {
    let categories = string_values(frame, category)?;
    let values = numeric_values(frame, value)?;

    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (key, v) in categories.into_iter().zip(values) {
        grouped.entry(key).or_default().push(v);
    }

    let mut keys = Vec::with_capacity(grouped.len());
    let mut means = Vec::with_capacity(grouped.len());
    let mut medians = Vec::with_capacity(grouped.len());
    let mut lower = Vec::with_capacity(grouped.len());
    let mut upper = Vec::with_capacity(grouped.len());
    for (key, group) in grouped {
        let stats = DescriptiveStats::from_values(group);
        keys.push(key);
        means.push(stats.mean);
        medians.push(stats.median);
        lower.push(stats.lower_quartile);
        upper.push(stats.upper_quartile);
    }

    Ok(DataFrame::new(vec![
        Series::new(category, keys),
        Series::new("mean", means),
        Series::new("median", medians),
        Series::new("lower_quartile", lower),
        Series::new("upper_quartile", upper),
    ])?)
}

/// Pearson correlations across the named numeric columns, rounded to two
/// decimals. The result carries a leading `column` label column followed by
/// one value column per input name; it is symmetric, with 1.0 on the
/// diagonal for every non-degenerate column and `NaN` wherever a
/// zero-variance column is involved.
pub fn correlation_matrix(frame: &DataFrame, columns: &[&str]) -> AggregateResult<DataFrame> {
    let mut extracted = Vec::with_capacity(columns.len());
    for name in columns {
        extracted.push(numeric_values(frame, name)?);
    }

    let cells: Vec<Vec<f64>> = (0..columns.len())
        .into_par_iter()
        .map(|row| {
            (0..columns.len())
                .map(|col| round_two_decimals(pearson(&extracted[row], &extracted[col])))
                .collect()
        })
        .collect();

    let mut result = vec![Series::new("column", columns)];
    for (col, name) in columns.iter().copied().enumerate() {
        let values: Vec<f64> = cells.iter().map(|row| row[col]).collect();
        result.push(Series::new(name, values));
    }

    log_event(
        file!(),
        "Aggregation",
        "correlation_matrix",
        "aggregate.correlation",
        line!(),
        &format!("Computed correlations across {} columns", columns.len()),
        None,
        None,
    );

    Ok(DataFrame::new(result)?)
}

/// Transaction counts per payment method, most frequent first with ties
/// broken by name.
pub fn payment_method_frequency(frame: &DataFrame) -> AggregateResult<DataFrame> {
    let methods = string_values(frame, "Payment")?;

    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for method in methods {
        *counts.entry(method).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let (methods, counts): (Vec<String>, Vec<u32>) = ranked.into_iter().unzip();
    Ok(DataFrame::new(vec![
        Series::new("Payment", methods),
        Series::new("Transactions", counts),
    ])?)
}

/// Equal-width histogram of one numeric column. Bin edges span the observed
/// min/max and the final bin includes its upper edge; an input with no
/// finite values yields zero rows.
pub fn value_histogram(
    frame: &DataFrame,
    column: &str,
    bins: usize,
) -> AggregateResult<DataFrame> {
    assert!(bins > 0, "bin count must be positive");

    let values: Vec<f64> = numeric_values(frame, column)?
        .into_iter()
        .filter(|value| value.is_finite())
        .collect();
    if values.is_empty() {
        return Ok(DataFrame::new(vec![
            Series::new("bin_start", Vec::<f64>::new()),
            Series::new("bin_end", Vec::<f64>::new()),
            Series::new("count", Vec::<u32>::new()),
        ])?);
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bins as f64;

    let mut counts = vec![0u32; bins];
    for value in &values {
        let index = if width > 0.0 {
            (((value - min) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[index] += 1;
    }

    let starts: Vec<f64> = (0..bins).map(|bin| min + width * bin as f64).collect();
    let ends: Vec<f64> = (0..bins).map(|bin| min + width * (bin + 1) as f64).collect();
    Ok(DataFrame::new(vec![
        Series::new("bin_start", starts),
        Series::new("bin_end", ends),
        Series::new("count", counts),
    ])?)
}

fn daily_sum_map(frame: &DataFrame) -> AggregateResult<BTreeMap<i32, f64>> {
    let dates = date_values(frame, "Date")?;
    let totals = numeric_values(frame, "Total")?;
    let mut sums = BTreeMap::new();
    for (date, total) in dates.into_iter().zip(totals) {
        if let Some(days) = date
            && total.is_finite()
        {
            *sums.entry(days).or_insert(0.0) += total;
        }
    }
    Ok(sums)
}

fn require_column<'a>(frame: &'a DataFrame, name: &str) -> AggregateResult<&'a Series> {
    frame
        .column(name)
        .map_err(|_| AggregateError::MissingColumn(name.to_string()))
}

fn numeric_values(frame: &DataFrame, name: &str) -> AggregateResult<Vec<f64>> {
    let casted = require_column(frame, name)?.cast(&DataType::Float64)?;
    let chunked = casted.f64().expect("series cast to f64");
    Ok(chunked
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

fn string_values(frame: &DataFrame, name: &str) -> AggregateResult<Vec<String>> {
    let casted = require_column(frame, name)?.cast(&DataType::Utf8)?;
    let chunked = casted.utf8().expect("series cast to utf8");
    Ok(chunked
        .into_iter()
        .map(|value| value.unwrap_or("").to_string())
        .collect())
}

fn date_values(frame: &DataFrame, name: &str) -> AggregateResult<Vec<Option<i32>>> {
    let dates = require_column(frame, name)?.date()?;
    Ok(dates.into_iter().collect())
}

/// Quantile by linear interpolation over an ascending, finite slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = (sorted.len() - 1) as f64 * q;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    if below == above {
        return sorted[below];
    }
    let weight = position - below as f64;
    sorted[below] * (1.0 - weight) + sorted[above] * weight
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let count = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / count;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x <= f64::EPSILON || variance_y <= f64::EPSILON {
        return f64::NAN;
    }
    covariance / (variance_x.sqrt() * variance_y.sqrt())
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
