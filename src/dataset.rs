use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use polars::prelude::*;
use thiserror::Error;

use crate::logging::log_event;

/// Fixed format of the `Date` column in the source export.
pub const DATE_FORMAT: &str = "%m/%d/%Y";
/// Fixed 24-hour format of the `Time` column in the source export.
pub const TIME_FORMAT: &str = "%H:%M";

/// Columns that must be present in the source header for a load to succeed.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Date", "Time", "Total", "Product line", "Payment"];

/// Month labels in calendar order, used to offer month choices the way the
/// dashboard sidebar lists them.
pub const MONTH_ORDER: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot open sales data source {}: {source}", .path.display())]
    SourceUnavailable { path: PathBuf, source: PolarsError },
    #[error("required column `{0}` is missing from the source header")]
    MissingColumn(String),
    #[error("failed to load sales data: {source}")]
    Load { source: PolarsError },
    #[error("failed to transform sales data: {source}")]
    Transform { source: PolarsError },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// The fully parsed transaction table: headers trimmed, `Date` typed,
/// `Day`/`Month`/`Hour` derived, and every incomplete row discarded.
///
/// The table is never mutated after load; filtering produces a new value.
/// Loading the same source twice yields identical output, so callers may
/// memoize by source identity if they wish — no caching happens here.
#[derive(Clone, Debug)]
pub struct SalesData {
    frame: DataFrame,
    dropped_rows: usize,
}

impl SalesData {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path_ref = path.as_ref();
        let reader = CsvReader::from_path(path_ref).map_err(|source| {
            log_event(
                file!(),
                "SalesData",
                "from_csv",
                "dataset.load",
                line!(),
                &format!("Failed to open {}", path_ref.display()),
                Some(&source.to_string()),
                None,
            );
            DatasetError::SourceUnavailable {
                path: path_ref.to_path_buf(),
                source,
            }
        })?;

        let mut frame = reader.has_header(true).finish().map_err(|source| {
            log_event(
                file!(),
                "SalesData",
                "from_csv",
                "dataset.load",
                line!(),
                &format!("Failed to read {}", path_ref.display()),
                Some(&source.to_string()),
                None,
            );
            DatasetError::Load { source }
        })?;

        normalize_headers(&mut frame)?;

        for required in REQUIRED_COLUMNS {
            if frame.column(required).is_err() {
                log_event(
                    file!(),
                    "SalesData",
                    "from_csv",
                    "dataset.load",
                    line!(),
                    &format!("Source header lacks required column `{required}`"),
                    None,
                    None,
                );
                return Err(DatasetError::MissingColumn(required.to_string()));
            }
        }

        let parsed_dates = parse_column(&frame, "Date", |raw| {
            NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
        })?;
        let parsed_times = parse_column(&frame, "Time", |raw| {
            NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
        })?;

        let total_rows = frame.height();
        let complete = complete_row_mask(&frame, &parsed_dates, &parsed_times);

        let typed_date = Int32Chunked::from_iter_options(
            "Date",
            parsed_dates.iter().map(|date| date.map(days_from_epoch)),
        )
        .into_date()
        .into_series();
        let day = Utf8Chunked::from_iter_options(
            "Day",
            parsed_dates
                .iter()
                .map(|date| date.map(|d| d.format("%A").to_string())),
        )
        .into_series();
        let month = Utf8Chunked::from_iter_options(
            "Month",
            parsed_dates
                .iter()
                .map(|date| date.map(|d| d.format("%B").to_string())),
        )
        .into_series();
        let hour = UInt32Chunked::from_iter_options(
            "Hour",
            parsed_times.iter().map(|time| time.map(|t| t.hour())),
        )
        .into_series();

        // Replaces any same-named columns a re-imported export may carry.
        for derived in [typed_date, day, month, hour] {
            frame
                .with_column(derived)
                .map_err(|source| DatasetError::Transform { source })?;
        }

        let filtered = frame
            .filter(&complete)
            .map_err(|source| DatasetError::Transform { source })?;
        let dropped_rows = total_rows - filtered.height();

        log_event(
            file!(),
            "SalesData",
            "from_csv",
            "dataset.load",
            line!(),
            &format!(
                "Loaded {} rows from {} ({dropped_rows} incomplete rows dropped)",
                filtered.height(),
                path_ref.display()
            ),
            None,
            Some(dropped_rows),
        );

        Ok(Self {
            frame: filtered,
            dropped_rows,
        })
    }

    pub(crate) fn from_parts(frame: DataFrame, dropped_rows: usize) -> Self {
        Self {
            frame,
            dropped_rows,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Number of source rows discarded during load because a field failed to
    /// parse or was missing.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Observed inclusive date range of the table, `None` when it is empty.
    pub fn date_bounds(&self) -> DatasetResult<Option<(NaiveDate, NaiveDate)>> {
        let dates = self.date_days()?;
        let observed = dates.into_iter().flatten();
        let mut bounds: Option<(i32, i32)> = None;
        for days in observed {
            bounds = match bounds {
                Some((min, max)) => Some((min.min(days), max.max(days))),
                None => Some((days, days)),
            };
        }
        Ok(bounds.map(|(min, max)| (date_from_days(min), date_from_days(max))))
    }

    /// Distinct product lines, sorted, for populating the category control.
    pub fn product_lines(&self) -> DatasetResult<Vec<String>> {
        let unique: BTreeSet<String> = self.string_column("Product line")?.into_iter().collect();
        Ok(unique.into_iter().collect())
    }

    /// Months present in the table, in January→December calendar order.
    pub fn months_present(&self) -> DatasetResult<Vec<String>> {
        let observed: BTreeSet<String> = self.string_column("Month")?.into_iter().collect();
        Ok(MONTH_ORDER
            .iter()
            .filter(|month| observed.contains(**month))
            .map(|month| month.to_string())
            .collect())
    }

    /// Projection of the named columns, e.g. the cost/gross-income pair the
    /// scatter view plots.
    pub fn columns(&self, names: &[&str]) -> DatasetResult<DataFrame> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let series = self
                .frame
                .column(name)
                .map_err(|_| DatasetError::MissingColumn(name.to_string()))?
                .clone();
            selected.push(series);
        }
        DataFrame::new(selected).map_err(|source| DatasetError::Transform { source })
    }

    /// Serialize the table back to delimited text for download, with `Date`
    /// rendered in the source format so the output re-loads under the same
    /// parse rules.
    pub fn to_csv_string(&self) -> DatasetResult<String> {
        let mut export = self.frame.clone();

        let formatted = {
            let column = export
                .column("Date")
                .map_err(|source| DatasetError::Transform { source })?;
            let dates = column
                .date()
                .map_err(|source| DatasetError::Transform { source })?;
            Utf8Chunked::from_iter_options(
                "Date",
                dates.into_iter().map(|days| {
                    days.map(|d| date_from_days(d).format(DATE_FORMAT).to_string())
                }),
            )
            .into_series()
        };
        export
            .with_column(formatted)
            .map_err(|source| DatasetError::Transform { source })?;

        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .finish(&mut export)
            .map_err(|source| DatasetError::Transform { source })?;

        log_event(
            file!(),
            "SalesData",
            "to_csv_string",
            "dataset.export",
            line!(),
            "Serialized table for download",
            None,
            Some(self.frame.height()),
        );

        Ok(String::from_utf8(buffer).expect("csv output is valid utf-8"))
    }

    pub(crate) fn date_days(&self) -> DatasetResult<Vec<Option<i32>>> {
        let column = self
            .frame
            .column("Date")
            .map_err(|_| DatasetError::MissingColumn("Date".to_string()))?;
        let dates = column
            .date()
            .map_err(|source| DatasetError::Transform { source })?;
        Ok(dates.into_iter().collect())
    }

    pub(crate) fn string_column(&self, name: &str) -> DatasetResult<Vec<String>> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| DatasetError::MissingColumn(name.to_string()))?;
        let casted = column
            .cast(&DataType::Utf8)
            .map_err(|source| DatasetError::Transform { source })?;
        let chunked = casted.utf8().expect("series cast to utf8");
        Ok(chunked
            .into_iter()
            .map(|value| value.unwrap_or("").to_string())
            .collect())
    }
}

fn normalize_headers(frame: &mut DataFrame) -> DatasetResult<()> {
    let trimmed: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    frame
        .set_column_names(&trimmed)
        .map_err(|source| DatasetError::Transform { source })
}

fn parse_column<T>(
    frame: &DataFrame,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> DatasetResult<Vec<Option<T>>> {
    let column = frame
        .column(name)
        .map_err(|_| DatasetError::MissingColumn(name.to_string()))?;
    let casted = column
        .cast(&DataType::Utf8)
        .map_err(|source| DatasetError::Transform { source })?;
    let chunked = casted.utf8().expect("series cast to utf8");
    Ok(chunked
        .into_iter()
        .map(|value| value.and_then(&parse))
        .collect())
}

/// True for rows where every source field is present and both temporal
/// fields parsed.
fn complete_row_mask(
    frame: &DataFrame,
    dates: &[Option<NaiveDate>],
    times: &[Option<NaiveTime>],
) -> BooleanChunked {
    let mut non_null = BooleanChunked::full("complete", true, frame.height());
    for series in frame.get_columns() {
        let present = series.is_not_null();
        non_null = &non_null & &present;
    }
    let mask: Vec<bool> = non_null
        .into_iter()
        .enumerate()
        .map(|(idx, value)| value.unwrap_or(false) && dates[idx].is_some() && times[idx].is_some())
        .collect();
    BooleanChunked::from_slice("complete", &mask)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date")
}

pub(crate) fn days_from_epoch(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch()).num_days() as i32
}

pub(crate) fn date_from_days(days: i32) -> NaiveDate {
    epoch() + Duration::days(i64::from(days))
}
