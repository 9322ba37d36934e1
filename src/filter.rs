use std::collections::BTreeSet;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::dataset::{DatasetError, DatasetResult, SalesData, days_from_epoch};
use crate::logging::log_event;

/// Which values of a categorical column a selection accepts.
///
/// `Unrestricted` is the explicit form of the sidebar convention where an
/// empty multiselect means "show everything". `RestrictedTo` with an empty
/// set is a genuine select-none and matches no record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategorySelection {
    #[default]
    Unrestricted,
    RestrictedTo(BTreeSet<String>),
}

impl CategorySelection {
    pub fn restricted_to<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RestrictedTo(values.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, value: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::RestrictedTo(accepted) => accepted.contains(value),
        }
    }
}

/// The predicates a user has active at one point in time. Date bounds are
/// inclusive; `None` leaves that side of the range open, which is equivalent
/// to the table's own observed bound. Constructed fresh per interaction,
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub product_lines: CategorySelection,
    pub months: CategorySelection,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_product_lines(mut self, product_lines: CategorySelection) -> Self {
        self.product_lines = product_lines;
        self
    }

    /// Month names are matched against the derived `Month` column by plain
    /// set membership; values not present in the data simply match nothing.
    pub fn with_months(mut self, months: CategorySelection) -> Self {
        self.months = months;
        self
    }
}

/// Keep the rows of `data` that pass every active predicate.
///
/// The result is a new table: the input is untouched and the surviving rows
/// keep their original relative order.
pub fn apply(data: &SalesData, selection: &Selection) -> DatasetResult<SalesData> {
    let frame = data.frame();
    let dates = data.date_days()?;
    let product_lines = data.string_column("Product line")?;
    let months = data.string_column("Month")?;

    let start = selection.start_date.map(days_from_epoch);
    let end = selection.end_date.map(days_from_epoch);

    let mask: Vec<bool> = (0..frame.height())
        .map(|idx| {
            let in_range = match dates[idx] {
                Some(days) => {
                    start.is_none_or(|bound| days >= bound)
                        && end.is_none_or(|bound| days <= bound)
                }
                None => false,
            };
            in_range
                && selection.product_lines.allows(&product_lines[idx])
                && selection.months.allows(&months[idx])
        })
        .collect();

    let filtered = frame
        .filter(&BooleanChunked::from_slice("selection", &mask))
        .map_err(|source| DatasetError::Transform { source })?;

    log_event(
        file!(),
        "Selection",
        "apply",
        "filter.apply",
        line!(),
        &format!("Kept {} of {} rows", filtered.height(), frame.height()),
        None,
        Some(filtered.height()),
    );

    Ok(SalesData::from_parts(filtered, data.dropped_rows()))
}
