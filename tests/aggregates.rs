use approx::assert_abs_diff_eq;

use polars::prelude::*;

use salescope::aggregate::{
    AggregateError, WEEKDAY_ORDER, average_daily_total, category_breakdown, category_stats,
    correlation_matrix, daily_totals, descriptive_stats, hourly_distribution,
    payment_method_frequency, total_sum, transaction_count, value_histogram, weekday_means,
};

fn matrix_cell(frame: &DataFrame, row: usize, column: &str) -> f64 {
    frame
        .column(column)
        .unwrap()
        .f64()
        .unwrap()
        .get(row)
        .unwrap()
}

#[test]
fn weekday_means_cover_the_full_week_in_order() -> anyhow::Result<()> {
    let frame = df! {
        "Day" => &["Friday", "Monday", "Friday"],
        "Total" => &[10.0, 30.0, 20.0],
    }?;

    let means = weekday_means(&frame)?;
    assert_eq!(means.height(), 7);

    let labels: Vec<&str> = means
        .column("Day")?
        .utf8()?
        .into_iter()
        .map(|value| value.unwrap())
        .collect();
    assert_eq!(labels, WEEKDAY_ORDER.to_vec());

    let totals = means.column("Total")?.f64()?;
    assert_abs_diff_eq!(totals.get(0).unwrap(), 30.0, epsilon = 1e-12);
    assert_abs_diff_eq!(totals.get(4).unwrap(), 15.0, epsilon = 1e-12);
    // Absent weekdays stay null rather than reading as zero sales.
    assert_eq!(totals.null_count(), 5);
    Ok(())
}

#[test]
fn hourly_distribution_always_has_twenty_four_bins() -> anyhow::Result<()> {
    let frame = df! {
        "Hour" => &[9i64, 13, 13],
        "Total" => &[5.0, 7.0, 11.0],
    }?;

    let histogram = hourly_distribution(&frame)?;
    assert_eq!(histogram.height(), 24);

    let totals = histogram.column("Total")?.f64()?;
    assert_abs_diff_eq!(totals.get(9).unwrap(), 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(totals.get(13).unwrap(), 18.0, epsilon = 1e-12);
    assert_abs_diff_eq!(totals.get(0).unwrap(), 0.0, epsilon = 1e-12);
    Ok(())
}

#[test]
fn descriptive_stats_interpolate_quantiles() -> anyhow::Result<()> {
    let frame = df! {
        "Rating" => &[1.0, 2.0, 3.0, 4.0],
    }?;

    let stats = descriptive_stats(&frame, "Rating")?;
    assert_abs_diff_eq!(stats.mean, 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(stats.median, 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(stats.lower_quartile, 1.75, epsilon = 1e-12);
    assert_abs_diff_eq!(stats.upper_quartile, 3.25, epsilon = 1e-12);
    Ok(())
}

#[test]
fn descriptive_stats_of_nothing_are_nan() -> anyhow::Result<()> {
    let frame = df! {
        "Rating" => Vec::<f64>::new(),
    }?;

    let stats = descriptive_stats(&frame, "Rating")?;
    assert!(stats.mean.is_nan());
    assert!(stats.median.is_nan());
    assert!(stats.lower_quartile.is_nan());
    assert!(stats.upper_quartile.is_nan());
    Ok(())
}

#[test]
fn correlation_matrix_is_symmetric_with_unit_diagonal() -> anyhow::Result<()> {
    let frame = df! {
        "Unit price" => &[1.0, 2.0, 3.0],
        "Total" => &[2.0, 4.0, 6.0],
        "Rating" => &[3.0, 1.0, 2.0],
    }?;
    let names = ["Unit price", "Total", "Rating"];

    let matrix = correlation_matrix(&frame, &names)?;
    assert_eq!(matrix.height(), 3);

    let labels: Vec<&str> = matrix
        .column("column")?
        .utf8()?
        .into_iter()
        .map(|value| value.unwrap())
        .collect();
    assert_eq!(labels, names.to_vec());

    for (row, row_name) in names.iter().enumerate() {
        assert_abs_diff_eq!(matrix_cell(&matrix, row, row_name), 1.0, epsilon = 1e-12);
        for (col, col_name) in names.iter().enumerate() {
            let value = matrix_cell(&matrix, row, col_name);
            assert!(value >= -1.0 && value <= 1.0);
            assert_abs_diff_eq!(
                value,
                matrix_cell(&matrix, col, row_name),
                epsilon = 1e-12
            );
        }
    }

    // Perfectly linear pair, and a hand-checked mixed pair.
    assert_abs_diff_eq!(matrix_cell(&matrix, 0, "Total"), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(matrix_cell(&matrix, 0, "Rating"), -0.5, epsilon = 1e-12);
    Ok(())
}

#[test]
fn correlation_with_a_constant_column_is_nan() -> anyhow::Result<()> {
    let frame = df! {
        "Total" => &[2.0, 4.0, 6.0],
        "Quantity" => &[5.0, 5.0, 5.0],
    }?;

    let matrix = correlation_matrix(&frame, &["Total", "Quantity"])?;
    assert!(matrix_cell(&matrix, 0, "Quantity").is_nan());
    assert!(matrix_cell(&matrix, 1, "Quantity").is_nan());
    Ok(())
}

#[test]
fn category_breakdown_sums_by_group() -> anyhow::Result<()> {
    let frame = df! {
        "Customer type" => &["Member", "Normal", "Member"],
        "Total" => &[10.0, 5.0, 2.5],
    }?;

    let breakdown = category_breakdown(&frame, "Customer type", "Total")?;
    assert_eq!(breakdown.height(), 2);
    assert_eq!(
        breakdown.column("Customer type")?.utf8()?.get(0),
        Some("Member")
    );
    let totals = breakdown.column("Total")?.f64()?;
    assert_abs_diff_eq!(totals.get(0).unwrap(), 12.5, epsilon = 1e-12);
    assert_abs_diff_eq!(totals.get(1).unwrap(), 5.0, epsilon = 1e-12);
    Ok(())
}

#[test]
fn category_stats_summarize_each_group() -> anyhow::Result<()> {
    let frame = df! {
        "Customer type" => &["Member", "Normal", "Member"],
        "Total" => &[1.0, 2.0, 3.0],
    }?;

    let stats = category_stats(&frame, "Customer type", "Total")?;
    assert_eq!(stats.height(), 2);

    let means = stats.column("mean")?.f64()?;
    let medians = stats.column("median")?.f64()?;
    let lower = stats.column("lower_quartile")?.f64()?;
    let upper = stats.column("upper_quartile")?.f64()?;
    assert_abs_diff_eq!(means.get(0).unwrap(), 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(medians.get(0).unwrap(), 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(lower.get(0).unwrap(), 1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(upper.get(0).unwrap(), 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(means.get(1).unwrap(), 2.0, epsilon = 1e-12);
    Ok(())
}

#[test]
fn payment_methods_rank_by_frequency_then_name() -> anyhow::Result<()> {
    let frame = df! {
        "Payment" => &["Cash", "Ewallet", "Ewallet", "Credit card"],
    }?;

    let ranked = payment_method_frequency(&frame)?;
    let methods: Vec<&str> = ranked
        .column("Payment")?
        .utf8()?
        .into_iter()
        .map(|value| value.unwrap())
        .collect();
    assert_eq!(methods, vec!["Ewallet", "Cash", "Credit card"]);

    let counts = ranked.column("Transactions")?.u32()?;
    assert_eq!(counts.get(0), Some(2));
    assert_eq!(counts.get(1), Some(1));
    Ok(())
}

#[test]
fn value_histogram_spans_the_observed_range() -> anyhow::Result<()> {
    let frame = df! {
        "Rating" => &[4.0, 5.0, 6.0, 8.0],
    }?;

    let histogram = value_histogram(&frame, "Rating", 2)?;
    assert_eq!(histogram.height(), 2);

    let starts = histogram.column("bin_start")?.f64()?;
    let ends = histogram.column("bin_end")?.f64()?;
    let counts = histogram.column("count")?.u32()?;
    assert_abs_diff_eq!(starts.get(0).unwrap(), 4.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ends.get(0).unwrap(), 6.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ends.get(1).unwrap(), 8.0, epsilon = 1e-12);
    assert_eq!(counts.get(0), Some(2));
    assert_eq!(counts.get(1), Some(2));
    Ok(())
}

#[test]
fn aggregates_name_the_missing_column() -> anyhow::Result<()> {
    let frame = df! {
        "Total" => &[1.0],
    }?;

    let error = descriptive_stats(&frame, "Rating").expect_err("column is absent");
    assert!(matches!(error, AggregateError::MissingColumn(ref name) if name == "Rating"));
    Ok(())
}

#[test]
fn empty_tables_degrade_without_errors() -> anyhow::Result<()> {
    let frame = DataFrame::new(vec![
        Int32Chunked::from_vec("Date", Vec::new())
            .into_date()
            .into_series(),
        Series::new("Total", Vec::<f64>::new()),
    ])?;

    assert_eq!(transaction_count(&frame), 0);
    assert_abs_diff_eq!(total_sum(&frame)?, 0.0, epsilon = 1e-12);
    assert!(average_daily_total(&frame)?.is_nan());
    assert_eq!(daily_totals(&frame)?.height(), 0);
    Ok(())
}
