use mathdash::HistoryPoint;

/// Raw score and moving average series, x being the run's position (from 1)
pub fn score_series(points: &[HistoryPoint]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let x = (i + 1) as f64;
            ((x, f64::from(p.raw_score)), (x, p.windowed_average))
        })
        .unzip()
}

/// Compute X (run count) and Y (score) bounds for the history chart
pub fn compute_chart_params(points: &[HistoryPoint]) -> (f64, f64) {
    let highest = points
        .iter()
        .map(|p| f64::from(p.raw_score).max(p.windowed_average))
        .fold(0.0, f64::max);

    let runs = (points.len() as f64).max(1.0);

    (runs, highest.ceil().max(1.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.1}")
    }
}
