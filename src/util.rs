pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Round half away from zero to one decimal place
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `round(100 * correct / attempted)`, or 0 before anything was attempted
pub fn accuracy_percent(correct: u32, attempted: u32) -> u32 {
    if attempted == 0 {
        return 0;
    }
    (f64::from(correct) * 100.0 / f64::from(attempted)).round() as u32
}
