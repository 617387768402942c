//! Success and throughput formulas shared by blocks and rollups.

/// `done / (done + cancelled) * 100`, rounded to one decimal.
/// Zero when nothing was done or cancelled.
pub fn success_rate(done: u64, cancelled: u64) -> f64 {
    let denominator = done + cancelled;
    if denominator == 0 {
        return 0.0;
    }
    let pct = done as f64 / denominator as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Items per minute, rounded to the nearest integer. Zero when no whole
/// minute elapsed.
pub fn throughput(done: u64, elapsed_minutes: u64) -> u64 {
    if elapsed_minutes == 0 {
        return 0;
    }
    (done as f64 / elapsed_minutes as f64).round() as u64
}
