/// Imbalance ratio above which a station needs watching.
pub const MODERATE_IMBALANCE: f64 = 0.3;
/// Imbalance ratio above which a station needs active rebalancing.
pub const SEVERE_IMBALANCE: f64 = 0.5;

/// Converts an imbalance ratio (0.0–1.0) into a rebalancing grade.
///
/// | Range       | Grade    |
/// |-------------|----------|
/// | > 0.5       | severe   |
/// | > 0.3       | moderate |
/// | <= 0.3      | balanced |
pub fn grade(ratio: f64) -> &'static str {
    match ratio {
        r if r > SEVERE_IMBALANCE => "severe",
        r if r > MODERATE_IMBALANCE => "moderate",
        _ => "balanced",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade(1.00), "severe");
        assert_eq!(grade(0.51), "severe");
        assert_eq!(grade(0.50), "moderate");
        assert_eq!(grade(0.31), "moderate");
        assert_eq!(grade(0.30), "balanced");
        assert_eq!(grade(0.00), "balanced");
    }
}
