//! Journal impact normalisation.
//!
//! Raw SJR-style scores span several orders of magnitude (0.1 to 100+), so the
//! contribution is log-scaled and capped.

/// `min(ln(sjr + 1) * scale, cap)`; zero for non-positive or non-finite input.
pub fn log_capped(sjr: f64, scale: f64, cap: f64) -> f64 {
    if !sjr.is_finite() || sjr <= 0.0 {
        return 0.0;
    }
    ((sjr + 1.0).ln() * scale).min(cap)
}

/// Journal impact points with the default scale (5) and cap (25).
pub fn normalise_journal_score(sjr: f64) -> f64 {
    log_capped(sjr, 5.0, 25.0)
}
