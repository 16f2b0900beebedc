//! Shared primitive types used across the entire simulation.

/// A customer's position in the simulated population. 1-indexed.
pub type CustomerId = u64;

/// Loyalty points. Fractional because purchase points scale with spend.
pub type Points = f64;

/// A currency amount (pounds).
pub type Money = f64;

/// Round to the 2 dp used for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
