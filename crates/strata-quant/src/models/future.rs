//! Cost-of-carry futures.

/// Forward price `spot * e^(rate * t)`. Past expiry the future converges to spot.
pub fn cost_of_carry(spot: f64, rate: f64, time_to_expiry: f64) -> f64 {
    spot * (rate * time_to_expiry.max(0.0)).exp()
}
