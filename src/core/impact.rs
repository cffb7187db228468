//! Pickup impact calculator.
//!
//! Decides whether travelling to collect a listing still saves carbon overall. The trip
//! is always a round trip, so the one-way distance shown on a listing is doubled before
//! the per-kilometre emission factor of the chosen transport mode is applied.

pub use crate::entities::TransportMode;
use crate::errors::{Error, Result};
use serde::Serialize;
use std::str::FromStr;

impl TransportMode {
    /// kg CO2e emitted per kilometre travelled.
    #[must_use]
    pub const fn emission_factor(self) -> f64 {
        match self {
            Self::Walk | Self::Bike => 0.0,
            Self::Transit => 0.105,
            Self::Car => 0.192,
        }
    }

    /// Lowercase name as stored and shown.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Bike => "bike",
            Self::Transit => "transit",
            Self::Car => "car",
        }
    }
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walk" => Ok(Self::Walk),
            "bike" => Ok(Self::Bike),
            "transit" => Ok(Self::Transit),
            "car" => Ok(Self::Car),
            other => Err(Error::validation(format!("unknown transport mode {other:?}"))),
        }
    }
}

/// Result of analysing one pickup trip. Figures are rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PickupAnalysis {
    /// Distance travelled there and back, in km
    pub round_trip_km: f64,
    /// kg CO2e emitted by the trip
    pub travel_emissions: f64,
    /// kg CO2e saved by the food minus the trip emissions
    pub net_impact: f64,
    /// True when the reported net impact is positive
    pub is_worth_it: bool,
}

/// Rounds to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses a listing distance such as `"0.5km"`, `"5 KM"` or `"3"` into kilometres.
///
/// # Errors
/// [`Error::InvalidDistance`] when the text is not a finite, non-negative number with an
/// optional `km` suffix.
pub fn parse_distance_km(input: &str) -> Result<f64> {
    let normalized = input.trim().to_ascii_lowercase();
    let number = normalized.strip_suffix("km").unwrap_or(&normalized).trim();

    match number.parse::<f64>() {
        Ok(km) if km.is_finite() && km >= 0.0 => Ok(km),
        _ => Err(Error::InvalidDistance {
            input: input.to_string(),
        }),
    }
}

/// Analyses a trip of `round_trip_km` using `mode` against the listing's `carbon_saved`.
#[must_use]
pub fn analyze_trip(round_trip_km: f64, mode: TransportMode, carbon_saved: f64) -> PickupAnalysis {
    let travel_emissions = round_trip_km * mode.emission_factor();
    let net_impact = round2(carbon_saved - travel_emissions);

    PickupAnalysis {
        round_trip_km,
        travel_emissions: round2(travel_emissions),
        net_impact,
        is_worth_it: net_impact > 0.0,
    }
}

/// Analyses a pickup from the one-way distance text shown on a listing.
pub fn analyze_pickup(
    one_way_distance: &str,
    mode: TransportMode,
    carbon_saved: f64,
) -> Result<PickupAnalysis> {
    let one_way_km = parse_distance_km(one_way_distance)?;
    Ok(analyze_trip(one_way_km * 2.0, mode, carbon_saved))
}
