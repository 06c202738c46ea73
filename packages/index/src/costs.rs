//! Monetary cost of a segment, in euro.
//!
//! Fuel, depreciation and operation costs are borne by the vehicle owner
//! alone, so they are not split between passengers. Public transport users
//! only pay with their time.

use mobility_track_models::VehicleMode;
use serde::{Deserialize, Serialize};

/// Value of one hour of travel time.
pub const TIME_COST_PER_HOUR: f64 = 8.0;

/// Fuel price in euro per liter.
#[must_use]
pub const fn fuel_price(mode: VehicleMode) -> Option<f64> {
    match mode {
        VehicleMode::Bus => Some(1.432),
        VehicleMode::Car => Some(1.417),
        VehicleMode::Motorcycle => Some(1.545),
        VehicleMode::Train => Some(0.0),
        VehicleMode::Foot | VehicleMode::Bike | VehicleMode::Unknown => None,
    }
}

/// Distance covered per liter of fuel, in km/l.
#[must_use]
pub const fn fuel_consumption(mode: VehicleMode) -> Option<f64> {
    match mode {
        VehicleMode::Bus => Some(3.0),
        VehicleMode::Car => Some(11.5),
        VehicleMode::Motorcycle => Some(25.0),
        VehicleMode::Train => Some(0.0),
        VehicleMode::Foot | VehicleMode::Bike | VehicleMode::Unknown => None,
    }
}

/// Depreciation in euro per km. Zero when unlisted.
#[must_use]
pub const fn depreciation_per_km(mode: VehicleMode) -> f64 {
    match mode {
        VehicleMode::Car => 0.106,
        VehicleMode::Motorcycle => 0.1,
        _ => 0.0,
    }
}

/// Operation (maintenance, tyres, ...) in euro per km. Zero when unlisted.
#[must_use]
pub const fn operation_per_km(mode: VehicleMode) -> f64 {
    match mode {
        VehicleMode::Car => 0.072,
        VehicleMode::Motorcycle => 0.11,
        _ => 0.0,
    }
}

/// Share added on top of the summed costs. Zero when unlisted.
#[must_use]
pub const fn total_overhead(mode: VehicleMode) -> f64 {
    match mode {
        VehicleMode::Car => 0.2,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Costs {
    pub fuel_cost: f64,
    pub time_cost: f64,
    pub depreciation_cost: f64,
    pub operation_cost: f64,
    pub total_cost: f64,
}

/// Fuel spent covering `length_km`, priced per liter. Zero when either the
/// consumption or the price is unknown, or when the mode burns no fuel.
#[must_use]
pub fn fuel_cost(mode: VehicleMode, length_km: f64) -> f64 {
    match (fuel_consumption(mode), fuel_price(mode)) {
        (Some(consumption), Some(price)) if consumption > 0.0 => length_km / consumption * price,
        _ => 0.0,
    }
}

/// Costs of travelling `length_km` in `duration_hours` by `mode`.
#[must_use]
pub fn calculate_costs(mode: VehicleMode, length_km: f64, duration_hours: f64) -> Costs {
    let time_cost = duration_hours * TIME_COST_PER_HOUR;
    let (fuel_cost, depreciation_cost, operation_cost) = if mode.is_public_transport() {
        (0.0, 0.0, 0.0)
    } else {
        (
            fuel_cost(mode, length_km),
            length_km * depreciation_per_km(mode),
            length_km * operation_per_km(mode),
        )
    };
    let total_cost =
        (fuel_cost + time_cost + depreciation_cost + operation_cost) * (1.0 + total_overhead(mode));

    Costs {
        fuel_cost,
        time_cost,
        depreciation_cost,
        operation_cost,
        total_cost,
    }
}
