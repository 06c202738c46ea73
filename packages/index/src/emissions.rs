//! Pollutant emissions per passenger and savings versus a private car.

use mobility_track_models::VehicleMode;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Tracked pollutants.
///
/// CO2 coefficients are in g/km; all others in mg/km.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Pollutant {
    So2,
    Nox,
    Co,
    Co2,
    Pm10,
}

impl Pollutant {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::So2, Self::Nox, Self::Co, Self::Co2, Self::Pm10]
    }

    /// Emission per vehicle-kilometer. Modes without a coefficient emit
    /// nothing.
    #[must_use]
    pub const fn coefficient(self, mode: VehicleMode) -> f64 {
        use VehicleMode::{Bus, Car, Motorcycle, Train};

        match (self, mode) {
            (Self::So2, Car) => 1.1,
            (Self::So2, Bus) => 4.4,
            (Self::So2, Motorcycle) => 0.45,
            (Self::Nox, Car) => 460.0,
            (Self::Nox, Bus) => 6_441.0,
            (Self::Nox, Motorcycle) => 161.5,
            (Self::Co, Car) => 617.0,
            (Self::Co, Bus) => 1_451.0,
            (Self::Co, Motorcycle) => 5_893.5,
            (Self::Co2, Car) => 177.0,
            (Self::Co2, Bus) => 668.0,
            (Self::Co2, Motorcycle) => 74.5,
            (Self::Co2, Train) => 65.0,
            (Self::Pm10, Car) => 46.0,
            (Self::Pm10, Bus) => 273.0,
            (Self::Pm10, Motorcycle) => 65.0,
            _ => 0.0,
        }
    }
}

/// Average number of people sharing one vehicle. Unlisted modes count as
/// one passenger.
#[must_use]
pub const fn average_passengers(mode: VehicleMode) -> f64 {
    match mode {
        VehicleMode::Bus => 40.0,
        VehicleMode::Car => 1.5,
        VehicleMode::Train => 50.0,
        VehicleMode::Foot
        | VehicleMode::Bike
        | VehicleMode::Motorcycle
        | VehicleMode::Unknown => 1.0,
    }
}

/// Amount emitted by a segment and amount saved against a car.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    pub emitted: f64,
    pub saved: f64,
}

/// Emissions of one segment for every pollutant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentEmissions {
    pub so2: Emission,
    pub nox: Emission,
    pub co: Emission,
    pub co2: Emission,
    pub pm10: Emission,
}

impl SegmentEmissions {
    #[must_use]
    pub const fn get(&self, pollutant: Pollutant) -> Emission {
        match pollutant {
            Pollutant::So2 => self.so2,
            Pollutant::Nox => self.nox,
            Pollutant::Co => self.co,
            Pollutant::Co2 => self.co2,
            Pollutant::Pm10 => self.pm10,
        }
    }

    const fn slot(&mut self, pollutant: Pollutant) -> &mut Emission {
        match pollutant {
            Pollutant::So2 => &mut self.so2,
            Pollutant::Nox => &mut self.nox,
            Pollutant::Co => &mut self.co,
            Pollutant::Co2 => &mut self.co2,
            Pollutant::Pm10 => &mut self.pm10,
        }
    }
}

fn per_passenger(pollutant: Pollutant, mode: VehicleMode, length_km: f64) -> f64 {
    pollutant.coefficient(mode) * length_km / average_passengers(mode)
}

/// Emissions of travelling `length_km` by `mode`.
///
/// Savings are measured against covering the same distance by car, so a
/// car segment never saves anything.
#[must_use]
pub fn calculate_emissions(mode: VehicleMode, length_km: f64) -> SegmentEmissions {
    let mut result = SegmentEmissions::default();
    for pollutant in Pollutant::all() {
        let emitted = per_passenger(*pollutant, mode, length_km);
        let saved = if mode == VehicleMode::Car {
            0.0
        } else {
            per_passenger(*pollutant, VehicleMode::Car, length_km) - emitted
        };
        *result.slot(*pollutant) = Emission { emitted, saved };
    }
    result
}
