//! Calories burned by active travel.

use mobility_track_models::VehicleMode;
use serde::{Deserialize, Serialize};

/// One speed bucket: below `speed_kmh`, `calories_per_minute` are burned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalorieStep {
    pub speed_kmh: f64,
    pub calories_per_minute: f64,
}

const FOOT_STEPS: &[CalorieStep] = &[
    CalorieStep {
        speed_kmh: 5.5,
        calories_per_minute: 5.28,
    },
    CalorieStep {
        speed_kmh: 6.5,
        calories_per_minute: 5.94,
    },
];

const BIKE_STEPS: &[CalorieStep] = &[
    CalorieStep {
        speed_kmh: 13.0,
        calories_per_minute: 4.87,
    },
    CalorieStep {
        speed_kmh: 19.0,
        calories_per_minute: 7.03,
    },
    CalorieStep {
        speed_kmh: 24.0,
        calories_per_minute: 9.26,
    },
    CalorieStep {
        speed_kmh: 27.0,
        calories_per_minute: 11.14,
    },
    CalorieStep {
        speed_kmh: 30.0,
        calories_per_minute: 13.38,
    },
];

/// Speed buckets for `mode`, ordered by speed. Empty for modes that burn no
/// calories.
#[must_use]
pub const fn calorie_steps(mode: VehicleMode) -> &'static [CalorieStep] {
    match mode {
        VehicleMode::Foot => FOOT_STEPS,
        VehicleMode::Bike => BIKE_STEPS,
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub calories_consumed: f64,
}

/// Calories burned over `duration_minutes` at an average of `speed_kmh`.
///
/// The rate comes from the first bucket faster than `speed_kmh`; speeds
/// above every bucket use the last one.
#[must_use]
pub fn calculate_health(mode: VehicleMode, duration_minutes: f64, speed_kmh: f64) -> Health {
    let steps = calorie_steps(mode);
    let rate = steps
        .iter()
        .find(|step| speed_kmh < step.speed_kmh)
        .or_else(|| steps.last())
        .map_or(0.0, |step| step.calories_per_minute);

    Health {
        calories_consumed: rate * duration_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_faster_bucket() {
        let health = calculate_health(VehicleMode::Bike, 10.0, 15.0);
        assert!((health.calories_consumed - 70.3).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_last_bucket() {
        let health = calculate_health(VehicleMode::Foot, 10.0, 9.0);
        assert!((health.calories_consumed - 59.4).abs() < 1e-9);
    }

    #[test]
    fn motorized_modes_burn_nothing() {
        let health = calculate_health(VehicleMode::Car, 60.0, 50.0);
        assert!(health.calories_consumed.abs() < f64::EPSILON);
    }
}
