//! Vehicle profiles: static tank / consumption / speed tables.

use std::fmt;

/// Body class of a vehicle.  Closed set; profiles reference one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VehicleType {
    Car,
    Van,
    Truck,
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleType::Car => "car",
            VehicleType::Van => "van",
            VehicleType::Truck => "truck",
        };
        f.write_str(s)
    }
}

/// Whether a vehicle belongs to the managed fleet or is background traffic.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VehicleClass {
    Fleet,
    Background,
}

/// Static per-model data.  Profiles are immutable; per-vehicle variation
/// (speed multiplier, initial fuel) is applied at spawn time.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleProfile {
    pub name: &'static str,
    pub vehicle_type: VehicleType,
    pub tank_liters: f64,
    pub consumption_l_per_100km: f64,
    pub max_speed_kph: f64,
    pub cargo_capacity_kg: f64,
}

impl VehicleProfile {
    /// The built-in profile for a vehicle type.
    pub fn builtin(vehicle_type: VehicleType) -> &'static VehicleProfile {
        match vehicle_type {
            VehicleType::Car => &CAR,
            VehicleType::Van => &VAN,
            VehicleType::Truck => &TRUCK,
        }
    }
}

pub static CAR: VehicleProfile = VehicleProfile {
    name: "Standard Car",
    vehicle_type: VehicleType::Car,
    tank_liters: 60.0,
    consumption_l_per_100km: 8.0,
    max_speed_kph: 120.0,
    cargo_capacity_kg: 500.0,
};

pub static VAN: VehicleProfile = VehicleProfile {
    name: "Delivery Van",
    vehicle_type: VehicleType::Van,
    tank_liters: 80.0,
    consumption_l_per_100km: 12.0,
    max_speed_kph: 100.0,
    cargo_capacity_kg: 1500.0,
};

pub static TRUCK: VehicleProfile = VehicleProfile {
    name: "Heavy Truck",
    vehicle_type: VehicleType::Truck,
    tank_liters: 200.0,
    consumption_l_per_100km: 25.0,
    max_speed_kph: 80.0,
    cargo_capacity_kg: 8000.0,
};
