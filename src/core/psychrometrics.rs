use serde::Deserialize;
use std::sync::LazyLock;

/// This module contains moist-air properties used by the ventilation and duct models.
/// Temperatures are in deg C, humidity ratios in kg water / kg dry air, pressures in Pa,
/// enthalpies in J/kg dry air.

#[derive(Clone, Copy, Debug)]
pub struct MaterialProperties {
    density: f64,                // kg/m3
    specific_heat_capacity: f64, // J/(kg.K)
}

impl MaterialProperties {
    pub fn new(density: f64, specific_heat_capacity: f64) -> Self {
        Self {
            density,
            specific_heat_capacity,
        }
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn specific_heat_capacity(&self) -> f64 {
        self.specific_heat_capacity
    }
}

/// Standard dry air, used where a mass flow needs converting to a volume flow
pub static AIR: LazyLock<MaterialProperties> =
    LazyLock::new(|| MaterialProperties::new(1.204, 1006.0));

const CP_WATER_VAPOUR: f64 = 1860.; // J/(kg.K)
const CP_LIQUID_WATER: f64 = 4186.; // J/(kg.K)
const LATENT_HEAT_AT_ZERO_C: f64 = 2_501_000.; // J/kg
const GAS_CONSTANT_DRY_AIR: f64 = 287.055; // J/(kg.K)
const MOLAR_MASS_RATIO_WATER_AIR: f64 = 0.621_945;

/// Dry-bulb temperature and humidity ratio of a parcel of air
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AirState {
    pub temperature: f64,
    pub humidity_ratio: f64,
}

impl AirState {
    pub fn new(temperature: f64, humidity_ratio: f64) -> Self {
        Self {
            temperature,
            humidity_ratio,
        }
    }

    pub fn enthalpy(&self) -> f64 {
        enthalpy(self.temperature, self.humidity_ratio)
    }

    pub fn specific_heat(&self) -> f64 {
        specific_heat(self.humidity_ratio)
    }
}

/// Specific heat of moist air per kg dry air
pub fn specific_heat(humidity_ratio: f64) -> f64 {
    AIR.specific_heat_capacity() + CP_WATER_VAPOUR * humidity_ratio
}

pub fn enthalpy(temperature: f64, humidity_ratio: f64) -> f64 {
    AIR.specific_heat_capacity() * temperature
        + humidity_ratio * (LATENT_HEAT_AT_ZERO_C + CP_WATER_VAPOUR * temperature)
}

pub fn humidity_ratio_from_enthalpy(temperature: f64, enthalpy: f64) -> f64 {
    (enthalpy - AIR.specific_heat_capacity() * temperature)
        / (LATENT_HEAT_AT_ZERO_C + CP_WATER_VAPOUR * temperature)
}

/// Latent heat of vaporisation of water at the given temperature
pub fn latent_heat_of_vaporisation(temperature: f64) -> f64 {
    LATENT_HEAT_AT_ZERO_C + (CP_WATER_VAPOUR - CP_LIQUID_WATER) * temperature
}

/// Density of the dry-air component of moist air, in kg dry air / m3
pub fn dry_air_density(temperature: f64, humidity_ratio: f64, pressure: f64) -> f64 {
    let partial_pressure_dry_air =
        pressure * MOLAR_MASS_RATIO_WATER_AIR / (MOLAR_MASS_RATIO_WATER_AIR + humidity_ratio);
    partial_pressure_dry_air / (GAS_CONSTANT_DRY_AIR * (temperature + 273.15))
}

/// Saturation vapour pressure (Pa), Hyland-Wexler over ice below 0C and over liquid water above
pub fn saturation_pressure(temperature: f64) -> f64 {
    let t = temperature + 273.15;
    let ln_pws = if temperature < 0. {
        -5.674_535_9e3 / t + 6.392_524_7 - 9.677_843e-3 * t + 6.221_570_1e-7 * t.powi(2)
            + 2.074_782_5e-9 * t.powi(3)
            - 9.484_024e-13 * t.powi(4)
            + 4.163_501_9 * t.ln()
    } else {
        -5.800_220_6e3 / t + 1.391_499_3 - 4.864_023_9e-2 * t + 4.176_476_8e-5 * t.powi(2)
            - 1.445_209_3e-8 * t.powi(3)
            + 6.545_967_3 * t.ln()
    };
    ln_pws.exp()
}

/// Relative humidity (0-1) of air at the given state and total pressure
pub fn relative_humidity(temperature: f64, humidity_ratio: f64, pressure: f64) -> f64 {
    let vapour_pressure = pressure * humidity_ratio / (MOLAR_MASS_RATIO_WATER_AIR + humidity_ratio);
    vapour_pressure / saturation_pressure(temperature)
}
