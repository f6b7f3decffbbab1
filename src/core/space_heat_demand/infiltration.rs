// Zone air leakage. The living zone uses the AIM-2 stack/wind correlation (Walker & Wilson 1998)
// when a blower-door result is given; other zones use the Sherman-Grimsrud effective leakage
// area (ELA) model or a fixed air change rate. Leakage inputs are IP; per-timestep flows are m3/s.

use crate::core::space_heat_demand::wind::WindEnvironment;
use crate::core::space_heat_demand::zone::{Building, Zone};
use crate::core::units::{
    air_change_rate_to_cfm, cfm_to_m3_per_s, square_feet_to_square_centimetres,
    BTU_PER_CUBIC_FOOT_PER_ATMOSPHERE, CUBIC_METRES_PER_SECOND_PER_CFM, KELVIN_PER_RANKINE,
    METRES_PER_FOOT, METRES_PER_SECOND_PER_MPH, PASCALS_PER_INCH_OF_WATER, RANKINE_OFFSET,
};
use crate::errors::AirflowConfigError;
use crate::input::{
    InfiltrationInput, LeakageDistribution, LivingLeakageInput, WeatherSummary, ZoneLeakageInput,
    ZoneType,
};
use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use tracing::debug;

/// Pressure exponent for whole-house leakage
pub const PRESSURE_EXPONENT: f64 = 0.65;
/// ft/s2
const GRAVITY: f64 = 32.174;
/// Indoor temperature assumed when deriving stack coefficients, deg F
const ASSUMED_INSIDE_TEMPERATURE: f64 = 73.5;
/// Reference height for normalised leakage, ft (one storey)
const REFERENCE_STOREY_HEIGHT: f64 = 8.202;
/// Gas constant of air, Btu/(lbm.R)
const GAS_CONSTANT_AIR: f64 = 0.0685;
/// Reference pressure for ELA, inH2O (4 Pa)
const ELA_REFERENCE_PRESSURE: f64 = 0.016;
const BLOWER_DOOR_PRESSURE: f64 = 50.;
const ELA_REFERENCE_PRESSURE_PA: f64 = 4.;
/// Converts ACH50 on a volume in ft3 to leakage area in in2
const ACH50_FLOW_FACTOR: f64 = 0.283_316_478;
/// ELA flow coefficient unit scaling, (ft2 . sqrt(ft3/lbm)) to cfm
const ELA_FLOW_SCALE: f64 = 776.25;
const INCHES_OF_WATER_PER_LBM_PER_FT_S2: f64 = 0.005_974_5;
const INCHES_OF_WATER_PER_LBM_PER_FT3_MPH2: f64 = 0.012_852;
/// Scaling of m2/s2 into the (L/s)2/cm4 used by the ELA flow equation
const ELA_COEFFICIENT_SCALE: f64 = 0.01;

const FLUE_LEAKAGE_FRACTION: f64 = 0.2;
/// Height of the flue above the top of the building, ft
const FLUE_HEIGHT_ABOVE_BUILDING: f64 = 2.;
const DEFAULT_VENTED_ATTIC_SLA: f64 = 1. / 300.;
const DEFAULT_VENTED_CRAWLSPACE_ACH: f64 = 2.;
const DEFAULT_SEALED_ZONE_ACH: f64 = 0.1;
const DISTRIBUTION_TOLERANCE: f64 = 1e-9;

// w-factor correlation fitted to heating degree days (base 65F) and annual average wind speed
const W_FACTOR_COEFFICIENTS: [f64; 6] = [
    0.362_507_48,
    0.365_317_169,
    0.028_902_855,
    0.050_181_043,
    0.009_596_674,
    -0.041_567_541,
];

/// Wind-speed factor (WSF) for the site, from the weather summary
pub fn wind_speed_factor(weather: &WeatherSummary) -> anyhow::Result<f64> {
    if let Some(wsf) = weather.wind_speed_factor {
        return Ok(wsf);
    }
    let (Some(degree_days), Some(wind_speed)) = (
        weather.heating_degree_days,
        weather.annual_average_wind_speed,
    ) else {
        bail!("Weather summary must give either a wind speed factor, or heating degree days and an annual average wind speed");
    };

    let [a, b, c, d, e, f] = W_FACTOR_COEFFICIENTS;
    let h = degree_days / 10_000.;
    Ok(a + b * h + c * h.powi(2) + d * wind_speed + e * wind_speed.powi(2) + f * h * wind_speed)
}

/// Specific leakage area from a blower-door air change rate at 50 Pa
pub fn sla_from_ach50(ach50: f64, floor_area: f64, volume: f64) -> f64 {
    (ach50 * ACH50_FLOW_FACTOR * ELA_REFERENCE_PRESSURE_PA.powf(PRESSURE_EXPONENT) * volume)
        / (floor_area * 144. * BLOWER_DOOR_PRESSURE.powf(PRESSURE_EXPONENT) * 60.)
}

pub fn ach50_from_sla(sla: f64, floor_area: f64, volume: f64) -> f64 {
    (sla * floor_area * 144. * BLOWER_DOOR_PRESSURE.powf(PRESSURE_EXPONENT) * 60.)
        / (ACH50_FLOW_FACTOR * ELA_REFERENCE_PRESSURE_PA.powf(PRESSURE_EXPONENT) * volume)
}

/// Normalised leakage for a zone of the given height, ft
fn normalised_leakage(sla: f64, height: f64) -> f64 {
    1000. * sla * (height / REFERENCE_STOREY_HEIGHT).powf(0.4)
}

/// Annual average air change rate from specific leakage area
pub fn ach_from_sla(sla: f64, height: f64, wind_speed_factor: f64) -> f64 {
    normalised_leakage(sla, height) * wind_speed_factor
}

pub fn sla_from_ach(ach: f64, height: f64, wind_speed_factor: f64) -> f64 {
    ach / (wind_speed_factor * 1000. * (height / REFERENCE_STOREY_HEIGHT).powf(0.4))
}

/// Sherman-Grimsrud stack and wind coefficients
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShermanGrimsrudCoefficients {
    /// ft2/(s2.R)
    pub stack: f64,
    pub wind: f64,
}

impl ShermanGrimsrudCoefficients {
    /// Arguments:
    /// * `horizontal_leakage_fraction` - fraction of leakage in floor and ceiling
    /// * `neutral_level` - neutral pressure level as a fraction of the zone height
    /// * `stack_height` - height driving stack flow, ft
    /// * `wind_height` - height above grade at which wind acts, ft
    pub fn new(
        horizontal_leakage_fraction: f64,
        neutral_level: f64,
        stack_height: f64,
        wind_height: f64,
        wind: &WindEnvironment,
    ) -> Self {
        let f_s = 2. / 3.
            * (1. + horizontal_leakage_fraction / 2.)
            * (2. * neutral_level * (1. - neutral_level)).sqrt()
            / (neutral_level.sqrt() + (1. - neutral_level).sqrt());
        let f_w = wind.shielding_coefficient()
            * (1. - horizontal_leakage_fraction).cbrt()
            * wind.site_wind_speed_factor(wind_height);

        Self {
            stack: f_s.powi(2) * GRAVITY * stack_height / (ASSUMED_INSIDE_TEMPERATURE + RANKINE_OFFSET),
            wind: f_w.powi(2),
        }
    }

    /// Flow through an opening (m3/s)
    ///
    /// Arguments:
    /// * `area` - effective leakage or opening area, ft2
    /// * `delta_t` - indoor-outdoor temperature difference, K
    /// * `wind_speed` - station wind speed, m/s
    pub fn flow_rate(&self, area: f64, delta_t: f64, wind_speed: f64) -> f64 {
        let stack_si = self.stack * METRES_PER_FOOT.powi(2) / KELVIN_PER_RANKINE * ELA_COEFFICIENT_SCALE;
        let wind_si = self.wind * ELA_COEFFICIENT_SCALE;
        square_feet_to_square_centimetres(area) / 1000.
            * (stack_si * delta_t.abs() + wind_si * wind_speed.powi(2)).sqrt()
    }
}

/// AIM-2 coefficients for the living zone, IP units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aim2Coefficients {
    /// cfm/inH2O^n
    pub flow_coefficient: f64,
    /// (inH2O/R)^n
    pub stack_coefficient: f64,
    /// (inH2O/mph2)^n
    pub wind_coefficient: f64,
    pub flue_leakage_fraction: f64,
    /// Combined terrain and shelter factor applied to the station wind speed
    pub shelter_factor: f64,
}

impl Aim2Coefficients {
    fn new(
        effective_leakage_area: f64,
        distribution: LeakageDistribution,
        has_flue: bool,
        has_vented_crawlspace: bool,
        building: &Building,
        wind: &WindEnvironment,
        weather: &WeatherSummary,
    ) -> Self {
        let n = PRESSURE_EXPONENT;
        let outside_air_density = weather.local_pressure * BTU_PER_CUBIC_FOOT_PER_ATMOSPHERE
            / (GAS_CONSTANT_AIR * (weather.annual_average_drybulb + RANKINE_OFFSET)); // lbm/ft3

        let flow_coefficient = effective_leakage_area
            * (2. / outside_air_density).sqrt()
            * ELA_REFERENCE_PRESSURE.powf(0.5 - n)
            * ELA_FLOW_SCALE;

        let (y, flue_height, s_wflue) = if has_flue {
            (FLUE_LEAKAGE_FRACTION, building.building_height() + FLUE_HEIGHT_ABOVE_BUILDING, 1.)
        } else {
            (0., 0., 0.)
        };

        let infiltration_height = building.infiltration_height();
        let living_elevation = building.living().floor_elevation();

        // ceiling + floor, and ceiling - floor, leakage excluding the flue
        let r = (distribution.ceiling + distribution.floor) * (1. - y);
        let mut x = (distribution.ceiling - distribution.floor) * (1. - y);
        let z_f = flue_height / (infiltration_height + living_elevation);
        let flue_rise = (z_f - 1.).max(0.);

        // stack
        let m_o = (x + (2. * n + 1.) * y).powi(2) / (2. - r);
        let m_i = m_o.min(1.);
        let (x_c, f_i) = if has_flue {
            let x_c = r + 2. * (1. - r - y) / (n + 1.) - 2. * y * flue_rise.powf(n);
            let f_i = n
                * y
                * flue_rise.powf((3. * n - 1.) / 3.)
                * (1. - 3. * (x_c - x).powi(2) * r.powf(1. - n) / (2. * (z_f + 1.)));
            (x_c, f_i)
        } else {
            (r + 2. * (1. - r - y) / (n + 1.), 0.)
        };
        let f_s = ((1. + n * r) / (n + 1.)) * (0.5 - 0.5 * m_i.powf(1.2)).powf(n + 1.) + f_i;
        let stack_coefficient = f_s
            * (outside_air_density * GRAVITY * infiltration_height * INCHES_OF_WATER_PER_LBM_PER_FT_S2
                / (ASSUMED_INSIDE_TEMPERATURE + RANKINE_OFFSET))
                .powf(n);

        // wind
        let f_w = if has_vented_crawlspace {
            // neutral level at the ceiling beyond this difference
            x = x.min(1. - 2. * y);
            let r_x = 1. - r * (n / 2. + 0.2);
            let y_x = 1. - y / 4.;
            let x_s = (1. - r) / 5. - 1.5 * y;
            let x_x = 1. - ((x - x_s) / (2. - r)).powi(2).powf(0.75);
            0.19 * (2. - n) * x_x * r_x * y_x
        } else {
            let j = (x + r + 2. * y) / 2.;
            0.19 * (2. - n) * (1. - ((x + r) / 2.).powf(1.5 - y)) - y / 4. * (j - 2. * y * j.powi(4))
        };
        let wind_coefficient =
            f_w * (outside_air_density / 2. * INCHES_OF_WATER_PER_LBM_PER_FT3_MPH2).powf(n);

        debug!(x_c, f_s, f_w, "AIM-2 shape factors");

        let shelter_factor = wind.ashrae_wind_speed_factor(infiltration_height + living_elevation)
            * (wind.shelter_coefficient() * (1. - y) + s_wflue * 1.5 * y);

        Self {
            flow_coefficient,
            stack_coefficient,
            wind_coefficient,
            flue_leakage_fraction: y,
            shelter_factor,
        }
    }

    /// Living-zone infiltration (m3/s)
    ///
    /// Arguments:
    /// * `delta_t` - indoor-outdoor temperature difference, K
    /// * `wind_speed` - station wind speed, m/s
    pub fn flow_rate(&self, delta_t: f64, wind_speed: f64) -> f64 {
        let n = PRESSURE_EXPONENT;
        let c = self.flow_coefficient * CUBIC_METRES_PER_SECOND_PER_CFM
            / PASCALS_PER_INCH_OF_WATER.powf(n);
        let stack = self.stack_coefficient * (PASCALS_PER_INCH_OF_WATER / KELVIN_PER_RANKINE).powf(n);
        let wind = self.wind_coefficient
            * (PASCALS_PER_INCH_OF_WATER / METRES_PER_SECOND_PER_MPH.powi(2)).powf(n);

        let stack_flow = c * stack * delta_t.abs().powf(n);
        let wind_flow = c * wind * (self.shelter_factor * wind_speed).powf(2. * n);
        (stack_flow.powi(2) + wind_flow.powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InfiltrationMethod {
    Aim2(Aim2Coefficients),
    EffectiveLeakageArea(ShermanGrimsrudCoefficients),
    ConstantAch,
}

/// Build-time infiltration state of one zone
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneInfiltration {
    zone_type: ZoneType,
    method: InfiltrationMethod,
    sla: Option<f64>,
    ach: f64,
    volume: f64,
    effective_leakage_area: f64,
}

impl ZoneInfiltration {
    pub fn zone_type(&self) -> ZoneType {
        self.zone_type
    }

    pub fn method(&self) -> &InfiltrationMethod {
        &self.method
    }

    pub fn sla(&self) -> Option<f64> {
        self.sla
    }

    /// Annual average air change rate, 1/h
    pub fn ach(&self) -> f64 {
        self.ach
    }

    /// Annual average flow, cfm
    pub fn flow_cfm(&self) -> f64 {
        air_change_rate_to_cfm(self.ach, self.volume)
    }

    /// ft2
    pub fn effective_leakage_area(&self) -> f64 {
        self.effective_leakage_area
    }

    /// Infiltration this timestep (m3/s)
    ///
    /// Arguments:
    /// * `zone_temperature` - deg C
    /// * `outdoor_temperature` - deg C
    /// * `wind_speed` - station wind speed, m/s
    pub fn flow_rate(&self, zone_temperature: f64, outdoor_temperature: f64, wind_speed: f64) -> f64 {
        let delta_t = zone_temperature - outdoor_temperature;
        match &self.method {
            InfiltrationMethod::Aim2(coefficients) => coefficients.flow_rate(delta_t, wind_speed),
            InfiltrationMethod::EffectiveLeakageArea(coefficients) => {
                coefficients.flow_rate(self.effective_leakage_area, delta_t, wind_speed)
            }
            InfiltrationMethod::ConstantAch => cfm_to_m3_per_s(self.flow_cfm()),
        }
    }
}

/// Annual sizing values derived once at model build
#[derive(Clone, Debug, PartialEq)]
pub struct InfiltrationSummary {
    pub living_sla: f64,
    /// ft2
    pub living_ela: f64,
    pub living_ach: f64,
    pub living_ach50: f64,
    /// cfm
    pub living_flow: f64,
    /// (ach, cfm) per non-living zone
    pub zones: IndexMap<ZoneType, (f64, f64)>,
}

#[derive(Clone, Debug)]
pub struct InfiltrationModel {
    living: ZoneInfiltration,
    living_ach50: f64,
    zones: IndexMap<ZoneType, ZoneInfiltration>,
}

impl InfiltrationModel {
    pub fn new(
        input: &InfiltrationInput,
        building: &Building,
        wind: &WindEnvironment,
        weather: &WeatherSummary,
    ) -> anyhow::Result<Self> {
        let wsf = wind_speed_factor(weather)?;
        let living_zone = building.living();
        let floor_area = building.conditioned_floor_area();
        let volume = building.conditioned_volume();
        let infiltration_height = building.infiltration_height();
        let has_vented_crawlspace = building.has_zone(ZoneType::VentedCrawlspace);

        let distribution = input.leakage_distribution.unwrap_or(if has_vented_crawlspace {
            LeakageDistribution {
                ceiling: 0.15,
                walls: 0.35,
                floor: 0.50,
            }
        } else {
            LeakageDistribution {
                ceiling: 0.25,
                walls: 0.50,
                floor: 0.25,
            }
        });
        let total = distribution.ceiling + distribution.walls + distribution.floor;
        if (total - 1.).abs() > DISTRIBUTION_TOLERANCE {
            bail!(AirflowConfigError::InvalidLeakageDistribution {
                ceiling: distribution.ceiling,
                walls: distribution.walls,
                floor: distribution.floor,
            });
        }

        let (living, living_ach50) = match input.living_leakage {
            LivingLeakageInput::Ach50(ach50) => {
                let sla = sla_from_ach50(ach50, floor_area, volume);
                let ela = sla * floor_area;
                let coefficients = Aim2Coefficients::new(
                    ela,
                    distribution,
                    input.has_flue_or_chimney,
                    has_vented_crawlspace,
                    building,
                    wind,
                    weather,
                );
                let living = ZoneInfiltration {
                    zone_type: ZoneType::Living,
                    method: InfiltrationMethod::Aim2(coefficients),
                    sla: Some(sla),
                    ach: ach_from_sla(sla, infiltration_height, wsf),
                    volume,
                    effective_leakage_area: ela,
                };
                (living, ach50)
            }
            LivingLeakageInput::ConstantAch(ach) => {
                let sla = sla_from_ach(ach, infiltration_height, wsf);
                let living = ZoneInfiltration {
                    zone_type: ZoneType::Living,
                    method: InfiltrationMethod::ConstantAch,
                    sla: Some(sla),
                    ach,
                    volume,
                    effective_leakage_area: sla * floor_area,
                };
                (living, ach50_from_sla(sla, floor_area, volume))
            }
        };
        debug!(
            sla = living.sla,
            ela = living.effective_leakage_area,
            ach = living.ach,
            ach50 = living_ach50,
            "Living zone infiltration"
        );

        let zones = building
            .non_living_zones()
            .map(|zone| {
                let leakage = input
                    .zones
                    .get(&zone.zone_type())
                    .copied()
                    .unwrap_or_else(|| default_zone_leakage(zone.zone_type(), input.living_leakage));
                Ok((
                    zone.zone_type(),
                    zone_infiltration(zone, leakage, wind, wsf)?,
                ))
            })
            .collect::<anyhow::Result<IndexMap<_, _>>>()?;

        Ok(Self {
            living,
            living_ach50,
            zones,
        })
    }

    pub fn living(&self) -> &ZoneInfiltration {
        &self.living
    }

    pub fn non_living_zones(&self) -> impl Iterator<Item = &ZoneInfiltration> {
        self.zones.values()
    }

    pub fn summary(&self) -> InfiltrationSummary {
        InfiltrationSummary {
            living_sla: self.living.sla.unwrap_or_default(),
            living_ela: self.living.effective_leakage_area,
            living_ach: self.living.ach,
            living_ach50: self.living_ach50,
            living_flow: self.living.flow_cfm(),
            zones: self
                .zones
                .iter()
                .map(|(zone_type, zone)| (*zone_type, (zone.ach, zone.flow_cfm())))
                .collect(),
        }
    }
}

fn default_zone_leakage(zone_type: ZoneType, living: LivingLeakageInput) -> ZoneLeakageInput {
    match zone_type {
        ZoneType::Garage => match living {
            LivingLeakageInput::Ach50(ach50) => ZoneLeakageInput::Ach50(ach50),
            LivingLeakageInput::ConstantAch(ach) => ZoneLeakageInput::ConstantAch(ach),
        },
        ZoneType::VentedAttic => ZoneLeakageInput::Sla(DEFAULT_VENTED_ATTIC_SLA),
        ZoneType::VentedCrawlspace => ZoneLeakageInput::ConstantAch(DEFAULT_VENTED_CRAWLSPACE_ACH),
        ZoneType::Living
        | ZoneType::UnconditionedBasement
        | ZoneType::UnventedCrawlspace
        | ZoneType::UnventedAttic => ZoneLeakageInput::ConstantAch(DEFAULT_SEALED_ZONE_ACH),
    }
}

/// (horizontal leakage fraction, neutral level) for an ELA zone
fn leakage_shape(zone_type: ZoneType) -> (f64, f64) {
    if zone_type.is_attic() {
        // all leakage through the floor and roof
        (0.75, 1.0)
    } else {
        (0.4, 0.5)
    }
}

fn zone_infiltration(
    zone: &Zone,
    leakage: ZoneLeakageInput,
    wind: &WindEnvironment,
    wsf: f64,
) -> anyhow::Result<ZoneInfiltration> {
    let zone_type = zone.zone_type();
    let sla = match leakage {
        ZoneLeakageInput::ConstantAch(ach) => {
            return Ok(ZoneInfiltration {
                zone_type,
                method: InfiltrationMethod::ConstantAch,
                sla: None,
                ach,
                volume: zone.volume(),
                effective_leakage_area: 0.,
            });
        }
        ZoneLeakageInput::Sla(sla) => sla,
        ZoneLeakageInput::Ach50(ach50) => sla_from_ach50(ach50, zone.floor_area(), zone.volume()),
    };
    if sla < 0. {
        return Err(anyhow!("Zone '{zone_type}' has a negative leakage area ({sla})"));
    }

    let (horizontal_leakage_fraction, neutral_level) = leakage_shape(zone_type);
    let coefficients = ShermanGrimsrudCoefficients::new(
        horizontal_leakage_fraction,
        neutral_level,
        zone.height(),
        zone.height() + zone.floor_elevation(),
        wind,
    );
    let normalising_height = if zone_type == ZoneType::Garage {
        REFERENCE_STOREY_HEIGHT
    } else {
        zone.height()
    };

    Ok(ZoneInfiltration {
        zone_type,
        method: InfiltrationMethod::EffectiveLeakageArea(coefficients),
        sla: Some(sla),
        ach: ach_from_sla(sla, normalising_height, wsf),
        volume: zone.volume(),
        effective_leakage_area: sla * zone.floor_area(),
    })
}
