use crate::simulation_time::SimulationTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read};
use strum_macros::{Display, EnumIter};

pub fn ingest_for_processing(json: impl Read) -> Result<Input, anyhow::Error> {
    let reader = BufReader::new(json);
    let input: Input = serde_json::from_reader(reader)?;
    Ok(input)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Input {
    pub simulation_time: SimulationTime,
    pub weather_summary: WeatherSummary,
    #[serde(default)]
    pub solver_options: SolverOptions,
    pub dwelling_units: IndexMap<String, DwellingUnitInput>,
}

/// Annual weather statistics needed at model-build time
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherSummary {
    /// deg F
    pub annual_average_drybulb: f64,
    /// atm
    #[serde(default = "default_local_pressure")]
    pub local_pressure: f64,
    /// Wind-speed (shielding) factor; derived from the degree days and wind speed below if absent
    pub wind_speed_factor: Option<f64>,
    /// Heating degree days, base 65F
    pub heating_degree_days: Option<f64>,
    /// m/s
    pub annual_average_wind_speed: Option<f64>,
    #[serde(default)]
    pub january_first: DayOfWeek,
}

fn default_local_pressure() -> f64 {
    1.
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverOptions {
    /// Add the duct-induced outdoor-air imbalance to the unbalanced flow combined with infiltration
    #[serde(default)]
    pub include_duct_imbalance_in_infiltration: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DwellingUnitInput {
    pub building: BuildingInput,
    pub site: SiteInput,
    pub infiltration: InfiltrationInput,
    pub mechanical_ventilation: Option<MechanicalVentilationInput>,
    pub spot_ventilation: Option<SpotVentilationInput>,
    pub clothes_dryer: Option<ClothesDryerInput>,
    pub natural_ventilation: Option<NaturalVentilationInput>,
    pub whole_house_fan: Option<WholeHouseFanInput>,
    pub air_distribution: Option<AirDistributionInput>,
    #[serde(default)]
    pub ducts: Vec<DuctInput>,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoneType {
    Living,
    Garage,
    UnconditionedBasement,
    VentedCrawlspace,
    UnventedCrawlspace,
    VentedAttic,
    UnventedAttic,
}

impl ZoneType {
    pub fn is_attic(&self) -> bool {
        matches!(self, Self::VentedAttic | Self::UnventedAttic)
    }

    /// Unconditioned spaces with no deliberate connection to outdoors
    pub fn is_sealed(&self) -> bool {
        matches!(
            self,
            Self::UnventedAttic | Self::UnventedCrawlspace | Self::UnconditionedBasement
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneGeometryInput {
    /// ft
    pub height: f64,
    /// ft2
    pub floor_area: f64,
    /// ft3
    pub volume: f64,
    /// Elevation of the zone floor above grade, ft
    #[serde(default)]
    pub floor_elevation: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildingInput {
    pub zones: IndexMap<ZoneType, ZoneGeometryInput>,
    pub number_of_bedrooms: u32,
    #[serde(default = "default_number_of_bathrooms")]
    pub number_of_bathrooms: u32,
    /// ft2
    #[serde(default)]
    pub window_area: f64,
    /// Vertical distance between the lowest and highest above-grade leakage points, ft;
    /// defaults to the living zone height
    pub infiltration_height: Option<f64>,
}

fn default_number_of_bathrooms() -> u32 {
    1
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TerrainClass {
    Ocean,
    Plains,
    Rural,
    Suburban,
    City,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteInput {
    pub terrain: TerrainClass,
    /// Replaces the neighbour-distance lookup when given
    pub shelter_coefficient: Option<f64>,
    /// Distance to the nearest neighbouring building, ft; absent or zero means no neighbours
    pub neighbor_distance: Option<f64>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ZoneLeakageInput {
    Ach50(f64),
    Sla(f64),
    ConstantAch(f64),
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LivingLeakageInput {
    Ach50(f64),
    ConstantAch(f64),
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LeakageDistribution {
    pub ceiling: f64,
    pub walls: f64,
    pub floor: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfiltrationInput {
    pub living_leakage: LivingLeakageInput,
    #[serde(default)]
    pub has_flue_or_chimney: bool,
    /// Overrides the default distribution chosen from the foundation type
    pub leakage_distribution: Option<LeakageDistribution>,
    /// Leakage for non-living zones; zones not listed take their defaults
    #[serde(default)]
    pub zones: IndexMap<ZoneType, ZoneLeakageInput>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MechanicalVentilationType {
    Exhaust,
    Supply,
    Balanced,
    Hrv,
    Erv,
    Cfis,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEfficiencyInput {
    /// Rated efficiency, including fan heat
    Rated(f64),
    /// Adjusted (apparent) efficiency per CSA 439
    Adjusted(f64),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MechanicalVentilationInput {
    pub system_type: MechanicalVentilationType,
    /// cfm; for CFIS, the outdoor-air flow while the damper is open
    pub rated_flow: f64,
    /// W; for CFIS, the blower power while forced on for ventilation
    pub fan_power: f64,
    #[serde(default = "default_hours_in_operation")]
    pub hours_in_operation: f64,
    pub sensible_recovery_efficiency: Option<RecoveryEfficiencyInput>,
    pub total_recovery_efficiency: Option<RecoveryEfficiencyInput>,
    /// Fraction of the air handler rated flow delivered in ventilation-only mode
    #[serde(default = "default_cfis_airflow_fraction")]
    pub cfis_airflow_fraction: f64,
    /// Overrides the damper-open target otherwise derived from the hours in operation
    pub cfis_open_minutes_per_hour: Option<f64>,
}

fn default_hours_in_operation() -> f64 {
    24.
}

fn default_cfis_airflow_fraction() -> f64 {
    1.
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpotFanInput {
    pub quantity: Option<u32>,
    /// cfm per fan
    pub flow_rate: f64,
    pub hours_in_operation: Option<f64>,
    pub start_hour: Option<u32>,
    /// W per fan
    #[serde(default)]
    pub fan_power: f64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpotVentilationInput {
    pub range_hood: Option<SpotFanInput>,
    pub bath_fans: Option<SpotFanInput>,
    /// cfm
    #[serde(default)]
    pub dryer_exhaust_flow: f64,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClothesDryerInput {
    #[serde(default = "default_dryer_hours")]
    pub hours_in_operation: f64,
    #[serde(default = "default_dryer_start_hour")]
    pub start_hour: u32,
}

fn default_dryer_hours() -> f64 {
    1.
}

fn default_dryer_start_hour() -> u32 {
    11
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumIter, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayOfWeek {
    #[default]
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NaturalVentilationInput {
    #[serde(default = "default_fraction_windows_open")]
    pub fraction_windows_open: f64,
    #[serde(default = "default_fraction_window_area_openable")]
    pub fraction_window_area_openable: f64,
    /// Months (January first) in which windows may be opened for cooling
    #[serde(default = "default_cooling_season")]
    pub cooling_season: [bool; 12],
    #[serde(default = "default_weekdays_available")]
    pub weekdays_available: u32,
    #[serde(default)]
    pub weekend_days_available: u32,
    /// kg/kg
    #[serde(default = "default_max_outdoor_humidity_ratio")]
    pub max_outdoor_humidity_ratio: f64,
    /// 0-1
    #[serde(default = "default_max_outdoor_relative_humidity")]
    pub max_outdoor_relative_humidity: f64,
}

impl Default for NaturalVentilationInput {
    fn default() -> Self {
        Self {
            fraction_windows_open: default_fraction_windows_open(),
            fraction_window_area_openable: default_fraction_window_area_openable(),
            cooling_season: default_cooling_season(),
            weekdays_available: default_weekdays_available(),
            weekend_days_available: 0,
            max_outdoor_humidity_ratio: default_max_outdoor_humidity_ratio(),
            max_outdoor_relative_humidity: default_max_outdoor_relative_humidity(),
        }
    }
}

fn default_fraction_windows_open() -> f64 {
    0.33
}

fn default_fraction_window_area_openable() -> f64 {
    0.5
}

fn default_cooling_season() -> [bool; 12] {
    [true; 12]
}

fn default_weekdays_available() -> u32 {
    3
}

fn default_max_outdoor_humidity_ratio() -> f64 {
    0.0115
}

fn default_max_outdoor_relative_humidity() -> f64 {
    0.7
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WholeHouseFanInput {
    /// cfm
    pub rated_flow: f64,
    /// W
    pub fan_power: f64,
}

/// Ducted forced-air equipment
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AirDistributionInput {
    /// Maximum air handler flow, cfm
    pub rated_airflow: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuctSide {
    Supply,
    Return,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AmbientDuctLocation {
    OtherHousingUnit,
    OtherHeatedSpace,
    OtherMultifamilyBufferSpace,
    OtherNonFreezingSpace,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuctLocation {
    Zone(ZoneType),
    Ambient(AmbientDuctLocation),
    Outside,
}

impl std::fmt::Display for DuctLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuctLocation::Zone(zone_type) => write!(f, "{zone_type}"),
            DuctLocation::Ambient(location) => write!(f, "{location}"),
            DuctLocation::Outside => write!(f, "outside"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuctInput {
    pub side: DuctSide,
    pub location: DuctLocation,
    /// Fraction of air handler flow
    pub leakage_fraction: Option<f64>,
    /// cfm at 25 Pa
    pub leakage_cfm25: Option<f64>,
    /// Nominal insulation R-value, hr.ft2.F/Btu
    #[serde(default)]
    pub insulation_r_value: f64,
    /// ft2
    pub surface_area: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn input_json() -> &'static str {
        r#"{
            "SimulationTime": {"start": 0, "end": 24, "step": 0.25},
            "WeatherSummary": {"annual_average_drybulb": 51.4, "wind_speed_factor": 0.59},
            "DwellingUnits": {
                "unit 1": {
                    "Building": {
                        "zones": {
                            "living": {"height": 8, "floor_area": 2000, "volume": 16000},
                            "vented_attic": {"height": 4, "floor_area": 2000, "volume": 4000, "floor_elevation": 8}
                        },
                        "number_of_bedrooms": 3
                    },
                    "Site": {"terrain": "suburban"},
                    "Infiltration": {"living_leakage": {"ach50": 7.0}},
                    "MechanicalVentilation": {
                        "system_type": "erv",
                        "rated_flow": 60,
                        "fan_power": 60,
                        "sensible_recovery_efficiency": {"adjusted": 0.72},
                        "total_recovery_efficiency": {"rated": 0.48}
                    },
                    "AirDistribution": {"rated_airflow": 1200},
                    "Ducts": [
                        {"side": "supply", "location": {"zone": "vented_attic"}, "leakage_fraction": 0.1, "insulation_r_value": 8, "surface_area": 100},
                        {"side": "return", "location": {"ambient": "other_heated_space"}, "leakage_cfm25": 30, "surface_area": 50},
                        {"side": "return", "location": "outside", "leakage_fraction": 0.05, "surface_area": 10}
                    ]
                }
            }
        }"#
    }

    #[rstest]
    fn should_ingest_input(input_json: &str) {
        let input = ingest_for_processing(input_json.as_bytes()).unwrap();
        assert_eq!(input.weather_summary.local_pressure, 1.);
        assert!(!input.solver_options.include_duct_imbalance_in_infiltration);

        let unit = &input.dwelling_units["unit 1"];
        assert_eq!(
            unit.building.zones.keys().copied().collect::<Vec<_>>(),
            vec![ZoneType::Living, ZoneType::VentedAttic]
        );
        assert_eq!(unit.building.number_of_bathrooms, 1);
        assert_eq!(
            unit.infiltration.living_leakage,
            LivingLeakageInput::Ach50(7.0)
        );

        let mech_vent = unit.mechanical_ventilation.as_ref().unwrap();
        assert_eq!(mech_vent.system_type, MechanicalVentilationType::Erv);
        assert_eq!(mech_vent.hours_in_operation, 24.);
        assert_eq!(
            mech_vent.sensible_recovery_efficiency,
            Some(RecoveryEfficiencyInput::Adjusted(0.72))
        );

        let locations = unit.ducts.iter().map(|d| d.location).collect::<Vec<_>>();
        assert_eq!(
            locations,
            vec![
                DuctLocation::Zone(ZoneType::VentedAttic),
                DuctLocation::Ambient(AmbientDuctLocation::OtherHeatedSpace),
                DuctLocation::Outside,
            ]
        );
    }

    #[rstest]
    fn should_reject_unknown_fields(input_json: &str) {
        let bad = input_json.replace("\"number_of_bedrooms\"", "\"bedrooms\"");
        assert!(ingest_for_processing(bad.as_bytes()).is_err());
    }

    #[rstest]
    fn should_display_zone_types_in_snake_case() {
        assert_eq!(ZoneType::UnconditionedBasement.to_string(), "unconditioned_basement");
        assert!(ZoneType::UnventedCrawlspace.is_sealed());
        assert!(!ZoneType::VentedAttic.is_sealed());
    }
}
