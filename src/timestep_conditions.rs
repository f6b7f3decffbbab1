use crate::core::ductwork::AirHandlerConditions;
use crate::core::psychrometrics::AirState;
use crate::core::units::PASCALS_PER_ATMOSPHERE;
use crate::errors::MissingZoneConditionsError;
use crate::input::ZoneType;
use anyhow::{anyhow, bail, Context};
use csv::{ReaderBuilder as CsvReaderBuilder, StringRecord};
use formatx::formatx;
use indexmap::IndexMap;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use strum::IntoEnumIterator;

const COLUMN_OUTDOOR_TEMPERATURE: &str = "outdoor_temperature";
const COLUMN_OUTDOOR_HUMIDITY_RATIO: &str = "outdoor_humidity_ratio";
const COLUMN_PRESSURE: &str = "pressure"; // Pa
const COLUMN_WIND_SPEED: &str = "wind_speed"; // m/s at the weather station
const COLUMN_HEATING_SETPOINT: &str = "heating_setpoint";
const COLUMN_COOLING_SETPOINT: &str = "cooling_setpoint";
const COLUMN_AH_MASS_FLOW: &str = "ah_mass_flow"; // kg/s
const COLUMN_AH_OUTLET_TEMPERATURE: &str = "ah_outlet_temperature";
const COLUMN_AH_OUTLET_HUMIDITY_RATIO: &str = "ah_outlet_humidity_ratio";
const COLUMN_AH_FAN_RUNTIME_FRACTION: &str = "ah_fan_runtime_fraction";
const COLUMN_HVAC_RUNTIME_FRACTION: &str = "hvac_runtime_fraction";

/// Conditions reported by the host simulation for one timestep
#[derive(Clone, Debug, PartialEq)]
pub struct TimestepConditions {
    pub outdoor: AirState,
    /// Pa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
    pub zones: IndexMap<ZoneType, AirState>,
    /// deg C
    pub heating_setpoint: f64,
    /// deg C
    pub cooling_setpoint: f64,
    pub air_handler: AirHandlerConditions,
    /// Fraction of the timestep the heating or cooling equipment ran
    pub hvac_runtime_fraction: f64,
}

impl TimestepConditions {
    pub fn zone(&self, zone_type: ZoneType) -> Result<AirState, MissingZoneConditionsError> {
        self.zones
            .get(&zone_type)
            .copied()
            .ok_or(MissingZoneConditionsError(zone_type))
    }
}

/// Source of per-timestep conditions for each dwelling unit
pub trait ConditionsProvider: Debug + Sync {
    fn conditions_for(&self, unit_name: &str) -> anyhow::Result<Vec<TimestepConditions>>;
}

/// Conditions held in memory, keyed by dwelling unit name
impl ConditionsProvider for IndexMap<String, Vec<TimestepConditions>> {
    fn conditions_for(&self, unit_name: &str) -> anyhow::Result<Vec<TimestepConditions>> {
        self.get(unit_name)
            .cloned()
            .ok_or_else(|| anyhow!("No timestep conditions provided for dwelling unit '{unit_name}'"))
    }
}

/// One conditions CSV file per dwelling unit, named from a template such as `{}_conditions.csv`
#[derive(Debug)]
pub struct CsvDirectoryConditions {
    directory_path: PathBuf,
    file_template: String,
}

impl CsvDirectoryConditions {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }
}

impl ConditionsProvider for CsvDirectoryConditions {
    fn conditions_for(&self, unit_name: &str) -> anyhow::Result<Vec<TimestepConditions>> {
        let file_name = formatx!(&self.file_template, unit_name)
            .map_err(|err| anyhow!("Invalid conditions file template: {err:?}"))?;
        let path = self.directory_path.join(file_name);
        let file = File::open(&path)
            .with_context(|| format!("Could not open conditions file {}", path.display()))?;
        conditions_from_csv(BufReader::new(file))
            .with_context(|| format!("Could not read conditions file {}", path.display()))
    }
}

struct ColumnIndices {
    required: IndexMap<&'static str, usize>,
    optional: IndexMap<&'static str, usize>,
    zones: IndexMap<ZoneType, (usize, usize)>,
}

impl ColumnIndices {
    fn from_headers(headers: &StringRecord) -> anyhow::Result<Self> {
        let position = |name: &str| headers.iter().position(|header| header.trim() == name);

        let mut required = IndexMap::new();
        for name in [
            COLUMN_OUTDOOR_TEMPERATURE,
            COLUMN_OUTDOOR_HUMIDITY_RATIO,
            COLUMN_WIND_SPEED,
            COLUMN_HEATING_SETPOINT,
            COLUMN_COOLING_SETPOINT,
        ] {
            let index = position(name).ok_or_else(|| anyhow!("Missing column '{name}'"))?;
            required.insert(name, index);
        }

        let optional = [
            COLUMN_PRESSURE,
            COLUMN_AH_MASS_FLOW,
            COLUMN_AH_OUTLET_TEMPERATURE,
            COLUMN_AH_OUTLET_HUMIDITY_RATIO,
            COLUMN_AH_FAN_RUNTIME_FRACTION,
            COLUMN_HVAC_RUNTIME_FRACTION,
        ]
        .into_iter()
        .filter_map(|name| position(name).map(|index| (name, index)))
        .collect();

        let mut zones = IndexMap::new();
        for zone_type in ZoneType::iter() {
            let temperature = position(&format!("{zone_type}_temperature"));
            let humidity_ratio = position(&format!("{zone_type}_humidity_ratio"));
            match (temperature, humidity_ratio) {
                (Some(temperature), Some(humidity_ratio)) => {
                    zones.insert(zone_type, (temperature, humidity_ratio));
                }
                (None, None) => {}
                _ => bail!("Zone '{zone_type}' needs both temperature and humidity ratio columns"),
            }
        }

        Ok(Self {
            required,
            optional,
            zones,
        })
    }
}

fn parse_field(record: &StringRecord, index: usize, name: &str, row: usize) -> anyhow::Result<f64> {
    record
        .get(index)
        .ok_or_else(|| anyhow!("Row {row} has no value for '{name}'"))?
        .trim()
        .parse()
        .with_context(|| format!("Row {row} has an invalid value for '{name}'"))
}

/// Read per-timestep conditions from a headed CSV file, one row per timestep.
/// Temperatures are deg C; the pressure column is optional and defaults to one atmosphere;
/// air handler and HVAC runtime columns are optional and default to zero.
pub fn conditions_from_csv(file: impl Read) -> anyhow::Result<Vec<TimestepConditions>> {
    let mut reader = CsvReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let columns = ColumnIndices::from_headers(reader.headers()?)?;

    let mut conditions = vec![];
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let required = |name: &'static str| parse_field(&record, columns.required[name], name, row);
        let optional = |name: &'static str, default: f64| match columns.optional.get(name) {
            Some(&index) => parse_field(&record, index, name, row),
            None => Ok(default),
        };

        let zones = columns
            .zones
            .iter()
            .map(|(zone_type, &(temperature, humidity_ratio))| -> anyhow::Result<_> {
                Ok((
                    *zone_type,
                    AirState::new(
                        parse_field(&record, temperature, "zone temperature", row)?,
                        parse_field(&record, humidity_ratio, "zone humidity ratio", row)?,
                    ),
                ))
            })
            .collect::<anyhow::Result<IndexMap<_, _>>>()?;

        conditions.push(TimestepConditions {
            outdoor: AirState::new(
                required(COLUMN_OUTDOOR_TEMPERATURE)?,
                required(COLUMN_OUTDOOR_HUMIDITY_RATIO)?,
            ),
            pressure: optional(COLUMN_PRESSURE, PASCALS_PER_ATMOSPHERE)?,
            wind_speed: required(COLUMN_WIND_SPEED)?,
            zones,
            heating_setpoint: required(COLUMN_HEATING_SETPOINT)?,
            cooling_setpoint: required(COLUMN_COOLING_SETPOINT)?,
            air_handler: AirHandlerConditions {
                mass_flow: optional(COLUMN_AH_MASS_FLOW, 0.)?,
                outlet: AirState::new(
                    optional(COLUMN_AH_OUTLET_TEMPERATURE, 0.)?,
                    optional(COLUMN_AH_OUTLET_HUMIDITY_RATIO, 0.)?,
                ),
                fan_runtime_fraction: optional(COLUMN_AH_FAN_RUNTIME_FRACTION, 0.)?,
            },
            hvac_runtime_fraction: optional(COLUMN_HVAC_RUNTIME_FRACTION, 0.)?,
        });
    }

    Ok(conditions)
}
