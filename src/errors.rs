use crate::input::ZoneType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AirflowError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Configuration error identified while building airflow model for unit '{unit}': {error}")]
    InvalidConfiguration {
        unit: String,
        #[source]
        error: anyhow::Error,
    },
    #[error("Error identified during airflow calculation for unit '{unit}': {error}")]
    FailureInCalculation {
        unit: String,
        #[source]
        error: anyhow::Error,
    },
    #[error("Error writing output: {0}")]
    ErrorInOutput(OutputError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct OutputError {
    error: anyhow::Error,
}

impl OutputError {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

/// Fatal configuration errors, raised while the model is being built and before any timestep runs.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AirflowConfigError {
    #[error("Invalid air leakage distribution specified ({ceiling}, {walls}, {floor}); does not add up to 1.")]
    InvalidLeakageDistribution { ceiling: f64, walls: f64, floor: f64 },
    #[error("Duct specifies both a leakage fraction and a leakage flow at 25 Pa; only one may be given.")]
    DuctLeakageBothSpecified,
    #[error("Duct specifies neither a leakage fraction nor a leakage flow at 25 Pa.")]
    DuctLeakageNotSpecified,
    #[error("Duct {property} must not be negative (got {value}).")]
    NegativeDuctProperty { property: &'static str, value: f64 },
    #[error("Duct leakage fraction must be between 0 and 1 (got {0}).")]
    DuctLeakageFractionOutOfRange(f64),
    #[error("A CFIS ventilation system was specified but there is no ducted forced-air equipment.")]
    CfisWithoutDuctedSystem,
    #[error("CFIS ventilation-mode airflow fraction must be between 0 and 1 (got {0}).")]
    CfisAirflowFractionOutOfRange(f64),
    #[error("The calculated ERV/HRV sensible effectiveness is {0} but should be between 0 and 1. Please revise ERV/HRV efficiency values.")]
    SensibleEffectivenessOutOfRange(f64),
    #[error("The calculated ERV/HRV latent effectiveness is {0} but should be between 0 and 1. Please revise ERV/HRV efficiency values.")]
    LatentEffectivenessOutOfRange(f64),
    #[error("The building has no living zone.")]
    MissingLivingZone,
    #[error("Ducts are located in zone '{0}', which the building does not have.")]
    DuctZoneNotInBuilding(ZoneType),
    #[error("Zone '{zone}' has a non-positive {property} ({value}).")]
    NonPositiveZoneGeometry {
        zone: ZoneType,
        property: &'static str,
        value: f64,
    },
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("No conditions were provided for zone '{0}' this timestep.")]
pub struct MissingZoneConditionsError(pub ZoneType);
