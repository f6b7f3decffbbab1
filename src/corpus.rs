use crate::core::ductwork::{ambient_state, DuctLeakageModel, DuctLoads, DuctZoneConditions};
use crate::core::schedule::DailyOperatingWindow;
use crate::core::space_heat_demand::infiltration::{InfiltrationModel, InfiltrationSummary};
use crate::core::space_heat_demand::natural_ventilation::{
    NaturalVentilationModel, WindowVentilationConditions, WindowVentilationOutcome,
};
use crate::core::space_heat_demand::ventilation::{
    CfisOutcome, CfisState, MechanicalVentilation, RecoveryGains, SpotFan,
};
use crate::core::space_heat_demand::wind::WindEnvironment;
use crate::core::space_heat_demand::zone::Building;
use crate::errors::AirflowConfigError;
use crate::input::{
    DuctLocation, DwellingUnitInput, SolverOptions, SpotVentilationInput, WeatherSummary,
    ZoneType,
};
use crate::simulation_time::{SimulationTime, SimulationTimeIteration};
use crate::timestep_conditions::TimestepConditions;
use anyhow::bail;
use indexmap::IndexMap;
use tracing::{debug, warn};

const RANGE_HOOD_DEFAULT_START_HOUR: u32 = 16;
const BATH_FAN_DEFAULT_START_HOUR: u32 = 7;
const SPOT_FAN_DEFAULT_HOURS: f64 = 1.;

/// Outdoor-air flows leaving and entering the living zone this timestep, m3/s
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowBalance {
    pub fan_exhaust: f64,
    pub fan_supply: f64,
    pub duct_exhaust: f64,
    pub duct_supply: f64,
    /// Flow passed through a heat-recovery core, counted in both fan totals
    pub balanced_flow: f64,
}

/// Whole-house flows after combining the unbalanced fan and duct flow with
/// stack/wind-driven infiltration, m3/s
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CombinedFlows {
    pub mechanical_ventilation: f64,
    pub duct_imbalance: f64,
    pub infiltration: f64,
}

impl FlowBalance {
    fn unbalanced(exhaust: f64, supply: f64) -> f64 {
        (exhaust - supply).abs()
    }

    /// Combine with the natural infiltration flow by root-sum-square.
    /// Only the unbalanced part of the fan flow adds to infiltration.
    pub fn combine(&self, natural_infiltration: f64) -> CombinedFlows {
        let exhaust = self.fan_exhaust + self.duct_exhaust;
        let supply = self.fan_supply + self.duct_supply;
        let unbalanced = Self::unbalanced(exhaust, supply);
        let fan_unbalanced = Self::unbalanced(self.fan_exhaust, self.fan_supply).min(unbalanced);
        let fan_balanced = self.fan_exhaust.min(self.fan_supply);

        let total = unbalanced.hypot(natural_infiltration);

        CombinedFlows {
            mechanical_ventilation: fan_unbalanced + (fan_balanced - self.balanced_flow).max(0.),
            duct_imbalance: unbalanced - fan_unbalanced,
            infiltration: (total - unbalanced).max(0.),
        }
    }
}

/// Everything reported to the host simulation for one timestep.
/// Flows are m3/s, loads and powers W.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AirflowResults {
    /// Stack/wind-driven living zone infiltration before combination with fan flows
    pub natural_infiltration: f64,
    pub living_infiltration: f64,
    pub zone_infiltration: IndexMap<ZoneType, f64>,
    pub mechanical_ventilation_flow: f64,
    pub duct_imbalance_flow: f64,
    pub balanced_flow: f64,
    pub recovery_gains: RecoveryGains,
    pub mechanical_fan_power: f64,
    pub range_hood_flow: f64,
    pub bath_fan_flow: f64,
    pub dryer_exhaust_flow: f64,
    pub spot_fan_power: f64,
    pub window_ventilation: WindowVentilationOutcome,
    pub duct_loads: IndexMap<DuctLocation, DuctLoads>,
    pub cfis: Option<CfisOutcome>,
}

/// Airflow model of one dwelling unit, built once and then stepped through the simulation
#[derive(Debug)]
pub struct Corpus {
    simulation_time: SimulationTime,
    options: SolverOptions,
    infiltration: InfiltrationModel,
    mechanical_ventilation: Option<MechanicalVentilation>,
    cfis_state: CfisState,
    range_hood: Option<SpotFan>,
    bath_fans: Option<SpotFan>,
    dryer_exhaust: Option<SpotFan>,
    window_ventilation: Option<NaturalVentilationModel>,
    ducts: Option<DuctLeakageModel>,
    warnings: Vec<String>,
}

impl Corpus {
    pub fn from_inputs(
        input: &DwellingUnitInput,
        weather: &WeatherSummary,
        simulation_time: SimulationTime,
        options: SolverOptions,
    ) -> anyhow::Result<Self> {
        let mut warnings: Vec<String> = Default::default();
        let mut warn_about = |message: String| {
            warn!("{message}");
            warnings.push(message);
        };

        let building = Building::new(&input.building)?;
        let wind = WindEnvironment::new(&input.site, building.building_height());
        let infiltration =
            InfiltrationModel::new(&input.infiltration, &building, &wind, weather)?;

        let mechanical_ventilation = input
            .mechanical_ventilation
            .as_ref()
            .map(|mech_vent| {
                MechanicalVentilation::new(mech_vent, input.air_distribution.as_ref())
            })
            .transpose()?;

        let spot_ventilation = input.spot_ventilation.unwrap_or_default();
        let (range_hood, bath_fans) =
            spot_fans_from_input(&spot_ventilation, building.number_of_bathrooms());
        let dryer_exhaust = match (spot_ventilation.dryer_exhaust_flow > 0., input.clothes_dryer) {
            (false, _) => None,
            (true, Some(dryer)) => Some(SpotFan::with_window(
                spot_ventilation.dryer_exhaust_flow,
                DailyOperatingWindow::new(dryer.start_hour, dryer.hours_in_operation),
            )),
            (true, None) => {
                warn_about(
                    "Dryer exhaust flow given without a clothes dryer; the exhaust is ignored."
                        .to_string(),
                );
                None
            }
        };

        let window_ventilation = match (&input.natural_ventilation, &input.whole_house_fan) {
            (None, None) => None,
            (natural_ventilation, whole_house_fan) => Some(NaturalVentilationModel::new(
                &natural_ventilation.clone().unwrap_or_default(),
                whole_house_fan.as_ref(),
                &building,
                &wind,
                weather.january_first,
            )),
        };

        let ducts = match (&input.air_distribution, input.ducts.is_empty()) {
            (Some(air_distribution), false) => {
                let model = DuctLeakageModel::new(&input.ducts, air_distribution)?;
                for location in model.locations() {
                    if let DuctLocation::Zone(zone_type) = location {
                        if !building.has_zone(zone_type) {
                            bail!(AirflowConfigError::DuctZoneNotInBuilding(zone_type));
                        }
                    }
                }
                Some(model)
            }
            (Some(_), true) => {
                warn_about(
                    "Ducted air distribution given without any ducts; no duct losses are calculated."
                        .to_string(),
                );
                None
            }
            (None, false) => {
                warn_about(
                    "Ducts given without ducted air distribution; the ducts are ignored."
                        .to_string(),
                );
                None
            }
            (None, true) => None,
        };

        debug!(
            "Built airflow model: {} zones, mechanical ventilation {:?}, {} duct locations",
            building.non_living_zones().count() + 1,
            mechanical_ventilation
                .as_ref()
                .map(MechanicalVentilation::system_type),
            ducts.as_ref().map_or(0, |ducts| ducts.locations().count()),
        );

        Ok(Self {
            simulation_time,
            options,
            infiltration,
            mechanical_ventilation,
            cfis_state: Default::default(),
            range_hood,
            bath_fans,
            dryer_exhaust,
            window_ventilation,
            ducts,
            warnings,
        })
    }

    pub fn simulation_time(&self) -> SimulationTime {
        self.simulation_time
    }

    pub fn infiltration_summary(&self) -> InfiltrationSummary {
        self.infiltration.summary()
    }

    /// Non-fatal configuration problems found while building the model
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn cfis_state(&self) -> &CfisState {
        &self.cfis_state
    }

    /// Solve one timestep. Components are evaluated in a fixed order: infiltration,
    /// mechanical ventilation (CFIS control), ducts, windows and whole-house fan, then
    /// the flow combination.
    pub fn run_for_timestep(
        &mut self,
        simtime: &SimulationTimeIteration,
        conditions: &TimestepConditions,
    ) -> anyhow::Result<AirflowResults> {
        let living = conditions.zone(ZoneType::Living)?;
        let outdoor = conditions.outdoor;

        let natural_infiltration = self.infiltration.living().flow_rate(
            living.temperature,
            outdoor.temperature,
            conditions.wind_speed,
        );
        let zone_infiltration = self
            .infiltration
            .non_living_zones()
            .map(|zone| -> anyhow::Result<_> {
                let state = conditions.zone(zone.zone_type())?;
                Ok((
                    zone.zone_type(),
                    zone.flow_rate(state.temperature, outdoor.temperature, conditions.wind_speed),
                ))
            })
            .collect::<anyhow::Result<IndexMap<_, _>>>()?;

        let cfis = self
            .mechanical_ventilation
            .as_ref()
            .and_then(MechanicalVentilation::cfis)
            .map(|cfis| {
                (
                    cfis,
                    cfis.control(&mut self.cfis_state, simtime, conditions.hvac_runtime_fraction),
                )
            });

        let mut flows = FlowBalance::default();
        let mut mechanical_fan_power = 0.;
        let mut recovery_gains = RecoveryGains::default();
        if let Some(mech_vent) = &self.mechanical_ventilation {
            let (whole_house_flow, fan_power) = match &cfis {
                Some((_, outcome)) => (outcome.flow, outcome.forced_fan_power),
                None => (mech_vent.flow(), mech_vent.fan_power()),
            };
            if mech_vent.adds_exhaust() {
                flows.fan_exhaust += whole_house_flow;
            }
            if mech_vent.adds_supply() {
                flows.fan_supply += whole_house_flow;
            }
            flows.balanced_flow = mech_vent.balanced_flow();
            mechanical_fan_power = fan_power;
            recovery_gains = mech_vent.recovery_gains(outdoor, living, conditions.pressure);
        }

        let spot_flow = |fan: &Option<SpotFan>| fan.map_or(0., |fan| fan.flow_rate(simtime));
        let range_hood_flow = spot_flow(&self.range_hood);
        let bath_fan_flow = spot_flow(&self.bath_fans);
        let dryer_exhaust_flow = spot_flow(&self.dryer_exhaust);
        flows.fan_exhaust += range_hood_flow + bath_fan_flow + dryer_exhaust_flow;
        let spot_fan_power = [self.range_hood, self.bath_fans]
            .iter()
            .flatten()
            .map(|fan| fan.fan_power(simtime))
            .sum::<f64>();

        let mut duct_loads = IndexMap::new();
        if let Some(ducts) = &self.ducts {
            for group in ducts.groups() {
                let duct_zone = match group.location() {
                    DuctLocation::Zone(zone_type) => conditions.zone(zone_type)?,
                    DuctLocation::Ambient(ambient) => ambient_state(ambient, living, outdoor),
                    DuctLocation::Outside => outdoor,
                };
                let zone_conditions = DuctZoneConditions {
                    air_handler: conditions.air_handler,
                    return_air: living,
                    duct_zone,
                };
                let loads = match &cfis {
                    Some((cfis, outcome)) if outcome.extra_open_fraction > 0. => ducts
                        .loads_with_cfis(
                            group,
                            &zone_conditions,
                            outcome.extra_open_fraction,
                            cfis.ventilation_mode_airflow(),
                        ),
                    _ => ducts.loads(group, &zone_conditions),
                };
                if self.options.include_duct_imbalance_in_infiltration {
                    flows.duct_exhaust += loads.ducts_out;
                    flows.duct_supply += loads.ducts_in;
                }
                duct_loads.insert(group.location(), loads);
            }
        }

        let window_ventilation = self
            .window_ventilation
            .as_ref()
            .map(|model| {
                model.calculate(
                    simtime,
                    &WindowVentilationConditions {
                        indoor: living,
                        outdoor,
                        pressure: conditions.pressure,
                        wind_speed: conditions.wind_speed,
                        heating_setpoint: conditions.heating_setpoint,
                        cooling_setpoint: conditions.cooling_setpoint,
                    },
                )
            })
            .unwrap_or_default();

        let combined = flows.combine(natural_infiltration);

        Ok(AirflowResults {
            natural_infiltration,
            living_infiltration: combined.infiltration,
            zone_infiltration,
            mechanical_ventilation_flow: combined.mechanical_ventilation,
            duct_imbalance_flow: combined.duct_imbalance,
            balanced_flow: flows.balanced_flow,
            recovery_gains,
            mechanical_fan_power,
            range_hood_flow,
            bath_fan_flow,
            dryer_exhaust_flow,
            spot_fan_power,
            window_ventilation,
            duct_loads,
            cfis: cfis.map(|(_, outcome)| outcome),
        })
    }

    /// Solve every timestep of the simulation, one row of conditions per timestep
    pub fn run(&mut self, conditions: &[TimestepConditions]) -> anyhow::Result<Vec<AirflowResults>> {
        let total_steps = self.simulation_time.total_steps();
        if conditions.len() < total_steps {
            bail!(
                "Timestep conditions cover {} of {} timesteps",
                conditions.len(),
                total_steps
            );
        }

        self.cfis_state = CfisState::default();
        self.simulation_time
            .iter()
            .zip(conditions)
            .map(|(simtime, conditions)| self.run_for_timestep(&simtime, conditions))
            .collect()
    }
}

fn spot_fans_from_input(
    input: &SpotVentilationInput,
    number_of_bathrooms: u32,
) -> (Option<SpotFan>, Option<SpotFan>) {
    let range_hood = input.range_hood.as_ref().map(|fan| {
        SpotFan::new(
            fan,
            1,
            RANGE_HOOD_DEFAULT_START_HOUR,
            SPOT_FAN_DEFAULT_HOURS,
        )
    });
    let bath_fans = input.bath_fans.as_ref().map(|fan| {
        SpotFan::new(
            fan,
            number_of_bathrooms,
            BATH_FAN_DEFAULT_START_HOUR,
            SPOT_FAN_DEFAULT_HOURS,
        )
    });
    (range_hood, bath_fans)
}
