// This module provides objects to represent whole-house mechanical ventilation, including
// heat/energy recovery and central-fan-integrated supply (CFIS), and local exhaust fans.
// The recovery effectiveness derivation follows the CSA 439 test conditions.

use crate::core::psychrometrics::{
    dry_air_density, enthalpy, humidity_ratio_from_enthalpy, specific_heat, AirState, AIR,
};
use crate::core::schedule::DailyOperatingWindow;
use crate::core::units::{cfm_to_m3_per_s, HOURS_PER_DAY, MINUTES_PER_HOUR, PASCALS_PER_ATMOSPHERE};
use crate::errors::AirflowConfigError;
use crate::input::{
    AirDistributionInput, MechanicalVentilationInput, MechanicalVentilationType,
    RecoveryEfficiencyInput, SpotFanInput,
};
use crate::simulation_time::SimulationTimeIteration;
use anyhow::bail;
use tracing::debug;

// CSA 439 heating (sensible) test point
const SENSIBLE_TEST_SUPPLY_INLET: AirState = AirState {
    temperature: 0.,
    humidity_ratio: 0.0028,
};
const SENSIBLE_TEST_EXHAUST_INLET_TEMPERATURE: f64 = 22.;
// Cooling test point, used for the total (latent) rating
const LATENT_TEST_SUPPLY_INLET: AirState = AirState {
    temperature: 35.,
    humidity_ratio: 0.0178,
};
const LATENT_TEST_EXHAUST_INLET: AirState = AirState {
    temperature: 24.,
    humidity_ratio: 0.0092,
};

/// Heat-exchanger effectiveness of an HRV/ERV core, excluding fan heat
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RecoveryEffectiveness {
    sensible: f64,
    latent: f64,
}

impl RecoveryEffectiveness {
    /// Back out core effectiveness from rated or adjusted efficiencies
    ///
    /// Arguments:
    /// * `rated_flow` - cfm
    /// * `fan_power` - W
    /// * `sensible_efficiency` - sensible recovery efficiency (rated) or adjusted sensible recovery efficiency
    /// * `total_efficiency` - total recovery efficiency (rated) or adjusted total recovery efficiency;
    ///   ignored unless the core recovers moisture
    pub fn from_ratings(
        rated_flow: f64,
        fan_power: f64,
        sensible_efficiency: Option<RecoveryEfficiencyInput>,
        total_efficiency: Option<RecoveryEfficiencyInput>,
        recovers_moisture: bool,
    ) -> anyhow::Result<Self> {
        let Some(sensible_efficiency) = sensible_efficiency else {
            return Ok(Self::default());
        };
        let cp_a = AIR.specific_heat_capacity();

        let t_sup_in = SENSIBLE_TEST_SUPPLY_INLET.temperature;
        let t_exh_in = SENSIBLE_TEST_EXHAUST_INLET_TEMPERATURE;
        let m_fan = test_mass_flow(rated_flow, SENSIBLE_TEST_SUPPLY_INLET);

        let apparent_sensible = match sensible_efficiency {
            RecoveryEfficiencyInput::Adjusted(adjusted) => adjusted,
            RecoveryEfficiencyInput::Rated(rated) => {
                let t_sup_out = t_sup_in
                    + (rated * (m_fan * cp_a * (t_exh_in - t_sup_in) + fan_power) + fan_power)
                        / (m_fan * cp_a);
                (t_sup_out - t_sup_in) / (t_exh_in - t_sup_in)
            }
        };
        let t_sup_out = t_sup_in + apparent_sensible * (t_exh_in - t_sup_in);
        // remove the fan heat to get the performance of the core alone
        let t_sup_out_gross = t_sup_out - fan_power / (m_fan * cp_a);
        let sensible = (t_sup_out_gross - t_sup_in) / (t_exh_in - t_sup_in);
        if !(0. ..=1.).contains(&sensible) {
            bail!(AirflowConfigError::SensibleEffectivenessOutOfRange(sensible));
        }

        let latent = match (recovers_moisture, total_efficiency) {
            (true, Some(total_efficiency)) => {
                let supply_in = LATENT_TEST_SUPPLY_INLET;
                let exhaust_in = LATENT_TEST_EXHAUST_INLET;
                let m_fan = test_mass_flow(rated_flow, supply_in);

                let t_sup_out_gross = supply_in.temperature
                    - sensible * (supply_in.temperature - exhaust_in.temperature);
                let t_sup_out = t_sup_out_gross + fan_power / (m_fan * cp_a);

                let h_sup_in = supply_in.enthalpy();
                let h_exh_in = exhaust_in.enthalpy();
                let h_sup_out = match total_efficiency {
                    RecoveryEfficiencyInput::Adjusted(adjusted) => {
                        h_sup_in - adjusted * (h_sup_in - h_exh_in)
                    }
                    RecoveryEfficiencyInput::Rated(rated) => {
                        h_sup_in
                            - (rated * (m_fan * (h_sup_in - h_exh_in) + fan_power) + fan_power)
                                / m_fan
                    }
                };
                let w_sup_out = humidity_ratio_from_enthalpy(t_sup_out, h_sup_out);
                let latent = ((w_sup_out - supply_in.humidity_ratio)
                    / (exhaust_in.humidity_ratio - supply_in.humidity_ratio))
                    .max(0.);
                if latent > 1. {
                    bail!(AirflowConfigError::LatentEffectivenessOutOfRange(latent));
                }
                latent
            }
            _ => 0.,
        };

        debug!(apparent_sensible, sensible, latent, "Recovery effectiveness");
        Ok(Self { sensible, latent })
    }

    pub fn sensible(&self) -> f64 {
        self.sensible
    }

    pub fn latent(&self) -> f64 {
        self.latent
    }

    /// State of the supply air leaving the core for balanced supply and exhaust flows
    pub fn supply_outlet(&self, outdoor: AirState, indoor: AirState) -> AirState {
        let cp_supply = specific_heat(outdoor.humidity_ratio);
        let cp_exhaust = specific_heat(indoor.humidity_ratio);
        let capacity_ratio = cp_supply.min(cp_exhaust) / cp_supply;

        AirState::new(
            outdoor.temperature
                + capacity_ratio * self.sensible * (indoor.temperature - outdoor.temperature),
            outdoor.humidity_ratio
                + capacity_ratio * self.latent * (indoor.humidity_ratio - outdoor.humidity_ratio),
        )
    }
}

fn test_mass_flow(rated_flow: f64, supply_inlet: AirState) -> f64 {
    cfm_to_m3_per_s(rated_flow)
        * dry_air_density(
            supply_inlet.temperature,
            supply_inlet.humidity_ratio,
            PASCALS_PER_ATMOSPHERE,
        )
}

/// Loads delivered to the living zone by balanced ventilation air, W (positive heats the zone)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RecoveryGains {
    pub sensible: f64,
    pub latent: f64,
}

/// Damper state of a CFIS system carried between timesteps
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CfisState {
    hour: Option<u32>,
    step_index: Option<usize>,
    minutes_open_before_step: f64,
    minutes_open_this_hour: f64,
    extra_open_fraction: f64,
}

impl CfisState {
    pub fn minutes_open_this_hour(&self) -> f64 {
        self.minutes_open_this_hour
    }

    /// Fraction of the latest timestep for which the blower was forced on for ventilation
    pub fn extra_open_fraction(&self) -> f64 {
        self.extra_open_fraction
    }
}

/// Result of one CFIS control evaluation
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CfisOutcome {
    /// Fraction of the timestep the outdoor-air damper is open
    pub damper_open_fraction: f64,
    /// Fraction of the timestep the blower runs only because of ventilation
    pub extra_open_fraction: f64,
    pub minutes_open_this_hour: f64,
    /// Outdoor air delivered, m3/s averaged over the timestep
    pub flow: f64,
    /// W
    pub forced_fan_power: f64,
}

/// Central-fan-integrated supply: outdoor air drawn through the forced-air system's return
/// on a minimum duty cycle each hour
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cfis {
    target_minutes_per_hour: f64,
    /// m3/s while the damper is open
    open_flow: f64,
    /// W while the blower is forced on
    fan_power: f64,
    /// Air handler flow in ventilation-only mode, cfm
    ventilation_mode_airflow: f64,
}

impl Cfis {
    fn new(
        input: &MechanicalVentilationInput,
        air_distribution: Option<&AirDistributionInput>,
    ) -> anyhow::Result<Self> {
        let Some(air_distribution) = air_distribution else {
            bail!(AirflowConfigError::CfisWithoutDuctedSystem);
        };
        if !(0. ..=1.).contains(&input.cfis_airflow_fraction) {
            bail!(AirflowConfigError::CfisAirflowFractionOutOfRange(
                input.cfis_airflow_fraction
            ));
        }

        let target_minutes_per_hour = input
            .cfis_open_minutes_per_hour
            .unwrap_or(input.hours_in_operation * MINUTES_PER_HOUR as f64 / HOURS_PER_DAY as f64)
            .clamp(0., MINUTES_PER_HOUR as f64);

        Ok(Self {
            target_minutes_per_hour,
            open_flow: cfm_to_m3_per_s(input.rated_flow),
            fan_power: input.fan_power,
            ventilation_mode_airflow: input.cfis_airflow_fraction * air_distribution.rated_airflow,
        })
    }

    pub fn target_minutes_per_hour(&self) -> f64 {
        self.target_minutes_per_hour
    }

    /// Air handler flow while forced on for ventilation, cfm
    pub fn ventilation_mode_airflow(&self) -> f64 {
        self.ventilation_mode_airflow
    }

    /// Decide the damper position for this timestep and advance the hourly accumulator.
    /// Re-evaluating the same timestep replaces its previous contribution.
    ///
    /// Arguments:
    /// * `state` - accumulator owned by the dwelling unit
    /// * `simtime` - current timestep
    /// * `hvac_runtime_fraction` - runtime fraction of the controlling HVAC system this timestep
    pub fn control(
        &self,
        state: &mut CfisState,
        simtime: &SimulationTimeIteration,
        hvac_runtime_fraction: f64,
    ) -> CfisOutcome {
        let hour = simtime.current_hour();
        // stepping back to an earlier timestep starts the accumulator afresh
        if state.step_index.is_some_and(|index| simtime.index < index) {
            *state = CfisState::default();
        }
        if state.step_index == Some(simtime.index) {
            state.minutes_open_this_hour = state.minutes_open_before_step;
        } else {
            if state.hour != Some(hour) {
                state.hour = Some(hour);
                state.minutes_open_this_hour = 0.;
            }
            state.step_index = Some(simtime.index);
            state.minutes_open_before_step = state.minutes_open_this_hour;
        }

        let timestep_minutes = simtime.timestep_in_minutes();
        let hvac_runtime_fraction = hvac_runtime_fraction.clamp(0., 1.);

        if state.minutes_open_this_hour >= self.target_minutes_per_hour || timestep_minutes <= 0. {
            state.extra_open_fraction = 0.;
            return CfisOutcome {
                minutes_open_this_hour: state.minutes_open_this_hour,
                ..Default::default()
            };
        }

        let remaining = self.target_minutes_per_hour - state.minutes_open_this_hour;
        let minutes_after_step =
            (MINUTES_PER_HOUR as f64 - (simtime.minute_of_hour() + timestep_minutes)).max(0.);
        // whatever cannot fit into the rest of the hour must happen now
        let minimum_open = (remaining - minutes_after_step).max(0.);
        let riding_open = hvac_runtime_fraction * timestep_minutes;
        let open_minutes = riding_open
            .max(minimum_open)
            .min(remaining)
            .min(timestep_minutes);

        let damper_open_fraction = open_minutes / timestep_minutes;
        let extra_open_fraction = (damper_open_fraction - hvac_runtime_fraction).max(0.);
        state.minutes_open_this_hour += open_minutes;
        state.extra_open_fraction = extra_open_fraction;

        CfisOutcome {
            damper_open_fraction,
            extra_open_fraction,
            minutes_open_this_hour: state.minutes_open_this_hour,
            flow: damper_open_fraction * self.open_flow,
            forced_fan_power: extra_open_fraction * self.fan_power,
        }
    }
}

/// Whole-house mechanical ventilation system
#[derive(Clone, Debug, PartialEq)]
pub struct MechanicalVentilation {
    system_type: MechanicalVentilationType,
    /// Average flow over the day, m3/s
    flow: f64,
    /// Average fan power over the day, W
    fan_power: f64,
    effectiveness: RecoveryEffectiveness,
    cfis: Option<Cfis>,
}

impl MechanicalVentilation {
    pub fn new(
        input: &MechanicalVentilationInput,
        air_distribution: Option<&AirDistributionInput>,
    ) -> anyhow::Result<Self> {
        let operating_fraction =
            input.hours_in_operation.clamp(0., HOURS_PER_DAY as f64) / HOURS_PER_DAY as f64;

        let (effectiveness, cfis) = match input.system_type {
            MechanicalVentilationType::Hrv | MechanicalVentilationType::Erv => (
                RecoveryEffectiveness::from_ratings(
                    input.rated_flow,
                    input.fan_power,
                    input.sensible_recovery_efficiency,
                    input.total_recovery_efficiency,
                    input.system_type == MechanicalVentilationType::Erv,
                )?,
                None,
            ),
            MechanicalVentilationType::Cfis => (
                RecoveryEffectiveness::default(),
                Some(Cfis::new(input, air_distribution)?),
            ),
            MechanicalVentilationType::Exhaust
            | MechanicalVentilationType::Supply
            | MechanicalVentilationType::Balanced => (RecoveryEffectiveness::default(), None),
        };

        Ok(Self {
            system_type: input.system_type,
            flow: cfm_to_m3_per_s(input.rated_flow) * operating_fraction,
            fan_power: input.fan_power * operating_fraction,
            effectiveness,
            cfis,
        })
    }

    pub fn system_type(&self) -> MechanicalVentilationType {
        self.system_type
    }

    /// Flow of continuous systems, m3/s; CFIS flow comes from the damper control instead
    pub fn flow(&self) -> f64 {
        if self.cfis.is_some() {
            0.
        } else {
            self.flow
        }
    }

    /// Fan power of continuous systems, W
    pub fn fan_power(&self) -> f64 {
        if self.cfis.is_some() {
            0.
        } else {
            self.fan_power
        }
    }

    pub fn effectiveness(&self) -> &RecoveryEffectiveness {
        &self.effectiveness
    }

    pub fn cfis(&self) -> Option<&Cfis> {
        self.cfis.as_ref()
    }

    pub fn adds_exhaust(&self) -> bool {
        matches!(
            self.system_type,
            MechanicalVentilationType::Exhaust
                | MechanicalVentilationType::Balanced
                | MechanicalVentilationType::Hrv
                | MechanicalVentilationType::Erv
        )
    }

    pub fn adds_supply(&self) -> bool {
        !matches!(self.system_type, MechanicalVentilationType::Exhaust)
    }

    /// Balanced flow handled through the recovery core rather than as infiltration, m3/s
    pub fn balanced_flow(&self) -> f64 {
        match self.system_type {
            MechanicalVentilationType::Balanced
            | MechanicalVentilationType::Hrv
            | MechanicalVentilationType::Erv => self.flow,
            _ => 0.,
        }
    }

    /// Sensible and latent loads that balanced ventilation air brings into the living zone
    ///
    /// Arguments:
    /// * `outdoor` - outdoor air state
    /// * `indoor` - living zone air state
    /// * `pressure` - outdoor pressure, Pa
    pub fn recovery_gains(&self, outdoor: AirState, indoor: AirState, pressure: f64) -> RecoveryGains {
        let flow = self.balanced_flow();
        if flow <= 0. {
            return RecoveryGains::default();
        }

        let supply = self.effectiveness.supply_outlet(outdoor, indoor);
        let mass_flow = flow * dry_air_density(outdoor.temperature, outdoor.humidity_ratio, pressure);
        let sensible = mass_flow * supply.specific_heat() * (supply.temperature - indoor.temperature);
        let total = mass_flow * (supply.enthalpy() - enthalpy(indoor.temperature, indoor.humidity_ratio));

        RecoveryGains {
            sensible,
            latent: total - sensible,
        }
    }
}

/// A group of identical local exhaust fans (range hood, bath fans, dryer exhaust)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotFan {
    quantity: u32,
    /// m3/s per fan
    flow: f64,
    /// W per fan
    fan_power: f64,
    window: DailyOperatingWindow,
}

impl SpotFan {
    pub fn new(
        input: &SpotFanInput,
        default_quantity: u32,
        default_start_hour: u32,
        default_hours: f64,
    ) -> Self {
        Self {
            quantity: input.quantity.unwrap_or(default_quantity),
            flow: cfm_to_m3_per_s(input.flow_rate),
            fan_power: input.fan_power,
            window: DailyOperatingWindow::new(
                input.start_hour.unwrap_or(default_start_hour),
                input.hours_in_operation.unwrap_or(default_hours),
            ),
        }
    }

    /// An exhaust that runs with another appliance and has no fan power of its own
    pub fn with_window(flow_cfm: f64, window: DailyOperatingWindow) -> Self {
        Self {
            quantity: 1,
            flow: cfm_to_m3_per_s(flow_cfm),
            fan_power: 0.,
            window,
        }
    }

    /// Average exhaust flow over the timestep, m3/s
    pub fn flow_rate(&self, simtime: &SimulationTimeIteration) -> f64 {
        self.quantity as f64 * self.flow * self.window.fraction_running(simtime)
    }

    /// Average fan power over the timestep, W
    pub fn fan_power(&self, simtime: &SimulationTimeIteration) -> f64 {
        self.quantity as f64 * self.fan_power * self.window.fraction_running(simtime)
    }
}
