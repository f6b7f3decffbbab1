use crate::core::psychrometrics::{relative_humidity, AirState};
use crate::core::schedule::Availability;
use crate::core::space_heat_demand::infiltration::ShermanGrimsrudCoefficients;
use crate::core::space_heat_demand::wind::WindEnvironment;
use crate::core::space_heat_demand::zone::Building;
use crate::core::units::{air_change_rate_to_cfm, cfm_to_m3_per_s};
use crate::input::{DayOfWeek, NaturalVentilationInput, WholeHouseFanInput, ZoneType};
use crate::simulation_time::SimulationTimeIteration;

/// Discharge coefficient applied to the operable window area
const WINDOW_DISCHARGE_FACTOR: f64 = 0.6;
/// Natural ventilation flow cap, air changes per hour of the living zone
const MAX_AIR_CHANGES_PER_HOUR: f64 = 20.;
const WINDOW_HORIZONTAL_LEAKAGE_FRACTION: f64 = 0.;
const WINDOW_NEUTRAL_LEVEL: f64 = 0.5;

/// Indoor and outdoor state needed to decide whether windows are opened this timestep
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowVentilationConditions {
    pub indoor: AirState,
    pub outdoor: AirState,
    /// Pa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
    /// deg C
    pub heating_setpoint: f64,
    /// deg C
    pub cooling_setpoint: f64,
}

impl WindowVentilationConditions {
    /// Natural ventilation setpoint, midway between the heating and cooling setpoints
    pub fn setpoint(&self) -> f64 {
        (self.heating_setpoint + self.cooling_setpoint) / 2.
    }
}

/// Flows (m3/s) and fan power (W) from opened windows or the whole-house fan
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WindowVentilationOutcome {
    pub natural_ventilation_flow: f64,
    pub whole_house_fan_flow: f64,
    pub whole_house_fan_power: f64,
    /// Living zone to attic flow when the whole-house fan exhausts into an attic
    pub attic_mixing_flow: f64,
    pub attic: Option<ZoneType>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct WholeHouseFan {
    /// m3/s
    flow: f64,
    /// W
    fan_power: f64,
}

/// Window opening and whole-house fan operation for cooling with outdoor air
#[derive(Clone, Debug, PartialEq)]
pub struct NaturalVentilationModel {
    /// ft2
    opening_area: f64,
    coefficients: ShermanGrimsrudCoefficients,
    /// m3/s
    max_flow: f64,
    availability: Availability,
    max_outdoor_humidity_ratio: f64,
    max_outdoor_relative_humidity: f64,
    whole_house_fan: Option<WholeHouseFan>,
    attic: Option<ZoneType>,
}

impl NaturalVentilationModel {
    /// Arguments:
    /// * `input` - window operation; defaults apply when only a whole-house fan is described
    /// * `whole_house_fan` - optional whole-house fan
    /// * `building` - zone geometry and window area
    /// * `wind` - site wind environment
    /// * `january_first` - day of the week of January 1st
    pub fn new(
        input: &NaturalVentilationInput,
        whole_house_fan: Option<&WholeHouseFanInput>,
        building: &Building,
        wind: &WindEnvironment,
        january_first: DayOfWeek,
    ) -> Self {
        let living = building.living();
        let opening_area = WINDOW_DISCHARGE_FACTOR
            * building.window_area()
            * input.fraction_windows_open
            * input.fraction_window_area_openable;
        let coefficients = ShermanGrimsrudCoefficients::new(
            WINDOW_HORIZONTAL_LEAKAGE_FRACTION,
            WINDOW_NEUTRAL_LEVEL,
            building.infiltration_height(),
            building.infiltration_height() + living.floor_elevation(),
            wind,
        );

        let whole_house_fan = whole_house_fan
            .filter(|fan| fan.rated_flow > 0.)
            .map(|fan| WholeHouseFan {
                flow: cfm_to_m3_per_s(fan.rated_flow),
                fan_power: fan.fan_power,
            });
        let attic = [ZoneType::VentedAttic, ZoneType::UnventedAttic]
            .into_iter()
            .find(|zone_type| building.has_zone(*zone_type));

        Self {
            opening_area,
            coefficients,
            max_flow: cfm_to_m3_per_s(air_change_rate_to_cfm(
                MAX_AIR_CHANGES_PER_HOUR,
                living.volume(),
            )),
            availability: Availability::new(
                input.weekdays_available,
                input.weekend_days_available,
                input.cooling_season,
                january_first,
            ),
            max_outdoor_humidity_ratio: input.max_outdoor_humidity_ratio,
            max_outdoor_relative_humidity: input.max_outdoor_relative_humidity,
            whole_house_fan,
            attic,
        }
    }

    /// Operable window opening, ft2
    pub fn opening_area(&self) -> f64 {
        self.opening_area
    }

    /// m3/s
    pub fn max_flow(&self) -> f64 {
        self.max_flow
    }

    fn windows_may_open(
        &self,
        simtime: &SimulationTimeIteration,
        conditions: &WindowVentilationConditions,
    ) -> bool {
        let outdoor = conditions.outdoor;
        let indoor_temperature = conditions.indoor.temperature;

        outdoor.humidity_ratio < self.max_outdoor_humidity_ratio
            && relative_humidity(outdoor.temperature, outdoor.humidity_ratio, conditions.pressure)
                < self.max_outdoor_relative_humidity
            && indoor_temperature > outdoor.temperature
            && indoor_temperature > conditions.setpoint()
            && self.availability.is_available(simtime)
    }

    pub fn calculate(
        &self,
        simtime: &SimulationTimeIteration,
        conditions: &WindowVentilationConditions,
    ) -> WindowVentilationOutcome {
        if !self.windows_may_open(simtime, conditions) {
            return WindowVentilationOutcome::default();
        }

        if let Some(fan) = self.whole_house_fan {
            return WindowVentilationOutcome {
                natural_ventilation_flow: 0.,
                whole_house_fan_flow: fan.flow,
                whole_house_fan_power: fan.fan_power,
                attic_mixing_flow: self.attic.map_or(0., |_| fan.flow),
                attic: self.attic,
            };
        }

        let indoor_temperature = conditions.indoor.temperature;
        let delta_t = indoor_temperature - conditions.outdoor.temperature;
        // scale down to nothing as the indoor temperature approaches the setpoint
        let adjustment =
            ((indoor_temperature - conditions.setpoint()) / delta_t).clamp(0., 1.);
        let flow =
            self.coefficients
                .flow_rate(self.opening_area, delta_t, conditions.wind_speed);

        WindowVentilationOutcome {
            natural_ventilation_flow: (adjustment * flow).min(self.max_flow),
            ..Default::default()
        }
    }
}
