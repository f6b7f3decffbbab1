use crate::core::psychrometrics::{latent_heat_of_vaporisation, AirState, AIR};
use crate::core::units::{btu_per_hour_f_to_watts_per_k, cfm_to_m3_per_s, fahrenheit_to_celsius};
use crate::errors::AirflowConfigError;
use crate::input::{
    AirDistributionInput, AmbientDuctLocation, DuctInput, DuctLocation, DuctSide, ZoneType,
};
use anyhow::bail;
use indexmap::IndexMap;
use std::ops::Add;

// Effective R-value of uninsulated ducts, hr.ft2.F/Btu
const UNINSULATED_EFFECTIVE_R_VALUE: f64 = 1.7;

// Minimum temperatures of ambient duct locations, deg F
const OTHER_HEATED_SPACE_MIN_TEMPERATURE: f64 = 68.;
const MULTIFAMILY_BUFFER_MIN_TEMPERATURE: f64 = 50.;
const NON_FREEZING_MIN_TEMPERATURE: f64 = 40.;

/// A struct to represent the state of the forced-air system during a timestep
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AirHandlerConditions {
    /// kg/s, averaged over the timestep
    pub mass_flow: f64,
    /// Air leaving the air handler
    pub outlet: AirState,
    pub fan_runtime_fraction: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DuctLeakage {
    Fraction(f64),
    /// cfm at 25 Pa
    FlowAt25Pa(f64),
}

/// A struct to represent one duct segment, with leakage and insulation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Duct {
    side: DuctSide,
    location: DuctLocation,
    leakage: DuctLeakage,
    /// hr.ft2.F/Btu
    effective_r_value: f64,
    /// ft2
    surface_area: f64,
}

impl Duct {
    pub fn new(input: &DuctInput) -> anyhow::Result<Self> {
        let leakage = match (input.leakage_fraction, input.leakage_cfm25) {
            (Some(_), Some(_)) => bail!(AirflowConfigError::DuctLeakageBothSpecified),
            (None, None) => bail!(AirflowConfigError::DuctLeakageNotSpecified),
            (Some(fraction), None) => {
                if !(0. ..=1.).contains(&fraction) {
                    bail!(AirflowConfigError::DuctLeakageFractionOutOfRange(fraction));
                }
                DuctLeakage::Fraction(fraction)
            }
            (None, Some(cfm25)) => {
                if cfm25 < 0. {
                    bail!(AirflowConfigError::NegativeDuctProperty {
                        property: "leakage flow",
                        value: cfm25,
                    });
                }
                DuctLeakage::FlowAt25Pa(cfm25)
            }
        };
        for (property, value) in [
            ("R-value", input.insulation_r_value),
            ("surface area", input.surface_area),
        ] {
            if value < 0. {
                bail!(AirflowConfigError::NegativeDuctProperty { property, value });
            }
        }

        Ok(Self {
            side: input.side,
            location: input.location,
            leakage,
            effective_r_value: effective_r_value(input.side, input.insulation_r_value),
            surface_area: input.surface_area,
        })
    }

    /// Fraction of air handler flow lost through this duct
    fn leakage_fraction(&self, rated_airflow: f64) -> f64 {
        match self.leakage {
            DuctLeakage::Fraction(fraction) => fraction,
            DuctLeakage::FlowAt25Pa(cfm25) => {
                if rated_airflow <= 0. {
                    return 0.;
                }
                let leakage_mass_flow = cfm_to_m3_per_s(cfm25) * AIR.density();
                let rated_mass_flow = cfm_to_m3_per_s(rated_airflow) * AIR.density();
                (leakage_mass_flow / rated_mass_flow).min(1.)
            }
        }
    }

    /// Btu/(hr.F)
    fn ua(&self) -> f64 {
        self.surface_area / self.effective_r_value
    }
}

/// Effective R-value including air films, from the nominal insulation R-value
pub fn effective_r_value(side: DuctSide, nominal_r_value: f64) -> f64 {
    if nominal_r_value <= 0. {
        return UNINSULATED_EFFECTIVE_R_VALUE;
    }
    match side {
        DuctSide::Supply => 2.2438 + 0.5619 * nominal_r_value,
        DuctSide::Return => 2.0388 + 0.7053 * nominal_r_value,
    }
}

/// Air state of a fixed-temperature (ambient) duct location, from the indoor and outdoor air
pub fn ambient_state(location: AmbientDuctLocation, indoor: AirState, outdoor: AirState) -> AirState {
    let mean = AirState::new(
        (indoor.temperature + outdoor.temperature) / 2.,
        (indoor.humidity_ratio + outdoor.humidity_ratio) / 2.,
    );
    let with_minimum = |state: AirState, minimum_f: f64| {
        AirState::new(
            state.temperature.max(fahrenheit_to_celsius(minimum_f)),
            state.humidity_ratio,
        )
    };

    match location {
        AmbientDuctLocation::OtherHousingUnit => indoor,
        AmbientDuctLocation::OtherHeatedSpace => {
            with_minimum(mean, OTHER_HEATED_SPACE_MIN_TEMPERATURE)
        }
        AmbientDuctLocation::OtherMultifamilyBufferSpace => {
            with_minimum(mean, MULTIFAMILY_BUFFER_MIN_TEMPERATURE)
        }
        AmbientDuctLocation::OtherNonFreezingSpace => {
            with_minimum(outdoor, NON_FREEZING_MIN_TEMPERATURE)
        }
    }
}

/// Conduction and leakage loads for one duct location over a timestep.
/// Loads are heat gains in W (positive heats the named zone); flows are m3/s.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DuctLoads {
    pub supply_sensible_leakage_to_living: f64,
    pub supply_latent_leakage_to_living: f64,
    pub supply_conduction_to_living: f64,
    pub supply_conduction_to_duct_zone: f64,
    pub supply_sensible_leakage_to_duct_zone: f64,
    pub supply_latent_leakage_to_duct_zone: f64,
    pub return_conduction_to_return_plenum: f64,
    pub return_conduction_to_duct_zone: f64,
    pub return_sensible_leakage_to_return_plenum: f64,
    pub return_latent_leakage_to_return_plenum: f64,
    pub return_sensible_leakage_to_duct_zone: f64,
    pub return_latent_leakage_to_duct_zone: f64,
    /// Outdoor air drawn into the house by excess supply leakage
    pub ducts_out: f64,
    /// Outdoor air pushed into the house by excess return leakage
    pub ducts_in: f64,
    pub duct_zone_to_living: f64,
    pub living_to_duct_zone: f64,
}

impl DuctLoads {
    pub fn sensible_to_living(&self) -> f64 {
        self.supply_sensible_leakage_to_living + self.supply_conduction_to_living
    }

    pub fn latent_to_living(&self) -> f64 {
        self.supply_latent_leakage_to_living
    }

    pub fn sensible_to_return_plenum(&self) -> f64 {
        self.return_conduction_to_return_plenum + self.return_sensible_leakage_to_return_plenum
    }

    pub fn latent_to_return_plenum(&self) -> f64 {
        self.return_latent_leakage_to_return_plenum
    }

    pub fn sensible_to_duct_zone(&self) -> f64 {
        self.supply_conduction_to_duct_zone
            + self.supply_sensible_leakage_to_duct_zone
            + self.return_conduction_to_duct_zone
            + self.return_sensible_leakage_to_duct_zone
    }

    pub fn latent_to_duct_zone(&self) -> f64 {
        self.supply_latent_leakage_to_duct_zone + self.return_latent_leakage_to_duct_zone
    }
}

impl Add for DuctLoads {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            supply_sensible_leakage_to_living: self.supply_sensible_leakage_to_living
                + other.supply_sensible_leakage_to_living,
            supply_latent_leakage_to_living: self.supply_latent_leakage_to_living
                + other.supply_latent_leakage_to_living,
            supply_conduction_to_living: self.supply_conduction_to_living
                + other.supply_conduction_to_living,
            supply_conduction_to_duct_zone: self.supply_conduction_to_duct_zone
                + other.supply_conduction_to_duct_zone,
            supply_sensible_leakage_to_duct_zone: self.supply_sensible_leakage_to_duct_zone
                + other.supply_sensible_leakage_to_duct_zone,
            supply_latent_leakage_to_duct_zone: self.supply_latent_leakage_to_duct_zone
                + other.supply_latent_leakage_to_duct_zone,
            return_conduction_to_return_plenum: self.return_conduction_to_return_plenum
                + other.return_conduction_to_return_plenum,
            return_conduction_to_duct_zone: self.return_conduction_to_duct_zone
                + other.return_conduction_to_duct_zone,
            return_sensible_leakage_to_return_plenum: self.return_sensible_leakage_to_return_plenum
                + other.return_sensible_leakage_to_return_plenum,
            return_latent_leakage_to_return_plenum: self.return_latent_leakage_to_return_plenum
                + other.return_latent_leakage_to_return_plenum,
            return_sensible_leakage_to_duct_zone: self.return_sensible_leakage_to_duct_zone
                + other.return_sensible_leakage_to_duct_zone,
            return_latent_leakage_to_duct_zone: self.return_latent_leakage_to_duct_zone
                + other.return_latent_leakage_to_duct_zone,
            ducts_out: self.ducts_out + other.ducts_out,
            ducts_in: self.ducts_in + other.ducts_in,
            duct_zone_to_living: self.duct_zone_to_living + other.duct_zone_to_living,
            living_to_duct_zone: self.living_to_duct_zone + other.living_to_duct_zone,
        }
    }
}

/// Air states seen by the ducts at one location during a timestep
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DuctZoneConditions {
    pub air_handler: AirHandlerConditions,
    /// Living-zone air entering the return
    pub return_air: AirState,
    /// Air surrounding the ducts
    pub duct_zone: AirState,
}

/// Ducts sharing one location, aggregated
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DuctLocationGroup {
    location: DuctLocation,
    supply_leakage_fraction: f64,
    return_leakage_fraction: f64,
    /// W/K
    supply_ua: f64,
    /// W/K
    return_ua: f64,
}

impl DuctLocationGroup {
    pub fn location(&self) -> DuctLocation {
        self.location
    }

    pub fn supply_leakage_fraction(&self) -> f64 {
        self.supply_leakage_fraction
    }

    pub fn return_leakage_fraction(&self) -> f64 {
        self.return_leakage_fraction
    }

    /// Fraction of the duct-imbalance flow exchanged with outdoors rather than the duct zone
    fn outdoor_air_fraction(&self) -> f64 {
        match self.location {
            DuctLocation::Zone(zone_type) if zone_type.is_sealed() => 0.,
            _ => 1.,
        }
    }

    /// Loads at this location for one pass of air through the ducts
    ///
    /// Arguments:
    /// * `mass_flow` - air handler mass flow, kg/s
    /// * `runtime_fraction` - fraction of the timestep the blower runs
    /// * `supply` - air entering the supply ducts
    /// * `return_air` - air entering the return ducts
    /// * `duct_zone` - air surrounding the ducts
    fn loads_for_flow(
        &self,
        mass_flow: f64,
        runtime_fraction: f64,
        supply: AirState,
        return_air: AirState,
        duct_zone: AirState,
    ) -> DuctLoads {
        if mass_flow <= 0. {
            return DuctLoads::default();
        }
        let cp = AIR.specific_heat_capacity();
        let h_fg = latent_heat_of_vaporisation(supply.temperature);
        let f_sup = self.supply_leakage_fraction;
        let f_ret = self.return_leakage_fraction;
        let h_sa = supply.enthalpy();
        let h_ra = return_air.enthalpy();
        let h_dz = duct_zone.enthalpy();

        let supply_total_to_living = f_sup * mass_flow * (h_ra - h_sa);
        let supply_latent_to_living =
            f_sup * mass_flow * h_fg * (return_air.humidity_ratio - supply.humidity_ratio);

        // exponential approach of the duct air to the surrounding temperature
        let supply_decay = (-self.supply_ua * runtime_fraction / (mass_flow * cp)).exp();
        let t_supply_out =
            duct_zone.temperature + (supply.temperature - duct_zone.temperature) * supply_decay;
        let supply_conduction = mass_flow * cp * (t_supply_out - supply.temperature);

        let return_decay = (-self.return_ua * runtime_fraction / (mass_flow * cp)).exp();
        let t_return_out = duct_zone.temperature
            + (return_air.temperature - duct_zone.temperature) * return_decay;
        let return_conduction = mass_flow * cp * (t_return_out - return_air.temperature);

        let return_sensible =
            f_ret * mass_flow * cp * (duct_zone.temperature - return_air.temperature);
        let return_latent =
            f_ret * mass_flow * h_fg * (duct_zone.humidity_ratio - return_air.humidity_ratio);

        let supply_total_to_duct_zone = f_sup * mass_flow * (h_sa - h_dz);
        let supply_latent_to_duct_zone =
            f_sup * mass_flow * h_fg * (supply.humidity_ratio - duct_zone.humidity_ratio);

        let imbalance = (f_sup - f_ret) * mass_flow / AIR.density();
        let f_oa = self.outdoor_air_fraction();
        let (ducts_out, ducts_in, duct_zone_to_living, living_to_duct_zone) = if imbalance > 0. {
            (f_oa * imbalance, 0., (1. - f_oa) * imbalance, 0.)
        } else {
            (0., -f_oa * imbalance, 0., -(1. - f_oa) * imbalance)
        };

        DuctLoads {
            supply_sensible_leakage_to_living: supply_total_to_living - supply_latent_to_living,
            supply_latent_leakage_to_living: supply_latent_to_living,
            supply_conduction_to_living: supply_conduction,
            supply_conduction_to_duct_zone: -supply_conduction,
            supply_sensible_leakage_to_duct_zone: supply_total_to_duct_zone
                - supply_latent_to_duct_zone,
            supply_latent_leakage_to_duct_zone: supply_latent_to_duct_zone,
            return_conduction_to_return_plenum: return_conduction,
            return_conduction_to_duct_zone: -return_conduction,
            return_sensible_leakage_to_return_plenum: return_sensible,
            return_latent_leakage_to_return_plenum: return_latent,
            return_sensible_leakage_to_duct_zone: -return_sensible,
            return_latent_leakage_to_duct_zone: -return_latent,
            ducts_out,
            ducts_in,
            duct_zone_to_living,
            living_to_duct_zone,
        }
    }
}

/// Duct conduction and leakage for every duct location outside the living zone
#[derive(Clone, Debug, PartialEq)]
pub struct DuctLeakageModel {
    groups: IndexMap<DuctLocation, DuctLocationGroup>,
}

impl DuctLeakageModel {
    pub fn new(ducts: &[DuctInput], air_distribution: &AirDistributionInput) -> anyhow::Result<Self> {
        let mut groups: IndexMap<DuctLocation, DuctLocationGroup> = IndexMap::new();

        for input in ducts {
            let duct = Duct::new(input)?;
            if duct.location == DuctLocation::Zone(ZoneType::Living) {
                continue;
            }
            let group = groups.entry(duct.location).or_insert(DuctLocationGroup {
                location: duct.location,
                supply_leakage_fraction: 0.,
                return_leakage_fraction: 0.,
                supply_ua: 0.,
                return_ua: 0.,
            });
            let leakage_fraction = duct.leakage_fraction(air_distribution.rated_airflow);
            let ua = btu_per_hour_f_to_watts_per_k(duct.ua());
            match duct.side {
                DuctSide::Supply => {
                    group.supply_leakage_fraction += leakage_fraction;
                    group.supply_ua += ua;
                }
                DuctSide::Return => {
                    group.return_leakage_fraction += leakage_fraction;
                    group.return_ua += ua;
                }
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> impl Iterator<Item = &DuctLocationGroup> {
        self.groups.values()
    }

    pub fn locations(&self) -> impl Iterator<Item = DuctLocation> + '_ {
        self.groups.keys().copied()
    }

    /// Loads at one location for the air handler's own operation this timestep.
    /// Everything is zero when the air handler is not moving air.
    pub fn loads(&self, group: &DuctLocationGroup, conditions: &DuctZoneConditions) -> DuctLoads {
        group.loads_for_flow(
            conditions.air_handler.mass_flow,
            conditions.air_handler.fan_runtime_fraction,
            conditions.air_handler.outlet,
            conditions.return_air,
            conditions.duct_zone,
        )
    }

    /// Loads including the blower time forced on for CFIS ventilation, during which
    /// unconditioned return air passes through the supply ducts
    ///
    /// Arguments:
    /// * `extra_open_fraction` - fraction of the timestep the blower is forced on
    /// * `ventilation_mode_airflow` - air handler flow while forced on, cfm
    pub fn loads_with_cfis(
        &self,
        group: &DuctLocationGroup,
        conditions: &DuctZoneConditions,
        extra_open_fraction: f64,
        ventilation_mode_airflow: f64,
    ) -> DuctLoads {
        let cfis_mass_flow =
            extra_open_fraction * cfm_to_m3_per_s(ventilation_mode_airflow) * AIR.density();
        let cfis_loads = group.loads_for_flow(
            cfis_mass_flow,
            extra_open_fraction,
            conditions.return_air,
            conditions.return_air,
            conditions.duct_zone,
        );
        self.loads(group, conditions) + cfis_loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn duct(
        side: DuctSide,
        location: DuctLocation,
        leakage_fraction: Option<f64>,
        leakage_cfm25: Option<f64>,
        insulation_r_value: f64,
        surface_area: f64,
    ) -> DuctInput {
        DuctInput {
            side,
            location,
            leakage_fraction,
            leakage_cfm25,
            insulation_r_value,
            surface_area,
        }
    }

    fn state_f(temperature_f: f64, humidity_ratio: f64) -> AirState {
        AirState::new(fahrenheit_to_celsius(temperature_f), humidity_ratio)
    }

    #[fixture]
    pub fn attic_supply() -> DuctInput {
        duct(
            DuctSide::Supply,
            DuctLocation::Zone(ZoneType::VentedAttic),
            Some(0.1),
            None,
            8.,
            100.,
        )
    }

    #[fixture]
    pub fn summer_conditions() -> DuctZoneConditions {
        DuctZoneConditions {
            air_handler: AirHandlerConditions {
                mass_flow: cfm_to_m3_per_s(1000.) * AIR.density(),
                outlet: state_f(55., 0.0085),
                fan_runtime_fraction: 1.,
            },
            // a cool 62F return keeps the supply-leak sensible term below conduction;
            // at a typical 75F return the leak term dominates
            return_air: state_f(62., 0.0092),
            duct_zone: state_f(120., 0.012),
        }
    }

    #[rstest]
    #[case(DuctSide::Supply, 0., 1.7)]
    #[case(DuctSide::Supply, 8., 6.739)]
    #[case(DuctSide::Return, 6., 6.2706)]
    fn should_calc_effective_r_value(
        #[case] side: DuctSide,
        #[case] nominal: f64,
        #[case] expected: f64,
    ) {
        assert_relative_eq!(effective_r_value(side, nominal), expected, max_relative = 1e-9);
    }

    #[rstest]
    fn should_validate_duct_inputs(attic_supply: DuctInput) {
        let error_for = |input: DuctInput| {
            Duct::new(&input)
                .unwrap_err()
                .downcast_ref::<AirflowConfigError>()
                .cloned()
        };

        assert_eq!(
            error_for(DuctInput {
                leakage_cfm25: Some(20.),
                ..attic_supply
            }),
            Some(AirflowConfigError::DuctLeakageBothSpecified)
        );
        assert_eq!(
            error_for(DuctInput {
                leakage_fraction: None,
                ..attic_supply
            }),
            Some(AirflowConfigError::DuctLeakageNotSpecified)
        );
        assert_eq!(
            error_for(DuctInput {
                leakage_fraction: Some(1.2),
                ..attic_supply
            }),
            Some(AirflowConfigError::DuctLeakageFractionOutOfRange(1.2))
        );
        assert_eq!(
            error_for(DuctInput {
                insulation_r_value: -1.,
                ..attic_supply
            }),
            Some(AirflowConfigError::NegativeDuctProperty {
                property: "R-value",
                value: -1.
            })
        );
        assert_eq!(
            error_for(DuctInput {
                surface_area: -5.,
                ..attic_supply
            }),
            Some(AirflowConfigError::NegativeDuctProperty {
                property: "surface area",
                value: -5.
            })
        );
    }

    #[rstest]
    fn should_group_ducts_by_location(attic_supply: DuctInput) {
        let model = DuctLeakageModel::new(
            &[
                attic_supply,
                duct(
                    DuctSide::Return,
                    DuctLocation::Zone(ZoneType::VentedAttic),
                    None,
                    Some(30.),
                    0.,
                    50.,
                ),
                duct(
                    DuctSide::Supply,
                    DuctLocation::Zone(ZoneType::Living),
                    Some(0.05),
                    None,
                    0.,
                    200.,
                ),
                duct(DuctSide::Return, DuctLocation::Outside, Some(0.02), None, 4., 10.),
            ],
            &AirDistributionInput {
                rated_airflow: 1200.,
            },
        )
        .unwrap();

        assert_eq!(
            model.locations().collect::<Vec<_>>(),
            vec![
                DuctLocation::Zone(ZoneType::VentedAttic),
                DuctLocation::Outside
            ]
        );
        let attic = model.groups().next().unwrap();
        assert_relative_eq!(attic.supply_leakage_fraction(), 0.1);
        assert_relative_eq!(attic.return_leakage_fraction(), 0.025, max_relative = 1e-12);
    }

    #[rstest]
    fn should_gain_more_heat_by_conduction_than_leakage_in_hot_attic(
        attic_supply: DuctInput,
        summer_conditions: DuctZoneConditions,
    ) {
        let model = DuctLeakageModel::new(
            &[attic_supply],
            &AirDistributionInput {
                rated_airflow: 1000.,
            },
        )
        .unwrap();
        let group = model.groups().next().unwrap();
        let loads = model.loads(group, &summer_conditions);

        // a heat gain to the living zone, i.e. a negative conduction loss
        assert!(loads.supply_conduction_to_living > 0.);
        assert!(loads.supply_conduction_to_living.abs() > loads.supply_sensible_leakage_to_living.abs());
        assert_relative_eq!(loads.supply_conduction_to_living, 280.750552, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_conduction_to_duct_zone, -280.750552, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_sensible_leakage_to_living, 228.211, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_latent_leakage_to_living, 98.2969231, max_relative = 1e-5);

        let warm_return = DuctZoneConditions {
            return_air: state_f(75., 0.0092),
            ..summer_conditions
        };
        let loads = model.loads(group, &warm_return);
        assert_relative_eq!(loads.supply_conduction_to_living, 280.750552, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_sensible_leakage_to_living, 648.080328, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_sensible_leakage_to_duct_zone, -2120.67063, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_latent_leakage_to_duct_zone, -491.484616, max_relative = 1e-5);

        // vented attic: excess supply leakage is made up from outdoors
        assert_relative_eq!(loads.ducts_out, 0.0471947443, max_relative = 1e-6);
        assert_eq!(loads.ducts_in, 0.);
        assert_eq!(loads.duct_zone_to_living, 0.);
        assert_eq!(loads.living_to_duct_zone, 0.);
    }

    #[rstest]
    fn should_calc_return_loads_and_mixing_for_sealed_zone(summer_conditions: DuctZoneConditions) {
        let model = DuctLeakageModel::new(
            &[
                duct(
                    DuctSide::Supply,
                    DuctLocation::Zone(ZoneType::UnventedAttic),
                    Some(0.1),
                    None,
                    8.,
                    100.,
                ),
                duct(
                    DuctSide::Return,
                    DuctLocation::Zone(ZoneType::UnventedAttic),
                    None,
                    Some(30.),
                    0.,
                    50.,
                ),
            ],
            &AirDistributionInput {
                rated_airflow: 1200.,
            },
        )
        .unwrap();
        let group = model.groups().next().unwrap();
        let conditions = DuctZoneConditions {
            air_handler: AirHandlerConditions {
                mass_flow: 0.5,
                fan_runtime_fraction: 0.8,
                ..summer_conditions.air_handler
            },
            return_air: state_f(75., 0.0092),
            ..summer_conditions
        };
        let loads = model.loads(group, &conditions);

        assert_relative_eq!(loads.supply_conduction_to_living, 224.739879, max_relative = 1e-5);
        assert_relative_eq!(loads.return_conduction_to_return_plenum, 306.513112, max_relative = 1e-5);
        assert_relative_eq!(loads.return_conduction_to_duct_zone, -306.513112, max_relative = 1e-5);
        assert_relative_eq!(loads.return_sensible_leakage_to_return_plenum, 314.375, max_relative = 1e-5);
        assert_relative_eq!(loads.return_latent_leakage_to_return_plenum, 86.4947611, max_relative = 1e-5);
        assert_relative_eq!(loads.return_sensible_leakage_to_duct_zone, -314.375, max_relative = 1e-5);

        // sealed zone: the imbalance is exchanged with the living zone, not outdoors
        assert_eq!(loads.ducts_out, 0.);
        assert_relative_eq!(loads.duct_zone_to_living, 0.0311461794, max_relative = 1e-6);
        assert_eq!(loads.living_to_duct_zone, 0.);
    }

    #[rstest]
    fn should_zero_everything_without_air_handler_flow(
        attic_supply: DuctInput,
        mut summer_conditions: DuctZoneConditions,
    ) {
        let model = DuctLeakageModel::new(
            &[attic_supply],
            &AirDistributionInput {
                rated_airflow: 1000.,
            },
        )
        .unwrap();
        let group = model.groups().next().unwrap();
        summer_conditions.air_handler.mass_flow = 0.;

        assert_eq!(model.loads(group, &summer_conditions), DuctLoads::default());
        assert_eq!(
            model.loads_with_cfis(group, &summer_conditions, 0., 500.),
            DuctLoads::default()
        );
    }

    #[rstest]
    fn should_add_cfis_forced_airflow_pass(summer_conditions: DuctZoneConditions) {
        let model = DuctLeakageModel::new(
            &[
                duct(
                    DuctSide::Supply,
                    DuctLocation::Zone(ZoneType::UnventedAttic),
                    Some(0.1),
                    None,
                    8.,
                    100.,
                ),
                duct(
                    DuctSide::Return,
                    DuctLocation::Zone(ZoneType::UnventedAttic),
                    None,
                    Some(30.),
                    0.,
                    50.,
                ),
            ],
            &AirDistributionInput {
                rated_airflow: 1200.,
            },
        )
        .unwrap();
        let group = model.groups().next().unwrap();
        let conditions = DuctZoneConditions {
            air_handler: AirHandlerConditions {
                mass_flow: 0.,
                ..summer_conditions.air_handler
            },
            return_air: state_f(75., 0.0092),
            ..summer_conditions
        };
        let loads = model.loads_with_cfis(group, &conditions, 0.9, 500.);

        // return air passes through the supply, so supply leakage has no effect on the living zone
        assert_relative_eq!(loads.supply_sensible_leakage_to_living, 0., epsilon = 1e-9);
        assert_relative_eq!(loads.supply_conduction_to_living, 173.739609, max_relative = 1e-5);
        assert_relative_eq!(loads.return_conduction_to_return_plenum, 339.793119, max_relative = 1e-5);
        assert_relative_eq!(loads.return_sensible_leakage_to_return_plenum, 160.772082, max_relative = 1e-5);
        assert_relative_eq!(loads.supply_sensible_leakage_to_duct_zone, -664.516003, max_relative = 1e-5);
        assert_relative_eq!(loads.duct_zone_to_living, 0.0159282262, max_relative = 1e-6);
    }

    #[rstest]
    fn should_derive_ambient_duct_location_conditions() {
        let indoor = AirState::new(22., 0.008);
        let cold = AirState::new(-10., 0.002);

        assert_eq!(
            ambient_state(AmbientDuctLocation::OtherHousingUnit, indoor, cold),
            indoor
        );
        assert_relative_eq!(
            ambient_state(AmbientDuctLocation::OtherHeatedSpace, indoor, cold).temperature,
            20.
        );
        assert_relative_eq!(
            ambient_state(AmbientDuctLocation::OtherMultifamilyBufferSpace, indoor, cold)
                .temperature,
            10.
        );
        let non_freezing = ambient_state(AmbientDuctLocation::OtherNonFreezingSpace, indoor, cold);
        assert_relative_eq!(non_freezing.temperature, 4.444444, max_relative = 1e-6);
        assert_relative_eq!(non_freezing.humidity_ratio, 0.002);

        let warm = AirState::new(30., 0.012);
        let mean = ambient_state(AmbientDuctLocation::OtherHeatedSpace, indoor, warm);
        assert_relative_eq!(mean.temperature, 26.);
        assert_relative_eq!(mean.humidity_ratio, 0.01, epsilon = 1e-12);
    }
}
