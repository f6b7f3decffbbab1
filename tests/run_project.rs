use airflow::core::ductwork::AirHandlerConditions;
use airflow::core::psychrometrics::AirState;
use airflow::errors::{AirflowConfigError, AirflowError};
use airflow::input::{DuctLocation, ZoneType};
use airflow::output::{Output, SinkOutput};
use airflow::run_project;
use airflow::timestep_conditions::TimestepConditions;
use approx::assert_relative_eq;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::*;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Keeps everything written, keyed by location, so tests can read it back
#[derive(Debug, Default)]
struct MemoryOutput {
    files: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
}

struct MemoryWriter {
    key: String,
    files: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.files
            .borrow_mut()
            .entry(self.key.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Output for &MemoryOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        Ok(MemoryWriter {
            key: location_key.to_string(),
            files: self.files.clone(),
        })
    }
}

impl MemoryOutput {
    fn file(&self, key: &str) -> String {
        String::from_utf8(self.files.borrow()[key].clone()).unwrap()
    }
}

#[fixture]
fn input_json() -> &'static str {
    r#"{
        "SimulationTime": {"start": 0, "end": 2, "step": 0.25},
        "WeatherSummary": {"annual_average_drybulb": 51.4, "heating_degree_days": 4500, "annual_average_wind_speed": 4.2},
        "DwellingUnits": {
            "house": {
                "Building": {
                    "zones": {
                        "living": {"height": 8, "floor_area": 2000, "volume": 16000},
                        "vented_attic": {"height": 6, "floor_area": 2000, "volume": 6000, "floor_elevation": 8}
                    },
                    "number_of_bedrooms": 3,
                    "number_of_bathrooms": 2,
                    "window_area": 300
                },
                "Site": {"terrain": "suburban", "neighbor_distance": 30},
                "Infiltration": {"living_leakage": {"ach50": 5.0}},
                "MechanicalVentilation": {
                    "system_type": "cfis",
                    "rated_flow": 90,
                    "fan_power": 350,
                    "hours_in_operation": 8
                },
                "SpotVentilation": {
                    "range_hood": {"flow_rate": 100, "fan_power": 30},
                    "bath_fans": {"flow_rate": 50, "fan_power": 15, "start_hour": 1}
                },
                "AirDistribution": {"rated_airflow": 1200},
                "Ducts": [
                    {"side": "supply", "location": {"zone": "vented_attic"}, "leakage_fraction": 0.08, "insulation_r_value": 6, "surface_area": 300},
                    {"side": "return", "location": {"zone": "vented_attic"}, "leakage_cfm25": 40, "insulation_r_value": 6, "surface_area": 80}
                ]
            },
            "apartment": {
                "Building": {
                    "zones": {"living": {"height": 9, "floor_area": 900, "volume": 8100}},
                    "number_of_bedrooms": 2
                },
                "Site": {"terrain": "city", "shelter_coefficient": 0.5},
                "Infiltration": {"living_leakage": {"constant_ach": 0.3}},
                "MechanicalVentilation": {
                    "system_type": "hrv",
                    "rated_flow": 70,
                    "fan_power": 40,
                    "sensible_recovery_efficiency": {"rated": 0.7}
                }
            }
        }
    }"#
}

fn winter_conditions(zones: &[ZoneType], hvac_runtime_fraction: f64) -> TimestepConditions {
    TimestepConditions {
        outdoor: AirState::new(-2., 0.0025),
        pressure: 101_325.,
        wind_speed: 5.,
        zones: zones
            .iter()
            .map(|zone_type| match zone_type {
                ZoneType::Living => (*zone_type, AirState::new(20.5, 0.006)),
                _ => (*zone_type, AirState::new(0., 0.003)),
            })
            .collect(),
        heating_setpoint: 20.,
        cooling_setpoint: 24.,
        air_handler: AirHandlerConditions {
            mass_flow: 0.6 * hvac_runtime_fraction,
            outlet: AirState::new(42., 0.006),
            fan_runtime_fraction: hvac_runtime_fraction,
        },
        hvac_runtime_fraction,
    }
}

#[fixture]
fn conditions() -> IndexMap<String, Vec<TimestepConditions>> {
    IndexMap::from([
        (
            "house".to_string(),
            (0..8)
                .map(|index| {
                    winter_conditions(
                        &[ZoneType::Living, ZoneType::VentedAttic],
                        if index % 4 == 1 { 0.4 } else { 0. },
                    )
                })
                .collect(),
        ),
        (
            "apartment".to_string(),
            vec![winter_conditions(&[ZoneType::Living], 0.); 8],
        ),
    ])
}

#[rstest]
fn should_run_every_dwelling_unit(
    input_json: &str,
    conditions: IndexMap<String, Vec<TimestepConditions>>,
) {
    let results = run_project(input_json.as_bytes(), &conditions, SinkOutput).unwrap();

    assert_eq!(
        results.keys().cloned().collect::<Vec<_>>(),
        vec!["house".to_string(), "apartment".to_string()]
    );

    let house = &results["house"];
    assert_eq!(house.timesteps.len(), 8);
    assert!(house.warnings.is_empty());
    assert_relative_eq!(house.infiltration_summary.living_ach50, 5., max_relative = 1e-9);

    // CFIS meets its 20 minute target within each hour
    let minutes_open = house
        .timesteps
        .iter()
        .map(|step| step.cfis.unwrap().minutes_open_this_hour)
        .collect::<Vec<_>>();
    assert_relative_eq!(minutes_open[3], 20., max_relative = 1e-12);
    assert_relative_eq!(minutes_open[7], 20., max_relative = 1e-12);
    assert!(minutes_open.windows(2).take(3).all(|pair| pair[1] >= pair[0]));

    // bath fans run 01:00-02:00
    assert_eq!(house.timesteps[0].bath_fan_flow, 0.);
    assert!(house.timesteps[4].bath_fan_flow > 0.);

    for step in &house.timesteps {
        assert!(step.living_infiltration >= 0.);
        let attic_loads = &step.duct_loads[&DuctLocation::Zone(ZoneType::VentedAttic)];
        // ducts in the cold attic never warm the living zone by conduction
        assert!(attic_loads.supply_conduction_to_living <= 0.);
    }

    let apartment = &results["apartment"];
    let step = &apartment.timesteps[0];
    assert_relative_eq!(step.balanced_flow, 70. * 0.000_471_947_443_2, max_relative = 1e-12);
    assert_eq!(step.mechanical_ventilation_flow, 0.);
    assert_relative_eq!(step.living_infiltration, step.natural_infiltration);
    // recovered heat still leaves supply air colder than the room in winter
    assert!(step.recovery_gains.sensible < 0.);
    assert_eq!(step.cfis, None);
}

#[rstest]
fn should_write_results_and_summary_files(
    input_json: &str,
    conditions: IndexMap<String, Vec<TimestepConditions>>,
) {
    let output = MemoryOutput::default();
    run_project(input_json.as_bytes(), &conditions, &output).unwrap();

    let results_file = output.file("house__results");
    let mut lines = results_file.lines();
    let headings = lines.next().unwrap();
    assert!(headings.starts_with("Timestep,Living zone infiltration"));
    assert!(headings.contains("vented_attic infiltration"));
    assert!(headings.contains("Ducts in vented_attic sensible to living zone"));
    assert!(lines.next().unwrap().starts_with("[hours],[m3/s]"));
    assert_eq!(lines.count(), 8);

    let summary_file = output.file("apartment__results_summary");
    assert!(summary_file.contains("Air changes at 50 Pa"));
}

#[rstest]
fn should_report_configuration_errors_against_unit(
    input_json: &str,
    conditions: IndexMap<String, Vec<TimestepConditions>>,
) {
    let broken = input_json.replace(r#""leakage_fraction": 0.08"#, r#""leakage_fraction": 1.5"#);
    let error = run_project(broken.as_bytes(), &conditions, SinkOutput).unwrap_err();

    match error {
        AirflowError::InvalidConfiguration { unit, error } => {
            assert_eq!(unit, "house");
            assert_eq!(
                error.downcast_ref::<AirflowConfigError>(),
                Some(&AirflowConfigError::DuctLeakageFractionOutOfRange(1.5))
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn should_fail_when_conditions_are_missing(input_json: &str) {
    let conditions: IndexMap<String, Vec<TimestepConditions>> = IndexMap::from([(
        "house".to_string(),
        vec![winter_conditions(&[ZoneType::Living], 0.); 8],
    )]);
    let error = run_project(input_json.as_bytes(), &conditions, SinkOutput).unwrap_err();

    assert!(matches!(
        error,
        AirflowError::FailureInCalculation { .. } | AirflowError::InvalidRequest(_)
    ));
}

#[rstest]
fn should_reject_unknown_input_fields() {
    let error = run_project(
        r#"{"SimulationTime": {"start": 0, "end": 1, "step": 1}, "Unknown": 1}"#.as_bytes(),
        &IndexMap::<String, Vec<TimestepConditions>>::new(),
        SinkOutput,
    )
    .unwrap_err();
    assert!(matches!(error, AirflowError::InvalidRequest(_)));
}
