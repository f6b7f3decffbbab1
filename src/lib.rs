pub mod core;
pub mod corpus;
pub mod errors;
pub mod input;
pub mod output;
pub mod simulation_time;
pub mod timestep_conditions;

use crate::core::space_heat_demand::infiltration::InfiltrationSummary;
use crate::corpus::{AirflowResults, Corpus};
use crate::errors::{AirflowError, OutputError};
use crate::input::{ingest_for_processing, DwellingUnitInput};
use crate::output::Output;
use crate::simulation_time::SimulationTime;
use crate::timestep_conditions::ConditionsProvider;
use csv::WriterBuilder;
use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::borrow::Cow;
use std::io::Read;
use tracing::info;

/// Results of one dwelling unit over the whole simulation
#[derive(Clone, Debug)]
pub struct UnitResults {
    pub timesteps: Vec<AirflowResults>,
    pub infiltration_summary: InfiltrationSummary,
    pub warnings: Vec<String>,
}

pub type RunResults = IndexMap<String, UnitResults>;

pub fn run_project(
    input: impl Read,
    conditions: &impl ConditionsProvider,
    output: impl Output,
) -> Result<RunResults, AirflowError> {
    let input = ingest_for_processing(input)?;
    let simulation_time = input.simulation_time;

    // dwelling units are independent of one another
    let units: Vec<(&String, &DwellingUnitInput)> = input.dwelling_units.iter().collect();
    let results = units
        .par_iter()
        .map(|(name, unit)| {
            info!("Running airflow model for dwelling unit '{name}'");
            let mut corpus = Corpus::from_inputs(
                unit,
                &input.weather_summary,
                simulation_time,
                input.solver_options,
            )
            .map_err(|error| AirflowError::InvalidConfiguration {
                unit: name.to_string(),
                error,
            })?;
            let unit_conditions = conditions.conditions_for(name)?;
            let timesteps =
                corpus
                    .run(&unit_conditions)
                    .map_err(|error| AirflowError::FailureInCalculation {
                        unit: name.to_string(),
                        error,
                    })?;
            info!("Finished dwelling unit '{name}'");

            Ok((
                name.to_string(),
                UnitResults {
                    timesteps,
                    infiltration_summary: corpus.infiltration_summary(),
                    warnings: corpus.warnings().to_vec(),
                },
            ))
        })
        .collect::<Result<Vec<_>, AirflowError>>()?
        .into_iter()
        .collect::<RunResults>();

    if !output.is_noop() {
        for (name, unit_results) in &results {
            write_timestep_output_file(&output, name, simulation_time, unit_results)
                .and_then(|_| write_summary_output_file(&output, name, unit_results))
                .map_err(|err| AirflowError::ErrorInOutput(OutputError::new(err)))?;
        }
    }

    Ok(results)
}

const FLOW_UNITS: &str = "[m3/s]";
const POWER_UNITS: &str = "[W]";
const FRACTION_UNITS: &str = "[ratio]";

fn write_timestep_output_file(
    output: &impl Output,
    unit_name: &str,
    simulation_time: SimulationTime,
    results: &UnitResults,
) -> anyhow::Result<()> {
    let location_key = format!("{unit_name}__results");
    let writer = output.writer_for_location_key(&location_key)?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    let Some(first) = results.timesteps.first() else {
        return Ok(());
    };

    let mut headings: Vec<Cow<'static, str>> = vec!["Timestep".into()];
    let mut units_row = vec!["[hours]"];
    for (heading, units) in [
        ("Living zone infiltration", FLOW_UNITS),
        ("Natural infiltration", FLOW_UNITS),
        ("Mechanical ventilation", FLOW_UNITS),
        ("Duct imbalance", FLOW_UNITS),
        ("Balanced ventilation", FLOW_UNITS),
        ("Recovery sensible gain", POWER_UNITS),
        ("Recovery latent gain", POWER_UNITS),
        ("Mechanical ventilation fan power", POWER_UNITS),
        ("Range hood", FLOW_UNITS),
        ("Bath fans", FLOW_UNITS),
        ("Dryer exhaust", FLOW_UNITS),
        ("Spot fan power", POWER_UNITS),
        ("Natural ventilation", FLOW_UNITS),
        ("Whole house fan", FLOW_UNITS),
        ("Whole house fan power", POWER_UNITS),
        ("Whole house fan attic mixing", FLOW_UNITS),
        ("CFIS damper open", FRACTION_UNITS),
        ("CFIS blower forced on", FRACTION_UNITS),
    ] {
        headings.push(heading.into());
        units_row.push(units);
    }
    for zone_type in first.zone_infiltration.keys() {
        headings.push(format!("{zone_type} infiltration").into());
        units_row.push(FLOW_UNITS);
    }
    for location in first.duct_loads.keys() {
        for (quantity, units) in [
            ("sensible to living zone", POWER_UNITS),
            ("latent to living zone", POWER_UNITS),
            ("sensible to return plenum", POWER_UNITS),
            ("latent to return plenum", POWER_UNITS),
            ("sensible to duct zone", POWER_UNITS),
            ("latent to duct zone", POWER_UNITS),
            ("duct zone to living zone", FLOW_UNITS),
            ("living zone to duct zone", FLOW_UNITS),
            ("ducts outdoor air out", FLOW_UNITS),
            ("ducts outdoor air in", FLOW_UNITS),
        ] {
            headings.push(format!("Ducts in {location} {quantity}").into());
            units_row.push(units);
        }
    }

    writer.write_record(headings.iter().map(|heading| heading.as_bytes()))?;
    writer.write_record(&units_row)?;

    for (simtime, step) in simulation_time.iter().zip(&results.timesteps) {
        let cfis = step.cfis.unwrap_or_default();
        let window = &step.window_ventilation;
        let mut row = vec![
            simtime.time,
            step.living_infiltration,
            step.natural_infiltration,
            step.mechanical_ventilation_flow,
            step.duct_imbalance_flow,
            step.balanced_flow,
            step.recovery_gains.sensible,
            step.recovery_gains.latent,
            step.mechanical_fan_power,
            step.range_hood_flow,
            step.bath_fan_flow,
            step.dryer_exhaust_flow,
            step.spot_fan_power,
            window.natural_ventilation_flow,
            window.whole_house_fan_flow,
            window.whole_house_fan_power,
            window.attic_mixing_flow,
            cfis.damper_open_fraction,
            cfis.extra_open_fraction,
        ];
        row.extend(step.zone_infiltration.values());
        for loads in step.duct_loads.values() {
            row.extend([
                loads.sensible_to_living(),
                loads.latent_to_living(),
                loads.sensible_to_return_plenum(),
                loads.latent_to_return_plenum(),
                loads.sensible_to_duct_zone(),
                loads.latent_to_duct_zone(),
                loads.duct_zone_to_living,
                loads.living_to_duct_zone,
                loads.ducts_out,
                loads.ducts_in,
            ]);
        }
        writer.write_record(row.iter().map(f64::to_string).collect_vec())?;
    }

    writer.flush()?;
    Ok(())
}

fn write_summary_output_file(
    output: &impl Output,
    unit_name: &str,
    results: &UnitResults,
) -> anyhow::Result<()> {
    let location_key = format!("{unit_name}__results_summary");
    let writer = output.writer_for_location_key(&location_key)?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);
    let summary = &results.infiltration_summary;

    writer.write_record(["Living zone infiltration", "", ""])?;
    for (name, value, units) in [
        ("Specific leakage area", summary.living_sla, "[ratio]"),
        ("Effective leakage area", summary.living_ela, "[ft2]"),
        ("Annual average air changes", summary.living_ach, "[1/h]"),
        ("Air changes at 50 Pa", summary.living_ach50, "[1/h]"),
        ("Annual average flow", summary.living_flow, "[cfm]"),
    ] {
        writer.write_record([name.to_string(), value.to_string(), units.to_string()])?;
    }

    if !summary.zones.is_empty() {
        writer.write_record(["Zone", "Annual average air changes [1/h]", "Annual average flow [cfm]"])?;
        for (zone_type, (ach, flow)) in &summary.zones {
            writer.write_record([zone_type.to_string(), ach.to_string(), flow.to_string()])?;
        }
    }

    for warning in &results.warnings {
        writer.write_record(["Warning", warning.as_str(), ""])?;
    }

    writer.flush()?;
    Ok(())
}
