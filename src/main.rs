extern crate airflow;

use airflow::output::FileOutput;
use airflow::run_project;
use airflow::timestep_conditions::CsvDirectoryConditions;
use anyhow::anyhow;
use clap::Parser;
use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct AirflowArgs {
    input_file: String,
    /// Directory holding one timestep conditions CSV file per dwelling unit; defaults to the
    /// directory of the input file
    #[arg(long, short)]
    conditions_dir: Option<String>,
    /// File name template for the conditions files, with `{}` standing for the dwelling unit name
    #[arg(long, default_value = "{}_conditions.csv")]
    conditions_template: String,
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = AirflowArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let input_file = args.input_file.as_str();
    let input_file_ext = Path::new(input_file).extension().and_then(OsStr::to_str);
    let input_file_stem = match input_file_ext {
        Some(ext) => &input_file[..(input_file.len() - ext.len() - 1)],
        None => input_file,
    };

    let output_path = PathBuf::from(format!("{input_file_stem}__results"));
    fs::create_dir_all(&output_path)?;
    let output = FileOutput::new(output_path.clone(), "{}.csv".to_string());

    let conditions_dir = match args.conditions_dir {
        Some(dir) => PathBuf::from(dir),
        None => Path::new(input_file)
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("Could not find the directory of {input_file}"))?,
    };
    let conditions = CsvDirectoryConditions::new(conditions_dir, args.conditions_template);

    let results = run_project(
        BufReader::new(File::open(Path::new(input_file))?),
        &conditions,
        &output,
    )?;

    for (unit_name, unit_results) in &results {
        for warning in &unit_results.warnings {
            info!("{unit_name}: {warning}");
        }
    }
    info!("Results written to {}", output_path.display());

    Ok(())
}
