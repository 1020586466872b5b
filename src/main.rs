//! Binary entry point for the vmclone CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use ortho_config::toml;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use vmclone::{
    CloneReconciler, ReadOutcome, ReconcileError, Resource, ResourceState, SchemaError,
    StateError, StateFile, VIRTUAL_MACHINE, VsphereClient, VsphereConfig, VsphereError,
};

use cli::{Cli, CreateCommand, StateArgs};


const LOG_ENV: &str = "VMCLONE_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to load resource configuration {path}: {message}")]
    ResourceConfig { path: Utf8PathBuf, message: String },
    #[error("invalid resource configuration: {0}")]
    Schema(#[from] SchemaError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("vSphere error: {0}")]
    Vsphere(#[from] VsphereError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError<VsphereError>),
    #[error("{path} already records virtual machine {id}; delete it before creating another")]
    AlreadyManaged { path: Utf8PathBuf, id: String },
    #[error("virtual machine {id} ({name}) was created but could not be recorded: {source}")]
    Unrecorded {
        id: String,
        name: String,
        #[source]
        source: StateError,
    },
    #[error("failed to write output: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli {
        Cli::Create(command) => create(command, out).await,
        Cli::Read(args) => read(&args, out).await,
        Cli::Delete(args) => delete(&args, out).await,
        Cli::Schema => print_json(out, &VIRTUAL_MACHINE),
    }
}

async fn create(command: CreateCommand, out: &mut impl Write) -> Result<(), CliError> {
    let state_file = StateFile::new(command.state.state);
    if let Some(existing) = state_file.load()? {
        return Err(CliError::AlreadyManaged {
            path: state_file.path().to_path_buf(),
            id: existing.id,
        });
    }

    let values = load_resource_config(Utf8Path::new(&command.config))?;
    let request = VIRTUAL_MACHINE.decode(&values)?;

    let reconciler = connect().await?;
    let state = reconciler.create(&request).await?;
    record_created(&state_file, &state, out)
}

fn record_created(
    state_file: &StateFile,
    state: &ResourceState,
    out: &mut impl Write,
) -> Result<(), CliError> {
    state_file
        .save(state)
        .map_err(|source| CliError::Unrecorded {
            id: state.id.clone(),
            name: state.name.clone(),
            source,
        })?;
    print_json(out, state)
}

async fn read(args: &StateArgs, out: &mut impl Write) -> Result<(), CliError> {
    let state_file = StateFile::new(args.state.clone());
    let Some(state) = state_file.load()? else {
        return write_line(
            out,
            &format!("no virtual machine recorded in {}", state_file.path()),
        );
    };

    let reconciler = connect().await?;
    match reconciler.read(&state).await? {
        ReadOutcome::Present(refreshed) => {
            state_file.save(&refreshed)?;
            print_json(out, &refreshed)
        }
        ReadOutcome::Absent => {
            state_file.clear()?;
            write_line(
                out,
                &format!("virtual machine {} no longer exists; state cleared", state.id),
            )
        }
    }
}

async fn delete(args: &StateArgs, out: &mut impl Write) -> Result<(), CliError> {
    let state_file = StateFile::new(args.state.clone());
    let Some(state) = state_file.load()? else {
        return write_line(
            out,
            &format!("no virtual machine recorded in {}", state_file.path()),
        );
    };

    let reconciler = connect().await?;
    reconciler.delete(&state).await?;
    state_file.clear()?;
    write_line(out, &format!("virtual machine {} destroyed", state.id))
}

async fn connect() -> Result<CloneReconciler<VsphereClient>, CliError> {
    let config =
        VsphereConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let client = VsphereClient::connect(&config).await?;
    Ok(CloneReconciler::from_config(client, &config))
}

fn load_resource_config(path: &Utf8Path) -> Result<Map<String, Value>, CliError> {
    let contents = read_file(path)?;
    let parsed = if path.extension() == Some("toml") {
        let table: toml::value::Table =
            toml::from_str(&contents).map_err(|err| resource_config_error(path, &err))?;
        serde_json::to_value(table).map_err(|err| resource_config_error(path, &err))?
    } else {
        serde_json::from_str(&contents).map_err(|err| resource_config_error(path, &err))?
    };

    match parsed {
        Value::Object(values) => Ok(values),
        _ => Err(resource_config_error(path, "expected a table of fields")),
    }
}

fn read_file(path: &Utf8Path) -> Result<String, CliError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| resource_config_error(path, "path is missing a filename"))?;

    Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name))
        .map_err(|err| resource_config_error(path, &err))
}

fn resource_config_error(path: &Utf8Path, message: &(impl ToString + ?Sized)) -> CliError {
    CliError::ResourceConfig {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    write_line(out, &rendered)
}

fn write_line(out: &mut impl Write, line: &str) -> Result<(), CliError> {
    writeln!(out, "{line}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
