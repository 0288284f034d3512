use clap::{Parser, Subcommand, ValueEnum};
use dh_components::{ComponentError, ComponentKind, ParamKind};
use dh_model::ModelStats;
use dh_project::{CompiledProject, ProjectResult, compile_project, horizon, load};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dh-cli")]
#[command(about = "District heating model CLI - build and inspect component models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Print the parameter schema of a component kind
    Params {
        /// Component kind, e.g. FiniteVolumePipe
        kind: ComponentKind,
        /// Show the temperature-driven variant
        #[arg(long)]
        temperature: bool,
    },
    /// Compile a project into a model and print its statistics
    Compile {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Network total to minimize
        #[arg(long, value_enum)]
        objective: Option<ObjectiveArg>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ObjectiveArg {
    Energy,
    Cost,
    Co2,
}

impl ObjectiveArg {
    fn expression(self) -> &'static str {
        match self {
            ObjectiveArg::Energy => "energy",
            ObjectiveArg::Cost => "cost",
            ObjectiveArg::Co2 => "co2",
        }
    }
}

#[derive(Serialize)]
struct CompileSummary {
    project: String,
    n_steps: usize,
    step_s: f64,
    objective: Option<&'static str>,
    stats: ModelStats,
    components: Vec<ComponentSummary>,
}

#[derive(Serialize)]
struct ComponentSummary {
    id: String,
    kind: ComponentKind,
    variables: Vec<String>,
}

fn main() -> ProjectResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Params { kind, temperature } => {
            cmd_params(kind, temperature);
            Ok(())
        }
        Commands::Compile {
            project_path,
            objective,
            json,
        } => cmd_compile(&project_path, objective, json),
    }
}

fn cmd_validate(project_path: &Path) -> ProjectResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = load(project_path)?;
    println!(
        "✓ Project is valid ({} components)",
        project.components.len()
    );
    Ok(())
}

fn cmd_params(kind: ComponentKind, temperature_driven: bool) {
    println!("Parameters of {kind}:");
    for spec in kind.schema(temperature_driven) {
        let kind = match spec.kind {
            ParamKind::Scalar => "scalar",
            ParamKind::TimeSeries => "time series",
            ParamKind::Curve => "curve",
        };
        let status = match (spec.required, spec.default) {
            (true, _) => "required".to_string(),
            (false, Some(d)) => format!("default {d}"),
            (false, None) => "optional".to_string(),
        };
        println!(
            "  {:<24} [{}] {:<12} {:<12} {}",
            spec.name, spec.unit, kind, status, spec.description
        );
    }
}

fn cmd_compile(
    project_path: &Path,
    objective: Option<ObjectiveArg>,
    json: bool,
) -> ProjectResult<()> {
    let project = load(project_path)?;
    let horizon = horizon(&project)?;
    let mut compiled = compile_project(&project)?;
    if let Some(objective) = objective {
        compiled
            .ctx
            .minimize_total(objective.expression())
            .map_err(ComponentError::from)?;
    }
    debug!(unbound = compiled.ctx.unbound_params().len(), "parameters bound");

    let summary = CompileSummary {
        project: project.name.clone(),
        n_steps: horizon.n_steps(),
        step_s: horizon.step_s(),
        objective: objective.map(ObjectiveArg::expression),
        stats: compiled.ctx.stats(),
        components: summarize(&compiled),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Project: {}", summary.project);
    println!(
        "  Horizon: {} steps of {} s",
        summary.n_steps, summary.step_s
    );
    if let Some(name) = summary.objective {
        println!("  Objective: minimize total {name}");
    }
    let stats = &summary.stats;
    println!(
        "  Variables: {} blocks, {} scalars",
        stats.variable_blocks, stats.scalar_variables
    );
    println!(
        "  Parameters: {} blocks, {} scalars",
        stats.parameter_blocks, stats.scalar_parameters
    );
    println!(
        "  Constraints: {} rows ({} linear, {} nonlinear)",
        stats.constraint_rows, stats.linear_rows, stats.nonlinear_rows
    );
    println!("  Expressions: {}", stats.expressions);
    println!("Components:");
    for c in &summary.components {
        println!("  {} ({}): {}", c.id, c.kind, c.variables.join(", "));
    }
    Ok(())
}

fn summarize(compiled: &CompiledProject) -> Vec<ComponentSummary> {
    compiled
        .components
        .iter()
        .map(|c| ComponentSummary {
            id: c.id().to_string(),
            kind: c.kind(),
            variables: c.variable_names().into_iter().map(str::to_string).collect(),
        })
        .collect()
}
