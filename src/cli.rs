use crate::config::{build_config, load_file_config, SessionConfig};
use crate::engine::{BoundedCommand, ProcessPort};
use crate::form::SchedulingForm;
use crate::model::{OptimizationMode, SessionEvent, SessionPhase, SessionResult};
use crate::orchestrator::{process_run_completion, ExportTargets, SessionController, SessionError};
use crate::paths::ROOT_ENV;
use crate::predict::{self, DiseasePredictor};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "hospital-scheduler",
    version,
    about = "Hospital doctor/patient/bed scheduling through an external optimizer"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Application root holding Backend/PythonScripts and Results
    #[arg(long, env = ROOT_ENV, global = true)]
    pub root: Option<PathBuf>,

    /// Config file (default: <config dir>/hospital-scheduler/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Python interpreter used to run the scripts
    #[arg(long, global = true)]
    pub python: Option<String>,

    /// Ceiling for each script run (e.g. 60s, 2m)
    #[arg(long, global = true)]
    pub timeout: Option<humantime::Duration>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Validate the form, run the optimizer, and show the schedule
    Schedule(ScheduleArgs),
    /// Predict a disease from symptoms
    Predict(PredictArgs),
    /// List the symptoms the predictor knows
    Symptoms(SymptomsArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ScheduleArgs {
    /// Form file (JSON) with counts, entries, urgency and GA settings
    #[arg(long)]
    pub form: Option<PathBuf>,

    /// Number of doctors
    #[arg(long)]
    pub doctors: Option<String>,

    /// Number of patients
    #[arg(long)]
    pub patients: Option<String>,

    /// Number of beds
    #[arg(long)]
    pub beds: Option<String>,

    /// Comma-separated urgency scores (1-10), one per patient
    #[arg(long)]
    pub urgency: Option<String>,

    /// Optimization mode
    #[arg(long, value_enum)]
    pub algorithm: Option<OptimizationMode>,

    /// GA population size
    #[arg(long)]
    pub ga_population: Option<String>,

    /// GA generation count
    #[arg(long)]
    pub ga_generations: Option<String>,

    /// GA mutation rate, as a fraction (0.06) or a percentage (6)
    #[arg(long)]
    pub ga_mutation: Option<String>,

    /// GA random seed
    #[arg(long)]
    pub ga_seed: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Export results as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Export the assignment table as CSV
    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Symptom key or display name; repeat for several
    #[arg(short, long = "symptom", required = true)]
    pub symptoms: Vec<String>,

    /// Print the prediction as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SymptomsArgs {
    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    let file = load_file_config(args.global.config.as_deref())?;
    let cfg = build_config(&args.global, &file);
    tracing::debug!(root = %cfg.paths.root().display(), python = %cfg.python, "configuration resolved");

    match args.command {
        Command::Schedule(a) => run_schedule(&cfg, a).await,
        Command::Predict(a) => run_predict(&cfg, a).await,
        Command::Symptoms(a) => run_symptoms(&cfg, a).await,
    }
}

/// Form file first, then the flags that override its fields.
fn build_form(args: &ScheduleArgs) -> Result<SchedulingForm> {
    let mut form = match args.form.as_deref() {
        Some(path) => SchedulingForm::load(path)?,
        None => SchedulingForm::default(),
    };
    let overrides = [
        (&args.doctors, &mut form.doctors),
        (&args.patients, &mut form.patients),
        (&args.beds, &mut form.beds),
        (&args.urgency, &mut form.urgency),
        (&args.ga_population, &mut form.ga.population),
        (&args.ga_generations, &mut form.ga.generations),
        (&args.ga_mutation, &mut form.ga.mutation),
        (&args.ga_seed, &mut form.ga.seed),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            *field = value.clone();
        }
    }
    if let Some(mode) = args.algorithm {
        form.algorithm = mode;
    }
    Ok(form)
}

async fn run_schedule(cfg: &SessionConfig, args: ScheduleArgs) -> Result<()> {
    let form = build_form(&args)?;
    let port = ProcessPort::new(
        cfg.paths.request_file(),
        BoundedCommand::script(&cfg.python, &cfg.paths.scheduler_script(), cfg.timeout),
        cfg.success_marker.clone(),
    );

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut controller = SessionController::new(Arc::new(port), cfg.paths.results_dir(), evt_tx);
    form.apply_to(controller.roster_mut())
        .context("form entries do not fit the roster")?;
    let roster = controller.roster();
    tracing::debug!(
        revision = roster.revision(),
        doctors = roster.doctors().len(),
        patients = roster.patients().len(),
        urgency = ?roster.urgency(),
        "form applied"
    );

    let printer = tokio::spawn(print_events(evt_rx, out_tx.clone()));
    let outcome = controller.run(&form.run_options()).await;
    tracing::debug!(
        phase = ?controller.phase(),
        trigger_enabled = controller.trigger_enabled(),
        has_result = controller.last_result().is_some(),
        "session settled"
    );
    // The controller owns the only event sender.
    drop(controller);
    let _ = printer.await;

    let status = match outcome {
        Ok(result) => present_result(&args, &result, &out_tx),
        Err(SessionError::Validation(report)) => {
            let _ = out_tx.send(OutputLine::Stderr(report.to_message()));
            Err(anyhow::anyhow!(
                "form has {} validation error(s)",
                report.error_count()
            ))
        }
        Err(SessionError::Ingestion { error, partial }) => {
            // Metrics and chart were still read; show them before failing.
            present_result(&args, &partial, &out_tx)
                .and(Err::<(), _>(error).context("schedule results are incomplete"))
        }
        Err(e) => Err(e).context("scheduling run failed"),
    };

    drop(out_tx);
    let _ = out_handle.await;
    status
}

fn present_result(
    args: &ScheduleArgs,
    result: &SessionResult,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let targets = ExportTargets {
        json: args.export_json.clone(),
        csv: args.export_csv.clone(),
    };
    for message in process_run_completion(&targets, result) {
        let _ = out_tx.send(OutputLine::Stderr(message));
    }

    if args.json {
        let out = serde_json::to_string_pretty(result)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(result);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    Ok(())
}

async fn print_events(
    mut evt_rx: mpsc::UnboundedReceiver<SessionEvent>,
    out_tx: mpsc::UnboundedSender<OutputLine>,
) {
    while let Some(ev) = evt_rx.recv().await {
        let line = match ev {
            SessionEvent::PhaseChanged {
                phase: SessionPhase::Invoking,
            } => "== Invoking == (optimizer running)".to_string(),
            SessionEvent::PhaseChanged {
                phase: SessionPhase::Idle,
            } => continue,
            SessionEvent::PhaseChanged { phase } => format!("== {phase:?} =="),
            SessionEvent::Info(info) => info.to_message(),
            SessionEvent::RunCompleted { result } => format!(
                "Run completed at {}: {} assignment(s)",
                result.completed_at,
                result.assignments.len()
            ),
            SessionEvent::RunFailed { message } => format!("Run failed: {message}"),
            SessionEvent::TriggerChanged { .. } => continue,
        };
        let _ = out_tx.send(OutputLine::Stderr(line));
    }
}

async fn run_predict(cfg: &SessionConfig, args: PredictArgs) -> Result<()> {
    let catalog_path = cfg.paths.symptom_catalog();
    let catalog = tokio::task::spawn_blocking(move || predict::load_symptom_catalog(&catalog_path))
        .await
        .context("catalog task failed")??;
    let symptoms = predict::check_selection(&args.symptoms, catalog.as_deref())?;

    let predictor = DiseasePredictor::new(
        cfg.paths.prediction_input(),
        BoundedCommand::script(&cfg.python, &cfg.paths.predictor_script(), cfg.timeout),
    );
    eprintln!("Analyzing {} symptom(s)...", symptoms.len());
    let prediction = predictor
        .predict(&symptoms)
        .await
        .context("disease prediction failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        for line in predict::render_prediction(&prediction) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn run_symptoms(cfg: &SessionConfig, args: SymptomsArgs) -> Result<()> {
    let path = cfg.paths.symptom_catalog();
    let catalog = predict::load_symptom_catalog(&path)?
        .with_context(|| format!("symptom catalog not found at {}", path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        for symptom in &catalog {
            println!("{:<32} {}", symptom, predict::display_name(symptom));
        }
        eprintln!("{} symptom(s)", catalog.len());
    }
    Ok(())
}
