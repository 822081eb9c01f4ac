use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{ArgAction, ArgGroup, ColorChoice, Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::{Confirm, Input};
use shadowrestore_core::{
    AddressingMode, CopyOutcome, NotifyOutcome, RestoreReport, RestoreRequest, Restorer,
    Settings, SkipReason, SmtpMailer, TimeBucket,
};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

/// Restore files from the shadow copy of a remote system closest to a point in time.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Set the verbosity level. Use -v for debug, -vv for trace.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Control when to use color output.
    #[arg(long, value_name = "WHEN", global = true, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Use this settings file instead of the default location.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BucketArg {
    /// 08:00
    Morning,
    /// 13:00
    Noon,
    /// 18:00
    Evening,
}

impl From<BucketArg> for TimeBucket {
    fn from(arg: BucketArg) -> Self {
        match arg {
            BucketArg::Morning => TimeBucket::Morning,
            BucketArg::Noon => TimeBucket::Noon,
            BucketArg::Evening => TimeBucket::Evening,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initializes the configuration file interactively.
    Init,
    /// Updates the configuration interactively.
    Config,
    /// Copy data out of the snapshot taken closest to (and not after) the given time.
    #[command(visible_alias = "r")]
    #[command(group(ArgGroup::new("addressing").required(true).args(["drive", "share"])))]
    Restore {
        /// Calendar date, e.g. 2019-03-07 or 03/07/2019.
        #[arg(long)]
        date: String,

        /// Time of day the snapshot should precede.
        #[arg(long = "time", value_enum)]
        time: BucketArg,

        /// Remote host holding the snapshots.
        #[arg(long)]
        system: String,

        /// Drive letter reached through its administrative share (D$).
        #[arg(long)]
        drive: Option<String>,

        /// Share name.
        #[arg(long)]
        share: Option<String>,

        /// Path below the drive or share root.
        #[arg(long)]
        path: String,

        /// Restore only this entry of the snapshot directory.
        #[arg(long)]
        file: Option<String>,

        /// Directory to restore into.
        #[arg(long)]
        destination: PathBuf,

        /// Copy the whole directory tree even in drive mode.
        #[arg(long, conflicts_with = "no_recursive")]
        recursive: bool,

        /// Never copy a directory tree, even in share mode.
        #[arg(long)]
        no_recursive: bool,

        /// E-mail address to notify once the data is restored.
        #[arg(long, value_name = "EMAIL")]
        notify: Option<String>,

        /// Resolve the snapshot and path without copying anything.
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the snapshots available on a system.
    #[command(visible_alias = "l")]
    List {
        /// Remote host holding the snapshots.
        #[arg(long)]
        system: String,

        /// Mark the snapshot a restore for this date would use.
        #[arg(long, requires = "time")]
        date: Option<String>,

        #[arg(long = "time", value_enum, requires = "date")]
        time: Option<BucketArg>,

        /// Print the listing as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the configuration paths being used.
    Paths,
}

/// Exit status of a restore that finished without copying anything.
/// Kept clear of clap's usage-error status (2).
const NOTHING_RESTORED: u8 = 3;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let loaded = load_settings(cli.config.as_deref());
    let log_dir = loaded.as_ref().ok().and_then(|s| s.log_dir.clone());
    let _guard = init_tracing(cli.verbose, cli.color, log_dir.as_deref());

    match &cli.command {
        Commands::Init => return handle_init(cli.config.as_deref()).map(|_| ExitCode::SUCCESS),
        Commands::Config => {
            return handle_config(cli.config.as_deref()).map(|_| ExitCode::SUCCESS);
        }
        _ => {}
    }

    let settings = loaded.context("Failed to load settings. Try running 'shadowrestore init'")?;

    match cli.command {
        Commands::Restore {
            date,
            time,
            system,
            drive,
            share,
            path,
            file,
            destination,
            recursive,
            no_recursive,
            notify,
            dry_run,
            json,
        } => {
            let addressing = AddressingMode::from_options(drive.as_deref(), share.as_deref())?;
            let request = RestoreRequest {
                date,
                bucket: time.into(),
                system,
                addressing,
                relative_path: path,
                file,
                destination,
                recursive: match (recursive, no_recursive) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                notify,
                dry_run,
            };
            handle_restore(settings, &request, json)
        }
        Commands::List {
            system,
            date,
            time,
            json,
        } => {
            let restorer = Restorer::from_settings(settings);
            let target = match (date, time) {
                (Some(date), Some(time)) => Some(restorer.target_time(&date, time.into())?),
                _ => None,
            };
            handle_list(&restorer, &system, target, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Paths => {
            handle_paths(&settings, cli.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init | Commands::Config => unreachable!(),
    }
}

fn load_settings(path: Option<&Path>) -> shadowrestore_core::Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::new(),
    }
}

fn init_tracing(verbosity: u8, color: ColorChoice, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(color != ColorChoice::Never); // Enable/disable color

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shadowrestore.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(level)
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn handle_restore(settings: Settings, request: &RestoreRequest, json: bool) -> Result<ExitCode> {
    let mut restorer = Restorer::from_settings(settings);
    if request.notify.is_some() && !request.dry_run {
        let mailer = SmtpMailer::from_settings(&restorer.settings().mail)
            .context("E-mail notification was requested but mail is not set up")?;
        restorer = restorer.with_mailer(Box::new(mailer));
    }

    let report = restorer
        .run_restore(request)
        .with_context(|| format!("Failed to restore from '{}'", request.system))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    let planned = report.copy == CopyOutcome::Skipped(SkipReason::DryRun);
    if report.copy.restored_anything() || planned {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(NOTHING_RESTORED))
    }
}

fn print_report(report: &RestoreReport) {
    println!(
        "Snapshot:    {} (taken {}, {:.1}h before {})",
        style(format!("@GMT-{}", report.token)).cyan(),
        report.snapshot.raw,
        report.snapshot.hours_from_target,
        report.target
    );
    println!("Source:      {}", style(&report.source_path).yellow());

    match &report.copy {
        CopyOutcome::Copied { files, bytes } => println!(
            "{}",
            style(format!("Restored {} file(s), {} bytes.", files, bytes))
                .green()
                .bold()
        ),
        CopyOutcome::NotFound { path } => println!(
            "{} {}",
            style("Nothing restored, path does not exist:").red().bold(),
            path.display()
        ),
        CopyOutcome::Skipped(SkipReason::DryRun) => {
            println!("{}", style("-- DRY RUN --").yellow().bold());
            println!("\nRun without --dry-run to copy the data.");
        }
        CopyOutcome::Skipped(reason) => println!(
            "{} {}",
            style("Nothing restored:").red().bold(),
            reason
        ),
    }

    match &report.notification {
        NotifyOutcome::Sent { recipient } => {
            println!("Notified {}.", style(recipient).cyan())
        }
        NotifyOutcome::Failed { recipient, error } => println!(
            "{} {}: {}",
            style("Could not notify").yellow(),
            recipient,
            error
        ),
        NotifyOutcome::Skipped(_) => {}
    }
}

fn handle_list(
    restorer: &Restorer,
    system: &str,
    target: Option<NaiveDateTime>,
    json: bool,
) -> Result<()> {
    let snapshots = restorer
        .list_snapshots(system, target)
        .with_context(|| format!("Failed to list snapshots on '{}'", system))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No snapshots found on {}.", system);
        return Ok(());
    }
    println!("{}", style(format!("Snapshots on {}:", system)).bold());
    for snapshot in snapshots {
        let marker = if snapshot.selected { "*" } else { "-" };
        match &snapshot.token {
            Some(token) => println!(
                "{} {:<26} @GMT-{}",
                marker,
                snapshot.record.raw,
                style(token).cyan()
            ),
            None => println!(
                "{} {:<26} {}",
                marker,
                snapshot.record.raw,
                style("(token could not be resolved)").red()
            ),
        }
    }
    if target.is_some() {
        println!("\n* marks the snapshot a restore at that time would use.");
    }
    Ok(())
}

fn handle_paths(settings: &Settings, config: Option<&Path>) -> Result<()> {
    let config_path = match config {
        Some(path) => path.to_path_buf(),
        None => Settings::config_path()?,
    };
    println!("{}", style("Configuration paths:").bold());
    println!("- Config file:  {}", style(config_path.display()).yellow());
    println!(
        "- Log directory: {}",
        style(describe(settings.log_dir.as_deref())).yellow()
    );
    println!(
        "- UNC mount root: {}",
        style(describe(settings.paths.unc_root.as_deref())).yellow()
    );
    Ok(())
}

fn describe(path: Option<&Path>) -> String {
    path.map_or_else(|| "(not set)".to_string(), |p| p.display().to_string())
}

fn handle_init(config: Option<&Path>) -> Result<()> {
    println!("{}", style("Welcome to shadowrestore setup!").bold());
    let config_path = target_config_path(config)?;
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("A configuration file already exists. Do you want to overwrite it?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Initialization cancelled.");
            return Ok(());
        }
    }
    let new_settings = interactive_config_update(None)?;
    save_settings(&new_settings, &config_path)?;
    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    Ok(())
}

fn handle_config(config: Option<&Path>) -> Result<()> {
    println!(
        "{}",
        style("Updating shadowrestore configuration...").bold()
    );
    let existing_settings =
        load_settings(config).context("Failed to load existing settings.")?;
    let new_settings = interactive_config_update(Some(&existing_settings))?;
    save_settings(&new_settings, &target_config_path(config)?)?;
    println!(
        "\n{}",
        style("Configuration updated successfully!").green().bold()
    );
    Ok(())
}

fn target_config_path(config: Option<&Path>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Settings::config_path()?),
    }
}

fn interactive_config_update(existing: Option<&Settings>) -> Result<Settings> {
    let theme = dialoguer::theme::ColorfulTheme::default();
    let mut settings = existing.cloned().unwrap_or_default();

    settings.mail.relay = Input::with_theme(&theme)
        .with_prompt("SMTP relay host (leave empty to disable e-mail)")
        .default(settings.mail.relay.clone())
        .allow_empty(true)
        .interact_text()?;

    if !settings.mail.relay.is_empty() {
        settings.mail.port = Input::with_theme(&theme)
            .with_prompt("SMTP relay port")
            .default(settings.mail.port)
            .interact_text()?;

        settings.mail.sender = Input::with_theme(&theme)
            .with_prompt("Sender address for notifications")
            .default(settings.mail.sender.clone())
            .allow_empty(true)
            .interact_text()?;
    }

    settings.snapshots.timezone = Input::with_theme(&theme)
        .with_prompt("Timezone the snapshot host reports in ('local' or an offset like +01:00)")
        .default(settings.snapshots.timezone.clone())
        .interact_text()?;

    settings.snapshots.dst.enabled = Confirm::with_theme(&theme)
        .with_prompt(format!(
            "Shift snapshots taken before {} back by {} hour(s)?",
            settings.snapshots.dst.cutover, settings.snapshots.dst.shift_hours
        ))
        .default(settings.snapshots.dst.enabled)
        .interact()?;

    let unc_root: String = Input::with_theme(&theme)
        .with_prompt("Local directory where UNC shares are mounted (leave empty to use UNC paths)")
        .default(describe_opt(settings.paths.unc_root.as_deref()))
        .allow_empty(true)
        .interact_text()?;
    settings.paths.unc_root = (!unc_root.trim().is_empty()).then(|| PathBuf::from(unc_root.trim()));

    settings
        .snapshots
        .zone()
        .context("The timezone entered is not valid")?;
    Ok(settings)
}

fn describe_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

/// Helper to serialize and save settings to the config file.
fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Could not create config directory")?;
    }
    let toml_string =
        toml::to_string_pretty(settings).context("Could not serialize settings to TOML")?;
    fs::write(path, toml_string)
        .with_context(|| format!("Could not write config to '{}'", path.display()))?;
    Ok(())
}
