use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hydrolog_api::{
    ApiConfig, CreateContainerRequest, HydrationApi, LogIntakeRequest, API_CONTRACT_VERSION,
};
use hydrolog_core::{
    parse_date, ContainerUpdate, ReminderFrequency, SettingsPatch, StatsPeriod, Theme, TimeOfDay,
    TrackerError, VolumeUnit,
};
use hydrolog_vault::FileSecretStore;
use serde::Serialize;
use time::Date;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "hydro")]
#[command(about = "Hydrolog CLI")]
struct Cli {
    #[arg(long, default_value = "./hydrolog.sqlite3")]
    db: PathBuf,

    #[arg(long, default_value = "./hydrolog.secrets.json")]
    secrets: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the startup sequence and report schema, settings, and integrity.
    Init,
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    /// Log one intake event.
    Log(LogArgs),
    Stats {
        #[command(subcommand)]
        command: StatsCommand,
    },
    Container {
        #[command(subcommand)]
        command: ContainerCommand,
    },
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    Goal {
        #[command(subcommand)]
        command: GoalCommand,
    },
    Challenge {
        #[command(subcommand)]
        command: ChallengeCommand,
    },
    Tip {
        #[command(subcommand)]
        command: TipCommand,
    },
    Integrity {
        #[command(subcommand)]
        command: IntegrityCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Health,
    Backup(DbBackupArgs),
    Restore(DbRestoreArgs),
    /// Clear all user data and re-seed defaults.
    Reset,
}

#[derive(Debug, Args)]
struct DbBackupArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbRestoreArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Amount in milliliters.
    amount_ml: i64,
    #[arg(long)]
    container: Option<String>,
}

#[derive(Debug, Subcommand)]
enum StatsCommand {
    /// Total for one calendar date (today by default).
    Today(DateArg),
    /// 24-slot hourly breakdown for one date.
    Hourly(DateArg),
    /// Zero-filled 7-day series ending today.
    Weekly,
    /// Zero-filled calendar-month series.
    Monthly(MonthlyArgs),
    /// Best day, average, streak, goal, and today's total.
    Summary(SummaryArgs),
    Streak,
}

#[derive(Debug, Args)]
struct DateArg {
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Args)]
struct MonthlyArgs {
    #[arg(long)]
    year: i32,
    #[arg(long)]
    month: u8,
}

#[derive(Debug, Args)]
struct SummaryArgs {
    #[arg(long, default_value = "month")]
    period: String,
}

#[derive(Debug, Subcommand)]
enum ContainerCommand {
    List,
    Defaults,
    Add(ContainerAddArgs),
    Update(ContainerUpdateArgs),
    Delete(ContainerIdArg),
}

#[derive(Debug, Args)]
struct ContainerAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    volume: u32,
    #[arg(long, default_value = "water-outline")]
    kind: String,
    #[arg(long, default_value = "#4A90E2")]
    color: String,
}

#[derive(Debug, Args)]
struct ContainerUpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    volume: Option<u32>,
    #[arg(long)]
    kind: Option<String>,
    #[arg(long)]
    color: Option<String>,
}

#[derive(Debug, Args)]
struct ContainerIdArg {
    id: String,
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    Show,
    Set(SettingsSetArgs),
}

#[derive(Debug, Args)]
struct SettingsSetArgs {
    #[arg(long)]
    daily_goal: Option<u32>,
    #[arg(long)]
    notifications: Option<bool>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    frequency: Option<String>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    theme: Option<String>,
}

#[derive(Debug, Subcommand)]
enum GoalCommand {
    Show(DateArg),
    Set(GoalSetArgs),
}

#[derive(Debug, Args)]
struct GoalSetArgs {
    amount_ml: u32,
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ChallengeCommand {
    List,
    /// User challenges with progress and status.
    Mine,
    Start(ChallengeIdArg),
    Progress(ChallengeProgressArgs),
    Complete(UserChallengeIdArg),
    Fail(UserChallengeIdArg),
    Badges,
}

#[derive(Debug, Args)]
struct ChallengeIdArg {
    id: String,
}

#[derive(Debug, Args)]
struct UserChallengeIdArg {
    id: i64,
}

#[derive(Debug, Args)]
struct ChallengeProgressArgs {
    id: i64,
    progress: u32,
}

#[derive(Debug, Subcommand)]
enum TipCommand {
    List,
    Read(TipIdArg),
}

#[derive(Debug, Args)]
struct TipIdArg {
    id: String,
}

#[derive(Debug, Subcommand)]
enum IntegrityCommand {
    Verify,
    /// Recompute the checksum after legitimate changes.
    Update,
    Status,
    RotateKey,
}

#[derive(Debug, Serialize)]
struct CliEnvelope<T>
where
    T: Serialize,
{
    cli_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

fn print_envelope<T: Serialize>(data: T) -> Result<()> {
    let envelope = CliEnvelope {
        cli_contract_version: CLI_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&envelope).context("failed to serialize CLI output")?
    );
    Ok(())
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<Date>> {
    match raw {
        Some(value) => Ok(Some(parse_date(value)?)),
        None => Ok(None),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut api = HydrationApi::open(&ApiConfig {
        db_path: cli.db,
        secrets_path: cli.secrets,
        utc_offset: None,
    })?;

    match cli.command {
        Command::Init => print_envelope(api.initialize()?),
        Command::Db { command } => run_db(&mut api, command),
        Command::Log(args) => print_envelope(api.log_intake(LogIntakeRequest {
            amount_ml: args.amount_ml,
            container_id: args.container,
        })?),
        Command::Stats { command } => run_stats(&mut api, command),
        Command::Container { command } => run_container(&mut api, command),
        Command::Settings { command } => run_settings(&mut api, command),
        Command::Goal { command } => run_goal(&mut api, command),
        Command::Challenge { command } => run_challenge(&mut api, command),
        Command::Tip { command } => run_tip(&mut api, command),
        Command::Integrity { command } => run_integrity(&mut api, command),
    }
}

fn run_db(api: &mut HydrationApi<FileSecretStore>, command: DbCommand) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => print_envelope(api.schema_status()?),
        DbCommand::Health => print_envelope(api.storage_health()?),
        DbCommand::Backup(args) => {
            api.backup_database(&args.out)?;
            print_envelope(serde_json::json!({ "backed_up_to": args.out }))
        }
        DbCommand::Restore(args) => {
            api.restore_database(&args.input)?;
            print_envelope(serde_json::json!({ "restored_from": args.input }))
        }
        DbCommand::Reset => print_envelope(api.reset_all_data()?),
    }
}

fn run_stats(api: &mut HydrationApi<FileSecretStore>, command: StatsCommand) -> Result<()> {
    match command {
        StatsCommand::Today(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            print_envelope(serde_json::json!({ "daily_total_ml": api.daily_total(date)? }))
        }
        StatsCommand::Hourly(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            print_envelope(serde_json::json!({ "hourly_ml": api.hourly_breakdown(date)? }))
        }
        StatsCommand::Weekly => print_envelope(api.weekly_stats()?),
        StatsCommand::Monthly(args) => print_envelope(api.monthly_stats(args.year, args.month)?),
        StatsCommand::Summary(args) => {
            let period = StatsPeriod::parse(&args.period).ok_or_else(|| {
                TrackerError::Validation(format!("invalid period: {}", args.period))
            })?;
            print_envelope(api.stats_summary(period)?)
        }
        StatsCommand::Streak => {
            print_envelope(serde_json::json!({ "streak_days": api.streak_days()? }))
        }
    }
}

fn run_container(api: &mut HydrationApi<FileSecretStore>, command: ContainerCommand) -> Result<()> {
    match command {
        ContainerCommand::List => print_envelope(api.list_containers()?),
        ContainerCommand::Defaults => print_envelope(api.list_default_containers()?),
        ContainerCommand::Add(args) => print_envelope(api.create_container(CreateContainerRequest {
            name: args.name,
            volume_ml: args.volume,
            kind: args.kind,
            color: args.color,
            is_custom: true,
        })?),
        ContainerCommand::Update(args) => {
            let update = ContainerUpdate {
                name: args.name,
                volume_ml: args.volume,
                kind: args.kind,
                color: args.color,
            };
            let changed = api.update_container(&args.id, &update)?;
            print_envelope(serde_json::json!({ "id": args.id, "changed": changed }))
        }
        ContainerCommand::Delete(args) => {
            api.delete_container(&args.id)?;
            print_envelope(serde_json::json!({ "id": args.id, "deleted": true }))
        }
    }
}

fn run_settings(api: &mut HydrationApi<FileSecretStore>, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => print_envelope(api.settings()?),
        SettingsCommand::Set(args) => {
            let patch = SettingsPatch {
                daily_goal_ml: args.daily_goal,
                notifications_enabled: args.notifications,
                notification_start: args
                    .start
                    .as_deref()
                    .map(str::parse::<TimeOfDay>)
                    .transpose()?,
                notification_end: args.end.as_deref().map(str::parse::<TimeOfDay>).transpose()?,
                notification_frequency: args
                    .frequency
                    .as_deref()
                    .map(|raw| {
                        ReminderFrequency::parse(raw).ok_or_else(|| {
                            TrackerError::Validation(format!("invalid frequency: {raw}"))
                        })
                    })
                    .transpose()?,
                unit: args
                    .unit
                    .as_deref()
                    .map(|raw| {
                        VolumeUnit::parse(raw).ok_or_else(|| {
                            TrackerError::Validation(format!("invalid unit: {raw}"))
                        })
                    })
                    .transpose()?,
                theme: args
                    .theme
                    .as_deref()
                    .map(|raw| {
                        Theme::parse(raw).ok_or_else(|| {
                            TrackerError::Validation(format!("invalid theme: {raw}"))
                        })
                    })
                    .transpose()?,
            };
            print_envelope(api.update_settings(&patch)?)
        }
    }
}

fn run_goal(api: &mut HydrationApi<FileSecretStore>, command: GoalCommand) -> Result<()> {
    match command {
        GoalCommand::Show(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            print_envelope(serde_json::json!({ "daily_goal_ml": api.daily_goal(date)? }))
        }
        GoalCommand::Set(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            api.set_daily_goal(date, args.amount_ml)?;
            print_envelope(serde_json::json!({ "daily_goal_ml": args.amount_ml }))
        }
    }
}

fn run_challenge(api: &mut HydrationApi<FileSecretStore>, command: ChallengeCommand) -> Result<()> {
    match command {
        ChallengeCommand::List => print_envelope(api.challenges()?),
        ChallengeCommand::Mine => print_envelope(api.user_challenges()?),
        ChallengeCommand::Start(args) => print_envelope(api.start_challenge(&args.id)?),
        ChallengeCommand::Progress(args) => {
            api.update_challenge_progress(args.id, args.progress)?;
            print_envelope(serde_json::json!({ "id": args.id, "progress": args.progress }))
        }
        ChallengeCommand::Complete(args) => print_envelope(api.complete_challenge(args.id)?),
        ChallengeCommand::Fail(args) => {
            api.fail_challenge(args.id)?;
            print_envelope(serde_json::json!({ "id": args.id, "status": "failed" }))
        }
        ChallengeCommand::Badges => print_envelope(api.badges()?),
    }
}

fn run_tip(api: &mut HydrationApi<FileSecretStore>, command: TipCommand) -> Result<()> {
    match command {
        TipCommand::List => print_envelope(api.tips()?),
        TipCommand::Read(args) => {
            api.mark_tip_read(&args.id)?;
            print_envelope(serde_json::json!({ "id": args.id, "read": true }))
        }
    }
}

fn run_integrity(api: &mut HydrationApi<FileSecretStore>, command: IntegrityCommand) -> Result<()> {
    match command {
        IntegrityCommand::Verify => print_envelope(api.verify_integrity()?),
        IntegrityCommand::Update => {
            print_envelope(serde_json::json!({ "checksum": api.update_checksum()? }))
        }
        IntegrityCommand::Status => print_envelope(api.integrity_status()?),
        IntegrityCommand::RotateKey => {
            api.rotate_master_key()?;
            print_envelope(serde_json::json!({ "rotated": true }))
        }
    }
}
