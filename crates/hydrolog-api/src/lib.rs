use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hydrolog_core::{
    serde_date, validate_container_draft, AppSettings, Badge, BestDay, Challenge, Container,
    ContainerId, ContainerUpdate, HydrationTip, IntakeEventId, MonthlyEntry, SettingsPatch,
    StatsPeriod, TrackerError, UserChallenge, WeeklyEntry,
};
use hydrolog_store_sqlite::{SchemaStatus, SqliteStore, StorageHealthReport};
use hydrolog_vault::{
    ensure_master_key, rotate_master_key, FileSecretStore, IntegrityStatus, IntegrityVerdict,
    SecretStore, TamperDetector,
};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, UtcOffset};

pub const API_CONTRACT_VERSION: &str = "api.v1";

/// Filesystem layout for one tracker instance: the relational store plus the
/// secure side-channel document.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub db_path: PathBuf,
    pub secrets_path: PathBuf,
    pub utc_offset: Option<UtcOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartupReport {
    pub schema: SchemaStatus,
    pub integrity: IntegrityVerdict,
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogIntakeRequest {
    pub amount_ml: i64,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogIntakeResult {
    pub event_id: IntakeEventId,
    #[serde(with = "serde_date")]
    pub date: Date,
    pub daily_total_ml: u32,
}

fn default_is_custom() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateContainerRequest {
    pub name: String,
    pub volume_ml: u32,
    pub kind: String,
    pub color: String,
    #[serde(default = "default_is_custom")]
    pub is_custom: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyStats {
    #[serde(with = "serde_date")]
    pub end_date: Date,
    pub series: Vec<WeeklyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyStats {
    pub year: i32,
    pub month: u8,
    pub series: Vec<MonthlyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSummary {
    pub period: StatsPeriod,
    pub best_day: BestDay,
    pub average_daily_ml: u32,
    pub streak_days: u32,
    pub daily_goal_ml: u32,
    pub today_total_ml: u32,
}

/// The service object consumed by every UI surface. Constructed once per
/// process; `initialize` is guarded by an internal flag so repeated calls
/// skip schema and seed work.
pub struct HydrationApi<S: SecretStore> {
    store: SqliteStore,
    tamper: TamperDetector<S>,
    initialized: bool,
}

impl HydrationApi<FileSecretStore> {
    /// Open the store and the file-backed secret store described by `config`.
    ///
    /// # Errors
    /// Returns an error when either backing file cannot be opened.
    pub fn open(config: &ApiConfig) -> Result<Self> {
        let secrets = FileSecretStore::open(&config.secrets_path)?;
        Self::with_secret_store(&config.db_path, config.utc_offset, secrets)
    }
}

impl<S: SecretStore> HydrationApi<S> {
    /// Open the store with an explicit secret-store implementation.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened.
    pub fn with_secret_store(
        db_path: &Path,
        utc_offset: Option<UtcOffset>,
        secrets: S,
    ) -> Result<Self> {
        let store = match utc_offset {
            Some(offset) => SqliteStore::open_with_offset(db_path, offset)?,
            None => SqliteStore::open(db_path)?,
        };
        Ok(Self { store, tamper: TamperDetector::new(secrets), initialized: false })
    }

    /// Run the startup sequence: ensure schema, seed defaults, migrate
    /// legacy settings, ensure the master key, and verify the integrity
    /// checksum. Idempotent; the schema/seed steps run once per process.
    ///
    /// # Errors
    /// Schema or seed failures are fatal and propagate; an integrity
    /// mismatch is reported in the result, not raised.
    pub fn initialize(&mut self) -> Result<StartupReport> {
        if !self.initialized {
            self.store.migrate().context("startup failed: schema")?;
            self.store.seed_defaults().context("startup failed: seeds")?;
            self.store
                .migrate_legacy_settings()
                .context("startup failed: settings migration")?;
            ensure_master_key(self.tamper.secrets_mut())?;
            self.initialized = true;
        }

        let snapshot = self.store.critical_snapshot()?;
        let integrity = self.tamper.verify(&snapshot)?;
        Ok(StartupReport {
            schema: self.store.schema_status()?,
            integrity,
            settings: self.store.load_settings()?,
        })
    }

    /// Mark the service as shut down; the next call re-runs initialization.
    pub fn shutdown(&mut self) {
        self.initialized = false;
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.initialize()?;
        }
        Ok(())
    }

    fn refresh_checksum(&mut self) -> Result<()> {
        let snapshot = self.store.critical_snapshot()?;
        self.tamper.update_checksum(&snapshot)?;
        Ok(())
    }

    #[must_use]
    pub fn today(&self) -> Date {
        self.store.today()
    }

    // -----------------------------------------------------------------------
    // Intake ledger
    // -----------------------------------------------------------------------

    /// Append one intake event and return its id plus the refreshed total
    /// for the event's date.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for an out-of-range amount;
    /// storage faults otherwise.
    pub fn log_intake(&mut self, request: LogIntakeRequest) -> Result<LogIntakeResult> {
        self.ensure_initialized()?;
        let container_id = request.container_id.map(ContainerId);
        let event_id = self.store.log_intake(request.amount_ml, container_id.as_ref())?;
        let date = self.store.today();
        Ok(LogIntakeResult { event_id, date, daily_total_ml: self.store.daily_total(date)? })
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn daily_total(&mut self, date: Option<Date>) -> Result<u32> {
        self.ensure_initialized()?;
        let date = date.unwrap_or_else(|| self.store.today());
        self.store.daily_total(date)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn hourly_breakdown(&mut self, date: Option<Date>) -> Result<[u32; 24]> {
        self.ensure_initialized()?;
        let date = date.unwrap_or_else(|| self.store.today());
        self.store.hourly_breakdown(date)
    }

    /// Zero-filled 7-day series ending today.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn weekly_stats(&mut self) -> Result<WeeklyStats> {
        self.ensure_initialized()?;
        let end = self.store.today();
        let start = end.checked_sub(Duration::days(6)).unwrap_or(end);
        let totals = self.store.range_totals(start, end)?;
        Ok(WeeklyStats { end_date: end, series: hydrolog_core::weekly_series(end, &totals) })
    }

    /// Zero-filled calendar-month series.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for an invalid month number;
    /// storage faults otherwise.
    pub fn monthly_stats(&mut self, year: i32, month: u8) -> Result<MonthlyStats> {
        self.ensure_initialized()?;
        let month_enum = Month::try_from(month)
            .map_err(|_| TrackerError::Validation(format!("invalid month number: {month}")))?;
        let start = Date::from_calendar_date(year, month_enum, 1)
            .map_err(|_| TrackerError::Validation(format!("invalid month: {year}-{month:02}")))?;
        let last_day = time::util::days_in_year_month(year, month_enum);
        let end = Date::from_calendar_date(year, month_enum, last_day)
            .map_err(|_| TrackerError::Validation(format!("invalid month: {year}-{month:02}")))?;
        let totals = self.store.range_totals(start, end)?;
        Ok(MonthlyStats {
            year,
            month,
            series: hydrolog_core::monthly_series(year, month_enum, &totals),
        })
    }

    /// Best day, average, and streak over the requested period, plus the
    /// current goal and today's running total.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn stats_summary(&mut self, period: StatsPeriod) -> Result<StatsSummary> {
        self.ensure_initialized()?;
        let today = self.store.today();
        Ok(StatsSummary {
            period,
            best_day: self.store.best_day(period)?,
            average_daily_ml: self.store.average_daily(period)?,
            streak_days: self.store.streak_days()?,
            daily_goal_ml: self.store.daily_goal(today)?,
            today_total_ml: self.store.daily_total(today)?,
        })
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn streak_days(&mut self) -> Result<u32> {
        self.ensure_initialized()?;
        self.store.streak_days()
    }

    // -----------------------------------------------------------------------
    // Container catalog
    // -----------------------------------------------------------------------

    /// Validate and create a container, then refresh the checksum.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] before any write when a field is
    /// invalid; storage faults otherwise.
    pub fn create_container(&mut self, request: CreateContainerRequest) -> Result<Container> {
        self.ensure_initialized()?;
        validate_container_draft(
            &request.name,
            request.volume_ml,
            &request.kind,
            &request.color,
        )?;
        let id = self.store.create_container(
            request.name.trim(),
            request.volume_ml,
            &request.kind,
            &request.color,
            request.is_custom,
        )?;
        self.refresh_checksum()?;
        self.store
            .get_container(&id)?
            .with_context(|| format!("container {id} missing after insert"))
    }

    /// Validate and apply a partial container update, then refresh the
    /// checksum. Returns `false` when the update carried no mutable field.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for invalid fields,
    /// [`TrackerError::NotFound`] for a missing id, storage faults otherwise.
    pub fn update_container(&mut self, id: &str, update: &ContainerUpdate) -> Result<bool> {
        self.ensure_initialized()?;
        update.validate()?;
        let changed = self.store.update_container(&ContainerId::from(id), update)?;
        if changed {
            self.refresh_checksum()?;
        }
        Ok(changed)
    }

    /// Soft-delete a container and refresh the checksum. Idempotent.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn delete_container(&mut self, id: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.store.delete_container(&ContainerId::from(id))?;
        self.refresh_checksum()
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_containers(&mut self) -> Result<Vec<Container>> {
        self.ensure_initialized()?;
        self.store.list_active_containers()
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_default_containers(&mut self) -> Result<Vec<Container>> {
        self.ensure_initialized()?;
        self.store.list_default_containers()
    }

    // -----------------------------------------------------------------------
    // Settings & goals
    // -----------------------------------------------------------------------

    /// # Errors
    /// Returns an error on storage faults.
    pub fn settings(&mut self) -> Result<AppSettings> {
        self.ensure_initialized()?;
        self.store.load_settings()
    }

    /// Apply a settings patch and refresh the checksum.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for out-of-range fields;
    /// storage faults otherwise.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<AppSettings> {
        self.ensure_initialized()?;
        let merged = self.store.apply_settings_patch(patch)?;
        if !patch.is_empty() {
            self.refresh_checksum()?;
        }
        Ok(merged)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn daily_goal(&mut self, date: Option<Date>) -> Result<u32> {
        self.ensure_initialized()?;
        let date = date.unwrap_or_else(|| self.store.today());
        self.store.daily_goal(date)
    }

    /// Upsert a per-date goal override.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for an out-of-range amount;
    /// storage faults otherwise.
    pub fn set_daily_goal(&mut self, date: Option<Date>, goal_amount_ml: u32) -> Result<()> {
        self.ensure_initialized()?;
        let date = date.unwrap_or_else(|| self.store.today());
        self.store.set_daily_goal(date, goal_amount_ml)
    }

    // -----------------------------------------------------------------------
    // Challenges, badges, tips
    // -----------------------------------------------------------------------

    /// # Errors
    /// Returns an error on storage faults.
    pub fn challenges(&mut self) -> Result<Vec<Challenge>> {
        self.ensure_initialized()?;
        self.store.list_challenges()
    }

    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown challenge id;
    /// storage faults otherwise.
    pub fn start_challenge(&mut self, challenge_id: &str) -> Result<UserChallenge> {
        self.ensure_initialized()?;
        self.store.start_challenge(challenge_id)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn user_challenges(&mut self) -> Result<Vec<UserChallenge>> {
        self.ensure_initialized()?;
        self.store.list_user_challenges()
    }

    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown row; storage faults
    /// otherwise.
    pub fn update_challenge_progress(
        &mut self,
        user_challenge_id: i64,
        progress: u32,
    ) -> Result<()> {
        self.ensure_initialized()?;
        self.store.update_challenge_progress(user_challenge_id, progress)
    }

    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown row; storage faults
    /// otherwise.
    pub fn complete_challenge(&mut self, user_challenge_id: i64) -> Result<Badge> {
        self.ensure_initialized()?;
        self.store.complete_challenge(user_challenge_id)
    }

    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown row; storage faults
    /// otherwise.
    pub fn fail_challenge(&mut self, user_challenge_id: i64) -> Result<()> {
        self.ensure_initialized()?;
        self.store.fail_challenge(user_challenge_id)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn badges(&mut self) -> Result<Vec<Badge>> {
        self.ensure_initialized()?;
        self.store.list_badges()
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn tips(&mut self) -> Result<Vec<HydrationTip>> {
        self.ensure_initialized()?;
        self.store.list_tips()
    }

    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown tip id; storage
    /// faults otherwise.
    pub fn mark_tip_read(&mut self, tip_id: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.store.mark_tip_read(tip_id)
    }

    // -----------------------------------------------------------------------
    // Integrity & maintenance
    // -----------------------------------------------------------------------

    /// Verify the current critical state against the stored checksum. A
    /// mismatch is advisory; the call itself succeeds.
    ///
    /// # Errors
    /// Returns an error on storage or secret-store faults.
    pub fn verify_integrity(&mut self) -> Result<IntegrityVerdict> {
        self.ensure_initialized()?;
        let snapshot = self.store.critical_snapshot()?;
        self.tamper.verify(&snapshot)
    }

    /// Recompute and persist the checksum for the current critical state.
    ///
    /// # Errors
    /// Returns an error on storage or secret-store faults.
    pub fn update_checksum(&mut self) -> Result<String> {
        self.ensure_initialized()?;
        let snapshot = self.store.critical_snapshot()?;
        self.tamper.update_checksum(&snapshot)
    }

    /// # Errors
    /// Returns an error on secret-store faults.
    pub fn integrity_status(&self) -> Result<IntegrityStatus> {
        self.tamper.status()
    }

    /// # Errors
    /// Returns an error on secret-store faults.
    pub fn rotate_master_key(&mut self) -> Result<String> {
        rotate_master_key(self.tamper.secrets_mut())
    }

    /// Clear all user data, re-seed defaults, and re-baseline the checksum.
    ///
    /// # Errors
    /// Returns an error on storage or secret-store faults.
    pub fn reset_all_data(&mut self) -> Result<StartupReport> {
        self.ensure_initialized()?;
        self.store.reset_all_data()?;
        self.tamper.reset()?;
        let snapshot = self.store.critical_snapshot()?;
        let integrity = self.tamper.verify(&snapshot)?;
        Ok(StartupReport {
            schema: self.store.schema_status()?,
            integrity,
            settings: self.store.load_settings()?,
        })
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn schema_status(&mut self) -> Result<SchemaStatus> {
        self.store.schema_status()
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn storage_health(&mut self) -> Result<StorageHealthReport> {
        self.ensure_initialized()?;
        self.store.storage_health()
    }

    /// # Errors
    /// Returns an error when the backup cannot be written.
    pub fn backup_database(&mut self, out_file: &Path) -> Result<()> {
        self.ensure_initialized()?;
        self.store.backup_database(out_file)
    }

    /// Restore from a backup file and re-baseline the checksum against the
    /// restored state.
    ///
    /// # Errors
    /// Returns an error when the restore or checksum refresh fails.
    pub fn restore_database(&mut self, in_file: &Path) -> Result<()> {
        self.ensure_initialized()?;
        self.store.restore_database(in_file)?;
        self.refresh_checksum()
    }
}
