use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hydrolog_core::{
    default_challenges, default_containers, default_tips, format_date, parse_date,
    validate_intake_amount, AppSettings, Badge, BestDay, Challenge, ChallengeGoalType,
    ChallengeStatus, Container, ContainerDigest, ContainerId, ContainerUpdate, CriticalSnapshot,
    DailyTotal, HydrationTip, IntakeEvent, IntakeEventId, ReminderFrequency, SettingsPatch,
    StatsPeriod, TimeOfDay, TrackerError, UserChallenge,
};
use rusqlite::{params, params_from_iter, Connection, DatabaseName, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS water_intake (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  amount INTEGER NOT NULL CHECK (amount > 0),
  container_id TEXT,
  timestamp TEXT NOT NULL,
  date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS containers (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  volume INTEGER NOT NULL CHECK (volume > 0),
  type TEXT NOT NULL,
  color TEXT NOT NULL,
  is_custom INTEGER NOT NULL DEFAULT 0,
  is_active INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_goals (
  date TEXT PRIMARY KEY,
  goal_amount INTEGER NOT NULL CHECK (goal_amount > 0),
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS challenges (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT NOT NULL,
  goal_type TEXT NOT NULL CHECK (goal_type IN ('streak','early_morning','frequency','weekend_streak','daily_amount','monthly_complete')),
  goal_value INTEGER NOT NULL,
  duration_days INTEGER NOT NULL CHECK (duration_days >= 1),
  icon TEXT NOT NULL,
  color TEXT NOT NULL,
  reward_badge TEXT NOT NULL,
  is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS user_challenges (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  challenge_id TEXT NOT NULL,
  start_date TEXT NOT NULL,
  end_date TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('active','completed','failed')),
  progress INTEGER NOT NULL DEFAULT 0,
  completed_at TEXT,
  FOREIGN KEY (challenge_id) REFERENCES challenges(id)
);

CREATE TABLE IF NOT EXISTS badges (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT NOT NULL,
  icon TEXT NOT NULL,
  color TEXT NOT NULL,
  earned_at TEXT NOT NULL,
  challenge_id TEXT,
  FOREIGN KEY (challenge_id) REFERENCES challenges(id)
);

CREATE TABLE IF NOT EXISTS hydration_tips (
  id TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  summary TEXT NOT NULL,
  full_content TEXT NOT NULL,
  category TEXT NOT NULL,
  icon TEXT NOT NULL,
  color TEXT NOT NULL,
  read_at TEXT,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_water_intake_date ON water_intake(date);
CREATE INDEX IF NOT EXISTS idx_water_intake_timestamp ON water_intake(timestamp);
CREATE INDEX IF NOT EXISTS idx_containers_active ON containers(is_active);
CREATE INDEX IF NOT EXISTS idx_user_challenges_status ON user_challenges(status);
";

pub const SETTING_DAILY_GOAL: &str = "dailyGoal";
pub const SETTING_NOTIFICATIONS_ENABLED: &str = "notificationsEnabled";
pub const SETTING_NOTIFICATION_START: &str = "notificationStartTime";
pub const SETTING_NOTIFICATION_END: &str = "notificationEndTime";
pub const SETTING_NOTIFICATION_FREQUENCY: &str = "notificationFrequency";
pub const SETTING_UNIT: &str = "unit";
pub const SETTING_THEME: &str = "theme";

/// Legacy snake_case keys paired with their canonical camelCase keys.
const LEGACY_SETTING_KEYS: &[(&str, &str)] = &[
    ("daily_goal", SETTING_DAILY_GOAL),
    ("notifications_enabled", SETTING_NOTIFICATIONS_ENABLED),
    ("notification_start_time", SETTING_NOTIFICATION_START),
    ("notification_end_time", SETTING_NOTIFICATION_END),
    ("notification_frequency", SETTING_NOTIFICATION_FREQUENCY),
];

pub struct SqliteStore {
    conn: Connection,
    offset: UtcOffset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageHealthReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

impl SqliteStore {
    /// Open the store and configure required runtime pragmas. The device's
    /// local UTC offset is captured once here and used for every derived
    /// calendar date.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot
    /// be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Self::open_with_offset(path, offset)
    }

    /// Open the store with an explicit UTC offset for calendar-date
    /// derivation.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot
    /// be applied.
    pub fn open_with_offset(path: &Path, offset: UtcOffset) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn, offset })
    }

    #[must_use]
    pub fn utc_offset(&self) -> UtcOffset {
        self.offset
    }

    /// The current calendar date at the store's offset.
    #[must_use]
    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.offset).date()
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let (current_version, inferred_from_legacy) = detect_effective_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
            inferred_from_legacy,
        })
    }

    /// Ensure the full schema exists. Safe to call on every startup: all DDL
    /// is `IF NOT EXISTS` and applied versions are recorded exactly once.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any DDL step fails;
    /// startup must treat this as fatal.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version == 0 {
            if table_exists(&self.conn, "water_intake")? {
                // Database predates migration records; adopt it as v1.
                record_schema_version(&self.conn, 1)?;
            } else {
                self.conn
                    .execute_batch(MIGRATION_001_SQL)
                    .context("failed to apply migration v1")?;
                record_schema_version(&self.conn, 1)?;
            }
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Seed default containers, settings, challenges, and tips. Each catalog
    /// is counted first and inserted only when empty, so reseeding is a
    /// no-op.
    ///
    /// # Errors
    /// Returns an error when any seed write fails; startup must treat this
    /// as fatal.
    pub fn seed_defaults(&mut self) -> Result<()> {
        self.seed_containers()?;
        self.seed_settings()?;
        self.seed_challenges()?;
        self.seed_tips()?;
        Ok(())
    }

    fn seed_containers(&mut self) -> Result<()> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM containers WHERE is_custom = 0", [], |row| {
                row.get(0)
            })
            .context("failed to count default containers")?;
        if existing > 0 {
            return Ok(());
        }

        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("failed to start seed transaction")?;
        for seed in default_containers() {
            tx.execute(
                "INSERT INTO containers (id, name, volume, type, color, is_custom, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6)",
                params![seed.id, seed.name, seed.volume_ml, seed.kind, seed.color, now],
            )
            .with_context(|| format!("failed to seed container {}", seed.id))?;
        }
        tx.commit().context("failed to commit container seeds")
    }

    fn seed_settings(&mut self) -> Result<()> {
        let defaults = AppSettings::default();
        if self.get_setting_raw(SETTING_DAILY_GOAL)?.is_none() {
            self.set_setting(SETTING_DAILY_GOAL, &defaults.daily_goal_ml)?;
        }
        if self.get_setting_raw(SETTING_NOTIFICATIONS_ENABLED)?.is_none() {
            self.set_setting(SETTING_NOTIFICATIONS_ENABLED, &defaults.notifications_enabled)?;
            self.set_setting(SETTING_NOTIFICATION_START, &defaults.notification_start)?;
            self.set_setting(SETTING_NOTIFICATION_END, &defaults.notification_end)?;
            self.set_setting(SETTING_NOTIFICATION_FREQUENCY, &defaults.notification_frequency)?;
        }
        if self.get_setting_raw(SETTING_UNIT)?.is_none() {
            self.set_setting(SETTING_UNIT, &defaults.unit)?;
        }
        if self.get_setting_raw(SETTING_THEME)?.is_none() {
            self.set_setting(SETTING_THEME, &defaults.theme)?;
        }
        Ok(())
    }

    fn seed_challenges(&mut self) -> Result<()> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM challenges", [], |row| row.get(0))
            .context("failed to count challenges")?;
        if existing > 0 {
            return Ok(());
        }

        let tx = self.conn.transaction().context("failed to start seed transaction")?;
        for challenge in default_challenges() {
            tx.execute(
                "INSERT INTO challenges (id, name, description, goal_type, goal_value, duration_days, icon, color, reward_badge, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    challenge.id,
                    challenge.name,
                    challenge.description,
                    challenge.goal_type.as_str(),
                    challenge.goal_value,
                    challenge.duration_days,
                    challenge.icon,
                    challenge.color,
                    challenge.reward_badge_id,
                    i64::from(challenge.is_active),
                ],
            )
            .with_context(|| format!("failed to seed challenge {}", challenge.id))?;
        }
        tx.commit().context("failed to commit challenge seeds")
    }

    fn seed_tips(&mut self) -> Result<()> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM hydration_tips", [], |row| row.get(0))
            .context("failed to count hydration tips")?;
        if existing > 0 {
            return Ok(());
        }

        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("failed to start seed transaction")?;
        for tip in default_tips() {
            tx.execute(
                "INSERT INTO hydration_tips (id, title, summary, full_content, category, icon, color, read_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
                params![
                    tip.id,
                    tip.title,
                    tip.summary,
                    tip.full_content,
                    tip.category,
                    tip.icon,
                    tip.color,
                    now
                ],
            )
            .with_context(|| format!("failed to seed tip {}", tip.id))?;
        }
        tx.commit().context("failed to commit tip seeds")
    }

    // -----------------------------------------------------------------------
    // Settings store
    // -----------------------------------------------------------------------

    fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1")
            .context("failed to prepare settings lookup")?;
        let value = stmt.query_row(params![key], |row| row.get::<_, String>(0)).optional()?;
        Ok(value)
    }

    /// Read a setting, falling back to `default` when the key is absent or
    /// its stored JSON does not deserialize to `T`.
    ///
    /// # Errors
    /// Returns an error only on storage faults; a malformed value is treated
    /// as "not set".
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.get_setting_raw(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or(default)),
            None => Ok(default),
        }
    }

    /// Serialize and upsert one setting value, stamping `updated_at`.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails.
    pub fn set_setting<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize setting {key}"))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, raw, now_rfc3339()?],
            )
            .with_context(|| format!("failed to upsert setting {key}"))?;
        Ok(())
    }

    /// Assemble the typed settings projection, applying defaults per key.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn load_settings(&self) -> Result<AppSettings> {
        let defaults = AppSettings::default();
        Ok(AppSettings {
            daily_goal_ml: self.get_setting(SETTING_DAILY_GOAL, defaults.daily_goal_ml)?,
            notifications_enabled: self
                .get_setting(SETTING_NOTIFICATIONS_ENABLED, defaults.notifications_enabled)?,
            notification_start: self
                .get_setting(SETTING_NOTIFICATION_START, defaults.notification_start)?,
            notification_end: self
                .get_setting(SETTING_NOTIFICATION_END, defaults.notification_end)?,
            notification_frequency: self
                .get_setting(SETTING_NOTIFICATION_FREQUENCY, defaults.notification_frequency)?,
            unit: self.get_setting(SETTING_UNIT, defaults.unit)?,
            theme: self.get_setting(SETTING_THEME, defaults.theme)?,
        })
    }

    /// Apply a partial settings update and return the merged projection.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for out-of-range fields before
    /// any write; storage faults otherwise.
    pub fn apply_settings_patch(&mut self, patch: &SettingsPatch) -> Result<AppSettings> {
        patch.validate()?;
        if let Some(goal) = patch.daily_goal_ml {
            self.set_setting(SETTING_DAILY_GOAL, &goal)?;
        }
        if let Some(enabled) = patch.notifications_enabled {
            self.set_setting(SETTING_NOTIFICATIONS_ENABLED, &enabled)?;
        }
        if let Some(start) = patch.notification_start {
            self.set_setting(SETTING_NOTIFICATION_START, &start)?;
        }
        if let Some(end) = patch.notification_end {
            self.set_setting(SETTING_NOTIFICATION_END, &end)?;
        }
        if let Some(frequency) = patch.notification_frequency {
            self.set_setting(SETTING_NOTIFICATION_FREQUENCY, &frequency)?;
        }
        if let Some(unit) = patch.unit {
            self.set_setting(SETTING_UNIT, &unit)?;
        }
        if let Some(theme) = patch.theme {
            self.set_setting(SETTING_THEME, &theme)?;
        }
        self.load_settings()
    }

    /// Migrate legacy snake_case keys and string-typed values into canonical
    /// form. A canonical key that already holds a properly typed value is
    /// never overwritten.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn migrate_legacy_settings(&mut self) -> Result<()> {
        // Re-coerce canonical values persisted as JSON strings.
        if let Some(goal) = self.string_typed_number(SETTING_DAILY_GOAL)? {
            self.set_setting(SETTING_DAILY_GOAL, &goal)?;
        }
        if let Some(enabled) = self.string_typed_bool(SETTING_NOTIFICATIONS_ENABLED)? {
            self.set_setting(SETTING_NOTIFICATIONS_ENABLED, &enabled)?;
        }

        for (legacy_key, canonical_key) in LEGACY_SETTING_KEYS {
            if self.get_setting_raw(canonical_key)?.is_some() {
                continue;
            }
            let Some(raw) = self.get_setting_raw(legacy_key)? else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<Value>(&raw) else {
                continue;
            };
            match *canonical_key {
                SETTING_DAILY_GOAL => {
                    if let Some(goal) = coerce_number(&value) {
                        self.set_setting(canonical_key, &goal)?;
                    }
                }
                SETTING_NOTIFICATIONS_ENABLED => {
                    if let Some(enabled) = coerce_bool(&value) {
                        self.set_setting(canonical_key, &enabled)?;
                    }
                }
                SETTING_NOTIFICATION_FREQUENCY => {
                    if let Some(frequency) =
                        value.as_str().and_then(ReminderFrequency::parse)
                    {
                        self.set_setting(canonical_key, &frequency)?;
                    }
                }
                _ => {
                    if let Some(time) =
                        value.as_str().and_then(|raw| raw.parse::<TimeOfDay>().ok())
                    {
                        self.set_setting(canonical_key, &time)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn string_typed_number(&self, key: &str) -> Result<Option<i64>> {
        let Some(raw) = self.get_setting_raw(key)? else {
            return Ok(None);
        };
        let Ok(Value::String(text)) = serde_json::from_str::<Value>(&raw) else {
            return Ok(None);
        };
        Ok(text.parse::<i64>().ok())
    }

    fn string_typed_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get_setting_raw(key)? else {
            return Ok(None);
        };
        let Ok(Value::String(text)) = serde_json::from_str::<Value>(&raw) else {
            return Ok(None);
        };
        match text.as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Intake ledger
    // -----------------------------------------------------------------------

    /// Append one intake event stamped with the current instant.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] before any storage call when the
    /// amount is out of range; storage faults otherwise.
    pub fn log_intake(
        &mut self,
        amount_ml: i64,
        container_id: Option<&ContainerId>,
    ) -> Result<IntakeEventId> {
        self.log_intake_at(amount_ml, container_id, OffsetDateTime::now_utc())
    }

    /// Append one intake event with an explicit timestamp. The redundant
    /// calendar date is derived from the timestamp at the store's offset.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] before any storage call when the
    /// amount is out of range; storage faults otherwise.
    pub fn log_intake_at(
        &mut self,
        amount_ml: i64,
        container_id: Option<&ContainerId>,
        timestamp: OffsetDateTime,
    ) -> Result<IntakeEventId> {
        let amount = validate_intake_amount(amount_ml)?;
        let date = timestamp.to_offset(self.offset).date();
        self.conn
            .execute(
                "INSERT INTO water_intake (amount, container_id, timestamp, date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    amount,
                    container_id.map(ContainerId::as_str),
                    rfc3339(timestamp)?,
                    format_date(date)
                ],
            )
            .context("failed to insert intake event")?;
        Ok(IntakeEventId(self.conn.last_insert_rowid()))
    }

    /// Sum of amounts for one calendar date; 0 when no events exist.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn daily_total(&self, date: Date) -> Result<u32> {
        let total: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM water_intake WHERE date = ?1",
                params![format_date(date)],
                |row| row.get(0),
            )
            .context("failed to sum daily intake")?;
        u32::try_from(total).context("daily total out of range")
    }

    /// Per-hour sums for one calendar date as a fixed 24-slot array.
    ///
    /// # Errors
    /// Returns an error on storage faults or undecodable timestamps.
    pub fn hourly_breakdown(&self, date: Date) -> Result<[u32; 24]> {
        let mut stmt = self
            .conn
            .prepare("SELECT timestamp, amount FROM water_intake WHERE date = ?1")
            .context("failed to prepare hourly query")?;
        let rows = stmt
            .query_map(params![format_date(date)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })
            .context("failed to query hourly intake")?;

        let mut samples = Vec::new();
        for row in rows {
            let (raw_timestamp, amount) = row?;
            let timestamp = parse_rfc3339(&raw_timestamp)?;
            samples.push((timestamp.to_offset(self.offset).hour(), amount));
        }
        Ok(hydrolog_core::hourly_buckets(&samples))
    }

    /// Per-date sums over an inclusive range. Dates without events are not
    /// present in the result; series builders zero-fill them.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn range_totals(&self, start: Date, end: Date) -> Result<Vec<DailyTotal>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, COALESCE(SUM(amount), 0) FROM water_intake
                 WHERE date BETWEEN ?1 AND ?2
                 GROUP BY date
                 ORDER BY date ASC",
            )
            .context("failed to prepare range query")?;
        let rows = stmt
            .query_map(params![format_date(start), format_date(end)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .context("failed to query range totals")?;

        let mut totals = Vec::new();
        for row in rows {
            let (raw_date, total) = row?;
            totals.push(DailyTotal {
                date: parse_date(&raw_date)?,
                consumed_ml: u32::try_from(total).context("range total out of range")?,
            });
        }
        Ok(totals)
    }

    /// All intake events for one calendar date in insertion order.
    ///
    /// # Errors
    /// Returns an error on storage faults or undecodable rows.
    pub fn list_intake_for_date(&self, date: Date) -> Result<Vec<IntakeEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, amount, container_id, timestamp, date FROM water_intake
                 WHERE date = ?1
                 ORDER BY timestamp ASC, id ASC",
            )
            .context("failed to prepare intake listing")?;
        let rows = stmt
            .query_map(params![format_date(date)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .context("failed to query intake events")?;

        let mut events = Vec::new();
        for row in rows {
            let (id, amount_ml, container_id, raw_timestamp, raw_date) = row?;
            events.push(IntakeEvent {
                id: IntakeEventId(id),
                amount_ml,
                container_id: container_id.map(ContainerId),
                timestamp: parse_rfc3339(&raw_timestamp)?,
                date: parse_date(&raw_date)?,
            });
        }
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Container catalog
    // -----------------------------------------------------------------------

    /// Insert a container with a generated prefixed id; `is_active` starts
    /// true. Field validation is the caller-facing layer's responsibility.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn create_container(
        &mut self,
        name: &str,
        volume_ml: u32,
        kind: &str,
        color: &str,
        is_custom: bool,
    ) -> Result<ContainerId> {
        let id = ContainerId::generate(is_custom);
        self.conn
            .execute(
                "INSERT INTO containers (id, name, volume, type, color, is_custom, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                params![id.as_str(), name, volume_ml, kind, color, i64::from(is_custom), now_rfc3339()?],
            )
            .context("failed to insert container")?;
        Ok(id)
    }

    /// Apply the mutable fields of `update`. Returns `Ok(false)` when the
    /// update carries no mutable field.
    ///
    /// # Errors
    /// Returns [`TrackerError::NotFound`] when no container matches `id`;
    /// storage faults otherwise.
    pub fn update_container(&mut self, id: &ContainerId, update: &ContainerUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(name) = &update.name {
            assignments.push("name = ?");
            bound.push(Box::new(name.clone()));
        }
        if let Some(volume_ml) = update.volume_ml {
            assignments.push("volume = ?");
            bound.push(Box::new(volume_ml));
        }
        if let Some(kind) = &update.kind {
            assignments.push("type = ?");
            bound.push(Box::new(kind.clone()));
        }
        if let Some(color) = &update.color {
            assignments.push("color = ?");
            bound.push(Box::new(color.clone()));
        }
        bound.push(Box::new(id.as_str().to_string()));

        let sql = format!("UPDATE containers SET {} WHERE id = ?", assignments.join(", "));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(bound.iter().map(|value| &**value)))
            .context("failed to update container")?;

        if changed == 0 {
            return Err(TrackerError::NotFound(format!("container {id} does not exist")).into());
        }
        Ok(true)
    }

    /// Soft-delete a container; repeatable, and a no-op for unknown ids so
    /// historical intake rows stay displayable.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn delete_container(&mut self, id: &ContainerId) -> Result<()> {
        self.conn
            .execute("UPDATE containers SET is_active = 0 WHERE id = ?1", params![id.as_str()])
            .context("failed to soft-delete container")?;
        Ok(())
    }

    /// Active containers, defaults first, then alphabetical by name.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_active_containers(&self) -> Result<Vec<Container>> {
        self.query_containers(
            "SELECT id, name, volume, type, color, is_custom, is_active, created_at
             FROM containers WHERE is_active = 1
             ORDER BY is_custom ASC, name ASC, id ASC",
        )
    }

    /// Seeded (non-custom) containers that are still active.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_default_containers(&self) -> Result<Vec<Container>> {
        self.query_containers(
            "SELECT id, name, volume, type, color, is_custom, is_active, created_at
             FROM containers WHERE is_custom = 0 AND is_active = 1
             ORDER BY name ASC, id ASC",
        )
    }

    fn query_containers(&self, sql: &str) -> Result<Vec<Container>> {
        let mut stmt = self.conn.prepare(sql).context("failed to prepare container listing")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .context("failed to query containers")?;

        let mut containers = Vec::new();
        for row in rows {
            let (id, name, volume_ml, kind, color, is_custom, is_active, raw_created) = row?;
            containers.push(Container {
                id: ContainerId(id),
                name,
                volume_ml,
                kind,
                color,
                is_custom: is_custom != 0,
                is_active: is_active != 0,
                created_at: parse_rfc3339(&raw_created)?,
            });
        }
        Ok(containers)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn get_container(&self, id: &ContainerId) -> Result<Option<Container>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, volume, type, color, is_custom, is_active, created_at
                 FROM containers WHERE id = ?1",
            )
            .context("failed to prepare container lookup")?;
        let row = stmt
            .query_row(params![id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .optional()?;

        match row {
            Some((id, name, volume_ml, kind, color, is_custom, is_active, raw_created)) => {
                Ok(Some(Container {
                    id: ContainerId(id),
                    name,
                    volume_ml,
                    kind,
                    color,
                    is_custom: is_custom != 0,
                    is_active: is_active != 0,
                    created_at: parse_rfc3339(&raw_created)?,
                }))
            }
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Daily goals
    // -----------------------------------------------------------------------

    /// Goal for one date: the per-day override when present, otherwise the
    /// generic daily-goal setting.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn daily_goal(&self, date: Date) -> Result<u32> {
        let override_goal: Option<u32> = self
            .conn
            .prepare("SELECT goal_amount FROM daily_goals WHERE date = ?1")
            .context("failed to prepare goal lookup")?
            .query_row(params![format_date(date)], |row| row.get(0))
            .optional()?;
        match override_goal {
            Some(goal) => Ok(goal),
            None => self.get_setting(SETTING_DAILY_GOAL, hydrolog_core::DEFAULT_DAILY_GOAL_ML),
        }
    }

    /// Upsert a per-date goal override.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] for an out-of-range amount;
    /// storage faults otherwise.
    pub fn set_daily_goal(&mut self, date: Date, goal_amount_ml: u32) -> Result<()> {
        validate_intake_amount(i64::from(goal_amount_ml))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO daily_goals (date, goal_amount, created_at)
                 VALUES (?1, ?2, ?3)",
                params![format_date(date), goal_amount_ml, now_rfc3339()?],
            )
            .context("failed to upsert daily goal")?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived statistics
    // -----------------------------------------------------------------------

    /// Consecutive days ending today whose totals meet the current daily
    /// goal, bounded at 30 days back.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn streak_days(&self) -> Result<u32> {
        let goal: u32 = self.get_setting(SETTING_DAILY_GOAL, hydrolog_core::DEFAULT_DAILY_GOAL_ML)?;
        let today = self.today();
        let start = window_start(today, hydrolog_core::STREAK_LOOKBACK_DAYS.into());
        let totals = self.range_totals(start, today)?;
        Ok(hydrolog_core::streak_days(today, goal, &totals))
    }

    /// Highest-consumption day inside the period ending today.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn best_day(&self, period: StatsPeriod) -> Result<BestDay> {
        let totals = self.period_totals(period)?;
        Ok(hydrolog_core::best_day(&totals))
    }

    /// Mean intake over event-bearing days inside the period ending today.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn average_daily(&self, period: StatsPeriod) -> Result<u32> {
        let totals = self.period_totals(period)?;
        Ok(hydrolog_core::average_daily(&totals))
    }

    fn period_totals(&self, period: StatsPeriod) -> Result<Vec<DailyTotal>> {
        let today = self.today();
        let start = window_start(today, period.days().into());
        self.range_totals(start, today)
    }

    // -----------------------------------------------------------------------
    // Challenges, badges, tips
    // -----------------------------------------------------------------------

    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_challenges(&self) -> Result<Vec<Challenge>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, description, goal_type, goal_value, duration_days, icon, color, reward_badge, is_active
                 FROM challenges WHERE is_active = 1 ORDER BY id ASC",
            )
            .context("failed to prepare challenge listing")?;
        let rows = stmt.query_map([], challenge_from_row).context("failed to query challenges")?;

        let mut challenges = Vec::new();
        for row in rows {
            challenges.push(row?);
        }
        Ok(challenges)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, description, goal_type, goal_value, duration_days, icon, color, reward_badge, is_active
                 FROM challenges WHERE id = ?1",
            )
            .context("failed to prepare challenge lookup")?;
        let challenge =
            stmt.query_row(params![challenge_id], challenge_from_row).optional()?;
        Ok(challenge)
    }

    /// Start a challenge today: `end_date = start_date + duration_days`.
    ///
    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown challenge id;
    /// storage faults otherwise.
    pub fn start_challenge(&mut self, challenge_id: &str) -> Result<UserChallenge> {
        let challenge = self.get_challenge(challenge_id)?.ok_or_else(|| {
            TrackerError::NotFound(format!("challenge {challenge_id} does not exist"))
        })?;

        let start_date = self.today();
        let end_date = start_date
            .checked_add(Duration::days(i64::from(challenge.duration_days)))
            .context("challenge end date out of range")?;

        self.conn
            .execute(
                "INSERT INTO user_challenges (challenge_id, start_date, end_date, status, progress, completed_at)
                 VALUES (?1, ?2, ?3, ?4, 0, NULL)",
                params![
                    challenge.id,
                    format_date(start_date),
                    format_date(end_date),
                    ChallengeStatus::Active.as_str()
                ],
            )
            .context("failed to insert user challenge")?;

        Ok(UserChallenge {
            id: self.conn.last_insert_rowid(),
            challenge_id: challenge.id,
            start_date,
            end_date,
            status: ChallengeStatus::Active,
            progress: 0,
            completed_at: None,
        })
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_user_challenges(&self) -> Result<Vec<UserChallenge>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, challenge_id, start_date, end_date, status, progress, completed_at
                 FROM user_challenges ORDER BY id ASC",
            )
            .context("failed to prepare user challenge listing")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .context("failed to query user challenges")?;

        let mut user_challenges = Vec::new();
        for row in rows {
            let (id, challenge_id, raw_start, raw_end, raw_status, progress, raw_completed) = row?;
            user_challenges.push(UserChallenge {
                id,
                challenge_id,
                start_date: parse_date(&raw_start)?,
                end_date: parse_date(&raw_end)?,
                status: ChallengeStatus::parse(&raw_status)
                    .ok_or_else(|| anyhow!("unknown challenge status: {raw_status}"))?,
                progress,
                completed_at: raw_completed.as_deref().map(parse_rfc3339).transpose()?,
            });
        }
        Ok(user_challenges)
    }

    /// Overwrite the progress counter of one user challenge.
    ///
    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown row; storage faults
    /// otherwise.
    pub fn update_challenge_progress(&mut self, user_challenge_id: i64, progress: u32) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE user_challenges SET progress = ?1 WHERE id = ?2",
                params![progress, user_challenge_id],
            )
            .context("failed to update challenge progress")?;
        if changed == 0 {
            return Err(TrackerError::NotFound(format!(
                "user challenge {user_challenge_id} does not exist"
            ))
            .into());
        }
        Ok(())
    }

    /// Mark one user challenge completed, stamp `completed_at`, and award
    /// the challenge's reward badge.
    ///
    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown row; storage faults
    /// otherwise.
    pub fn complete_challenge(&mut self, user_challenge_id: i64) -> Result<Badge> {
        let challenge_id: Option<String> = self
            .conn
            .prepare("SELECT challenge_id FROM user_challenges WHERE id = ?1")
            .context("failed to prepare user challenge lookup")?
            .query_row(params![user_challenge_id], |row| row.get(0))
            .optional()?;
        let challenge_id = challenge_id.ok_or_else(|| {
            TrackerError::NotFound(format!("user challenge {user_challenge_id} does not exist"))
        })?;
        let challenge = self
            .get_challenge(&challenge_id)?
            .ok_or_else(|| TrackerError::NotFound(format!("challenge {challenge_id} does not exist")))?;

        let now = OffsetDateTime::now_utc();
        let tx = self.conn.transaction().context("failed to start completion transaction")?;
        tx.execute(
            "UPDATE user_challenges SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![ChallengeStatus::Completed.as_str(), rfc3339(now)?, user_challenge_id],
        )
        .context("failed to mark challenge completed")?;

        let badge = Badge {
            id: challenge.reward_badge_id.clone(),
            name: challenge.name.clone(),
            description: format!("Completed the {} challenge", challenge.name),
            icon: challenge.icon.clone(),
            color: challenge.color.clone(),
            earned_at: now,
            challenge_id: Some(challenge.id.clone()),
        };
        tx.execute(
            "INSERT OR IGNORE INTO badges (id, name, description, icon, color, earned_at, challenge_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                badge.id,
                badge.name,
                badge.description,
                badge.icon,
                badge.color,
                rfc3339(badge.earned_at)?,
                badge.challenge_id
            ],
        )
        .context("failed to award badge")?;
        tx.commit().context("failed to commit challenge completion")?;
        Ok(badge)
    }

    /// Mark one user challenge failed.
    ///
    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown row; storage faults
    /// otherwise.
    pub fn fail_challenge(&mut self, user_challenge_id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE user_challenges SET status = ?1 WHERE id = ?2",
                params![ChallengeStatus::Failed.as_str(), user_challenge_id],
            )
            .context("failed to mark challenge failed")?;
        if changed == 0 {
            return Err(TrackerError::NotFound(format!(
                "user challenge {user_challenge_id} does not exist"
            ))
            .into());
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_badges(&self) -> Result<Vec<Badge>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, description, icon, color, earned_at, challenge_id
                 FROM badges ORDER BY earned_at ASC, id ASC",
            )
            .context("failed to prepare badge listing")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .context("failed to query badges")?;

        let mut badges = Vec::new();
        for row in rows {
            let (id, name, description, icon, color, raw_earned, challenge_id) = row?;
            badges.push(Badge {
                id,
                name,
                description,
                icon,
                color,
                earned_at: parse_rfc3339(&raw_earned)?,
                challenge_id,
            });
        }
        Ok(badges)
    }

    /// # Errors
    /// Returns an error on storage faults.
    pub fn list_tips(&self) -> Result<Vec<HydrationTip>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, summary, full_content, category, icon, color, read_at, created_at
                 FROM hydration_tips ORDER BY id ASC",
            )
            .context("failed to prepare tip listing")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })
            .context("failed to query hydration tips")?;

        let mut tips = Vec::new();
        for row in rows {
            let (id, title, summary, full_content, category, icon, color, raw_read, raw_created) =
                row?;
            tips.push(HydrationTip {
                id,
                title,
                summary,
                full_content,
                category,
                icon,
                color,
                read_at: raw_read.as_deref().map(parse_rfc3339).transpose()?,
                created_at: parse_rfc3339(&raw_created)?,
            });
        }
        Ok(tips)
    }

    /// Stamp `read_at` on one tip; repeat reads keep the first stamp.
    ///
    /// # Errors
    /// Returns [`TrackerError::NotFound`] for an unknown tip id; storage
    /// faults otherwise.
    pub fn mark_tip_read(&mut self, tip_id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE hydration_tips SET read_at = COALESCE(read_at, ?1) WHERE id = ?2",
                params![now_rfc3339()?, tip_id],
            )
            .context("failed to mark tip read")?;
        if changed == 0 {
            return Err(TrackerError::NotFound(format!("tip {tip_id} does not exist")).into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Critical snapshot & maintenance
    // -----------------------------------------------------------------------

    /// The deterministic critical-state snapshot covered by the integrity
    /// checksum: active container triples plus the settings projection.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn critical_snapshot(&self) -> Result<CriticalSnapshot> {
        let containers = self
            .list_active_containers()?
            .into_iter()
            .map(|container| ContainerDigest {
                id: container.id,
                name: container.name,
                volume_ml: container.volume_ml,
            })
            .collect();
        Ok(CriticalSnapshot { containers, settings: self.load_settings()? })
    }

    /// Clear all user data (intake, custom containers, settings, goal
    /// overrides, challenge progress, badges) and re-seed defaults. The
    /// static challenge and tip catalogs stay in place.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn reset_all_data(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                "DELETE FROM water_intake;
                 DELETE FROM user_challenges;
                 DELETE FROM badges;
                 DELETE FROM containers WHERE is_custom = 1;
                 UPDATE containers SET is_active = 1 WHERE is_custom = 0;
                 DELETE FROM settings;
                 DELETE FROM daily_goals;",
            )
            .context("failed to reset data")?;
        self.seed_defaults()
    }

    /// Create a `SQLite` backup file of the current main database.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup
    /// fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }
        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }

    /// Restore this database from a `SQLite` backup file, then re-apply the
    /// schema manager.
    ///
    /// # Errors
    /// Returns an error when the backup file is missing, restore fails, or
    /// migrations fail.
    pub fn restore_database(&mut self, in_file: &Path) -> Result<()> {
        if !in_file.exists() {
            return Err(anyhow!("backup file does not exist: {}", in_file.display()));
        }
        self.conn
            .restore(DatabaseName::Main, in_file, None::<fn(rusqlite::backup::Progress)>)
            .with_context(|| format!("failed to restore sqlite backup from {}", in_file.display()))?;
        self.migrate()
    }

    /// Run quick-check, foreign-key-check, and schema status health probes
    /// against the storage engine itself.
    ///
    /// # Errors
    /// Returns an error when any probe query fails.
    pub fn storage_health(&self) -> Result<StorageHealthReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(StorageHealthReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }
}

fn challenge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    let raw_goal_type: String = row.get(3)?;
    let goal_type = ChallengeGoalType::parse(&raw_goal_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(TrackerError::Validation(format!("invalid goal type: {raw_goal_type}"))),
        )
    })?;
    Ok(Challenge {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        goal_type,
        goal_value: row.get(4)?,
        duration_days: row.get(5)?,
        icon: row.get(6)?,
        color: row.get(7)?,
        reward_badge_id: row.get(8)?,
        is_active: row.get::<_, i64>(9)? != 0,
    })
}

fn window_start(end: Date, days: i64) -> Date {
    end.checked_sub(Duration::days(days.saturating_sub(1))).unwrap_or(end)
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn detect_effective_schema_version(conn: &Connection) -> Result<(i64, bool)> {
    let recorded = current_schema_version(conn)?;
    if recorded > 0 {
        return Ok((recorded, false));
    }
    if table_exists(conn, "water_intake")? {
        return Ok((1, true));
    }
    Ok((0, false))
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn coerce_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn now_rfc3339() -> Result<String> {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

#[cfg(test)]
mod tests {
    use hydrolog_core::{AppSettings, Theme, VolumeUnit};
    use time::Month;
    use ulid::Ulid;

    use super::*;

    fn open_store() -> Result<SqliteStore> {
        let mut store = SqliteStore::open_with_offset(Path::new(":memory:"), UtcOffset::UTC)?;
        store.migrate()?;
        store.seed_defaults()?;
        Ok(store)
    }

    fn at(date: Date, hour: u8, minute: u8) -> Result<OffsetDateTime> {
        Ok(date.with_hms(hour, minute, 0).context("invalid fixture time")?.assume_utc())
    }

    fn day(year: i32, month: u8, date: u8) -> Result<Date> {
        Ok(Date::from_calendar_date(year, Month::try_from(month)?, date)?)
    }

    #[test]
    fn migrate_and_seed_are_idempotent() -> Result<()> {
        let mut store = open_store()?;
        store.migrate()?;
        store.seed_defaults()?;
        store.migrate()?;
        store.seed_defaults()?;

        let containers = store.list_active_containers()?;
        assert_eq!(containers.len(), 3);
        assert_eq!(store.list_challenges()?.len(), 6);
        assert_eq!(store.list_tips()?.len(), 6);

        let status = store.schema_status()?;
        assert_eq!(status.current_version, 1);
        assert!(status.pending_versions.is_empty());
        Ok(())
    }

    #[test]
    fn seeded_containers_keep_well_known_ids_and_order() -> Result<()> {
        let store = open_store()?;
        let containers = store.list_active_containers()?;
        let ids: Vec<&str> = containers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bottle-500", "glass-250", "large-1000"]);
        assert!(containers.iter().all(|c| !c.is_custom && c.is_active));
        Ok(())
    }

    #[test]
    fn log_intake_reflects_in_daily_total_and_hourly_breakdown() -> Result<()> {
        let mut store = open_store()?;
        let date = day(2026, 8, 7)?;
        let glass = ContainerId::from("glass-250");
        let bottle = ContainerId::from("bottle-500");

        store.log_intake_at(250, Some(&glass), at(date, 8, 15)?)?;
        store.log_intake_at(500, Some(&bottle), at(date, 12, 30)?)?;

        assert_eq!(store.daily_total(date)?, 750);

        let hourly = store.hourly_breakdown(date)?;
        assert_eq!(hourly[8], 250);
        assert_eq!(hourly[12], 500);
        let rest: u32 = hourly
            .iter()
            .enumerate()
            .filter(|(hour, _)| *hour != 8 && *hour != 12)
            .map(|(_, amount)| *amount)
            .sum();
        assert_eq!(rest, 0);

        // A neighboring date stays untouched.
        assert_eq!(store.daily_total(day(2026, 8, 8)?)?, 0);
        Ok(())
    }

    #[test]
    fn empty_date_yields_zero_total_and_zero_filled_hours() -> Result<()> {
        let store = open_store()?;
        let date = day(2026, 1, 1)?;
        assert_eq!(store.daily_total(date)?, 0);
        assert_eq!(store.hourly_breakdown(date)?, [0_u32; 24]);
        Ok(())
    }

    #[test]
    fn invalid_amounts_fail_validation_before_storage() -> Result<()> {
        let mut store = open_store()?;
        for amount in [0_i64, -250, 10_001] {
            let err = match store.log_intake(amount, None) {
                Ok(_) => return Err(anyhow!("expected {amount} to be rejected")),
                Err(err) => err,
            };
            assert!(matches!(
                err.downcast_ref::<TrackerError>(),
                Some(TrackerError::Validation(_))
            ));
        }
        assert_eq!(store.daily_total(store.today())?, 0);
        Ok(())
    }

    #[test]
    fn range_totals_group_by_date_and_skip_gaps() -> Result<()> {
        let mut store = open_store()?;
        store.log_intake_at(500, None, at(day(2026, 8, 1)?, 9, 0)?)?;
        store.log_intake_at(300, None, at(day(2026, 8, 1)?, 18, 0)?)?;
        store.log_intake_at(700, None, at(day(2026, 8, 3)?, 9, 0)?)?;

        let totals = store.range_totals(day(2026, 8, 1)?, day(2026, 8, 7)?)?;
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].date, day(2026, 8, 1)?);
        assert_eq!(totals[0].consumed_ml, 800);
        assert_eq!(totals[1].date, day(2026, 8, 3)?);
        assert_eq!(totals[1].consumed_ml, 700);
        Ok(())
    }

    #[test]
    fn calendar_date_follows_store_offset() -> Result<()> {
        let mut store = SqliteStore::open_with_offset(
            Path::new(":memory:"),
            UtcOffset::from_hms(2, 0, 0)?,
        )?;
        store.migrate()?;
        store.seed_defaults()?;

        // 23:30 UTC is already the next day at +02:00.
        let timestamp = at(day(2026, 8, 7)?, 23, 30)?;
        store.log_intake_at(400, None, timestamp)?;

        assert_eq!(store.daily_total(day(2026, 8, 8)?)?, 400);
        assert_eq!(store.daily_total(day(2026, 8, 7)?)?, 0);
        let hourly = store.hourly_breakdown(day(2026, 8, 8)?)?;
        assert_eq!(hourly[1], 400);
        Ok(())
    }

    #[test]
    fn streak_counts_consecutive_goal_days_ending_today() -> Result<()> {
        let mut store = open_store()?;
        let today = store.today();
        let yesterday = today.previous_day().context("no previous day")?;

        store.log_intake_at(2000, None, at(today, 9, 0)?)?;
        store.log_intake_at(2100, None, at(yesterday, 9, 0)?)?;

        assert_eq!(store.streak_days()?, 2);
        Ok(())
    }

    #[test]
    fn streak_breaks_on_below_goal_day() -> Result<()> {
        let mut store = open_store()?;
        let today = store.today();
        let yesterday = today.previous_day().context("no previous day")?;

        store.log_intake_at(1500, None, at(today, 9, 0)?)?;
        store.log_intake_at(2100, None, at(yesterday, 9, 0)?)?;

        assert_eq!(store.streak_days()?, 0);
        Ok(())
    }

    #[test]
    fn best_day_and_average_use_period_window() -> Result<()> {
        let mut store = open_store()?;
        let today = store.today();
        let yesterday = today.previous_day().context("no previous day")?;

        store.log_intake_at(1000, None, at(today, 9, 0)?)?;
        store.log_intake_at(3000, None, at(yesterday, 9, 0)?)?;

        let best = store.best_day(StatsPeriod::Week)?;
        assert_eq!(best.date, Some(yesterday));
        assert_eq!(best.consumed_ml, 3000);
        assert_eq!(store.average_daily(StatsPeriod::Week)?, 2000);

        let empty = SqliteStore::open_with_offset(Path::new(":memory:"), UtcOffset::UTC);
        let mut empty = empty?;
        empty.migrate()?;
        assert_eq!(empty.best_day(StatsPeriod::Month)?.consumed_ml, 0);
        assert_eq!(empty.average_daily(StatsPeriod::Month)?, 0);
        Ok(())
    }

    #[test]
    fn container_crud_round_trip() -> Result<()> {
        let mut store = open_store()?;
        let id = store.create_container("Tumbler", 600, "cup-outline", "#112233", true)?;
        assert!(id.as_str().starts_with("custom-"));

        let updated = store.update_container(
            &id,
            &ContainerUpdate { volume_ml: Some(700), ..ContainerUpdate::default() },
        )?;
        assert!(updated);

        let containers = store.list_active_containers()?;
        let tumbler = containers
            .iter()
            .find(|container| container.id == id)
            .context("tumbler missing from listing")?;
        assert_eq!(tumbler.name, "Tumbler");
        assert_eq!(tumbler.volume_ml, 700);
        assert!(tumbler.is_custom);

        // Custom containers list after the three defaults.
        assert_eq!(containers.len(), 4);
        assert_eq!(containers[3].id, id);
        Ok(())
    }

    #[test]
    fn empty_update_is_a_no_op_and_missing_id_is_not_found() -> Result<()> {
        let mut store = open_store()?;
        let id = store.create_container("Mug", 300, "cafe-outline", "#445566", true)?;

        assert!(!store.update_container(&id, &ContainerUpdate::default())?);

        let missing = ContainerId::from("custom-does-not-exist");
        let err = match store.update_container(
            &missing,
            &ContainerUpdate { name: Some("Ghost".to_string()), ..ContainerUpdate::default() },
        ) {
            Ok(_) => return Err(anyhow!("expected missing id to fail")),
            Err(err) => err,
        };
        assert!(matches!(err.downcast_ref::<TrackerError>(), Some(TrackerError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn soft_delete_hides_container_but_keeps_intake_history() -> Result<()> {
        let mut store = open_store()?;
        let date = day(2026, 8, 7)?;
        let id = store.create_container("Flask", 750, "flask-outline", "#778899", true)?;
        store.log_intake_at(750, Some(&id), at(date, 10, 0)?)?;

        store.delete_container(&id)?;
        store.delete_container(&id)?; // idempotent

        assert!(store.list_active_containers()?.iter().all(|container| container.id != id));
        let deleted = store.get_container(&id)?.context("row should survive soft delete")?;
        assert!(!deleted.is_active);

        let events = store.list_intake_for_date(date)?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].container_id.as_ref(), Some(&id));
        assert_eq!(events[0].amount_ml, 750);
        Ok(())
    }

    #[test]
    fn settings_round_trip_arbitrary_json_shapes() -> Result<()> {
        #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
        struct Nested {
            label: String,
            counts: Vec<u32>,
        }

        let mut store = open_store()?;
        let value = Nested { label: "shape".to_string(), counts: vec![1, 2, 3] };
        store.set_setting("customShape", &value)?;

        let loaded: Nested = store.get_setting(
            "customShape",
            Nested { label: String::new(), counts: Vec::new() },
        )?;
        assert_eq!(loaded, value);

        // Absent key and undeserializable value both resolve to the default.
        assert_eq!(store.get_setting("missingKey", 42_u32)?, 42);
        store.set_setting("customShape", &"not a nested struct")?;
        let fallback: Nested =
            store.get_setting("customShape", Nested { label: "d".to_string(), counts: vec![] })?;
        assert_eq!(fallback.label, "d");
        Ok(())
    }

    #[test]
    fn settings_patch_merges_into_projection() -> Result<()> {
        let mut store = open_store()?;
        let patch = SettingsPatch {
            daily_goal_ml: Some(2500),
            unit: Some(VolumeUnit::Oz),
            ..SettingsPatch::default()
        };
        let merged = store.apply_settings_patch(&patch)?;
        assert_eq!(merged.daily_goal_ml, 2500);
        assert_eq!(merged.unit, VolumeUnit::Oz);
        assert_eq!(merged.theme, Theme::System);

        let reloaded = store.load_settings()?;
        assert_eq!(reloaded, merged);
        Ok(())
    }

    #[test]
    fn legacy_keys_backfill_only_when_canonical_is_absent() -> Result<()> {
        let mut store = SqliteStore::open_with_offset(Path::new(":memory:"), UtcOffset::UTC)?;
        store.migrate()?;

        // Legacy snake_case rows written by an old build: the goal as a
        // string, the toggle as a string.
        store.set_setting("daily_goal", &"2500")?;
        store.set_setting("notifications_enabled", &"true")?;
        store.set_setting("notification_start_time", &"07:30")?;
        store.migrate_legacy_settings()?;

        let settings = store.load_settings()?;
        assert_eq!(settings.daily_goal_ml, 2500);
        assert!(settings.notifications_enabled);
        assert_eq!(settings.notification_start.to_string(), "07:30");
        Ok(())
    }

    #[test]
    fn stale_legacy_value_never_clobbers_canonical() -> Result<()> {
        let mut store = SqliteStore::open_with_offset(Path::new(":memory:"), UtcOffset::UTC)?;
        store.migrate()?;

        store.set_setting(SETTING_DAILY_GOAL, &1800_u32)?;
        store.set_setting("daily_goal", &2500_u32)?;
        store.migrate_legacy_settings()?;

        assert_eq!(store.load_settings()?.daily_goal_ml, 1800);
        Ok(())
    }

    #[test]
    fn string_typed_canonical_values_are_coerced_in_place() -> Result<()> {
        let mut store = SqliteStore::open_with_offset(Path::new(":memory:"), UtcOffset::UTC)?;
        store.migrate()?;

        store.set_setting(SETTING_DAILY_GOAL, &"3000")?;
        store.set_setting(SETTING_NOTIFICATIONS_ENABLED, &"false")?;
        store.migrate_legacy_settings()?;

        let settings = store.load_settings()?;
        assert_eq!(settings.daily_goal_ml, 3000);
        assert!(!settings.notifications_enabled);
        Ok(())
    }

    #[test]
    fn daily_goal_override_takes_precedence_over_setting() -> Result<()> {
        let mut store = open_store()?;
        let date = day(2026, 8, 7)?;
        let other = day(2026, 8, 8)?;

        assert_eq!(store.daily_goal(date)?, 2000);
        store.set_daily_goal(date, 1500)?;
        assert_eq!(store.daily_goal(date)?, 1500);
        assert_eq!(store.daily_goal(other)?, 2000);
        Ok(())
    }

    #[test]
    fn challenge_lifecycle_start_progress_complete() -> Result<()> {
        let mut store = open_store()?;
        let challenges = store.list_challenges()?;
        let challenge = challenges.first().context("challenges should be seeded")?;

        let started = store.start_challenge(&challenge.id)?;
        assert_eq!(started.status, ChallengeStatus::Active);
        assert_eq!(started.progress, 0);
        assert_eq!(
            started.end_date,
            started
                .start_date
                .checked_add(Duration::days(i64::from(challenge.duration_days)))
                .context("end date overflow")?
        );

        store.update_challenge_progress(started.id, 3)?;
        let listed = store.list_user_challenges()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].progress, 3);

        let badge = store.complete_challenge(started.id)?;
        assert_eq!(badge.challenge_id.as_deref(), Some(challenge.id.as_str()));
        let completed = &store.list_user_challenges()?[0];
        assert_eq!(completed.status, ChallengeStatus::Completed);
        assert!(completed.completed_at.is_some());

        let badges = store.list_badges()?;
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].id, challenge.reward_badge_id);
        Ok(())
    }

    #[test]
    fn unknown_challenge_ids_surface_not_found() -> Result<()> {
        let mut store = open_store()?;
        let err = match store.start_challenge("no-such-challenge") {
            Ok(_) => return Err(anyhow!("expected unknown challenge to fail")),
            Err(err) => err,
        };
        assert!(matches!(err.downcast_ref::<TrackerError>(), Some(TrackerError::NotFound(_))));

        let err = match store.update_challenge_progress(999, 1) {
            Ok(()) => return Err(anyhow!("expected unknown user challenge to fail")),
            Err(err) => err,
        };
        assert!(matches!(err.downcast_ref::<TrackerError>(), Some(TrackerError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn tips_can_be_marked_read_once() -> Result<()> {
        let mut store = open_store()?;
        let tips = store.list_tips()?;
        let tip = tips.first().context("tips should be seeded")?;
        assert!(tip.read_at.is_none());

        store.mark_tip_read(&tip.id)?;
        let first_read = store
            .list_tips()?
            .into_iter()
            .find(|candidate| candidate.id == tip.id)
            .and_then(|candidate| candidate.read_at)
            .context("read_at should be stamped")?;

        store.mark_tip_read(&tip.id)?;
        let second_read = store
            .list_tips()?
            .into_iter()
            .find(|candidate| candidate.id == tip.id)
            .and_then(|candidate| candidate.read_at)
            .context("read_at should persist")?;
        assert_eq!(first_read, second_read);
        Ok(())
    }

    #[test]
    fn critical_snapshot_tracks_container_and_settings_changes() -> Result<()> {
        let mut store = open_store()?;
        let before = store.critical_snapshot()?;
        assert_eq!(before, store.critical_snapshot()?);
        assert_eq!(before.containers.len(), 3);

        // Intake writes stay outside the snapshot.
        store.log_intake(500, None)?;
        assert_eq!(before, store.critical_snapshot()?);

        let glass = ContainerId::from("glass-250");
        store.update_container(
            &glass,
            &ContainerUpdate { volume_ml: Some(300), ..ContainerUpdate::default() },
        )?;
        let after = store.critical_snapshot()?;
        assert_ne!(before, after);
        Ok(())
    }

    #[test]
    fn reset_clears_user_data_and_reseeds() -> Result<()> {
        let mut store = open_store()?;
        let today = store.today();
        store.log_intake(500, None)?;
        store.create_container("Jug", 1500, "flask-outline", "#101010", true)?;
        store.apply_settings_patch(&SettingsPatch {
            daily_goal_ml: Some(3000),
            ..SettingsPatch::default()
        })?;

        store.reset_all_data()?;

        assert_eq!(store.daily_total(today)?, 0);
        let containers = store.list_active_containers()?;
        assert_eq!(containers.len(), 3);
        assert!(containers.iter().all(|container| !container.is_custom));
        assert_eq!(store.load_settings()?, AppSettings::default());
        assert_eq!(store.list_challenges()?.len(), 6);
        Ok(())
    }

    #[test]
    fn backup_and_restore_round_trip() -> Result<()> {
        let mut source = open_store()?;
        let date = day(2026, 8, 7)?;
        source.log_intake_at(750, None, at(date, 10, 0)?)?;

        let backup_file =
            std::env::temp_dir().join(format!("hydrolog-backup-{}.sqlite3", Ulid::new()));
        source.backup_database(&backup_file)?;

        let mut target = SqliteStore::open_with_offset(Path::new(":memory:"), UtcOffset::UTC)?;
        target.restore_database(&backup_file)?;
        assert_eq!(target.daily_total(date)?, 750);
        assert_eq!(target.list_active_containers()?.len(), 3);

        fs::remove_file(&backup_file).with_context(|| {
            format!("failed to cleanup temp backup file {}", backup_file.display())
        })?;
        Ok(())
    }

    #[test]
    fn storage_health_reports_clean_database() -> Result<()> {
        let store = open_store()?;
        let report = store.storage_health()?;
        assert!(report.quick_check_ok);
        assert!(report.foreign_key_violations.is_empty());
        assert_eq!(report.schema_status.current_version, 1);
        Ok(())
    }
}
