use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, Weekday};
use ulid::Ulid;

pub const MAX_INTAKE_ML: u32 = 10_000;
pub const MIN_CONTAINER_VOLUME_ML: u32 = 50;
pub const MAX_CONTAINER_VOLUME_ML: u32 = 2_000;
pub const MAX_CONTAINER_NAME_CHARS: usize = 20;
pub const STREAK_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_DAILY_GOAL_ML: u32 = 2_000;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TrackerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IntakeEventId(pub i64);

impl Display for IntakeEventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container identifier: a `custom-` or `default-` prefix followed by a
/// creation-time component (ULID for generated ids; seeded defaults keep
/// their well-known ids such as `glass-250`).
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ContainerId(pub String);

impl ContainerId {
    #[must_use]
    pub fn generate(is_custom: bool) -> Self {
        let prefix = if is_custom { "custom" } else { "default" };
        Self(format!("{prefix}-{}", Ulid::new()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VolumeUnit {
    Ml,
    Oz,
    L,
}

impl VolumeUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ml => "ml",
            Self::Oz => "oz",
            Self::L => "l",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ml" => Some(Self::Ml),
            "oz" => Some(Self::Oz),
            "l" => Some(Self::L),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFrequency {
    Thirty,
    Sixty,
    Ninety,
    Onetwenty,
}

impl ReminderFrequency {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thirty => "thirty",
            Self::Sixty => "sixty",
            Self::Ninety => "ninety",
            Self::Onetwenty => "onetwenty",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "thirty" => Some(Self::Thirty),
            "sixty" => Some(Self::Sixty),
            "ninety" => Some(Self::Ninety),
            "onetwenty" => Some(Self::Onetwenty),
            _ => None,
        }
    }

    #[must_use]
    pub fn minutes(self) -> u32 {
        match self {
            Self::Thirty => 30,
            Self::Sixty => 60,
            Self::Ninety => 90,
            Self::Onetwenty => 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    System,
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

/// Wall-clock time of day in `HH:MM` form, used for the reminder window.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Build a time of day, rejecting out-of-range components.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] when hour or minute is out of range.
    pub fn new(hour: u8, minute: u8) -> Result<Self, TrackerError> {
        if hour > 23 || minute > 59 {
            return Err(TrackerError::Validation(format!(
                "time of day out of range: {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackerError::Validation(format!("invalid HH:MM time: {value}"));
        let (hour_raw, minute_raw) = value.split_once(':').ok_or_else(invalid)?;
        if hour_raw.len() != 2 || minute_raw.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = hour_raw.parse().map_err(|_| invalid())?;
        let minute: u8 = minute_raw.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Typed projection over the per-key settings rows.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(rename = "dailyGoal")]
    pub daily_goal_ml: u32,
    pub notifications_enabled: bool,
    #[serde(rename = "notificationStartTime")]
    pub notification_start: TimeOfDay,
    #[serde(rename = "notificationEndTime")]
    pub notification_end: TimeOfDay,
    pub notification_frequency: ReminderFrequency,
    pub unit: VolumeUnit,
    pub theme: Theme,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            daily_goal_ml: DEFAULT_DAILY_GOAL_ML,
            notifications_enabled: true,
            notification_start: TimeOfDay { hour: 8, minute: 0 },
            notification_end: TimeOfDay { hour: 22, minute: 0 },
            notification_frequency: ReminderFrequency::Sixty,
            unit: VolumeUnit::Ml,
            theme: Theme::System,
        }
    }
}

/// Partial settings update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, rename = "dailyGoal")]
    pub daily_goal_ml: Option<u32>,
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
    #[serde(default, rename = "notificationStartTime")]
    pub notification_start: Option<TimeOfDay>,
    #[serde(default, rename = "notificationEndTime")]
    pub notification_end: Option<TimeOfDay>,
    #[serde(default)]
    pub notification_frequency: Option<ReminderFrequency>,
    #[serde(default)]
    pub unit: Option<VolumeUnit>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

impl SettingsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.daily_goal_ml.is_none()
            && self.notifications_enabled.is_none()
            && self.notification_start.is_none()
            && self.notification_end.is_none()
            && self.notification_frequency.is_none()
            && self.unit.is_none()
            && self.theme.is_none()
    }

    /// Validate every field present in the patch.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] when the daily goal is out of range.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if let Some(goal) = self.daily_goal_ml {
            validate_intake_amount(i64::from(goal))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn apply(&self, mut settings: AppSettings) -> AppSettings {
        if let Some(goal) = self.daily_goal_ml {
            settings.daily_goal_ml = goal;
        }
        if let Some(enabled) = self.notifications_enabled {
            settings.notifications_enabled = enabled;
        }
        if let Some(start) = self.notification_start {
            settings.notification_start = start;
        }
        if let Some(end) = self.notification_end {
            settings.notification_end = end;
        }
        if let Some(frequency) = self.notification_frequency {
            settings.notification_frequency = frequency;
        }
        if let Some(unit) = self.unit {
            settings.unit = unit;
        }
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub volume_ml: u32,
    pub kind: String,
    pub color: String,
    pub is_custom: bool,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Partial container update; only the four mutable fields are representable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ContainerUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub volume_ml: Option<u32>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl ContainerUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.volume_ml.is_none()
            && self.kind.is_none()
            && self.color.is_none()
    }

    /// Validate every field present in the update.
    ///
    /// # Errors
    /// Returns [`TrackerError::Validation`] when any present field is invalid.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if let Some(name) = &self.name {
            validate_container_name(name)?;
        }
        if let Some(volume_ml) = self.volume_ml {
            validate_container_volume(volume_ml)?;
        }
        if let Some(kind) = &self.kind {
            validate_container_kind(kind)?;
        }
        if let Some(color) = &self.color {
            validate_hex_color(color)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IntakeEvent {
    pub id: IntakeEventId,
    pub amount_ml: u32,
    pub container_id: Option<ContainerId>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "serde_date")]
    pub date: Date,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeGoalType {
    Streak,
    EarlyMorning,
    Frequency,
    WeekendStreak,
    DailyAmount,
    MonthlyComplete,
}

impl ChallengeGoalType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streak => "streak",
            Self::EarlyMorning => "early_morning",
            Self::Frequency => "frequency",
            Self::WeekendStreak => "weekend_streak",
            Self::DailyAmount => "daily_amount",
            Self::MonthlyComplete => "monthly_complete",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "streak" => Some(Self::Streak),
            "early_morning" => Some(Self::EarlyMorning),
            "frequency" => Some(Self::Frequency),
            "weekend_streak" => Some(Self::WeekendStreak),
            "daily_amount" => Some(Self::DailyAmount),
            "monthly_complete" => Some(Self::MonthlyComplete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Active,
    Completed,
    Failed,
}

impl ChallengeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub goal_type: ChallengeGoalType,
    pub goal_value: u32,
    pub duration_days: u16,
    pub icon: String,
    pub color: String,
    pub reward_badge_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserChallenge {
    pub id: i64,
    pub challenge_id: String,
    #[serde(with = "serde_date")]
    pub start_date: Date,
    #[serde(with = "serde_date")]
    pub end_date: Date,
    pub status: ChallengeStatus,
    pub progress: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    #[serde(with = "time::serde::rfc3339")]
    pub earned_at: OffsetDateTime,
    pub challenge_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct HydrationTip {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub full_content: String,
    pub category: String,
    pub icon: String,
    pub color: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The critical-state snapshot covered by the tamper-detection checksum:
/// active container triples plus the settings projection. Intake events are
/// deliberately outside the checksum scope.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CriticalSnapshot {
    pub containers: Vec<ContainerDigest>,
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ContainerDigest {
    pub id: ContainerId,
    pub name: String,
    #[serde(rename = "volume")]
    pub volume_ml: u32,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an intake (or goal) amount in milliliters.
///
/// # Errors
/// Returns [`TrackerError::Validation`] when the amount is not in `1..=10000`.
pub fn validate_intake_amount(amount: i64) -> Result<u32, TrackerError> {
    if amount <= 0 {
        return Err(TrackerError::Validation(
            "water amount must be a positive integer".to_string(),
        ));
    }
    if amount > i64::from(MAX_INTAKE_ML) {
        return Err(TrackerError::Validation(format!(
            "water amount is too large (max {MAX_INTAKE_ML}ml)"
        )));
    }
    u32::try_from(amount)
        .map_err(|_| TrackerError::Validation("water amount out of range".to_string()))
}

/// Validate a container name: 1..=20 characters, alphanumeric and spaces.
///
/// # Errors
/// Returns [`TrackerError::Validation`] when the name is empty, too long, or
/// contains disallowed characters.
pub fn validate_container_name(name: &str) -> Result<(), TrackerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::Validation("container name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_CONTAINER_NAME_CHARS {
        return Err(TrackerError::Validation(format!(
            "container name must be at most {MAX_CONTAINER_NAME_CHARS} characters"
        )));
    }
    if !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == ' ') {
        return Err(TrackerError::Validation(
            "container name may contain only letters, digits, and spaces".to_string(),
        ));
    }
    Ok(())
}

/// Validate a container volume in milliliters.
///
/// # Errors
/// Returns [`TrackerError::Validation`] when the volume is not in `50..=2000`.
pub fn validate_container_volume(volume_ml: u32) -> Result<(), TrackerError> {
    if !(MIN_CONTAINER_VOLUME_ML..=MAX_CONTAINER_VOLUME_ML).contains(&volume_ml) {
        return Err(TrackerError::Validation(format!(
            "container volume must be between {MIN_CONTAINER_VOLUME_ML} and {MAX_CONTAINER_VOLUME_ML} ml"
        )));
    }
    Ok(())
}

/// Validate a container icon tag.
///
/// # Errors
/// Returns [`TrackerError::Validation`] when the tag is empty.
pub fn validate_container_kind(kind: &str) -> Result<(), TrackerError> {
    if kind.trim().is_empty() {
        return Err(TrackerError::Validation("container icon tag is required".to_string()));
    }
    Ok(())
}

#[must_use]
pub fn is_valid_hex_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    (digits.len() == 3 || digits.len() == 6) && digits.chars().all(|ch| ch.is_ascii_hexdigit())
}

/// Validate a `#RGB` / `#RRGGBB` hex color.
///
/// # Errors
/// Returns [`TrackerError::Validation`] when the value does not match either form.
pub fn validate_hex_color(color: &str) -> Result<(), TrackerError> {
    if !is_valid_hex_color(color) {
        return Err(TrackerError::Validation(format!(
            "container color must be a hex color like #4A90E2, got: {color}"
        )));
    }
    Ok(())
}

/// Validate all fields of a new container before it touches storage.
///
/// # Errors
/// Returns [`TrackerError::Validation`] for the first failing field.
pub fn validate_container_draft(
    name: &str,
    volume_ml: u32,
    kind: &str,
    color: &str,
) -> Result<(), TrackerError> {
    validate_container_name(name)?;
    validate_container_volume(volume_ml)?;
    validate_container_kind(kind)?;
    validate_hex_color(color)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Calendar dates
// ---------------------------------------------------------------------------

#[must_use]
pub fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// # Errors
/// Returns [`TrackerError::Validation`] when the value is not a real date in
/// that format.
pub fn parse_date(value: &str) -> Result<Date, TrackerError> {
    let invalid = || TrackerError::Validation(format!("invalid YYYY-MM-DD date: {value}"));
    let mut parts = value.splitn(3, '-');
    let year: i32 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let month_raw: u8 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let day: u8 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month_raw).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

#[must_use]
pub fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sunday => "Sun",
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
    }
}

/// Serde adapter persisting [`time::Date`] as a `YYYY-MM-DD` string.
pub mod serde_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    /// # Errors
    /// Fails when the persisted value is not a valid `YYYY-MM-DD` date.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        /// # Errors
        /// Propagates serializer failures.
        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_some(&super::super::format_date(*date)),
                None => serializer.serialize_none(),
            }
        }

        /// # Errors
        /// Fails when the persisted value is not a valid `YYYY-MM-DD` date.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                Some(value) => super::super::parse_date(&value)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation engine
// ---------------------------------------------------------------------------

/// One day's consumed total as grouped by the ledger. Dates with no events
/// are absent; the series builders below zero-fill them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct DailyTotal {
    #[serde(with = "serde_date")]
    pub date: Date,
    pub consumed_ml: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct WeeklyEntry {
    #[serde(with = "serde_date")]
    pub date: Date,
    pub weekday: String,
    pub consumed_ml: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MonthlyEntry {
    #[serde(with = "serde_date")]
    pub date: Date,
    pub day: u8,
    pub consumed_ml: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct BestDay {
    #[serde(with = "serde_date::option")]
    pub date: Option<Date>,
    pub consumed_ml: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Week,
    Month,
    Year,
}

impl StatsPeriod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    #[must_use]
    pub fn days(self) -> u16 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }
}

/// Bucket per-event `(hour, amount)` rows into a fixed 24-slot array.
/// Out-of-range hours are ignored rather than panicking.
#[must_use]
pub fn hourly_buckets(rows: &[(u8, u32)]) -> [u32; 24] {
    let mut buckets = [0_u32; 24];
    for (hour, amount) in rows {
        if let Some(slot) = buckets.get_mut(usize::from(*hour)) {
            *slot += amount;
        }
    }
    buckets
}

/// Consecutive days ending today whose totals meet the goal, walking
/// backward one day at a time and stopping at the first miss. Bounded at
/// [`STREAK_LOOKBACK_DAYS`].
#[must_use]
pub fn streak_days(today: Date, goal_ml: u32, totals: &[DailyTotal]) -> u32 {
    if goal_ml == 0 {
        return 0;
    }
    let by_date: BTreeMap<Date, u32> =
        totals.iter().map(|total| (total.date, total.consumed_ml)).collect();

    let mut streak = 0;
    let mut cursor = today;
    for _ in 0..STREAK_LOOKBACK_DAYS {
        match by_date.get(&cursor) {
            Some(consumed) if *consumed >= goal_ml => streak += 1,
            _ => break,
        }
        let Some(previous) = cursor.previous_day() else {
            break;
        };
        cursor = previous;
    }
    streak
}

/// Complete 7-day series ending at `end`, zero-filled and labeled by weekday.
#[must_use]
pub fn weekly_series(end: Date, totals: &[DailyTotal]) -> Vec<WeeklyEntry> {
    let by_date: BTreeMap<Date, u32> =
        totals.iter().map(|total| (total.date, total.consumed_ml)).collect();

    let mut series = Vec::with_capacity(7);
    let mut dates = Vec::with_capacity(7);
    let mut cursor = end;
    for _ in 0..7 {
        dates.push(cursor);
        let Some(previous) = cursor.previous_day() else {
            break;
        };
        cursor = previous;
    }
    for date in dates.into_iter().rev() {
        series.push(WeeklyEntry {
            date,
            weekday: weekday_label(date.weekday()).to_string(),
            consumed_ml: by_date.get(&date).copied().unwrap_or(0),
        });
    }
    series
}

/// Complete calendar-month series, zero-filled, one entry per day-of-month.
#[must_use]
pub fn monthly_series(year: i32, month: Month, totals: &[DailyTotal]) -> Vec<MonthlyEntry> {
    let by_date: BTreeMap<Date, u32> =
        totals.iter().map(|total| (total.date, total.consumed_ml)).collect();

    let days = time::util::days_in_year_month(year, month);
    (1..=days)
        .filter_map(|day| Date::from_calendar_date(year, month, day).ok())
        .map(|date| MonthlyEntry {
            date,
            day: date.day(),
            consumed_ml: by_date.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Highest-consumption day in the window; an all-zero sentinel when the
/// window holds no events.
#[must_use]
pub fn best_day(totals: &[DailyTotal]) -> BestDay {
    totals
        .iter()
        .max_by(|lhs, rhs| {
            lhs.consumed_ml.cmp(&rhs.consumed_ml).then_with(|| rhs.date.cmp(&lhs.date))
        })
        .map_or(BestDay { date: None, consumed_ml: 0 }, |total| BestDay {
            date: Some(total.date),
            consumed_ml: total.consumed_ml,
        })
}

/// Mean daily intake over days that have events, rounded to the nearest
/// milliliter; 0 for an empty window.
#[must_use]
pub fn average_daily(totals: &[DailyTotal]) -> u32 {
    if totals.is_empty() {
        return 0;
    }
    let sum: u64 = totals.iter().map(|total| u64::from(total.consumed_ml)).sum();
    let count = totals.len() as u64;
    let average = (sum + count / 2) / count;
    u32::try_from(average).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Seeded catalogs
// ---------------------------------------------------------------------------

pub struct ContainerSeed {
    pub id: &'static str,
    pub name: &'static str,
    pub volume_ml: u32,
    pub kind: &'static str,
    pub color: &'static str,
}

#[must_use]
pub fn default_containers() -> Vec<ContainerSeed> {
    vec![
        ContainerSeed {
            id: "glass-250",
            name: "Glass",
            volume_ml: 250,
            kind: "wine-outline",
            color: "#4A90E2",
        },
        ContainerSeed {
            id: "bottle-500",
            name: "Bottle",
            volume_ml: 500,
            kind: "bottle-outline",
            color: "#87CEEB",
        },
        ContainerSeed {
            id: "large-1000",
            name: "Large Bottle",
            volume_ml: 1000,
            kind: "flask-outline",
            color: "#4CAF50",
        },
    ]
}

#[must_use]
pub fn default_challenges() -> Vec<Challenge> {
    vec![
        Challenge {
            id: "streak-7".to_string(),
            name: "Seven Day Streak".to_string(),
            description: "Reach your daily goal seven days in a row".to_string(),
            goal_type: ChallengeGoalType::Streak,
            goal_value: 7,
            duration_days: 7,
            icon: "flame".to_string(),
            color: "#FF6B35".to_string(),
            reward_badge_id: "badge-streak-7".to_string(),
            is_active: true,
        },
        Challenge {
            id: "early-bird".to_string(),
            name: "Early Bird".to_string(),
            description: "Log a drink before 9am on five days".to_string(),
            goal_type: ChallengeGoalType::EarlyMorning,
            goal_value: 5,
            duration_days: 7,
            icon: "sunny".to_string(),
            color: "#FFC107".to_string(),
            reward_badge_id: "badge-early-bird".to_string(),
            is_active: true,
        },
        Challenge {
            id: "steady-sipper".to_string(),
            name: "Steady Sipper".to_string(),
            description: "Log eight separate drinks in one day".to_string(),
            goal_type: ChallengeGoalType::Frequency,
            goal_value: 8,
            duration_days: 1,
            icon: "water".to_string(),
            color: "#4A90E2".to_string(),
            reward_badge_id: "badge-steady-sipper".to_string(),
            is_active: true,
        },
        Challenge {
            id: "weekend-warrior".to_string(),
            name: "Weekend Warrior".to_string(),
            description: "Hit your goal on four weekend days".to_string(),
            goal_type: ChallengeGoalType::WeekendStreak,
            goal_value: 4,
            duration_days: 14,
            icon: "barbell".to_string(),
            color: "#9C27B0".to_string(),
            reward_badge_id: "badge-weekend-warrior".to_string(),
            is_active: true,
        },
        Challenge {
            id: "big-day".to_string(),
            name: "Big Day".to_string(),
            description: "Drink 3000ml in a single day".to_string(),
            goal_type: ChallengeGoalType::DailyAmount,
            goal_value: 3000,
            duration_days: 1,
            icon: "trophy".to_string(),
            color: "#4CAF50".to_string(),
            reward_badge_id: "badge-big-day".to_string(),
            is_active: true,
        },
        Challenge {
            id: "perfect-month".to_string(),
            name: "Perfect Month".to_string(),
            description: "Reach your goal every day for a month".to_string(),
            goal_type: ChallengeGoalType::MonthlyComplete,
            goal_value: 30,
            duration_days: 30,
            icon: "calendar".to_string(),
            color: "#00BCD4".to_string(),
            reward_badge_id: "badge-perfect-month".to_string(),
            is_active: true,
        },
    ]
}

pub struct TipSeed {
    pub id: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub full_content: &'static str,
    pub category: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

#[must_use]
pub fn default_tips() -> Vec<TipSeed> {
    vec![
        TipSeed {
            id: "tip-morning-glass",
            title: "Start with a glass",
            summary: "Drink a glass of water right after waking up",
            full_content: "A glass of water first thing in the morning rehydrates you after \
                           sleep and makes it easier to keep a steady pace through the day.",
            category: "habit",
            icon: "sunny-outline",
            color: "#FFC107",
        },
        TipSeed {
            id: "tip-meal-pairing",
            title: "Pair water with meals",
            summary: "Have a glass with every meal and snack",
            full_content: "Tying water to meals anchors the habit to something you already do \
                           three times a day, so no reminder is needed.",
            category: "habit",
            icon: "restaurant-outline",
            color: "#4CAF50",
        },
        TipSeed {
            id: "tip-carry-bottle",
            title: "Carry a bottle",
            summary: "Keep a filled bottle within reach",
            full_content: "People drink noticeably more when water is already at hand. A 500ml \
                           bottle on your desk covers a quarter of a typical daily goal.",
            category: "gear",
            icon: "water-outline",
            color: "#4A90E2",
        },
        TipSeed {
            id: "tip-exercise",
            title: "Hydrate around exercise",
            summary: "Drink before, during, and after workouts",
            full_content: "Fluid loss from sweat adds up quickly. Log an extra container for \
                           every half hour of intense activity.",
            category: "health",
            icon: "fitness-outline",
            color: "#FF6B35",
        },
        TipSeed {
            id: "tip-evening-taper",
            title: "Taper in the evening",
            summary: "Front-load intake earlier in the day",
            full_content: "Meeting most of your goal before dinner keeps hydration steady \
                           without interrupting sleep.",
            category: "habit",
            icon: "moon-outline",
            color: "#9C27B0",
        },
        TipSeed {
            id: "tip-thirst-signal",
            title: "Don't wait for thirst",
            summary: "Thirst lags behind actual need",
            full_content: "By the time you feel thirsty you are already mildly dehydrated. \
                           Small regular amounts beat large catch-up drinks.",
            category: "health",
            icon: "pulse-outline",
            color: "#00BCD4",
        },
    ]
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn date(year: i32, month: u8, day: u8) -> Result<Date> {
        let month = Month::try_from(month)?;
        Ok(Date::from_calendar_date(year, month, day)?)
    }

    #[test]
    fn intake_amount_bounds_are_enforced() {
        assert!(validate_intake_amount(1).is_ok());
        assert!(validate_intake_amount(10_000).is_ok());
        assert!(matches!(validate_intake_amount(0), Err(TrackerError::Validation(_))));
        assert!(matches!(validate_intake_amount(-5), Err(TrackerError::Validation(_))));
        assert!(matches!(validate_intake_amount(10_001), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn container_name_rules() {
        assert!(validate_container_name("Tumbler").is_ok());
        assert!(validate_container_name("Big Cup 2").is_ok());
        assert!(validate_container_name("").is_err());
        assert!(validate_container_name("   ").is_err());
        assert!(validate_container_name("x".repeat(21).as_str()).is_err());
        assert!(validate_container_name("bad;name").is_err());
    }

    #[test]
    fn container_volume_rules() {
        assert!(validate_container_volume(50).is_ok());
        assert!(validate_container_volume(2000).is_ok());
        assert!(validate_container_volume(49).is_err());
        assert!(validate_container_volume(2001).is_err());
    }

    #[test]
    fn hex_color_accepts_both_forms() {
        assert!(is_valid_hex_color("#4A90E2"));
        assert!(is_valid_hex_color("#abc"));
        assert!(!is_valid_hex_color("4A90E2"));
        assert!(!is_valid_hex_color("#12345"));
        assert!(!is_valid_hex_color("#GGHHII"));
    }

    #[test]
    fn time_of_day_round_trip_and_bounds() -> Result<()> {
        let start: TimeOfDay = "08:00".parse()?;
        assert_eq!(start, TimeOfDay { hour: 8, minute: 0 });
        assert_eq!(start.to_string(), "08:00");

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("9:30".parse::<TimeOfDay>().is_err());
        assert!("0930".parse::<TimeOfDay>().is_err());
        Ok(())
    }

    #[test]
    fn date_format_round_trip() -> Result<()> {
        let value = date(2026, 3, 9)?;
        assert_eq!(format_date(value), "2026-03-09");
        assert_eq!(parse_date("2026-03-09")?, value);
        assert!(parse_date("2026-13-01").is_err());
        assert!(parse_date("2026-02-30").is_err());
        assert!(parse_date("not-a-date").is_err());
        Ok(())
    }

    #[test]
    fn generated_container_ids_carry_prefix() {
        let custom = ContainerId::generate(true);
        let preset = ContainerId::generate(false);
        assert!(custom.as_str().starts_with("custom-"));
        assert!(preset.as_str().starts_with("default-"));
        assert_ne!(ContainerId::generate(true), ContainerId::generate(true));
    }

    #[test]
    fn hourly_buckets_zero_fill_and_sum() {
        let buckets = hourly_buckets(&[(8, 250), (12, 500), (8, 100)]);
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[8], 350);
        assert_eq!(buckets[12], 500);
        let rest: u32 = buckets
            .iter()
            .enumerate()
            .filter(|(hour, _)| *hour != 8 && *hour != 12)
            .map(|(_, amount)| *amount)
            .sum();
        assert_eq!(rest, 0);
    }

    #[test]
    fn streak_counts_consecutive_goal_days() -> Result<()> {
        let today = date(2026, 8, 7)?;
        let totals = vec![
            DailyTotal { date: today, consumed_ml: 2000 },
            DailyTotal { date: date(2026, 8, 6)?, consumed_ml: 2100 },
            DailyTotal { date: date(2026, 8, 3)?, consumed_ml: 2500 },
        ];
        assert_eq!(streak_days(today, 2000, &totals), 2);
        Ok(())
    }

    #[test]
    fn streak_is_zero_when_today_misses_goal() -> Result<()> {
        let today = date(2026, 8, 7)?;
        let totals = vec![
            DailyTotal { date: today, consumed_ml: 1999 },
            DailyTotal { date: date(2026, 8, 6)?, consumed_ml: 2100 },
        ];
        assert_eq!(streak_days(today, 2000, &totals), 0);
        Ok(())
    }

    #[test]
    fn streak_is_bounded_by_lookback_window() -> Result<()> {
        let today = date(2026, 8, 7)?;
        let mut totals = Vec::new();
        let mut cursor = today;
        for _ in 0..60 {
            totals.push(DailyTotal { date: cursor, consumed_ml: 3000 });
            cursor = match cursor.previous_day() {
                Some(previous) => previous,
                None => break,
            };
        }
        assert_eq!(streak_days(today, 2000, &totals), STREAK_LOOKBACK_DAYS);
        Ok(())
    }

    #[test]
    fn weekly_series_is_complete_and_ordered() -> Result<()> {
        let end = date(2026, 8, 7)?;
        let totals = vec![DailyTotal { date: date(2026, 8, 5)?, consumed_ml: 750 }];
        let series = weekly_series(end, &totals);

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, date(2026, 8, 1)?);
        assert_eq!(series[6].date, end);
        assert_eq!(series[4].consumed_ml, 750);
        assert_eq!(series[4].weekday, "Wed");
        let zero_days = series.iter().filter(|entry| entry.consumed_ml == 0).count();
        assert_eq!(zero_days, 6);
        Ok(())
    }

    #[test]
    fn monthly_series_covers_every_day() -> Result<()> {
        let totals = vec![DailyTotal { date: date(2026, 2, 14)?, consumed_ml: 1800 }];
        let series = monthly_series(2026, Month::February, &totals);

        assert_eq!(series.len(), 28);
        assert_eq!(series[0].day, 1);
        assert_eq!(series[13].consumed_ml, 1800);
        assert_eq!(series[27].day, 28);
        Ok(())
    }

    #[test]
    fn best_day_and_average_resolve_sentinels_on_empty_window() {
        let best = best_day(&[]);
        assert_eq!(best.date, None);
        assert_eq!(best.consumed_ml, 0);
        assert_eq!(average_daily(&[]), 0);
    }

    #[test]
    fn best_day_and_average_over_filled_window() -> Result<()> {
        let totals = vec![
            DailyTotal { date: date(2026, 8, 5)?, consumed_ml: 1500 },
            DailyTotal { date: date(2026, 8, 6)?, consumed_ml: 2500 },
            DailyTotal { date: date(2026, 8, 7)?, consumed_ml: 2000 },
        ];
        let best = best_day(&totals);
        assert_eq!(best.date, Some(date(2026, 8, 6)?));
        assert_eq!(best.consumed_ml, 2500);
        assert_eq!(average_daily(&totals), 2000);
        Ok(())
    }

    #[test]
    fn settings_patch_applies_only_present_fields() -> Result<()> {
        let patch = SettingsPatch {
            daily_goal_ml: Some(2500),
            theme: Some(Theme::Dark),
            ..SettingsPatch::default()
        };
        patch.validate()?;
        let updated = patch.apply(AppSettings::default());
        assert_eq!(updated.daily_goal_ml, 2500);
        assert_eq!(updated.theme, Theme::Dark);
        assert_eq!(updated.notification_frequency, ReminderFrequency::Sixty);
        assert!(updated.notifications_enabled);
        Ok(())
    }

    #[test]
    fn settings_patch_rejects_out_of_range_goal() {
        let patch = SettingsPatch { daily_goal_ml: Some(20_000), ..SettingsPatch::default() };
        assert!(matches!(patch.validate(), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn critical_snapshot_serializes_with_stable_shape() -> Result<()> {
        let snapshot = CriticalSnapshot {
            containers: vec![ContainerDigest {
                id: ContainerId::from("glass-250"),
                name: "Glass".to_string(),
                volume_ml: 250,
            }],
            settings: AppSettings::default(),
        };
        let first = serde_json::to_string(&snapshot)?;
        let second = serde_json::to_string(&snapshot)?;
        assert_eq!(first, second);
        assert!(first.contains("\"volume\":250"));
        assert!(first.contains("\"dailyGoal\":2000"));
        assert!(first.contains("\"notificationStartTime\":\"08:00\""));
        Ok(())
    }

    #[test]
    fn enum_codecs_round_trip() {
        for frequency in [
            ReminderFrequency::Thirty,
            ReminderFrequency::Sixty,
            ReminderFrequency::Ninety,
            ReminderFrequency::Onetwenty,
        ] {
            assert_eq!(ReminderFrequency::parse(frequency.as_str()), Some(frequency));
        }
        for goal_type in [
            ChallengeGoalType::Streak,
            ChallengeGoalType::EarlyMorning,
            ChallengeGoalType::Frequency,
            ChallengeGoalType::WeekendStreak,
            ChallengeGoalType::DailyAmount,
            ChallengeGoalType::MonthlyComplete,
        ] {
            assert_eq!(ChallengeGoalType::parse(goal_type.as_str()), Some(goal_type));
        }
        for status in
            [ChallengeStatus::Active, ChallengeStatus::Completed, ChallengeStatus::Failed]
        {
            assert_eq!(ChallengeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VolumeUnit::parse("oz"), Some(VolumeUnit::Oz));
        assert_eq!(Theme::parse("dark"), Some(Theme::Dark));
        assert_eq!(StatsPeriod::parse("year"), Some(StatsPeriod::Year));
        assert_eq!(ReminderFrequency::parse("weekly"), None);
    }

    #[test]
    fn default_catalogs_are_well_formed() {
        let containers = default_containers();
        assert_eq!(containers.len(), 3);
        for seed in &containers {
            assert!(validate_container_draft(seed.name, seed.volume_ml, seed.kind, seed.color)
                .is_ok());
        }

        let challenges = default_challenges();
        assert!(!challenges.is_empty());
        for challenge in &challenges {
            assert!(challenge.is_active);
            assert!(challenge.duration_days >= 1);
            assert!(is_valid_hex_color(&challenge.color));
        }

        let tips = default_tips();
        assert!(!tips.is_empty());
        for tip in &tips {
            assert!(!tip.title.is_empty());
            assert!(is_valid_hex_color(tip.color));
        }
    }
}
