//! Pure mapping of API payloads onto display rows. "Now" is always passed in.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::ApiError;
use crate::models::{Challenge, LeaderboardEntry, Submission, SubmissionStatus};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    pub fn from_seconds(remaining: i64) -> Self {
        let remaining = remaining.max(0);
        Self {
            days: remaining / 86_400,
            hours: (remaining % 86_400) / 3_600,
            minutes: (remaining % 3_600) / 60,
            seconds: remaining % 60,
        }
    }

    pub fn between(now: DateTime<Utc>, target: DateTime<FixedOffset>) -> Self {
        Self::from_seconds((target.with_timezone(&Utc) - now).num_seconds())
    }

    pub fn label(&self) -> String {
        format!("{}d {}h {}m", self.days, self.hours, self.minutes)
    }
}

/// Fixed UTC offset every timestamp is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZone {
    offset: FixedOffset,
}

impl Default for DisplayZone {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl DisplayZone {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parses `"+05:30"`, `"-08:00"` or `"Z"`.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
            return Ok(Self::default());
        }
        let invalid = || ApiError::Configuration(format!("invalid utc_offset '{raw}'"));
        let (sign, rest) = match raw.chars().next() {
            Some('+') => (1, &raw[1..]),
            Some('-') => (-1, &raw[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..60).contains(&minutes) {
            return Err(invalid());
        }
        let offset =
            FixedOffset::east_opt(sign * (hours * 3_600 + minutes * 60)).ok_or_else(invalid)?;
        Ok(Self { offset })
    }

    pub fn format(&self, time: DateTime<FixedOffset>) -> String {
        format!(
            "{} UTC{}",
            time.with_timezone(&self.offset).format("%b %-d, %Y %H:%M"),
            self.offset
        )
    }
}

/// Largest non-zero unit of the time since `then`, e.g. `"3 days"` or `"1 hour"`.
pub fn elapsed_label(now: DateTime<Utc>, then: DateTime<FixedOffset>) -> String {
    const UNITS: [(i64, &str); 6] = [
        (365 * 86_400, "year"),
        (30 * 86_400, "month"),
        (86_400, "day"),
        (3_600, "hour"),
        (60, "minute"),
        (1, "second"),
    ];

    let elapsed = (now - then.with_timezone(&Utc)).num_seconds();
    for (size, unit) in UNITS {
        let value = elapsed / size;
        if value >= 1 {
            let plural = if value == 1 { "" } else { "s" };
            return format!("{value} {unit}{plural}");
        }
    }
    "just now".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpan {
    Upcoming(Countdown),
    Ongoing(Countdown),
    /// Started, with no end date.
    Open,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeCard {
    pub id: u64,
    pub title: String,
    pub host: String,
    pub description: String,
    pub starts: Option<String>,
    pub ends: Option<String>,
    pub time_span: TimeSpan,
}

pub fn project_challenge(
    challenge: &Challenge,
    now: DateTime<Utc>,
    zone: &DisplayZone,
) -> ChallengeCard {
    let started = challenge
        .start_date
        .is_none_or(|start| start.with_timezone(&Utc) <= now);
    let time_span = match (started, challenge.start_date, challenge.end_date) {
        (false, Some(start), _) => TimeSpan::Upcoming(Countdown::between(now, start)),
        (_, _, Some(end)) if end.with_timezone(&Utc) <= now => TimeSpan::Ended,
        (_, _, Some(end)) => TimeSpan::Ongoing(Countdown::between(now, end)),
        _ => TimeSpan::Open,
    };

    ChallengeCard {
        id: challenge.id,
        title: challenge.title.clone(),
        host: challenge
            .creator
            .as_ref()
            .map(|host| host.team_name.clone())
            .unwrap_or_default(),
        description: challenge.short_description.clone(),
        starts: challenge.start_date.map(|time| zone.format(time)),
        ends: challenge.end_date.map(|time| zone.format(time)),
        time_span,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    pub id: u64,
    pub number: Option<u64>,
    pub status: SubmissionStatus,
    pub status_label: &'static str,
    pub show_private: bool,
    pub is_flagged: bool,
    pub is_baseline: bool,
    pub team: Option<String>,
    pub method_name: Option<String>,
    pub submitted: Option<String>,
    pub execution_time: Option<String>,
}

pub fn project_submission(submission: &Submission, zone: &DisplayZone) -> SubmissionRow {
    SubmissionRow {
        id: submission.id,
        number: submission.submission_number,
        status: submission.status,
        status_label: submission.status.label(),
        show_private: !submission.is_public,
        is_flagged: submission.is_flagged,
        is_baseline: submission.is_baseline,
        team: submission.participant_team_name.clone(),
        method_name: submission.method_name.clone(),
        submitted: submission.submitted_at.map(|time| zone.format(time)),
        execution_time: submission
            .execution_time
            .map(|seconds| format!("{seconds:.2}s")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub team_name: String,
    pub method_name: Option<String>,
    pub is_baseline: bool,
    pub scores: Vec<(String, f64)>,
    pub filtering_score: Option<f64>,
    pub time_span: Option<String>,
}

/// Rows keep server order; rank is the 1-based position.
pub fn project_leaderboard(entries: &[LeaderboardEntry], now: DateTime<Utc>) -> Vec<LeaderboardRow> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| LeaderboardRow {
            rank: index + 1,
            team_name: entry.team_name.clone(),
            method_name: entry.method_name.clone(),
            is_baseline: entry.is_baseline,
            scores: entry
                .schema
                .labels
                .iter()
                .cloned()
                .zip(entry.result.iter().copied())
                .collect(),
            filtering_score: entry.filtering_score,
            time_span: entry.submitted_at.map(|time| elapsed_label(now, time)),
        })
        .collect()
}
