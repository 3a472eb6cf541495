use chrono::{DateTime, FixedOffset};
use serde::{self, Deserialize, Deserializer, Serialize};

/// The `{count, next, previous, results}` wrapper returned by every list endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PageEnvelope<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> PageEnvelope<T> {
    pub fn is_last_page(&self) -> bool {
        self.next.is_none()
    }

    pub fn is_first_page(&self) -> bool {
        self.previous.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthToken {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChallengeHost {
    pub id: u64,
    pub team_name: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Challenge {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(deserialize_with = "from_opt_datetime", default)]
    pub start_date: Option<DateTime<FixedOffset>>,
    #[serde(deserialize_with = "from_opt_datetime", default)]
    pub end_date: Option<DateTime<FixedOffset>>,
    pub creator: Option<ChallengeHost>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub approved_by_admin: bool,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChallengePhase {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub challenge: u64,
    #[serde(default)]
    pub codename: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub leaderboard_public: bool,
    #[serde(deserialize_with = "from_opt_datetime", default)]
    pub start_date: Option<DateTime<FixedOffset>>,
    #[serde(deserialize_with = "from_opt_datetime", default)]
    pub end_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub max_submissions_per_day: Option<u64>,
    #[serde(default)]
    pub max_submissions: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChallengePhaseSplit {
    pub id: u64,
    pub challenge_phase: u64,
    #[serde(default)]
    pub challenge_phase_name: String,
    #[serde(default)]
    pub dataset_split_name: String,
    #[serde(default)]
    pub visibility: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitting,
    Submitted,
    Running,
    Failed,
    Cancelled,
    Finished,
    Archived,
    #[serde(other)]
    Unknown,
}

impl SubmissionStatus {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Submitting | SubmissionStatus::Submitted | SubmissionStatus::Running
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Submitting => "submitting",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Running => "running",
            SubmissionStatus::Failed => "failed",
            SubmissionStatus::Cancelled => "cancelled",
            SubmissionStatus::Finished => "finished",
            SubmissionStatus::Archived => "archived",
            SubmissionStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Submission {
    pub id: u64,
    #[serde(default)]
    pub participant_team: Option<u64>,
    #[serde(default)]
    pub participant_team_name: Option<String>,
    #[serde(default)]
    pub challenge_phase: Option<u64>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub is_baseline: bool,
    #[serde(default)]
    pub submission_number: Option<u64>,
    #[serde(deserialize_with = "from_opt_datetime", default)]
    pub submitted_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub execution_time: Option<f64>,
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub stdout_file: Option<String>,
    #[serde(default)]
    pub stderr_file: Option<String>,
    #[serde(default)]
    pub submission_result_file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LeaderboardSchema {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub default_order_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LeaderboardEntry {
    pub id: u64,
    #[serde(rename = "submission__participant_team__team_name")]
    pub team_name: String,
    #[serde(rename = "submission__participant_team__team_url", default)]
    pub team_url: Option<String>,
    #[serde(rename = "submission__is_baseline", default)]
    pub is_baseline: bool,
    #[serde(rename = "submission__is_public", default)]
    pub is_public: bool,
    #[serde(rename = "submission__method_name", default)]
    pub method_name: Option<String>,
    #[serde(
        rename = "submission__submitted_at",
        deserialize_with = "from_opt_datetime",
        default
    )]
    pub submitted_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub result: Vec<f64>,
    #[serde(default)]
    pub filtering_score: Option<f64>,
    #[serde(rename = "leaderboard__schema", default)]
    pub schema: LeaderboardSchema,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TeamMember {
    #[serde(alias = "user")]
    pub member_name: String,
    #[serde(default)]
    pub member_id: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParticipantTeam {
    pub id: u64,
    pub team_name: String,
    #[serde(default)]
    pub team_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostTeam {
    pub id: u64,
    pub team_name: String,
    #[serde(default)]
    pub team_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WorkerLogs {
    #[serde(default)]
    pub logs: Vec<String>,
}

fn from_opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    if let Some(s) = opt {
        let dt = DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)?;
        Ok(Some(dt))
    } else {
        Ok(None)
    }
}

pub trait HasId {
    fn id(&self) -> u64;
}

impl HasId for ParticipantTeam {
    fn id(&self) -> u64 {
        self.id
    }
}

impl HasId for HostTeam {
    fn id(&self) -> u64 {
        self.id
    }
}
