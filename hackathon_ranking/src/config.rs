// ********* Input data structures ***********

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::Display;

/// The number of criteria a judge rates on a score sheet.
pub const CRITERIA_COUNT: usize = 4;
/// Bounds of a single criterion, inclusive.
pub const MIN_CRITERION: u32 = 1;
pub const MAX_CRITERION: u32 = 10;
/// Bounds of a score total, inclusive.
pub const MIN_TOTAL: u32 = MIN_CRITERION * CRITERIA_COUNT as u32;
pub const MAX_TOTAL: u32 = MAX_CRITERION * CRITERIA_COUNT as u32;

/// Weight of the rescaled judge score in the final blend.
pub const JUDGE_WEIGHT: f64 = 0.5;
/// Weight of the audience vote share in the final blend.
pub const VOTE_WEIGHT: f64 = 0.5;

/// The current score given by one judge to one team.
///
/// `total` is the sum of the four criteria, so it lies in `[4, 40]`.
/// There should be at most one record per (judge, team) pair: the engine
/// does not deduplicate, use the [`crate::builder::Builder`] for that.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoreRecord {
    pub judge_id: String,
    pub team_id: String,
    pub total: u32,
    pub timestamp: DateTime<Utc>,
}

/// One audience vote. At most one per voter.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VoteRecord {
    pub voter_id: String,
    pub team_id: String,
}

// ******** Output data structures *********

/// Rating tendency of a single judge.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct JudgeStats {
    pub mean: f64,
    /// Population standard deviation (divisor `n`).
    pub std_dev: f64,
    pub score_count: usize,
}

/// The bias-corrected judge signal for one team.
#[derive(PartialEq, Debug, Clone)]
pub struct TeamNormalizedScore {
    pub team_id: String,
    /// Average of the z-scores received by the team.
    pub normalized_score: f64,
    /// Average of the raw totals. Display only.
    pub raw_average: f64,
    pub judge_count: usize,
    /// Distinct judges, in the order they first scored the team.
    pub judge_ids: Vec<String>,
}

/// Normalized scores of all the teams, best first.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct NormalizedScores {
    pub teams: Vec<TeamNormalizedScore>,
}

impl NormalizedScores {
    pub fn get(&self, team_id: &str) -> Option<&TeamNormalizedScore> {
        self.teams.iter().find(|t| t.team_id == team_id)
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }
}

/// Final standing of a finalist.
#[derive(PartialEq, Debug, Clone)]
pub struct TeamRanking {
    pub team_id: String,
    /// The average z-score, before rescaling.
    pub judge_z_average: f64,
    /// The average z-score, min-max rescaled to `[0, 1]` across the finalists.
    pub normalized_judge_score: f64,
    pub raw_average: f64,
    pub judge_count: usize,
    pub judge_ids: Vec<String>,
    pub vote_count: u64,
    pub vote_percent: f64,
    pub final_score: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RankingResult {
    /// Judges in the order they first appear in the scores.
    pub judge_stats: Vec<(String, JudgeStats)>,
    pub normalized: NormalizedScores,
    pub finalists: Vec<String>,
    pub rankings: Vec<TeamRanking>,
    /// Votes cast for one of the finalists.
    pub total_votes: u64,
}

/// Errors raised while collecting score and vote records.
///
/// The ranking itself never fails: degenerate inputs map to neutral values.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RankingErrors {
    /// A criterion was outside of `[1, 10]`.
    InvalidCriterion { team: String, value: u32 },
    /// A total was outside of `[4, 40]`.
    InvalidTotal { team: String, value: u32 },
    /// A judge, team or voter identifier was blank.
    EmptyIdentifier(&'static str),
    /// This voter has already voted.
    AlreadyVoted(String),
    /// The voter is not a checked-in participant.
    NotAParticipant(String),
}

impl Error for RankingErrors {}

impl Display for RankingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankingErrors::InvalidCriterion { team, value } => write!(
                f,
                "criterion for team {:?} must be between {} and {}, got {}",
                team, MIN_CRITERION, MAX_CRITERION, value
            ),
            RankingErrors::InvalidTotal { team, value } => write!(
                f,
                "total for team {:?} must be between {} and {}, got {}",
                team, MIN_TOTAL, MAX_TOTAL, value
            ),
            RankingErrors::EmptyIdentifier(what) => write!(f, "missing {}", what),
            RankingErrors::AlreadyVoted(voter) => write!(f, "{} has already voted", voter),
            RankingErrors::NotAParticipant(voter) => {
                write!(f, "{} is not a checked-in participant", voter)
            }
        }
    }
}

// ********* Configuration **********

/// How the finalists of the audience round are picked.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum FinalistPolicy {
    /// The best `count` teams by normalized score, with manual overrides.
    ///
    /// Team names in `include` and `exclude` are matched ignoring case and
    /// surrounding whitespace. Exclusion wins over inclusion.
    TopN {
        count: usize,
        include: Vec<String>,
        exclude: Vec<String>,
    },
    /// A curated list, used as-is.
    Explicit(Vec<String>),
}

impl FinalistPolicy {
    pub const DEFAULT_FINALIST_COUNT: usize = 6;

    pub const DEFAULT_POLICY: FinalistPolicy = FinalistPolicy::TopN {
        count: FinalistPolicy::DEFAULT_FINALIST_COUNT,
        include: Vec::new(),
        exclude: Vec::new(),
    };
}

impl Default for FinalistPolicy {
    fn default() -> Self {
        FinalistPolicy::DEFAULT_POLICY
    }
}

impl Display for FinalistPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalistPolicy::TopN {
                count,
                include,
                exclude,
            } => {
                write!(f, "top {}", count)?;
                if !include.is_empty() {
                    write!(f, " including {}", include.join(", "))?;
                }
                if !exclude.is_empty() {
                    write!(f, " excluding {}", exclude.join(", "))?;
                }
                Ok(())
            }
            FinalistPolicy::Explicit(teams) => write!(f, "explicit: {}", teams.join(", ")),
        }
    }
}
