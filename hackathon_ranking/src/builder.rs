pub use crate::config::*;

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashSet;

/// A builder for collecting scores and votes.
///
/// The builder enforces the rules of the score sheet and the ballot box,
/// which the ranking functions take for granted:
/// - every criterion is between 1 and 10
/// - a judge has one current score per team, the most recent one
/// - a voter votes once, and only if they checked in (when participants are known)
///
/// ```
/// pub use hackathon_ranking::builder::Builder;
/// pub use hackathon_ranking::FinalistPolicy;
/// # use hackathon_ranking::RankingErrors;
/// use chrono::Utc;
///
/// let mut builder = Builder::new(&FinalistPolicy::DEFAULT_POLICY)?
///     .participants(&["ada@example.com".to_string()])?;
///
/// builder.add_score("Grace", "Compilers R Us", &[8, 9, 7, 10], Utc::now())?;
/// builder.add_vote("Ada@Example.com ", "Compilers R Us")?;
///
/// let result = builder.run();
/// assert_eq!(result.rankings[0].team_id, "Compilers R Us");
/// # Ok::<(), RankingErrors>(())
/// ```
pub struct Builder {
    pub(crate) _policy: FinalistPolicy,
    pub(crate) _participants: Option<HashSet<String>>,
    pub(crate) _scores: Vec<ScoreRecord>,
    pub(crate) _votes: Vec<VoteRecord>,
}

// Voters are identified by their email address.
fn voter_key(voter: &str) -> String {
    voter.trim().to_lowercase()
}

fn check_identifier(value: &str, what: &'static str) -> Result<String, RankingErrors> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RankingErrors::EmptyIdentifier(what));
    }
    Ok(trimmed.to_string())
}

impl Builder {
    pub fn new(policy: &FinalistPolicy) -> Result<Builder, RankingErrors> {
        Ok(Builder {
            _policy: policy.clone(),
            _participants: None,
            _scores: Vec::new(),
            _votes: Vec::new(),
        })
    }

    /// Restricts voting to the given participants.
    ///
    /// Votes that were already added are kept.
    pub fn participants(self, voters: &[String]) -> Result<Builder, RankingErrors> {
        let keys: HashSet<String> = voters
            .iter()
            .map(|v| voter_key(v))
            .filter(|v| !v.is_empty())
            .collect();
        Ok(Builder {
            _policy: self._policy,
            _participants: Some(keys),
            _scores: self._scores,
            _votes: self._votes,
        })
    }

    /// Adds a score sheet: the four criteria given by a judge to a team.
    pub fn add_score(
        &mut self,
        judge: &str,
        team: &str,
        criteria: &[u32; CRITERIA_COUNT],
        timestamp: DateTime<Utc>,
    ) -> Result<(), RankingErrors> {
        for &value in criteria.iter() {
            if !(MIN_CRITERION..=MAX_CRITERION).contains(&value) {
                return Err(RankingErrors::InvalidCriterion {
                    team: team.to_string(),
                    value,
                });
            }
        }
        self.add_score_record(&ScoreRecord {
            judge_id: judge.to_string(),
            team_id: team.to_string(),
            total: criteria.iter().sum(),
            timestamp,
        })
    }

    /// Adds a score for which only the total is known.
    ///
    /// If the judge already scored this team, the most recent of the two
    /// scores is kept, at the position of the first one.
    pub fn add_score_record(&mut self, record: &ScoreRecord) -> Result<(), RankingErrors> {
        let judge_id = check_identifier(&record.judge_id, "judge")?;
        let team_id = check_identifier(&record.team_id, "team")?;
        if !(MIN_TOTAL..=MAX_TOTAL).contains(&record.total) {
            return Err(RankingErrors::InvalidTotal {
                team: team_id,
                value: record.total,
            });
        }
        let rec = ScoreRecord {
            judge_id,
            team_id,
            total: record.total,
            timestamp: record.timestamp,
        };

        let existing = self
            ._scores
            .iter_mut()
            .find(|s| s.judge_id == rec.judge_id && s.team_id == rec.team_id);
        match existing {
            Some(current) if rec.timestamp >= current.timestamp => {
                debug!(
                    "add_score_record: {} -> {}: replacing {} with {}",
                    rec.judge_id, rec.team_id, current.total, rec.total
                );
                *current = rec;
            }
            Some(current) => {
                debug!(
                    "add_score_record: {} -> {}: ignoring score from {} older than {}",
                    rec.judge_id, rec.team_id, rec.timestamp, current.timestamp
                );
            }
            None => self._scores.push(rec),
        }
        Ok(())
    }

    /// Adds the vote of one audience member.
    ///
    /// The voter is identified by their email, ignoring case and surrounding
    /// whitespace. A second vote from the same voter is rejected.
    pub fn add_vote(&mut self, voter: &str, team: &str) -> Result<(), RankingErrors> {
        let voter_id = voter_key(voter);
        if voter_id.is_empty() {
            return Err(RankingErrors::EmptyIdentifier("voter"));
        }
        let team_id = check_identifier(team, "team")?;
        if let Some(participants) = self._participants.as_ref() {
            if !participants.contains(&voter_id) {
                return Err(RankingErrors::NotAParticipant(voter_id));
            }
        }
        if self._votes.iter().any(|v| v.voter_id == voter_id) {
            return Err(RankingErrors::AlreadyVoted(voter_id));
        }
        self._votes.push(VoteRecord { voter_id, team_id });
        Ok(())
    }

    pub fn scores(&self) -> &[ScoreRecord] {
        &self._scores
    }

    pub fn votes(&self) -> &[VoteRecord] {
        &self._votes
    }

    pub fn run(&self) -> RankingResult {
        crate::run_ranking(&self._scores, &self._votes, &self._policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn builder() -> Builder {
        Builder::new(&FinalistPolicy::DEFAULT_POLICY).unwrap()
    }

    #[test]
    fn criteria_are_summed() {
        let mut b = builder();
        b.add_score("J", "T", &[1, 10, 5, 4], t0()).unwrap();
        assert_eq!(b.scores()[0].total, 20);
    }

    #[test]
    fn criteria_out_of_range_are_rejected() {
        let mut b = builder();
        assert_eq!(
            b.add_score("J", "T", &[0, 10, 5, 4], t0()),
            Err(RankingErrors::InvalidCriterion {
                team: "T".to_string(),
                value: 0
            })
        );
        assert!(b.add_score("J", "T", &[11, 10, 5, 4], t0()).is_err());
        assert!(b.scores().is_empty());
    }

    #[test]
    fn totals_out_of_range_are_rejected() {
        let mut b = builder();
        let rec = ScoreRecord {
            judge_id: "J".to_string(),
            team_id: "T".to_string(),
            total: 41,
            timestamp: t0(),
        };
        assert!(matches!(
            b.add_score_record(&rec),
            Err(RankingErrors::InvalidTotal { value: 41, .. })
        ));
    }

    #[test]
    fn blank_judge_is_rejected() {
        let mut b = builder();
        assert_eq!(
            b.add_score("  ", "T", &[5, 5, 5, 5], t0()),
            Err(RankingErrors::EmptyIdentifier("judge"))
        );
    }

    #[test]
    fn latest_score_wins() {
        let mut b = builder();
        b.add_score("J", "T1", &[5, 5, 5, 5], t0()).unwrap();
        b.add_score("J", "T2", &[6, 6, 6, 6], t0()).unwrap();
        b.add_score("J", "T1", &[9, 9, 9, 9], t0() + Duration::minutes(5))
            .unwrap();
        // An older resubmission does not overwrite the current score.
        b.add_score("J", "T1", &[1, 1, 1, 1], t0() - Duration::minutes(5))
            .unwrap();
        assert_eq!(b.scores().len(), 2);
        assert_eq!(b.scores()[0].team_id, "T1");
        assert_eq!(b.scores()[0].total, 36);
        assert_eq!(b.scores()[1].total, 24);
    }

    #[test]
    fn same_team_different_judges_are_kept() {
        let mut b = builder();
        b.add_score("J1", "T", &[5, 5, 5, 5], t0()).unwrap();
        b.add_score("J2", "T", &[5, 5, 5, 5], t0()).unwrap();
        assert_eq!(b.scores().len(), 2);
    }

    #[test]
    fn one_vote_per_voter() {
        let mut b = builder();
        b.add_vote("Ada@Example.com", "T1").unwrap();
        assert_eq!(
            b.add_vote(" ada@example.com ", "T2"),
            Err(RankingErrors::AlreadyVoted("ada@example.com".to_string()))
        );
        assert_eq!(b.votes().len(), 1);
        assert_eq!(b.votes()[0].team_id, "T1");
    }

    #[test]
    fn only_participants_vote() {
        let mut b = builder()
            .participants(&["ada@example.com".to_string(), "".to_string()])
            .unwrap();
        b.add_vote("ADA@example.com", "T1").unwrap();
        assert_eq!(
            b.add_vote("mallory@example.com", "T1"),
            Err(RankingErrors::NotAParticipant(
                "mallory@example.com".to_string()
            ))
        );
        assert_eq!(
            b.add_vote("", "T1"),
            Err(RankingErrors::EmptyIdentifier("voter"))
        );
    }

    #[test]
    fn run_uses_the_policy() {
        let mut b = Builder::new(&FinalistPolicy::Explicit(vec!["T2".to_string()])).unwrap();
        b.add_score("J", "T1", &[9, 9, 9, 9], t0()).unwrap();
        b.add_score("J", "T2", &[2, 2, 2, 2], t0()).unwrap();
        b.add_vote("a@example.com", "T2").unwrap();
        let res = b.run();
        assert_eq!(res.finalists, vec!["T2".to_string()]);
        assert_eq!(res.rankings.len(), 1);
        assert_eq!(res.total_votes, 1);
        // A single finalist has nobody to be compared to.
        assert_eq!(res.rankings[0].normalized_judge_score, 0.5);
        assert_eq!(res.rankings[0].final_score, 0.75);
    }
}
