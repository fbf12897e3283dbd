mod config;
pub mod builder;
pub mod manual;

use log::{debug, info, warn};

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

pub use crate::config::*;

// **** Private structures ****

// Everything a team received from the judges, in input order.
#[derive(PartialEq, Debug, Clone, Default)]
struct TeamAccumulator {
    z_scores: Vec<f64>,
    totals: Vec<f64>,
    judge_ids: Vec<String>,
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().fold(0.0, |acc, v| acc + v) / values.len() as f64
}

// Population standard deviation: the squared deviations are averaged over n.
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let square_diffs: Vec<f64> = values.iter().map(|v| (v - mean).powi(2)).collect();
    average(&square_diffs).sqrt()
}

// Key used to compare team names typed by hand with the recorded ones.
fn team_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut res: Vec<String> = Vec::new();
    for id in ids.iter() {
        if seen.insert(id.as_str()) {
            res.push(id.clone());
        } else {
            debug!("dedup_preserving_order: dropping duplicate {:?}", id);
        }
    }
    res
}

// Descending order on floats. Used with stable sorts only, so that equal
// values keep their first-seen order.
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Computes the mean and the population standard deviation of every judge.
///
/// Judges are returned in the order in which they first appear in `scores`.
/// A judge with a single score has a standard deviation of zero.
pub fn judge_stats(scores: &[ScoreRecord]) -> Vec<(String, JudgeStats)> {
    let mut judge_order: Vec<String> = Vec::new();
    let mut totals_by_judge: HashMap<&str, Vec<f64>> = HashMap::new();
    for s in scores.iter() {
        totals_by_judge
            .entry(s.judge_id.as_str())
            .or_insert_with(|| {
                judge_order.push(s.judge_id.clone());
                Vec::new()
            })
            .push(s.total as f64);
    }

    judge_order
        .into_iter()
        .map(|judge| {
            let totals = totals_by_judge
                .get(judge.as_str())
                .cloned()
                .unwrap_or_default();
            let mean = average(&totals);
            let stats = JudgeStats {
                mean,
                std_dev: population_std_dev(&totals, mean),
                score_count: totals.len(),
            };
            debug!("judge_stats: {}: {:?}", judge, stats);
            (judge, stats)
        })
        .collect()
}

/// The deviation of `total` from the judge's mean, in units of the judge's
/// standard deviation.
///
/// A judge without dispersion gives a neutral z-score of zero.
pub fn z_score(total: u32, stats: &JudgeStats) -> f64 {
    if stats.std_dev > 0.0 {
        (total as f64 - stats.mean) / stats.std_dev
    } else {
        0.0
    }
}

/// Removes the rating tendency of each judge from the scores.
///
/// Every score is converted to a z-score relative to the judge who gave it,
/// and a team's normalized score is the average of its z-scores. Teams are
/// returned best first. Ties keep the order in which the teams first appear
/// in `scores`.
///
/// The scores are expected to hold one current record per (judge, team) pair.
pub fn normalize_judge_scores(scores: &[ScoreRecord]) -> NormalizedScores {
    let stats = judge_stats(scores);
    normalize_with_stats(scores, &stats)
}

fn normalize_with_stats(
    scores: &[ScoreRecord],
    stats: &[(String, JudgeStats)],
) -> NormalizedScores {
    info!(
        "normalize_judge_scores: Processing {:?} scores from {:?} judges",
        scores.len(),
        stats.len()
    );
    if scores.is_empty() {
        return NormalizedScores::default();
    }

    let stats_by_judge: HashMap<&str, &JudgeStats> =
        stats.iter().map(|(j, s)| (j.as_str(), s)).collect();

    let mut team_order: Vec<String> = Vec::new();
    let mut by_team: HashMap<&str, TeamAccumulator> = HashMap::new();
    for s in scores.iter() {
        let z = match stats_by_judge.get(s.judge_id.as_str()) {
            Some(js) => z_score(s.total, js),
            None => {
                warn!(
                    "normalize_judge_scores: no statistics for judge {:?}, using a neutral score",
                    s.judge_id
                );
                0.0
            }
        };
        debug!(
            "normalize_judge_scores: {} -> {}: total {} z {}",
            s.judge_id, s.team_id, s.total, z
        );
        let acc = by_team.entry(s.team_id.as_str()).or_insert_with(|| {
            team_order.push(s.team_id.clone());
            TeamAccumulator::default()
        });
        acc.z_scores.push(z);
        acc.totals.push(s.total as f64);
        if !acc.judge_ids.contains(&s.judge_id) {
            acc.judge_ids.push(s.judge_id.clone());
        }
    }

    let mut teams: Vec<TeamNormalizedScore> = team_order
        .into_iter()
        .filter_map(|team_id| {
            let acc = by_team.remove(team_id.as_str())?;
            Some(TeamNormalizedScore {
                normalized_score: average(&acc.z_scores),
                raw_average: average(&acc.totals),
                judge_count: acc.judge_ids.len(),
                judge_ids: acc.judge_ids,
                team_id,
            })
        })
        .collect();
    teams.sort_by(|a, b| descending(a.normalized_score, b.normalized_score));

    for t in teams.iter() {
        info!(
            "Team: {:>8.4} {} ({} judges, raw average {:.2})",
            t.normalized_score, t.team_id, t.judge_count, t.raw_average
        );
    }
    NormalizedScores { teams }
}

/// Picks the teams of the final audience round.
pub fn select_finalists(normalized: &NormalizedScores, policy: &FinalistPolicy) -> Vec<String> {
    let res = match policy {
        FinalistPolicy::Explicit(teams) => dedup_preserving_order(teams),
        FinalistPolicy::TopN {
            count,
            include,
            exclude,
        } => select_top_n(normalized, *count, include, exclude),
    };
    info!("select_finalists: {} -> {:?}", policy, res);
    res
}

fn select_top_n(
    normalized: &NormalizedScores,
    count: usize,
    include: &[String],
    exclude: &[String],
) -> Vec<String> {
    let excluded: HashSet<String> = exclude.iter().map(|s| team_key(s)).collect();

    // The boolean marks the teams added by hand. They are never replaced.
    let mut selected: Vec<(String, bool)> = normalized
        .teams
        .iter()
        .filter(|t| !excluded.contains(&team_key(&t.team_id)))
        .take(count)
        .map(|t| (t.team_id.clone(), false))
        .collect();
    debug!("select_top_n: before overrides: {:?}", selected);

    for name in include.iter() {
        let key = team_key(name);
        if key.is_empty() {
            continue;
        }
        if excluded.contains(&key) {
            warn!(
                "select_top_n: {:?} is both included and excluded, excluding it",
                name
            );
            continue;
        }
        if selected.iter().any(|(t, _)| team_key(t) == key) {
            continue;
        }
        let canonical = match normalized.teams.iter().find(|t| team_key(&t.team_id) == key) {
            Some(t) => t.team_id.clone(),
            None => {
                warn!(
                    "select_top_n: {:?} has no judge scores, it can only win on votes",
                    name
                );
                name.trim().to_string()
            }
        };
        if selected.len() >= count {
            if let Some(pos) = selected.iter().rposition(|(_, pinned)| !pinned) {
                let (replaced, _) = selected.remove(pos);
                debug!("select_top_n: {:?} replaces {:?}", canonical, replaced);
            }
        }
        selected.push((canonical, true));
    }
    selected.into_iter().map(|(t, _)| t).collect()
}

// A finalist without judge scores was typed by hand. When the vote sheet
// spells it differently only by case or surrounding whitespace, the vote
// sheet wins, since votes are counted on exact names.
fn match_vote_spelling(
    normalized: &NormalizedScores,
    votes: &[VoteRecord],
    finalists: Vec<String>,
) -> Vec<String> {
    finalists
        .into_iter()
        .map(|team| {
            if normalized.get(&team).is_some() || votes.iter().any(|v| v.team_id == team) {
                return team;
            }
            let key = team_key(&team);
            match votes.iter().find(|v| team_key(&v.team_id) == key) {
                Some(v) => {
                    debug!(
                        "match_vote_spelling: {:?} is spelled {:?} on the votes",
                        team, v.team_id
                    );
                    v.team_id.clone()
                }
                None => team,
            }
        })
        .collect()
}

fn rescale(z: f64, min_z: f64, z_range: f64) -> f64 {
    if z_range > 0.0 {
        (z - min_z) / z_range
    } else {
        // No differentiation between the finalists.
        0.5
    }
}

/// Blends the judge signal of the finalists with the audience votes.
///
/// The average z-scores are min-max rescaled across the finalists only, then
/// combined with the share of the votes cast for a finalist. A finalist
/// without judge scores counts as a z-score of zero. Votes for teams outside
/// of the finalists are ignored.
///
/// The result is sorted by final score, best first. Ties keep the order of
/// `finalist_ids`.
pub fn compute_final_ranking(
    normalized: &NormalizedScores,
    votes: &[VoteRecord],
    finalist_ids: &[String],
) -> Vec<TeamRanking> {
    let finalists = dedup_preserving_order(finalist_ids);
    info!(
        "compute_final_ranking: Processing {:?} finalists and {:?} votes",
        finalists.len(),
        votes.len()
    );
    if finalists.is_empty() {
        return Vec::new();
    }

    let judge_signals: Vec<(&String, Option<&TeamNormalizedScore>)> = finalists
        .iter()
        .map(|team| {
            let n = normalized.get(team);
            if n.is_none() {
                debug!("compute_final_ranking: no judge scores for {:?}", team);
            }
            (team, n)
        })
        .collect();

    let z_avgs: Vec<f64> = judge_signals
        .iter()
        .map(|(_, n)| n.map(|t| t.normalized_score).unwrap_or(0.0))
        .collect();
    let min_z = z_avgs.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_z = z_avgs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let z_range = max_z - min_z;
    debug!(
        "compute_final_ranking: min_z: {:?} max_z: {:?} range: {:?}",
        min_z, max_z, z_range
    );

    let mut tally: HashMap<&str, u64> = finalists.iter().map(|t| (t.as_str(), 0)).collect();
    for v in votes.iter() {
        if let Some(c) = tally.get_mut(v.team_id.as_str()) {
            *c += 1;
        }
    }
    let total_votes: u64 = tally.values().sum();
    debug!(
        "compute_final_ranking: tally: {:?} total: {:?}",
        tally, total_votes
    );
    for (team, n) in judge_signals.iter() {
        if n.is_none() && tally.get(team.as_str()) == Some(&0) {
            warn!(
                "compute_final_ranking: finalist {:?} has neither judge scores nor votes, check its spelling",
                team
            );
        }
    }

    let mut rankings: Vec<TeamRanking> = judge_signals
        .iter()
        .zip(z_avgs.iter())
        .map(|((team, n), &z)| {
            let vote_count = tally.get(team.as_str()).cloned().unwrap_or(0);
            let vote_percent = if total_votes > 0 {
                vote_count as f64 / total_votes as f64
            } else {
                0.0
            };
            let rescaled = rescale(z, min_z, z_range);
            TeamRanking {
                team_id: team.to_string(),
                judge_z_average: z,
                normalized_judge_score: rescaled,
                raw_average: n.map(|t| t.raw_average).unwrap_or(0.0),
                judge_count: n.map(|t| t.judge_count).unwrap_or(0),
                judge_ids: n.map(|t| t.judge_ids.clone()).unwrap_or_default(),
                vote_count,
                vote_percent,
                final_score: JUDGE_WEIGHT * rescaled + VOTE_WEIGHT * vote_percent,
            }
        })
        .collect();
    rankings.sort_by(|a, b| descending(a.final_score, b.final_score));
    rankings
}

/// Runs the complete ranking: normalization, finalist selection and the
/// final blend with the votes.
///
/// Arguments:
/// * `scores` the current judge scores, one per (judge, team) pair
/// * `votes` the audience votes, one per voter
/// * `policy` how the finalists are selected
pub fn run_ranking(
    scores: &[ScoreRecord],
    votes: &[VoteRecord],
    policy: &FinalistPolicy,
) -> RankingResult {
    info!(
        "run_ranking: Processing {:?} scores, {:?} votes, finalists: {}",
        scores.len(),
        votes.len(),
        policy
    );
    let stats = judge_stats(scores);
    for (judge, js) in stats.iter() {
        info!(
            "Judge: {}: mean {:.2} std dev {:.2} over {} scores",
            judge, js.mean, js.std_dev, js.score_count
        );
    }
    let normalized = normalize_with_stats(scores, &stats);
    let finalists = match_vote_spelling(
        &normalized,
        votes,
        select_finalists(&normalized, policy),
    );
    let rankings = compute_final_ranking(&normalized, votes, &finalists);
    let total_votes: u64 = rankings.iter().map(|r| r.vote_count).sum();

    info!("Final ranking ({} votes for finalists)", total_votes);
    for (idx, r) in rankings.iter().enumerate() {
        info!(
            "{:>6} {:.4} {} -> judges {:.4}, votes {} ({:.1}%)",
            idx + 1,
            r.final_score,
            r.team_id,
            r.normalized_judge_score,
            r.vote_count,
            r.vote_percent * 100.0
        );
    }

    RankingResult {
        judge_stats: stats,
        normalized,
        finalists,
        rankings,
        total_votes,
    }
}
