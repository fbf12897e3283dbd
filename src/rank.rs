use log::{debug, info, warn};

use hackathon_ranking::builder::Builder;
use hackathon_ranking::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_xlsx;

use crate::args::Args;
use crate::rank::config_reader::*;
use crate::rank::io_common::{
    parse_timestamp, require_any_column, require_columns, simplify_file_name, SheetRow,
};

#[derive(Debug, Snafu)]
pub enum RankError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Error opening CSV file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Line {lineno}: cannot read cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("The sheet {path} has no header row"))]
    EmptySheet { path: String },
    #[snafu(display("Column {column} not found in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Line {lineno}: cannot read {column} from {content:?}"))]
    InvalidNumber {
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("Line {lineno}: cannot read timestamp {content:?}"))]
    InvalidTimestamp {
        source: chrono::ParseError,
        lineno: usize,
        content: String,
    },
    #[snafu(display("Line {lineno}: {source}"))]
    InvalidRecord {
        source: RankingErrors,
        lineno: usize,
    },
    #[snafu(display("Ranking error: {source}"))]
    Ranking { source: RankingErrors },
    #[snafu(display("Unknown input type {input_type:?}, expected csv or xlsx"))]
    UnknownInputType { input_type: String },
    #[snafu(display("No {what} given: use the configuration file or the --{what} flag"))]
    MissingInput { what: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RankResult<T> = Result<T, RankError>;

const SCORE_CRITERIA: [&str; CRITERIA_COUNT] =
    ["technical", "creativity", "presentation", "usefulness"];
const VOTE_TEAM_COLUMNS: [&str; 2] = ["team_voted_for", "team_name"];

fn read_sheet(source: &SheetSource, default_worksheet: &str) -> RankResult<Vec<SheetRow>> {
    info!(
        "Attempting to read sheet {:?} from {:?}",
        default_worksheet,
        simplify_file_name(&source.file_path)
    );
    match source.provider()? {
        Provider::Csv => io_csv::read_csv_sheet(&source.file_path),
        Provider::Xlsx => io_xlsx::read_xlsx_sheet(
            &source.file_path,
            &source.worksheet_name_or(default_worksheet),
        ),
    }
}

fn header_of(rows: &[SheetRow]) -> Vec<String> {
    rows.first()
        .map(|r| r.cells.keys().cloned().collect())
        .unwrap_or_default()
}

/// Adds the rows of the Scores sheet to the builder.
///
/// Returns the project idea of every team, taken from its most recent score.
fn validate_scores(
    rows: &[SheetRow],
    path: &str,
    builder: &mut Builder,
) -> RankResult<HashMap<String, String>> {
    if !rows.is_empty() {
        let header = header_of(rows);
        require_columns(&header, &["judge_name", "team_name", "timestamp"], path)?;
    }

    let mut ideas: HashMap<String, (DateTime<Utc>, String)> = HashMap::new();
    for row in rows.iter() {
        let lineno = row.lineno;
        let judge = row.get("judge_name");
        let team = row.get("team_name");
        if judge.is_empty() || team.is_empty() {
            warn!(
                "validate_scores: line {}: missing judge or team, skipping {:?}",
                lineno, row.cells
            );
            continue;
        }
        let timestamp = parse_timestamp(row.get("timestamp"), lineno)?;

        let mut criteria = [0u32; CRITERIA_COUNT];
        let mut has_criteria = true;
        for (slot, column) in criteria.iter_mut().zip(SCORE_CRITERIA.iter()) {
            match row.get_u32(column)? {
                Some(x) => *slot = x,
                None => has_criteria = false,
            }
        }

        if has_criteria {
            let total = row.get_u32("total")?;
            let sum: u32 = criteria.iter().sum();
            if total.map_or(false, |t| t != sum) {
                warn!(
                    "validate_scores: line {}: total {:?} does not match the criteria, using {}",
                    lineno, total, sum
                );
            }
            builder
                .add_score(judge, team, &criteria, timestamp)
                .context(InvalidRecordSnafu { lineno })?;
        } else {
            let total = row
                .get_u32("total")?
                .context(InvalidNumberSnafu {
                    lineno,
                    column: "total",
                    content: "",
                })?;
            let record = ScoreRecord {
                judge_id: judge.to_string(),
                team_id: team.to_string(),
                total,
                timestamp,
            };
            builder
                .add_score_record(&record)
                .context(InvalidRecordSnafu { lineno })?;
        }

        let idea = row.get("idea");
        if !idea.is_empty() {
            let e = ideas
                .entry(team.to_string())
                .or_insert_with(|| (timestamp, idea.to_string()));
            if timestamp >= e.0 {
                *e = (timestamp, idea.to_string());
            }
        }
    }
    debug!("validate_scores: ideas: {:?}", ideas);
    Ok(ideas.into_iter().map(|(team, (_, idea))| (team, idea)).collect())
}

/// Adds the rows of the Votes sheet to the builder.
///
/// Votes that the ballot box would have refused are skipped. Returns the
/// number of skipped votes.
fn validate_votes(rows: &[SheetRow], path: &str, builder: &mut Builder) -> RankResult<usize> {
    if !rows.is_empty() {
        let header = header_of(rows);
        require_columns(&header, &["email"], path)?;
        require_any_column(&header, &VOTE_TEAM_COLUMNS, path)?;
    }

    let mut skipped: usize = 0;
    for row in rows.iter() {
        let voter = row.get("email");
        let team = row.get_any(&VOTE_TEAM_COLUMNS);
        if let Err(e) = builder.add_vote(voter, team) {
            warn!("validate_votes: line {}: skipping vote: {}", row.lineno, e);
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!("validate_votes: {} votes skipped", skipped);
    }
    Ok(skipped)
}

/// The participants who may vote: the ones who joined a team at check-in.
fn read_voters(rows: &[SheetRow], path: &str) -> RankResult<Vec<String>> {
    if !rows.is_empty() {
        require_columns(&header_of(rows), &["email", "team_name"], path)?;
    }
    Ok(rows
        .iter()
        .filter(|r| !r.get("team_name").is_empty())
        .map(|r| r.get("email").to_string())
        .filter(|e| !e.is_empty())
        .collect())
}

fn result_to_json(rv: &RankingResult, ideas: &HashMap<String, String>) -> JSValue {
    let judges: Vec<JSValue> = rv
        .judge_stats
        .iter()
        .map(|(judge, js)| {
            json!({
                "judge": judge,
                "mean": js.mean,
                "stdDev": js.std_dev,
                "scoreCount": js.score_count,
            })
        })
        .collect();

    let teams: Vec<JSValue> = rv
        .normalized
        .teams
        .iter()
        .map(|t| {
            json!({
                "team": t.team_id,
                "normalizedScore": t.normalized_score,
                "rawAverage": t.raw_average,
                "judgeCount": t.judge_count,
                "judges": t.judge_ids,
            })
        })
        .collect();

    let rankings: Vec<JSValue> = rv
        .rankings
        .iter()
        .map(|r| {
            json!({
                "team": r.team_id,
                "idea": ideas.get(&r.team_id).cloned().unwrap_or_default(),
                "judgeScore": r.normalized_judge_score,
                "judgeZAvg": r.judge_z_average,
                "judgeRaw": r.raw_average,
                "judgeCount": r.judge_count,
                "judges": r.judge_ids,
                "votes": r.vote_count,
                "votePercent": r.vote_percent,
                "finalScore": r.final_score,
            })
        })
        .collect();

    json!({
        "judges": judges,
        "teams": teams,
        "finalists": rv.finalists,
        "totalVotes": rv.total_votes,
        "rankings": rankings,
    })
}

fn build_summary_js(
    config: &RankConfig,
    policy: &FinalistPolicy,
    rv: &RankingResult,
    ideas: &HashMap<String, String>,
) -> JSValue {
    json!({
        "config": {
            "event": config.output_settings.event_name,
            "date": config.output_settings.event_date,
            "finalistPolicy": policy.to_string(),
        },
        "results": result_to_json(rv, ideas),
    })
}

fn write_summary(out: &str, pretty_js: &str) -> RankResult<()> {
    if out == "stdout" {
        println!("{}", pretty_js);
    } else {
        info!("Writing summary to {:?}", out);
        fs::write(out, pretty_js).context(WritingOutputSnafu { path: out })?;
    }
    Ok(())
}

fn check_reference(reference_path: &str, summary_js: &JSValue) -> RankResult<()> {
    let summary_ref = read_summary(reference_path)?;
    debug!("reference summary: {:?}", summary_ref);
    if summary_ref != *summary_js {
        warn!("Found differences with the reference summary");
        let pretty_ref = serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        let pretty_js = serde_json::to_string_pretty(summary_js).context(ParsingJsonSnafu {})?;
        print_diff(pretty_ref.as_str(), pretty_js.as_str(), "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("The summary matches the reference {:?}", reference_path);
    Ok(())
}

/// Reads the event sheets, ranks the teams and returns the JSON summary.
pub fn run_event(config: &RankConfig) -> RankResult<JSValue> {
    debug!("run_event: config: {:?}", config);
    let policy = config.finalists.policy()?;

    let scores_source = config
        .scores_source
        .as_ref()
        .context(MissingInputSnafu { what: "scores" })?;
    let votes_source = config
        .votes_source
        .as_ref()
        .context(MissingInputSnafu { what: "votes" })?;

    let mut builder = Builder::new(&policy).context(RankingSnafu {})?;
    if let Some(participants_source) = config.participants_source.as_ref() {
        let rows = read_sheet(participants_source, "Participants")?;
        let voters = read_voters(&rows, &participants_source.file_path)?;
        info!("{} participants may vote", voters.len());
        builder = builder.participants(&voters).context(RankingSnafu {})?;
    }

    let score_rows = read_sheet(scores_source, "Scores")?;
    let ideas = validate_scores(&score_rows, &scores_source.file_path, &mut builder)?;
    let vote_rows = read_sheet(votes_source, "Votes")?;
    validate_votes(&vote_rows, &votes_source.file_path, &mut builder)?;
    info!(
        "Collected {} scores and {} votes",
        builder.scores().len(),
        builder.votes().len()
    );

    let result = builder.run();
    Ok(build_summary_js(config, &policy, &result, &ideas))
}

pub fn run_from_args(args: &Args) -> RankResult<()> {
    let config = match args.config.as_deref() {
        Some(path) => read_config(path)?,
        None => RankConfig::default(),
    }
    .apply_args(args);

    let summary_js = run_event(&config)?;

    let pretty_js = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    if let Some(out) = config.output_settings.output_path.as_deref() {
        write_summary(out, &pretty_js)?;
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = args.reference.as_deref() {
        check_reference(reference_path, &summary_js)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn row(lineno: usize, pairs: &[(&str, &str)]) -> SheetRow {
        let header: Vec<String> = pairs.iter().map(|p| p.0.to_string()).collect();
        let values: Vec<String> = pairs.iter().map(|p| p.1.to_string()).collect();
        SheetRow::new(lineno, &header, &values)
    }

    fn score_row(lineno: usize, judge: &str, team: &str, criteria: [&str; 4], ts: &str) -> SheetRow {
        row(
            lineno,
            &[
                ("judge_name", judge),
                ("team_name", team),
                ("idea", ""),
                ("technical", criteria[0]),
                ("creativity", criteria[1]),
                ("presentation", criteria[2]),
                ("usefulness", criteria[3]),
                ("total", ""),
                ("timestamp", ts),
            ],
        )
    }

    fn builder() -> Builder {
        Builder::new(&FinalistPolicy::DEFAULT_POLICY).unwrap()
    }

    #[test]
    fn scores_from_criteria_or_total() {
        let rows = vec![
            score_row(2, "Grace", "Rustaceans", ["8", "9", "7", "6"], "2025-03-01T14:00:00Z"),
            row(
                3,
                &[
                    ("judge_name", "Ada"),
                    ("team_name", "Rustaceans"),
                    ("total", "22"),
                    ("timestamp", "2025-03-01T14:10:00Z"),
                ],
            ),
            score_row(4, "", "Gophers", ["1", "1", "1", "1"], "2025-03-01T14:00:00Z"),
        ];
        let mut b = builder();
        validate_scores(&rows, "scores.csv", &mut b).unwrap();
        assert_eq!(b.scores().len(), 2);
        assert_eq!(b.scores()[0].total, 30);
        assert_eq!(b.scores()[1].total, 22);
    }

    #[test]
    fn invalid_criterion_is_fatal() {
        let rows = vec![score_row(
            7,
            "Grace",
            "Rustaceans",
            ["8", "11", "7", "6"],
            "2025-03-01T14:00:00Z",
        )];
        let mut b = builder();
        assert!(matches!(
            validate_scores(&rows, "scores.csv", &mut b),
            Err(RankError::InvalidRecord { lineno: 7, .. })
        ));
    }

    #[test]
    fn missing_total_is_fatal() {
        let rows = vec![score_row(
            3,
            "Grace",
            "Rustaceans",
            ["8", "", "7", "6"],
            "2025-03-01T14:00:00Z",
        )];
        let mut b = builder();
        assert!(matches!(
            validate_scores(&rows, "scores.csv", &mut b),
            Err(RankError::InvalidNumber { lineno: 3, .. })
        ));
    }

    #[test]
    fn scores_sheet_needs_its_columns() {
        let rows = vec![row(2, &[("judge_name", "Grace"), ("total", "20")])];
        let mut b = builder();
        assert!(matches!(
            validate_scores(&rows, "scores.csv", &mut b),
            Err(RankError::MissingColumn { .. })
        ));
    }

    #[test]
    fn latest_idea_is_kept() {
        let mut early = score_row(2, "Grace", "Rustaceans", ["5", "5", "5", "5"], "2025-03-01T14:00:00Z");
        early.cells.insert("idea".to_string(), "A borrow checker for cats".to_string());
        let mut late = score_row(3, "Ada", "Rustaceans", ["5", "5", "5", "5"], "2025-03-01T15:00:00Z");
        late.cells.insert("idea".to_string(), "A borrow checker for dogs".to_string());
        let mut b = builder();
        let ideas = validate_scores(&[late, early], "scores.csv", &mut b).unwrap();
        assert_eq!(ideas.get("Rustaceans").unwrap(), "A borrow checker for dogs");
    }

    #[test]
    fn refused_votes_are_skipped() {
        let rows = vec![
            row(2, &[("email", "ada@example.com"), ("team_voted_for", "Rustaceans")]),
            row(3, &[("email", "ADA@example.com"), ("team_voted_for", "Gophers")]),
            row(4, &[("email", "eve@example.com"), ("team_voted_for", "Gophers")]),
            row(5, &[("email", "bob@example.com"), ("team_voted_for", "")]),
        ];
        let mut b = builder()
            .participants(&["ada@example.com".to_string(), "bob@example.com".to_string()])
            .unwrap();
        assert_eq!(validate_votes(&rows, "votes.csv", &mut b).unwrap(), 3);
        assert_eq!(b.votes().len(), 1);
        assert_eq!(b.votes()[0].team_id, "Rustaceans");
    }

    #[test]
    fn votes_accept_team_name_column() {
        let rows = vec![row(2, &[("email", "ada@example.com"), ("team_name", "Gophers")])];
        let mut b = builder();
        assert_eq!(validate_votes(&rows, "votes.csv", &mut b).unwrap(), 0);
        assert_eq!(b.votes()[0].team_id, "Gophers");
    }

    #[test]
    fn voters_need_a_team() {
        let rows = vec![
            row(2, &[("email", "ada@example.com"), ("team_name", "Rustaceans")]),
            row(3, &[("email", "bob@example.com"), ("team_name", "")]),
        ];
        assert_eq!(
            read_voters(&rows, "participants.csv").unwrap(),
            vec!["ada@example.com".to_string()]
        );
    }

    #[test]
    fn missing_votes_source() {
        let args = Args::parse_from(["hackrank", "--scores", "scores.csv"]);
        let config = RankConfig::default().apply_args(&args);
        assert!(matches!(
            run_event(&config),
            Err(RankError::MissingInput { .. })
        ));
    }

    fn test_dir() -> PathBuf {
        [env!("CARGO_MANIFEST_DIR"), "tests", "data"].iter().collect()
    }

    fn run_event_test(test_name: &str) -> RankResult<()> {
        let dir: PathBuf = [test_dir(), PathBuf::from(test_name)].iter().collect();
        let config_path = dir.join(format!("{}_config.json", test_name));
        let summary_path = dir.join(format!("{}_expected_summary.json", test_name));
        info!("Running test {}", test_name);
        let config = read_config(&config_path.display().to_string())?;
        let summary_js = run_event(&config)?;
        check_reference(&summary_path.display().to_string(), &summary_js)
    }

    #[test]
    fn demo_event() {
        let _ = env_logger::builder().is_test(true).try_init();
        let res = run_event_test("demo_event");
        if let Err(e) = res.as_ref() {
            eprintln!("An error occured {}", e);
        }
        assert!(res.is_ok());
    }

    #[test]
    fn demo_event_xlsx() {
        let _ = env_logger::builder().is_test(true).try_init();
        let res = run_event_test("demo_event_xlsx");
        if let Err(e) = res.as_ref() {
            eprintln!("An error occured {}", e);
        }
        assert!(res.is_ok());
    }

    #[test]
    fn demo_event_explicit_finalists() {
        let args = Args::parse_from([
            "hackrank",
            "--finalists",
            "Gophers",
            "--finalists",
            "Late Team",
        ]);
        let dir: PathBuf = [test_dir(), PathBuf::from("demo_event")].iter().collect();
        let config = read_config(&dir.join("demo_event_config.json").display().to_string())
            .unwrap()
            .apply_args(&args);
        let js = run_event(&config).unwrap();
        let rankings = js["results"]["rankings"].as_array().unwrap();
        assert_eq!(rankings.len(), 2);
        // Both have a zero z-score: the finalist votes decide.
        assert_eq!(rankings[0]["team"], "Gophers");
        assert_eq!(rankings[1]["team"], "Late Team");
        assert_eq!(rankings[1]["judgeCount"], 0);
    }
}
