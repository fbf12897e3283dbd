use crate::args::Args;
use crate::rank::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "eventName")]
    pub event_name: Option<String>,
    #[serde(rename = "eventDate")]
    pub event_date: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Csv,
    Xlsx,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SheetSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
}

impl SheetSource {
    pub fn from_path(path: &str, provider: Option<String>) -> SheetSource {
        SheetSource {
            provider,
            file_path: path.to_string(),
            worksheet_name: None,
        }
    }

    /// The declared provider, or a guess from the file extension.
    pub fn provider(&self) -> RankResult<Provider> {
        match self.provider.as_deref() {
            Some("csv") => Ok(Provider::Csv),
            Some("xlsx") => Ok(Provider::Xlsx),
            Some(x) => UnknownInputTypeSnafu { input_type: x }.fail(),
            None if self.file_path.to_lowercase().ends_with(".xlsx") => Ok(Provider::Xlsx),
            None => Ok(Provider::Csv),
        }
    }

    pub fn worksheet_name_or(&self, default_name: &str) -> String {
        self.worksheet_name
            .clone()
            .unwrap_or_else(|| default_name.to_string())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinalistSettings {
    pub mode: Option<String>,
    pub count: Option<usize>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub teams: Option<Vec<String>>,
}

impl FinalistSettings {
    pub fn policy(&self) -> RankResult<FinalistPolicy> {
        let res = match self.mode.as_deref() {
            None | Some("topN") => FinalistPolicy::TopN {
                count: self
                    .count
                    .unwrap_or(FinalistPolicy::DEFAULT_FINALIST_COUNT),
                include: self.include.clone().unwrap_or_default(),
                exclude: self.exclude.clone().unwrap_or_default(),
            },
            Some("explicit") => match self.teams.clone() {
                Some(teams) if !teams.is_empty() => FinalistPolicy::Explicit(teams),
                _ => whatever!("finalist mode explicit requires a non-empty list of teams"),
            },
            Some(x) => whatever!("unknown finalist mode: {} (expected topN or explicit)", x),
        };
        Ok(res)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct RankConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "scoresSource")]
    pub scores_source: Option<SheetSource>,
    #[serde(rename = "votesSource")]
    pub votes_source: Option<SheetSource>,
    #[serde(rename = "participantsSource")]
    pub participants_source: Option<SheetSource>,
    #[serde(default)]
    pub finalists: FinalistSettings,
}

impl RankConfig {
    /// Applies the command line on top of the configuration file.
    pub fn apply_args(self, args: &Args) -> RankConfig {
        let provider = args.input_type.clone();
        let source = |arg: &Option<String>, current: Option<SheetSource>| match arg {
            Some(p) => Some(SheetSource::from_path(p, provider.clone())),
            None => current.map(|s| SheetSource {
                provider: provider.clone().or(s.provider),
                ..s
            }),
        };

        let mut finalists = self.finalists;
        if !args.finalists.is_empty() {
            finalists.mode = Some("explicit".to_string());
            finalists.teams = Some(args.finalists.clone());
        }
        if args.top_n.is_some() {
            finalists.count = args.top_n;
        }
        if !args.include.is_empty() {
            finalists.include = Some(args.include.clone());
        }
        if !args.exclude.is_empty() {
            finalists.exclude = Some(args.exclude.clone());
        }

        let mut output_settings = self.output_settings;
        if args.out.is_some() {
            output_settings.output_path = args.out.clone();
        }

        RankConfig {
            output_settings,
            scores_source: source(&args.scores, self.scores_source),
            votes_source: source(&args.votes, self.votes_source),
            participants_source: source(&args.participants, self.participants_source),
            finalists,
        }
    }

    // Paths in a configuration file are relative to the file itself.
    fn resolve_paths(mut self, root: &Path) -> RankConfig {
        let resolve = |s: &mut Option<SheetSource>| {
            if let Some(src) = s.as_mut() {
                let p: PathBuf = [root, Path::new(&src.file_path)].iter().collect();
                src.file_path = p.as_path().display().to_string();
            }
        };
        resolve(&mut self.scores_source);
        resolve(&mut self.votes_source);
        resolve(&mut self.participants_source);
        if let Some(out) = self.output_settings.output_path.as_mut() {
            if out.as_str() != "stdout" {
                let p: PathBuf = [root, Path::new(out.as_str())].iter().collect();
                *out = p.as_path().display().to_string();
            }
        }
        self
    }
}

pub fn read_config(path: &str) -> RankResult<RankConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RankConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    let root = Path::new(path).parent().context(MissingParentDirSnafu {})?;
    Ok(config.resolve_paths(root))
}

pub fn read_summary(path: &str) -> RankResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
