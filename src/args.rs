use clap::Parser;

/// This program ranks the teams of a hackathon from the judge scores and the audience votes.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file containing the event configuration in JSON format.
    /// For more information about the file format, read the manual of the hackathon_ranking crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the outcome of a ranking in JSON format. If provided, hackrank will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the ranking will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The export of the Scores sheet. Overrides the source given in the configuration.
    #[clap(short, long, value_parser)]
    pub scores: Option<String>,

    /// (file path) The export of the Votes sheet. Overrides the source given in the configuration.
    #[clap(short, long, value_parser)]
    pub votes: Option<String>,

    /// (file path, optional) The export of the Participants sheet. When given, only checked-in
    /// participants may vote.
    #[clap(long, value_parser)]
    pub participants: Option<String>,

    /// (csv or xlsx) The type of the inputs. By default, inputs ending in .xlsx are read as
    /// workbooks and everything else as CSV.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (number, default 6) How many of the best teams go to the final round.
    #[clap(long, value_parser)]
    pub top_n: Option<usize>,

    /// (team name, repeatable) A team added to the final round regardless of its judge score.
    #[clap(long, value_parser)]
    pub include: Vec<String>,

    /// (team name, repeatable) A team kept out of the final round.
    #[clap(long, value_parser)]
    pub exclude: Vec<String>,

    /// (team name, repeatable) The exact list of finalists. Disables the top-n selection.
    #[clap(long, value_parser)]
    pub finalists: Vec<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
