use clap::Parser;

/// Produces the tally report of an acta recorded by the acta engine.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON document holding the recorded actas.
    #[clap(short, long, value_parser)]
    pub store: String,

    /// (file path) The reference data: mesas, circunscripciones, vote limits and
    /// the organization catalog, in JSON format.
    #[clap(long, value_parser)]
    pub reference_data: String,

    /// (file path, optional) The engine configuration in JSON format. The standard
    /// election categories are used if not provided.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (optional) The election category. Defaults to the active category of the store.
    #[clap(long, value_parser)]
    pub category: Option<String>,

    /// (optional) The position of the acta in its category. Defaults to the active acta.
    #[clap(long, value_parser)]
    pub index: Option<usize>,

    /// If passed as an argument, lists the actas of the category instead of producing a report.
    #[clap(long, takes_value = false)]
    pub list: bool,

    /// (file path) A reference report in JSON format. If provided, actas will
    /// check that the produced report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
