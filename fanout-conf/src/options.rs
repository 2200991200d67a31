use structopt::StructOpt;

use fanout::OverflowPolicy;

#[derive(StructOpt, Debug, Clone, Default)]
#[structopt(name = "fanout-replay", about = "Replays a subscribe/publish/drain script against a topic tree")]
pub struct Options {
    /// Config filename
    #[structopt(name = "config", short = "f", long)]
    pub cfg_name: Option<String>,

    /// Triggered batch capacity, 1..=64
    #[structopt(name = "batch-capacity", long)]
    pub batch_capacity: Option<usize>,

    /// Batch overflow policy, drain|reject
    #[structopt(name = "overflow", long)]
    pub overflow: Option<OverflowPolicy>,

    /// Print the topic tree after the script has run
    #[structopt(name = "list", long)]
    pub list: bool,

    /// Script file, reads stdin when omitted
    #[structopt(name = "script")]
    pub script: Option<String>,
}
