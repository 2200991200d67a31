#![deny(unsafe_code)]

use std::io::{self, Read};

use anyhow::Result;
use serde_json::json;
use structopt::StructOpt;

use fanout::bytes::Bytes;
use fanout::{DeliveryStatus, SubscriberId, TopicTree};
use fanout_conf::{Options, Settings};

use crate::script::{Outcome, Runner};

mod logger;
mod script;

fn main() -> Result<()> {
    let settings = Settings::init(Options::from_args())?;
    let _guard = logger::logger_init(settings)?;
    Settings::logs()?;

    let source = match settings.opts.script.as_ref() {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let cmds = script::parse(&source)?;
    log::info!("loaded {} commands", cmds.len());

    let sink = |id: SubscriberId, client: &String, payload: &Bytes| {
        println!(
            "{}",
            json!({
                "subscriber": id.value(),
                "client": client,
                "payload": String::from_utf8_lossy(payload),
            })
        );
        DeliveryStatus::Delivered
    };
    let mut runner = Runner::new(TopicTree::with_config(&settings.tree, sink)?);

    for (no, cmd) in cmds.iter() {
        match runner.run(cmd) {
            Ok(Outcome::Lines(lines)) => lines.iter().for_each(|l| println!("{}", l)),
            Ok(Outcome::Stats(stats)) => println!("{}", stats),
            Ok(outcome) => log::debug!("line {}: {} => {:?}", no, cmd, outcome),
            Err(e) => {
                log::error!("line {}: '{}' failed, {}", no, cmd, e);
                return Err(e);
            }
        }
    }

    let deliveries = runner.tree_mut().drain();
    if deliveries > 0 {
        log::info!("final drain, deliveries: {}", deliveries);
    }

    let tree = runner.tree();
    if settings.opts.list {
        tree.list(usize::MAX).iter().for_each(|l| println!("{}", l));
    }
    log::info!(
        "nodes: {}, subscribers: {}, subscriptions: {}",
        tree.nodes_size(),
        tree.subscribers_size(),
        tree.values_size()
    );
    log::info!("stats: {}", tree.stats().to_json());
    Ok(())
}
