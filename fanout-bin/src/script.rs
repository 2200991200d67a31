//! Line oriented command scripts.
//!
//! ```text
//! # comment
//! sub <client> <filter>
//! unsub <client> <filter>
//! unsuball <client>
//! dereg <client>
//! pub <topic> <payload...>
//! match <topic>
//! drain
//! list
//! stats
//! ```
//!
//! Clients are named, a name is registered with the tree on first use.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use fanout::{DeliverySink, SubscriberId, Topic, TopicTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe { client: String, filter: String },
    Unsubscribe { client: String, filter: String },
    UnsubscribeAll { client: String },
    Deregister { client: String },
    Publish { topic: String, payload: String },
    Match { topic: String },
    Drain,
    List,
    Stats,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim_start()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();
        let mut arg = |name: &str| {
            args.next().map(str::to_owned).ok_or_else(|| anyhow!("'{}' is missing <{}>", cmd, name))
        };

        let command = match cmd {
            "sub" => Command::Subscribe { client: arg("client")?, filter: arg("filter")? },
            "unsub" => Command::Unsubscribe { client: arg("client")?, filter: arg("filter")? },
            "unsuball" => Command::UnsubscribeAll { client: arg("client")? },
            "dereg" => Command::Deregister { client: arg("client")? },
            "pub" => {
                let (topic, payload) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if topic.is_empty() {
                    return Err(anyhow!("'pub' is missing <topic>"));
                }
                Command::Publish { topic: topic.to_owned(), payload: payload.trim_start().to_owned() }
            }
            "match" => Command::Match { topic: arg("topic")? },
            "drain" => Command::Drain,
            "list" => Command::List,
            "stats" => Command::Stats,
            _ => return Err(anyhow!("unknown command '{}'", cmd)),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Subscribe { client, filter } => write!(f, "sub {} {}", client, filter),
            Command::Unsubscribe { client, filter } => write!(f, "unsub {} {}", client, filter),
            Command::UnsubscribeAll { client } => write!(f, "unsuball {}", client),
            Command::Deregister { client } => write!(f, "dereg {}", client),
            Command::Publish { topic, payload } => write!(f, "pub {} {}", topic, payload),
            Command::Match { topic } => write!(f, "match {}", topic),
            Command::Drain => write!(f, "drain"),
            Command::List => write!(f, "list"),
            Command::Stats => write!(f, "stats"),
        }
    }
}

/// Parses a script, skipping blank and `#` lines. Errors carry the line number.
pub fn parse(script: &str) -> Result<Vec<(usize, Command)>> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(no, line)| {
            line.parse::<Command>().map(|cmd| (no + 1, cmd)).map_err(|e| anyhow!("line {}: {}", no + 1, e))
        })
        .collect()
}

/// Output of a single command, besides whatever the sink does.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    Changed(bool),
    Removed(usize),
    Matched(usize),
    Delivered(usize),
    Lines(Vec<String>),
    Stats(serde_json::Value),
}

pub struct Runner<S> {
    tree: TopicTree<String, S>,
    clients: HashMap<String, SubscriberId>,
}

impl<S> Runner<S>
where
    S: DeliverySink<String>,
{
    pub fn new(tree: TopicTree<String, S>) -> Self {
        Self { tree, clients: HashMap::new() }
    }

    #[inline]
    pub fn tree(&self) -> &TopicTree<String, S> {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut TopicTree<String, S> {
        &mut self.tree
    }

    fn client(&mut self, name: &str) -> SubscriberId {
        if let Some(id) = self.clients.get(name) {
            return *id;
        }
        let id = self.tree.register(name.to_owned());
        log::debug!("registered client {} as {}", name, id);
        self.clients.insert(name.to_owned(), id);
        id
    }

    fn known(&self, name: &str) -> Result<SubscriberId> {
        self.clients.get(name).copied().ok_or_else(|| anyhow!("unknown client '{}'", name))
    }

    pub fn run(&mut self, cmd: &Command) -> Result<Outcome> {
        let outcome = match cmd {
            Command::Subscribe { client, filter } => {
                //a rejected filter must not leave a fresh client behind
                filter.parse::<Topic>()?;
                let id = self.client(client);
                Outcome::Changed(self.tree.subscribe(filter, id)?)
            }
            Command::Unsubscribe { client, filter } => {
                let id = self.known(client)?;
                Outcome::Changed(self.tree.unsubscribe(filter, id)?)
            }
            Command::UnsubscribeAll { client } => {
                let id = self.known(client)?;
                Outcome::Removed(self.tree.unsubscribe_all(id)?)
            }
            Command::Deregister { client } => {
                let id = self.known(client)?;
                self.tree.deregister(id)?;
                self.clients.remove(client);
                Outcome::Done
            }
            Command::Publish { topic, payload } => {
                Outcome::Matched(self.tree.publish(topic, payload.clone().into_bytes())?)
            }
            Command::Match { topic } => {
                let lines = self
                    .tree
                    .matches(topic)?
                    .into_iter()
                    .filter_map(|id| self.tree.subscriber(id))
                    .map(|s| format!("{} {}", s.id(), s.handle()))
                    .collect();
                Outcome::Lines(lines)
            }
            Command::Drain => Outcome::Delivered(self.tree.drain()),
            Command::List => Outcome::Lines(self.tree.list(usize::MAX)),
            Command::Stats => Outcome::Stats(self.tree.stats().to_json()),
        };
        Ok(outcome)
    }

    /// Runs every command, stopping at the first failure.
    #[cfg(test)]
    pub fn run_all(&mut self, cmds: &[(usize, Command)]) -> Result<Vec<Outcome>> {
        cmds.iter()
            .map(|(no, cmd)| {
                log::debug!("line {}: {}", no, cmd);
                self.run(cmd).map_err(|e| anyhow!("line {}: '{}' failed, {}", no, cmd, e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use fanout::bytes::Bytes;
    use fanout::RecordingSink;

    use super::*;

    #[test]
    fn test_parse() {
        let cmds = parse(
            r#"
            # warm up
            sub a sport/#
            pub sport/tennis  hello world
            unsub a sport/#
            unsuball a
            dereg a
            drain
            list
            stats
            "#,
        )
        .unwrap();
        assert_eq!(cmds.len(), 8);
        assert_eq!(cmds[0], (3, Command::Subscribe { client: "a".into(), filter: "sport/#".into() }));
        assert_eq!(
            cmds[1].1,
            Command::Publish { topic: "sport/tennis".into(), payload: "hello world".into() }
        );
        assert_eq!(cmds[4].1, Command::Deregister { client: "a".into() });
        assert_eq!(cmds[7].1, Command::Stats);

        let err = parse("sub a\n").unwrap_err();
        assert_eq!(err.to_string(), "line 1: 'sub' is missing <filter>");
        assert!(parse("\n\nfly away\n").unwrap_err().to_string().starts_with("line 3:"));
        assert!(parse("pub\n").is_err());
    }

    #[test]
    fn test_run() {
        let cmds = parse(
            r#"
            sub a sport/+
            sub b sport/#
            sub b sport/tennis
            pub sport/tennis 1;
            pub sport 2;
            drain
            "#,
        )
        .unwrap();
        let mut runner = Runner::new(TopicTree::new(RecordingSink::new()));
        let outcomes = runner.run_all(&cmds).unwrap();
        assert_eq!(outcomes[3], Outcome::Matched(3));
        assert_eq!(outcomes[4], Outcome::Matched(1));
        assert_eq!(outcomes[5], Outcome::Delivered(2));

        let a = runner.known("a").unwrap();
        let b = runner.known("b").unwrap();
        let deliveries = runner.tree_mut().sink_mut().take();
        assert_eq!(deliveries, vec![(a, Bytes::from("1;")), (b, Bytes::from("1;2;"))]);
        assert_eq!(runner.tree().subscriber(b).map(|s| s.handle().as_str()), Some("b"));
    }

    #[test]
    fn test_run_errors() {
        let mut runner = Runner::new(TopicTree::new(RecordingSink::new()));
        let cmds = parse("sub a a/#/b\n").unwrap();
        let err = runner.run_all(&cmds).unwrap_err();
        assert!(err.to_string().starts_with("line 1: 'sub a a/#/b' failed"));
        assert!(runner.known("a").is_err());
        assert_eq!(runner.tree().subscribers_size(), 0);

        let cmds = parse("unsub ghost a\n").unwrap();
        assert!(runner.run_all(&cmds).is_err());

        let cmds = parse("sub a x\ndereg a\nunsuball a\n").unwrap();
        assert!(runner.run_all(&cmds).is_err());
        assert_eq!(runner.tree().subscribers_size(), 0);
    }

    #[test]
    fn test_match() {
        let cmds = parse("sub a x/+\nsub b x/#\nsub c y\nsub a x/y\nmatch x/y\nmatch y/z\n").unwrap();
        let mut runner = Runner::new(TopicTree::new(RecordingSink::new()));
        let outcomes = runner.run_all(&cmds).unwrap();
        assert_eq!(outcomes[4], Outcome::Lines(vec!["S0 a".to_owned(), "S1 b".to_owned()]));
        assert_eq!(outcomes[5], Outcome::Lines(Vec::new()));
        assert_eq!(runner.tree().batch_len(), 0);
        assert!(runner.run(&Command::Match { topic: "x/+".into() }).is_err());
    }

    #[test]
    fn test_list_and_stats() {
        let cmds = parse("sub a x/y\npub x/y m\ndrain\nlist\nstats\n").unwrap();
        let mut runner = Runner::new(TopicTree::new(RecordingSink::new()));
        let outcomes = runner.run_all(&cmds).unwrap();
        match &outcomes[3] {
            Outcome::Lines(lines) => assert_eq!(lines.len(), 2),
            o => panic!("unexpected {:?}", o),
        }
        match &outcomes[4] {
            Outcome::Stats(v) => assert_eq!(v["deliveries"], 1),
            o => panic!("unexpected {:?}", o),
        }
    }
}
