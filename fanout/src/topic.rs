use std::str::FromStr;

pub const SINGLE_WILDCARD: &str = "+";
pub const MULTI_WILDCARD: &str = "#";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("InvalidTopic({0})")]
    InvalidTopic(String),
    #[error("InvalidLevel({0})")]
    InvalidLevel(String),
}

/// One `/`-delimited segment of a topic filter.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub enum Level {
    Normal(String),
    Blank,
    SingleWildcard, // +
    MultiWildcard,  // #
}

impl Level {
    /// The trie key of this level.
    #[inline]
    pub fn segment(&self) -> &str {
        match *self {
            Level::Normal(ref s) => s,
            Level::Blank => "",
            Level::SingleWildcard => SINGLE_WILDCARD,
            Level::MultiWildcard => MULTI_WILDCARD,
        }
    }
}

impl FromStr for Level {
    type Err = TopicError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, TopicError> {
        match s {
            SINGLE_WILDCARD => Ok(Level::SingleWildcard),
            MULTI_WILDCARD => Ok(Level::MultiWildcard),
            "" => Ok(Level::Blank),
            _ if s.contains(['+', '#']) => {
                Err(TopicError::InvalidLevel(format!("invalid level `{}` contains +|#", s)))
            }
            _ => Ok(Level::Normal(String::from(s))),
        }
    }
}

/// A validated topic filter, as accepted by `subscribe`.
///
/// Non-empty, wildcards occupy a whole level and `#` is the last level.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub struct Topic(Vec<Level>);

impl Topic {
    #[inline]
    pub fn levels(&self) -> &[Level] {
        &self.0
    }

    /// Reference matcher, walks the filter level by level against `topic`.
    pub fn matches_str<S: AsRef<str> + ?Sized>(&self, topic: &S) -> bool {
        let mut lhs = self.0.iter();

        for rhs in topic.as_ref().split('/') {
            match lhs.next() {
                Some(&Level::SingleWildcard) => continue,
                Some(&Level::MultiWildcard) => return true,
                Some(level) if level.segment() == rhs => continue,
                _ => return false,
            }
        }

        matches!(lhs.next(), None | Some(&Level::MultiWildcard))
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, TopicError> {
        if s.is_empty() {
            return Err(TopicError::InvalidTopic("empty topic filter".into()));
        }
        let levels = s.split('/').map(Level::from_str).collect::<Result<Vec<_>, TopicError>>()?;
        if let Some(pos) = levels.iter().position(|l| *l == Level::MultiWildcard) {
            if pos != levels.len() - 1 {
                return Err(TopicError::InvalidTopic(format!("invalid topic `{}`, # is not last", s)));
            }
        }
        Ok(Topic(levels))
    }
}

/// Checks a concrete publish topic: non-empty, no wildcard characters.
#[inline]
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::InvalidTopic("empty topic name".into()));
    }
    if topic.contains(['+', '#']) {
        return Err(TopicError::InvalidTopic(format!("invalid topic name `{}` contains +|#", topic)));
    }
    Ok(())
}
