use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Why a revision stopped being valid.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Reason {
    /// Superseded by a revision with different attributes.
    AttributeChange,
    /// An endpoint of this edge was replaced by a new revision.
    NodeChange,
    /// Removed because a node it depends on was removed.
    NodeRemoved,
    /// Removed because a node depending on it was removed.
    DependentNodeRemoved,
    /// Explicitly removed by a user.
    RemovedByUser,
    /// Generic removal.
    #[default]
    Removed,
    /// Caller-defined reason.
    Custom(String),
}

impl Reason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AttributeChange => "origins:AttributeChange",
            Self::NodeChange => "origins:NodeChange",
            Self::NodeRemoved => "origins:NodeRemoved",
            Self::DependentNodeRemoved => "origins:DependentNodeRemoved",
            Self::RemovedByUser => "origins:RemovedByUser",
            Self::Removed => "origins:Remove",
            Self::Custom(s) => s,
        }
    }
}

impl FromStr for Reason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "origins:AttributeChange" => Self::AttributeChange,
            "origins:NodeChange" => Self::NodeChange,
            "origins:NodeRemoved" => Self::NodeRemoved,
            "origins:DependentNodeRemoved" => Self::DependentNodeRemoved,
            "origins:RemovedByUser" => Self::RemovedByUser,
            "origins:Remove" => Self::Removed,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl From<&str> for Reason {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(reason) => reason,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Reason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Reason::from(s.as_str()))
    }
}
