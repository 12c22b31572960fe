//! Closed enumerations that govern how edges react to endpoint changes.
//!
//! `Direction` decides which endpoint replacement an edge follows and
//! `Dependence` decides which endpoint removal it propagates. The two are
//! consulted independently: update propagation only looks at direction and
//! removal cascades only look at dependence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Which endpoint replacements an edge follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Neither endpoint is watched.
    Undirected,
    /// The start endpoint is watched.
    #[default]
    Directed,
    /// The end endpoint is watched.
    Reverse,
    /// Both endpoints are watched.
    Bidirected,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Undirected,
        Direction::Directed,
        Direction::Reverse,
        Direction::Bidirected,
    ];

    /// Returns `true` if a new revision of the start node carries the edge
    /// forward.
    pub fn follows_start(self) -> bool {
        matches!(self, Self::Directed | Self::Bidirected)
    }

    /// Returns `true` if a new revision of the end node carries the edge
    /// forward.
    pub fn follows_end(self) -> bool {
        matches!(self, Self::Bidirected | Self::Reverse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undirected => "undirected",
            Self::Directed => "directed",
            Self::Reverse => "reverse",
            Self::Bidirected => "bidirected",
        }
    }
}

impl FromStr for Direction {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| TypeError::InvalidDirection(s.to_string()))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which endpoint removals an edge propagates to the opposite endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependence {
    /// Removal never cascades; the surviving endpoint is orphaned.
    #[default]
    None,
    /// Removing the end also removes the start.
    Forward,
    /// Removing the start also removes the end.
    Inverse,
    /// Removing either endpoint removes the other.
    Mutual,
}

impl Dependence {
    pub const ALL: [Dependence; 4] = [
        Dependence::None,
        Dependence::Forward,
        Dependence::Inverse,
        Dependence::Mutual,
    ];

    /// Returns `true` if removing the start node must also remove the end.
    pub fn cascades_from_start(self) -> bool {
        matches!(self, Self::Mutual | Self::Inverse)
    }

    /// Returns `true` if removing the end node must also remove the start.
    pub fn cascades_from_end(self) -> bool {
        matches!(self, Self::Mutual | Self::Forward)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Forward => "forward",
            Self::Inverse => "inverse",
            Self::Mutual => "mutual",
        }
    }
}

impl FromStr for Dependence {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| TypeError::InvalidDependence(s.to_string()))
    }
}

impl fmt::Display for Dependence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The domain kind of a stored entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Model {
    Node,
    Edge,
    Resource,
    Component,
    Relationship,
    /// A node that includes resources it does not own.
    Collection,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Model::Node,
        Model::Edge,
        Model::Resource,
        Model::Component,
        Model::Relationship,
        Model::Collection,
    ];

    /// Returns `true` for models stored with start/end endpoints.
    pub fn is_edge(self) -> bool {
        matches!(self, Self::Edge | Self::Relationship)
    }

    /// Wire name, e.g. `origins:Component`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "origins:Node",
            Self::Edge => "origins:Edge",
            Self::Resource => "origins:Resource",
            Self::Component => "origins:Component",
            Self::Relationship => "origins:Relationship",
            Self::Collection => "origins:Collection",
        }
    }
}

impl FromStr for Model {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| TypeError::InvalidModel(s.to_string()))
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
