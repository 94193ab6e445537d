// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration, from code, JSON or environment variables.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a 3D edge event rewires the four facets around the vanishing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeEventPolicy {
    /// Flip when the facets that become adjacent meet at the smaller angle.
    #[default]
    Convex,
    /// Flip when the facets that become adjacent meet at the larger angle.
    Reflex,
    /// Always hand the edge to the two facets that were not adjacent.
    FlipAlways,
}

impl FromStr for EdgeEventPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "convex" => Ok(EdgeEventPolicy::Convex),
            "reflex" => Ok(EdgeEventPolicy::Reflex),
            "flip_always" | "flipalways" | "flip" => Ok(EdgeEventPolicy::FlipAlways),
            other => Err(Error::Config(format!("unknown edge event policy: {}", other))),
        }
    }
}

/// How vertices of degree > 3 are split before a 3D run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexSplitterKind {
    /// Convex vertices cut off their fastest corner first, reflex vertices
    /// their slowest. Mixed vertices fall back to the convex rule.
    #[default]
    Fast,
    /// Fastest corner first at every vertex.
    Convex,
    /// Slowest corner first at every vertex.
    Reflex,
    /// First separate the two facets whose planes come closest to facing
    /// each other.
    Angle,
}

impl FromStr for VertexSplitterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(VertexSplitterKind::Fast),
            "convex" => Ok(VertexSplitterKind::Convex),
            "reflex" => Ok(VertexSplitterKind::Reflex),
            "angle" => Ok(VertexSplitterKind::Angle),
            other => Err(Error::Config(format!("unknown vertex splitter: {}", other))),
        }
    }
}

/// Skeleton engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Record an offset mesh at every multiple of this distance (0 = off).
    pub const_offset: f64,
    /// Additional offsets at which to record an offset polyhedron.
    pub save_offsets: Vec<f64>,
    /// Stop before the first event beyond this offset.
    pub max_offset: f64,
    /// Abort with [`Error::EventLimit`] after this many handled events.
    pub max_events: usize,
    /// Flip rule for 3D edge events.
    pub edge_event_policy: EdgeEventPolicy,
    /// Splitter for vertices of degree > 3.
    pub vertex_splitter: VertexSplitterKind,
    /// Tolerance for grouping simultaneous events and for events slightly
    /// behind the current offset.
    pub eps: f64,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            const_offset: 0.0,
            save_offsets: Vec::new(),
            max_offset: f64::INFINITY,
            max_events: 100_000,
            edge_event_policy: EdgeEventPolicy::default(),
            vertex_splitter: VertexSplitterKind::default(),
            eps: 1e-9,
        }
    }
}

impl SkeletonConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            const_offset: std::env::var("SKEL_CONST_OFFSET")
                .unwrap_or_else(|_| "0".into())
                .parse()
                .unwrap_or(defaults.const_offset),
            max_offset: std::env::var("SKEL_MAX_OFFSET")
                .unwrap_or_else(|_| "inf".into())
                .parse()
                .unwrap_or(defaults.max_offset),
            max_events: std::env::var("SKEL_MAX_EVENTS")
                .unwrap_or_else(|_| "100000".into())
                .parse()
                .unwrap_or(defaults.max_events),
            edge_event_policy: std::env::var("SKEL_EDGE_EVENT_POLICY")
                .unwrap_or_else(|_| "convex".into())
                .parse()
                .unwrap_or(defaults.edge_event_policy),
            vertex_splitter: std::env::var("SKEL_VERTEX_SPLITTER")
                .unwrap_or_else(|_| "fast".into())
                .parse()
                .unwrap_or(defaults.vertex_splitter),
            ..defaults
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects negative or non-finite distances.
    pub fn validate(&self) -> Result<()> {
        if !(self.const_offset.is_finite() && self.const_offset >= 0.0) {
            return Err(Error::Config(format!(
                "const_offset must be a finite non-negative distance, got {}",
                self.const_offset
            )));
        }
        if self.max_offset.is_nan() || self.max_offset < 0.0 {
            return Err(Error::Config(format!(
                "max_offset must be non-negative, got {}",
                self.max_offset
            )));
        }
        if self.eps.is_nan() || self.eps < 0.0 {
            return Err(Error::Config(format!("eps must be non-negative, got {}", self.eps)));
        }
        if let Some(bad) = self.save_offsets.iter().find(|o| !(o.is_finite() && **o > 0.0)) {
            return Err(Error::Config(format!("save offset must be positive, got {}", bad)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = SkeletonConfig::from_json(r#"{ "const_offset": 0.5, "edge_event_policy": "flip_always" }"#)
            .unwrap();
        assert_eq!(config.const_offset, 0.5);
        assert_eq!(config.edge_event_policy, EdgeEventPolicy::FlipAlways);
        assert_eq!(config.max_events, 100_000);
        assert_eq!(config.vertex_splitter, VertexSplitterKind::Fast);
        assert!(config.save_offsets.is_empty());
    }

    #[test]
    fn negative_offset_rejected() {
        let r = SkeletonConfig::from_json(r#"{ "const_offset": -1.0 }"#);
        assert!(matches!(r, Err(Error::Config(_))));
        let r = SkeletonConfig::from_json(r#"{ "save_offsets": [0.5, 0.0] }"#);
        assert!(matches!(r, Err(Error::Config(_))));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(SkeletonConfig::from_json("{"), Err(Error::Config(_))));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Reflex".parse::<EdgeEventPolicy>().unwrap(), EdgeEventPolicy::Reflex);
        assert_eq!("CONVEX".parse::<EdgeEventPolicy>().unwrap(), EdgeEventPolicy::Convex);
        assert!("sideways".parse::<EdgeEventPolicy>().is_err());
    }

    #[test]
    fn splitter_is_read_from_json() {
        let config = SkeletonConfig::from_json(r#"{ "vertex_splitter": "angle" }"#).unwrap();
        assert_eq!(config.vertex_splitter, VertexSplitterKind::Angle);
        assert_eq!("Reflex".parse::<VertexSplitterKind>().unwrap(), VertexSplitterKind::Reflex);
        assert!("volume".parse::<VertexSplitterKind>().is_err());
        assert!(SkeletonConfig::from_json(r#"{ "vertex_splitter": "volume" }"#).is_err());
    }

    #[test]
    fn env_falls_back_to_defaults() {
        // SKEL_* variables are not set in the test environment
        let config = SkeletonConfig::from_env();
        assert_eq!(config.const_offset, 0.0);
        assert!(config.max_offset.is_infinite());
        assert_eq!(config.edge_event_policy, EdgeEventPolicy::Convex);
        assert_eq!(config.vertex_splitter, VertexSplitterKind::Fast);
        assert!(config.validate().is_ok());
    }
}
