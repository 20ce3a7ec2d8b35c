//! Pipeline configuration.
//!
//! Everything the stages need is carried in [`PipelineConfig`] and handed to
//! each stage explicitly. Map and reduce functions receive their share as
//! serialized [`JoinArgs`] through the auxiliary argument.

use anyhow::Result;
use bytes::Bytes;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TARGET_ACTOR: &str = "Willem Dafoe";

/// 1 MiB input splits.
pub const DEFAULT_SPLIT_SIZE: usize = 1024 * 1024;

/// How input files are cut into map tasks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// One map task per input file.
    #[default]
    #[value(alias = "partA")]
    Whole,
    /// Files are cut into fixed-size splits, one map task each.
    #[value(alias = "partB")]
    Split,
}

/// How the join reducer decides that a title matched.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Reconciliation {
    /// Classify every value by its tag. Independent of value order.
    #[default]
    Tagged,
    /// First value is the year, any later value is an actor credit.
    /// Only correct when title values reach the reducer first.
    Positional,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{stage} reducer count must be at least 1")]
    NoReducers { stage: &'static str },
    #[error("split size must be at least 1 byte")]
    ZeroSplitSize,
    #[error("target actor name is empty")]
    EmptyActor,
    #[error("intermediate and final output both point at `{0}`")]
    SameOutput(String),
}

/// Arguments shared by the join-stage map and reduce functions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinArgs {
    pub actor: String,
    #[serde(default)]
    pub reconciliation: Reconciliation,
}

impl JoinArgs {
    pub fn to_aux(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_aux(aux: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(aux)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub titles_input: String,
    pub credits_input: String,
    pub intermediate_output: String,
    pub output: String,
    pub join_reducers: u32,
    pub count_reducers: u32,
    pub input_mode: InputMode,
    pub split_size: usize,
    pub target_actor: String,
    pub reconciliation: Reconciliation,
}

impl PipelineConfig {
    /// A configuration with the default actor, whole-file inputs and a
    /// single reducer per stage.
    pub fn new(
        titles_input: impl Into<String>,
        credits_input: impl Into<String>,
        intermediate_output: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            titles_input: titles_input.into(),
            credits_input: credits_input.into(),
            intermediate_output: intermediate_output.into(),
            output: output.into(),
            join_reducers: 1,
            count_reducers: 1,
            input_mode: InputMode::Whole,
            split_size: DEFAULT_SPLIT_SIZE,
            target_actor: DEFAULT_TARGET_ACTOR.to_string(),
            reconciliation: Reconciliation::Tagged,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join_reducers == 0 {
            return Err(ConfigError::NoReducers { stage: "join" });
        }
        if self.count_reducers == 0 {
            return Err(ConfigError::NoReducers { stage: "count" });
        }
        if self.split_size == 0 {
            return Err(ConfigError::ZeroSplitSize);
        }
        if self.target_actor.trim().is_empty() {
            return Err(ConfigError::EmptyActor);
        }
        if self.intermediate_output == self.output {
            return Err(ConfigError::SameOutput(self.output.clone()));
        }
        Ok(())
    }

    /// The split size the engine should use, if any.
    pub fn split(&self) -> Option<usize> {
        match self.input_mode {
            InputMode::Whole => None,
            InputMode::Split => Some(self.split_size),
        }
    }

    pub fn join_args(&self) -> JoinArgs {
        JoinArgs {
            actor: self.target_actor.clone(),
            reconciliation: self.reconciliation,
        }
    }
}
