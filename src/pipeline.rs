//! The two chained stages.
//!
//! Stage one joins titles with credits and persists one `actor|year\t1` fact
//! per matching movie. Stage two reads those facts back and writes
//! `actor|year\ttotal`. Stage two only starts once stage one has committed
//! its output; if stage one fails, nothing else runs.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::info;

use crate::config::PipelineConfig;
use crate::standalone::engine::{self, StageReport};
use crate::standalone::Job;
use crate::workload::actor_years;

pub const JOIN_STAGE: &str = "IMDB join movies and actors";
pub const COUNT_STAGE: &str = "IMDB count actor";

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub join: StageReport,
    pub count: StageReport,
}

/// Stage one. Titles are listed before credits, so title values come first
/// within each group.
pub fn join_job(config: &PipelineConfig) -> Result<Job> {
    Ok(Job::new(JOIN_STAGE, actor_years::reduce_join, &config.intermediate_output)
        .with_input(&config.titles_input, actor_years::map_titles)
        .with_input(&config.credits_input, actor_years::map_credits)
        .with_reducers(config.join_reducers)
        .with_split(config.split())
        .with_aux(config.join_args().to_aux()?))
}

/// Stage two, reading stage one's committed output.
pub fn count_job(config: &PipelineConfig) -> Job {
    Job::new(COUNT_STAGE, actor_years::reduce_sum, &config.output)
        .with_input(&config.intermediate_output, actor_years::map_facts)
        .with_reducers(config.count_reducers)
        .with_split(config.split())
}

pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;
    engine::ensure_absent(&config.intermediate_output)?;
    engine::ensure_absent(&config.output)?;
    info!(
        actor = %config.target_actor,
        mode = ?config.input_mode,
        reconciliation = ?config.reconciliation,
        "pipeline started"
    );

    let join = engine::run_job(&join_job(config)?).context("join stage failed")?;
    let count = engine::run_job(&count_job(config)).context("count stage failed")?;
    Ok(PipelineReport { join, count })
}

/// Reads a committed count output into `actor|year → total`.
pub fn read_totals(location: &str) -> Result<BTreeMap<String, u64>> {
    let mut totals = BTreeMap::new();
    for line in engine::read_output(location)? {
        let (key, total) = line
            .split_once('\t')
            .with_context(|| format!("malformed output line {:?}", line))?;
        let total: u64 = total
            .parse()
            .with_context(|| format!("malformed total in {:?}", line))?;
        totals.insert(key.to_string(), total);
    }
    Ok(totals)
}
