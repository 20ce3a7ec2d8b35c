use bytes::Bytes;
use clap::{ArgAction, Parser, Subcommand};

use crate::config::{InputMode, Reconciliation, DEFAULT_SPLIT_SIZE, DEFAULT_TARGET_ACTOR};
use crate::{MapFn, ReduceFn, Workload};

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log more (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join titles with credits, then count the actor's movies per year
    Run {
        /// Title dataset (tab-separated): file, directory or glob
        titles: String,
        /// Credit dataset (comma-separated): file, directory or glob
        credits: String,
        /// Output directory of the join stage
        intermediate: String,
        /// Output directory of the count stage
        output: String,
        /// Reduce partitions of the join stage
        join_reducers: u32,
        /// Reduce partitions of the count stage
        count_reducers: u32,
        /// Whole files per map task, or fixed-size splits (`partA` / `partB`)
        #[arg(value_enum)]
        mode: InputMode,

        /// Actor whose movies are counted
        #[arg(long, default_value = DEFAULT_TARGET_ACTOR)]
        actor: String,

        /// Bytes per input split in `split` mode
        #[arg(long, default_value_t = DEFAULT_SPLIT_SIZE)]
        split_size: usize,

        /// How the join decides a title matched
        #[arg(long, value_enum, default_value_t = Reconciliation::Tagged)]
        reconcile: Reconciliation,
    },
    /// Run a single named workload over one input location
    Submit {
        /// Input file, directory or glob
        #[arg(short, long)]
        input: String,

        // Name of the workload
        #[arg(short, long)]
        workload: String,

        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Reduce partitions
        #[arg(short = 'r', long, default_value_t = 1)]
        reducers: u32,

        /// Cut inputs into splits of this many bytes
        #[arg(long)]
        split_size: Option<usize>,

        /// Auxiliary arguments to pass to the MapReduce application.
        #[clap(value_parser, last = true)]
        args: Vec<String>,
    },
}

/// One input location and the map function that reads it.
#[derive(Clone)]
pub struct MapInput {
    pub location: String,
    pub map_fn: MapFn,
}

/// A single MapReduce stage.
///
/// Inputs are mapped in the order listed; that order is visible to reduce
/// functions as the order of values within a group.
#[derive(Clone)]
pub struct Job {
    pub name: String,
    pub inputs: Vec<MapInput>,
    pub reduce_fn: ReduceFn,
    pub output: String,
    pub n_reduce: u32,
    /// `None` maps each file whole.
    pub split_size: Option<usize>,
    pub aux: Bytes,
}

impl Job {
    pub fn new(name: impl Into<String>, reduce_fn: ReduceFn, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            reduce_fn,
            output: output.into(),
            n_reduce: 1,
            split_size: None,
            aux: Bytes::new(),
        }
    }

    /// A job reading one location with a registered workload.
    pub fn single(
        name: impl Into<String>,
        input: impl Into<String>,
        workload: Workload,
        output: impl Into<String>,
    ) -> Self {
        Self::new(name, workload.reduce_fn, output).with_input(input, workload.map_fn)
    }

    pub fn with_input(mut self, location: impl Into<String>, map_fn: MapFn) -> Self {
        self.inputs.push(MapInput {
            location: location.into(),
            map_fn,
        });
        self
    }

    pub fn with_reducers(mut self, n_reduce: u32) -> Self {
        self.n_reduce = n_reduce;
        self
    }

    pub fn with_split(mut self, split_size: Option<usize>) -> Self {
        self.split_size = split_size;
        self
    }

    pub fn with_aux(mut self, aux: Bytes) -> Self {
        self.aux = aux;
        self
    }
}
