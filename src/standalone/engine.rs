//! In-process MapReduce engine.
//!
//! A stage runs in two phases separated by a barrier. The map phase reads
//! every input location, cuts it into map tasks, and runs the tasks on the
//! rayon pool, partitioning their output by `ihash(key) % n_reduce`. Once
//! every task has finished, the reduce phase sorts each partition by key,
//! calls the reduce function once per group and writes `mr-out-<partition>`.
//!
//! Output is staged next to the target location and renamed into place only
//! when every partition has been written, so a stage's output is either
//! complete or absent.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use glob::glob;
use itertools::Itertools;
use rayon::prelude::*;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::standalone::Job;
use crate::*;

// types related to this engine
type BucketIndex = u32;
pub type TaskIndex = usize;
pub type Buckets = DashMap<BucketIndex, Vec<(TaskIndex, KeyValue)>>;

/// Marker written into a committed output location.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// One input split and the map function that reads it.
pub struct MapTask {
    pub index: TaskIndex,
    pub source: PathBuf,
    pub data: Bytes,
    map_fn: MapFn,
}

/// Result of the map phase.
pub struct MapPhase {
    pub tasks: usize,
    pub records: usize,
    pub buckets: Buckets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReducePhase {
    pub partitions: u32,
    pub groups: usize,
    pub output_bytes: u64,
}

/// What a finished stage did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub name: String,
    pub map_tasks: usize,
    pub records: usize,
    pub groups: usize,
    pub output_bytes: u64,
    pub elapsed: Duration,
}

/// Runs one stage from input to committed output.
pub fn run_job(job: &Job) -> Result<StageReport> {
    if job.n_reduce == 0 {
        bail!("job `{}` needs at least one reducer", job.name);
    }
    if job.split_size == Some(0) {
        bail!("job `{}` has a zero split size", job.name);
    }
    if job.inputs.is_empty() {
        bail!("job `{}` has no inputs", job.name);
    }
    ensure_absent(&job.output)?;

    let started = Instant::now();
    info!(stage = %job.name, output = %job.output, n_reduce = job.n_reduce, "stage started");

    let map = perform_map(job)?;
    info!(stage = %job.name, tasks = map.tasks, records = map.records, "map phase done");

    let reduce = perform_reduce(job, map.buckets)?;
    let report = StageReport {
        name: job.name.clone(),
        map_tasks: map.tasks,
        records: map.records,
        groups: reduce.groups,
        output_bytes: reduce.output_bytes,
        elapsed: started.elapsed(),
    };
    info!(
        stage = %job.name,
        groups = report.groups,
        output_bytes = report.output_bytes,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "stage committed"
    );
    Ok(report)
}

/// Fails if `location` already exists.
pub fn ensure_absent(location: &str) -> Result<()> {
    if Path::new(location).exists() {
        bail!("output location `{}` already exists", location);
    }
    Ok(())
}

/// Lists the files an input location stands for, sorted.
///
/// A directory stands for its regular files, skipping names that start with
/// `_` or `.`; a file stands for itself; anything else is a glob pattern.
/// Matching nothing is an error.
pub fn resolve_inputs(location: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(location);
    let mut files = if path.is_dir() {
        let mut files = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading directory {}", location))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        glob(location)
            .with_context(|| format!("bad input pattern {}", location))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|p| p.is_file())
            .collect()
    };
    if files.is_empty() {
        bail!("input location `{}` matched no files", location);
    }
    files.sort();
    Ok(files)
}

/// Cuts `data` into splits of about `split_size` bytes.
///
/// A split is extended to the end of the line it stops in, so no line is
/// ever divided between two splits.
pub fn split_input(data: Bytes, split_size: Option<usize>) -> Vec<Bytes> {
    let size = match split_size {
        Some(size) if size > 0 && data.len() > size => size,
        _ => return vec![data],
    };
    let mut splits = Vec::with_capacity(data.len() / size + 1);
    let mut start = 0;
    while start < data.len() {
        let mut end = (start + size).min(data.len());
        if end < data.len() {
            end = match data[end - 1..].iter().position(|&b| b == b'\n') {
                Some(pos) => end + pos,
                None => data.len(),
            };
        }
        splits.push(data.slice(start..end));
        start = end;
    }
    splits
}

/// Reads every input and cuts it into map tasks, numbered in input order.
pub fn plan_map_tasks(job: &Job) -> Result<Vec<MapTask>> {
    let mut tasks = Vec::new();
    for input in &job.inputs {
        for source in resolve_inputs(&input.location)? {
            let data = fs::read(&source).with_context(|| format!("reading {}", source.display()))?;
            for data in split_input(Bytes::from(data), job.split_size) {
                tasks.push(MapTask {
                    index: tasks.len(),
                    source: source.clone(),
                    data,
                    map_fn: input.map_fn,
                });
            }
        }
    }
    Ok(tasks)
}

fn run_map_task(job: &Job, task: &MapTask, buckets: &Buckets) -> Result<usize> {
    let input_kv = KeyValue {
        key: Bytes::from(task.source.to_string_lossy().into_owned()),
        value: task.data.clone(),
    };
    let mut local: HashMap<BucketIndex, Vec<(TaskIndex, KeyValue)>> = HashMap::new();
    let mut records = 0;
    let emitted = (task.map_fn)(input_kv, job.aux.clone())
        .with_context(|| format!("map task {} on {}", task.index, task.source.display()))?;
    for item in emitted {
        let kv = item.with_context(|| format!("map task {} on {}", task.index, task.source.display()))?;
        let bucket_no = ihash(&kv.key) % job.n_reduce;
        local.entry(bucket_no).or_default().push((task.index, kv));
        records += 1;
    }
    // One lock per partition instead of one per record.
    for (bucket_no, mut kvs) in local {
        buckets.entry(bucket_no).or_default().append(&mut kvs);
    }
    debug!(task = task.index, source = %task.source.display(), records, "map task done");
    Ok(records)
}

/// Runs every map task and partitions the emitted pairs.
///
/// The first failing task aborts the phase.
pub fn perform_map(job: &Job) -> Result<MapPhase> {
    let tasks = plan_map_tasks(job)?;
    let buckets = Buckets::new();
    let records = tasks
        .par_iter()
        .map(|task| run_map_task(job, task, &buckets))
        .try_reduce(|| 0, |a, b| Ok(a + b))?;
    Ok(MapPhase {
        tasks: tasks.len(),
        records,
        buckets,
    })
}

/// Orders a partition by key, then by producing task.
///
/// The sort is stable, so values from one task keep their emission order.
pub fn sort_partition(bkt: &mut [(TaskIndex, KeyValue)]) {
    bkt.sort_by(|(task_a, a), (task_b, b)| a.key.cmp(&b.key).then(task_a.cmp(task_b)));
}

fn reduce_partition(
    job: &Job,
    reduce_id: BucketIndex,
    mut bkt: Vec<(TaskIndex, KeyValue)>,
    dir: &Path,
) -> Result<ReducePhase> {
    let out_pathspec = dir.join(format!("mr-out-{}", reduce_id));
    let mut out_file = BufWriter::new(
        File::create(&out_pathspec).with_context(|| format!("creating {}", out_pathspec.display()))?,
    );
    sort_partition(&mut bkt);

    let mut summary = ReducePhase {
        partitions: 1,
        ..Default::default()
    };
    for (key, value_group) in &bkt.into_iter().chunk_by(|(_, kv)| kv.key()) {
        let iter = value_group.map(|(_, kv)| kv.into_value());
        let out = (job.reduce_fn)(key.clone(), Box::new(iter), job.aux.clone())
            .with_context(|| format!("reducing key {}", String::from_utf8_lossy(&key)))?;
        out_file.write_all(&out)?;
        summary.groups += 1;
        summary.output_bytes += out.len() as u64;
    }
    out_file.flush()?;
    Ok(summary)
}

/// Reduces every partition into a staging directory, then commits it.
///
/// Every partition file is written, even an empty one. On failure the
/// staging directory is removed and nothing appears at the output location.
pub fn perform_reduce(job: &Job, buckets: Buckets) -> Result<ReducePhase> {
    let staging = staging_dir(&job.output);
    fs::create_dir_all(&staging).with_context(|| format!("creating {}", staging.display()))?;

    let reduced = (0..job.n_reduce)
        .into_par_iter()
        .map(|reduce_id| {
            let bkt = buckets.remove(&reduce_id).map(|(_, v)| v).unwrap_or_default();
            reduce_partition(job, reduce_id, bkt, &staging)
        })
        .try_reduce(ReducePhase::default, |a, b| {
            Ok(ReducePhase {
                partitions: a.partitions + b.partitions,
                groups: a.groups + b.groups,
                output_bytes: a.output_bytes + b.output_bytes,
            })
        })
        .and_then(|summary| commit(&staging, &job.output).map(|_| summary));

    if reduced.is_err() {
        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!(staging = %staging.display(), error = %e, "could not remove staging directory");
        }
    }
    reduced
}

fn staging_dir(output: &str) -> PathBuf {
    PathBuf::from(format!("{}.staging-{}", output.trim_end_matches('/'), Uuid::new_v4()))
}

fn commit(staging: &Path, output: &str) -> Result<()> {
    File::create(staging.join(SUCCESS_MARKER))?;
    fs::rename(staging, output)
        .with_context(|| format!("moving {} to {}", staging.display(), output))?;
    Ok(())
}

/// Reads every line of a committed output location, partition by partition.
pub fn read_output(location: &str) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for file in resolve_inputs(location)? {
        let content = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
        lines.extend(content.lines().map(str::to_string));
    }
    Ok(lines)
}
