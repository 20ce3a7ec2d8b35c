use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use mrimdb::config::PipelineConfig;
use mrimdb::standalone::{engine, Args, Commands, Job};
use mrimdb::{pipeline, workload};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 2)
        .init();
}

fn run_pipeline(config: PipelineConfig) -> Result<()> {
    let report = pipeline::run(&config)?;
    let totals = pipeline::read_totals(&config.output)?;
    info!(
        years = totals.len(),
        movies = totals.values().sum::<u64>(),
        facts = report.count.records,
        output = %config.output,
        "pipeline finished"
    );
    Ok(())
}

fn submit(job: Job) -> Result<()> {
    let report = engine::run_job(&job)?;
    info!(groups = report.groups, output = %job.output, "job finished");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Run {
            titles,
            credits,
            intermediate,
            output,
            join_reducers,
            count_reducers,
            mode,
            actor,
            split_size,
            reconcile,
        } => run_pipeline(PipelineConfig {
            titles_input: titles,
            credits_input: credits,
            intermediate_output: intermediate,
            output,
            join_reducers,
            count_reducers,
            input_mode: mode,
            split_size,
            target_actor: actor,
            reconciliation: reconcile,
        }),
        Commands::Submit {
            input,
            workload,
            output,
            reducers,
            split_size,
            args,
        } => {
            let engine = workload::named(&workload)?;
            let serialized_args = Bytes::from(serde_json::to_string(&args)?);
            submit(
                Job::single(workload, input, engine, output)
                    .with_reducers(reducers)
                    .with_split(split_size)
                    .with_aux(serialized_args),
            )
        }
    }
}
