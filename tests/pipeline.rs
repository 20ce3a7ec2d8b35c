use mrimdb::config::{InputMode, PipelineConfig, Reconciliation};
use mrimdb::pipeline::{self, read_totals};
use mrimdb::standalone::engine::read_output;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres";

fn title(id: &str, kind: &str, year: &str) -> String {
    format!("{id}\t{kind}\tT {id}\tT {id}\t0\t{year}\t\\N\t90\tDrama")
}

fn credit(id: &str, ordering: u32, name: &str) -> String {
    format!("{id},{ordering},{name}")
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(titles: &[String], credits: &[String]) -> Self {
        let dir = TempDir::new().unwrap();
        let mut t = vec![HEADER.to_string()];
        t.extend(titles.iter().cloned());
        fs::write(dir.path().join("titles.tsv"), t.join("\n") + "\n").unwrap();
        fs::write(dir.path().join("credits.csv"), credits.join("\n") + "\n").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    fn config(&self, run: &str) -> PipelineConfig {
        PipelineConfig::new(
            self.path("titles.tsv"),
            self.path("credits.csv"),
            self.path(&format!("{run}-facts")),
            self.path(&format!("{run}-out")),
        )
    }
}

fn totals(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn non_movies_and_other_actors_are_excluded() {
    let fx = Fixture::new(
        &[title("t1", "movie", "1998"), title("t2", "tvSeries", "1998")],
        &[
            credit("t1", 1, "Willem Dafoe"),
            credit("t2", 1, "Willem Dafoe"),
            credit("t1", 2, "Other Actor"),
        ],
    );
    let config = fx.config("a");
    let report = pipeline::run(&config).unwrap();

    assert_eq!(read_output(&config.intermediate_output).unwrap(), vec!["Willem Dafoe|1998\t1"]);
    assert_eq!(read_output(&config.output).unwrap(), vec!["Willem Dafoe|1998\t1"]);
    assert_eq!(report.count.records, 1);
}

#[test]
fn movies_in_the_same_year_add_up() {
    let fx = Fixture::new(
        &[title("t1", "movie", "2001"), title("t3", "movie", "2001")],
        &[credit("t1", 1, "Willem Dafoe"), credit("t3", 4, "Willem Dafoe")],
    );
    let config = fx.config("b");
    pipeline::run(&config).unwrap();
    assert_eq!(read_totals(&config.output).unwrap(), totals(&[("Willem Dafoe|2001", 2)]));
}

fn mixed_fixture() -> Fixture {
    Fixture::new(
        &[
            title("tt01", "movie", "1986"),
            title("tt02", "movie", "1986"),
            title("tt03", "movie", "1988"),
            title("tt04", "movie", "\\N"),
            title("tt05", "movie", ""),
            title("tt06", "short", "1990"),
            title("tt07", "movie", "2000"),
            title("tt08", "movie", "2000"),
            title("tt09", "movie", "2000"),
            title("tt10", "movie", "2019"),
        ],
        &[
            "tconst,ordering,primaryName".to_string(),
            credit("tt01", 3, "Willem Dafoe"),
            credit("tt01", 1, "Charlie Sheen"),
            credit("tt02", 2, "Willem Dafoe"),
            credit("tt03", 1, "Willem Dafoe"),
            credit("tt03", 5, "Willem Dafoe"),
            credit("tt04", 1, "Willem Dafoe"),
            credit("tt05", 1, "Willem Dafoe"),
            credit("tt06", 1, "Willem Dafoe"),
            credit("tt07", 2, "  Willem Dafoe "),
            credit("tt08", 1, "Willem Dafoe, Jr."),
            credit("tt09", 1, "willem dafoe"),
            credit("tt10", 1, "Robert Pattinson"),
            credit("tt99", 1, "Willem Dafoe"),
            "".to_string(),
            "broken line".to_string(),
        ],
    )
}

fn expected_mixed() -> BTreeMap<String, u64> {
    totals(&[
        ("Willem Dafoe|1986", 2),
        ("Willem Dafoe|1988", 1),
        ("Willem Dafoe|2000", 1),
    ])
}

#[test]
fn filters_and_counts_per_year() {
    let fx = mixed_fixture();
    let config = PipelineConfig {
        join_reducers: 3,
        count_reducers: 2,
        ..fx.config("mixed")
    };
    let report = pipeline::run(&config).unwrap();
    assert_eq!(read_totals(&config.output).unwrap(), expected_mixed());
    // tt03 credits the actor twice but is one movie.
    assert_eq!(report.count.records, 4);
    assert_eq!(report.count.groups, 3);
}

#[test]
fn reruns_give_identical_totals() {
    let fx = mixed_fixture();
    let first = PipelineConfig { join_reducers: 2, ..fx.config("r1") };
    let second = PipelineConfig {
        join_reducers: 5,
        count_reducers: 3,
        ..fx.config("r2")
    };
    pipeline::run(&first).unwrap();
    pipeline::run(&second).unwrap();
    assert_eq!(read_totals(&first.output).unwrap(), read_totals(&second.output).unwrap());
}

#[test]
fn split_inputs_match_whole_inputs() {
    let fx = mixed_fixture();
    let whole = fx.config("whole");
    let split = PipelineConfig {
        input_mode: InputMode::Split,
        split_size: 64,
        ..fx.config("split")
    };
    let whole_report = pipeline::run(&whole).unwrap();
    let split_report = pipeline::run(&split).unwrap();
    assert!(split_report.join.map_tasks > whole_report.join.map_tasks);
    assert_eq!(read_totals(&split.output).unwrap(), expected_mixed());
}

#[test]
fn positional_reconciliation_matches_when_titles_come_first() {
    let fx = mixed_fixture();
    let config = PipelineConfig {
        reconciliation: Reconciliation::Positional,
        ..fx.config("legacy")
    };
    pipeline::run(&config).unwrap();
    assert_eq!(read_totals(&config.output).unwrap(), expected_mixed());
}

#[test]
fn positional_reconciliation_misreads_titles_missing_from_the_title_source() {
    // tt77 has two target credits but no title row.
    let fx = Fixture::new(
        &[title("t1", "movie", "1998")],
        &[
            credit("t1", 1, "Willem Dafoe"),
            credit("tt77", 1, "Willem Dafoe"),
            credit("tt77", 2, "Willem Dafoe"),
        ],
    );
    let legacy = PipelineConfig {
        reconciliation: Reconciliation::Positional,
        ..fx.config("legacy")
    };
    pipeline::run(&legacy).unwrap();
    assert_eq!(
        read_totals(&legacy.output).unwrap(),
        totals(&[("Willem Dafoe|1998", 1), ("Willem Dafoe|Willem Dafoe", 1)])
    );

    let tagged = fx.config("tagged");
    pipeline::run(&tagged).unwrap();
    assert_eq!(read_totals(&tagged.output).unwrap(), totals(&[("Willem Dafoe|1998", 1)]));
}

#[test]
fn other_target_actor() {
    let fx = mixed_fixture();
    let config = PipelineConfig {
        target_actor: "Charlie Sheen".to_string(),
        ..fx.config("sheen")
    };
    pipeline::run(&config).unwrap();
    assert_eq!(read_totals(&config.output).unwrap(), totals(&[("Charlie Sheen|1986", 1)]));
}

#[test]
fn no_matches_still_commits_empty_output() {
    let fx = Fixture::new(
        &[title("t1", "movie", "1998")],
        &[credit("t1", 1, "Other Actor")],
    );
    let config = PipelineConfig { count_reducers: 2, ..fx.config("empty") };
    pipeline::run(&config).unwrap();
    assert!(read_totals(&config.output).unwrap().is_empty());
    assert!(Path::new(&config.output).join("_SUCCESS").is_file());
    assert!(Path::new(&config.output).join("mr-out-1").is_file());
}

#[test]
fn missing_credit_input_stops_before_any_output() {
    let fx = Fixture::new(&[title("t1", "movie", "1998")], &[]);
    let config = PipelineConfig {
        credits_input: fx.path("no-such-credits.csv"),
        ..fx.config("missing")
    };
    let err = pipeline::run(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("join stage failed"));
    assert!(!Path::new(&config.intermediate_output).exists());
    assert!(!Path::new(&config.output).exists());
}

#[test]
fn existing_final_output_is_rejected_up_front() {
    let fx = mixed_fixture();
    let config = fx.config("taken");
    fs::create_dir_all(&config.output).unwrap();
    let err = pipeline::run(&config).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert!(!Path::new(&config.intermediate_output).exists());
}

#[test]
fn input_directories_are_read_whole() {
    let fx = mixed_fixture();
    let titles_dir = fx.path("titles");
    fs::create_dir_all(&titles_dir).unwrap();
    fs::rename(fx.path("titles.tsv"), Path::new(&titles_dir).join("part-0.tsv")).unwrap();
    let config = PipelineConfig {
        titles_input: titles_dir,
        ..fx.config("dirs")
    };
    pipeline::run(&config).unwrap();
    assert_eq!(read_totals(&config.output).unwrap(), expected_mixed());
}
