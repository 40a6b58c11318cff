use std::path::Path;
use std::sync::Arc;

use optimus_client::fs::SpecFs;
use optimus_client::model::{JobSpec, ResourceSpec, SpecNode};
use optimus_client::{
    Error, JobSpecReadWriter, MemFs, OsFs, ResourceSpecReadWriter, SpecReadWriter,
};

const MINIMAL_JOB: &str = r#"
version: 1
name: example1
owner: optimus@example.io
schedule:
  start_date: "2021-02-03"
  interval: "@daily"
task:
  name: bq2bq
  config:
    PROJECT: godata
  window:
    size: 24h
    offset: "0"
    truncate_to: d
"#;

fn reader(fs: MemFs) -> JobSpecReadWriter {
    JobSpecReadWriter::new(Arc::new(fs)).with_parent_reading(true)
}

#[test]
fn test_parent_inheritance_single_level() {
    let fs = MemFs::new()
        .with_file("root/ns/this.yaml", "task:\n  config:\n    EXAMPLE: parent\n")
        .with_file("root/ns/jobs/example1/job.yaml", MINIMAL_JOB);

    let specs = reader(fs).read_all(Path::new("root")).unwrap();

    assert_eq!(specs.len(), 1);
    let config = &specs[0].task.config;
    assert_eq!(config.len(), 2);
    assert_eq!(config["PROJECT"], "godata");
    assert_eq!(config["EXAMPLE"], "parent");
}

#[test]
fn test_parent_inheritance_with_override() {
    let child = MINIMAL_JOB.replace("PROJECT: godata", "PROJECT: godata\n    EXAMPLE: child");
    let fs = MemFs::new()
        .with_file(
            "root/ns/this.yaml",
            "task:\n  config:\n    EXAMPLE: parent\n    EXAMPLE2: parent2\n",
        )
        .with_file("root/ns/jobs/example1/job.yaml", &child);

    let specs = reader(fs).read_all(Path::new("root")).unwrap();

    let config = &specs[0].task.config;
    assert_eq!(config["EXAMPLE"], "child");
    assert_eq!(config["EXAMPLE2"], "parent2");
    assert_eq!(config["PROJECT"], "godata");
}

#[test]
fn test_nearest_parent_wins() {
    let fs = MemFs::new()
        .with_file(
            "root/this.yaml",
            "owner: root-owner\nlabels:\n  team: data\n  tier: gold\n",
        )
        .with_file("root/ns/this.yaml", "labels:\n  tier: silver\n")
        .with_file("root/ns/jobs/example1/job.yaml", MINIMAL_JOB);

    let specs = reader(fs).read_all(Path::new("root")).unwrap();

    let spec = &specs[0];
    assert_eq!(spec.owner, "optimus@example.io");
    assert_eq!(spec.labels["team"], "data");
    assert_eq!(spec.labels["tier"], "silver");
}

#[test]
fn test_parents_ignored_without_parent_reading() {
    let fs = MemFs::new()
        .with_file("root/this.yaml", "task:\n  config:\n    EXAMPLE: parent\n")
        .with_file("root/jobs/example1/job.yaml", MINIMAL_JOB);

    let specs = JobSpecReadWriter::new(Arc::new(fs))
        .read_all(Path::new("root"))
        .unwrap();

    assert!(!specs[0].task.config.contains_key("EXAMPLE"));
}

#[test]
fn test_version_defaults_after_merge() {
    let fs = MemFs::new().with_file("root/a/job.yaml", "name: no_version_job\n");

    let specs = reader(fs).read_all(Path::new("root")).unwrap();
    assert_eq!(specs[0].version, 1);
}

#[test]
fn test_unknown_field_is_decode_error() {
    let fs = MemFs::new().with_file("root/a/job.yaml", "name: job_a\nsurprise: true\n");

    let err = reader(fs).read_all(Path::new("root")).unwrap_err();
    match err {
        Error::Decode { path, .. } => assert!(path.ends_with("a/job.yaml")),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn test_hidden_directories_are_skipped() {
    let fs = MemFs::new()
        .with_file("root/.git/job.yaml", "name: hidden_job\n")
        .with_file("root/visible/job.yaml", "name: visible_job\n");

    let specs = reader(fs).read_all(Path::new("root")).unwrap();
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["visible_job"]);
}

#[test]
fn test_missing_root_is_filesystem_error() {
    let err = reader(MemFs::new()).read_all(Path::new("nowhere")).unwrap_err();
    assert!(matches!(err, Error::Filesystem { .. }));
}

#[test]
fn test_nested_assets_use_slash_keys() {
    let fs = MemFs::new()
        .with_file("root/a/job.yaml", "name: job_a\n")
        .with_file("root/a/assets/query.sql", "SELECT 1")
        .with_file("root/a/assets/macros/util.sql", "-- util");

    let spec = reader(fs).read_by_name(Path::new("root"), "job_a").unwrap();
    assert_eq!(spec.asset["query.sql"], "SELECT 1");
    assert_eq!(spec.asset["macros/util.sql"], "-- util");
}

#[test]
fn test_read_by_name_not_found() {
    let fs = MemFs::new().with_file("root/a/job.yaml", "name: job_a\n");

    let err = reader(fs).read_by_name(Path::new("root"), "job_b").unwrap_err();
    assert!(matches!(err, Error::NotFound { ref name } if name == "job_b"));
}

fn example_job() -> JobSpec {
    let mut spec: JobSpec = serde_yaml::from_str(MINIMAL_JOB).unwrap();
    spec.asset.insert("query.sql".into(), "SELECT 1".into());
    spec
}

#[test]
fn test_write_then_read_round_trip_in_memory() {
    let fs = Arc::new(MemFs::new());
    let rw = JobSpecReadWriter::new(fs.clone());
    let original = example_job();

    rw.write(Path::new("root/example1"), &original).unwrap();
    assert!(fs.is_dir(Path::new("root/example1")));
    assert_eq!(
        fs.read(Path::new("root/example1/assets/query.sql")).unwrap(),
        b"SELECT 1"
    );

    let read = rw.read_by_name(Path::new("root"), "example1").unwrap();
    assert_eq!(read.asset["query.sql"], "SELECT 1");
    assert_eq!(read.task.window.truncate_to, original.task.window.truncate_to);
    assert_eq!(read.task.config, original.task.config);
    assert_eq!(read.schedule.interval, "@daily");
}

#[test]
fn test_write_then_read_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let rw = JobSpecReadWriter::new(Arc::new(OsFs::new(dir.path())));
    let original = example_job();

    rw.write(Path::new("jobs/example1"), &original).unwrap();
    assert!(dir.path().join("jobs/example1/job.yaml").is_file());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("jobs/example1/assets/query.sql")).unwrap(),
        "SELECT 1"
    );

    let read = rw.read_by_name(Path::new("jobs"), "example1").unwrap();
    assert_eq!(read.name, "example1");
    assert_eq!(read.asset, original.asset);
    assert_eq!(read.task.window, original.task.window);
}

#[test]
fn test_write_rejects_unnamed_spec_and_escaping_asset() {
    let rw = JobSpecReadWriter::new(Arc::new(MemFs::new()));

    let err = rw.write(Path::new("root/x"), &JobSpec::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let mut spec = example_job();
    spec.asset.insert("../escape.sql".into(), "x".into());
    let err = rw.write(Path::new("root/x"), &spec).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_resource_read_all_and_round_trip() {
    let fs = Arc::new(
        MemFs::new()
            .with_file(
                "bq/proj.dataset.table/resource.yaml",
                "version: 1\nname: proj.dataset.table\ntype: table\nspec:\n  description: events\n  partition:\n    field: ts\n",
            )
            .with_file(
                "bq/proj.dataset/resource.yaml",
                "version: 1\nname: proj.dataset\ntype: dataset\n",
            ),
    );
    let rw = ResourceSpecReadWriter::new(fs.clone());

    let specs = rw.read_all(Path::new("bq")).unwrap();
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["proj.dataset", "proj.dataset.table"]);

    let table = &specs[1];
    assert_eq!(table.resource_type, "table");
    assert_eq!(
        table.spec["partition"].get("field").and_then(SpecNode::as_str),
        Some("ts")
    );
    assert!(table.path.ends_with("proj.dataset.table"));

    rw.write(Path::new("copy/table"), table).unwrap();
    let copied: ResourceSpec = rw
        .read_by_name(Path::new("copy"), "proj.dataset.table")
        .unwrap();
    assert_eq!(copied.spec, table.spec);
}
