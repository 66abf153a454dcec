//! Behaviour-driven tests for an end-to-end pipeline run.
//!
//! Every external tool is emulated by [`FakeToolchain`]; the filesystem work
//! (descriptors, manifest, archives, staging) is real and happens in a
//! temporary project.

mod support;

use relpipe::error::{PipelineError, Stage};
use relpipe::pipeline::{PipelineContext, PipelineReport, RunOptions, run_pipeline};
use relpipe::test_utils::{FakeToolchain, ToolKind};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs::File;
use support::{CONFIG, Project};

struct PipelineWorld {
    project: Project,
    tools: FakeToolchain,
    outcome: Option<relpipe::error::Result<PipelineReport>>,
}

#[fixture]
fn world() -> PipelineWorld {
    PipelineWorld {
        project: Project::standard(),
        tools: FakeToolchain::new(),
        outcome: None,
    }
}

impl PipelineWorld {
    fn error(&self) -> &PipelineError {
        match self.outcome.as_ref().expect("pipeline ran") {
            Ok(_) => panic!("expected the run to fail"),
            Err(err) => err,
        }
    }
}

#[given("a project at build {build:u64}")]
fn given_project(world: &mut PipelineWorld, build: u64) {
    world.project.write_manifest(build);
}

#[given("a merge tool that never writes its output")]
fn given_silent_merge(world: &mut PipelineWorld) {
    world.tools = std::mem::take(&mut world.tools).with_silent_merge();
}

#[given("no signing password")]
fn given_no_password(world: &mut PipelineWorld) {
    world.project.remove("sigpass");
}

#[when("the pipeline runs")]
fn when_pipeline_runs(world: &mut PipelineWorld) {
    let config = world.project.config(CONFIG);
    let context = PipelineContext {
        config: &config,
        executor: &world.tools,
        quiet: true,
    };
    let options = RunOptions {
        timestamp: Some("2026-10-16T09:30:00Z".to_owned()),
        ..RunOptions::default()
    };
    world.outcome = Some(run_pipeline(&context, &options, &mut std::io::sink()));
}

#[then("the archive \"{path}\" holds {cods:usize} code files and {jads:usize} descriptor")]
fn then_archive_contents(world: &mut PipelineWorld, path: String, cods: usize, jads: usize) {
    let file = File::open(world.project.path(&path)).expect("archive written");
    let archive = zip::ZipArchive::new(file).expect("read archive");
    let names: Vec<&str> = archive.file_names().collect();
    let count = |suffix: &str| names.iter().filter(|name| name.ends_with(suffix)).count();
    assert_eq!(count(".cod"), cods, "entries: {names:?}");
    assert_eq!(count(".jad"), jads, "entries: {names:?}");
    assert_eq!(names.len(), cods + jads);
}

#[then("the release repository received a forced push of branch \"{branch}\"")]
fn then_forced_push(world: &mut PipelineWorld, branch: String) {
    let git = world.tools.calls_to(ToolKind::Git);
    let push = git.last().expect("git was invoked");
    assert_eq!(push.arguments(), ["push", "--force", "origin", branch.as_str()]);

    let report = match world.outcome.as_ref().expect("pipeline ran") {
        Ok(report) => report,
        Err(err) => panic!("pipeline failed: {err}"),
    };
    let published = report.publish.as_ref().expect("published");
    assert_eq!(published.branch, branch);
    assert!(
        published
            .published_files
            .iter()
            .any(|file| file == "bb45-1.0.21.zip")
    );
}

#[then("the manifest records build {build:u64}")]
fn then_manifest_build(world: &mut PipelineWorld, build: u64) {
    let manifest: serde_json::Value =
        serde_json::from_str(&world.project.read("build.json")).expect("manifest json");
    assert_eq!(manifest["build"], build);
}

#[then("the run fails in the package stage for \"{variant}\"")]
fn then_package_failure(world: &mut PipelineWorld, variant: String) {
    let err = world.error();
    let PipelineError::StageFailed {
        stage,
        variant: failed,
        source,
    } = err
    else {
        panic!("expected a stage failure, got {err}");
    };
    assert_eq!(*stage, Stage::Package);
    assert_eq!(*failed, variant);
    assert!(matches!(**source, PipelineError::MergeTimeout { .. }));
}

#[then("no archive was written")]
fn then_no_archive(world: &mut PipelineWorld) {
    assert!(!world.project.path("dist/bb45-1.0.21.zip").exists());
}

#[then("nothing was pushed")]
fn then_nothing_pushed(world: &mut PipelineWorld) {
    assert!(world.tools.calls_to(ToolKind::Git).is_empty());
}

#[then("the run fails because the credential is missing")]
fn then_credential_missing(world: &mut PipelineWorld) {
    let err = world.error();
    assert!(
        matches!(err, PipelineError::CredentialMissing { .. }),
        "unexpected error: {err}"
    );
}

#[then("no tool was invoked")]
fn then_no_tools(world: &mut PipelineWorld) {
    assert!(world.tools.calls().is_empty());
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "A full run packages and publishes a versioned archive"
)]
fn scenario_full_run(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "A merge that never lands fails the package stage"
)]
fn scenario_merge_timeout(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "A missing password stops the run before signing"
)]
fn scenario_missing_password(world: PipelineWorld) {
    let _ = world;
}
