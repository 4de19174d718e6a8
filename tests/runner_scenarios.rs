//! Scenario runner state machine against a scripted process runner.

mod common;

use buildcheck::config::VerifierConfig;
use buildcheck::diff::{DEFAULT_IGNORED_KEYS, IgnoredKeys};
use buildcheck::matcher::Side;
use buildcheck::model::{BuildSource, MatchRule, ScenarioDefinition};
use buildcheck::runner::{ScenarioFailure, ScenarioRunner, ScenarioState};
use common::{Reply, ScriptedRunner, fsdiff_report, inspect_json, test_log, write_file};
use std::path::Path;
use tempfile::TempDir;

fn fixture() -> TempDir {
    let data = TempDir::new().unwrap();
    write_file(data.path(), "Dockerfile.simple", "FROM alpine\nRUN echo hi\n");
    write_file(data.path(), "dir/Dockerfile", "FROM alpine\nCOPY . /src\n");
    write_file(data.path(), "dir/payload.txt", "payload\n");
    data
}

fn config_for(data: &Path) -> VerifierConfig {
    let mut config = VerifierConfig::default();
    config.data_dir = data.to_path_buf();
    config
}

fn simple(id: &str) -> ScenarioDefinition {
    ScenarioDefinition::new(id, BuildSource::File("Dockerfile.simple".into()))
}

#[test]
fn conforming_scenario_walks_every_state() {
    let _log = test_log("conforming_scenario_walks_every_state");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let outcome = scenarios.run(&simple("simple"));

    assert!(outcome.success, "failures: {:?}", outcome.failures);
    assert_eq!(
        outcome.states,
        vec![
            ScenarioState::Prepared,
            ScenarioState::BuiltCandidate,
            ScenarioState::BuiltReference,
            ScenarioState::Verified,
            ScenarioState::Reported,
        ]
    );
    assert_eq!(outcome.final_state, ScenarioState::Reported);
    assert!(outcome.diff.as_ref().unwrap().all_match());
    assert!(outcome.fs_diff.as_ref().unwrap().clean);

    let labels = runner.labels();
    assert_eq!(labels[0], "simple-candidate-build");
    assert_eq!(labels[1], "simple-transfer");
    assert_eq!(labels[2], "simple-images");
    let transfer = runner.call("transfer").unwrap();
    assert_eq!(transfer.program, "buildah");
    assert_eq!(
        transfer.args,
        vec![
            "push".to_string(),
            outcome.candidate_tag.clone(),
            format!("docker-daemon:{}:latest", outcome.candidate_tag),
        ]
    );
    let rmi_tags: Vec<String> = runner
        .calls()
        .into_iter()
        .filter(|c| c.label.ends_with("-rmi"))
        .map(|c| c.args.last().cloned().unwrap())
        .collect();
    assert_eq!(
        rmi_tags,
        vec![
            outcome.candidate_tag.clone(),
            outcome.candidate_tag.clone(),
            outcome.reference_tag.clone()
        ]
    );
    assert_eq!(runner.call("candidate-store-rmi").unwrap().program, "buildah");

    let staging = outcome.staging_dir.as_ref().unwrap();
    assert!(!staging.exists(), "staging dir should be removed");
    assert!(!outcome.staging_kept);
}

#[test]
fn build_commands_use_tag_flags_and_context() {
    let _log = test_log("build_commands_use_tag_flags_and_context");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let def = simple("flags").with_extra_flags(["--no-cache"]);
    let outcome = scenarios.run(&def);
    assert!(outcome.success, "failures: {:?}", outcome.failures);

    let candidate = runner.call("candidate-build").unwrap();
    let context = outcome.staging_dir.as_ref().unwrap().display().to_string();
    assert_eq!(candidate.program, "buildah");
    assert_eq!(
        candidate.args,
        vec![
            "bud".to_string(),
            "-t".to_string(),
            outcome.candidate_tag.clone(),
            "--no-cache".to_string(),
            context.clone(),
        ]
    );
    let reference = runner.call("reference-build").unwrap();
    assert_eq!(reference.program, "docker");
    assert_eq!(reference.args[0], "build");
    assert_eq!(reference.args.last(), Some(&context));
}

#[test]
fn failing_candidate_build_stops_before_artifact_query() {
    let _log = test_log("failing_candidate_build_stops_before_artifact_query");
    let data = fixture();
    let runner = ScriptedRunner::conforming()
        .replace("candidate-build", Reply::fail(125, "Error: unknown instruction FRUM\n"));
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let outcome = scenarios.run(&simple("broken"));

    assert!(!outcome.success);
    assert_eq!(outcome.final_state, ScenarioState::Failed);
    match outcome.failure() {
        Some(ScenarioFailure::BuildCommand {
            side,
            exit_code,
            stderr,
        }) => {
            assert_eq!(*side, Side::Candidate);
            assert_eq!(*exit_code, 125);
            assert!(stderr.contains("unknown instruction FRUM"));
        }
        other => panic!("expected BuildCommand, got {other:?}"),
    }
    assert!(!outcome.visited(ScenarioState::BuiltCandidate));
    assert!(!runner.called("transfer"));
    assert!(!runner.called("images"));
    assert!(!runner.called("reference-build"));
    // The attempted build is still cleaned up.
    assert!(runner.called("candidate-rmi"));
    assert!(!runner.called("reference-rmi"));
    assert!(outcome.candidate.is_some());
}

#[test]
fn tempdir_placeholder_is_rewritten_to_staging_dir() {
    let _log = test_log("tempdir_placeholder_is_rewritten_to_staging_dir");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let def = simple("mount")
        .with_extra_flags(["-v", "TEMPDIR:/tmp/test"])
        .with_output_rules(MatchRule::presence("STEP").unwrap(), None)
        .pattern_only();
    let outcome = scenarios.run(&def);
    assert!(outcome.success, "failures: {:?}", outcome.failures);

    let staging = outcome.staging_dir.clone().unwrap();
    let expected = format!("{}:/tmp/test", staging.display());
    assert_eq!(outcome.resolved_flags, vec!["-v".to_string(), expected.clone()]);
    let build = runner.call("candidate-build").unwrap();
    assert!(build.args.contains(&expected));
    assert!(!build.args.iter().any(|a| a.contains("TEMPDIR")));
}

#[test]
fn pattern_only_never_touches_the_reference_tool() {
    let _log = test_log("pattern_only_never_touches_the_reference_tool");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let def = ScenarioDefinition::new("dir-copy", BuildSource::Directory("dir".into()))
        .with_output_rules(MatchRule::presence(r"COMMIT").unwrap(), None)
        .pattern_only();
    let outcome = scenarios.run(&def);

    assert!(outcome.success, "failures: {:?}", outcome.failures);
    assert!(!outcome.visited(ScenarioState::BuiltReference));
    assert!(!runner.called("reference-build"));
    assert!(!runner.called("candidate-inspect"));
    assert!(!runner.called("fsdiff"));
    assert!(outcome.diff.is_none());
}

#[test]
fn no_match_and_value_mismatch_are_distinct() {
    let _log = test_log("no_match_and_value_mismatch_are_distinct");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let absent = simple("absent").with_output_rules(
        MatchRule::positional(r"RESULT=(\w+)").unwrap(),
        Some(MatchRule::positional(r"RESULT=(\w+)").unwrap()),
    );
    let outcome = scenarios.run(&absent);
    assert!(matches!(
        outcome.failure(),
        Some(ScenarioFailure::PatternNoMatch { .. })
    ));

    let differing = simple("differing").with_output_rules(
        MatchRule::positional(r"STEP (\d)/2").unwrap(),
        Some(MatchRule::positional(r"Step (\d)/2 : FROM").unwrap()),
    );
    let runner = ScriptedRunner::conforming().replace(
        "reference-build",
        Reply::ok("Step 2/2 : FROM alpine\nSuccessfully built 89abcdef0123\n"),
    );
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));
    let outcome = scenarios.run(&differing);
    match outcome.failure() {
        Some(ScenarioFailure::ValueMismatch { check, detail }) => {
            assert_eq!(check, "output patterns");
            assert!(detail.contains("candidate=Some(\"1\") reference=Some(\"2\")"), "{detail}");
        }
        other => panic!("expected ValueMismatch, got {other:?}"),
    }
}

#[test]
fn every_check_runs_after_a_failed_one() {
    let _log = test_log("every_check_runs_after_a_failed_one");
    let data = fixture();
    let runner = ScriptedRunner::conforming()
        .replace(
            "candidate-inspect",
            Reply::ok(inspect_json("0123456789ab", &["PATH=/usr/bin"])),
        )
        .replace("fsdiff", Reply::ok(fsdiff_report(2)));
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let def = simple("everything").with_output_rules(
        MatchRule::positional(r"RESULT=(\w+)").unwrap(),
        Some(MatchRule::positional(r"RESULT=(\w+)").unwrap()),
    );
    let outcome = scenarios.run(&def);

    let codes: Vec<&str> = outcome.failures.iter().map(ScenarioFailure::code).collect();
    assert_eq!(
        codes,
        vec!["PATTERN_NO_MATCH", "STRUCTURAL_MISMATCH", "FILESYSTEM_DIFF"]
    );
    assert_eq!(outcome.checks.len(), 3);
    assert!(outcome.checks.iter().all(|c| !c.passed));
    let diff = outcome.diff.as_ref().unwrap();
    assert_eq!(diff.mismatched().len(), 1);
    assert_eq!(diff.mismatched()[0].path, "Config.Env[0]");
    assert_eq!(outcome.final_state, ScenarioState::Failed);
    assert!(!outcome.visited(ScenarioState::Verified));
}

#[test]
fn missing_artifact_is_an_artifact_failure() {
    let _log = test_log("missing_artifact_is_an_artifact_failure");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace("images", Reply::ok(""));
    let scenarios = ScenarioRunner::new(&runner, &config_for(data.path()));

    let outcome = scenarios.run(&simple("ghost"));

    match outcome.failure() {
        Some(ScenarioFailure::ArtifactResolution { tag, .. }) => {
            assert_eq!(tag, &outcome.candidate_tag);
        }
        other => panic!("expected ArtifactResolution, got {other:?}"),
    }
    assert!(outcome.visited(ScenarioState::BuiltCandidate));
    assert!(!runner.called("reference-build"));
}

#[test]
fn failed_transfer_is_an_artifact_failure() {
    let _log = test_log("failed_transfer_is_an_artifact_failure");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace(
        "transfer",
        Reply::fail(125, "Error: docker-daemon: Cannot connect to the Docker daemon\n"),
    );

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&simple("stuck"));

    match outcome.failure() {
        Some(ScenarioFailure::ArtifactResolution { reason, .. }) => {
            assert!(reason.contains("transfer exited with code 125"), "{reason}");
            assert!(reason.contains("Cannot connect"), "{reason}");
        }
        other => panic!("expected ArtifactResolution, got {other:?}"),
    }
    assert!(!runner.called("images"));
    assert!(runner.called("candidate-store-rmi"));
}

#[test]
fn disabled_transfer_queries_the_inspector_directly() {
    let _log = test_log("disabled_transfer_queries_the_inspector_directly");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let mut config = config_for(data.path());
    config.transfer = None;

    let outcome = ScenarioRunner::new(&runner, &config).run(&simple("direct"));

    assert!(outcome.success, "failures: {:?}", outcome.failures);
    assert!(!runner.called("transfer"));
    assert!(!runner.called("candidate-store-rmi"));
    assert_eq!(runner.labels()[1], "direct-images");
}

#[test]
fn builder_version_label_is_not_a_metadata_difference() {
    let _log = test_log("builder_version_label_is_not_a_metadata_difference");
    let data = fixture();
    let runner = ScriptedRunner::conforming();

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&simple("labelled"));
    assert!(outcome.success, "failures: {:?}", outcome.failures);
    assert!(outcome.diff.as_ref().unwrap().all_match());

    let mut strict = config_for(data.path());
    strict.ignored_keys = IgnoredKeys::new(
        DEFAULT_IGNORED_KEYS
            .iter()
            .filter(|key| !key.starts_with("Config.Labels")),
    );
    let outcome = ScenarioRunner::new(&runner, &strict).run(&simple("labelled"));
    let diff = outcome.diff.as_ref().unwrap();
    assert_eq!(diff.mismatched().len(), 1);
    assert_eq!(diff.mismatched()[0].path, "Config.Labels");
    assert_eq!(
        outcome.failure(),
        Some(&ScenarioFailure::StructuralMismatch { differences: 1 })
    );
}

#[test]
fn image_id_must_appear_in_build_log() {
    let _log = test_log("image_id_must_appear_in_build_log");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace("images", Reply::ok("fedcba987654\n"));

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&simple("stray"));
    match outcome.failure() {
        Some(ScenarioFailure::ArtifactResolution { reason, .. }) => {
            assert!(reason.contains("fedcba987654"));
        }
        other => panic!("expected ArtifactResolution, got {other:?}"),
    }

    let mut relaxed = config_for(data.path());
    relaxed.runner.require_id_in_log = false;
    let outcome = ScenarioRunner::new(&runner, &relaxed).run(&simple("stray"));
    assert!(outcome.success, "failures: {:?}", outcome.failures);
}

#[test]
fn timed_out_build_is_a_timeout_failure() {
    let _log = test_log("timed_out_build_is_a_timeout_failure");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace(
        "reference-build",
        Reply::TimedOut("Step 1/2 : FROM alpine\npulling layer 3 of 9\n".to_string()),
    );
    let mut config = config_for(data.path());
    config.runner.timeout_secs = 5;

    let outcome = ScenarioRunner::new(&runner, &config).run(&simple("slow"));

    assert_eq!(
        outcome.failure(),
        Some(&ScenarioFailure::Timeout {
            side: Side::Reference,
            step: "build".to_string(),
            timeout_secs: 5,
            stderr: "Step 1/2 : FROM alpine\npulling layer 3 of 9\n".to_string(),
        })
    );
    let partial = outcome.reference.as_ref().expect("partial reference capture");
    assert!(partial.result.timed_out);
    assert!(partial.result.stderr.contains("pulling layer 3 of 9"));
    assert!(partial.command.starts_with("docker build"));
    assert!(runner.called("candidate-rmi"));
    assert!(runner.called("reference-rmi"));
}

#[test]
fn missing_tool_is_reported_not_raised() {
    let _log = test_log("missing_tool_is_reported_not_raised");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace("candidate-build", Reply::NotFound);

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&simple("absent-tool"));

    match outcome.failure() {
        Some(ScenarioFailure::ToolUnavailable { program, .. }) => assert_eq!(program, "buildah"),
        other => panic!("expected ToolUnavailable, got {other:?}"),
    }
}

#[test]
fn missing_fsdiff_tool_keeps_metadata_verdict() {
    let _log = test_log("missing_fsdiff_tool_keeps_metadata_verdict");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace("fsdiff", Reply::NotFound);

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&simple("no-fsdiff"));

    assert!(outcome.diff.as_ref().unwrap().all_match());
    assert!(matches!(
        outcome.failure(),
        Some(ScenarioFailure::ToolUnavailable { program, .. }) if program == "container-diff"
    ));
}

#[test]
fn disabled_fsdiff_is_skipped() {
    let _log = test_log("disabled_fsdiff_is_skipped");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace("fsdiff", Reply::fail(1, "broken"));
    let mut config = config_for(data.path());
    config.fsdiff.enabled = false;

    let outcome = ScenarioRunner::new(&runner, &config).run(&simple("no-fsdiff"));

    assert!(outcome.success, "failures: {:?}", outcome.failures);
    assert!(!runner.called("fsdiff"));
    assert!(outcome.fs_diff.is_none());
}

#[test]
fn missing_source_fails_staging_without_builds() {
    let _log = test_log("missing_source_fails_staging_without_builds");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let def = ScenarioDefinition::new("lost", BuildSource::File("Dockerfile.lost".into()));

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&def);

    assert!(matches!(outcome.failure(), Some(ScenarioFailure::Staging { .. })));
    assert!(runner.calls().is_empty());
    assert!(!outcome.staging_dir.as_ref().unwrap().exists());
}

#[test]
fn kept_staging_directory_survives() {
    let _log = test_log("kept_staging_directory_survives");
    let data = fixture();
    let runner = ScriptedRunner::conforming();
    let staging_root = TempDir::new().unwrap();
    let mut config = config_for(data.path());
    config.runner.keep_workdirs = true;
    config.runner.staging_root = Some(staging_root.path().to_path_buf());

    let def = ScenarioDefinition::new("kept", BuildSource::Directory("dir".into()));
    let outcome = ScenarioRunner::new(&runner, &config).run(&def);

    assert!(outcome.staging_kept);
    let dir = outcome.staging_dir.unwrap();
    assert!(dir.starts_with(std::path::absolute(staging_root.path()).unwrap()));
    assert!(dir.join("payload.txt").is_file());
    assert!(dir.join("Dockerfile").is_file());
}

#[test]
fn outcome_serializes_failures_with_kind_tags() {
    let _log = test_log("outcome_serializes_failures_with_kind_tags");
    let data = fixture();
    let runner = ScriptedRunner::conforming().replace("images", Reply::ok(""));

    let outcome = ScenarioRunner::new(&runner, &config_for(data.path())).run(&simple("json"));
    let value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(value["scenario"], "json");
    assert_eq!(value["success"], false);
    assert_eq!(value["final_state"], "failed");
    assert_eq!(value["failures"][0]["kind"], "artifact_resolution");
    assert_eq!(value["candidate"]["exit_code"], 0);
}
