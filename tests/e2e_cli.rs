mod common;

use common::cli::{BcWorkspace, extract_json_payload, run_buildcheck, run_buildcheck_with_env};
use serde_json::Value;

#[test]
fn e2e_diff_reports_mismatches_and_exit_code() {
    let _log = common::test_log("e2e_diff_reports_mismatches_and_exit_code");
    let workspace = BcWorkspace::new();
    workspace.write(
        "reference.json",
        r#"[{"Id": "sha256:aaa", "Os": "linux", "Config": {"User": "root", "Env": ["A=1"]}}]"#,
    );
    workspace.write(
        "candidate.json",
        r#"[{"Id": "sha256:bbb", "Os": "linux", "Config": {"User": "app", "Env": ["A=1"]}}]"#,
    );
    workspace.write(
        "same.json",
        r#"{"Id": "sha256:ccc", "Os": "linux", "Config": {"User": "root", "Env": ["A=1"]}}"#,
    );

    let differ = run_buildcheck(&workspace, ["diff", "reference.json", "candidate.json"], "diff_differ");
    assert_eq!(differ.status.code(), Some(1), "stderr: {}", differ.stderr);
    assert!(differ.stdout.contains("Config.User: reference=\"root\" candidate=\"app\""));

    let same = run_buildcheck(&workspace, ["diff", "reference.json", "same.json"], "diff_same");
    assert!(same.status.success(), "stderr: {}", same.stderr);
    assert!(same.stdout.contains("documents match"));

    let ignored = run_buildcheck(
        &workspace,
        ["diff", "reference.json", "candidate.json", "--ignore", "Config.User", "--json"],
        "diff_ignored",
    );
    assert!(ignored.status.success(), "stderr: {}", ignored.stderr);
    let payload: Value = serde_json::from_str(&extract_json_payload(&ignored.stdout)).unwrap();
    assert_eq!(payload["verdict"]["all_match"], true);

    let strict = run_buildcheck(
        &workspace,
        ["diff", "reference.json", "same.json", "--no-default-ignores"],
        "diff_strict",
    );
    assert_eq!(strict.status.code(), Some(1));
    assert!(strict.stdout.contains("Id: reference=\"sha256:aaa\""));
}

#[test]
fn e2e_diff_bad_input_is_a_structured_error() {
    let _log = common::test_log("e2e_diff_bad_input_is_a_structured_error");
    let workspace = BcWorkspace::new();
    workspace.write("broken.json", "{not json");
    workspace.write("ok.json", "{}");

    let run = run_buildcheck(&workspace, ["diff", "broken.json", "ok.json", "--json"], "diff_broken");
    assert_eq!(run.status.code(), Some(8));
    let err: Value =
        serde_json::from_str(&extract_json_payload(&run.stderr)).expect("structured error on stderr");
    assert_eq!(err["error"]["code"], "JSON_ERROR");
    assert!(err["error"]["message"].as_str().unwrap().contains("broken.json"));
}

#[test]
fn e2e_match_extracts_and_compares_captures() {
    let _log = common::test_log("e2e_match_extracts_and_compares_captures");
    let workspace = BcWorkspace::new();
    workspace.write("candidate.log", "STEP 1: FROM alpine\nSTEP 2: RUN ls\n");
    workspace.write("reference.log", "Step 1/2 : FROM alpine\nStep 2/2 : RUN ls\n");

    let single = run_buildcheck(&workspace, ["match", r"STEP \d: (\w+)", "candidate.log"], "match_single");
    assert!(single.status.success(), "stderr: {}", single.stderr);
    assert!(single.stdout.contains("[0] FROM"));
    assert!(single.stdout.contains("[1] RUN"));
    assert!(single.stdout.contains("2 matches"));

    let paired = run_buildcheck(
        &workspace,
        [
            "match",
            r"STEP \d: (\w+)",
            "candidate.log",
            "--against",
            r"Step \d/\d : (\w+)",
            "reference.log",
        ],
        "match_paired",
    );
    assert!(paired.status.success(), "stderr: {}", paired.stderr);
    assert!(paired.stdout.contains("matched (2 captures)"));

    let missing = run_buildcheck(&workspace, ["match", r"COMMIT (\w+)", "candidate.log"], "match_missing");
    assert_eq!(missing.status.code(), Some(1));

    let invalid = run_buildcheck(&workspace, ["match", "(unclosed", "candidate.log", "--json"], "match_invalid");
    assert_eq!(invalid.status.code(), Some(3));
    assert!(invalid.stderr.contains("INVALID_PATTERN"));
}

#[test]
fn e2e_list_builtin_and_filtered() {
    let _log = common::test_log("e2e_list_builtin_and_filtered");
    let workspace = BcWorkspace::new();

    let all = run_buildcheck(&workspace, ["list"], "list_all");
    assert!(all.status.success(), "stderr: {}", all.stderr);
    assert!(all.stdout.contains("shell-test"));
    assert!(all.stdout.contains("transient-mount"));

    let filtered = run_buildcheck(&workspace, ["list", "--filter", "volume", "--json"], "list_filtered");
    assert!(filtered.status.success(), "stderr: {}", filtered.stderr);
    let payload: Value = serde_json::from_str(&extract_json_payload(&filtered.stdout)).unwrap();
    let ids: Vec<&str> = payload
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["volume", "volumerun"]);
}

#[test]
fn e2e_unknown_scenario_suggests_close_ids() {
    let _log = common::test_log("e2e_unknown_scenario_suggests_close_ids");
    let workspace = BcWorkspace::new();

    let run = run_buildcheck(&workspace, ["run", "volumes"], "run_unknown");
    assert_eq!(run.status.code(), Some(3));
    assert!(run.stderr.contains("UNKNOWN_SCENARIO"));
    assert!(run.stderr.contains("volume"));
}

#[test]
fn e2e_schema_and_version() {
    let _log = common::test_log("e2e_schema_and_version");
    let workspace = BcWorkspace::new();

    let schema = run_buildcheck(&workspace, ["schema"], "schema");
    assert!(schema.status.success(), "stderr: {}", schema.stderr);
    let payload: Value = serde_json::from_str(&schema.stdout).unwrap();
    assert_eq!(payload["title"], "RegistryFile");
    assert!(payload["properties"]["scenarios"].is_object());

    let version = run_buildcheck(&workspace, ["version", "--json"], "version");
    assert!(version.status.success());
    let payload: Value = serde_json::from_str(&version.stdout).unwrap();
    assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn e2e_config_precedence() {
    let _log = common::test_log("e2e_config_precedence");
    let workspace = BcWorkspace::new();
    workspace.write(
        "buildcheck.yaml",
        "candidate:\n  program: podman\nrunner:\n  timeout-secs: 90\n",
    );

    let project = run_buildcheck(&workspace, ["config", "--json"], "config_project");
    assert!(project.status.success(), "stderr: {}", project.stderr);
    let payload: Value = serde_json::from_str(&project.stdout).unwrap();
    assert_eq!(payload["candidate"]["program"], "podman");
    assert_eq!(payload["runner"]["timeout_secs"], 90);
    assert_eq!(payload["reference"]["program"], "docker");

    let env = run_buildcheck_with_env(
        &workspace,
        ["config", "--json"],
        [("BUILDCHECK_RUNNER_TIMEOUT_SECS", "15")],
        "config_env",
    );
    let payload: Value = serde_json::from_str(&env.stdout).unwrap();
    assert_eq!(payload["runner"]["timeout_secs"], 15);
    assert_eq!(payload["candidate"]["program"], "podman");

    let paths = run_buildcheck(&workspace, ["config", "--paths"], "config_paths");
    assert!(paths.stdout.contains("buildcheck.yaml"));
    assert!(paths.stdout.contains("BUILDCHECK_*"));

    let missing = run_buildcheck(&workspace, ["config", "--config", "nope.yaml"], "config_missing");
    assert_eq!(missing.status.code(), Some(2));
}

#[cfg(unix)]
mod with_fake_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FAKE_TOOL: &str = r#"#!/bin/sh
case "$1" in
  bud|build)
    echo "STEP 1/1: FROM scratch"
    echo "RESULT=$FAKE_RESULT"
    echo "--> 0123456789ab"
    ;;
  images) echo "0123456789ab" ;;
  inspect) echo '[{"Id": "sha256:0123456789ab", "Os": "linux", "Config": {"Env": ["A=1"]}}]' ;;
  diff)
    printf 'These entries have been added:\nNone\n\nThese entries have been deleted:\nNone\n\nThese entries have been changed:\nNone\n'
    ;;
  push|rmi) ;;
  *) echo "unexpected: $*" >&2; exit 2 ;;
esac
"#;

    fn prepared_workspace() -> BcWorkspace {
        let workspace = BcWorkspace::new();
        let tool = workspace.write("bin/fake-tool", FAKE_TOOL);
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let tool = tool.display().to_string();
        workspace.write("testdata/Dockerfile.hello", "FROM scratch\n");
        workspace.write(
            "registry.yaml",
            r"scenarios:
  - id: hello
    source: {file: Dockerfile.hello}
    candidate_output: {positional: 'RESULT=(\w+)'}
    reference_output: {positional: 'RESULT=(\w+)'}
",
        );
        workspace.write(
            "buildcheck.yaml",
            &format!(
                "candidate:\n  program: {tool}\nreference:\n  program: {tool}\ninspector:\n  program: {tool}\ntransfer:\n  command: {tool} push {{tag}} docker-daemon:{{tag}}:latest\nfsdiff:\n  command: {tool} diff {{candidate}} {{reference}}\nregistry: registry.yaml\n"
            ),
        );
        workspace
    }

    #[test]
    fn e2e_run_passes_with_conforming_tools() {
        let _log = common::test_log("e2e_run_passes_with_conforming_tools");
        let workspace = prepared_workspace();

        let run = run_buildcheck_with_env(&workspace, ["run"], [("FAKE_RESULT", "ok")], "run_pass");
        assert!(run.status.success(), "stdout: {}\nstderr: {}", run.stdout, run.stderr);
        assert!(run.stdout.contains("PASS hello"));
        assert!(run.stdout.contains("1 scenarios: 1 passed, 0 failed, 0 skipped"));

        let json = run_buildcheck_with_env(&workspace, ["run", "--json"], [("FAKE_RESULT", "ok")], "run_json");
        let payload: Value = serde_json::from_str(&extract_json_payload(&json.stdout)).unwrap();
        assert_eq!(payload["summary"]["all_passed"], true);
        assert_eq!(payload["outcomes"][0]["final_state"], "reported");
    }

    #[test]
    fn e2e_run_fails_when_patterns_find_nothing() {
        let _log = common::test_log("e2e_run_fails_when_patterns_find_nothing");
        let workspace = prepared_workspace();

        let run = run_buildcheck_with_env(&workspace, ["run"], [("FAKE_RESULT", "")], "run_fail");
        assert_eq!(run.status.code(), Some(1), "stderr: {}", run.stderr);
        assert!(run.stdout.contains("FAIL hello"));
        assert!(run.stdout.contains("[PATTERN_NO_MATCH]"));
    }
}
