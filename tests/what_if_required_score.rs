use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn course() -> (serde_json::Value, serde_json::Value) {
    (
        json!([
            { "id": "hw1", "score": 18, "totalScore": 20, "groupId": "hw" },
            { "id": "hw2", "score": 14, "totalScore": 20, "groupId": "hw" },
            { "id": "mid", "score": 70, "totalScore": 100, "groupId": "exams", "relativeWeightInGroup": 1 },
            { "id": "final", "score": null, "totalScore": 120, "groupId": "exams", "relativeWeightInGroup": 2 }
        ]),
        json!([
            { "id": "hw", "weight": 40 },
            { "id": "exams", "weight": 60 }
        ]),
    )
}

#[test]
fn required_score_hits_the_target_when_plugged_back_in() {
    let (assignments, groups) = course();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "course.requiredScore",
        json!({
            "assignments": assignments,
            "groups": groups,
            "assignmentId": "final",
            "targetPercentage": 80
        }),
    );
    assert_eq!(res["outcome"], "score");
    let score = res["score"].as_f64().expect("score");
    // hw 32 of 40, mid 14 of 20, final weight 40: (0.8*100 - 46) / 40 * 120.
    assert!((score - 102.0).abs() < 1e-9, "score {}", score);

    let check = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "course.whatIf",
        json!({
            "assignments": assignments,
            "groups": groups,
            "overrides": { "final": score }
        }),
    );
    let pct = check["percentage"].as_f64().expect("percentage");
    assert!((pct - 80.0).abs() < 1e-9);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn required_score_outcomes_for_unusable_targets() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let assignments = json!([
        { "id": "gone", "totalScore": 10, "weight": 10, "isDropped": true },
        { "id": "bonus", "totalScore": 10, "weight": 10, "isExtraCredit": true }
    ]);
    let cases = [
        ("missing", "notFound"),
        ("gone", "notWeighted"),
        ("bonus", "unreachable"),
    ];
    for (i, (target, outcome)) in cases.iter().enumerate() {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            &format!("r{}", i),
            "course.requiredScore",
            json!({
                "assignments": assignments,
                "assignmentId": target,
                "targetPercentage": 90
            }),
        );
        assert_eq!(res["outcome"], *outcome, "target {}", target);
        assert!(res.get("score").is_none());
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn what_if_reports_baseline_and_unmatched_ids() {
    let (assignments, groups) = course();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let baseline = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grade.overallPercentage",
        json!({ "assignments": assignments, "groups": groups }),
    );

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "course.whatIf",
        json!({
            "assignments": assignments,
            "groups": groups,
            "overrides": { "hw2": null, "quiz9": 4 }
        }),
    );
    assert_eq!(res["baseline"], baseline["percentage"]);
    // Only hw1 and mid remain graded: 0.9*20 + 0.7*20 over 40.
    let pct = res["percentage"].as_f64().expect("percentage");
    assert!((pct - 80.0).abs() < 1e-9);
    assert_eq!(res["unmatchedIds"], json!(["quiz9"]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn what_if_requires_an_overrides_object() {
    let (assignments, groups) = course();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let payload = json!({
        "id": "1",
        "method": "course.whatIf",
        "params": { "assignments": assignments, "groups": groups, "overrides": [1, 2] }
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value["ok"], false);
    assert_eq!(value["error"]["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
}
