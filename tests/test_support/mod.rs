#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_quizdeskd");
    let mut child = Command::new(exe)
        .env_remove("QUIZDESK_WORKSPACE")
        .env("QUIZDESK_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn quizdeskd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

pub fn teacher(user_id: &str) -> Value {
    json!({ "userId": user_id })
}

pub fn learner(learner_id: &str, role: &str) -> Value {
    json!({ "learnerId": learner_id, "role": role })
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    /// Sends one request; `actor` is omitted from the line when null.
    pub fn request(&mut self, method: &str, params: Value, actor: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        if !actor.is_null() {
            payload["actor"] = actor;
        }
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: Value, actor: Value) -> Value {
        let value = self.request(method, params, actor);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Asserts failure with `code` and returns the error object.
    pub fn request_err(&mut self, method: &str, params: Value, actor: Value, code: &str) -> Value {
        let value = self.request(method, params, actor);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().unwrap_or(Value::Null);
        assert_eq!(
            error.get("code").and_then(|v| v.as_str()),
            Some(code),
            "{} returned {}",
            method,
            error
        );
        error
    }

    pub fn select_workspace(&mut self, prefix: &str) -> PathBuf {
        let dir = temp_dir(prefix);
        self.request_ok(
            "workspace.select",
            json!({ "path": dir.to_string_lossy() }),
            Value::Null,
        );
        dir
    }

    /// Onboards `user_id` and returns their workspace id.
    pub fn onboard(&mut self, user_id: &str) -> String {
        let result = self.request_ok(
            "onboarding.teacher.save",
            json!({ "displayName": "Ms Rivera", "gradeLevels": ["5"] }),
            teacher(user_id),
        );
        str_at(&result, &["workspace", "id"])
    }

    pub fn create_classroom(&mut self, user_id: &str, workspace_id: &str, name: &str) -> String {
        let result = self.request_ok(
            "classrooms.create",
            json!({ "workspaceId": workspace_id, "name": name, "grade": "5" }),
            teacher(user_id),
        );
        str_at(&result, &["classroom", "id"])
    }

    /// Creates and claims an invite; students are also added to `classroom_id`.
    pub fn enroll(
        &mut self,
        user_id: &str,
        workspace_id: &str,
        classroom_id: &str,
        display_name: &str,
        email: &str,
        role: &str,
    ) -> String {
        let invite = self.request_ok(
            "invites.create",
            json!({ "workspaceId": workspace_id }),
            teacher(user_id),
        );
        let token = str_at(&invite, &["invite", "token"]);
        let claim = self.request_ok(
            "invites.claim",
            json!({ "token": token, "email": email, "displayName": display_name, "role": role }),
            Value::Null,
        );
        let learner_id = str_at(&claim, &["claim", "learnerId"]);
        if role == "student" {
            self.request_ok(
                "classrooms.students.add",
                json!({ "workspaceId": workspace_id, "classroomId": classroom_id, "learnerId": learner_id }),
                teacher(user_id),
            );
        }
        learner_id
    }

    /// A draft with every publish-required field and one valid MCQ question.
    pub fn ready_test(&mut self, user_id: &str, workspace_id: &str, classroom_id: &str) -> String {
        let created = self.request_ok(
            "tests.create",
            json!({
                "workspaceId": workspace_id,
                "input": {
                    "classroomId": classroom_id,
                    "title": "Unit 1 check",
                    "grade": "5",
                    "subject": "Math",
                    "topic": "Addition",
                    "objective": "Add single digits",
                    "questionCountTarget": 1
                }
            }),
            teacher(user_id),
        );
        let test_id = str_at(&created, &["test", "id"]);
        self.request_ok(
            "tests.questions.add",
            json!({
                "workspaceId": workspace_id,
                "testId": test_id,
                "input": {
                    "source": "manual",
                    "type": "mcq",
                    "prompt": "What is 2 + 2?",
                    "options": ["3", "4"],
                    "correctAnswers": ["4"]
                }
            }),
            teacher(user_id),
        );
        test_id
    }
}

pub fn str_at(value: &Value, path: &[&str]) -> String {
    let mut cur = value;
    for key in path {
        cur = cur
            .get(*key)
            .unwrap_or_else(|| panic!("missing {} in {}", path.join("."), value));
    }
    cur.as_str()
        .unwrap_or_else(|| panic!("{} is not a string in {}", path.join("."), value))
        .to_string()
}
