#![allow(dead_code)]

use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_schoolmgrd");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLMGR_WORKSPACE")
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoolmgrd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

impl Sidecar {
    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");
        self.read_response()
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write raw line");
        self.stdin.flush().expect("flush raw line");
        self.read_response()
    }

    fn read_response(&mut self) -> serde_json::Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response");
        serde_json::from_str(line.trim()).expect("parse response json")
    }

    pub fn request_ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    pub fn request_err(&mut self, id: &str, method: &str, params: serde_json::Value) -> String {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"].as_str().unwrap_or("").to_string()
    }

    pub fn select_workspace(&mut self, workspace: &Path) {
        let _ = self.request_ok(
            "ws",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
    }
}

pub const COMPANY: i64 = 10;
pub const OTHER_COMPANY: i64 = 20;
pub const MANAGER: i64 = 1;
pub const TEACHER: i64 = 2;
pub const ADMIN: i64 = 3;
pub const OUTSIDER: i64 = 4;
pub const SUSPENDED_MANAGER: i64 = 5;

/// Seeds a small school after `workspace.select` has created the schema.
///
/// Company 10 "Northside Academy":
/// - cohorts: "Grade 9A" (3 members), "Grade 10 Science" (2), "Middle School Band" (1),
///   "Staff Pool" (0), "Grade 9B" (1, deleted member only)
/// - students 100..=104 (104 deleted), teacher 2, manager 1
/// - courses: MATH9 (3 enrolled, 1 completed), ART (0 enrolled)
pub fn seed_school(workspace: &Path) {
    let conn = Connection::open(workspace.join("schoolmgr.sqlite3")).expect("open seeded db");
    conn.execute_batch(
        "
        INSERT INTO companies(id, name, shortname) VALUES
            (10, 'Northside Academy', 'north'),
            (20, 'Southside College', 'south');

        INSERT INTO users(id, username, firstname, lastname, email, deleted, suspended, siteadmin) VALUES
            (1, 'manager', 'Mara', 'Manager', 'mara@example.org', 0, 0, 0),
            (2, 'teacher', 'Theo', 'Teacher', 'theo@example.org', 0, 0, 0),
            (3, 'admin', 'Ada', 'Admin', 'ada@example.org', 0, 0, 1),
            (4, 'outsider', 'Otto', 'Outsider', 'otto@example.org', 0, 0, 0),
            (5, 'suspended', 'Sam', 'Suspended', 'sam@example.org', 0, 1, 0),
            (100, 's100', 'Alice', 'Brown', 'alice@example.org', 0, 0, 0),
            (101, 's101', 'Bob', 'Adams', 'bob@example.org', 0, 0, 0),
            (102, 's102', 'Cara', 'Clark', 'cara@example.org', 0, 0, 0),
            (103, 's103', 'Dan', 'Dale', 'dan@example.org', 0, 0, 0),
            (104, 's104', 'Eve', 'Gone', 'eve@example.org', 1, 0, 0),
            (200, 's200', 'Zed', 'South', 'zed@example.org', 0, 0, 0);

        INSERT INTO company_users(companyid, userid, managertype, educator) VALUES
            (10, 1, 1, 0),
            (10, 2, 0, 1),
            (10, 5, 1, 0),
            (10, 100, 0, 0),
            (10, 101, 0, 0),
            (10, 102, 0, 0),
            (10, 103, 0, 0),
            (10, 104, 0, 0),
            (20, 4, 1, 0),
            (20, 200, 0, 0);

        INSERT INTO cohorts(id, companyid, name, idnumber, visible) VALUES
            (1, 10, 'Grade 9A', 'G9A', 1),
            (2, 10, 'Grade 10 Science', 'G10S', 1),
            (3, 10, 'Middle School Band', 'MSB', 0),
            (4, 10, 'Staff Pool', 'STAFF', 1),
            (5, 10, 'Grade 9B', 'G9B', 1),
            (6, 20, 'Grade 1', 'S-G1', 1);

        INSERT INTO cohort_members(cohortid, userid) VALUES
            (1, 100), (1, 101), (1, 102),
            (2, 100), (2, 103),
            (3, 101),
            (5, 104),
            (6, 200);

        INSERT INTO courses(id, shortname, fullname) VALUES
            (1, 'MATH9', 'Mathematics 9'),
            (2, 'ART', 'Art Studio'),
            (3, 'SOUTH', 'Southside Only');

        INSERT INTO company_courses(companyid, courseid) VALUES
            (10, 1), (10, 2), (20, 3);

        INSERT INTO user_enrolments(courseid, userid, status, timecompleted) VALUES
            (1, 100, 0, 1700000000),
            (1, 101, 0, NULL),
            (1, 102, 0, NULL),
            (1, 103, 1, NULL),
            (1, 104, 0, NULL),
            (1, 200, 0, NULL),
            (3, 200, 0, NULL);
        ",
    )
    .expect("seed school");
}

/// Spawns a sidecar with a freshly seeded workspace selected.
pub fn seeded_sidecar(prefix: &str) -> (Sidecar, PathBuf) {
    let workspace = temp_dir(prefix);
    let mut sidecar = spawn_sidecar();
    sidecar.select_workspace(&workspace);
    seed_school(&workspace);
    (sidecar, workspace)
}
