use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "schoolmgr.sqlite3";

/// Manager type stored in `company_users.managertype` for company managers.
pub const MANAGER_TYPE_COMPANY: i64 = 1;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            shortname TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            firstname TEXT NOT NULL,
            lastname TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            deleted INTEGER NOT NULL DEFAULT 0,
            suspended INTEGER NOT NULL DEFAULT 0,
            siteadmin INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // managertype: 0 = none, 1 = company manager, 2 = department manager.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS company_users(
            id INTEGER PRIMARY KEY,
            companyid INTEGER NOT NULL,
            userid INTEGER NOT NULL,
            managertype INTEGER NOT NULL DEFAULT 0,
            educator INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(companyid) REFERENCES companies(id),
            FOREIGN KEY(userid) REFERENCES users(id),
            UNIQUE(companyid, userid)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_company_users_user ON company_users(userid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cohorts(
            id INTEGER PRIMARY KEY,
            companyid INTEGER NOT NULL,
            name TEXT NOT NULL,
            idnumber TEXT NOT NULL DEFAULT '',
            visible INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(companyid) REFERENCES companies(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cohorts_company ON cohorts(companyid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cohort_members(
            id INTEGER PRIMARY KEY,
            cohortid INTEGER NOT NULL,
            userid INTEGER NOT NULL,
            timeadded INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(cohortid) REFERENCES cohorts(id),
            FOREIGN KEY(userid) REFERENCES users(id),
            UNIQUE(cohortid, userid)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cohort_members_user ON cohort_members(userid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            shortname TEXT NOT NULL,
            fullname TEXT NOT NULL,
            visible INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS company_courses(
            id INTEGER PRIMARY KEY,
            companyid INTEGER NOT NULL,
            courseid INTEGER NOT NULL,
            FOREIGN KEY(companyid) REFERENCES companies(id),
            FOREIGN KEY(courseid) REFERENCES courses(id),
            UNIQUE(companyid, courseid)
        )",
        [],
    )?;

    // status: 0 = active, 1 = suspended.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_enrolments(
            id INTEGER PRIMARY KEY,
            courseid INTEGER NOT NULL,
            userid INTEGER NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            timecompleted INTEGER,
            FOREIGN KEY(courseid) REFERENCES courses(id),
            FOREIGN KEY(userid) REFERENCES users(id),
            UNIQUE(courseid, userid)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_enrolments_course ON user_enrolments(courseid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Older workspaces were created before cohorts carried a visibility flag.
    ensure_cohorts_visible(&conn)?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("setting {key} is not valid JSON"))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_cohorts_visible(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "cohorts", "visible")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE cohorts ADD COLUMN visible INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
