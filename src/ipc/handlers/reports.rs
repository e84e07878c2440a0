use crate::access;
use crate::error::ReportError;
use crate::export::{self, ExportFormat};
use crate::grade::GradeLevel;
use crate::ipc::error::{err, ok, report_err};
use crate::ipc::helpers::{db_conn, optional_str, required_id, required_str};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, CohortListOptions, ReportKind};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

use super::setup;

struct Caller<'a> {
    conn: &'a Connection,
    user_id: i64,
    company_id: i64,
}

fn caller<'a>(state: &'a AppState, req: &Request) -> Result<Caller<'a>, Value> {
    let conn = db_conn(state, req)?;
    let user_id = required_id(req, "userId")?;
    let company_id = required_id(req, "companyId")?;
    access::require_company_manager(conn, user_id, company_id)
        .map_err(|e| report_err(&req.id, &e))?;
    Ok(Caller {
        conn,
        user_id,
        company_id,
    })
}

fn parse_report_kind(req: &Request) -> Result<ReportKind, Value> {
    let raw = required_str(req, "report")?;
    ReportKind::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "report must be one of: schoolOverview, cohortGradeLevels, gradeLevelSummary, courseEnrolments, studentRoster",
            Some(json!({ "report": raw })),
        )
    })
}

fn cohort_options(c: &Caller<'_>, req: &Request) -> Result<CohortListOptions, Value> {
    let grade_level = match optional_str(req, "gradeLevel") {
        None => None,
        Some(label) => Some(GradeLevel::from_label(label).ok_or_else(|| {
            report_err(
                &req.id,
                &ReportError::BadParams(format!("unknown gradeLevel: {label}")),
            )
        })?),
    };
    let include_empty = match req.params.get("includeEmpty") {
        None | Some(Value::Null) => setup::report_settings(c.conn)
            .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?
            .include_empty_cohorts,
        Some(Value::Bool(v)) => *v,
        Some(other) => {
            return Err(report_err(
                &req.id,
                &ReportError::BadParams(format!("includeEmpty must be boolean, got {other}")),
            ))
        }
    };
    Ok(CohortListOptions {
        grade_level,
        include_empty,
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn handle_school_overview(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::school_overview(c.conn, c.user_id, c.company_id) {
        Ok(model) => ok(&req.id, json!(model)),
        Err(e) => report_err(&req.id, &e),
    }
}

fn handle_cohort_grade_levels(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let opts = match cohort_options(&c, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::cohort_grade_levels(c.conn, c.user_id, c.company_id, &opts) {
        Ok(rows) => ok(&req.id, json!({ "cohorts": rows })),
        Err(e) => report_err(&req.id, &e),
    }
}

fn handle_grade_level_summary(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::grade_level_summary(c.conn, c.user_id, c.company_id) {
        Ok(rows) => ok(&req.id, json!({ "levels": rows })),
        Err(e) => report_err(&req.id, &e),
    }
}

fn handle_course_enrolments(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::course_enrolments(c.conn, c.user_id, c.company_id) {
        Ok(rows) => ok(&req.id, json!({ "courses": rows })),
        Err(e) => report_err(&req.id, &e),
    }
}

fn handle_student_roster(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match reports::student_roster(c.conn, c.user_id, c.company_id) {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
        Err(e) => report_err(&req.id, &e),
    }
}

fn handle_render_html(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match parse_report_kind(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let opts = match cohort_options(&c, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match setup::report_settings(c.conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let table = match reports::build_table(c.conn, kind, c.user_id, c.company_id, &opts) {
        Ok(v) => v,
        Err(e) => return report_err(&req.id, &e),
    };
    let generated_at = settings.show_generated_at.then(now_rfc3339);
    let html = crate::table::render_html(&table, generated_at.as_deref());
    ok(
        &req.id,
        json!({
            "report": kind.as_str(),
            "title": table.title,
            "rowCount": table.rows.len(),
            "contentType": "text/html; charset=utf-8",
            "html": html
        }),
    )
}

fn handle_export(state: &mut AppState, req: &Request) -> Value {
    let c = match caller(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match parse_report_kind(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let opts = match cohort_options(&c, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match setup::export_settings(c.conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let format = match optional_str(req, "format") {
        None => settings.default_format,
        Some(raw) => match ExportFormat::parse(raw) {
            Some(f) => f,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "format must be one of: csv, xlsx",
                    Some(json!({ "format": raw })),
                )
            }
        },
    };

    let table = match reports::build_table(c.conn, kind, c.user_id, c.company_id, &opts) {
        Ok(v) => v,
        Err(e) => return report_err(&req.id, &e),
    };
    let summary =
        match export::write_export(&table, format, settings.csv_delimiter, &out_path) {
            Ok(v) => v,
            Err(e) => {
                let e = ReportError::Export(e);
                tracing::error!(path = %out_path.display(), error = %e, "export failed");
                return err(
                    &req.id,
                    e.code(),
                    e.to_string(),
                    Some(json!({ "path": out_path.to_string_lossy() })),
                );
            }
        };

    let now = Utc::now();
    let file_name = format!(
        "{}_{}_{}.{}",
        settings.file_name_prefix,
        kind.file_stem(),
        now.format("%Y%m%d"),
        format.extension()
    );
    let export_id = Uuid::new_v4().to_string();
    tracing::info!(
        export_id = %export_id,
        report = kind.as_str(),
        format = format.as_str(),
        rows = summary.rows_exported,
        company_id = c.company_id,
        "report exported"
    );
    ok(
        &req.id,
        json!({
            "exportId": export_id,
            "report": kind.as_str(),
            "format": format.as_str(),
            "path": out_path.to_string_lossy(),
            "fileName": file_name,
            "contentType": format.content_type(),
            "rowsExported": summary.rows_exported,
            "sha256": summary.sha256,
            "generatedAt": now.to_rfc3339_opts(SecondsFormat::Secs, true)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.schoolOverview" => Some(handle_school_overview(state, req)),
        "reports.cohortGradeLevels" => Some(handle_cohort_grade_levels(state, req)),
        "reports.gradeLevelSummary" => Some(handle_grade_level_summary(state, req)),
        "reports.courseEnrolments" => Some(handle_course_enrolments(state, req)),
        "reports.studentRoster" => Some(handle_student_roster(state, req)),
        "reports.renderHtml" => Some(handle_render_html(state, req)),
        "reports.export" => Some(handle_export(state, req)),
        _ => None,
    }
}
