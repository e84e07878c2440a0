mod test_support;

use serde_json::{json, Value};
use std::io::Read;
use test_support::{seeded_sidecar, temp_dir, COMPANY, MANAGER, TEACHER};

fn export_params(report: &str, out: &std::path::Path, format: Option<&str>) -> Value {
    let mut p = json!({
        "userId": MANAGER,
        "companyId": COMPANY,
        "report": report,
        "outPath": out.to_string_lossy(),
    });
    if let Some(f) = format {
        p["format"] = json!(f);
    }
    p
}

#[test]
fn csv_export_writes_header_rows_and_metadata() {
    let (mut sidecar, _ws) = seeded_sidecar("schoolmgr-export-csv");
    let out = temp_dir("schoolmgr-export-csv-out").join("nested").join("levels.csv");

    let res = sidecar.request_ok(
        "1",
        "reports.export",
        export_params("cohortGradeLevels", &out, Some("csv")),
    );
    assert_eq!(res["format"], json!("csv"));
    assert_eq!(res["rowsExported"], json!(5));
    assert_eq!(res["contentType"], json!("text/csv; charset=utf-8"));
    assert_eq!(res["sha256"].as_str().map(|s| s.len()), Some(64));
    let file_name = res["fileName"].as_str().expect("fileName");
    assert!(file_name.starts_with("schoolmgr_cohort_grade_levels_"));
    assert!(file_name.ends_with(".csv"));
    assert!(res["exportId"].as_str().map(|s| s.len() == 36).unwrap_or(false));

    let text = std::fs::read_to_string(&out).expect("read csv");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Cohort,ID number,Grade level,Members,Visible"));
    assert_eq!(lines.next(), Some("Grade 10 Science,G10S,Grade 10,2,Yes"));
    assert_eq!(text.lines().count(), 6);
}

#[test]
fn export_honours_setup_defaults() {
    let (mut sidecar, _ws) = seeded_sidecar("schoolmgr-export-defaults");
    let out_dir = temp_dir("schoolmgr-export-defaults-out");

    let _ = sidecar.request_ok(
        "1",
        "setup.update",
        json!({
            "section": "exports",
            "patch": { "csvDelimiter": ";", "fileNamePrefix": "north" }
        }),
    );
    let csv_out = out_dir.join("summary.csv");
    let res = sidecar.request_ok(
        "2",
        "reports.export",
        export_params("gradeLevelSummary", &csv_out, None),
    );
    assert_eq!(res["format"], json!("csv"));
    assert!(res["fileName"]
        .as_str()
        .unwrap_or("")
        .starts_with("north_grade_level_summary_"));
    let text = std::fs::read_to_string(&csv_out).expect("read csv");
    assert_eq!(text.lines().next(), Some("Grade level;Cohorts;Students"));
    assert_eq!(text.lines().nth(1), Some("Grade 9;2;3"));

    let _ = sidecar.request_ok(
        "3",
        "setup.update",
        json!({ "section": "exports", "patch": { "defaultFormat": "xlsx" } }),
    );
    let xlsx_out = out_dir.join("summary.xlsx");
    let res = sidecar.request_ok(
        "4",
        "reports.export",
        export_params("gradeLevelSummary", &xlsx_out, None),
    );
    assert_eq!(res["format"], json!("xlsx"));

    let setup = sidecar.request_ok("5", "setup.get", json!({}));
    assert_eq!(setup["exports"]["defaultFormat"], json!("xlsx"));
    assert_eq!(setup["exports"]["csvDelimiter"], json!(";"));
    assert_eq!(setup["reports"]["showGeneratedAt"], json!(true));
}

#[test]
fn xlsx_export_is_a_readable_workbook() {
    let (mut sidecar, _ws) = seeded_sidecar("schoolmgr-export-xlsx");
    let out = temp_dir("schoolmgr-export-xlsx-out").join("roster.xlsx");

    let res = sidecar.request_ok(
        "1",
        "reports.export",
        export_params("studentRoster", &out, Some("excel")),
    );
    assert_eq!(res["format"], json!("xlsx"));
    assert_eq!(
        res["contentType"],
        json!("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
    );
    assert_eq!(res["rowsExported"], json!(6));

    let file = std::fs::File::open(&out).expect("open xlsx");
    let mut archive = zip::ZipArchive::new(file).expect("xlsx is a zip");
    let mut workbook = String::new();
    archive
        .by_name("xl/workbook.xml")
        .expect("workbook part")
        .read_to_string(&mut workbook)
        .expect("read workbook");
    assert!(workbook.contains("name=\"Student roster\""));

    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .expect("sheet part")
        .read_to_string(&mut sheet)
        .expect("read sheet");
    assert!(sheet.contains(">Username<"));
    assert!(sheet.contains(">Middle School Band<"));
    assert!(sheet.contains("<row r=\"7\">"));
}

#[test]
fn html_render_is_escaped_and_gated() {
    let (mut sidecar, ws) = seeded_sidecar("schoolmgr-render-html");
    let conn = rusqlite::Connection::open(ws.join("schoolmgr.sqlite3")).expect("open db");
    conn.execute(
        "INSERT INTO cohorts(companyid, name, idnumber) VALUES (10, '<b>Grade 4</b> & friends', 'X')",
        [],
    )
    .expect("insert cohort");

    let res = sidecar.request_ok(
        "1",
        "reports.renderHtml",
        json!({ "userId": MANAGER, "companyId": COMPANY, "report": "cohortGradeLevels" }),
    );
    assert_eq!(res["contentType"], json!("text/html; charset=utf-8"));
    assert_eq!(res["rowCount"], json!(6));
    let html = res["html"].as_str().expect("html");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("&lt;b&gt;Grade 4&lt;/b&gt; &amp; friends"));
    assert!(html.contains("<td>Grade 4</td>"));
    assert!(html.contains("Generated "));

    let _ = sidecar.request_ok(
        "2",
        "setup.update",
        json!({ "section": "reports", "patch": { "showGeneratedAt": false } }),
    );
    let overview = sidecar.request_ok(
        "3",
        "reports.renderHtml",
        json!({ "userId": MANAGER, "companyId": COMPANY, "report": "schoolOverview" }),
    );
    let html = overview["html"].as_str().expect("html");
    assert!(html.contains("<h2>School overview: Northside Academy</h2>"));
    assert!(html.contains("<td>Students</td><td class=\"numeric\">4</td>"));
    assert!(!html.contains("Generated "));

    assert_eq!(
        sidecar.request_err(
            "4",
            "reports.renderHtml",
            json!({ "userId": TEACHER, "companyId": COMPANY, "report": "schoolOverview" }),
        ),
        "access_denied"
    );
}

#[test]
fn export_rejects_bad_requests_without_writing() {
    let (mut sidecar, _ws) = seeded_sidecar("schoolmgr-export-bad");
    let out_dir = temp_dir("schoolmgr-export-bad-out");

    let out = out_dir.join("x.pdf");
    assert_eq!(
        sidecar.request_err("1", "reports.export", export_params("studentRoster", &out, Some("pdf"))),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("2", "reports.export", export_params("gradebook", &out, None)),
        "bad_params"
    );
    let mut denied = export_params("studentRoster", &out, Some("csv"));
    denied["userId"] = json!(TEACHER);
    assert_eq!(
        sidecar.request_err("3", "reports.export", denied),
        "access_denied"
    );
    assert!(!out.exists());

    assert_eq!(
        sidecar.request_err(
            "4",
            "setup.update",
            json!({ "section": "exports", "patch": { "csvDelimiter": "|" } }),
        ),
        "bad_params"
    );
}
