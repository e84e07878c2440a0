use crate::db;
use crate::export::ExportFormat;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
pub enum SetupSection {
    Reports,
    Exports,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "reports" => Some(Self::Reports),
            "exports" => Some(Self::Exports),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Reports => "setup.reports",
            Self::Exports => "setup.exports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Reports => json!({
            "showGeneratedAt": true,
            "includeEmptyCohorts": true
        }),
        SetupSection::Exports => json!({
            "defaultFormat": "csv",
            "csvDelimiter": ",",
            "fileNamePrefix": "schoolmgr"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Reports => match k.as_str() {
                "showGeneratedAt" | "includeEmptyCohorts" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
            SetupSection::Exports => match k.as_str() {
                "defaultFormat" => {
                    let s = parse_string_max(v, k, 8)?;
                    let Some(format) = ExportFormat::parse(&s) else {
                        return Err("defaultFormat must be one of: csv, xlsx".into());
                    };
                    obj.insert(k.clone(), Value::String(format.as_str().to_string()));
                }
                "csvDelimiter" => {
                    let s = parse_string_max(v, k, 1)?;
                    if s != "," && s != ";" && s != "\t" {
                        return Err("csvDelimiter must be one of: comma, semicolon, tab".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "fileNamePrefix" => {
                    let s = parse_string_max(v, k, 32)?.trim().to_string();
                    if s.is_empty()
                        || !s
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                    {
                        return Err(
                            "fileNamePrefix must be non-empty and use only letters, digits, _ or -"
                                .into(),
                        );
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown exports field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed stored values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &single);
            }
        }
    }
    Ok(current)
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub show_generated_at: bool,
    pub include_empty_cohorts: bool,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub default_format: ExportFormat,
    pub csv_delimiter: u8,
    pub file_name_prefix: String,
}

pub fn report_settings(conn: &rusqlite::Connection) -> anyhow::Result<ReportSettings> {
    let v = load_section(conn, SetupSection::Reports)?;
    Ok(ReportSettings {
        show_generated_at: v["showGeneratedAt"].as_bool().unwrap_or(true),
        include_empty_cohorts: v["includeEmptyCohorts"].as_bool().unwrap_or(true),
    })
}

pub fn export_settings(conn: &rusqlite::Connection) -> anyhow::Result<ExportSettings> {
    let v = load_section(conn, SetupSection::Exports)?;
    Ok(ExportSettings {
        default_format: v["defaultFormat"]
            .as_str()
            .and_then(ExportFormat::parse)
            .unwrap_or(ExportFormat::Csv),
        csv_delimiter: v["csvDelimiter"]
            .as_str()
            .and_then(|s| s.bytes().next())
            .unwrap_or(b','),
        file_name_prefix: v["fileNamePrefix"]
            .as_str()
            .unwrap_or("schoolmgr")
            .to_string(),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let reports = match load_section(conn, SetupSection::Reports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let exports = match load_section(conn, SetupSection::Exports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "reports": reports, "exports": exports }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
