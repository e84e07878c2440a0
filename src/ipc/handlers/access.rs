use crate::access;
use crate::ipc::error::{ok, report_err};
use crate::ipc::helpers::{db_conn, required_id};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_access_check(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_id(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let company_id = match required_id(req, "companyId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = access::load_company(conn, company_id) {
        return report_err(&req.id, &e);
    }
    match access::check_access(conn, user_id, company_id) {
        Ok(check) => ok(&req.id, json!(check)),
        Err(e) => report_err(&req.id, &e),
    }
}

fn handle_companies_managed(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_id(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match access::managed_companies(conn, user_id) {
        Ok(companies) => ok(&req.id, json!({ "companies": companies })),
        Err(e) => report_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "access.check" => Some(handle_access_check(state, req)),
        "companies.managed" => Some(handle_companies_managed(state, req)),
        _ => None,
    }
}
