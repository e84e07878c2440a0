use crate::db::MANAGER_TYPE_COMPANY;
use crate::error::ReportError;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub id: i64,
    pub name: String,
    pub shortname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    pub company_manager: bool,
    pub site_admin: bool,
}

struct ActiveUser {
    site_admin: bool,
}

// Deleted and suspended accounts are treated as absent.
fn active_user(conn: &Connection, user_id: i64) -> Result<Option<ActiveUser>, ReportError> {
    let row = conn
        .query_row(
            "SELECT siteadmin FROM users WHERE id = ? AND deleted = 0 AND suspended = 0",
            [user_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(row.map(|siteadmin| ActiveUser {
        site_admin: siteadmin != 0,
    }))
}

pub fn load_company(conn: &Connection, company_id: i64) -> Result<CompanySummary, ReportError> {
    conn.query_row(
        "SELECT id, name, shortname FROM companies WHERE id = ?",
        [company_id],
        company_row,
    )
    .optional()?
    .ok_or_else(|| ReportError::NotFound(format!("company {company_id}")))
}

pub fn check_access(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<AccessCheck, ReportError> {
    let Some(user) = active_user(conn, user_id)? else {
        return Ok(AccessCheck {
            company_manager: false,
            site_admin: false,
        });
    };
    if user.site_admin {
        return Ok(AccessCheck {
            company_manager: true,
            site_admin: true,
        });
    }
    let manages: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM company_users
             WHERE userid = ? AND companyid = ? AND managertype = ?",
            (user_id, company_id, MANAGER_TYPE_COMPANY),
            |r| r.get(0),
        )
        .optional()?;
    Ok(AccessCheck {
        company_manager: manages.is_some(),
        site_admin: false,
    })
}

pub fn is_company_manager(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<bool, ReportError> {
    Ok(check_access(conn, user_id, company_id)?.company_manager)
}

/// Gate for every report: the company must exist and the caller must manage it.
pub fn require_company_manager(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<CompanySummary, ReportError> {
    let company = load_company(conn, company_id)?;
    if !is_company_manager(conn, user_id, company_id)? {
        tracing::warn!(user_id, company_id, "company manager check failed");
        return Err(ReportError::AccessDenied {
            user_id,
            company_id,
        });
    }
    Ok(company)
}

fn company_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<CompanySummary> {
    Ok(CompanySummary {
        id: r.get(0)?,
        name: r.get(1)?,
        shortname: r.get(2)?,
    })
}

/// Companies the user may run reports for; every company for a site admin.
pub fn managed_companies(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<CompanySummary>, ReportError> {
    let Some(user) = active_user(conn, user_id)? else {
        return Ok(Vec::new());
    };
    let rows = if user.site_admin {
        let mut stmt = conn.prepare("SELECT id, name, shortname FROM companies ORDER BY name, id")?;
        let rows = stmt
            .query_map([], company_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    } else {
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.shortname
             FROM companies c
             JOIN company_users cu ON cu.companyid = c.id
             WHERE cu.userid = ? AND cu.managertype = ?
             ORDER BY c.name, c.id",
        )?;
        let rows = stmt
            .query_map((user_id, MANAGER_TYPE_COMPANY), company_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    Ok(rows)
}
