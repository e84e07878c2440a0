use crate::access::{require_company_manager, CompanySummary};
use crate::error::ReportError;
use crate::grade::{classify_grade_level, GradeLevel};
use crate::table::ReportTable;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

// A student is a company user who is neither a manager nor an educator.
const STUDENT_FILTER: &str = "cu.managertype = 0 AND cu.educator = 0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    SchoolOverview,
    CohortGradeLevels,
    GradeLevelSummary,
    CourseEnrolments,
    StudentRoster,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "schoolOverview" => Some(Self::SchoolOverview),
            "cohortGradeLevels" => Some(Self::CohortGradeLevels),
            "gradeLevelSummary" => Some(Self::GradeLevelSummary),
            "courseEnrolments" => Some(Self::CourseEnrolments),
            "studentRoster" => Some(Self::StudentRoster),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchoolOverview => "schoolOverview",
            Self::CohortGradeLevels => "cohortGradeLevels",
            Self::GradeLevelSummary => "gradeLevelSummary",
            Self::CourseEnrolments => "courseEnrolments",
            Self::StudentRoster => "studentRoster",
        }
    }

    /// Used in export file names.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::SchoolOverview => "school_overview",
            Self::CohortGradeLevels => "cohort_grade_levels",
            Self::GradeLevelSummary => "grade_level_summary",
            Self::CourseEnrolments => "course_enrolments",
            Self::StudentRoster => "student_roster",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CohortListOptions {
    pub grade_level: Option<GradeLevel>,
    pub include_empty: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolOverview {
    pub company: CompanySummary,
    pub students: i64,
    pub teachers: i64,
    pub managers: i64,
    pub courses: i64,
    pub cohorts: i64,
    pub active_enrolments: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortGradeRow {
    pub cohort_id: i64,
    pub name: String,
    pub idnumber: String,
    pub visible: bool,
    pub grade_level: GradeLevel,
    pub member_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLevelSummaryRow {
    pub grade_level: GradeLevel,
    pub cohort_count: usize,
    pub student_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEnrolmentRow {
    pub course_id: i64,
    pub shortname: String,
    pub fullname: String,
    pub enrolled: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub user_id: i64,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub cohort_id: Option<i64>,
    pub cohort_name: String,
    pub grade_level: GradeLevel,
}

fn count(conn: &Connection, sql: &str, company_id: i64) -> Result<i64, ReportError> {
    Ok(conn.query_row(sql, [company_id], |r| r.get(0))?)
}

pub fn school_overview(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<SchoolOverview, ReportError> {
    let company = require_company_manager(conn, user_id, company_id)?;

    let students = count(
        conn,
        &format!(
            "SELECT COUNT(*) FROM company_users cu
             JOIN users u ON u.id = cu.userid
             WHERE cu.companyid = ? AND u.deleted = 0 AND {STUDENT_FILTER}"
        ),
        company_id,
    )?;
    let teachers = count(
        conn,
        "SELECT COUNT(*) FROM company_users cu
         JOIN users u ON u.id = cu.userid
         WHERE cu.companyid = ? AND u.deleted = 0 AND cu.educator = 1",
        company_id,
    )?;
    let managers = count(
        conn,
        "SELECT COUNT(*) FROM company_users cu
         JOIN users u ON u.id = cu.userid
         WHERE cu.companyid = ? AND u.deleted = 0 AND cu.managertype > 0",
        company_id,
    )?;
    let courses = count(
        conn,
        "SELECT COUNT(*) FROM company_courses WHERE companyid = ?",
        company_id,
    )?;
    let cohorts = count(
        conn,
        "SELECT COUNT(*) FROM cohorts WHERE companyid = ?",
        company_id,
    )?;
    let active_enrolments = count(
        conn,
        "SELECT COUNT(*) FROM user_enrolments ue
         JOIN company_courses cc ON cc.courseid = ue.courseid
         JOIN company_users cu ON cu.userid = ue.userid AND cu.companyid = cc.companyid
         JOIN users u ON u.id = ue.userid
         WHERE cc.companyid = ? AND ue.status = 0 AND u.deleted = 0",
        company_id,
    )?;

    Ok(SchoolOverview {
        company,
        students,
        teachers,
        managers,
        courses,
        cohorts,
        active_enrolments,
    })
}

fn load_cohorts(conn: &Connection, company_id: i64) -> Result<Vec<CohortGradeRow>, ReportError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.idnumber, c.visible, COUNT(u.id)
         FROM cohorts c
         LEFT JOIN cohort_members cm ON cm.cohortid = c.id
         LEFT JOIN users u ON u.id = cm.userid AND u.deleted = 0
         WHERE c.companyid = ?
         GROUP BY c.id
         ORDER BY c.name, c.id",
    )?;
    let rows = stmt
        .query_map([company_id], |r| {
            let name: String = r.get(1)?;
            let visible: i64 = r.get(3)?;
            Ok(CohortGradeRow {
                cohort_id: r.get(0)?,
                grade_level: classify_grade_level(&name),
                name,
                idnumber: r.get(2)?,
                visible: visible != 0,
                member_count: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn cohort_grade_levels(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
    opts: &CohortListOptions,
) -> Result<Vec<CohortGradeRow>, ReportError> {
    require_company_manager(conn, user_id, company_id)?;
    let rows = load_cohorts(conn, company_id)?
        .into_iter()
        .filter(|c| opts.grade_level.map_or(true, |g| c.grade_level == g))
        .filter(|c| opts.include_empty || c.member_count > 0)
        .collect();
    Ok(rows)
}

pub fn grade_level_summary(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<Vec<GradeLevelSummaryRow>, ReportError> {
    require_company_manager(conn, user_id, company_id)?;
    let cohorts = load_cohorts(conn, company_id)?;

    let mut stmt = conn.prepare(
        "SELECT cm.cohortid, cm.userid
         FROM cohort_members cm
         JOIN cohorts c ON c.id = cm.cohortid
         JOIN users u ON u.id = cm.userid
         WHERE c.companyid = ? AND u.deleted = 0",
    )?;
    let memberships = stmt
        .query_map([company_id], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    // BTreeMap keeps levels in canonical GradeLevel order.
    let level_of: BTreeMap<i64, GradeLevel> =
        cohorts.iter().map(|c| (c.cohort_id, c.grade_level)).collect();
    let mut by_level: BTreeMap<GradeLevel, (usize, HashSet<i64>)> = BTreeMap::new();
    for c in &cohorts {
        by_level.entry(c.grade_level).or_default().0 += 1;
    }
    for (cohort_id, member_id) in memberships {
        if let Some(level) = level_of.get(&cohort_id) {
            by_level.entry(*level).or_default().1.insert(member_id);
        }
    }

    Ok(by_level
        .into_iter()
        .map(|(grade_level, (cohort_count, students))| GradeLevelSummaryRow {
            grade_level,
            cohort_count,
            student_count: students.len(),
        })
        .collect())
}

pub fn course_enrolments(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<Vec<CourseEnrolmentRow>, ReportError> {
    require_company_manager(conn, user_id, company_id)?;
    // Only enrolments of non-deleted users belonging to this company count.
    let mut stmt = conn.prepare(
        "SELECT co.id, co.shortname, co.fullname,
                COUNT(CASE WHEN u.id IS NOT NULL AND ue.status = 0 THEN 1 END),
                COUNT(CASE WHEN u.id IS NOT NULL AND ue.timecompleted IS NOT NULL THEN 1 END)
         FROM company_courses cc
         JOIN courses co ON co.id = cc.courseid
         LEFT JOIN user_enrolments ue ON ue.courseid = co.id
         LEFT JOIN users u ON u.id = ue.userid AND u.deleted = 0
              AND EXISTS (
                  SELECT 1 FROM company_users cu
                  WHERE cu.userid = u.id AND cu.companyid = cc.companyid
              )
         WHERE cc.companyid = ?
         GROUP BY co.id
         ORDER BY co.fullname, co.id",
    )?;
    let rows = stmt
        .query_map([company_id], |r| {
            Ok(CourseEnrolmentRow {
                course_id: r.get(0)?,
                shortname: r.get(1)?,
                fullname: r.get(2)?,
                enrolled: r.get(3)?,
                completed: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn student_roster(
    conn: &Connection,
    user_id: i64,
    company_id: i64,
) -> Result<Vec<RosterRow>, ReportError> {
    require_company_manager(conn, user_id, company_id)?;
    let sql = format!(
        "SELECT u.id, u.username, u.firstname, u.lastname, u.email, c.id, c.name
         FROM company_users cu
         JOIN users u ON u.id = cu.userid
         LEFT JOIN cohort_members cm ON cm.userid = u.id
              AND cm.cohortid IN (SELECT id FROM cohorts WHERE companyid = cu.companyid)
         LEFT JOIN cohorts c ON c.id = cm.cohortid
         WHERE cu.companyid = ? AND u.deleted = 0 AND {STUDENT_FILTER}
         ORDER BY u.lastname, u.firstname, u.id, c.name, c.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([company_id], |r| {
            let cohort_name: Option<String> = r.get(6)?;
            let cohort_name = cohort_name.unwrap_or_default();
            Ok(RosterRow {
                user_id: r.get(0)?,
                username: r.get(1)?,
                firstname: r.get(2)?,
                lastname: r.get(3)?,
                email: r.get(4)?,
                cohort_id: r.get(5)?,
                grade_level: classify_grade_level(&cohort_name),
                cohort_name,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Runs `kind` (including its access check) and flattens it for rendering.
pub fn build_table(
    conn: &Connection,
    kind: ReportKind,
    user_id: i64,
    company_id: i64,
    opts: &CohortListOptions,
) -> Result<ReportTable, ReportError> {
    match kind {
        ReportKind::SchoolOverview => {
            let o = school_overview(conn, user_id, company_id)?;
            let mut t = ReportTable::new(
                format!("School overview: {}", o.company.name),
                &["Metric", "Count"],
            );
            for (metric, value) in [
                ("Students", o.students),
                ("Teachers", o.teachers),
                ("Managers", o.managers),
                ("Courses", o.courses),
                ("Cohorts", o.cohorts),
                ("Active enrolments", o.active_enrolments),
            ] {
                t.push_row(vec![metric.into(), value.into()]);
            }
            Ok(t)
        }
        ReportKind::CohortGradeLevels => {
            let rows = cohort_grade_levels(conn, user_id, company_id, opts)?;
            let mut t = ReportTable::new(
                "Cohort grade levels",
                &["Cohort", "ID number", "Grade level", "Members", "Visible"],
            );
            for r in rows {
                t.push_row(vec![
                    r.name.into(),
                    r.idnumber.into(),
                    r.grade_level.label().into(),
                    r.member_count.into(),
                    if r.visible { "Yes" } else { "No" }.into(),
                ]);
            }
            Ok(t)
        }
        ReportKind::GradeLevelSummary => {
            let rows = grade_level_summary(conn, user_id, company_id)?;
            let mut t =
                ReportTable::new("Grade level summary", &["Grade level", "Cohorts", "Students"]);
            for r in rows {
                t.push_row(vec![
                    r.grade_level.label().into(),
                    r.cohort_count.into(),
                    r.student_count.into(),
                ]);
            }
            Ok(t)
        }
        ReportKind::CourseEnrolments => {
            let rows = course_enrolments(conn, user_id, company_id)?;
            let mut t = ReportTable::new(
                "Course enrolments",
                &["Short name", "Course", "Enrolled", "Completed"],
            );
            for r in rows {
                t.push_row(vec![
                    r.shortname.into(),
                    r.fullname.into(),
                    r.enrolled.into(),
                    r.completed.into(),
                ]);
            }
            Ok(t)
        }
        ReportKind::StudentRoster => {
            let rows = student_roster(conn, user_id, company_id)?;
            let mut t = ReportTable::new(
                "Student roster",
                &[
                    "Username",
                    "First name",
                    "Last name",
                    "Email",
                    "Cohort",
                    "Grade level",
                ],
            );
            for r in rows {
                t.push_row(vec![
                    r.username.into(),
                    r.firstname.into(),
                    r.lastname.into(),
                    r.email.into(),
                    r.cohort_name.into(),
                    r.grade_level.label().into(),
                ]);
            }
            Ok(t)
        }
    }
}
