use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl Cell {
    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Int(n)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

/// Tabular form shared by the HTML page and the CSV/XLSX exports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }
}

pub fn render_html(table: &ReportTable, generated_at: Option<&str>) -> String {
    use html_escape::encode_text;

    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", encode_text(&table.title)));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h2>{}</h2>\n", encode_text(&table.title)));
    if let Some(ts) = generated_at {
        html.push_str(&format!(
            "<p class=\"generated\">Generated {}</p>\n",
            encode_text(ts)
        ));
    }
    html.push_str("<table class=\"generaltable\">\n<thead>\n<tr>");
    for c in &table.columns {
        html.push_str(&format!("<th>{}</th>", encode_text(c)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");
    if table.rows.is_empty() {
        html.push_str(&format!(
            "<tr><td colspan=\"{}\">Nothing to display</td></tr>\n",
            table.columns.len().max(1)
        ));
    }
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            match cell {
                Cell::Int(n) => html.push_str(&format!("<td class=\"numeric\">{n}</td>")),
                Cell::Text(s) => html.push_str(&format!("<td>{}</td>", encode_text(s))),
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}
