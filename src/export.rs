use crate::table::{Cell, ReportTable};
use anyhow::Context;
use html_escape::encode_text;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "excel" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub rows_exported: usize,
    pub sha256: String,
}

pub fn write_export(
    table: &ReportTable,
    format: ExportFormat,
    csv_delimiter: u8,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }
    match format {
        ExportFormat::Csv => write_csv(table, csv_delimiter, out_path)?,
        ExportFormat::Xlsx => write_xlsx(table, out_path)?,
    }
    Ok(ExportSummary {
        rows_exported: table.rows.len(),
        sha256: sha256_file(out_path)?,
    })
}

pub fn write_csv(table: &ReportTable, delimiter: u8, out_path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    writer
        .write_record(&table.columns)
        .context("failed to write csv header")?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(Cell::as_text))
            .context("failed to write csv row")?;
    }
    writer.flush().context("failed to flush csv")?;
    Ok(())
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

/// Excel limits sheet names to 31 characters and forbids `[]:*?/\`.
pub fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Report".to_string()
    } else {
        cleaned
    }
}

// A1-style column letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

// XML 1.0 forbids C0 controls other than tab, LF and CR; SpreadsheetML
// carries them as `_xHHHH_` escapes.
fn sheet_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r') {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            out.push(c);
        }
    }
    encode_text(&out).into_owned()
}

fn sheet_cell_xml(col: usize, row: usize, cell: &Cell) -> String {
    let r = format!("{}{}", column_letters(col), row);
    match cell {
        Cell::Int(n) => format!("<c r=\"{r}\"><v>{n}</v></c>"),
        Cell::Text(s) => format!(
            "<c r=\"{r}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            sheet_text(s)
        ),
    }
}

fn worksheet_xml(table: &ReportTable) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    let header: Vec<Cell> = table.columns.iter().map(|c| Cell::Text(c.clone())).collect();
    for (i, row) in std::iter::once(&header).chain(table.rows.iter()).enumerate() {
        let row_no = i + 1;
        xml.push_str(&format!("<row r=\"{row_no}\">"));
        for (col, cell) in row.iter().enumerate() {
            xml.push_str(&sheet_cell_xml(col, row_no, cell));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn workbook_xml(sheet: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>",
        html_escape::encode_double_quoted_attribute(sheet)
    )
}

pub fn write_xlsx(table: &ReportTable, out_path: &Path) -> anyhow::Result<()> {
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml(&sheet_name(&table.title))),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/worksheets/sheet1.xml", worksheet_xml(table)),
    ];
    for (name, body) in entries {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {name}"))?;
    }
    zip.finish().context("failed to finalize workbook")?;
    Ok(())
}

pub fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = f.read(&mut buf).context("failed to read export")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}
