//! Excel grade sheets.
//!
//! Only the first worksheet is read. The header row is located by column
//! names, so title rows above it are tolerated. Required columns are
//! `student_id`, `subject`, `units`, and `grade`; `name` and `description`
//! are picked up when present.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use scholarship_core::grades::{group_by_student, StudentGrades, SubjectGrade};

use crate::error::ExtractionError;

/// Rows scanned when looking for the header.
const HEADER_SCAN_ROWS: usize = 20;

/// Students found in the sheet plus one message per rejected row.
#[derive(Debug, Default)]
pub struct SheetGrades {
    pub students: Vec<StudentGrades>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    student_id: usize,
    subject: usize,
    units: usize,
    grade: usize,
    name: Option<usize>,
    description: Option<usize>,
}

/// Read grades from the first worksheet of an xlsx/xls workbook.
pub fn read_workbook(bytes: &[u8]) -> Result<SheetGrades, ExtractionError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExtractionError::Spreadsheet("workbook has no worksheets".to_string()))??;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    parse_rows(&rows)
}

/// Parse a sheet already flattened to text cells.
pub fn parse_rows(rows: &[Vec<String>]) -> Result<SheetGrades, ExtractionError> {
    let (header_index, columns) = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .enumerate()
        .find_map(|(i, row)| find_columns(row).map(|c| (i, c)))
        .ok_or_else(|| {
            ExtractionError::Parse(
                "header row with student_id, subject, units, grade not found".to_string(),
            )
        })?;

    let mut names: HashMap<String, String> = HashMap::new();
    let mut parsed = Vec::new();
    let mut skipped = Vec::new();

    for (offset, row) in rows.iter().enumerate().skip(header_index + 1) {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        // Spreadsheet row numbers are 1-based.
        let line = offset + 1;
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");

        let student_id = cell(columns.student_id);
        if student_id.is_empty() {
            skipped.push(format!("Row {line}: missing student_id"));
            continue;
        }
        let units: f64 = match cell(columns.units).parse() {
            Ok(units) => units,
            Err(_) => {
                skipped.push(format!("Row {line}: invalid units '{}'", cell(columns.units)));
                continue;
            }
        };
        let description = columns
            .description
            .map(cell)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        match SubjectGrade::new(cell(columns.subject), description, units, cell(columns.grade)) {
            Ok(subject) => {
                if let Some(name) = columns.name.map(cell).filter(|n| !n.is_empty()) {
                    names
                        .entry(student_id.to_string())
                        .or_insert_with(|| name.to_string());
                }
                parsed.push((student_id.to_string(), subject));
            }
            Err(reason) => skipped.push(format!("Row {line}: {reason}")),
        }
    }

    if parsed.is_empty() {
        return Err(ExtractionError::Parse("no grade rows found".to_string()));
    }

    let mut students = group_by_student(parsed);
    for student in &mut students {
        if let Some(id) = &student.student_id {
            student.student_name = names.remove(id);
        }
    }
    Ok(SheetGrades { students, skipped })
}

fn find_columns(row: &[String]) -> Option<Columns> {
    let mut found: HashMap<&'static str, usize> = HashMap::new();
    for (i, cell) in row.iter().enumerate() {
        if let Some(key) = header_key(cell) {
            found.entry(key).or_insert(i);
        }
    }
    Some(Columns {
        student_id: *found.get("student_id")?,
        subject: *found.get("subject")?,
        units: *found.get("units")?,
        grade: *found.get("grade")?,
        name: found.get("name").copied(),
        description: found.get("description").copied(),
    })
}

fn header_key(cell: &str) -> Option<&'static str> {
    let normalized: String = cell
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' || c == '.' { '_' } else { c })
        .collect();
    match normalized.trim_matches('_') {
        "student_id" | "student_no" | "student_number" | "studentid" => Some("student_id"),
        "subject" | "subject_code" | "course_code" | "code" => Some("subject"),
        "units" | "unit" | "credits" | "credit_units" => Some("units"),
        "grade" | "final_grade" | "rating" => Some("grade"),
        "name" | "student_name" => Some("name"),
        "description" | "subject_description" | "descriptive_title" | "title" => {
            Some("description")
        }
        _ => None,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Whole numbers (IDs typed as numbers, "1" grades) drop the ".0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::archive::tests::build_zip;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn finds_header_below_title_rows() {
        let sheet = rows(&[
            &["Grade Sheet", "", "", ""],
            &["", "", "", ""],
            &["Student ID", "Name", "Subject", "Descriptive Title", "Units", "Final Grade"],
            &["2021-0001", "Dela Cruz, Juan", "CS101", "Intro", "3", "1.25"],
            &["2021-0001", "", "MATH101", "", "3", "1.75"],
            &["2021-0002", "Santos, Ana", "CS101", "Intro", "3", "INC"],
        ]);
        let result = parse_rows(&sheet).unwrap();

        assert!(result.skipped.is_empty());
        assert_eq!(result.students.len(), 2);
        let first = &result.students[0];
        assert_eq!(first.student_id.as_deref(), Some("2021-0001"));
        assert_eq!(first.student_name.as_deref(), Some("Dela Cruz, Juan"));
        assert_eq!(first.subjects[0].description.as_deref(), Some("Intro"));
        assert_eq!(first.subjects[1].description, None);
        assert_eq!(first.gwa, Some(1.5));
        assert!(!first.has_failing_grade);
        assert!(result.students[1].has_failing_grade);
        assert_eq!(result.students[1].gwa, None);
    }

    #[test]
    fn bad_rows_are_skipped_with_reasons() {
        let sheet = rows(&[
            &["student_id", "subject", "units", "grade"],
            &["2021-0001", "CS101", "3", "1.0"],
            &["", "CS102", "3", "1.0"],
            &["2021-0001", "CS103", "three", "1.0"],
            &["2021-0001", "CS104", "3", "9.9"],
            &["", "", "", ""],
        ]);
        let result = parse_rows(&sheet).unwrap();

        assert_eq!(result.students.len(), 1);
        assert_eq!(result.students[0].subjects.len(), 1);
        assert_eq!(
            result.skipped,
            vec![
                "Row 3: missing student_id".to_string(),
                "Row 4: invalid units 'three'".to_string(),
                "Row 5: Unrecognized grade '9.9'".to_string(),
            ]
        );
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let sheet = rows(&[&["id", "course", "grade"], &["1", "CS101", "1.0"]]);
        assert_matches!(parse_rows(&sheet), Err(ExtractionError::Parse(_)));
    }

    #[test]
    fn header_without_rows_is_a_parse_error() {
        let sheet = rows(&[&["student_id", "subject", "units", "grade"]]);
        assert_matches!(parse_rows(&sheet), Err(ExtractionError::Parse(_)));
    }

    #[test]
    fn numeric_cells_render_without_trailing_zero() {
        assert_eq!(cell_text(&Data::Float(20210001.0)), "20210001");
        assert_eq!(cell_text(&Data::Float(1.75)), "1.75");
        assert_eq!(cell_text(&Data::Int(3)), "3");
        assert_eq!(cell_text(&Data::String("  INC ".into())), "INC");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    fn inline_cell(col: char, row: usize, value: &str) -> String {
        format!(r#"<c r="{col}{row}" t="inlineStr"><is><t>{value}</t></is></c>"#)
    }

    fn minimal_xlsx(sheet_rows: &[&[&str]]) -> Vec<u8> {
        let mut sheet_data = String::new();
        for (r, cells) in sheet_rows.iter().enumerate() {
            sheet_data.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in cells.iter().enumerate() {
                sheet_data.push_str(&inline_cell((b'A' + c as u8) as char, r + 1, value));
            }
            sheet_data.push_str("</row>");
        }
        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
        );
        let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;
        let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
        let workbook = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Grades" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;
        let workbook_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;
        build_zip(&[
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", root_rels.as_bytes()),
            ("xl/workbook.xml", workbook.as_bytes()),
            ("xl/_rels/workbook.xml.rels", workbook_rels.as_bytes()),
            ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
        ])
    }

    #[test]
    fn reads_first_worksheet_of_xlsx() {
        let xlsx = minimal_xlsx(&[
            &["student_id", "subject", "units", "grade"],
            &["2021-0001", "CS101", "3", "2.00"],
            &["2021-0001", "CS102", "2", "5.00"],
        ]);
        let result = read_workbook(&xlsx).unwrap();

        assert_eq!(result.students.len(), 1);
        assert_eq!(result.students[0].total_units, 5.0);
        assert!(result.students[0].has_failing_grade);
    }

    #[test]
    fn non_workbook_bytes_are_rejected() {
        assert!(read_workbook(b"plain text").is_err());
    }
}
