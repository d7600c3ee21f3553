//! Shared fixtures for unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;

use crate::spec::{EnumCellValue, TypeCellGrid};

static N_TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

pub(crate) struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub(crate) fn new() -> Self {
        let n = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let n_seq = N_TEST_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("platekit_plate_test_{n}_{n_seq}"));
        std::fs::create_dir_all(&path).expect("create test dir");
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Fixture cell: `""` is blank, numeric text becomes a number.
fn derive_fixture_cell(txt: &str) -> EnumCellValue {
    if txt.is_empty() {
        EnumCellValue::None
    } else if let Ok(n) = txt.parse::<f64>() {
        EnumCellValue::Number(n)
    } else {
        EnumCellValue::String(txt.to_string())
    }
}

pub(crate) fn derive_grid(rows: &[Vec<&str>]) -> TypeCellGrid {
    rows.iter()
        .map(|row| row.iter().map(|txt| derive_fixture_cell(txt)).collect())
        .collect()
}

pub(crate) fn write_fixture_workbook(path: &Path, rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (n_row, row) in rows.iter().enumerate() {
        for (n_col, txt) in row.iter().enumerate() {
            match derive_fixture_cell(txt) {
                EnumCellValue::None => {}
                EnumCellValue::Number(n) => {
                    worksheet
                        .write_number(n_row as u32, n_col as u16, n)
                        .expect("write number");
                }
                EnumCellValue::String(s) => {
                    worksheet
                        .write_string(n_row as u32, n_col as u16, s.as_str())
                        .expect("write string");
                }
            }
        }
    }
    workbook.save(path).expect("save workbook");
}

/// 8-row plate template: each label gets rows `A..=H`, label text on row `A` only.
pub(crate) fn derive_template_rows(
    n_width: usize,
    labels: &[(&str, &[(&str, usize, &str)])],
) -> Vec<Vec<String>> {
    let mut l_rows: Vec<Vec<String>> = Vec::new();
    let mut l_header = vec!["variable".to_string(), "row".to_string()];
    l_header.extend((1..=n_width).map(|n_col| n_col.to_string()));
    l_rows.push(l_header);

    for (c_label, l_entries) in labels {
        for (n_row, c_row) in ["A", "B", "C", "D", "E", "F", "G", "H"].iter().enumerate() {
            let mut l_row = vec![String::new(); n_width + 2];
            if n_row == 0 {
                l_row[0] = c_label.to_string();
            }
            l_row[1] = c_row.to_string();
            for (c_row_entry, n_col, c_value) in l_entries.iter() {
                if c_row_entry == c_row {
                    l_row[n_col + 1] = c_value.to_string();
                }
            }
            l_rows.push(l_row);
        }
    }
    l_rows
}

pub(crate) fn borrow_rows(rows: &[Vec<String>]) -> Vec<Vec<&str>> {
    rows.iter()
        .map(|row| row.iter().map(String::as_str).collect())
        .collect()
}
