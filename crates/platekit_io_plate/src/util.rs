//! Stateless helper utilities shared by the legend loader, parser and importer.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use polars::prelude::{DataFrame, IpcReader, IpcWriter, SerReader, SerWriter};

use crate::spec::{EnumCellValue, PlateIoError, TypeCellGrid};

////////////////////////////////////////////////////////////////////////////////
// #region WorkbookLoading

/// Load the first worksheet of `path` as a dense grid in absolute coordinates.
///
/// Header rows are not interpreted; row `0` is spreadsheet row `1`.
pub fn load_sheet_grid<P: AsRef<Path>>(path: P) -> Result<TypeCellGrid, PlateIoError> {
    let path_file = path.as_ref();
    let mut workbook =
        open_workbook_auto(path_file).map_err(|err| PlateIoError::WorkbookOpen {
            path: path_file.to_path_buf(),
            message: err.to_string(),
        })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PlateIoError::SheetMissing(path_file.to_path_buf()))?
        .map_err(|err| PlateIoError::WorkbookOpen {
            path: path_file.to_path_buf(),
            message: err.to_string(),
        })?;

    let grid = derive_grid_from_range(&range);
    log::debug!(
        "Loaded {} rows x {} cols from {}",
        grid.len(),
        grid.first().map_or(0, Vec::len),
        path_file.display()
    );
    Ok(grid)
}

/// Pad a calamine range (which starts at its first used cell) back to `A1`.
pub fn derive_grid_from_range(range: &Range<Data>) -> TypeCellGrid {
    let Some((n_row_start, n_col_start)) = range.start() else {
        return vec![];
    };
    let n_row_start = n_row_start as usize;
    let n_col_start = n_col_start as usize;
    let n_width_abs = n_col_start + range.width();

    let mut grid = vec![vec![EnumCellValue::None; n_width_abs]; n_row_start];
    grid.reserve(range.height());
    for row in range.rows() {
        let mut l_row = vec![EnumCellValue::None; n_col_start];
        l_row.extend(row.iter().map(convert_data_to_cell_value));
        grid.push(l_row);
    }
    grid
}

/// Normalize a calamine cell.
pub fn convert_data_to_cell_value(data: &Data) -> EnumCellValue {
    match data {
        Data::Int(n) => EnumCellValue::Number(*n as f64),
        Data::Float(n) => EnumCellValue::Number(*n),
        Data::String(s) => EnumCellValue::String(s.clone()),
        Data::Bool(b) => EnumCellValue::String(b.to_string()),
        Data::DateTime(dt) => EnumCellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => EnumCellValue::String(s.clone()),
        _ => EnumCellValue::None,
    }
}

static CELL_MISSING: EnumCellValue = EnumCellValue::None;

/// Cell at (`row`, `col`), treating out-of-bounds as missing.
pub fn get_cell(grid: &[Vec<EnumCellValue>], row: usize, col: usize) -> &EnumCellValue {
    grid.get(row)
        .and_then(|l_row| l_row.get(col))
        .unwrap_or(&CELL_MISSING)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Render a cell as trimmed text; blank text counts as missing.
///
/// Integral numbers render without a fraction (`5.0` -> `"5"`), the way a
/// spreadsheet displays them.
pub fn derive_cell_text(value: &EnumCellValue) -> Option<String> {
    match value {
        EnumCellValue::None => None,
        EnumCellValue::String(s) => {
            let c_text = s.trim();
            if c_text.is_empty() {
                None
            } else {
                Some(c_text.to_string())
            }
        }
        EnumCellValue::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                Some(format!("{}", *n as i64))
            } else {
                Some(n.to_string())
            }
        }
    }
}

/// Coerce a cell to a finite number; anything else is missing.
pub fn derive_cell_number(value: &EnumCellValue) -> Option<f64> {
    let n_value = match value {
        EnumCellValue::Number(n) => *n,
        EnumCellValue::String(s) => s.trim().parse::<f64>().ok()?,
        EnumCellValue::None => return None,
    };
    n_value.is_finite().then_some(n_value)
}

/// Whether every cell of `row` is missing.
pub fn is_row_empty(row: &[EnumCellValue]) -> bool {
    row.iter().all(|value| derive_cell_text(value).is_none())
}

/// Round the exact binary value of `x` to `n_digits` decimals (ties to even).
///
/// Goes through decimal formatting, so a value stored just below a `.0005`
/// tie rounds down.
pub fn round_to_digits(x: f64, n_digits: i32) -> f64 {
    let c_text = format!("{:.*}", n_digits.max(0) as usize, x);
    c_text.parse::<f64>().unwrap_or(x)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WellIdentifiers

/// Sort key placing wells in plate order: row letters, then numeric column.
pub fn derive_well_sort_key(well: &str) -> (String, u32, String) {
    let n_idx_digits = well
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(well.len());
    let (c_row, c_col) = well.split_at(n_idx_digits);
    match c_col.parse::<u32>() {
        Ok(n_col) => (c_row.to_string(), n_col, String::new()),
        Err(_) => (c_row.to_string(), u32::MAX, c_col.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableTransport

/// Serialize `df` as Polars IPC bytes.
pub fn derive_ipc_bytes_from_dataframe(df: &mut DataFrame) -> Result<Vec<u8>, PlateIoError> {
    let mut v_buf: Vec<u8> = Vec::new();
    IpcWriter::new(&mut v_buf).finish(df)?;
    Ok(v_buf)
}

/// Deserialize Polars IPC bytes.
pub fn derive_dataframe_from_ipc_bytes(v_ipc: &[u8]) -> Result<DataFrame, PlateIoError> {
    Ok(IpcReader::new(Cursor::new(v_ipc)).finish()?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workers

/// Clamp requested worker count to available CPUs (default at most 8).
pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
