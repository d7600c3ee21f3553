//! Plate IO enums, options, models and top-level errors.

use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::{Column, DataFrame, PolarsError};
use thiserror::Error;

use crate::conf::{
    C_COL_TIME_HR, C_COL_WELL, C_DELIMITER_DEFAULT, derive_default_instrument_layout,
};
use crate::report::ReportImport;

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Normalized worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank cell.
    None,
    /// Text cell.
    String(String),
    /// Numeric cell (spreadsheet dates and times arrive as day serials).
    Number(f64),
}

/// Dense worksheet grid addressed by absolute `(row, col)`.
pub type TypeCellGrid = Vec<Vec<EnumCellValue>>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region InstrumentLayout

/// Supported plate-reader export families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumInstrument {
    /// BioTek Gen5 kinetic export (`Kinetic read` blocks).
    #[default]
    BioTek,
    /// Tecan i-control export (`Cycle Nr.` blocks closed by `End Time`).
    Tecan,
    /// Molecular Devices SoftMax Pro plate export (`Temperature(°C)` header rows).
    SpectraMax,
}

impl EnumInstrument {
    pub const ALL: [Self; 3] = [Self::BioTek, Self::Tecan, Self::SpectraMax];

    /// Lower-case identifier used by the Python bridge.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BioTek => "biotek",
            Self::Tecan => "tecan",
            Self::SpectraMax => "spectramax",
        }
    }
}

/// Encoding of the elapsed-time column of a measurement block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTimeEncoding {
    /// `HH:MM:SS`, optionally prefixed by a day marker (`Day02 01:00:00`).
    ElapsedClock,
    /// Elapsed seconds as a number.
    ElapsedSeconds,
}

/// Declarative description of one instrument export layout.
///
/// All row offsets are relative to the sentinel row, which is also the header
/// row of the sub-table it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecInstrumentLayout {
    /// Column scanned for sentinel labels.
    pub col_idx_sentinel: usize,
    /// Labels marking a sub-table boundary.
    pub labels_sentinel: Vec<String>,
    /// Distance from the sentinel row up to the measurement-name row.
    pub n_rows_name_offset: usize,
    /// Column holding the measurement name.
    pub col_idx_name: usize,
    /// Rows subtracted from a boundary gap to get the data row count.
    pub n_rows_gap_trim: usize,
    /// Bound the last sub-table by the end of the sheet.
    pub if_append_end_boundary: bool,
    /// Header of the elapsed-time column.
    pub name_col_time: String,
    /// Encoding of the elapsed-time column.
    pub rule_time: EnumTimeEncoding,
    /// Non-well headers excluded from the melt (besides the time column).
    pub names_cols_id: Vec<String>,
    /// Column-0 labels that terminate a sub-table early.
    pub labels_row_stop: Vec<String>,
    /// Drop well columns without any data cell.
    pub if_drop_empty_cols: bool,
    /// Drop well columns whose header contains this character.
    pub char_exclude_well: Option<char>,
}

impl SpecInstrumentLayout {
    /// Preset layout of `instrument`.
    pub fn from_instrument(instrument: EnumInstrument) -> Self {
        derive_default_instrument_layout(instrument)
    }

    /// Whether `value` is one of the sentinel labels.
    pub fn is_sentinel(&self, value: &str) -> bool {
        self.labels_sentinel.iter().any(|c_label| c_label == value)
    }

    /// Whether `value` terminates a sub-table.
    pub fn is_row_stop(&self, value: &str) -> bool {
        self.labels_row_stop.iter().any(|c_label| c_label == value)
    }
}

impl Default for SpecInstrumentLayout {
    fn default() -> Self {
        Self::from_instrument(EnumInstrument::default())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ImportOptions

/// Options for one growth-curve import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecImportOptions {
    /// Instrument preset used when `layout` is `None`.
    pub instrument: EnumInstrument,
    /// Custom layout overriding the instrument preset.
    pub layout: Option<SpecInstrumentLayout>,
    /// Delimiter between descriptor name and concentration in the legend.
    pub delimiter: String,
    /// Legend lists every component concentration in every well.
    pub if_verbose: bool,
    /// Merge all measurements into one table instead of one table per measurement.
    pub if_merged: bool,
}

impl Default for SpecImportOptions {
    fn default() -> Self {
        Self {
            instrument: EnumInstrument::default(),
            layout: None,
            delimiter: C_DELIMITER_DEFAULT.to_string(),
            if_verbose: false,
            if_merged: true,
        }
    }
}

impl SpecImportOptions {
    /// Layout used by the parser for this call.
    pub fn resolve_layout(&self) -> SpecInstrumentLayout {
        self.layout
            .clone()
            .unwrap_or_else(|| SpecInstrumentLayout::from_instrument(self.instrument))
    }
}

/// One independent data + legend import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecImportJob {
    /// Instrument export workbook.
    pub path_data: PathBuf,
    /// Filled-out plate legend template.
    pub path_legend: PathBuf,
    /// Per-job options.
    pub options: SpecImportOptions,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MeasurementModels

/// One tidy `(well, time, value)` observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecMeasurementRow {
    /// Well identifier, e.g. `A4`.
    pub well: String,
    /// Elapsed time in decimal hours.
    pub time_hr: f64,
    /// Measured value.
    pub value: f64,
}

/// One instrument sub-table in long format.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecMeasurementBlock {
    /// Measurement type, e.g. `OD600`.
    pub name: String,
    /// Rows in melt order: well by well, time in source order.
    pub rows: Vec<SpecMeasurementRow>,
}

impl SpecMeasurementBlock {
    /// Number of observations.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Distinct wells in first-seen order.
    pub fn wells(&self) -> Vec<String> {
        let mut l_wells: Vec<String> = Vec::new();
        for row in &self.rows {
            if !l_wells.iter().any(|c_well| *c_well == row.well) {
                l_wells.push(row.well.clone());
            }
        }
        l_wells
    }

    /// Wells whose time series decreases somewhere in source order.
    pub fn derive_wells_time_decreasing(&self) -> Vec<String> {
        let mut dict_last_time: HashMap<&str, f64> = HashMap::new();
        let mut l_wells: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Some(n_time_prev) = dict_last_time.insert(&row.well, row.time_hr)
                && row.time_hr < n_time_prev
                && !l_wells.contains(&row.well)
            {
                l_wells.push(row.well.clone());
            }
        }
        l_wells
    }

    /// Columnar view `Well`, `Time [hr]`, `<name>`.
    pub fn to_table(&self) -> SpecMeasurementTable {
        SpecMeasurementTable {
            wells: self.rows.iter().map(|row| row.well.clone()).collect(),
            times_hr: self.rows.iter().map(|row| row.time_hr).collect(),
            columns: vec![(
                self.name.clone(),
                self.rows.iter().map(|row| row.value).collect(),
            )],
        }
    }

    /// Build a DataFrame `Well`, `Time [hr]`, `<name>`.
    pub fn to_dataframe(&self) -> Result<DataFrame, PlateIoError> {
        self.to_table().to_dataframe()
    }
}

/// Columnar measurement table keyed by `(Well, Time [hr])`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecMeasurementTable {
    /// Well per row.
    pub wells: Vec<String>,
    /// Elapsed hours per row.
    pub times_hr: Vec<f64>,
    /// Measurement columns `(name, values)`, each as long as `wells`.
    pub columns: Vec<(String, Vec<f64>)>,
}

impl SpecMeasurementTable {
    /// Number of rows.
    pub fn height(&self) -> usize {
        self.wells.len()
    }

    /// Measurement values by column name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(c_name, _)| c_name == name)
            .map(|(_, l_values)| l_values.as_slice())
    }

    /// Gather rows by index, keeping column order.
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            wells: indices.iter().map(|idx| self.wells[*idx].clone()).collect(),
            times_hr: indices.iter().map(|idx| self.times_hr[*idx]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(c_name, l_values)| {
                    (
                        c_name.clone(),
                        indices.iter().map(|idx| l_values[*idx]).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Build a DataFrame `Well`, `Time [hr]`, measurements...
    pub fn to_dataframe(&self) -> Result<DataFrame, PlateIoError> {
        Ok(DataFrame::new(self.to_columns())?)
    }

    pub(crate) fn to_columns(&self) -> Vec<Column> {
        let mut l_columns = Vec::with_capacity(self.columns.len() + 2);
        l_columns.push(Column::new(C_COL_WELL.into(), self.wells.clone()));
        l_columns.push(Column::new(C_COL_TIME_HR.into(), self.times_hr.clone()));
        for (c_name, l_values) in &self.columns {
            l_columns.push(Column::new(c_name.as_str().into(), l_values.clone()));
        }
        l_columns
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LegendModels

/// Values of one legend column, one entry per legend well.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumLegendValues {
    /// Categorical descriptor values.
    Text(Vec<Option<String>>),
    /// Numeric concentrations.
    Number(Vec<Option<f64>>),
}

impl EnumLegendValues {
    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(l_values) => l_values.len(),
            Self::Number(l_values) => l_values.len(),
        }
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather entries by row index.
    pub fn take(&self, indices: &[usize]) -> Self {
        match self {
            Self::Text(l_values) => {
                Self::Text(indices.iter().map(|idx| l_values[*idx].clone()).collect())
            }
            Self::Number(l_values) => {
                Self::Number(indices.iter().map(|idx| l_values[*idx]).collect())
            }
        }
    }

    fn to_column(&self, name: &str) -> Column {
        match self {
            Self::Text(l_values) => Column::new(name.into(), l_values.clone()),
            Self::Number(l_values) => Column::new(name.into(), l_values.clone()),
        }
    }
}

/// Named legend column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecLegendColumn {
    /// Output column name.
    pub name: String,
    /// Column values aligned with [`SpecConditionLegend::wells`].
    pub values: EnumLegendValues,
}

/// Per-well condition annotations keyed by well identifier.
///
/// Columns are dynamic: every template label becomes a column, and the two
/// compound descriptors are expanded into their derived columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecConditionLegend {
    /// Wells in plate order (row letter, then column number).
    pub wells: Vec<String>,
    /// Columns in output order.
    pub columns: Vec<SpecLegendColumn>,
}

impl SpecConditionLegend {
    /// Number of wells.
    pub fn height(&self) -> usize {
        self.wells.len()
    }

    /// Column names in output order (without `Well`).
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&SpecLegendColumn> {
        self.columns.iter().find(|col| col.name == name)
    }

    /// Row index of `well`.
    pub fn position_of_well(&self, well: &str) -> Option<usize> {
        self.wells.iter().position(|c_well| c_well == well)
    }

    /// Text value at (`well`, `name`).
    pub fn text(&self, well: &str, name: &str) -> Option<&str> {
        let n_idx = self.position_of_well(well)?;
        match &self.column(name)?.values {
            EnumLegendValues::Text(l_values) => l_values[n_idx].as_deref(),
            EnumLegendValues::Number(_) => None,
        }
    }

    /// Numeric value at (`well`, `name`).
    pub fn number(&self, well: &str, name: &str) -> Option<f64> {
        let n_idx = self.position_of_well(well)?;
        match &self.column(name)?.values {
            EnumLegendValues::Number(l_values) => l_values[n_idx],
            EnumLegendValues::Text(_) => None,
        }
    }

    /// Build a DataFrame `Well`, columns...
    pub fn to_dataframe(&self) -> Result<DataFrame, PlateIoError> {
        let mut l_columns = Vec::with_capacity(self.columns.len() + 1);
        l_columns.push(Column::new(C_COL_WELL.into(), self.wells.clone()));
        for col in &self.columns {
            l_columns.push(col.values.to_column(&col.name));
        }
        Ok(DataFrame::new(l_columns)?)
    }

    pub(crate) fn gather_columns(&self, indices: &[usize]) -> Vec<Column> {
        self.columns
            .iter()
            .map(|col| col.values.take(indices).to_column(&col.name))
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ImportResults

/// Table tagged with the measurement it was built from.
#[derive(Debug, Clone)]
pub struct SpecNamedTable {
    /// Measurement name.
    pub name: String,
    /// Legend-joined table.
    pub df: DataFrame,
}

/// Normalized output of one import call.
#[derive(Debug, Clone)]
pub enum EnumGrowthCurveTables {
    /// All measurements merged on `(Well, Time [hr])`, joined to the legend.
    Merged(DataFrame),
    /// One legend-joined table per measurement, in block order.
    PerMeasurement(Vec<SpecNamedTable>),
}

/// Tables plus the report of one import call.
#[derive(Debug, Clone)]
pub struct SpecGrowthCurveImport {
    /// Normalized tables.
    pub tables: EnumGrowthCurveTables,
    /// Counters and warnings.
    pub report: ReportImport,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// "Import call failed" errors.
#[derive(Debug, Error)]
pub enum PlateIoError {
    /// Malformed time text, descriptor concentration, or verbose legend entry.
    #[error("{0}")]
    Format(String),
    /// Workbook could not be opened or decoded.
    #[error("Failed to open workbook {}: {message}", path.display())]
    WorkbookOpen {
        /// Workbook path.
        path: PathBuf,
        /// Underlying reader error text.
        message: String,
    },
    /// Workbook has no worksheet to read.
    #[error("Workbook has no worksheet: {}", .0.display())]
    SheetMissing(PathBuf),
    /// Legend template does not follow the plate template layout.
    #[error("{0}")]
    LegendLayout(String),
    /// Measurement sub-table lacks its time column.
    #[error("Measurement block {block:?} has no {column:?} column.")]
    MissingColumn {
        /// Measurement name of the block.
        block: String,
        /// Missing header.
        column: String,
    },
    /// Two measurement blocks carry the same name in a merged import.
    #[error("Duplicate measurement name in merged import: {0:?}")]
    DuplicateMeasurement(String),
    /// DataFrame assembly or serialization failed.
    #[error("Failed to build table: {0}")]
    Table(String),
}

impl From<PolarsError> for PlateIoError {
    fn from(err: PolarsError) -> Self {
        Self::Table(err.to_string())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
