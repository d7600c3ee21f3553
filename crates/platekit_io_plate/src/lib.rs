//! `platekit_io_plate` v1:
//! Rust-side plate-reader export ingestion kernel.
//!
//! Architecture mirrors Python `io/plate` modules:
//! - `conf`     : constants and instrument presets
//! - `spec`     : enums/options/models/errors
//! - `report`   : run-time import report
//! - `util`     : workbook loading and shared helper functions
//! - `time`     : elapsed-time normalization
//! - `legend`   : plate legend template loader
//! - `parser`   : instrument export parser
//! - `importer` : legend join and batch orchestration

pub mod conf;
pub mod importer;
pub mod legend;
pub mod parser;
pub mod report;
pub mod spec;
#[cfg(test)]
mod test_util;
pub mod time;
pub mod util;

pub use conf::{derive_default_import_options, derive_default_instrument_layout};
pub use importer::{
    import_growth_curves, import_growth_curves_batch, join_legend, merge_measurement_blocks,
};
pub use legend::{load_condition_legend, parse_condition_legend};
pub use parser::{parse_measurement_blocks, wrangle_growth_curves};
pub use report::{ReportImport, ReportImportBuilder};
pub use spec::{
    EnumCellValue, EnumGrowthCurveTables, EnumInstrument, EnumLegendValues, EnumTimeEncoding,
    PlateIoError, SpecConditionLegend, SpecGrowthCurveImport, SpecImportJob, SpecImportOptions,
    SpecInstrumentLayout, SpecLegendColumn, SpecMeasurementBlock, SpecMeasurementRow,
    SpecMeasurementTable, SpecNamedTable, TypeCellGrid,
};
pub use time::{
    convert_elapsed_clock_to_hours, convert_elapsed_seconds_to_hours, convert_time_cell_to_hours,
    derive_elapsed_clock_text,
};
pub use util::{derive_dataframe_from_ipc_bytes, derive_ipc_bytes_from_dataframe, load_sheet_grid};
