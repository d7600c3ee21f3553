//! Plate IO constants and default preset factories.

use crate::spec::{EnumInstrument, EnumTimeEncoding, SpecImportOptions, SpecInstrumentLayout};

/// Well identifier column.
pub const C_COL_WELL: &str = "Well";
/// Elapsed time column in decimal hours.
pub const C_COL_TIME_HR: &str = "Time [hr]";
/// Medium name column.
pub const C_COL_MEDIUM: &str = "Medium";
/// Medium concentration column.
pub const C_COL_MEDIUM_CONC: &str = "Medium Conc. (mM)";
/// Condition name column.
pub const C_COL_CONDITION: &str = "Condition";
/// Condition concentration column (terse legend format).
pub const C_COL_CONDITION_CONC: &str = "Condition Conc. (µM)";
/// Suffix of per-component concentration columns (verbose legend format).
pub const C_SUFFIX_COMPONENT_CONC: &str = " Conc. (µM)";

/// Template label of the compound medium descriptor.
pub const C_LEGEND_LABEL_MEDIUM: &str = "Medium; Concentration (mM)";
/// Template label of the compound condition descriptor.
pub const C_LEGEND_LABEL_CONDITION: &str = "Condition; Concentration (µM)";
/// Template header of the label column.
pub const C_LEGEND_HEADER_VARIABLE: &str = "variable";
/// Template header of the plate-row-letter column.
pub const C_LEGEND_HEADER_ROW: &str = "row";
/// Supported plate template widths (numbered columns).
pub const TUP_PLATE_WIDTHS: [usize; 2] = [8, 12];

/// Default descriptor delimiter.
pub const C_DELIMITER_DEFAULT: &str = ";";
/// Delimiter between verbose component names and between their concentrations.
pub const C_DELIMITER_COMPONENTS: char = ',';

/// Decimal places kept for elapsed hours (1-second steps stay distinct).
pub const N_DIGITS_TIME_HR: i32 = 3;
/// Prefix of synthetic measurement names.
pub const C_PREFIX_MEASUREMENT_FALLBACK: &str = "value";
/// Header row plus the name row of the next sub-table.
pub const N_ROWS_GAP_TRIM_DEFAULT: usize = 2;

/// Tecan sentinel labels (`End Time` closes the last sub-table).
pub const TUP_LABELS_SENTINEL_TECAN: [&str; 2] = ["Cycle Nr.", "End Time"];
/// BioTek sentinel label (also the time column header).
pub const C_LABEL_SENTINEL_BIOTEK: &str = "Kinetic read";
/// SoftMax Pro temperature header, with the mis-encoded degree sign older versions write.
pub const TUP_LABELS_SENTINEL_SPECTRAMAX: [&str; 2] = ["Temperature(°C)", "Temperature(¡C)"];
/// SoftMax Pro end-of-block marker.
pub const C_LABEL_ROW_STOP_SPECTRAMAX: &str = "~End";

/// Build the preset layout of `instrument`.
pub fn derive_default_instrument_layout(instrument: EnumInstrument) -> SpecInstrumentLayout {
    match instrument {
        EnumInstrument::BioTek => SpecInstrumentLayout {
            col_idx_sentinel: 0,
            labels_sentinel: vec![C_LABEL_SENTINEL_BIOTEK.to_string()],
            n_rows_name_offset: 1,
            col_idx_name: 0,
            n_rows_gap_trim: N_ROWS_GAP_TRIM_DEFAULT,
            if_append_end_boundary: true,
            name_col_time: C_LABEL_SENTINEL_BIOTEK.to_string(),
            rule_time: EnumTimeEncoding::ElapsedClock,
            names_cols_id: vec![],
            labels_row_stop: vec![],
            if_drop_empty_cols: false,
            char_exclude_well: None,
        },
        EnumInstrument::Tecan => SpecInstrumentLayout {
            col_idx_sentinel: 0,
            labels_sentinel: TUP_LABELS_SENTINEL_TECAN
                .iter()
                .map(ToString::to_string)
                .collect(),
            n_rows_name_offset: 1,
            col_idx_name: 0,
            n_rows_gap_trim: N_ROWS_GAP_TRIM_DEFAULT,
            if_append_end_boundary: false,
            name_col_time: "Time [s]".to_string(),
            rule_time: EnumTimeEncoding::ElapsedSeconds,
            names_cols_id: vec!["Cycle Nr.".to_string(), "Temp. [°C]".to_string()],
            labels_row_stop: vec![],
            if_drop_empty_cols: false,
            char_exclude_well: None,
        },
        EnumInstrument::SpectraMax => SpecInstrumentLayout {
            col_idx_sentinel: 1,
            labels_sentinel: TUP_LABELS_SENTINEL_SPECTRAMAX
                .iter()
                .map(ToString::to_string)
                .collect(),
            n_rows_name_offset: 1,
            col_idx_name: 1,
            n_rows_gap_trim: N_ROWS_GAP_TRIM_DEFAULT,
            if_append_end_boundary: true,
            name_col_time: "Time".to_string(),
            rule_time: EnumTimeEncoding::ElapsedClock,
            names_cols_id: vec![],
            labels_row_stop: vec![C_LABEL_ROW_STOP_SPECTRAMAX.to_string()],
            if_drop_empty_cols: true,
            char_exclude_well: Some('T'),
        },
    }
}

/// Build default import options.
pub fn derive_default_import_options() -> SpecImportOptions {
    SpecImportOptions::default()
}
