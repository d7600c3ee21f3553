//! Import report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one growth-curve import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportImport {
    /// Measurement blocks found in the data workbook.
    pub cnt_blocks: u64,
    /// Tidy measurement rows before the legend join.
    pub cnt_rows_measured: u64,
    /// Rows kept by the legend join.
    pub cnt_rows_joined: u64,
    /// Rows dropped because their well is missing from the legend.
    pub cnt_rows_unmatched: u64,
    /// Distinct wells dropped by the legend join, first-seen order.
    pub wells_unmatched: Vec<String>,
    /// Non-fatal warnings collected during parsing.
    pub warnings: Vec<String>,
}

impl ReportImport {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_blocks".to_string(), self.cnt_blocks);
        dict_counts.insert("cnt_rows_measured".to_string(), self.cnt_rows_measured);
        dict_counts.insert("cnt_rows_joined".to_string(), self.cnt_rows_joined);
        dict_counts.insert("cnt_rows_unmatched".to_string(), self.cnt_rows_unmatched);
        dict_counts.insert(
            "cnt_wells_unmatched".to_string(),
            self.wells_unmatched.len() as u64,
        );
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} blocks={} measured={} joined={} unmatched={} wells_unmatched={} warnings={}",
            dict_counts["cnt_blocks"],
            dict_counts["cnt_rows_measured"],
            dict_counts["cnt_rows_joined"],
            dict_counts["cnt_rows_unmatched"],
            dict_counts["cnt_wells_unmatched"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[IMPORT]"))
    }
}

/// Mutable accumulator for import statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportImportBuilder {
    /// See [`ReportImport::cnt_blocks`].
    pub cnt_blocks: u64,
    /// See [`ReportImport::cnt_rows_measured`].
    pub cnt_rows_measured: u64,
    /// See [`ReportImport::cnt_rows_joined`].
    pub cnt_rows_joined: u64,
    /// See [`ReportImport::cnt_rows_unmatched`].
    pub cnt_rows_unmatched: u64,
    /// See [`ReportImport::wells_unmatched`].
    pub wells_unmatched: Vec<String>,
    /// See [`ReportImport::warnings`].
    pub warnings: Vec<String>,
}

impl ReportImportBuilder {
    /// Increment one or more named counters by `value`.
    ///
    /// Unknown names are ignored.
    pub fn add_counts(&mut self, field_names: &[&str], value: u64) {
        for field_name in field_names {
            match *field_name {
                "cnt_blocks" => self.cnt_blocks += value,
                "cnt_rows_measured" => self.cnt_rows_measured += value,
                "cnt_rows_joined" => self.cnt_rows_joined += value,
                "cnt_rows_unmatched" => self.cnt_rows_unmatched += value,
                _ => {}
            }
        }
    }

    /// Record one dropped row of `well`.
    pub fn add_unmatched(&mut self, well: &str) {
        self.cnt_rows_unmatched += 1;
        if !self.wells_unmatched.iter().any(|c_well| c_well == well) {
            self.wells_unmatched.push(well.to_string());
        }
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportImport {
        ReportImport {
            cnt_blocks: self.cnt_blocks,
            cnt_rows_measured: self.cnt_rows_measured,
            cnt_rows_joined: self.cnt_rows_joined,
            cnt_rows_unmatched: self.cnt_rows_unmatched,
            wells_unmatched: self.wells_unmatched,
            warnings: self.warnings,
        }
    }
}
