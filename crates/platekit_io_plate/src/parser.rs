//! Instrument export parser: sentinel-delimited sub-tables -> tidy measurement blocks.

use std::path::Path;

use crate::conf::C_PREFIX_MEASUREMENT_FALLBACK;
use crate::spec::{
    EnumCellValue, PlateIoError, SpecInstrumentLayout, SpecMeasurementBlock, SpecMeasurementRow,
};
use crate::time::convert_time_cell_to_hours;
use crate::util::{derive_cell_number, derive_cell_text, get_cell, is_row_empty, load_sheet_grid};

/// Row range of one sub-table, in absolute grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SpecBlockPlan {
    name: String,
    /// Sentinel row, also the header row of the sub-table.
    n_row_header: usize,
    /// Rows after the header that belong to the sub-table.
    n_rows_data: usize,
}

////////////////////////////////////////////////////////////////////////////////
// #region ParserApi

/// Parse every measurement block of the first sheet of `path`.
///
/// A sheet without sentinel rows yields an empty collection.
pub fn wrangle_growth_curves<P: AsRef<Path>>(
    path: P,
    layout: &SpecInstrumentLayout,
) -> Result<Vec<SpecMeasurementBlock>, PlateIoError> {
    let grid = load_sheet_grid(path.as_ref())?;
    let l_blocks = parse_measurement_blocks(&grid, layout)?;
    log::info!(
        "Parsed {} measurement blocks from {}: {:?}",
        l_blocks.len(),
        path.as_ref().display(),
        l_blocks.iter().map(|block| block.name.as_str()).collect::<Vec<_>>()
    );
    Ok(l_blocks)
}

/// Parse every measurement block of an already loaded grid.
pub fn parse_measurement_blocks(
    grid: &[Vec<EnumCellValue>],
    layout: &SpecInstrumentLayout,
) -> Result<Vec<SpecMeasurementBlock>, PlateIoError> {
    derive_block_plans(grid, layout)
        .iter()
        .map(|plan| tidy_block(grid, plan, layout))
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BlockPlanning

fn derive_block_plans(
    grid: &[Vec<EnumCellValue>],
    layout: &SpecInstrumentLayout,
) -> Vec<SpecBlockPlan> {
    let mut l_boundaries: Vec<usize> = (0..grid.len())
        .filter(|n_row| {
            derive_cell_text(get_cell(grid, *n_row, layout.col_idx_sentinel))
                .is_some_and(|c_text| layout.is_sentinel(&c_text))
        })
        .collect();
    log::debug!(
        "Sentinel rows {:?} in column {}",
        l_boundaries,
        layout.col_idx_sentinel
    );
    if l_boundaries.is_empty() {
        return vec![];
    }
    if layout.if_append_end_boundary {
        l_boundaries.push((grid.len() + layout.n_rows_gap_trim).saturating_sub(1));
    }

    l_boundaries
        .windows(2)
        .enumerate()
        .map(|(n_idx, pair)| {
            let (n_row_header, n_row_next) = (pair[0], pair[1]);
            SpecBlockPlan {
                name: derive_block_name(grid, n_row_header, n_idx, layout),
                n_row_header,
                n_rows_data: (n_row_next - n_row_header).saturating_sub(layout.n_rows_gap_trim),
            }
        })
        .collect()
}

fn derive_block_name(
    grid: &[Vec<EnumCellValue>],
    n_row_header: usize,
    n_idx: usize,
    layout: &SpecInstrumentLayout,
) -> String {
    n_row_header
        .checked_sub(layout.n_rows_name_offset)
        .and_then(|n_row_name| derive_cell_text(get_cell(grid, n_row_name, layout.col_idx_name)))
        .unwrap_or_else(|| format!("{C_PREFIX_MEASUREMENT_FALLBACK}{n_idx}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BlockTidy

fn tidy_block(
    grid: &[Vec<EnumCellValue>],
    plan: &SpecBlockPlan,
    layout: &SpecInstrumentLayout,
) -> Result<SpecMeasurementBlock, PlateIoError> {
    let n_row_first = plan.n_row_header + 1;
    let n_row_end = (n_row_first + plan.n_rows_data).min(grid.len());

    let mut l_rows_kept: Vec<usize> = Vec::new();
    for n_row in n_row_first..n_row_end {
        if derive_cell_text(get_cell(grid, n_row, 0)).is_some_and(|c_text| layout.is_row_stop(&c_text))
        {
            break;
        }
        if !is_row_empty(&grid[n_row]) {
            l_rows_kept.push(n_row);
        }
    }

    if l_rows_kept.is_empty() {
        log::debug!("Block {:?} at row {} has no data rows", plan.name, plan.n_row_header + 1);
        return Ok(SpecMeasurementBlock {
            name: plan.name.clone(),
            rows: vec![],
        });
    }

    let l_headers: Vec<(usize, String)> = grid[plan.n_row_header]
        .iter()
        .enumerate()
        .filter_map(|(n_col, value)| derive_cell_text(value).map(|c_header| (n_col, c_header)))
        .collect();
    let n_col_time = l_headers
        .iter()
        .find(|(_, c_header)| *c_header == layout.name_col_time)
        .map(|(n_col, _)| *n_col)
        .ok_or_else(|| PlateIoError::MissingColumn {
            block: plan.name.clone(),
            column: layout.name_col_time.clone(),
        })?;

    let mut l_times: Vec<(usize, f64)> = Vec::with_capacity(l_rows_kept.len());
    for n_row in l_rows_kept {
        if let Some(n_time_hr) =
            convert_time_cell_to_hours(get_cell(grid, n_row, n_col_time), layout.rule_time)?
        {
            l_times.push((n_row, n_time_hr));
        }
    }

    let l_wells: Vec<&(usize, String)> = l_headers
        .iter()
        .filter(|(n_col, c_header)| *n_col != n_col_time && is_well_header(c_header, layout))
        .filter(|(n_col, _)| {
            !layout.if_drop_empty_cols
                || l_times
                    .iter()
                    .any(|(n_row, _)| derive_cell_text(get_cell(grid, *n_row, *n_col)).is_some())
        })
        .collect();

    let mut l_measurements: Vec<SpecMeasurementRow> = Vec::new();
    for (n_col, c_well) in &l_wells {
        for (n_row, n_time_hr) in &l_times {
            if let Some(n_value) = derive_cell_number(get_cell(grid, *n_row, *n_col)) {
                l_measurements.push(SpecMeasurementRow {
                    well: c_well.clone(),
                    time_hr: *n_time_hr,
                    value: n_value,
                });
            }
        }
    }

    let block = SpecMeasurementBlock {
        name: plan.name.clone(),
        rows: l_measurements,
    };
    log::debug!(
        "Block {:?}: {} time points x {} wells -> {} rows",
        block.name,
        l_times.len(),
        l_wells.len(),
        block.height()
    );
    for c_well in block.derive_wells_time_decreasing() {
        log::warn!(
            "Time decreases within well {c_well} of measurement {:?}",
            block.name
        );
    }
    Ok(block)
}

fn is_well_header(header: &str, layout: &SpecInstrumentLayout) -> bool {
    header != layout.name_col_time
        && !layout.names_cols_id.iter().any(|c_id| c_id == header)
        && layout
            .char_exclude_well
            .is_none_or(|char_exclude| !header.contains(char_exclude))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumInstrument, EnumTimeEncoding};
    use crate::test_util::{TestDir, derive_grid, write_fixture_workbook};

    fn biotek_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["OD600"],
            vec!["Kinetic read", "A1", "A2"],
            vec!["0:00:00", "0.1", "0.2"],
            vec!["0:30:00", "0.15", "OVRFLW"],
            vec!["1:00:00", "0.2", "0.3"],
            vec![""],
            vec!["GFP"],
            vec!["Kinetic read", "B1"],
            vec!["0:00:00", "10"],
            vec!["Day01 00:30:00", "12"],
        ]
    }

    fn biotek_layout() -> SpecInstrumentLayout {
        SpecInstrumentLayout::from_instrument(EnumInstrument::BioTek)
    }

    #[test]
    fn two_sentinel_blocks_keep_their_own_wells() {
        let grid = derive_grid(&biotek_rows());
        let l_blocks = parse_measurement_blocks(&grid, &biotek_layout()).expect("blocks");

        assert_eq!(l_blocks.len(), 2);
        assert_eq!(l_blocks[0].name, "OD600");
        assert_eq!(l_blocks[0].wells(), vec!["A1", "A2"]);
        assert_eq!(l_blocks[1].name, "GFP");
        assert_eq!(l_blocks[1].wells(), vec!["B1"]);
        for block in &l_blocks {
            assert!(block.derive_wells_time_decreasing().is_empty());
        }
    }

    #[test]
    fn melt_order_and_overflow_markers_dropped() {
        let grid = derive_grid(&biotek_rows());
        let l_blocks = parse_measurement_blocks(&grid, &biotek_layout()).expect("blocks");

        let l_rows: Vec<(&str, f64, f64)> = l_blocks[0]
            .rows
            .iter()
            .map(|row| (row.well.as_str(), row.time_hr, row.value))
            .collect();
        assert_eq!(
            l_rows,
            vec![
                ("A1", 0.0, 0.1),
                ("A1", 0.5, 0.15),
                ("A1", 1.0, 0.2),
                ("A2", 0.0, 0.2),
                ("A2", 1.0, 0.3),
            ]
        );
        assert_eq!(l_blocks[1].rows[1].time_hr, 24.5);
    }

    #[test]
    fn sheet_without_sentinels_is_empty() {
        let grid = derive_grid(&[vec!["Plate report"], vec!["A1", "0.1"]]);
        let l_blocks = parse_measurement_blocks(&grid, &biotek_layout()).expect("blocks");
        assert!(l_blocks.is_empty());
    }

    #[test]
    fn gap_equal_to_trim_gives_zero_row_block() {
        let grid = derive_grid(&[
            vec!["OD600"],
            vec!["Kinetic read", "A1"],
            vec!["GFP"],
            vec!["Kinetic read", "A1"],
            vec!["0:00:00", "5"],
        ]);
        let l_blocks = parse_measurement_blocks(&grid, &biotek_layout()).expect("blocks");

        assert_eq!(l_blocks.len(), 2);
        assert_eq!(l_blocks[0].name, "OD600");
        assert_eq!(l_blocks[0].height(), 0);
        assert_eq!(l_blocks[1].height(), 1);
    }

    #[test]
    fn missing_or_blank_name_row_falls_back_to_synthetic_name() {
        let grid = derive_grid(&[
            vec!["Kinetic read", "A1"],
            vec!["0:00:00", "0.1"],
            vec![""],
            vec![""],
            vec!["Kinetic read", "A1"],
            vec!["0:00:00", "0.2"],
        ]);
        let l_blocks = parse_measurement_blocks(&grid, &biotek_layout()).expect("blocks");

        assert_eq!(l_blocks[0].name, "value0");
        assert_eq!(l_blocks[1].name, "value1");
        assert_eq!(l_blocks[0].height(), 1);
    }

    #[test]
    fn malformed_timestamp_propagates_format_error() {
        let grid = derive_grid(&[
            vec!["OD600"],
            vec!["Kinetic read", "A1"],
            vec!["1:75:00", "0.1"],
        ]);
        let err = parse_measurement_blocks(&grid, &biotek_layout()).expect_err("must fail");
        assert!(matches!(err, PlateIoError::Format(_)));
    }

    #[test]
    fn missing_time_column_rejected() {
        let grid = derive_grid(&biotek_rows());
        let layout = SpecInstrumentLayout {
            name_col_time: "Time".to_string(),
            ..biotek_layout()
        };
        let err = parse_measurement_blocks(&grid, &layout).expect_err("must fail");
        assert!(matches!(
            err,
            PlateIoError::MissingColumn { ref block, ref column } if block == "OD600" && column == "Time"
        ));
    }

    #[test]
    fn decreasing_time_is_kept_as_is() {
        let grid = derive_grid(&[
            vec!["OD600"],
            vec!["Kinetic read", "A1"],
            vec!["1:00:00", "0.1"],
            vec!["0:30:00", "0.2"],
        ]);
        let l_blocks = parse_measurement_blocks(&grid, &biotek_layout()).expect("blocks");
        assert_eq!(l_blocks[0].derive_wells_time_decreasing(), vec!["A1"]);
        assert_eq!(l_blocks[0].height(), 2);
    }

    #[test]
    fn tecan_blocks_closed_by_end_time_with_seconds() {
        let grid = derive_grid(&[
            vec!["Absorbance"],
            vec!["Cycle Nr.", "Time [s]", "Temp. [°C]", "A1", "A2"],
            vec!["1", "0", "30", "0.1", "0.2"],
            vec!["2", "1800", "30.1", "0.12", "0.22"],
            vec![""],
            vec!["Fluorescence"],
            vec!["Cycle Nr.", "Time [s]", "Temp. [°C]", "A1", "A2"],
            vec!["1", "0", "30", "100", "200"],
            vec!["2", "1800", "30", "110", "210"],
            vec![""],
            vec!["End Time", "2024-01-01 10:00:00"],
        ]);
        let layout = SpecInstrumentLayout::from_instrument(EnumInstrument::Tecan);
        assert_eq!(layout.rule_time, EnumTimeEncoding::ElapsedSeconds);

        let l_blocks = parse_measurement_blocks(&grid, &layout).expect("blocks");
        assert_eq!(l_blocks.len(), 2);
        assert_eq!(l_blocks[0].name, "Absorbance");
        assert_eq!(l_blocks[1].name, "Fluorescence");
        assert_eq!(l_blocks[0].wells(), vec!["A1", "A2"]);
        assert_eq!(l_blocks[1].height(), 4);
        assert_eq!(l_blocks[1].rows[1].time_hr, 0.5);
        assert_eq!(l_blocks[1].rows[3].value, 210.0);
    }

    #[test]
    fn spectramax_excludes_temperature_columns_and_stops_at_end_marker() {
        let grid = derive_grid(&[
            vec!["Plate:", "OD600", "1.3"],
            vec!["Time", "Temperature(°C)", "A1", "A2", "A3"],
            vec!["00:00:00", "30", "0.1", "", "0.3"],
            vec!["00:10:00", "30", "0.2", "", "0.4"],
            vec!["~End"],
            vec!["Original Filename: run"],
            vec!["Plate:", "GFP", "1.3"],
            vec!["Time", "Temperature(¡C)", "A1", "A2", "A3"],
            vec!["00:00:00", "30", "5", "", "7"],
            vec!["~End"],
        ]);
        let layout = SpecInstrumentLayout::from_instrument(EnumInstrument::SpectraMax);

        let l_blocks = parse_measurement_blocks(&grid, &layout).expect("blocks");
        assert_eq!(l_blocks.len(), 2);
        assert_eq!(l_blocks[0].name, "OD600");
        assert_eq!(l_blocks[0].wells(), vec!["A1", "A3"]);
        assert_eq!(l_blocks[0].height(), 4);
        assert_eq!(l_blocks[0].rows[1].time_hr, 0.167);
        assert_eq!(l_blocks[1].name, "GFP");
        assert_eq!(l_blocks[1].wells(), vec!["A1", "A3"]);
    }

    #[test]
    fn wrangle_growth_curves_reads_workbook() {
        let tmp = TestDir::new();
        let path = tmp.path().join("biotek.xlsx");
        write_fixture_workbook(&path, &biotek_rows());

        let l_blocks = wrangle_growth_curves(&path, &biotek_layout()).expect("blocks");
        assert_eq!(l_blocks.len(), 2);
        assert_eq!(l_blocks[0].height(), 5);
        assert_eq!(l_blocks[1].height(), 2);
    }

    #[test]
    fn wrangle_growth_curves_missing_file_is_open_error() {
        let tmp = TestDir::new();
        let err = wrangle_growth_curves(tmp.path().join("absent.xlsx"), &biotek_layout())
            .expect_err("must fail");
        assert!(matches!(err, PlateIoError::WorkbookOpen { .. }));
    }
}
