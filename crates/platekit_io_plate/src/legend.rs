//! Condition legend loader: plate template -> per-well descriptor columns.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use crate::conf::{
    C_COL_CONDITION, C_COL_CONDITION_CONC, C_COL_MEDIUM, C_COL_MEDIUM_CONC,
    C_DELIMITER_COMPONENTS, C_LEGEND_HEADER_ROW, C_LEGEND_HEADER_VARIABLE,
    C_LEGEND_LABEL_CONDITION, C_LEGEND_LABEL_MEDIUM, C_SUFFIX_COMPONENT_CONC, TUP_PLATE_WIDTHS,
};
use crate::spec::{
    EnumCellValue, EnumLegendValues, PlateIoError, SpecConditionLegend, SpecLegendColumn,
};
use crate::util::{derive_cell_text, derive_well_sort_key, get_cell, load_sheet_grid};

/// Template label -> well -> raw text.
type TypeLabelValues = HashMap<String, HashMap<String, String>>;

/// Descriptor split once on the delimiter: `(name, remainder)`, both trimmed.
type TypeDescriptorSplit = Vec<Option<(String, Option<String>)>>;

////////////////////////////////////////////////////////////////////////////////
// #region LegendApi

/// Load a filled-out plate legend template from the first sheet of `path`.
pub fn load_condition_legend<P: AsRef<Path>>(
    path: P,
    delimiter: &str,
    if_verbose: bool,
) -> Result<SpecConditionLegend, PlateIoError> {
    let grid = load_sheet_grid(path.as_ref())?;
    let legend = parse_condition_legend(&grid, delimiter, if_verbose)?;
    log::info!(
        "Loaded legend {}: {} wells, columns {:?}",
        path.as_ref().display(),
        legend.height(),
        legend.column_names()
    );
    Ok(legend)
}

/// Melt a template grid into one record per well and expand compound descriptors.
///
/// The header row is the first non-empty row and must carry `variable`, `row`
/// and the numbered columns `1..=8` or `1..=12`. A blank `variable` cell
/// continues the label of the row above.
pub fn parse_condition_legend(
    grid: &[Vec<EnumCellValue>],
    delimiter: &str,
    if_verbose: bool,
) -> Result<SpecConditionLegend, PlateIoError> {
    if delimiter.is_empty() {
        return Err(PlateIoError::LegendLayout(
            "Descriptor delimiter must not be empty.".to_string(),
        ));
    }

    let header = derive_template_header(grid)?;
    let (l_labels, dict_values, l_wells) = collect_label_values(grid, &header)?;

    let mut l_columns: Vec<SpecLegendColumn> = Vec::new();
    for c_label in &l_labels {
        if c_label == C_LEGEND_LABEL_MEDIUM || c_label == C_LEGEND_LABEL_CONDITION {
            continue;
        }
        l_columns.push(SpecLegendColumn {
            name: c_label.clone(),
            values: EnumLegendValues::Text(derive_label_texts(&dict_values, c_label, &l_wells)),
        });
    }

    if dict_values.contains_key(C_LEGEND_LABEL_MEDIUM) {
        let l_split = derive_descriptor_split(
            &derive_label_texts(&dict_values, C_LEGEND_LABEL_MEDIUM, &l_wells),
            delimiter,
        );
        l_columns.extend(expand_medium_columns(&l_split, &l_wells)?);
    }

    if dict_values.contains_key(C_LEGEND_LABEL_CONDITION) {
        let l_split = derive_descriptor_split(
            &derive_label_texts(&dict_values, C_LEGEND_LABEL_CONDITION, &l_wells),
            delimiter,
        );
        if if_verbose {
            l_columns.extend(expand_condition_columns_verbose(&l_split, &l_wells)?);
        } else {
            l_columns.extend(expand_condition_columns(&l_split));
        }
    }

    Ok(SpecConditionLegend {
        wells: l_wells,
        columns: l_columns,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TemplateMelt

struct SpecTemplateHeader {
    n_row_header: usize,
    n_col_variable: usize,
    n_col_row: usize,
    /// `(col_idx, plate column number)`.
    cols_numbered: Vec<(usize, usize)>,
}

fn derive_template_header(
    grid: &[Vec<EnumCellValue>],
) -> Result<SpecTemplateHeader, PlateIoError> {
    let n_row_header = grid
        .iter()
        .position(|row| row.iter().any(|value| derive_cell_text(value).is_some()))
        .ok_or_else(|| PlateIoError::LegendLayout("Legend template is empty.".to_string()))?;

    let mut n_col_variable = None;
    let mut n_col_row = None;
    let mut cols_numbered: Vec<(usize, usize)> = Vec::new();
    for (n_col, value) in grid[n_row_header].iter().enumerate() {
        let Some(c_header) = derive_cell_text(value) else {
            continue;
        };
        if c_header == C_LEGEND_HEADER_VARIABLE {
            n_col_variable.get_or_insert(n_col);
        } else if c_header == C_LEGEND_HEADER_ROW {
            n_col_row.get_or_insert(n_col);
        } else if let Ok(n_plate_col) = c_header.parse::<usize>() {
            cols_numbered.push((n_col, n_plate_col));
        }
    }

    let (Some(n_col_variable), Some(n_col_row)) = (n_col_variable, n_col_row) else {
        return Err(PlateIoError::LegendLayout(format!(
            "Legend header must contain {C_LEGEND_HEADER_VARIABLE:?} and {C_LEGEND_HEADER_ROW:?} columns."
        )));
    };

    let mut l_numbers: Vec<usize> = cols_numbered.iter().map(|(_, n)| *n).collect();
    l_numbers.sort_unstable();
    let if_plate_width = TUP_PLATE_WIDTHS
        .iter()
        .any(|n_width| l_numbers.iter().copied().eq(1..=*n_width));
    if !if_plate_width {
        return Err(PlateIoError::LegendLayout(format!(
            "Legend numbered columns must be exactly 1..=8 or 1..=12, found {l_numbers:?}."
        )));
    }

    Ok(SpecTemplateHeader {
        n_row_header,
        n_col_variable,
        n_col_row,
        cols_numbered,
    })
}

/// Labels in first-seen order, their per-well values, and wells in plate order.
fn collect_label_values(
    grid: &[Vec<EnumCellValue>],
    header: &SpecTemplateHeader,
) -> Result<(Vec<String>, TypeLabelValues, Vec<String>), PlateIoError> {
    let mut l_labels: Vec<String> = Vec::new();
    let mut dict_values: TypeLabelValues = HashMap::new();
    let mut set_wells: HashSet<String> = HashSet::new();
    let mut c_label_current: Option<String> = None;

    for n_row in (header.n_row_header + 1)..grid.len() {
        if let Some(c_label) = derive_cell_text(get_cell(grid, n_row, header.n_col_variable)) {
            c_label_current = Some(c_label);
        }
        let Some(c_row_letter) = derive_cell_text(get_cell(grid, n_row, header.n_col_row)) else {
            continue;
        };
        let Some(c_label) = c_label_current.as_ref() else {
            log::debug!("Legend row {} has no variable label; skipped", n_row + 1);
            continue;
        };

        for (n_col, n_plate_col) in &header.cols_numbered {
            let Some(c_value) = derive_cell_text(get_cell(grid, n_row, *n_col)) else {
                continue;
            };
            let c_well = format!("{c_row_letter}{n_plate_col}");
            if !dict_values.contains_key(c_label) {
                l_labels.push(c_label.clone());
            }
            let dict_wells = dict_values.entry(c_label.clone()).or_default();
            if dict_wells.contains_key(&c_well) {
                return Err(PlateIoError::LegendLayout(format!(
                    "Well {c_well} has more than one {c_label:?} entry."
                )));
            }
            dict_wells.insert(c_well.clone(), c_value);
            set_wells.insert(c_well);
        }
    }

    let mut l_wells: Vec<String> = set_wells.into_iter().collect();
    l_wells.sort_by_key(|c_well| derive_well_sort_key(c_well));
    Ok((l_labels, dict_values, l_wells))
}

fn derive_label_texts(
    dict_values: &TypeLabelValues,
    label: &str,
    wells: &[String],
) -> Vec<Option<String>> {
    let Some(dict_wells) = dict_values.get(label) else {
        return vec![None; wells.len()];
    };
    wells
        .iter()
        .map(|c_well| dict_wells.get(c_well).cloned())
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DescriptorExpansion

fn derive_descriptor_split(values: &[Option<String>], delimiter: &str) -> TypeDescriptorSplit {
    values
        .iter()
        .map(|value| {
            value.as_ref().map(|c_text| match c_text.split_once(delimiter) {
                Some((c_name, c_rest)) => {
                    (c_name.trim().to_string(), Some(c_rest.trim().to_string()))
                }
                None => (c_text.trim().to_string(), None),
            })
        })
        .collect()
}

fn derive_split_names(l_split: &TypeDescriptorSplit) -> Vec<Option<String>> {
    l_split
        .iter()
        .map(|split| split.as_ref().map(|(c_name, _)| c_name.clone()))
        .collect()
}

fn has_remainder(l_split: &TypeDescriptorSplit) -> bool {
    l_split
        .iter()
        .any(|split| matches!(split, Some((_, Some(_)))))
}

fn parse_concentration(value: &str, well: &str, label: &str) -> Result<f64, PlateIoError> {
    value.parse::<f64>().map_err(|_| {
        PlateIoError::Format(format!(
            "Concentration {value:?} of {label:?} in well {well} is not numeric."
        ))
    })
}

fn expand_medium_columns(
    l_split: &TypeDescriptorSplit,
    wells: &[String],
) -> Result<Vec<SpecLegendColumn>, PlateIoError> {
    let mut l_columns = vec![SpecLegendColumn {
        name: C_COL_MEDIUM.to_string(),
        values: EnumLegendValues::Text(derive_split_names(l_split)),
    }];

    if has_remainder(l_split) {
        let mut l_concs: Vec<Option<f64>> = Vec::with_capacity(l_split.len());
        for (split, c_well) in l_split.iter().zip(wells) {
            l_concs.push(match split {
                Some((_, Some(c_rest))) => {
                    Some(parse_concentration(c_rest, c_well, C_LEGEND_LABEL_MEDIUM)?)
                }
                _ => None,
            });
        }
        l_columns.push(SpecLegendColumn {
            name: C_COL_MEDIUM_CONC.to_string(),
            values: EnumLegendValues::Number(l_concs),
        });
    }
    Ok(l_columns)
}

fn expand_condition_columns(l_split: &TypeDescriptorSplit) -> Vec<SpecLegendColumn> {
    let mut l_columns = vec![SpecLegendColumn {
        name: C_COL_CONDITION.to_string(),
        values: EnumLegendValues::Text(derive_split_names(l_split)),
    }];

    if has_remainder(l_split) {
        l_columns.push(SpecLegendColumn {
            name: C_COL_CONDITION_CONC.to_string(),
            values: EnumLegendValues::Text(
                l_split
                    .iter()
                    .map(|split| split.as_ref().and_then(|(_, c_rest)| c_rest.clone()))
                    .collect(),
            ),
        });
    }
    l_columns
}

/// Verbose format: every well names the same components, one concentration each.
fn expand_condition_columns_verbose(
    l_split: &TypeDescriptorSplit,
    wells: &[String],
) -> Result<Vec<SpecLegendColumn>, PlateIoError> {
    if !has_remainder(l_split) {
        return Ok(expand_condition_columns(l_split));
    }

    let mut l_names_distinct: Vec<&str> = Vec::new();
    for (c_name, _) in l_split.iter().flatten() {
        if !l_names_distinct.contains(&c_name.as_str()) {
            l_names_distinct.push(c_name.as_str());
        }
    }
    if l_names_distinct.len() > 1 {
        return Err(PlateIoError::Format(format!(
            "Legend is not verbose; condition names left of the delimiter must be identical \
             in every well. Found the following different names: {l_names_distinct:?}"
        )));
    }
    let Some(c_names) = l_names_distinct.first() else {
        return Ok(vec![]);
    };

    let l_components: Vec<String> = c_names
        .split(C_DELIMITER_COMPONENTS)
        .map(|c_component| c_component.trim().to_string())
        .collect();
    let n_components = l_components.len();

    let mut l_concs: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(wells.len()); n_components];
    for (split, c_well) in l_split.iter().zip(wells) {
        let Some((_, Some(c_rest))) = split else {
            l_concs.iter_mut().for_each(|l_values| l_values.push(None));
            continue;
        };
        let l_parts: Vec<&str> = c_rest.split(C_DELIMITER_COMPONENTS).map(str::trim).collect();
        if l_parts.len() != n_components {
            return Err(PlateIoError::Format(format!(
                "Legend is not verbose; well {c_well} supplies {} condition concentrations \
                 for {n_components} condition names ({c_rest:?}).",
                l_parts.len()
            )));
        }
        for (l_values, c_part) in l_concs.iter_mut().zip(l_parts) {
            l_values.push(Some(parse_concentration(
                c_part,
                c_well,
                C_LEGEND_LABEL_CONDITION,
            )?));
        }
    }

    Ok(l_components
        .into_iter()
        .zip(l_concs)
        .map(|(c_component, l_values)| SpecLegendColumn {
            name: format!("{c_component}{C_SUFFIX_COMPONENT_CONC}"),
            values: EnumLegendValues::Number(l_values),
        })
        .collect())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{
        TestDir, borrow_rows, derive_grid, derive_template_rows, write_fixture_workbook,
    };

    fn parse_template(
        n_width: usize,
        labels: &[(&str, &[(&str, usize, &str)])],
        if_verbose: bool,
    ) -> Result<SpecConditionLegend, PlateIoError> {
        let l_rows = derive_template_rows(n_width, labels);
        let grid = derive_grid(&borrow_rows(&l_rows));
        parse_condition_legend(&grid, ";", if_verbose)
    }

    #[test]
    fn medium_descriptor_splits_into_name_and_concentration() {
        let legend = parse_template(
            12,
            &[(
                C_LEGEND_LABEL_MEDIUM,
                &[("A", 1, "LB; 5"), ("A", 2, "M9; 0.5")],
            )],
            false,
        )
        .expect("legend");

        assert_eq!(legend.wells, vec!["A1", "A2"]);
        assert_eq!(legend.text("A1", C_COL_MEDIUM), Some("LB"));
        assert_eq!(legend.number("A1", C_COL_MEDIUM_CONC), Some(5.0));
        assert_eq!(legend.number("A2", C_COL_MEDIUM_CONC), Some(0.5));
        assert_eq!(legend.column_names(), vec![C_COL_MEDIUM, C_COL_MEDIUM_CONC]);
    }

    #[test]
    fn medium_without_concentration_has_no_conc_column() {
        let legend = parse_template(
            12,
            &[(C_LEGEND_LABEL_MEDIUM, &[("A", 1, "LB"), ("B", 1, "M9")])],
            false,
        )
        .expect("legend");

        assert_eq!(legend.column_names(), vec![C_COL_MEDIUM]);
        assert_eq!(legend.text("B1", C_COL_MEDIUM), Some("M9"));
    }

    #[test]
    fn non_numeric_medium_concentration_rejected() {
        let err = parse_template(
            12,
            &[(C_LEGEND_LABEL_MEDIUM, &[("A", 1, "LB; five")])],
            false,
        )
        .expect_err("must fail");

        assert!(matches!(err, PlateIoError::Format(_)));
        assert!(err.to_string().contains("five"));
    }

    #[test]
    fn condition_terse_format_keeps_concentration_text() {
        let legend = parse_template(
            12,
            &[(
                C_LEGEND_LABEL_CONDITION,
                &[("A", 1, "PI; 5"), ("A", 2, "untreated")],
            )],
            false,
        )
        .expect("legend");

        assert_eq!(legend.text("A1", C_COL_CONDITION), Some("PI"));
        assert_eq!(legend.text("A1", C_COL_CONDITION_CONC), Some("5"));
        assert_eq!(legend.text("A2", C_COL_CONDITION), Some("untreated"));
        assert_eq!(legend.text("A2", C_COL_CONDITION_CONC), None);
    }

    #[test]
    fn verbose_condition_expands_per_component_columns() {
        let legend = parse_template(
            12,
            &[(
                C_LEGEND_LABEL_CONDITION,
                &[("A", 1, "PI, PYO; 5, 0"), ("A", 2, "PI, PYO; 0, 5")],
            )],
            true,
        )
        .expect("legend");

        assert_eq!(
            legend.column_names(),
            vec!["PI Conc. (µM)", "PYO Conc. (µM)"]
        );
        assert_eq!(
            legend.column("PI Conc. (µM)").map(|col| &col.values),
            Some(&EnumLegendValues::Number(vec![Some(5.0), Some(0.0)]))
        );
        assert_eq!(
            legend.column("PYO Conc. (µM)").map(|col| &col.values),
            Some(&EnumLegendValues::Number(vec![Some(0.0), Some(5.0)]))
        );
        assert!(legend.column(C_COL_CONDITION).is_none());
        assert!(legend.column(C_COL_CONDITION_CONC).is_none());
    }

    #[test]
    fn verbose_condition_with_different_names_rejected() {
        let err = parse_template(
            12,
            &[(
                C_LEGEND_LABEL_CONDITION,
                &[
                    ("A", 1, "PI, PYO; 5, 0"),
                    ("A", 2, "PI, PYO; 0, 5"),
                    ("A", 3, "PI; 5"),
                ],
            )],
            true,
        )
        .expect_err("must fail");

        assert!(matches!(err, PlateIoError::Format(_)));
        assert!(err.to_string().contains("\"PI\""));
    }

    #[test]
    fn verbose_condition_with_mismatched_counts_rejected() {
        let err = parse_template(
            12,
            &[(
                C_LEGEND_LABEL_CONDITION,
                &[("A", 1, "PI, PYO; 5, 0"), ("A", 2, "PI, PYO; 5")],
            )],
            true,
        )
        .expect_err("must fail");

        assert!(matches!(err, PlateIoError::Format(_)));
    }

    #[test]
    fn eight_column_template_and_extra_labels() {
        let legend = parse_template(
            8,
            &[
                ("Strain", &[("A", 1, "PA14"), ("H", 8, "dphz")]),
                (C_LEGEND_LABEL_MEDIUM, &[("A", 1, "LB; 5"), ("H", 8, "LB; 5")]),
            ],
            false,
        )
        .expect("legend");

        assert_eq!(legend.wells, vec!["A1", "H8"]);
        assert_eq!(
            legend.column_names(),
            vec!["Strain", C_COL_MEDIUM, C_COL_MEDIUM_CONC]
        );
        assert_eq!(legend.text("H8", "Strain"), Some("dphz"));
    }

    #[test]
    fn wells_are_in_plate_order() {
        let legend = parse_template(
            12,
            &[(
                C_LEGEND_LABEL_MEDIUM,
                &[("B", 1, "LB"), ("A", 10, "LB"), ("A", 2, "LB")],
            )],
            false,
        )
        .expect("legend");

        assert_eq!(legend.wells, vec!["A2", "A10", "B1"]);
    }

    #[test]
    fn repeated_label_for_same_well_rejected() {
        let mut l_rows = derive_template_rows(12, &[(C_LEGEND_LABEL_MEDIUM, &[("A", 1, "LB")])]);
        let mut l_repeat = vec![String::new(); 14];
        l_repeat[0] = C_LEGEND_LABEL_MEDIUM.to_string();
        l_repeat[1] = "A".to_string();
        l_repeat[2] = "M9".to_string();
        l_rows.push(l_repeat);

        let grid = derive_grid(&borrow_rows(&l_rows));
        let err = parse_condition_legend(&grid, ";", false).expect_err("must fail");
        assert!(matches!(err, PlateIoError::LegendLayout(_)));
    }

    #[test]
    fn template_with_wrong_numbered_columns_rejected() {
        let grid = derive_grid(&[
            vec!["variable", "row", "1", "2", "3"],
            vec![C_LEGEND_LABEL_MEDIUM, "A", "LB", "LB", "LB"],
        ]);
        let err = parse_condition_legend(&grid, ";", false).expect_err("must fail");
        assert!(matches!(err, PlateIoError::LegendLayout(_)));
    }

    #[test]
    fn empty_delimiter_rejected() {
        let l_rows = derive_template_rows(12, &[(C_LEGEND_LABEL_MEDIUM, &[("A", 1, "LB")])]);
        let grid = derive_grid(&borrow_rows(&l_rows));
        let err = parse_condition_legend(&grid, "", false).expect_err("must fail");
        assert!(matches!(err, PlateIoError::LegendLayout(_)));
    }

    #[test]
    fn load_condition_legend_reads_workbook() {
        let tmp = TestDir::new();
        let path = tmp.path().join("legend.xlsx");
        let l_rows = derive_template_rows(
            12,
            &[
                (C_LEGEND_LABEL_MEDIUM, &[("A", 1, "LB; 5"), ("C", 12, "LB; 5")]),
                (C_LEGEND_LABEL_CONDITION, &[("A", 1, "PI; 5"), ("C", 12, "PI; 0")]),
            ],
        );
        write_fixture_workbook(&path, &borrow_rows(&l_rows));

        let legend = load_condition_legend(&path, ";", false).expect("legend");
        assert_eq!(legend.wells, vec!["A1", "C12"]);
        assert_eq!(legend.number("C12", C_COL_MEDIUM_CONC), Some(5.0));
        assert_eq!(legend.text("C12", C_COL_CONDITION_CONC), Some("0"));
    }
}
