//! Growth-curve importer: parse, merge and join measurement blocks to the legend.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use polars::prelude::DataFrame;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::legend::load_condition_legend;
use crate::parser::wrangle_growth_curves;
use crate::report::ReportImportBuilder;
use crate::spec::{
    EnumGrowthCurveTables, PlateIoError, SpecConditionLegend, SpecGrowthCurveImport,
    SpecImportJob, SpecImportOptions, SpecMeasurementBlock, SpecMeasurementTable, SpecNamedTable,
};
use crate::util::calculate_worker_limit;

/// Import one instrument export together with its plate legend.
///
/// Pipeline:
/// 1. Parse measurement blocks with the resolved instrument layout.
/// 2. Load the condition legend.
/// 3. Merge blocks on `(Well, Time [hr])` (merged mode) or keep them apart.
/// 4. Inner-join each table to the legend on `Well`.
///
/// Rows whose well is absent from the legend are dropped; the report counts them.
pub fn import_growth_curves<P, Q>(
    path_data: P,
    path_legend: Q,
    options: &SpecImportOptions,
) -> Result<SpecGrowthCurveImport, PlateIoError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let layout = options.resolve_layout();
    let l_blocks = wrangle_growth_curves(path_data.as_ref(), &layout)?;
    let legend = load_condition_legend(
        path_legend.as_ref(),
        &options.delimiter,
        options.if_verbose,
    )?;

    let mut builder = ReportImportBuilder::default();
    builder.add_counts(&["cnt_blocks"], l_blocks.len() as u64);
    for block in &l_blocks {
        for c_well in block.derive_wells_time_decreasing() {
            builder.add_warning(format!(
                "Time decreases within well {c_well} of measurement {:?}.",
                block.name
            ));
        }
    }

    let tables = if options.if_merged {
        let table = merge_measurement_blocks(&l_blocks)?;
        builder.add_counts(&["cnt_rows_measured"], table.height() as u64);
        EnumGrowthCurveTables::Merged(join_legend(&table, &legend, &mut builder)?)
    } else {
        let mut l_tables = Vec::with_capacity(l_blocks.len());
        for block in &l_blocks {
            let table = block.to_table();
            builder.add_counts(&["cnt_rows_measured"], table.height() as u64);
            l_tables.push(SpecNamedTable {
                name: block.name.clone(),
                df: join_legend(&table, &legend, &mut builder)?,
            });
        }
        EnumGrowthCurveTables::PerMeasurement(l_tables)
    };

    let report = builder.build();
    log::info!("{} {}", report, path_data.as_ref().display());
    Ok(SpecGrowthCurveImport { tables, report })
}

/// Sequentially inner-join blocks on `(Well, Time [hr])`.
///
/// Row order follows the first block; repeated keys multiply. No blocks gives
/// an empty table.
pub fn merge_measurement_blocks(
    blocks: &[SpecMeasurementBlock],
) -> Result<SpecMeasurementTable, PlateIoError> {
    let mut set_names: HashSet<&str> = HashSet::new();
    for block in blocks {
        if !set_names.insert(block.name.as_str()) {
            return Err(PlateIoError::DuplicateMeasurement(block.name.clone()));
        }
    }

    let Some((block_first, l_blocks_rest)) = blocks.split_first() else {
        return Ok(SpecMeasurementTable::default());
    };

    let mut table = block_first.to_table();
    for block in l_blocks_rest {
        let (l_indices, l_values) = derive_key_matches(&table, block);
        let mut table_next = table.take(&l_indices);
        table_next.columns.push((block.name.clone(), l_values));
        log::debug!(
            "Merged {:?}: {} -> {} rows",
            block.name,
            table.height(),
            table_next.height()
        );
        table = table_next;
    }
    Ok(table)
}

/// Left row index and right value for every `(Well, Time [hr])` match.
fn derive_key_matches(
    table: &SpecMeasurementTable,
    block: &SpecMeasurementBlock,
) -> (Vec<usize>, Vec<f64>) {
    let mut dict_values: HashMap<(&str, u64), Vec<f64>> = HashMap::new();
    for row in &block.rows {
        dict_values
            .entry((row.well.as_str(), row.time_hr.to_bits()))
            .or_default()
            .push(row.value);
    }

    let mut l_indices: Vec<usize> = Vec::with_capacity(table.height());
    let mut l_values: Vec<f64> = Vec::with_capacity(table.height());
    for (n_idx, (c_well, n_time_hr)) in table.wells.iter().zip(&table.times_hr).enumerate() {
        if let Some(l_matches) = dict_values.get(&(c_well.as_str(), n_time_hr.to_bits())) {
            for n_value in l_matches {
                l_indices.push(n_idx);
                l_values.push(*n_value);
            }
        }
    }
    (l_indices, l_values)
}

/// Inner-join `table` to `legend` on `Well`, keeping the row order of `table`.
pub fn join_legend(
    table: &SpecMeasurementTable,
    legend: &SpecConditionLegend,
    builder: &mut ReportImportBuilder,
) -> Result<DataFrame, PlateIoError> {
    let dict_wells: HashMap<&str, usize> = legend
        .wells
        .iter()
        .enumerate()
        .map(|(n_idx, c_well)| (c_well.as_str(), n_idx))
        .collect();

    let mut l_indices_left: Vec<usize> = Vec::with_capacity(table.height());
    let mut l_indices_legend: Vec<usize> = Vec::with_capacity(table.height());
    for (n_idx, c_well) in table.wells.iter().enumerate() {
        match dict_wells.get(c_well.as_str()) {
            Some(n_idx_legend) => {
                l_indices_left.push(n_idx);
                l_indices_legend.push(*n_idx_legend);
            }
            None => builder.add_unmatched(c_well),
        }
    }
    builder.add_counts(&["cnt_rows_joined"], l_indices_left.len() as u64);

    let mut l_columns = table.take(&l_indices_left).to_columns();
    l_columns.extend(legend.gather_columns(&l_indices_legend));
    Ok(DataFrame::new(l_columns)?)
}

/// Run independent imports in parallel, one result per job in input order.
///
/// Falls back to serial execution if the worker pool cannot be built.
pub fn import_growth_curves_batch(
    jobs: &[SpecImportJob],
    num_workers_max: Option<usize>,
) -> Vec<Result<SpecGrowthCurveImport, PlateIoError>> {
    let n_workers_max = calculate_worker_limit(num_workers_max);
    let run_job =
        |job: &SpecImportJob| import_growth_curves(&job.path_data, &job.path_legend, &job.options);

    let thread_pool = ThreadPoolBuilder::new().num_threads(n_workers_max).build();
    let Ok(thread_pool) = thread_pool else {
        log::warn!(
            "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial import."
        );
        return jobs.iter().map(run_job).collect();
    };

    thread_pool.install(|| jobs.par_iter().map(run_job).collect())
}
