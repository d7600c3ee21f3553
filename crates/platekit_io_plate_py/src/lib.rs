use std::collections::BTreeMap;

use platekit_io_plate::{
    EnumGrowthCurveTables, EnumInstrument, PlateIoError, ReportImport, SpecImportOptions,
    SpecInstrumentLayout, convert_elapsed_clock_to_hours, derive_ipc_bytes_from_dataframe,
    import_growth_curves, load_condition_legend, wrangle_growth_curves,
};
use polars::prelude::DataFrame;
use pyo3::exceptions::{PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyList, PyTuple};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "platekit.io.plate.v1";
const C_BRIDGE_TRANSPORT: &str = "polars_ipc";

#[pyclass(name = "ReportImport")]
#[derive(Debug, Clone)]
struct PyReportImport {
    #[pyo3(get)]
    cnt_blocks: u64,
    #[pyo3(get)]
    cnt_rows_measured: u64,
    #[pyo3(get)]
    cnt_rows_joined: u64,
    #[pyo3(get)]
    cnt_rows_unmatched: u64,
    #[pyo3(get)]
    wells_unmatched: Vec<String>,
    #[pyo3(get)]
    warnings: Vec<String>,
    inner: ReportImport,
}

impl From<ReportImport> for PyReportImport {
    fn from(report_import: ReportImport) -> Self {
        Self {
            cnt_blocks: report_import.cnt_blocks,
            cnt_rows_measured: report_import.cnt_rows_measured,
            cnt_rows_joined: report_import.cnt_rows_joined,
            cnt_rows_unmatched: report_import.cnt_rows_unmatched,
            wells_unmatched: report_import.wells_unmatched.clone(),
            warnings: report_import.warnings.clone(),
            inner: report_import,
        }
    }
}

#[pymethods]
impl PyReportImport {
    #[getter]
    fn warning_count(&self) -> usize {
        self.inner.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.inner.to_dict()
    }

    #[pyo3(signature = (prefix = "[IMPORT]"))]
    fn format(&self, prefix: &str) -> String {
        self.inner.format(prefix)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

fn parse_instrument(value: &str) -> PyResult<EnumInstrument> {
    if let Some(instrument) = EnumInstrument::ALL
        .into_iter()
        .find(|instrument| instrument.as_str() == value)
    {
        return Ok(instrument);
    }

    let l_expected: Vec<String> = EnumInstrument::ALL
        .iter()
        .map(|instrument| format!("'{}'", instrument.as_str()))
        .collect();
    Err(PyValueError::new_err(format!(
        "Invalid instrument: `{value}`. Expected one of: [{}]",
        l_expected.join(", ")
    )))
}

fn map_plate_io_error(exception: PlateIoError) -> PyErr {
    match &exception {
        PlateIoError::Format(_)
        | PlateIoError::LegendLayout(_)
        | PlateIoError::MissingColumn { .. }
        | PlateIoError::DuplicateMeasurement(_) => PyValueError::new_err(exception.to_string()),
        PlateIoError::WorkbookOpen { .. } | PlateIoError::SheetMissing(_) => {
            PyOSError::new_err(exception.to_string())
        }
        PlateIoError::Table(_) => PyRuntimeError::new_err(exception.to_string()),
    }
}

/// Materialize a kernel table as `polars.DataFrame` through IPC bytes.
fn derive_py_dataframe(py: Python<'_>, mut df: DataFrame) -> PyResult<PyObject> {
    let v_ipc = derive_ipc_bytes_from_dataframe(&mut df).map_err(map_plate_io_error)?;
    let module_polars = py.import("polars")?;
    let df_py = module_polars.call_method1("read_ipc", (PyBytes::new(py, &v_ipc),))?;
    Ok(df_py.unbind())
}

fn derive_py_named_tables(
    py: Python<'_>,
    tables: Vec<(String, DataFrame)>,
) -> PyResult<PyObject> {
    let mut l_items: Vec<(String, PyObject)> = Vec::with_capacity(tables.len());
    for (name, df) in tables {
        l_items.push((name, derive_py_dataframe(py, df)?));
    }
    Ok(PyList::new(py, l_items)?.into_any().unbind())
}

#[pyfunction(name = "normalize_time")]
fn normalize_time_py(datetime_text: &str) -> PyResult<f64> {
    convert_elapsed_clock_to_hours(datetime_text).map_err(map_plate_io_error)
}

#[pyfunction(name = "load_condition_legend")]
#[pyo3(signature = (file_legend, delimiter = ";", if_verbose = false))]
fn load_condition_legend_py(
    py: Python<'_>,
    file_legend: String,
    delimiter: &str,
    if_verbose: bool,
) -> PyResult<PyObject> {
    let delimiter = delimiter.to_string();
    let legend = py
        .allow_threads(|| load_condition_legend(file_legend, &delimiter, if_verbose))
        .map_err(map_plate_io_error)?;
    let df = legend.to_dataframe().map_err(map_plate_io_error)?;
    derive_py_dataframe(py, df)
}

#[pyfunction(name = "wrangle_growth_curves")]
#[pyo3(signature = (file_data, instrument = "biotek"))]
fn wrangle_growth_curves_py(
    py: Python<'_>,
    file_data: String,
    instrument: &str,
) -> PyResult<PyObject> {
    let layout = SpecInstrumentLayout::from_instrument(parse_instrument(instrument)?);
    let l_blocks = py
        .allow_threads(|| wrangle_growth_curves(file_data, &layout))
        .map_err(map_plate_io_error)?;

    let mut l_tables = Vec::with_capacity(l_blocks.len());
    for block in l_blocks {
        let df = block.to_dataframe().map_err(map_plate_io_error)?;
        l_tables.push((block.name, df));
    }
    derive_py_named_tables(py, l_tables)
}

#[pyfunction(name = "import_growth_curves")]
#[pyo3(signature = (
    file_data,
    file_legend,
    instrument = "biotek",
    delimiter = ";",
    if_verbose = false,
    if_merged = true,
    if_return_report = false
))]
#[allow(clippy::too_many_arguments)]
fn import_growth_curves_py(
    py: Python<'_>,
    file_data: String,
    file_legend: String,
    instrument: &str,
    delimiter: &str,
    if_verbose: bool,
    if_merged: bool,
    if_return_report: bool,
) -> PyResult<PyObject> {
    let spec_import_options = SpecImportOptions {
        instrument: parse_instrument(instrument)?,
        layout: None,
        delimiter: delimiter.to_string(),
        if_verbose,
        if_merged,
    };

    let res_import = py
        .allow_threads(|| import_growth_curves(file_data, file_legend, &spec_import_options))
        .map_err(map_plate_io_error)?;

    let obj_tables = match res_import.tables {
        EnumGrowthCurveTables::Merged(df) => derive_py_dataframe(py, df)?,
        EnumGrowthCurveTables::PerMeasurement(l_tables) => derive_py_named_tables(
            py,
            l_tables
                .into_iter()
                .map(|table| (table.name, table.df))
                .collect(),
        )?,
    };
    if !if_return_report {
        return Ok(obj_tables);
    }

    let obj_report = Py::new(py, PyReportImport::from(res_import.report))?.into_any();
    Ok(PyTuple::new(py, [obj_tables, obj_report])?.into_any().unbind())
}

#[pymodule]
fn _platekit_io_plate_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();
    log::debug!("platekit_io_plate bridge loaded ({C_BRIDGE_CONTRACT_VERSION})");
    module.add_class::<PyReportImport>()?;
    module.add_function(wrap_pyfunction!(normalize_time_py, module)?)?;
    module.add_function(wrap_pyfunction!(load_condition_legend_py, module)?)?;
    module.add_function(wrap_pyfunction!(wrangle_growth_curves_py, module)?)?;
    module.add_function(wrap_pyfunction!(import_growth_curves_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
