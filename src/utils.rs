//! utils — conversion helpers for the Python bindings.
//!
//! Everything here is compiled only with the `python-bindings` feature and
//! turns loosely typed Python inputs (NumPy arrays, pandas objects, nested
//! sequences) into the owned `ndarray` containers the filter expects.
#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use crate::{
    densities::{CompOut, Family},
    filter::{ControlObj, ObservationData, ProblemData, StateModel},
    proposal::DEFAULT_MAX_IT,
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
    PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64")
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Owned 1-D copy of an array-like argument; `name` is used in error messages.
#[cfg(feature = "python-bindings")]
pub fn extract_vector<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>, name: &str,
) -> PyResult<Array1<f64>> {
    let arr = extract_f64_array(py, raw_data)
        .map_err(|_| PyTypeError::new_err(format!("{name} must be a 1-D float64 array-like")))?;
    Ok(arr.as_array().to_owned())
}

/// Owned 2-D copy of a matrix-like argument.
///
/// Accepts a 2-D `numpy.ndarray` (any memory order), a `pandas.DataFrame`
/// or a rectangular sequence of rows.
#[cfg(feature = "python-bindings")]
pub fn extract_matrix<'py>(raw_data: &Bound<'py, PyAny>, name: &str) -> PyResult<Array2<f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro.as_array().to_owned());
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (), None) {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro.as_array().to_owned());
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err(format!(
            "{name} must be a 2-D numpy.ndarray, pandas.DataFrame, or sequence of rows"
        ))
    })?;
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != n_cols) {
        return Err(PyValueError::new_err(format!("{name} rows must all have the same length")));
    }
    let n_rows = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| PyValueError::new_err(format!("{name}: {e}")))
}

/// Observation indices per period, as a sequence of integer sequences.
#[cfg(feature = "python-bindings")]
pub fn extract_time_indices(raw_data: &Bound<'_, PyAny>) -> PyResult<Vec<Vec<usize>>> {
    raw_data.extract::<Vec<Vec<usize>>>().map_err(|_| {
        PyTypeError::new_err(
            "time_indices must be a sequence with one sequence of non-negative row indices per period",
        )
    })
}

/// Assemble and validate a [`ProblemData`] from Python arguments.
///
/// `ws` defaults to ones and `offsets` to zeros. String options are parsed
/// case-insensitively; `n_threads = None` uses one worker per core.
#[cfg(feature = "python-bindings")]
#[allow(clippy::too_many_arguments)]
pub fn build_problem<'py>(
    py: Python<'py>, y: &Bound<'py, PyAny>, x: &Bound<'py, PyAny>, z: &Bound<'py, PyAny>,
    cfix: &Bound<'py, PyAny>, time_indices: &Bound<'py, PyAny>, f: &Bound<'py, PyAny>,
    q: &Bound<'py, PyAny>, q0: &Bound<'py, PyAny>, mu0: &Bound<'py, PyAny>, family: &str,
    disp: Option<f64>, ws: Option<&Bound<'py, PyAny>>, offsets: Option<&Bound<'py, PyAny>>,
    n_part: usize, nu: f64, covar_fac: f64, ftol_rel: f64, max_it: Option<u64>, trace: u32,
    what_stat: &str, seed: Option<u64>, n_threads: Option<usize>,
) -> PyResult<ProblemData> {
    let y = extract_vector(py, y, "y")?;
    let n_obs = y.len();
    let ws = match ws {
        Some(raw) => extract_vector(py, raw, "ws")?,
        None => Array1::ones(n_obs),
    };
    let offsets = match offsets {
        Some(raw) => extract_vector(py, raw, "offsets")?,
        None => Array1::zeros(n_obs),
    };

    let obs = ObservationData {
        y,
        x: extract_matrix(x, "X")?,
        z: extract_matrix(z, "Z")?,
        cfix: extract_vector(py, cfix, "cfix")?,
        ws,
        offsets,
        time_indices: extract_time_indices(time_indices)?,
        family: family.parse::<Family>()?,
        disp,
    };
    let state = StateModel {
        f: extract_matrix(f, "F")?,
        q: extract_matrix(q, "Q")?,
        q0: extract_matrix(q0, "Q0")?,
        mu0: extract_vector(py, mu0, "mu0")?,
    };

    let n_threads =
        n_threads.unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
    let ctrl = ControlObj::new(
        n_part,
        nu,
        covar_fac,
        ftol_rel,
        max_it.unwrap_or(DEFAULT_MAX_IT),
        trace,
        what_stat.parse::<CompOut>()?,
        seed,
        n_threads,
    )?;

    Ok(ProblemData::new(obs, state, ctrl)?)
}
