//! Parameter sweeps over a base parameter set.
//!
//! A [`Scenario`] takes the Cartesian product of its [`Sweep`]s, builds one
//! parameter set per cell by overriding the base, and measures each cell with
//! a [`Probe`]. Cells are independent: a failing cell is recorded and the rest
//! carry on.
//!
//! ```
//! use epiflow_analysis::{
//!     Canonical, Quantity,
//!     scenario::{Execution, Quantities, Scenario, Sweep},
//! };
//! use epiflow_core::ParameterSet;
//!
//! let base = ParameterSet::from([("beta", 2.0), ("gamma", 0.5)]);
//! let probe = Quantities::new(Canonical::sis(), [Quantity::R0, Quantity::EndemicPrevalence]);
//!
//! let table = Scenario::new(&base)
//!     .sweep(Sweep::values("beta", [0.25, 1.0, 2.0]))
//!     .run(&probe, Execution::Sequential)?;
//!
//! assert_eq!(table.column("R0"), vec![0.5, 2.0, 4.0]);
//! assert_eq!(table.column("prevalence")[0], 0.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod probe;
mod sweep;
mod table;

pub use error::ScenarioError;
pub use probe::{Probe, ProbeError, Quantities, SteadyState};
pub use sweep::Sweep;
pub use table::{Outcome, Record, Row, Table};

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use epiflow_core::ParameterSet;
use itertools::Itertools;
use rayon::prelude::*;

/// How cells are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Execution {
    #[default]
    Sequential,
    /// Run cells on a rayon pool. `threads: None` uses the global pool.
    Parallel { threads: Option<usize> },
}

/// A shared flag that stops a running scenario from starting new cells.
///
/// Cells already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A set of sweeps over a base parameter set.
#[derive(Debug, Clone)]
pub struct Scenario<'a> {
    base: &'a ParameterSet,
    sweeps: Vec<Sweep>,
    abort: Option<AbortHandle>,
}

struct Cell {
    inputs: Vec<(String, f64)>,
    params: ParameterSet,
}

impl<'a> Scenario<'a> {
    /// Creates a scenario with no sweeps, which has a single cell: `base`.
    #[must_use]
    pub fn new(base: &'a ParameterSet) -> Self {
        Self {
            base,
            sweeps: Vec::new(),
            abort: None,
        }
    }

    /// Adds a sweep. Earlier sweeps vary slowest.
    #[must_use]
    pub fn sweep(mut self, sweep: Sweep) -> Self {
        self.sweeps.push(sweep);
        self
    }

    /// Attaches an abort handle.
    #[must_use]
    pub fn with_abort(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Returns the number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.sweeps.iter().map(Sweep::len).product()
    }

    /// Measures every cell with `probe`.
    ///
    /// Rows are returned in sweep order regardless of `execution`.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if a sweep is empty, repeats a parameter or
    /// names a parameter missing from the base set, or if the thread pool
    /// cannot be built. Probe failures are recorded per row instead.
    pub fn run<P>(&self, probe: &P, execution: Execution) -> Result<Table, ScenarioError>
    where
        P: Probe + Sync + ?Sized,
    {
        let cells = self.cells()?;
        log::info!(
            "running {} scenario cells over [{}] ({execution:?})",
            cells.len(),
            self.sweeps.iter().map(Sweep::parameter).join(", ")
        );

        let evaluate = |cell: &Cell| {
            let outcome = if self.abort.as_ref().is_some_and(AbortHandle::is_aborted) {
                Outcome::Skipped
            } else {
                match probe.probe(&cell.params) {
                    Ok(record) => Outcome::Record(record),
                    Err(error) => {
                        log::debug!("scenario cell {:?} failed: {error}", cell.inputs);
                        Outcome::Failed(error)
                    }
                }
            };
            Row {
                inputs: cell.inputs.clone(),
                outcome,
            }
        };

        let rows: Vec<Row> = match execution {
            Execution::Sequential => cells.iter().map(evaluate).collect(),
            Execution::Parallel { threads: None } => cells.par_iter().map(evaluate).collect(),
            Execution::Parallel {
                threads: Some(threads),
            } => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(|| cells.par_iter().map(evaluate).collect()),
        };

        let table = Table {
            columns: self
                .sweeps
                .iter()
                .map(|sweep| sweep.parameter().to_string())
                .collect(),
            rows,
        };
        log::info!(
            "scenario finished: {} failed, {} skipped",
            table.failures(),
            table.skipped()
        );
        Ok(table)
    }

    fn cells(&self) -> Result<Vec<Cell>, ScenarioError> {
        for (i, sweep) in self.sweeps.iter().enumerate() {
            let name = sweep.parameter();
            if sweep.is_empty() {
                return Err(ScenarioError::EmptySweep { name: name.into() });
            }
            if !self.base.contains(name) {
                return Err(ScenarioError::UnknownParameter { name: name.into() });
            }
            if self.sweeps[..i].iter().any(|s| s.parameter() == name) {
                return Err(ScenarioError::DuplicateSweep { name: name.into() });
            }
        }

        if self.sweeps.is_empty() {
            return Ok(vec![Cell {
                inputs: Vec::new(),
                params: self.base.clone(),
            }]);
        }

        Ok(self
            .sweeps
            .iter()
            .map(|sweep| sweep.points().iter().copied())
            .multi_cartesian_product()
            .map(|values| {
                let inputs: Vec<(String, f64)> = self
                    .sweeps
                    .iter()
                    .map(|sweep| sweep.parameter().to_string())
                    .zip(values)
                    .collect();
                let params = inputs
                    .iter()
                    .fold(self.base.clone(), |params, (name, value)| {
                        params.with(name.clone(), *value)
                    });
                Cell { inputs, params }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    fn base() -> ParameterSet {
        ParameterSet::from([("a", 1.0), ("b", 10.0)])
    }

    fn sum(params: &ParameterSet) -> Result<Record, Infallible> {
        let a = params.get("a").unwrap_or(f64::NAN);
        let b = params.get("b").unwrap_or(f64::NAN);
        Ok(Record::new().with("sum", a + b))
    }

    #[test]
    fn first_sweep_varies_slowest() {
        let base = base();
        let table = Scenario::new(&base)
            .sweep(Sweep::values("a", [1.0, 2.0]))
            .sweep(Sweep::values("b", [10.0, 20.0, 30.0]))
            .run(&sum, Execution::Sequential)
            .expect("valid scenario");

        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(
            table.column("sum"),
            vec![11.0, 21.0, 31.0, 12.0, 22.0, 32.0]
        );
        assert_eq!(table.rows()[4].input("b"), Some(20.0));
    }

    #[test]
    fn no_sweeps_runs_base_once() {
        let base = base();
        let table = Scenario::new(&base)
            .run(&sum, Execution::Sequential)
            .expect("valid scenario");

        assert_eq!(table.len(), 1);
        assert_eq!(table.column("sum"), vec![11.0]);
    }

    #[test]
    fn parallel_preserves_order() {
        let base = base();
        let scenario = Scenario::new(&base)
            .sweep(Sweep::linear("a", 0.0, 99.0, 100).expect("valid range"))
            .sweep(Sweep::values("b", [0.0, 1000.0]));

        let sequential = scenario.run(&sum, Execution::Sequential).expect("valid");
        let parallel = scenario
            .run(&sum, Execution::Parallel { threads: Some(4) })
            .expect("valid");

        assert_eq!(parallel.column("sum"), sequential.column("sum"));
    }

    #[test]
    fn failures_are_recorded_per_row() {
        let base = base();
        let picky = |params: &ParameterSet| -> Result<Record, String> {
            match params.get("a") {
                Some(a) if a > 1.5 => Err(format!("a = {a} is too large")),
                Some(a) => Ok(Record::new().with("a", a)),
                None => Err("missing a".to_string()),
            }
        };

        let table = Scenario::new(&base)
            .sweep(Sweep::values("a", [1.0, 2.0, 1.0]))
            .run(&picky, Execution::Sequential)
            .expect("valid scenario");

        assert_eq!(table.failures(), 1);
        assert!(matches!(table.rows()[1].outcome, Outcome::Failed(_)));
        assert_eq!(table.rows()[2].record().and_then(|r| r.get("a")), Some(1.0));
    }

    #[test]
    fn aborted_cells_are_skipped() {
        let base = base();
        let handle = AbortHandle::new();
        handle.abort();

        let table = Scenario::new(&base)
            .sweep(Sweep::values("a", [1.0, 2.0]))
            .with_abort(handle)
            .run(&sum, Execution::Sequential)
            .expect("valid scenario");

        assert_eq!(table.skipped(), 2);
    }

    #[test]
    fn abort_mid_run_skips_remaining_cells() {
        let base = base();
        let handle = AbortHandle::new();
        let trigger = handle.clone();
        let probe = move |params: &ParameterSet| -> Result<Record, Infallible> {
            trigger.abort();
            sum(params)
        };

        let table = Scenario::new(&base)
            .sweep(Sweep::values("a", [1.0, 2.0, 3.0]))
            .with_abort(handle)
            .run(&probe, Execution::Sequential)
            .expect("valid scenario");

        assert!(table.rows()[0].record().is_some());
        assert_eq!(table.skipped(), 2);
    }

    #[test]
    fn rejects_bad_sweeps() {
        let base = base();

        let unknown = Scenario::new(&base).sweep(Sweep::values("c", [1.0]));
        assert!(matches!(
            unknown.run(&sum, Execution::Sequential),
            Err(ScenarioError::UnknownParameter { name }) if name == "c"
        ));

        let empty = Scenario::new(&base).sweep(Sweep::values("a", Vec::new()));
        assert!(matches!(
            empty.run(&sum, Execution::Sequential),
            Err(ScenarioError::EmptySweep { .. })
        ));

        let duplicate = Scenario::new(&base)
            .sweep(Sweep::values("a", [1.0]))
            .sweep(Sweep::values("a", [2.0]));
        assert!(matches!(
            duplicate.run(&sum, Execution::Sequential),
            Err(ScenarioError::DuplicateSweep { .. })
        ));
    }

    #[test]
    fn base_is_not_mutated() {
        let base = base();
        let before = base.clone();
        Scenario::new(&base)
            .sweep(Sweep::values("a", [5.0, 6.0]))
            .run(&sum, Execution::Parallel { threads: None })
            .expect("valid scenario");

        assert_eq!(base, before);
    }
}
