//! How waning immunity shapes endemic SIRS dynamics.
//!
//! Sweeps the waning rate ω over six decades and prints R0, endemic
//! prevalence, and the period of damped oscillations about the endemic state.
//! A second column set compares the closed-form prevalence with a long
//! integration of the model.
//!
//! # Usage
//!
//! ```text
//! cargo run --example waning_sweep
//! cargo run --example waning_sweep -- 3.0
//! RUST_LOG=info cargo run --example waning_sweep -- 3.0 parallel
//! ```
//!
//! The optional first argument is the transmission rate β (default 2.0).
//! Pass `parallel` as the second argument to run cells on the rayon pool.

use std::error::Error;

use epiflow_analysis::{
    Canonical, Quantity,
    scenario::{Execution, Probe, Quantities, Record, Scenario, SteadyState, Sweep},
};
use epiflow_core::ParameterSet;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let beta = std::env::args()
        .nth(1)
        .as_deref()
        .map(str::parse::<f64>)
        .transpose()
        .unwrap_or_else(|_| {
            eprintln!("Invalid transmission rate, expected a number such as 2.0");
            std::process::exit(1);
        })
        .unwrap_or(2.0);
    let execution = match std::env::args().nth(2).as_deref() {
        Some("parallel") => Execution::Parallel { threads: None },
        _ => Execution::Sequential,
    };

    let canonical = Canonical::sirs();
    let base = ParameterSet::from([("beta", beta), ("gamma", 0.5), ("mu", 0.02), ("omega", 0.1)]);
    let initial = canonical.model().state([("S", 0.9), ("I", 0.01), ("R", 0.09)])?;

    let quantities = Quantities::new(
        canonical.clone(),
        [
            Quantity::R0,
            Quantity::EndemicPrevalence,
            Quantity::OscillationPeriod,
        ],
    );
    let steady = SteadyState::new(canonical.model().clone(), initial);
    let probe = |params: &ParameterSet| -> Result<Record, Box<dyn Error + Send + Sync>> {
        let mut record = quantities.probe(params)?;
        let settled = steady.probe(params)?;
        record.push("I(long run)", settled.get("I").unwrap_or(f64::NAN));
        Ok(record)
    };

    let table = Scenario::new(&base)
        .sweep(Sweep::log10("omega", 1e-4, 1e2, 13)?)
        .run(&probe, execution)?;

    println!(
        "{:>10} {:>8} {:>12} {:>12} {:>10}",
        "omega", "R0", "prevalence", "I(long run)", "period"
    );
    for row in table.rows() {
        let omega = row.input("omega").unwrap_or(f64::NAN);
        match row.record() {
            Some(record) => {
                let get = |name| record.get(name).unwrap_or(f64::NAN);
                println!(
                    "{omega:>10.1e} {:>8.3} {:>12.6} {:>12.6} {:>10.2}",
                    get("R0"),
                    get("prevalence"),
                    get("I(long run)"),
                    get("period"),
                );
            }
            None => println!("{omega:>10.1e} {:?}", row.outcome),
        }
    }
    Ok(())
}
