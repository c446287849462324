use settle::budget::Budget;
use settle::config::Config;
use settle::core::{Outcome, Solver};
use settle::data::{Value, VarId};
use settle::dimacs;
use settle::simplify::{Postprocessor, Preprocessor};
use settle::vec_map::VecMap;

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    pretty_env_logger::init();
    let config = Config::parse();

    let (nvars, clauses) = match dimacs::read_path(&config.input) {
        Ok(problem) => problem,
        Err(e) => {
            eprintln!("settle: {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    println!("c settle {}", env!("CARGO_PKG_VERSION"));
    println!(
        "c parsed {} vars and {} clauses from {}",
        nvars,
        clauses.len(),
        config.input.display()
    );

    let (mut solver, post) = if config.no_preprocess {
        (Solver::from_clauses(nvars, clauses), Postprocessor::empty())
    } else {
        let mut pre = Preprocessor::new(nvars, clauses, config.elim_limits());
        if pre.simplify().is_err() {
            println!("s UNSATISFIABLE");
            return ExitCode::from(20);
        }
        pre.finish()
    };
    solver.set_restart_interval(config.restart_interval);

    let budget: Budget = config.budget();
    match solver.solve_limited(&budget) {
        Outcome::Sat => {
            if solver.verify().is_err() {
                eprintln!("settle: internal error: model fails verification");
                return ExitCode::FAILURE;
            }
            post.extend(&mut solver.assignment);
            report_stats(&solver);
            println!("s SATISFIABLE");
            if !config.no_model {
                print_model(&solver.assignment);
            }
            ExitCode::from(10)
        }
        Outcome::Unsat => {
            report_stats(&solver);
            println!("s UNSATISFIABLE");
            ExitCode::from(20)
        }
        Outcome::Interrupted(why) => {
            report_stats(&solver);
            println!("c interrupted: {}", why);
            println!("s UNKNOWN");
            ExitCode::SUCCESS
        }
    }
}

fn report_stats(solver: &Solver) {
    let stats = &solver.stats;
    println!(
        "c {} decisions, {} propagations, {} conflicts, {} restarts, {} learned",
        stats.decisions, stats.propagations, stats.conflicts, stats.restarts, stats.learned,
    );
}

/// The `v` lines of the DIMACS output format: every variable's literal,
/// terminated by 0
fn print_model(assignment: &VecMap<VarId, Value>) {
    let mut line = String::from("v");
    for (i, &value) in assignment.inner.iter().enumerate() {
        let n = i as i64 + 1;
        let lit = match value {
            Value::True => n,
            // an unknown here means the variable is unconstrained
            Value::False | Value::Unknown => -n,
        };
        line.push(' ');
        line.push_str(&lit.to_string());
        if (i + 1) % 20 == 0 {
            println!("{}", line);
            line.truncate(1);
        }
    }
    line.push_str(" 0");
    println!("{}", line);
}
