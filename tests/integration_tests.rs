use assert_cmd::Command;
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;
use settle::budget::Budget;
use settle::core::{Outcome, Solver};
use settle::data::{Clause, Value, VarId};
use settle::dimacs;
use settle::simplify::{ElimLimits, Preprocessor};
use settle::vec_map::VecMap;
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn check_model(original: &[Clause], assignment: &VecMap<VarId, Value>) {
    for clause in original {
        assert!(
            clause.iter().any(|&l| l.eval(assignment) == Value::True),
            "unsatisfied clause {:?} under {:?}",
            clause,
            assignment.inner
        );
    }
}

/// Solve `content` twice, with and without preprocessing, and check the
/// verdict both times.  Every SAT verdict also gets its model checked against
/// the original clauses, which exercises reconstruction of eliminated vars.
fn run_cnf(content: &str, expected_sat: bool) {
    let (nvars, clauses) = dimacs::read(Cursor::new(content)).expect("parse failure");
    let original = clauses.clone();

    let mut pre = Preprocessor::new(nvars, clauses.clone(), ElimLimits::default());
    let sat = match pre.simplify() {
        Err(_) => false,
        Ok(()) => {
            let (mut solver, post) = pre.finish();
            match solver.solve() {
                Outcome::Sat => {
                    solver.verify().expect("model fails the solver's clauses");
                    post.extend(&mut solver.assignment);
                    check_model(&original, &solver.assignment);
                    true
                }
                Outcome::Unsat => false,
                Outcome::Interrupted(_) => panic!("unlimited solve got interrupted"),
            }
        }
    };
    assert_eq!(sat, expected_sat, "preprocessed verdict wrong for:\n{}", content);

    let mut solver = Solver::from_clauses(nvars, clauses);
    let sat = match solver.solve() {
        Outcome::Sat => {
            solver.verify().expect("model fails the solver's clauses");
            check_model(&original, &solver.assignment);
            true
        }
        Outcome::Unsat => false,
        Outcome::Interrupted(_) => panic!("unlimited solve got interrupted"),
    };
    assert_eq!(sat, expected_sat, "raw verdict wrong for:\n{}", content);
}

#[test]
fn empty_formula() {
    run_cnf("p cnf 0 0\n", true);
}

#[test]
fn single_var_no_clauses() {
    run_cnf("p cnf 1 0\n", true);
}

#[test]
fn unit_positive() {
    run_cnf("p cnf 1 1\n1 0\n", true);
}

#[test]
fn unit_negative() {
    run_cnf("p cnf 1 1\n-1 0\n", true);
}

#[test]
fn empty_clause() {
    run_cnf("p cnf 0 1\n0\n", false);
}

#[test]
fn contradictory_units() {
    run_cnf("p cnf 1 2\n1 0\n-1 0\n", false);
}

#[test]
fn simple_propagation() {
    run_cnf("p cnf 3 3\n1 2 0\n-1 3 0\n-2 -3 0\n", true);
}

#[test]
fn pigeonhole_2_into_1() {
    run_cnf("p cnf 2 3\n1 2 0\n-1 0\n-2 0\n", false);
}

#[test]
fn horn_sat() {
    run_cnf("p cnf 3 3\n-1 -2 3 0\n1 0\n2 0\n", true);
}

#[test]
fn backtrack_unsat() {
    run_cnf("p cnf 3 4\n1 2 0\n1 -2 0\n-1 3 0\n-3 0\n", false);
}

#[test]
fn tautologies() {
    run_cnf("p cnf 2 2\n1 -1 0\n2 -2 0\n", true);
}

#[test]
fn deep_unsat() {
    run_cnf(
        "p cnf 4 7\n1 2 0\n-1 3 0\n-2 -3 4 0\n-4 0\n-1 0\n2 0\n3 0\n",
        false,
    );
}

#[test]
fn conflict_either_branch() {
    // 1=T propagates 3 and -3; 1=F propagates 2 and -2
    run_cnf("p cnf 3 4\n1 2 0\n1 -2 0\n-1 3 0\n-1 -3 0\n", false);
}

const PHP_4_3: &str = "p cnf 12 22\n\
1 2 3 0\n\
4 5 6 0\n\
7 8 9 0\n\
10 11 12 0\n\
-1 -4 0\n-1 -7 0\n-1 -10 0\n-4 -7 0\n-4 -10 0\n-7 -10 0\n\
-2 -5 0\n-2 -8 0\n-2 -11 0\n-5 -8 0\n-5 -11 0\n-8 -11 0\n\
-3 -6 0\n-3 -9 0\n-3 -12 0\n-6 -9 0\n-6 -12 0\n-9 -12 0\n";

#[test]
fn pigeonhole_4_into_3() {
    run_cnf(PHP_4_3, false);
}

const SAT_6: &str = "p cnf 6 9\n\
1 2 0\n-1 -2 0\n\
3 4 0\n-3 -4 0\n\
5 6 0\n-5 -6 0\n\
1 3 5 0\n-2 -4 0\n2 4 6 0\n";

#[test]
fn satisfiable_with_search() {
    run_cnf(SAT_6, true);
}

#[test]
fn conflict_budget_interrupts() {
    let (nvars, clauses) = dimacs::read(Cursor::new(PHP_4_3)).unwrap();
    let mut solver = Solver::from_clauses(nvars, clauses);
    let budget = Budget::unlimited().with_conflict_limit(0);
    assert_eq!(
        solver.solve_limited(&budget),
        Outcome::Interrupted(settle::Interrupt::ConflictLimit)
    );
}

// ---------------- driving the binary ----------------

fn cnf_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

fn settle() -> Command {
    Command::cargo_bin("settle").unwrap()
}

#[test]
fn cli_satisfiable() {
    let file = cnf_file(SAT_6);
    settle()
        .arg(file.path())
        .assert()
        .code(10)
        .stdout(predicate::str::contains("s SATISFIABLE"))
        .stdout(predicate::str::contains("\nv "));
}

#[test]
fn cli_unsatisfiable() {
    let file = cnf_file(PHP_4_3);
    settle()
        .arg(file.path())
        .assert()
        .code(20)
        .stdout(predicate::str::contains("s UNSATISFIABLE"));
}

#[test]
fn cli_no_preprocessing() {
    let file = cnf_file(PHP_4_3);
    settle()
        .arg("--no-pre")
        .arg(file.path())
        .assert()
        .code(20)
        .stdout(predicate::str::contains("s UNSATISFIABLE"));
}

#[test]
fn cli_gzip_input() {
    let file = tempfile::Builder::new().suffix(".gz").tempfile().unwrap();
    let mut encoder = GzEncoder::new(file.as_file(), Compression::default());
    encoder.write_all(SAT_6.as_bytes()).unwrap();
    encoder.finish().unwrap();

    settle()
        .arg(file.path())
        .assert()
        .code(10)
        .stdout(predicate::str::contains("s SATISFIABLE"));
}

#[test]
fn cli_conflict_budget_gives_unknown() {
    let file = cnf_file(PHP_4_3);
    settle()
        .args(["--no-pre", "--conflicts", "0"])
        .arg(file.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("s UNKNOWN"));
}

#[test]
fn cli_no_model_suppresses_v_lines() {
    let file = cnf_file(SAT_6);
    settle()
        .arg("--no-model")
        .arg(file.path())
        .assert()
        .code(10)
        .stdout(predicate::str::contains("\nv ").not());
}

#[test]
fn cli_missing_file() {
    settle()
        .arg("no-such-file.cnf")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("settle:"));
}

#[test]
fn cli_parse_error() {
    let file = cnf_file("p dnf 1 1\n1 0\n");
    settle()
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("p cnf"));
}
