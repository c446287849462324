//! Read the simplified DIMACS format used by the SAT competition
//!
//! See
//! (http://www.satcompetition.org/2011/format-benchmarks2011.html)[http://www.satcompetition.org/2011/format-benchmarks2011.html]
//! for a description of the format.  `c` lines are comments, a single
//! `p cnf <vars> <clauses>` line declares the problem, and clauses are
//! 0-terminated integer lists which may span lines.  Files whose name ends in
//! `.gz` are decompressed on the fly.

use crate::data::{Clause, Literal};

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, prelude::*, BufReader};
use std::mem;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DimacsError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("no 'p cnf' header before end of input")]
    MissingHeader,
    #[error("line {line}: expected 'p cnf <vars> <clauses>', got \"{found}\"")]
    BadHeader { line: usize, found: String },
    #[error("line {line}: \"{token}\" is not a literal")]
    BadLiteral { line: usize, token: String },
    #[error("line {line}: literal {lit} out of range (header declared {vars} vars)")]
    LiteralOutOfRange { line: usize, lit: i32, vars: u32 },
    #[error("last clause is missing its terminating 0")]
    UnterminatedClause,
}

/// Returns (nvars, the clauses)
pub fn read_path(path: impl AsRef<Path>) -> Result<(u32, Vec<Clause>), DimacsError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        read(BufReader::new(GzDecoder::new(file)))
    } else {
        read(BufReader::new(file))
    }
}

/// Returns (nvars, the clauses)
pub fn read(reader: impl BufRead) -> Result<(u32, Vec<Clause>), DimacsError> {
    let mut lines = reader.lines().enumerate();

    let (nvars, declared) = loop {
        let (ln, line) = match lines.next() {
            Some((ln, line)) => (ln + 1, line?),
            None => return Err(DimacsError::MissingHeader),
        };
        let line = line.trim_start();

        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        break parse_header(ln, line)?;
    };

    let mut clauses = Vec::with_capacity(declared);
    let mut current = Clause::new();
    let mut parsed = 0usize;

    for (ln, line) in lines {
        let line = line?;
        let ln = ln + 1;
        if line.starts_with('c') {
            continue;
        }
        // uniform random benchmark sets end with a '%' marker
        if line.starts_with('%') {
            break;
        }

        for token in line.split_whitespace() {
            let n: i32 = token.parse().map_err(|_| DimacsError::BadLiteral {
                line: ln,
                token: token.to_string(),
            })?;
            if n == 0 {
                parsed += 1;
                if let Some(clause) = normalize(mem::take(&mut current)) {
                    clauses.push(clause);
                }
                continue;
            }
            if n.unsigned_abs() > nvars {
                return Err(DimacsError::LiteralOutOfRange {
                    line: ln,
                    lit: n,
                    vars: nvars,
                });
            }
            current.push(Literal::from_dimacs(n));
        }
    }

    if !current.is_empty() {
        return Err(DimacsError::UnterminatedClause);
    }
    if parsed != declared {
        log::warn!("header declared {} clauses, read {}", declared, parsed);
    }

    Ok((nvars, clauses))
}

fn parse_header(line_no: usize, line: &str) -> Result<(u32, usize), DimacsError> {
    let bad = || DimacsError::BadHeader {
        line: line_no,
        found: line.to_string(),
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 || parts[0] != "p" || parts[1] != "cnf" {
        return Err(bad());
    }
    let nvars = parts[2].parse().map_err(|_| bad())?;
    let nclauses = parts[3].parse().map_err(|_| bad())?;
    Ok((nvars, nclauses))
}

/// Sort, drop duplicate literals, and throw the clause away entirely if it's
/// a tautology
fn normalize(mut clause: Clause) -> Option<Clause> {
    clause.sort();
    let mut out = Clause::new();
    for &lit in clause.iter() {
        match out.last() {
            Some(&prev) if prev == lit => continue,
            // same var, opposite sign: x or -x is always true
            Some(&prev) if prev.var_id() == lit.var_id() => return None,
            _ => out.push(lit),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Result<(u32, Vec<Clause>), DimacsError> {
        read(Cursor::new(input))
    }

    #[test]
    fn plain_problem() {
        let (nvars, clauses) = parse("c a comment\np cnf 3 2\n1 -2 0\n2 3 0\n").unwrap();
        assert_eq!(nvars, 3);
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0][1], Literal::from_dimacs(-2));
    }

    #[test]
    fn clause_spanning_lines() {
        let (_, clauses) = parse("p cnf 4 1\n1 2\n3\n4 0\n").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].len(), 4);
    }

    #[test]
    fn tautologies_and_duplicates() {
        let (_, clauses) = parse("p cnf 2 2\n1 -1 0\n2 2 1 0\n").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].len(), 2);
    }

    #[test]
    fn percent_terminator() {
        let (_, clauses) = parse("p cnf 1 1\n1 0\n%\n0\n").unwrap();
        assert_eq!(clauses.len(), 1);
    }

    #[test]
    fn missing_header() {
        assert!(matches!(parse("c nothing\n"), Err(DimacsError::MissingHeader)));
    }

    #[test]
    fn bad_header() {
        assert!(matches!(
            parse("p cnf many 2\n"),
            Err(DimacsError::BadHeader { line: 1, .. })
        ));
    }

    #[test]
    fn literal_out_of_range() {
        assert!(matches!(
            parse("p cnf 2 1\n1 3 0\n"),
            Err(DimacsError::LiteralOutOfRange { lit: 3, vars: 2, .. })
        ));
    }

    #[test]
    fn unterminated_clause() {
        assert!(matches!(
            parse("p cnf 2 1\n1 2\n"),
            Err(DimacsError::UnterminatedClause)
        ));
    }

    #[test]
    fn empty_clause_is_kept() {
        let (_, clauses) = parse("p cnf 1 1\n0\n").unwrap();
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].is_empty());
    }
}
