//! DIMACS CNF reader feeding clauses straight into a solver.
//!
//! Accepts plain text or, for paths ending in `.gz`, a gzip stream. The
//! reader is tolerant about layout (clauses may span lines) but strict
//! about tokens: anything that is not a comment, the header, or a signed
//! integer is a hard error carrying the line it appeared on.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use log::debug;

use crate::{Lit, Solver, Var, LBOOL_UNDEF};

#[derive(Debug)]
pub enum ParseError {
    Io(io::Error),
    Syntax { line: usize, message: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(err) => write!(f, "i/o error: {}", err),
            ParseError::Syntax { line, message } => {
                write!(f, "parse error at line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        ParseError::Io(err)
    }
}

/// Parse the file at `path` into `solver`, transparently decompressing
/// gzip by extension. Returns the variable count declared in the header,
/// which may exceed the highest variable actually used.
pub fn parse_dimacs_file(path: &Path, solver: &mut Solver) -> Result<usize, ParseError> {
    let file = File::open(path)?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        parse_dimacs(BufReader::new(GzDecoder::new(file)), solver)
    } else {
        parse_dimacs(BufReader::new(file), solver)
    }
}

/// Parse DIMACS text into `solver`. The header is mandatory; variables
/// referenced beyond the declared count still grow the solver.
pub fn parse_dimacs(reader: impl BufRead, solver: &mut Solver) -> Result<usize, ParseError> {
    let mut declared_vars: Option<usize> = None;
    let mut declared_clauses = 0usize;
    let mut read_clauses = 0usize;
    let mut clause: Vec<Lit> = Vec::new();
    let mut line_no = 0usize;

    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        let mut tokens = line.split_whitespace().peekable();

        match tokens.peek().copied() {
            None => continue,
            Some(t) if t.starts_with('c') => continue,
            Some("p") => {
                if declared_vars.is_some() {
                    return Err(syntax(line_no, "duplicate problem header"));
                }
                tokens.next();
                if tokens.next() != Some("cnf") {
                    return Err(syntax(line_no, "expected 'p cnf <vars> <clauses>'"));
                }
                let vars = parse_count(tokens.next(), line_no, "variable count")?;
                declared_clauses = parse_count(tokens.next(), line_no, "clause count")?;
                if tokens.next().is_some() {
                    return Err(syntax(line_no, "trailing tokens after problem header"));
                }
                while solver.num_vars() < vars {
                    solver.new_var(LBOOL_UNDEF, true);
                }
                declared_vars = Some(vars);
                continue;
            }
            Some(_) => {}
        }

        if declared_vars.is_none() {
            return Err(syntax(line_no, "clause before the problem header"));
        }

        for token in tokens {
            let value: i64 = token
                .parse()
                .map_err(|_| syntax(line_no, &format!("bad literal '{}'", token)))?;
            if value == 0 {
                solver.add_clause(clause.drain(..));
                read_clauses += 1;
                continue;
            }
            let var = Var(value.unsigned_abs() as i32 - 1);
            while solver.num_vars() <= var.idx() {
                solver.new_var(LBOOL_UNDEF, true);
            }
            clause.push(Lit::new(var, value < 0));
        }
    }

    if !clause.is_empty() {
        return Err(syntax(line_no, "unterminated clause at end of input"));
    }
    let declared_vars = declared_vars.ok_or_else(|| syntax(line_no, "missing problem header"))?;
    if read_clauses != declared_clauses {
        debug!(
            "header declared {} clauses, read {}",
            declared_clauses, read_clauses
        );
    }

    Ok(declared_vars)
}

fn syntax(line: usize, message: &str) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.to_string(),
    }
}

fn parse_count(token: Option<&str>, line: usize, what: &str) -> Result<usize, ParseError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| syntax(line, &format!("bad {}", what)))
}
