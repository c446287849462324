//! Command-line options, and how they map onto solver knobs

use crate::budget::Budget;
use crate::simplify::ElimLimits;

use clap::Parser;
use std::path::PathBuf;

/// A simplifying CDCL SAT solver for DIMACS CNF files
#[derive(Debug, Parser)]
#[command(name = "settle", version)]
pub struct Config {
    /// DIMACS CNF input; decompressed on the fly if the name ends in .gz
    pub input: PathBuf,

    /// Completely turn off preprocessing
    #[arg(long = "no-pre")]
    pub no_preprocess: bool,

    /// Limit on CPU time allowed, in seconds
    #[arg(long = "cpu-lim", value_name = "SECS")]
    pub cpu_limit: Option<u64>,

    /// Limit on memory usage, in megabytes
    #[arg(long = "mem-lim", value_name = "MB")]
    pub mem_limit: Option<u64>,

    /// Give up after this many conflicts
    #[arg(long = "conflicts", value_name = "N")]
    pub conflict_limit: Option<u64>,

    /// Only eliminate a variable if one polarity occurs at most this often
    #[arg(long = "elim-occ-lim", value_name = "N", default_value_t = 10)]
    pub elim_occ_limit: u32,

    /// Extra clauses an elimination is allowed to add
    #[arg(long = "elim-grow", value_name = "N", default_value_t = 0)]
    pub elim_grow: usize,

    /// Luby restart unit, in conflicts
    #[arg(
        long = "restart-interval",
        value_name = "N",
        default_value_t = 256,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub restart_interval: u64,

    /// Don't print the model
    #[arg(long = "no-model")]
    pub no_model: bool,
}

impl Config {
    pub fn budget(&self) -> Budget {
        let mut budget = Budget::unlimited();
        if let Some(secs) = self.cpu_limit {
            budget = budget.with_cpu_limit(secs);
        }
        if let Some(mb) = self.mem_limit {
            budget = budget.with_memory_limit(mb);
        }
        if let Some(n) = self.conflict_limit {
            budget = budget.with_conflict_limit(n);
        }
        budget
    }

    pub fn elim_limits(&self) -> ElimLimits {
        ElimLimits {
            occ_limit: self.elim_occ_limit,
            grow: self.elim_grow,
        }
    }
}
