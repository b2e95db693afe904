//! # Main — CLI Entry Point
//!
//! Thin driver over the library: `factor` runs the quadratic sieve on a
//! decimal integer (small factors peeled by trial division first), `primes`
//! lists an Atkin segment, `dlog` computes a discrete log in (Z/mZ)*.
//!
//! Exit codes: 0 on success, 1 when no result was produced within budget
//! (or the input fails a precondition the driver can report politely).
//!
//! ## Global behaviour
//!
//! - Structured logging via `tracing`: human-readable on stderr, or JSON
//!   when `LOG_FORMAT=json`.
//! - `--fb-bound` / `--sieve-len` of 0 select size-based auto-tuning.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rug::Integer;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use eisensieve::dlog::{CyclicGroup, MultMod, PrimitiveRoot};
use eisensieve::qs::{quadratic_sieve, QsParams};
use eisensieve::{atkin, dlog, small_factor};

#[derive(Parser)]
#[command(name = "eisensieve", about = "Quadratic sieve factoring, Atkin primes, discrete logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Factor a composite integer with the quadratic sieve
    Factor {
        /// The integer to factor, in decimal
        n: String,

        /// Factor-base bound b (primes up to b; 0 = auto-tune by size)
        #[arg(long, default_value_t = 0)]
        fb_bound: u64,

        /// Sieve window length t (0 = auto-tune by size)
        #[arg(long, default_value_t = 0)]
        sieve_len: u64,

        /// How many sieve windows to try before giving up
        #[arg(long, default_value_t = 64)]
        max_windows: u32,

        /// Stop after the first GF(2) dependency instead of walking more
        #[arg(long)]
        no_retry: bool,

        /// Seed for the linear solver's probe vectors
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// List the primes in [lo, lo + len) via the sieve of Atkin
    Primes {
        /// Lower bound of the segment
        #[arg(long)]
        lo: u64,
        /// Segment length
        #[arg(long)]
        len: u64,
    },
    /// Discrete logarithm: the e with base^e ≡ target (mod modulus)
    Dlog {
        /// Modulus m; (Z/mZ)* must be cyclic (2, 4, p^k or 2p^k)
        #[arg(long)]
        modulus: String,
        /// A primitive root mod m
        #[arg(long)]
        base: String,
        /// Target residue, coprime to m
        #[arg(long)]
        target: String,
    },
}

fn main() -> Result<()> {
    // Structured logging: LOG_FORMAT=json for machines, human-readable otherwise
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_target(false).init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Factor {
            n,
            fb_bound,
            sieve_len,
            max_windows,
            no_retry,
            seed,
        } => run_factor(&n, fb_bound, sieve_len, max_windows, no_retry, seed),
        Commands::Primes { lo, len } => {
            for p in atkin::sieve_segment(lo, len).primes() {
                println!("{}", p);
            }
            Ok(())
        }
        Commands::Dlog {
            modulus,
            base,
            target,
        } => run_dlog(&modulus, &base, &target),
    }
}

fn parse_integer(s: &str, what: &str) -> Result<Integer> {
    s.parse::<Integer>()
        .map_err(|_| anyhow!("{} must be a decimal integer, got {:?}", what, s))
}

fn run_factor(
    n: &str,
    fb_bound: u64,
    sieve_len: u64,
    max_windows: u32,
    no_retry: bool,
    seed: u64,
) -> Result<()> {
    let n = parse_integer(n, "n")?;
    if n <= 1u32 {
        bail!("nothing to factor: n must exceed 1");
    }

    // Easy outs before the sieve: table primes, then primality.
    if let Some(p) = small_factor(&n) {
        println!("{}", p);
        return Ok(());
    }
    if n.is_probably_prime(25) != rug::integer::IsPrime::No {
        bail!("{} is prime", n);
    }

    let mut params = QsParams::tuned_for(&n);
    if fb_bound > 0 {
        params.fb_bound = fb_bound;
    }
    if sieve_len > 0 {
        params.sieve_len = sieve_len;
    }
    params.max_windows = max_windows;
    params.retry_dependencies = !no_retry;
    params.seed = seed;

    let factor = quadratic_sieve(&n, &params, None)
        .with_context(|| format!("no factor of {} found within {} windows", n, max_windows))?;
    println!("{}", factor);
    Ok(())
}

fn run_dlog(modulus: &str, base: &str, target: &str) -> Result<()> {
    let m = parse_integer(modulus, "modulus")?;
    let group = CyclicGroup::classify(&m)
        .ok_or_else(|| anyhow!("(Z/{}Z)* is not cyclic; use 2, 4, p^k or 2p^k", m))?;

    let base = parse_integer(base, "base")?;
    let base = PrimitiveRoot::new(&base, &group)
        .ok_or_else(|| anyhow!("{} is not a primitive root mod {}", base, m))?;

    let target = parse_integer(target, "target")?;
    let target = MultMod::new(&target, &m)
        .ok_or_else(|| anyhow!("{} is not a unit mod {}", target, m))?;

    let e = dlog::discrete_log_with_budget(&group, &base, &target, dlog::DEFAULT_RHO_ATTEMPTS)
        .ok_or_else(|| anyhow!("collision search budget exhausted"))?;
    println!("{}", e);
    Ok(())
}
