use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::ValueEnum;
use probe_tally::ChainedTable;
use probe_tally::FrequencyTable;
use probe_tally::SortOrder;
use probe_tally::Tally;
use probe_tally::TableConfig;
use probe_tally::token::tally_reader;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    /// Highest count first.
    Desc,
    /// Lowest count first.
    Asc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Desc => SortOrder::Descending,
            Order::Asc => SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Open addressing with linear probing.
    Probing,
    /// Separate chaining.
    Chaining,
}

/// Counts newline-delimited words. A line starting with `-` decrements the
/// rest of the line if that word has already been seen.
#[derive(Parser, Debug)]
#[command(name = "probe-tally", version)]
struct Args {
    /// Input files; reads standard input when none are given or for `-`.
    files: Vec<PathBuf>,

    /// Output order of the counts.
    #[arg(short, long, value_enum, default_value_t = Order::Desc)]
    order: Order,

    /// Collision strategy of the table.
    #[arg(short, long, value_enum, default_value_t = Strategy::Probing)]
    strategy: Strategy,

    /// Initial slot (or bucket) count, rounded up to a power of two.
    #[arg(short = 'c', long, default_value_t = TableConfig::DEFAULT_CAPACITY)]
    initial_capacity: usize,

    /// Load factor at which the table doubles.
    #[arg(short, long, default_value_t = TableConfig::DEFAULT_GROWTH_THRESHOLD)]
    growth_threshold: f64,

    /// Print table statistics to standard error.
    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = TableConfig::new()
        .initial_capacity(args.initial_capacity)
        .growth_threshold(args.growth_threshold);

    match args.strategy {
        Strategy::Probing => {
            let mut table = FrequencyTable::with_config(config)?;
            run(&args, &mut table)?;
            if args.stats {
                print_stats(&table)?;
            }
        }
        Strategy::Chaining => {
            let mut table = ChainedTable::with_config(config)?;
            run(&args, &mut table)?;
            if args.stats {
                print_summary(&table)?;
                eprintln!("Longest chain: {}", table.longest_chain());
            }
        }
    }

    Ok(())
}

fn run<T: Tally>(args: &Args, table: &mut T) -> anyhow::Result<()> {
    if args.files.is_empty() {
        tally_input(None, table)?;
    }
    for path in &args.files {
        tally_input(Some(path), table)?;
    }

    let stdout = std::io::stdout();
    let writer = BufWriter::new(stdout.lock());
    table
        .snapshot()
        .sorted(args.order.into())
        .write_lines(writer)
        .context("writing counts to stdout")?;

    Ok(())
}

fn tally_input<T: Tally>(path: Option<&PathBuf>, table: &mut T) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead> = match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(std::io::stdin().lock()),
    };

    let name = path.map_or_else(|| "<stdin>".into(), |p| p.display().to_string());
    let summary = tally_reader(reader, table).with_context(|| format!("tallying {name}"))?;
    if summary.ignored_decrements > 0 {
        eprintln!(
            "{name}: ignored {} decrement(s) of unseen words",
            summary.ignored_decrements
        );
    }

    Ok(())
}

fn print_summary<T: Tally>(table: &T) -> anyhow::Result<()> {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    writeln!(
        out,
        "Population: {}/{} ({:.2}% load factor)",
        table.len(),
        table.capacity(),
        table.load_factor() * 100.0
    )?;
    Ok(())
}

#[cfg(feature = "stats")]
fn print_stats(table: &FrequencyTable) -> anyhow::Result<()> {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    table.stats().print(&mut out)?;

    writeln!(out, "Probe length histogram:")?;
    for (distance, count) in table.probe_histogram().iter().enumerate() {
        if *count > 0 {
            writeln!(out, "  {distance:>4}: {count}")?;
        }
    }
    Ok(())
}

#[cfg(not(feature = "stats"))]
fn print_stats(table: &FrequencyTable) -> anyhow::Result<()> {
    print_summary(table)
}
