use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Import the raw flights CSV files into a SQLite database
#[derive(Debug, Parser)]
#[command(name = "import_csv")]
struct Args
{   /// Directory holding airlines.csv, airports.csv, flights.csv
    #[arg(long, default_value = "raw_data")]
    dir: PathBuf

  , /// SQLite file to create or update
    #[arg(long, default_value = "flights.db")]
    db: PathBuf

  , /// Rows to read from each file; 0 imports everything
    #[arg(long, default_value_t = 10_000)]
    rows: usize
}

fn main() -> Result<(), Box<dyn std::error::Error>>
{   skyquery::logging::init_logging();
    let args = Args::parse();

    let max_rows = (args.rows > 0).then_some(args.rows);
    let imported = skyquery::database::import_directory(
      &args.db, &args.dir, max_rows
    )?;
    for (table, rows) in imported
    {   info!("{}: {} rows", table, rows);
    }
    Ok(())
}
