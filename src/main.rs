use anyhow::Result;
use clap::Parser;
use intentflow::cli::{self, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    cli::run(args)
}
