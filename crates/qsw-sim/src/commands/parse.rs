use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Args;
use qsw_core::MeasurementParser;

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// File holding captured program output; standard input when omitted.
    pub file: Option<PathBuf>,
    /// Literal preceding the measurement.
    #[arg(long)]
    pub marker: Option<String>,
}

pub fn run(args: &ParseArgs) -> Result<(), Box<dyn Error>> {
    // Decoded the same lossy way the engine decodes captured stdout.
    let bytes = match &args.file {
        Some(path) => fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let parser = MeasurementParser {
        marker: args.marker.clone(),
    };
    match parser.parse(&text) {
        Some(value) => println!("{value}"),
        None => {
            println!("absent");
            std::process::exit(1);
        }
    }
    Ok(())
}
