use cadastre_scan::{
    checkpoint::CheckpointStore, config::Args, info_time, logging, process::process_block, Result,
};
use chrono::Local;
use clap::Parser;
use log::error;

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let args = Args::parse();
    let _logger = logging::init(&args.log_level, &args.log_file)?;

    println!("\n{}", "=".repeat(50));
    println!(" LAND PARCEL SCANNER FOR A CADASTRAL BLOCK");
    println!("{}\n", "=".repeat(50));

    let report = match process_block(&args).await {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            return Err(e);
        }
    };

    if report.state.records.is_empty() {
        println!("\nNo parcels found. Check the cadastral block number.");
    } else {
        let export = CheckpointStore::new(&args.output_dir).export_path(&report.state.range.block);
        println!(
            "\nFound {} parcels. Results saved to:",
            report.state.records.len()
        );
        println!("- CSV file: {}", export.display());
        println!("- Log file: {}", args.log_file.display());
    }
    info_time!(start_time, "Full program time:");

    Ok(())
}
