use clap::{Parser, Subcommand};
use deforestation_analysis::config::AppConfig;
use deforestation_analysis::fetch::ResourceFetcher;
use deforestation_analysis::layers;
use deforestation_analysis::pipeline::Pipeline;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis pipeline and write layer/series descriptors
    Analyze {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print headline statistics for the configured dataset
    Summary {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let params = app_config.to_params()?;

            let pipeline = Pipeline::new(ResourceFetcher::new()?);
            let output = pipeline.run(&params).await?;

            let dir = &app_config.output.dir;
            fs::create_dir_all(dir)?;
            fs::write(
                dir.join("summary.json"),
                serde_json::to_vec_pretty(&output.summary)?,
            )?;
            fs::write(
                dir.join("markers.json"),
                serde_json::to_vec_pretty(&output.markers)?,
            )?;
            fs::write(
                dir.join("series.json"),
                serde_json::to_vec_pretty(&output.series)?,
            )?;
            if let Some(view) = &output.view {
                fs::write(dir.join("view.json"), serde_json::to_vec_pretty(view)?)?;
            }
            if let Some(cluster_markers) = &output.cluster_markers {
                fs::write(
                    dir.join("cluster_markers.json"),
                    serde_json::to_vec_pretty(cluster_markers)?,
                )?;
            }

            println!(
                "Analysis complete: {} markers, {} series points -> {:?}",
                output.markers.len(),
                output.series.len(),
                dir
            );
        }
        Commands::Summary { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let params = app_config.to_params()?;

            let fetcher = ResourceFetcher::new()?;
            let dataset = fetcher.fetch_csv(&params.csv_url).await?;
            let summary = layers::summarize(&dataset);

            println!("Records: {}", summary.records);
            println!("Total deforested area: {} ha", summary.total_deforested_area);
            match summary.mean_deforestation_rate {
                Some(rate) => println!("Mean deforestation rate: {rate:.2}%"),
                None => println!("Mean deforestation rate: n/a"),
            }
        }
    }

    Ok(())
}
