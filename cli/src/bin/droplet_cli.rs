use clap::{Parser, Subcommand};
use cli::ScoringJob;
use color_eyre::eyre::Result;
use droplet::{
    io::{collect_records, load_rgb, save_json},
    DropletError, SampleScore, SegmentationConfig, WatershedSegmenter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment and score every sample of a job file
    Score {
        /// Path to the job file (.toml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Segment a single image and save its label map
    Segment {
        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the 16-bit label map
        #[arg(short, long)]
        output: PathBuf,
        /// Run a single watershed fold instead of two
        #[arg(long)]
        single_fold: bool,
        /// Regions above this pixel count are dropped
        #[arg(long, default_value = "10000")]
        large_region_pixel_cap: usize,
        /// Floor for the adaptive small-region cutoff
        #[arg(long, default_value = "100")]
        pixel_diff_threshold: usize,
        /// Kernel used to grow cleaned regions back
        #[arg(long, default_value = "5")]
        dilate_kernel_size: u32,
        /// Reject regions with polymodal chord profiles
        #[arg(long)]
        remove_artifacts: bool,
        /// Also write the double-fold decisions as JSON next to the label map
        #[arg(long)]
        report: bool,
    },
    /// Print the JSON schema of the job file
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score { config } => {
            score_job(&config).await?;
        }
        Commands::Segment {
            input,
            output,
            single_fold,
            large_region_pixel_cap,
            pixel_diff_threshold,
            dilate_kernel_size,
            remove_artifacts,
            report,
        } => {
            let config = SegmentationConfig {
                double_fold: !single_fold,
                large_region_pixel_cap,
                pixel_diff_threshold,
                dilate_kernel_size,
                remove_artifacts,
                ..SegmentationConfig::default()
            };
            segment_image(&input, &output, config, report)?;
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(ScoringJob);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

async fn score_job(config_path: &Path) -> Result<()> {
    let job = Arc::new(ScoringJob::from_file(config_path)?);
    info!("Scoring {} samples from {:?}", job.samples.len(), config_path);
    std::fs::create_dir_all(&job.output_dir)?;

    let mut handles = Vec::with_capacity(job.samples.len());
    for index in 0..job.samples.len() {
        let job = Arc::clone(&job);
        handles.push(tokio::task::spawn_blocking(move || score_sample(&job, index)));
    }

    let mut scores: Vec<SampleScore> = Vec::new();
    for (handle, sample) in handles.into_iter().zip(&job.samples) {
        match handle.await? {
            Ok(score) => {
                info!(
                    "{}: {} droplets, total loss {:.4}",
                    score.sample_id, score.region_count, score.total_loss
                );
                scores.push(score);
            }
            Err(e) => warn!("Skipping sample '{}': {}", sample.id, e),
        }
    }

    save_json(&scores, job.output_dir.join("scores.json"))?;
    save_json(&collect_records(&scores), job.output_dir.join("droplets.json"))?;
    let observations = job.observations(&scores)?;
    if !observations.is_empty() {
        save_json(&observations, job.output_dir.join("observations.json"))?;
    }

    info!("Scored {}/{} samples into {:?}", scores.len(), job.samples.len(), job.output_dir);
    Ok(())
}

fn score_sample(job: &ScoringJob, index: usize) -> Result<SampleScore, cli::JobError> {
    let sample = &job.samples[index];
    let pipeline = job.pipeline_for(sample)?;
    let image = load_rgb(&sample.path)?;
    let result = pipeline.process(&sample.id, &image)?;
    if job.save_label_maps {
        result
            .labels
            .save_png(job.output_dir.join(format!("{}_labels.png", sample.id)))?;
    }
    Ok(result.score)
}

fn segment_image(input: &Path, output: &Path, config: SegmentationConfig, report: bool) -> Result<()> {
    use droplet::Segmenter;

    let image = load_rgb(input)?;
    let segmenter = WatershedSegmenter::new(config)?;
    let labels = if report && segmenter.config().double_fold {
        let detail = segmenter.segment_detailed(&image)?;
        let summary = serde_json::json!({
            "removed_large": detail.removed_large,
            "small_cutoff": detail.small_cutoff,
            "removed_small": detail.removed_small,
            "rejected_artifacts": detail.rejected_artifacts,
            "first_pass_regions": detail.first_pass.region_count(),
            "second_pass_regions": detail.second_pass.region_count(),
        });
        save_json(&summary, output.with_extension("json"))?;
        detail.droplet_count
    } else {
        segmenter.segment(&image)?
    };

    if labels.region_count() == 0 {
        return Err(DropletError::EmptySegmentation.into());
    }
    labels.save_png(output)?;
    info!("Wrote {} droplet regions to {:?}", labels.region_count(), output);
    Ok(())
}
