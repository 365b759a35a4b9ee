use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use article_image_downloader::{
    AppError, DownloadOptions, FilterOptions, ImagePipeline, PipelineConfig, TaskStatus,
};
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "article-image-downloader", version, about = "Download the images of an article as a zip")]
struct Cli {
    /// JSON file with pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse an article and download its images
    Download(DownloadArgs),
    /// Fetch a single image through the proxy and save it
    Proxy {
        url: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct DownloadArgs {
    url: String,

    #[arg(long)]
    exclude_avatar: bool,
    #[arg(long)]
    exclude_gif: bool,
    #[arg(long)]
    exclude_small: bool,

    /// Download the URLs as found instead of their high-quality variants
    #[arg(long)]
    no_original: bool,

    /// Image indices to download (comma separated); all when omitted
    #[arg(long, value_delimiter = ',')]
    select: Vec<usize>,

    /// Only list the images that would be downloaded
    #[arg(long)]
    list_only: bool,

    #[arg(long)]
    download_dir: Option<PathBuf>,
    #[arg(long)]
    temp_dir: Option<PathBuf>,
    #[arg(long)]
    workers: Option<usize>,

    /// Print the final task status as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "aborted");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Download(args) => {
            if let Some(dir) = &args.download_dir {
                config.download_dir = dir.clone();
            }
            if let Some(dir) = &args.temp_dir {
                config.temp_dir = dir.clone();
            }
            if let Some(workers) = args.workers {
                config.max_workers = workers;
            }
            download(ImagePipeline::new(config)?, args).await
        }
        Command::Proxy { url, output } => {
            let pipeline = ImagePipeline::new(config)?;
            let image = pipeline
                .proxy_image(&url)
                .await
                .map_err(|e| AppError::FetchFailure(e.to_string()))?;
            let mut file = tokio::fs::File::create(&output).await?;
            file.write_all(&image.data).await?;
            file.sync_all().await?;
            println!("Saved {}", output.display());
            for (name, value) in image.response_headers() {
                println!("  {}: {}", name, value);
            }
            Ok(())
        }
    }
}

async fn download(pipeline: ImagePipeline, args: DownloadArgs) -> Result<(), AppError> {
    let filters = FilterOptions {
        exclude_avatar: args.exclude_avatar,
        exclude_gif: args.exclude_gif,
        exclude_small: args.exclude_small,
    };
    let analysis = pipeline.analyze(&args.url, &filters).await?;

    println!("Task {}: {} images", analysis.task_id, analysis.images.len());
    for image in &analysis.images {
        let alt = if image.alt_text.is_empty() {
            String::new()
        } else {
            format!(" ({})", image.alt_text)
        };
        println!("  [{}] {}{}", image.index, image.preferred_url, alt);
    }
    if args.list_only {
        return Ok(());
    }

    let options = DownloadOptions {
        get_original: !args.no_original,
    };
    let selected = (!args.select.is_empty()).then_some(args.select.as_slice());
    pipeline.start_download(&analysis.task_id, selected, options)?;

    let mut last_completed = usize::MAX;
    let task = loop {
        let task = pipeline.status(&analysis.task_id)?;
        if task.completed != last_completed {
            last_completed = task.completed;
            println!(
                "[{:>5.1}%] {}/{} {}",
                task.progress(),
                task.completed,
                task.total,
                task.message
            );
        }
        if task.status.is_terminal() {
            break task;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    };

    if args.json {
        match serde_json::to_string_pretty(&task) {
            Ok(json) => println!("{}", json),
            Err(e) => error!(error = %e, "failed to serialize task status"),
        }
    }
    for e in &task.errors {
        println!("  ! {}", e);
    }

    match task.status {
        TaskStatus::Completed => {
            let archive = pipeline.fetch_archive(&analysis.task_id).await?;
            println!(
                "Archive: {} ({} bytes, {} images)",
                archive.path.display(),
                archive.size,
                task.successful_count
            );
            Ok(())
        }
        _ => Err(AppError::FetchFailure(task.message)),
    }
}
