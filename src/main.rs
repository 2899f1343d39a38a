//! Command-line entry point for one-shot and recurring captures.

#[cfg(feature = "cdp")]
mod cli {
    use clap::{Parser, Subcommand};
    use log::info;
    use std::path::PathBuf;
    use std::time::Duration;
    use webshot::{
        CaptureTarget, CaptureTask, JobConfig, Service, ServiceConfig, Viewport,
    };

    #[derive(Parser)]
    #[command(name = "webshot", about = "Capture web page screenshots with headless Chrome")]
    struct Cli {
        /// Maximum number of captures running concurrently
        #[arg(long, default_value_t = 5)]
        max_concurrent: usize,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Capture a single page and write the PNG to a file
        Shot {
            /// Page URL to capture
            url: String,
            /// Output file
            #[arg(short, long)]
            output: PathBuf,
            #[arg(long, default_value_t = 1920)]
            width: u32,
            #[arg(long, default_value_t = 1080)]
            height: u32,
            /// Capture only this element
            #[arg(long)]
            selector: Option<String>,
            /// Capture the full page height
            #[arg(long)]
            full_page: bool,
            /// Extra settle time after navigation, in milliseconds
            #[arg(long)]
            wait_for: Option<u64>,
            /// Abandon the capture after this many milliseconds
            #[arg(long)]
            deadline_ms: Option<u64>,
        },
        /// Run a recurring capture for a number of cycles, then stop
        Watch {
            /// Page URL to capture
            url: String,
            /// Directory results are written to
            #[arg(short, long)]
            dir: PathBuf,
            /// Delay between captures, in milliseconds
            #[arg(long, default_value_t = 5000)]
            interval: u64,
            /// Keep at most this many result files
            #[arg(long)]
            keep: Option<usize>,
            /// Stop after this many captures
            #[arg(long, default_value_t = 3)]
            cycles: u64,
        },
    }

    pub async fn run() -> anyhow::Result<()> {
        env_logger::init();
        let cli = Cli::parse();

        let config = ServiceConfig {
            max_concurrent_jobs: cli.max_concurrent,
            ..Default::default()
        };
        let service = Service::with_cdp(config);

        match cli.command {
            Command::Shot {
                url,
                output,
                width,
                height,
                selector,
                full_page,
                wait_for,
                deadline_ms,
            } => {
                let mut target = CaptureTarget::new(url);
                target.viewport = Viewport { width, height };
                target.selector = selector;
                target.full_page = full_page;
                target.wait_for_ms = wait_for;

                let mut task = CaptureTask::page(target);
                if let Some(ms) = deadline_ms {
                    task = task.deadline(Duration::from_millis(ms));
                }

                let png = service.queue.submit(task).await?;
                std::fs::write(&output, &png)?;
                info!("wrote {} bytes to {}", png.len(), output.display());
            }
            Command::Watch {
                url,
                dir,
                interval,
                keep,
                cycles,
            } => {
                let mut job = JobConfig::new("watch", url, dir);
                job.interval_ms = interval;
                job.max_retained = keep;

                let id = service.scheduler.start(job)?;
                loop {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    let done = service
                        .scheduler
                        .status(&id)
                        .map(|s| s.result_count >= cycles)
                        .unwrap_or(true);
                    if done {
                        break;
                    }
                }
                service.scheduler.stop(&id);

                // Let the loop observe the stop flag before reporting.
                while service
                    .scheduler
                    .status(&id)
                    .map(|s| s.is_running)
                    .unwrap_or(false)
                {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }

                println!("{}", serde_json::to_string_pretty(&service.status())?);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "cdp")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}

#[cfg(not(feature = "cdp"))]
fn main() {
    eprintln!("webshot was built without the `cdp` feature; no engine backend is available");
    std::process::exit(1);
}
