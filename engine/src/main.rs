use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use slide_deck_common::config::Config;
use slide_deck_decoder::FfmpegSource;
use slide_deck_engine::deck::{write_deck, DirectorySink};
use slide_deck_engine::runner::{self, Outcome};
use slide_deck_engine::CancelToken;
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "slide-deck.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(video) = args.next().map(PathBuf::from) else {
        eprintln!("usage: slide-deck <video> [config.toml]");
        return ExitCode::from(2);
    };

    let config_path = args.next().map(PathBuf::from).or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.exists().then_some(default)
    });
    let config = match &config_path {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                return ExitCode::from(2);
            }
        },
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        video = %video.display(),
        config = ?config_path,
        metric = ?config.selection.metric,
        threshold = config.selection.similarity_threshold,
        stride = config.selection.sample_stride,
        output = %config.output.dir.display(),
        "starting slide-deck"
    );

    let mut cancel = CancelToken::new();
    if let Some(secs) = config.pipeline.deadline_secs {
        cancel = cancel.with_deadline(Duration::from_secs_f64(secs));
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current frame");
                cancel.cancel();
            }
        });
    }

    let source = match FfmpegSource::open(&config.source, &video) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "could not open video");
            return ExitCode::FAILURE;
        }
    };

    let result = if config.pipeline.prefetch {
        runner::run_pipelined(source, &config.selection, &cancel).await
    } else {
        tokio::task::block_in_place(|| runner::run(source, &config.selection, &cancel))
    };
    let run = match result {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "slide selection failed");
            return ExitCode::FAILURE;
        }
    };

    match run.outcome() {
        Outcome::Empty if run.stats.decoded_frames == 0 => {
            eprintln!("No frames could be decoded from {}.", video.display());
            return ExitCode::from(3);
        }
        Outcome::Empty => {
            eprintln!(
                "Decoded {} frames but found no slides. Try a lower selection.similarity_threshold or another selection.metric.",
                run.stats.decoded_frames
            );
            return ExitCode::from(3);
        }
        Outcome::Partial => {
            warn!(
                slides = run.slides.len(),
                "run was cancelled, the deck covers only the scanned part of the video"
            );
        }
        Outcome::Slides => {}
    }

    let mut sink = match DirectorySink::create(&config.output.dir, config.output.manifest) {
        Ok(sink) => sink.with_source(&video),
        Err(e) => {
            error!(error = %e, "could not prepare output directory");
            return ExitCode::FAILURE;
        }
    };
    match write_deck(&mut sink, &run) {
        Ok(count) => {
            info!(slides = count, dir = %sink.dir().display(), "deck written");
            if run.outcome() == Outcome::Partial {
                eprintln!(
                    "Cancelled: wrote {count} slides to {} (partial deck).",
                    sink.dir().display()
                );
            } else {
                println!("Wrote {count} slides to {}.", sink.dir().display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to write deck");
            ExitCode::FAILURE
        }
    }
}
