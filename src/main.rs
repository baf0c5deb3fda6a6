use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::TypedValueParser;
use clap::Parser;

use autoreader::config::{DEFAULT_INPUT_DIR, DEFAULT_MODEL_DIR, DEFAULT_OUTPUT_DIR};
use autoreader::engines::kokoro::{EspeakConfig, KokoroEngine, KokoroModelParams};
use autoreader::segmenter::DEFAULT_MAX_LEN;
use autoreader::sink::detect_player;
use autoreader::{
    pipeline, ReaderError, RunConfig, RunConfigBuilder, SynthesisEngine, Voice, SPEED_RANGE,
};

#[derive(Parser, Debug)]
#[command(
    name = "autoreader",
    version,
    about = "AutoReader - Convert text files to speech using Kokoro-82M"
)]
struct Cli {
    /// Text file to read. Without it, every .txt file in --input-dir is read
    input: Option<PathBuf>,

    /// Output audio file (single-file mode only) [default: <output-dir>/<input stem>.wav]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Voice: af_bella, af_nicole, af_sarah, af_sky, am_adam, am_michael, bf_emma, bf_isabella, bm_george, bm_lewis
    #[arg(short, long, default_value = "af_bella", value_parser = parse_voice)]
    voice: Voice,

    /// Play audio out loud during generation (default)
    #[arg(short, long, overrides_with = "no_play")]
    play: bool,

    /// Don't play audio out loud
    #[arg(long, overrides_with = "play")]
    no_play: bool,

    /// Save audio to disk (default)
    #[arg(short, long, overrides_with = "no_save")]
    save: bool,

    /// Don't save audio to disk, just play it
    #[arg(long, overrides_with = "save")]
    no_save: bool,

    /// Speech speed multiplier, 0.5-2.0 (also accepted as -sp)
    #[arg(long, default_value_t = 1.0, value_parser = parse_speed)]
    speed: f32,

    /// Also keep each segment as its own WAV with a <stem>_segments.txt index
    #[arg(long)]
    keep_segments: bool,

    /// Longest text segment sent to the model in one call, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LEN, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    max_chars: usize,

    /// Folder read when no input file is given
    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Folder for derived output files
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Directory with the Kokoro .onnx model and voices-v1.0.bin
    #[arg(long, env = "AUTOREADER_MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
    model_dir: PathBuf,

    /// ONNX Runtime CPU threads
    #[arg(long)]
    threads: Option<usize>,

    /// espeak-ng executable to use instead of the one on PATH
    #[arg(long)]
    espeak_bin: Option<PathBuf>,

    /// espeak-ng data directory
    #[arg(long)]
    espeak_data: Option<PathBuf>,

    /// List the available voices and exit
    #[arg(long)]
    list_voices: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<RunConfig, String> {
        RunConfigBuilder::default()
            .input(self.input)
            .output(self.output)
            .input_dir(self.input_dir)
            .output_dir(self.output_dir)
            .voice(self.voice)
            .speed(self.speed)
            .play(!self.no_play)
            .save(!self.no_save)
            .keep_segments(self.keep_segments)
            .max_segment_len(self.max_chars)
            .model_dir(self.model_dir)
            .num_threads(self.threads)
            .espeak_bin(self.espeak_bin)
            .espeak_data(self.espeak_data)
            .build()
            .map_err(|e| e.to_string())
    }
}

fn parse_voice(s: &str) -> Result<Voice, String> {
    s.parse().map_err(|e: ReaderError| e.to_string())
}

fn parse_speed(s: &str) -> Result<f32, String> {
    let speed: f32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if SPEED_RANGE.contains(&speed) {
        Ok(speed)
    } else {
        Err(format!(
            "speed must be between {} and {}",
            SPEED_RANGE.start(),
            SPEED_RANGE.end()
        ))
    }
}

/// Rewrite the two-letter `-sp` flag to `--speed`, since clap would read it
/// as `-s -p`. Arguments after `--` are left alone.
fn expand_speed_alias<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    let mut options_done = false;
    args.into_iter()
        .map(|arg| {
            if options_done {
                return arg;
            }
            match arg.to_str() {
                Some("--") => {
                    options_done = true;
                    arg
                }
                Some("-sp") => OsString::from("--speed"),
                Some(s) if s.starts_with("-sp") => {
                    let value = s["-sp".len()..].trim_start_matches('=');
                    OsString::from(format!("--speed={value}"))
                }
                _ => arg,
            }
        })
        .collect()
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug,ort=info" } else { "info,ort=warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn print_voices() {
    for voice in Voice::ALL {
        println!("{:<12} {:?} {:?}", voice.id(), voice.accent(), voice.gender());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(expand_speed_alias(std::env::args_os()));
    init_logging(cli.verbose);

    if cli.list_voices {
        print_voices();
        return ExitCode::SUCCESS;
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let player = if config.play {
        match detect_player() {
            Ok(player) => {
                log::debug!("Playing audio with {}", player.name());
                Some(player)
            }
            Err(e) => {
                log::warn!("{e}; playback disabled");
                None
            }
        }
    } else {
        None
    };

    let load_engine = || -> Result<KokoroEngine, ReaderError> {
        let mut engine = KokoroEngine::with_espeak(EspeakConfig {
            bin_path: config.espeak_bin.clone(),
            data_path: config.espeak_data.clone(),
        });
        log::info!("Loading Kokoro TTS model...");
        engine.load_model_with_params(
            &config.model_dir,
            KokoroModelParams {
                num_threads: config.num_threads,
            },
        )?;
        Ok(engine)
    };

    match pipeline::run(&config, load_engine, player.as_deref()) {
        Ok(summary) => {
            for report in &summary.completed {
                match &report.sink.output {
                    Some(output) => log::info!("Success! Audio saved to {}", output.display()),
                    None => log::info!(
                        "Success! {} played without saving to disk",
                        report.input.display()
                    ),
                }
            }
            if summary.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                for (input, e) in &summary.failed {
                    log::error!("{} failed: {e}", input.display());
                }
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
