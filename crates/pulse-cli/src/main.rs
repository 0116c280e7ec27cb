use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use pulse_lib::{
    detectors::ppg::detect_peaks_with_config,
    io::{csv as csv_io, text as text_io},
    metrics::{
        hrv::{hrv_batch, HrvSummary},
        live::live_bpm,
    },
    pipeline::run_beat_pipeline,
    ring::SampleFeed,
    signal::{PpiSeries, Sample},
    synth::SyntheticPpg,
};
use pulse_run::{
    device::{Devices, Display, Input, SystemClock},
    history::JsonHistory,
    read_config,
    remote::{ChannelBroker, OfflineRemote},
    sampler::Sampler,
    session::{AnalysisMode, AnalysisOutcome, AnalysisSession, LiveSession},
    MetricsRecord, SessionConfig,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

#[derive(Parser)]
#[command(name = "pulse", version, about = "PPG heart-rate and HRV tools")]
struct Cli {
    /// TOML session configuration; defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect beat onsets in newline-delimited samples from stdin or --input file
    FindPeaks {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Convert samples to filtered peak-to-peak intervals (ms)
    Ppi {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        period_ms: Option<f64>,
    },
    /// Batch HRV from newline-delimited PPI values (ms)
    Hrv {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Run detection → PPI → HRV over a whole capture
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Read samples from this column of a CSV file instead of plain text
        #[arg(long, requires = "input")]
        csv_column: Option<String>,
    },
    /// Live BPM estimate from newline-delimited PPI values (ms)
    LiveBpm {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Timed analysis session against a synthetic sensor
    SimulateAnalysis {
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long)]
        duration_ms: Option<u64>,
        /// Score through an in-process remote service
        #[arg(long)]
        remote: bool,
        /// Directory for saved records (overrides the config)
        #[arg(long)]
        history: Option<PathBuf>,
        /// Uniform noise amplitude in ADC counts
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Draw the waveform on stderr
        #[arg(long)]
        waveform: bool,
    },
    /// Live heart-rate session against a synthetic sensor
    SimulateLive {
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long, default_value_t = 12_000)]
        stop_after_ms: u64,
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long)]
        waveform: bool,
    },
    /// List saved records as JSON lines, newest first
    History {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::FindPeaks { input } => cmd_find_peaks(&cfg, input.as_deref())?,
        Commands::Ppi { input, period_ms } => cmd_ppi(&cfg, input.as_deref(), period_ms)?,
        Commands::Hrv { input } => cmd_hrv(&cfg, input.as_deref())?,
        Commands::Analyze { input, csv_column } => {
            cmd_analyze(&cfg, input.as_deref(), csv_column.as_deref())?
        }
        Commands::LiveBpm { input } => cmd_live_bpm(&cfg, input.as_deref())?,
        Commands::SimulateAnalysis {
            bpm,
            duration_ms,
            remote,
            history,
            noise,
            seed,
            waveform,
        } => {
            let mut cfg = cfg;
            if let Some(ms) = duration_ms {
                cfg.analysis.duration_ms = ms;
            }
            if let Some(dir) = history {
                cfg.history_dir = dir;
            }
            let source = Simulation {
                bpm,
                noise,
                seed,
                waveform,
            };
            cmd_simulate_analysis(&cfg, &source, remote)?
        }
        Commands::SimulateLive {
            bpm,
            stop_after_ms,
            noise,
            seed,
            waveform,
        } => {
            let source = Simulation {
                bpm,
                noise,
                seed,
                waveform,
            };
            cmd_simulate_live(&cfg, &source, Duration::from_millis(stop_after_ms))?
        }
        Commands::History { dir } => cmd_history(dir.unwrap_or(cfg.history_dir))?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => read_config(path),
        None => Ok(SessionConfig::default()),
    }
}

fn read_values(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn cmd_find_peaks(cfg: &SessionConfig, input: Option<&Path>) -> Result<()> {
    let samples = read_values(input)?;
    let peaks = detect_peaks_with_config(&samples, &cfg.pipeline.detector);
    print_json(&peaks)
}

fn cmd_ppi(cfg: &SessionConfig, input: Option<&Path>, period_ms: Option<f64>) -> Result<()> {
    let mut pipeline = cfg.pipeline;
    if let Some(period) = period_ms {
        if period <= 0.0 {
            return Err(anyhow!("--period-ms must be positive"));
        }
        pipeline.sample_period_ms = period;
    }
    let samples = read_values(input)?;
    let peaks = detect_peaks_with_config(&samples, &pipeline.detector);
    let ppi = PpiSeries::from_peaks(&peaks, pipeline.sample_period_ms, pipeline.ppi_bounds);
    print_json(&ppi)
}

#[derive(Serialize)]
struct HrvOutput {
    status: &'static str,
    ppi_count: usize,
    hrv: Option<HrvSummary>,
}

fn cmd_hrv(cfg: &SessionConfig, input: Option<&Path>) -> Result<()> {
    let ppi = PpiSeries::new(read_values(input)?);
    let hrv = hrv_batch(&ppi, &cfg.analysis.hrv);
    print_json(&HrvOutput {
        status: status_for(&hrv),
        ppi_count: ppi.len(),
        hrv,
    })
}

#[derive(Serialize)]
struct AnalyzeOutput {
    status: &'static str,
    sample_count: usize,
    peak_count: usize,
    ppi: Vec<f64>,
    hrv: Option<HrvSummary>,
}

fn cmd_analyze(cfg: &SessionConfig, input: Option<&Path>, column: Option<&str>) -> Result<()> {
    let samples = match (input, column) {
        (Some(path), Some(column)) => csv_io::read_csv_column(path, column)?,
        _ => read_values(input)?,
    };
    let result = run_beat_pipeline(&samples, &cfg.pipeline, &cfg.analysis.hrv);
    print_json(&AnalyzeOutput {
        status: status_for(&result.hrv),
        sample_count: result.sample_count,
        peak_count: result.peaks.len(),
        ppi: result.ppi.ppi,
        hrv: result.hrv,
    })
}

fn status_for(hrv: &Option<HrvSummary>) -> &'static str {
    if hrv.is_some() {
        "ok"
    } else {
        "insufficient-data"
    }
}

#[derive(Serialize)]
struct LiveBpmOutput {
    ppi_count: usize,
    bpm: Option<u32>,
}

fn cmd_live_bpm(cfg: &SessionConfig, input: Option<&Path>) -> Result<()> {
    let ppi = read_values(input)?;
    print_json(&LiveBpmOutput {
        ppi_count: ppi.len(),
        bpm: live_bpm(&ppi, &cfg.live.bpm),
    })
}

struct Simulation {
    bpm: f64,
    noise: f64,
    seed: u64,
    waveform: bool,
}

impl Simulation {
    fn start(&self, cfg: &SessionConfig) -> Result<(Arc<SampleFeed>, Sampler)> {
        let period_ms = cfg.pipeline.sample_period_ms;
        let mut source = SyntheticPpg::new(self.bpm, period_ms);
        if self.noise > 0.0 {
            source = source.with_noise(self.noise, self.seed);
        }
        let feed = Arc::new(SampleFeed::new(cfg.fifo_capacity));
        let sampler = Sampler::start(
            source,
            Arc::clone(&feed),
            Duration::from_secs_f64(period_ms / 1000.0),
        )?;
        Ok((feed, sampler))
    }
}

/// Text rendering of the device screen on stderr.
struct ConsoleDisplay {
    waveform: bool,
}

impl Display for ConsoleDisplay {
    fn width(&self) -> usize {
        128
    }

    fn clear(&mut self) {
        eprintln!();
    }

    fn heading(&mut self, left: &str, right: &str) {
        eprintln!("[{left}] {right}");
    }

    fn texts(&mut self, lines: &[&str]) {
        for line in lines {
            eprintln!("{line}");
        }
    }

    fn centered_texts(&mut self, lines: &[&str]) {
        for line in lines {
            eprintln!("{line:^32}");
        }
    }

    fn draw_waveform(&mut self, value: Sample, min: Sample, max: Sample) {
        if !self.waveform {
            return;
        }
        let span = f64::from(max.saturating_sub(min).max(1));
        let level = (f64::from(value.saturating_sub(min)) / span * 40.0).round() as usize;
        eprintln!("{}*", " ".repeat(level));
    }
}

/// Confirms every prompt immediately and presses once `stop_after` has
/// passed since recording started.
struct AutoInput {
    feed: Arc<SampleFeed>,
    stop_after: Option<Duration>,
    started: Option<Instant>,
}

impl Input for AutoInput {
    fn single_press(&mut self) -> bool {
        if !self.feed.is_recording() {
            self.started = None;
            return true;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        self.stop_after
            .is_some_and(|limit| started.elapsed() >= limit)
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum SimulationOutput {
    Completed { record: MetricsRecord },
    InsufficientData { ppi_count: usize },
    Failed { message: String },
}

impl From<AnalysisOutcome> for SimulationOutput {
    fn from(outcome: AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::Completed(record) => SimulationOutput::Completed { record },
            AnalysisOutcome::InsufficientData { ppi_count } => {
                SimulationOutput::InsufficientData { ppi_count }
            }
            AnalysisOutcome::Failed(message) => SimulationOutput::Failed { message },
        }
    }
}

fn cmd_simulate_analysis(cfg: &SessionConfig, sim: &Simulation, remote: bool) -> Result<()> {
    let (feed, mut sampler) = sim.start(cfg)?;
    let mut display = ConsoleDisplay {
        waveform: sim.waveform,
    };
    let mut input = AutoInput {
        feed: Arc::clone(&feed),
        stop_after: None,
        started: None,
    };
    let clock = SystemClock::new();
    let mut store = JsonHistory::new(&cfg.history_dir);
    let mut dev = Devices {
        display: &mut display,
        input: &mut input,
        clock: &clock,
    };

    let outcome = if remote {
        let (mut broker, peer) = ChannelBroker::new();
        let responder = peer.spawn_loopback(cfg.analysis.hrv);
        let outcome = AnalysisSession::new(&feed, cfg, AnalysisMode::Remote).run(
            &mut dev,
            &mut store,
            &mut broker,
        );
        drop(broker);
        responder
            .join()
            .map_err(|_| anyhow!("remote responder panicked"))?;
        outcome
    } else {
        AnalysisSession::new(&feed, cfg, AnalysisMode::Local).run(
            &mut dev,
            &mut store,
            &mut OfflineRemote,
        )
    };
    sampler.stop();
    info!("simulation finished, {} samples overwritten", feed.ring().dropped());
    print_json(&SimulationOutput::from(outcome))
}

fn cmd_simulate_live(cfg: &SessionConfig, sim: &Simulation, stop_after: Duration) -> Result<()> {
    let (feed, mut sampler) = sim.start(cfg)?;
    let mut display = ConsoleDisplay {
        waveform: sim.waveform,
    };
    let mut input = AutoInput {
        feed: Arc::clone(&feed),
        stop_after: Some(stop_after),
        started: None,
    };
    let clock = SystemClock::new();
    let mut dev = Devices {
        display: &mut display,
        input: &mut input,
        clock: &clock,
    };
    let report = LiveSession::new(&feed, cfg).run(&mut dev);
    sampler.stop();
    print_json(&report)
}

fn cmd_history(dir: PathBuf) -> Result<()> {
    let history = JsonHistory::new(dir);
    for record in history.load_all()? {
        print_json(&record)?;
    }
    Ok(())
}
