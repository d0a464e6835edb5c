// src/main.rs
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use sigscope::{
    render_capture_png, AcquisitionConfig, AcquisitionEngine, CaptureRecorder, PlotStyle,
    SimulatedSource, TriggerMode,
};

/// Run one triggered capture against the simulated signal source.
#[derive(Debug, Parser)]
#[command(name = "sigscope", version, about)]
struct Args {
    /// JSON acquisition config; defaults to channel 0, auto rising edge at 2048
    config: Option<PathBuf>,

    /// Frequency of the simulated sine
    #[arg(long, default_value_t = 1000.0)]
    signal_hz: f32,

    /// Directory to write the captured window to as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// File to render the captured window to as PNG
    #[arg(long)]
    png: Option<PathBuf>,
}

// 入口函数：用模拟信号源跑一次触发采集
fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AcquisitionConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AcquisitionConfig::new([0u8]).with_trigger(TriggerMode::AUTO_RISE, 2048),
    };
    info!("config: {}", serde_json::to_string(&config)?);

    let engine = AcquisitionEngine::new(SimulatedSource::new(args.signal_hz))?;
    engine.start(config)?;
    if !engine.wait_ready(Duration::from_secs(5)) {
        engine.stop();
        bail!("no trigger within 5 s");
    }

    println!(
        "captured at {:.1} Hz (decimation x{}), threshold {}",
        engine.effective_sample_rate(),
        engine.decimation_factor(),
        engine.trigger_threshold()
    );
    let frame = engine.snapshot()?;
    for (index, channel) in frame.channels.iter().enumerate() {
        let stats = engine.stats(index)?;
        println!(
            "Ch{}: min {} max {} avg {:.1} freq {:.1} Hz",
            channel.0, stats.min, stats.max, stats.average, stats.frequency_hz
        );
    }

    if let Some(dir) = &args.csv {
        let path = CaptureRecorder::new(dir).record("sim", &frame)?;
        println!("csv written to {}", path.display());
    }
    if let Some(path) = &args.png {
        let png = render_capture_png(&frame, PlotStyle::default())?;
        fs::write(path, png).with_context(|| format!("writing {}", path.display()))?;
        println!("plot written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults_and_options() {
        let args = Args::try_parse_from(["sigscope"]).unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.signal_hz, 1000.0);
        assert!(args.csv.is_none() && args.png.is_none());

        let args = Args::try_parse_from([
            "sigscope",
            "scope.json",
            "--signal-hz",
            "250",
            "--csv",
            "out",
            "--png",
            "cap.png",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("scope.json")));
        assert_eq!(args.signal_hz, 250.0);
        assert_eq!(args.csv, Some(PathBuf::from("out")));
        assert_eq!(args.png, Some(PathBuf::from("cap.png")));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Args::try_parse_from(["sigscope", "--bogus"]).is_err());
        assert!(Args::try_parse_from(["sigscope", "--signal-hz", "fast"]).is_err());
        assert!(Args::try_parse_from(["sigscope", "--csv"]).is_err());
    }
}
