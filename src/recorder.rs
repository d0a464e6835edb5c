// src/recorder.rs
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::drivers::ScopeError;
use crate::types::CaptureFrame;

/// Dumps capture frames as CSV, one row per sample index.
pub struct CaptureRecorder {
    dir: PathBuf,
}

impl CaptureRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `frame` to `capture_<label>_<unix secs>.csv` under the recorder's
    /// directory, creating it if needed.
    pub fn record(&self, label: &str, frame: &CaptureFrame) -> Result<PathBuf, ScopeError> {
        fs::create_dir_all(&self.dir)?;
        // 文件名带时间戳和标签
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = self.dir.join(format!("capture_{label}_{timestamp}.csv"));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_csv(&mut writer, frame)?;
        writer.flush()?;
        info!("capture saved to {}", path.display());
        Ok(path)
    }
}

/// Header `Index,Time_s,Ch<id>...`, then one row per sample. Time is relative
/// to the trigger point, so pre-trigger rows are negative.
pub fn write_csv<W: Write>(writer: &mut W, frame: &CaptureFrame) -> Result<(), ScopeError> {
    write!(writer, "Index,Time_s")?;
    for channel in &frame.channels {
        write!(writer, ",Ch{}", channel.0)?;
    }
    writeln!(writer)?;

    let rows = frame.samples.iter().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        let offset = row as f64 - frame.trigger_position as f64;
        let time = if frame.sample_rate_hz > 0.0 {
            offset / f64::from(frame.sample_rate_hz)
        } else {
            0.0
        };
        write!(writer, "{row},{time:.6}")?;
        for channel in &frame.samples {
            match channel.get(row) {
                Some(value) => write!(writer, ",{value}")?,
                None => write!(writer, ",")?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelId;

    fn frame() -> CaptureFrame {
        CaptureFrame {
            sample_rate_hz: 1_000.0,
            channels: vec![ChannelId(2), ChannelId(5)],
            samples: vec![vec![10, 20, 30], vec![7, 8, 9]],
            trigger_position: 1,
            threshold: 15,
            ready: true,
        }
    }

    #[test]
    fn csv_layout() {
        let mut out = Vec::new();
        write_csv(&mut out, &frame()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Index,Time_s,Ch2,Ch5",
                "0,-0.001000,10,7",
                "1,0.000000,20,8",
                "2,0.001000,30,9",
            ]
        );
    }

    #[test]
    fn record_writes_timestamped_file() {
        let dir = std::env::temp_dir().join(format!("sigscope-rec-{}", std::process::id()));
        let recorder = CaptureRecorder::new(&dir);
        let path = recorder.record("unit", &frame()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("capture_unit_") && name.ends_with(".csv"), "{name}");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Index,Time_s,Ch2,Ch5\n"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
