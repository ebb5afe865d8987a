//! Parameter-publish surface: after every poll the runner pushes one
//! sample per axis through a `SampleSink`.

use rondo_core::StatusFlags;
use serde::Serialize;
use std::io::Write;

/// One published per-axis sample.
#[derive(Debug, Clone, Serialize)]
pub struct AxisSample {
    pub time: f64,
    pub controller: String,
    pub axis: usize,
    /// Reported position (internal position plus encoder offset).
    pub position: f64,
    /// Encoder readback; equals `position` in the single-encoder model.
    pub encoder: f64,
    pub velocity: f64,
    pub flags: StatusFlags,
}

/// Sink for published samples.
pub trait SampleSink {
    fn publish(&mut self, sample: &AxisSample);
}

/// Writes one JSON object per line.
pub struct JsonLineSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> SampleSink for JsonLineSink<W> {
    fn publish(&mut self, sample: &AxisSample) {
        // Telemetry is best-effort; a failed write drops the sample.
        if let Ok(line) = serde_json::to_string(sample) {
            let _ = writeln!(self.out, "{line}");
        }
    }
}

/// Captures samples for inspection in tests.
#[derive(Default)]
pub struct RecordingSink {
    pub samples: Vec<AxisSample>,
}

impl SampleSink for RecordingSink {
    fn publish(&mut self, sample: &AxisSample) {
        self.samples.push(sample.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AxisSample {
        AxisSample {
            time: 1.5,
            controller: "stage".to_string(),
            axis: 0,
            position: 12.5,
            encoder: 12.5,
            velocity: -2.0,
            flags: StatusFlags {
                moving: true,
                done: false,
                direction_positive: false,
                at_high_limit: false,
                at_low_limit: false,
                at_home: false,
            },
        }
    }

    #[test]
    fn json_line_sink_writes_one_line_per_sample() {
        let mut sink = JsonLineSink::new(Vec::new());
        sink.publish(&sample());
        sink.publish(&sample());
        let out = String::from_utf8(sink.out).unwrap();
        assert_eq!(out.lines().count(), 2);
        let value: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(value["controller"], "stage");
        assert_eq!(value["position"], 12.5);
        assert_eq!(value["flags"]["moving"], true);
    }

    #[test]
    fn recording_sink_captures_samples() {
        let mut sink = RecordingSink::default();
        sink.publish(&sample());
        assert_eq!(sink.samples.len(), 1);
        assert_eq!(sink.samples[0].velocity, -2.0);
    }
}
