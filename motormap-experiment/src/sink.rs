use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use motormap_core::{AxisSample, TrialKey, TrialOutcome};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("result file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("result encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for finished trials. Failures are reported, never retried.
pub trait ResultSink {
    fn write_outcome(&mut self, participant_id: &str, outcome: &TrialOutcome) -> Result<(), SinkError>;
    fn write_samples(&mut self, key: &TrialKey, samples: &[AxisSample]) -> Result<(), SinkError>;
}

#[derive(Serialize)]
struct TrialRecord<'a> {
    participant_id: &'a str,
    #[serde(flatten)]
    outcome: &'a TrialOutcome,
}

#[derive(Serialize)]
struct GamepadRecord<'a> {
    participant_id: &'a str,
    block_num: usize,
    trial_num: usize,
    time: u64,
    stick_x: i32,
    stick_y: i32,
}

/// Appends one JSON object per line to `trials.jsonl` and `gamepad.jsonl`.
pub struct JsonLinesSink {
    dir: PathBuf,
    trials: BufWriter<File>,
    gamepad: BufWriter<File>,
}

impl JsonLinesSink {
    pub const TRIALS_FILE: &'static str = "trials.jsonl";
    pub const GAMEPAD_FILE: &'static str = "gamepad.jsonl";

    pub fn create(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let open = |name: &str| -> Result<BufWriter<File>, SinkError> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self {
            trials: open(Self::TRIALS_FILE)?,
            gamepad: open(Self::GAMEPAD_FILE)?,
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultSink for JsonLinesSink {
    fn write_outcome(&mut self, participant_id: &str, outcome: &TrialOutcome) -> Result<(), SinkError> {
        let record = TrialRecord {
            participant_id,
            outcome,
        };
        serde_json::to_writer(&mut self.trials, &record)?;
        self.trials.write_all(b"\n")?;
        self.trials.flush()?;
        Ok(())
    }

    fn write_samples(&mut self, key: &TrialKey, samples: &[AxisSample]) -> Result<(), SinkError> {
        for sample in samples {
            let record = GamepadRecord {
                participant_id: &key.participant_id,
                block_num: key.block_num,
                trial_num: key.trial_num,
                time: sample.elapsed_ms,
                stick_x: sample.x,
                stick_y: sample.y,
            };
            serde_json::to_writer(&mut self.gamepad, &record)?;
            self.gamepad.write_all(b"\n")?;
        }
        self.gamepad.flush()?;
        debug!(
            "wrote {} samples for block {} trial {}",
            samples.len(),
            key.block_num,
            key.trial_num
        );
        Ok(())
    }
}

/// Keeps everything in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub outcomes: Vec<(String, TrialOutcome)>,
    pub samples: Vec<(TrialKey, Vec<AxisSample>)>,
}

impl ResultSink for MemorySink {
    fn write_outcome(&mut self, participant_id: &str, outcome: &TrialOutcome) -> Result<(), SinkError> {
        self.outcomes.push((participant_id.to_string(), outcome.clone()));
        Ok(())
    }

    fn write_samples(&mut self, key: &TrialKey, samples: &[AxisSample]) -> Result<(), SinkError> {
        self.samples.push((key.clone(), samples.to_vec()));
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn write_outcome(&mut self, participant_id: &str, outcome: &TrialOutcome) -> Result<(), SinkError> {
        (**self).write_outcome(participant_id, outcome)
    }

    fn write_samples(&mut self, key: &TrialKey, samples: &[AxisSample]) -> Result<(), SinkError> {
        (**self).write_samples(key, samples)
    }
}
