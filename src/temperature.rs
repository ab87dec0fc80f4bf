// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::vec_deque::{self, VecDeque};
use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use tracing::{debug, instrument};

use crate::camera::ValidatedFrame;

/// Calibration gain for the center square mean, matched against a reference thermometer.
pub const GAIN: f64 = 1.35;

/// Calibration offset, applied after [`GAIN`].
pub const OFFSET: f64 = -6.0;

/// Number of samples kept in a [`ThermalHistory`].
pub const HISTORY_LEN: usize = 120;

/// Frame indices making up the center square.
///
/// This is tied to how the sensor sits above the hob, it is not a general purpose crop.
pub const CENTER_SQUARE: [usize; 16] = [
    72, 73, 74, 75, //
    88, 89, 90, 91, //
    104, 105, 106, 107, //
    120, 121, 122, 123,
];

/// A calibrated temperature, in degrees Celsius, rounded to one decimal place.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct TemperatureSample(f32);

impl TemperatureSample {
    /// Round `celsius` to one decimal place.
    pub fn new(celsius: f64) -> Self {
        Self(((celsius * 10.0).round() / 10.0) as f32)
    }

    pub fn celsius(&self) -> f32 {
        self.0
    }
}

impl From<f32> for TemperatureSample {
    fn from(celsius: f32) -> Self {
        Self::new(celsius as f64)
    }
}

impl fmt::Display for TemperatureSample {
    /// Always formatted with exactly one decimal place. If the alternate flag (`#`) is given the
    /// unit is appended (ex: `129.0°C`).
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:.1}", self.0)?;
        if fmt.alternate() {
            fmt.write_str("°C")?;
        }
        Ok(())
    }
}

/// Serialized the same way it is displayed, as a string with one decimal place.
impl Serialize for TemperatureSample {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The most recent [`HISTORY_LEN`] temperature samples, oldest first.
///
/// The history is always full; it starts out as zero readings, and each push evicts the oldest
/// sample.
#[derive(Clone, Debug, PartialEq)]
pub struct ThermalHistory {
    samples: VecDeque<TemperatureSample>,
}

impl Default for ThermalHistory {
    fn default() -> Self {
        Self {
            samples: std::iter::repeat(TemperatureSample::default())
                .take(HISTORY_LEN)
                .collect(),
        }
    }
}

impl ThermalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `sample`, dropping the oldest one.
    pub fn push(&mut self, sample: TemperatureSample) {
        self.samples.pop_front();
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The newest sample.
    pub fn latest(&self) -> Option<&TemperatureSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, TemperatureSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<TemperatureSample> {
        self.samples.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a ThermalHistory {
    type Item = &'a TemperatureSample;
    type IntoIter = vec_deque::Iter<'a, TemperatureSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for ThermalHistory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for sample in self {
            seq.serialize_element(sample)?;
        }
        seq.end()
    }
}

/// Reduces a frame to a single calibrated temperature.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemperatureEstimator;

impl TemperatureEstimator {
    /// The calibrated temperature of the center square of `frame`, without touching any
    /// history.
    pub fn sample(&self, frame: &ValidatedFrame) -> TemperatureSample {
        let readings = frame.readings();
        let sum: f64 = CENTER_SQUARE
            .iter()
            .map(|index| readings[*index] as f64)
            .sum();
        let mean = sum / CENTER_SQUARE.len() as f64;
        TemperatureSample::new(mean * GAIN + OFFSET)
    }

    /// Sample `frame` and record the result in `history`.
    #[instrument(level = "debug", skip(self, frame, history))]
    pub fn estimate(
        &self,
        frame: &ValidatedFrame,
        history: &mut ThermalHistory,
    ) -> TemperatureSample {
        let sample = self.sample(frame);
        history.push(sample);
        debug!(temperature = %sample, "Estimated center square temperature");
        sample
    }
}

#[cfg(test)]
mod test {
    use std::convert::TryFrom;

    use float_cmp::{approx_eq, F32Margin};

    use crate::camera::scripted::uniform_frame;
    use crate::camera::ValidatedFrame;

    use super::{TemperatureEstimator, TemperatureSample, ThermalHistory, CENTER_SQUARE, HISTORY_LEN};

    fn validated(value: f32) -> ValidatedFrame {
        ValidatedFrame::try_from(uniform_frame(value)).unwrap()
    }

    #[test]
    fn center_square_of_100() {
        let mut history = ThermalHistory::new();
        let sample = TemperatureEstimator.estimate(&validated(100.0), &mut history);
        assert!(approx_eq!(f32, sample.celsius(), 129.0, F32Margin::default()));
        assert_eq!(sample.to_string(), "129.0");
        assert_eq!(history.latest(), Some(&sample));
    }

    #[test]
    fn only_center_square_counts() {
        let mut frame = uniform_frame(250.0);
        {
            let readings: &mut [f32] = &mut frame;
            for index in CENTER_SQUARE.iter() {
                readings[*index] = 100.0;
            }
        }
        let frame = ValidatedFrame::try_from(frame).unwrap();
        assert_eq!(TemperatureEstimator.sample(&frame).to_string(), "129.0");
    }

    #[test]
    fn mean_of_center_square() {
        let mut frame = uniform_frame(50.0);
        {
            let readings: &mut [f32] = &mut frame;
            // Half at 20, half at 40 averages to 30
            for index in CENTER_SQUARE.iter().take(8) {
                readings[*index] = 20.0;
            }
            for index in CENTER_SQUARE.iter().skip(8) {
                readings[*index] = 40.0;
            }
        }
        let frame = ValidatedFrame::try_from(frame).unwrap();
        // 30 * 1.35 - 6 = 34.5
        assert_eq!(TemperatureEstimator.sample(&frame).to_string(), "34.5");
    }

    #[test]
    fn rounds_to_one_decimal() {
        // 33.3 * 1.35 - 6 = 38.955
        let sample = TemperatureEstimator.sample(&validated(33.3));
        assert_eq!(sample.to_string(), "39.0");
        assert_eq!(TemperatureSample::new(21.04).to_string(), "21.0");
        assert_eq!(TemperatureSample::new(21.06).to_string(), "21.1");
    }

    #[test]
    fn deterministic() {
        let frame = validated(87.3);
        let mut first_history = ThermalHistory::new();
        let mut second_history = ThermalHistory::new();
        let first = TemperatureEstimator.estimate(&frame, &mut first_history);
        let second = TemperatureEstimator.estimate(&frame, &mut second_history);
        assert_eq!(first, second);
        assert_eq!(first_history, second_history);
    }

    #[test]
    fn history_starts_full_of_zeros() {
        let history = ThermalHistory::new();
        assert_eq!(history.len(), HISTORY_LEN);
        assert!(history.iter().all(|s| *s == TemperatureSample::default()));
    }

    #[test]
    fn history_keeps_arrival_order() {
        let mut history = ThermalHistory::new();
        for n in 1..=5 {
            history.push(TemperatureSample::from(n as f32));
            assert_eq!(history.len(), HISTORY_LEN);
        }
        let tail: Vec<f32> = history
            .iter()
            .skip(HISTORY_LEN - 5)
            .map(TemperatureSample::celsius)
            .collect();
        assert_eq!(tail, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = ThermalHistory::new();
        for n in 0..(HISTORY_LEN + 30) {
            history.push(TemperatureSample::from(n as f32));
            assert_eq!(history.len(), HISTORY_LEN);
        }
        let samples: Vec<f32> = history.iter().map(TemperatureSample::celsius).collect();
        let expected: Vec<f32> = (30..(HISTORY_LEN + 30)).map(|n| n as f32).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn serialize_as_strings() {
        let mut history = ThermalHistory::new();
        history.push(TemperatureSample::new(129.0));
        let json = serde_json::to_value(&history).unwrap();
        let array = json.as_array().unwrap();
        assert_eq!(array.len(), HISTORY_LEN);
        assert_eq!(array[0], "0.0");
        assert_eq!(array[HISTORY_LEN - 1], "129.0");
    }

    #[test]
    fn alternate_display_has_unit() {
        assert_eq!(format!("{:#}", TemperatureSample::new(42.0)), "42.0°C");
    }
}
