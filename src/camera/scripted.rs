// SPDX-License-Identifier: GPL-3.0-or-later
//! A sensor driven by a script of results, for tests.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use crate::error::SensorFault;
use crate::image_buffer::{RawFrame, ThermalImage, FRAME_HEIGHT, FRAME_WIDTH};

use super::sensor::SensorPort;

pub(crate) fn uniform_frame(value: f32) -> RawFrame {
    ThermalImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, [value].into())
}

/// Shared count of how many times a [`ScriptedSensor`] has been polled.
#[derive(Clone, Debug, Default)]
pub(crate) struct PollCounter(Arc<AtomicUsize>);

impl PollCounter {
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returns the scripted results in order, then uniform frames of `fallback` forever.
pub(crate) struct ScriptedSensor {
    script: VecDeque<Result<RawFrame, SensorFault>>,
    fallback: f32,
    polls: PollCounter,
    gate: Option<mpsc::Receiver<()>>,
}

impl ScriptedSensor {
    pub(crate) fn new(script: Vec<Result<RawFrame, SensorFault>>, fallback: f32) -> Self {
        Self {
            script: script.into(),
            fallback,
            polls: PollCounter::default(),
            gate: None,
        }
    }

    /// Make every poll wait for a message on the returned channel first.
    pub(crate) fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        self.gate = Some(receiver);
        (self, sender)
    }

    pub(crate) fn poll_counter(&self) -> PollCounter {
        self.polls.clone()
    }
}

impl SensorPort for ScriptedSensor {
    fn poll(&mut self) -> Result<RawFrame, SensorFault> {
        if let Some(gate) = &self.gate {
            // A closed gate lets everything through, so a failed test can't hang the worker.
            let _ = gate.recv();
        }
        self.polls.0.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(uniform_frame(self.fallback)))
    }
}
