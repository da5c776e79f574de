//! The polling loop: one block per iteration, one timestamp per block.
//!
//! Every stage runs synchronously on the caller's thread, so the segment and
//! gesture buffers need no locking. Only the sample source may fail the loop;
//! bad blocks, segments, gestures and dispatches are handled in place.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::ActionDispatcher;
use crate::audio::source::{Clock, SampleSource};
use crate::audio::spectrum::SpectralAnalyzer;
use crate::config::Config;
use crate::events::{Event, Observer};
use crate::gesture::recognizer::GestureRecognizer;
use crate::gesture::table::GestureTable;
use crate::pitch::note::NoteMapper;
use crate::pitch::segment::NoteSegmenter;

/// Margin past a timeout when draining a finished stream.
const DRAIN_MARGIN: Duration = Duration::from_millis(1);

pub struct Instrument<D, O> {
    analyzer: SpectralAnalyzer,
    segmenter: NoteSegmenter,
    recognizer: GestureRecognizer,
    dispatcher: D,
    observer: O,
    gap: Duration,
    end_gap: Duration,
    now: Duration,
}

impl<D: ActionDispatcher, O: Observer> Instrument<D, O> {
    pub fn new(config: &Config, table: GestureTable, dispatcher: D, observer: O) -> Self {
        let mapper = Arc::new(NoteMapper::new());
        Self {
            analyzer: SpectralAnalyzer::new(&config.detector),
            segmenter: NoteSegmenter::new(&config.segmenter, mapper),
            recognizer: GestureRecognizer::new(&config.gesture, table),
            dispatcher,
            observer,
            gap: config.segmenter.gap(),
            end_gap: config.gesture.end_gap(),
            now: Duration::ZERO,
        }
    }

    /// Poll `source` until it ends or fails. Live sources never end.
    pub fn run<S, C>(&mut self, source: &mut S, clock: &mut C) -> Result<()>
    where
        S: SampleSource + ?Sized,
        C: Clock + ?Sized,
    {
        let sample_rate = source.sample_rate();
        while let Some(block) = source.read_block()? {
            if block.is_empty() {
                continue;
            }
            let now = clock.tick(&block, sample_rate);
            self.process_block(&block, sample_rate, now);
        }
        log::info!("input ended at {:.2}s", self.now.as_secs_f32());
        self.drain();
        Ok(())
    }

    pub fn process_block(&mut self, block: &[i16], sample_rate: u32, now: Duration) {
        let peak = self.analyzer.detect(block, sample_rate);
        self.process_peak(peak.map(|p| p.frequency), now);
    }

    /// Advance segmentation and gesture matching by one block.
    pub fn process_peak(&mut self, peak: Option<f32>, now: Duration) {
        self.now = now;

        if let Some(closed) = self.segmenter.push(peak, now) {
            self.observer.on_event(&Event::segment(&closed));
            if let Some(note) = closed.note() {
                self.recognizer.push_note(&note, now);
            }
        }

        let Some(outcome) = self.recognizer.poll(now) else {
            return;
        };
        self.observer.on_event(&Event::gesture(&outcome));

        if let Some(action) = outcome.action() {
            if let Err(err) = self.dispatcher.dispatch(action) {
                self.observer.on_event(&Event::DispatchFailed {
                    action,
                    error: err.to_string(),
                });
            }
        }
    }

    /// Play out enough silence to close the open segment and then the open
    /// gesture.
    pub fn drain(&mut self) {
        let segment_closed = self.now + self.gap + DRAIN_MARGIN;
        self.process_peak(None, segment_closed);
        self.process_peak(None, segment_closed + self.end_gap + DRAIN_MARGIN);
    }

    #[cfg(test)]
    pub(crate) fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    #[cfg(test)]
    pub(crate) fn observer(&self) -> &O {
        &self.observer
    }

    #[cfg(test)]
    pub(crate) fn recognizer_mut(&mut self) -> &mut GestureRecognizer {
        &mut self.recognizer
    }
}
