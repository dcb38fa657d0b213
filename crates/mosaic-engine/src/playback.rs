//! Resampling sample reader with loop handling.

use crate::zone::{LoopMode, SampleRegion};
use mosaic_core::{Sample, StereoBlock, BLOCK_SIZE};

/// Playback cursor over one sample.
#[derive(Debug, Clone, Default)]
pub struct SamplePlayback {
    position: f64,
    end: f64,
    loop_start: f64,
    loop_end: f64,
    loop_mode: LoopMode,
    finished: bool,
}

impl SamplePlayback {
    /// Position the cursor at the region start and resolve zero end points.
    pub fn start(&mut self, sample: &Sample, region: &SampleRegion) {
        let frames = sample.frames() as f64;
        let end = if region.end == 0 {
            frames
        } else {
            (region.end as f64).min(frames)
        };
        let loop_end = if region.loop_end == 0 {
            end
        } else {
            (region.loop_end as f64).min(end)
        };
        let loop_start = (region.loop_start as f64).min(loop_end);

        self.position = (region.start as f64).min(end);
        self.end = end;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        // Degenerate loops play through once
        self.loop_mode = if loop_end - loop_start < 1.0 {
            LoopMode::Off
        } else {
            region.loop_mode
        };
        self.finished = self.position >= self.end;
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stop(&mut self) {
        self.finished = true;
    }

    #[inline]
    fn looping(&self, held: bool) -> bool {
        match self.loop_mode {
            LoopMode::Off => false,
            LoopMode::Forward => true,
            LoopMode::UntilRelease => held,
        }
    }

    /// Render one block at `ratio` source frames per output frame.
    ///
    /// `held` keeps an until-release loop going. Frames past the end are
    /// silent and mark the cursor finished.
    pub fn render(&mut self, sample: &Sample, ratio: f64, held: bool, out: &mut StereoBlock) {
        let looping = self.looping(held);
        let stereo = sample.is_stereo();

        for i in 0..BLOCK_SIZE {
            if self.finished {
                out[0][i] = 0.0;
                out[1][i] = 0.0;
                continue;
            }

            let index = self.position.floor();
            let frac = (self.position - index) as f32;
            let index = index as i64;

            out[0][i] = self.hermite(sample, 0, index, frac, looping);
            out[1][i] = if stereo {
                self.hermite(sample, 1, index, frac, looping)
            } else {
                out[0][i]
            };

            self.position += ratio;
            if looping && self.position >= self.loop_end {
                let length = self.loop_end - self.loop_start;
                self.position = self.loop_start + (self.position - self.loop_start) % length;
            } else if self.position >= self.end {
                self.finished = true;
            }
        }
    }

    /// Frame lookup that wraps through the loop while looping and reads
    /// silence outside the playable region otherwise.
    #[inline]
    fn frame(&self, sample: &Sample, channel: usize, index: i64, looping: bool) -> f32 {
        if index < 0 {
            return 0.0;
        }
        let mut index = index as f64;
        if looping && index >= self.loop_end {
            let length = self.loop_end - self.loop_start;
            index = self.loop_start + (index - self.loop_start) % length;
        } else if index >= self.end {
            return 0.0;
        }
        sample.at(channel, index as usize)
    }

    /// 4-point, 3rd-order Hermite interpolation around `index + frac`.
    #[inline]
    fn hermite(&self, sample: &Sample, channel: usize, index: i64, frac: f32, looping: bool) -> f32 {
        let xm1 = self.frame(sample, channel, index - 1, looping);
        let x0 = self.frame(sample, channel, index, looping);
        let x1 = self.frame(sample, channel, index + 1, looping);
        let x2 = self.frame(sample, channel, index + 2, looping);

        let c0 = x0;
        let c1 = 0.5 * (x1 - xm1);
        let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
        let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);
        ((c3 * frac + c2) * frac + c1) * frac + c0
    }
}
