// Period renderer - what every audio client calls once per hardware period

use crate::audio::dsp_utils::flush_denormals_to_zero;
use crate::config::MAX_BUFFER_SIZE;
use crate::interchange::InterchangeSlot;

/// Scratch buffers plus the instance's interchange.
///
/// Allocated once when the client opens; `fill` itself never allocates.
pub struct PeriodRenderer {
    slot: InterchangeSlot,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl PeriodRenderer {
    pub fn new(slot: InterchangeSlot) -> Self {
        Self {
            slot,
            left: vec![0.0; MAX_BUFFER_SIZE],
            right: vec![0.0; MAX_BUFFER_SIZE],
        }
    }

    /// Render `frames` frames, handing each one to `write(index, (l, r))`.
    ///
    /// Outputs silence when the interchange is not installed yet or is held
    /// by another thread. Returns true if the engine actually rendered.
    pub fn fill(&mut self, frames: usize, mut write: impl FnMut(usize, (f32, f32))) -> bool {
        // ========== SACRED ZONE ==========
        // No allocations, No I/O, No blocking locks
        let Ok(mut guard) = self.slot.try_lock() else {
            (0..frames).for_each(|i| write(i, (0.0, 0.0)));
            return false;
        };
        let Some(interchange) = guard.as_mut() else {
            (0..frames).for_each(|i| write(i, (0.0, 0.0)));
            return false;
        };

        let period = interchange
            .engine()
            .buffer_size()
            .clamp(1, self.left.len());
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(period);
            let (left, right) = (&mut self.left[..n], &mut self.right[..n]);
            interchange.render_cycle(left, right);
            for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
                write(
                    done + i,
                    (flush_denormals_to_zero(*l), flush_denormals_to_zero(*r)),
                );
            }
            done += n;
        }
        true
    }
}
