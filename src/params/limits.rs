// Limits - min/max/default tables behind every control
//
// Each parameter group exposes a pure `limits(block)` function. It never
// looks at live state, so the control thread can answer range queries
// without a round trip through the audio thread, and the audio thread can
// re-clamp writes with the exact same table.

use crate::messaging::command::{CommandBlock, LimitRequest, kind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f32,
    pub max: f32,
    pub def: f32,
    pub learnable: bool,
    pub integer: bool,
}

impl Limits {
    /// Integer control, MIDI-learnable
    pub const fn int(min: i32, max: i32, def: i32) -> Self {
        Self {
            min: min as f32,
            max: max as f32,
            def: def as f32,
            learnable: true,
            integer: true,
        }
    }

    /// Continuous control, MIDI-learnable
    pub const fn float(min: f32, max: f32, def: f32) -> Self {
        Self {
            min,
            max,
            def,
            learnable: true,
            integer: false,
        }
    }

    /// On/off switch (never learnable)
    pub const fn toggle(def: bool) -> Self {
        Self::int(0, 1, def as i32).fixed()
    }

    /// Remove the learnable flag
    pub const fn fixed(mut self) -> Self {
        self.learnable = false;
        self
    }

    pub const fn with_default(mut self, def: f32) -> Self {
        self.def = def;
        self
    }

    /// NaN has no side to clamp to and falls back to the default
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.def
        } else if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Value selected by `request`; Adjust clamps `value`
    pub fn pick(&self, request: LimitRequest, value: f32) -> f32 {
        match request {
            LimitRequest::Adjust => self.clamp(value),
            LimitRequest::Minimum => self.min,
            LimitRequest::Maximum => self.max,
            LimitRequest::Default => self.def,
        }
    }

    /// Flags a reply must carry for this control
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.learnable {
            flags |= kind::LEARNABLE;
        }
        if self.integer {
            flags |= kind::INTEGER;
        }
        flags
    }
}

/// Plain 0..127 integer control defaulting to 0
pub const DEFAULT_LIMITS: Limits = Limits::int(0, 127, 0);

/// Value returned with an Error-tagged reply; callers must not trust it
pub const ERROR_VALUE: f32 = 1.0;

/// Answer a limits query in place: tags the block and returns the value.
///
/// `None` means the control is unknown for this address, which sets the
/// Error bit.
pub fn resolve(limits: Option<Limits>, block: &mut CommandBlock) -> f32 {
    match limits {
        Some(limits) => {
            block.kind |= limits.flags();
            limits.pick(block.request(), block.value)
        }
        None => {
            block.set_error();
            ERROR_VALUE
        }
    }
}

/// Round-half-away-from-zero for integer controls, identity otherwise
pub fn normalise(limits: &Limits, value: f32) -> f32 {
    if limits.integer { value.round() } else { value }
}
