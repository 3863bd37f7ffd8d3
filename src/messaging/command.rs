// CommandBlock - Message unique de contrôle (écriture, lecture, limites)
//
// Every parameter change or query, from any thread, is described by one
// 16-byte CommandBlock. Blocks are copied by value through the byte ring
// buffers and never shared by reference between threads.
//
// Layout (little endian):
//   0..4   value (f32)
//   4      type      request bits + result flags
//   5      source    origin + action flags
//   6      control   module-local parameter id
//   7..12  part, kit, engine, insert, parameter
//   12..16 offset, miscmsg, spare1, spare0

/// Sentinel for "field not specified"
pub const UNUSED: u8 = 0xFF;

/// Serialized size of one block
pub const COMMAND_BLOCK_SIZE: usize = 16;

/// Bits of the `type` byte
pub mod kind {
    /// Bits 0-1: what a limits request (or an adjusting write) asks for
    pub const ADJUST: u8 = 0;
    pub const READ: u8 = 0;
    pub const MINIMUM: u8 = 1;
    pub const MAXIMUM: u8 = 2;
    pub const DEFAULT: u8 = 3;
    pub const REQUEST_MASK: u8 = 3;

    pub const LIMITS: u8 = 4;
    pub const ERROR: u8 = 8;
    pub const LEARN_REQUEST: u8 = 16;
    pub const LEARNABLE: u8 = 32;
    pub const WRITE: u8 = 64;
    pub const INTEGER: u8 = 128;

    /// A reply carrying this exact type is not returned to any producer
    pub const SUPPRESS: u8 = 0xFF;
}

/// Bits of the `source` byte
pub mod source {
    pub const TO_ALL: u8 = 0;
    pub const FROM_MIDI: u8 = 1;
    pub const FROM_CLI: u8 = 2;
    pub const FROM_GUI: u8 = 3;
    pub const NO_ACTION: u8 = 15;
    pub const ORIGIN_MASK: u8 = 0x0F;

    pub const FORCE_UPDATE: u8 = 32;
    pub const LOOPBACK: u8 = 64;
    pub const LOW_PRIO: u8 = 128;
    pub const MUTE_AND_LOOP: u8 = 192;
}

/// Which limit a request asks for (bits 0-1 of `type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitRequest {
    /// Clamp the carried value into range
    Adjust,
    Minimum,
    Maximum,
    Default,
}

impl From<u8> for LimitRequest {
    fn from(value: u8) -> Self {
        match value & kind::REQUEST_MASK {
            kind::MINIMUM => LimitRequest::Minimum,
            kind::MAXIMUM => LimitRequest::Maximum,
            kind::DEFAULT => LimitRequest::Default,
            _ => LimitRequest::Adjust,
        }
    }
}

impl LimitRequest {
    pub fn bits(self) -> u8 {
        match self {
            LimitRequest::Adjust => kind::ADJUST,
            LimitRequest::Minimum => kind::MINIMUM,
            LimitRequest::Maximum => kind::MAXIMUM,
            LimitRequest::Default => kind::DEFAULT,
        }
    }
}

/// Producer a block came from (low nibble of `source`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    All,
    Midi,
    Cli,
    Gui,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandBlock {
    pub value: f32,
    pub kind: u8,
    pub source: u8,
    pub control: u8,
    pub part: u8,
    pub kit: u8,
    pub engine: u8,
    pub insert: u8,
    pub parameter: u8,
    pub offset: u8,
    pub miscmsg: u8,
    pub spare1: u8,
    pub spare0: u8,
}

impl Default for CommandBlock {
    /// Plain read with every address field unused
    fn default() -> Self {
        Self {
            value: 0.0,
            kind: kind::READ,
            source: source::NO_ACTION,
            control: UNUSED,
            part: UNUSED,
            kit: UNUSED,
            engine: UNUSED,
            insert: UNUSED,
            parameter: UNUSED,
            offset: UNUSED,
            miscmsg: UNUSED,
            spare1: UNUSED,
            spare0: UNUSED,
        }
    }
}

impl CommandBlock {
    /// Read `control` of section/part `part`
    pub fn read(control: u8, part: u8) -> Self {
        Self {
            control,
            part,
            ..Self::default()
        }
    }

    /// Write `value` into `control` of section/part `part`
    pub fn write(control: u8, part: u8, value: f32) -> Self {
        Self {
            value,
            kind: kind::WRITE,
            control,
            part,
            ..Self::default()
        }
    }

    /// Ask for the min/max/default of `control` without touching state
    pub fn limits(control: u8, part: u8, request: LimitRequest) -> Self {
        Self {
            kind: kind::LIMITS | request.bits(),
            control,
            part,
            ..Self::default()
        }
    }

    pub fn with_kit(mut self, kit: u8) -> Self {
        self.kit = kit;
        self
    }

    pub fn with_engine(mut self, engine: u8) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_insert(mut self, insert: u8) -> Self {
        self.insert = insert;
        self
    }

    pub fn with_parameter(mut self, parameter: u8) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_offset(mut self, offset: u8) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_miscmsg(mut self, miscmsg: u8) -> Self {
        self.miscmsg = miscmsg;
        self
    }

    pub fn with_source(mut self, source: u8) -> Self {
        self.source = source;
        self
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    pub fn is_write(&self) -> bool {
        self.kind & kind::WRITE != 0
    }

    pub fn is_limits(&self) -> bool {
        self.kind & kind::LIMITS != 0
    }

    pub fn request(&self) -> LimitRequest {
        LimitRequest::from(self.kind)
    }

    pub fn has_error(&self) -> bool {
        self.kind & kind::ERROR != 0
    }

    pub fn set_error(&mut self) {
        self.kind |= kind::ERROR;
    }

    pub fn is_integer(&self) -> bool {
        self.kind & kind::INTEGER != 0
    }

    pub fn is_learnable(&self) -> bool {
        self.kind & kind::LEARNABLE != 0
    }

    pub fn is_suppressed(&self) -> bool {
        self.kind == kind::SUPPRESS
    }

    pub fn is_low_priority(&self) -> bool {
        self.source & source::LOW_PRIO != 0
    }

    pub fn origin(&self) -> Origin {
        match self.source & source::ORIGIN_MASK {
            source::TO_ALL => Origin::All,
            source::FROM_MIDI => Origin::Midi,
            source::FROM_CLI => Origin::Cli,
            source::FROM_GUI => Origin::Gui,
            _ => Origin::Internal,
        }
    }

    /// Integer reading of the value, rounded half away from zero
    pub fn int_value(&self) -> i32 {
        self.value.round() as i32
    }

    /// Value of a byte-sized control (clamped into 0..=255)
    pub fn byte_value(&self) -> u8 {
        self.value.round().clamp(0.0, 255.0) as u8
    }

    pub fn to_bytes(&self) -> [u8; COMMAND_BLOCK_SIZE] {
        let mut bytes = [0u8; COMMAND_BLOCK_SIZE];
        bytes[0..4].copy_from_slice(&self.value.to_le_bytes());
        bytes[4] = self.kind;
        bytes[5] = self.source;
        bytes[6] = self.control;
        bytes[7] = self.part;
        bytes[8] = self.kit;
        bytes[9] = self.engine;
        bytes[10] = self.insert;
        bytes[11] = self.parameter;
        bytes[12] = self.offset;
        bytes[13] = self.miscmsg;
        bytes[14] = self.spare1;
        bytes[15] = self.spare0;
        bytes
    }

    pub fn from_bytes(bytes: &[u8; COMMAND_BLOCK_SIZE]) -> Self {
        Self {
            value: f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            kind: bytes[4],
            source: bytes[5],
            control: bytes[6],
            part: bytes[7],
            kit: bytes[8],
            engine: bytes[9],
            insert: bytes[10],
            parameter: bytes[11],
            offset: bytes[12],
            miscmsg: bytes[13],
            spare1: bytes[14],
            spare0: bytes[15],
        }
    }
}
