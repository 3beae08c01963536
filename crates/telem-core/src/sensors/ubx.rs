//! Minimal UBX protocol support: poll frame builder and a byte-at-a-time
//! parser that only decodes NAV-PVT (class 0x01, id 0x07).

const SYNC1: u8 = 0xB5;
const SYNC2: u8 = 0x62;

pub const CLASS_NAV: u8 = 0x01;
pub const ID_NAV_PVT: u8 = 0x07;
pub const NAV_PVT_LEN: usize = 92;

/// Subset of the NAV-PVT payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavPvt {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = no fix, 2 = 2D, 3 = 3D, ...
    pub fix_type: u8,
    pub satellites: u8,
    /// Degrees, scaled by 1e7
    pub longitude_e7: i32,
    /// Degrees, scaled by 1e7
    pub latitude_e7: i32,
    /// Height above mean sea level, mm
    pub height_msl_mm: i32,
}

impl NavPvt {
    fn from_payload(p: &[u8; NAV_PVT_LEN]) -> Self {
        let i32_at = |i: usize| i32::from_le_bytes([p[i], p[i + 1], p[i + 2], p[i + 3]]);
        Self {
            year: u16::from_le_bytes([p[4], p[5]]),
            month: p[6],
            day: p[7],
            hour: p[8],
            minute: p[9],
            second: p[10],
            fix_type: p[20],
            satellites: p[23],
            longitude_e7: i32_at(24),
            latitude_e7: i32_at(28),
            height_msl_mm: i32_at(36),
        }
    }

    pub fn has_fix(&self) -> bool {
        self.fix_type != 0
    }
}

/// 8-bit Fletcher checksum over class, id, length and payload.
pub fn checksum(bytes: &[u8]) -> (u8, u8) {
    bytes.iter().fold((0u8, 0u8), |(a, b), byte| {
        let a = a.wrapping_add(*byte);
        (a, b.wrapping_add(a))
    })
}

/// An empty-payload poll request for `class`/`id`.
pub fn poll_frame(class: u8, id: u8) -> [u8; 8] {
    let (ck_a, ck_b) = checksum(&[class, id, 0, 0]);
    [SYNC1, SYNC2, class, id, 0, 0, ck_a, ck_b]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sync1,
    Sync2,
    Header { index: usize },
    Payload { index: usize },
    ChecksumA,
    ChecksumB { ck_a: u8 },
}

pub struct UbxParser {
    state: State,
    header: [u8; 4],
    payload: [u8; NAV_PVT_LEN],
    length: usize,
    keep: bool,
    ck: (u8, u8),
}

impl Default for UbxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UbxParser {
    pub const fn new() -> Self {
        Self {
            state: State::Sync1,
            header: [0; 4],
            payload: [0; NAV_PVT_LEN],
            length: 0,
            keep: false,
            ck: (0, 0),
        }
    }

    fn add_ck(&mut self, byte: u8) {
        self.ck.0 = self.ck.0.wrapping_add(byte);
        self.ck.1 = self.ck.1.wrapping_add(self.ck.0);
    }

    /// Feed one byte. Returns a message when a NAV-PVT frame with a valid
    /// checksum completes. Other messages are skipped without losing sync.
    pub fn push(&mut self, byte: u8) -> Option<NavPvt> {
        match self.state {
            State::Sync1 => {
                if byte == SYNC1 {
                    self.state = State::Sync2;
                }
            }
            State::Sync2 => {
                self.state = match byte {
                    SYNC2 => {
                        self.ck = (0, 0);
                        State::Header { index: 0 }
                    }
                    SYNC1 => State::Sync2,
                    _ => State::Sync1,
                };
            }
            State::Header { index } => {
                self.header[index] = byte;
                self.add_ck(byte);
                if index < 3 {
                    self.state = State::Header { index: index + 1 };
                } else {
                    self.length = u16::from_le_bytes([self.header[2], self.header[3]]) as usize;
                    self.keep = self.header[0] == CLASS_NAV
                        && self.header[1] == ID_NAV_PVT
                        && self.length == NAV_PVT_LEN;
                    self.state = if self.length == 0 {
                        State::ChecksumA
                    } else {
                        State::Payload { index: 0 }
                    };
                }
            }
            State::Payload { index } => {
                if self.keep {
                    self.payload[index] = byte;
                }
                self.add_ck(byte);
                self.state = if index + 1 == self.length {
                    State::ChecksumA
                } else {
                    State::Payload { index: index + 1 }
                };
            }
            State::ChecksumA => {
                self.state = State::ChecksumB { ck_a: byte };
            }
            State::ChecksumB { ck_a } => {
                self.state = State::Sync1;
                if self.keep && (ck_a, byte) == self.ck {
                    return Some(NavPvt::from_payload(&self.payload));
                }
            }
        }
        None
    }
}
