//! # Serial Frame Protocol
//!
//! Every message in either direction is exactly [`FRAME_SIZE`] bytes. Byte 0
//! is the message id, the remaining bytes are positional fields:
//!
//! | id   | direction     | name               | bytes 1-7 |
//! |------|---------------|--------------------|-----------|
//! | 0x00 | host → device | heartbeat request  | ignored |
//! | 0x01 | device → host | heartbeat response | brightness, vitaminder rgb, system rgb |
//! | 0x02 | host → device | set LED            | brightness, pixel mask, r, g, b, off/10ms, on/10ms |
//! | 0x03 | device → host | set LED ack        | ignored |
//! | 0x04 | device → host | boot notice        | ignored |
//! | 0x06 | device → host | button event       | ok (0/1), snooze (0/1), rest ignored |
//!
//! After a boot notice the device expects a set LED frame within a few
//! seconds, otherwise it stays dark.

use std::fmt;

/// Size of every frame on the wire.
pub const FRAME_SIZE: usize = 8;

/// A raw wire frame.
pub type Frame = [u8; FRAME_SIZE];

pub const MSG_HEARTBEAT_REQUEST: u8 = 0x00;
pub const MSG_HEARTBEAT_RESPONSE: u8 = 0x01;
pub const MSG_SET_LED: u8 = 0x02;
pub const MSG_SET_LED_ACK: u8 = 0x03;
pub const MSG_BOOT: u8 = 0x04;
pub const MSG_BUTTON: u8 = 0x06;

/// Heartbeat request as the firmware expects it (payload bytes are ignored).
pub const HEARTBEAT_REQUEST: Frame = [MSG_HEARTBEAT_REQUEST, 1, 1, 1, 1, 1, 1, 1];

/// All four pixels of the vitaminder strip.
pub const ALL_PIXELS: u8 = 0x0F;

/// An RGB color triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

/// Host → device "set LED" request.
///
/// Durations are carried in milliseconds and quantised to 10 ms units on the
/// wire; `off_ms == 0` means the pixels stay on constantly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedCommand {
    pub brightness: u8,
    /// Least significant nibble selects the four pixels.
    pub pixel_mask: u8,
    pub color: Rgb,
    pub off_ms: u16,
    pub on_ms: u16,
}

impl LedCommand {
    pub fn encode(&self) -> Frame {
        [
            MSG_SET_LED,
            self.brightness,
            self.pixel_mask & 0x0F,
            self.color.r,
            self.color.g,
            self.color.b,
            to_wire_duration(self.off_ms),
            to_wire_duration(self.on_ms),
        ]
    }
}

fn to_wire_duration(ms: u16) -> u8 {
    u8::try_from(ms / 10).unwrap_or(u8::MAX)
}

/// Button flags reported by a `0x06` frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonPress {
    pub ok: bool,
    pub snooze: bool,
}

/// LED settings echoed by the device in a heartbeat response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub brightness: u8,
    pub vitaminder: Rgb,
    pub system: Rgb,
}

/// Everything the control loop can be asked to do.
///
/// Host-generated events carry no payload; device events carry the decoded
/// fields of the frame they came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Exit,
    Heartbeat,
    State,
    DeviceBoot,
    DeviceButton(ButtonPress),
    DeviceHeartbeatAck(HeartbeatReport),
    DeviceStateAck,
}

impl Event {
    /// Decode an inbound device frame. Unknown ids yield `None`.
    pub fn from_frame(frame: &Frame) -> Option<Event> {
        match frame[0] {
            MSG_HEARTBEAT_RESPONSE => Some(Event::DeviceHeartbeatAck(HeartbeatReport {
                brightness: frame[1],
                vitaminder: Rgb::new(frame[2], frame[3], frame[4]),
                system: Rgb::new(frame[5], frame[6], frame[7]),
            })),
            MSG_SET_LED_ACK => Some(Event::DeviceStateAck),
            MSG_BOOT => Some(Event::DeviceBoot),
            MSG_BUTTON => Some(Event::DeviceButton(ButtonPress {
                ok: frame[1] == 0x01,
                snooze: frame[2] == 0x01,
            })),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Exit => "EXIT",
            Event::Heartbeat => "HEARTBEAT",
            Event::State => "STATE",
            Event::DeviceBoot => "DEVICE_BOOT",
            Event::DeviceButton(_) => "DEVICE_BUTTON",
            Event::DeviceHeartbeatAck(_) => "DEVICE_HEARTBEAT_ACK",
            Event::DeviceStateAck => "DEVICE_STATE_ACK",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_led_layout() {
        let cmd = LedCommand {
            brightness: 64,
            pixel_mask: ALL_PIXELS,
            color: Rgb::new(255, 128, 0),
            off_ms: 250,
            on_ms: 750,
        };
        assert_eq!(cmd.encode(), [0x02, 64, 0x0F, 255, 128, 0, 25, 75]);
    }

    #[test]
    fn test_constant_on_and_saturated_durations() {
        let cmd = LedCommand {
            brightness: 1,
            pixel_mask: 0xFF,
            color: Rgb::default(),
            off_ms: 0,
            on_ms: 60_000,
        };
        let frame = cmd.encode();
        assert_eq!(frame[2], 0x0F, "mask is limited to the low nibble");
        assert_eq!(frame[6], 0);
        assert_eq!(frame[7], 255);
    }

    #[test]
    fn test_decode_button_flags() {
        let event = Event::from_frame(&[0x06, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            event,
            Some(Event::DeviceButton(ButtonPress {
                ok: true,
                snooze: false
            }))
        );

        // Only 0x01 counts as pressed
        let event = Event::from_frame(&[0x06, 2, 1, 9, 9, 9, 9, 9]);
        assert_eq!(
            event,
            Some(Event::DeviceButton(ButtonPress {
                ok: false,
                snooze: true
            }))
        );
    }

    #[test]
    fn test_decode_heartbeat_report() {
        let event = Event::from_frame(&[0x01, 200, 1, 2, 3, 4, 5, 6]).unwrap();
        let Event::DeviceHeartbeatAck(report) = event else {
            panic!("expected heartbeat ack, got {event:?}");
        };
        assert_eq!(report.brightness, 200);
        assert_eq!(report.vitaminder, Rgb::new(1, 2, 3));
        assert_eq!(report.system, Rgb::new(4, 5, 6));
    }

    #[test]
    fn test_decode_boot_ack_and_unknown() {
        assert_eq!(Event::from_frame(&[0x04, 0, 0, 0, 0, 0, 0, 0]), Some(Event::DeviceBoot));
        assert_eq!(Event::from_frame(&[0x03, 7, 7, 7, 7, 7, 7, 7]), Some(Event::DeviceStateAck));
        // Host-bound ids and unknown tags are not device events
        assert_eq!(Event::from_frame(&[0x00; FRAME_SIZE]), None);
        assert_eq!(Event::from_frame(&[0x02, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(Event::from_frame(&[0x05, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(Event::from_frame(&[0xFF; FRAME_SIZE]), None);
    }
}
