use core::fmt::{Display, Formatter};
use embedded_can::{Frame as _, Id, StandardId};

/// Classic CAN frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: Id,
    remote: bool,
    dlc: u8,
    data: [u8; 8],
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }

        let mut data_all = [0; 8];
        data_all[0..data.len()].copy_from_slice(data);

        Some(Self {
            id: id.into(),
            remote: false,
            dlc: data.len() as u8,
            data: data_all,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }

        Some(Self {
            id: id.into(),
            remote: true,
            dlc: dlc as u8,
            data: [0; 8],
        })
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        &self.data[0..self.dlc()]
    }

    fn is_extended(&self) -> bool {
        match self.id {
            Id::Extended(_) => true,
            Id::Standard(_) => false,
        }
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }
}

/// Frame in the `<id>#<data>` notation taken by `cansend`.
pub struct CanSend<'a, F> {
    frame: &'a F,
}

impl<'a, F: embedded_can::Frame> CanSend<'a, F> {
    pub fn new(frame: &'a F) -> Self {
        Self { frame }
    }
}

impl<F: embedded_can::Frame> Display for CanSend<'_, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self.frame.id() {
            Id::Standard(id) => write!(f, "{:03x}#", id.as_raw())?,
            Id::Extended(id) => write!(f, "{:08x}#", id.as_raw())?,
        }

        if self.frame.is_remote_frame() {
            write!(f, "R")?;
            if self.frame.dlc() > 0 {
                write!(f, "{}", self.frame.dlc())?;
            }
            return Ok(());
        }

        for byte in self.frame.data() {
            write!(f, "{:02X}", *byte)?;
        }

        Ok(())
    }
}

const EXAMPLE_ID: StandardId = match StandardId::new(0x01a) {
    Some(id) => id,
    None => panic!("0x01a is not an 11-bit id"),
};

const EXAMPLE_DATA: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0xAA, 0xBB, 0xCC, 0xDD];

/// The frame transmitted once per period in send mode.
pub fn example_frame() -> Frame {
    Frame::new(EXAMPLE_ID, &EXAMPLE_DATA).expect("8 bytes fit a classic frame")
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_can::ExtendedId;

    #[test]
    fn format_example_frame() {
        let frame = example_frame();
        assert_eq!(format!("{}", CanSend::new(&frame)), "01a#11223344AABBCCDD");
    }

    #[test]
    fn example_frame_fields() {
        let frame = example_frame();
        assert_eq!(frame.id(), Id::Standard(StandardId::new(0x01a).unwrap()));
        assert!(!frame.is_extended());
        assert!(!frame.is_remote_frame());
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.data(), [0x11, 0x22, 0x33, 0x44, 0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn format_cansend() {
        let frame = Frame::new(Id::Standard(StandardId::new(0x123).unwrap()), &[]).unwrap();
        assert_eq!(format!("{}", CanSend::new(&frame)), "123#");

        let frame = Frame::new(
            Id::Extended(ExtendedId::new(0x12ABCDEF).unwrap()),
            &[0xAA, 0x55],
        )
        .unwrap();
        assert_eq!(format!("{}", CanSend::new(&frame)), "12abcdef#AA55");

        let frame = Frame::new_remote(Id::Standard(StandardId::new(0x7ff).unwrap()), 2).unwrap();
        assert_eq!(format!("{}", CanSend::new(&frame)), "7ff#R2");
    }

    #[test]
    fn oversized_frame_rejected() {
        let id = Id::Standard(StandardId::new(0x10).unwrap());
        assert!(Frame::new(id, &[0; 9]).is_none());
        assert!(Frame::new_remote(id, 9).is_none());
    }
}
