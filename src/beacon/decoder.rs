use uuid::Uuid;

/// Manufacturer company identifier carried by iBeacon advertisements.
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Fixed envelope: 1 type + 1 length + 16 UUID + 2 major + 2 minor + 1 TX power.
const FRAME_LEN: usize = 23;
const FRAME_TYPE: u8 = 0x02;
const FRAME_DATA_LEN: u8 = 0x15;

/// Identity triple decoded from one advertisement, plus the calibrated TX
/// power the beacon broadcasts for distance estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconFrame {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    pub tx_power: i8,
}

/// Decode an iBeacon frame from a manufacturer-specific payload.
///
/// Returns `None` for anything that is not an iBeacon frame: wrong company
/// id, short payload, or wrong type/length marker. Malformed advertisements
/// are expected radio noise, not errors.
///
/// Layout is a fixed external wire format: the 16 UUID bytes are a big-endian
/// 128-bit value, major/minor are big-endian u16.
pub fn decode(company_id: u16, payload: &[u8]) -> Option<BeaconFrame> {
    if company_id != APPLE_COMPANY_ID {
        return None;
    }
    if payload.len() < FRAME_LEN {
        return None;
    }
    if payload[0] != FRAME_TYPE || payload[1] != FRAME_DATA_LEN {
        return None;
    }

    let mut uuid_bytes = [0u8; 16];
    uuid_bytes.copy_from_slice(&payload[2..18]);

    Some(BeaconFrame {
        uuid: Uuid::from_bytes(uuid_bytes),
        major: u16::from_be_bytes([payload[18], payload[19]]),
        minor: u16::from_be_bytes([payload[20], payload[21]]),
        tx_power: payload[22] as i8,
    })
}

/// Test fixture shared with the scanner tests.
#[cfg(test)]
pub(crate) const OFFICE_UUID: &str = "e2c56db5-dffb-48d2-b060-d0f5a71096e0";

/// Assemble a well-formed iBeacon payload for tests.
#[cfg(test)]
pub(crate) fn frame_bytes(uuid: &str, major: u16, minor: u16, tx_power: i8) -> Vec<u8> {
    let mut out = vec![FRAME_TYPE, FRAME_DATA_LEN];
    out.extend_from_slice(Uuid::parse_str(uuid).unwrap().as_bytes());
    out.extend_from_slice(&major.to_be_bytes());
    out.extend_from_slice(&minor.to_be_bytes());
    out.push(tx_power as u8);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_frame_round_trips() {
        let payload = frame_bytes(OFFICE_UUID, 1, 7, -59);
        let frame = decode(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(frame.uuid, Uuid::parse_str(OFFICE_UUID).unwrap());
        assert_eq!(frame.major, 1);
        assert_eq!(frame.minor, 7);
        assert_eq!(frame.tx_power, -59);
    }

    #[test]
    fn major_minor_are_big_endian() {
        let payload = frame_bytes(OFFICE_UUID, 0x0102, 0xFFFE, -59);
        assert_eq!(payload[18..20], [0x01, 0x02]);
        assert_eq!(payload[20..22], [0xFF, 0xFE]);
        let frame = decode(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(frame.major, 0x0102);
        assert_eq!(frame.minor, 0xFFFE);
    }

    #[test]
    fn wrong_company_id_is_not_applicable() {
        let payload = frame_bytes(OFFICE_UUID, 1, 1, -59);
        assert!(decode(0x0059, &payload).is_none());
    }

    #[test]
    fn short_payload_is_not_applicable() {
        let payload = frame_bytes(OFFICE_UUID, 1, 1, -59);
        assert!(decode(APPLE_COMPANY_ID, &payload[..22]).is_none());
        assert!(decode(APPLE_COMPANY_ID, &[]).is_none());
    }

    #[test]
    fn wrong_marker_is_not_applicable() {
        let mut payload = frame_bytes(OFFICE_UUID, 1, 1, -59);
        payload[0] = 0x03;
        assert!(decode(APPLE_COMPANY_ID, &payload).is_none());

        let mut payload = frame_bytes(OFFICE_UUID, 1, 1, -59);
        payload[1] = 0x14;
        assert!(decode(APPLE_COMPANY_ID, &payload).is_none());
    }
}
