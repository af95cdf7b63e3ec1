use super::{
    decode_uvarint, encode_state_hash, encode_uvarint, fold_payloads, fold_transactions,
    VarintError, MAX_VARINT_LEN64,
};
use crate::block::Transaction;

#[test]
fn test_encode_is_zero_padded_to_max_width() {
    let encoded = encode_uvarint(1);

    assert_eq!(encoded.len(), MAX_VARINT_LEN64);
    assert_eq!(encoded[0], 1);
    assert!(encoded[1..].iter().all(|b| *b == 0));
}

#[test]
fn test_known_encodings() {
    assert_eq!(&encode_uvarint(0)[..1], &[0x00]);
    assert_eq!(&encode_uvarint(127)[..1], &[0x7f]);
    assert_eq!(&encode_uvarint(128)[..2], &[0x80, 0x01]);
    assert_eq!(&encode_uvarint(300)[..2], &[0xac, 0x02]);
}

#[test]
fn test_decode_reports_consumed_width() {
    assert_eq!(decode_uvarint(&[0xac, 0x02, 0xff]), Ok((300, 2)));
    assert_eq!(decode_uvarint(&encode_uvarint(u64::MAX)), Ok((u64::MAX, 10)));
}

#[test]
fn test_decode_values_across_widths() {
    for value in [0, 1, 127, 128, 16_383, 16_384, 1 << 35, u64::MAX - 1] {
        let (decoded, _) = decode_uvarint(&encode_uvarint(value)).unwrap();
        assert_eq!(decoded, value, "value {value} did not survive encoding");
    }
}

#[test]
fn test_decode_rejects_empty_and_truncated() {
    assert_eq!(decode_uvarint(&[]), Err(VarintError::Truncated));
    assert_eq!(decode_uvarint(&[0x80, 0x80]), Err(VarintError::Truncated));
}

#[test]
fn test_decode_rejects_overflow() {
    let mut too_wide = [0xff_u8; 10];
    too_wide[9] = 0x02;
    assert_eq!(
        decode_uvarint(&too_wide),
        Err(VarintError::Overflow { consumed: 10 })
    );

    assert_eq!(
        decode_uvarint(&[0xff; 11]),
        Err(VarintError::Overflow { consumed: 11 })
    );
}

#[test]
fn test_fold_wraps_and_cycles_slots() {
    let long: Vec<u8> = (0..12).map(|_| 1).collect();
    let fold = fold_payloads([long.as_slice(), &[255, 0, 0]]);

    // slots 0 and 1 receive bytes 0/10 and 1/11 of the long payload
    assert_eq!(fold[0], 2_u8.wrapping_add(255));
    assert_eq!(fold[1], 2);
    assert_eq!(fold[2], 1);
    assert_eq!(fold[9], 1);
}

#[test]
fn test_fold_of_single_delta_is_the_delta() {
    let payload = encode_uvarint(55);
    let fold = fold_transactions(&[Transaction::new("tx", payload.clone())]);

    assert_eq!(fold.to_vec(), payload);
    assert_eq!(decode_uvarint(&fold), Ok((55, 1)));
}

#[test]
fn test_fold_of_nothing_decodes_to_zero() {
    let fold = fold_transactions(&[]);

    assert_eq!(decode_uvarint(&fold), Ok((0, 1)));
}

#[test]
fn test_state_hash_is_decimal() {
    assert_eq!(encode_state_hash(0), b"0");
    assert_eq!(encode_state_hash(55), b"55");
    assert_eq!(encode_state_hash(u64::MAX), b"18446744073709551615");
}
