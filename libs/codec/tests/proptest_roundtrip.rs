//! Property tests: arbitrary entry sequences survive an encode/decode cycle
//! with identifiers, declared types, and values (including blanks) intact.

use proptest::prelude::*;
use rwf_codec::{
    decode_array, decode_field_entry, decode_field_list_init, encode_ascii_array,
    encode_field_entry, encode_field_id_array, encode_field_list_complete,
    encode_field_list_init, Array, DecodeIterator, EncodeIterator, FieldEntry, FieldList,
};
use rwf_types::{DataType, FieldId, PrimitiveValue, Real, RealHint};

fn real_hint() -> impl Strategy<Value = RealHint> {
    (0u8..=30).prop_map(|raw| RealHint::try_from(raw).unwrap())
}

fn primitive_value() -> impl Strategy<Value = PrimitiveValue> {
    prop_oneof![
        any::<i64>().prop_map(PrimitiveValue::Int),
        any::<u64>().prop_map(PrimitiveValue::UInt),
        any::<u16>().prop_map(PrimitiveValue::Enum),
        (real_hint(), any::<i64>()).prop_map(|(hint, v)| PrimitiveValue::Real(Real::new(hint, v))),
        // Zero-length values are the blank encoding, so generated strings
        // and buffers are non-empty.
        "[ -~]{1,32}".prop_map(PrimitiveValue::Ascii),
        proptest::collection::vec(any::<u8>(), 1..64).prop_map(PrimitiveValue::Buffer),
    ]
}

fn entry_with_value() -> impl Strategy<Value = (FieldId, Option<PrimitiveValue>)> {
    (
        any::<i16>(),
        prop_oneof![
            3 => primitive_value().prop_map(Some),
            1 => Just(None::<PrimitiveValue>),
        ],
    )
}

fn blank_type() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Int),
        Just(DataType::Real),
        Just(DataType::AsciiString),
        Just(DataType::Buffer),
    ]
}

proptest! {
    #[test]
    fn standard_entries_round_trip(
        entries in proptest::collection::vec((entry_with_value(), blank_type()), 0..24)
    ) {
        let list = FieldList { has_standard_data: true, ..Default::default() };
        let mut enc = EncodeIterator::with_capacity(8192);
        encode_field_list_init(&mut enc, &list, None, None, 0).unwrap();
        for ((field_id, value), blank_as) in &entries {
            let data_type = value.as_ref().map(|v| v.data_type()).unwrap_or(*blank_as);
            encode_field_entry(
                &mut enc,
                &FieldEntry::new(*field_id, data_type),
                value.as_ref(),
            )
            .unwrap();
        }
        encode_field_list_complete(&mut enc, true).unwrap();
        let buf = enc.into_buffer();

        let mut dec = DecodeIterator::new(&buf);
        decode_field_list_init(&mut dec, None, None).unwrap();
        for ((field_id, value), blank_as) in &entries {
            let entry = decode_field_entry(&mut dec).unwrap().unwrap();
            prop_assert_eq!(entry.field_id, *field_id);
            let expected_type = value.as_ref().map(|v| v.data_type()).unwrap_or(*blank_as);
            prop_assert_eq!(entry.data_type, expected_type);
            prop_assert_eq!(entry.value().unwrap(), value.clone());
        }
        prop_assert!(decode_field_entry(&mut dec).unwrap().is_none());
        prop_assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn field_id_arrays_round_trip(ids in proptest::collection::vec(any::<i16>(), 0..256)) {
        let mut enc = EncodeIterator::with_capacity(4 + ids.len() * 2);
        encode_field_id_array(&mut enc, &ids).unwrap();
        let buf = enc.into_buffer();
        let mut dec = DecodeIterator::new(&buf);
        prop_assert_eq!(decode_array(&mut dec).unwrap(), Array::FieldIds(ids));
        prop_assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn ascii_arrays_round_trip(
        names in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..32)
    ) {
        let mut enc = EncodeIterator::with_capacity(4096);
        encode_ascii_array(&mut enc, &names).unwrap();
        let buf = enc.into_buffer();
        let mut dec = DecodeIterator::new(&buf);
        prop_assert_eq!(decode_array(&mut dec).unwrap(), Array::Ascii(names));
    }
}
