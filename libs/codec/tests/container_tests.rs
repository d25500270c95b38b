//! # Container Codec Integration Tests
//!
//! End-to-end exercises of the public codec API: set-data plus standard-data
//! round trips, pre-encoded set blobs, nested containers through multi-step
//! entries, and buffer-exhaustion sweeps proving that a failed encode never
//! commits partial bytes.

use rwf_codec::{
    decode_element_entry, decode_element_list_init, decode_field_entry, decode_field_list_init,
    decode_local_field_set_defs, encode_element_entry, encode_element_list_complete,
    encode_element_list_init, encode_field_entry, encode_field_entry_complete,
    encode_field_entry_init, encode_field_list_complete, encode_field_list_init,
    encode_local_field_set_defs, CodecError, DecodeIterator, EncodeIterator, EncodeOutcome,
    ElementEntry, ElementList, FieldEntry, FieldList, FieldSetDef, FieldSetDefEntry,
    LocalFieldSetDefDb,
};
use rwf_types::{DataType, PrimitiveValue, Real, RealHint};

fn trade_set_db() -> LocalFieldSetDefDb {
    let mut db = LocalFieldSetDefDb::new();
    db.add(
        FieldSetDef::new(
            1,
            vec![
                FieldSetDefEntry::new(22, DataType::Real),
                FieldSetDefEntry::new(25, DataType::Real),
                FieldSetDefEntry::new(32, DataType::UInt),
            ],
        )
        .unwrap(),
    )
    .unwrap();
    db
}

#[test]
fn trade_price_round_trips_through_standard_data() {
    let list = FieldList {
        has_standard_data: true,
        ..Default::default()
    };
    let price = PrimitiveValue::Real(Real::new(RealHint::Exponent2, 3905));

    let mut enc = EncodeIterator::with_capacity(64);
    encode_field_list_init(&mut enc, &list, None, None, 0).unwrap();
    encode_field_entry(&mut enc, &FieldEntry::new(22, DataType::Real), Some(&price)).unwrap();
    encode_field_list_complete(&mut enc, true).unwrap();
    let buf = enc.into_buffer();

    let mut dec = DecodeIterator::new(&buf);
    decode_field_list_init(&mut dec, None, None).unwrap();
    let entry = decode_field_entry(&mut dec).unwrap().unwrap();
    assert_eq!(entry.field_id, 22);
    assert_eq!(entry.data_type, DataType::Real);
    let value = entry.value().unwrap().unwrap();
    assert_eq!(value, price);
    match value {
        PrimitiveValue::Real(real) => assert_eq!(real.to_f64(), 390500.0),
        other => panic!("expected Real, got {other:?}"),
    }
    assert!(decode_field_entry(&mut dec).unwrap().is_none());
}

#[test]
fn set_then_standard_data_round_trips() {
    let db = trade_set_db();
    let list = FieldList {
        set_id: 1,
        has_set_data: true,
        has_standard_data: true,
        ..Default::default()
    };
    let bid = PrimitiveValue::Real(Real::new(RealHint::ExponentNeg2, 10025));
    let ask = PrimitiveValue::Real(Real::new(RealHint::ExponentNeg2, 10050));
    let volume = PrimitiveValue::UInt(120_500);
    let status = PrimitiveValue::Enum(1);

    let mut enc = EncodeIterator::with_capacity(128);
    encode_field_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
    assert_eq!(
        encode_field_entry(&mut enc, &FieldEntry::new(22, DataType::Real), Some(&bid)).unwrap(),
        EncodeOutcome::Encoded
    );
    assert_eq!(
        encode_field_entry(&mut enc, &FieldEntry::new(25, DataType::Real), Some(&ask)).unwrap(),
        EncodeOutcome::Encoded
    );
    assert_eq!(
        encode_field_entry(&mut enc, &FieldEntry::new(32, DataType::UInt), Some(&volume)).unwrap(),
        EncodeOutcome::SetComplete
    );
    encode_field_entry(&mut enc, &FieldEntry::new(118, DataType::Enum), Some(&status)).unwrap();
    encode_field_list_complete(&mut enc, true).unwrap();
    let buf = enc.into_buffer();

    let mut dec = DecodeIterator::new(&buf);
    let decoded = decode_field_list_init(&mut dec, Some(&db), None).unwrap();
    assert_eq!(decoded.set_id, 1);
    assert!(decoded.has_set_data && decoded.has_standard_data);

    let expected = [
        (22, bid),
        (25, ask),
        (32, volume),
        (118, status),
    ];
    for (field_id, value) in expected {
        let entry = decode_field_entry(&mut dec).unwrap().unwrap();
        assert_eq!(entry.field_id, field_id);
        assert_eq!(entry.value().unwrap(), Some(value));
    }
    assert!(decode_field_entry(&mut dec).unwrap().is_none());
    assert_eq!(dec.remaining(), 0);
}

#[test]
fn pre_encoded_set_blob_decodes_entrywise() {
    let db = trade_set_db();

    // Build the positional blob through the normal entry path first.
    let list = FieldList {
        set_id: 1,
        has_set_data: true,
        ..Default::default()
    };
    let mut enc = EncodeIterator::with_capacity(64);
    encode_field_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
    let set_values = [
        PrimitiveValue::Real(Real::new(RealHint::Exponent0, 101)),
        PrimitiveValue::Real(Real::new(RealHint::Exponent0, 102)),
        PrimitiveValue::UInt(9),
    ];
    for (def_entry, value) in db.get(1).unwrap().entries().iter().zip(&set_values) {
        encode_field_entry(
            &mut enc,
            &FieldEntry::new(def_entry.field_id, def_entry.data_type),
            Some(value),
        )
        .unwrap();
    }
    encode_field_list_complete(&mut enc, true).unwrap();
    let set_only = enc.into_buffer();
    // Strip the flags/set-id header: flags byte plus one-byte set ID.
    let blob = set_only[2..].to_vec();

    // Attach the blob and append a standard entry.
    let list = FieldList {
        set_id: 1,
        has_set_data: true,
        set_data: Some(blob),
        has_standard_data: true,
        ..Default::default()
    };
    let mut enc = EncodeIterator::with_capacity(128);
    encode_field_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
    encode_field_entry(
        &mut enc,
        &FieldEntry::new(118, DataType::Enum),
        Some(&PrimitiveValue::Enum(3)),
    )
    .unwrap();
    encode_field_list_complete(&mut enc, true).unwrap();
    let buf = enc.into_buffer();

    let mut dec = DecodeIterator::new(&buf);
    decode_field_list_init(&mut dec, Some(&db), None).unwrap();
    for (def_entry, value) in db.get(1).unwrap().entries().iter().zip(&set_values) {
        let entry = decode_field_entry(&mut dec).unwrap().unwrap();
        assert_eq!(entry.field_id, def_entry.field_id);
        assert_eq!(entry.value().unwrap().as_ref(), Some(value));
    }
    let last = decode_field_entry(&mut dec).unwrap().unwrap();
    assert_eq!(last.field_id, 118);
    assert!(decode_field_entry(&mut dec).unwrap().is_none());
}

#[test]
fn nested_element_list_through_multi_step_entry() {
    let outer = FieldList {
        has_standard_data: true,
        ..Default::default()
    };
    let inner = ElementList {
        has_standard_data: true,
        ..Default::default()
    };

    let mut enc = EncodeIterator::with_capacity(256);
    encode_field_list_init(&mut enc, &outer, None, None, 0).unwrap();
    encode_field_entry_init(&mut enc, &FieldEntry::new(-50, DataType::Buffer), 0).unwrap();
    encode_element_list_init(&mut enc, &inner, None, None, 0).unwrap();
    encode_element_entry(
        &mut enc,
        &ElementEntry::new(&b"Text"[..], DataType::AsciiString),
        Some(&PrimitiveValue::Ascii("nested".into())),
    )
    .unwrap();
    encode_element_list_complete(&mut enc, true).unwrap();
    encode_field_entry_complete(&mut enc, true).unwrap();
    encode_field_entry(
        &mut enc,
        &FieldEntry::new(6, DataType::UInt),
        Some(&PrimitiveValue::UInt(1)),
    )
    .unwrap();
    encode_field_list_complete(&mut enc, true).unwrap();
    let buf = enc.into_buffer();

    let mut dec = DecodeIterator::new(&buf);
    decode_field_list_init(&mut dec, None, None).unwrap();
    let container_entry = decode_field_entry(&mut dec).unwrap().unwrap();
    assert_eq!(container_entry.field_id, -50);

    // The nested payload decodes through its own iterator.
    let mut nested = DecodeIterator::new(container_entry.data);
    decode_element_list_init(&mut nested, None, None).unwrap();
    let elem = decode_element_entry(&mut nested).unwrap().unwrap();
    assert_eq!(elem.name.as_ref(), b"Text");
    assert_eq!(
        elem.value().unwrap(),
        Some(PrimitiveValue::Ascii("nested".into()))
    );
    assert!(decode_element_entry(&mut nested).unwrap().is_none());

    let scalar = decode_field_entry(&mut dec).unwrap().unwrap();
    assert_eq!(scalar.field_id, 6);
    assert!(decode_field_entry(&mut dec).unwrap().is_none());
}

#[test]
fn abandoned_multi_step_entry_leaves_no_trace() {
    let list = FieldList {
        has_standard_data: true,
        ..Default::default()
    };
    let mut enc = EncodeIterator::with_capacity(128);
    encode_field_list_init(&mut enc, &list, None, None, 0).unwrap();
    encode_field_entry(
        &mut enc,
        &FieldEntry::new(1, DataType::UInt),
        Some(&PrimitiveValue::UInt(42)),
    )
    .unwrap();
    let committed = enc.position();

    encode_field_entry_init(&mut enc, &FieldEntry::new(2, DataType::Buffer), 0).unwrap();
    assert!(enc.position() > committed);
    encode_field_entry_complete(&mut enc, false).unwrap();
    assert_eq!(enc.position(), committed);

    encode_field_list_complete(&mut enc, true).unwrap();
    let buf = enc.into_buffer();

    let mut dec = DecodeIterator::new(&buf);
    decode_field_list_init(&mut dec, None, None).unwrap();
    let entry = decode_field_entry(&mut dec).unwrap().unwrap();
    assert_eq!(entry.field_id, 1);
    assert!(decode_field_entry(&mut dec).unwrap().is_none());
}

#[test]
fn set_def_db_and_container_share_one_message_buffer() {
    let db = trade_set_db();
    let list = FieldList {
        set_id: 1,
        has_set_data: true,
        ..Default::default()
    };

    let mut enc = EncodeIterator::with_capacity(256);
    encode_local_field_set_defs(&mut enc, &db).unwrap();
    let defs_end = enc.position();
    encode_field_list_init(&mut enc, &list, Some(&db), None, 0).unwrap();
    for def_entry in db.get(1).unwrap().entries() {
        encode_field_entry(
            &mut enc,
            &FieldEntry::new(def_entry.field_id, def_entry.data_type),
            None,
        )
        .unwrap();
    }
    encode_field_list_complete(&mut enc, true).unwrap();
    let buf = enc.into_buffer();

    let mut dec = DecodeIterator::new(&buf);
    let decoded_db = decode_local_field_set_defs(&mut dec).unwrap();
    assert_eq!(dec.position(), defs_end);
    assert_eq!(decoded_db.len(), db.len());

    // The receiver resolves the container against the defs it just decoded.
    let mut body = DecodeIterator::new(&buf[defs_end..]);
    decode_field_list_init(&mut body, Some(&decoded_db), None).unwrap();
    for def_entry in db.get(1).unwrap().entries() {
        let entry = decode_field_entry(&mut body).unwrap().unwrap();
        assert_eq!(entry.field_id, def_entry.field_id);
        assert_eq!(entry.value().unwrap(), None);
    }
    assert!(decode_field_entry(&mut body).unwrap().is_none());
}

/// Encode a fixed message into a buffer of the given capacity.
fn encode_fixture(enc: &mut EncodeIterator) -> Result<(), CodecError> {
    let db = trade_set_db();
    let list = FieldList {
        set_id: 1,
        has_set_data: true,
        has_standard_data: true,
        ..Default::default()
    };
    encode_field_list_init(enc, &list, Some(&db), None, 0)?;
    encode_field_entry(
        enc,
        &FieldEntry::new(22, DataType::Real),
        Some(&PrimitiveValue::Real(Real::new(RealHint::Exponent2, 3905))),
    )?;
    encode_field_entry(
        enc,
        &FieldEntry::new(25, DataType::Real),
        Some(&PrimitiveValue::Real(Real::new(RealHint::Exponent2, 3910))),
    )?;
    encode_field_entry(
        enc,
        &FieldEntry::new(32, DataType::UInt),
        Some(&PrimitiveValue::UInt(1_000_000)),
    )?;
    encode_field_entry(
        enc,
        &FieldEntry::new(118, DataType::Enum),
        Some(&PrimitiveValue::Enum(2)),
    )?;
    encode_field_list_complete(enc, true)
}

#[test]
fn every_short_buffer_fails_cleanly() {
    let mut enc = EncodeIterator::with_capacity(512);
    encode_fixture(&mut enc).unwrap();
    let full = enc.into_buffer();

    for capacity in 0..full.len() {
        let mut enc = EncodeIterator::with_capacity(capacity);
        let err = encode_fixture(&mut enc).unwrap_err();
        assert!(
            matches!(err, CodecError::BufferTooSmall { .. }),
            "capacity {capacity}: unexpected error {err:?}"
        );
        // Abandon whatever was in progress; nothing survives.
        while enc.depth() > 0 {
            encode_field_list_complete(&mut enc, false).unwrap();
        }
        assert_eq!(enc.position(), 0, "capacity {capacity} left bytes behind");
    }

    // The exact-fit capacity reproduces the message byte for byte.
    let mut enc = EncodeIterator::with_capacity(full.len());
    encode_fixture(&mut enc).unwrap();
    assert_eq!(enc.into_buffer(), full);
}

#[test]
fn truncated_input_is_incomplete_data() {
    let mut enc = EncodeIterator::with_capacity(128);
    encode_fixture(&mut enc).unwrap();
    let full = enc.into_buffer();
    let db = trade_set_db();

    // Chop the final value short; the decode loop must error, not wrap.
    let truncated = &full[..full.len() - 1];
    let mut dec = DecodeIterator::new(truncated);
    decode_field_list_init(&mut dec, Some(&db), None).unwrap();
    let outcome = loop {
        match decode_field_entry(&mut dec) {
            Ok(Some(_)) => continue,
            other => break other,
        }
    };
    assert!(
        matches!(outcome, Err(CodecError::IncompleteData { .. })),
        "expected IncompleteData, got {outcome:?}"
    );
}
