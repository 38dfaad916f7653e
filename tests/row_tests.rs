mod common;

use brolog::{DecodeError, Error, LogReader, LogSpec, Value};
use common::{conn_log, ZeekLogBuilder};
use std::io::Cursor;
use tempfile::tempdir;

fn reader(text: String) -> LogReader {
    LogReader::from_reader(Cursor::new(text), "test.log").unwrap()
}

// ============================================================================
// DECODING
// ============================================================================

#[test]
fn test_end_to_end_conn_row() {
    let text = ZeekLogBuilder::new("conn")
        .field("ts", "time")
        .field("id.orig_h", "addr")
        .field("id.orig_p", "port")
        .row(&["1577836800.123456", "10.0.0.1", "443"])
        .build();

    let mut reader = reader(text);
    let rows: Vec<_> = reader.rows().collect::<Result<_, _>>().unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("ts"), Some(&Value::Time(1577836800.123456)));
    assert_eq!(row.get("id.orig_h"), Some(&Value::Addr("10.0.0.1".parse().unwrap())));
    assert_eq!(row.get("id.orig_p"), Some(&Value::Port(443)));
    assert_eq!(row.get("missing"), None);
    assert_eq!(row.line(), 9);
}

#[test]
fn test_all_scalar_types() {
    let text = ZeekLogBuilder::new("types")
        .field("b", "bool")
        .field("c", "count")
        .field("i", "int")
        .field("d", "double")
        .field("iv", "interval")
        .field("s", "string")
        .field("e", "enum")
        .field("net", "subnet")
        .field("v6", "addr")
        .row(&["T", "18446744073709551615", "-7", "2.5", "-0.25", "hello world", "Conn::LOG", "10.0.0.0/8", "2001:db8::1"])
        .build();

    let mut reader = reader(text);
    let row = reader.rows().next().unwrap().unwrap();

    assert_eq!(
        row.values(),
        &[
            Value::Bool(true),
            Value::Count(u64::MAX),
            Value::Int(-7),
            Value::Double(2.5),
            Value::Interval(-0.25),
            Value::String("hello world".to_string()),
            Value::Enum("Conn::LOG".to_string()),
            Value::Subnet("10.0.0.0".parse().unwrap(), 8),
            Value::Addr("2001:db8::1".parse().unwrap()),
        ]
    );
}

#[test]
fn test_set_of_count() {
    let text = ZeekLogBuilder::new("sets")
        .field("ports", "set[count]")
        .row(&["3,5,7"])
        .row(&["-"])
        .row(&["(empty)"])
        .build();

    let mut reader = reader(text);
    let rows: Vec<_> = reader.rows().collect::<Result<_, _>>().unwrap();

    assert_eq!(
        rows[0].get("ports"),
        Some(&Value::Set(vec![Value::Count(3), Value::Count(5), Value::Count(7)]))
    );

    let unset = rows[1].get("ports").unwrap();
    let empty = rows[2].get("ports").unwrap();
    assert_eq!(unset, &Value::Unset);
    assert!(unset.elements().is_empty());
    assert_eq!(empty, &Value::Set(Vec::new()));
    assert!(empty.elements().is_empty());
    assert_ne!(unset, empty);
}

#[test]
fn test_sentinels_bypass_translators() {
    // Neither "-" nor "(empty)" is a valid count, bool, or addr.
    let text = ZeekLogBuilder::new("sentinels")
        .field("c", "count")
        .field("b", "bool")
        .field("a", "addr")
        .field("s", "string")
        .row(&["-", "-", "-", "-"])
        .row(&["(empty)", "(empty)", "(empty)", "(empty)"])
        .build();

    let mut reader = reader(text);
    let rows: Vec<_> = reader.rows().collect::<Result<_, _>>().unwrap();

    assert!(rows[0].values().iter().all(Value::is_unset));
    assert_eq!(
        rows[1].values(),
        &[
            Value::Count(0),
            Value::Bool(false),
            Value::Addr("0.0.0.0".parse().unwrap()),
            Value::String(String::new()),
        ]
    );
}

#[test]
fn test_custom_sentinels() {
    let text = ZeekLogBuilder::new("custom")
        .unset_field("NONE")
        .empty_field("EMPTY")
        .field("s", "string")
        .field("v", "vector[count]")
        .row(&["-", "NONE"])
        .row(&["NONE", "EMPTY"])
        .build();

    let mut reader = reader(text);
    let rows: Vec<_> = reader.rows().collect::<Result<_, _>>().unwrap();

    assert_eq!(rows[0].get("s"), Some(&Value::String("-".to_string())));
    assert_eq!(rows[0].get("v"), Some(&Value::Unset));
    assert_eq!(rows[1].get("s"), Some(&Value::Unset));
    assert_eq!(rows[1].get("v"), Some(&Value::Vector(Vec::new())));
}

// ============================================================================
// FILTERING AND ERRORS
// ============================================================================

#[test]
fn test_comments_and_footer_are_skipped() {
    let text = conn_log()
        .raw("#a comment in the middle")
        .close("2020-01-01-01-00-00")
        .build();

    let mut reader = reader(text);
    let rows: Vec<_> = reader.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().map(|r| r.line()).collect::<Vec<_>>(), vec![9, 10, 11]);
}

#[test]
fn test_row_shape_error_is_per_row() {
    let text = ZeekLogBuilder::new("shape")
        .field("a", "count")
        .field("b", "count")
        .row(&["1", "2"])
        .row(&["1"])
        .row(&["1", "2", "3"])
        .row(&["4", "5"])
        .build();

    let mut reader = reader(text);
    let results: Vec<_> = reader.rows().collect();
    assert_eq!(results.len(), 4);

    assert!(results[0].is_ok());
    match &results[1] {
        Err(Error::RowShape { line, expected, found, .. }) => {
            assert_eq!((*line, *expected, *found), (10, 2, 1));
        }
        other => panic!("expected row shape error, got {:?}", other),
    }
    assert!(matches!(results[2], Err(Error::RowShape { found: 3, .. })));
    assert_eq!(results[3].as_ref().unwrap().get("a"), Some(&Value::Count(4)));
}

#[test]
fn test_decode_error_names_field_and_line() {
    let text = ZeekLogBuilder::new("decode")
        .field("ok", "count")
        .field("flag", "bool")
        .row(&["1", "yes"])
        .row(&["2", "T"])
        .build();

    let mut reader = reader(text);
    let results: Vec<_> = reader.rows().collect();

    let err = results[0].as_ref().unwrap_err();
    assert!(err.is_row_error());
    assert_eq!(err.line(), Some(9));
    match err {
        Error::Decode { origin, field, type_name, token, reason, .. } => {
            assert_eq!(origin, "test.log");
            assert_eq!(field, "flag");
            assert_eq!(type_name, "bool");
            assert_eq!(token, "yes");
            assert_eq!(reason, &DecodeError::Invalid { expected: "bool" });
        }
        other => panic!("expected decode error, got {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "test.log:9: cannot decode field 'flag' (bool) from \"yes\": not a valid bool"
    );

    assert_eq!(results[1].as_ref().unwrap().get("flag"), Some(&Value::Bool(true)));
}

#[test]
fn test_composite_element_error_fails_field() {
    let text = ZeekLogBuilder::new("bad_set")
        .field("ports", "set[port]")
        .row(&["80,http,443"])
        .build();

    let mut reader = reader(text);
    let err = reader.rows().next().unwrap().unwrap_err();
    match err {
        Error::Decode { reason, .. } => {
            assert!(matches!(reason, DecodeError::Element { index: 1, .. }));
        }
        other => panic!("expected decode error, got {:?}", other),
    }
}

/// An http log whose second uri holds bytes that are not UTF-8
fn http_log_with_raw_bytes() -> Vec<u8> {
    let text = ZeekLogBuilder::new("http")
        .field("method", "string")
        .field("uri", "string")
        .row(&["GET", "/a"])
        .row(&["GET", "@RAW@"])
        .row(&["GET", "/b"])
        .row(&["POST", "/c"])
        .build();
    let (before, after) = text.split_once("@RAW@").unwrap();
    [before.as_bytes(), &b"/\xff\xfe"[..], after.as_bytes()].concat()
}

#[test]
fn test_invalid_utf8_does_not_end_iteration() {
    let mut reader = LogReader::from_reader(Cursor::new(http_log_with_raw_bytes()), "http.log").unwrap();
    let uris: Vec<Value> = reader
        .rows()
        .map(|row| row.unwrap().get("uri").unwrap().clone())
        .collect();

    assert_eq!(
        uris,
        vec![
            Value::String("/a".to_string()),
            Value::String("/\u{fffd}\u{fffd}".to_string()),
            Value::String("/b".to_string()),
            Value::String("/c".to_string()),
        ]
    );
}

#[test]
fn test_invalid_utf8_in_file_with_crlf() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("http.log");
    let bytes: Vec<u8> = http_log_with_raw_bytes()
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .flat_map(|line| [line, &b"\r\n"[..]].concat())
        .collect();
    std::fs::write(&path, bytes).unwrap();

    let spec = LogSpec::load(&path).unwrap();
    let rows: Vec<_> = spec.open(&path).unwrap().collect::<Result<_, _>>().unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1].get("uri").and_then(Value::as_str), Some("/\u{fffd}\u{fffd}"));
    assert_eq!(rows[3].get("uri").and_then(Value::as_str), Some("/c"));
    assert_eq!(rows[3].line(), 12);
}

// ============================================================================
// ITERATION
// ============================================================================

#[test]
fn test_iteration_is_single_pass() {
    let mut reader = reader(conn_log().build());

    assert_eq!(reader.rows().count(), 3);
    assert_eq!(reader.rows().count(), 0);
}

#[test]
fn test_reopen_restarts() {
    let dir = tempdir().unwrap();
    let path = conn_log().close("2020-01-01-01-00-00").write_to(dir.path(), "conn.log");

    let spec = LogSpec::load(&path).unwrap();

    let mut rows = spec.open(&path).unwrap();
    assert_eq!(rows.by_ref().count(), 3);
    assert!(rows.next().is_none());

    assert_eq!(spec.open(&path).unwrap().count(), 3);
}

#[test]
fn test_rows_are_lazy() {
    let mut builder = conn_log();
    for i in 0..1000 {
        let ts = format!("{}.000000", 1577836900 + i);
        builder = builder.row(&[ts.as_str(), "C1", "10.0.0.1", "80", "tcp", "-", "-", "-"]);
    }
    let mut reader = reader(builder.build());

    let mut rows = reader.rows();
    let first = rows.next().unwrap().unwrap();
    assert_eq!(first.line(), 9);
    assert_eq!(rows.line(), 9);
}

#[test]
fn test_rows_from_split_source() {
    let (spec, lines) = reader(conn_log().build()).into_parts();

    let uids: Vec<String> = spec
        .rows(lines)
        .map(|row| row.unwrap().get("uid").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(uids, vec!["CHhAvVGS1DHFjwGM9", "ClEkJM2Vm5giqnMf4h", "C4J4Th3PJpwUYZZ6gc"]);
}

#[test]
fn test_row_serializes_as_object() {
    let mut reader = reader(conn_log().build());
    let row = reader.rows().next().unwrap().unwrap();

    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["id.orig_h"], serde_json::json!("10.0.0.1"));
    assert_eq!(json["id.orig_p"], serde_json::json!(443));
    assert_eq!(json["tunnel_parents"], serde_json::json!([]));
}
