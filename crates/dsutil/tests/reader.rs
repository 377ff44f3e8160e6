use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dsutil::{DsutilError, ReaderOptions, TypedReader, TypedWriter, Value, ValueType, WriterOptions, BLOCK_SIZE};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

fn write_numbers(path: &Path, values: impl IntoIterator<Item = Value>) -> u64 {
    let mut writer = TypedWriter::open(path, ValueType::Number, WriterOptions::default()).expect("open writer");
    for v in values {
        writer.write(v).expect("write");
    }
    writer.close().expect("close").count
}

fn read_with(path: &Path, ty: ValueType, options: ReaderOptions) -> dsutil::Result<Vec<Value>> {
    TypedReader::open(path, ty, options)?.collect()
}

#[test]
fn callback_counts_follow_interval_and_want_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("numbers");
    write_numbers(&path, (0..1000i64).map(Value::Int));

    for (interval, want_count, expected) in [
        (300u64, None, vec![3u64]),
        (250, Some(300u64), vec![1]),
        (250, Some(200), vec![0]),
        (1, None, vec![999, 1000]),
        (5, None, vec![199, 200]),
        (5, Some(12), vec![2]),
        (10000, None, vec![0]),
    ] {
        for offset in [0i64, 50_000_000, -10_000] {
            let calls = Arc::new(AtomicU64::new(0));
            let seen = Arc::new(Mutex::new(Vec::new()));
            let options = ReaderOptions {
                want_count,
                ..ReaderOptions::default()
            }
            .with_callback(interval, offset, {
                let calls = Arc::clone(&calls);
                let seen = Arc::clone(&seen);
                move |position| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.lock().expect("lock").push(position);
                    Ok(ControlFlow::Continue(()))
                }
            });
            let values = read_with(&path, ValueType::Number, options).expect("read");
            assert_eq!(values.len() as u64, want_count.unwrap_or(1000));

            let calls = calls.load(Ordering::SeqCst);
            assert!(
                expected.contains(&calls),
                "interval {interval} want {want_count:?} offset {offset}: {calls} calls"
            );
            let limit = want_count.unwrap_or(1000) as i64;
            for (n, position) in seen.lock().expect("lock").iter().enumerate() {
                let produced = (n as i64 + 1) * interval as i64;
                assert_eq!(*position, produced + offset);
                assert!(produced <= limit);
            }
        }
    }
}

#[test]
fn callback_stop_truncates_without_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("numbers");
    write_numbers(&path, (0..1000i64).map(Value::Int));

    let options = ReaderOptions::default().with_callback(1, 0, |_| Ok(ControlFlow::Break(())));
    assert_eq!(read_with(&path, ValueType::Number, options).expect("read"), vec![Value::Int(0)]);

    let options = ReaderOptions::default().with_callback(100, 0, |position| {
        Ok(if position >= 300 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    });
    let values = read_with(&path, ValueType::Number, options).expect("read");
    assert_eq!(values, (0..300i64).map(Value::Int).collect::<Vec<_>>());
}

#[test]
fn callback_failure_aborts_the_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("numbers");
    write_numbers(&path, (0..1000i64).map(Value::Int));

    let options = ReaderOptions::default().with_callback(1, 0, |_| Err("division by zero".into()));
    let mut reader = TypedReader::open(&path, ValueType::Number, options).expect("open");
    assert_eq!(reader.next().transpose().expect("first value"), Some(Value::Int(0)));
    let err = reader.next().expect("callback error").expect_err("callback failed");
    assert!(matches!(err, DsutilError::Callback(_)), "{err}");
    assert!(reader.next().is_none());
    assert_eq!(reader.produced(), 1);
}

#[test]
fn number_straddling_a_block_boundary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("numbers");
    let big = BigInt::parse_bytes(
        b"2e6465726f6220657261206577202c6567617373656d20676e6f6c207974746572702061207369207374696220646e6173756f6874206120796c6c6175746341203f7468676972202c6c6c657720736120746867696d206577202c65726568206567617373656d2074726f68732061206576616820732774656c20796548",
        16,
    )
    .expect("hex");
    // Each small integer takes 9 bytes; stop just short of the first block boundary.
    let small = (BLOCK_SIZE - 100).div_ceil(9);
    let mut want = vec![Value::Int(42); small];
    want.push(Value::from(big));
    assert_eq!(write_numbers(&path, want.iter().cloned()), want.len() as u64);
    assert_eq!(read_with(&path, ValueType::Number, ReaderOptions::default()).expect("read"), want);
}

#[test]
fn want_count_stops_after_a_large_first_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("numbers");
    let big = Value::from(BigInt::from(1u8) << 1000);
    write_numbers(&path, [big.clone(), Value::Int(7)]);
    let options = ReaderOptions {
        want_count: Some(1),
        ..ReaderOptions::default()
    };
    assert_eq!(read_with(&path, ValueType::Number, options).expect("read"), vec![big]);
}

#[test]
fn large_strings_across_blocks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ascii");
    let data = vec![
        "a".repeat(128 * 1024 - 6),
        "b".repeat(128 * 1024 - 6),
        "c".repeat(2090 * 1024),
        "d".to_owned(),
    ];
    let stats = dsutil::write_column(&path, ValueType::Ascii, WriterOptions::default(), |w| {
        for s in &data {
            w.write(s.as_str())?;
        }
        Ok(())
    })
    .expect("write column");
    assert!(stats.blocks > 17, "{} blocks", stats.blocks);
    let got = read_with(&path, ValueType::Ascii, ReaderOptions::default()).expect("read");
    assert_eq!(got.len(), data.len());
    for (got, want) in got.iter().zip(&data) {
        assert!(*got == Value::from(want.as_str()), "string of {} bytes differs", want.len());
    }
}

#[test]
fn parsed_columns_read_as_their_base() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("parsed");
    dsutil::write_column(&path, ValueType::ParsedInt32, WriterOptions::default(), |w| {
        w.write(" 12 ")?;
        w.write(-3)?;
        Ok(())
    })
    .expect("write column");
    let reader = TypedReader::open(&path, ValueType::ParsedInt32, ReaderOptions::default()).expect("open");
    assert_eq!(reader.value_type(), ValueType::Int32);
    let values = reader.collect::<dsutil::Result<Vec<_>>>().expect("read");
    assert_eq!(values, vec![Value::Int(12), Value::Int(-3)]);
    assert_eq!(
        read_with(&path, ValueType::Int32, ReaderOptions::default()).expect("read"),
        values
    );
}

#[test]
fn truncated_file_is_corrupt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("numbers");
    write_numbers(&path, (0..100i64).map(Value::Int));
    let bytes = std::fs::read(&path).expect("read file");
    std::fs::write(&path, &bytes[..bytes.len() - 3]).expect("truncate");
    let err = read_with(&path, ValueType::Number, ReaderOptions::default()).expect_err("corrupt");
    assert!(matches!(err, DsutilError::Corrupt(_)), "{err}");
}

#[test]
fn reading_with_the_wrong_domain_is_corrupt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bools");
    dsutil::write_column(&path, ValueType::Bool, WriterOptions::default(), |w| {
        w.write(true)?;
        Ok(())
    })
    .expect("write column");
    // One byte cannot hold an Int64.
    let err = read_with(&path, ValueType::Int64, ReaderOptions::default()).expect_err("corrupt");
    assert!(matches!(err, DsutilError::Corrupt(_)), "{err}");
}
