mod common;

use common::{assert_exits, ds, process_alive, FakeZfs};
use std::fs;
use std::io::{Cursor, Read, Write};
use zpull_core::error::ZpullError;
use zpull_core::provider::ReceiveStream;
use zpull_core::version::{FilesystemVersion, VersionType};

fn snap(name: &str, createtxg: u64) -> FilesystemVersion {
    FilesystemVersion {
        version_type: VersionType::Snapshot,
        name: name.to_string(),
        guid: createtxg + 1000,
        createtxg,
        creation: 1_700_000_000,
    }
}

#[test]
fn full_send_streams_stdout() {
    let fake = FakeZfs::new("printf 'full-stream-bytes'");
    let mut stream = fake
        .system()
        .send(&ds("tank/data"), &snap("zpull_1", 1), None)
        .unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    assert_eq!(out, "full-stream-bytes");
    assert_eq!(fake.invocations(), ["send tank/data@zpull_1"]);
}

#[test]
fn incremental_send_names_both_snapshots() {
    let fake = FakeZfs::new("printf 'incremental'");
    let mut stream = fake
        .system()
        .send(&ds("tank/data"), &snap("zpull_1", 1), Some(&snap("zpull_2", 2)))
        .unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(
        fake.invocations(),
        ["send -i tank/data@zpull_1 tank/data@zpull_2"]
    );
}

#[test]
fn failed_send_surfaces_at_end_of_stream() {
    let fake = FakeZfs::new("printf 'partial'\necho 'snapshot does not exist' >&2\nexit 1");
    let mut stream = fake
        .system()
        .send(&ds("tank/data"), &snap("zpull_1", 1), None)
        .unwrap();

    let mut out = Vec::new();
    let err = stream.read_to_end(&mut out).unwrap_err();
    assert!(err.to_string().contains("snapshot does not exist"), "{err}");
}

#[test]
fn dropping_send_stream_kills_sender() {
    let fake = FakeZfs::new("echo $$ > \"$DIR/pid\"\nprintf 'x'\nexec sleep 30");
    let mut stream = fake
        .system()
        .send(&ds("tank/data"), &snap("zpull_1", 1), None)
        .unwrap();
    let mut first = [0u8; 1];
    stream.read_exact(&mut first).unwrap();
    let pid = fake.recorded_pid();

    drop(stream);
    assert!(!process_alive(pid));
}

#[test]
fn receive_copies_input_to_stdin() {
    let fake = FakeZfs::new("cat > \"$DIR/received\"\necho 'receiving full stream'");
    let payload = b"replication-stream".repeat(1024);

    fake.system()
        .receive(&ds("pool/backup"), &mut Cursor::new(&payload), &["-s".to_string()])
        .unwrap();

    assert_eq!(fs::read(fake.file("received")).unwrap(), payload);
    assert_eq!(fake.invocations(), ["recv -s pool/backup"]);
}

#[test]
fn receive_failure_prefers_zfs_error() {
    let fake = FakeZfs::new("echo 'cannot receive: invalid stream' >&2\nexit 1");
    let payload = vec![0u8; 4 * 1024 * 1024];

    let err = fake
        .system()
        .receive(&ds("pool/backup"), &mut Cursor::new(payload), &[])
        .unwrap_err();
    let zfs = err.as_zfs().expect("expected a zfs failure");
    assert!(zfs.stderr_lossy().contains("invalid stream"));
}

#[test]
fn receive_writer_finishes_cleanly() {
    let fake = FakeZfs::new("cat > \"$DIR/received\"");
    let mut writer = fake
        .system()
        .receive_writer(&ds("pool/backup"), &["-s".to_string()])
        .unwrap();
    writer.write_all(b"chunk-1 ").unwrap();
    writer.write_all(b"chunk-2").unwrap();
    writer.close().unwrap();

    assert_eq!(fs::read(fake.file("received")).unwrap(), b"chunk-1 chunk-2");
    assert_eq!(fake.invocations(), ["recv -s pool/backup"]);
}

#[test]
fn boxed_receive_reports_exit_status() {
    let fake = FakeZfs::new("cat > /dev/null\necho 'destination has been modified' >&2\nexit 1");
    let mut sink: Box<dyn ReceiveStream> = Box::new(
        fake.system()
            .receive_writer(&ds("pool/backup"), &[])
            .unwrap(),
    );
    sink.write_all(b"data").unwrap();

    let err = sink.finish().unwrap_err();
    match err {
        ZpullError::Zfs(zfs) => assert!(zfs.stderr_lossy().contains("has been modified")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dropping_receive_writer_kills_receiver() {
    let fake = FakeZfs::new("echo $$ > \"$DIR/pid\"\nexec cat > /dev/null");
    let writer = fake
        .system()
        .receive_writer(&ds("pool/backup"), &[])
        .unwrap();
    let pid = fake.recorded_pid();

    drop(writer);
    assert_exits(pid);
}
