mod common;

use std::sync::Arc;
use std::time::Duration;

use guild::{
    Category, Error, JournalConfig, Location, Mode, MsgType, Reader, StopSignal, WaitStrategy,
    Writer,
};
use tempfile::tempdir;

use common::{init_logs, small_journal, test_locator, ManualClock};

fn feed_location() -> Location {
    Location::new(Mode::Live, Category::MarketData, "xtp", "level1").expect("location")
}

#[test]
fn frames_round_trip_in_order() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let clock = ManualClock::at(1_000);
    let location = feed_location();

    let mut writer = Writer::open(&location, locator.as_ref(), clock.clone(), small_journal())
        .expect("writer open");
    clock.set(1_000);
    writer.write(0x2001, 900, b"tick-one").expect("append");
    clock.set(2_000);
    writer.write(0x2002, 0, b"tick-two").expect("append");

    let mut reader = Reader::new(Arc::clone(&locator));
    reader.join(&location, 0, 0).expect("join");

    let first = reader.next().expect("read").expect("first frame");
    assert_eq!(first.gen_time(), 1_000);
    assert_eq!(first.trigger_time(), 900);
    assert_eq!(first.type_id(), 0x2001);
    assert_eq!(first.msg_type(), MsgType::Unknown(0x2001));
    assert_eq!(first.source(), location.uid());
    assert_eq!(first.payload(), b"tick-one");

    let second = reader.next().expect("read").expect("second frame");
    assert_eq!(second.gen_time(), 2_000);
    // trigger_time zero stamps trigger_time = gen_time.
    assert_eq!(second.trigger_time(), 2_000);
    assert_eq!(second.payload(), b"tick-two");

    assert!(reader.next().expect("read").is_none());
}

#[test]
fn second_writer_on_same_location_is_refused() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let clock = ManualClock::at(0);
    let location = feed_location();

    let _writer = Writer::open(&location, locator.as_ref(), clock.clone(), small_journal())
        .expect("first writer");
    let err = Writer::open(&location, locator.as_ref(), clock, small_journal())
        .expect_err("second writer");
    assert!(matches!(err, Error::WriterAlreadyActive(_)));
}

#[test]
fn lock_is_released_when_writer_drops() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let location = feed_location();

    {
        let clock = ManualClock::at(0);
        let _writer = Writer::open(&location, locator.as_ref(), clock, small_journal())
            .expect("first writer");
    }
    let clock = ManualClock::at(0);
    Writer::open(&location, locator.as_ref(), clock, small_journal()).expect("writer after drop");
}

#[test]
fn exactly_full_segment_accepts_a_final_empty_frame() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let clock = ManualClock::at(1);
    let location = feed_location();

    // Two header-only records fill a 64-byte segment exactly.
    let config = JournalConfig { segment_size: 64 };
    let mut writer =
        Writer::open(&location, locator.as_ref(), clock.clone(), config).expect("writer");
    writer.write(0x2001, 0, b"").expect("first empty frame");
    clock.set(2);
    writer.write(0x2001, 0, b"").expect("frame ending at segment end");
    clock.set(3);
    let err = writer.write(0x2001, 0, b"").expect_err("segment full");
    assert!(matches!(err, Error::JournalFull));

    let mut reader = Reader::new(locator);
    reader.join(&location, 0, 0).expect("join");
    assert_eq!(reader.next().expect("read").expect("first").gen_time(), 1);
    assert_eq!(reader.next().expect("read").expect("second").gen_time(), 2);
    assert!(reader.next().expect("read").is_none());
}

#[test]
fn join_from_time_is_inclusive() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let clock = ManualClock::at(0);
    let location = feed_location();

    let mut writer = Writer::open(&location, locator.as_ref(), clock.clone(), small_journal())
        .expect("writer");
    for gen_time in [10u64, 20, 30] {
        clock.set(gen_time);
        writer.write(0x2001, 0, &gen_time.to_le_bytes()).expect("append");
    }

    let mut reader = Reader::new(locator);
    reader.join(&location, 0, 20).expect("join");

    let first = reader.next().expect("read").expect("frame at 20");
    assert_eq!(first.gen_time(), 20);
    let second = reader.next().expect("read").expect("frame at 30");
    assert_eq!(second.gen_time(), 30);
    assert!(reader.next().expect("read").is_none());
}

#[test]
fn blocking_read_suspends_until_stop() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let location = feed_location();

    let stop = StopSignal::new();
    let stopper = stop.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stopper.signal();
    });

    // Joining a journal nobody has written yet creates it empty; reading
    // past the end suspends rather than erroring.
    let mut reader = Reader::new(locator);
    reader.set_wait_strategy(WaitStrategy::Sleep(Duration::from_millis(1)));
    reader.join(&location, 0, 0).expect("join");
    let outcome = reader.next_blocking(&stop).expect("blocking read");
    assert!(outcome.is_none());
    handle.join().expect("stopper thread");
}

#[test]
fn blocking_read_wakes_on_append() {
    init_logs();
    let dir = tempdir().expect("tempdir");
    let locator = test_locator(dir.path());
    let location = feed_location();
    let clock = ManualClock::at(5);

    let mut reader = Reader::new(Arc::clone(&locator));
    reader.set_wait_strategy(WaitStrategy::Sleep(Duration::from_millis(1)));
    reader.join(&location, 0, 0).expect("join");

    let writer_locator = Arc::clone(&locator);
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        let mut writer =
            Writer::open(&feed_location(), writer_locator.as_ref(), clock, small_journal())
                .expect("writer");
        writer.write(0x2001, 0, b"wake").expect("append");
    });

    let stop = StopSignal::new();
    let event = reader
        .next_blocking(&stop)
        .expect("blocking read")
        .expect("event");
    assert_eq!(event.payload(), b"wake");
    handle.join().expect("writer thread");
}
