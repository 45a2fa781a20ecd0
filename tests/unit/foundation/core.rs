use super::*;

#[test]
fn timing_defaults_match_documented_constants() {
    let timing = TimingSpec::default();
    assert_eq!(timing.delay, Duration::from_millis(100));
    assert_eq!(timing.loop_count, 0);
    assert!(matches!(timing.repeat(), Repeat::Infinite));
    assert_eq!(DEFAULT_COMPRESSION_QUALITY, 1.0);
}

#[test]
fn finite_loop_count_maps_to_finite_repeat() {
    let timing = TimingSpec::from_millis(200, 3);
    assert!(matches!(timing.repeat(), Repeat::Finite(3)));
    assert_eq!(timing.frame_delay().numer_denom_ms(), (200, 1));
}

#[test]
fn zero_delay_is_rejected_by_validate() {
    assert!(TimingSpec::from_millis(0, 0).validate().is_err());
    TimingSpec::from_millis(10, 0).validate().unwrap();
}

#[test]
fn declared_delay_treats_zero_as_absent() {
    assert_eq!(
        declared_delay(image::Delay::from_numer_denom_ms(0, 1)),
        None
    );
    assert_eq!(
        declared_delay(image::Delay::from_numer_denom_ms(200, 1)),
        Some(Duration::from_millis(200))
    );
}

#[test]
fn stored_delay_rounds_to_the_nearest_centisecond() {
    let stored = |ms| TimingSpec::from_millis(ms, 0).stored_delay();
    assert_eq!(stored(100), Duration::from_millis(100));
    assert_eq!(stored(15), Duration::from_millis(20));
    assert_eq!(stored(19), Duration::from_millis(20));
    assert_eq!(stored(14), Duration::from_millis(10));
    assert_eq!(stored(5), Duration::from_millis(10));
    assert_eq!(stored(1), Duration::from_millis(10));
    assert_eq!(stored(10_000_000), Duration::from_millis(655_350));
}

#[test]
fn encoder_delay_matches_the_stored_delay() {
    let timing = TimingSpec::from_millis(15, 0);
    assert_eq!(timing.frame_delay().numer_denom_ms(), (20, 1));
    let timing = TimingSpec::from_millis(3, 0);
    assert_eq!(timing.frame_delay().numer_denom_ms(), (10, 1));
}

#[test]
fn pool_preserves_order_in_parallel() {
    let pool = FramePool::new(&Threading {
        parallel: true,
        threads: Some(3),
    })
    .unwrap();
    assert!(pool.is_parallel());
    let out = pool.map_indexed(64, |i| i * 2);
    assert_eq!(out, (0..64).map(|i| i * 2).collect::<Vec<_>>());

    let shared = pool.clone();
    assert_eq!(shared.map_indexed(3, |i| i), vec![0, 1, 2]);
}

#[test]
fn clones_share_one_pool() {
    let pool = FramePool::new(&Threading {
        parallel: true,
        threads: Some(2),
    })
    .unwrap();
    let shared = pool.clone();
    match (&pool.pool, &shared.pool) {
        (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
        _ => panic!("expected a parallel pool"),
    }
}

#[test]
fn sequential_pool_spawns_nothing() {
    let pool = FramePool::new(&Threading::default()).unwrap();
    assert!(!pool.is_parallel());
    assert_eq!(pool.map_indexed(4, |i| i + 1), vec![1, 2, 3, 4]);
}

#[test]
fn zero_threads_is_rejected() {
    let threading = Threading {
        parallel: true,
        threads: Some(0),
    };
    assert!(threading.validate().is_err());
    assert!(FramePool::new(&threading).is_err());
}
