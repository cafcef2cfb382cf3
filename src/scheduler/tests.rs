use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_tick(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_ticks_on_interval() {
    let scheduler = PollScheduler::new("test");
    let ticks = Arc::new(AtomicUsize::new(0));

    assert!(scheduler.start(Duration::from_secs(5), counting_tick(&ticks)));

    // First tick is one period after start
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);

    assert!(scheduler.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_noop() {
    let scheduler = PollScheduler::new("test");
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    assert!(scheduler.start(Duration::from_secs(1), counting_tick(&first)));
    assert!(!scheduler.start(Duration::from_secs(1), counting_tick(&second)));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(first.load(Ordering::SeqCst), 3);
    assert_eq!(second.load(Ordering::SeqCst), 0);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_new_ticks() {
    let scheduler = PollScheduler::new("test");
    let ticks = Arc::new(AtomicUsize::new(0));

    scheduler.start(Duration::from_secs(1), counting_tick(&ticks));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(scheduler.stop().await);
    assert!(!scheduler.is_running());

    let after_stop = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);

    // Stopping again is a no-op
    assert!(!scheduler.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_tick() {
    let scheduler = PollScheduler::new("test");
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let s = Arc::clone(&started);
    let f = Arc::clone(&finished);
    scheduler.start(Duration::from_secs(1), move || {
        let s = Arc::clone(&s);
        let f = Arc::clone(&f);
        async move {
            s.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3)).await;
            f.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Let the first tick begin its slow work
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    scheduler.stop().await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_ticks_do_not_overlap() {
    let scheduler = PollScheduler::new("test");
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let current = Arc::clone(&in_flight);
    let max = Arc::clone(&max_in_flight);
    scheduler.start(Duration::from_secs(1), move || {
        let current = Arc::clone(&current);
        let max = Arc::clone(&max);
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            max.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2500)).await;
            current.fetch_sub(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(Duration::from_secs(12)).await;
    scheduler.stop().await;

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let scheduler = PollScheduler::new("test");
    let ticks = Arc::new(AtomicUsize::new(0));

    scheduler.start(Duration::from_secs(1), counting_tick(&ticks));
    scheduler.stop().await;

    assert!(scheduler.start(Duration::from_secs(1), counting_tick(&ticks)));
    assert!(scheduler.is_running());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 1);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_tick_does_not_end_loop() {
    let scheduler = PollScheduler::new("test");
    let ticks = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&ticks);
    scheduler.start(Duration::from_secs(1), move || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("source blew up");
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert!(scheduler.is_running());
    assert!(scheduler.stop().await);
}
