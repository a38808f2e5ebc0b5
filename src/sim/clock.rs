//! Fixed-rate simulation driver
//!
//! One tick: read the panel bounds, advance every shape by the fixed step,
//! re-roll the moving set if the rotation interval elapsed, then publish the
//! snapshot. The integration step never depends on how late a tick runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

use super::panel::PanelBounds;
use super::store::ShapeStore;
use crate::broadcast::{Broadcaster, Feed};
use crate::consts::*;

/// Clock timing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTiming {
    /// Wall-clock time between ticks
    pub period: Duration,
    /// Simulated time advanced per tick
    pub dt: f64,
    /// Minimum wall-clock time between re-rolls of the moving set
    pub rotation_interval: Duration,
}

impl Default for ClockTiming {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(TICK_PERIOD_MS),
            dt: SIM_DT,
            rotation_interval: Duration::from_millis(ROTATION_INTERVAL_MS),
        }
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub shapes: usize,
    pub moving: usize,
    pub rotated: bool,
}

/// Drives the shared store at a fixed rate
pub struct SimulationClock {
    store: Arc<ShapeStore>,
    panel: Arc<PanelBounds>,
    broadcaster: Arc<dyn Broadcaster>,
    timing: ClockTiming,
    ticks: u64,
}

impl SimulationClock {
    pub fn new(
        store: Arc<ShapeStore>,
        panel: Arc<PanelBounds>,
        broadcaster: Arc<dyn Broadcaster>,
        timing: ClockTiming,
    ) -> Self {
        Self {
            store,
            panel,
            broadcaster,
            timing,
            ticks: 0,
        }
    }

    pub fn timing(&self) -> ClockTiming {
        self.timing
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick as of `now` and publish the resulting snapshot
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.ticks += 1;
        let panel = self.panel.get();

        let (report, snapshot) = {
            let mut state = self.store.lock();
            state.advance(self.timing.dt, panel);

            let rotated = state.rotation_due(now, self.timing.rotation_interval);
            if rotated {
                let started = state.rotate_moving(now);
                log::debug!(
                    "Tick {}: rotated moving set ({} of {} shapes moving)",
                    self.ticks,
                    started,
                    state.len()
                );
            }

            let report = TickReport {
                tick: self.ticks,
                shapes: state.len(),
                moving: state.moving_count(),
                rotated,
            };
            (report, state.snapshot())
        };

        self.broadcaster.publish(Feed::Shapes {
            tick: Some(report.tick),
            shapes: snapshot.into(),
        });
        report
    }

    /// Tick forever at the configured period.
    ///
    /// Late ticks are skipped rather than replayed in a burst, and the
    /// schedule stays aligned to the start time.
    pub async fn run(mut self) {
        let period = self.timing.period;
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let budget = period.mul_f64(0.9);

        log::info!(
            "Simulation clock started: period {:?}, dt {:.4}, rotation every {:?}, topic {}",
            period,
            self.timing.dt,
            self.timing.rotation_interval,
            self.broadcaster.topic()
        );

        loop {
            ticker.tick().await;

            // tokio's clock, so a paused runtime also drives rotation timing
            let started = tokio::time::Instant::now();
            let report = self.tick(started.into_std());
            let elapsed = started.elapsed();

            if elapsed > budget {
                log::warn!(
                    "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} shapes",
                    report.tick,
                    elapsed.as_secs_f64() * 1000.0,
                    budget.as_secs_f64() * 1000.0,
                    report.shapes
                );
            }
            log::trace!(
                "Tick #{}: {} shapes, {} moving",
                report.tick,
                report.shapes,
                report.moving
            );
        }
    }

    /// Spawn `run` on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChannelBroadcaster;
    use crate::broadcast::testing::RecordingBroadcaster;
    use crate::sim::{Dimensions, ShapeCounts, ShapeTuning};

    type Fixture = (
        Arc<ShapeStore>,
        Arc<PanelBounds>,
        Arc<RecordingBroadcaster>,
        SimulationClock,
    );

    fn fixture(seed: u64) -> Fixture {
        let store = Arc::new(ShapeStore::new(ShapeTuning::default(), MOVING_FRACTION, Some(seed)));
        let panel = Arc::new(PanelBounds::new());
        let recorder = Arc::new(RecordingBroadcaster::default());
        let clock = SimulationClock::new(
            Arc::clone(&store),
            Arc::clone(&panel),
            recorder.clone(),
            ClockTiming::default(),
        );
        (store, panel, recorder, clock)
    }

    #[test]
    fn test_tick_advances_and_publishes() {
        let (store, _panel, recorder, mut clock) = fixture(1);
        let before = store.initialize(ShapeCounts::new(8, 4, 4), Dimensions::DEFAULT);

        let report = clock.tick(Instant::now());
        assert_eq!(report.tick, 1);
        assert_eq!(report.shapes, 16);
        assert_eq!(report.moving, 4);
        assert!(!report.rotated);

        let Some(Feed::Shapes { tick, shapes }) = recorder.last() else {
            panic!("expected a shape feed");
        };
        assert_eq!(tick, Some(1));
        assert_eq!(shapes.as_ref(), store.snapshot().as_slice());

        for (old, new) in before.iter().zip(shapes.iter()) {
            if old.moving {
                assert_ne!(old.pos, new.pos);
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn test_publishes_every_tick_even_when_idle() {
        let (_store, _panel, recorder, mut clock) = fixture(2);
        let now = Instant::now();
        for _ in 0..5 {
            clock.tick(now);
        }

        let ticks: Vec<Option<u64>> = recorder
            .feeds()
            .into_iter()
            .map(|feed| match feed {
                Feed::Shapes { tick, shapes } => {
                    assert!(shapes.is_empty());
                    tick
                }
                Feed::Panel(_) => panic!("unexpected panel feed"),
            })
            .collect();
        assert_eq!(ticks, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        assert_eq!(clock.ticks(), 5);
    }

    #[test]
    fn test_rotation_waits_for_interval() {
        let (store, _panel, _recorder, mut clock) = fixture(3);
        store.initialize(ShapeCounts::new(40, 0, 0), Dimensions::DEFAULT);
        let start = Instant::now();

        assert!(!clock.tick(start + Duration::from_millis(1000)).rotated);
        assert!(!clock.tick(start + Duration::from_millis(2500)).rotated);

        let first_movers: Vec<_> = store.snapshot().into_iter().filter(|s| s.moving).collect();
        let report = clock.tick(start + Duration::from_millis(3100));
        assert!(report.rotated);
        assert_eq!(report.moving, 10);

        // Timer restarts from the rotation
        assert!(!clock.tick(start + Duration::from_millis(4000)).rotated);
        assert!(clock.tick(start + Duration::from_millis(6200)).rotated);

        // Re-roll draws fresh velocities even for shapes picked again
        let second_movers: Vec<_> = store.snapshot().into_iter().filter(|s| s.moving).collect();
        assert_eq!(second_movers.len(), 10);
        assert_ne!(first_movers, second_movers);
    }

    #[test]
    fn test_tick_uses_current_panel() {
        let (store, panel, _recorder, mut clock) = fixture(4);
        store.initialize(ShapeCounts::new(30, 30, 30), Dimensions::DEFAULT);
        panel.set(PANEL_MIN, PANEL_MIN).unwrap();

        clock.tick(Instant::now());
        for shape in store.snapshot().iter().filter(|s| s.moving) {
            assert!(shape.fits_within(PANEL_MIN, PANEL_MIN));
        }
    }

    #[test]
    fn test_reset_between_ticks() {
        let (store, _panel, recorder, mut clock) = fixture(5);
        store.initialize(ShapeCounts::new(5, 5, 5), Dimensions::DEFAULT);
        clock.tick(Instant::now());

        store.reset();
        let report = clock.tick(Instant::now());
        assert_eq!(report.shapes, 0);
        assert!(matches!(recorder.last(), Some(Feed::Shapes { shapes, .. }) if shapes.is_empty()));

        store.initialize(ShapeCounts::new(1, 0, 0), Dimensions::DEFAULT);
        assert_eq!(clock.tick(Instant::now()).shapes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_on_schedule() {
        let store = Arc::new(ShapeStore::new(ShapeTuning::default(), MOVING_FRACTION, Some(6)));
        store.initialize(ShapeCounts::new(4, 0, 0), Dimensions::DEFAULT);
        let broadcaster = ChannelBroadcaster::new(TOPIC_SHAPES, 16);
        let mut rx = broadcaster.subscribe();

        let clock = SimulationClock::new(
            Arc::clone(&store),
            Arc::new(PanelBounds::new()),
            Arc::new(broadcaster),
            ClockTiming::default(),
        );
        let handle = clock.spawn();

        for expected in 1..=3u64 {
            match rx.recv().await.unwrap() {
                Feed::Shapes { tick, shapes } => {
                    assert_eq!(tick, Some(expected));
                    assert_eq!(shapes.len(), 4);
                }
                Feed::Panel(_) => panic!("unexpected panel feed"),
            }
        }
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_rotates_moving_set_on_schedule() {
        let store = Arc::new(ShapeStore::new(ShapeTuning::default(), MOVING_FRACTION, Some(12)));
        store.initialize(ShapeCounts::new(12, 0, 0), Dimensions::DEFAULT);
        let broadcaster = ChannelBroadcaster::new(TOPIC_SHAPES, 64);
        let mut rx = broadcaster.subscribe();

        let timing = ClockTiming {
            period: Duration::from_millis(100),
            dt: SIM_DT,
            rotation_interval: Duration::from_millis(250),
        };
        let handle = SimulationClock::new(
            Arc::clone(&store),
            Arc::new(PanelBounds::new()),
            Arc::new(broadcaster),
            timing,
        )
        .spawn();

        // Bounces only flip velocity signs, a re-roll draws new magnitudes
        let mut movers = Vec::new();
        for _ in 0..5 {
            let Feed::Shapes { shapes, .. } = rx.recv().await.unwrap() else {
                panic!("unexpected panel feed");
            };
            let set: Vec<_> = shapes
                .iter()
                .filter(|s| s.moving)
                .map(|s| (s.id, s.vel.x.abs(), s.vel.y.abs()))
                .collect();
            movers.push(set);
        }
        handle.abort();

        // Ticks at 100 and 200 ms keep the initial set, 300 ms re-rolls,
        // and the next re-roll is not due until after 550 ms
        assert_eq!(movers[0], movers[1]);
        assert_ne!(movers[1], movers[2]);
        assert_eq!(movers[2].len(), 3);
        assert_eq!(movers[2], movers[3]);
        assert_eq!(movers[3], movers[4]);
    }
}
