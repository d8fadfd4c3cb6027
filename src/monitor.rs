//! Monitor orchestration
//!
//! [`FatigueMonitor`] is the per-frame entry point. It owns one smoothing →
//! calibration → detection channel per signal, the drowsy alert, the event
//! reporter and the running counters.
//!
//! Frame stages:
//! 1. SignalSmoother - denoise each raw ratio
//! 2. BaselineCalibrator - collect samples until the calibration window closes
//! 3. DurationEventDetector - segment and classify excursions
//! 4. AlertHysteresis - re-evaluate the sustained-closure alert
//! 5. EventReporter - persist long blinks and yawns

use crate::alert::{AlertDispatcher, AlertHysteresis, AlertSink};
use crate::baseline::{Baseline, BaselineCalibrator, BaselinePolicy, CalibratedBaselines};
use crate::config::{MonitorConfig, MouthConfig};
use crate::detector::{
    AboveThreshold, BelowThreshold, BlinkClassifier, ClassificationPolicy, ComparisonPolicy,
    DurationEventDetector, EyeDetector, MouthDetector, YawnClassifier,
};
use crate::error::MonitorError;
use crate::reporter::{EventReporter, EventStore};
use crate::session::SessionLog;
use crate::smoother::SignalSmoother;
use crate::types::{
    ClassifiedEvent, Counters, DetectorRunState, EventKind, FrameInput, FramePhase, FrameResult,
    Sample, SignalKind, SmoothedSignal,
};
use crate::yawn_rate::YawnRateWindow;
use tracing::{info, warn};

/// Smoother, calibrator and detector for one signal
#[derive(Debug)]
struct SignalChannel<C, K> {
    smoother: SignalSmoother,
    calibrator: Option<BaselineCalibrator>,
    detector: DurationEventDetector<C, K>,
    baseline: Option<Baseline>,
}

impl<C: ComparisonPolicy, K: ClassificationPolicy> SignalChannel<C, K> {
    fn calibrating(
        window: usize,
        calibrator: BaselineCalibrator,
        detector: DurationEventDetector<C, K>,
    ) -> Self {
        Self {
            smoother: SignalSmoother::new(window),
            calibrator: Some(calibrator),
            detector,
            baseline: None,
        }
    }

    fn tracking(window: usize, baseline: Baseline, detector: DurationEventDetector<C, K>) -> Self {
        Self {
            smoother: SignalSmoother::new(window),
            calibrator: None,
            detector,
            baseline: Some(baseline),
        }
    }

    /// Feed the calibrator. Returns the baseline on the frame that closes the
    /// window, after which the calibrator is dropped.
    fn calibrate(&mut self, smoothed: &SmoothedSignal, now: f64) -> Option<Baseline> {
        let calibrator = self.calibrator.as_mut()?;
        let baseline = match smoothed.value {
            Some(value) => calibrator.feed(value, now)?,
            None if calibrator.is_complete(now) => calibrator.finish(),
            None => return None,
        };
        self.calibrator = None;
        self.baseline = Some(baseline);
        Some(baseline)
    }

    fn is_calibrating(&self) -> bool {
        self.calibrator.is_some()
    }

    fn track(&mut self, smoothed: &SmoothedSignal, now: f64) -> Option<ClassifiedEvent> {
        match smoothed.value {
            Some(value) => self.detector.update(value, now),
            None => {
                self.detector.reset(now);
                None
            }
        }
    }
}

/// Yawn threshold: the static level, raised for subjects whose resting MAR sits near it
fn yawn_threshold(config: &MouthConfig, baseline: &Baseline) -> f64 {
    config.yawn_threshold.max(baseline.closed_threshold)
}

/// Per-frame drowsiness monitor over an eye and a mouth signal.
///
/// Both signals calibrate over the same window starting at `started_at`;
/// the switch to tracking happens once, on the first frame at or past the
/// end of that window.
pub struct FatigueMonitor<S: EventStore = SessionLog> {
    config: MonitorConfig,
    eye: SignalChannel<BelowThreshold, BlinkClassifier>,
    mouth: SignalChannel<AboveThreshold, YawnClassifier>,
    hysteresis: AlertHysteresis,
    alert: AlertDispatcher,
    reporter: EventReporter<S>,
    yawn_rate: Option<YawnRateWindow>,
    counters: Counters,
    phase: FramePhase,
    started_at: f64,
    frames: u64,
}

impl FatigueMonitor<SessionLog> {
    /// Create a monitor reporting into a fresh in-memory session log
    pub fn new(config: MonitorConfig, started_at: f64) -> Result<Self, MonitorError> {
        Self::with_store(config, SessionLog::with_session(), started_at)
    }
}

impl<S: EventStore> FatigueMonitor<S> {
    /// Create a calibrating monitor reporting into `store`
    pub fn with_store(config: MonitorConfig, store: S, started_at: f64) -> Result<Self, MonitorError> {
        config.validate()?;
        let window = config.smoothing_window;
        let duration = config.calibration_secs;

        let eye = SignalChannel::calibrating(
            window,
            BaselineCalibrator::new("eye", started_at, duration, BaselinePolicy::eye(&config.eye)),
            EyeDetector::new(SignalKind::Eye, BlinkClassifier::from_config(&config.eye)),
        );
        let mouth = SignalChannel::calibrating(
            window,
            BaselineCalibrator::new(
                "mouth",
                started_at,
                duration,
                BaselinePolicy::mouth(&config.mouth),
            ),
            MouthDetector::new(SignalKind::Mouth, YawnClassifier::from_config(&config.mouth)),
        );

        Ok(Self::assemble(config, eye, mouth, store, FramePhase::Calibrating, started_at))
    }

    /// Create a monitor that skips calibration and tracks against saved baselines
    pub fn with_baselines(
        config: MonitorConfig,
        baselines: CalibratedBaselines,
        store: S,
        started_at: f64,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        baselines.validate()?;
        let window = config.smoothing_window;

        let eye = SignalChannel::tracking(
            window,
            baselines.eye,
            EyeDetector::tracking(
                SignalKind::Eye,
                BlinkClassifier::from_config(&config.eye),
                baselines.eye.closed_threshold,
            ),
        );
        let mouth = SignalChannel::tracking(
            window,
            baselines.mouth,
            MouthDetector::tracking(
                SignalKind::Mouth,
                YawnClassifier::from_config(&config.mouth),
                yawn_threshold(&config.mouth, &baselines.mouth),
            ),
        );
        info!(
            eye_threshold = baselines.eye.closed_threshold,
            "Loaded baselines, calibration skipped"
        );

        Ok(Self::assemble(config, eye, mouth, store, FramePhase::Tracking, started_at))
    }

    fn assemble(
        config: MonitorConfig,
        eye: SignalChannel<BelowThreshold, BlinkClassifier>,
        mouth: SignalChannel<AboveThreshold, YawnClassifier>,
        store: S,
        phase: FramePhase,
        started_at: f64,
    ) -> Self {
        Self {
            hysteresis: AlertHysteresis::new(config.eye.long_blink_secs),
            alert: AlertDispatcher::default(),
            reporter: EventReporter::new(store),
            yawn_rate: config.yawn_rate.as_ref().map(YawnRateWindow::new),
            counters: Counters::default(),
            config,
            eye,
            mouth,
            phase,
            started_at,
            frames: 0,
        }
    }

    /// Route the rising edge of the drowsy alert to `sink`
    pub fn with_alert_sink(mut self, sink: Box<dyn AlertSink + Send>) -> Self {
        self.alert = AlertDispatcher::new(sink);
        self
    }

    /// Process one frame
    pub fn process(&mut self, eye_sample: Sample, mouth_sample: Sample, now: f64) -> FrameResult {
        self.frames += 1;
        let smoothed_eye = self.eye.smoother.push(eye_sample);
        let smoothed_mouth = self.mouth.smoother.push(mouth_sample);

        if self.phase == FramePhase::Calibrating {
            self.calibrate(&smoothed_eye, &smoothed_mouth, now);
            if self.phase == FramePhase::Calibrating {
                return self.frame_result(now, &smoothed_eye, &smoothed_mouth, Vec::new(), false);
            }
        }

        let mut events = Vec::new();
        let completed = [
            self.eye.track(&smoothed_eye, now),
            self.mouth.track(&smoothed_mouth, now),
        ];
        for event in completed.into_iter().flatten() {
            if self.handle_event(&event) {
                events.push(event);
            }
        }

        if let Some(rate) = self.yawn_rate.as_mut() {
            rate.trim(now);
        }

        let drowsy = self.hysteresis.evaluate(now, &self.eye.detector.state());
        self.alert.update(drowsy);

        self.frame_result(now, &smoothed_eye, &smoothed_mouth, events, drowsy)
    }

    /// Process one decoded input frame
    pub fn process_frame(&mut self, frame: &FrameInput) -> FrameResult {
        self.process(frame.eye_sample(), frame.mouth_sample(), frame.timestamp)
    }

    /// Feed both calibrators. Tracking starts once both windows have closed;
    /// they share one start time and duration, so that happens on one frame.
    fn calibrate(&mut self, smoothed_eye: &SmoothedSignal, smoothed_mouth: &SmoothedSignal, now: f64) {
        if let Some(baseline) = self.eye.calibrate(smoothed_eye, now) {
            self.eye.detector.begin_tracking(baseline.closed_threshold);
        }
        if let Some(baseline) = self.mouth.calibrate(smoothed_mouth, now) {
            self.mouth
                .detector
                .begin_tracking(yawn_threshold(&self.config.mouth, &baseline));
        }
        if self.eye.is_calibrating() || self.mouth.is_calibrating() {
            return;
        }

        self.phase = FramePhase::Tracking;
        info!(
            eye_threshold = ?self.eye.detector.threshold(),
            mouth_threshold = ?self.mouth.detector.threshold(),
            "Calibration finished, tracking"
        );
    }

    /// Count, report and log one completed excursion. Returns false for ignored ones.
    fn handle_event(&mut self, event: &ClassifiedEvent) -> bool {
        self.counters.record(event.kind);
        match event.kind {
            EventKind::Ignored => return false,
            EventKind::Normal => {}
            EventKind::Long => info!(duration = event.duration, "Long blink detected"),
            EventKind::Yawn => {
                match self.yawn_rate.as_mut() {
                    Some(rate) => {
                        rate.record(event.ended_at());
                        info!(
                            duration = event.duration,
                            per_minute = rate.rate_per_minute(),
                            "Yawn detected"
                        );
                    }
                    None => info!(duration = event.duration, "Yawn detected"),
                }
            }
        }

        if let Err(e) = self.reporter.report(event) {
            warn!(error = %e, kind = ?event.kind, "Event not persisted");
        }
        true
    }

    fn frame_result(
        &self,
        now: f64,
        smoothed_eye: &SmoothedSignal,
        smoothed_mouth: &SmoothedSignal,
        events: Vec<ClassifiedEvent>,
        drowsy_alert: bool,
    ) -> FrameResult {
        FrameResult {
            timestamp: now,
            phase: self.phase,
            normal_count: self.counters.normal_count,
            long_count: self.counters.long_count,
            yawn_count: self.counters.yawn_count,
            drowsy_alert,
            yawn_rate_alert: self.yawn_rate.as_ref().is_some_and(|r| r.exceeded()),
            smoothed_eye: smoothed_eye.value,
            smoothed_mouth: smoothed_mouth.value,
            events,
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn is_calibrating(&self) -> bool {
        self.phase == FramePhase::Calibrating
    }

    /// Start of the calibration window
    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn eye_state(&self) -> DetectorRunState {
        self.eye.detector.state()
    }

    pub fn mouth_state(&self) -> DetectorRunState {
        self.mouth.detector.state()
    }

    /// Eye-closed threshold in use, `None` while calibrating
    pub fn eye_threshold(&self) -> Option<f64> {
        self.eye.detector.threshold()
    }

    /// Yawn threshold in use, `None` while calibrating
    pub fn mouth_threshold(&self) -> Option<f64> {
        self.mouth.detector.threshold()
    }

    /// Both baselines once calibration has finished
    pub fn baselines(&self) -> Option<CalibratedBaselines> {
        Some(CalibratedBaselines {
            eye: self.eye.baseline?,
            mouth: self.mouth.baseline?,
        })
    }

    /// Serialize the baselines for a later [`FatigueMonitor::with_baselines`]
    pub fn save_baselines(&self) -> Result<String, MonitorError> {
        self.baselines()
            .ok_or_else(|| MonitorError::InvalidBaseline("calibration has not finished".to_string()))?
            .to_json()
    }

    /// Times the alert sink has fired
    pub fn alerts_fired(&self) -> u64 {
        self.alert.fired()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn store(&self) -> &S {
        self.reporter.store()
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.reporter.store_mut()
    }

    pub fn into_store(self) -> S {
        self.reporter.into_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineSource;
    use crate::config::YawnRateConfig;
    use crate::types::TrackingState;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const OPEN_EAR: f64 = 0.30;
    const SHUT_EAR: f64 = 0.10;
    const REST_MAR: f64 = 0.20;
    const YAWN_MAR: f64 = 0.90;

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    impl AlertSink for CountingSink {
        fn fire_alert(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// One-frame smoothing so excursions start and end on the exact frame
    fn test_config() -> MonitorConfig {
        MonitorConfig {
            smoothing_window: 1,
            calibration_secs: 1.0,
            ..Default::default()
        }
    }

    fn step(monitor: &mut FatigueMonitor, t: f64, ear: f64, mar: f64) -> FrameResult {
        monitor.process(Sample::Valid(ear), Sample::Valid(mar), t)
    }

    /// Calibrate on steady open-eye, resting-mouth frames and switch to tracking at t=1.0
    fn calibrated(config: MonitorConfig) -> FatigueMonitor {
        let mut monitor = FatigueMonitor::new(config, 0.0).unwrap();
        for i in 0..30 {
            let result = step(&mut monitor, i as f64 / 30.0, OPEN_EAR, REST_MAR);
            assert_eq!(result.phase, FramePhase::Calibrating);
        }
        let result = step(&mut monitor, 1.0, OPEN_EAR, REST_MAR);
        assert_eq!(result.phase, FramePhase::Tracking);
        monitor
    }

    #[test]
    fn test_calibration_sets_thresholds() {
        let monitor = calibrated(test_config());

        let eye = monitor.eye_threshold().unwrap();
        assert!((eye - 0.21).abs() < 1e-9);
        // Resting MAR 0.2 * 1.5 = 0.3 stays below the static 0.6
        assert!((monitor.mouth_threshold().unwrap() - 0.6).abs() < 1e-9);

        let baselines = monitor.baselines().unwrap();
        assert_eq!(baselines.eye.source, BaselineSource::Calibrated);
        assert_eq!(baselines.eye.samples, 30);
    }

    #[test]
    fn test_no_counting_while_calibrating() {
        let mut monitor = FatigueMonitor::new(test_config(), 0.0).unwrap();
        step(&mut monitor, 0.1, SHUT_EAR, YAWN_MAR);
        let result = step(&mut monitor, 0.9, OPEN_EAR, REST_MAR);

        assert_eq!(result.phase, FramePhase::Calibrating);
        assert_eq!(monitor.counters(), Counters::default());
        assert_eq!(monitor.eye_state(), DetectorRunState::Calibrating);
        assert!(monitor.baselines().is_none());
    }

    #[test]
    fn test_normal_blink_counted() {
        let mut monitor = calibrated(test_config());
        step(&mut monitor, 2.0, SHUT_EAR, REST_MAR);
        let result = step(&mut monitor, 2.3, OPEN_EAR, REST_MAR);

        assert_eq!(result.normal_count, 1);
        assert_eq!(result.long_count, 0);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].kind, EventKind::Normal);
        // Normal blinks are counted but not persisted
        assert_eq!(monitor.store().event_count(), 0);
    }

    #[test]
    fn test_long_blink_counted_and_reported() {
        let mut monitor = calibrated(test_config());
        step(&mut monitor, 2.0, SHUT_EAR, REST_MAR);
        let result = step(&mut monitor, 3.2, OPEN_EAR, REST_MAR);

        assert_eq!(result.long_count, 1);
        assert_eq!(result.normal_count, 0);

        let session = monitor.store().active().unwrap();
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].event_type, "fatigue");
        assert_eq!(
            session.events[0].description,
            "Long blink detected. Duration: 1.20 s."
        );
    }

    #[test]
    fn test_flicker_changes_nothing() {
        let mut monitor = calibrated(test_config());
        step(&mut monitor, 2.0, SHUT_EAR, REST_MAR);
        let result = step(&mut monitor, 2.05, OPEN_EAR, REST_MAR);

        assert!(result.events.is_empty());
        assert_eq!(monitor.counters(), Counters::default());
    }

    #[test]
    fn test_yawns() {
        let mut monitor = calibrated(test_config());

        step(&mut monitor, 2.0, OPEN_EAR, YAWN_MAR);
        let result = step(&mut monitor, 3.5, OPEN_EAR, REST_MAR);
        assert_eq!(result.yawn_count, 1);
        assert_eq!(result.events[0].signal, SignalKind::Mouth);

        step(&mut monitor, 5.0, OPEN_EAR, YAWN_MAR);
        let result = step(&mut monitor, 5.3, OPEN_EAR, REST_MAR);
        assert_eq!(result.yawn_count, 1);

        let session = monitor.store().active().unwrap();
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].event_type, "yawn");
    }

    #[test]
    fn test_lost_signal_discards_closure() {
        let mut monitor = calibrated(test_config());
        step(&mut monitor, 2.0, SHUT_EAR, REST_MAR);
        step(&mut monitor, 2.5, SHUT_EAR, REST_MAR);

        let lost = monitor.process(Sample::Absent, Sample::Valid(REST_MAR), 2.8);
        assert_eq!(lost.smoothed_eye, None);
        assert_eq!(
            monitor.eye_state(),
            DetectorRunState::Tracking(TrackingState::Open)
        );

        let result = step(&mut monitor, 2.9, OPEN_EAR, REST_MAR);
        assert!(result.events.is_empty());
        assert_eq!(monitor.counters(), Counters::default());
    }

    #[test]
    fn test_drowsy_alert_fires_once_per_closure() {
        let sink = Arc::new(CountingSink::default());
        let mut monitor =
            calibrated(test_config()).with_alert_sink(Box::new(Arc::clone(&sink)));

        step(&mut monitor, 2.0, SHUT_EAR, REST_MAR);
        let mut alerts = Vec::new();
        for i in 1..=15 {
            let t = 2.0 + i as f64 * 0.1;
            alerts.push(step(&mut monitor, t, SHUT_EAR, REST_MAR).drowsy_alert);
        }

        // 2.1 ..= 2.9 below the long-blink duration, 3.0 ..= 3.5 above it
        assert!(alerts[..9].iter().all(|a| !a));
        assert!(alerts[9..].iter().all(|a| *a));
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);

        let reopened = step(&mut monitor, 3.6, OPEN_EAR, REST_MAR);
        assert!(!reopened.drowsy_alert);
        assert_eq!(reopened.long_count, 1);

        // A second sustained closure fires again
        step(&mut monitor, 5.0, SHUT_EAR, REST_MAR);
        assert!(step(&mut monitor, 6.5, SHUT_EAR, REST_MAR).drowsy_alert);
        assert_eq!(monitor.alerts_fired(), 2);
    }

    #[test]
    fn test_calibration_fallback_without_samples() {
        let mut monitor = FatigueMonitor::new(test_config(), 0.0).unwrap();
        for i in 0..30 {
            monitor.process(Sample::Absent, Sample::Valid(REST_MAR), i as f64 / 30.0);
        }
        monitor.process(Sample::Valid(OPEN_EAR), Sample::Valid(REST_MAR), 1.0);

        let baselines = monitor.baselines().unwrap();
        assert_eq!(baselines.eye.source, BaselineSource::Fallback);
        assert!((monitor.eye_threshold().unwrap() - 0.22).abs() < 1e-9);
    }

    #[test]
    fn test_transition_without_valid_sample() {
        let mut monitor = FatigueMonitor::new(test_config(), 0.0).unwrap();
        step(&mut monitor, 0.5, OPEN_EAR, REST_MAR);
        let result = monitor.process(Sample::Absent, Sample::Absent, 1.2);

        assert_eq!(result.phase, FramePhase::Tracking);
        assert!(!monitor.is_calibrating());
    }

    #[test]
    fn test_transition_at_window_boundary() {
        let mut monitor = FatigueMonitor::new(test_config(), 10.0).unwrap();
        step(&mut monitor, 10.5, OPEN_EAR, REST_MAR);
        assert_eq!(
            step(&mut monitor, 10.999, OPEN_EAR, REST_MAR).phase,
            FramePhase::Calibrating
        );

        // One signal missing on the boundary frame still closes both windows
        let result = monitor.process(Sample::Absent, Sample::Valid(REST_MAR), 11.0);
        assert_eq!(result.phase, FramePhase::Tracking);
        assert_eq!(monitor.started_at(), 10.0);

        let baselines = monitor.baselines().unwrap();
        assert_eq!(baselines.eye.samples, 2);
        assert_eq!(baselines.mouth.samples, 2);
    }

    #[test]
    fn test_channel_yields_baseline_once() {
        let config = test_config();
        let mut channel = SignalChannel::calibrating(
            1,
            BaselineCalibrator::new("eye", 0.0, 1.0, BaselinePolicy::eye(&config.eye)),
            EyeDetector::new(SignalKind::Eye, BlinkClassifier::from_config(&config.eye)),
        );
        let value = SmoothedSignal {
            value: Some(OPEN_EAR),
            window_fill: 1,
        };

        assert!(channel.calibrate(&value, 0.5).is_none());
        assert!(channel.is_calibrating());
        assert!(channel.calibrate(&value, 1.0).is_some());
        assert!(!channel.is_calibrating());
        assert!(channel.calibrate(&value, 1.5).is_none());
        assert_eq!(channel.baseline.map(|b| b.samples), Some(1));
    }

    #[test]
    fn test_open_mouth_calibration_frames_keep_yawns() {
        let mut monitor = FatigueMonitor::new(test_config(), 0.0).unwrap();
        // Resting mouth with a few open-mouth frames from talking
        for i in 0..30 {
            let mar = if (12..15).contains(&i) { 0.7 } else { REST_MAR };
            step(&mut monitor, i as f64 / 30.0, OPEN_EAR, mar);
        }
        step(&mut monitor, 1.0, OPEN_EAR, REST_MAR);
        assert!((monitor.mouth_threshold().unwrap() - 0.6).abs() < 1e-9);

        step(&mut monitor, 2.0, OPEN_EAR, YAWN_MAR);
        step(&mut monitor, 3.0, OPEN_EAR, YAWN_MAR);
        let result = step(&mut monitor, 3.5, OPEN_EAR, REST_MAR);
        assert_eq!(result.yawn_count, 1);
    }

    #[test]
    fn test_lost_mouth_discards_yawn() {
        let mut monitor = calibrated(test_config());
        step(&mut monitor, 2.0, OPEN_EAR, YAWN_MAR);
        step(&mut monitor, 2.8, OPEN_EAR, YAWN_MAR);

        let lost = monitor.process(Sample::Valid(OPEN_EAR), Sample::Absent, 3.0);
        assert_eq!(lost.smoothed_mouth, None);
        assert_eq!(
            monitor.mouth_state(),
            DetectorRunState::Tracking(TrackingState::Open)
        );

        let result = step(&mut monitor, 3.6, OPEN_EAR, REST_MAR);
        assert!(result.events.is_empty());
        assert_eq!(result.yawn_count, 0);
        assert_eq!(monitor.store().event_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.eye.drowsy_ratio = 0.9;
        assert!(matches!(
            FatigueMonitor::new(config, 0.0),
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_saved_baselines_skip_calibration() {
        let monitor = calibrated(test_config());
        let saved = monitor.save_baselines().unwrap();

        let baselines = CalibratedBaselines::from_json(&saved).unwrap();
        let mut resumed =
            FatigueMonitor::with_baselines(test_config(), baselines, SessionLog::with_session(), 100.0)
                .unwrap();
        assert_eq!(resumed.phase(), FramePhase::Tracking);

        step(&mut resumed, 100.0, SHUT_EAR, REST_MAR);
        let result = step(&mut resumed, 100.3, OPEN_EAR, REST_MAR);
        assert_eq!(result.normal_count, 1);
    }

    #[test]
    fn test_save_before_calibration_fails() {
        let monitor = FatigueMonitor::new(test_config(), 0.0).unwrap();
        assert!(monitor.save_baselines().is_err());
    }

    #[test]
    fn test_report_failure_does_not_stop_detection() {
        let mut monitor = calibrated(test_config());
        monitor.store_mut().end_session();

        step(&mut monitor, 2.0, SHUT_EAR, REST_MAR);
        let result = step(&mut monitor, 3.5, OPEN_EAR, REST_MAR);
        assert_eq!(result.long_count, 1);

        step(&mut monitor, 4.0, SHUT_EAR, REST_MAR);
        let result = step(&mut monitor, 4.3, OPEN_EAR, REST_MAR);
        assert_eq!(result.normal_count, 1);
        assert_eq!(monitor.store().event_count(), 0);
    }

    #[test]
    fn test_yawn_rate_alert() {
        let config = MonitorConfig {
            yawn_rate: Some(YawnRateConfig {
                window_secs: 60.0,
                max_yawns: 2,
            }),
            ..test_config()
        };
        let mut monitor = calibrated(config);

        step(&mut monitor, 2.0, OPEN_EAR, YAWN_MAR);
        let first = step(&mut monitor, 4.0, OPEN_EAR, REST_MAR);
        assert!(!first.yawn_rate_alert);

        step(&mut monitor, 10.0, OPEN_EAR, YAWN_MAR);
        let second = step(&mut monitor, 12.0, OPEN_EAR, REST_MAR);
        assert!(second.yawn_rate_alert);

        // The first yawn (ended at 4.0) leaves the window after 64.0
        let later = step(&mut monitor, 64.5, OPEN_EAR, REST_MAR);
        assert!(!later.yawn_rate_alert);
    }

    #[test]
    fn test_smoothing_delays_but_keeps_blinks() {
        let config = MonitorConfig {
            smoothing_window: 3,
            ..test_config()
        };
        let mut monitor = calibrated(config);

        let mut t = 2.0;
        for _ in 0..10 {
            step(&mut monitor, t, SHUT_EAR, REST_MAR);
            t += 0.033;
        }
        for _ in 0..10 {
            step(&mut monitor, t, OPEN_EAR, REST_MAR);
            t += 0.033;
        }

        assert_eq!(monitor.counters().normal_count, 1);
    }

    #[test]
    fn test_process_frame_input() {
        let mut monitor = calibrated(test_config());
        let frame: FrameInput = serde_json::from_str(r#"{"t": 2.0, "ear": null, "mar": 0.2}"#).unwrap();
        let result = monitor.process_frame(&frame);

        assert_eq!(result.smoothed_eye, None);
        assert_eq!(result.smoothed_mouth, Some(0.2));
        assert_eq!(monitor.frames_processed(), 32);
    }
}
