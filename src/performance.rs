//! Closed-loop frame throttling.
//!
//! The controller watches recent inter-frame intervals and trades processing
//! resolution (scale) and frame skipping against throughput to hold a target
//! rate. Whatever it does internally, every frame it returns has the configured
//! output dimensions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use image::RgbImage;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::PerformanceConfig;
use crate::error::Result;

/// Resize backend. Implementations other than [`CpuResizer`] (e.g. a GPU
/// path) are injected by the host and may fail at runtime.
pub trait FrameResizer: Send {
    fn name(&self) -> &'static str;
    fn resize(&mut self, frame: &RgbImage, width: u32, height: u32) -> Result<RgbImage>;
}

/// Software resizer backed by `image::imageops`.
#[derive(Debug, Clone, Copy)]
pub struct CpuResizer {
    filter: FilterType,
}

impl CpuResizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    pub fn resize_image(&self, frame: &RgbImage, width: u32, height: u32) -> RgbImage {
        imageops::resize(frame, width, height, self.filter)
    }
}

impl Default for CpuResizer {
    fn default() -> Self {
        Self::new(FilterType::Triangle)
    }
}

impl FrameResizer for CpuResizer {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn resize(&mut self, frame: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
        Ok(self.resize_image(frame, width, height))
    }
}

/// A frame after throttling.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Always `output_width x output_height`.
    pub image: RgbImage,
    /// `false` when the frame was skipped and only size-normalized.
    pub processed: bool,
    /// Resolution used for processing.
    pub working_size: (u32, u32),
}

/// Snapshot exposed to the UI once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub fps: f32,
    pub scale: f32,
    pub skip: u32,
    pub gpu_enabled: bool,
    pub avg_processing_ms: f32,
    pub frame_count: u64,
}

pub struct PerformanceController {
    config: PerformanceConfig,
    intervals: VecDeque<Duration>,
    processing: VecDeque<Duration>,
    scale: f32,
    skip: u32,
    frame_count: u64,
    processed_count: u64,
    last_frame_at: Option<Instant>,
    cpu: CpuResizer,
    accelerator: Option<Box<dyn FrameResizer>>,
}

impl PerformanceController {
    pub fn new(config: &PerformanceConfig) -> Self {
        Self {
            config: config.clone(),
            intervals: VecDeque::with_capacity(config.history),
            processing: VecDeque::with_capacity(config.history),
            scale: config.max_scale,
            skip: 0,
            frame_count: 0,
            processed_count: 0,
            last_frame_at: None,
            cpu: CpuResizer::default(),
            accelerator: None,
        }
    }

    /// Use an accelerated resizer until it first fails.
    pub fn with_accelerator(mut self, accelerator: Box<dyn FrameResizer>) -> Self {
        self.accelerator = Some(accelerator);
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn skip(&self) -> u32 {
        self.skip
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn gpu_enabled(&self) -> bool {
        self.accelerator.is_some()
    }

    /// Clear timing history and restart the clock.
    pub fn start(&mut self) {
        self.intervals.clear();
        self.processing.clear();
        self.last_frame_at = None;
    }

    /// Frames per second over the interval window.
    pub fn current_fps(&self) -> Option<f32> {
        let total: Duration = self.intervals.iter().sum();
        let secs = total.as_secs_f32();
        if self.intervals.is_empty() || secs <= 0.0 {
            return None;
        }
        Some(self.intervals.len() as f32 / secs)
    }

    pub fn average_processing_time(&self) -> Option<Duration> {
        if self.processing.is_empty() {
            return None;
        }
        let total: Duration = self.processing.iter().sum();
        Some(total / self.processing.len() as u32)
    }

    pub fn stats(&self) -> PerformanceStats {
        PerformanceStats {
            fps: self.current_fps().unwrap_or(0.0),
            scale: self.scale,
            skip: self.skip,
            gpu_enabled: self.gpu_enabled(),
            avg_processing_ms: self
                .average_processing_time()
                .map_or(0.0, |d| d.as_secs_f32() * 1000.0),
            frame_count: self.frame_count,
        }
    }

    /// Report how long the host spent on a processed frame.
    pub fn record_processing_time(&mut self, elapsed: Duration) {
        push_bounded(&mut self.processing, elapsed, self.config.history);
    }

    /// Throttle one frame arriving at `now`.
    pub fn process_frame(&mut self, frame: &RgbImage, now: Instant) -> ProcessedFrame {
        if let Some(prev) = self.last_frame_at {
            push_bounded(
                &mut self.intervals,
                now.saturating_duration_since(prev),
                self.config.history,
            );
        }
        self.last_frame_at = Some(now);
        self.frame_count += 1;

        if self.frame_count % (u64::from(self.skip) + 1) != 0 {
            return ProcessedFrame {
                image: self.to_output(frame),
                processed: false,
                working_size: frame.dimensions(),
            };
        }
        self.processed_count += 1;

        let (width, height) = frame.dimensions();
        let (image, working_size) = if self.scale < 1.0 {
            let sw = ((width as f32 * self.scale).round() as u32).max(1);
            let sh = ((height as f32 * self.scale).round() as u32).max(1);
            let scaled = self.resize(frame, sw, sh);
            let (ow, oh) = (self.config.output_width, self.config.output_height);
            (self.resize(&scaled, ow, oh), (sw, sh))
        } else {
            (self.to_output(frame), (width, height))
        };

        if self.processed_count % u64::from(self.config.adjust_interval) == 0 {
            self.adjust();
        }

        ProcessedFrame {
            image,
            processed: true,
            working_size,
        }
    }

    /// [`process_frame`](Self::process_frame) against the wall clock, recording
    /// the controller's own work as processing time.
    pub fn optimize_frame(&mut self, frame: &RgbImage) -> ProcessedFrame {
        let now = Instant::now();
        let out = self.process_frame(frame, now);
        if out.processed {
            self.record_processing_time(now.elapsed());
        }
        out
    }

    fn to_output(&mut self, frame: &RgbImage) -> RgbImage {
        let (ow, oh) = (self.config.output_width, self.config.output_height);
        if frame.dimensions() == (ow, oh) {
            frame.clone()
        } else {
            self.resize(frame, ow, oh)
        }
    }

    fn resize(&mut self, frame: &RgbImage, width: u32, height: u32) -> RgbImage {
        if let Some(acc) = self.accelerator.as_mut() {
            match acc.resize(frame, width, height) {
                Ok(img) if img.dimensions() == (width, height) => return img,
                Ok(img) => warn!(
                    "{} resizer returned {:?}, expected {:?}; falling back to CPU",
                    acc.name(),
                    img.dimensions(),
                    (width, height)
                ),
                Err(e) => warn!("{} resizer failed, falling back to CPU: {}", acc.name(), e),
            }
            self.accelerator = None;
        }
        self.cpu.resize_image(frame, width, height)
    }

    fn has_headroom(&self) -> bool {
        let budget = self.config.headroom / self.config.target_fps;
        self.average_processing_time()
            .map_or(true, |avg| avg.as_secs_f32() < budget)
    }

    fn adjust(&mut self) {
        let Some(fps) = self.current_fps() else {
            return;
        };
        let ratio = fps / self.config.target_fps;
        let (old_scale, old_skip) = (self.scale, self.skip);
        let c = &self.config;

        if ratio < 0.6 {
            if self.skip < c.max_skip {
                self.skip += 1;
            } else {
                self.scale = snap(self.scale - c.coarse_step).max(c.min_scale);
            }
        } else if ratio < 0.8 {
            self.scale = snap(self.scale - c.fine_step).max(c.min_scale);
        } else if ratio > 1.2 && self.has_headroom() {
            if self.skip > 0 {
                self.skip -= 1;
            } else {
                self.scale = snap(self.scale + c.fine_step).min(c.max_scale);
            }
        }

        if (old_scale, old_skip) != (self.scale, self.skip) {
            debug!(
                "fps {:.1} (ratio {:.2}): scale {:.2} -> {:.2}, skip {} -> {}",
                fps, ratio, old_scale, self.scale, old_skip, self.skip
            );
        }
    }
}

/// Round away accumulated float error from repeated steps.
fn snap(v: f32) -> f32 {
    (v * 1000.0).round() / 1000.0
}

fn push_bounded(samples: &mut VecDeque<Duration>, value: Duration, capacity: usize) {
    samples.push_back(value);
    while samples.len() > capacity {
        samples.pop_front();
    }
}

/// Controller shared between a capture thread and a processing thread. Each
/// call holds the lock for the whole read-modify-write.
#[derive(Clone)]
pub struct SharedController {
    inner: Arc<Mutex<PerformanceController>>,
}

impl SharedController {
    pub fn new(controller: PerformanceController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn process_frame(&self, frame: &RgbImage, now: Instant) -> ProcessedFrame {
        self.inner.lock().process_frame(frame, now)
    }

    pub fn record_processing_time(&self, elapsed: Duration) {
        self.inner.lock().record_processing_time(elapsed);
    }

    pub fn stats(&self) -> PerformanceStats {
        self.inner.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> PerformanceConfig {
        PerformanceConfig {
            output_width: 32,
            output_height: 24,
            ..PerformanceConfig::default()
        }
    }

    fn frame() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8, y as u8, 0]))
    }

    /// Feed `count` frames spaced for `fps`, continuing from `start`.
    fn drive(
        ctrl: &mut PerformanceController,
        start: Instant,
        fps: f32,
        count: usize,
        processing: Option<Duration>,
    ) -> Instant {
        let period = Duration::from_secs_f32(1.0 / fps);
        let img = frame();
        let mut now = start;
        for _ in 0..count {
            now += period;
            let out = ctrl.process_frame(&img, now);
            if let (true, Some(p)) = (out.processed, processing) {
                ctrl.record_processing_time(p);
            }
        }
        now
    }

    struct FailingResizer {
        calls: Arc<AtomicUsize>,
    }

    impl FrameResizer for FailingResizer {
        fn name(&self) -> &'static str {
            "gpu"
        }

        fn resize(&mut self, _frame: &RgbImage, _w: u32, _h: u32) -> Result<RgbImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Resize("device lost".to_string()))
        }
    }

    struct CountingResizer {
        calls: Arc<AtomicUsize>,
    }

    impl FrameResizer for CountingResizer {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn resize(&mut self, frame: &RgbImage, w: u32, h: u32) -> Result<RgbImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CpuResizer::default().resize_image(frame, w, h))
        }
    }

    struct WrongSizeResizer;

    impl FrameResizer for WrongSizeResizer {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn resize(&mut self, _frame: &RgbImage, _w: u32, _h: u32) -> Result<RgbImage> {
            Ok(RgbImage::new(1, 1))
        }
    }

    #[test]
    fn test_output_size_is_always_normalized() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.scale = 0.5;
        ctrl.skip = 1;
        let t0 = Instant::now();

        let skipped = ctrl.process_frame(&frame(), t0);
        assert!(!skipped.processed);
        assert_eq!(skipped.image.dimensions(), (32, 24));

        let processed = ctrl.process_frame(&frame(), t0 + Duration::from_millis(33));
        assert!(processed.processed);
        assert_eq!(processed.working_size, (32, 24));
        assert_eq!(processed.image.dimensions(), (32, 24));

        let odd = RgbImage::new(17, 9);
        let out = ctrl.process_frame(&odd, t0 + Duration::from_millis(66));
        assert_eq!(out.image.dimensions(), (32, 24));
    }

    #[test]
    fn test_skip_pattern() {
        let mut ctrl = PerformanceController::new(&PerformanceConfig {
            adjust_interval: 1000,
            ..config()
        });
        ctrl.skip = 2;
        let t0 = Instant::now();
        let pattern: Vec<bool> = (1..=6)
            .map(|i| {
                ctrl.process_frame(&frame(), t0 + Duration::from_millis(10 * i))
                    .processed
            })
            .collect();
        assert_eq!(pattern, vec![false, false, true, false, false, true]);
        assert_eq!(ctrl.frame_count(), 6);
    }

    #[test]
    fn test_fps_from_interval_window() {
        let mut ctrl = PerformanceController::new(&PerformanceConfig {
            adjust_interval: 1000,
            ..config()
        });
        assert_eq!(ctrl.current_fps(), None);
        drive(&mut ctrl, Instant::now(), 25.0, 10, None);
        let fps = ctrl.current_fps().unwrap();
        assert!((fps - 25.0).abs() < 0.1, "fps = {}", fps);
    }

    #[test]
    fn test_slow_rate_increases_skip_first() {
        let mut ctrl = PerformanceController::new(&config());
        drive(&mut ctrl, Instant::now(), 15.0, 5, None);
        assert_eq!(ctrl.skip(), 1);
        assert_eq!(ctrl.scale(), 1.0);
    }

    #[test]
    fn test_slow_rate_at_max_skip_drops_scale() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.skip = 2;
        drive(&mut ctrl, Instant::now(), 15.0, 15, None);
        assert_eq!(ctrl.skip(), 2);
        assert!((ctrl.scale() - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_scale_never_below_min() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.skip = 2;
        drive(&mut ctrl, Instant::now(), 5.0, 300, None);
        assert_eq!(ctrl.skip(), 2);
        assert!((ctrl.scale() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mild_slowdown_uses_fine_step() {
        let mut ctrl = PerformanceController::new(&config());
        drive(&mut ctrl, Instant::now(), 21.0, 5, None);
        assert_eq!(ctrl.skip(), 0);
        assert!((ctrl.scale() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_fast_rate_recovers_scale_up_to_max() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.scale = 0.7;
        let t = drive(&mut ctrl, Instant::now(), 45.0, 5, Some(Duration::from_millis(2)));
        assert!((ctrl.scale() - 0.8).abs() < 1e-6);

        let mut now = t;
        for _ in 0..20 {
            now = drive(&mut ctrl, now, 45.0, 5, Some(Duration::from_millis(2)));
            assert!(ctrl.scale() <= 1.0);
        }
        assert_eq!(ctrl.scale(), 1.0);
    }

    #[test]
    fn test_fast_rate_reduces_skip_before_scale() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.skip = 1;
        ctrl.scale = 0.7;
        drive(&mut ctrl, Instant::now(), 45.0, 10, None);
        assert_eq!(ctrl.skip(), 0);
        assert!((ctrl.scale() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_no_recovery_without_headroom() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.scale = 0.7;
        drive(&mut ctrl, Instant::now(), 45.0, 20, Some(Duration::from_millis(40)));
        assert!((ctrl.scale() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_on_target_rate_is_stable() {
        let mut ctrl = PerformanceController::new(&config());
        ctrl.scale = 0.7;
        drive(&mut ctrl, Instant::now(), 30.0, 50, None);
        assert!((ctrl.scale() - 0.7).abs() < 1e-6);
        assert_eq!(ctrl.skip(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut ctrl = PerformanceController::new(&PerformanceConfig {
            history: 8,
            adjust_interval: 1000,
            ..config()
        });
        drive(&mut ctrl, Instant::now(), 30.0, 50, Some(Duration::from_millis(1)));
        assert_eq!(ctrl.intervals.len(), 8);
        assert_eq!(ctrl.processing.len(), 8);
    }

    #[test]
    fn test_failing_accelerator_falls_back_for_good() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctrl = PerformanceController::new(&config()).with_accelerator(Box::new(
            FailingResizer {
                calls: calls.clone(),
            },
        ));
        assert!(ctrl.gpu_enabled());

        let t0 = Instant::now();
        let out = ctrl.process_frame(&frame(), t0);
        assert_eq!(out.image.dimensions(), (32, 24));
        assert!(!ctrl.gpu_enabled());
        assert!(!ctrl.stats().gpu_enabled);

        ctrl.process_frame(&frame(), t0 + Duration::from_millis(33));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_size_accelerator_is_dropped() {
        let mut ctrl =
            PerformanceController::new(&config()).with_accelerator(Box::new(WrongSizeResizer));
        let out = ctrl.process_frame(&frame(), Instant::now());
        assert_eq!(out.image.dimensions(), (32, 24));
        assert!(!ctrl.gpu_enabled());
    }

    #[test]
    fn test_working_accelerator_is_used() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctrl = PerformanceController::new(&config()).with_accelerator(Box::new(
            CountingResizer {
                calls: calls.clone(),
            },
        ));
        ctrl.scale = 0.5;
        ctrl.process_frame(&frame(), Instant::now());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(ctrl.gpu_enabled());
    }

    #[test]
    fn test_stats_snapshot() {
        let mut ctrl = PerformanceController::new(&config());
        drive(&mut ctrl, Instant::now(), 30.0, 3, Some(Duration::from_millis(4)));
        let s = ctrl.stats();
        assert_eq!(s.frame_count, 3);
        assert_eq!(s.skip, 0);
        assert_eq!(s.scale, 1.0);
        assert!((s.avg_processing_ms - 4.0).abs() < 0.01);
        assert!(s.fps > 29.0 && s.fps < 31.0);
    }

    #[test]
    fn test_shared_controller_across_threads() {
        let shared = SharedController::new(PerformanceController::new(&config()));
        let t0 = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let img = frame();
                    for j in 0..10u64 {
                        let at = t0 + Duration::from_millis(i * 1000 + j * 33);
                        let out = shared.process_frame(&img, at);
                        assert_eq!(out.image.dimensions(), (32, 24));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        shared.record_processing_time(Duration::from_millis(1));
        assert_eq!(shared.stats().frame_count, 40);
    }
}
