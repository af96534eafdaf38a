//! Webcam hand tracker: a nokhwa capture thread feeding an ONNX
//! hand-landmark model.
//!
//! The whole frame is letterboxed into the model input, so this tracker
//! expects a single hand filling a reasonable part of the picture.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};
use fast_image_resize as fir;
use ndarray::Array4;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};
use rayon::prelude::*;

use crate::{
    model_download::ensure_handpose_model_ready,
    pipeline::HandTracker,
    types::{Landmark, NUM_HAND_LANDMARKS},
};

const INPUT_SIZE: u32 = 224;
const MIN_HAND_CONFIDENCE: f32 = 0.2;
const FRAME_WAIT: Duration = Duration::from_millis(200);

// Built-in macOS cameras often reject YUYV even though nokhwa reports it.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

struct RgbFrame {
    rgb: Vec<u8>,
    width: u32,
    height: u32,
}

#[derive(Clone, Debug)]
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    orig_w: u32,
    orig_h: u32,
}

impl LetterboxInfo {
    fn project(&self, x: f32, y: f32) -> Landmark {
        let px = (x - self.pad_x) / self.scale;
        let py = (y - self.pad_y) / self.scale;
        Landmark::planar(
            px.clamp(0.0, self.orig_w.saturating_sub(1) as f32),
            py.clamp(0.0, self.orig_h.saturating_sub(1) as f32),
        )
    }
}

fn build_camera(index: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

fn log_available_cameras() {
    match query(ApiBackend::Auto) {
        Ok(cameras) => {
            for info in cameras {
                log::info!("camera {}: {}", info.index(), info.human_name());
            }
        }
        Err(err) => log::warn!("failed to list cameras: {err}"),
    }
}

/// Capture thread handle. Stops and joins the thread on drop.
struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `Camera` is not `Send` on every backend, so it lives and dies on the
/// capture thread.
fn start_camera_stream(index: u32, frame_tx: Sender<RgbFrame>) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    drop(build_camera(index)?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index) {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let image = match camera
                .frame()
                .and_then(|buffer| buffer.decode_image::<RgbFormat>())
            {
                Ok(image) => image,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            let frame = RgbFrame {
                width: image.width(),
                height: image.height(),
                rgb: image.into_raw(),
            };
            // Drop if the tracker is busy.
            let _ = frame_tx.try_send(frame);
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}

pub struct CameraHandTracker {
    frames: Receiver<RgbFrame>,
    handpose: Session,
    _stream: CameraStream,
}

impl CameraHandTracker {
    pub fn new(index: u32, model_path: &Path) -> Result<Self> {
        ensure_handpose_model_ready(model_path)?;

        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        log_available_cameras();
        let (frame_tx, frames) = bounded(1);
        let stream = start_camera_stream(index, frame_tx)
            .with_context(|| format!("failed to open camera {index}"))?;

        log::info!(
            "camera {index} ready, handpose model {}",
            model_path.display()
        );
        Ok(Self {
            frames,
            handpose,
            _stream: stream,
        })
    }
}

impl HandTracker for CameraHandTracker {
    fn estimate_hands(&mut self) -> Result<Vec<Vec<Landmark>>> {
        let frame = self
            .frames
            .recv_timeout(FRAME_WAIT)
            .context("no camera frame available")?;

        let (input, letterbox) = prepare_frame(frame.rgb, frame.width, frame.height)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 2 {
            return Err(anyhow!("model returned {} outputs, need 2", outputs.len()));
        }

        let confidence = outputs[1]
            .try_extract_array::<f32>()
            .ok()
            .and_then(|arr| arr.iter().next().copied())
            .unwrap_or(0.0);
        if confidence < MIN_HAND_CONFIDENCE {
            return Ok(Vec::new());
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = coords.iter().copied().collect();
        if flat.len() < NUM_HAND_LANDMARKS * 3 {
            return Err(anyhow!(
                "unexpected landmarks length: got {}, need {}",
                flat.len(),
                NUM_HAND_LANDMARKS * 3
            ));
        }

        let hand = flat
            .chunks_exact(3)
            .take(NUM_HAND_LANDMARKS)
            .map(|chunk| letterbox.project(chunk[0], chunk[1]))
            .collect();
        Ok(vec![hand])
    }
}

fn prepare_frame(rgb: Vec<u8>, width: u32, height: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    let expected_len = (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(3);
    if rgb.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            rgb.len(),
            expected_len
        ));
    }

    let scale = INPUT_SIZE as f32 / (width.max(height) as f32);
    let new_w = (width as f32 * scale).round().max(1.0) as u32;
    let new_h = (height as f32 * scale).round().max(1.0) as u32;

    let src_image = fir::images::Image::from_vec_u8(width, height, rgb, fir::PixelType::U8x3)?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((INPUT_SIZE - new_w) / 2) as usize;
    let pad_y = ((INPUT_SIZE - new_h) / 2) as usize;
    let mut canvas = vec![0u8; (INPUT_SIZE as usize) * (INPUT_SIZE as usize) * 3];
    let dst_stride = INPUT_SIZE as usize * 3;
    let src_stride = new_w as usize * 3;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 3;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let normalized: Vec<f32> = canvas.par_iter().map(|&v| v as f32 / 255.0).collect();
    let input = Array4::<f32>::from_shape_vec(
        (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: width,
        orig_h: height,
    };

    Ok((input, letterbox))
}
