//! V4L2 capture through the `v4l` crate.

use super::{Camera, CameraControls, CameraError, CaptureError};
use image::RgbImage;
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

const BUFFER_COUNT: u32 = 4;

const CID_BRIGHTNESS: u32 = 0x0098_0900;
const CID_GAIN: u32 = 0x0098_0913;
const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
/// `V4L2_EXPOSURE_MANUAL`
const EXPOSURE_MANUAL: i64 = 1;

/// `/dev/video<index>` streaming YUYV through mmap buffers.
pub struct V4lCamera {
    index: u32,
    width: u32,
    height: u32,
    stream: Option<Stream<'static>>,
    device: Option<Device>,
}

impl V4lCamera {
    pub fn open(
        index: u32,
        width: u32,
        height: u32,
        controls: &CameraControls,
    ) -> Result<Self, CameraError> {
        let open_err = |source| CameraError::Open { index, source };
        let device = Device::new(index as usize).map_err(open_err)?;

        apply_controls(&device, controls);

        let mut fmt = device.format().map_err(open_err)?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = FourCC::new(b"YUYV");
        let fmt = device.set_format(&fmt).map_err(open_err)?;
        if fmt.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::Unsupported {
                index,
                what: "YUYV capture".to_string(),
            });
        }
        if (fmt.width, fmt.height) != (width, height) {
            log::warn!(
                "/dev/video{index}: asked for {width}x{height}, driver chose {}x{}",
                fmt.width,
                fmt.height
            );
        }

        let stream =
            Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT).map_err(open_err)?;
        log::info!(
            "opened /dev/video{index} at {}x{} YUYV",
            fmt.width,
            fmt.height
        );
        Ok(Self {
            index,
            width: fmt.width,
            height: fmt.height,
            stream: Some(stream),
            device: Some(device),
        })
    }
}

fn apply_controls(device: &Device, controls: &CameraControls) {
    let set = |id: u32, value: i64, what: &str| {
        if let Err(e) = device.set_control(Control {
            id,
            value: Value::Integer(value),
        }) {
            log::warn!("failed to set {what}: {e}");
        }
    };
    if let Some(exposure) = controls.exposure {
        set(CID_EXPOSURE_AUTO, EXPOSURE_MANUAL, "manual exposure mode");
        log::info!("exposure: {exposure}");
        set(CID_EXPOSURE_ABSOLUTE, exposure as i64 * 6, "exposure");
    }
    if let Some(gain) = controls.gain {
        log::info!("gain: {gain}");
        set(CID_GAIN, gain as i64 * 256, "gain");
    }
    if let Some(brightness) = controls.brightness {
        log::info!("brightness: {brightness}");
        set(CID_BRIGHTNESS, brightness as i64 * 256, "brightness");
    }
}

impl Camera for V4lCamera {
    fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Other(format!("/dev/video{} released", self.index)))?;
        let (data, meta) = stream.next()?;
        let used = (meta.bytesused as usize).min(data.len());
        yuyv_to_rgb(&data[..used], self.width, self.height)
    }

    fn release(&mut self) {
        // stream first: its buffers are mapped from the device
        self.stream.take();
        self.device.take();
        log::info!("released /dev/video{}", self.index);
    }
}

fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage, CaptureError> {
    let expected = width as usize * height as usize * 2;
    if data.len() < expected {
        return Err(CaptureError::ShortFrame {
            got: data.len(),
            expected,
        });
    }
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (px[0] as f32, px[1] as f32 - 128.0, px[2] as f32, px[3] as f32 - 128.0);
        for y in [y0, y1] {
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| CaptureError::Other("frame size mismatch".to_string()))
}
