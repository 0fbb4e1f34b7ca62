//! Showing annotated frames.

use image::RgbImage;

/// What the viewer asked for after a frame was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Continue,
    Quit,
}

/// A sink for annotated frames.
pub trait Display {
    fn show(&mut self, frame: &RgbImage) -> DisplayEvent;
}

/// Open a window titled `title`, or `None` when no window can be shown.
pub fn open_window(title: &str, width: u32, height: u32) -> Option<Box<dyn Display>> {
    #[cfg(feature = "display")]
    {
        match WindowDisplay::new(title, width, height) {
            Ok(w) => Some(Box::new(w)),
            Err(e) => {
                log::warn!("could not open a window, continuing without graphics: {e}");
                None
            }
        }
    }
    #[cfg(not(feature = "display"))]
    {
        log::warn!(
            "built without the `display` feature; not showing {title} ({width}x{height}), use -d to silence this"
        );
        None
    }
}

#[cfg(feature = "display")]
pub use self::window::WindowDisplay;

#[cfg(feature = "display")]
mod window {
    use super::{Display, DisplayEvent};
    use image::RgbImage;
    use minifb::{Key, Window, WindowOptions};

    /// A desktop window; `q` or closing it asks for shutdown.
    pub struct WindowDisplay {
        window: Window,
        buffer: Vec<u32>,
    }

    impl WindowDisplay {
        pub fn new(title: &str, width: u32, height: u32) -> Result<Self, minifb::Error> {
            let window = Window::new(
                title,
                width as usize,
                height as usize,
                WindowOptions::default(),
            )?;
            Ok(Self {
                window,
                buffer: Vec::new(),
            })
        }
    }

    impl Display for WindowDisplay {
        fn show(&mut self, frame: &RgbImage) -> DisplayEvent {
            self.buffer.clear();
            self.buffer.extend(
                frame
                    .pixels()
                    .map(|p| u32::from_be_bytes([0, p[0], p[1], p[2]])),
            );
            let (w, h) = (frame.width() as usize, frame.height() as usize);
            if let Err(e) = self.window.update_with_buffer(&self.buffer, w, h) {
                log::warn!("window update failed: {e}");
            }
            if !self.window.is_open() || self.window.is_key_down(Key::Q) {
                DisplayEvent::Quit
            } else {
                DisplayEvent::Continue
            }
        }
    }
}
