//! 预览窗口 (macroquad)
//!
//! The window runs on the main thread. Producers push [`PreviewPane`]s
//! through a bounded channel with `try_send`, so a slow window only drops
//! preview frames and never stalls the engine. Closing the window drops the
//! receiver; producers see `Disconnected` and stop previewing.

use crate::lifecycle::CancellationToken;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use image::RgbImage;
use macroquad::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

const QUEUE_DEPTH: usize = 4;

/// One picture for one slot of the preview grid.
#[derive(Clone, Debug)]
pub struct PreviewPane {
    pub slot: usize,
    pub title: String,
    pub caption: String,
    pub image: Arc<RgbImage>,
}

/// The preview window is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewClosed;

#[derive(Clone)]
pub struct PreviewHandle {
    tx: Sender<PreviewPane>,
}

impl PreviewHandle {
    /// Never blocks: a full queue drops the pane.
    pub fn show(&self, pane: PreviewPane) -> Result<(), PreviewClosed> {
        match self.tx.try_send(pane) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(PreviewClosed),
        }
    }
}

pub fn preview_channel() -> (PreviewHandle, Receiver<PreviewPane>) {
    let (tx, rx) = bounded(QUEUE_DEPTH);
    (PreviewHandle { tx }, rx)
}

/// What closing the window means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Only the preview stops; recording continues.
    DisablePreview,
    /// The whole run is cancelled.
    CancelRun,
}

struct Slot {
    texture: Texture2D,
    title: String,
    caption: String,
}

/// Opens the window and blocks until it is closed, the run is cancelled, or
/// every producer has hung up.
pub fn run_window(title: &str, rx: Receiver<PreviewPane>, token: CancellationToken, on_close: CloseAction) {
    let conf = Conf {
        window_title: title.to_string(),
        window_width: 1280,
        window_height: 720,
        window_resizable: true,
        ..Default::default()
    };
    let title = title.to_string();
    macroquad::Window::from_config(conf, async move {
        prevent_quit();
        let mut slots: BTreeMap<usize, Slot> = BTreeMap::new();
        info!("🖥️  preview window '{}' opened", title);

        loop {
            if is_quit_requested() {
                info!("🖥️  preview window closed by user");
                if on_close == CloseAction::CancelRun {
                    token.cancel();
                }
                break;
            }
            if token.is_cancelled() {
                break;
            }

            let mut hung_up = false;
            loop {
                match rx.try_recv() {
                    Ok(pane) => update_slot(&mut slots, pane),
                    Err(crossbeam_channel::TryRecvError::Empty) => break,
                    Err(crossbeam_channel::TryRecvError::Disconnected) => {
                        hung_up = true;
                        break;
                    }
                }
            }
            if hung_up {
                break;
            }

            clear_background(BLACK);
            draw_grid(&slots);
            next_frame().await;
        }
    });
}

fn update_slot(slots: &mut BTreeMap<usize, Slot>, pane: PreviewPane) {
    let (w, h) = pane.image.dimensions();
    let rgba = to_rgba(&pane.image);

    // 只在分辨率变化时重建纹理, 否则更新像素数据
    let needs_rebuild = slots.get(&pane.slot).map_or(true, |slot| {
        slot.texture.width() != w as f32 || slot.texture.height() != h as f32
    });
    if needs_rebuild {
        let texture = Texture2D::from_rgba8(w as u16, h as u16, &rgba);
        texture.set_filter(FilterMode::Linear);
        slots.insert(
            pane.slot,
            Slot {
                texture,
                title: pane.title,
                caption: pane.caption,
            },
        );
    } else if let Some(slot) = slots.get_mut(&pane.slot) {
        slot.texture.update(&Image {
            bytes: rgba,
            width: w as u16,
            height: h as u16,
        });
        slot.title = pane.title;
        slot.caption = pane.caption;
    }
}

fn to_rgba(image: &RgbImage) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(image.as_raw().len() / 3 * 4);
    for px in image.as_raw().chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    rgba
}

/// Near-square grid: `cols = ceil(sqrt(n))`, each texture letterboxed in its cell.
fn draw_grid(slots: &BTreeMap<usize, Slot>) {
    if slots.is_empty() {
        draw_text("waiting for frames...", 20.0, 40.0, 28.0, GRAY);
        return;
    }
    let (cols, rows) = grid_shape(slots.len());
    let cell_w = screen_width() / cols as f32;
    let cell_h = screen_height() / rows as f32;

    for (i, slot) in slots.values().enumerate() {
        let (cx, cy) = ((i % cols) as f32 * cell_w, (i / cols) as f32 * cell_h);
        let tex = &slot.texture;
        let scale = (cell_w / tex.width()).min(cell_h / tex.height());
        let (w, h) = (tex.width() * scale, tex.height() * scale);
        let (x, y) = (cx + (cell_w - w) / 2.0, cy + (cell_h - h) / 2.0);

        draw_texture_ex(
            tex,
            x,
            y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                ..Default::default()
            },
        );
        draw_text(&slot.title, x + 8.0, y + 24.0, 24.0, GREEN);
        if !slot.caption.is_empty() {
            draw_text(&slot.caption, x + 8.0, y + 48.0, 20.0, WHITE);
        }
    }
}

fn grid_shape(n: usize) -> (usize, usize) {
    let n = n.max(1);
    let cols = (n as f64).sqrt().ceil() as usize;
    (cols, n.div_ceil(cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(slot: usize) -> PreviewPane {
        PreviewPane {
            slot,
            title: "out".to_string(),
            caption: String::new(),
            image: Arc::new(RgbImage::new(2, 2)),
        }
    }

    #[test]
    fn test_show_never_blocks() {
        let (handle, rx) = preview_channel();
        for _ in 0..QUEUE_DEPTH * 3 {
            assert_eq!(handle.show(pane(0)), Ok(()));
        }
        assert_eq!(rx.len(), QUEUE_DEPTH);
    }

    #[test]
    fn test_closed_window_reported() {
        let (handle, rx) = preview_channel();
        drop(rx);
        assert_eq!(handle.show(pane(0)), Err(PreviewClosed));
    }

    #[test]
    fn test_grid_shape() {
        assert_eq!(grid_shape(1), (1, 1));
        assert_eq!(grid_shape(2), (2, 1));
        assert_eq!(grid_shape(4), (2, 2));
        assert_eq!(grid_shape(5), (3, 2));
    }

    #[test]
    fn test_to_rgba() {
        let img = RgbImage::from_raw(1, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(to_rgba(&img), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }
}
