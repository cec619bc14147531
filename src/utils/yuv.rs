//! 平面YUV ↔ RGB 转换 (BT.601, full range, 整数系数 ×128 / ×256)

use image::RgbImage;

/// Chroma subsampling of a planar 8-bit YUV frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaLayout {
    Yuv420,
    Yuv422,
    Yuv444,
    Mono,
}

impl ChromaLayout {
    /// Size of one chroma plane, `(0, 0)` for mono.
    pub fn chroma_size(self, width: usize, height: usize) -> (usize, usize) {
        match self {
            Self::Yuv420 => (width.div_ceil(2), height.div_ceil(2)),
            Self::Yuv422 => (width.div_ceil(2), height),
            Self::Yuv444 => (width, height),
            Self::Mono => (0, 0),
        }
    }

    /// Bytes of one frame: Y plane followed by U and V planes.
    /// Saturates at `usize::MAX` for sizes that do not fit in memory.
    pub fn frame_len(self, width: usize, height: usize) -> usize {
        self.checked_frame_len(width, height).unwrap_or(usize::MAX)
    }

    /// `None` when the frame size overflows `usize`.
    pub fn checked_frame_len(self, width: usize, height: usize) -> Option<usize> {
        let (cw, ch) = self.chroma_size(width, height);
        let luma = width.checked_mul(height)?;
        let chroma = cw.checked_mul(ch)?.checked_mul(2)?;
        luma.checked_add(chroma)
    }

    fn shifts(self) -> (usize, usize) {
        match self {
            Self::Yuv420 => (1, 1),
            Self::Yuv422 => (1, 0),
            Self::Yuv444 | Self::Mono => (0, 0),
        }
    }
}

/// Converts one planar frame to RGB. Returns `None` when `data` is shorter than
/// [`ChromaLayout::frame_len`].
pub fn planar_to_rgb(data: &[u8], width: u32, height: u32, layout: ChromaLayout) -> Option<RgbImage> {
    let (w, h) = (width as usize, height as usize);
    if data.len() < layout.frame_len(w, h) {
        return None;
    }
    let (y_plane, chroma) = data.split_at(w * h);
    let mut buffer = vec![0u8; w * h * 3];

    if layout == ChromaLayout::Mono {
        for (dst, &y) in buffer.chunks_exact_mut(3).zip(y_plane) {
            dst.fill(y);
        }
        return RgbImage::from_raw(width, height, buffer);
    }

    let (cw, ch) = layout.chroma_size(w, h);
    let (u_plane, v_plane) = chroma.split_at(cw * ch);
    let (sx, sy) = layout.shifts();

    let mut out_idx = 0;
    for y in 0..h {
        let y_row = y * w;
        let uv_row = (y >> sy) * cw;

        for x in 0..w {
            let y_val = y_plane[y_row + x] as i32;
            let u_val = u_plane[uv_row + (x >> sx)] as i32 - 128;
            let v_val = v_plane[uv_row + (x >> sx)] as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
    RgbImage::from_raw(width, height, buffer)
}

/// RGB → planar YUV 4:2:0 (Y, U, V back to back). Chroma is the mean of each 2x2 block.
pub fn rgb_to_yuv420(image: &RgbImage) -> Vec<u8> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let (cw, ch) = ChromaLayout::Yuv420.chroma_size(w, h);
    let mut out = vec![0u8; ChromaLayout::Yuv420.frame_len(w, h)];
    let (y_plane, chroma) = out.split_at_mut(w * h);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);

    let mut u_acc = vec![0i32; cw * ch];
    let mut v_acc = vec![0i32; cw * ch];
    let mut count = vec![0i32; cw * ch];

    for (x, y, px) in image.enumerate_pixels() {
        let [r, g, b] = px.0.map(i32::from);
        let (x, y) = (x as usize, y as usize);
        y_plane[y * w + x] = ((77 * r + 150 * g + 29 * b) >> 8).clamp(0, 255) as u8;

        let c = (y >> 1) * cw + (x >> 1);
        u_acc[c] += ((-43 * r - 85 * g + 128 * b) >> 8) + 128;
        v_acc[c] += ((128 * r - 107 * g - 21 * b) >> 8) + 128;
        count[c] += 1;
    }
    for c in 0..cw * ch {
        let n = count[c].max(1);
        u_plane[c] = (u_acc[c] / n).clamp(0, 255) as u8;
        v_plane[c] = (v_acc[c] / n).clamp(0, 255) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frame_len() {
        assert_eq!(ChromaLayout::Yuv420.frame_len(4, 2), 8 + 2 * 2);
        assert_eq!(ChromaLayout::Yuv420.frame_len(3, 3), 9 + 2 * 4);
        assert_eq!(ChromaLayout::Yuv422.frame_len(4, 2), 8 + 2 * 4);
        assert_eq!(ChromaLayout::Yuv444.frame_len(4, 2), 24);
        assert_eq!(ChromaLayout::Mono.frame_len(4, 2), 8);
    }

    #[test]
    fn test_frame_len_overflow() {
        assert_eq!(ChromaLayout::Yuv444.checked_frame_len(usize::MAX / 2, 3), None);
        assert_eq!(ChromaLayout::Yuv420.frame_len(usize::MAX, usize::MAX), usize::MAX);
        assert!(planar_to_rgb(&[0u8; 16], u32::MAX, u32::MAX, ChromaLayout::Yuv420).is_none());
    }

    #[test]
    fn test_gray_roundtrip_is_exact() {
        let img = RgbImage::from_pixel(6, 4, Rgb([128, 128, 128]));
        let yuv = rgb_to_yuv420(&img);
        assert!(yuv.iter().all(|&v| v == 128));
        let back = planar_to_rgb(&yuv, 6, 4, ChromaLayout::Yuv420).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_red_stays_red() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let yuv = rgb_to_yuv420(&img);
        let back = planar_to_rgb(&yuv, 2, 2, ChromaLayout::Yuv420).unwrap();
        let Rgb([r, g, b]) = *back.get_pixel(1, 1);
        assert!(r >= 240, "r={r}");
        assert!(g <= 20, "g={g}");
        assert!(b <= 20, "b={b}");
    }

    #[test]
    fn test_mono_and_short_buffer() {
        let data = [0u8, 50, 100, 200];
        let img = planar_to_rgb(&data, 2, 2, ChromaLayout::Mono).unwrap();
        assert_eq!(*img.get_pixel(1, 1), Rgb([200, 200, 200]));
        assert!(planar_to_rgb(&data[..3], 2, 2, ChromaLayout::Mono).is_none());
    }
}
