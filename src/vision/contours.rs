use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// An outer border of a connected changed region.
#[derive(Clone, Debug)]
pub struct MotionContour {
    pub points: Vec<Point<i32>>,
    pub area: f64,
    pub centroid: Point<f32>,
}

/// External contours of a binary mask (outer borders that are not nested in a hole).
pub fn external_contours(mask: &GrayImage) -> Vec<MotionContour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let area = contour_area(&c.points);
            let centroid = centroid(&c.points);
            MotionContour {
                points: c.points,
                area,
                centroid,
            }
        })
        .collect()
}

/// Polygon area enclosed by the border (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = closed_edges(points)
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// 质心: 多边形一阶矩 m10/m00, m01/m00; 退化轮廓取顶点均值
pub fn centroid(points: &[Point<i32>]) -> Point<f32> {
    if points.is_empty() {
        return Point::new(0.0, 0.0);
    }
    let (mut m00, mut m10, mut m01) = (0.0f64, 0.0f64, 0.0f64);
    for (a, b) in closed_edges(points) {
        let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
        let cross = ax * by - bx * ay;
        m00 += cross;
        m10 += (ax + bx) * cross;
        m01 += (ay + by) * cross;
    }
    if m00.abs() < f64::EPSILON {
        let n = points.len() as f64;
        let sx: f64 = points.iter().map(|p| p.x as f64).sum();
        let sy: f64 = points.iter().map(|p| p.y as f64).sum();
        return Point::new((sx / n) as f32, (sy / n) as f32);
    }
    Point::new((m10 / (3.0 * m00)) as f32, (m01 / (3.0 * m00)) as f32)
}

fn closed_edges(points: &[Point<i32>]) -> impl Iterator<Item = (Point<i32>, Point<i32>)> + '_ {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_square_area_and_centroid() {
        let pts = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(contour_area(&pts), 100.0);
        let c = centroid(&pts);
        assert!((c.x - 5.0).abs() < 1e-4 && (c.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_contour() {
        let line = [Point::new(2, 4), Point::new(6, 4)];
        assert_eq!(contour_area(&line), 0.0);
        let c = centroid(&line);
        assert_eq!((c.x, c.y), (4.0, 4.0));
    }

    #[test]
    fn test_external_only() {
        let mut mask = GrayImage::new(60, 40);
        // 带孔的方块 + 孔内的小方块 + 独立方块
        draw_filled_rect_mut(&mut mask, Rect::at(5, 5).of_size(30, 30), Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(20, 20), Luma([0]));
        draw_filled_rect_mut(&mut mask, Rect::at(17, 17).of_size(6, 6), Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(45, 10).of_size(10, 12), Luma([255]));

        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 2);
        let mut areas: Vec<f64> = contours.iter().map(|c| c.area).collect();
        areas.sort_by(f64::total_cmp);
        // 边界经过像素中心, 面积比像素数略小
        assert_eq!(areas, vec![(9 * 11) as f64, (29 * 29) as f64]);

        let small = contours.iter().find(|c| c.area < 200.0).unwrap();
        assert!((small.centroid.x - 49.5).abs() < 1e-3);
        assert!((small.centroid.y - 15.5).abs() < 1e-3);
    }
}
