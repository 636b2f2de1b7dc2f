//! Metric projection and line-string helpers.
//!
//! Distances in the join and buffer steps are in meters, so geographic
//! coordinates are first projected onto a local tangent plane centered on the
//! route being analyzed.

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};

/// A Local Tangent Plane projection centered at a specific (lon0, lat0).
///
/// Equirectangular: x = R * cos(lat0) * dlon, y = R * dlat. Accurate to well
/// under a meter over the extent of a city bus route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTangentPlane {
    origin_lon_rad: f64,
    origin_lat_rad: f64,
    cos_lat0: f64,
}

impl LocalTangentPlane {
    const EARTH_RADIUS: f64 = 6_371_007.2;

    pub fn new(lon0: f64, lat0: f64) -> Self {
        let origin_lon_rad = lon0.to_radians();
        let origin_lat_rad = lat0.to_radians();
        Self {
            origin_lon_rad,
            origin_lat_rad,
            cos_lat0: origin_lat_rad.cos(),
        }
    }

    /// Centers the plane on the mean of all coordinates of `lines`.
    /// Returns `None` when there are no coordinates.
    pub fn centered_on<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Option<Self> {
        let (mut sum_x, mut sum_y, mut n) = (0.0, 0.0, 0usize);
        for line in lines {
            for c in line.coords() {
                sum_x += c.x;
                sum_y += c.y;
                n += 1;
            }
        }
        (n > 0).then(|| Self::new(sum_x / n as f64, sum_y / n as f64))
    }

    /// Project (lon, lat) to (x, y) meters
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let dlon = lon.to_radians() - self.origin_lon_rad;
        let dlat = lat.to_radians() - self.origin_lat_rad;
        let x = Self::EARTH_RADIUS * self.cos_lat0 * dlon;
        let y = Self::EARTH_RADIUS * dlat;
        (x, y)
    }

    /// Unproject (x, y) meters to (lon, lat)
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let dlon = x / (Self::EARTH_RADIUS * self.cos_lat0);
        let dlat = y / Self::EARTH_RADIUS;
        (
            (self.origin_lon_rad + dlon).to_degrees(),
            (self.origin_lat_rad + dlat).to_degrees(),
        )
    }

    pub fn project_point(&self, point: Point<f64>) -> Point<f64> {
        let (x, y) = self.project(point.x(), point.y());
        Point::new(x, y)
    }

    pub fn project_line(&self, line: &LineString<f64>) -> LineString<f64> {
        line.coords()
            .map(|c| {
                let (x, y) = self.project(c.x, c.y);
                Coord { x, y }
            })
            .collect()
    }

    pub fn unproject_line(&self, line: &LineString<f64>) -> LineString<f64> {
        line.coords()
            .map(|c| {
                let (x, y) = self.unproject(c.x, c.y);
                Coord { x, y }
            })
            .collect()
    }

    pub fn unproject_polygons(&self, polygons: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        polygons
            .iter()
            .map(|polygon| Polygon::new(self.unproject_line(polygon.exterior()), vec![]))
            .collect()
    }
}

/// Euclidean length of a metric line string.
pub fn line_length(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|l| (l.dx().powi(2) + l.dy().powi(2)).sqrt())
        .sum()
}

/// Locates `point` on `line`, only considering positions at or beyond
/// `from_m` meters along it.
///
/// Returns `(distance_along, distance_from_line)` of the closest admissible
/// position, or `None` for a line with fewer than two coordinates or a start
/// offset past its end.
pub fn locate_point_from(line: &LineString<f64>, point: Coord<f64>, from_m: f64) -> Option<(f64, f64)> {
    if line.0.len() < 2 {
        return None;
    }

    let mut best: Option<(f64, f64)> = None;
    let mut walked = 0.0;

    for edge in line.lines() {
        let len = (edge.dx().powi(2) + edge.dy().powi(2)).sqrt();
        let edge_end = walked + len;
        if edge_end < from_m || len == 0.0 {
            walked = edge_end;
            continue;
        }

        let t = ((point.x - edge.start.x) * edge.dx() + (point.y - edge.start.y) * edge.dy())
            / (len * len);
        let min_t = ((from_m - walked) / len).max(0.0);
        let t = t.clamp(min_t, 1.0);

        let px = edge.start.x + t * edge.dx();
        let py = edge.start.y + t * edge.dy();
        let dist = ((point.x - px).powi(2) + (point.y - py).powi(2)).sqrt();

        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((walked + t * len, dist));
        }
        walked = edge_end;
    }

    best
}

/// Returns the part of `line` between `start_m` and `end_m` meters along it.
///
/// Offsets are clamped to the line. The result always has at least two
/// coordinates when the line itself does.
pub fn line_substring(line: &LineString<f64>, start_m: f64, end_m: f64) -> LineString<f64> {
    let total = line_length(line);
    let start_m = start_m.clamp(0.0, total);
    let end_m = end_m.clamp(start_m, total);

    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut walked = 0.0;

    for edge in line.lines() {
        let len = (edge.dx().powi(2) + edge.dy().powi(2)).sqrt();
        let edge_end = walked + len;

        let at = |offset: f64| -> Coord<f64> {
            let t = if len == 0.0 { 0.0 } else { (offset - walked) / len };
            Coord {
                x: edge.start.x + t * edge.dx(),
                y: edge.start.y + t * edge.dy(),
            }
        };

        if coords.is_empty() && start_m <= edge_end {
            coords.push(at(start_m));
        }
        if !coords.is_empty() {
            if end_m <= edge_end {
                coords.push(at(end_m));
                break;
            }
            coords.push(edge.end);
        }
        walked = edge_end;
    }

    if coords.len() == 1 {
        coords.push(coords[0]);
    }
    LineString::new(coords)
}

/// Offsets past this multiple of the half width are beveled instead of
/// mitred.
const MITRE_LIMIT: f64 = 2.0;

/// Widens a metric line string into one flat-capped polygon, `half_width`
/// meters to each side.
///
/// Bends are mitred up to [`MITRE_LIMIT`], beyond which they are beveled.
/// Empty when the line has no length.
pub fn flat_buffer(line: &LineString<f64>, half_width: f64) -> MultiPolygon<f64> {
    let mut vertices: Vec<Coord<f64>> = Vec::with_capacity(line.0.len());
    for &c in &line.0 {
        if vertices.last() != Some(&c) {
            vertices.push(c);
        }
    }
    if vertices.len() < 2 {
        return MultiPolygon::new(vec![]);
    }

    // unit left normal of each edge
    let normals: Vec<Coord<f64>> = vertices
        .windows(2)
        .map(|w| {
            let (dx, dy) = (w[1].x - w[0].x, w[1].y - w[0].y);
            let len = (dx * dx + dy * dy).sqrt();
            Coord { x: -dy / len, y: dx / len }
        })
        .collect();

    let left = offset_side(&vertices, &normals, half_width);
    let right = offset_side(&vertices, &normals, -half_width);

    let mut ring = left;
    ring.extend(right.into_iter().rev());
    ring.push(ring[0]);
    MultiPolygon::new(vec![Polygon::new(LineString::new(ring), vec![])])
}

/// Vertices of `line` shifted `distance` along the left normals; negative
/// distances shift right.
fn offset_side(vertices: &[Coord<f64>], normals: &[Coord<f64>], distance: f64) -> Vec<Coord<f64>> {
    let shift = |p: Coord<f64>, n: Coord<f64>, scale: f64| Coord {
        x: p.x + n.x * scale,
        y: p.y + n.y * scale,
    };

    let mut out = Vec::with_capacity(vertices.len() + 2);
    out.push(shift(vertices[0], normals[0], distance));
    for (i, &vertex) in vertices.iter().enumerate().take(vertices.len() - 1).skip(1) {
        let (a, b) = (normals[i - 1], normals[i]);
        let sum = Coord { x: a.x + b.x, y: a.y + b.y };
        let sum_len = (sum.x * sum.x + sum.y * sum.y).sqrt();
        // cos of half the turn angle
        let cos_half = sum_len / 2.0;
        if cos_half > 1.0 - 1e-12 {
            continue;
        }
        if cos_half >= 1.0 / MITRE_LIMIT {
            let mitre = Coord {
                x: sum.x / sum_len,
                y: sum.y / sum_len,
            };
            out.push(shift(vertex, mitre, distance / cos_half));
        } else {
            out.push(shift(vertex, a, distance));
            out.push(shift(vertex, b, distance));
        }
    }
    let last = vertices.len() - 1;
    out.push(shift(vertices[last], normals[last - 1], distance));
    out
}
