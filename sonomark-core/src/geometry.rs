//! Annotation geometries and the uniform operations over them.
//!
//! Coordinates are `[time, freq]` pairs in data space. `TimeStamp` and
//! `TimeInterval` live on the time axis only; whenever a frequency extent is
//! needed they borrow the full frequency band of the window they are tested
//! against, so purely temporal annotations still cull and hit-test across
//! everything visible.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::transform;
use crate::types::{Dimensions, Interval, Pixel, Position, Window};

pub type Coord = [f64; 2];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    TimeStamp(f64),
    TimeInterval([f64; 2]),
    Point(Coord),
    /// `[t0, f0, t1, f1]`
    BoundingBox([f64; 4]),
    LineString(Vec<Coord>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    /// Outer ring first, then holes. Rings may or may not repeat the first
    /// coordinate at the end.
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    TimeStamp,
    TimeInterval,
    Point,
    BoundingBox,
    LineString,
    MultiPoint,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 9] = [
        GeometryKind::TimeStamp,
        GeometryKind::TimeInterval,
        GeometryKind::Point,
        GeometryKind::BoundingBox,
        GeometryKind::LineString,
        GeometryKind::MultiPoint,
        GeometryKind::MultiLineString,
        GeometryKind::Polygon,
        GeometryKind::MultiPolygon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::TimeStamp => "TimeStamp",
            GeometryKind::TimeInterval => "TimeInterval",
            GeometryKind::Point => "Point",
            GeometryKind::BoundingBox => "BoundingBox",
            GeometryKind::LineString => "LineString",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Variants that project onto the time axis only.
    pub fn is_temporal(self) -> bool {
        matches!(self, GeometryKind::TimeStamp | GeometryKind::TimeInterval)
    }
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::TimeStamp(_) => GeometryKind::TimeStamp,
            Geometry::TimeInterval(_) => GeometryKind::TimeInterval,
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::BoundingBox(_) => GeometryKind::BoundingBox,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Parse a `{"type": .., "coordinates": ..}` value. Unknown types are
    /// reported as [`GeometryError::UnsupportedVariant`] rather than folded
    /// into a generic parse failure.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, GeometryError> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| GeometryError::Malformed("missing \"type\"".into()))?;
        if GeometryKind::from_name(kind).is_none() {
            return Err(GeometryError::UnsupportedVariant(kind.to_string()));
        }
        serde_json::from_value(value.clone()).map_err(|e| GeometryError::Malformed(e.to_string()))
    }

    // ── Extents ─────────────────────────────────────────────────────────

    /// Time extent of the geometry.
    pub fn time_extent(&self) -> Result<Interval, GeometryError> {
        match self {
            Geometry::TimeStamp(t) => Ok(Interval::new(*t, *t)),
            Geometry::TimeInterval([a, b]) => Ok(Interval::ordered(*a, *b)),
            Geometry::BoundingBox([t0, _, t1, _]) => Ok(Interval::ordered(*t0, *t1)),
            _ => self.coord_extent().map(|(time, _)| time),
        }
    }

    /// Frequency extent, or `None` for purely temporal variants.
    pub fn freq_extent(&self) -> Result<Option<Interval>, GeometryError> {
        match self {
            Geometry::TimeStamp(_) | Geometry::TimeInterval(_) => Ok(None),
            Geometry::BoundingBox([_, f0, _, f1]) => Ok(Some(Interval::ordered(*f0, *f1))),
            _ => self.coord_extent().map(|(_, freq)| Some(freq)),
        }
    }

    /// `[t0, f0, t1, f1]` with min ≤ max on both axes. Temporal variants
    /// report the window's frequency band.
    pub fn bounding_box(&self, window: &Window) -> Result<[f64; 4], GeometryError> {
        let time = self.time_extent()?;
        let freq = self.freq_extent()?.unwrap_or(window.freq);
        Ok([time.min, freq.min, time.max, freq.max])
    }

    /// Bounding-box overlap with the window, used to cull before drawing or
    /// hit-testing.
    pub fn is_in_window(&self, window: &Window) -> Result<bool, GeometryError> {
        let [t0, f0, t1, f1] = self.bounding_box(window)?;
        Ok(window.time.overlaps(&Interval::new(t0, t1)) && window.freq.overlaps(&Interval::new(f0, f1)))
    }

    /// Time at which the geometry starts, used for sequential navigation.
    pub fn start_time(&self) -> Result<f64, GeometryError> {
        self.time_extent().map(|t| t.min)
    }

    /// Center of the bounding box. Frequency is `None` for temporal variants.
    pub fn center(&self) -> Result<(f64, Option<f64>), GeometryError> {
        let time = self.time_extent()?.center();
        let freq = self.freq_extent()?.map(|f| f.center());
        Ok((time, freq))
    }

    /// Top-left corner of the bounding box in pixel space.
    pub fn anchor(&self, window: &Window, dims: Dimensions) -> Result<Pixel, GeometryError> {
        let [t0, _, _, f1] = self.bounding_box(window)?;
        Ok(Pixel {
            x: transform::to_pixel_x(t0, window, dims.width),
            y: transform::to_pixel_y(f1, window, dims.height),
        })
    }

    fn coord_extent(&self) -> Result<(Interval, Interval), GeometryError> {
        let mut coords = self.coords().into_iter();
        let first = coords.next().ok_or(GeometryError::Empty { kind: self.kind().name() })?;
        let mut time = Interval::new(first[0], first[0]);
        let mut freq = Interval::new(first[1], first[1]);
        for [t, f] in coords {
            time.min = time.min.min(t);
            time.max = time.max.max(t);
            freq.min = freq.min.min(f);
            freq.max = freq.max.max(f);
        }
        Ok((time, freq))
    }

    /// Every `[time, freq]` pair of the point-based variants, in storage order.
    fn coords(&self) -> Vec<Coord> {
        match self {
            Geometry::TimeStamp(_) | Geometry::TimeInterval(_) => Vec::new(),
            Geometry::BoundingBox([t0, f0, t1, f1]) => vec![[*t0, *f0], [*t1, *f1]],
            Geometry::Point(c) => vec![*c],
            Geometry::LineString(cs) | Geometry::MultiPoint(cs) => cs.clone(),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().copied().collect(),
        }
    }

    // ── Transformations ─────────────────────────────────────────────────

    /// Convert to pixel coordinates for drawing. The result is never
    /// persisted.
    pub fn scale_to_window(&self, window: &Window, dims: Dimensions) -> Geometry {
        let x = |t: f64| transform::to_pixel_x(t, window, dims.width);
        let y = |f: f64| transform::to_pixel_y(f, window, dims.height);
        self.map_coords(&|[t, f]| [x(t), y(f)], &x, &|f| y(f))
    }

    /// Translate by the data-space vector `to - from`.
    pub fn shift(&self, from: Position, to: Position) -> Geometry {
        let dt = to.time - from.time;
        let df = to.freq - from.freq;
        self.map_coords(&|[t, f]| [t + dt, f + df], &|t| t + dt, &|f| f + df)
    }

    /// Order min/max on both axes for intervals and boxes; other variants
    /// are returned unchanged.
    pub fn normalized(&self) -> Geometry {
        match self {
            Geometry::TimeInterval([a, b]) => Geometry::TimeInterval([a.min(*b), a.max(*b)]),
            Geometry::BoundingBox([t0, f0, t1, f1]) => {
                Geometry::BoundingBox([t0.min(*t1), f0.min(*f1), t0.max(*t1), f0.max(*f1)])
            }
            other => other.clone(),
        }
    }

    fn map_coords(
        &self,
        pair: &dyn Fn(Coord) -> Coord,
        time: &dyn Fn(f64) -> f64,
        freq: &dyn Fn(f64) -> f64,
    ) -> Geometry {
        let line = |cs: &Vec<Coord>| cs.iter().map(|c| pair(*c)).collect::<Vec<_>>();
        match self {
            Geometry::TimeStamp(t) => Geometry::TimeStamp(time(*t)),
            Geometry::TimeInterval([a, b]) => Geometry::TimeInterval([time(*a), time(*b)]),
            Geometry::Point(c) => Geometry::Point(pair(*c)),
            Geometry::BoundingBox([t0, f0, t1, f1]) => {
                Geometry::BoundingBox([time(*t0), freq(*f0), time(*t1), freq(*f1)])
            }
            Geometry::LineString(cs) => Geometry::LineString(line(cs)),
            Geometry::MultiPoint(cs) => Geometry::MultiPoint(line(cs)),
            Geometry::MultiLineString(ls) => Geometry::MultiLineString(ls.iter().map(line).collect()),
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(line).collect()),
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys.iter().map(|rings| rings.iter().map(line).collect()).collect(),
            ),
        }
    }

    // ── Hit testing ─────────────────────────────────────────────────────

    /// Whether `position` is within `threshold` pixels of the geometry.
    ///
    /// Lines use point-to-segment distance, polygons use point-in-polygon
    /// (or edge proximity), intervals and boxes use containment with a
    /// margin.
    pub fn is_near_position(
        &self,
        position: Position,
        window: &Window,
        dims: Dimensions,
        threshold: f64,
    ) -> Result<bool, GeometryError> {
        if self.coords().is_empty() && !self.kind().is_temporal() {
            return Err(GeometryError::Empty { kind: self.kind().name() });
        }
        let p = transform::to_pixel(position, window, dims);
        let px = |c: &Coord| transform::to_pixel(Position::new(c[0], c[1]), window, dims);
        let near_line = |cs: &[Coord]| -> bool {
            match cs {
                [] => false,
                [only] => px(only).distance_to(p) <= threshold,
                _ => cs.windows(2).any(|seg| distance_to_segment(p, px(&seg[0]), px(&seg[1])) <= threshold),
            }
        };
        let in_polygon = |rings: &[Vec<Coord>]| -> bool {
            let pixel_rings: Vec<Vec<Pixel>> = rings.iter().map(|r| r.iter().map(px).collect()).collect();
            polygon_contains(&pixel_rings, p)
                || pixel_rings.iter().any(|ring| ring_edges(ring).any(|(a, b)| distance_to_segment(p, a, b) <= threshold))
        };

        let near = match self {
            Geometry::TimeStamp(t) => {
                (transform::to_pixel_x(*t, window, dims.width) - p.x).abs() <= threshold
            }
            Geometry::TimeInterval([a, b]) => {
                let x0 = transform::to_pixel_x(a.min(*b), window, dims.width);
                let x1 = transform::to_pixel_x(a.max(*b), window, dims.width);
                p.x >= x0 - threshold && p.x <= x1 + threshold
            }
            Geometry::Point(c) => px(c).distance_to(p) <= threshold,
            Geometry::BoundingBox([t0, f0, t1, f1]) => {
                let a = px(&[*t0, *f0]);
                let b = px(&[*t1, *f1]);
                p.x >= a.x.min(b.x) - threshold
                    && p.x <= a.x.max(b.x) + threshold
                    && p.y >= a.y.min(b.y) - threshold
                    && p.y <= a.y.max(b.y) + threshold
            }
            Geometry::LineString(cs) => near_line(cs.as_slice()),
            Geometry::MultiPoint(cs) => cs.iter().any(|c| px(c).distance_to(p) <= threshold),
            Geometry::MultiLineString(lines) => lines.iter().any(|l| near_line(l.as_slice())),
            Geometry::Polygon(rings) => in_polygon(rings.as_slice()),
            Geometry::MultiPolygon(polys) => polys.iter().any(|rings| in_polygon(rings.as_slice())),
        };
        Ok(near)
    }

    // ── Vertex editing ──────────────────────────────────────────────────

    /// Editable vertices in pixel space. Temporal variants place their
    /// handles at mid-height.
    pub fn handles(&self, window: &Window, dims: Dimensions) -> Vec<Pixel> {
        let mid = dims.height / 2.0;
        let x = |t: f64| transform::to_pixel_x(t, window, dims.width);
        match self {
            Geometry::TimeStamp(t) => vec![Pixel::new(x(*t), mid)],
            Geometry::TimeInterval([a, b]) => vec![Pixel::new(x(*a), mid), Pixel::new(x(*b), mid)],
            _ => self
                .vertex_coords()
                .into_iter()
                .map(|[t, f]| transform::to_pixel(Position::new(t, f), window, dims))
                .collect(),
        }
    }

    /// Index of the handle closest to `pixel`, if within `threshold`.
    /// Temporal handles compare on x only.
    pub fn nearest_handle(
        &self,
        pixel: Pixel,
        window: &Window,
        dims: Dimensions,
        threshold: f64,
    ) -> Option<usize> {
        let temporal = self.kind().is_temporal();
        self.handles(window, dims)
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let d = if temporal {
                    (h.x - pixel.x).abs()
                } else {
                    h.distance_to(pixel)
                };
                (i, d)
            })
            .filter(|(_, d)| *d <= threshold)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Corner order for boxes is `(t0,f0) (t1,f0) (t1,f1) (t0,f1)`. Closing
    /// coordinates of polygon rings are not separate vertices.
    fn vertex_coords(&self) -> Vec<Coord> {
        match self {
            Geometry::TimeStamp(_) | Geometry::TimeInterval(_) => Vec::new(),
            Geometry::BoundingBox([t0, f0, t1, f1]) => {
                vec![[*t0, *f0], [*t1, *f0], [*t1, *f1], [*t0, *f1]]
            }
            Geometry::Polygon(rings) => rings.iter().flat_map(|r| open_ring(r).iter().copied()).collect(),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .flat_map(|r| open_ring(r).iter().copied())
                .collect(),
            other => other.coords(),
        }
    }

    /// Move vertex `index` (as numbered by [`Geometry::handles`]) to `to`.
    pub fn move_vertex(&self, index: usize, to: Position) -> Result<Geometry, GeometryError> {
        let kind = self.kind().name();
        let out_of_range = || GeometryError::VertexOutOfRange { kind, index };
        let mut moved = self.clone();
        match &mut moved {
            Geometry::TimeStamp(t) => {
                if index != 0 {
                    return Err(out_of_range());
                }
                *t = to.time;
            }
            Geometry::TimeInterval(ts) => {
                *ts.get_mut(index).ok_or_else(out_of_range)? = to.time;
            }
            Geometry::Point(c) => {
                if index != 0 {
                    return Err(out_of_range());
                }
                *c = [to.time, to.freq];
            }
            Geometry::BoundingBox(b) => {
                let (ti, fi) = match index {
                    0 => (0, 1),
                    1 => (2, 1),
                    2 => (2, 3),
                    3 => (0, 3),
                    _ => return Err(out_of_range()),
                };
                b[ti] = to.time;
                b[fi] = to.freq;
            }
            Geometry::LineString(cs) | Geometry::MultiPoint(cs) => {
                *cs.get_mut(index).ok_or_else(out_of_range)? = [to.time, to.freq];
            }
            Geometry::MultiLineString(lines) => {
                let slot = lines.iter_mut().flatten().nth(index).ok_or_else(out_of_range)?;
                *slot = [to.time, to.freq];
            }
            Geometry::Polygon(rings) => {
                if !move_ring_vertex(rings.iter_mut(), index, to) {
                    return Err(out_of_range());
                }
            }
            Geometry::MultiPolygon(polys) => {
                if !move_ring_vertex(polys.iter_mut().flatten(), index, to) {
                    return Err(out_of_range());
                }
            }
        }
        Ok(moved)
    }
}

fn is_closed(ring: &[Coord]) -> bool {
    ring.len() > 1 && ring.first() == ring.last()
}

fn open_ring(ring: &[Coord]) -> &[Coord] {
    if is_closed(ring) {
        &ring[..ring.len() - 1]
    } else {
        ring
    }
}

fn move_ring_vertex<'a>(rings: impl Iterator<Item = &'a mut Vec<Coord>>, mut index: usize, to: Position) -> bool {
    for ring in rings {
        let closed = is_closed(ring);
        let open_len = if closed { ring.len() - 1 } else { ring.len() };
        if index < open_len {
            ring[index] = [to.time, to.freq];
            if closed && index == 0 {
                let last = ring.len() - 1;
                ring[last] = [to.time, to.freq];
            }
            return true;
        }
        index -= open_len;
    }
    false
}

/// Edges of a ring, closing it if the last coordinate does not repeat the first.
fn ring_edges(ring: &[Pixel]) -> impl Iterator<Item = (Pixel, Pixel)> + '_ {
    let n = ring.len();
    let closing = if n > 2 && ring[0] != ring[n - 1] { 1 } else { 0 };
    (0..(n.saturating_sub(1) + closing)).map(move |i| (ring[i], ring[(i + 1) % n]))
}

fn ring_contains(ring: &[Pixel], p: Pixel) -> bool {
    let mut inside = false;
    for (a, b) in ring_edges(ring) {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Inside the outer ring and outside every hole.
fn polygon_contains(rings: &[Vec<Pixel>], p: Pixel) -> bool {
    match rings.split_first() {
        Some((outer, holes)) => ring_contains(outer, p) && !holes.iter().any(|h| ring_contains(h, p)),
        None => false,
    }
}

fn distance_to_segment(p: Pixel, a: Pixel, b: Pixel) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq < 1e-12 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance_to(Pixel::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(Interval::new(0.0, 10.0), Interval::new(0.0, 1000.0))
    }

    fn dims() -> Dimensions {
        Dimensions::new(1000.0, 1000.0)
    }

    fn every_variant() -> Vec<Geometry> {
        vec![
            Geometry::TimeStamp(4.0),
            Geometry::TimeInterval([3.0, 5.0]),
            Geometry::Point([4.0, 400.0]),
            Geometry::BoundingBox([3.0, 300.0, 5.0, 500.0]),
            Geometry::LineString(vec![[3.0, 300.0], [5.0, 500.0]]),
            Geometry::MultiPoint(vec![[3.0, 300.0], [5.0, 500.0]]),
            Geometry::MultiLineString(vec![vec![[3.0, 300.0], [5.0, 500.0]]]),
            Geometry::Polygon(vec![vec![[3.0, 300.0], [5.0, 300.0], [5.0, 500.0], [3.0, 300.0]]]),
            Geometry::MultiPolygon(vec![vec![vec![[3.0, 300.0], [5.0, 300.0], [4.0, 500.0]]]]),
        ]
    }

    #[test]
    fn geometries_inside_window_are_in_window() {
        for g in every_variant() {
            assert!(g.is_in_window(&window()).unwrap(), "{:?}", g.kind());
        }
    }

    #[test]
    fn geometries_outside_window_are_culled() {
        let w = Window::new(Interval::new(20.0, 30.0), Interval::new(0.0, 1000.0));
        for g in every_variant() {
            assert!(!g.is_in_window(&w).unwrap(), "{:?}", g.kind());
        }
        // Above the visible band: only variants with a frequency extent cull.
        let high = Window::new(Interval::new(0.0, 10.0), Interval::new(2000.0, 3000.0));
        for g in every_variant() {
            let visible = g.is_in_window(&high).unwrap();
            assert_eq!(visible, g.kind().is_temporal(), "{:?}", g.kind());
        }
    }

    #[test]
    fn temporal_bounding_box_spans_window_band() {
        let w = Window::new(Interval::new(0.0, 10.0), Interval::new(100.0, 900.0));
        let bbox = Geometry::TimeInterval([5.0, 2.0]).bounding_box(&w).unwrap();
        assert_eq!(bbox, [2.0, 100.0, 5.0, 900.0]);
    }

    #[test]
    fn empty_line_string_is_an_error() {
        let err = Geometry::LineString(vec![]).bounding_box(&window()).unwrap_err();
        assert_eq!(err, GeometryError::Empty { kind: "LineString" });
        assert!(Geometry::Polygon(vec![])
            .is_near_position(Position::new(1.0, 1.0), &window(), dims(), 5.0)
            .is_err());
    }

    #[test]
    fn unknown_type_is_rejected_loudly() {
        let value = serde_json::json!({"type": "GeometryCollection", "coordinates": []});
        assert_eq!(
            Geometry::from_json(&value).unwrap_err(),
            GeometryError::UnsupportedVariant("GeometryCollection".into())
        );
        let ok = serde_json::json!({"type": "BoundingBox", "coordinates": [1.0, 2.0, 3.0, 4.0]});
        assert_eq!(Geometry::from_json(&ok).unwrap(), Geometry::BoundingBox([1.0, 2.0, 3.0, 4.0]));
        let bad = serde_json::json!({"type": "BoundingBox", "coordinates": [1.0]});
        assert!(matches!(Geometry::from_json(&bad), Err(GeometryError::Malformed(_))));
    }

    #[test]
    fn shift_moves_both_axes_except_for_temporal() {
        let from = Position::new(1.0, 100.0);
        let to = Position::new(3.0, 150.0);
        assert_eq!(
            Geometry::BoundingBox([1.0, 100.0, 2.0, 200.0]).shift(from, to),
            Geometry::BoundingBox([3.0, 150.0, 4.0, 250.0])
        );
        assert_eq!(Geometry::TimeInterval([1.0, 2.0]).shift(from, to), Geometry::TimeInterval([3.0, 4.0]));
    }

    #[test]
    fn scale_to_window_inverts_frequency() {
        let scaled = Geometry::Point([5.0, 250.0]).scale_to_window(&window(), dims());
        assert_eq!(scaled, Geometry::Point([500.0, 750.0]));
    }

    #[test]
    fn hit_tests_line_by_segment_distance() {
        let line = Geometry::LineString(vec![[0.0, 0.0], [10.0, 1000.0]]);
        // On the diagonal.
        assert!(line.is_near_position(Position::new(5.0, 500.0), &window(), dims(), 3.0).unwrap());
        // Roughly 70 px off the diagonal.
        assert!(!line.is_near_position(Position::new(6.0, 500.0), &window(), dims(), 3.0).unwrap());
    }

    #[test]
    fn hit_tests_polygon_interior_and_holes() {
        let poly = Geometry::Polygon(vec![
            vec![[1.0, 100.0], [9.0, 100.0], [9.0, 900.0], [1.0, 900.0]],
            vec![[4.0, 400.0], [6.0, 400.0], [6.0, 600.0], [4.0, 600.0]],
        ]);
        let near = |t, f| poly.is_near_position(Position::new(t, f), &window(), dims(), 2.0).unwrap();
        assert!(near(2.0, 200.0));
        assert!(!near(5.0, 500.0));
        assert!(near(4.0, 500.0));
        assert!(!near(9.5, 500.0));
    }

    #[test]
    fn hit_tests_box_with_margin() {
        let bbox = Geometry::BoundingBox([2.0, 200.0, 4.0, 400.0]);
        assert!(bbox.is_near_position(Position::new(4.04, 300.0), &window(), dims(), 5.0).unwrap());
        assert!(!bbox.is_near_position(Position::new(4.2, 300.0), &window(), dims(), 5.0).unwrap());
    }

    #[test]
    fn interval_hit_test_ignores_frequency() {
        let interval = Geometry::TimeInterval([2.0, 4.0]);
        assert!(interval.is_near_position(Position::new(3.0, 999.0), &window(), dims(), 1.0).unwrap());
        assert!(!interval.is_near_position(Position::new(5.0, 10.0), &window(), dims(), 1.0).unwrap());
    }

    #[test]
    fn normalizes_reversed_drags() {
        assert_eq!(
            Geometry::BoundingBox([5.0, 400.0, 2.0, 100.0]).normalized(),
            Geometry::BoundingBox([2.0, 100.0, 5.0, 400.0])
        );
        assert_eq!(Geometry::TimeInterval([3.0, 1.0]).normalized(), Geometry::TimeInterval([1.0, 3.0]));
    }

    #[test]
    fn moving_box_corner_updates_matching_coordinates() {
        let bbox = Geometry::BoundingBox([2.0, 200.0, 4.0, 400.0]);
        let moved = bbox.move_vertex(2, Position::new(6.0, 800.0)).unwrap();
        assert_eq!(moved, Geometry::BoundingBox([2.0, 200.0, 6.0, 800.0]));
        assert!(bbox.move_vertex(4, Position::new(0.0, 0.0)).is_err());
    }

    #[test]
    fn moving_closed_ring_start_keeps_ring_closed() {
        let poly = Geometry::Polygon(vec![vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]]]);
        assert_eq!(poly.handles(&window(), dims()).len(), 3);
        let moved = poly.move_vertex(0, Position::new(0.5, 0.5)).unwrap();
        let Geometry::Polygon(rings) = moved else { panic!("variant changed") };
        assert_eq!(rings[0].first(), Some(&[0.5, 0.5]));
        assert_eq!(rings[0].last(), Some(&[0.5, 0.5]));
    }

    #[test]
    fn nearest_handle_picks_closest_corner() {
        let bbox = Geometry::BoundingBox([2.0, 200.0, 4.0, 400.0]);
        // Corner (t1, f1) sits at pixel (400, 600).
        assert_eq!(bbox.nearest_handle(Pixel::new(402.0, 598.0), &window(), dims(), 6.0), Some(2));
        assert_eq!(bbox.nearest_handle(Pixel::new(300.0, 700.0), &window(), dims(), 6.0), None);
    }

    #[test]
    fn anchor_is_top_left_in_pixels() {
        let bbox = Geometry::BoundingBox([2.0, 200.0, 4.0, 400.0]);
        assert_eq!(bbox.anchor(&window(), dims()).unwrap(), Pixel::new(200.0, 600.0));
        let ts = Geometry::TimeStamp(3.0);
        assert_eq!(ts.anchor(&window(), dims()).unwrap(), Pixel::new(300.0, 0.0));
    }
}
