/*! Capsule-approximated self-collision detection.

Each arm segment (one adjacent pair in the node-position chain) is filled
with a chain of probe spheres at construction. Radii taper to zero at the
segment ends and the chain is inset slightly so segments sharing an endpoint
do not overlap through it. Per tick only the centers move; flags are
recomputed by comparing every sphere pair across non-adjacent segments. */

use crate::linear::Vec3;
use itertools::Itertools;

/// Sphere-chain construction constants, world units.
#[derive(Debug, Clone, Copy)]
pub struct CollisionConfig {
    pub sphere_radius: f64,
    /// Spacing between sphere stations along a segment.
    pub sphere_interval: f64,
    /// Fraction of the span inset at each segment end.
    pub end_gap: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        let sphere_radius = 0.1;
        CollisionConfig {
            sphere_radius,
            sphere_interval: sphere_radius / 4.0,
            end_gap: 0.001,
        }
    }
}

/// One probe sphere along a segment.
#[derive(Debug, Clone)]
pub struct Volume {
    center: Vec3,
    radius: f64,
    /// Normalized distance along the owning segment, in `[0, 1]`.
    station: f64,
    colliding: bool,
}

impl Volume {
    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn distance_along_segment(&self) -> f64 {
        self.station
    }

    pub fn is_colliding(&self) -> bool {
        self.colliding
    }
}

/// The sphere chain spanning one adjacent node pair.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Indices of the bounding nodes in the position chain.
    index_range: (usize, usize),
    volumes: Vec<Volume>,
}

impl Segment {
    pub fn index_range(&self) -> (usize, usize) {
        self.index_range
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Segments sharing an endpoint index are never tested against each
    /// other.
    fn adjacent_to(&self, other: &Segment) -> bool {
        let (a0, a1) = self.index_range;
        let (b0, b1) = other.index_range;
        a0 == b0 || a0 == b1 || a1 == b0 || a1 == b1
    }
}

/// Self-collision state for one node-position chain. Owned 1:1 by its
/// [crate::ArmSolution]; the sphere layout is fixed at construction.
#[derive(Debug, Clone)]
pub struct CollisionModel {
    segments: Vec<Segment>,
    chain_len: usize,
}

impl CollisionModel {
    pub fn new(positions: &[Vec3], config: CollisionConfig) -> Self {
        let segments = positions
            .iter()
            .enumerate()
            .tuple_windows()
            .map(|((start, a), (end, b))| {
                let span = a.distance(*b);
                let span_with_gap = span * (1.0 - 2.0 * config.end_gap);
                let count = (span_with_gap / config.sphere_interval).floor() as usize;
                let volumes = (0..count)
                    .map(|k| {
                        let station = config.end_gap + k as f64 * config.sphere_interval / span;
                        Volume {
                            center: a.lerp(*b, station),
                            // Tapers to zero at both segment ends
                            radius: config.sphere_radius * (1.0 - 2.0 * (station - 0.5).abs()),
                            station,
                            colliding: false,
                        }
                    })
                    .collect();
                Segment {
                    index_range: (start, end),
                    volumes,
                }
            })
            .collect();
        CollisionModel {
            segments,
            chain_len: positions.len(),
        }
    }

    /// Re-derive every sphere center from the current chain, then re-flag
    /// all colliding pairs across non-adjacent segments.
    pub fn update(&mut self, positions: &[Vec3]) {
        debug_assert_eq!(positions.len(), self.chain_len);

        for segment in &mut self.segments {
            let (start, end) = segment.index_range;
            let (a, b) = (positions[start], positions[end]);
            for volume in &mut segment.volumes {
                volume.center = a.lerp(b, volume.station);
                volume.colliding = false;
            }
        }

        for first in 0..self.segments.len() {
            for second in first + 1..self.segments.len() {
                let (head, tail) = self.segments.split_at_mut(second);
                let (sa, sb) = (&mut head[first], &mut tail[0]);
                if sa.adjacent_to(sb) {
                    continue;
                }
                for va in &mut sa.volumes {
                    for vb in &mut sb.volumes {
                        if va.center.distance(vb.center) < va.radius + vb.radius {
                            va.colliding = true;
                            vb.colliding = true;
                        }
                    }
                }
            }
        }
    }

    pub fn any_colliding(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.volumes.iter().any(Volume::is_colliding))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All spheres, flattened, for renderers.
    pub fn volumes(&self) -> impl Iterator<Item = &Volume> {
        self.segments.iter().flat_map(|s| s.volumes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_config() -> CollisionConfig {
        CollisionConfig::default()
    }

    #[test]
    fn spheres_fill_the_span_and_taper() {
        let positions = [Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)];
        let model = CollisionModel::new(&positions, unit_config());
        assert_eq!(model.segments().len(), 1);
        assert_eq!(model.segments()[0].index_range(), (0, 1));
        assert_eq!(model.volumes().count(), 39);
        let volumes = model.segments()[0].volumes();
        // span_with_gap / interval = 0.998 / 0.025
        assert_eq!(volumes.len(), 39);
        assert!(volumes
            .iter()
            .all(|v| (0.0..=1.0).contains(&v.distance_along_segment())));
        // Small near the start, widest around the middle
        assert!(volumes[0].radius() < 0.01);
        let widest = volumes
            .iter()
            .map(Volume::radius)
            .fold(0.0f64, f64::max);
        assert_abs_diff_eq!(widest, 0.1, epsilon = 0.01);
    }

    /// Chain whose last segment crosses the first one mid-span, where the
    /// probe radii are widest.
    fn folded_chain() -> [Vec3; 5] {
        [
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.5, 1.0, 0.0),
            Vec3::new(0.5, -1.0, 0.0),
        ]
    }

    #[test]
    fn adjacent_segments_are_exempt() {
        // The second segment folds straight back over the first; they share
        // index 1, so nothing may be flagged.
        let positions = [
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.05, 0.0, 0.0),
        ];
        let mut model = CollisionModel::new(&positions, unit_config());
        model.update(&positions);
        assert!(!model.any_colliding());
    }

    #[test]
    fn non_adjacent_overlap_is_flagged_on_both_sides() {
        let positions = folded_chain();
        let mut model = CollisionModel::new(&positions, unit_config());
        model.update(&positions);
        assert!(model.any_colliding());

        let hit = |index: usize| {
            model.segments()[index]
                .volumes()
                .iter()
                .any(Volume::is_colliding)
        };
        // Segment 3 crosses segment 0; both carry flags
        assert!(hit(0));
        assert!(hit(3));
        // The bystanders run half a unit away and stay clean
        assert!(!hit(1));
        assert!(!hit(2));
    }

    #[test]
    fn update_follows_the_chain_and_clears_stale_flags() {
        let folded = folded_chain();
        let mut model = CollisionModel::new(&folded, unit_config());
        model.update(&folded);
        assert!(model.any_colliding());

        // Unfold the tail away from the first segment
        let open = [
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
        ];
        model.update(&open);
        assert!(!model.any_colliding());

        let centers_y: Vec<f64> = model.segments()[0]
            .volumes()
            .iter()
            .map(|v| v.center().y)
            .collect();
        assert!(centers_y.iter().all(|&y| y.abs() < 1e-12));
    }

    #[test]
    fn degenerate_segment_carries_no_spheres() {
        let positions = [Vec3::ZERO, Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)];
        let model = CollisionModel::new(&positions, unit_config());
        assert!(model.segments()[0].volumes().is_empty());
        assert!(!model.segments()[1].volumes().is_empty());
    }
}
