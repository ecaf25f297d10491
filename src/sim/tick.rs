//! One simulation tick: detect, then move
//!
//! Each entity is tested before its motion step, so detection always sees
//! the position that was rendered, never the one about to be rendered.

use super::detect::{BitmapSampler, BruteForce, Detector};
use super::entity::Entity;
use super::scene::Scene;
use crate::renderer::OccupancyBitmap;

/// Test every entity with `detector`, then advance it. Returns the hits.
pub fn detect_and_advance<D: Detector>(entities: &mut [Entity], detector: &D) -> u64 {
    let mut hits = 0;
    for entity in entities {
        if detector.is_hit(entity) {
            hits += 1;
        }
        entity.advance();
    }
    hits
}

/// Bitmap strategy: group A then group B, each sampled against the
/// opposing team's channel. Adds the hits to the scene counter.
pub fn bitmap_pass(scene: &mut Scene, bitmap: &OccupancyBitmap<'_>) -> u64 {
    let mut hits = 0;
    for group in [&mut scene.a, &mut scene.b] {
        let detector = BitmapSampler::new(bitmap, group.team.opponent().channel());
        hits += detect_and_advance(&mut group.entities, &detector);
    }
    scene.add_hits(hits);
    hits
}

/// Brute-force strategy: advance all of A, then advance each B entity and
/// count every A entity it overlaps. Adds the pairs to the scene counter.
pub fn brute_force_pass(scene: &mut Scene) -> u64 {
    for entity in &mut scene.a.entities {
        entity.advance();
    }

    let detector = BruteForce::new(&scene.a.entities);
    let mut hits = 0;
    for entity in &mut scene.b.entities {
        entity.advance();
        hits += detector.count(entity) as u64;
    }
    scene.add_hits(hits);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::renderer::{OccupancyRenderer, rasterize};
    use crate::sim::{Group, Team};
    use proptest::prelude::*;

    fn pinned_pair() -> Scene {
        Scene::from_groups(
            Group::new(Team::A, vec![Entity::stationary(640.0, 480.0, 5.0)]),
            Group::new(Team::B, vec![Entity::stationary(645.0, 480.0, 5.0)]),
        )
    }

    fn render(scene: &Scene) -> Vec<u8> {
        let mut bytes = vec![0u8; ROW_PITCH * HEIGHT as usize];
        let mut renderer = OccupancyRenderer::default();
        rasterize(&mut bytes, renderer.collect(scene));
        bytes
    }

    #[test]
    fn test_bitmap_pass_counts_both_sides() {
        let mut scene = pinned_pair();
        let bytes = render(&scene);
        let hits = bitmap_pass(&mut scene, &OccupancyBitmap::new(&bytes));
        assert_eq!(hits, 2);
        assert_eq!(scene.hit_count(), 2);
    }

    #[test]
    fn test_bitmap_pass_on_empty_bitmap() {
        let mut scene = Scene::new(50);
        let bytes = vec![0u8; ROW_PITCH * HEIGHT as usize];
        assert_eq!(bitmap_pass(&mut scene, &OccupancyBitmap::new(&bytes)), 0);
        // Entities still moved
        assert!(scene.a.entities.iter().all(|e| e.pos != e.prev));
    }

    #[test]
    fn test_boundary_entity_reflects_during_pass() {
        let mut scene = Scene::from_groups(
            Group::new(
                Team::A,
                vec![Entity::new(0.0, 480.0, ENTITY_RADIUS, ENTITY_SPEED, std::f32::consts::PI)],
            ),
            Group::new(Team::B, vec![]),
        );
        let bytes = vec![0u8; ROW_PITCH * HEIGHT as usize];
        bitmap_pass(&mut scene, &OccupancyBitmap::new(&bytes));
        let e = &scene.a.entities[0];
        assert_eq!(e.heading, 0.0);
        assert_eq!(e.pos.x, 0.0);
    }

    #[test]
    fn test_brute_force_counts_pairs() {
        let mut scene = Scene::from_groups(
            Group::new(
                Team::A,
                vec![
                    Entity::stationary(100.0, 100.0, 5.0),
                    Entity::stationary(104.0, 100.0, 5.0),
                ],
            ),
            Group::new(
                Team::B,
                vec![
                    Entity::stationary(102.0, 100.0, 5.0),
                    Entity::stationary(500.0, 500.0, 5.0),
                ],
            ),
        );
        assert_eq!(brute_force_pass(&mut scene), 2);
        assert_eq!(brute_force_pass(&mut scene), 2);
        assert_eq!(scene.hit_count(), 4);
    }

    #[test]
    fn test_spawn_rows_do_not_collide() {
        let mut scene = Scene::new(100);
        assert_eq!(brute_force_pass(&mut scene), 0);
    }

    proptest! {
        #[test]
        fn prop_hit_counter_is_monotonic(count in 1usize..60, ticks in 1usize..40) {
            let mut scene = Scene::new(count);
            let mut last = scene.hit_count();
            for _ in 0..ticks {
                let hits = brute_force_pass(&mut scene);
                prop_assert_eq!(scene.hit_count(), last + hits);
                last = scene.hit_count();
            }
        }

        #[test]
        fn prop_bitmap_pass_adds_what_it_returns(count in 1usize..40, ticks in 1usize..10) {
            let mut scene = Scene::new(count);
            for _ in 0..ticks {
                let bytes = render(&scene);
                let before = scene.hit_count();
                let hits = bitmap_pass(&mut scene, &OccupancyBitmap::new(&bytes));
                prop_assert_eq!(scene.hit_count() - before, hits);
                prop_assert!(hits <= scene.entity_count() as u64);
            }
        }
    }
}
