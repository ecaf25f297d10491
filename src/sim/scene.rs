//! Groups, teams and the scene that owns them

use super::entity::Entity;
use crate::consts::*;

/// Which side an entity plays for.
///
/// Each team owns one color channel of the occupancy bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    A,
    B,
}

impl Team {
    /// Bitmap channel this team's shapes are written to
    pub const fn channel(self) -> usize {
        match self {
            Team::A => 0,
            Team::B => 1,
        }
    }

    pub const fn opponent(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }

    /// Per-instance color mask used when rasterizing this team
    pub const fn mask(self) -> [f32; 4] {
        match self {
            Team::A => [1.0, 0.0, 0.0, 0.0],
            Team::B => [0.0, 1.0, 0.0, 0.0],
        }
    }

    /// Y coordinate of the team's spawn row
    pub const fn spawn_y(self) -> f32 {
        match self {
            Team::A => SPAWN_MARGIN,
            Team::B => HEIGHT_FLOAT - SPAWN_MARGIN,
        }
    }
}

/// A fixed-size, ordered set of entities on one team
#[derive(Debug, Clone)]
pub struct Group {
    pub team: Team,
    pub entities: Vec<Entity>,
}

impl Group {
    pub fn new(team: Team, entities: Vec<Entity>) -> Self {
        Self { team, entities }
    }

    /// Spread `count` entities evenly along the team's spawn row
    pub fn spawn(team: Team, count: usize) -> Self {
        let dx = WIDTH_FLOAT / count.max(1) as f32;
        let entities = (0..count)
            .map(|i| {
                let i = i as f32;
                Entity::new(
                    i * dx + dx / 2.0,
                    team.spawn_y(),
                    ENTITY_RADIUS,
                    ENTITY_SPEED,
                    (i * SPAWN_HEADING_STEP_DEG).to_radians(),
                )
            })
            .collect();
        Self { team, entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Both groups plus the running hit counter
#[derive(Debug, Clone)]
pub struct Scene {
    pub a: Group,
    pub b: Group,
    hit_count: u64,
}

impl Scene {
    /// Standard benchmark layout: `entity_count` entities per group
    pub fn new(entity_count: usize) -> Self {
        Self::from_groups(
            Group::spawn(Team::A, entity_count),
            Group::spawn(Team::B, entity_count),
        )
    }

    pub fn from_groups(a: Group, b: Group) -> Self {
        debug_assert_eq!(a.team, Team::A);
        debug_assert_eq!(b.team, Team::B);
        Self { a, b, hit_count: 0 }
    }

    /// Total collision events detected so far
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub(crate) fn add_hits(&mut self, hits: u64) {
        self.hit_count += hits;
    }

    /// Total entities across both groups
    pub fn entity_count(&self) -> usize {
        self.a.len() + self.b.len()
    }

    pub fn groups(&self) -> [&Group; 2] {
        [&self.a, &self.b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_layout() {
        let scene = Scene::new(4);
        assert_eq!(scene.entity_count(), 8);
        assert_eq!(scene.hit_count(), 0);

        let xs: Vec<f32> = scene.a.entities.iter().map(|e| e.pos.x).collect();
        assert_eq!(xs, vec![160.0, 480.0, 800.0, 1120.0]);
        assert!(scene.a.entities.iter().all(|e| e.pos.y == 10.0));
        assert!(scene.b.entities.iter().all(|e| e.pos.y == 950.0));

        let third = &scene.b.entities[2];
        assert!((third.heading - 20.0f32.to_radians()).abs() < 1e-6);
        assert_eq!(third.prev, third.pos);
        assert_eq!(third.radius, ENTITY_RADIUS);
        assert_eq!(third.speed, ENTITY_SPEED);
    }

    #[test]
    fn test_team_channels_are_disjoint() {
        assert_ne!(Team::A.channel(), Team::B.channel());
        assert_eq!(Team::A.opponent(), Team::B);
        assert_eq!(Team::B.opponent().channel(), 0);
        assert_eq!(Team::A.mask()[Team::A.channel()], 1.0);
        assert_eq!(Team::A.mask()[Team::B.channel()], 0.0);
    }

    #[test]
    fn test_empty_scene() {
        let scene = Scene::new(0);
        assert!(scene.a.is_empty());
        assert_eq!(scene.entity_count(), 0);
    }
}
