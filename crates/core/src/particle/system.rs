use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    phase_opacity, BehaviorFrame, BehaviorRegistry, Decoration, ParticlePool, ParticleView,
    PoolStats,
};
use crate::{
    color::Rgb,
    config::EngineConfig,
    emotion::{RenderParameters, WeightedColor},
    gesture::GestureTransform,
};

/// What one update did to the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnReport {
    pub spawned: u32,
    pub skipped: u32,
    pub despawned: u32,
}

/// Spawns, updates and culls pooled particles. The only code that acquires
/// or releases pool slots.
#[derive(Debug)]
pub struct ParticleSystem {
    pool: ParticlePool,
    behaviors: BehaviorRegistry,
    rng: StdRng,
    accumulator: f32,
    lifetime_secs: f32,
    lifetime_jitter: f32,
    spawn_radius: f32,
    spawned_total: u64,
    despawned_total: u64,
    skipped_total: u64,
}

impl ParticleSystem {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pool: ParticlePool::with_capacity(config.pool_capacity),
            behaviors: BehaviorRegistry::new(),
            rng: StdRng::seed_from_u64(config.seed),
            accumulator: 0.0,
            lifetime_secs: config.particle_lifetime_ms / 1000.0,
            lifetime_jitter: config.lifetime_jitter,
            spawn_radius: config.spawn_radius,
            spawned_total: 0,
            despawned_total: 0,
            skipped_total: 0,
        }
    }

    pub fn behaviors_mut(&mut self) -> &mut BehaviorRegistry {
        &mut self.behaviors
    }

    /// Spawns this tick's share of `params.particle_rate`, then advances and
    /// culls every active particle. `dt_ms` is expected to be clamped by the
    /// caller.
    pub fn update(
        &mut self,
        dt_ms: f32,
        params: &RenderParameters,
        motion: GestureTransform,
    ) -> SpawnReport {
        let dt = dt_ms.max(0.0) / 1000.0;
        let mut report = SpawnReport::default();

        // Fractional accumulator: the long-run spawn count converges on
        // rate * time no matter how dt is sliced.
        self.accumulator += params.particle_rate.max(0.0) * dt;
        while self.accumulator >= 1.0 {
            self.accumulator -= 1.0;
            if self.spawn(params) {
                report.spawned += 1;
            } else {
                report.skipped += 1;
            }
        }

        let frame = BehaviorFrame { params, motion };
        let mut index = self.pool.active_len();
        while index > 0 {
            index -= 1;
            let id = self.pool.active_ids()[index];
            let Some(particle) = self.pool.get_mut(id) else {
                continue;
            };

            particle.life = (particle.life + dt / particle.lifetime_secs).min(1.0);
            if particle.life >= 1.0 {
                // swap_remove pulls in an entry we already visited.
                self.pool.release_at(index);
                report.despawned += 1;
                continue;
            }

            self.behaviors.update(particle, &frame, dt);
            particle.effective_velocity = particle.velocity * params.speed_multiplier;
            particle.position += particle.effective_velocity * dt;
            particle.opacity = particle.base_opacity * phase_opacity(particle.life);
        }

        self.spawned_total += u64::from(report.spawned);
        self.despawned_total += u64::from(report.despawned);
        self.skipped_total += u64::from(report.skipped);
        if report.skipped > 0 {
            tracing::debug!(skipped = report.skipped, "particle pool exhausted");
        }
        report
    }

    fn spawn(&mut self, params: &RenderParameters) -> bool {
        let Some(id) = self.pool.acquire() else {
            return false;
        };
        let color = sample_palette(&params.palette, &mut self.rng).unwrap_or(params.primary_color);
        let jitter = if self.lifetime_jitter > 0.0 {
            self.rng.gen_range(-self.lifetime_jitter..self.lifetime_jitter)
        } else {
            0.0
        };
        let angle = self.rng.gen_range(0.0..TAU);
        let radius = self.spawn_radius * self.rng.gen_range(0.9..1.1);
        let glow_chance = (params.glow_intensity * 0.3).clamp(0.0, 0.9);

        let Some(particle) = self.pool.get_mut(id) else {
            return false;
        };
        particle.position = Vec2::new(angle.cos(), angle.sin()) * radius;
        particle.life = 0.0;
        particle.lifetime_secs = (self.lifetime_secs * (1.0 + jitter)).max(0.05);
        particle.base_opacity = self.rng.gen_range(0.6..1.0);
        particle.opacity = 0.0;
        particle.size = self.rng.gen_range(0.04..0.1);
        particle.color = color;
        particle.glow = self.rng.gen::<f32>() < glow_chance;
        self.behaviors.assign(params.behavior, particle, &mut self.rng);
        true
    }

    /// Lays a gesture's decoration over every active particle.
    pub fn apply_decoration(&mut self, token: u64, decoration: Decoration) -> usize {
        let mut count = 0;
        for particle in self.pool.iter_active_mut() {
            particle.decorate(token, decoration);
            count += 1;
        }
        count
    }

    /// Completion callback for a decorated gesture: strips exactly the
    /// decoration `token` applied.
    pub fn revert_decoration(&mut self, token: u64) -> usize {
        self.pool
            .iter_active_mut()
            .map(|particle| particle.undecorate(token))
            .filter(|reverted| *reverted)
            .count()
    }

    /// Returns every active particle to the pool.
    pub fn clear(&mut self) -> usize {
        self.accumulator = 0.0;
        let released = self.pool.release_all();
        self.despawned_total += released as u64;
        released
    }

    /// Clears and drops the pool's backing storage.
    pub fn dispose(&mut self) {
        self.clear();
        self.pool.dispose();
    }

    pub fn views(&self) -> Vec<ParticleView> {
        self.pool.iter_active().map(|p| p.view()).collect()
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    pub fn despawned_total(&self) -> u64 {
        self.despawned_total
    }

    /// Spawns skipped because the pool was empty.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }
}

/// Cumulative-weight threshold sampling. `None` for an empty or weightless
/// palette.
pub fn sample_palette<R: Rng>(palette: &[WeightedColor], rng: &mut R) -> Option<Rgb> {
    let total: f32 = palette.iter().map(|entry| entry.weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let threshold = rng.gen::<f32>() * total;
    let mut cumulative = 0.0;
    for entry in palette {
        cumulative += entry.weight.max(0.0);
        if threshold < cumulative {
            return Some(entry.color);
        }
    }
    palette.last().map(|entry| entry.color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emotion::BreathingPattern,
        particle::{BehaviorKind, BehaviorRule, BehaviorState, Particle},
    };

    fn config(capacity: usize) -> EngineConfig {
        EngineConfig {
            pool_capacity: capacity,
            particle_lifetime_ms: 1000.0,
            lifetime_jitter: 0.0,
            ..Default::default()
        }
    }

    fn params(rate: f32, behavior: BehaviorKind) -> RenderParameters {
        RenderParameters {
            emotion: "test".to_string(),
            undertone: "clear".to_string(),
            transition_progress: 1.0,
            palette: vec![WeightedColor::new("#FF0000", 1.0).unwrap()],
            primary_color: Rgb::new(1.0, 0.0, 0.0),
            particle_rate: rate,
            glow_intensity: 1.0,
            breathing: BreathingPattern {
                rate: 0.0,
                depth: 0.0,
            },
            breath_scale: 1.0,
            speed_multiplier: 1.0,
            behavior,
        }
    }

    #[test]
    fn accumulator_converges_regardless_of_frame_slicing() {
        let render = params(10.0, BehaviorKind::Ambient);
        let mut even = ParticleSystem::new(&config(1_000));
        let mut ragged = ParticleSystem::new(&config(1_000));
        for _ in 0..60 {
            even.update(1000.0 / 60.0, &render, GestureTransform::IDENTITY);
        }
        let steps = [3.0, 40.0, 7.0, 25.0, 16.0, 9.0];
        let mut elapsed = 0.0;
        let mut i = 0;
        while elapsed + steps[i % steps.len()] <= 1000.0 {
            ragged.update(steps[i % steps.len()], &render, GestureTransform::IDENTITY);
            elapsed += steps[i % steps.len()];
            i += 1;
        }
        ragged.update(1000.0 - elapsed, &render, GestureTransform::IDENTITY);
        assert!((even.spawned_total() as i64 - 10).abs() <= 1);
        assert!((ragged.spawned_total() as i64 - 10).abs() <= 1);
    }

    #[test]
    fn exhausted_pool_skips_and_counts() {
        let render = params(100.0, BehaviorKind::Resting);
        let mut system = ParticleSystem::new(&config(5));
        let report = system.update(100.0, &render, GestureTransform::IDENTITY);
        assert_eq!(report.spawned, 5);
        assert_eq!(report.skipped, 5);
        assert_eq!(system.skipped_total(), 5);
        assert!(system.pool().is_consistent());
    }

    #[test]
    fn particles_despawn_in_the_tick_they_expire() {
        let render = params(10.0, BehaviorKind::Resting);
        let mut system = ParticleSystem::new(&config(10));
        system.update(100.0, &render, GestureTransform::IDENTITY);
        assert_eq!(system.stats().active, 1);
        let quiet = params(0.0, BehaviorKind::Resting);
        for _ in 0..8 {
            system.update(100.0, &quiet, GestureTransform::IDENTITY);
        }
        assert_eq!(system.stats().active, 1);
        system.update(100.0, &quiet, GestureTransform::IDENTITY);
        assert_eq!(system.stats().active, 0);
        assert_eq!(system.despawned_total(), 1);
        for particle in system.pool().iter_active() {
            assert!(particle.life < 1.0);
        }
    }

    #[test]
    fn color_is_fixed_at_spawn() {
        let mut render = params(10.0, BehaviorKind::Resting);
        let mut system = ParticleSystem::new(&config(10));
        system.update(100.0, &render, GestureTransform::IDENTITY);
        render.palette = vec![WeightedColor::new("#00FF00", 1.0).unwrap()];
        render.primary_color = Rgb::new(0.0, 1.0, 0.0);
        render.particle_rate = 0.0;
        system.update(16.0, &render, GestureTransform::IDENTITY);
        let view = &system.views()[0];
        assert!(view.color.approx_eq(Rgb::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn velocity_scaling_is_recomputed_not_compounded() {
        fn constant(particle: &mut Particle, _rng: &mut StdRng) -> BehaviorState {
            particle.velocity = Vec2::new(0.5, 0.0);
            BehaviorState::Empty
        }
        fn hold(_particle: &mut Particle, _frame: &BehaviorFrame<'_>, _dt: f32) {}

        let mut system = ParticleSystem::new(&EngineConfig {
            particle_lifetime_ms: 60_000.0,
            ..config(4)
        });
        system.behaviors_mut().register(
            BehaviorKind::Ambient,
            BehaviorRule {
                init: constant,
                update: hold,
            },
        );
        let mut render = params(10.0, BehaviorKind::Ambient);
        render.speed_multiplier = 1.1;
        system.update(100.0, &render, GestureTransform::IDENTITY);
        render.particle_rate = 0.0;
        for _ in 0..100 {
            system.update(16.0, &render, GestureTransform::IDENTITY);
        }
        let view = &system.views()[0];
        assert!((view.velocity.x - 0.55).abs() < 1e-5, "{}", view.velocity.x);
    }

    #[test]
    fn decorations_revert_by_token() {
        let render = params(50.0, BehaviorKind::Resting);
        let mut system = ParticleSystem::new(&config(20));
        system.update(100.0, &render, GestureTransform::IDENTITY);
        let flash = Decoration {
            glow_boost: 1.0,
            cell_shaded: false,
        };
        let touched = system.apply_decoration(1, flash);
        assert_eq!(touched, system.stats().active);
        assert!(system.views().iter().all(|v| v.glow_boost > 0.0));
        assert_eq!(system.revert_decoration(2), 0);
        assert_eq!(system.revert_decoration(1), touched);
        assert!(system.views().iter().all(|v| v.glow_boost == 0.0));
    }

    #[test]
    fn sampling_respects_weights() {
        let palette = vec![
            WeightedColor::new("#FF0000", 3.0).unwrap(),
            WeightedColor::new("#0000FF", 1.0).unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(99);
        let red = Rgb::from_hex("#FF0000").unwrap();
        let hits = (0..4_000)
            .filter_map(|_| sample_palette(&palette, &mut rng))
            .filter(|c| c.approx_eq(red))
            .count();
        let share = hits as f32 / 4_000.0;
        assert!((share - 0.75).abs() < 0.04, "red share {share}");
        assert!(sample_palette(&[], &mut rng).is_none());
    }

    #[test]
    fn clear_returns_everything() {
        let render = params(100.0, BehaviorKind::Burst);
        let mut system = ParticleSystem::new(&config(30));
        system.update(200.0, &render, GestureTransform::IDENTITY);
        assert!(system.stats().active > 0);
        system.clear();
        assert_eq!(system.stats().active, 0);
        assert_eq!(system.stats().free, 30);
        system.dispose();
        assert_eq!(system.stats().capacity, 0);
    }
}
