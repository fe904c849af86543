//! Many characters updated concurrently

#![cfg(feature = "parallel")]

mod common;

use bonework_anim::parallel::{DEFAULT_GRAIN_SIZE, PoseUpdate, update_all};
use bonework_anim::{
    Animation, BlendingJob, BlendingLayer, LocalToModelJob, Result, SamplingCache, SamplingJob,
    Skeleton,
};
use bonework_math::SoaTransform;
use common::{busy_animation, chain_skeleton};
use glam::Mat4;
use test_case::test_case;

const JOINTS: usize = 13;

/// A character owning its cache and pose buffers
struct Character<'a> {
    skeleton: &'a Skeleton,
    animation: &'a Animation,
    time: f32,
    cache: SamplingCache,
    locals: Vec<SoaTransform>,
    blended: Vec<SoaTransform>,
    models: Vec<Mat4>,
}

impl<'a> Character<'a> {
    fn new(skeleton: &'a Skeleton, animation: &'a Animation, index: usize) -> Self {
        Self {
            skeleton,
            animation,
            time: index as f32 * 0.071,
            cache: SamplingCache::new(skeleton.num_joints()),
            locals: vec![SoaTransform::IDENTITY; skeleton.num_soa_joints()],
            blended: vec![SoaTransform::IDENTITY; skeleton.num_soa_joints()],
            models: vec![Mat4::IDENTITY; skeleton.num_joints()],
        }
    }
}

impl PoseUpdate for Character<'_> {
    fn update_pose(&mut self) -> Result<()> {
        let duration = self.animation.duration();
        self.time = (self.time + 0.1) % duration;
        SamplingJob::new(
            self.animation,
            &mut self.cache,
            self.time / duration,
            &mut self.locals,
        )
        .run()?;
        let layers = [BlendingLayer::new(&self.locals, 1.0)];
        BlendingJob::new(&layers, self.skeleton.bind_pose(), &mut self.blended).run()?;
        LocalToModelJob::new(self.skeleton, &self.blended, &mut self.models).run()
    }
}

#[test_case(1)]
#[test_case(5)]
#[test_case(DEFAULT_GRAIN_SIZE)]
fn test_parallel_matches_sequential(grain_size: usize) {
    let _ = env_logger::builder().is_test(true).try_init();

    let skeleton = chain_skeleton(JOINTS);
    let animation = busy_animation(JOINTS);
    let mut parallel: Vec<_> = (0..300)
        .map(|i| Character::new(&skeleton, &animation, i))
        .collect();
    let mut sequential: Vec<_> = (0..300)
        .map(|i| Character::new(&skeleton, &animation, i))
        .collect();

    for _ in 0..3 {
        assert_eq!(update_all(&mut parallel, grain_size), 0);
        for character in &mut sequential {
            character.update_pose().unwrap();
        }
    }

    for (a, b) in parallel.iter().zip(&sequential) {
        assert_eq!(a.models, b.models);
    }
}

#[test]
fn test_failing_characters_are_counted() {
    let skeleton = chain_skeleton(JOINTS);
    let animation = busy_animation(JOINTS);
    let mut characters: Vec<_> = (0..40)
        .map(|i| Character::new(&skeleton, &animation, i))
        .collect();
    // Too small to hold the pose
    for character in characters.iter_mut().step_by(4) {
        character.models.truncate(2);
    }

    assert_eq!(update_all(&mut characters, 3), 10);
    assert!(characters[1].models.iter().any(|m| *m != Mat4::IDENTITY));
}
