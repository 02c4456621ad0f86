use super::*;
use crate::effect::mock_backend::{
    sub_mesh, AggregatorStats, BackendProfile, MockEffectBackend, MockRenderObject,
};
use crate::effect::{Effect, LightNode};
use crate::error::Error;
use crate::renderer::mock_renderer::{MockRenderer, MockShaderProgram};
use crate::renderer::{EffectId, EffectType, MaterialHandle, PassHint, RenderStateInfo};
use crate::effect::effect_state::{EffectState, FrameTargets, FrameTargetId};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helpers
// ============================================================================

fn materials() -> Vec<MaterialHandle> {
    vec![
        MaterialHandle::new("static_shadow"),
        MaterialHandle::new("static"),
        MaterialHandle::new("dynamic_shadow"),
        MaterialHandle::new("dynamic"),
        MaterialHandle::new("static_alpha"),
        MaterialHandle::new("dynamic_alpha"),
    ]
}

struct Fixture {
    renderer: Arc<Mutex<MockRenderer>>,
    stats: Arc<Mutex<Buckets<Arc<Mutex<AggregatorStats>>>>>,
    setup_slots: Arc<Mutex<Vec<ShaderSlot>>>,
    camera_updates: Arc<std::sync::atomic::AtomicUsize>,
    gpu_waits: Arc<std::sync::atomic::AtomicUsize>,
    effect: BatchDrawEffect,
}

impl Fixture {
    fn new(profile: BackendProfile) -> Self {
        Self::with_backend(MockEffectBackend::new(profile))
    }

    fn with_backend(backend: MockEffectBackend) -> Self {
        let renderer = Arc::new(Mutex::new(MockRenderer::new()));
        let stats = backend.aggregator_stats.clone();
        let setup_slots = backend.setup_slots.clone();
        let camera_updates = backend.camera_updates.clone();
        let gpu_waits = backend.gpu_waits.clone();

        let renderer_dyn: Arc<Mutex<dyn Renderer>> = renderer.clone();
        let effect = BatchDrawEffect::new(EffectDesc {
            renderer: renderer_dyn,
            backend: Box::new(backend),
            id: EffectId(1),
            effect_type: EffectType(7),
            materials: materials(),
        })
        .unwrap();

        Self {
            renderer,
            stats,
            setup_slots,
            camera_updates,
            gpu_waits,
            effect,
        }
    }

    fn stats_for(&self, bucket: BucketKind) -> Arc<Mutex<AggregatorStats>> {
        self.stats.lock().unwrap().get(bucket).clone()
    }

    fn submissions(&self, bucket: BucketKind) -> usize {
        self.stats_for(bucket).lock().unwrap().submissions
    }

    fn commits(&self, bucket: BucketKind) -> usize {
        self.stats_for(bucket).lock().unwrap().commits
    }

    fn first_adds(&self, bucket: BucketKind) -> usize {
        self.stats_for(bucket).lock().unwrap().first_adds
    }
}

fn mixed_object() -> Arc<dyn RenderObject> {
    // one opaque+static and one alpha+dynamic sub-mesh
    Arc::new(MockRenderObject::new(vec![
        sub_mesh(1, false, false, 10),
        sub_mesh(2, true, true, 20),
    ]))
}

fn explicit_state() -> EffectState {
    EffectState::with_frame_targets(FrameTargets {
        depth_only: vec![FrameTargetId(1)],
        g_buffer: vec![FrameTargetId(2)],
        default_targets: vec![FrameTargetId(3)],
        final_target: Some(FrameTargetId(4)),
    })
}

// ============================================================================
// Construction and init
// ============================================================================

#[test]
fn test_new_rejects_wrong_material_count() {
    let renderer: Arc<Mutex<dyn Renderer>> = Arc::new(Mutex::new(MockRenderer::new()));
    let result = BatchDrawEffect::new(EffectDesc {
        renderer,
        backend: Box::new(MockEffectBackend::new(BackendProfile::Immediate)),
        id: EffectId(1),
        effect_type: EffectType(0),
        materials: materials()[..5].to_vec(),
    });
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_init_succeeds_with_six_materials_and_two_passes() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    assert!(fixture.effect.init().is_ok());
    assert_eq!(fixture.effect.num_passes(), 2);
}

#[test]
fn test_init_is_idempotent() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    fixture.effect.init().unwrap();

    // aggregators were not recreated: collecting still works and the
    // existing ones received the records
    assert!(fixture.effect.collect(Some(&mixed_object())));
    assert_eq!(fixture.effect.pending_count(BucketKind::StaticOpaque), 1);
}

#[test]
fn test_immediate_backend_keeps_separate_packs() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    let packs = fixture.effect.texture_pack_set().unwrap();
    assert!(!Arc::ptr_eq(&packs.opaque, &packs.alpha));
}

#[test]
fn test_explicit_backend_shares_one_pack() {
    let mut fixture = Fixture::new(BackendProfile::Explicit);
    fixture.effect.init().unwrap();

    let packs = fixture.effect.texture_pack_set().unwrap();
    assert!(Arc::ptr_eq(&packs.opaque, &packs.alpha));
}

#[test]
fn test_init_failure_leaves_effect_refusing_operations() {
    let mut backend = MockEffectBackend::new(BackendProfile::Immediate);
    backend.fail_bucket = Some(BucketKind::DynamicOpaque);
    let mut fixture = Fixture::with_backend(backend);

    assert!(matches!(
        fixture.effect.init(),
        Err(Error::InitializationFailed(_))
    ));

    // subsequent operations refuse and propagate failure
    assert!(!fixture.effect.collect(Some(&mixed_object())));
    assert!(fixture.effect.post_scene_graph().is_err());
}

// ============================================================================
// Collect
// ============================================================================

#[test]
fn test_collect_null_object_returns_false_without_side_effects() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    assert!(!fixture.effect.collect(None));

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.effect.pending_count(bucket), 0);
    }
    assert!(!fixture.effect.is_draw_active());
    assert!(fixture.renderer.lock().unwrap().registered_effects().is_empty());
}

#[test]
fn test_collect_disperses_mixed_object_into_two_buckets() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    assert!(fixture.effect.collect(Some(&mixed_object())));

    assert_eq!(fixture.effect.pending_count(BucketKind::StaticOpaque), 1);
    assert_eq!(fixture.effect.pending_count(BucketKind::DynamicAlpha), 1);
    assert_eq!(fixture.effect.pending_count(BucketKind::StaticAlpha), 0);
    assert_eq!(fixture.effect.pending_count(BucketKind::DynamicOpaque), 0);
}

#[test]
fn test_collect_registers_effect_and_activates_draw() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    fixture.effect.collect(Some(&mixed_object()));

    assert!(fixture.effect.is_draw_active());
    assert_eq!(
        fixture.renderer.lock().unwrap().registered_effects(),
        vec![EffectId(1)]
    );
}

#[test]
fn test_collect_returns_true_for_zero_entry_object() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    let empty: Arc<dyn RenderObject> = Arc::new(MockRenderObject::new(Vec::new()));
    assert!(fixture.effect.collect(Some(&empty)));

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.effect.pending_count(bucket), 0);
    }
}

#[test]
fn test_classification_runs_at_most_once_per_object() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    let object = Arc::new(MockRenderObject::new(vec![sub_mesh(1, false, false, 1)]));
    let as_trait: Arc<dyn RenderObject> = object.clone();

    // twice in the same frame
    fixture.effect.collect(Some(&as_trait));
    fixture.effect.collect(Some(&as_trait));
    assert_eq!(object.classifications(), 1);

    // and again next frame: the memoized package is reused
    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.clear_for_next_frame();
    fixture.effect.collect(Some(&as_trait));
    assert_eq!(object.classifications(), 1);

    // records were still dispersed each time
    assert_eq!(fixture.effect.pending_count(BucketKind::StaticOpaque), 1);
}

#[test]
fn test_collect_list_applies_sequentially() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    let objects: Vec<Arc<dyn RenderObject>> = vec![mixed_object(), mixed_object()];
    assert!(fixture.effect.collect_list(&objects));
    assert_eq!(fixture.effect.pending_count(BucketKind::StaticOpaque), 2);
}

#[test]
fn test_collect_list_short_circuits_on_failure() {
    // uninitialized effect: every collect fails, so the list fails fast
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    let objects: Vec<Arc<dyn RenderObject>> = vec![mixed_object()];
    assert!(!fixture.effect.collect_list(&objects));
}

#[test]
fn test_collect_light_always_declines() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    assert!(!fixture.effect.collect_light(&LightNode(1)));
}

// ============================================================================
// PostSceneGraph / commit
// ============================================================================

#[test]
fn test_commit_happens_exactly_once_per_frame() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.collect(Some(&mixed_object()));

    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.post_scene_graph().unwrap();

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.commits(bucket), 1, "bucket {:?}", bucket);
    }

    // next frame commits again, exactly once
    fixture.effect.clear_for_next_frame();
    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.post_scene_graph().unwrap();

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.commits(bucket), 2, "bucket {:?}", bucket);
    }
}

#[test]
fn test_mixed_object_commits_one_record_in_each_matching_bucket() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.post_scene_graph().unwrap();

    assert_eq!(fixture.effect.committed_count(BucketKind::StaticOpaque), 1);
    assert_eq!(fixture.effect.committed_count(BucketKind::DynamicAlpha), 1);
    assert_eq!(fixture.effect.committed_count(BucketKind::StaticAlpha), 0);
    assert_eq!(fixture.effect.committed_count(BucketKind::DynamicOpaque), 0);
}

#[test]
fn test_first_add_invariant_per_aggregator_per_frame() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    // several objects, many adds, one first per aggregator
    for _ in 0..5 {
        fixture.effect.collect(Some(&mixed_object()));
    }
    fixture.effect.post_scene_graph().unwrap();

    assert_eq!(fixture.first_adds(BucketKind::StaticOpaque), 1);
    assert_eq!(fixture.first_adds(BucketKind::DynamicAlpha), 1);
    assert_eq!(fixture.stats_for(BucketKind::StaticOpaque).lock().unwrap().adds, 5);

    // next frame: exactly one more first add
    fixture.effect.clear_for_next_frame();
    for _ in 0..3 {
        fixture.effect.collect(Some(&mixed_object()));
    }
    fixture.effect.post_scene_graph().unwrap();

    assert_eq!(fixture.first_adds(BucketKind::StaticOpaque), 2);
    assert_eq!(fixture.first_adds(BucketKind::DynamicAlpha), 2);
}

#[test]
fn test_clear_then_commit_without_collect_is_empty_and_ok() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    // prior frame with content
    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.post_scene_graph().unwrap();

    // round-trip: clear immediately followed by commit
    fixture.effect.clear_for_next_frame();
    assert!(fixture.effect.post_scene_graph().is_ok());

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.effect.committed_count(bucket), 0, "bucket {:?}", bucket);
    }
}

// ============================================================================
// PrePass and shader resolution
// ============================================================================

#[test]
fn test_pre_pass_resolves_all_six_slots_once() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));

    let state = EffectState::new();
    fixture.effect.pre_pass(0, &state).unwrap();
    fixture.effect.pre_pass(1, &state).unwrap();

    let resolved = fixture.renderer.lock().unwrap().resolved_materials();
    assert_eq!(
        resolved,
        vec![
            "static_shadow",
            "static",
            "dynamic_shadow",
            "dynamic",
            "static_alpha",
            "dynamic_alpha",
        ]
    );

    let slots = fixture.setup_slots.lock().unwrap();
    assert_eq!(slots.len(), 6);
}

#[test]
fn test_pre_pass_is_noop_while_draw_inactive() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    fixture.effect.pre_pass(0, &EffectState::new()).unwrap();
    assert!(fixture.renderer.lock().unwrap().resolved_materials().is_empty());
}

#[test]
fn test_pre_pass_unresolvable_material_is_fatal_configuration_error() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.renderer.lock().unwrap().fail_material("dynamic_shadow");
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));

    let result = fixture.effect.pre_pass(0, &EffectState::new());
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_pre_pass_rejects_out_of_range_pass() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));

    let result = fixture.effect.pre_pass(2, &EffectState::new());
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_explicit_backend_requires_frame_targets() {
    let mut fixture = Fixture::new(BackendProfile::Explicit);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));

    // missing targets: fatal configuration error
    let result = fixture.effect.pre_pass(0, &EffectState::new());
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_explicit_backend_sets_up_with_frame_targets() {
    let mut fixture = Fixture::new(BackendProfile::Explicit);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));

    fixture.effect.pre_pass(0, &explicit_state()).unwrap();
    assert_eq!(fixture.setup_slots.lock().unwrap().len(), 6);
}

// ============================================================================
// Draw
// ============================================================================

/// Run a full frame up to the draw phase on the static pass.
fn frame_to_draw(fixture: &mut Fixture, state: &EffectState) {
    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.pre_pass(0, state).unwrap();
}

#[test]
fn test_draw_inactive_effect_is_noop() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();

    let info = RenderStateInfo::new(PassHint::Opaque);
    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &EffectState::new())
        .unwrap();

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.submissions(bucket), 0);
    }
}

#[test]
fn test_draw_post_process_is_noop_for_both_backends() {
    for profile in [BackendProfile::Immediate, BackendProfile::Explicit] {
        let mut fixture = Fixture::new(profile);
        fixture.effect.init().unwrap();
        let state = match profile {
            BackendProfile::Immediate => EffectState::new(),
            BackendProfile::Explicit => explicit_state(),
        };
        frame_to_draw(&mut fixture, &state);

        let info = RenderStateInfo::new(PassHint::PostProcess);
        fixture
            .effect
            .draw(&CameraDrawInfo::default(), &info, &state)
            .unwrap();

        for bucket in BucketKind::ALL {
            assert_eq!(fixture.submissions(bucket), 0, "profile {:?}", profile);
        }
    }
}

#[test]
fn test_immediate_backend_skips_translucent_and_skybox() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    let state = EffectState::new();
    frame_to_draw(&mut fixture, &state);

    for hint in [PassHint::Translucent, PassHint::Skybox] {
        let info = RenderStateInfo::new(hint);
        fixture
            .effect
            .draw(&CameraDrawInfo::default(), &info, &state)
            .unwrap();
    }

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.submissions(bucket), 0);
    }
}

#[test]
fn test_opaque_draw_submits_static_bucket_on_pass_zero() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    let state = EffectState::new();
    frame_to_draw(&mut fixture, &state);

    let info = RenderStateInfo::new(PassHint::Opaque);
    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &state)
        .unwrap();

    assert_eq!(fixture.submissions(BucketKind::StaticOpaque), 1);
    assert_eq!(fixture.submissions(BucketKind::DynamicAlpha), 0);
    assert_eq!(fixture.camera_updates.load(Ordering::SeqCst), 1);

    // the static opaque shader (second material, id 2) became active
    assert_eq!(fixture.renderer.lock().unwrap().activated_shader_ids(), vec![2]);
}

#[test]
fn test_shadow_draw_uses_shadow_slot() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    let state = EffectState::new();
    frame_to_draw(&mut fixture, &state);

    let info = RenderStateInfo::new(PassHint::Shadows);
    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &state)
        .unwrap();

    // static shadow program is the first resolved material (id 1)
    assert_eq!(fixture.renderer.lock().unwrap().activated_shader_ids(), vec![1]);
    // shadows render the opaque bucket of the pass
    assert_eq!(fixture.submissions(BucketKind::StaticOpaque), 1);
}

#[test]
fn test_explicit_backend_renders_alpha_bucket_on_translucent() {
    let mut fixture = Fixture::new(BackendProfile::Explicit);
    fixture.effect.init().unwrap();
    let state = explicit_state();

    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.pre_pass(1, &state).unwrap(); // dynamic pass

    let info = RenderStateInfo::new(PassHint::Translucent);
    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &state)
        .unwrap();

    assert_eq!(fixture.submissions(BucketKind::DynamicAlpha), 1);
    // dynamic alpha program is the sixth resolved material (id 6)
    assert_eq!(fixture.renderer.lock().unwrap().activated_shader_ids(), vec![6]);
}

#[test]
fn test_empty_bucket_draw_makes_no_submission() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    let state = EffectState::new();

    // zero-entry object keeps draw active but contributes no records
    let empty: Arc<dyn RenderObject> = Arc::new(MockRenderObject::new(Vec::new()));
    fixture.effect.collect(Some(&empty));
    fixture.effect.post_scene_graph().unwrap();
    fixture.effect.pre_pass(0, &state).unwrap();

    let info = RenderStateInfo::new(PassHint::Opaque);
    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &state)
        .unwrap();

    let stats = fixture.stats_for(BucketKind::StaticOpaque);
    let stats = stats.lock().unwrap();
    assert_eq!(stats.renders, 1);
    assert_eq!(stats.submissions, 0);
}

#[test]
fn test_caller_shader_override_takes_precedence() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    let state = EffectState::new();
    frame_to_draw(&mut fixture, &state);

    let mut info = RenderStateInfo::new(PassHint::Opaque);
    info.set_shader_override(Arc::new(MockShaderProgram::new(777, "chained")));

    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &state)
        .unwrap();

    assert_eq!(
        fixture.renderer.lock().unwrap().activated_shader_ids(),
        vec![777]
    );
}

#[test]
fn test_draw_before_any_pre_pass_is_noop() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.post_scene_graph().unwrap();

    let info = RenderStateInfo::new(PassHint::Opaque);
    fixture
        .effect
        .draw(&CameraDrawInfo::default(), &info, &EffectState::new())
        .unwrap();

    for bucket in BucketKind::ALL {
        assert_eq!(fixture.submissions(bucket), 0);
    }
}

// ============================================================================
// PostPass sequencing
// ============================================================================

#[test]
fn test_post_pass_true_while_inactive() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    assert!(fixture.effect.post_pass(&EffectState::new()));
}

#[test]
fn test_post_pass_false_before_any_pre_pass() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));

    assert!(!fixture.effect.post_pass(&EffectState::new()));
}

#[test]
fn test_post_pass_true_after_pre_pass() {
    let mut fixture = Fixture::new(BackendProfile::Immediate);
    fixture.effect.init().unwrap();
    fixture.effect.collect(Some(&mixed_object()));
    fixture.effect.pre_pass(0, &EffectState::new()).unwrap();

    assert!(fixture.effect.post_pass(&EffectState::new()));
}

// ============================================================================
// Free
// ============================================================================

#[test]
fn test_free_waits_for_gpu_and_shuts_down_aggregators() {
    let mut fixture = Fixture::new(BackendProfile::Explicit);
    fixture.effect.init().unwrap();

    fixture.effect.free().unwrap();

    assert_eq!(fixture.gpu_waits.load(Ordering::SeqCst), 1);
    for bucket in BucketKind::ALL {
        assert_eq!(
            fixture.stats_for(bucket).lock().unwrap().shutdowns,
            1,
            "bucket {:?}",
            bucket
        );
    }

    // effect refuses further work until re-initialized
    assert!(!fixture.effect.collect(Some(&mixed_object())));
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_id_and_effect_type() {
    let fixture = Fixture::new(BackendProfile::Immediate);
    assert_eq!(fixture.effect.id(), EffectId(1));
    assert_eq!(fixture.effect.effect_type(), EffectType(7));
}
