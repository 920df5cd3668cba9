use {
    cfd_render::{
        mock::{Ledger, LedgerEntry, MockPlatform, Resource},
        prelude::*,
    },
    std::path::PathBuf,
};

// SPIR-V magic number followed by one word
const VERT: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
const FRAG: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x02, 0x00];

const ALL: [Resource; 6] = [
    Resource::Window,
    Resource::Device,
    Resource::RenderTarget,
    Resource::PipelineLayout,
    Resource::ShaderModule,
    Resource::GraphicPipeline,
];

fn platform(ledger: &Ledger, vert: &[u8], frag: &[u8]) -> MockPlatform {
    let shaders = AppConfig::default().shaders;

    MockPlatform::new(ledger.clone())
        .with_shader(shaders.vertex, vert)
        .with_shader(shaders.fragment, frag)
}

fn assert_nothing_live(ledger: &Ledger) {
    for resource in ALL {
        assert_eq!(ledger.live(resource), 0, "{resource:?}");
    }
}

fn assert_released_in_reverse(ledger: &Ledger) {
    let mut created = ledger.created_order();
    created.reverse();

    assert_eq!(ledger.destroyed(), created);

    for (resource, raw) in created {
        assert_eq!(ledger.destroy_count(resource, raw), 1, "{resource:?} {raw}");
    }
}

fn destroyed_kinds(ledger: &Ledger) -> Vec<Resource> {
    ledger
        .destroyed()
        .into_iter()
        .map(|(resource, _)| resource)
        .collect()
}

fn driver_error(err: AppError) -> DriverError {
    match err {
        AppError::Driver(err) => err,
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
pub fn initialize_creates_pipeline() {
    let _ = pretty_env_logger::try_init();

    let ledger = Ledger::default();
    let mut app = App::new(platform(&ledger, &VERT, &FRAG), AppConfig::default());

    app.initialize().unwrap();

    assert_eq!(app.state(), AppState::Initialized);
    assert_eq!(ledger.live(Resource::GraphicPipeline), 1);
    assert_eq!(ledger.live(Resource::ShaderModule), 2);
    assert_eq!(ledger.live(Resource::PipelineLayout), 1);

    drop(app);

    assert_nothing_live(&ledger);
}

#[test]
pub fn empty_fragment_shader_fails_without_leaks() {
    let _ = pretty_env_logger::try_init();

    let ledger = Ledger::default();
    let mut app = App::new(platform(&ledger, &VERT, &[]), AppConfig::default());

    let err = app.run().unwrap_err();

    assert_eq!(driver_error(err), DriverError::InvalidShaderCode { len: 0 });
    assert_eq!(app.state(), AppState::Terminated);
    assert_eq!(ledger.created(Resource::GraphicPipeline), 0);
    assert_eq!(ledger.draws(), 0);
    assert_nothing_live(&ledger);
}

#[test]
pub fn close_before_first_frame_releases_in_reverse() {
    let _ = pretty_env_logger::try_init();

    let ledger = Ledger::default();
    let platform = platform(&ledger, &VERT, &FRAG).close_after_polls(0);
    let mut app = App::new(platform, AppConfig::default());

    app.run().unwrap();

    assert_eq!(app.frame_count(), 0);
    assert_eq!(ledger.draws(), 0);
    assert_released_in_reverse(&ledger);
    assert_eq!(
        destroyed_kinds(&ledger),
        [
            Resource::GraphicPipeline,
            Resource::ShaderModule,
            Resource::ShaderModule,
            Resource::PipelineLayout,
            Resource::RenderTarget,
            Resource::Device,
            Resource::Window,
        ]
    );
}

#[test]
pub fn every_object_destroyed_once() {
    let ledger = Ledger::default();
    let platform = platform(&ledger, &VERT, &FRAG).close_after_polls(3);
    let mut app = App::new(platform, AppConfig::default());

    app.run().unwrap();
    app.teardown();
    drop(app);

    for (resource, raw) in ledger.created_order() {
        assert_eq!(ledger.destroy_count(resource, raw), 1, "{resource:?} {raw}");
    }

    let entries = ledger.entries();
    let wait_idle = entries
        .iter()
        .filter(|entry| **entry == LedgerEntry::WaitIdle)
        .count();

    assert_eq!(wait_idle, 1);
}

#[test]
pub fn draw_failure_unwinds() {
    let _ = pretty_env_logger::try_init();

    let ledger = Ledger::default();
    let platform = platform(&ledger, &VERT, &FRAG)
        .close_after_polls(10)
        .fail_draw_after(2, DriverError::OutOfMemory);
    let mut app = App::new(platform, AppConfig::default());

    let err = app.run().unwrap_err();

    assert_eq!(driver_error(err), DriverError::OutOfMemory);
    assert_eq!(app.state(), AppState::Terminated);
    assert_eq!(app.frame_count(), 2);
    assert_eq!(ledger.draws(), 2);
    assert_released_in_reverse(&ledger);
    assert_nothing_live(&ledger);

    // The device drains before anything is released
    let entries = ledger.entries();
    let wait_idle = entries
        .iter()
        .position(|entry| *entry == LedgerEntry::WaitIdle)
        .unwrap();
    let first_destroy = entries
        .iter()
        .position(|entry| matches!(entry, LedgerEntry::Destroy(..)))
        .unwrap();

    assert!(wait_idle < first_destroy);
}

#[test]
pub fn pipeline_failure_unwinds() {
    let ledger = Ledger::default();
    let err = vk::Result::ERROR_UNKNOWN;
    let platform = platform(&ledger, &VERT, &FRAG).fail_graphic_pipelines(err);
    let mut app = App::new(platform, AppConfig::default());

    let err = app.run().unwrap_err();
    let expected = DriverError::GraphicPipelineCreation(vk::Result::ERROR_UNKNOWN);

    assert_eq!(driver_error(err), expected);
    assert_eq!(ledger.created(Resource::ShaderModule), 2);
    assert_nothing_live(&ledger);
}

#[test]
pub fn pipeline_layout_failure_unwinds() {
    let ledger = Ledger::default();
    let err = vk::Result::ERROR_OUT_OF_HOST_MEMORY;
    let platform = platform(&ledger, &VERT, &FRAG).fail_pipeline_layouts(err);
    let mut app = App::new(platform, AppConfig::default());

    let err = app.initialize().unwrap_err();

    assert_eq!(
        driver_error(err),
        DriverError::PipelineLayoutCreation(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
    );
    assert_eq!(ledger.created(Resource::ShaderModule), 0);
    assert_nothing_live(&ledger);
}

#[test]
pub fn render_target_failure_unwinds() {
    let ledger = Ledger::default();
    let platform = platform(&ledger, &VERT, &FRAG).fail_render_target(DriverError::Unsupported);
    let mut app = App::new(platform, AppConfig::default());

    let err = app.run().unwrap_err();

    assert_eq!(driver_error(err), DriverError::Unsupported);
    assert_eq!(
        destroyed_kinds(&ledger),
        [Resource::Device, Resource::Window]
    );
    assert_nothing_live(&ledger);
}

#[test]
pub fn missing_shader_binary() {
    let ledger = Ledger::default();
    let mut config = AppConfig::default();
    config.shaders.vertex = PathBuf::from("missing.vert.spv");

    let mut app = App::new(platform(&ledger, &VERT, &FRAG), config);

    match app.run().unwrap_err() {
        AppError::ShaderBinaryRead { path, .. } => {
            assert_eq!(path, PathBuf::from("missing.vert.spv"))
        }
        err => panic!("unexpected error: {err}"),
    }

    assert_eq!(ledger.created(Resource::ShaderModule), 0);
    assert_nothing_live(&ledger);
}

#[test]
pub fn pipeline_draws_each_frame() {
    let ledger = Ledger::default();
    let platform = platform(&ledger, &VERT, &FRAG).close_after_polls(6);
    let mut app = App::new(platform, AppConfig::default());

    app.run().unwrap();

    assert_eq!(app.frame_count(), 5);
    assert_eq!(ledger.draws(), 5);
}
