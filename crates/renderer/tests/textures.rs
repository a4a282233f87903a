use anyhow::bail;
use renderer::RenderHandle as _;
use renderer::recording::{BackendCall, RecordingBackend};
use renderer::{
    CallbackTextureInterface, CallbackTextureSource, ColourbPremultiplied, Mesh, Rectanglei,
    RenderConfig, RenderManager, Texture, TextureHandle, Vector2f, Vector2i,
};
use std::cell::Cell;
use std::rc::Rc;

fn quiet() -> RenderConfig {
    RenderConfig::new(false, true, 30)
}

fn quad() -> Mesh {
    Mesh::quad(
        Vector2f::ZERO,
        Vector2f::new(8.0, 8.0),
        ColourbPremultiplied::WHITE,
        Vector2f::ZERO,
        Vector2f::new(1.0, 1.0),
    )
}

fn single_pixel(interface: &mut CallbackTextureInterface<'_>) -> anyhow::Result<()> {
    interface.generate_texture(&[0; 4], Vector2i::new(1, 1))
}

fn rendered_textures(calls: &[BackendCall]) -> Vec<TextureHandle> {
    calls
        .iter()
        .filter_map(|call| match call {
            BackendCall::RenderGeometry { texture, .. } => Some(*texture),
            _ => None,
        })
        .collect()
}

#[test]
fn same_path_shares_one_backend_texture() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let first = manager.load_texture("a.png", "docs/x.rml");
    let second = manager.load_texture("a.png", "docs/x.rml");
    assert_eq!(first, second);
    assert_eq!(log.count("load_texture"), 0);

    let geometry = manager.make_geometry(quad());
    geometry.render(Vector2f::ZERO, &first);
    assert_eq!(first.dimensions(), Vector2i::new(512, 256));
    assert_eq!(second.dimensions(), Vector2i::new(512, 256));
    assert_eq!(log.count("load_texture"), 1);
    assert_eq!(manager.texture_source_list(), vec!["docs/a.png".to_owned()]);

    let other = manager.load_texture("../a.png", "docs/nested/y.rml");
    assert_eq!(other, first);
    assert_eq!(manager.texture_source_list().len(), 1);
}

#[test]
fn missing_file_texture_draws_untextured() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new().with_failing_source("docs/missing.png");
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let texture = manager.load_texture("missing.png", "docs/x.rml");
    assert!(!texture.is_empty());
    assert!(!texture.is_valid());
    assert_eq!(texture.dimensions(), Vector2i::ZERO);

    let geometry = manager.make_geometry(quad());
    geometry.render(Vector2f::ZERO, &texture);
    assert_eq!(rendered_textures(&log.calls()), vec![TextureHandle::INVALID]);
    assert_eq!(log.count("load_texture"), 1);
}

#[test]
fn released_file_texture_reloads_on_use() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let texture = manager.load_texture("a.png", "x.rml");
    assert!(!manager.release_texture("a.png"));
    assert!(texture.is_valid());
    assert!(manager.release_texture("a.png"));
    assert!(!manager.release_texture("never-loaded.png"));
    assert_eq!(log.outstanding().textures, 0);

    assert!(texture.is_valid());
    assert_eq!(log.count("load_texture"), 2);
    assert_eq!(manager.statistics().loaded_file_textures, 1);
}

#[test]
fn failed_callback_texture_is_empty() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let callback_texture = manager.make_callback_texture(move |_| {
        counter.set(counter.get() + 1);
        bail!("no content available")
    });
    let texture = callback_texture.texture();
    assert!(!texture.is_valid());

    let geometry = manager.make_geometry(quad());
    geometry.render(Vector2f::ZERO, &texture);
    assert_eq!(rendered_textures(&log.calls()), vec![TextureHandle::INVALID]);
    assert_eq!(log.count("generate_texture"), 0);
    assert_eq!(runs.get(), 1);
}

#[test]
fn callback_that_produces_nothing_is_empty() {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = RenderManager::new(RecordingBackend::new());
    let callback_texture = manager.make_callback_texture(|_| Ok(()));
    assert!(!Texture::from(&callback_texture).is_valid());
}

#[test]
fn callback_texture_regenerates_after_release_all() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let callback_texture = manager.make_callback_texture(move |interface| {
        counter.set(counter.get() + 1);
        interface.generate_texture(&[255; 16], Vector2i::new(2, 2))
    });
    let texture = callback_texture.texture();
    assert_eq!(texture.dimensions(), Vector2i::new(2, 2));
    assert!(texture.is_valid());
    assert_eq!(runs.get(), 1);

    manager.release_all_textures();
    assert_eq!(log.outstanding().textures, 0);
    assert_eq!(runs.get(), 1);

    assert!(texture.is_valid());
    assert_eq!(runs.get(), 2);
    assert_eq!(log.count("generate_texture"), 2);

    drop(callback_texture);
    assert_eq!(log.outstanding().textures, 0);
    assert!(!texture.is_valid());
}

#[test]
fn identical_callbacks_get_distinct_slots() {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = RenderManager::new(RecordingBackend::new());
    let first = manager.make_callback_texture(single_pixel);
    let second = manager.make_callback_texture(single_pixel);
    assert_ne!(first.texture(), second.texture());

    let geometry = manager.make_geometry(quad());
    geometry.render(Vector2f::ZERO, &first.texture());
    geometry.render(Vector2f::ZERO, &second.texture());
    assert_eq!(manager.statistics().callback_textures, 2);
}

#[test]
fn released_callback_slot_is_not_aliased() {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = RenderManager::new(RecordingBackend::new());

    let mut first_owner = manager.make_callback_texture(|interface| {
        interface.generate_texture(&[0; 4], Vector2i::new(1, 1))
    });
    let stale_view = first_owner.texture();
    first_owner.release();
    assert!(!first_owner.is_valid());
    assert!(first_owner.texture().is_empty());

    let replacement = manager.make_callback_texture(|interface| {
        interface.generate_texture(&[0; 16], Vector2i::new(2, 2))
    });
    assert!(replacement.texture().is_valid());
    assert!(!stale_view.is_valid());
    assert_eq!(stale_view.dimensions(), Vector2i::ZERO);
}

#[test]
fn pixel_buffer_must_match_dimensions() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let callback_texture = manager.make_callback_texture(|interface| {
        interface.generate_texture(&[0; 15], Vector2i::new(2, 2))
    });
    assert!(!callback_texture.texture().is_valid());
    assert_eq!(log.count("generate_texture"), 0);
}

#[test]
fn refused_generation_leaves_texture_empty() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new().refusing_generated_textures();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let callback_texture = manager.make_callback_texture(|interface| {
        interface.generate_texture(&[0; 4], Vector2i::new(1, 1))
    });
    assert!(!callback_texture.texture().is_valid());
    assert_eq!(log.count("generate_texture"), 1);
    assert_eq!(log.outstanding().textures, 0);
}

#[test]
fn layer_capture_requires_scissor() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);
    manager.prepare_render(Vector2i::new(200, 200));

    let unscissored = manager.make_callback_texture(|interface| interface.save_layer_as_texture());
    assert!(!unscissored.texture().is_valid());
    assert_eq!(log.count("save_layer_as_texture"), 0);

    let scissored = manager.make_callback_texture(|interface| interface.save_layer_as_texture());
    let texture = scissored.texture();
    manager.set_scissor_region(Rectanglei::from_position_size(
        Vector2i::new(10, 10),
        Vector2i::new(30, 20),
    ));
    assert_eq!(texture.dimensions(), Vector2i::new(30, 20));
    assert_eq!(log.count("save_layer_as_texture"), 1);
    manager.reset_state();
}

#[test]
fn callback_may_render_through_the_manager() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);
    manager.prepare_render(Vector2i::new(64, 64));

    let callback_texture = manager.make_callback_texture(|interface| {
        let manager = interface.render_manager();
        let geometry = manager.make_geometry(quad());
        let previous = manager.state();
        manager.set_scissor_region(Rectanglei::from_size(Vector2i::new(8, 8)));
        manager.push_layer();
        geometry.render(Vector2f::ZERO, &Texture::default());
        let result = interface.save_layer_as_texture();
        manager.pop_layer();
        manager.set_state(&previous);
        result
    });

    let texture = callback_texture.texture();
    assert_eq!(texture.dimensions(), Vector2i::new(8, 8));
    assert_eq!(log.count("render_geometry"), 1);
    assert_eq!(log.count("release_geometry"), 1);
    assert_eq!(manager.statistics().geometry, 0);
    assert_eq!(manager.statistics().usage_errors, 0);
}

#[test]
fn source_materializes_once_per_manager() {
    let _ = env_logger::builder().is_test(true).try_init();
    let first_backend = RecordingBackend::new();
    let first_log = first_backend.log();
    let second_backend = RecordingBackend::new();
    let second_log = second_backend.log();
    let first = RenderManager::new(first_backend);
    let second = RenderManager::new(second_backend);

    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let mut source = CallbackTextureSource::new(move |interface| {
        counter.set(counter.get() + 1);
        interface.generate_texture(&[9; 4], Vector2i::new(1, 1))
    });

    let on_first = source.texture(&first);
    let again_on_first = source.texture(&first);
    let on_second = source.texture(&second);
    assert_eq!(on_first, again_on_first);
    assert_ne!(on_first, on_second);
    assert!(on_first.belongs_to(&first));
    assert!(on_second.belongs_to(&second));
    assert_eq!(source.len(), 2);

    assert!(on_first.is_valid());
    assert!(on_second.is_valid());
    assert_eq!(runs.get(), 2);
    assert_eq!(first_log.count("generate_texture"), 1);
    assert_eq!(second_log.count("generate_texture"), 1);

    assert!(source.release_for(&first));
    assert!(!source.release_for(&first));
    assert_eq!(first_log.outstanding().textures, 0);
    assert_eq!(first.statistics().callback_textures, 0);

    source.clear();
    assert!(source.is_empty());
    assert_eq!(second_log.outstanding().textures, 0);
}

#[test]
fn shutdown_releases_every_texture() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::with_config(backend, quiet());

    let file = manager.load_texture("a.png", "x.rml");
    let callback_texture = manager.make_callback_texture(|interface| {
        interface.generate_texture(&[0; 4], Vector2i::new(1, 1))
    });
    assert!(file.is_valid());
    assert!(callback_texture.texture().is_valid());
    assert_eq!(log.outstanding().textures, 2);

    drop(manager);
    assert_eq!(log.outstanding().textures, 0);
    assert!(!file.is_valid());
    drop(callback_texture);
    assert_eq!(log.count("release_texture"), 2);
}
