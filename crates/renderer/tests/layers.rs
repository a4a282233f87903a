use renderer::recording::{BackendCall, RecordingBackend};
use renderer::{
    BlendMode, ColourbPremultiplied, CompiledFilter, Dictionary, LayerHandle, RenderConfig,
    RenderManager, Variant, Vector2f,
};

fn quiet() -> RenderConfig {
    RenderConfig::new(false, true, 30)
}

fn drop_shadow() -> Dictionary {
    let mut parameters = Dictionary::new();
    parameters.insert("offset".to_owned(), Variant::Vector2(Vector2f::new(2.0, 2.0)));
    parameters.insert("colour".to_owned(), Variant::from(ColourbPremultiplied::new(0, 0, 0, 128)));
    parameters
}

#[test]
fn top_and_next_layer_follow_the_stack() {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = RenderManager::new(RecordingBackend::new());
    assert_eq!(manager.top_layer(), LayerHandle::BASE);

    let outer = manager.push_layer();
    assert_eq!(manager.top_layer(), outer);
    assert_eq!(manager.next_layer(), LayerHandle::BASE);

    let inner = manager.push_layer();
    assert_ne!(inner, outer);
    assert_eq!(manager.top_layer(), inner);
    assert_eq!(manager.next_layer(), outer);

    manager.pop_layer();
    assert_eq!(manager.top_layer(), outer);
    manager.pop_layer();
    assert_eq!(manager.top_layer(), LayerHandle::BASE);
    assert_eq!(manager.statistics().layers, 0);
}

#[test]
fn unbalanced_pop_is_reported_without_backend_call() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::with_config(backend, quiet());

    manager.push_layer();
    manager.pop_layer();
    manager.pop_layer();
    assert_eq!(log.count("pop_layer"), 1);
    assert_eq!(manager.statistics().usage_errors, 1);
}

#[test]
fn composite_forwards_filters_in_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    let shadow = manager.compile_filter("drop-shadow", &drop_shadow());
    let mut opacity_parameters = Dictionary::new();
    opacity_parameters.insert("value".to_owned(), Variant::from(0.5_f32));
    let opacity = manager.compile_filter("opacity", &opacity_parameters);

    let layer = manager.push_layer();
    manager.composite_layers(layer, manager.next_layer(), BlendMode::Replace, [&opacity, &shadow]);
    manager.pop_layer();

    let (source, destination, blend_mode, filters) = log
        .calls()
        .into_iter()
        .find_map(|call| match call {
            BackendCall::CompositeLayers {
                source,
                destination,
                blend_mode,
                filters,
            } => Some((source, destination, blend_mode, filters)),
            _ => None,
        })
        .unwrap();
    assert_eq!(source, layer);
    assert_eq!(destination, LayerHandle::BASE);
    assert_eq!(blend_mode, BlendMode::Replace);

    let compiled_handle = |wanted: &str| {
        log.calls().into_iter().find_map(|call| match call {
            BackendCall::CompileFilter { name, handle } if name == wanted => Some(handle),
            _ => None,
        })
    };
    let expected: Vec<_> = [compiled_handle("opacity"), compiled_handle("drop-shadow")]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(filters, expected);
    assert_eq!(filters.len(), 2);
}

#[test]
fn mask_image_counts_as_filter() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::new();
    let log = backend.log();
    let manager = RenderManager::new(backend);

    manager.push_layer();
    let mask = manager.save_layer_as_mask_image();
    manager.pop_layer();
    assert!(mask.is_valid());
    assert_eq!(manager.statistics().filters, 1);

    let filters: Vec<CompiledFilter> = vec![mask];
    drop(filters);
    assert_eq!(manager.statistics().filters, 0);
    assert_eq!(log.outstanding().filters, 0);
}

#[test]
fn refused_mask_image_is_empty() {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = RenderManager::new(RecordingBackend::new().refusing_filters());
    manager.push_layer();
    let mask = manager.save_layer_as_mask_image();
    manager.pop_layer();
    assert!(!mask.is_valid());
    assert_eq!(manager.statistics().filters, 0);
}
