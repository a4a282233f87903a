use criterion::{Criterion, criterion_group, criterion_main};
use renderer::{
    ClipMaskOperation, ColourbPremultiplied, CompiledGeometryHandle, LoadedTexture, Mesh,
    Rectanglei, RenderInterface, RenderManager, StableVec, TextureHandle, Vector2f, Vector2i,
    Vertex,
};
use std::hint::black_box;

/// Backend that hands out handles and does nothing else.
#[derive(Default)]
struct NullBackend {
    next: u64,
}

impl NullBackend {
    fn next(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

impl RenderInterface for NullBackend {
    fn compile_geometry(&mut self, _vertices: &[Vertex], _indices: &[u32]) -> CompiledGeometryHandle {
        CompiledGeometryHandle(self.next())
    }

    fn render_geometry(&mut self, _geometry: CompiledGeometryHandle, _translation: Vector2f, _texture: TextureHandle) {}

    fn release_geometry(&mut self, _geometry: CompiledGeometryHandle) {}

    fn load_texture(&mut self, _source: &str) -> Option<LoadedTexture> {
        Some(LoadedTexture {
            handle: TextureHandle(self.next()),
            dimensions: Vector2i::new(64, 64),
        })
    }

    fn generate_texture(&mut self, _pixels: &[u8], _dimensions: Vector2i) -> TextureHandle {
        TextureHandle(self.next())
    }

    fn release_texture(&mut self, _texture: TextureHandle) {}

    fn enable_scissor_region(&mut self, _enable: bool) {}

    fn set_scissor_region(&mut self, _region: Rectanglei) {}
}

fn quad() -> Mesh {
    Mesh::quad(
        Vector2f::ZERO,
        Vector2f::new(16.0, 16.0),
        ColourbPremultiplied::WHITE,
        Vector2f::ZERO,
        Vector2f::new(1.0, 1.0),
    )
}

fn bench_redundant_state(criterion: &mut Criterion) {
    let manager = RenderManager::new(NullBackend::default());
    manager.prepare_render(Vector2i::new(1920, 1080));
    let geometry = manager.make_geometry(quad());
    let region = Rectanglei::from_size(Vector2i::new(100, 100));

    criterion.bench_function("renderer_redundant_state", |bencher| {
        bencher.iter(|| {
            manager.set_scissor_region(black_box(region));
            manager.set_clip_mask(ClipMaskOperation::Set, &geometry, black_box(Vector2f::ZERO));
            manager.set_transform(None);
        })
    });

    let saved = manager.state();
    criterion.bench_function("renderer_state_round_trip", |bencher| {
        bencher.iter(|| {
            manager.reset_state();
            manager.set_state(black_box(&saved));
        })
    });
    manager.reset_state();
}

fn bench_stable_vec_churn(criterion: &mut Criterion) {
    criterion.bench_function("stable_vec_churn", |bencher| {
        bencher.iter(|| {
            let mut slots = StableVec::with_capacity(256);
            let mut live = Vec::with_capacity(256);
            for value in 0..1024_u32 {
                live.push(slots.insert(value));
                if value % 3 == 0 {
                    if let Some(index) = live.pop() {
                        black_box(slots.erase(index));
                    }
                }
            }
            black_box(slots.len())
        })
    });
}

criterion_group!(render_state_benches, bench_redundant_state, bench_stable_vec_churn);
criterion_main!(render_state_benches);
