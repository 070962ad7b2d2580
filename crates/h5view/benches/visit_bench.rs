//! Benchmarks for opening (the visit), path resolution and rendering.

use criterion::{criterion_group, criterion_main, Criterion};
use h5view::memory::{Image, ImageBuilder, MemoryBackend};
use h5view::{File, Selection};

const GROUPS: usize = 50;
const DATASETS_PER_GROUP: usize = 20;

/// 50 groups of 20 small datasets each, with an attribute on every group.
fn make_wide_image() -> Image {
    let mut b = ImageBuilder::new();
    for g in 0..GROUPS {
        let mut group = b.create_group(&format!("group_{g:03}"));
        group.set_attr("index", (g as i64).into());
        for d in 0..DATASETS_PER_GROUP {
            group
                .create_dataset(&format!("ds_{d:03}"))
                .with_f64_data(&[d as f64; 64])
                .with_shape(&[8, 8]);
        }
        b.add_group(group.finish());
    }
    b.finish().unwrap()
}

fn backend() -> MemoryBackend {
    MemoryBackend::new().with_image("wide.h5", make_wide_image())
}

// ===========================================================================
// Bench 1: open + visit 1000 datasets
// ===========================================================================

fn bench_open(c: &mut Criterion) {
    let backend = backend();
    c.bench_function("open_visit_1000_datasets", |b| {
        b.iter(|| {
            let file = File::new(backend.clone(), Some("wide.h5")).unwrap();
            file.item_infos().len()
        })
    });
}

// ===========================================================================
// Bench 2: path resolution and region reads
// ===========================================================================

fn bench_resolve(c: &mut Criterion) {
    let file = File::new(backend(), Some("wide.h5")).unwrap();
    c.bench_function("get_nested_path", |b| {
        b.iter(|| file.get("group_025/ds_010").unwrap().is_some())
    });

    let ds = file
        .get("group_025/ds_010")
        .unwrap()
        .and_then(|r| r.into_item())
        .unwrap();
    let selection = Selection::from([2..6, 2..6]);
    c.bench_function("read_4x4_block", |b| {
        b.iter(|| ds.read(&selection).unwrap().unwrap().len())
    });
}

// ===========================================================================
// Bench 3: render the whole tree
// ===========================================================================

fn bench_render(c: &mut Criterion) {
    let file = File::new(backend(), Some("wide.h5")).unwrap();
    c.bench_function("render_1050_items", |b| b.iter(|| file.to_string().len()));
}

criterion_group!(benches, bench_open, bench_resolve, bench_render);
criterion_main!(benches);
