//! Pipeline throughput: parse + build + normalize + project over a
//! synthetic TypeScript tree.

use std::fmt::Write as _;
use std::fs;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use trellis_core::policy::NoisePolicy;
use trellis_extract::pipeline::Extractor;

fn synthetic_project(files: usize, functions_per_file: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    for i in 0..files {
        let mut source = String::new();
        if i > 0 {
            let _ = writeln!(source, "import {{ fn{}_0 }} from \"./mod{}\";", i - 1, i - 1);
        }
        for f in 0..functions_per_file {
            let _ = writeln!(
                source,
                "export function fn{i}_{f}(value: number): number {{\n  \
                   let total = 0;\n  total += value;\n  return total;\n}}"
            );
        }
        if i > 0 {
            let _ = writeln!(
                source,
                "export function caller{i}() {{ return fn{}_0(1); }}",
                i - 1
            );
        }
        fs::write(dir.path().join(format!("src/mod{i}.ts")), source).unwrap();
    }
    dir
}

fn bench_ingest(c: &mut Criterion) {
    let project = synthetic_project(24, 12);

    c.bench_function("ingest_24_files", |b| {
        b.iter_batched(
            || Extractor::new(project.path(), NoisePolicy::default()),
            |extractor| {
                let report = extractor.ingest(project.path());
                assert!(!report.edges.is_empty());
                report
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
