use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tombraider::actions::{build_index, ActionContext};
use tombraider::classify::{Classifier, ClassifierConfig, ClassifierTables};
use tombraider::scanner::{sanitize, FingerprintMode, Hasher, Walker, WalkerConfig};

// A recovery-like tree: nested directories of small text and image files
fn setup_test_dir(depth: usize, files_per_dir: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    create_dir_recursive(temp_dir.path().to_path_buf(), depth, files_per_dir);
    temp_dir
}

fn create_dir_recursive(path: PathBuf, depth: usize, files_per_dir: usize) {
    if depth == 0 {
        return;
    }
    fs::create_dir_all(&path).expect("Failed to create dir");

    for i in 0..files_per_dir {
        let text = path.join(format!("f{i:04}.txt"));
        fs::write(text, format!("recovered text file {i}\n")).expect("Failed to write file");
        let mut jpeg = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00".to_vec();
        jpeg.resize(4096, i as u8);
        fs::write(path.join(format!("f{i:04}.jpg")), jpeg).expect("Failed to write file");
    }

    if depth > 1 {
        for i in 0..2 {
            create_dir_recursive(path.join(format!("recup_dir.{i}")), depth - 1, files_per_dir);
        }
    }
}

fn bench_walker(c: &mut Criterion) {
    let temp_dir = setup_test_dir(4, 10);
    let config = WalkerConfig::default();

    c.bench_function("walker_300_files", |b| {
        b.iter(|| {
            let walker = Walker::new(temp_dir.path(), config.clone());
            let files: Vec<_> = walker.walk().collect();
            black_box(files);
        })
    });
}

// Fast mode reads two fixed samples; exact mode reads the whole file
fn bench_fingerprint_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    let temp_dir = TempDir::new().unwrap();

    for size_kb in [4, 1024, 10240] {
        let file_path = temp_dir.path().join(format!("bench_{size_kb}.dat"));
        fs::write(&file_path, vec![b'a'; size_kb * 1024]).expect("Failed to write bench file");

        for mode in [FingerprintMode::Fast, FingerprintMode::Exact] {
            let hasher = Hasher::new().with_mode(mode);
            group.bench_with_input(format!("{mode:?}_{size_kb}KB"), &file_path, |b, path| {
                b.iter(|| black_box(hasher.fingerprint(path).unwrap()));
            });
        }
    }
    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let paths = [
        "recup_dir.1/f1234567.jpg",
        "Users/alice/My Documents/Résumé - final (2).docx",
        "deeply/nested/path/with/many/components/and-some-dashes/and spaces/file.tar.gz",
    ];
    c.bench_function("sanitize_paths", |b| {
        b.iter(|| {
            for p in &paths {
                black_box(sanitize(black_box(p)));
            }
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let temp_dir = setup_test_dir(1, 20);
    let classifier = Classifier::new(
        ClassifierTables::builtin().unwrap(),
        ClassifierConfig::default(),
    );
    let files: Vec<PathBuf> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();

    c.bench_function("classify_40_files", |b| {
        b.iter(|| {
            for path in &files {
                black_box(classifier.classify(path));
            }
        })
    });
}

fn bench_index_tree(c: &mut Criterion) {
    let temp_dir = setup_test_dir(3, 10);
    let output = TempDir::new().unwrap();
    let index_path = output.path().join("bench.index");
    let hasher = Hasher::new();
    let ctx = ActionContext::default();

    c.bench_function("index_140_files", |b| {
        b.iter(|| {
            let summary = build_index(temp_dir.path(), &index_path, &hasher, &ctx)
                .unwrap();
            black_box(summary);
        })
    });
}

criterion_group!(
    benches,
    bench_walker,
    bench_fingerprint_modes,
    bench_sanitize,
    bench_classify,
    bench_index_tree
);
criterion_main!(benches);
