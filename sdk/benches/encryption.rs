#![expect(clippy::unwrap_used, reason = "benchmark")]

use {
    criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main},
    std::io::{Cursor, Read, Write},
    tartarus_sdk::{
        FinishWrite, Passphrase,
        crypto::{DecryptingReader, EncryptingWriter},
    },
};

fn encrypt(input: &[u8], passphrase: &Passphrase) -> Vec<u8> {
    let mut writer = EncryptingWriter::new(Vec::new(), passphrase).unwrap();
    writer.write_all(input).unwrap();
    writer.finish().unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let passphrase = Passphrase::new("benchmark").unwrap();

    let mut group = c.benchmark_group("encrypt");
    for size in [1024, 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || (0..size).map(|_| rand::random::<u8>()).collect::<Vec<u8>>(),
                |input| encrypt(&input, &passphrase),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    let mut group = c.benchmark_group("decrypt");
    for size in [1024, 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let input = (0..size).map(|_| rand::random::<u8>()).collect::<Vec<u8>>();
                    encrypt(&input, &passphrase)
                },
                |frame| {
                    let mut output = Vec::new();
                    DecryptingReader::new(Cursor::new(frame), &passphrase)
                        .unwrap()
                        .read_to_end(&mut output)
                        .unwrap();
                    output
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
