use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flate2::write::GzEncoder;
use flate2::Compression;
use rbl::header::{HEADER_CRC_SPAN, HEADER_SIZE};
use rbl::{crc32, fnv1a_32, RblReader};
use std::io::Write;

fn build_gzip_rbl(plain: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(plain).unwrap();
    let payload = enc.finish().unwrap();

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(b"RBL\0");
    out.extend_from_slice(&0x100u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16 + 24 + 24]);
    out.extend_from_slice(&crc32(&payload).to_le_bytes());
    out.extend_from_slice(&fnv1a_32(plain).to_le_bytes());
    out.extend_from_slice(&(plain.len() as i32).to_le_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    let header_crc = crc32(&out[..HEADER_CRC_SPAN]);
    out.extend_from_slice(&header_crc.to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

fn bench_hashes(c: &mut Criterion) {
    let data = vec![0xA5u8; 1024 * 1024];
    c.bench_function("crc32_1mb", |b| b.iter(|| crc32(black_box(&data))));
    c.bench_function("fnv1a_1mb", |b| b.iter(|| fnv1a_32(black_box(&data))));
}

fn bench_parse_and_process(c: &mut Criterion) {
    let plain: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 97) as u8).collect();
    let image = build_gzip_rbl(&plain);

    c.bench_function("parse_1mb_gzip", |b| {
        b.iter(|| RblReader::new(black_box(&image)).unwrap())
    });

    let rbl = RblReader::new(&image).unwrap();
    c.bench_function("process_1mb_gzip", |b| {
        b.iter(|| rbl.process(None, None, true).unwrap())
    });
}

criterion_group!(benches, bench_hashes, bench_parse_and_process);
criterion_main!(benches);
