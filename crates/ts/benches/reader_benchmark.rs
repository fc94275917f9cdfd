use std::hint::black_box;
use std::io::Cursor;

use criterion::{Criterion, criterion_group, criterion_main};
use ts::{PacketReader, SectionAssembler, TS_PACKET_SIZE, extract_timestamp};

fn video_packet(pid: u16, pts: u64) -> [u8; TS_PACKET_SIZE] {
    let mut data = [0xFFu8; TS_PACKET_SIZE];
    data[0] = 0x47;
    data[1] = 0x40 | ((pid >> 8) as u8 & 0x1F);
    data[2] = pid as u8;
    data[3] = 0x10;
    let header = [
        0x00,
        0x00,
        0x01,
        0xE0,
        0x00,
        0x00,
        0x80,
        0x80,
        0x05,
        0x21 | (((pts >> 29) as u8) & 0x0E),
        (pts >> 22) as u8,
        (((pts >> 14) as u8) & 0xFE) | 0x01,
        (pts >> 7) as u8,
        (((pts << 1) as u8) & 0xFE) | 0x01,
    ];
    data[4..4 + header.len()].copy_from_slice(&header);
    data
}

fn create_clean_stream(packets: usize) -> Vec<u8> {
    (0..packets)
        .flat_map(|i| video_packet(0x100, i as u64 * 3003))
        .collect()
}

/// Clean stream with a burst of junk every 500 packets.
fn create_noisy_stream(packets: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(packets * TS_PACKET_SIZE);
    for i in 0..packets {
        if i % 500 == 499 {
            out.extend_from_slice(&[0x00, 0x12, 0x47, 0x34, 0x56]);
        }
        out.extend_from_slice(&video_packet(0x100, i as u64 * 3003));
    }
    out
}

fn count_timestamps(data: &[u8]) -> usize {
    let reader = PacketReader::new(Cursor::new(data)).unwrap();
    reader
        .filter_map(|p| p.ok())
        .filter_map(|p| extract_timestamp(&p))
        .count()
}

fn benchmark_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("Packet Reader");

    let clean = create_clean_stream(20_000);
    let noisy = create_noisy_stream(20_000);

    group.bench_function("Clean stream timestamps", |b| {
        b.iter(|| count_timestamps(black_box(&clean)))
    });

    group.bench_function("Noisy stream resync", |b| {
        b.iter(|| count_timestamps(black_box(&noisy)))
    });

    group.bench_function("Section assembler", |b| {
        b.iter(|| {
            let mut asm = SectionAssembler::new();
            let reader = PacketReader::new(Cursor::new(black_box(&clean))).unwrap();
            reader
                .filter_map(|p| p.ok())
                .map(|p| asm.push(&p).len())
                .sum::<usize>()
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_reader);
criterion_main!(benches);
