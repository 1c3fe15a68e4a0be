//! Packet relay hot-path benchmark
//!
//! Measures per-packet relay overhead (locking, rescale, dispatch) against
//! a transport that discards everything, for typical 30 fps video with
//! 20 ms audio frames.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use cast_output::host::{EncoderHandle, EncoderSettings};
use cast_output::output::PacketRelay;
use cast_output::{EncoderPacket, SessionInfo, SessionParams, Transport, TransportError};

struct NullTransport;

impl Transport for NullTransport {
    fn create_session(&self, _params: &SessionParams) -> Result<SessionInfo, TransportError> {
        Ok(SessionInfo {
            peer_token: String::new(),
            channel_id: String::new(),
        })
    }

    fn write_video(&self, data: &[u8], timestamp_ms: u64) -> Result<(), TransportError> {
        black_box((data.len(), timestamp_ms));
        Ok(())
    }

    fn write_audio(&self, data: &[u8], timestamp_ms: u64) -> Result<(), TransportError> {
        black_box((data.len(), timestamp_ms));
        Ok(())
    }

    fn close(&self) {}

    fn last_error(&self) -> String {
        String::new()
    }
}

struct StaticEncoder;

impl EncoderHandle for StaticEncoder {
    fn settings(&self) -> EncoderSettings {
        EncoderSettings::default()
    }

    fn update(&self, _settings: EncoderSettings) {}

    fn extra_data(&self) -> Option<Vec<u8>> {
        Some(vec![0x67; 32])
    }
}

fn bench_video_path(c: &mut Criterion) {
    let transport = NullTransport;
    let encoder = StaticEncoder;
    let payload = vec![0u8; 16 * 1024];

    let mut group = c.benchmark_group("relay_video");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("delta_frame", |b| {
        let relay = PacketRelay::new();
        relay.handle_video(
            &transport,
            &encoder,
            &EncoderPacket::video(&payload, 0, (1, 1000), true),
        );
        let mut pts = 33i64;
        b.iter(|| {
            relay.handle_video(
                &transport,
                &encoder,
                &EncoderPacket::video(black_box(&payload), pts, (1, 1000), false),
            );
            pts += 33;
        });
    });

    group.bench_function("keyframe_with_header", |b| {
        let relay = PacketRelay::new();
        let mut pts = 0i64;
        b.iter(|| {
            relay.handle_video(
                &transport,
                &encoder,
                &EncoderPacket::video(black_box(&payload), pts, (1, 1000), true),
            );
            pts += 1000;
        });
    });

    group.finish();
}

fn bench_audio_path(c: &mut Criterion) {
    let transport = NullTransport;
    let encoder = StaticEncoder;
    let video = vec![0u8; 4096];
    let payload = vec![0u8; 512];

    let mut group = c.benchmark_group("relay_audio");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("forwarded", |b| {
        let relay = PacketRelay::new();
        relay.handle_video(
            &transport,
            &encoder,
            &EncoderPacket::video(&video, 0, (1, 1000), true),
        );
        let mut pts = 0i64;
        b.iter(|| {
            relay.handle_audio(
                &transport,
                &EncoderPacket::audio(black_box(&payload), pts, (1, 1000)),
            );
            pts += 20;
        });
    });

    group.bench_function("gated_drop", |b| {
        let relay = PacketRelay::new();
        b.iter(|| {
            relay.handle_audio(
                &transport,
                &EncoderPacket::audio(black_box(&payload), 0, (1, 1000)),
            );
        });
    });

    group.finish();
}

criterion_group!(benches, bench_video_path, bench_audio_path);
criterion_main!(benches);
