//! Feed Decoding Benchmarks - Hot-Path Performance Validation
//!
//! Benchmarks the functions that run on every inbound frame and every
//! identity lookup response.
//!
//! Run with: cargo bench --bench decode_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vessel_tracker::adapters::lookup::vesselfinder::parse_mmsi_from_html;
use vessel_tracker::domain::ais_message::{AisEnvelope, parse_feed_timestamp};

const POSITION_FRAME: &str = r#"{"MessageType":"PositionReport","Message":{"PositionReport":{"Cog":184.3,"Latitude":51.9512,"Longitude":4.0477,"NavigationalStatus":0,"Sog":12.1,"TrueHeading":185}},"MetaData":{"MMSI":538003456,"ShipName":"MAERSK EXAMPLE","latitude":51.9512,"longitude":4.0477,"time_utc":"2024-11-21 10:15:42.123456789 +0000 UTC"}}"#;

/// Decode and classify one position report frame.
fn bench_decode_position(c: &mut Criterion) {
    c.bench_function("decode_position_frame", |b| {
        b.iter(|| {
            let envelope = AisEnvelope::decode(black_box(POSITION_FRAME)).unwrap();
            let _message = envelope.classify().unwrap();
        });
    });
}

/// Parse the feed's timestamp layout.
fn bench_feed_timestamp(c: &mut Criterion) {
    c.bench_function("parse_feed_timestamp", |b| {
        b.iter(|| {
            let _ts = parse_feed_timestamp(black_box("2024-11-21 10:15:42.123456789 +0000 UTC"));
        });
    });
}

/// Extract an MMSI from a details page of realistic size.
fn bench_mmsi_extraction(c: &mut Criterion) {
    let filler = "<tr><td class=\"n3\">Gross Tonnage</td><td class=\"v3\">151963</td></tr>".repeat(400);
    let page = format!(
        "<html><body><table>{filler}<tr><td class=\"n3\">IMO / MMSI</td><td class=\"v3\">9321483 / 219018271</td></tr></table></body></html>"
    );

    c.bench_function("parse_mmsi_from_html", |b| {
        b.iter(|| {
            let _mmsi = parse_mmsi_from_html(black_box(&page)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_decode_position,
    bench_feed_timestamp,
    bench_mmsi_extraction,
);
criterion_main!(benches);
