use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use bid_bridge_common::adapter::request::normalize_targeting;
use bid_bridge_common::adapter::{build, interpret, BidRequest, BidderRequest, ServerResponse};
use bid_bridge_common::integrations::adtrue::{AdTrueAdapter, AdTrueConfig};
use bid_bridge_common::settings::PrivacyConfig;

fn bench_normalize_targeting(c: &mut Criterion) {
    let raw = json!({
        "ci": ["gent", "brussels", ""],
        "ag": 55,
        "tl": ["all", null],
        "empty": [],
        "skipped": {"nested": true},
        "flag": true,
        "blank": ""
    });
    let raw = raw.as_object().cloned().unwrap_or_default();

    c.bench_function("normalize_targeting", |b| {
        b.iter(|| normalize_targeting(black_box(&raw)));
    });
}

fn bench_adtrue_interpret(c: &mut Criterion) {
    let adapter = AdTrueAdapter::new(AdTrueConfig::default(), PrivacyConfig::default());
    let bids: Vec<BidRequest> = (0..10)
        .map(|i| {
            serde_json::from_value(json!({
                "bidId": format!("bid-{i}"),
                "sizes": [[300, 250]],
                "mediaTypes": {"banner": {"sizes": [[300, 250]]}},
                "params": {"publisherId": "1212", "zoneId": "21423"}
            }))
            .unwrap_or_default()
        })
        .collect();
    let requests = build(&adapter, &bids, &BidderRequest::default());
    let Some(request) = requests.first() else {
        return;
    };

    let seat: Vec<_> = (0..10)
        .map(|i| {
            json!({
                "id": format!("rtb-{i}"),
                "impid": format!("bid-{i}"),
                "price": 1.25,
                "adm": "<a href='https://adtrue.com'><img src='https://cdn.adtrue.com/ad.png'></a>",
                "crid": "abc77au4",
                "adomain": ["adtrue.com"],
                "w": 300,
                "h": 250
            })
        })
        .collect();
    let response = ServerResponse::from_json(&json!({
        "id": "auction-1",
        "cur": "USD",
        "seatbid": [{"bid": seat}]
    }));

    c.bench_function("adtrue_interpret_10_bids", |b| {
        b.iter(|| interpret(&adapter, black_box(&response), request));
    });
}

criterion_group!(benches, bench_normalize_targeting, bench_adtrue_interpret);
criterion_main!(benches);
