use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{SourceConfig, StatusWeights};
use crate::filter::RequestLogFilter;
use crate::record::RequestSnapshot;

// ---------------------------------------------------------------------------
// Slot-based synthetic request generation for the demo binary
// ---------------------------------------------------------------------------

const METHODS: &[&str] = &["GET", "GET", "GET", "GET", "POST", "POST", "PUT", "DELETE", "HEAD"];

const PATHS: &[&str] = &[
    "/",
    "/status/ping",
    "/login",
    "/logout",
    "/apps/store/products",
    "/apps/store/products/WG-1111",
    "/apps/store/cart",
    "/apps/store/checkout",
    "/apps/store/orders",
    "/rest/s1/mantle/parties",
    "/rest/s1/mantle/orders",
    "/rest/s1/mantle/assets",
    "/qapps/system/dashboard",
    "/assets/css/site.css",
    "/assets/js/app.js",
    "/assets/img/logo.png",
    "/favicon.ico",
    "/robots.txt",
    "/sitemap.xml",
    "/search",
];

const QUERIES: &[&str] = &[
    "pageIndex=0&pageSize=20",
    "orderBy=-entryDate",
    "q=widget",
    "productId=WG-1111",
    "facilityId=ZIRET_WH",
    "statusId=OrderPlaced",
    "lastUpdated=true",
];

const USERS: &[&str] = &["john.doe", "admin", "ordersvc", "reporting", "m.riley"];

const AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148",
    "curl/8.5.0",
    "okhttp/4.12.0",
    "python-requests/2.32.0",
    "Googlebot/2.1 (+http://www.google.com/bot.html)",
];

const REFERRERS: &[&str] = &[
    "https://www.google.com/",
    "https://duckduckgo.com/",
    "https://shop.example.com/",
    "https://shop.example.com/apps/store/products",
    "https://news.ycombinator.com/",
];

const PROTOCOLS: &[&str] = &["HTTP/1.1", "HTTP/1.1", "HTTP/1.1", "HTTP/2.0"];

fn pick<'a, T>(list: &'a [T], rng: &mut impl Rng) -> &'a T {
    &list[rng.gen_range(0..list.len())]
}

fn random_client_ip(rng: &mut impl Rng) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(
        rng.gen_range(1..=223),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(1..=254),
    ))
}

pub fn generate_snapshot(source: &SourceConfig, rng: &mut impl Rng) -> RequestSnapshot {
    let client_ip = random_client_ip(rng);
    // roughly a third of requests arrive through a proxy chain
    let forwarded_for = rng
        .gen_bool(0.3)
        .then(|| format!("{client_ip}, 10.1.2.{}", rng.gen_range(1..=254)));

    RequestSnapshot {
        remote_addr: if forwarded_for.is_some() {
            IpAddr::V4(Ipv4Addr::new(10, 1, 2, 1))
        } else {
            client_ip
        },
        forwarded_for,
        remote_user: rng.gen_bool(0.2).then(|| pick(USERS, rng).to_string()),
        server_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10)),
        method: pick(METHODS, rng).to_string(),
        scheme: source.scheme.clone(),
        host: source.host.clone(),
        path: pick(PATHS, rng).to_string(),
        query: rng.gen_bool(0.25).then(|| pick(QUERIES, rng).to_string()),
        protocol: pick(PROTOCOLS, rng).to_string(),
        status: pick_status(&source.status_weights, rng),
        bytes: rng.gen_range(180..64_000),
        referrer: rng.gen_bool(0.4).then(|| pick(REFERRERS, rng).to_string()),
        agent: Some(pick(AGENTS, rng).to_string()),
    }
}

/// Feeds one source's worth of requests through the filter until the
/// duration elapses (0 = run until cancelled).
pub async fn simulate_requests(source: SourceConfig, filter: RequestLogFilter, duration: Duration) {
    let mut rng = StdRng::from_entropy();
    let start = Instant::now();
    let mean_interval_ms = 1000.0 / source.rate_per_sec;

    while duration.is_zero() || start.elapsed() < duration {
        filter.record_request(generate_snapshot(&source, &mut rng));

        // Exponential inter-arrival time (Poisson process)
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        let delay_ms = (-mean_interval_ms * u.ln()) as u64;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn pick_status(weights: &StatusWeights, rng: &mut impl Rng) -> u16 {
    let total = weights.success + weights.redirect + weights.client_error + weights.server_error;
    let roll: f64 = rng.gen_range(0.0..total);

    if roll < weights.success {
        *pick(&[200, 200, 200, 201, 204], rng)
    } else if roll < weights.success + weights.redirect {
        *pick(&[301, 302, 304], rng)
    } else if roll < weights.success + weights.redirect + weights.client_error {
        *pick(&[400, 401, 403, 404, 404, 429], rng)
    } else {
        *pick(&[500, 502, 503], rng)
    }
}
