use chrono::{Duration, Utc};
use clap::Parser;
use futures_util::StreamExt;
use lib_common::markets::StockQuote;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base WebSocket URL of a running quote server
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Comma separated symbols, one connection each
    #[arg(short, long, value_delimiter = ',', default_value = "AAPL,MSFT,NVDA,TSLA")]
    symbols: Vec<String>,

    /// Report interval in seconds
    #[arg(short, long, default_value_t = 60)]
    report_interval_secs: u64,
}

struct Stats {
    global_timestamps: VecDeque<chrono::DateTime<Utc>>,
    symbol_timestamps: HashMap<String, VecDeque<chrono::DateTime<Utc>>>,
    last_close: HashMap<String, f64>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let stats = Arc::new(Mutex::new(Stats {
        global_timestamps: VecDeque::new(),
        symbol_timestamps: HashMap::new(),
        last_close: HashMap::new(),
    }));

    // Clone for the reporter task
    let stats_reporter = Arc::clone(&stats);
    let report_interval = std::time::Duration::from_secs(args.report_interval_secs);
    tokio::spawn(async move {
        loop {
            sleep(report_interval).await;
            let now = Utc::now();
            let one_minute_ago = now - Duration::minutes(1);

            let mut data = stats_reporter.lock().unwrap();

            // Clean global
            while data.global_timestamps.front().is_some_and(|&t| t < one_minute_ago) {
                data.global_timestamps.pop_front();
            }
            let global_rate = data.global_timestamps.len();

            // Clean per symbol and collect rates
            let mut rates: Vec<(String, usize)> = Vec::new();
            for (symbol, dq) in data.symbol_timestamps.iter_mut() {
                while dq.front().is_some_and(|&t| t < one_minute_ago) {
                    dq.pop_front();
                }
                if !dq.is_empty() {
                    rates.push((symbol.clone(), dq.len()));
                }
            }

            // Sort DESC by msg/min
            rates.sort_by(|a, b| b.1.cmp(&a.1));

            let report = rates
                .iter()
                .map(|(s, r)| {
                    let close = data.last_close.get(s).copied().unwrap_or_default();
                    format!("{}: {} msg/min (last {:.2})", s, r, close)
                })
                .collect::<Vec<_>>()
                .join(", ");

            println!("\n----- 1-Minute Summary -----");
            println!("Global rate: {} msg/min", global_rate);
            println!("Symbols: {}", if report.is_empty() { "No data" } else { &report });
            println!("----------------------------\n");
        }
    });

    let mut tasks = Vec::new();
    for symbol in args.symbols {
        let url = format!("{}/stock?symbol={}", args.url.trim_end_matches('/'), symbol);
        let stats = Arc::clone(&stats);
        tasks.push(tokio::spawn(async move {
            println!("Connecting to {}...", url);
            let (ws_stream, _) = match connect_async(&url).await {
                Ok(conn) => conn,
                Err(e) => {
                    eprintln!("Failed to connect to {}: {}", url, e);
                    return;
                }
            };
            let (_write, mut read) = ws_stream.split();

            // Handle incoming quotes
            while let Some(Ok(msg)) = read.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(quote) = serde_json::from_str::<StockQuote>(&text) {
                        let now = Utc::now();
                        let mut data = stats.lock().unwrap();
                        data.global_timestamps.push_back(now);
                        data.last_close.insert(quote.symbol.clone(), quote.close);
                        data.symbol_timestamps.entry(quote.symbol).or_default().push_back(now);
                    }
                }
            }
            println!("Connection to {} closed", url);
        }));
    }

    println!("Subscribed. Press Ctrl+C to stop.");
    futures_util::future::join_all(tasks).await;
}
