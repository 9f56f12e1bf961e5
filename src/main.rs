use polosdk::core::config::ExchangeConfig;
use polosdk::core::kernel::RestClient;
use polosdk::core::traits::handler_fn;
use polosdk::core::types::Subscription;
use polosdk::exchanges::poloniex::{create_public_stream, create_rest_client, PoloniexMessage};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Public endpoints only; set POLONIEX_API_KEY / POLONIEX_SECRET_KEY for private ones
    let config = ExchangeConfig::read_only();

    println!("Fetching server time...");
    let rest = create_rest_client(&config)?;
    match rest.get("/timestamp", &[], false).await {
        Ok(time) => println!("Server time: {}", time),
        Err(e) => println!("Error fetching server time: {}", e),
    }

    let handler = handler_fn(
        |message: PoloniexMessage| {
            match message {
                PoloniexMessage::Pong => {}
                PoloniexMessage::Data { channel, payload } => {
                    println!("[{}] {}", channel, payload);
                }
                other => println!("{:?}", other),
            }
            Ok(())
        },
        |error| eprintln!("Stream error: {}", error),
    );

    let stream = create_public_stream(&config, handler)?;
    stream
        .subscribe(Subscription::new(["book"]).with_symbols(["BTC_USDT"]))
        .await?;

    println!("Connecting to {}...", stream.url());
    stream.connect().await?;
    stream.list_subscriptions().await?;

    tokio::time::sleep(Duration::from_secs(10)).await;

    stream.disconnect().await?;
    println!("Stream closed after {:?}", stream.stats());

    Ok(())
}
