use std::time::Duration;

use resilient_http::{static_backoff, ClientOptions, HttpClient, Request, RetryCounter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("RESILIENT_HTTP_URL")
        .unwrap_or_else(|_| "https://example.com/".to_owned());

    let mut client = HttpClient::new("demo").with_options(ClientOptions::from_env()?);
    let response = client.execute(&Request::get(&url)?).await?;
    println!("{} ({} bytes)", response.status(), response.body().len());

    let mut quick = HttpClient::new("demo-quick")
        .with_retry_handler(RetryCounter::new(1))
        .with_backoff(static_backoff(Duration::from_millis(500)));
    let cancel = quick.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    match quick.execute(&Request::get(&url)?).await {
        Ok(response) => println!("finished before cancel: {}", response.status()),
        Err(err) => println!("{err} ({})", quick.retry_state()),
    }

    Ok(())
}
