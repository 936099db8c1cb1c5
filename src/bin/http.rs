#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use entrega_tool::{Agrupamento, DeliveryPlanner, HolidayCalendar, HttpDeliveryStore, http_api};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr: SocketAddr = std::env::var("ENTREGA_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let agrupamento = match std::env::var("ENTREGA_AGRUPAMENTO") {
        Ok(raw) => serde_json::from_str::<Agrupamento>(&raw)?,
        Err(_) => Agrupamento::default(),
    };

    let store = Arc::new(HttpDeliveryStore::from_env()?);
    let calendar = Arc::new(HolidayCalendar::from_env());
    let planner = DeliveryPlanner::new(store, calendar, agrupamento);

    println!("entrega-tool HTTP API listening on http://{addr}");
    http_api::serve(addr, planner).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
