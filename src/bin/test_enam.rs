// src/bin/test_enam.rs
use agri_price_engine::services::enam::EnamClient;
use dotenv::dotenv;
use log::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    info!("Testing eNAM (data.gov.in) mandi price fetching...");

    let client = EnamClient::from_env().map_err(|e| anyhow::anyhow!(e))?;
    match client.fetch("Punjab", "Wheat", 5).await {
        Ok(records) => {
            info!("SUCCESS: fetched {} records", records.len());
            for rec in records {
                println!("{:<25} {:>8.0} Rs/quintal  ({})", rec.market, rec.price, rec.date);
            }
        }
        Err(e) => {
            error!("ERROR: eNAM fetch failed: {}", e);
            return Err(anyhow::anyhow!(e));
        }
    }

    Ok(())
}
