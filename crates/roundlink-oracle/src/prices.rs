//! Latest aggregated price of a feed.

use tracing::{error, info};

use crate::capdata::{self, PriceQuote};
use crate::ports::LedgerReader;
use crate::{OracleError, Result};

/// Read the feed's latest price quote.
pub async fn quote(reader: &dyn LedgerReader, feed: &str) -> Result<PriceQuote> {
    let raw = reader.latest_price_record(feed).await?;
    capdata::decode_price(&raw)
}

/// Latest aggregated price: `amountOut / amountIn`.
pub async fn query_price(reader: &dyn LedgerReader, feed: &str) -> Result<f64> {
    let quote = match quote(reader, feed).await {
        Ok(quote) => quote,
        Err(e) => {
            error!(feed, error = %e, "price query failed");
            return Err(e);
        }
    };
    if quote.amount_in == 0 {
        return Err(OracleError::parse("price record", "amountIn is zero"));
    }
    let price = quote.amount_out as f64 / quote.amount_in as f64;
    info!(feed, price, "price query");
    Ok(price)
}

/// `amountIn` of the feed's latest quote: the scale of submitted unit prices.
pub async fn amount_in(reader: &dyn LedgerReader, feed: &str) -> Result<u128> {
    Ok(quote(reader, feed).await?.amount_in)
}
