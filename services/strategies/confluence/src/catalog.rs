//! Default instrument catalog
//!
//! Crypto and forex OTC instruments with their starting confidence. The
//! entries at 92 form the top tier and start inside a ready-hold window.

use crate::types::{Category, InstrumentSpec};

const DEFAULT_INSTRUMENTS: &[(&str, Category, f64)] = &[
    ("ETHUSD_otc", Category::Crypto, 88.0),
    ("BNB OTC", Category::Crypto, 92.0),
    ("Solana OTC", Category::Crypto, 88.0),
    ("Chainlink OTC", Category::Crypto, 92.0),
    ("Toncoin OTC", Category::Crypto, 92.0),
    ("Polygon OTC", Category::Crypto, 92.0),
    ("Dogecoin OTC", Category::Crypto, 92.0),
    ("Bitcoin OTC", Category::Crypto, 88.0),
    ("Cardano OTC", Category::Crypto, 64.0),
    ("Polkadot OTC", Category::Crypto, 48.0),
    ("TRON OTC", Category::Crypto, 48.0),
    ("Ethereum OTC", Category::Crypto, 39.0),
    ("Avalanche OTC", Category::Crypto, 31.0),
    ("Bitcoin ETF OTC", Category::Crypto, 20.0),
    ("Bitcoin", Category::Crypto, 18.0),

    ("EUR/USD OTC", Category::Forex, 92.0),
    ("AUD/CAD OTC", Category::Forex, 92.0),
    ("AUD/NZD OTC", Category::Forex, 88.0),
    ("AUD/USD OTC", Category::Forex, 88.0),
    ("BHD/CNY OTC", Category::Forex, 88.0),
    ("CHF/JPY OTC", Category::Forex, 88.0),
    ("EUR/CHF OTC", Category::Forex, 92.0),
    ("EUR/RUB OTC", Category::Forex, 92.0),
    ("GBP/AUD OTC", Category::Forex, 88.0),
    ("NGN/USD OTC", Category::Forex, 88.0),
    ("USD/COP OTC", Category::Forex, 88.0),
    ("USD/INR OTC", Category::Forex, 88.0),
    ("USD/PKR OTC", Category::Forex, 92.0),
    ("USD/RUB OTC", Category::Forex, 92.0),
    ("CAD/CHF", Category::Forex, 88.0),
    ("CAD/JPY", Category::Forex, 88.0),
    ("EUR/NZD OTC", Category::Forex, 92.0),
    ("USD/DZD OTC", Category::Forex, 48.0),
    ("AUD/CHF OTC", Category::Forex, 47.0),
    ("EUR/HUF OTC", Category::Forex, 46.0),
    ("USD/PHP OTC", Category::Forex, 45.0),
    ("USD/BRL OTC", Category::Forex, 44.0),
    ("USD/EGP OTC", Category::Forex, 43.0),
    ("AUD/USD", Category::Forex, 42.0),
    ("USD/CLP OTC", Category::Forex, 41.0),
    ("USD/CHF OTC", Category::Forex, 40.0),
    ("USD/ARS OTC", Category::Forex, 39.0),
    ("GBP/JPY OTC", Category::Forex, 38.0),
    ("USD/CHF", Category::Forex, 37.0),
    ("GBP/USD OTC", Category::Forex, 36.0),
    ("USD/CNH OTC", Category::Forex, 35.0),
    ("YER/USD OTC", Category::Forex, 34.0),
    ("EUR/AUD", Category::Forex, 33.0),
    ("KES/USD OTC", Category::Forex, 32.0),
    ("USD/IDR OTC", Category::Forex, 31.0),
    ("SAR/CNY OTC", Category::Forex, 30.0),
    ("GBP/CHF", Category::Forex, 29.0),
    ("MAD/USD OTC", Category::Forex, 28.0),
    ("ZAR/USD OTC", Category::Forex, 27.0),
    ("NZD/USD OTC", Category::Forex, 26.0),
    ("USD/VND OTC", Category::Forex, 25.0),
    ("LBP/USD OTC", Category::Forex, 24.0),
    ("USD/CAD OTC", Category::Forex, 23.0),
    ("CAD/JPY OTC", Category::Forex, 22.0),
    ("USD/SGD OTC", Category::Forex, 21.0),
    ("AUD/CHF", Category::Forex, 20.0),
    ("CHF/JPY", Category::Forex, 19.0),
    ("EUR/CHF", Category::Forex, 18.0),
    ("EUR/GBP", Category::Forex, 17.0),
    ("GBP/CAD", Category::Forex, 16.0),
    ("EUR/TRY OTC", Category::Forex, 15.0),
    ("TND/USD OTC", Category::Forex, 14.0),
    ("UAH/USD OTC", Category::Forex, 13.0),
    ("USD/MXN OTC", Category::Forex, 12.0),
    ("AUD/JPY", Category::Forex, 11.0),
    ("EUR/JPY", Category::Forex, 10.0),
    ("USD/JPY", Category::Forex, 9.0),
    ("USD/THB OTC", Category::Forex, 8.0),
    ("USD/MYR OTC", Category::Forex, 7.0),
    ("AED/CNY OTC", Category::Forex, 6.0),
    ("CHF/NOK OTC", Category::Forex, 5.0),
    ("AUD/CAD", Category::Forex, 4.0),
    ("EUR/CAD", Category::Forex, 3.0),
    ("GBP/USD", Category::Forex, 2.0),
    ("IQD/CNY OTC", Category::Forex, 1.0),
];

/// The built-in catalog, in display order
pub fn default_catalog() -> Vec<InstrumentSpec> {
    DEFAULT_INSTRUMENTS
        .iter()
        .map(|(id, category, confidence)| InstrumentSpec {
            id: (*id).to_string(),
            category: *category,
            confidence: *confidence,
        })
        .collect()
}
