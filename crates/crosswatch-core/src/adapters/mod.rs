mod binance;

pub use binance::{BinanceSource, BINANCE_BASE_URL};
